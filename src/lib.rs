//! Palette Raster - CPU-only palette-indexed 3D rasterizer
//! Transform, clip, rasterize, shade, and composite without a GPU

pub mod camera;
pub mod perf;
pub mod rendering;
pub mod resources;

pub use camera::RenderCamera;
pub use perf::{CounterSnapshot, FunctionCounters, RenderProfilerData, FUNCTION_COUNTERS};
pub use rendering::{
    DitheringMode, PixelShaderType, RenderDrawCall, RenderFrameSettings, RenderLightingType,
    RenderTransform, Renderer, TextureBinding, TextureSamplingType, VertexShaderType,
};
pub use resources::{
    AttributeBufferId, IndexBufferId, Light, ObjectTexture, ObjectTextureId, RenderLightId,
    TexelFormat, UniformBufferId, VertexBufferId,
};
