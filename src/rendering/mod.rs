/// Software rasterization pipeline
/// Palette-indexed rendering: draw calls are batched, vertex shaded,
/// frustum clipped, then rasterized through palette-space pixel shaders.
pub mod drawcall;
pub mod framebuffer;
pub mod pipeline;
pub mod rasterizer;
pub mod renderer;
pub mod shaders;

pub use drawcall::{
    DitheringMode, PixelShaderType, RenderDrawCall, RenderFrameSettings, RenderLightingType,
    RenderTransform, TextureBinding, TextureSamplingType, VertexShaderType,
    MAX_LIGHTS_PER_DRAW_CALL,
};
pub use framebuffer::{DitherBuffer, FrameBuffers, DITHERING_MODERN_MASK_COUNT};
pub use pipeline::{
    FrameContext, PipelineTriangle, MAX_CLIPPED_MESH_TRIANGLES, MAX_CLIPPED_TRIANGLE_TRIANGLES,
    MAX_DRAW_CALL_MESH_TRIANGLES, MAX_MESH_PROCESS_CACHES,
};
pub use rasterizer::RasterizerTriangle;
pub use renderer::Renderer;
