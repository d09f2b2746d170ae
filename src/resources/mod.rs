/// Renderer-owned resource pools
/// Geometry buffers, textures, uniforms and lights are allocated by ID
/// and referenced from draw calls; the renderer owns all storage.
pub mod buffers;
pub mod light;
pub mod pool;
pub mod texture;

pub use buffers::{AttributeBuffer, IndexBuffer, UniformBuffer, VertexBuffer};
pub use light::Light;
pub use pool::Pool;
pub use texture::{ObjectTexture, TexelBuffer, TexelFormat};

pub type VertexBufferId = usize;
pub type AttributeBufferId = usize;
pub type IndexBufferId = usize;
pub type UniformBufferId = usize;
pub type ObjectTextureId = usize;
pub type RenderLightId = usize;
