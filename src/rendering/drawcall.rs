/// Draw call descriptors: the atomic unit of per-frame submission.
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::DMat4;

use crate::resources::{
    AttributeBufferId, IndexBufferId, ObjectTextureId, RenderLightId, UniformBufferId,
    VertexBufferId,
};

pub const MAX_LIGHTS_PER_DRAW_CALL: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexShaderType {
    /// Model-view-projection transform only.
    Basic,
    /// Scales toward model-space Y=0 around a pre-scale translation before
    /// the usual rotate/translate/project chain. Animates doors sliding
    /// into the ceiling.
    RaisingDoor,
    /// Same math as Basic; kept distinct so entity batches never merge with
    /// geometry batches.
    Entity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelShaderType {
    Opaque,
    OpaqueWithAlphaTestLayer,
    AlphaTested,
    AlphaTestedWithVariableTexCoordUMin,
    AlphaTestedWithVariableTexCoordVMin,
    AlphaTestedWithPaletteIndexLookup,
    AlphaTestedWithLightLevelColor,
    AlphaTestedWithLightLevelOpacity,
    AlphaTestedWithPreviousBrightnessLimit,
    AlphaTestedWithHorizonMirror,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureSamplingType {
    /// Perspective-correct UVs clamped to the texture rectangle.
    Default,
    /// U from the pixel's screen X percent, V from twice the screen Y
    /// percent wrapped at 1.0. Drives scrolling chasm effects.
    ScreenSpaceRepeatY,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderLightingType {
    /// The draw call supplies one fixed light percent for every pixel.
    PerMesh,
    /// Ambient plus accumulated point-light falloff per pixel.
    PerPixel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DitheringMode {
    None,
    /// Single checkerboard mask.
    Classic,
    /// Four ordered masks selected by the fractional light level.
    Modern,
}

/// Texture reference on a draw call. `Varying` is a shared slot whose ID the
/// caller may rewrite between frames (e.g. animated chasm walls) without
/// rebuilding the draw call; the renderer only ever reads through it.
#[derive(Debug, Clone)]
pub enum TextureBinding {
    Fixed(ObjectTextureId),
    Varying(Arc<AtomicUsize>),
}

impl TextureBinding {
    pub fn varying(initial: ObjectTextureId) -> (Self, Arc<AtomicUsize>) {
        let slot = Arc::new(AtomicUsize::new(initial));
        (Self::Varying(slot.clone()), slot)
    }

    #[inline]
    pub fn resolve(&self) -> ObjectTextureId {
        match self {
            TextureBinding::Fixed(id) => *id,
            TextureBinding::Varying(slot) => slot.load(Ordering::Relaxed),
        }
    }
}

/// Transform uniform layout stored in uniform buffers: the three unfused
/// model matrices. They stay separate because the RaisingDoor vertex shader
/// needs the scale matrix on its own.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct RenderTransform {
    pub translation: DMat4,
    pub rotation: DMat4,
    pub scale: DMat4,
}

impl RenderTransform {
    pub fn identity() -> Self {
        Self {
            translation: DMat4::IDENTITY,
            rotation: DMat4::IDENTITY,
            scale: DMat4::IDENTITY,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        unsafe {
            std::slice::from_raw_parts(
                self as *const Self as *const u8,
                std::mem::size_of::<Self>(),
            )
        }
    }
}

#[derive(Clone)]
pub struct RenderDrawCall {
    pub transform_buffer_id: UniformBufferId,
    pub transform_index: usize,
    /// Holds one `DVec3` at element 0 when present; only meaningful for the
    /// RaisingDoor vertex shader.
    pub pre_scale_translation_buffer_id: Option<UniformBufferId>,
    pub vertex_buffer_id: VertexBufferId,
    pub tex_coord_buffer_id: AttributeBufferId,
    pub index_buffer_id: IndexBufferId,
    pub textures: [Option<TextureBinding>; 2],
    pub texture_sampling_types: [TextureSamplingType; 2],
    pub lighting_type: RenderLightingType,
    pub light_percent: f64,
    pub light_ids: [RenderLightId; MAX_LIGHTS_PER_DRAW_CALL],
    pub light_id_count: usize,
    pub vertex_shader_type: VertexShaderType,
    pub pixel_shader_type: PixelShaderType,
    pub pixel_shader_param0: f64,
    pub enable_depth_read: bool,
    pub enable_depth_write: bool,
}

impl RenderDrawCall {
    /// A starting point with sane defaults; callers override what they need.
    pub fn new(
        transform_buffer_id: UniformBufferId,
        vertex_buffer_id: VertexBufferId,
        tex_coord_buffer_id: AttributeBufferId,
        index_buffer_id: IndexBufferId,
        texture_id: ObjectTextureId,
    ) -> Self {
        Self {
            transform_buffer_id,
            transform_index: 0,
            pre_scale_translation_buffer_id: None,
            vertex_buffer_id,
            tex_coord_buffer_id,
            index_buffer_id,
            textures: [Some(TextureBinding::Fixed(texture_id)), None],
            texture_sampling_types: [TextureSamplingType::Default; 2],
            lighting_type: RenderLightingType::PerMesh,
            light_percent: 1.0,
            light_ids: [0; MAX_LIGHTS_PER_DRAW_CALL],
            light_id_count: 0,
            vertex_shader_type: VertexShaderType::Basic,
            pixel_shader_type: PixelShaderType::Opaque,
            pixel_shader_param0: 0.0,
            enable_depth_read: true,
            enable_depth_write: true,
        }
    }
}

/// Per-frame settings supplied alongside the draw call list.
#[derive(Debug, Clone, Copy)]
pub struct RenderFrameSettings {
    pub ambient_percent: f64,
    pub palette_texture_id: ObjectTextureId,
    pub light_table_texture_id: ObjectTextureId,
    pub sky_bg_texture_id: ObjectTextureId,
    pub dithering_mode: DitheringMode,
}
