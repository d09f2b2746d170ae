/// Vertex and pixel shader variants.
/// Pixel shaders operate entirely in palette space: they read 8-bit texels,
/// shade through the light table, and write 8-bit palette indices. The
/// palette-to-color conversion happens after the shader, in the pixel loop.
use glam::{DMat4, DVec3, DVec4};

use crate::rendering::drawcall::TextureSamplingType;
use crate::resources::ObjectTexture;

/// Palette index treated as fully transparent by the alpha-tested shaders.
pub const PALETTE_INDEX_TRANSPARENT: u8 = 0;
/// Range of palette indices that encode a light level instead of a color.
pub const PALETTE_INDEX_LIGHT_LEVEL_LOWEST: u8 = 1;
pub const PALETTE_INDEX_LIGHT_LEVEL_HIGHEST: u8 = 13;
/// Source indices remapped to fixed destination colors by the opacity shader.
pub const PALETTE_INDEX_LIGHT_LEVEL_SRC1: u8 = 14;
pub const PALETTE_INDEX_LIGHT_LEVEL_SRC2: u8 = 15;
pub const PALETTE_INDEX_LIGHT_LEVEL_DST1: u8 = 158;
pub const PALETTE_INDEX_LIGHT_LEVEL_DST2: u8 = 159;
/// Reflective water sentinel recognized by the horizon mirror shader.
pub const PALETTE_INDEX_PUDDLE_EVEN_ROW: u8 = 30;

#[inline]
pub fn is_light_level_texel(texel: u8) -> bool {
    (PALETTE_INDEX_LIGHT_LEVEL_LOWEST..=PALETTE_INDEX_LIGHT_LEVEL_HIGHEST).contains(&texel)
}

// --- Vertex shaders ---

#[inline]
pub fn vertex_shader_basic(model_view_projection: &DMat4, vertex: DVec4) -> DVec4 {
    *model_view_projection * vertex
}

/// Push the vertex by the pre-scale translation, scale toward model-space
/// Y=0, restore, then rotate/translate/project. The scale matrix must stay
/// unfused from the model matrix for this to work.
#[inline]
pub fn vertex_shader_raising_door(
    pre_scale_translation: DVec3,
    scale: &DMat4,
    rotation: &DMat4,
    translation: &DMat4,
    view_projection: &DMat4,
    vertex: DVec4,
) -> DVec4 {
    let offset = DVec4::new(
        pre_scale_translation.x,
        pre_scale_translation.y,
        pre_scale_translation.z,
        0.0,
    );
    let scaled = (*scale * (vertex + offset)) - offset;
    let positioned = *translation * (*rotation * scaled);
    *view_projection * positioned
}

#[inline]
pub fn vertex_shader_entity(model_view_projection: &DMat4, vertex: DVec4) -> DVec4 {
    *model_view_projection * vertex
}

// --- Pixel shader inputs ---

/// Per-pixel interpolated values handed to every pixel shader.
pub struct PixelShaderPerspective {
    pub ndc_z_depth: f64,
    pub texel_percent_x: f64,
    pub texel_percent_y: f64,
}

pub struct ShaderTexture<'a> {
    pub texels: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub width_real: f64,
    pub height_real: f64,
    pub sampling_type: TextureSamplingType,
}

impl<'a> ShaderTexture<'a> {
    pub fn new(texture: &'a ObjectTexture, sampling_type: TextureSamplingType) -> Self {
        Self {
            texels: texture.texels8(),
            width: texture.width,
            height: texture.height,
            width_real: texture.width_real,
            height_real: texture.height_real,
            sampling_type,
        }
    }

    #[inline]
    fn texel_x(&self, percent: f64) -> usize {
        ((percent * self.width_real) as i64).clamp(0, self.width as i64 - 1) as usize
    }

    #[inline]
    fn texel_y(&self, percent: f64) -> usize {
        ((percent * self.height_real) as i64).clamp(0, self.height as i64 - 1) as usize
    }

    /// Clamped nearest-texel sample. The clamps above guarantee the index
    /// is in bounds.
    #[inline]
    fn sample(&self, u_percent: f64, v_percent: f64) -> u8 {
        let x = self.texel_x(u_percent);
        let y = self.texel_y(v_percent);
        unsafe { *self.texels.get_unchecked(x + (y * self.width)) }
    }
}

pub struct ShaderLighting<'a> {
    pub light_table: &'a [u8],
    pub light_level_count: usize,
    pub light_level_count_real: f64,
    pub last_light_level: usize,
    /// Light table row stride; 256 for 8-bit palettes.
    pub texels_per_light_level: usize,
    /// Selected row, set per pixel before the shader runs.
    pub light_level: usize,
}

impl<'a> ShaderLighting<'a> {
    /// The light table texture is one row of shades per light level.
    pub fn new(light_table_texture: &'a ObjectTexture) -> Self {
        let light_level_count = light_table_texture.height;
        Self {
            light_table: light_table_texture.texels8(),
            light_level_count,
            light_level_count_real: light_level_count as f64,
            last_light_level: light_level_count - 1,
            texels_per_light_level: light_table_texture.width,
            light_level: 0,
        }
    }

    #[inline]
    fn shade(&self, texel: u8) -> u8 {
        self.light_table[(texel as usize) + (self.light_level * self.texels_per_light_level)]
    }
}

pub struct ShaderHorizonMirror {
    pub horizon_screen_x: f64,
    pub horizon_screen_y: f64,
    /// Set per pixel before the shader runs.
    pub reflected_pixel_index: usize,
    pub is_reflected_in_frame: bool,
    pub fallback_sky_color: u8,
}

/// Mutable frame state a pixel shader may touch.
pub struct ShaderFrame<'a> {
    pub palette_indices: &'a mut [u8],
    pub depth: &'a mut [f64],
    pub palette: &'a [u32],
    pub x_percent: f64,
    pub y_percent: f64,
    pub pixel_index: usize,
}

#[inline]
fn write_result<const DEPTH_WRITE: bool>(
    frame: &mut ShaderFrame,
    perspective: &PixelShaderPerspective,
    palette_index: u8,
) {
    frame.palette_indices[frame.pixel_index] = palette_index;
    if DEPTH_WRITE {
        frame.depth[frame.pixel_index] = perspective.ndc_z_depth;
    }
}

/// Screen-space V: the repeat-Y sampling mode covers the frame with two
/// vertical tile repetitions.
#[inline]
fn screen_space_v(y_percent: f64) -> f64 {
    let v = y_percent * 2.0;
    if v >= 1.0 {
        v - 1.0
    } else {
        v
    }
}

// --- Pixel shaders ---

#[inline]
pub fn pixel_shader_opaque<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = match texture.sampling_type {
        TextureSamplingType::Default => {
            texture.sample(perspective.texel_percent_x, perspective.texel_percent_y)
        }
        TextureSamplingType::ScreenSpaceRepeatY => {
            texture.sample(frame.x_percent, screen_space_v(frame.y_percent))
        }
    };

    let shaded = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_opaque_with_alpha_test_layer<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    opaque_texture: &ShaderTexture,
    alpha_test_texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let mut texel =
        alpha_test_texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        // The layer is see-through here; the opaque base fills in with
        // screen-space sampling.
        texel = opaque_texture.sample(frame.x_percent, screen_space_v(frame.y_percent));
    }

    let shaded = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_alpha_tested<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let shaded = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_variable_tex_coord_u_min<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    u_min: f64,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let u = (u_min + ((1.0 - u_min) * perspective.texel_percent_x)).clamp(u_min, 1.0);
    let texel = texture.sample(u, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let shaded = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_variable_tex_coord_v_min<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    v_min: f64,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let v = (v_min + ((1.0 - v_min) * perspective.texel_percent_y)).clamp(v_min, 1.0);
    let texel = texture.sample(perspective.texel_percent_x, v);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let shaded = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_palette_index_lookup<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    lookup_texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    // Indirect through the lookup texture, e.g. citizen clothing recolors.
    let replacement = lookup_texture.texels[texel as usize];
    let shaded = lighting.shade(replacement);
    write_result::<DEPTH_WRITE>(frame, perspective, shaded);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_light_level_color<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let result = lighting.shade(texel);
    write_result::<DEPTH_WRITE>(frame, perspective, result);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_light_level_opacity<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let light_table_index = if is_light_level_texel(texel) {
        // The texel is an opacity level; blend the previously written pixel
        // through that light table row.
        let light_level = (texel - PALETTE_INDEX_LIGHT_LEVEL_LOWEST) as usize;
        let prev = frame.palette_indices[frame.pixel_index] as usize;
        prev + (light_level * lighting.texels_per_light_level)
    } else {
        let offset = lighting.light_level * lighting.texels_per_light_level;
        if texel == PALETTE_INDEX_LIGHT_LEVEL_SRC1 {
            offset + PALETTE_INDEX_LIGHT_LEVEL_DST1 as usize
        } else if texel == PALETTE_INDEX_LIGHT_LEVEL_SRC2 {
            offset + PALETTE_INDEX_LIGHT_LEVEL_DST2 as usize
        } else {
            offset + texel as usize
        }
    };

    let result = lighting.light_table[light_table_index];
    write_result::<DEPTH_WRITE>(frame, perspective, result);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_previous_brightness_limit<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    frame: &mut ShaderFrame,
) {
    // Highest value each RGB channel may have for the pixel to count as dark.
    const BRIGHTNESS_LIMIT: u32 = 0x3F;
    const BRIGHTNESS_MASK: u32 = !BRIGHTNESS_LIMIT & 0xFF;
    const BRIGHTNESS_MASK_RGB: u32 =
        (BRIGHTNESS_MASK << 16) | (BRIGHTNESS_MASK << 8) | BRIGHTNESS_MASK;

    let prev_palette_index = frame.palette_indices[frame.pixel_index] as usize;
    let prev_color = frame.palette[prev_palette_index];
    if (prev_color & BRIGHTNESS_MASK_RGB) != 0 {
        return;
    }

    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    // Written raw; this shader bypasses the light table.
    write_result::<DEPTH_WRITE>(frame, perspective, texel);
}

#[inline]
pub fn pixel_shader_alpha_tested_with_horizon_mirror<const DEPTH_WRITE: bool>(
    perspective: &PixelShaderPerspective,
    texture: &ShaderTexture,
    horizon: &ShaderHorizonMirror,
    lighting: &ShaderLighting,
    frame: &mut ShaderFrame,
) {
    let texel = texture.sample(perspective.texel_percent_x, perspective.texel_percent_y);
    if texel == PALETTE_INDEX_TRANSPARENT {
        return;
    }

    let result = if texel == PALETTE_INDEX_PUDDLE_EVEN_ROW {
        if horizon.is_reflected_in_frame {
            frame.palette_indices[horizon.reflected_pixel_index]
        } else {
            horizon.fallback_sky_color
        }
    } else {
        lighting.shade(texel)
    };

    write_result::<DEPTH_WRITE>(frame, perspective, result);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::TexelFormat;

    fn palette_texture(width: usize, height: usize, texels: &[u8]) -> ObjectTexture {
        let mut texture = ObjectTexture::new(width, height, TexelFormat::Palette);
        texture.texels8_mut().copy_from_slice(texels);
        texture
    }

    fn light_table_identity(levels: usize) -> ObjectTexture {
        // Row N maps every index to itself offset by N, so shading effects
        // are observable per level.
        let mut texture = ObjectTexture::new(256, levels, TexelFormat::Palette);
        let texels = texture.texels8_mut();
        for level in 0..levels {
            for index in 0..256 {
                texels[index + (level * 256)] = ((index + level) % 256) as u8;
            }
        }
        texture
    }

    #[test]
    fn light_level_texel_range() {
        assert!(!is_light_level_texel(PALETTE_INDEX_TRANSPARENT));
        assert!(is_light_level_texel(PALETTE_INDEX_LIGHT_LEVEL_LOWEST));
        assert!(is_light_level_texel(PALETTE_INDEX_LIGHT_LEVEL_HIGHEST));
        assert!(!is_light_level_texel(PALETTE_INDEX_LIGHT_LEVEL_SRC1));
    }

    #[test]
    fn raising_door_half_open_halves_height() {
        use glam::DMat4;

        // A door vertex at model-space Y=1 with the ceiling at Y=2. The
        // pre-scale translation drops the ceiling to Y=0 so scaling pulls
        // the door upward into it.
        let pre_scale = DVec3::new(0.0, -2.0, 0.0);
        let scale = DMat4::from_scale(DVec3::new(1.0, 0.5, 1.0));
        let identity = DMat4::IDENTITY;
        let vertex = DVec4::new(0.0, 1.0, 0.0, 1.0);

        let result = vertex_shader_raising_door(
            pre_scale, &scale, &identity, &identity, &identity, vertex,
        );

        // (1 - 2) * 0.5 + 2 = 1.5
        assert!((result.y - 1.5).abs() < 1e-12, "got y={}", result.y);
        assert_eq!(result.w, 1.0);
    }

    #[test]
    fn alpha_tested_skips_transparent_texels() {
        let texture = palette_texture(2, 1, &[PALETTE_INDEX_TRANSPARENT, 77]);
        let shader_texture = ShaderTexture::new(&texture, TextureSamplingType::Default);
        let light_table = light_table_identity(2);
        let lighting = ShaderLighting::new(&light_table);
        let palette = [0u32; 256];

        let mut palette_indices = vec![200u8; 1];
        let mut depth = vec![0.5f64; 1];
        let mut frame = ShaderFrame {
            palette_indices: &mut palette_indices,
            depth: &mut depth,
            palette: &palette,
            x_percent: 0.5,
            y_percent: 0.5,
            pixel_index: 0,
        };

        // Left texel: transparent, nothing changes.
        let perspective = PixelShaderPerspective {
            ndc_z_depth: 0.25,
            texel_percent_x: 0.1,
            texel_percent_y: 0.5,
        };
        pixel_shader_alpha_tested::<true>(&perspective, &shader_texture, &lighting, &mut frame);
        assert_eq!(frame.palette_indices[0], 200);
        assert_eq!(frame.depth[0], 0.5);

        // Right texel: opaque, shaded through the light table and written.
        let perspective = PixelShaderPerspective {
            ndc_z_depth: 0.25,
            texel_percent_x: 0.9,
            texel_percent_y: 0.5,
        };
        pixel_shader_alpha_tested::<true>(&perspective, &shader_texture, &lighting, &mut frame);
        assert_eq!(frame.palette_indices[0], 77);
        assert_eq!(frame.depth[0], 0.25);
    }

    #[test]
    fn brightness_limit_only_draws_over_dark_pixels() {
        let texture = palette_texture(1, 1, &[42]);
        let shader_texture = ShaderTexture::new(&texture, TextureSamplingType::Default);

        let mut palette = [0u32; 256];
        palette[0] = 0x00202020; // dark
        palette[1] = 0x00FFFFFF; // bright

        let perspective = PixelShaderPerspective {
            ndc_z_depth: 0.1,
            texel_percent_x: 0.5,
            texel_percent_y: 0.5,
        };

        let mut palette_indices = vec![1u8];
        let mut depth = vec![1.0f64];
        let mut frame = ShaderFrame {
            palette_indices: &mut palette_indices,
            depth: &mut depth,
            palette: &palette,
            x_percent: 0.5,
            y_percent: 0.5,
            pixel_index: 0,
        };
        pixel_shader_alpha_tested_with_previous_brightness_limit::<false>(
            &perspective,
            &shader_texture,
            &mut frame,
        );
        assert_eq!(frame.palette_indices[0], 1, "bright pixel must be kept");

        frame.palette_indices[0] = 0;
        pixel_shader_alpha_tested_with_previous_brightness_limit::<false>(
            &perspective,
            &shader_texture,
            &mut frame,
        );
        assert_eq!(frame.palette_indices[0], 42, "dark pixel is overdrawn");
    }

    #[test]
    fn light_level_opacity_blends_previous_pixel() {
        let opacity_level = 3u8;
        let texture = palette_texture(
            1,
            1,
            &[PALETTE_INDEX_LIGHT_LEVEL_LOWEST + opacity_level],
        );
        let shader_texture = ShaderTexture::new(&texture, TextureSamplingType::Default);
        let light_table = light_table_identity(14);
        let lighting = ShaderLighting::new(&light_table);
        let palette = [0u32; 256];

        let prev_index = 100u8;
        let mut palette_indices = vec![prev_index];
        let mut depth = vec![1.0f64];
        let mut frame = ShaderFrame {
            palette_indices: &mut palette_indices,
            depth: &mut depth,
            palette: &palette,
            x_percent: 0.5,
            y_percent: 0.5,
            pixel_index: 0,
        };

        let perspective = PixelShaderPerspective {
            ndc_z_depth: 0.1,
            texel_percent_x: 0.5,
            texel_percent_y: 0.5,
        };
        pixel_shader_alpha_tested_with_light_level_opacity::<false>(
            &perspective,
            &shader_texture,
            &lighting,
            &mut frame,
        );

        // Identity-plus-level table: result = prev + opacity level.
        assert_eq!(
            frame.palette_indices[0],
            prev_index + opacity_level,
            "ghost blend should index the light table by the previous pixel"
        );
    }
}
