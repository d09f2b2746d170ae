/// Triangle setup and the per-pixel loop: perspective divide, screen
/// mapping, back-face culling, half-plane coverage, depth testing,
/// perspective-correct attributes, per-pixel lighting, and pixel shader
/// dispatch. All math stays in f64 to match the rest of the pipeline.
use glam::{DMat4, DVec2, DVec3, DVec4};

use crate::count_call;
#[allow(unused_imports)]
use crate::perf::FUNCTION_COUNTERS;
use crate::rendering::drawcall::{DitheringMode, PixelShaderType, RenderLightingType};
use crate::rendering::framebuffer::DitherBuffer;
use crate::rendering::pipeline::{MeshProcessCache, PipelineTriangle};
use crate::rendering::shaders::{
    self, PixelShaderPerspective, ShaderFrame, ShaderHorizonMirror, ShaderLighting, ShaderTexture,
};
use crate::resources::ObjectTexture;

/// UV clamp ceiling; keeps `percent * dimension` strictly below the
/// dimension so the nearest-texel index never reaches it.
const JUST_BELOW_ONE: f64 = 1.0 - 1.0e-10;

/// One screen-bounded, front-facing triangle with everything the pixel loop
/// reads, precomputed once at setup.
#[derive(Debug, Clone, Copy)]
pub struct RasterizerTriangle {
    pub w0_recip: f64,
    pub w1_recip: f64,
    pub w2_recip: f64,
    pub ndc_z0: f64,
    pub ndc_z1: f64,
    pub ndc_z2: f64,
    pub screen0: DVec2,
    pub screen1: DVec2,
    pub screen2: DVec2,
    /// Inward edge normals for the coverage test.
    pub normal01: DVec2,
    pub normal12: DVec2,
    pub normal20: DVec2,
    /// Barycentric basis: screen1 - screen0 and screen2 - screen0, with the
    /// Cramer denominator inverted once.
    pub bary_a: DVec2,
    pub bary_b: DVec2,
    pub dot_aa: f64,
    pub dot_ab: f64,
    pub dot_bb: f64,
    pub denom_recip: f64,
    pub uv0_over_w: DVec2,
    pub uv1_over_w: DVec2,
    pub uv2_over_w: DVec2,
    pub x_start: usize,
    pub x_end: usize,
    pub y_start: usize,
    pub y_end: usize,
}

#[inline]
fn ndc_to_screen(ndc: DVec3, width_real: f64, height_real: f64) -> DVec2 {
    DVec2::new(
        (0.5 + (ndc.x * 0.5)) * width_real,
        (0.5 - (ndc.y * 0.5)) * height_real,
    )
}

/// Half-open pixel bound for one screen axis: the first pixel whose center
/// can be covered, and one past the last.
#[inline]
fn pixel_bounds(min_coord: f64, max_coord: f64, dimension: usize) -> (usize, usize) {
    let start = (min_coord - 0.5).ceil().max(0.0) as usize;
    let end = ((max_coord + 0.5).floor().max(0.0) as usize).min(dimension);
    (start.min(dimension), end)
}

/// Perspective-divide, screen-map, cull, and bound each clipped triangle.
/// Survivors land in `out` ready for the pixel loop.
pub fn process_triangle_setup(
    clipped: &[PipelineTriangle],
    frame_width: usize,
    frame_height: usize,
    out: &mut Vec<RasterizerTriangle>,
) {
    let width_real = frame_width as f64;
    let height_real = frame_height as f64;

    for triangle in clipped {
        count_call!(FUNCTION_COUNTERS.raster_triangle_calls);

        let clip0 = triangle.v[0];
        let clip1 = triangle.v[1];
        let clip2 = triangle.v[2];

        // Clipping guarantees w > 0 for every surviving vertex.
        let w0_recip = 1.0 / clip0.w;
        let w1_recip = 1.0 / clip1.w;
        let w2_recip = 1.0 / clip2.w;
        let ndc0 = DVec3::new(clip0.x, clip0.y, clip0.z) * w0_recip;
        let ndc1 = DVec3::new(clip1.x, clip1.y, clip1.z) * w1_recip;
        let ndc2 = DVec3::new(clip2.x, clip2.y, clip2.z) * w2_recip;

        let screen0 = ndc_to_screen(ndc0, width_real, height_real);
        let screen1 = ndc_to_screen(ndc1, width_real, height_real);
        let screen2 = ndc_to_screen(ndc2, width_real, height_real);

        // Twice the signed area as the sum of the edge cross products.
        // Back faces and degenerate slivers both fail the strict test.
        let double_area = (screen0.x * screen1.y - screen1.x * screen0.y)
            + (screen1.x * screen2.y - screen2.x * screen1.y)
            + (screen2.x * screen0.y - screen0.x * screen2.y);
        if !(double_area > 0.0) {
            count_call!(FUNCTION_COUNTERS.raster_triangle_culled);
            continue;
        }

        let min_x = screen0.x.min(screen1.x).min(screen2.x);
        let max_x = screen0.x.max(screen1.x).max(screen2.x);
        let min_y = screen0.y.min(screen1.y).min(screen2.y);
        let max_y = screen0.y.max(screen1.y).max(screen2.y);
        let (x_start, x_end) = pixel_bounds(min_x, max_x, frame_width);
        let (y_start, y_end) = pixel_bounds(min_y, max_y, frame_height);
        if (x_start >= x_end) || (y_start >= y_end) {
            count_call!(FUNCTION_COUNTERS.raster_triangle_offscreen);
            continue;
        }

        let edge01 = screen1 - screen0;
        let edge12 = screen2 - screen1;
        let edge20 = screen0 - screen2;

        let bary_a = screen1 - screen0;
        let bary_b = screen2 - screen0;
        let dot_aa = bary_a.dot(bary_a);
        let dot_ab = bary_a.dot(bary_b);
        let dot_bb = bary_b.dot(bary_b);
        let denom = (dot_aa * dot_bb) - (dot_ab * dot_ab);
        if denom == 0.0 {
            count_call!(FUNCTION_COUNTERS.raster_triangle_culled);
            continue;
        }

        let uv0 = triangle.uv[0];
        let uv1 = triangle.uv[1];
        let uv2 = triangle.uv[2];

        out.push(RasterizerTriangle {
            w0_recip,
            w1_recip,
            w2_recip,
            ndc_z0: ndc0.z,
            ndc_z1: ndc1.z,
            ndc_z2: ndc2.z,
            screen0,
            screen1,
            screen2,
            normal01: edge01.perp(),
            normal12: edge12.perp(),
            normal20: edge20.perp(),
            bary_a,
            bary_b,
            dot_aa,
            dot_ab,
            dot_bb,
            denom_recip: 1.0 / denom,
            uv0_over_w: uv0 * w0_recip,
            uv1_over_w: uv1 * w1_recip,
            uv2_over_w: uv2 * w2_recip,
            x_start,
            x_end,
            y_start,
            y_end,
        });
    }
}

/// Frame-wide buffers and camera state the pixel loop writes through.
pub struct RasterizerFrame<'a> {
    pub width: usize,
    pub height: usize,
    pub width_real_recip: f64,
    pub height_real_recip: f64,
    pub palette_indices: &'a mut [u8],
    pub depth: &'a mut [f64],
    pub colors: &'a mut [u32],
    pub palette: &'a [u32],
    pub dither: &'a DitherBuffer,
    pub dithering_mode: DitheringMode,
    pub inverse_view: DMat4,
    pub inverse_projection: DMat4,
    pub ambient_percent: f64,
    pub horizon_screen: DVec2,
    pub fallback_sky_color: u8,
}

/// Per-mesh depth/color write totals, accumulated into the frame context by
/// the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterizeTotals {
    pub depth_test_count: usize,
    pub color_write_count: usize,
}

pub fn rasterize_mesh(
    mesh: &MeshProcessCache,
    triangles: &[RasterizerTriangle],
    texture0: ShaderTexture,
    texture1: Option<ShaderTexture>,
    light_table_texture: &ObjectTexture,
    frame: &mut RasterizerFrame,
) -> RasterizeTotals {
    match (mesh.enable_depth_read, mesh.enable_depth_write) {
        (true, true) => rasterize_mesh_internal::<true, true>(
            mesh,
            triangles,
            texture0,
            texture1,
            light_table_texture,
            frame,
        ),
        (true, false) => rasterize_mesh_internal::<true, false>(
            mesh,
            triangles,
            texture0,
            texture1,
            light_table_texture,
            frame,
        ),
        (false, true) => rasterize_mesh_internal::<false, true>(
            mesh,
            triangles,
            texture0,
            texture1,
            light_table_texture,
            frame,
        ),
        (false, false) => rasterize_mesh_internal::<false, false>(
            mesh,
            triangles,
            texture0,
            texture1,
            light_table_texture,
            frame,
        ),
    }
}

fn rasterize_mesh_internal<const DEPTH_READ: bool, const DEPTH_WRITE: bool>(
    mesh: &MeshProcessCache,
    triangles: &[RasterizerTriangle],
    texture0: ShaderTexture,
    texture1: Option<ShaderTexture>,
    light_table_texture: &ObjectTexture,
    frame: &mut RasterizerFrame,
) -> RasterizeTotals {
    let mut totals = RasterizeTotals::default();
    let mut lighting = ShaderLighting::new(light_table_texture);
    let pixel_count = frame.width * frame.height;

    // PerMesh lighting resolves to a single light table row for the whole
    // mesh; no dithering applies.
    let per_mesh_light_level = {
        let light_level_real = mesh.mesh_light_percent * lighting.light_level_count_real;
        let clamped = (light_level_real as i64).clamp(0, lighting.last_light_level as i64) as usize;
        lighting.last_light_level - clamped
    };

    let mut horizon = ShaderHorizonMirror {
        horizon_screen_x: frame.horizon_screen.x,
        horizon_screen_y: frame.horizon_screen.y,
        reflected_pixel_index: 0,
        is_reflected_in_frame: false,
        fallback_sky_color: frame.fallback_sky_color,
    };
    let is_horizon_mirror = mesh.pixel_shader_type == PixelShaderType::AlphaTestedWithHorizonMirror;
    let is_per_pixel_lighting = mesh.lighting_type == RenderLightingType::PerPixel;

    for triangle in triangles {
        for y in triangle.y_start..triangle.y_end {
            let pixel_center_y = (y as f64) + 0.5;
            let y_percent = pixel_center_y * frame.height_real_recip;
            let row_offset = y * frame.width;

            for x in triangle.x_start..triangle.x_end {
                count_call!(FUNCTION_COUNTERS.pixel_coverage_tests);
                let pixel_center_x = (x as f64) + 0.5;
                let pixel_center = DVec2::new(pixel_center_x, pixel_center_y);

                // Coverage: pixel center on the inner side of all three
                // edge half-planes.
                if (pixel_center - triangle.screen0).dot(triangle.normal01) < 0.0 {
                    continue;
                }
                if (pixel_center - triangle.screen1).dot(triangle.normal12) < 0.0 {
                    continue;
                }
                if (pixel_center - triangle.screen2).dot(triangle.normal20) < 0.0 {
                    continue;
                }

                // Barycentric weights via Cramer's rule.
                let c = pixel_center - triangle.screen0;
                let dot_ca = c.dot(triangle.bary_a);
                let dot_cb = c.dot(triangle.bary_b);
                let weight1 = ((triangle.dot_bb * dot_ca) - (triangle.dot_ab * dot_cb))
                    * triangle.denom_recip;
                let weight2 = ((triangle.dot_aa * dot_cb) - (triangle.dot_ab * dot_ca))
                    * triangle.denom_recip;
                let weight0 = 1.0 - weight1 - weight2;

                let ndc_z_depth = (triangle.ndc_z0 * weight0)
                    + (triangle.ndc_z1 * weight1)
                    + (triangle.ndc_z2 * weight2);

                let pixel_index = x + row_offset;
                if DEPTH_READ {
                    totals.depth_test_count += 1;
                    if ndc_z_depth >= frame.depth[pixel_index] {
                        count_call!(FUNCTION_COUNTERS.depth_test_failed);
                        continue;
                    }
                    count_call!(FUNCTION_COUNTERS.depth_test_passed);
                }

                // Perspective-correct texture coordinates.
                let w_recip_interp = (triangle.w0_recip * weight0)
                    + (triangle.w1_recip * weight1)
                    + (triangle.w2_recip * weight2);
                let w_interp = 1.0 / w_recip_interp;
                let uv_over_w = (triangle.uv0_over_w * weight0)
                    + (triangle.uv1_over_w * weight1)
                    + (triangle.uv2_over_w * weight2);
                let texel_percent_x = (uv_over_w.x * w_interp).clamp(0.0, JUST_BELOW_ONE);
                let texel_percent_y = (uv_over_w.y * w_interp).clamp(0.0, JUST_BELOW_ONE);

                let x_percent = pixel_center_x * frame.width_real_recip;

                lighting.light_level = if is_per_pixel_lighting {
                    // Reconstruct the world point through the inverse
                    // projection and view transforms.
                    let ndc_x = (x_percent * 2.0) - 1.0;
                    let ndc_y = 1.0 - (y_percent * 2.0);
                    let clip_point = DVec4::new(ndc_x, ndc_y, ndc_z_depth, 1.0) * w_interp;
                    let view_point = frame.inverse_projection * clip_point;
                    let world_point4 = frame.inverse_view * view_point;
                    let world_point = DVec3::new(world_point4.x, world_point4.y, world_point4.z);

                    let mut light_intensity = frame.ambient_percent;
                    for light in mesh.lights.iter().take(mesh.light_count) {
                        light_intensity += light.intensity_at(world_point);
                        if light_intensity >= 1.0 {
                            light_intensity = 1.0;
                            break;
                        }
                    }

                    let light_level_real = light_intensity * lighting.light_level_count_real;
                    let clamped = (light_level_real as i64)
                        .clamp(0, lighting.last_light_level as i64)
                        as usize;
                    let mut light_level = lighting.last_light_level - clamped;

                    // Fully lit pixels never dither.
                    if light_intensity < 1.0 {
                        let should_dither = match frame.dithering_mode {
                            DitheringMode::None => false,
                            DitheringMode::Classic => {
                                frame.dither.is_set(pixel_index, 0, pixel_count)
                            }
                            DitheringMode::Modern => {
                                let mask_index =
                                    ((4.0 * light_level_real.fract()) as i64).clamp(0, 3) as usize;
                                frame.dither.is_set(pixel_index, mask_index, pixel_count)
                            }
                        };
                        if should_dither {
                            light_level = (light_level + 1).min(lighting.last_light_level);
                        }
                    }

                    light_level
                } else {
                    per_mesh_light_level
                };

                if is_horizon_mirror {
                    // Mirror the pixel across the horizon row.
                    let reflected_y =
                        horizon.horizon_screen_y + (horizon.horizon_screen_y - pixel_center_y);
                    let reflected_x = pixel_center_x;
                    let in_frame = (reflected_x >= 0.0)
                        && (reflected_x < frame.width as f64)
                        && (reflected_y >= 0.0)
                        && (reflected_y < frame.height as f64);
                    horizon.is_reflected_in_frame = in_frame;
                    horizon.reflected_pixel_index = if in_frame {
                        (reflected_x as usize) + ((reflected_y as usize) * frame.width)
                    } else {
                        0
                    };
                }

                let perspective = PixelShaderPerspective {
                    ndc_z_depth,
                    texel_percent_x,
                    texel_percent_y,
                };
                let mut shader_frame = ShaderFrame {
                    palette_indices: &mut *frame.palette_indices,
                    depth: &mut *frame.depth,
                    palette: frame.palette,
                    x_percent,
                    y_percent,
                    pixel_index,
                };

                match mesh.pixel_shader_type {
                    PixelShaderType::Opaque => shaders::pixel_shader_opaque::<DEPTH_WRITE>(
                        &perspective,
                        &texture0,
                        &lighting,
                        &mut shader_frame,
                    ),
                    PixelShaderType::OpaqueWithAlphaTestLayer => {
                        if let Some(layer) = texture1.as_ref() {
                            shaders::pixel_shader_opaque_with_alpha_test_layer::<DEPTH_WRITE>(
                                &perspective,
                                &texture0,
                                layer,
                                &lighting,
                                &mut shader_frame,
                            );
                        }
                    }
                    PixelShaderType::AlphaTested => {
                        shaders::pixel_shader_alpha_tested::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithVariableTexCoordUMin => {
                        shaders::pixel_shader_alpha_tested_with_variable_tex_coord_u_min::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            mesh.pixel_shader_param0,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithVariableTexCoordVMin => {
                        shaders::pixel_shader_alpha_tested_with_variable_tex_coord_v_min::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            mesh.pixel_shader_param0,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithPaletteIndexLookup => {
                        if let Some(lookup) = texture1.as_ref() {
                            shaders::pixel_shader_alpha_tested_with_palette_index_lookup::<DEPTH_WRITE>(
                                &perspective,
                                &texture0,
                                lookup,
                                &lighting,
                                &mut shader_frame,
                            );
                        }
                    }
                    PixelShaderType::AlphaTestedWithLightLevelColor => {
                        shaders::pixel_shader_alpha_tested_with_light_level_color::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithLightLevelOpacity => {
                        shaders::pixel_shader_alpha_tested_with_light_level_opacity::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithPreviousBrightnessLimit => {
                        shaders::pixel_shader_alpha_tested_with_previous_brightness_limit::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            &mut shader_frame,
                        )
                    }
                    PixelShaderType::AlphaTestedWithHorizonMirror => {
                        shaders::pixel_shader_alpha_tested_with_horizon_mirror::<DEPTH_WRITE>(
                            &perspective,
                            &texture0,
                            &horizon,
                            &lighting,
                            &mut shader_frame,
                        )
                    }
                }

                // Color conversion runs for every covered pixel whether or
                // not the shader wrote, so alpha-tested holes still refresh
                // from the current palette index.
                let palette_index = frame.palette_indices[pixel_index] as usize;
                frame.colors[pixel_index] = frame.palette[palette_index];
                totals.color_write_count += 1;
            }
        }
    }

    totals
}
