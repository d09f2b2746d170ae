/// End-to-end frame rendering tests: full submissions through batching,
/// shading, clipping, rasterization, and palette-to-color conversion.
use glam::DVec3;
use palette_raster::*;

const FRAME_DIM: usize = 64;
const LIGHT_LEVEL_COUNT: usize = 13;

fn gray(index: u8) -> u32 {
    let g = index as u32;
    (g << 16) | (g << 8) | g
}

struct Scene {
    renderer: Renderer,
    settings: RenderFrameSettings,
    transform_buffer_id: UniformBufferId,
}

/// Renderer with a grayscale ramp palette, an identity light table (one
/// level, no shading), a sky texture, and one identity transform.
fn scene() -> Scene {
    scene_with_light_table(1)
}

fn scene_with_light_table(level_count: usize) -> Scene {
    let mut renderer = Renderer::new(FRAME_DIM, FRAME_DIM, DitheringMode::None);

    let palette_texture_id = renderer
        .try_create_object_texture(256, 1, TexelFormat::TrueColor)
        .unwrap();
    let palette = renderer.lock_object_texture(palette_texture_id).unwrap();
    for (index, texel) in palette.texels32_mut().iter_mut().enumerate() {
        *texel = gray(index as u8);
    }

    let light_table_texture_id = renderer
        .try_create_object_texture(256, level_count, TexelFormat::Palette)
        .unwrap();
    let light_table = renderer.lock_object_texture(light_table_texture_id).unwrap();
    let texels = light_table.texels8_mut();
    let last_level = level_count - 1;
    for level in 0..level_count {
        for index in 0..256 {
            texels[index + (level * 256)] = if last_level == 0 {
                index as u8
            } else {
                ((index * (last_level - level)) / last_level) as u8
            };
        }
    }

    let sky_bg_texture_id = renderer
        .try_create_object_texture(1, 1, TexelFormat::Palette)
        .unwrap();
    renderer
        .lock_object_texture(sky_bg_texture_id)
        .unwrap()
        .texels8_mut()[0] = 150;

    let transform_buffer_id = renderer
        .try_create_uniform_buffer(
            1,
            std::mem::size_of::<RenderTransform>(),
            std::mem::align_of::<RenderTransform>(),
        )
        .unwrap();
    renderer.populate_uniform_buffer(transform_buffer_id, RenderTransform::identity().as_bytes());

    let settings = RenderFrameSettings {
        ambient_percent: 1.0,
        palette_texture_id,
        light_table_texture_id,
        sky_bg_texture_id,
        dithering_mode: DitheringMode::None,
    };

    Scene {
        renderer,
        settings,
        transform_buffer_id,
    }
}

/// Screen-facing quad in the XY plane at depth `z`, wound toward +Z.
/// UVs run left-to-right and bottom-to-top.
fn quad(renderer: &mut Renderer, half_extent: f64, z: f64) -> (VertexBufferId, AttributeBufferId, IndexBufferId) {
    let h = half_extent;
    let positions = [
        -h, -h, z, //
        h, -h, z, //
        h, h, z, //
        -h, h, z,
    ];
    let tex_coords = [
        0.0, 0.0, //
        1.0, 0.0, //
        1.0, 1.0, //
        0.0, 1.0,
    ];
    let indices = [0i32, 2, 1, 0, 3, 2];

    let vb = renderer.try_create_vertex_buffer(4, 3).unwrap();
    let ab = renderer.try_create_attribute_buffer(4, 2).unwrap();
    let ib = renderer.try_create_index_buffer(6).unwrap();
    renderer.populate_vertex_buffer(vb, &positions);
    renderer.populate_attribute_buffer(ab, &tex_coords);
    renderer.populate_index_buffer(ib, &indices);
    (vb, ab, ib)
}

fn solid_texture(renderer: &mut Renderer, index: u8) -> ObjectTextureId {
    let id = renderer
        .try_create_object_texture(1, 1, TexelFormat::Palette)
        .unwrap();
    renderer.lock_object_texture(id).unwrap().texels8_mut()[0] = index;
    id
}

fn camera_at_z(z: f64) -> RenderCamera {
    RenderCamera::new(
        DVec3::new(0.0, 0.0, z),
        DVec3::NEG_Z,
        90.0f64.to_radians(),
        1.0,
        0.1,
        100.0,
    )
}

fn pixel(colors: &[u32], x: usize, y: usize) -> u32 {
    colors[x + (y * FRAME_DIM)]
}

#[test]
fn full_screen_quad_shows_texture_quadrants() {
    let mut scene = scene();
    let (vb, ab, ib) = quad(&mut scene.renderer, 2.0, 0.0);

    // 2x2 checkerboard: row 0 is the bottom of the quad (v = 0).
    let texture_id = scene
        .renderer
        .try_create_object_texture(2, 2, TexelFormat::Palette)
        .unwrap();
    scene
        .renderer
        .lock_object_texture(texture_id)
        .unwrap()
        .texels8_mut()
        .copy_from_slice(&[10, 60, 140, 200]);

    let draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture_id);
    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);

    let quarter = FRAME_DIM / 4;
    let three_quarters = 3 * FRAME_DIM / 4;
    assert_eq!(pixel(&colors, quarter, three_quarters), gray(10), "bottom-left quadrant");
    assert_eq!(pixel(&colors, three_quarters, three_quarters), gray(60), "bottom-right quadrant");
    assert_eq!(pixel(&colors, quarter, quarter), gray(140), "top-left quadrant");
    assert_eq!(pixel(&colors, three_quarters, quarter), gray(200), "top-right quadrant");
}

#[test]
fn depth_test_keeps_the_nearest_surface() {
    let mut scene = scene();
    let (far_vb, ab, ib) = quad(&mut scene.renderer, 4.0, -1.0);
    let (near_vb, _, _) = quad(&mut scene.renderer, 4.0, 0.0);
    let far_texture = solid_texture(&mut scene.renderer, 50);
    let near_texture = solid_texture(&mut scene.renderer, 99);

    let far_call = RenderDrawCall::new(scene.transform_buffer_id, far_vb, ab, ib, far_texture);
    let near_call = RenderDrawCall::new(scene.transform_buffer_id, near_vb, ab, ib, near_texture);

    let camera = camera_at_z(1.0);
    let center = FRAME_DIM / 2;

    // Near drawn last wins by painting over.
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene.renderer.submit_frame(
        &camera,
        &[far_call.clone(), near_call.clone()],
        &scene.settings,
        &mut colors,
    );
    assert_eq!(pixel(&colors, center, center), gray(99));

    // Near drawn first still wins through the depth test.
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[near_call, far_call], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, center, center), gray(99));
}

#[test]
fn alpha_tested_transparent_texels_keep_the_background() {
    let mut scene = scene();
    let (far_vb, ab, ib) = quad(&mut scene.renderer, 4.0, -1.0);
    let (near_vb, _, _) = quad(&mut scene.renderer, 4.0, 0.0);
    let far_texture = solid_texture(&mut scene.renderer, 50);
    let hole_texture = solid_texture(&mut scene.renderer, 0);

    let far_call = RenderDrawCall::new(scene.transform_buffer_id, far_vb, ab, ib, far_texture);
    let mut hole_call =
        RenderDrawCall::new(scene.transform_buffer_id, near_vb, ab, ib, hole_texture);
    hole_call.pixel_shader_type = PixelShaderType::AlphaTested;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[far_call, hole_call], &scene.settings, &mut colors);

    let center = FRAME_DIM / 2;
    assert_eq!(
        pixel(&colors, center, center),
        gray(50),
        "transparent texel must not overwrite the surface behind it"
    );
}

#[test]
fn per_pixel_lighting_darkens_unlit_surfaces() {
    let mut scene = scene_with_light_table(LIGHT_LEVEL_COUNT);
    scene.settings.ambient_percent = 0.0;

    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let texture = solid_texture(&mut scene.renderer, 200);

    let mut draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);
    draw_call.lighting_type = RenderLightingType::PerPixel;

    let camera = camera_at_z(1.0);
    let center = FRAME_DIM / 2;

    // No lights, no ambient: the darkest light table row maps to black.
    let mut colors = vec![0xFFFF_FFFFu32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call.clone()], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, center, center), gray(0));

    // A light engulfing the quad restores full brightness.
    let light_id = scene.renderer.try_create_light().unwrap();
    scene.renderer.set_light_radius(light_id, 10.0, 20.0);
    scene
        .renderer
        .set_light_position(light_id, DVec3::new(0.0, 0.0, 0.0));
    draw_call.light_ids[0] = light_id;
    draw_call.light_id_count = 1;

    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, center, center), gray(200));
}

#[test]
fn per_mesh_light_percent_selects_a_dimmer_row() {
    let mut scene = scene_with_light_table(LIGHT_LEVEL_COUNT);
    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let texture = solid_texture(&mut scene.renderer, 240);

    let mut draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);
    draw_call.light_percent = 0.5;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);

    let center = FRAME_DIM / 2;
    // light level real = 0.5 * 13 = 6.5 -> row 12 - 6 = 6; 240 * 6 / 12.
    assert_eq!(pixel(&colors, center, center), gray(120));
}

#[test]
fn screen_space_repeat_y_samples_by_screen_position() {
    let mut scene = scene();
    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);

    // Two rows: 30 on top of the tile, 70 below.
    let texture_id = scene
        .renderer
        .try_create_object_texture(1, 2, TexelFormat::Palette)
        .unwrap();
    scene
        .renderer
        .lock_object_texture(texture_id)
        .unwrap()
        .texels8_mut()
        .copy_from_slice(&[30, 70]);

    let mut draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture_id);
    draw_call.texture_sampling_types[0] = TextureSamplingType::ScreenSpaceRepeatY;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);

    let center = FRAME_DIM / 2;
    // y percent 0.26 -> tile v 0.52 -> second row; 0.63 wraps to 0.26 -> first.
    assert_eq!(pixel(&colors, center, 16), gray(70));
    assert_eq!(pixel(&colors, center, 40), gray(30));
}

#[test]
fn quad_straddling_the_near_plane_still_renders() {
    let mut scene = scene();
    let texture = solid_texture(&mut scene.renderer, 50);

    // Tilted wall: bottom edge well in front, top edge behind the camera.
    let positions = [
        -4.0, -0.5, 0.0, //
        4.0, -0.5, 0.0, //
        4.0, 1.0, 8.0, //
        -4.0, 1.0, 8.0,
    ];
    let tex_coords = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let vb = scene.renderer.try_create_vertex_buffer(4, 3).unwrap();
    let ab = scene.renderer.try_create_attribute_buffer(4, 2).unwrap();
    scene.renderer.populate_vertex_buffer(vb, &positions);
    scene.renderer.populate_attribute_buffer(ab, &tex_coords);

    // Both windings so the visible part is front-facing regardless of how
    // the tilt projects.
    let ib_a = scene.renderer.try_create_index_buffer(6).unwrap();
    scene.renderer.populate_index_buffer(ib_a, &[0, 2, 1, 0, 3, 2]);
    let ib_b = scene.renderer.try_create_index_buffer(6).unwrap();
    scene.renderer.populate_index_buffer(ib_b, &[0, 1, 2, 0, 2, 3]);

    let call_a = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib_a, texture);
    let mut call_b = call_a.clone();
    call_b.index_buffer_id = ib_b;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[call_a, call_b], &scene.settings, &mut colors);

    assert!(
        colors.iter().any(|&c| c == gray(50)),
        "the in-front portion of the wall must produce pixels"
    );
}

#[test]
fn profiler_reports_draw_calls_and_triangles() {
    let mut scene = scene();
    // Small enough to stay inside the frustum, so clipping never splits it.
    let (vb, ab, ib) = quad(&mut scene.renderer, 0.5, 0.0);
    let texture = solid_texture(&mut scene.renderer, 50);
    let draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);

    let stats = scene.renderer.profiler_data();
    assert_eq!(stats.draw_call_count, 1);
    assert_eq!(stats.presented_triangle_count, 2, "a quad presents two triangles");
    assert!(stats.depth_test_count > 0);
    assert!(stats.color_write_count > 0);
}

#[test]
fn color_buffer_is_cleared_each_frame() {
    let mut scene = scene();
    let camera = camera_at_z(1.0);

    // Stale colors from a prior frame must not survive an empty submission.
    let mut colors = vec![0xDEAD_BEEFu32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[], &scene.settings, &mut colors);
    assert!(
        colors.iter().all(|&c| c == 0),
        "every pixel resets to palette entry 0 at frame start"
    );

    // With geometry, uncovered pixels still reset while covered ones shade.
    let (vb, ab, ib) = quad(&mut scene.renderer, 0.5, 0.0);
    let texture = solid_texture(&mut scene.renderer, 50);
    let draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);

    let mut colors = vec![0xDEAD_BEEFu32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);
    let center = FRAME_DIM / 2;
    assert_eq!(pixel(&colors, center, center), gray(50));
    assert_eq!(pixel(&colors, 2, 2), 0, "pixel outside the quad is background");
}

#[test]
fn classic_dithering_alternates_adjacent_light_levels() {
    let mut scene = scene_with_light_table(LIGHT_LEVEL_COUNT);
    scene.settings.ambient_percent = 0.5;
    scene.settings.dithering_mode = DitheringMode::Classic;

    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let texture = solid_texture(&mut scene.renderer, 240);
    let mut draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);
    draw_call.lighting_type = RenderLightingType::PerPixel;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call.clone()], &scene.settings, &mut colors);

    // Intensity 0.5 -> level real 6.5 -> row 6 (240 * 6 / 12 = 120); the
    // checkerboard drops even-sum pixels one row darker (240 * 5 / 12 = 100).
    assert_eq!(pixel(&colors, 32, 32), gray(100), "checkerboard pixel dithers darker");
    assert_eq!(pixel(&colors, 33, 32), gray(120), "neighbor keeps its level");

    // Fully lit pixels never dither.
    scene.settings.ambient_percent = 1.0;
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, 32, 32), gray(240));
    assert_eq!(pixel(&colors, 33, 32), gray(240));
}

#[test]
fn modern_dithering_picks_the_mask_from_the_fractional_level() {
    let mut scene = scene_with_light_table(LIGHT_LEVEL_COUNT);
    scene.settings.ambient_percent = 0.5;
    scene.settings.dithering_mode = DitheringMode::Modern;

    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let texture = solid_texture(&mut scene.renderer, 240);
    let mut draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);
    draw_call.lighting_type = RenderLightingType::PerPixel;

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call.clone()], &scene.settings, &mut colors);

    // Level real 6.5 -> fraction 0.5 -> mask plane 2, set only where both
    // coordinates are even.
    assert_eq!(pixel(&colors, 32, 32), gray(100), "even/even pixel dithers darker");
    assert_eq!(pixel(&colors, 33, 32), gray(120));
    assert_eq!(pixel(&colors, 33, 33), gray(120));

    // Level real 7.8 -> fraction 0.8 -> the always-clear plane; the whole
    // surface stays at row 5 (240 * 7 / 12 = 140).
    scene.settings.ambient_percent = 0.6;
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, 32, 32), gray(140));
    assert_eq!(pixel(&colors, 33, 32), gray(140));
}

#[test]
fn horizon_mirror_puddle_reflects_pixels_above_the_horizon() {
    let mut scene = scene();

    // Two-tone backdrop: 77 above the screen center, 55 below.
    let (bg_vb, bg_ab, bg_ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let backdrop_texture_id = scene
        .renderer
        .try_create_object_texture(1, 2, TexelFormat::Palette)
        .unwrap();
    scene
        .renderer
        .lock_object_texture(backdrop_texture_id)
        .unwrap()
        .texels8_mut()
        .copy_from_slice(&[55, 77]);
    let backdrop_call =
        RenderDrawCall::new(scene.transform_buffer_id, bg_vb, bg_ab, bg_ib, backdrop_texture_id);

    // Puddle covering only the lower half of the view, slightly nearer, with
    // the water sentinel texel.
    let positions = [
        -4.0, -4.0, 0.2, //
        4.0, -4.0, 0.2, //
        4.0, 0.0, 0.2, //
        -4.0, 0.0, 0.2,
    ];
    let tex_coords = [0.0, 0.0, 1.0, 0.0, 1.0, 1.0, 0.0, 1.0];
    let puddle_vb = scene.renderer.try_create_vertex_buffer(4, 3).unwrap();
    let puddle_ab = scene.renderer.try_create_attribute_buffer(4, 2).unwrap();
    let puddle_ib = scene.renderer.try_create_index_buffer(6).unwrap();
    scene.renderer.populate_vertex_buffer(puddle_vb, &positions);
    scene.renderer.populate_attribute_buffer(puddle_ab, &tex_coords);
    scene.renderer.populate_index_buffer(puddle_ib, &[0, 2, 1, 0, 3, 2]);
    let puddle_texture = solid_texture(&mut scene.renderer, 30);
    let mut puddle_call = RenderDrawCall::new(
        scene.transform_buffer_id,
        puddle_vb,
        puddle_ab,
        puddle_ib,
        puddle_texture,
    );
    puddle_call.pixel_shader_type = PixelShaderType::AlphaTestedWithHorizonMirror;

    // Level camera puts the horizon on the screen's center row.
    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene.renderer.submit_frame(
        &camera,
        &[backdrop_call, puddle_call],
        &scene.settings,
        &mut colors,
    );

    // Row 40 mirrors to row 23, which holds the upper backdrop color.
    assert_eq!(
        pixel(&colors, 32, 40),
        gray(77),
        "water shows the reflection of the pixel above the horizon"
    );
    assert_eq!(pixel(&colors, 32, 23), gray(77), "the source row is untouched");
}

#[test]
fn horizon_mirror_off_frame_reflection_uses_the_sky_color() {
    let mut scene = scene();
    let (vb, ab, ib) = quad(&mut scene.renderer, 4.0, 0.0);
    let puddle_texture = solid_texture(&mut scene.renderer, 30);
    let mut puddle_call =
        RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, puddle_texture);
    puddle_call.pixel_shader_type = PixelShaderType::AlphaTestedWithHorizonMirror;

    // Pitch the camera down: the horizon rises to screen row 16, so row 40
    // mirrors past the top edge of the frame.
    let camera = RenderCamera::new(
        DVec3::new(0.0, 0.0, 1.0),
        DVec3::new(0.0, -0.5, -1.0).normalize(),
        90.0f64.to_radians(),
        1.0,
        0.1,
        100.0,
    );
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[puddle_call.clone()], &scene.settings, &mut colors);

    assert_eq!(
        pixel(&colors, 32, 40),
        gray(150),
        "off-frame reflections fall back to the sky background texel"
    );

    // Without a sky texture the fallback drops to palette entry 0. Mark that
    // entry so the result stands apart from the cleared background.
    scene
        .renderer
        .lock_object_texture(scene.settings.palette_texture_id)
        .unwrap()
        .texels32_mut()[0] = 0x0012_3456;
    scene.settings.sky_bg_texture_id = usize::MAX;
    let mut colors = vec![0u32; FRAME_DIM * FRAME_DIM];
    scene
        .renderer
        .submit_frame(&camera, &[puddle_call], &scene.settings, &mut colors);
    assert_eq!(pixel(&colors, 32, 40), 0x0012_3456);
}

#[test]
fn resize_changes_the_expected_output_size() {
    let mut scene = scene();
    let (vb, ab, ib) = quad(&mut scene.renderer, 2.0, 0.0);
    let texture = solid_texture(&mut scene.renderer, 50);
    let draw_call = RenderDrawCall::new(scene.transform_buffer_id, vb, ab, ib, texture);

    scene.renderer.resize(16, 16);
    assert_eq!(scene.renderer.width(), 16);

    let camera = camera_at_z(1.0);
    let mut colors = vec![0u32; 16 * 16];
    scene
        .renderer
        .submit_frame(&camera, &[draw_call], &scene.settings, &mut colors);
    assert_eq!(colors[8 + (8 * 16)], gray(50));
}
