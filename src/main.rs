/// Demo application: a lit, animated scene rendered entirely on the CPU.
/// Handles window creation, the render loop, and frame presentation.
use glam::{DMat4, DVec3};
use mimalloc::MiMalloc;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Instant;

use palette_raster::*;
use winit::{
    event::*,
    event_loop::{ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowBuilder,
};

const LIGHT_LEVEL_COUNT: usize = 13;

/// Grayscale ramp palette: index n is gray level n.
fn build_palette(renderer: &mut Renderer) -> ObjectTextureId {
    let id = renderer
        .try_create_object_texture(256, 1, TexelFormat::TrueColor)
        .expect("palette texture");
    let texture = renderer.lock_object_texture(id).expect("palette texels");
    for (index, texel) in texture.texels32_mut().iter_mut().enumerate() {
        let gray = index as u32;
        *texel = (gray << 16) | (gray << 8) | gray;
    }
    id
}

/// One shading row per light level; row 0 is full brightness, the last row
/// maps everything to black. Works because the palette is a linear ramp.
fn build_light_table(renderer: &mut Renderer) -> ObjectTextureId {
    let id = renderer
        .try_create_object_texture(256, LIGHT_LEVEL_COUNT, TexelFormat::Palette)
        .expect("light table texture");
    let texture = renderer.lock_object_texture(id).expect("light table texels");
    let texels = texture.texels8_mut();
    let last_level = LIGHT_LEVEL_COUNT - 1;
    for level in 0..LIGHT_LEVEL_COUNT {
        for index in 0..256 {
            let shaded = (index * (last_level - level)) / last_level;
            texels[index + (level * 256)] = shaded as u8;
        }
    }
    id
}

fn build_checkerboard(renderer: &mut Renderer) -> ObjectTextureId {
    let id = renderer
        .try_create_object_texture(32, 32, TexelFormat::Palette)
        .expect("checkerboard texture");
    let texture = renderer.lock_object_texture(id).expect("checkerboard texels");
    let texels = texture.texels8_mut();
    for y in 0..32 {
        for x in 0..32 {
            let even = ((x / 8) + (y / 8)) % 2 == 0;
            texels[x + (y * 32)] = if even { 220 } else { 100 };
        }
    }
    id
}

fn build_sky(renderer: &mut Renderer) -> ObjectTextureId {
    let id = renderer
        .try_create_object_texture(1, 1, TexelFormat::Palette)
        .expect("sky texture");
    renderer.lock_object_texture(id).expect("sky texels").texels8_mut()[0] = 150;
    id
}

struct Quad {
    vertex_buffer_id: VertexBufferId,
    tex_coord_buffer_id: AttributeBufferId,
    index_buffer_id: IndexBufferId,
}

/// Unit quad in the XZ plane, wound to face +Y.
fn build_quad(renderer: &mut Renderer) -> Quad {
    let positions = [
        -0.5, 0.0, -0.5, //
        -0.5, 0.0, 0.5, //
        0.5, 0.0, 0.5, //
        0.5, 0.0, -0.5,
    ];
    let tex_coords = [
        0.0, 0.0, //
        0.0, 1.0, //
        1.0, 1.0, //
        1.0, 0.0,
    ];
    let indices = [0i32, 2, 1, 0, 3, 2];

    let vertex_buffer_id = renderer.try_create_vertex_buffer(4, 3).expect("quad vertices");
    let tex_coord_buffer_id = renderer
        .try_create_attribute_buffer(4, 2)
        .expect("quad tex coords");
    let index_buffer_id = renderer.try_create_index_buffer(6).expect("quad indices");
    renderer.populate_vertex_buffer(vertex_buffer_id, &positions);
    renderer.populate_attribute_buffer(tex_coord_buffer_id, &tex_coords);
    renderer.populate_index_buffer(index_buffer_id, &indices);

    Quad {
        vertex_buffer_id,
        tex_coord_buffer_id,
        index_buffer_id,
    }
}

fn main() {
    env_logger::init();

    println!("=== Palette Raster - Software Renderer Demo ===");
    println!("Controls:");
    println!("  D - cycle dithering mode");
    println!("  ESC - Exit");
    println!();

    let event_loop = EventLoop::new().unwrap();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title("Palette Raster")
            .with_inner_size(winit::dpi::LogicalSize::new(960, 540))
            .build(&event_loop)
            .unwrap(),
    );

    let context = softbuffer::Context::new(window.clone()).unwrap();
    let mut surface = softbuffer::Surface::new(&context, window.clone()).unwrap();

    let window_size = window.inner_size();
    let mut width = window_size.width.max(1) as usize;
    let mut height = window_size.height.max(1) as usize;

    let mut renderer = Renderer::new(width, height, DitheringMode::Modern);
    let mut dithering_mode = DitheringMode::Modern;

    let palette_texture_id = build_palette(&mut renderer);
    let light_table_texture_id = build_light_table(&mut renderer);
    let checkerboard_texture_id = build_checkerboard(&mut renderer);
    let sky_bg_texture_id = build_sky(&mut renderer);
    let quad = build_quad(&mut renderer);

    // Element 0 is the ground, element 1 the spinning quad.
    let transform_buffer_id = renderer
        .try_create_uniform_buffer(
            2,
            std::mem::size_of::<RenderTransform>(),
            std::mem::align_of::<RenderTransform>(),
        )
        .expect("transform buffer");

    let light_id = renderer.try_create_light().expect("light");
    renderer.set_light_radius(light_id, 2.0, 9.0);

    let start_time = Instant::now();
    let mut frame_count = 0u32;
    let mut fps_timer = Instant::now();

    event_loop
        .run(move |event, elwt| {
            elwt.set_control_flow(ControlFlow::Poll);

            match event {
                Event::WindowEvent { event, .. } => match event {
                    WindowEvent::CloseRequested => {
                        elwt.exit();
                    }
                    WindowEvent::Resized(new_size) => {
                        width = new_size.width.max(1) as usize;
                        height = new_size.height.max(1) as usize;
                        renderer.resize(width, height);
                    }
                    WindowEvent::KeyboardInput { event, .. } => {
                        let pressed = event.state == ElementState::Pressed;
                        if let PhysicalKey::Code(keycode) = event.physical_key {
                            match keycode {
                                KeyCode::KeyD if pressed => {
                                    dithering_mode = match dithering_mode {
                                        DitheringMode::None => DitheringMode::Classic,
                                        DitheringMode::Classic => DitheringMode::Modern,
                                        DitheringMode::Modern => DitheringMode::None,
                                    };
                                    println!("Dithering: {:?}", dithering_mode);
                                }
                                KeyCode::Escape if pressed => {
                                    elwt.exit();
                                }
                                _ => {}
                            }
                        }
                    }
                    WindowEvent::RedrawRequested => {
                        let time = start_time.elapsed().as_secs_f64();

                        // Orbiting camera looking at the scene center.
                        let orbit = time * 0.25;
                        let eye = DVec3::new(orbit.cos() * 7.0, 3.0, orbit.sin() * 7.0);
                        let target = DVec3::new(0.0, 0.5, 0.0);
                        let camera = RenderCamera::new(
                            eye,
                            (target - eye).normalize(),
                            70.0f64.to_radians(),
                            width as f64 / height as f64,
                            0.1,
                            1000.0,
                        );

                        // Ground transform.
                        let ground = RenderTransform {
                            translation: DMat4::IDENTITY,
                            rotation: DMat4::IDENTITY,
                            scale: DMat4::from_scale(DVec3::new(10.0, 1.0, 10.0)),
                        };
                        renderer.populate_uniform_at_index(
                            transform_buffer_id,
                            0,
                            ground.as_bytes(),
                        );

                        // Spinner: stood upright, lifted, and rotating about Y.
                        let spinner = RenderTransform {
                            translation: DMat4::from_translation(DVec3::new(0.0, 1.0, 0.0)),
                            rotation: DMat4::from_rotation_y(time)
                                * DMat4::from_rotation_x(std::f64::consts::FRAC_PI_2),
                            scale: DMat4::from_scale(DVec3::splat(2.0)),
                        };
                        renderer.populate_uniform_at_index(
                            transform_buffer_id,
                            1,
                            spinner.as_bytes(),
                        );

                        // Circling point light.
                        let light_angle = time * 0.8;
                        renderer.set_light_position(
                            light_id,
                            DVec3::new(light_angle.cos() * 3.0, 2.0, light_angle.sin() * 3.0),
                        );

                        let mut ground_call = RenderDrawCall::new(
                            transform_buffer_id,
                            quad.vertex_buffer_id,
                            quad.tex_coord_buffer_id,
                            quad.index_buffer_id,
                            checkerboard_texture_id,
                        );
                        ground_call.lighting_type = RenderLightingType::PerPixel;
                        ground_call.light_ids[0] = light_id;
                        ground_call.light_id_count = 1;

                        let mut spinner_call = ground_call.clone();
                        spinner_call.transform_index = 1;
                        spinner_call.pixel_shader_type = PixelShaderType::AlphaTested;

                        let settings = RenderFrameSettings {
                            ambient_percent: 0.30,
                            palette_texture_id,
                            light_table_texture_id,
                            sky_bg_texture_id,
                            dithering_mode,
                        };

                        surface
                            .resize(
                                NonZeroU32::new(width as u32).unwrap(),
                                NonZeroU32::new(height as u32).unwrap(),
                            )
                            .unwrap();
                        let mut buffer = surface.buffer_mut().unwrap();
                        renderer.submit_frame(
                            &camera,
                            &[ground_call, spinner_call],
                            &settings,
                            &mut buffer[..],
                        );
                        buffer.present().unwrap();

                        frame_count += 1;
                        if fps_timer.elapsed().as_secs_f64() >= 1.0 {
                            let stats = renderer.profiler_data();
                            println!(
                                "FPS: {} | draw calls: {} | triangles: {} | depth tests: {}",
                                frame_count,
                                stats.draw_call_count,
                                stats.presented_triangle_count,
                                stats.depth_test_count,
                            );
                            frame_count = 0;
                            fps_timer = Instant::now();
                        }
                    }
                    _ => {}
                },
                Event::AboutToWait => {
                    window.request_redraw();
                }
                _ => {}
            }
        })
        .unwrap();
}
