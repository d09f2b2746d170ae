/// The renderer facade: owns every resource pool, the frame-sized buffers,
/// and the per-frame pipeline state. `submit_frame` drives the whole
/// pipeline for one frame: batch, shade, clip, set up, rasterize.
use glam::{DVec2, DVec3, DVec4};
use log::{error, warn};

use crate::camera::RenderCamera;
use crate::count_call;
#[allow(unused_imports)]
use crate::perf::FUNCTION_COUNTERS;
use crate::perf::RenderProfilerData;
use crate::rendering::drawcall::{
    DitheringMode, RenderDrawCall, RenderFrameSettings, RenderTransform,
    MAX_LIGHTS_PER_DRAW_CALL,
};
use crate::rendering::framebuffer::FrameBuffers;
use crate::rendering::pipeline::{
    FrameContext, MeshProcessCache, PipelineTriangle, MAX_DRAW_CALL_MESH_TRIANGLES,
    MAX_MESH_PROCESS_CACHES,
};
use crate::rendering::rasterizer::{self, RasterizerFrame};
use crate::rendering::shaders::ShaderTexture;
use crate::resources::{
    AttributeBuffer, AttributeBufferId, IndexBuffer, IndexBufferId, Light, ObjectTexture,
    ObjectTextureId, Pool, RenderLightId, TexelFormat, UniformBuffer, UniformBufferId,
    VertexBuffer, VertexBufferId,
};

pub struct Renderer {
    vertex_buffers: Pool<VertexBuffer>,
    attribute_buffers: Pool<AttributeBuffer>,
    index_buffers: Pool<IndexBuffer>,
    uniform_buffers: Pool<UniformBuffer>,
    textures: Pool<ObjectTexture>,
    lights: Pool<Light>,
    buffers: FrameBuffers,
    ctx: FrameContext,
}

impl Renderer {
    pub fn new(width: usize, height: usize, dithering_mode: DitheringMode) -> Self {
        Self {
            vertex_buffers: Pool::new(),
            attribute_buffers: Pool::new(),
            index_buffers: Pool::new(),
            uniform_buffers: Pool::new(),
            textures: Pool::new(),
            lights: Pool::new(),
            buffers: FrameBuffers::new(width, height, dithering_mode),
            ctx: FrameContext::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.buffers.width
    }

    pub fn height(&self) -> usize {
        self.buffers.height
    }

    /// Recreate the frame-sized buffers for a new output size. Resource
    /// pools are untouched.
    pub fn resize(&mut self, width: usize, height: usize) {
        if width == 0 || height == 0 {
            error!("invalid frame size {}x{}", width, height);
            return;
        }
        self.buffers.resize(width, height);
    }

    /// Release every allocated resource. The renderer stays usable; all
    /// outstanding IDs become dangling.
    pub fn shutdown(&mut self) {
        self.vertex_buffers.clear();
        self.attribute_buffers.clear();
        self.index_buffers.clear();
        self.uniform_buffers.clear();
        self.textures.clear();
        self.lights.clear();
    }

    pub fn profiler_data(&self) -> RenderProfilerData {
        RenderProfilerData {
            width: self.buffers.width,
            height: self.buffers.height,
            draw_call_count: self.ctx.draw_call_count,
            presented_triangle_count: self.ctx.presented_triangle_count,
            depth_test_count: self.ctx.depth_test_count,
            color_write_count: self.ctx.color_write_count,
            object_texture_count: self.textures.used_count(),
            object_texture_byte_count: self.textures.iter().map(|t| t.byte_count()).sum(),
            light_count: self.lights.used_count(),
        }
    }

    // --- Resource creation ---

    pub fn try_create_vertex_buffer(
        &mut self,
        vertex_count: usize,
        components_per_vertex: usize,
    ) -> Option<VertexBufferId> {
        if vertex_count == 0 || components_per_vertex < 2 {
            error!(
                "invalid vertex buffer: {} vertices, {} components",
                vertex_count, components_per_vertex
            );
            return None;
        }
        Some(
            self.vertex_buffers
                .alloc(VertexBuffer::new(vertex_count, components_per_vertex)),
        )
    }

    pub fn try_create_attribute_buffer(
        &mut self,
        vertex_count: usize,
        components_per_vertex: usize,
    ) -> Option<AttributeBufferId> {
        if vertex_count == 0 || components_per_vertex < 2 {
            error!(
                "invalid attribute buffer: {} vertices, {} components",
                vertex_count, components_per_vertex
            );
            return None;
        }
        Some(
            self.attribute_buffers
                .alloc(AttributeBuffer::new(vertex_count, components_per_vertex)),
        )
    }

    pub fn try_create_index_buffer(&mut self, index_count: usize) -> Option<IndexBufferId> {
        if index_count == 0 || index_count % 3 != 0 {
            error!("invalid index buffer: {} indices", index_count);
            return None;
        }
        if index_count / 3 > MAX_DRAW_CALL_MESH_TRIANGLES {
            error!(
                "index buffer too large: {} triangles exceeds {}",
                index_count / 3,
                MAX_DRAW_CALL_MESH_TRIANGLES
            );
            return None;
        }
        Some(self.index_buffers.alloc(IndexBuffer::new(index_count)))
    }

    pub fn try_create_uniform_buffer(
        &mut self,
        element_count: usize,
        size_of_element: usize,
        alignment_of_element: usize,
    ) -> Option<UniformBufferId> {
        if element_count == 0 || size_of_element == 0 || alignment_of_element == 0 {
            error!(
                "invalid uniform buffer: {} elements of {} bytes",
                element_count, size_of_element
            );
            return None;
        }
        Some(self.uniform_buffers.alloc(UniformBuffer::new(
            element_count,
            size_of_element,
            alignment_of_element,
        )))
    }

    pub fn try_create_object_texture(
        &mut self,
        width: usize,
        height: usize,
        format: TexelFormat,
    ) -> Option<ObjectTextureId> {
        if width == 0 || height == 0 {
            error!("invalid texture size {}x{}", width, height);
            return None;
        }
        Some(self.textures.alloc(ObjectTexture::new(width, height, format)))
    }

    pub fn try_create_light(&mut self) -> Option<RenderLightId> {
        Some(self.lights.alloc(Light::new()))
    }

    // --- Resource population ---

    pub fn populate_vertex_buffer(&mut self, id: VertexBufferId, values: &[f64]) {
        match self.vertex_buffers.get_mut(id) {
            Some(buffer) if buffer.values.len() == values.len() => {
                buffer.values.copy_from_slice(values);
            }
            Some(buffer) => error!(
                "vertex buffer {} size mismatch: {} != {}",
                id,
                values.len(),
                buffer.values.len()
            ),
            None => error!("missing vertex buffer {}", id),
        }
    }

    pub fn populate_attribute_buffer(&mut self, id: AttributeBufferId, values: &[f64]) {
        match self.attribute_buffers.get_mut(id) {
            Some(buffer) if buffer.values.len() == values.len() => {
                buffer.values.copy_from_slice(values);
            }
            Some(buffer) => error!(
                "attribute buffer {} size mismatch: {} != {}",
                id,
                values.len(),
                buffer.values.len()
            ),
            None => error!("missing attribute buffer {}", id),
        }
    }

    pub fn populate_index_buffer(&mut self, id: IndexBufferId, indices: &[i32]) {
        match self.index_buffers.get_mut(id) {
            Some(buffer) if buffer.indices.len() == indices.len() => {
                buffer.indices.copy_from_slice(indices);
            }
            Some(buffer) => error!(
                "index buffer {} size mismatch: {} != {}",
                id,
                indices.len(),
                buffer.indices.len()
            ),
            None => error!("missing index buffer {}", id),
        }
    }

    pub fn populate_uniform_buffer(&mut self, id: UniformBufferId, bytes: &[u8]) {
        match self.uniform_buffers.get_mut(id) {
            Some(buffer) if buffer.valid_byte_count() == bytes.len() => {
                buffer.bytes_mut()[..bytes.len()].copy_from_slice(bytes);
            }
            Some(buffer) => error!(
                "uniform buffer {} size mismatch: {} != {}",
                id,
                bytes.len(),
                buffer.valid_byte_count()
            ),
            None => error!("missing uniform buffer {}", id),
        }
    }

    /// Overwrite a single uniform element without touching its neighbors.
    pub fn populate_uniform_at_index(&mut self, id: UniformBufferId, index: usize, bytes: &[u8]) {
        match self.uniform_buffers.get_mut(id) {
            Some(buffer) => {
                if index >= buffer.element_count() {
                    error!(
                        "uniform buffer {} element {} out of range ({})",
                        id,
                        index,
                        buffer.element_count()
                    );
                    return;
                }
                if bytes.len() != buffer.size_of_element() {
                    error!(
                        "uniform buffer {} element size mismatch: {} != {}",
                        id,
                        bytes.len(),
                        buffer.size_of_element()
                    );
                    return;
                }
                buffer.write_element(index, bytes);
            }
            None => error!("missing uniform buffer {}", id),
        }
    }

    /// Direct texel access for texture population; holds the borrow for the
    /// duration of the caller's writes.
    pub fn lock_object_texture(&mut self, id: ObjectTextureId) -> Option<&mut ObjectTexture> {
        let texture = self.textures.get_mut(id);
        if texture.is_none() {
            error!("missing object texture {}", id);
        }
        texture
    }

    pub fn texture_dims(&self, id: ObjectTextureId) -> Option<(usize, usize)> {
        self.textures.get(id).map(|t| (t.width, t.height))
    }

    pub fn set_light_position(&mut self, id: RenderLightId, world_point: DVec3) {
        match self.lights.get_mut(id) {
            Some(light) => light.set_position(world_point),
            None => error!("missing light {}", id),
        }
    }

    pub fn set_light_radius(&mut self, id: RenderLightId, start_radius: f64, end_radius: f64) {
        if start_radius < 0.0 || end_radius < start_radius {
            error!("invalid light radii {}..{}", start_radius, end_radius);
            return;
        }
        match self.lights.get_mut(id) {
            Some(light) => light.set_radius(start_radius, end_radius),
            None => error!("missing light {}", id),
        }
    }

    // --- Resource destruction ---

    pub fn free_vertex_buffer(&mut self, id: VertexBufferId) {
        self.vertex_buffers.free(id);
    }

    pub fn free_attribute_buffer(&mut self, id: AttributeBufferId) {
        self.attribute_buffers.free(id);
    }

    pub fn free_index_buffer(&mut self, id: IndexBufferId) {
        self.index_buffers.free(id);
    }

    pub fn free_uniform_buffer(&mut self, id: UniformBufferId) {
        self.uniform_buffers.free(id);
    }

    pub fn free_object_texture(&mut self, id: ObjectTextureId) {
        self.textures.free(id);
    }

    pub fn free_light(&mut self, id: RenderLightId) {
        self.lights.free(id);
    }

    // --- Frame submission ---

    /// Render one frame into `colors` (one packed 32-bit color per pixel,
    /// row-major). Draw calls run in submission order; consecutive calls
    /// sharing a vertex shader type batch together up to the cache limit.
    pub fn submit_frame(
        &mut self,
        camera: &RenderCamera,
        draw_calls: &[RenderDrawCall],
        settings: &RenderFrameSettings,
        colors: &mut [u32],
    ) {
        count_call!(FUNCTION_COUNTERS.submit_frame_calls);

        let pixel_count = self.buffers.pixel_count();
        if colors.len() != pixel_count {
            error!(
                "output buffer size mismatch: {} != {}",
                colors.len(),
                pixel_count
            );
            return;
        }

        self.buffers.set_dithering_mode(settings.dithering_mode);
        self.buffers.clear();
        colors.fill(0);
        count_call!(FUNCTION_COUNTERS.framebuffer_clear_calls);

        self.ctx.begin_frame(camera, settings.ambient_percent);
        self.ctx.draw_call_count = draw_calls.len();

        let palette = match self.textures.get(settings.palette_texture_id) {
            Some(texture) if texture.format() == TexelFormat::TrueColor => texture.texels32(),
            _ => {
                error!(
                    "frame palette texture {} unavailable",
                    settings.palette_texture_id
                );
                return;
            }
        };
        let light_table = match self.textures.get(settings.light_table_texture_id) {
            Some(texture) if texture.format() == TexelFormat::Palette => texture,
            _ => {
                error!(
                    "frame light table texture {} unavailable",
                    settings.light_table_texture_id
                );
                return;
            }
        };
        let fallback_sky_color = match self.textures.get(settings.sky_bg_texture_id) {
            Some(texture) if texture.format() == TexelFormat::Palette => texture.texels8()[0],
            _ => {
                warn!(
                    "sky background texture {} unavailable",
                    settings.sky_bg_texture_id
                );
                0
            }
        };

        let horizon_ndc = self.ctx.horizon_ndc_point;
        let horizon_screen = DVec2::new(
            (0.5 + (horizon_ndc.x * 0.5)) * self.buffers.width_real,
            (0.5 - (horizon_ndc.y * 0.5)) * self.buffers.height_real,
        );

        let width = self.buffers.width;
        let height = self.buffers.height;

        let mut next = 0;
        while next < draw_calls.len() {
            let batch_shader_type = draw_calls[next].vertex_shader_type;
            let batch_start = next;
            while next < draw_calls.len()
                && (next - batch_start) < MAX_MESH_PROCESS_CACHES
                && draw_calls[next].vertex_shader_type == batch_shader_type
            {
                next += 1;
            }
            let batch = &draw_calls[batch_start..next];
            let mesh_count = batch.len();

            self.ctx.begin_batch(mesh_count);
            let mut mesh_ok = [false; MAX_MESH_PROCESS_CACHES];
            for (slot, draw_call) in batch.iter().enumerate() {
                count_call!(FUNCTION_COUNTERS.mesh_cache_populate_calls);
                mesh_ok[slot] = populate_mesh_cache(
                    &mut self.ctx.meshes[slot],
                    draw_call,
                    &self.vertex_buffers,
                    &self.attribute_buffers,
                    &self.index_buffers,
                    &self.uniform_buffers,
                    &self.lights,
                );
                if !mesh_ok[slot] {
                    self.ctx.meshes[slot].triangles.clear();
                }
            }

            self.ctx.calculate_vertex_shader_transforms(mesh_count);
            self.ctx.process_vertex_shaders(mesh_count, batch_shader_type);
            self.ctx.process_clipping(mesh_count);

            for slot in 0..mesh_count {
                if !mesh_ok[slot] {
                    continue;
                }
                count_call!(FUNCTION_COUNTERS.clip_mesh_calls);

                rasterizer::process_triangle_setup(
                    &self.ctx.meshes[slot].clipped,
                    width,
                    height,
                    &mut self.ctx.visible[slot],
                );
                self.ctx.presented_triangle_count += self.ctx.visible[slot].len();

                let mesh = &self.ctx.meshes[slot];
                let Some(texture0_id) = mesh.texture_id0 else {
                    error!("draw call missing base texture");
                    continue;
                };
                let texture0 = match self.textures.get(texture0_id) {
                    Some(texture) if texture.format() == TexelFormat::Palette => {
                        ShaderTexture::new(texture, mesh.texture_sampling0)
                    }
                    _ => {
                        error!("draw call texture {} unavailable", texture0_id);
                        continue;
                    }
                };
                let texture1 = match mesh.texture_id1 {
                    Some(id) => match self.textures.get(id) {
                        Some(texture) if texture.format() == TexelFormat::Palette => {
                            Some(ShaderTexture::new(texture, mesh.texture_sampling1))
                        }
                        _ => {
                            error!("draw call secondary texture {} unavailable", id);
                            None
                        }
                    },
                    None => None,
                };

                let mut raster_frame = RasterizerFrame {
                    width,
                    height,
                    width_real_recip: self.buffers.width_real_recip,
                    height_real_recip: self.buffers.height_real_recip,
                    palette_indices: &mut self.buffers.palette_indices,
                    depth: &mut self.buffers.depth,
                    colors: &mut *colors,
                    palette,
                    dither: &self.buffers.dither,
                    dithering_mode: settings.dithering_mode,
                    inverse_view: self.ctx.inverse_view,
                    inverse_projection: self.ctx.inverse_projection,
                    ambient_percent: self.ctx.ambient_percent,
                    horizon_screen,
                    fallback_sky_color,
                };
                let totals = rasterizer::rasterize_mesh(
                    mesh,
                    &self.ctx.visible[slot],
                    texture0,
                    texture1,
                    light_table,
                    &mut raster_frame,
                );
                self.ctx.depth_test_count += totals.depth_test_count;
                self.ctx.color_write_count += totals.color_write_count;
            }
        }
    }
}

/// Stage one draw call into a mesh process cache: fetch its transform,
/// flatten its indexed geometry into triangles, resolve texture bindings,
/// and copy its lights by value.
fn populate_mesh_cache(
    cache: &mut MeshProcessCache,
    draw_call: &RenderDrawCall,
    vertex_buffers: &Pool<VertexBuffer>,
    attribute_buffers: &Pool<AttributeBuffer>,
    index_buffers: &Pool<IndexBuffer>,
    uniform_buffers: &Pool<UniformBuffer>,
    lights: &Pool<Light>,
) -> bool {
    let Some(transform_buffer) = uniform_buffers.get(draw_call.transform_buffer_id) else {
        error!("missing transform buffer {}", draw_call.transform_buffer_id);
        return false;
    };
    if draw_call.transform_index >= transform_buffer.element_count() {
        error!(
            "transform index {} out of range ({})",
            draw_call.transform_index,
            transform_buffer.element_count()
        );
        return false;
    }
    let transform: RenderTransform = transform_buffer.get(draw_call.transform_index);
    cache.translation = transform.translation;
    cache.rotation = transform.rotation;
    cache.scale = transform.scale;

    cache.pre_scale_translation = match draw_call.pre_scale_translation_buffer_id {
        Some(id) => match uniform_buffers.get(id) {
            Some(buffer) => buffer.get::<DVec3>(0),
            None => {
                error!("missing pre-scale translation buffer {}", id);
                return false;
            }
        },
        None => DVec3::ZERO,
    };

    let Some(vertex_buffer) = vertex_buffers.get(draw_call.vertex_buffer_id) else {
        error!("missing vertex buffer {}", draw_call.vertex_buffer_id);
        return false;
    };
    let Some(attribute_buffer) = attribute_buffers.get(draw_call.tex_coord_buffer_id) else {
        error!("missing attribute buffer {}", draw_call.tex_coord_buffer_id);
        return false;
    };
    let Some(index_buffer) = index_buffers.get(draw_call.index_buffer_id) else {
        error!("missing index buffer {}", draw_call.index_buffer_id);
        return false;
    };
    debug_assert!(index_buffer.triangle_count <= MAX_DRAW_CALL_MESH_TRIANGLES);

    // Flatten buffer lookups into per-triangle vertices with w = 1, so the
    // vertex shaders and clipper never touch index indirection.
    cache.triangles.clear();
    let position_components = vertex_buffer.components_per_vertex;
    let uv_components = attribute_buffer.components_per_vertex;
    let vertex_count = vertex_buffer.values.len() / position_components;
    for triangle_index in 0..index_buffer.triangle_count {
        let base = triangle_index * 3;
        let mut v = [DVec4::ZERO; 3];
        let mut uv = [DVec2::ZERO; 3];
        for corner in 0..3 {
            let vertex_index = index_buffer.indices[base + corner] as usize;
            if vertex_index >= vertex_count {
                error!(
                    "index buffer {} references vertex {} past {}",
                    draw_call.index_buffer_id, vertex_index, vertex_count
                );
                return false;
            }
            let position_base = vertex_index * position_components;
            v[corner] = DVec4::new(
                vertex_buffer.values[position_base],
                vertex_buffer.values[position_base + 1],
                vertex_buffer.values[position_base + 2],
                1.0,
            );
            let uv_base = vertex_index * uv_components;
            uv[corner] = DVec2::new(
                attribute_buffer.values[uv_base],
                attribute_buffer.values[uv_base + 1],
            );
        }
        cache.triangles.push(PipelineTriangle { v, uv });
    }

    let Some(binding0) = draw_call.textures[0].as_ref() else {
        error!("draw call has no base texture binding");
        return false;
    };
    cache.texture_id0 = Some(binding0.resolve());
    cache.texture_id1 = draw_call.textures[1].as_ref().map(|binding| binding.resolve());
    cache.texture_sampling0 = draw_call.texture_sampling_types[0];
    cache.texture_sampling1 = draw_call.texture_sampling_types[1];

    cache.lighting_type = draw_call.lighting_type;
    cache.mesh_light_percent = draw_call.light_percent;
    cache.light_count = 0;
    let light_id_count = draw_call.light_id_count.min(MAX_LIGHTS_PER_DRAW_CALL);
    for &light_id in draw_call.light_ids.iter().take(light_id_count) {
        match lights.get(light_id) {
            Some(light) => {
                cache.lights[cache.light_count] = *light;
                cache.light_count += 1;
            }
            None => warn!("draw call references missing light {}", light_id),
        }
    }

    cache.pixel_shader_type = draw_call.pixel_shader_type;
    cache.pixel_shader_param0 = draw_call.pixel_shader_param0;
    cache.enable_depth_read = draw_call.enable_depth_read;
    cache.enable_depth_write = draw_call.enable_depth_write;
    true
}
