/// Per-frame pipeline state: the batched mesh process caches, vertex
/// shading, and homogeneous-space clipping. Everything here is owned by the
/// renderer and reset each frame; capacities are fixed so no stage
/// allocates on the hot path.
use glam::{DMat4, DVec2, DVec3, DVec4};

use crate::camera::RenderCamera;
use crate::{count_add, count_call};
#[allow(unused_imports)]
use crate::perf::FUNCTION_COUNTERS;
use crate::rendering::drawcall::{
    PixelShaderType, RenderLightingType, TextureSamplingType, VertexShaderType,
    MAX_LIGHTS_PER_DRAW_CALL,
};
use crate::rendering::rasterizer::RasterizerTriangle;
use crate::rendering::shaders;
use crate::resources::{Light, ObjectTextureId};

/// Most draw calls that can share one vertex-shader batch.
pub const MAX_MESH_PROCESS_CACHES: usize = 8;
/// Most triangles a single draw call's mesh may contain.
pub const MAX_DRAW_CALL_MESH_TRIANGLES: usize = 1024;
/// Worklist capacity while clipping one triangle against all six planes.
pub const MAX_CLIPPED_TRIANGLE_TRIANGLES: usize = 64;
/// Most clip-space triangles a mesh can produce in one frame.
pub const MAX_CLIPPED_MESH_TRIANGLES: usize = 4096;

/// One triangle flowing through the pipeline: clip-space (or model-space,
/// before shading) positions plus per-vertex UVs.
#[derive(Debug, Clone, Copy)]
pub struct PipelineTriangle {
    pub v: [DVec4; 3],
    pub uv: [DVec2; 3],
}

impl PipelineTriangle {
    pub const ZERO: Self = Self {
        v: [DVec4::ZERO; 3],
        uv: [DVec2::ZERO; 3],
    };
}

/// Staging area for one draw call inside a batch.
pub struct MeshProcessCache {
    pub translation: DMat4,
    pub rotation: DMat4,
    pub scale: DMat4,
    pub model_view_projection: DMat4,
    pub pre_scale_translation: DVec3,

    /// Flattened triangles; model space after buffer lookups, clip space
    /// after vertex shading runs in place.
    pub triangles: Vec<PipelineTriangle>,
    /// Frustum-clipped triangles ready for rasterizer setup.
    pub clipped: Vec<PipelineTriangle>,

    pub texture_id0: Option<ObjectTextureId>,
    pub texture_id1: Option<ObjectTextureId>,
    pub texture_sampling0: TextureSamplingType,
    pub texture_sampling1: TextureSamplingType,
    pub lighting_type: RenderLightingType,
    pub mesh_light_percent: f64,
    pub lights: [Light; MAX_LIGHTS_PER_DRAW_CALL],
    pub light_count: usize,
    pub pixel_shader_type: PixelShaderType,
    pub pixel_shader_param0: f64,
    pub enable_depth_read: bool,
    pub enable_depth_write: bool,
}

impl MeshProcessCache {
    fn new() -> Self {
        Self {
            translation: DMat4::IDENTITY,
            rotation: DMat4::IDENTITY,
            scale: DMat4::IDENTITY,
            model_view_projection: DMat4::IDENTITY,
            pre_scale_translation: DVec3::ZERO,
            triangles: Vec::with_capacity(MAX_DRAW_CALL_MESH_TRIANGLES),
            clipped: Vec::with_capacity(MAX_CLIPPED_MESH_TRIANGLES),
            texture_id0: None,
            texture_id1: None,
            texture_sampling0: TextureSamplingType::Default,
            texture_sampling1: TextureSamplingType::Default,
            lighting_type: RenderLightingType::PerMesh,
            mesh_light_percent: 0.0,
            lights: [Light::new(); MAX_LIGHTS_PER_DRAW_CALL],
            light_count: 0,
            pixel_shader_type: PixelShaderType::Opaque,
            pixel_shader_param0: 0.0,
            enable_depth_read: true,
            enable_depth_write: true,
        }
    }

    fn reset(&mut self) {
        self.triangles.clear();
        self.clipped.clear();
        self.light_count = 0;
    }
}

/// All per-frame mutable pipeline state, owned by the renderer and passed
/// through each stage explicitly. Never shared across frames.
pub struct FrameContext {
    pub view_projection: DMat4,
    pub inverse_view: DMat4,
    pub inverse_projection: DMat4,
    pub horizon_ndc_point: DVec3,
    pub ambient_percent: f64,

    pub meshes: Vec<MeshProcessCache>,
    /// Front-facing, screen-bounded triangles per mesh slot.
    pub visible: Vec<Vec<RasterizerTriangle>>,

    // Frame totals for the profiler snapshot.
    pub draw_call_count: usize,
    pub presented_triangle_count: usize,
    pub depth_test_count: usize,
    pub color_write_count: usize,
}

impl FrameContext {
    pub fn new() -> Self {
        Self {
            view_projection: DMat4::IDENTITY,
            inverse_view: DMat4::IDENTITY,
            inverse_projection: DMat4::IDENTITY,
            horizon_ndc_point: DVec3::ZERO,
            ambient_percent: 0.0,
            meshes: (0..MAX_MESH_PROCESS_CACHES)
                .map(|_| MeshProcessCache::new())
                .collect(),
            visible: (0..MAX_MESH_PROCESS_CACHES)
                .map(|_| Vec::with_capacity(MAX_CLIPPED_MESH_TRIANGLES))
                .collect(),
            draw_call_count: 0,
            presented_triangle_count: 0,
            depth_test_count: 0,
            color_write_count: 0,
        }
    }

    pub fn begin_frame(&mut self, camera: &RenderCamera, ambient_percent: f64) {
        self.view_projection = camera.view_projection;
        self.inverse_view = camera.inverse_view;
        self.inverse_projection = camera.inverse_projection;
        self.horizon_ndc_point = camera.horizon_ndc_point;
        self.ambient_percent = ambient_percent;
        self.draw_call_count = 0;
        self.presented_triangle_count = 0;
        self.depth_test_count = 0;
        self.color_write_count = 0;
    }

    pub fn begin_batch(&mut self, mesh_count: usize) {
        debug_assert!(mesh_count <= MAX_MESH_PROCESS_CACHES);
        for mesh in self.meshes.iter_mut().take(mesh_count) {
            mesh.reset();
        }
        for list in self.visible.iter_mut().take(mesh_count) {
            list.clear();
        }
    }

    /// Fuse the per-mesh model matrices and precompute MVPs, once per batch
    /// rather than per vertex.
    pub fn calculate_vertex_shader_transforms(&mut self, mesh_count: usize) {
        for mesh in self.meshes.iter_mut().take(mesh_count) {
            let model = mesh.translation * (mesh.rotation * mesh.scale);
            mesh.model_view_projection = self.view_projection * model;
        }
    }

    /// Run the batch's vertex shader over every triangle of every mesh,
    /// in place: model-space positions become clip-space positions.
    pub fn process_vertex_shaders(&mut self, mesh_count: usize, shader_type: VertexShaderType) {
        for mesh in self.meshes.iter_mut().take(mesh_count) {
            count_call!(FUNCTION_COUNTERS.vertex_shader_mesh_calls);
            match shader_type {
                VertexShaderType::Basic => {
                    let mvp = mesh.model_view_projection;
                    for triangle in &mut mesh.triangles {
                        for vertex in &mut triangle.v {
                            *vertex = shaders::vertex_shader_basic(&mvp, *vertex);
                        }
                    }
                }
                VertexShaderType::RaisingDoor => {
                    let view_projection = self.view_projection;
                    for triangle in &mut mesh.triangles {
                        for vertex in &mut triangle.v {
                            *vertex = shaders::vertex_shader_raising_door(
                                mesh.pre_scale_translation,
                                &mesh.scale,
                                &mesh.rotation,
                                &mesh.translation,
                                &view_projection,
                                *vertex,
                            );
                        }
                    }
                }
                VertexShaderType::Entity => {
                    let mvp = mesh.model_view_projection;
                    for triangle in &mut mesh.triangles {
                        for vertex in &mut triangle.v {
                            *vertex = shaders::vertex_shader_entity(&mvp, *vertex);
                        }
                    }
                }
            }
        }
    }

    /// Clip every shaded triangle of every mesh against the six frustum
    /// planes and collect the survivors per mesh.
    pub fn process_clipping(&mut self, mesh_count: usize) {
        let mut worklist = ClipWorklist::new();
        for mesh in self.meshes.iter_mut().take(mesh_count) {
            mesh.clipped.clear();
            for triangle in &mesh.triangles {
                worklist.seed(*triangle);
                for plane_index in 0..6 {
                    worklist.clip_against_plane(plane_index);
                }

                let survivor_count = worklist.size - worklist.front;
                count_add!(
                    FUNCTION_COUNTERS.clipped_triangles_generated,
                    survivor_count as u64
                );
                debug_assert!(
                    mesh.clipped.len() + survivor_count <= MAX_CLIPPED_MESH_TRIANGLES,
                    "clipped triangle cache overflow"
                );
                for index in worklist.front..worklist.size {
                    mesh.clipped.push(worklist.triangles[index]);
                }
            }
        }
    }
}

impl Default for FrameContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotating worklist for clipping one triangle. Entries before `front` have
/// been consumed by an earlier plane; entries `front..size` are live.
struct ClipWorklist {
    triangles: [PipelineTriangle; MAX_CLIPPED_TRIANGLE_TRIANGLES],
    size: usize,
    front: usize,
}

impl ClipWorklist {
    fn new() -> Self {
        Self {
            triangles: [PipelineTriangle::ZERO; MAX_CLIPPED_TRIANGLE_TRIANGLES],
            size: 0,
            front: 0,
        }
    }

    fn seed(&mut self, triangle: PipelineTriangle) {
        self.triangles[0] = triangle;
        self.size = 1;
        self.front = 0;
    }

    /// Clip every live triangle against one homogeneous half-space.
    /// Planes 0..6 are x≥−w, x≤w, y≥−w, y≤w, z≥−w, z≤w.
    fn clip_against_plane(&mut self, plane_index: usize) {
        let live_count = self.size - self.front;
        for _ in 0..live_count {
            let triangle = self.triangles[self.front];
            self.front += 1;

            // Signed distances to the half-space boundary. Odd planes
            // compare against -w with a flipped sign so the same "≥ 0 is
            // inside" rule holds for all six.
            let component = |v: &DVec4| match plane_index {
                0 | 1 => v.x,
                2 | 3 => v.y,
                _ => v.z,
            };
            let (w_sign, comparison_sign) = if plane_index & 1 == 0 {
                (1.0, 1.0)
            } else {
                (-1.0, -1.0)
            };

            let diffs = [
                component(&triangle.v[0]) + (triangle.v[0].w * w_sign),
                component(&triangle.v[1]) + (triangle.v[1].w * w_sign),
                component(&triangle.v[2]) + (triangle.v[2].w * w_sign),
            ];
            let inside = [
                (diffs[0] * comparison_sign) >= 0.0,
                (diffs[1] * comparison_sign) >= 0.0,
                (diffs[2] * comparison_sign) >= 0.0,
            ];

            let inside_mask = (if inside[2] { 0 } else { 1 })
                | (if inside[1] { 0 } else { 2 })
                | (if inside[0] { 0 } else { 4 });

            if inside_mask == 7 {
                // Fully outside; drop.
                continue;
            }

            debug_assert!(self.size + 2 <= MAX_CLIPPED_TRIANGLE_TRIANGLES);

            if inside_mask == 0 {
                // Fully inside; pass through.
                self.triangles[self.size] = triangle;
                self.size += 1;
                continue;
            }

            // Two edges cross the plane. The input edge indices and output
            // vertex orders depend on which vertices are inside; slots 3
            // and 4 hold the two generated vertices. Orders preserve the
            // original winding.
            let (e0a, e0b, e1a, e1b, emitted): (usize, usize, usize, usize, &[usize]) =
                match inside_mask {
                    1 => (1, 2, 2, 0, &[0, 1, 3, 3, 4, 0]),
                    2 => (0, 1, 1, 2, &[0, 3, 4, 4, 2, 0]),
                    3 => (0, 1, 2, 0, &[0, 3, 4]),
                    4 => (0, 1, 2, 0, &[3, 1, 2, 2, 4, 3]),
                    5 => (0, 1, 1, 2, &[3, 1, 4]),
                    6 => (1, 2, 2, 0, &[3, 2, 4]),
                    _ => unreachable!(),
                };

            let t0 = diffs[e0a] / (diffs[e0a] - diffs[e0b]);
            let t1 = diffs[e1a] / (diffs[e1a] - diffs[e1b]);

            let mut v = [
                triangle.v[0],
                triangle.v[1],
                triangle.v[2],
                DVec4::ZERO,
                DVec4::ZERO,
            ];
            let mut uv = [
                triangle.uv[0],
                triangle.uv[1],
                triangle.uv[2],
                DVec2::ZERO,
                DVec2::ZERO,
            ];
            v[3] = v[e0a].lerp(v[e0b], t0);
            v[4] = v[e1a].lerp(v[e1b], t1);
            uv[3] = uv[e0a].lerp(uv[e0b], t0);
            uv[4] = uv[e1a].lerp(uv[e1b], t1);

            for emitted_triangle in emitted.chunks_exact(3) {
                self.triangles[self.size] = PipelineTriangle {
                    v: [
                        v[emitted_triangle[0]],
                        v[emitted_triangle[1]],
                        v[emitted_triangle[2]],
                    ],
                    uv: [
                        uv[emitted_triangle[0]],
                        uv[emitted_triangle[1]],
                        uv[emitted_triangle[2]],
                    ],
                };
                self.size += 1;
            }
        }
    }
}
