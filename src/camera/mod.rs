/// Per-frame camera state for the software pipeline.
/// All pipeline math runs in f64; matrices and their inverses are computed
/// once when the camera is built, never per vertex.
use glam::{DMat4, DVec3, DVec4};

#[derive(Debug, Clone, Copy)]
pub struct RenderCamera {
    pub world_point: DVec3,
    pub forward: DVec3,
    pub right: DVec3,
    pub up: DVec3,
    pub fov_y: f64,
    pub aspect_ratio: f64,
    pub view: DMat4,
    pub projection: DMat4,
    pub inverse_view: DMat4,
    pub inverse_projection: DMat4,
    pub view_projection: DMat4,
    /// Projection of the camera-level horizon point, used by the
    /// mirror-reflection pixel shader to locate the reflection axis.
    pub horizon_ndc_point: DVec3,
}

impl RenderCamera {
    pub fn new(
        world_point: DVec3,
        forward: DVec3,
        fov_y: f64,
        aspect_ratio: f64,
        near: f64,
        far: f64,
    ) -> Self {
        debug_assert!(fov_y > 0.0);
        debug_assert!(aspect_ratio > 0.0);
        debug_assert!(near > 0.0 && far > near);

        let forward = forward.normalize();
        let right = forward.cross(DVec3::Y).normalize();
        let up = right.cross(forward).normalize();

        let view = DMat4::look_to_rh(world_point, forward, DVec3::Y);
        let projection = DMat4::perspective_rh(fov_y, aspect_ratio, near, far);
        let inverse_view = view.inverse();
        let inverse_projection = projection.inverse();
        let view_projection = projection * view;

        let horizon_ndc_point =
            Self::horizon_ndc_point(world_point, forward, &view_projection);

        Self {
            world_point,
            forward,
            right,
            up,
            fov_y,
            aspect_ratio,
            view,
            projection,
            inverse_view,
            inverse_projection,
            view_projection,
            horizon_ndc_point,
        }
    }

    /// Project the point one unit along the camera's horizontal forward
    /// direction. A camera looking straight down has no horizontal forward;
    /// fall back to the raw forward vector.
    fn horizon_ndc_point(eye: DVec3, forward: DVec3, view_projection: &DMat4) -> DVec3 {
        let flat = DVec3::new(forward.x, 0.0, forward.z);
        let horizon_dir = if flat.length_squared() > 1.0e-12 {
            flat.normalize()
        } else {
            forward
        };

        let horizon_world = eye + horizon_dir;
        let clip =
            *view_projection * DVec4::new(horizon_world.x, horizon_world.y, horizon_world.z, 1.0);
        if clip.w.abs() < 1.0e-12 {
            return DVec3::ZERO;
        }

        let w_recip = 1.0 / clip.w;
        DVec3::new(clip.x * w_recip, clip.y * w_recip, clip.z * w_recip)
    }
}
