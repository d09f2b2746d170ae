use glam::DVec3;

/// Point light with linear falloff: full intensity inside `start_radius`,
/// zero beyond `end_radius`, linear in between. The radius difference and
/// its reciprocal are precomputed at set time for the per-pixel loop.
#[derive(Debug, Clone, Copy)]
pub struct Light {
    pub world_point: DVec3,
    pub start_radius: f64,
    pub end_radius: f64,
    pub radius_diff: f64,
    pub radius_diff_recip: f64,
}

impl Light {
    pub fn new() -> Self {
        Self {
            world_point: DVec3::ZERO,
            start_radius: 0.0,
            end_radius: 0.0,
            radius_diff: 0.0,
            radius_diff_recip: 0.0,
        }
    }

    pub fn set_position(&mut self, world_point: DVec3) {
        self.world_point = world_point;
    }

    /// Equal radii degrade to a step function (reciprocal forced to zero);
    /// the falloff branches never consult the reciprocal in that case.
    pub fn set_radius(&mut self, start_radius: f64, end_radius: f64) {
        debug_assert!(start_radius >= 0.0);
        debug_assert!(end_radius >= start_radius);
        self.start_radius = start_radius;
        self.end_radius = end_radius;
        self.radius_diff = end_radius - start_radius;
        self.radius_diff_recip = if self.radius_diff > 0.0 {
            1.0 / self.radius_diff
        } else {
            0.0
        };
    }

    /// Intensity contribution of this light at a world-space point, in [0, 1].
    #[inline]
    pub fn intensity_at(&self, point: DVec3) -> f64 {
        let distance = (self.world_point - point).length();
        if distance <= self.start_radius {
            1.0
        } else if distance >= self.end_radius {
            0.0
        } else {
            let percent = (distance - self.start_radius) * self.radius_diff_recip;
            (1.0 - percent).clamp(0.0, 1.0)
        }
    }
}

impl Default for Light {
    fn default() -> Self {
        Self::new()
    }
}
