/// Instrumentation and profiling infrastructure for microoptimization
/// Provides function call counting across the pipeline stages
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe performance counters for function call tracking
pub struct FunctionCounters {
    // Frame and batch counters
    pub submit_frame_calls: AtomicU64,
    pub mesh_cache_populate_calls: AtomicU64,
    pub vertex_shader_mesh_calls: AtomicU64,
    pub clip_mesh_calls: AtomicU64,
    pub clipped_triangles_generated: AtomicU64,

    // Rasterization counters
    pub raster_triangle_calls: AtomicU64,
    pub raster_triangle_culled: AtomicU64,
    pub raster_triangle_offscreen: AtomicU64,
    pub pixel_coverage_tests: AtomicU64,
    pub depth_test_passed: AtomicU64,
    pub depth_test_failed: AtomicU64,

    // Framebuffer counters
    pub framebuffer_clear_calls: AtomicU64,
}

impl FunctionCounters {
    pub const fn new() -> Self {
        Self {
            submit_frame_calls: AtomicU64::new(0),
            mesh_cache_populate_calls: AtomicU64::new(0),
            vertex_shader_mesh_calls: AtomicU64::new(0),
            clip_mesh_calls: AtomicU64::new(0),
            clipped_triangles_generated: AtomicU64::new(0),
            raster_triangle_calls: AtomicU64::new(0),
            raster_triangle_culled: AtomicU64::new(0),
            raster_triangle_offscreen: AtomicU64::new(0),
            pixel_coverage_tests: AtomicU64::new(0),
            depth_test_passed: AtomicU64::new(0),
            depth_test_failed: AtomicU64::new(0),
            framebuffer_clear_calls: AtomicU64::new(0),
        }
    }

    /// Reset all counters to zero
    pub fn reset(&self) {
        self.submit_frame_calls.store(0, Ordering::Relaxed);
        self.mesh_cache_populate_calls.store(0, Ordering::Relaxed);
        self.vertex_shader_mesh_calls.store(0, Ordering::Relaxed);
        self.clip_mesh_calls.store(0, Ordering::Relaxed);
        self.clipped_triangles_generated.store(0, Ordering::Relaxed);
        self.raster_triangle_calls.store(0, Ordering::Relaxed);
        self.raster_triangle_culled.store(0, Ordering::Relaxed);
        self.raster_triangle_offscreen.store(0, Ordering::Relaxed);
        self.pixel_coverage_tests.store(0, Ordering::Relaxed);
        self.depth_test_passed.store(0, Ordering::Relaxed);
        self.depth_test_failed.store(0, Ordering::Relaxed);
        self.framebuffer_clear_calls.store(0, Ordering::Relaxed);
    }

    /// Get snapshot of all counters
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            submit_frame_calls: self.submit_frame_calls.load(Ordering::Relaxed),
            mesh_cache_populate_calls: self.mesh_cache_populate_calls.load(Ordering::Relaxed),
            vertex_shader_mesh_calls: self.vertex_shader_mesh_calls.load(Ordering::Relaxed),
            clip_mesh_calls: self.clip_mesh_calls.load(Ordering::Relaxed),
            clipped_triangles_generated: self.clipped_triangles_generated.load(Ordering::Relaxed),
            raster_triangle_calls: self.raster_triangle_calls.load(Ordering::Relaxed),
            raster_triangle_culled: self.raster_triangle_culled.load(Ordering::Relaxed),
            raster_triangle_offscreen: self.raster_triangle_offscreen.load(Ordering::Relaxed),
            pixel_coverage_tests: self.pixel_coverage_tests.load(Ordering::Relaxed),
            depth_test_passed: self.depth_test_passed.load(Ordering::Relaxed),
            depth_test_failed: self.depth_test_failed.load(Ordering::Relaxed),
            framebuffer_clear_calls: self.framebuffer_clear_calls.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of counter values at a point in time
#[derive(Debug, Clone, Copy)]
pub struct CounterSnapshot {
    pub submit_frame_calls: u64,
    pub mesh_cache_populate_calls: u64,
    pub vertex_shader_mesh_calls: u64,
    pub clip_mesh_calls: u64,
    pub clipped_triangles_generated: u64,
    pub raster_triangle_calls: u64,
    pub raster_triangle_culled: u64,
    pub raster_triangle_offscreen: u64,
    pub pixel_coverage_tests: u64,
    pub depth_test_passed: u64,
    pub depth_test_failed: u64,
    pub framebuffer_clear_calls: u64,
}

impl CounterSnapshot {
    /// Print formatted report
    pub fn print_report(&self) {
        println!("\n=== Performance Counters Report ===");
        println!("\nBatch Operations:");
        println!("  submit_frame calls:         {:12}", self.submit_frame_calls);
        println!("  mesh caches populated:      {:12}", self.mesh_cache_populate_calls);
        println!("  vertex shader mesh passes:  {:12}", self.vertex_shader_mesh_calls);
        println!("  clip mesh passes:           {:12}", self.clip_mesh_calls);
        println!("  clipped triangles produced: {:12}", self.clipped_triangles_generated);

        println!("\nRasterization Operations:");
        println!("  raster triangle calls:      {:12}", self.raster_triangle_calls);
        println!("  triangles back-face culled: {:12}", self.raster_triangle_culled);
        println!("  triangles off screen:       {:12}", self.raster_triangle_offscreen);

        println!("\nPixel Operations:");
        println!("  coverage tests:             {:12}", self.pixel_coverage_tests);
        println!("  depth test passed:          {:12}", self.depth_test_passed);
        println!("  depth test failed:          {:12}", self.depth_test_failed);
        let depth_tests = self.depth_test_passed + self.depth_test_failed;
        if depth_tests > 0 {
            let pass_rate = (self.depth_test_passed as f64 / depth_tests as f64) * 100.0;
            println!("  depth test pass rate:       {:11.2}%", pass_rate);
        }

        println!("\nFramebuffer Operations:");
        println!("  framebuffer clear calls:    {:12}", self.framebuffer_clear_calls);

        println!();
    }
}

/// Global function counters instance
pub static FUNCTION_COUNTERS: FunctionCounters = FunctionCounters::new();

/// Macro for incrementing a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_call {
    ($counter:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        }
    };
}

/// Macro for adding to a counter (only when profiling feature is enabled)
#[macro_export]
macro_rules! count_add {
    ($counter:expr, $value:expr) => {
        #[cfg(feature = "profiling")]
        {
            $counter.fetch_add($value, std::sync::atomic::Ordering::Relaxed);
        }
    };
}
