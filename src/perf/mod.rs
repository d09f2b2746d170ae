/// Performance measurement utilities
/// Each rendering stage is timed and logged for optimization analysis
pub mod profiling;

pub use profiling::{CounterSnapshot, FunctionCounters, FUNCTION_COUNTERS};

use std::time::{Duration, Instant};

pub struct PerfTimer {
    name: &'static str,
    start: Instant,
}

impl PerfTimer {
    #[inline]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            start: Instant::now(),
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        let elapsed = self.elapsed();
        println!("[PERF] {}: {:.2}μs", self.name, elapsed.as_micros());
    }
}

/// Per-frame totals published by the renderer after each submit.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderProfilerData {
    pub width: usize,
    pub height: usize,
    pub draw_call_count: usize,
    pub presented_triangle_count: usize,
    pub depth_test_count: usize,
    pub color_write_count: usize,
    pub object_texture_count: usize,
    pub object_texture_byte_count: usize,
    pub light_count: usize,
}

impl RenderProfilerData {
    pub fn print_summary(&self) {
        println!("\n========== FRAME SUMMARY ==========");
        println!("Frame size:          {:>6}x{}", self.width, self.height);
        println!("Draw calls:          {:10}", self.draw_call_count);
        println!("Triangles presented: {:10}", self.presented_triangle_count);
        println!("Depth tests:         {:10}", self.depth_test_count);
        println!("Color writes:        {:10}", self.color_write_count);
        println!("Textures:            {:10}", self.object_texture_count);
        println!("Texture bytes:       {:10}", self.object_texture_byte_count);
        println!("Lights:              {:10}", self.light_count);
        println!("===================================\n");
    }
}

/// Macro for easy performance measurement
#[macro_export]
macro_rules! perf_scope {
    ($name:expr) => {
        let _timer = $crate::perf::PerfTimer::new($name);
    };
}
