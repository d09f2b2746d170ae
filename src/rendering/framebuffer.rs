/// Frame-sized buffers owned by the renderer: the 8-bit palette index
/// buffer the pixel shaders write, the f64 depth buffer, and the
/// precomputed screen-space dither masks.
use crate::rendering::drawcall::DitheringMode;

/// Mask planes used by Modern dithering; the plane is picked per pixel from
/// the fractional part of the light level.
pub const DITHERING_MODERN_MASK_COUNT: usize = 4;

pub struct DitherBuffer {
    masks: Vec<bool>,
    plane_count: usize,
    mode: DitheringMode,
}

impl DitherBuffer {
    pub fn new(width: usize, height: usize, mode: DitheringMode) -> Self {
        let pixel_count = width * height;
        let (plane_count, masks) = match mode {
            DitheringMode::None => (0, Vec::new()),
            DitheringMode::Classic => {
                // Checkerboard, 50% coverage.
                let mut masks = vec![false; pixel_count];
                for y in 0..height {
                    for x in 0..width {
                        masks[x + (y * width)] = ((x + y) & 1) == 0;
                    }
                }
                (1, masks)
            }
            DitheringMode::Modern => {
                // Four graduated coverage levels: 75%, 50%, 25%, 0%.
                let mut masks = vec![false; pixel_count * DITHERING_MODERN_MASK_COUNT];
                for y in 0..height {
                    for x in 0..width {
                        let index = x + (y * width);
                        let checker = ((x + y) & 1) == 0;
                        masks[index] = checker || ((x % 2 == 1) && (y % 2 == 0));
                        masks[index + pixel_count] = checker;
                        masks[index + (pixel_count * 2)] = (x % 2 == 0) && (y % 2 == 0);
                        // Plane 3 stays false.
                    }
                }
                (DITHERING_MODERN_MASK_COUNT, masks)
            }
        };

        Self {
            masks,
            plane_count,
            mode,
        }
    }

    pub fn mode(&self) -> DitheringMode {
        self.mode
    }

    pub fn plane_count(&self) -> usize {
        self.plane_count
    }

    #[inline]
    pub fn is_set(&self, pixel_index: usize, plane: usize, pixel_count: usize) -> bool {
        debug_assert!(plane < self.plane_count);
        self.masks[pixel_index + (plane * pixel_count)]
    }
}

pub struct FrameBuffers {
    pub width: usize,
    pub height: usize,
    pub width_real: f64,
    pub height_real: f64,
    pub width_real_recip: f64,
    pub height_real_recip: f64,
    pub palette_indices: Vec<u8>,
    pub depth: Vec<f64>,
    pub dither: DitherBuffer,
}

impl FrameBuffers {
    pub fn new(width: usize, height: usize, dithering_mode: DitheringMode) -> Self {
        debug_assert!(width > 0 && height > 0);
        let pixel_count = width * height;
        Self {
            width,
            height,
            width_real: width as f64,
            height_real: height as f64,
            width_real_recip: 1.0 / width as f64,
            height_real_recip: 1.0 / height as f64,
            palette_indices: vec![0; pixel_count],
            depth: vec![f64::INFINITY; pixel_count],
            dither: DitherBuffer::new(width, height, dithering_mode),
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        *self = Self::new(width, height, self.dither.mode());
    }

    pub fn set_dithering_mode(&mut self, mode: DitheringMode) {
        if self.dither.mode() != mode {
            self.dither = DitherBuffer::new(self.width, self.height, mode);
        }
    }

    /// Reset palette indices to 0 and depth to +infinity for a new frame.
    pub fn clear(&mut self) {
        self.palette_indices.fill(0);
        clear_depth(&mut self.depth);
    }
}

/// Fill the depth buffer with +infinity. The wide stores matter here; this
/// runs every frame over the whole buffer.
pub fn clear_depth(depth: &mut [f64]) {
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx") {
            unsafe { clear_depth_avx(depth) };
            return;
        }
        if is_x86_feature_detected!("sse2") {
            unsafe { clear_depth_sse2(depth) };
            return;
        }
    }

    depth.fill(f64::INFINITY);
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx")]
unsafe fn clear_depth_avx(depth: &mut [f64]) {
    use std::arch::x86_64::*;

    let value = _mm256_set1_pd(f64::INFINITY);
    let mut chunks = depth.chunks_exact_mut(4);
    for chunk in &mut chunks {
        _mm256_storeu_pd(chunk.as_mut_ptr(), value);
    }
    for slot in chunks.into_remainder() {
        *slot = f64::INFINITY;
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "sse2")]
unsafe fn clear_depth_sse2(depth: &mut [f64]) {
    use std::arch::x86_64::*;

    let value = _mm_set1_pd(f64::INFINITY);
    let mut chunks = depth.chunks_exact_mut(2);
    for chunk in &mut chunks {
        _mm_storeu_pd(chunk.as_mut_ptr(), value);
    }
    for slot in chunks.into_remainder() {
        *slot = f64::INFINITY;
    }
}
