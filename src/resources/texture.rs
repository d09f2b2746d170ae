/// Texel storage for the renderer: 8-bit palette-indexed or packed 32-bit
/// color, addressed by ID from draw calls and frame settings.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelFormat {
    /// 1 byte per texel, an index into the frame's color palette.
    Palette,
    /// 4 bytes per texel, packed 32-bit color.
    TrueColor,
}

impl TexelFormat {
    pub fn bytes_per_texel(self) -> usize {
        match self {
            TexelFormat::Palette => 1,
            TexelFormat::TrueColor => 4,
        }
    }
}

pub enum TexelBuffer {
    Palette(Vec<u8>),
    TrueColor(Vec<u32>),
}

pub struct ObjectTexture {
    pub texels: TexelBuffer,
    pub width: usize,
    pub height: usize,
    pub width_real: f64,
    pub height_real: f64,
    pub texel_count: usize,
}

impl ObjectTexture {
    pub fn new(width: usize, height: usize, format: TexelFormat) -> Self {
        debug_assert!(width > 0);
        debug_assert!(height > 0);
        let texel_count = width * height;
        let texels = match format {
            TexelFormat::Palette => TexelBuffer::Palette(vec![0; texel_count]),
            TexelFormat::TrueColor => TexelBuffer::TrueColor(vec![0; texel_count]),
        };

        Self {
            texels,
            width,
            height,
            width_real: width as f64,
            height_real: height as f64,
            texel_count,
        }
    }

    pub fn format(&self) -> TexelFormat {
        match self.texels {
            TexelBuffer::Palette(_) => TexelFormat::Palette,
            TexelBuffer::TrueColor(_) => TexelFormat::TrueColor,
        }
    }

    pub fn byte_count(&self) -> usize {
        self.texel_count * self.format().bytes_per_texel()
    }

    /// Palette-indexed texels. Draw calls that sample this texture as a
    /// palette texture while it holds true-color data are a caller contract
    /// violation.
    pub fn texels8(&self) -> &[u8] {
        match &self.texels {
            TexelBuffer::Palette(texels) => texels,
            TexelBuffer::TrueColor(_) => {
                panic!("texture sampled as palette-indexed but holds 32-bit color")
            }
        }
    }

    pub fn texels8_mut(&mut self) -> &mut [u8] {
        match &mut self.texels {
            TexelBuffer::Palette(texels) => texels,
            TexelBuffer::TrueColor(_) => {
                panic!("texture sampled as palette-indexed but holds 32-bit color")
            }
        }
    }

    pub fn texels32(&self) -> &[u32] {
        match &self.texels {
            TexelBuffer::TrueColor(texels) => texels,
            TexelBuffer::Palette(_) => {
                panic!("texture sampled as 32-bit color but holds palette indices")
            }
        }
    }

    pub fn texels32_mut(&mut self) -> &mut [u32] {
        match &mut self.texels {
            TexelBuffer::TrueColor(texels) => texels,
            TexelBuffer::Palette(_) => {
                panic!("texture sampled as 32-bit color but holds palette indices")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texture_dims_and_format() {
        let texture = ObjectTexture::new(4, 8, TexelFormat::Palette);
        assert_eq!(texture.texel_count, 32);
        assert_eq!(texture.byte_count(), 32);
        assert_eq!(texture.texels8().len(), 32);
        assert_eq!(texture.format(), TexelFormat::Palette);

        let texture = ObjectTexture::new(2, 2, TexelFormat::TrueColor);
        assert_eq!(texture.byte_count(), 16);
        assert_eq!(texture.texels32().len(), 4);
    }
}
