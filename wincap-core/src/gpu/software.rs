//! CPU implementation of the graphics traits
//!
//! Textures are plain `Vec<Pixel>` in row-major BGRA8. Good enough to drive
//! the whole pipeline without a GPU, and exact enough to assert pixel values
//! in tests.

use crate::error::{Result, WincapError};
use crate::gpu::{GraphicsDevice, SwapChain};
use crate::types::{Color, Pixel, Region, Size};

/// CPU-resident BGRA8 texture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareTexture {
    size: Size,
    pixels: Vec<Pixel>,
}

impl SoftwareTexture {
    /// Zero-filled texture (transparent black)
    pub fn new(size: Size) -> Self {
        Self {
            size,
            pixels: vec![Pixel::default(); size.area()],
        }
    }

    /// Texture filled with a single pixel value
    pub fn filled(size: Size, pixel: Pixel) -> Self {
        Self {
            size,
            pixels: vec![pixel; size.area()],
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn pixel(&self, x: u32, y: u32) -> Pixel {
        self.pixels[self.index(x, y)]
    }

    pub fn set_pixel(&mut self, x: u32, y: u32, pixel: Pixel) {
        let i = self.index(x, y);
        self.pixels[i] = pixel;
    }

    pub fn pixels(&self) -> &[Pixel] {
        &self.pixels
    }

    /// Raw BGRA8 bytes, row-major, stride = width * 4
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.pixels)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.size.width as usize + x as usize
    }

    fn row(&self, y: u32, x: u32, width: u32) -> &[Pixel] {
        let start = self.index(x, y);
        &self.pixels[start..start + width as usize]
    }

    fn row_mut(&mut self, y: u32, x: u32, width: u32) -> &mut [Pixel] {
        let start = self.index(x, y);
        &mut self.pixels[start..start + width as usize]
    }
}

fn fits(region: Region, size: Size) -> bool {
    region.x as u64 + region.width as u64 <= size.width as u64
        && region.y as u64 + region.height as u64 <= size.height as u64
}

/// Graphics device backed by system memory
#[derive(Debug, Default, Clone, Copy)]
pub struct SoftwareDevice;

impl SoftwareDevice {
    pub fn new() -> Self {
        Self
    }
}

impl GraphicsDevice for SoftwareDevice {
    type Texture = SoftwareTexture;
    type SwapChain = SoftwareSwapChain;

    fn create_texture(&self, size: Size) -> Result<SoftwareTexture> {
        if size.is_empty() {
            return Err(WincapError::device(format!(
                "Cannot create empty texture ({})",
                size
            )));
        }
        Ok(SoftwareTexture::new(size))
    }

    fn texture_size(&self, texture: &SoftwareTexture) -> Size {
        texture.size
    }

    fn clear(&self, target: &mut SoftwareTexture, color: Color) -> Result<()> {
        target.pixels.fill(color.to_pixel());
        Ok(())
    }

    fn copy_resource(&self, src: &SoftwareTexture, dst: &mut SoftwareTexture) -> Result<()> {
        if src.size != dst.size {
            return Err(WincapError::device(format!(
                "copy_resource size mismatch: {} -> {}",
                src.size, dst.size
            )));
        }
        dst.pixels.copy_from_slice(&src.pixels);
        Ok(())
    }

    fn copy_region(
        &self,
        src: &SoftwareTexture,
        region: Region,
        dst: &mut SoftwareTexture,
    ) -> Result<()> {
        if !fits(region, src.size) || !fits(region, dst.size) {
            return Err(WincapError::device(format!(
                "copy_region {:?} out of bounds ({} -> {})",
                region, src.size, dst.size
            )));
        }
        for y in region.y..region.y + region.height {
            dst.row_mut(y, region.x, region.width)
                .copy_from_slice(src.row(y, region.x, region.width));
        }
        Ok(())
    }

    fn create_swap_chain(&self, size: Size, buffer_count: u32) -> Result<SoftwareSwapChain> {
        SoftwareSwapChain::new(size, buffer_count)
    }
}

/// Swap chain whose buffers live in system memory
#[derive(Debug)]
pub struct SoftwareSwapChain {
    buffers: Vec<SoftwareTexture>,
    size: Size,
    back: usize,
    front: Option<usize>,
    presented: u64,
}

impl SoftwareSwapChain {
    pub fn new(size: Size, buffer_count: u32) -> Result<Self> {
        let mut chain = Self {
            buffers: Vec::new(),
            size,
            back: 0,
            front: None,
            presented: 0,
        };
        chain.resize_buffers(buffer_count, size)?;
        Ok(chain)
    }

    /// Most recently presented buffer
    pub fn front_buffer(&self) -> Option<&SoftwareTexture> {
        self.front.map(|i| &self.buffers[i])
    }

    pub fn presented(&self) -> u64 {
        self.presented
    }
}

impl SwapChain for SoftwareSwapChain {
    type Texture = SoftwareTexture;

    fn size(&self) -> Size {
        self.size
    }

    fn buffer_count(&self) -> u32 {
        self.buffers.len() as u32
    }

    fn resize_buffers(&mut self, buffer_count: u32, size: Size) -> Result<()> {
        if buffer_count < 2 {
            return Err(WincapError::device(format!(
                "Flip swap chain needs at least 2 buffers, got {}",
                buffer_count
            )));
        }
        if size.is_empty() {
            return Err(WincapError::device(format!(
                "Cannot resize swap chain to {}",
                size
            )));
        }
        self.buffers = (0..buffer_count).map(|_| SoftwareTexture::new(size)).collect();
        self.size = size;
        self.back = 0;
        self.front = None;
        Ok(())
    }

    fn back_buffer(&mut self) -> &mut SoftwareTexture {
        &mut self.buffers[self.back]
    }

    fn present(&mut self) -> Result<()> {
        self.front = Some(self.back);
        self.back = (self.back + 1) % self.buffers.len();
        self.presented += 1;
        Ok(())
    }
}
