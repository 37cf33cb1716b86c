//! Graphics device abstraction
//!
//! The pipeline only needs a handful of operations from the GPU: allocate a
//! 2D BGRA texture, clear it, copy whole or partial textures, and present via
//! a swap chain. Platform backends implement [`GraphicsDevice`]; the
//! [`software`] module provides a CPU implementation used for tests and dry
//! runs.

pub mod software;

pub use software::{SoftwareDevice, SoftwareSwapChain, SoftwareTexture};

use crate::error::Result;
use crate::types::{Color, Region, Size};

/// Number of buffers in the preview swap chain and capture frame pool
pub const BUFFER_COUNT: u32 = 2;

/// Device able to allocate and copy BGRA8 textures
pub trait GraphicsDevice: Send + Sync + 'static {
    /// 2D pixel buffer owned by this device
    type Texture: Send + 'static;
    /// Presentation chain producing textures of the same kind
    type SwapChain: SwapChain<Texture = Self::Texture>;

    /// Allocate a texture of `size`. Contents are unspecified until cleared.
    fn create_texture(&self, size: Size) -> Result<Self::Texture>;

    fn texture_size(&self, texture: &Self::Texture) -> Size;

    /// Fill the whole texture with a solid color
    fn clear(&self, target: &mut Self::Texture, color: Color) -> Result<()>;

    /// Copy all of `src` into `dst`. Both must be the same size.
    fn copy_resource(&self, src: &Self::Texture, dst: &mut Self::Texture) -> Result<()>;

    /// Copy `region` of `src` into the same position in `dst`.
    ///
    /// The region must lie inside both textures.
    fn copy_region(&self, src: &Self::Texture, region: Region, dst: &mut Self::Texture)
        -> Result<()>;

    fn create_swap_chain(&self, size: Size, buffer_count: u32) -> Result<Self::SwapChain>;
}

/// Flip-model presentation chain
pub trait SwapChain: Send + 'static {
    type Texture;

    fn size(&self) -> Size;

    fn buffer_count(&self) -> u32;

    /// Reallocate every buffer at `size`. Previous contents are lost.
    fn resize_buffers(&mut self, buffer_count: u32, size: Size) -> Result<()>;

    /// Buffer that the next `present` will show
    fn back_buffer(&mut self) -> &mut Self::Texture;

    fn present(&mut self) -> Result<()>;
}
