//! Live preview of the captured window
//!
//! A double-buffered swap chain that mirrors the latest frame. It is driven
//! from the video callback and never waits on the encoder.

use std::sync::Arc;
use tracing::{debug, trace};

use crate::error::{Result, ResultExt};
use crate::gpu::{GraphicsDevice, SwapChain, BUFFER_COUNT};
use crate::types::{Color, Region, Size};

pub struct PreviewSurface<D: GraphicsDevice> {
    device: Arc<D>,
    swap_chain: D::SwapChain,
    background: Color,
    presented: u64,
}

impl<D: GraphicsDevice> PreviewSurface<D> {
    pub fn new(device: Arc<D>, size: Size, background: Color) -> Result<Self> {
        let swap_chain = device
            .create_swap_chain(size, BUFFER_COUNT)
            .context("Creating preview swap chain")?;
        Ok(Self {
            device,
            swap_chain,
            background,
            presented: 0,
        })
    }

    pub fn size(&self) -> Size {
        self.swap_chain.size()
    }

    /// Frames presented so far
    pub fn presented(&self) -> u64 {
        self.presented
    }

    pub fn swap_chain(&self) -> &D::SwapChain {
        &self.swap_chain
    }

    /// Reallocate the presentation buffers at `size`
    pub fn resize(&mut self, size: Size) -> Result<()> {
        debug!("Resizing preview {} -> {}", self.swap_chain.size(), size);
        self.swap_chain
            .resize_buffers(BUFFER_COUNT, size)
            .context("Resizing preview buffers")
    }

    /// Copy the valid part of `surface` into the back buffer and present it
    pub fn present_frame(&mut self, surface: &D::Texture, valid: Region) -> Result<()> {
        let region = valid.clamp_to(self.swap_chain.size());
        let back = self.swap_chain.back_buffer();
        self.device.clear(back, self.background)?;
        if !region.is_empty() {
            self.device.copy_region(surface, region, back)?;
        }
        self.swap_chain.present()?;
        self.presented += 1;
        trace!("Preview presented frame {}", self.presented);
        Ok(())
    }
}
