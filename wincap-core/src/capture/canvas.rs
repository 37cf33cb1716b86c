//! Blank background behind captured content

use tracing::debug;

use crate::error::Result;
use crate::gpu::GraphicsDevice;
use crate::types::{Color, Region, Size};

/// Texture sized to the initial capture region, cleared once to a solid color.
///
/// Every exported frame starts as a copy of the canvas so pixels outside the
/// valid content rectangle are deterministic.
pub struct BlankCanvas<T> {
    texture: T,
    size: Size,
    color: Color,
}

impl<T> BlankCanvas<T> {
    pub fn new<D>(device: &D, size: Size, color: Color) -> Result<Self>
    where
        D: GraphicsDevice<Texture = T>,
    {
        let mut texture = device.create_texture(size)?;
        device.clear(&mut texture, color)?;
        debug!("Blank canvas {} cleared to {:?}", size, color);
        Ok(Self {
            texture,
            size,
            color,
        })
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn texture(&self) -> &T {
        &self.texture
    }

    /// Fill `target` with the canvas.
    ///
    /// Same-sized targets get an exact copy. Anything else is cleared to the
    /// canvas color and receives the overlapping part of the canvas.
    pub fn paint<D>(&self, device: &D, target: &mut T) -> Result<()>
    where
        D: GraphicsDevice<Texture = T>,
    {
        let target_size = device.texture_size(target);
        if target_size == self.size {
            return device.copy_resource(&self.texture, target);
        }

        device.clear(target, self.color)?;
        let overlap = Region::from_size(self.size.min(target_size));
        if !overlap.is_empty() {
            device.copy_region(&self.texture, overlap, target)?;
        }
        Ok(())
    }
}
