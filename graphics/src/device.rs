//! Resource-creating devices.
//!
//! The [`Device`] trait is the only backend surface the graph needs: the
//! resource pool asks it for textures and nothing else. [`HostDevice`] keeps
//! texture storage in host memory and counts every allocation, which makes it
//! suitable both for running graphs without a GPU and for observing pool reuse
//! in tests.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::DeviceError;
use crate::resources::{Texture, TextureDesc};

/// Largest texture dimension any device accepts.
pub const MAX_TEXTURE_DIMENSION: u32 = 16384;

/// A device that can create textures.
pub trait Device: Send + Sync {
    /// Get the device name.
    fn name(&self) -> &str;

    /// Create a zero-initialized texture.
    ///
    /// # Errors
    ///
    /// Returns an error if the descriptor exceeds device limits or
    /// allocation fails.
    fn create_texture(&self, desc: &TextureDesc) -> Result<Texture, DeviceError>;
}

/// Device backed by host memory.
///
/// # Example
///
/// ```
/// use passgraph_graphics::{Device, Extent2d, HostDevice, ResourceFormat, TextureDesc};
///
/// let device = HostDevice::new().with_allocation_limit(1);
/// let desc = TextureDesc::new("a", Extent2d::new(2, 2), ResourceFormat::R32Float);
/// assert!(device.create_texture(&desc).is_ok());
/// assert!(device.create_texture(&desc).is_err());
/// assert_eq!(device.allocation_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct HostDevice {
    allocations: AtomicU64,
    allocation_limit: Option<u64>,
}

impl HostDevice {
    /// Create a new device without an allocation limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail with [`DeviceError::OutOfMemory`] once `limit` textures have been created.
    pub fn with_allocation_limit(mut self, limit: u64) -> Self {
        self.allocation_limit = Some(limit);
        self
    }

    /// Total number of textures created so far.
    pub fn allocation_count(&self) -> u64 {
        self.allocations.load(Ordering::Acquire)
    }
}

impl Device for HostDevice {
    fn name(&self) -> &str {
        "Host"
    }

    fn create_texture(&self, desc: &TextureDesc) -> Result<Texture, DeviceError> {
        let extent = desc.extent;
        if extent.width == 0
            || extent.height == 0
            || extent.width > MAX_TEXTURE_DIMENSION
            || extent.height > MAX_TEXTURE_DIMENSION
        {
            return Err(DeviceError::ResourceCreationFailed(format!(
                "texture '{}' has unsupported extent {}",
                desc.label, extent
            )));
        }

        let reserved = self
            .allocations
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                match self.allocation_limit {
                    Some(limit) if count >= limit => None,
                    _ => Some(count + 1),
                }
            });
        let id = reserved.map_err(|_| DeviceError::OutOfMemory)?;

        log::trace!(
            "HostDevice: creating texture {:?} ({}, {:?})",
            desc.label,
            extent,
            desc.format
        );
        Ok(Texture::new(id, desc.clone()))
    }
}

static_assertions::assert_impl_all!(HostDevice: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Extent2d, ResourceFormat};

    fn desc(width: u32, height: u32) -> TextureDesc {
        TextureDesc::new("test", Extent2d::new(width, height), ResourceFormat::Rgba32Float)
    }

    #[test]
    fn test_counts_allocations() {
        let device = HostDevice::new();
        let a = device.create_texture(&desc(4, 4)).unwrap();
        let b = device.create_texture(&desc(4, 4)).unwrap();
        assert_eq!(device.allocation_count(), 2);
        assert_ne!(a.id(), b.id());
        assert_eq!(device.name(), "Host");
    }

    #[test]
    fn test_allocation_limit() {
        let device = HostDevice::new().with_allocation_limit(2);
        device.create_texture(&desc(1, 1)).unwrap();
        device.create_texture(&desc(1, 1)).unwrap();
        assert_eq!(
            device.create_texture(&desc(1, 1)).unwrap_err(),
            DeviceError::OutOfMemory
        );
        assert_eq!(device.allocation_count(), 2);
    }

    #[test]
    fn test_rejects_bad_extent() {
        let device = HostDevice::new();
        assert!(matches!(
            device.create_texture(&desc(0, 4)),
            Err(DeviceError::ResourceCreationFailed(_))
        ));
        assert!(device.create_texture(&desc(MAX_TEXTURE_DIMENSION + 1, 1)).is_err());
        assert_eq!(device.allocation_count(), 0);
    }
}
