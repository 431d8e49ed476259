//! Host texture resource.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::types::{Extent2d, ResourceFormat, Texel};

/// Descriptor for creating a texture.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TextureDesc {
    /// Debug label, usually the producing port spec.
    pub label: String,
    /// Size of the texture.
    pub extent: Extent2d,
    /// Texture format.
    pub format: ResourceFormat,
}

impl TextureDesc {
    /// Create a new descriptor.
    pub fn new(label: impl Into<String>, extent: Extent2d, format: ResourceFormat) -> Self {
        Self {
            label: label.into(),
            extent,
            format,
        }
    }

    /// Whether two descriptors can share backing storage.
    pub fn is_compatible(&self, other: &TextureDesc) -> bool {
        self.extent == other.extent && self.format == other.format
    }
}

struct TextureInner {
    id: u64,
    desc: TextureDesc,
    texels: RwLock<Vec<Texel>>,
}

/// A texture resource.
///
/// Textures are created by a [`Device`](crate::device::Device) and are
/// reference-counted; cloning a `Texture` clones the handle, not the storage.
/// Every format is held as four floats per texel so passes can treat all
/// resources uniformly.
///
/// # Example
///
/// ```
/// use passgraph_graphics::{Device, Extent2d, HostDevice, ResourceFormat, TextureDesc};
///
/// let device = HostDevice::new();
/// let texture = device
///     .create_texture(&TextureDesc::new("color", Extent2d::new(4, 4), ResourceFormat::Rgba32Float))?;
/// texture.fill([0.5, 0.5, 0.5, 1.0]);
/// assert_eq!(texture.load(3, 3), [0.5, 0.5, 0.5, 1.0]);
/// # Ok::<(), passgraph_graphics::DeviceError>(())
/// ```
#[derive(Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    /// Create a zero-initialized texture (called by devices).
    pub(crate) fn new(id: u64, desc: TextureDesc) -> Self {
        let texels = vec![[0.0; 4]; desc.extent.texel_count()];
        Self {
            inner: Arc::new(TextureInner {
                id,
                desc,
                texels: RwLock::new(texels),
            }),
        }
    }

    /// Device-unique identifier of the backing allocation.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Get the texture descriptor.
    pub fn desc(&self) -> &TextureDesc {
        &self.inner.desc
    }

    /// Get the texture size.
    pub fn extent(&self) -> Extent2d {
        self.inner.desc.extent
    }

    /// Get the texture format.
    pub fn format(&self) -> ResourceFormat {
        self.inner.desc.format
    }

    /// Check whether two handles share the same backing storage.
    pub fn same_storage(&self, other: &Texture) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn index(&self, x: u32, y: u32) -> usize {
        let extent = self.extent();
        let x = x.min(extent.width.saturating_sub(1)) as usize;
        let y = y.min(extent.height.saturating_sub(1)) as usize;
        y * extent.width as usize + x
    }

    /// Read one texel. Coordinates are clamped to the edge.
    pub fn load(&self, x: u32, y: u32) -> Texel {
        let index = self.index(x, y);
        self.inner.texels.read()[index]
    }

    /// Write one texel. Coordinates are clamped to the edge.
    pub fn store(&self, x: u32, y: u32, texel: Texel) {
        let index = self.index(x, y);
        self.inner.texels.write()[index] = texel;
    }

    /// Set every texel to `texel`.
    pub fn fill(&self, texel: Texel) {
        self.inner.texels.write().fill(texel);
    }

    /// Run `f` with shared access to the texels, row-major.
    pub fn with_texels<R>(&self, f: impl FnOnce(&[Texel]) -> R) -> R {
        f(&self.inner.texels.read())
    }

    /// Run `f` with exclusive access to the texels, row-major.
    pub fn with_texels_mut<R>(&self, f: impl FnOnce(&mut [Texel]) -> R) -> R {
        f(&mut self.inner.texels.write())
    }

    /// Copy `source` into this texture, resampling with nearest filtering
    /// when the extents differ.
    pub fn copy_from(&self, source: &Texture) {
        if self.same_storage(source) {
            return;
        }
        let src = source.inner.texels.read();
        let mut dst = self.inner.texels.write();
        let (sw, sh) = (source.extent().width as usize, source.extent().height as usize);
        let (dw, dh) = (self.extent().width as usize, self.extent().height as usize);

        if (sw, sh) == (dw, dh) {
            dst.copy_from_slice(&src);
            return;
        }
        for y in 0..dh {
            let sy = y * sh / dh;
            for x in 0..dw {
                let sx = x * sw / dw;
                dst[y * dw + x] = src[sy * sw + sx];
            }
        }
    }

    /// Copy the texels out.
    pub fn snapshot(&self) -> Vec<Texel> {
        self.inner.texels.read().clone()
    }
}

impl std::fmt::Debug for Texture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Texture")
            .field("id", &self.inner.id)
            .field("extent", &self.inner.desc.extent)
            .field("format", &self.inner.desc.format)
            .field("label", &self.inner.desc.label)
            .finish()
    }
}

// Ensure Texture is Send + Sync
static_assertions::assert_impl_all!(Texture: Send, Sync);

#[cfg(test)]
mod tests {
    use super::*;

    fn texture(id: u64, width: u32, height: u32) -> Texture {
        Texture::new(
            id,
            TextureDesc::new("test", Extent2d::new(width, height), ResourceFormat::Rgba32Float),
        )
    }

    #[test]
    fn test_desc_compatibility_ignores_label() {
        let extent = Extent2d::new(4, 4);
        let a = TextureDesc::new("a", extent, ResourceFormat::Rgba32Float);
        assert!(a.is_compatible(&TextureDesc::new("b", extent, ResourceFormat::Rgba32Float)));
        assert!(!a.is_compatible(&TextureDesc::new("a", extent, ResourceFormat::Rgba16Float)));
        assert!(!a.is_compatible(&TextureDesc::new(
            "a",
            Extent2d::new(4, 2),
            ResourceFormat::Rgba32Float
        )));
    }

    #[test]
    fn test_zero_initialized() {
        let tex = texture(0, 3, 2);
        assert_eq!(tex.snapshot(), vec![[0.0; 4]; 6]);
    }

    #[test]
    fn test_load_store_clamps() {
        let tex = texture(0, 2, 2);
        tex.store(1, 1, [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(tex.load(1, 1), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(tex.load(10, 10), [1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_copy_same_extent() {
        let src = texture(0, 2, 2);
        src.fill([0.25; 4]);
        let dst = texture(1, 2, 2);
        dst.copy_from(&src);
        assert_eq!(dst.snapshot(), src.snapshot());
        assert!(!dst.same_storage(&src));
    }

    #[test]
    fn test_copy_resamples_nearest() {
        let src = texture(0, 2, 1);
        src.store(0, 0, [1.0; 4]);
        src.store(1, 0, [2.0; 4]);
        let dst = texture(1, 4, 2);
        dst.copy_from(&src);
        assert_eq!(dst.load(0, 0), [1.0; 4]);
        assert_eq!(dst.load(1, 1), [1.0; 4]);
        assert_eq!(dst.load(2, 0), [2.0; 4]);
        assert_eq!(dst.load(3, 1), [2.0; 4]);
    }

    #[test]
    fn test_copy_from_self_is_noop() {
        let tex = texture(0, 2, 2);
        tex.fill([3.0; 4]);
        let alias = tex.clone();
        tex.copy_from(&alias);
        assert_eq!(tex.load(0, 0), [3.0; 4]);
    }

    #[test]
    fn test_texture_debug() {
        let tex = texture(7, 1920, 1080);
        let debug = format!("{:?}", tex);
        assert!(debug.contains("Texture"));
        assert!(debug.contains("1920"));
    }
}
