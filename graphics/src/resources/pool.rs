//! Backing storage for resource slots.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                    ResourcePool                      │
//! │                                                      │
//! │  free:     HashMap<PoolKey, Vec<FreeTexture>>        │
//! │  temporal: HashMap<slot name, TemporalPair>          │
//! │                                                      │
//! │  acquire()          when the producing step runs     │
//! │  release()          after the last reading step      │
//! │  end_frame(trim)    age and drop idle free textures  │
//! │  prepare_temporal() when a plan is installed         │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! Transient textures are recycled by `(format, extent)`: a slot whose
//! lifetime ends before another one starts hands its storage over within the
//! same frame. Temporal slots own two textures each; frame `k` writes
//! `buffers[k % 2]` and feedback readers see `buffers[(k + 1) % 2]`.

use std::collections::HashMap;

use crate::compiler::CompiledPlan;
use crate::device::Device;
use crate::error::DeviceError;
use crate::types::{Extent2d, Lifetime, ResourceFormat};

use super::{Texture, TextureDesc};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PoolKey {
    format: ResourceFormat,
    extent: Extent2d,
}

impl PoolKey {
    fn from_desc(desc: &TextureDesc) -> Self {
        Self {
            format: desc.format,
            extent: desc.extent,
        }
    }
}

#[derive(Debug)]
struct FreeTexture {
    texture: Texture,
    /// Frames spent in the free list without being reused.
    idle_frames: u32,
}

/// Double-buffered storage for one temporal slot.
#[derive(Debug, Clone)]
pub struct TemporalPair {
    desc: TextureDesc,
    buffers: [Texture; 2],
}

impl TemporalPair {
    /// Descriptor both buffers were created with.
    pub fn desc(&self) -> &TextureDesc {
        &self.desc
    }

    /// Buffer written on `frame`.
    pub fn current(&self, frame: u64) -> &Texture {
        &self.buffers[(frame % 2) as usize]
    }

    /// Buffer written on `frame - 1`, read by feedback edges on `frame`.
    pub fn previous(&self, frame: u64) -> &Texture {
        &self.buffers[((frame + 1) % 2) as usize]
    }
}

/// Owns the backing textures of every resource slot.
///
/// # Example
///
/// ```
/// use passgraph_graphics::{Extent2d, HostDevice, ResourceFormat, ResourcePool, TextureDesc};
///
/// let device = HostDevice::new();
/// let mut pool = ResourcePool::new();
/// let desc = TextureDesc::new("a", Extent2d::new(8, 8), ResourceFormat::Rgba16Float);
///
/// let first = pool.acquire(&desc, &device)?;
/// pool.release(first);
/// let second = pool.acquire(&desc, &device)?;
/// assert_eq!(device.allocation_count(), 1);
/// pool.release(second);
/// # Ok::<(), passgraph_graphics::DeviceError>(())
/// ```
#[derive(Debug, Default)]
pub struct ResourcePool {
    free: HashMap<PoolKey, Vec<FreeTexture>>,
    outstanding: usize,
    temporal: HashMap<String, TemporalPair>,
}

impl ResourcePool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    // ── Transient storage ──────────────────────────────────────────────────

    /// Acquire a texture matching `desc`, reusing a free one when possible.
    pub fn acquire(
        &mut self,
        desc: &TextureDesc,
        device: &dyn Device,
    ) -> Result<Texture, DeviceError> {
        let key = PoolKey::from_desc(desc);
        let reused = self.free.get_mut(&key).and_then(Vec::pop);
        let texture = match reused {
            Some(free) => {
                log::trace!("ResourcePool: reusing texture {} for '{}'", free.texture.id(), desc.label);
                free.texture
            }
            None => device.create_texture(desc)?,
        };
        self.outstanding += 1;
        Ok(texture)
    }

    /// Return a transient texture to the free list.
    pub fn release(&mut self, texture: Texture) {
        let key = PoolKey::from_desc(texture.desc());
        self.outstanding = self.outstanding.saturating_sub(1);
        self.free.entry(key).or_default().push(FreeTexture {
            texture,
            idle_frames: 0,
        });
    }

    /// Age the free list and drop textures idle for more than `max_idle_frames`.
    pub fn end_frame(&mut self, max_idle_frames: u32) {
        for bucket in self.free.values_mut() {
            for free in bucket.iter_mut() {
                free.idle_frames += 1;
            }
            bucket.retain(|free| free.idle_frames <= max_idle_frames);
        }
        self.free.retain(|_, bucket| !bucket.is_empty());
    }

    /// Number of transient textures currently handed out.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Number of transient textures waiting in the free list.
    pub fn free_count(&self) -> usize {
        self.free.values().map(Vec::len).sum()
    }

    // ── Temporal storage ───────────────────────────────────────────────────

    /// Allocate double buffers for every temporal slot in `plan`.
    ///
    /// Pairs whose slot name and descriptor are unchanged keep their history;
    /// pairs for slots no longer in the plan are dropped. On error the
    /// previous temporal storage is left untouched.
    pub fn prepare_temporal(
        &mut self,
        plan: &CompiledPlan,
        device: &dyn Device,
    ) -> Result<(), DeviceError> {
        let mut next = HashMap::new();
        for slot in plan.slots().iter().filter(|s| s.lifetime == Lifetime::Temporal) {
            let pair = match self.temporal.get(&slot.name) {
                Some(pair) if pair.desc.is_compatible(&slot.desc) => {
                    log::trace!("ResourcePool: keeping history of '{}'", slot.name);
                    pair.clone()
                }
                _ => TemporalPair {
                    desc: slot.desc.clone(),
                    buffers: [
                        device.create_texture(&slot.desc)?,
                        device.create_texture(&slot.desc)?,
                    ],
                },
            };
            next.insert(slot.name.clone(), pair);
        }
        self.temporal = next;
        Ok(())
    }

    /// Double buffers of a temporal slot.
    pub fn temporal(&self, slot_name: &str) -> Option<&TemporalPair> {
        self.temporal.get(slot_name)
    }

    /// Number of temporal slots with storage.
    pub fn temporal_count(&self) -> usize {
        self.temporal.len()
    }
}
