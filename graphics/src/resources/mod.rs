//! Resources and their backing storage.
//!
//! - [`Texture`] - Reference-counted handle to texel storage
//! - [`ResourcePool`] - Transient free list and temporal double buffers
//!
//! Textures are shared with [`Arc`] and can be sent across threads, so passes
//! may hand them to worker threads for the duration of a submission.
//!
//! [`Arc`]: std::sync::Arc

mod pool;
mod texture;

pub use pool::{ResourcePool, TemporalPair};
pub use texture::{Texture, TextureDesc};
