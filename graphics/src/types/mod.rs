//! Common types for graph resources.
//!
//! This module contains the format enum and format sets used for
//! negotiation, extents and size policies, and lifetime classes.

mod format;
mod size;

pub use format::{FormatSet, ResourceFormat};
pub use size::{luminance, Extent2d, IoSize, Lifetime, SizePolicy, Texel};
