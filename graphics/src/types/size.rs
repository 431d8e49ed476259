//! Extents, size policies and lifetime classes.

use passgraph_core::option_enum;

/// 2D extent in texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct Extent2d {
    /// Width in texels.
    pub width: u32,
    /// Height in texels.
    pub height: u32,
}

impl Extent2d {
    /// Create a new extent.
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total number of texels.
    pub fn texel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

impl From<[u32; 2]> for Extent2d {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl std::fmt::Display for Extent2d {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// A single texel value. Every format is stored as four floats on the host.
pub type Texel = [f32; 4];

/// Rec. 709 luminance of a linear RGB texel.
pub fn luminance(texel: &Texel) -> f32 {
    0.2126 * texel[0] + 0.7152 * texel[1] + 0.0722 * texel[2]
}

option_enum! {
    /// The `outputSize` option shared by passes that produce images.
    #[derive(Default)]
    pub enum IoSize {
        /// Match the swap-chain (or the pass's own default).
        #[default]
        Default,
        /// Use the `fixedOutputSize` option.
        Fixed,
        /// Full swap-chain resolution.
        Full,
        /// Half resolution.
        Half,
        /// Quarter resolution.
        Quarter,
        /// Twice the swap-chain resolution.
        Double,
    }
}

/// How an output port's dimensions are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SizePolicy {
    /// Match the swap-chain extent.
    #[default]
    Default,
    /// Explicit size in texels.
    Fixed(Extent2d),
    /// Scaled swap-chain extent, `extent * num / den`.
    Relative {
        /// Scale numerator.
        num: u32,
        /// Scale denominator.
        den: u32,
    },
}

impl SizePolicy {
    /// Build a policy from the `outputSize`/`fixedOutputSize` option pair.
    pub fn from_io_size(size: IoSize, fixed: [u32; 2]) -> Self {
        match size {
            IoSize::Default => Self::Default,
            IoSize::Fixed => Self::Fixed(Extent2d::from(fixed)),
            IoSize::Full => Self::Relative { num: 1, den: 1 },
            IoSize::Half => Self::Relative { num: 1, den: 2 },
            IoSize::Quarter => Self::Relative { num: 1, den: 4 },
            IoSize::Double => Self::Relative { num: 2, den: 1 },
        }
    }

    /// Resolve against the swap-chain extent. Dimensions never drop below 1.
    pub fn resolve(&self, swap_chain: Extent2d) -> Extent2d {
        let extent = match *self {
            Self::Default => swap_chain,
            Self::Fixed(extent) => extent,
            Self::Relative { num, den } => {
                let den = den.max(1) as u64;
                let scale = |v: u32| (v as u64 * num as u64 / den).min(u32::MAX as u64) as u32;
                Extent2d::new(scale(swap_chain.width), scale(swap_chain.height))
            }
        };
        Extent2d::new(extent.width.max(1), extent.height.max(1))
    }
}

/// Lifetime class of a resource slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Lifetime {
    /// Lives only within one frame; storage is recycled through the pool.
    #[default]
    Transient,
    /// Survives across frames, double buffered for feedback reads.
    Temporal,
}
