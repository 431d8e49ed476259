//! Resource formats and format sets.

use bitflags::bitflags;

/// Concrete format of a resource slot.
///
/// Declaration order doubles as the negotiation order: when a producer's
/// preferred format is not acceptable, the lowest common format wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum ResourceFormat {
    /// 8-bit red channel, unsigned normalized.
    R8Unorm,
    /// 32-bit red channel, float.
    R32Float,
    /// 32-bit red channel, unsigned integer.
    R32Uint,
    /// 16-bit RG channels, float.
    Rg16Float,
    /// 32-bit RG channels, float.
    Rg32Float,
    /// 32-bit RG channels, unsigned integer.
    Rg32Uint,
    /// 8-bit RGBA channels, unsigned normalized.
    Rgba8Unorm,
    /// 8-bit RGBA channels, sRGB.
    Rgba8UnormSrgb,
    /// 16-bit RGBA channels, float.
    Rgba16Float,
    /// 32-bit RGBA channels, float.
    #[default]
    Rgba32Float,
    /// 32-bit RGBA channels, unsigned integer.
    Rgba32Uint,
    /// 32-bit depth, float.
    Depth32Float,
}

impl ResourceFormat {
    /// Every format, in negotiation order.
    pub const ALL: [ResourceFormat; 12] = [
        Self::R8Unorm,
        Self::R32Float,
        Self::R32Uint,
        Self::Rg16Float,
        Self::Rg32Float,
        Self::Rg32Uint,
        Self::Rgba8Unorm,
        Self::Rgba8UnormSrgb,
        Self::Rgba16Float,
        Self::Rgba32Float,
        Self::Rgba32Uint,
        Self::Depth32Float,
    ];

    /// Number of meaningful channels.
    pub fn channel_count(&self) -> u32 {
        match self {
            Self::R8Unorm | Self::R32Float | Self::R32Uint | Self::Depth32Float => 1,
            Self::Rg16Float | Self::Rg32Float | Self::Rg32Uint => 2,
            Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Rgba16Float
            | Self::Rgba32Float
            | Self::Rgba32Uint => 4,
        }
    }

    /// Returns the size in bytes per texel.
    pub fn block_size(&self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::R32Float
            | Self::R32Uint
            | Self::Rg16Float
            | Self::Rgba8Unorm
            | Self::Rgba8UnormSrgb
            | Self::Depth32Float => 4,
            Self::Rg32Float | Self::Rg32Uint | Self::Rgba16Float => 8,
            Self::Rgba32Float | Self::Rgba32Uint => 16,
        }
    }

    /// Returns true if this is a depth format.
    pub fn is_depth(&self) -> bool {
        matches!(self, Self::Depth32Float)
    }

    /// Single-format set containing only this format.
    pub fn as_set(self) -> FormatSet {
        match self {
            Self::R8Unorm => FormatSet::R8_UNORM,
            Self::R32Float => FormatSet::R32_FLOAT,
            Self::R32Uint => FormatSet::R32_UINT,
            Self::Rg16Float => FormatSet::RG16_FLOAT,
            Self::Rg32Float => FormatSet::RG32_FLOAT,
            Self::Rg32Uint => FormatSet::RG32_UINT,
            Self::Rgba8Unorm => FormatSet::RGBA8_UNORM,
            Self::Rgba8UnormSrgb => FormatSet::RGBA8_UNORM_SRGB,
            Self::Rgba16Float => FormatSet::RGBA16_FLOAT,
            Self::Rgba32Float => FormatSet::RGBA32_FLOAT,
            Self::Rgba32Uint => FormatSet::RGBA32_UINT,
            Self::Depth32Float => FormatSet::DEPTH32_FLOAT,
        }
    }
}

bitflags! {
    /// Set of formats a port can produce or accept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FormatSet: u32 {
        const R8_UNORM = 1 << 0;
        const R32_FLOAT = 1 << 1;
        const R32_UINT = 1 << 2;
        const RG16_FLOAT = 1 << 3;
        const RG32_FLOAT = 1 << 4;
        const RG32_UINT = 1 << 5;
        const RGBA8_UNORM = 1 << 6;
        const RGBA8_UNORM_SRGB = 1 << 7;
        const RGBA16_FLOAT = 1 << 8;
        const RGBA32_FLOAT = 1 << 9;
        const RGBA32_UINT = 1 << 10;
        const DEPTH32_FLOAT = 1 << 11;

        /// Any four-channel color format.
        const COLOR = Self::RGBA8_UNORM.bits()
            | Self::RGBA8_UNORM_SRGB.bits()
            | Self::RGBA16_FLOAT.bits()
            | Self::RGBA32_FLOAT.bits();
        /// High dynamic range color.
        const HDR_COLOR = Self::RGBA16_FLOAT.bits() | Self::RGBA32_FLOAT.bits();
        /// Single-channel depth, either as a depth target or a float image.
        const DEPTH = Self::DEPTH32_FLOAT.bits() | Self::R32_FLOAT.bits();
        /// Two-channel motion vectors.
        const MOTION = Self::RG16_FLOAT.bits() | Self::RG32_FLOAT.bits();
    }
}

impl Default for FormatSet {
    fn default() -> Self {
        Self::empty()
    }
}

impl FormatSet {
    /// Check whether `format` is a member.
    pub fn contains_format(&self, format: ResourceFormat) -> bool {
        self.contains(format.as_set())
    }

    /// Lowest member in negotiation order.
    pub fn first(&self) -> Option<ResourceFormat> {
        self.iter_formats().next()
    }

    /// Iterate over members in negotiation order.
    pub fn iter_formats(&self) -> impl Iterator<Item = ResourceFormat> + '_ {
        ResourceFormat::ALL
            .into_iter()
            .filter(move |format| self.contains_format(*format))
    }
}

impl From<ResourceFormat> for FormatSet {
    fn from(format: ResourceFormat) -> Self {
        format.as_set()
    }
}
