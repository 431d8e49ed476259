//! Validating reader over a [`ConfigRecord`].

use std::ops::RangeInclusive;

use super::{ConfigError, ConfigRecord, ConfigValue};

/// A closed enumeration that can be named in a configuration record.
///
/// Usually implemented through [`option_enum!`](crate::option_enum).
pub trait OptionEnum: Sized + Copy + PartialEq + 'static {
    /// Every variant paired with its option name.
    const VARIANTS: &'static [(&'static str, Self)];

    /// Look up a variant by its option name.
    fn from_option_name(name: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| *v)
    }

    /// Option name of this variant.
    fn option_name(self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find(|(_, v)| *v == self)
            .map(|(n, _)| *n)
            .unwrap_or("?")
    }
}

/// Declare a fieldless enum whose variants are addressable by name from a
/// [`ConfigRecord`](crate::config::ConfigRecord).
///
/// The variant identifiers double as option names.
#[macro_export]
macro_rules! option_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $(#[$vmeta:meta])*
                $variant:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $(
                $(#[$vmeta])*
                $variant
            ),+
        }

        impl $crate::config::OptionEnum for $name {
            const VARIANTS: &'static [(&'static str, Self)] = &[
                $((stringify!($variant), $name::$variant)),+
            ];
        }
    };
}

/// Typed, range-checked access to the options of a single owner.
///
/// Construction fails on the first key not listed as known. Every getter
/// returns the supplied default when the key is absent.
#[derive(Debug, Clone, Copy)]
pub struct ConfigReader<'a> {
    owner: &'a str,
    record: &'a ConfigRecord,
}

impl<'a> ConfigReader<'a> {
    /// Create a reader, rejecting any key not in `known`.
    pub fn new(
        owner: &'a str,
        record: &'a ConfigRecord,
        known: &[&str],
    ) -> Result<Self, ConfigError> {
        if let Some((key, _)) = record.iter().find(|(key, _)| !known.contains(key)) {
            return Err(ConfigError::UnknownOption {
                owner: owner.to_string(),
                key: key.to_string(),
            });
        }
        Ok(Self { owner, record })
    }

    /// Build an `InvalidOptionValue` error for `key`.
    ///
    /// Used for checks that span more than one option.
    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::InvalidOptionValue {
            owner: self.owner.to_string(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }

    fn wrong_kind(&self, key: &str, expected: &str, value: &ConfigValue) -> ConfigError {
        self.invalid(
            key,
            format!("expected {expected}, got {} '{value}'", value.kind_name()),
        )
    }

    /// Read a boolean option.
    pub fn bool(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        match self.record.get(key) {
            None => Ok(default),
            Some(ConfigValue::Bool(v)) => Ok(*v),
            Some(other) => Err(self.wrong_kind(key, "bool", other)),
        }
    }

    /// Read an unsigned integer option constrained to `range`.
    pub fn uint(
        &self,
        key: &str,
        default: u32,
        range: RangeInclusive<u32>,
    ) -> Result<u32, ConfigError> {
        let value = match self.record.get(key) {
            None => return Ok(default),
            Some(ConfigValue::Int(v)) => *v,
            Some(other) => return Err(self.wrong_kind(key, "int", other)),
        };
        match u32::try_from(value) {
            Ok(v) if range.contains(&v) => Ok(v),
            _ => Err(self.invalid(
                key,
                format!("{value} is outside {}..={}", range.start(), range.end()),
            )),
        }
    }

    /// Read a floating point option constrained to `range`.
    ///
    /// Integer values are accepted and widened.
    pub fn float(
        &self,
        key: &str,
        default: f32,
        range: RangeInclusive<f32>,
    ) -> Result<f32, ConfigError> {
        let value = match self.record.get(key) {
            None => return Ok(default),
            Some(ConfigValue::Float(v)) => *v as f32,
            Some(ConfigValue::Int(v)) => *v as f32,
            Some(other) => return Err(self.wrong_kind(key, "float", other)),
        };
        if value.is_nan() || !range.contains(&value) {
            return Err(self.invalid(
                key,
                format!("{value} is outside {}..={}", range.start(), range.end()),
            ));
        }
        Ok(value)
    }

    /// Read an enumeration option by variant name.
    pub fn enumeration<E: OptionEnum>(&self, key: &str, default: E) -> Result<E, ConfigError> {
        match self.record.get(key) {
            None => Ok(default),
            Some(ConfigValue::Enum(name)) => E::from_option_name(name).ok_or_else(|| {
                let allowed: Vec<_> = E::VARIANTS.iter().map(|(n, _)| *n).collect();
                self.invalid(
                    key,
                    format!("'{name}' is not one of {}", allowed.join(", ")),
                )
            }),
            Some(other) => Err(self.wrong_kind(key, "enum", other)),
        }
    }

    /// Read a pair of unsigned integers.
    pub fn uint2(&self, key: &str, default: [u32; 2]) -> Result<[u32; 2], ConfigError> {
        match self.record.get(key) {
            None => Ok(default),
            Some(ConfigValue::Uint2(v)) => Ok(*v),
            Some(other) => Err(self.wrong_kind(key, "uint2", other)),
        }
    }
}
