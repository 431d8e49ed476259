//! Configuration records for pass construction.
//!
//! Passes are configured from a generic key/value [`ConfigRecord`] at the
//! boundary (script front ends, command lines, tests) and validated exactly
//! once into a per-pass settings struct using [`ConfigReader`].
//!
//! # Example
//!
//! ```
//! use passgraph_core::config::{ConfigReader, ConfigRecord, ConfigValue};
//! use passgraph_core::option_enum;
//!
//! option_enum! {
//!     /// Precision used for accumulation.
//!     pub enum Precision {
//!         Single,
//!         Double,
//!     }
//! }
//!
//! let record = ConfigRecord::new()
//!     .with("enabled", false)
//!     .with("precisionMode", ConfigValue::enumeration("Double"));
//!
//! let reader =ConfigReader::new("AccumulatePass", &record, &["enabled", "precisionMode"])?;
//! assert!(!reader.bool("enabled", true)?);
//! assert_eq!(reader.enumeration("precisionMode", Precision::Single)?, Precision::Double);
//! # Ok::<(), passgraph_core::config::ConfigError>(())
//! ```

mod error;
mod reader;
mod value;

pub use error::ConfigError;
pub use reader::{ConfigReader, OptionEnum};
pub use value::{ConfigRecord, ConfigValue};
