//! # eagercache core
//!
//! Errors, constants, and traits shared by the eagercache crates.
//!
//! - **Errors**: `EagerError` and the `Result` alias
//! - **Constants**: default intervals and environment keys
//! - **Traits**: `Loader` (fills a cache) and `Sweep` (what a registry sweeps)
//! - **Types**: reports returned by sweep passes
//!
//! ## Example
//!
//! ```rust
//! use eager_core::{Loader, Result};
//!
//! let loader = |key: &str| -> Result<String> { Ok(key.to_uppercase()) };
//! assert_eq!(loader.load("abc").unwrap(), "ABC");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, clippy::all)]

pub mod constants;
pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use constants::*;
pub use error::{EagerError, Result};
pub use traits::*;
pub use types::*;
