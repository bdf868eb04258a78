//! # eagercache
//!
//! Thread-safe in-memory cache whose entries are filled by a loader and kept
//! warm by a shared background sweeper.
//!
//! - A read that misses calls the loader and stores the value with a TTL.
//! - A second read before expiry marks the entry as in use.
//! - When the sweeper finds an expired entry, it reloads it if it was in use
//!   and evicts it otherwise.
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//! use eager_cache::Registry;
//!
//! let registry = Registry::new();
//! registry.start_sweeper(Duration::from_secs(30)).unwrap();
//!
//! let cache = registry
//!     .create_cache(Duration::from_secs(60), |key: &str| Ok(key.len()))
//!     .unwrap();
//!
//! assert_eq!(cache.get("hello").unwrap(), 5);
//! cache.close().unwrap();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]

mod cache;
mod config;
mod entry;
mod registry;

pub use cache::{CacheBuilder, CacheStats, EagerCache};
pub use config::{CacheConfig, RegistryConfig};
pub use entry::Entry;
pub use registry::{create_cache, start_sweeper, Registry};

// Re-export the core types callers need alongside a cache
pub use eager_core::error::{EagerError, Result};
pub use eager_core::traits::{Loader, Sweep};
pub use eager_core::types::{SweepReport, SweepSummary};
