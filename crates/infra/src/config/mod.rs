//! Configuration loading
//!
//! Files plus environment overrides; the types themselves live in
//! `solrfeed-domain`.

pub mod loader;

pub use loader::{apply_env_overrides, load, load_from_file, write_default, DEFAULT_CONFIG};
