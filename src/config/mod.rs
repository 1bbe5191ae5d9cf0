//! Configuration model for filemutex.
//!
//! Settings live in an optional YAML file passed with `--config`. Parsing is
//! forward-compatible (unknown fields are ignored), every field has a default,
//! and command-line flags override whatever the file provides.

mod model;
mod operations;


// Re-export public API
pub use model::Config;
