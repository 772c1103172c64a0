//! Public facade crate for `webprobe`.
//!
//! Re-exports the backend-agnostic types/traits from `webprobe-core` and the
//! reqwest-backed [`Analyzer`] entry point from `webprobe-local`.

pub use webprobe_core::*;
pub use webprobe_local::{Analyzer, AnalyzerConfig, MemoryCache};
