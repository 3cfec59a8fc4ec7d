//! Utility functions for display formatting.

pub mod format;

pub use format::{format_percentage, progress_bar, truncate_string};
