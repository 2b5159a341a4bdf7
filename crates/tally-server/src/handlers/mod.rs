//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod scan;
pub mod sessions;
pub mod settlements;

// Re-export all handlers for use in router
pub use scan::*;
pub use sessions::*;
pub use settlements::*;
