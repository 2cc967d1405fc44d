//! Feather Core Library
//!
//! Cleanup pipeline, host document model and Blender bridge for feather.

pub mod config;
pub mod document;
pub mod error;
pub mod header;
pub mod host;
pub mod inputs;
pub mod logging;
pub mod pipeline;
