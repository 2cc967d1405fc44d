//! Host application backends

pub mod blender;
pub mod protocol;

pub use blender::{probe_version, BlenderHost, HostOptions};
