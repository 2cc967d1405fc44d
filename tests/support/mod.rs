use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use serde_json::json;
use tempfile::TempDir;

/// Get a Command for feather with its config isolated in `config_dir`
pub fn feather(config_dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("feather");
    cmd.env("FEATHER_CONFIG_DIR", config_dir)
        .env_remove("FEATHER_BLENDER")
        .env_remove("RUST_LOG")
        .env_remove("FEATHER_LOG");
    cmd
}

/// A working directory plus a private config directory
pub struct TestEnv {
    pub dir: TempDir,
    pub config: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config: TempDir::new().unwrap(),
        }
    }

    pub fn feather(&self) -> Command {
        let mut cmd = feather(self.config.path());
        cmd.current_dir(self.dir.path());
        cmd
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

/// Main -> Root -> Child -> Cube -> CubeMesh, a fake-user orphan mesh and a brush
pub fn scenario_json() -> serde_json::Value {
    json!({
        "blocks": {
            "scenes": {
                "Main": { "refs": [{ "category": "collections", "name": "Root" }] }
            },
            "collections": {
                "Root": { "refs": [{ "category": "collections", "name": "Child" }] },
                "Child": { "refs": [{ "category": "objects", "name": "Cube" }] }
            },
            "objects": {
                "Cube": { "refs": [{ "category": "meshes", "name": "CubeMesh" }] }
            },
            "meshes": {
                "CubeMesh": {},
                "Orphan": { "fake_user": true }
            },
            "brushes": {
                "Brush": { "fake_user": true }
            },
            "materials": {
                "Unused": {}
            }
        },
        "active_scene": "Main"
    })
}

pub fn write_scenario(path: &Path) {
    fs::write(path, serde_json::to_vec_pretty(&scenario_json()).unwrap()).unwrap();
}

pub fn read_json(path: &Path) -> serde_json::Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

/// Legacy 12-byte header followed by some padding
pub fn write_blend(path: &Path, header: &[u8]) {
    let mut bytes = header.to_vec();
    bytes.extend_from_slice(&[0u8; 64]);
    fs::write(path, bytes).unwrap();
}

pub fn write_gzip_blend(path: &Path, header: &[u8]) {
    let file = fs::File::create(path).unwrap();
    let mut encoder = flate2::write::GzEncoder::new(file, flate2::Compression::default());
    encoder.write_all(header).unwrap();
    encoder.write_all(&[0u8; 64]).unwrap();
    encoder.finish().unwrap();
}

/// An executable shell script standing in for Blender
#[cfg(unix)]
#[allow(dead_code)]
pub fn write_fake_blender(path: &Path, version_banner: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::write(
        path,
        format!("#!/bin/sh\necho \"{version_banner}\"\necho \"\tbuild date: 2025-01-01\"\n"),
    )
    .unwrap();
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
}
