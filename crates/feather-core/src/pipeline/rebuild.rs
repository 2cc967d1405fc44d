//! Rebuild stage: save, reset, reload by reference, relink.
//!
//! The host's orphan purge cannot drop data that is only used by other
//! soon-to-be-dropped data. Saving a snapshot, emptying the document and
//! reloading collections and scenes by reference keeps exactly what those
//! roots reach. The reload does not link anything into the active scene, so
//! top-level collections (and, with experimental append, loose objects) are
//! linked back afterwards.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::{
    Category, Document, LinkParent, ReloadRequest, Reloaded, PLACEHOLDER_SCENE,
};
use crate::error::{FeatherError, Result};

/// Marks snapshot files: `<input>.<pid>.feather-snapshot.<ext>`
pub const SNAPSHOT_MARKER: &str = ".feather-snapshot";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RebuildReport {
    pub snapshot: PathBuf,
    pub reloaded: Reloaded,
    pub artifact_scenes_removed: Vec<String>,
    pub collections_linked: Vec<String>,
    pub objects_linked: Vec<String>,
}

/// Snapshot location for `input`, unique per process
pub fn snapshot_path(input: &Path) -> PathBuf {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("blend");
    let mut name = input.as_os_str().to_os_string();
    name.push(format!(".{}{}.{}", std::process::id(), SNAPSHOT_MARKER, ext));
    PathBuf::from(name)
}

/// Rebuild the document from a snapshot of itself.
///
/// On failure after the snapshot was written the snapshot is kept on disk:
/// the document may already be empty and the snapshot is then the only copy.
pub fn rebuild<D: Document + ?Sized>(
    doc: &mut D,
    input: &Path,
    experimental_append: bool,
) -> Result<RebuildReport> {
    let snapshot = snapshot_path(input);
    doc.save_as(&snapshot, false)?;
    debug!(snapshot = %snapshot.display(), "snapshot_saved");

    match rebuild_from_snapshot(doc, &snapshot, experimental_append) {
        Ok(mut report) => {
            fs::remove_file(&snapshot)
                .map_err(|e| FeatherError::io_operation("remove snapshot", snapshot.display(), e))?;
            report.snapshot = snapshot;
            Ok(report)
        }
        Err(e) => {
            warn!(
                snapshot = %snapshot.display(),
                error = %e,
                "rebuild failed; snapshot retained for recovery"
            );
            Err(e)
        }
    }
}

fn rebuild_from_snapshot<D: Document + ?Sized>(
    doc: &mut D,
    snapshot: &Path,
    experimental_append: bool,
) -> Result<RebuildReport> {
    let original_scenes: BTreeSet<String> = doc.scenes()?.into_iter().collect();

    let placeholder = placeholder_name(&original_scenes);
    doc.reset_empty(&placeholder)?;

    let request = ReloadRequest {
        collections: true,
        scenes: true,
        objects: experimental_append,
    };
    let reloaded = doc.load_by_reference(snapshot, &request)?;
    debug!(
        collections = reloaded.collections.len(),
        scenes = reloaded.scenes.len(),
        objects = reloaded.objects.len(),
        "reloaded"
    );

    let mut report = RebuildReport {
        artifact_scenes_removed: remove_artifact_scenes(doc, &original_scenes)?,
        ..RebuildReport::default()
    };

    let needs_scene = !reloaded.collections.is_empty() || !reloaded.objects.is_empty();
    if needs_scene {
        let scene = doc.active_scene()?.ok_or_else(|| {
            FeatherError::host("relink", "no scene left to link collections into")
        })?;
        report.collections_linked = relink_collections(doc, &scene, &reloaded.collections)?;
        if experimental_append {
            report.objects_linked =
                relink_objects(doc, &scene, &reloaded.collections, &reloaded.objects)?;
        }
    }

    report.reloaded = reloaded;
    Ok(report)
}

/// A placeholder scene name no snapshot scene uses
fn placeholder_name(original_scenes: &BTreeSet<String>) -> String {
    let mut name = PLACEHOLDER_SCENE.to_string();
    let mut n = 1;
    while original_scenes.contains(&name) {
        name = format!("{PLACEHOLDER_SCENE}.{n}");
        n += 1;
    }
    name
}

/// Scenes the reload created that were not in the document before the reset
fn remove_artifact_scenes<D: Document + ?Sized>(
    doc: &mut D,
    original_scenes: &BTreeSet<String>,
) -> Result<Vec<String>> {
    let mut removed = Vec::new();
    for scene in doc.scenes()? {
        if !original_scenes.contains(&scene) {
            doc.remove_block(Category::Scenes, &scene)?;
            debug!(scene = %scene, "artifact_scene_removed");
            removed.push(scene);
        }
    }
    Ok(removed)
}

/// Link every reloaded collection that no other reloaded collection lists as
/// a child into the scene root.
///
/// NOTE: multi-parent collections. A collection with at least one reloaded
/// parent is never linked to the root, even if every path from that parent to
/// a scene is gone. This keeps the historical single-parent behaviour and can
/// leave such a collection unreachable in asymmetric hierarchies.
fn relink_collections<D: Document + ?Sized>(
    doc: &mut D,
    scene: &str,
    collections: &[String],
) -> Result<Vec<String>> {
    // Classify against the full reloaded set up front, never incrementally
    let mut children: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for collection in collections {
        children.insert(collection, doc.collection_children(collection)?);
    }
    let is_child = |name: &String| {
        collections
            .iter()
            .filter(|other| *other != name)
            .any(|other| children[other.as_str()].contains(name))
    };
    let top_level: Vec<&String> = collections.iter().filter(|c| !is_child(*c)).collect();

    let root = LinkParent::SceneRoot(scene.to_string());
    let mut linked = Vec::new();
    for collection in top_level {
        if doc.scene_root_children(scene)?.contains(collection) {
            continue;
        }
        if tolerate_already_linked(doc.link_collection(&root, collection))? {
            linked.push(collection.clone());
        }
    }
    debug!(linked = linked.len(), "relink_collections");
    Ok(linked)
}

/// Link reloaded objects that belong to no reloaded collection into the scene root
fn relink_objects<D: Document + ?Sized>(
    doc: &mut D,
    scene: &str,
    collections: &[String],
    objects: &[String],
) -> Result<Vec<String>> {
    let mut members = BTreeSet::new();
    for collection in collections {
        members.extend(doc.collection_objects(collection)?);
    }

    let root = LinkParent::SceneRoot(scene.to_string());
    let mut linked = Vec::new();
    for object in objects.iter().filter(|o| !members.contains(*o)) {
        if doc.scene_root_objects(scene)?.contains(object) {
            continue;
        }
        if tolerate_already_linked(doc.link_object(&root, object))? {
            linked.push(object.clone());
        }
    }
    debug!(linked = linked.len(), "relink_objects");
    Ok(linked)
}

/// `Ok(true)` when linked, `Ok(false)` when it already was
fn tolerate_already_linked(result: Result<()>) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_linked() => {
            debug!(error = %e, "link skipped");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}
