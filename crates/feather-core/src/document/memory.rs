//! In-memory document
//!
//! Blocks are keyed by category and name. Every structural relation (collection
//! children and objects, scene root links, object data, material slots, ...) is
//! an outgoing [`BlockRef`], so a block's user count is simply the number of
//! references pointing at it plus its fake user.
//!
//! The on-disk form is JSON, gzip-compressed when saved with `compress`.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{BlockInfo, Category, Document, LinkParent, ReloadRequest, Reloaded};
use crate::error::{FeatherError, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A reference from one block to another
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BlockRef {
    pub category: Category,
    pub name: String,
}

impl BlockRef {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }
}

/// One data block
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fake_user: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub refs: Vec<BlockRef>,
}

impl Block {
    fn refs_in(&self, category: Category) -> Vec<String> {
        self.refs
            .iter()
            .filter(|r| r.category == category)
            .map(|r| r.name.clone())
            .collect()
    }
}

/// A whole document held in memory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryDocument {
    #[serde(default)]
    blocks: BTreeMap<Category, BTreeMap<String, Block>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    active_scene: Option<String>,
}

impl MemoryDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document file, compressed or not
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|e| FeatherError::io_operation("read", path.display(), e))?;
        let json = if bytes.starts_with(&GZIP_MAGIC) {
            let mut out = Vec::new();
            GzDecoder::new(bytes.as_slice())
                .read_to_end(&mut out)
                .map_err(|e| FeatherError::io_operation("decompress", path.display(), e))?;
            out
        } else {
            bytes
        };
        let mut doc: MemoryDocument = serde_json::from_slice(&json)?;
        if doc.active_scene.is_none() {
            doc.active_scene = doc.first_scene();
        }
        Ok(doc)
    }

    /// Insert (or replace) an empty block and return it for further setup
    pub fn add_block(&mut self, category: Category, name: &str) -> &mut Block {
        if category == Category::Scenes && self.active_scene.is_none() {
            self.active_scene = Some(name.to_string());
        }
        let block = self
            .blocks
            .entry(category)
            .or_default()
            .entry(name.to_string())
            .or_default();
        *block = Block::default();
        block
    }

    /// Add a reference `from -> to`; both ends are taken as given
    pub fn add_ref(&mut self, from: (Category, &str), to: (Category, &str)) -> Result<()> {
        let block = self.block_mut(from.0, from.1)?;
        block.refs.push(BlockRef::new(to.0, to.1));
        Ok(())
    }

    pub fn set_fake_user(&mut self, category: Category, name: &str, value: bool) -> Result<()> {
        self.block_mut(category, name)?.fake_user = value;
        Ok(())
    }

    pub fn set_active_scene(&mut self, name: &str) -> Result<()> {
        self.block(Category::Scenes, name)?;
        self.active_scene = Some(name.to_string());
        Ok(())
    }

    pub fn contains(&self, category: Category, name: &str) -> bool {
        self.blocks
            .get(&category)
            .is_some_and(|blocks| blocks.contains_key(name))
    }

    /// Inbound references plus the fake user
    pub fn users(&self, category: Category, name: &str) -> u32 {
        let target = BlockRef::new(category, name);
        let inbound = self
            .blocks
            .values()
            .flat_map(|blocks| blocks.values())
            .flat_map(|block| block.refs.iter())
            .filter(|r| **r == target)
            .count() as u32;
        let fake = self
            .blocks
            .get(&category)
            .and_then(|blocks| blocks.get(name))
            .is_some_and(|b| b.fake_user);
        inbound + u32::from(fake)
    }

    fn block(&self, category: Category, name: &str) -> Result<&Block> {
        self.blocks
            .get(&category)
            .and_then(|blocks| blocks.get(name))
            .ok_or_else(|| FeatherError::not_found(category.as_str(), name))
    }

    fn block_mut(&mut self, category: Category, name: &str) -> Result<&mut Block> {
        self.blocks
            .get_mut(&category)
            .and_then(|blocks| blocks.get_mut(name))
            .ok_or_else(|| FeatherError::not_found(category.as_str(), name))
    }

    fn first_scene(&self) -> Option<String> {
        self.blocks
            .get(&Category::Scenes)
            .and_then(|scenes| scenes.keys().next().cloned())
    }

    fn parent_block_mut(&mut self, parent: &LinkParent) -> Result<&mut Block> {
        match parent {
            LinkParent::Collection(name) => self.block_mut(Category::Collections, name),
            LinkParent::SceneRoot(name) => self.block_mut(Category::Scenes, name),
        }
    }

    fn link(&mut self, parent: &LinkParent, item: BlockRef) -> Result<()> {
        self.block(item.category, &item.name)?;
        let block = self.parent_block_mut(parent)?;
        if block.refs.contains(&item) {
            return Err(FeatherError::already_linked(parent, &item.name));
        }
        block.refs.push(item);
        Ok(())
    }

    fn unlink(&mut self, parent: &LinkParent, item: BlockRef) -> Result<()> {
        let block = self.parent_block_mut(parent)?;
        let Some(index) = block.refs.iter().position(|r| *r == item) else {
            return Err(FeatherError::not_found(
                &format!("{} in {parent}", item.category),
                &item.name,
            ));
        };
        block.refs.remove(index);
        Ok(())
    }

    /// Blender-style unique name: `Name`, `Name.001`, `Name.002`, ...
    fn unique_name(&self, category: Category, base: &str) -> String {
        if !self.contains(category, base) {
            return base.to_string();
        }
        (1..)
            .map(|n| format!("{base}.{n:03}"))
            .find(|candidate| !self.contains(category, candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Requested roots plus everything they reach through references
    fn reference_closure(&self, request: &ReloadRequest) -> BTreeSet<BlockRef> {
        let mut reached = BTreeSet::new();
        let mut queue: VecDeque<BlockRef> = request
            .categories()
            .into_iter()
            .flat_map(|category| {
                self.blocks
                    .get(&category)
                    .into_iter()
                    .flat_map(move |blocks| blocks.keys().map(move |n| BlockRef::new(category, n)))
            })
            .collect();

        while let Some(current) = queue.pop_front() {
            let Ok(block) = self.block(current.category, &current.name) else {
                continue;
            };
            if !reached.insert(current) {
                continue;
            }
            queue.extend(block.refs.iter().cloned());
        }
        reached
    }
}

impl Document for MemoryDocument {
    fn blocks(&self, category: Category) -> Result<Vec<BlockInfo>> {
        Ok(self
            .blocks
            .get(&category)
            .map(|blocks| {
                blocks
                    .iter()
                    .map(|(name, block)| BlockInfo {
                        name: name.clone(),
                        users: self.users(category, name),
                        fake_user: block.fake_user,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn active_scene(&self) -> Result<Option<String>> {
        Ok(self.active_scene.clone())
    }

    fn collection_children(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .block(Category::Collections, collection)?
            .refs_in(Category::Collections))
    }

    fn collection_objects(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self
            .block(Category::Collections, collection)?
            .refs_in(Category::Objects))
    }

    fn scene_root_children(&self, scene: &str) -> Result<Vec<String>> {
        Ok(self.block(Category::Scenes, scene)?.refs_in(Category::Collections))
    }

    fn scene_root_objects(&self, scene: &str) -> Result<Vec<String>> {
        Ok(self.block(Category::Scenes, scene)?.refs_in(Category::Objects))
    }

    /// Removes every non-scene block with zero users at the start of the pass.
    /// Blocks orphaned by this pass are left for the next one.
    fn purge_orphans(&mut self) -> Result<usize> {
        let orphans: Vec<BlockRef> = self
            .blocks
            .iter()
            .filter(|(category, _)| **category != Category::Scenes)
            .flat_map(|(category, blocks)| {
                blocks.keys().map(move |name| BlockRef::new(*category, name))
            })
            .filter(|r| self.users(r.category, &r.name) == 0)
            .collect();

        for orphan in &orphans {
            trace!(category = %orphan.category, name = %orphan.name, "purge_orphan");
            if let Some(blocks) = self.blocks.get_mut(&orphan.category) {
                blocks.remove(&orphan.name);
            }
        }
        Ok(orphans.len())
    }

    fn remove_block(&mut self, category: Category, name: &str) -> Result<()> {
        let removed = self
            .blocks
            .get_mut(&category)
            .and_then(|blocks| blocks.remove(name));
        if removed.is_none() {
            return Err(FeatherError::not_found(category.as_str(), name));
        }

        let target = BlockRef::new(category, name);
        for block in self.blocks.values_mut().flat_map(|blocks| blocks.values_mut()) {
            block.refs.retain(|r| *r != target);
        }

        if category == Category::Scenes && self.active_scene.as_deref() == Some(name) {
            self.active_scene = self.first_scene();
        }
        Ok(())
    }

    fn clear_fake_user(&mut self, category: Category, name: &str) -> Result<()> {
        self.set_fake_user(category, name, false)
    }

    fn link_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()> {
        self.link(parent, BlockRef::new(Category::Collections, child))
    }

    fn link_object(&mut self, parent: &LinkParent, object: &str) -> Result<()> {
        self.link(parent, BlockRef::new(Category::Objects, object))
    }

    fn unlink_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()> {
        self.unlink(parent, BlockRef::new(Category::Collections, child))
    }

    fn unlink_object(&mut self, parent: &LinkParent, object: &str) -> Result<()> {
        self.unlink(parent, BlockRef::new(Category::Objects, object))
    }

    fn save_as(&mut self, path: &Path, compress: bool) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        let bytes = if compress {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?
        } else {
            json
        };
        fs::write(path, bytes).map_err(|e| FeatherError::io_operation("write", path.display(), e))?;
        debug!(path = %path.display(), compress, "save_as");
        Ok(())
    }

    fn reset_empty(&mut self, placeholder: &str) -> Result<()> {
        self.blocks.clear();
        self.active_scene = None;
        self.add_block(Category::Scenes, placeholder);
        Ok(())
    }

    fn load_by_reference(&mut self, path: &Path, request: &ReloadRequest) -> Result<Reloaded> {
        let snapshot = MemoryDocument::open(path)?;
        let reached = snapshot.reference_closure(request);

        // Resolve final names first so references can be rewritten in one go
        let mut renamed: BTreeMap<BlockRef, String> = BTreeMap::new();
        for r in &reached {
            let mut name = self.unique_name(r.category, &r.name);
            while renamed
                .iter()
                .any(|(k, v)| k.category == r.category && *v == name)
            {
                name = format!("{name}.001");
            }
            renamed.insert(r.clone(), name);
        }

        let mut reloaded = Reloaded::default();
        for r in &reached {
            let source = snapshot.block(r.category, &r.name)?;
            let block = Block {
                fake_user: source.fake_user,
                refs: source
                    .refs
                    .iter()
                    .filter_map(|target| {
                        renamed
                            .get(target)
                            .map(|name| BlockRef::new(target.category, name.clone()))
                    })
                    .collect(),
            };
            let name = renamed[r].clone();
            self.blocks
                .entry(r.category)
                .or_default()
                .insert(name.clone(), block);

            match r.category {
                Category::Collections if request.collections => reloaded.collections.push(name),
                Category::Scenes if request.scenes => reloaded.scenes.push(name),
                Category::Objects if request.objects => reloaded.objects.push(name),
                _ => {}
            }
        }

        if self.active_scene.is_none() {
            self.active_scene = self.first_scene();
        }
        debug!(
            path = %path.display(),
            reached = reached.len(),
            skipped = snapshot.block_count()?.saturating_sub(reached.len()),
            "load_by_reference"
        );
        Ok(reloaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::PLACEHOLDER_SCENE;
    use tempfile::tempdir;

    fn mesh_object_doc() -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        doc.add_block(Category::Scenes, "Main");
        doc.add_block(Category::Collections, "Root");
        doc.add_block(Category::Objects, "Cube");
        doc.add_block(Category::Meshes, "CubeMesh");
        doc.add_block(Category::Materials, "Steel");
        doc.add_ref((Category::Scenes, "Main"), (Category::Collections, "Root"))
            .unwrap();
        doc.add_ref((Category::Collections, "Root"), (Category::Objects, "Cube"))
            .unwrap();
        doc.add_ref((Category::Objects, "Cube"), (Category::Meshes, "CubeMesh"))
            .unwrap();
        doc.add_ref((Category::Meshes, "CubeMesh"), (Category::Materials, "Steel"))
            .unwrap();
        doc
    }

    #[test]
    fn test_users_count_fake_user() {
        let mut doc = mesh_object_doc();
        assert_eq!(doc.users(Category::Meshes, "CubeMesh"), 1);
        doc.set_fake_user(Category::Meshes, "CubeMesh", true).unwrap();
        assert_eq!(doc.users(Category::Meshes, "CubeMesh"), 2);
    }

    #[test]
    fn test_purge_is_one_level_per_call() {
        let mut doc = mesh_object_doc();
        doc.add_block(Category::Meshes, "Loose");
        doc.add_ref((Category::Meshes, "Loose"), (Category::Materials, "Rust"))
            .unwrap();
        doc.add_block(Category::Materials, "Rust");

        assert_eq!(doc.purge_orphans().unwrap(), 1);
        assert!(!doc.contains(Category::Meshes, "Loose"));
        assert!(doc.contains(Category::Materials, "Rust"));

        assert_eq!(doc.purge_orphans().unwrap(), 1);
        assert!(!doc.contains(Category::Materials, "Rust"));
        assert_eq!(doc.purge_orphans().unwrap(), 0);
    }

    #[test]
    fn test_purge_never_removes_scenes() {
        let mut doc = MemoryDocument::new();
        doc.add_block(Category::Scenes, "Empty");
        assert_eq!(doc.purge_orphans().unwrap(), 0);
        assert!(doc.contains(Category::Scenes, "Empty"));
    }

    #[test]
    fn test_link_twice_is_already_linked() {
        let mut doc = mesh_object_doc();
        let root = LinkParent::SceneRoot("Main".to_string());
        let err = doc.link_collection(&root, "Root").unwrap_err();
        assert!(err.is_already_linked());
        assert_eq!(doc.scene_root_children("Main").unwrap(), vec!["Root"]);
    }

    #[test]
    fn test_link_missing_item_is_not_found() {
        let mut doc = mesh_object_doc();
        let root = LinkParent::SceneRoot("Main".to_string());
        let err = doc.link_object(&root, "Ghost").unwrap_err();
        assert!(matches!(err, FeatherError::NotFound { .. }));
    }

    #[test]
    fn test_unlink_then_relink() {
        let mut doc = mesh_object_doc();
        let root = LinkParent::Collection("Root".to_string());
        doc.unlink_object(&root, "Cube").unwrap();
        assert!(doc.collection_objects("Root").unwrap().is_empty());
        assert_eq!(doc.users(Category::Objects, "Cube"), 0);

        let err = doc.unlink_object(&root, "Cube").unwrap_err();
        assert!(matches!(err, FeatherError::NotFound { .. }));

        doc.link_object(&root, "Cube").unwrap();
        assert_eq!(doc.collection_objects("Root").unwrap(), vec!["Cube"]);
    }

    #[test]
    fn test_remove_block_unlinks_users() {
        let mut doc = mesh_object_doc();
        doc.remove_block(Category::Objects, "Cube").unwrap();
        assert!(doc.collection_objects("Root").unwrap().is_empty());
        assert_eq!(doc.users(Category::Meshes, "CubeMesh"), 0);
    }

    #[test]
    fn test_removing_active_scene_falls_back() {
        let mut doc = mesh_object_doc();
        doc.add_block(Category::Scenes, "Alt");
        assert_eq!(doc.active_scene().unwrap().as_deref(), Some("Main"));
        doc.remove_block(Category::Scenes, "Main").unwrap();
        assert_eq!(doc.active_scene().unwrap().as_deref(), Some("Alt"));
    }

    #[test]
    fn test_save_and_open_compressed() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("doc.json");
        let mut doc = mesh_object_doc();
        doc.save_as(&path, true).unwrap();

        let bytes = fs::read(&path).unwrap();
        assert!(bytes.starts_with(&GZIP_MAGIC));
        assert_eq!(MemoryDocument::open(&path).unwrap(), doc);
    }

    #[test]
    fn test_reset_leaves_placeholder_scene() {
        let mut doc = mesh_object_doc();
        doc.reset_empty(PLACEHOLDER_SCENE).unwrap();
        assert_eq!(doc.scenes().unwrap(), vec![PLACEHOLDER_SCENE]);
        assert_eq!(doc.block_count().unwrap(), 1);
    }

    #[test]
    fn test_load_by_reference_skips_unreached_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.json");
        let mut doc = mesh_object_doc();
        doc.add_block(Category::Images, "Unused");
        doc.save_as(&path, false).unwrap();

        doc.reset_empty(PLACEHOLDER_SCENE).unwrap();
        let reloaded = doc
            .load_by_reference(
                &path,
                &ReloadRequest {
                    collections: true,
                    scenes: true,
                    objects: false,
                },
            )
            .unwrap();

        assert_eq!(reloaded.collections, vec!["Root"]);
        assert_eq!(reloaded.scenes, vec!["Main"]);
        assert!(reloaded.objects.is_empty());
        assert!(doc.contains(Category::Materials, "Steel"));
        assert!(!doc.contains(Category::Images, "Unused"));
    }

    #[test]
    fn test_load_by_reference_renames_collisions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snap.json");
        let mut doc = mesh_object_doc();
        doc.save_as(&path, false).unwrap();

        let request = ReloadRequest {
            collections: true,
            scenes: false,
            objects: false,
        };
        let reloaded = doc.load_by_reference(&path, &request).unwrap();
        assert_eq!(reloaded.collections, vec!["Root.001"]);
        assert_eq!(doc.collection_objects("Root.001").unwrap(), vec!["Cube.001"]);
    }
}
