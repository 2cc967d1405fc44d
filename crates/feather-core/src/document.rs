//! Host document model
//!
//! The cleanup pipeline never touches the host application directly. It sees a
//! [`Document`]: a handle exposing the query, mutate and persistence primitives
//! the host offers. [`memory::MemoryDocument`] implements it in memory and
//! [`crate::host::BlenderHost`] implements it against a live Blender process.

pub mod memory;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FeatherError, Result};

/// Preferred name for the scene an empty document starts with.
///
/// The rebuild picks a variant no existing scene uses, so a reload cannot
/// collide with the placeholder.
pub const PLACEHOLDER_SCENE: &str = "feather.placeholder";

/// Data-block categories the pipeline knows about
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Meshes,
    Materials,
    Textures,
    Curves,
    Armatures,
    Actions,
    NodeGroups,
    Images,
    Lights,
    Cameras,
    Fonts,
    Metaballs,
    Lattices,
    Speakers,
    #[serde(rename = "lightprobes")]
    LightProbes,
    Brushes,
    Palettes,
    Linestyles,
    Worlds,
    Collections,
    Objects,
    Scenes,
}

impl Category {
    /// Every category, in host listing order
    pub const ALL: [Category; 22] = [
        Category::Meshes,
        Category::Materials,
        Category::Textures,
        Category::Curves,
        Category::Armatures,
        Category::Actions,
        Category::NodeGroups,
        Category::Images,
        Category::Lights,
        Category::Cameras,
        Category::Fonts,
        Category::Metaballs,
        Category::Lattices,
        Category::Speakers,
        Category::LightProbes,
        Category::Brushes,
        Category::Palettes,
        Category::Linestyles,
        Category::Worlds,
        Category::Collections,
        Category::Objects,
        Category::Scenes,
    ];

    /// Workflow artifacts removed unconditionally from level 2 on
    pub const EXTRAS: [Category; 3] = [Category::Brushes, Category::Palettes, Category::Linestyles];

    /// Categories whose fake-user flag is cleared at level 3
    pub const FAKE_USER: [Category; 15] = [
        Category::Meshes,
        Category::Materials,
        Category::Textures,
        Category::Curves,
        Category::Armatures,
        Category::Actions,
        Category::NodeGroups,
        Category::Images,
        Category::Lights,
        Category::Cameras,
        Category::Fonts,
        Category::Metaballs,
        Category::Lattices,
        Category::Speakers,
        Category::LightProbes,
    ];

    /// The host's attribute name for this category (`bpy.data.<name>`)
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Meshes => "meshes",
            Category::Materials => "materials",
            Category::Textures => "textures",
            Category::Curves => "curves",
            Category::Armatures => "armatures",
            Category::Actions => "actions",
            Category::NodeGroups => "node_groups",
            Category::Images => "images",
            Category::Lights => "lights",
            Category::Cameras => "cameras",
            Category::Fonts => "fonts",
            Category::Metaballs => "metaballs",
            Category::Lattices => "lattices",
            Category::Speakers => "speakers",
            Category::LightProbes => "lightprobes",
            Category::Brushes => "brushes",
            Category::Palettes => "palettes",
            Category::Linestyles => "linestyles",
            Category::Worlds => "worlds",
            Category::Collections => "collections",
            Category::Objects => "objects",
            Category::Scenes => "scenes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = FeatherError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| FeatherError::invalid_value("category", s))
    }
}

/// One data block as seen through a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub name: String,
    /// Live referrers, the fake user included
    pub users: u32,
    pub fake_user: bool,
}

/// Where a collection or object gets linked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum LinkParent {
    Collection(String),
    /// The root collection owned by the named scene
    SceneRoot(String),
}

impl fmt::Display for LinkParent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkParent::Collection(name) => write!(f, "collection {name:?}"),
            LinkParent::SceneRoot(name) => write!(f, "root of scene {name:?}"),
        }
    }
}

/// Categories requested from a snapshot by a reference-loading reload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReloadRequest {
    pub collections: bool,
    pub scenes: bool,
    pub objects: bool,
}

impl ReloadRequest {
    pub fn categories(&self) -> Vec<Category> {
        let mut categories = Vec::new();
        if self.collections {
            categories.push(Category::Collections);
        }
        if self.scenes {
            categories.push(Category::Scenes);
        }
        if self.objects {
            categories.push(Category::Objects);
        }
        categories
    }
}

/// Names of the requested blocks a reload actually brought in
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Reloaded {
    #[serde(default)]
    pub collections: Vec<String>,
    #[serde(default)]
    pub scenes: Vec<String>,
    #[serde(default)]
    pub objects: Vec<String>,
}

/// A mutable handle on one host document.
///
/// Implementations must report linking an item into a parent that already
/// holds it as [`FeatherError::AlreadyLinked`] and leave the document unchanged.
pub trait Document {
    // -- query --

    /// All blocks of a category currently resident
    fn blocks(&self, category: Category) -> Result<Vec<BlockInfo>>;

    /// The scene new root-level links go into
    fn active_scene(&self) -> Result<Option<String>>;

    fn collection_children(&self, collection: &str) -> Result<Vec<String>>;

    fn collection_objects(&self, collection: &str) -> Result<Vec<String>>;

    fn scene_root_children(&self, scene: &str) -> Result<Vec<String>>;

    fn scene_root_objects(&self, scene: &str) -> Result<Vec<String>>;

    /// Names of all resident scenes
    fn scenes(&self) -> Result<Vec<String>> {
        Ok(self
            .blocks(Category::Scenes)?
            .into_iter()
            .map(|b| b.name)
            .collect())
    }

    /// Total number of resident blocks across every category
    fn block_count(&self) -> Result<usize> {
        let mut total = 0;
        for category in Category::ALL {
            total += self.blocks(category)?.len();
        }
        Ok(total)
    }

    // -- mutate --

    /// One orphan purge call; returns the number of blocks deleted
    fn purge_orphans(&mut self) -> Result<usize>;

    fn remove_block(&mut self, category: Category, name: &str) -> Result<()>;

    fn clear_fake_user(&mut self, category: Category, name: &str) -> Result<()>;

    fn link_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()>;

    fn link_object(&mut self, parent: &LinkParent, object: &str) -> Result<()>;

    /// Unlinking something the parent does not hold is [`FeatherError::NotFound`]
    fn unlink_collection(&mut self, parent: &LinkParent, child: &str) -> Result<()>;

    fn unlink_object(&mut self, parent: &LinkParent, object: &str) -> Result<()>;

    // -- persistence --

    fn save_as(&mut self, path: &Path, compress: bool) -> Result<()>;

    /// Discard everything, leaving an empty document with one scene named `placeholder`
    fn reset_empty(&mut self, placeholder: &str) -> Result<()>;

    /// Pull the requested categories from a saved document, plus whatever they
    /// transitively reference. Blocks nothing requested reaches stay behind.
    fn load_by_reference(&mut self, path: &Path, request: &ReloadRequest) -> Result<Reloaded>;
}
