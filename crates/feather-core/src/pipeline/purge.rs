//! Orphan purge stage
//!
//! Removing a block can leave the blocks it referenced without users, so one
//! host purge call is not always enough.

use serde::Serialize;
use tracing::{debug, warn};

use crate::document::Document;
use crate::error::Result;

/// Pass cap for [`PurgePolicy::UntilStable`]
pub const DEFAULT_MAX_PASSES: u32 = 64;

/// How many purge calls to make
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgePolicy {
    /// Exactly this many calls, whatever they remove
    Fixed(u32),
    /// Call until a pass removes nothing, giving up after `max_passes`
    UntilStable { max_passes: u32 },
}

impl Default for PurgePolicy {
    fn default() -> Self {
        PurgePolicy::UntilStable {
            max_passes: DEFAULT_MAX_PASSES,
        }
    }
}

impl PurgePolicy {
    /// `Some(n)` pins the pass count, `None` purges until stable
    pub fn from_passes(passes: Option<u32>) -> Self {
        passes.map(PurgePolicy::Fixed).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PurgeReport {
    pub passes: u32,
    pub removed: usize,
}

pub fn purge<D: Document + ?Sized>(doc: &mut D, policy: PurgePolicy) -> Result<PurgeReport> {
    let mut report = PurgeReport::default();

    match policy {
        PurgePolicy::Fixed(passes) => {
            for _ in 0..passes {
                report.removed += doc.purge_orphans()?;
                report.passes += 1;
            }
        }
        PurgePolicy::UntilStable { max_passes } => loop {
            if report.passes >= max_passes {
                warn!(max_passes, removed = report.removed, "purge did not settle");
                break;
            }
            let removed = doc.purge_orphans()?;
            report.passes += 1;
            report.removed += removed;
            if removed == 0 {
                break;
            }
        },
    }

    debug!(passes = report.passes, removed = report.removed, "purge");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::memory::MemoryDocument;
    use crate::document::Category;

    /// mesh_0 -> mesh_1 -> ... -> mesh_{n-1}, nothing uses mesh_0
    fn chain(n: usize) -> MemoryDocument {
        let mut doc = MemoryDocument::new();
        doc.add_block(Category::Scenes, "Scene");
        for i in 0..n {
            doc.add_block(Category::Meshes, &format!("mesh_{i}"));
        }
        for i in 1..n {
            let from = format!("mesh_{}", i - 1);
            let to = format!("mesh_{i}");
            doc.add_ref((Category::Meshes, &from), (Category::Meshes, &to))
                .unwrap();
        }
        doc
    }

    #[test]
    fn test_until_stable_clears_chain() {
        let mut doc = chain(7);
        let report = purge(&mut doc, PurgePolicy::default()).unwrap();
        assert_eq!(report.removed, 7);
        // one pass per link plus the empty confirming pass
        assert_eq!(report.passes, 8);
        assert!(doc.blocks(Category::Meshes).unwrap().is_empty());
    }

    #[test]
    fn test_fixed_passes_may_stop_short() {
        let mut doc = chain(7);
        let report = purge(&mut doc, PurgePolicy::Fixed(5)).unwrap();
        assert_eq!(report.passes, 5);
        assert_eq!(report.removed, 5);
        assert_eq!(doc.blocks(Category::Meshes).unwrap().len(), 2);
    }

    #[test]
    fn test_until_stable_matches_large_fixed_count() {
        let mut stable = chain(4);
        let mut fixed = chain(4);
        purge(&mut stable, PurgePolicy::default()).unwrap();
        purge(&mut fixed, PurgePolicy::Fixed(10)).unwrap();
        assert_eq!(stable, fixed);
    }

    #[test]
    fn test_purge_is_idempotent() {
        let mut doc = chain(3);
        purge(&mut doc, PurgePolicy::default()).unwrap();
        let second = purge(&mut doc, PurgePolicy::default()).unwrap();
        assert_eq!(second.removed, 0);
        assert_eq!(second.passes, 1);
    }

    #[test]
    fn test_max_passes_cap() {
        let mut doc = chain(5);
        let report = purge(&mut doc, PurgePolicy::UntilStable { max_passes: 2 }).unwrap();
        assert_eq!(report.passes, 2);
        assert_eq!(report.removed, 2);
    }

    #[test]
    fn test_from_passes() {
        assert_eq!(PurgePolicy::from_passes(Some(5)), PurgePolicy::Fixed(5));
        assert_eq!(PurgePolicy::from_passes(None), PurgePolicy::default());
    }
}
