//! Category-wide removal stages: worlds, extras and fake users

use tracing::debug;

use crate::document::{Category, Document};
use crate::error::Result;

/// Remove every block of `category`; returns how many went
fn delete_all<D: Document + ?Sized>(doc: &mut D, category: Category) -> Result<usize> {
    let blocks = doc.blocks(category)?;
    for block in &blocks {
        doc.remove_block(category, &block.name)?;
    }
    Ok(blocks.len())
}

/// Remove every world, used or not
pub fn delete_worlds<D: Document + ?Sized>(doc: &mut D) -> Result<usize> {
    let removed = delete_all(doc, Category::Worlds)?;
    debug!(removed, "delete_worlds");
    Ok(removed)
}

/// Remove every brush, palette and line style regardless of users
pub fn delete_extras<D: Document + ?Sized>(doc: &mut D) -> Result<usize> {
    let mut removed = 0;
    for category in Category::EXTRAS {
        removed += delete_all(doc, category)?;
    }
    debug!(removed, "delete_extras");
    Ok(removed)
}

/// Clear the fake user on every block that has one; returns how many changed
pub fn clear_fake_users<D: Document + ?Sized>(doc: &mut D) -> Result<usize> {
    let mut cleared = 0;
    for category in Category::FAKE_USER {
        for block in doc.blocks(category)?.into_iter().filter(|b| b.fake_user) {
            doc.clear_fake_user(category, &block.name)?;
            cleared += 1;
        }
    }
    debug!(cleared, "clear_fake_users");
    Ok(cleared)
}
