//! Page classification
//!
//! A page carries content when it has extracted text or at least one embedded
//! raster image. Vector drawings on their own (rules, borders) do not count.

use crate::document::{Result, SourceDocument};

/// Whether page `index` of `doc` is blank
pub fn is_blank<D: SourceDocument + ?Sized>(doc: &D, index: usize) -> Result<bool> {
    let text = doc.page_text(index)?;
    if !text.trim().is_empty() {
        return Ok(false);
    }
    Ok(doc.page_image_count(index)? == 0)
}
