//! PDF Writer module
//!
//! Renders a laid-out answer key page with printpdf.
//!
//! # Example
//!
//! ```rust,no_run
//! use qbank_pdf::{answer_key, AnswerEntry, AnswerKeyOptions, AnswerKeyWriter};
//!
//! let entries = vec![AnswerEntry::new("0a1b2c3d", "B")];
//! let page = answer_key::layout(&entries, &AnswerKeyOptions::default()).unwrap();
//! AnswerKeyWriter::write(&page, std::path::Path::new("key.pdf")).unwrap();
//! ```

use crate::answer_key::{AnswerKeyPage, TextLine};
use crate::util::points_to_mm;
use printpdf::{BuiltinFont, IndirectFontRef, Mm, PdfDocument, PdfLayerReference};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;

/// PDF writing error types
#[derive(Debug, Error)]
pub enum PdfWriterError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("PDF generation error: {0}")]
    GenerationError(String),
}

pub type Result<T> = std::result::Result<T, PdfWriterError>;

/// printpdf-based answer key writer
pub struct AnswerKeyWriter;

impl AnswerKeyWriter {
    fn build(page: &AnswerKeyPage) -> Result<printpdf::PdfDocumentReference> {
        let width_mm = points_to_mm(page.width);
        let height_mm = points_to_mm(page.height);

        let (doc, page1, layer1) =
            PdfDocument::new(&page.title.text, Mm(width_mm), Mm(height_mm), "Layer 1");

        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| PdfWriterError::GenerationError(e.to_string()))?;
        let layer = doc.get_page(page1).get_layer(layer1);

        Self::place(&layer, &font, &page.title, height_mm);
        for line in &page.lines {
            Self::place(&layer, &font, line, height_mm);
        }

        Ok(doc)
    }

    /// Draw one line; layout coordinates are top-left based
    fn place(layer: &PdfLayerReference, font: &IndirectFontRef, line: &TextLine, height_mm: f32) {
        let x_mm = points_to_mm(line.x);
        let y_mm = height_mm - points_to_mm(line.y);
        layer.use_text(line.text.as_str(), line.font_size, Mm(x_mm), Mm(y_mm), font);
    }

    /// Render the page to PDF bytes
    pub fn render(page: &AnswerKeyPage) -> Result<Vec<u8>> {
        Self::build(page)?
            .save_to_bytes()
            .map_err(|e| PdfWriterError::GenerationError(e.to_string()))
    }

    /// Render the page to a PDF file
    pub fn write(page: &AnswerKeyPage, output: &Path) -> Result<()> {
        let doc = Self::build(page)?;
        let file = File::create(output)?;
        let mut writer = BufWriter::new(file);
        doc.save(&mut writer)
            .map_err(|e| PdfWriterError::GenerationError(e.to_string()))?;
        Ok(())
    }
}
