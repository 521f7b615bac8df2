//! Answer key layout
//!
//! Lays `(identifier, answer)` pairs out as a grid of text lines on a single
//! page below a title. Columns are filled top to bottom before the next one
//! starts. Coordinates are in points with the origin at the top-left corner;
//! the renderer in [`crate::pdf_writer`] flips them.

use crate::merge::AnswerBank;
use crate::record::{QuestionRecord, ANSWER_PLACEHOLDER};
use thiserror::Error;

/// Answer key error types
#[derive(Debug, Error)]
pub enum AnswerKeyError {
    #[error("Invalid answer key geometry: {0}")]
    InvalidGeometry(String),

    #[error("No room for a single answer line below the title (available height {available:.1}pt, line height {line_height:.1}pt)")]
    NoRoom { available: f32, line_height: f32 },
}

pub type Result<T> = std::result::Result<T, AnswerKeyError>;

/// Page geometry and typography of the answer key
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerKeyOptions {
    /// Page width in points
    pub page_width: f32,
    /// Page height in points
    pub page_height: f32,
    /// Margin on every side in points
    pub margin: f32,
    /// Body font size in points
    pub font_size: f32,
    pub title: String,
}

impl Default for AnswerKeyOptions {
    fn default() -> Self {
        Self {
            page_width: 612.0,
            page_height: 792.0,
            margin: 48.0,
            font_size: 13.0,
            title: "Answer key".to_string(),
        }
    }
}

impl AnswerKeyOptions {
    /// Create a new options builder
    pub fn builder() -> AnswerKeyOptionsBuilder {
        AnswerKeyOptionsBuilder::default()
    }

    /// Title font size
    pub fn title_size(&self) -> f32 {
        2.0 * self.font_size
    }

    /// Height reserved for the title block
    pub fn title_block(&self) -> f32 {
        2.0 * self.title_size()
    }

    pub fn line_height(&self) -> f32 {
        1.5 * self.font_size
    }

    /// Indent of each column's text from its left edge
    pub fn indent(&self) -> f32 {
        0.2 * self.margin
    }

    pub fn available_height(&self) -> f32 {
        (self.page_height - (self.margin + self.title_block())) - 2.0 * self.margin
    }

    pub fn available_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    /// Lines that fit in one column
    pub fn row_count(&self) -> usize {
        let rows = (self.available_height() / self.line_height()).floor();
        if rows.is_finite() && rows > 0.0 {
            rows as usize
        } else {
            0
        }
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("page width", self.page_width),
            ("page height", self.page_height),
            ("font size", self.font_size),
        ];
        for (name, value) in positive {
            if !(value.is_finite() && value > 0.0) {
                return Err(AnswerKeyError::InvalidGeometry(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if !(self.margin.is_finite() && self.margin >= 0.0) || self.available_width() <= 0.0 {
            return Err(AnswerKeyError::InvalidGeometry(format!(
                "margin {} leaves no horizontal space",
                self.margin
            )));
        }
        Ok(())
    }
}

/// Builder for AnswerKeyOptions
#[derive(Debug, Default)]
pub struct AnswerKeyOptionsBuilder {
    options: AnswerKeyOptions,
}

impl AnswerKeyOptionsBuilder {
    pub fn page_size(mut self, width: f32, height: f32) -> Self {
        self.options.page_width = width;
        self.options.page_height = height;
        self
    }

    pub fn margin(mut self, margin: f32) -> Self {
        self.options.margin = margin;
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.options.font_size = size;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.options.title = title.into();
        self
    }

    pub fn build(self) -> AnswerKeyOptions {
        self.options
    }
}

/// One answer key line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerEntry {
    pub id: String,
    pub answer: String,
}

impl AnswerEntry {
    pub fn new(id: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            answer: answer.into(),
        }
    }

    /// Text of the line for 0-based position `index`
    pub fn format(&self, index: usize) -> String {
        format!("{:>4}. {:<10}; {}", index + 1, self.id, self.answer)
    }
}

/// Answer key entries for a selection, in selection order
///
/// Records without an answer keep their slot with the placeholder answer.
pub fn entries_for(records: &[QuestionRecord], answers: &AnswerBank) -> Vec<AnswerEntry> {
    records
        .iter()
        .map(|record| match answers.answer(&record.id) {
            Some(answer) => AnswerEntry::new(&record.id, answer),
            None => {
                tracing::warn!("No answer recorded for {}", record.id);
                AnswerEntry::new(&record.id, ANSWER_PLACEHOLDER)
            }
        })
        .collect()
}

/// Column-major grid position `(row, column)` of entry `index`
pub fn grid_position(index: usize, row_count: usize) -> (usize, usize) {
    let row = index % row_count;
    (row, (index - row) / row_count)
}

/// Grid dimensions for a number of entries
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Grid {
    pub row_count: usize,
    pub col_count: usize,
    pub col_width: f32,
}

impl Grid {
    pub fn new(entry_count: usize, row_count: usize, available_width: f32) -> Self {
        let col_count = entry_count.div_ceil(row_count.max(1));
        let col_width = available_width / col_count.max(1) as f32;
        Self {
            row_count,
            col_count,
            col_width,
        }
    }
}

/// Positioned text
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub text: String,
    /// Distance from the left page edge in points
    pub x: f32,
    /// Baseline distance from the top page edge in points
    pub y: f32,
    pub font_size: f32,
}

/// Complete answer key page
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerKeyPage {
    pub width: f32,
    pub height: f32,
    pub grid: Grid,
    pub title: TextLine,
    pub lines: Vec<TextLine>,
}

/// Lay out the answer key page
pub fn layout(entries: &[AnswerEntry], options: &AnswerKeyOptions) -> Result<AnswerKeyPage> {
    options.validate()?;

    let row_count = options.row_count();
    if row_count == 0 {
        return Err(AnswerKeyError::NoRoom {
            available: options.available_height(),
            line_height: options.line_height(),
        });
    }

    let grid = Grid::new(entries.len(), row_count, options.available_width());
    let top = options.margin + options.title_block();
    let row_height = options.line_height();

    let lines = entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (row, col) = grid_position(i, row_count);
            TextLine {
                text: entry.format(i),
                x: options.margin + options.indent() + col as f32 * grid.col_width,
                y: top + (row + 1) as f32 * row_height,
                font_size: options.font_size,
            }
        })
        .collect();

    Ok(AnswerKeyPage {
        width: options.page_width,
        height: options.page_height,
        grid,
        title: TextLine {
            text: options.title.clone(),
            x: options.margin,
            y: top,
            font_size: options.title_size(),
        },
        lines,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AnswerRecord, PageRange, Tier};
    use std::path::PathBuf;

    fn entries(n: usize) -> Vec<AnswerEntry> {
        (0..n)
            .map(|i| AnswerEntry::new(format!("{:08x}", i), "A"))
            .collect()
    }

    #[test]
    fn test_default_geometry() {
        let options = AnswerKeyOptions::default();
        assert_eq!(options.title_block(), 52.0);
        assert_eq!(options.line_height(), 19.5);
        assert_eq!(options.available_height(), 596.0);
        assert_eq!(options.available_width(), 516.0);
        assert_eq!(options.row_count(), 30);
    }

    #[test]
    fn test_column_major_positions() {
        // 10 entries, 4 rows: entry 4 starts column 1
        assert_eq!(grid_position(0, 4), (0, 0));
        assert_eq!(grid_position(3, 4), (3, 0));
        assert_eq!(grid_position(4, 4), (0, 1));
        assert_eq!(grid_position(9, 4), (1, 2));

        let grid = Grid::new(10, 4, 516.0);
        assert_eq!(grid.col_count, 3);
        assert_eq!(grid.col_width, 172.0);
    }

    #[test]
    fn test_layout_places_lines() {
        let options = AnswerKeyOptions::default();
        let page = layout(&entries(35), &options).unwrap();

        assert_eq!(page.grid.row_count, 30);
        assert_eq!(page.grid.col_count, 2);
        assert_eq!(page.lines.len(), 35);

        let first = &page.lines[0];
        assert!((first.x - 57.6).abs() < 1e-4);
        assert_eq!(first.y, 100.0 + 19.5);

        // Entry 30 is the top of the second column
        let second_col = &page.lines[30];
        assert_eq!(second_col.y, first.y);
        assert!((second_col.x - first.x - 258.0).abs() < 1e-4);

        assert_eq!(page.title.text, "Answer key");
        assert_eq!(page.title.font_size, 26.0);
        assert_eq!(page.title.y, 100.0);
    }

    #[test]
    fn test_line_format() {
        let entry = AnswerEntry::new("0a1b2c3d", "B");
        assert_eq!(entry.format(0), "   1. 0a1b2c3d  ; B");
        assert_eq!(entry.format(11), "  12. 0a1b2c3d  ; B");
    }

    #[test]
    fn test_empty_key_has_title_only() {
        let page = layout(&[], &AnswerKeyOptions::default()).unwrap();
        assert!(page.lines.is_empty());
        assert_eq!(page.grid.col_count, 0);
    }

    #[test]
    fn test_no_room_for_lines() {
        let options = AnswerKeyOptions::builder()
            .page_size(612.0, 200.0)
            .margin(48.0)
            .build();
        let err = layout(&entries(1), &options).unwrap_err();
        assert!(matches!(err, AnswerKeyError::NoRoom { .. }));
    }

    #[test]
    fn test_invalid_geometry() {
        let options = AnswerKeyOptions::builder().font_size(0.0).build();
        assert!(matches!(
            layout(&entries(1), &options),
            Err(AnswerKeyError::InvalidGeometry(_))
        ));
        let options = AnswerKeyOptions::builder().margin(400.0).build();
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_entries_follow_selection_order() {
        let record = |id: &str| QuestionRecord {
            id: id.to_string(),
            test: "Math".into(),
            domain: "Algebra".into(),
            skill: "Systems".into(),
            tier: Tier::Easy,
            source: PathBuf::from("q.pdf"),
            pages: PageRange::single(0),
            excluded: false,
        };
        let answers: AnswerBank = vec![AnswerRecord {
            id: "0000000a".into(),
            answer: "C".into(),
            source: PathBuf::from("a.pdf"),
            pages: PageRange::single(0),
        }]
        .into_iter()
        .collect();

        let entries = entries_for(&[record("0000000b"), record("0000000a")], &answers);
        assert_eq!(entries[0], AnswerEntry::new("0000000b", "??"));
        assert_eq!(entries[1], AnswerEntry::new("0000000a", "C"));
    }
}
