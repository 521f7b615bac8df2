//! Difficulty marker detection
//!
//! Record-start pages carry a mandatory visual marker that encodes the
//! question's difficulty as one, two or three coloured bars. Newer exports
//! draw the bars as vector paths, older ones embed them as a small raster
//! strip. Both are tried in order and the first conclusive answer wins.

use crate::document::{Drawing, DocumentError, FillColor, PageImage, SourceDocument};
use crate::record::Tier;
use std::path::PathBuf;
use thiserror::Error;

/// Fill colour of the vector difficulty bars
pub const MARKER_FILL: FillColor = [0.0, 0.372_549, 0.627_451];

/// Per-component tolerance when comparing fill colours
pub const MARKER_FILL_TOLERANCE: f32 = 5e-5;

/// Pixel width of the raster difficulty strip
pub const MARKER_IMAGE_WIDTH: u32 = 46;

/// Bar colour inside the raster difficulty strip
pub const MARKER_PIXEL: [u8; 3] = [0, 83, 155];

/// Horizontal inset of the outer raster sample points
pub const MARKER_SAMPLE_INSET: u32 = 5;

/// Difficulty detection error types
#[derive(Debug, Error)]
pub enum DifficultyError {
    #[error("{path}, page {page}: no difficulty marker found")]
    MarkerNotFound { path: PathBuf, page: usize },

    #[error(transparent)]
    Document(#[from] DocumentError),
}

pub type Result<T> = std::result::Result<T, DifficultyError>;

/// How a marker is looked for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Count filled vector paths in the marker colour
    Vector,
    /// Sample pixels of marker-sized raster images
    Raster,
}

/// Outcome of one strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    Matched(Tier),
    Undetermined,
}

impl Detection {
    fn from_count(count: usize) -> Self {
        Tier::from_marker_count(count).map_or(Detection::Undetermined, Detection::Matched)
    }
}

/// Marker appearance
#[derive(Debug, Clone)]
pub struct MarkerSpec {
    pub fill: FillColor,
    pub fill_tolerance: f32,
    pub image_width: u32,
    pub pixel: [u8; 3],
    pub sample_inset: u32,
}

impl Default for MarkerSpec {
    fn default() -> Self {
        Self {
            fill: MARKER_FILL,
            fill_tolerance: MARKER_FILL_TOLERANCE,
            image_width: MARKER_IMAGE_WIDTH,
            pixel: MARKER_PIXEL,
            sample_inset: MARKER_SAMPLE_INSET,
        }
    }
}

impl MarkerSpec {
    fn fill_matches(&self, color: &FillColor) -> bool {
        color
            .iter()
            .zip(self.fill.iter())
            .all(|(a, b)| (a - b).abs() < self.fill_tolerance)
    }

    /// Number of filled drawings painted in the marker colour
    pub fn count_vector(&self, drawings: &[Drawing]) -> usize {
        drawings
            .iter()
            .filter_map(|d| d.fill.as_ref())
            .filter(|fill| self.fill_matches(fill))
            .count()
    }

    /// Number of sample points in marker colour across marker-sized images
    pub fn count_raster(&self, images: &[PageImage]) -> usize {
        let mut count = 0;
        let mut usable = false;

        for image in images.iter().filter(|img| img.width == self.image_width) {
            let Some(pixels) = image.decode() else {
                tracing::debug!(
                    "Marker-sized image ({}x{}) could not be decoded",
                    image.width,
                    image.height
                );
                continue;
            };
            usable = true;

            let (width, height) = pixels.dimensions();
            let y = height / 2;
            let xs = [
                self.sample_inset,
                width / 2,
                width.saturating_sub(self.sample_inset),
            ];
            count += xs
                .iter()
                .filter(|&&x| x < width && y < height)
                .filter(|&&x| pixels.get_pixel(x, y).0 == self.pixel)
                .count();
        }

        if !usable {
            tracing::debug!("No usable marker image on page");
        }
        count
    }
}

/// Tries detection strategies in priority order
#[derive(Debug, Clone)]
pub struct DifficultyDetector {
    spec: MarkerSpec,
    strategies: Vec<Strategy>,
}

impl Default for DifficultyDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl DifficultyDetector {
    /// Vector first, raster as fallback
    pub fn new() -> Self {
        Self {
            spec: MarkerSpec::default(),
            strategies: vec![Strategy::Vector, Strategy::Raster],
        }
    }

    pub fn with_spec(mut self, spec: MarkerSpec) -> Self {
        self.spec = spec;
        self
    }

    pub fn with_strategies(mut self, strategies: Vec<Strategy>) -> Self {
        self.strategies = strategies;
        self
    }

    pub fn spec(&self) -> &MarkerSpec {
        &self.spec
    }

    /// Run a single strategy on one page
    pub fn detect<D: SourceDocument + ?Sized>(
        &self,
        doc: &D,
        page: usize,
        strategy: Strategy,
    ) -> Result<Detection> {
        let count = match strategy {
            Strategy::Vector => self.spec.count_vector(&doc.page_drawings(page)?),
            Strategy::Raster => {
                let images = doc.page_images(page)?;
                if images.is_empty() {
                    tracing::debug!("{}, page {}: no images found", doc.path().display(), page + 1);
                }
                self.spec.count_raster(&images)
            }
        };
        Ok(Detection::from_count(count))
    }

    /// Tier of a record-start page; a missing marker is an error
    pub fn detect_tier<D: SourceDocument + ?Sized>(&self, doc: &D, page: usize) -> Result<Tier> {
        for &strategy in &self.strategies {
            match self.detect(doc, page, strategy)? {
                Detection::Matched(tier) => return Ok(tier),
                Detection::Undetermined => {
                    tracing::debug!(
                        "{}, page {}: {:?} marker detection undetermined",
                        doc.path().display(),
                        page + 1,
                        strategy
                    );
                }
            }
        }

        Err(DifficultyError::MarkerNotFound {
            path: doc.path().to_path_buf(),
            page,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{solid_image, ImageData, MemoryDocument, MemoryPage};
    use image::Rgb;

    fn vector_page(markers: usize) -> MemoryPage {
        let mut page = MemoryPage::with_text("Question ID 0a1b2c3d")
            .drawing(Drawing::stroked())
            .drawing(Drawing::filled([1.0, 1.0, 1.0]));
        for _ in 0..markers {
            page = page.drawing(Drawing::filled(MARKER_FILL));
        }
        page
    }

    /// Marker strip with `bars` of the three sample points painted
    fn strip(bars: usize) -> PageImage {
        let mut img = solid_image(MARKER_IMAGE_WIDTH, 10, [255, 255, 255]);
        let xs = [5, MARKER_IMAGE_WIDTH / 2, MARKER_IMAGE_WIDTH - 5];
        for &x in xs.iter().take(bars) {
            img.put_pixel(x, 5, Rgb(MARKER_PIXEL));
        }
        PageImage::from_rgb(img)
    }

    #[test]
    fn test_vector_counts_map_to_tiers() {
        let detector = DifficultyDetector::new();
        for (markers, expected) in [
            (0, Detection::Undetermined),
            (1, Detection::Matched(Tier::Easy)),
            (2, Detection::Matched(Tier::Medium)),
            (3, Detection::Matched(Tier::Hard)),
            (4, Detection::Undetermined),
        ] {
            let doc = MemoryDocument::new("q.pdf", vec![vector_page(markers)]);
            let detection = detector.detect(&doc, 0, Strategy::Vector).unwrap();
            assert_eq!(detection, expected, "markers = {}", markers);
        }
    }

    #[test]
    fn test_vector_tolerance() {
        let spec = MarkerSpec::default();
        let near = [MARKER_FILL[0], MARKER_FILL[1] + 4e-5, MARKER_FILL[2] - 4e-5];
        let far = [MARKER_FILL[0], MARKER_FILL[1] + 1e-3, MARKER_FILL[2]];
        let drawings = [Drawing::filled(near), Drawing::filled(far), Drawing::stroked()];
        assert_eq!(spec.count_vector(&drawings), 1);
    }

    #[test]
    fn test_raster_counts_sample_points() {
        let spec = MarkerSpec::default();
        assert_eq!(spec.count_raster(&[strip(0)]), 0);
        assert_eq!(spec.count_raster(&[strip(1)]), 1);
        assert_eq!(spec.count_raster(&[strip(3)]), 3);
    }

    #[test]
    fn test_raster_ignores_other_widths() {
        let spec = MarkerSpec::default();
        let wide = PageImage::from_rgb(solid_image(200, 10, MARKER_PIXEL));
        assert_eq!(spec.count_raster(&[wide]), 0);
    }

    #[test]
    fn test_raster_skips_undecodable() {
        let spec = MarkerSpec::default();
        let opaque = PageImage {
            width: MARKER_IMAGE_WIDTH,
            height: 10,
            data: ImageData::Unsupported,
        };
        assert_eq!(spec.count_raster(&[opaque, strip(2)]), 2);
    }

    #[test]
    fn test_raster_fallback_when_vector_undetermined() {
        let doc = MemoryDocument::new(
            "q.pdf",
            vec![MemoryPage::with_text("Question ID 0a1b2c3d").image(strip(2))],
        );
        let tier = DifficultyDetector::new().detect_tier(&doc, 0).unwrap();
        assert_eq!(tier, Tier::Medium);
    }

    #[test]
    fn test_vector_wins_over_raster() {
        let doc = MemoryDocument::new("q.pdf", vec![vector_page(3).image(strip(1))]);
        let tier = DifficultyDetector::new().detect_tier(&doc, 0).unwrap();
        assert_eq!(tier, Tier::Hard);
    }

    #[test]
    fn test_missing_marker_is_error() {
        let doc = MemoryDocument::new("q.pdf", vec![vector_page(0)]);
        let err = DifficultyDetector::new().detect_tier(&doc, 0).unwrap_err();
        match err {
            DifficultyError::MarkerNotFound { path, page } => {
                assert_eq!(path, PathBuf::from("q.pdf"));
                assert_eq!(page, 0);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_single_strategy_detector() {
        let doc = MemoryDocument::new("q.pdf", vec![MemoryPage::blank().image(strip(1))]);
        let detector = DifficultyDetector::new().with_strategies(vec![Strategy::Vector]);
        assert!(detector.detect_tier(&doc, 0).is_err());
    }
}
