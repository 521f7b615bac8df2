//! Source document abstraction
//!
//! The extraction engine only needs a handful of per-page views of a source
//! document: its text, the fill colours of its vector drawings and its
//! embedded raster images. [`SourceDocument`] captures exactly that, so the
//! segmentation logic can run against a real PDF ([`crate::LopdfSource`]) or
//! against pre-extracted pages ([`MemoryDocument`]).

use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Document access error types
#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to open {path}: {message}")]
    Open { path: PathBuf, message: String },

    #[error("Encrypted PDF not supported: {0}")]
    Encrypted(PathBuf),

    #[error("{path}: page index {index} out of range (page count {count})")]
    PageOutOfRange {
        path: PathBuf,
        index: usize,
        count: usize,
    },

    #[error("{path}, page {page}: {message}")]
    Content {
        path: PathBuf,
        page: usize,
        message: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, DocumentError>;

/// RGB fill colour with unit-range components
pub type FillColor = [f32; 3];

/// One painted vector path on a page
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Drawing {
    /// Fill colour, `None` for stroke-only and pattern-filled paths
    pub fill: Option<FillColor>,
}

impl Drawing {
    pub fn filled(color: FillColor) -> Self {
        Self { fill: Some(color) }
    }

    pub fn stroked() -> Self {
        Self { fill: None }
    }
}

/// Pixel payload of an embedded image
#[derive(Debug, Clone)]
pub enum ImageData {
    /// Already decoded RGB pixels
    Rgb(RgbImage),
    /// DCT (JPEG) encoded stream
    Jpeg(Vec<u8>),
    /// Uncompressed 8-bit samples, `components` per pixel (1 = gray, 3 = RGB, 4 = CMYK)
    Raw { samples: Vec<u8>, components: u8 },
    /// Encoding this crate does not sample
    Unsupported,
}

/// Raster image embedded in a page
#[derive(Debug, Clone)]
pub struct PageImage {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    pub data: ImageData,
}

impl PageImage {
    /// Wrap decoded RGB pixels
    pub fn from_rgb(image: RgbImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
            data: ImageData::Rgb(image),
        }
    }

    /// Decode to RGB pixels; `None` if the encoding is not supported or corrupt
    pub fn decode(&self) -> Option<RgbImage> {
        match &self.data {
            ImageData::Rgb(image) => Some(image.clone()),
            ImageData::Jpeg(bytes) => image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)
                .ok()
                .map(|img| img.to_rgb8()),
            ImageData::Raw {
                samples,
                components,
            } => decode_raw(self.width, self.height, samples, *components),
            ImageData::Unsupported => None,
        }
    }
}

fn decode_raw(width: u32, height: u32, samples: &[u8], components: u8) -> Option<RgbImage> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let components = components as usize;
    if components == 0 || samples.len() < pixels * components {
        return None;
    }

    let rgb: Vec<u8> = match components {
        1 => samples[..pixels].iter().flat_map(|&g| [g, g, g]).collect(),
        3 => samples[..pixels * 3].to_vec(),
        4 => samples[..pixels * 4]
            .chunks_exact(4)
            .flat_map(|cmyk| {
                let k = 255 - cmyk[3] as u16;
                let channel = |c: u8| ((255 - c as u16) * k / 255) as u8;
                [channel(cmyk[0]), channel(cmyk[1]), channel(cmyk[2])]
            })
            .collect(),
        _ => return None,
    };

    RgbImage::from_raw(width, height, rgb)
}

/// Read-only, page-oriented view of a source document
pub trait SourceDocument {
    /// Path the document was opened from
    fn path(&self) -> &Path;

    /// Number of pages
    fn page_count(&self) -> usize;

    /// Extracted text of a page
    fn page_text(&self, index: usize) -> Result<String>;

    /// Painted vector paths of a page, in content order
    fn page_drawings(&self, index: usize) -> Result<Vec<Drawing>>;

    /// Embedded raster images of a page
    fn page_images(&self, index: usize) -> Result<Vec<PageImage>>;

    /// Number of embedded raster images on a page
    fn page_image_count(&self, index: usize) -> Result<usize> {
        Ok(self.page_images(index)?.len())
    }
}

/// Pre-extracted page contents
#[derive(Debug, Clone, Default)]
pub struct MemoryPage {
    pub text: String,
    pub drawings: Vec<Drawing>,
    pub images: Vec<PageImage>,
}

impl MemoryPage {
    /// Page with no text, drawings or images
    pub fn blank() -> Self {
        Self::default()
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn drawing(mut self, drawing: Drawing) -> Self {
        self.drawings.push(drawing);
        self
    }

    pub fn image(mut self, image: PageImage) -> Self {
        self.images.push(image);
        self
    }
}

/// In-memory [`SourceDocument`]
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    path: PathBuf,
    pages: Vec<MemoryPage>,
}

impl MemoryDocument {
    pub fn new(path: impl Into<PathBuf>, pages: Vec<MemoryPage>) -> Self {
        Self {
            path: path.into(),
            pages,
        }
    }

    fn page(&self, index: usize) -> Result<&MemoryPage> {
        self.pages
            .get(index)
            .ok_or_else(|| DocumentError::PageOutOfRange {
                path: self.path.clone(),
                index,
                count: self.pages.len(),
            })
    }
}

impl SourceDocument for MemoryDocument {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        Ok(self.page(index)?.text.clone())
    }

    fn page_drawings(&self, index: usize) -> Result<Vec<Drawing>> {
        Ok(self.page(index)?.drawings.clone())
    }

    fn page_images(&self, index: usize) -> Result<Vec<PageImage>> {
        Ok(self.page(index)?.images.clone())
    }

    fn page_image_count(&self, index: usize) -> Result<usize> {
        Ok(self.page(index)?.images.len())
    }
}

/// Solid-colour RGB image for marker fixtures
#[cfg(test)]
pub(crate) fn solid_image(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
    RgbImage::from_pixel(width, height, image::Rgb(color))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_document_pages() {
        let doc = MemoryDocument::new(
            "bank.pdf",
            vec![
                MemoryPage::with_text("hello"),
                MemoryPage::blank().drawing(Drawing::stroked()),
            ],
        );

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.path(), Path::new("bank.pdf"));
        assert_eq!(doc.page_text(0).unwrap(), "hello");
        assert_eq!(doc.page_drawings(1).unwrap().len(), 1);
        assert_eq!(doc.page_image_count(1).unwrap(), 0);
    }

    #[test]
    fn test_memory_document_out_of_range() {
        let doc = MemoryDocument::new("bank.pdf", vec![MemoryPage::blank()]);
        let result = doc.page_text(3);
        assert!(matches!(
            result,
            Err(DocumentError::PageOutOfRange { index: 3, count: 1, .. })
        ));
    }

    #[test]
    fn test_decode_rgb_passthrough() {
        let image = PageImage::from_rgb(solid_image(4, 2, [1, 2, 3]));
        let decoded = image.decode().unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(3, 1).0, [1, 2, 3]);
    }

    #[test]
    fn test_decode_raw_gray_and_cmyk() {
        let gray = PageImage {
            width: 2,
            height: 1,
            data: ImageData::Raw {
                samples: vec![0, 200],
                components: 1,
            },
        };
        let decoded = gray.decode().unwrap();
        assert_eq!(decoded.get_pixel(1, 0).0, [200, 200, 200]);

        // Pure cyan in CMYK is (0, 255, 255) in RGB
        let cmyk = PageImage {
            width: 1,
            height: 1,
            data: ImageData::Raw {
                samples: vec![255, 0, 0, 0],
                components: 4,
            },
        };
        assert_eq!(cmyk.decode().unwrap().get_pixel(0, 0).0, [0, 255, 255]);
    }

    #[test]
    fn test_decode_raw_too_short() {
        let image = PageImage {
            width: 10,
            height: 10,
            data: ImageData::Raw {
                samples: vec![0; 5],
                components: 3,
            },
        };
        assert!(image.decode().is_none());
    }

    #[test]
    fn test_decode_unsupported() {
        let image = PageImage {
            width: 46,
            height: 10,
            data: ImageData::Unsupported,
        };
        assert!(image.decode().is_none());
    }
}
