//! PDF Reader module
//!
//! lopdf-backed [`SourceDocument`]. Text comes from lopdf's text extraction,
//! vector drawings from a small interpreter over the page content stream's
//! colour and painting operators (descending into form XObjects), and images
//! from the page's image XObjects.

use crate::document::{
    DocumentError, Drawing, FillColor, ImageData, PageImage, Result, SourceDocument,
};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum `/Parent` hops followed when looking for inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Maximum nesting of form XObjects followed by the drawing interpreter
const MAX_FORM_DEPTH: usize = 8;

/// lopdf-based source document
pub struct LopdfSource {
    path: PathBuf,
    document: Document,
    pages: Vec<ObjectId>,
}

impl std::fmt::Debug for LopdfSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LopdfSource")
            .field("path", &self.path)
            .field("pages", &self.pages.len())
            .finish()
    }
}

impl LopdfSource {
    /// Open a PDF file
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(DocumentError::FileNotFound(path.to_path_buf()));
        }

        let document = Document::load(path).map_err(|e| DocumentError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_document(path, document)
    }

    /// Load a PDF held in memory; `path` only labels diagnostics
    pub fn from_bytes(path: impl Into<PathBuf>, bytes: &[u8]) -> Result<Self> {
        let path = path.into();
        let document = Document::load_mem(bytes).map_err(|e| DocumentError::Open {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Self::from_document(path, document)
    }

    /// Wrap an already loaded document
    pub fn from_document(path: impl Into<PathBuf>, document: Document) -> Result<Self> {
        let path = path.into();
        if document.is_encrypted() {
            return Err(DocumentError::Encrypted(path));
        }
        let pages = document.get_pages().into_values().collect();
        Ok(Self {
            path,
            document,
            pages,
        })
    }

    /// Underlying lopdf document
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Object id of the page dictionary at `index`
    pub fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or_else(|| DocumentError::PageOutOfRange {
                path: self.path.clone(),
                index,
                count: self.pages.len(),
            })
    }

    fn content_error(&self, page: usize, err: impl ToString) -> DocumentError {
        DocumentError::Content {
            path: self.path.clone(),
            page,
            message: err.to_string(),
        }
    }

    /// Image XObject streams reachable from the page's resources
    fn image_objects(&self, index: usize) -> Result<Vec<ObjectId>> {
        let page_id = self.page_id(index)?;
        let doc = &self.document;
        let mut seen = HashSet::new();
        let mut images = Vec::new();

        for resources in resource_chain(doc, page_id) {
            let Ok(xobjects) = resources.get(b"XObject") else {
                continue;
            };
            let Some(xobjects) = as_dict(doc, xobjects) else {
                continue;
            };
            for (_, entry) in xobjects.iter() {
                let Ok(id) = entry.as_reference() else {
                    continue;
                };
                if !seen.insert(id) {
                    continue;
                }
                let is_image = doc
                    .get_object(id)
                    .and_then(Object::as_stream)
                    .map(|s| name_is(doc, s.dict.get(b"Subtype").ok(), b"Image"))
                    .unwrap_or(false);
                if is_image {
                    images.push(id);
                }
            }
        }
        Ok(images)
    }

    fn load_image(&self, id: ObjectId) -> Option<PageImage> {
        let doc = &self.document;
        let stream = doc.get_object(id).ok()?.as_stream().ok()?;
        let dict = &stream.dict;

        let width = dict.get(b"Width").ok().and_then(|o| number(resolve(doc, o)))? as u32;
        let height = dict.get(b"Height").ok().and_then(|o| number(resolve(doc, o)))? as u32;

        let filters = filter_names(doc, dict);
        let data = if filters.last().map(Vec::as_slice) == Some(b"DCTDecode".as_slice()) {
            ImageData::Jpeg(stream.content.clone())
        } else if filters
            .iter()
            .all(|f| f.as_slice() == b"FlateDecode")
        {
            let bits = dict
                .get(b"BitsPerComponent")
                .ok()
                .and_then(|o| number(resolve(doc, o)))
                .unwrap_or(8.0) as u32;
            match (bits, color_components(doc, dict)) {
                (8, Some(components)) => {
                    let samples = if filters.is_empty() {
                        stream.content.clone()
                    } else {
                        stream.decompressed_content().ok()?
                    };
                    ImageData::Raw {
                        samples,
                        components,
                    }
                }
                _ => ImageData::Unsupported,
            }
        } else {
            ImageData::Unsupported
        };

        Some(PageImage {
            width,
            height,
            data,
        })
    }
}

impl SourceDocument for LopdfSource {
    fn path(&self) -> &Path {
        &self.path
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String> {
        self.page_id(index)?;
        self.document
            .extract_text(&[index as u32 + 1])
            .map_err(|e| self.content_error(index, e))
    }

    fn page_drawings(&self, index: usize) -> Result<Vec<Drawing>> {
        let page_id = self.page_id(index)?;
        let bytes = self
            .document
            .get_page_content(page_id)
            .map_err(|e| self.content_error(index, e))?;
        let resources = resource_chain(&self.document, page_id);

        let mut painter = Painter::default();
        paint(&self.document, &mut painter, &bytes, &resources, 0)
            .map_err(|e| self.content_error(index, e))?;
        Ok(painter.drawings)
    }

    fn page_images(&self, index: usize) -> Result<Vec<PageImage>> {
        Ok(self
            .image_objects(index)?
            .into_iter()
            .filter_map(|id| self.load_image(id))
            .collect())
    }

    fn page_image_count(&self, index: usize) -> Result<usize> {
        Ok(self.image_objects(index)?.len())
    }
}

/// Graphics state tracked while walking a content stream
///
/// `fill` is `None` while a non-flat (pattern) fill is active.
#[derive(Debug)]
struct Painter {
    fill: Option<FillColor>,
    stack: Vec<Option<FillColor>>,
    drawings: Vec<Drawing>,
}

impl Default for Painter {
    fn default() -> Self {
        Self {
            fill: Some([0.0, 0.0, 0.0]),
            stack: Vec::new(),
            drawings: Vec::new(),
        }
    }
}

impl Painter {
    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "q" => self.stack.push(self.fill),
            "Q" => {
                if let Some(fill) = self.stack.pop() {
                    self.fill = fill;
                }
            }
            "rg" | "g" | "k" => {
                if let Some(color) = color_from_operands(operands) {
                    self.fill = Some(color);
                }
            }
            "sc" | "scn" => self.fill = color_from_operands(operands),
            "cs" => self.fill = Some([0.0, 0.0, 0.0]),
            "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => {
                self.drawings.push(Drawing { fill: self.fill });
            }
            "S" | "s" => self.drawings.push(Drawing::stroked()),
            _ => {}
        }
    }
}

/// Run `content` through `painter`, following `Do` into form XObjects
///
/// A form inherits the caller's fill state inside an implicit `q`/`Q` pair and
/// resolves names in its own resources first.
fn paint<'a>(
    doc: &'a Document,
    painter: &mut Painter,
    content: &[u8],
    resources: &[&'a Dictionary],
    depth: usize,
) -> lopdf::Result<()> {
    let content = Content::decode(content)?;
    for op in &content.operations {
        if op.operator != "Do" {
            painter.apply(&op.operator, &op.operands);
            continue;
        }
        if depth >= MAX_FORM_DEPTH {
            tracing::debug!("Form XObject nesting deeper than {}, not followed", MAX_FORM_DEPTH);
            continue;
        }
        let Some(form) = op
            .operands
            .first()
            .and_then(|o| o.as_name().ok())
            .and_then(|name| find_form(doc, resources, name))
        else {
            continue;
        };

        let bytes = form
            .decompressed_content()
            .unwrap_or_else(|_| form.content.clone());
        let mut chain: Vec<&Dictionary> = form
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|r| as_dict(doc, r))
            .into_iter()
            .collect();
        chain.extend_from_slice(resources);

        painter.apply("q", &[]);
        paint(doc, painter, &bytes, &chain, depth + 1)?;
        painter.apply("Q", &[]);
    }
    Ok(())
}

/// Form XObject named `name` in the first resources dictionary that has it
fn find_form<'a>(doc: &'a Document, resources: &[&'a Dictionary], name: &[u8]) -> Option<&'a Stream> {
    resources.iter().find_map(|res| {
        let xobjects = as_dict(doc, res.get(b"XObject").ok()?)?;
        let stream = resolve(doc, xobjects.get(name).ok()?).as_stream().ok()?;
        name_is(doc, stream.dict.get(b"Subtype").ok(), b"Form").then_some(stream)
    })
}

/// Gray, RGB or CMYK operands as an RGB triple
fn color_from_operands(operands: &[Object]) -> Option<FillColor> {
    let values: Option<Vec<f32>> = operands.iter().map(number).collect();
    match values?.as_slice() {
        [gray] => Some([*gray; 3]),
        [r, g, b] => Some([*r, *g, *b]),
        [c, m, y, k] => Some([
            (1.0 - c) * (1.0 - k),
            (1.0 - m) * (1.0 - k),
            (1.0 - y) * (1.0 - k),
        ]),
        _ => None,
    }
}

/// Extract number from PDF object
fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(f) => Some(*f as f32),
        _ => None,
    }
}

/// Follow a reference, if any
fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn as_dict<'a>(doc: &'a Document, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj) {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

fn name_is(doc: &Document, obj: Option<&Object>, expected: &[u8]) -> bool {
    obj.map(|o| resolve(doc, o))
        .and_then(|o| o.as_name().ok())
        .is_some_and(|name| name == expected)
}

/// `/Filter` entry as a list of names
fn filter_names(doc: &Document, dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter").map(|o| resolve(doc, o)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| resolve(doc, o).as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// Colour components per pixel of an image dictionary
fn color_components(doc: &Document, dict: &Dictionary) -> Option<u8> {
    let space = resolve(doc, dict.get(b"ColorSpace").ok()?);
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Some(1),
            b"DeviceRGB" | b"CalRGB" => Some(3),
            b"DeviceCMYK" => Some(4),
            _ => None,
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| resolve(doc, o).as_name().ok())?;
            match family {
                b"ICCBased" => {
                    let profile = as_dict(doc, items.get(1)?)?;
                    let n = number(resolve(doc, profile.get(b"N").ok()?))? as u8;
                    matches!(n, 1 | 3 | 4).then_some(n)
                }
                b"CalGray" => Some(1),
                b"CalRGB" => Some(3),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Resources dictionaries of a page, own first, then inherited ones
fn resource_chain(doc: &Document, page_id: ObjectId) -> Vec<&Dictionary> {
    let mut chain = Vec::new();
    let mut node = doc.get_dictionary(page_id).ok();
    let mut depth = 0;

    while let Some(dict) = node {
        if let Some(resources) = dict.get(b"Resources").ok().and_then(|r| as_dict(doc, r)) {
            chain.push(resources);
        }
        depth += 1;
        if depth > MAX_INHERITANCE_DEPTH {
            break;
        }
        node = dict
            .get(b"Parent")
            .ok()
            .and_then(|p| p.as_reference().ok())
            .and_then(|id| doc.get_dictionary(id).ok());
    }
    chain
}
