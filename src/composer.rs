//! Document composition
//!
//! Copies the pages of selected records into a new document, in selection
//! order. Blank pages inside a record's range are re-checked at copy time and
//! left out. Each source document is opened at most once per composition and
//! every handle is dropped when [`compose`] returns, on success or failure.

use crate::classifier;
use crate::document::{DocumentError, SourceDocument};
use crate::pdf_reader::LopdfSource;
use crate::record::QuestionRecord;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Page attributes a page may inherit from its ancestors
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Page keys that tie a page to its source document
const DROPPED_PAGE_KEYS: [&[u8]; 4] = [b"Parent", b"Annots", b"B", b"StructParents"];

/// Composition error types
#[derive(Debug, Error)]
pub enum ComposeError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Record {id}: page range must have one or two endpoints, got {pages:?}")]
    InvalidRange { id: String, pages: Vec<usize> },

    #[error("PDF error in {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ComposeError>;

/// Destination of copied pages
pub trait OutputSink {
    /// Source document type this sink copies from
    type Source: SourceDocument;

    /// Open a source document
    fn open_source(&self, path: &Path) -> Result<Self::Source>;

    /// Append page `index` of `source` to the output
    fn append_page(&mut self, source: &Self::Source, index: usize) -> Result<()>;
}

/// Summary of one composition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ComposeStats {
    pub records: usize,
    pub pages_copied: usize,
    pub blank_pages_skipped: usize,
    pub sources_opened: usize,
}

/// Inclusive `[start, end]` endpoints of a record
fn endpoints(record: &QuestionRecord) -> Result<(usize, usize)> {
    match record.pages.indices().as_slice() {
        [page] => Ok((*page, *page)),
        [start, end] => Ok((*start, *end)),
        other => Err(ComposeError::InvalidRange {
            id: record.id.clone(),
            pages: other.to_vec(),
        }),
    }
}

/// Copy the non-blank pages of `records` into `sink`, in order
pub fn compose<S: OutputSink>(records: &[QuestionRecord], sink: &mut S) -> Result<ComposeStats> {
    let mut sources: HashMap<PathBuf, S::Source> = HashMap::new();
    let mut stats = ComposeStats {
        records: records.len(),
        ..Default::default()
    };

    for record in records {
        let (start, end) = endpoints(record)?;

        let source = &*match sources.entry(record.source.clone()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                stats.sources_opened += 1;
                entry.insert(sink.open_source(&record.source)?)
            }
        };

        for page in start..=end {
            if classifier::is_blank(source, page)? {
                stats.blank_pages_skipped += 1;
                continue;
            }
            sink.append_page(source, page)?;
            stats.pages_copied += 1;
        }
    }

    tracing::debug!(
        "Composed {} records: {} pages copied, {} blank pages skipped, {} sources",
        stats.records,
        stats.pages_copied,
        stats.blank_pages_skipped,
        stats.sources_opened
    );
    Ok(stats)
}

/// lopdf output document assembled from copied pages
pub struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// Per-source mapping from source object ids to output object ids
    remaps: HashMap<PathBuf, HashMap<ObjectId, ObjectId>>,
}

impl Default for OutputDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl OutputDocument {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
            remaps: HashMap::new(),
        }
    }

    /// Pages appended so far
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Copy one page from a loaded source document
    pub fn copy_page(&mut self, source: &LopdfSource, index: usize) -> Result<()> {
        let src = source.document();
        let page_id = source.page_id(index)?;
        let pdf_error = |e: lopdf::Error| ComposeError::Pdf {
            path: source.path().to_path_buf(),
            message: e.to_string(),
        };

        let mut page = src.get_dictionary(page_id).map_err(pdf_error)?.clone();
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Some(value) = inherited(src, page_id, key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        for key in DROPPED_PAGE_KEYS {
            page.remove(key);
        }

        let remap = self.remaps.entry(source.path().to_path_buf()).or_default();
        let mut copied = match copy_object(src, &mut self.doc, remap, Object::Dictionary(page)) {
            Object::Dictionary(dict) => dict,
            _ => Dictionary::new(),
        };
        copied.set("Parent", self.pages_id);

        let new_id = self.doc.add_object(copied);
        self.kids.push(new_id);
        Ok(())
    }

    /// Finish the page tree and return the lopdf document
    pub fn into_document(mut self) -> Document {
        let kids: Vec<Object> = self.kids.iter().map(|&id| id.into()).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();
        self.doc
    }

    /// Write the document to `path`
    pub fn save(self, path: &Path) -> Result<()> {
        let mut doc = self.into_document();
        doc.save(path).map_err(|e| ComposeError::Pdf {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Serialize the document to bytes
    pub fn to_bytes(self) -> Result<Vec<u8>> {
        let mut doc = self.into_document();
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|e| ComposeError::Pdf {
            path: PathBuf::from("<memory>"),
            message: e.to_string(),
        })?;
        Ok(bytes)
    }
}

impl OutputSink for OutputDocument {
    type Source = LopdfSource;

    fn open_source(&self, path: &Path) -> Result<LopdfSource> {
        Ok(LopdfSource::open(path)?)
    }

    fn append_page(&mut self, source: &LopdfSource, index: usize) -> Result<()> {
        self.copy_page(source, index)
    }
}

/// Nearest ancestor value of an inheritable page attribute
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..32 {
        let parent_id = node.get(b"Parent").ok()?.as_reference().ok()?;
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value);
        }
    }
    None
}

fn is_page_tree_node(obj: &Object) -> bool {
    let dict = match obj {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type").and_then(Object::as_name),
        Ok(b"Page") | Ok(b"Pages")
    )
}

/// Deep-copy `obj` from `src` into `dst`, following references once each
fn copy_object(
    src: &Document,
    dst: &mut Document,
    remap: &mut HashMap<ObjectId, ObjectId>,
    obj: Object,
) -> Object {
    match obj {
        Object::Reference(id) => {
            if let Some(&mapped) = remap.get(&id) {
                return Object::Reference(mapped);
            }
            let new_id = dst.new_object_id();
            remap.insert(id, new_id);

            let resolved = match src.get_object(id) {
                Ok(target) if !is_page_tree_node(target) => target.clone(),
                _ => Object::Null,
            };
            let copied = copy_object(src, dst, remap, resolved);
            dst.objects.insert(new_id, copied);
            Object::Reference(new_id)
        }
        Object::Array(items) => Object::Array(
            items
                .into_iter()
                .map(|item| copy_object(src, dst, remap, item))
                .collect(),
        ),
        Object::Dictionary(dict) => Object::Dictionary(copy_dictionary(src, dst, remap, &dict)),
        Object::Stream(stream) => {
            let dict = copy_dictionary(src, dst, remap, &stream.dict);
            Object::Stream(Stream::new(dict, stream.content))
        }
        other => other,
    }
}

fn copy_dictionary(
    src: &Document,
    dst: &mut Document,
    remap: &mut HashMap<ObjectId, ObjectId>,
    dict: &Dictionary,
) -> Dictionary {
    let mut copied = Dictionary::new();
    for (key, value) in dict.iter() {
        if key.as_slice() == b"Parent" {
            continue;
        }
        copied.set(key.clone(), copy_object(src, dst, remap, value.clone()));
    }
    copied
}
