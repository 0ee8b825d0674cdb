//! Document access: page counts, range slicing, and diagnostics.
//!
//! The controller only needs two things from a document — its page count and
//! the ability to turn a contiguous page range into a standalone byte blob —
//! so that is the whole [`DocumentSource`] trait. Tests drive the controller
//! with an in-memory fake; production uses [`PdfSource`], which slices the
//! page tree with lopdf.
//!
//! ## Blank-page substitution
//!
//! A single corrupt page must not sink a whole chunk: the requested range is
//! always materialised at its full page count, with a blank US-Letter page
//! (612×792 points) standing in for any page whose object is missing or
//! malformed. Each substitution logs a warning and nothing more.
//!
//! Malformed leaves are found by walking the page tree's `Kids` arrays
//! directly. `Document::get_pages` only enumerates kids that already resolve
//! to well-formed page objects, so a corrupt page is invisible to it and
//! every page behind it shifts down by one — both the count and the
//! numbering have to come from the tree itself.

use crate::error::ExtractError;
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Width of a substituted blank page, in points.
const BLANK_PAGE_WIDTH: i64 = 612;
/// Height of a substituted blank page, in points.
const BLANK_PAGE_HEIGHT: i64 = 792;

/// Read-only access to an ordered, paged document.
///
/// `extract_range` must return a self-contained document containing exactly
/// pages `start..=end` (1-based, inclusive), in order.
pub trait DocumentSource: Send + Sync {
    /// Total number of pages.
    fn page_count(&self) -> u32;

    /// Serialise pages `start..=end` into a standalone document.
    fn extract_range(&self, start: u32, end: u32) -> Result<Vec<u8>, ExtractError>;
}

/// A PDF opened for chunked extraction.
///
/// The parsed document is kept in memory for the duration of a run and every
/// `extract_range` call works on a clone, so the source is never mutated and
/// concurrent passes can share one `PdfSource`.
pub struct PdfSource {
    doc: Document,
    page_count: u32,
    stem: String,
    path: Option<PathBuf>,
}

impl PdfSource {
    /// Open and parse a PDF file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ExtractError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let doc = Document::load(path).map_err(|e| ExtractError::DocumentOpen {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        Self::from_parts(doc, stem, Some(path.to_path_buf()))
    }

    /// Parse a PDF from memory. `stem` names the document in artifact files.
    pub fn from_bytes(bytes: &[u8], stem: impl Into<String>) -> Result<Self, ExtractError> {
        let doc = Document::load_mem(bytes).map_err(|e| ExtractError::DocumentOpen {
            path: PathBuf::from("<memory>"),
            detail: e.to_string(),
        })?;
        Self::from_parts(doc, stem.into(), None)
    }

    fn from_parts(
        doc: Document,
        stem: String,
        path: Option<PathBuf>,
    ) -> Result<Self, ExtractError> {
        let page_count = page_tree_kids(&doc).len() as u32;
        if page_count == 0 {
            return Err(ExtractError::EmptyDocument {
                path: path.unwrap_or_else(|| PathBuf::from("<memory>")),
            });
        }
        debug!("opened document '{stem}' with {page_count} pages");
        Ok(Self {
            doc,
            page_count,
            stem,
            path,
        })
    }

    /// The document's stable stem name, used to key artifacts.
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// Gather diagnostics: size, page count, encryption, sampled page
    /// dimensions (first, middle, last page).
    pub fn inspect(&self) -> DocumentInfo {
        let file_size = self
            .path
            .as_deref()
            .and_then(|p| std::fs::metadata(p).ok())
            .map(|m| m.len());

        let pages = self.doc.get_pages();
        let n = self.page_count;
        let mut sample_pages = Vec::new();
        let mut sampled = vec![1, n / 2, n];
        sampled.sort_unstable();
        sampled.dedup();
        for page_no in sampled {
            if page_no < 1 {
                continue;
            }
            if let Some(&page_id) = pages.get(&page_no) {
                if let Some((width, height)) = media_box(&self.doc, page_id) {
                    sample_pages.push(PageDimensions {
                        page: page_no,
                        width,
                        height,
                    });
                }
            }
        }

        DocumentInfo {
            path: self.path.clone(),
            file_size,
            page_count: n,
            encrypted: self.doc.trailer.get(b"Encrypt").is_ok(),
            sample_pages,
        }
    }
}

impl DocumentSource for PdfSource {
    fn page_count(&self) -> u32 {
        self.page_count
    }

    fn extract_range(&self, start: u32, end: u32) -> Result<Vec<u8>, ExtractError> {
        debug_assert!(1 <= start && start <= end && end <= self.page_count);

        let mut doc = self.doc.clone();

        // Repair the whole tree first. A malformed leaf gets a blank
        // stand-in at the same id, keeping the Kids reference valid; only
        // once every leaf is a real page does `get_pages` number the
        // document correctly for the deletion below.
        for (page_no, (page_id, parent_id)) in page_tree_kids(&doc).into_iter().enumerate() {
            if !is_well_formed_page(&doc, page_id) {
                warn!("substituting blank page for malformed page {}", page_no + 1);
                replace_with_blank(&mut doc, page_id, parent_id);
            }
        }

        let pages = doc.get_pages();

        let to_delete: Vec<u32> = pages
            .keys()
            .copied()
            .filter(|p| *p < start || *p > end)
            .collect();
        if !to_delete.is_empty() {
            doc.delete_pages(&to_delete);
        }

        doc.prune_objects();
        doc.renumber_objects();
        doc.compress();

        let mut buf = Vec::new();
        doc.save_to(&mut buf)
            .map_err(|e| ExtractError::ChunkBuild {
                start,
                end,
                detail: e.to_string(),
            })?;
        Ok(buf)
    }
}

/// Whether the object at `page_id` is a usable page dictionary.
fn is_well_formed_page(doc: &Document, page_id: ObjectId) -> bool {
    doc.get_object(page_id)
        .ok()
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|dict| dict.get(b"Type").ok())
        .and_then(|t| t.as_name().ok())
        .map(|name| name == b"Page".as_slice())
        .unwrap_or(false)
}

/// The page tree's leaf entries in document order, each paired with the
/// `Pages` node holding its Kids reference.
///
/// Unlike [`Document::get_pages`], leaves that do not resolve to well-formed
/// page objects are included, so indexes stay aligned with the document's
/// true pagination.
fn page_tree_kids(doc: &Document) -> Vec<(ObjectId, ObjectId)> {
    let mut leaves = Vec::new();
    let root = doc
        .catalog()
        .ok()
        .and_then(|cat| cat.get(b"Pages").ok())
        .and_then(|obj| obj.as_reference().ok());
    if let Some(root) = root {
        collect_tree_leaves(doc, root, &mut leaves, 0);
    }
    leaves
}

fn collect_tree_leaves(
    doc: &Document,
    node_id: ObjectId,
    leaves: &mut Vec<(ObjectId, ObjectId)>,
    depth: usize,
) {
    // Real documents nest a handful of levels; a cycle would recurse forever.
    if depth > 32 {
        return;
    }
    let kids = doc
        .get_object(node_id)
        .ok()
        .and_then(|obj| obj.as_dict().ok())
        .and_then(|dict| dict.get(b"Kids").ok())
        .and_then(|kids| match kids {
            Object::Reference(id) => doc.get_object(*id).ok(),
            other => Some(other),
        })
        .and_then(|kids| kids.as_array().ok())
        .cloned();
    let Some(kids) = kids else {
        return;
    };
    for kid in kids {
        let Ok(kid_id) = kid.as_reference() else {
            continue;
        };
        let is_pages_node = doc
            .get_object(kid_id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .and_then(|dict| dict.get(b"Type").ok())
            .and_then(|t| t.as_name().ok())
            .map(|name| name == b"Pages".as_slice())
            .unwrap_or(false);
        if is_pages_node {
            collect_tree_leaves(doc, kid_id, leaves, depth + 1);
        } else {
            // A page leaf — possibly malformed, which is exactly why it is
            // reported instead of skipped.
            leaves.push((kid_id, node_id));
        }
    }
}

/// Replace the object at `page_id` with a blank page, keeping the id so the
/// parent's Kids reference stays valid.
fn replace_with_blank(doc: &mut Document, page_id: ObjectId, parent_id: ObjectId) {
    let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
    let page = dictionary! {
        "Type" => "Page",
        "Parent" => parent_id,
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(BLANK_PAGE_WIDTH),
            Object::Integer(BLANK_PAGE_HEIGHT),
        ],
        "Resources" => dictionary! {},
        "Contents" => content_id,
    };
    doc.objects.insert(page_id, Object::Dictionary(page));
}

/// Resolve a page's MediaBox (following Parent inheritance) to `(w, h)`.
fn media_box(doc: &Document, page_id: ObjectId) -> Option<(f32, f32)> {
    let mut dict = doc.get_object(page_id).ok()?.as_dict().ok()?;
    for _ in 0..8 {
        if let Ok(mb) = dict.get(b"MediaBox") {
            let mb = match mb {
                Object::Reference(id) => doc.get_object(*id).ok()?,
                other => other,
            };
            let arr = mb.as_array().ok()?;
            if arr.len() >= 4 {
                let x0 = as_number(&arr[0])?;
                let y0 = as_number(&arr[1])?;
                let x1 = as_number(&arr[2])?;
                let y1 = as_number(&arr[3])?;
                return Some(((x1 - x0).abs(), (y1 - y0).abs()));
            }
            return None;
        }
        let parent_id = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_object(parent_id).ok()?.as_dict().ok()?;
    }
    None
}

fn as_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Diagnostics for one document, as printed by `docchunk --inspect-only`.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    /// Source path, when the document came from disk.
    pub path: Option<PathBuf>,
    /// File size in bytes, when known.
    pub file_size: Option<u64>,
    /// Total pages.
    pub page_count: u32,
    /// Whether the trailer carries an /Encrypt entry.
    pub encrypted: bool,
    /// Dimensions of the first, middle, and last page, in points.
    pub sample_pages: Vec<PageDimensions>,
}

/// One sampled page's media-box dimensions.
#[derive(Debug, Clone, Serialize)]
pub struct PageDimensions {
    /// 1-based page number.
    pub page: u32,
    /// Width in points.
    pub width: f32,
    /// Height in points.
    pub height: f32,
}
