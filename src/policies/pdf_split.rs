//! Split paginated PDF items into one child item per page.
//!
//! Page files land under
//! `<output_dir>/<guid[0..3]>/<guid[3..6]>/<guid>/<name>_Page<NNNN>.pdf` so
//! that two items never write to the same place and the page files sort in
//! page order. The generated pages come back through the worker as children
//! of the split item; their parent is then a PDF, which stops them from being
//! split again.

use anyhow::Result;
use async_trait::async_trait;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::SplitPdfPagesConfig;
use crate::effects::{Effect, WorkerItem};
use crate::models::Item;
use crate::traits::Policy;

/// Minimum width of the zero-padded page index.
const MIN_PAGE_DIGITS: usize = 4;

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("item {0} has no binary available")]
    MissingBinary(String),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse PDF: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("PDF has no pages")]
    NoPages,
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write page {page} to {path}: {message}")]
    WritePage {
        page: usize,
        path: PathBuf,
        message: String,
    },
}

pub struct SplitPdfPages {
    output_dir: PathBuf,
    mime_types: HashSet<String>,
}

impl SplitPdfPages {
    pub fn from_config(cfg: &SplitPdfPagesConfig) -> Self {
        Self {
            output_dir: cfg.output_dir.clone(),
            mime_types: cfg.mime_types.iter().map(|m| m.trim().to_string()).collect(),
        }
    }

    fn should_split(&self, item: &Item) -> bool {
        if !self.mime_types.contains(&item.mime_type) {
            return false;
        }
        match item.parent() {
            Some(parent) => !self.mime_types.contains(&parent.mime_type),
            None => true,
        }
    }

    /// Directory that receives the pages of `guid`.
    pub fn export_dir(&self, guid: &str) -> PathBuf {
        let clean: String = guid
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let clean = if clean.is_empty() {
            "unknown".to_string()
        } else {
            clean
        };
        let first = clean.get(0..3).unwrap_or(&clean);
        let second = clean.get(3..6).unwrap_or("_");
        self.output_dir.join(first).join(second).join(&clean)
    }
}

#[async_trait]
impl Policy for SplitPdfPages {
    fn name(&self) -> &str {
        "split_pdf_pages"
    }

    fn description(&self) -> String {
        format!("split PDFs into page items under {}", self.output_dir.display())
    }

    async fn evaluate(&self, item: &WorkerItem) -> Result<Vec<Effect>> {
        let source = item.source_item();
        if !self.should_split(source) {
            return Ok(Vec::new());
        }

        info!(item = %source.guid, name = %source.name, "Splitting PDF");
        let path = source
            .binary_path
            .as_deref()
            .ok_or_else(|| SplitError::MissingBinary(source.guid.clone()))?;
        let bytes = fs::read(path).map_err(|e| SplitError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let base_name = match source.base_name() {
            "" => "document",
            name => name,
        };
        let pages = split_pdf(&bytes, &self.export_dir(&source.guid), base_name)?;
        info!(item = %source.guid, pages = pages.len(), "Split PDF into page items");
        Ok(vec![Effect::SetChildren(pages)])
    }
}

/// Zero-pad width that keeps lexicographic order equal to page order.
pub fn page_number_width(page_count: usize) -> usize {
    page_count.to_string().len().max(MIN_PAGE_DIGITS)
}

/// Writes every page of `bytes` as its own PDF inside `export_dir`.
///
/// Each page file holds only the objects reachable from that page, so the
/// work per page does not grow with the size of the whole document. Either
/// all page files are written and returned in page order, or none are left
/// behind.
pub fn split_pdf(bytes: &[u8], export_dir: &Path, base_name: &str) -> Result<Vec<PathBuf>, SplitError> {
    let source = Document::load_mem(bytes)?;
    let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
    if page_ids.is_empty() {
        return Err(SplitError::NoPages);
    }

    fs::create_dir_all(export_dir).map_err(|e| SplitError::CreateDir {
        path: export_dir.to_path_buf(),
        source: e,
    })?;

    let width = page_number_width(page_ids.len());
    let mut written: Vec<PathBuf> = Vec::with_capacity(page_ids.len());
    for (idx, &page_id) in page_ids.iter().enumerate() {
        let page = idx + 1;
        let path = export_dir.join(format!("{}_Page{:0width$}.pdf", base_name, page, width = width));
        if let Err(message) = write_single_page(&source, page_id, &path) {
            remove_partial(&written);
            remove_partial(std::slice::from_ref(&path));
            return Err(SplitError::WritePage {
                page,
                path,
                message,
            });
        }
        written.push(path);
    }
    Ok(written)
}

fn write_single_page(source: &Document, page_id: ObjectId, path: &Path) -> std::result::Result<(), String> {
    let mut page_doc = single_page_document(source, page_id).map_err(|e| e.to_string())?;
    let file = File::create(path).map_err(|e| e.to_string())?;
    let mut writer = BufWriter::new(file);
    page_doc.save_to(&mut writer).map_err(|e| e.to_string())?;
    writer.flush().map_err(|e| e.to_string())
}

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE_KEYS: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Builds a one-page document holding `page_id` and everything it references.
///
/// Object ids are kept from the source. The page tree (other pages, `Pages`
/// nodes, the catalog) is not followed; a fresh `Pages` node and catalog are
/// attached instead.
pub fn single_page_document(source: &Document, page_id: ObjectId) -> lopdf::Result<Document> {
    let mut page = source.get_object(page_id)?.as_dict()?.clone();
    inherit_page_attributes(source, &mut page);
    page.remove(b"Parent");

    let mut doc = Document::with_version(source.version.clone());
    let mut seen: HashSet<ObjectId> = HashSet::from([page_id]);
    let mut pending: Vec<ObjectId> = Vec::new();
    collect_references(&Object::Dictionary(page.clone()), &mut pending);
    while let Some(id) = pending.pop() {
        if !seen.insert(id) {
            continue;
        }
        // Dangling references are written as-is; readers treat them as null.
        let Ok(object) = source.get_object(id) else {
            continue;
        };
        if is_page_tree_node(object) {
            continue;
        }
        collect_references(object, &mut pending);
        doc.objects.insert(id, object.clone());
    }

    doc.max_id = source.max_id;
    let pages_id = doc.new_object_id();
    page.set("Parent", pages_id);
    doc.objects.insert(page_id, Object::Dictionary(page));
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    Ok(doc)
}

fn inherit_page_attributes(source: &Document, page: &mut Dictionary) {
    let mut visited = HashSet::new();
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    while let Some(id) = parent {
        if !visited.insert(id) {
            break;
        }
        let Ok(node) = source.get_object(id).and_then(Object::as_dict) else {
            break;
        };
        for key in INHERITABLE_KEYS {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key.to_vec(), value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
}

fn is_page_tree_node(object: &Object) -> bool {
    let dict = match object {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(
        dict.get(b"Type"),
        Ok(Object::Name(name)) if matches!(name.as_slice(), b"Page" | b"Pages" | b"Catalog")
    )
}

fn collect_references(object: &Object, out: &mut Vec<ObjectId>) {
    match object {
        Object::Reference(id) => out.push(*id),
        Object::Array(items) => {
            for item in items {
                collect_references(item, out);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter() {
                collect_references(value, out);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter() {
                collect_references(value, out);
            }
        }
        _ => {}
    }
}

fn remove_partial(paths: &[PathBuf]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!(path = %path.display(), error = %e, "Failed to remove partial page file");
            }
        }
    }
}
