use crate::error::ExtractionError;
use crate::page_range::PageSpec;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use tempfile::TempPath;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Catalog entries that point into the old page tree.
const CATALOG_PAGE_REFS: [&[u8]; 8] = [
    b"Outlines",
    b"PageLabels",
    b"Names",
    b"Dests",
    b"OpenAction",
    b"AcroForm",
    b"StructTreeRoot",
    b"Threads",
];

/// Annotation entries that point at pages or at objects that do.
const ANNOT_PAGE_REFS: [&[u8]; 4] = [b"P", b"Parent", b"A", b"Dest"];

pub struct PdfDocument {
    pub doc: Document,
    pub path: String,
}

impl PdfDocument {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractionError> {
        let path_str = path.as_ref().display().to_string();
        let bytes = std::fs::read(&path)?;
        let doc = Document::load_mem(&bytes).map_err(|e| {
            ExtractionError::CorruptSource(format!("failed to open PDF {}: {}", path_str, e))
        })?;
        Ok(PdfDocument {
            doc,
            path: path_str,
        })
    }

    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// Build a document holding `pages` (1-based) in the given order.
    ///
    /// A page listed twice appears twice. Each output page is a fresh copy of the
    /// source page dictionary with inherited attributes resolved, so copies share
    /// content streams and resources but not their place in the page tree.
    pub fn extract_pages(&self, pages: &[u32]) -> Result<Document, ExtractionError> {
        let page_ids = self.doc.get_pages();
        let total = page_ids.len() as u32;

        let mut new_doc = self.doc.clone();
        let pages_root = pages_root_id(&new_doc)?;

        let mut kids = Vec::with_capacity(pages.len());
        for &page in pages {
            let page_id = page_ids.get(&page).copied().ok_or_else(|| {
                ExtractionError::CorruptSource(format!(
                    "{}: page {} is out of range (1-{})",
                    self.path, page, total
                ))
            })?;

            let mut page_dict = flattened_page(&self.doc, page_id)?;
            page_dict.set("Parent", Object::Reference(pages_root));
            page_dict.remove(b"B");
            detach_annotations(&mut new_doc, &mut page_dict)?;
            kids.push(Object::Reference(new_doc.add_object(page_dict)));
        }

        let root = new_doc.get_dictionary_mut(pages_root)?;
        root.set("Count", Object::Integer(kids.len() as i64));
        root.set("Kids", Object::Array(kids));
        for key in INHERITABLE {
            root.remove(key);
        }

        // Anything still reaching an unselected page would survive pruning.
        let catalog_id = new_doc.trailer.get(b"Root")?.as_reference()?;
        let catalog = new_doc.get_dictionary_mut(catalog_id)?;
        for key in CATALOG_PAGE_REFS {
            catalog.remove(key);
        }

        new_doc.prune_objects();
        Ok(new_doc)
    }

    /// Serialize into a scratch file in `dir`.
    pub fn save_scratch(doc: &mut Document, dir: &Path) -> Result<TempPath, ExtractionError> {
        let mut file = tempfile::Builder::new()
            .prefix("printdrop-")
            .suffix(".pdf")
            .tempfile_in(dir)?;
        doc.save_to(file.as_file_mut())
            .map_err(|e| ExtractionError::CorruptSource(format!("failed to write PDF: {}", e)))?;
        Ok(file.into_temp_path())
    }
}

fn pages_root_id(doc: &Document) -> Result<ObjectId, ExtractionError> {
    Ok(doc.catalog()?.get(b"Pages")?.as_reference()?)
}

/// Copy of a page dictionary with inheritable attributes pulled down from its parents.
fn flattened_page(doc: &Document, page_id: ObjectId) -> Result<Dictionary, ExtractionError> {
    let mut page = doc.get_dictionary(page_id)?.clone();

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    // Bounded walk; malformed files can have cyclic Parent links.
    let mut depth = 0;
    while let Some(parent_id) = parent {
        if depth > 64 {
            break;
        }
        depth += 1;

        let node = doc.get_dictionary(parent_id)?;
        for key in INHERITABLE {
            if !page.has(key) {
                if let Ok(value) = node.get(key) {
                    page.set(key, value.clone());
                }
            }
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }

    Ok(page)
}

fn is_link(annot: &Dictionary) -> bool {
    matches!(annot.get(b"Subtype").and_then(Object::as_name), Ok(b"Link"))
}

/// Drop link annotations from `page` and cut the page references of the rest.
///
/// Links only navigate, so a printout loses nothing without them.
fn detach_annotations(doc: &mut Document, page: &mut Dictionary) -> Result<(), ExtractionError> {
    let entries = match page.get(b"Annots") {
        Ok(Object::Array(entries)) => entries.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id)?.as_array()?.clone(),
        _ => return Ok(()),
    };

    let mut kept = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Object::Reference(id) => {
                let Ok(annot) = doc.get_dictionary_mut(id) else {
                    continue;
                };
                if is_link(annot) {
                    continue;
                }
                for key in ANNOT_PAGE_REFS {
                    annot.remove(key);
                }
                kept.push(Object::Reference(id));
            }
            Object::Dictionary(mut annot) => {
                if is_link(&annot) {
                    continue;
                }
                for key in ANNOT_PAGE_REFS {
                    annot.remove(key);
                }
                kept.push(Object::Dictionary(annot));
            }
            _ => {}
        }
    }

    if kept.is_empty() {
        page.remove(b"Annots");
    } else {
        page.set("Annots", Object::Array(kept));
    }
    Ok(())
}

/// A PDF on disk together with its authoritative page count.
///
/// Handles created from scratch files own them; dropping the handle deletes the file.
#[derive(Debug)]
pub struct DocumentHandle {
    path: PathBuf,
    page_count: u32,
    scratch: Option<TempPath>,
}

impl DocumentHandle {
    /// Open a document that someone else owns (an upload).
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractionError> {
        let doc = PdfDocument::open(&path)?;
        Ok(DocumentHandle {
            path: path.as_ref().to_path_buf(),
            page_count: doc.page_count(),
            scratch: None,
        })
    }

    /// Open a scratch document; it is removed when the handle is dropped,
    /// including when opening it fails.
    pub fn open_scratch(scratch: TempPath) -> Result<Self, ExtractionError> {
        let doc = PdfDocument::open(&scratch)?;
        Ok(DocumentHandle {
            path: scratch.to_path_buf(),
            page_count: doc.page_count(),
            scratch: Some(scratch),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn is_scratch(&self) -> bool {
        self.scratch.is_some()
    }
}

/// The pages chosen for printing.
#[derive(Debug)]
pub enum Selection<'a> {
    /// Every page; the source handle is used as is.
    Whole(&'a DocumentHandle),
    /// A freshly built scratch document.
    Subset(DocumentHandle),
}

impl Deref for Selection<'_> {
    type Target = DocumentHandle;

    fn deref(&self) -> &DocumentHandle {
        match self {
            Selection::Whole(doc) => doc,
            Selection::Subset(doc) => doc,
        }
    }
}

/// Produce the document to print for `spec`.
pub fn extract<'a>(
    doc: &'a DocumentHandle,
    spec: &PageSpec,
    scratch_dir: &Path,
) -> Result<Selection<'a>, ExtractionError> {
    let pages = match spec {
        PageSpec::All => return Ok(Selection::Whole(doc)),
        PageSpec::Pages(pages) => pages,
    };

    let source = PdfDocument::open(doc.path())?;
    let mut subset = source.extract_pages(pages)?;
    let scratch = PdfDocument::save_scratch(&mut subset, scratch_dir)?;

    Ok(Selection::Subset(DocumentHandle::open_scratch(scratch)?))
}
