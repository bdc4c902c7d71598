//! Top-level extraction pipeline.
//!
//! Wires the pieces together: open and authenticate the document, check
//! the extraction permission, run every requested page through the
//! interpreter, and collect the analyzed layout.

use std::collections::HashSet;

use bytes::Bytes;

use crate::content::Interpreter;
use crate::device::Device;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::fonts::ResourceManager;
use crate::layout::{LAParams, LayoutPage, PageAggregator};

/// Options for the extraction pipeline.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// User password (empty for unprotected documents)
    pub password: String,
    /// Stop after this many pages (0 = no limit)
    pub maxpages: usize,
    /// Process only these zero-based page numbers
    pub page_numbers: Option<HashSet<usize>>,
    /// Refuse documents whose permissions forbid text extraction
    pub check_extractable: bool,
    /// Strict parsing (recoverable errors become failures)
    pub strict: bool,
    /// Layout analysis parameters
    pub laparams: LAParams,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            password: String::new(),
            maxpages: 0,
            page_numbers: None,
            check_extractable: true,
            strict: false,
            laparams: LAParams::default(),
        }
    }
}

/// Run the requested pages of an open document through a device.
///
/// Fails with [`Error::TextExtractionNotAllowed`] when the permission
/// bits forbid extraction (P & 16 == 0) and the check is enabled.
pub fn process_document<D: Device>(
    doc: &Document,
    rsrcmgr: &mut ResourceManager,
    device: &mut D,
    opts: &ExtractOptions,
) -> Result<()> {
    if opts.check_extractable && !doc.is_extractable() {
        return Err(Error::TextExtractionNotAllowed);
    }
    for (pageno, page) in doc.pages().enumerate() {
        let selected = opts
            .page_numbers
            .as_ref()
            .map(|sel| sel.contains(&pageno))
            .unwrap_or(true);
        if selected {
            Interpreter::new(rsrcmgr, device, doc).process_page(&page)?;
        }
        if opts.maxpages > 0 && opts.maxpages <= pageno + 1 {
            break;
        }
    }
    Ok(())
}

/// Open a PDF and return the analyzed layout of its pages.
pub fn extract_pages(data: impl Into<Bytes>, opts: &ExtractOptions) -> Result<Vec<LayoutPage>> {
    let doc = Document::with_options(data, &opts.password, opts.strict)?;
    if opts.check_extractable && !doc.is_extractable() {
        return Err(Error::TextExtractionNotAllowed);
    }
    let mut rsrcmgr = ResourceManager::new();
    let mut aggregator = PageAggregator::new(Some(opts.laparams.clone()));
    let mut pages = Vec::new();
    for (pageno, page) in doc.pages().enumerate() {
        let selected = opts
            .page_numbers
            .as_ref()
            .map(|sel| sel.contains(&pageno))
            .unwrap_or(true);
        if selected {
            Interpreter::new(&mut rsrcmgr, &mut aggregator, &doc).process_page(&page)?;
            if let Some(layout) = aggregator.take_result() {
                pages.push(layout);
            }
        }
        if opts.maxpages > 0 && opts.maxpages <= pageno + 1 {
            break;
        }
    }
    Ok(pages)
}
