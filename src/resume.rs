// src/resume.rs
//! Resume ingestion from pasted text or an uploaded file

use anyhow::{Context, Result};
use lopdf::Document;
use serde::Serialize;
use tracing::{info, warn};

const PDF_MAGIC: &[u8] = b"%PDF";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeSource {
    Pasted,
    TextFile,
    Pdf,
}

/// A page whose text could not be read. The rest of the document still counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageError {
    pub page: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumeText {
    #[serde(skip)]
    pub text: String,
    pub source: ResumeSource,
    pub characters: usize,
    pub page_errors: Vec<PageError>,
}

impl ResumeText {
    fn new(text: String, source: ResumeSource, page_errors: Vec<PageError>) -> Result<Self> {
        let text = text.trim().to_string();
        anyhow::ensure!(!text.is_empty(), "Resume contains no text");
        Ok(Self {
            characters: text.chars().count(),
            text,
            source,
            page_errors,
        })
    }
}

pub fn from_pasted(text: &str) -> Result<ResumeText> {
    ResumeText::new(text.to_string(), ResumeSource::Pasted, Vec::new())
}

/// PDF when the client says so or the bytes start with `%PDF`, UTF-8 text otherwise.
pub fn from_upload(bytes: &[u8], declared_pdf: bool) -> Result<ResumeText> {
    if declared_pdf || bytes.starts_with(PDF_MAGIC) {
        let (text, page_errors) = extract_pdf_text(bytes)?;
        return ResumeText::new(text, ResumeSource::Pdf, page_errors);
    }

    let text = std::str::from_utf8(bytes)
        .context("Uploaded file is neither a PDF nor UTF-8 text")?
        .to_string();
    ResumeText::new(text, ResumeSource::TextFile, Vec::new())
}

/// Extracts page by page, in page order, collecting failures instead of aborting.
pub fn extract_pdf_text(bytes: &[u8]) -> Result<(String, Vec<PageError>)> {
    let document = Document::load_mem(bytes).context("Error reading PDF file")?;

    let pages = document.get_pages().into_keys();
    let (text, page_errors) = collect_pages(pages, |page| document.extract_text(&[page]));

    info!(
        failed_pages = page_errors.len(),
        "Extracted resume text from PDF"
    );
    Ok((text, page_errors))
}

fn collect_pages<E: std::fmt::Display>(
    pages: impl IntoIterator<Item = u32>,
    mut extract: impl FnMut(u32) -> std::result::Result<String, E>,
) -> (String, Vec<PageError>) {
    let mut texts = Vec::new();
    let mut page_errors = Vec::new();

    for page in pages {
        match extract(page) {
            Ok(text) => texts.push(text),
            Err(e) => {
                warn!(page, "Failed to extract text from PDF page: {}", e);
                page_errors.push(PageError {
                    page,
                    message: e.to_string(),
                });
            }
        }
    }

    (texts.join("\n"), page_errors)
}
