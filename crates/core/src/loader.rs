use crate::error::IngestError;
use lopdf::Document;
use regex::Regex;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

/// A parsed document together with the local file it was read from. Remote
/// references are downloaded into the working directory first; the file is
/// left behind after ingestion.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub pages: Vec<PageText>,
}

pub async fn load_document(
    reference: &str,
    workdir: &Path,
) -> Result<LoadedDocument, IngestError> {
    let path = if is_remote(reference) {
        download_to(reference, workdir).await?
    } else {
        PathBuf::from(reference)
    };

    let pages = parse_local(&path)?;
    Ok(LoadedDocument { path, pages })
}

fn is_remote(reference: &str) -> bool {
    Url::parse(reference)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

async fn download_to(reference: &str, workdir: &Path) -> Result<PathBuf, IngestError> {
    let parsed = Url::parse(reference)?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| IngestError::MissingFileName(reference.to_string()))?;
    let target = workdir.join(name);

    let client = reqwest::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .build()?;
    let response = client.get(parsed.clone()).send().await?;

    if !response.status().is_success() {
        return Err(IngestError::Download {
            reference: reference.to_string(),
            status: response.status().as_u16(),
        });
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(&target, &bytes).await?;
    info!(path = %target.display(), bytes = bytes.len(), "downloaded document");

    Ok(target)
}

/// Parser dispatch by file extension. Unsupported extensions produce an
/// empty page list rather than an error.
pub fn parse_local(path: &Path) -> Result<Vec<PageText>, IngestError> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => extract_pdf_pages(path),
        "txt" => {
            let text = std::fs::read_to_string(path)?;
            Ok(vec![PageText { number: 1, text }])
        }
        "docx" => extract_docx_pages(path),
        other => {
            warn!(path = %path.display(), extension = %other, "no parser for file type");
            Ok(Vec::new())
        }
    }
}

fn extract_pdf_pages(path: &Path) -> Result<Vec<PageText>, IngestError> {
    let document =
        Document::load(path).map_err(|error| IngestError::DocumentParse(error.to_string()))?;

    let mut pages = Vec::new();
    for (page_no, _page_id) in document.get_pages() {
        let text = document
            .extract_text(&[page_no])
            .map_err(|error| IngestError::DocumentParse(error.to_string()))?;

        if !text.trim().is_empty() {
            pages.push(PageText {
                number: page_no,
                text,
            });
        }
    }

    if pages.is_empty() {
        return Err(IngestError::DocumentParse(format!(
            "pdf had no readable page text: {}",
            path.display()
        )));
    }

    Ok(pages)
}

fn extract_docx_pages(path: &Path) -> Result<Vec<PageText>, IngestError> {
    let file = std::fs::File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|error| IngestError::DocumentParse(error.to_string()))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|error| IngestError::DocumentParse(error.to_string()))?
        .read_to_string(&mut xml)?;

    let text = strip_docx_markup(&xml)?;
    if text.trim().is_empty() {
        return Err(IngestError::DocumentParse(format!(
            "docx had no readable text: {}",
            path.display()
        )));
    }

    // docx carries no page boundaries in document.xml; the whole body is
    // treated as one page.
    Ok(vec![PageText { number: 1, text }])
}

fn strip_docx_markup(xml: &str) -> Result<String, IngestError> {
    let with_breaks = xml.replace("</w:p>", "\n");
    let tag_re = Regex::new(r"<[^>]+>")?;
    let stripped = tag_re.replace_all(&with_breaks, "");

    Ok(stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn remote_detection_requires_http_scheme() {
        assert!(is_remote("https://example.com/policy.pdf"));
        assert!(is_remote("http://example.com/policy.pdf"));
        assert!(!is_remote("/data/policy.pdf"));
        assert!(!is_remote("policy.pdf"));
    }

    #[test]
    fn txt_file_loads_as_single_page() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("notes.txt");
        fs::write(&path, "plain text body")?;

        let pages = parse_local(&path)?;
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].number, 1);
        assert_eq!(pages[0].text, "plain text body");
        Ok(())
    }

    #[test]
    fn unsupported_extension_yields_empty_pages() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("slides.pptx");
        fs::write(&path, b"binary")?;

        let pages = parse_local(&path)?;
        assert!(pages.is_empty());
        Ok(())
    }

    #[test]
    fn docx_markup_stripping_keeps_paragraph_breaks() -> Result<(), Box<dyn std::error::Error>> {
        let xml = "<w:document><w:p><w:r><w:t>First &amp; second</w:t></w:r></w:p>\
                   <w:p><w:r><w:t>Next paragraph</w:t></w:r></w:p></w:document>";
        let text = strip_docx_markup(xml)?;
        assert_eq!(text, "First & second\nNext paragraph\n");
        Ok(())
    }
}
