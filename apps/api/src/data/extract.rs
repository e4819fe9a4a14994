//! Text extraction for the ingestible file types: plain text, PDF and PPTX.

use std::io::{Cursor, Read};
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry.
pub(crate) const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file extension '{0}'")]
    UnsupportedExtension(String),

    #[error("could not read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("text file is not valid UTF-8")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("OOXML extraction failed: {0}")]
    Ooxml(String),
}

/// One slide of a presentation, kept whole as a chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct Slide {
    pub number: usize,
    pub title: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    /// Plain documents (one per PDF page run or text file), fed to the line splitter.
    Text(Vec<String>),
    Slides(Vec<Slide>),
}

/// Lower-cased extension including the dot, e.g. `.pdf`.
pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Loads a stored file, dispatching on its extension. Blocking.
pub fn load_file(path: &Path) -> Result<FileContent, ExtractError> {
    let ext = extension_of(&path.to_string_lossy());
    match ext.as_str() {
        ".txt" => {
            let text = String::from_utf8(std::fs::read(path)?)?;
            Ok(FileContent::Text(vec![text]))
        }
        ".pdf" => {
            let bytes = std::fs::read(path)?;
            let text = pdf_extract::extract_text_from_mem(&bytes)
                .map_err(|e| ExtractError::Pdf(e.to_string()))?;
            Ok(FileContent::Text(vec![text]))
        }
        ".pptx" => Ok(FileContent::Slides(extract_slides(&std::fs::read(path)?)?)),
        _ => Err(ExtractError::UnsupportedExtension(ext)),
    }
}

pub(crate) fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let mut out = Vec::new();
    entry.take(max_bytes).read_to_end(&mut out)?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {name} exceeds size limit ({max_bytes} bytes)"
        )));
    }
    Ok(out)
}

/// Sorts `<prefix>N.xml` entries by N.
pub(crate) fn numbered_entries(
    archive: &zip::ZipArchive<Cursor<&[u8]>>,
    prefix: &str,
) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .filter(|n| !n[prefix.len()..].contains('/'))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

pub fn extract_slides(bytes: &[u8]) -> Result<Vec<Slide>, ExtractError> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))?;

    let mut slides = Vec::new();
    for (idx, name) in numbered_entries(&archive, "ppt/slides/slide")
        .into_iter()
        .enumerate()
    {
        let xml = read_zip_entry_bounded(&mut archive, &name, MAX_XML_ENTRY_BYTES)?;
        let (title, paragraphs) = slide_paragraphs(&xml)?;
        let number = idx + 1;

        let mut text = format!("Slide Number : {number}\nSlide Title : {title}");
        for paragraph in &paragraphs {
            text.push_str("\nSlide Text : ");
            text.push_str(paragraph);
        }
        slides.push(Slide {
            number,
            title,
            text,
        });
    }
    Ok(slides)
}

fn is_title_placeholder(e: &BytesStart<'_>) -> bool {
    e.attributes().flatten().any(|a| {
        a.key.as_ref() == b"type" && matches!(a.value.as_ref(), b"title" | b"ctrTitle")
    })
}

/// Returns the slide title and every non-empty paragraph, in document order.
/// Runs of a paragraph are concatenated.
fn slide_paragraphs(xml: &[u8]) -> Result<(String, Vec<String>), ExtractError> {
    let mut reader = Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut paragraphs = Vec::new();
    let mut title_parts: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut in_text = false;
    let mut shape_is_title = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"sp" => shape_is_title = false,
                b"t" => in_text = true,
                b"p" => current.clear(),
                _ => {}
            },
            Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"ph" && is_title_placeholder(&e) {
                    shape_is_title = true;
                }
            }
            Ok(Event::Text(te)) if in_text => {
                let text = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                current.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let paragraph = current.trim();
                    if !paragraph.is_empty() {
                        if shape_is_title {
                            title_parts.push(paragraph.to_string());
                        }
                        paragraphs.push(paragraph.to_string());
                    }
                    current.clear();
                }
                b"sp" => shape_is_title = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok((title_parts.join(" "), paragraphs))
}
