//! Text extraction for binary office formats.

use std::io::{Cursor, Read};
use std::sync::OnceLock;

use lopdf::Document;
use regex::Regex;
use zip::ZipArchive;

use crate::core::errors::ApiError;

const DOCX_BODY: &str = "word/document.xml";

/// Page texts joined by newlines. Pages whose content cannot be decoded are
/// skipped with a warning rather than failing the whole document.
pub fn pdf_text(bytes: &[u8]) -> Result<String, ApiError> {
    let document = Document::load_mem(bytes)
        .map_err(|err| ApiError::BadRequest(format!("Error processing PDF: {}", err)))?;

    let mut text = String::new();
    for page in document.get_pages().keys() {
        match document.extract_text(&[*page]) {
            Ok(page_text) => {
                text.push_str(page_text.trim_end());
                text.push('\n');
            }
            Err(err) => tracing::warn!("Skipping unreadable PDF page {}: {}", page, err),
        }
    }
    Ok(text)
}

/// Paragraph texts of the main document part, one per line.
pub fn docx_text(bytes: &[u8]) -> Result<String, ApiError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| ApiError::BadRequest(format!("Error processing DOCX: {}", err)))?;
    let mut entry = archive.by_name(DOCX_BODY).map_err(|_| {
        ApiError::BadRequest(format!("Error processing DOCX: missing {}", DOCX_BODY))
    })?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(|err| ApiError::BadRequest(format!("Error processing DOCX: {}", err)))?;
    document_xml_text(&xml)
}

fn docx_token_pattern() -> Result<&'static Regex, ApiError> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|<w:tab/>|<w:br(?:\s[^>]*)?/>|</w:p>")
        })
        .as_ref()
        .map_err(ApiError::internal)
}

fn document_xml_text(xml: &str) -> Result<String, ApiError> {
    let mut text = String::new();
    for token in docx_token_pattern()?.captures_iter(xml) {
        if let Some(run) = token.get(1) {
            text.push_str(&unescape_xml(run.as_str()));
            continue;
        }
        match &token[0] {
            "</w:p>" => text.push('\n'),
            "<w:tab/>" => text.push('\t'),
            _ => text.push('\n'),
        }
    }
    Ok(text)
}

fn unescape_xml(raw: &str) -> String {
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};
    use zip::write::SimpleFileOptions;
    use zip::{CompressionMethod, ZipWriter};

    fn sample_pdf(line: &str) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![100.into(), 600.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    fn sample_docx(body: &str) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        writer.start_file(DOCX_BODY, options).unwrap();
        writer.write_all(body.as_bytes()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn pdf_page_text_is_extracted() {
        let text = pdf_text(&sample_pdf("Quarterly premium schedule")).unwrap();
        assert!(text.contains("Quarterly premium schedule"), "{text:?}");
    }

    #[test]
    fn garbage_is_not_a_pdf() {
        let err = pdf_text(b"%PDF-1.4 truncated").unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[test]
    fn docx_paragraphs_become_lines() {
        let xml = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<w:document><w:body>"#,
            r#"<w:p><w:pPr><w:jc w:val="left"/></w:pPr><w:r><w:t>Terms</w:t></w:r>"#,
            r#"<w:r><w:t xml:space="preserve"> &amp; conditions</w:t></w:r></w:p>"#,
            r#"<w:p><w:r><w:t>Fee</w:t><w:tab/><w:t>&lt;10&gt;</w:t></w:r></w:p>"#,
            r#"<w:tbl/></w:body></w:document>"#,
        );
        let text = docx_text(&sample_docx(xml)).unwrap();
        assert_eq!(text, "Terms & conditions\nFee\t<10>\n");
    }

    #[test]
    fn archive_without_body_is_rejected() {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        writer
            .start_file("other.xml", SimpleFileOptions::default())
            .unwrap();
        let bytes = writer.finish().unwrap().into_inner();

        assert!(matches!(docx_text(&bytes), Err(ApiError::BadRequest(_))));
        assert!(matches!(docx_text(b"not a zip"), Err(ApiError::BadRequest(_))));
    }
}
