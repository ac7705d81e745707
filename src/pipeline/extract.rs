use super::binary::{docx_text, pdf_text};
use crate::core::errors::ApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    PlainText,
    Email,
    Pdf,
    Docx,
}

impl FileKind {
    /// Formats that only arrive as raw bytes, never as a JSON string.
    pub fn is_binary(self) -> bool {
        matches!(self, FileKind::Pdf | FileKind::Docx)
    }
}

/// Map a filename's extension to a supported input kind.
pub fn file_kind(filename: &str) -> Result<(FileKind, String), ApiError> {
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.trim().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" | "md" => Ok((FileKind::PlainText, extension)),
        "eml" | "email" => Ok((FileKind::Email, extension)),
        "pdf" => Ok((FileKind::Pdf, extension)),
        "docx" => Ok((FileKind::Docx, extension)),
        "doc" => Err(ApiError::BadRequest(
            "legacy .doc files are not supported; save as .docx".to_string(),
        )),
        "" => Err(ApiError::BadRequest(format!(
            "cannot determine file type of '{}'",
            filename
        ))),
        other => Err(ApiError::BadRequest(format!(
            "unsupported file type: {}",
            other
        ))),
    }
}

/// Text of a document sent as a string. Binary formats are rejected here;
/// they go through [`extract_bytes`].
pub fn extract_text(kind: FileKind, content: &str) -> Result<String, ApiError> {
    match kind {
        FileKind::PlainText => Ok(content.to_string()),
        FileKind::Email => Ok(extract_email(content)),
        FileKind::Pdf | FileKind::Docx => Err(ApiError::BadRequest(
            "PDF and DOCX documents must be uploaded as files".to_string(),
        )),
    }
}

/// Text of an uploaded file. Text formats are decoded as lossy UTF-8.
pub fn extract_bytes(kind: FileKind, bytes: &[u8]) -> Result<String, ApiError> {
    match kind {
        FileKind::Pdf => pdf_text(bytes),
        FileKind::Docx => docx_text(bytes),
        FileKind::PlainText | FileKind::Email => {
            extract_text(kind, &String::from_utf8_lossy(bytes))
        }
    }
}

/// Subject line plus the first plain-text body of an RFC 822 message.
fn extract_email(raw: &str) -> String {
    let (headers, body) = split_message(raw);
    let subject = header(&headers, "subject").unwrap_or_default();
    format!("Subject: {}\n\n{}", subject, plain_body(&headers, body))
}

fn plain_body(headers: &[(String, String)], body: &str) -> String {
    let content_type = header(headers, "content-type").unwrap_or_default();
    if !content_type.to_lowercase().starts_with("multipart/") {
        return body.to_string();
    }
    let Some(boundary) = boundary(&content_type) else {
        return body.to_string();
    };

    let delimiter = format!("--{}", boundary);
    for part in body.split(delimiter.as_str()).skip(1) {
        if part.starts_with("--") {
            break;
        }
        let part = part.trim_start_matches(['\r', '\n']);
        let (part_headers, part_body) = split_message(part);
        let part_type = header(&part_headers, "content-type")
            .unwrap_or_else(|| "text/plain".to_string())
            .to_lowercase();
        if part_type.starts_with("multipart/") {
            return plain_body(&part_headers, part_body);
        }
        if part_type.starts_with("text/plain") {
            return part_body.trim_end().to_string();
        }
    }
    String::new()
}

/// Split a message into unfolded headers and the body after the first blank line.
fn split_message(raw: &str) -> (Vec<(String, String)>, &str) {
    let mut headers: Vec<(String, String)> = Vec::new();
    let mut offset = 0;

    for line in raw.split_inclusive('\n') {
        offset += line.len();
        let content = line.trim_end_matches(['\r', '\n']);
        if content.is_empty() {
            return (headers, &raw[offset..]);
        }
        if content.starts_with([' ', '\t']) {
            if let Some((_, value)) = headers.last_mut() {
                value.push(' ');
                value.push_str(content.trim());
            }
            continue;
        }
        match content.split_once(':') {
            Some((name, value)) => {
                headers.push((name.trim().to_lowercase(), value.trim().to_string()))
            }
            // not a header block at all
            None if headers.is_empty() => return (headers, raw),
            None => {}
        }
    }
    (headers, "")
}

fn header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.clone())
}

fn boundary(content_type: &str) -> Option<String> {
    content_type.split(';').skip(1).find_map(|param| {
        let (key, value) = param.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("boundary")
            .then(|| value.trim().trim_matches('"').to_string())
    })
}
