use reqwest::{header, Client};

use crate::core::errors::ApiError;

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Download a document by URL. Any failure, including an oversized body,
/// is reported as a bad request against the URL the caller supplied.
pub async fn fetch_document(
    client: &Client,
    url: &str,
    max_bytes: usize,
) -> Result<FetchedDocument, ApiError> {
    let failed = |reason: String| ApiError::BadRequest(format!("Failed to get document: {}", reason));

    let filename = filename_from_url(url).ok_or_else(|| failed(format!("no filename in {}", url)))?;
    let response = client
        .get(url)
        .header(header::ACCEPT, "application/octet-stream")
        .send()
        .await
        .map_err(|err| failed(err.to_string()))?
        .error_for_status()
        .map_err(|err| failed(err.to_string()))?;

    if response
        .content_length()
        .is_some_and(|len| len > max_bytes as u64)
    {
        return Err(failed(format!("document exceeds {} bytes", max_bytes)));
    }
    let bytes = response.bytes().await.map_err(|err| failed(err.to_string()))?;
    if bytes.len() > max_bytes {
        return Err(failed(format!("document exceeds {} bytes", max_bytes)));
    }

    tracing::debug!(bytes = bytes.len(), "Fetched {}", filename);
    Ok(FetchedDocument {
        filename,
        bytes: bytes.to_vec(),
    })
}

/// Last path segment, ignoring any query string or fragment.
fn filename_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, segment) = path.rsplit_once('/')?;
    let segment = segment.trim();
    (!segment.is_empty()).then(|| segment.to_string())
}
