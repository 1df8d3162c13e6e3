//! Multipart intake with a running per-field size check.
//!
//! Fields are streamed chunk by chunk so an oversized file is rejected as
//! soon as it crosses the ceiling, before the rest of it is buffered.

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{FromRequest, Multipart, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, StatusCode};
use bytes::{Bytes, BytesMut};

use crate::error::{ServerError, ServerResult};

/// One uploaded file part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Form field the file arrived under, e.g. `files`.
    pub field: String,
    /// Client-supplied file name.
    pub file_name: String,
    /// Client-declared media type.
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl UploadedFile {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// All parts of a validated upload, in arrival order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadFields {
    pub files: Vec<UploadedFile>,
    pub params: Vec<(String, String)>,
}

impl UploadFields {
    /// Files sent under `name` or the bracketed `name[]` form.
    pub fn files_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a UploadedFile> + 'a {
        self.files
            .iter()
            .filter(move |f| field_matches(&f.field, name))
    }

    /// Remove and return every file sent under `name`.
    pub fn take_files(&mut self, name: &str) -> Vec<UploadedFile> {
        let (taken, kept) = std::mem::take(&mut self.files)
            .into_iter()
            .partition(|f| field_matches(&f.field, name));
        self.files = kept;
        taken
    }

    /// First text value for `name`.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

fn field_matches(field: &str, name: &str) -> bool {
    field == name || field.strip_suffix("[]") == Some(name)
}

/// `true` when the declared content type is `multipart/form-data`.
pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("multipart/form-data"))
        .unwrap_or(false)
}

/// Parse and validate a multipart request.
///
/// Order of rejection: wrong content type, unparseable body, then the first
/// field (file or text) that exceeds `max_field_bytes`.
pub async fn read_upload(request: Request, max_field_bytes: usize) -> ServerResult<UploadFields> {
    if !is_multipart(request.headers()) {
        return Err(ServerError::BadRequest(
            "Request must be multipart/form-data".to_string(),
        ));
    }

    let mut multipart = Multipart::from_request(request, &())
        .await
        .map_err(|_| parse_failure())?;

    let mut fields = UploadFields::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        let field_name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(str::to_string);
        let display_name = file_name.clone().unwrap_or_else(|| field_name.clone());

        let bytes = read_bounded(field, &display_name, max_field_bytes).await?;

        match file_name {
            Some(file_name) => fields.files.push(UploadedFile {
                field: field_name,
                file_name,
                content_type,
                bytes,
            }),
            None => {
                let value = String::from_utf8(bytes.to_vec()).map_err(|_| parse_failure())?;
                fields.params.push((field_name, value));
            }
        }
    }

    tracing::debug!(
        files = fields.files.len(),
        params = fields.params.len(),
        "upload accepted"
    );
    Ok(fields)
}

async fn read_bounded(mut field: Field<'_>, name: &str, max_bytes: usize) -> ServerResult<Bytes> {
    let mut buf = BytesMut::new();
    while let Some(chunk) = field.chunk().await.map_err(multipart_failure)? {
        if buf.len() + chunk.len() > max_bytes {
            return Err(ServerError::FileTooLarge {
                name: name.to_string(),
                limit_mb: max_bytes / (1024 * 1024),
            });
        }
        buf.extend_from_slice(&chunk);
    }
    Ok(buf.freeze())
}

fn parse_failure() -> ServerError {
    ServerError::BadRequest("Failed to parse form data".to_string())
}

fn multipart_failure(err: MultipartError) -> ServerError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        // Raised by the router-wide body limit, not the per-file ceiling.
        return ServerError::PayloadTooLarge;
    }
    tracing::debug!(error = %err.body_text(), "multipart parse failed");
    parse_failure()
}
