//! Document operations: typed parameter parsing in front of a pluggable
//! document engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::pages::PageSelection;
use super::{HandlerError, OperationHandler, OperationOutput};
use crate::operation::Operation;
use crate::upload::{UploadFields, UploadedFile};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionLevel {
    Low,
    Medium,
    High,
}

impl std::str::FromStr for CompressionLevel {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(CompressionLevel::Low),
            "medium" => Ok(CompressionLevel::Medium),
            "high" => Ok(CompressionLevel::High),
            other => Err(HandlerError::invalid(
                "level",
                format!("expected low, medium or high, got \"{other}\""),
            )),
        }
    }
}

/// Clockwise quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    Quarter,
    Half,
    ThreeQuarter,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarter => 270,
        }
    }
}

impl std::str::FromStr for Rotation {
    type Err = HandlerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "90" => Ok(Rotation::Quarter),
            "180" => Ok(Rotation::Half),
            "270" => Ok(Rotation::ThreeQuarter),
            other => Err(HandlerError::invalid(
                "degrees",
                format!("expected 90, 180 or 270, got \"{other}\""),
            )),
        }
    }
}

/// A fully validated document job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentRequest {
    Merge { files: Vec<UploadedFile> },
    Split { file: UploadedFile, pages: PageSelection },
    Compress { file: UploadedFile, level: CompressionLevel },
    PdfToWord { file: UploadedFile },
    WordToPdf { file: UploadedFile },
    JpgToPdf { images: Vec<UploadedFile> },
    PdfToJpg { file: UploadedFile },
    Rotate { file: UploadedFile, rotation: Rotation },
    Protect { file: UploadedFile, password: String },
    Unlock { file: UploadedFile, password: String },
    TextToPdf { text: String, title: Option<String> },
    HtmlToPdf { html: String },
}

impl DocumentRequest {
    /// Pull the fields `operation` needs out of an upload and check them.
    pub fn from_upload(operation: Operation, mut fields: UploadFields) -> Result<Self, HandlerError> {
        let request = match operation {
            Operation::Merge => {
                let files = fields.take_files("files");
                if files.len() < 2 {
                    return Err(HandlerError::invalid("files", "at least two files are required"));
                }
                DocumentRequest::Merge { files }
            }
            Operation::Split => DocumentRequest::Split {
                pages: required_param(&fields, "pages")?
                    .parse()
                    .map_err(|reason| HandlerError::invalid("pages", reason))?,
                file: single_file(&mut fields)?,
            },
            Operation::Compress => DocumentRequest::Compress {
                level: required_param(&fields, "level")?.parse()?,
                file: single_file(&mut fields)?,
            },
            Operation::PdfToWord => DocumentRequest::PdfToWord {
                file: single_file(&mut fields)?,
            },
            Operation::WordToPdf => DocumentRequest::WordToPdf {
                file: single_file(&mut fields)?,
            },
            Operation::JpgToPdf => {
                let images = fields.take_files("files");
                if images.is_empty() {
                    return Err(HandlerError::MissingField("files"));
                }
                DocumentRequest::JpgToPdf { images }
            }
            Operation::PdfToJpg => DocumentRequest::PdfToJpg {
                file: single_file(&mut fields)?,
            },
            Operation::Rotate => DocumentRequest::Rotate {
                rotation: required_param(&fields, "degrees")?.parse()?,
                file: single_file(&mut fields)?,
            },
            Operation::Protect => DocumentRequest::Protect {
                password: required_param(&fields, "password")?.to_string(),
                file: single_file(&mut fields)?,
            },
            Operation::Unlock => DocumentRequest::Unlock {
                password: required_param(&fields, "password")?.to_string(),
                file: single_file(&mut fields)?,
            },
            Operation::TextToPdf => DocumentRequest::TextToPdf {
                text: required_param(&fields, "text")?.to_string(),
                title: fields
                    .param("title")
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string),
            },
            Operation::HtmlToPdf => DocumentRequest::HtmlToPdf {
                html: required_param(&fields, "html")?.to_string(),
            },
        };
        Ok(request)
    }

    pub fn operation(&self) -> Operation {
        match self {
            DocumentRequest::Merge { .. } => Operation::Merge,
            DocumentRequest::Split { .. } => Operation::Split,
            DocumentRequest::Compress { .. } => Operation::Compress,
            DocumentRequest::PdfToWord { .. } => Operation::PdfToWord,
            DocumentRequest::WordToPdf { .. } => Operation::WordToPdf,
            DocumentRequest::JpgToPdf { .. } => Operation::JpgToPdf,
            DocumentRequest::PdfToJpg { .. } => Operation::PdfToJpg,
            DocumentRequest::Rotate { .. } => Operation::Rotate,
            DocumentRequest::Protect { .. } => Operation::Protect,
            DocumentRequest::Unlock { .. } => Operation::Unlock,
            DocumentRequest::TextToPdf { .. } => Operation::TextToPdf,
            DocumentRequest::HtmlToPdf { .. } => Operation::HtmlToPdf,
        }
    }
}

fn single_file(fields: &mut UploadFields) -> Result<UploadedFile, HandlerError> {
    fields
        .take_files("file")
        .into_iter()
        .next()
        .ok_or(HandlerError::MissingField("file"))
}

fn required_param<'a>(fields: &'a UploadFields, name: &'static str) -> Result<&'a str, HandlerError> {
    fields
        .param(name)
        .filter(|v| !v.trim().is_empty())
        .ok_or(HandlerError::MissingField(name))
}

/// Backend that performs document work.
#[async_trait]
pub trait DocumentEngine: Send + Sync {
    async fn process(&self, request: DocumentRequest) -> Result<OperationOutput, HandlerError>;
}

/// Placeholder backend: every job reports that no processor is connected.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconnectedEngine;

#[async_trait]
impl DocumentEngine for UnconnectedEngine {
    async fn process(&self, request: DocumentRequest) -> Result<OperationOutput, HandlerError> {
        Err(HandlerError::NotImplemented {
            operation: request.operation(),
        })
    }
}

/// [`OperationHandler`] that validates parameters, then delegates to a
/// [`DocumentEngine`].
#[derive(Clone)]
pub struct DocumentHandler {
    engine: Arc<dyn DocumentEngine>,
}

impl DocumentHandler {
    pub fn new(engine: Arc<dyn DocumentEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl OperationHandler for DocumentHandler {
    async fn handle(
        &self,
        operation: Operation,
        fields: UploadFields,
    ) -> Result<OperationOutput, HandlerError> {
        let request = DocumentRequest::from_upload(operation, fields)?;
        tracing::debug!(operation = %operation, "document request validated");
        self.engine.process(request).await
    }
}
