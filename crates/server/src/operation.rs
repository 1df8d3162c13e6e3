use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The closed set of operations the gateway dispatches.
///
/// Each one is served at `POST /<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Merge,
    Split,
    Compress,
    PdfToWord,
    WordToPdf,
    JpgToPdf,
    PdfToJpg,
    Rotate,
    Protect,
    Unlock,
    TextToPdf,
    HtmlToPdf,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::Merge,
        Operation::Split,
        Operation::Compress,
        Operation::PdfToWord,
        Operation::WordToPdf,
        Operation::JpgToPdf,
        Operation::PdfToJpg,
        Operation::Rotate,
        Operation::Protect,
        Operation::Unlock,
        Operation::TextToPdf,
        Operation::HtmlToPdf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Merge => "merge",
            Operation::Split => "split",
            Operation::Compress => "compress",
            Operation::PdfToWord => "pdf-to-word",
            Operation::WordToPdf => "word-to-pdf",
            Operation::JpgToPdf => "jpg-to-pdf",
            Operation::PdfToJpg => "pdf-to-jpg",
            Operation::Rotate => "rotate",
            Operation::Protect => "protect",
            Operation::Unlock => "unlock",
            Operation::TextToPdf => "text-to-pdf",
            Operation::HtmlToPdf => "html-to-pdf",
        }
    }

    /// Resolve a request path such as `/merge`. Matching is exact: no
    /// trailing slash, no nested segments, case-sensitive.
    pub fn from_path(path: &str) -> Option<Self> {
        path.strip_prefix('/').and_then(|name| name.parse().ok())
    }
}

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Operation::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| UnknownOperation(s.to_string()))
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_operation_round_trips_through_its_path() {
        for op in Operation::ALL {
            let path = format!("/{op}");
            assert_eq!(Operation::from_path(&path), Some(op));
        }
    }

    #[test]
    fn test_paths_match_exactly() {
        assert_eq!(Operation::from_path("/merge/"), None);
        assert_eq!(Operation::from_path("/Merge"), None);
        assert_eq!(Operation::from_path("merge"), None);
        assert_eq!(Operation::from_path("/v1/merge"), None);
        assert_eq!(Operation::from_path("/health"), None);
    }

    #[test]
    fn test_serde_uses_path_names() {
        let json = serde_json::to_string(&Operation::HtmlToPdf).unwrap();
        assert_eq!(json, "\"html-to-pdf\"");
    }
}
