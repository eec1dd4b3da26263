// Error types shared by every soil-data operation

use serde::{Deserialize, Serialize};

/// Result type for soil-data operations.
pub type Result<T> = std::result::Result<T, SoilError>;

/// Errors surfaced to the caller of a tool invocation.
///
/// None of these are retried internally; the caller decides.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SoilError {
    /// Coordinate reference system outside the supported set.
    #[error("Unsupported CRS: {0} (supported: EPSG:4326, CRS:84, EPSG:27700)")]
    UnsupportedCrs(String),

    /// Image or info format the upstream service is not asked for.
    #[error("Unsupported format: {format} (supported: {supported})")]
    UnsupportedFormat { format: String, supported: String },

    /// Soil data type outside the static lookup table.
    #[error("Unknown soil data type: {0} (expected one of topsoil, profile_soil, soil_texture, soil_depth, parent_material)")]
    UnknownDataType(String),

    /// No layer with this name in the capabilities document.
    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    /// Network failure, timeout, non-2xx response or OGC exception report.
    #[error("WMS service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Malformed capabilities or feature-info document.
    #[error("Failed to parse WMS response: {0}")]
    Parse(String),

    /// Argument that fails a value invariant (non-finite, empty, min >= max).
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration file or environment override is unusable.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Machine-readable error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    UnsupportedCrs,
    UnsupportedFormat,
    UnknownDataType,
    LayerNotFound,
    ServiceUnavailable,
    ParseError,
    InvalidParameter,
    Config,
}

impl SoilError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnsupportedCrs(_) => ErrorKind::UnsupportedCrs,
            Self::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
            Self::UnknownDataType(_) => ErrorKind::UnknownDataType,
            Self::LayerNotFound(_) => ErrorKind::LayerNotFound,
            Self::ServiceUnavailable(_) => ErrorKind::ServiceUnavailable,
            Self::Parse(_) => ErrorKind::ParseError,
            Self::InvalidParameter(_) => ErrorKind::InvalidParameter,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::ServiceUnavailable(message.into())
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Structured `{ kind, message }` payload handed to the agent.
    pub fn to_report(&self) -> ErrorReport {
        ErrorReport {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

/// Serializable error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            SoilError::UnsupportedCrs("EPSG:9999".into()).kind(),
            ErrorKind::UnsupportedCrs
        );
        assert_eq!(SoilError::parse("bad xml").kind(), ErrorKind::ParseError);
        assert_eq!(
            SoilError::service_unavailable("timeout").kind(),
            ErrorKind::ServiceUnavailable
        );
    }

    #[test]
    fn test_report_serializes_snake_case_kind() {
        let report = SoilError::LayerNotFound("nope".into()).to_report();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["kind"], "layer_not_found");
        assert_eq!(json["message"], "Layer not found: nope");
    }
}
