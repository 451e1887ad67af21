use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, Origin};

/// JSON shape of an error at the HTTP boundary.
///
/// ```json
/// {
///   "origin": "gateway",
///   "error": "...",
///   "extError": { "kind": "...", "message": "...", "data": {} }
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// `gateway` for locally raised errors, `remote` for upstream families.
    pub origin: Origin,
    /// Human-readable message.
    pub error: String,
    /// Full classification triple for machine consumers.
    #[serde(rename = "extError")]
    pub ext_error: ExtError,
}

/// The `{kind, message, data}` triple carried in [`Envelope::ext_error`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtError {
    /// Dotted taxonomy path.
    pub kind: ErrorKind,
    /// Same message as [`Envelope::error`].
    pub message: String,
    /// Structured context, verbatim.
    #[serde(default)]
    pub data: Value,
}
