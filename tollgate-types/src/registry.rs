//! Closed, centrally registered catalog of error kinds.
//!
//! Every kind is registered once with a transport status and a description. The
//! standard registry is built on first use from the built-in catalog and is
//! immutable afterwards; consumers that need extra kinds build their own
//! [`ErrorRegistry`] at startup.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use serde_json::Value;
use thiserror::Error;

use crate::envelope::Envelope;
use crate::error::{ErrorKind, HasKind, TollgateError, family_of, is_in_family};

/// Status reported for kinds that were never registered.
pub const UNKNOWN_KIND_STATUS: u16 = 503;

/// Computes a default message from an instance's data; `None` falls back to the
/// kind's description.
pub type MessageTemplate = fn(&Value) -> Option<String>;

/// Kind paths of the built-in catalog.
pub mod kinds {
    #![allow(missing_docs)]

    /// Malformed request parameters.
    pub const INVALID_REQUEST: &str = "GatewayError.InvalidRequest";
    /// One or more required parameters were not supplied.
    pub const MISSING_PARAMETERS: &str = "GatewayError.InvalidRequest.MissingParameters";
    /// A parameter was supplied but could not be accepted.
    pub const INVALID_PARAMETERS: &str = "GatewayError.InvalidRequest.InvalidParameters";
    /// The requested resource does not exist.
    pub const NOT_FOUND: &str = "GatewayError.NotFound";
    /// The requested feature is not offered for this upstream.
    pub const NOT_SUPPORTED: &str = "GatewayError.NotSupported";
    /// Gateway configuration was rejected at build time.
    pub const INVALID_CONFIGURATION: &str = "GatewayError.InvalidConfiguration";
    /// An unclassified local fault.
    pub const INTERNAL_ERROR: &str = "GatewayError.InternalError";

    pub const EXCHANGE_AUTHENTICATION_ERROR: &str = "ExchangeError.AuthenticationError";
    pub const EXCHANGE_PERMISSION_DENIED: &str = "ExchangeError.PermissionDenied";
    pub const EXCHANGE_INSUFFICIENT_FUNDS: &str = "ExchangeError.InsufficientFunds";
    pub const EXCHANGE_INVALID_ORDER: &str = "ExchangeError.InvalidOrder";
    pub const EXCHANGE_BAD_RESPONSE: &str = "ExchangeError.BadResponse";
    pub const EXCHANGE_NOT_AVAILABLE: &str = "ExchangeError.NotAvailable";
    pub const EXCHANGE_NETWORK_ERROR: &str = "ExchangeError.NetworkError";
    pub const EXCHANGE_REQUEST_TIMEOUT: &str = "ExchangeError.NetworkError.RequestTimeout";
    pub const EXCHANGE_DDOS_PROTECTION: &str = "ExchangeError.NetworkError.DDosProtection";

    pub const SERVICE_AUTHENTICATION_ERROR: &str = "ServiceError.AuthenticationError";
    pub const SERVICE_BAD_RESPONSE: &str = "ServiceError.BadResponse";
    pub const SERVICE_NOT_AVAILABLE: &str = "ServiceError.NotAvailable";
    pub const SERVICE_NETWORK_ERROR: &str = "ServiceError.NetworkError";
    pub const SERVICE_REQUEST_TIMEOUT: &str = "ServiceError.NetworkError.RequestTimeout";
    pub const SERVICE_DDOS_PROTECTION: &str = "ServiceError.NetworkError.DDosProtection";
}

/// Failures of the registry itself. These are programming defects, not runtime
/// conditions of a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum RegistryError {
    /// The kind was registered twice.
    #[error("error kind already registered: {kind}")]
    Duplicate {
        /// Offending kind path.
        kind: String,
    },
    /// The kind was never registered.
    #[error("unknown error kind: {kind}")]
    Unknown {
        /// Offending kind path.
        kind: String,
    },
    /// The kind path has an empty or non-identifier segment.
    #[error("malformed error kind: {kind:?}")]
    Malformed {
        /// Offending kind path.
        kind: String,
    },
}

/// One registered kind.
#[derive(Debug, Clone)]
pub struct KindSpec {
    kind: ErrorKind,
    http_status: u16,
    description: Cow<'static, str>,
    template: Option<MessageTemplate>,
}

impl KindSpec {
    /// The registered kind path.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Transport status for instances of this kind.
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Human description, also the fallback default message.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    fn default_message(&self, data: &Value) -> String {
        self.template
            .and_then(|t| t(data))
            .unwrap_or_else(|| self.description.to_string())
    }
}

/// The set of known error kinds.
#[derive(Debug, Clone, Default)]
pub struct ErrorRegistry {
    kinds: BTreeMap<ErrorKind, KindSpec>,
}

static STANDARD: OnceLock<ErrorRegistry> = OnceLock::new();

impl ErrorRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry holding the built-in catalog.
    ///
    /// # Panics
    /// Panics on first use if the built-in catalog itself is inconsistent
    /// (duplicate or malformed kinds), which is a defect in this crate.
    pub fn standard() -> &'static Self {
        STANDARD.get_or_init(|| {
            Self::builtin().unwrap_or_else(|e| panic!("built-in error catalog is invalid: {e}"))
        })
    }

    /// Build a fresh registry containing the built-in catalog, for consumers
    /// that extend it with their own kinds.
    ///
    /// # Errors
    /// Returns the first [`RegistryError`] raised while registering the catalog.
    pub fn builtin() -> Result<Self, RegistryError> {
        let mut reg = Self::new();
        for &(kind, status, description, template) in BUILTIN_CATALOG {
            reg.insert(ErrorKind::from_static(kind), status, Cow::Borrowed(description), template)?;
        }
        Ok(reg)
    }

    /// Register a kind with its status and description.
    ///
    /// # Errors
    /// `Duplicate` if the kind is already registered, `Malformed` if the path has
    /// an empty or non-identifier segment.
    pub fn register(
        &mut self,
        kind: impl Into<String>,
        http_status: u16,
        description: impl Into<String>,
    ) -> Result<&mut Self, RegistryError> {
        self.insert(
            ErrorKind::new(kind),
            http_status,
            Cow::Owned(description.into()),
            None,
        )?;
        Ok(self)
    }

    /// Register a kind whose default message is computed from instance data.
    ///
    /// # Errors
    /// Same as [`register`](Self::register).
    pub fn register_with_template(
        &mut self,
        kind: impl Into<String>,
        http_status: u16,
        description: impl Into<String>,
        template: MessageTemplate,
    ) -> Result<&mut Self, RegistryError> {
        self.insert(
            ErrorKind::new(kind),
            http_status,
            Cow::Owned(description.into()),
            Some(template),
        )?;
        Ok(self)
    }

    fn insert(
        &mut self,
        kind: ErrorKind,
        http_status: u16,
        description: Cow<'static, str>,
        template: Option<MessageTemplate>,
    ) -> Result<(), RegistryError> {
        if !is_well_formed(kind.as_str()) {
            return Err(RegistryError::Malformed {
                kind: kind.to_string(),
            });
        }
        if self.kinds.contains_key(&kind) {
            return Err(RegistryError::Duplicate {
                kind: kind.to_string(),
            });
        }
        self.kinds.insert(
            kind.clone(),
            KindSpec {
                kind,
                http_status,
                description,
                template,
            },
        );
        Ok(())
    }

    /// Build an instance of a registered kind.
    ///
    /// When `message` is `None` the kind's default template is rendered against
    /// `data`. `data` is attached verbatim.
    ///
    /// # Errors
    /// `Unknown` if the kind was never registered.
    pub fn create(
        &self,
        kind: &str,
        message: Option<String>,
        data: Value,
    ) -> Result<TollgateError, RegistryError> {
        let spec = self.spec(kind).ok_or_else(|| RegistryError::Unknown {
            kind: kind.to_string(),
        })?;
        let message = message.unwrap_or_else(|| spec.default_message(&data));
        Ok(TollgateError::from_parts(spec.kind.clone(), message, data))
    }

    /// Look up a registered kind.
    #[must_use]
    pub fn spec(&self, kind: &str) -> Option<&KindSpec> {
        self.kinds.get(kind)
    }

    /// True if the kind is registered.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.spec(kind).is_some()
    }

    /// Registered status for an error or kind; unregistered kinds map to 503.
    #[must_use]
    pub fn status_of<K: HasKind + ?Sized>(&self, kind: &K) -> u16 {
        self.spec(kind.kind_str())
            .map_or(UNKNOWN_KIND_STATUS, KindSpec::http_status)
    }

    /// Dotted path segments of a kind.
    #[must_use]
    pub fn family_of<'a>(&self, kind: &'a str) -> Vec<&'a str> {
        family_of(kind)
    }

    /// Family membership test on a `.` boundary.
    #[must_use]
    pub fn is_member<K: HasKind + ?Sized>(&self, kind: &K, family: &str) -> bool {
        is_in_family(kind.kind_str(), family)
    }

    /// All registered kinds, ordered by path.
    pub fn list(&self) -> impl Iterator<Item = &KindSpec> {
        self.kinds.values()
    }

    /// The distinct family roots present in the registry.
    #[must_use]
    pub fn types(&self) -> Vec<&str> {
        self.kinds
            .keys()
            .map(ErrorKind::root)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Boundary rendering: registered status plus the JSON envelope.
    #[must_use]
    pub fn render(&self, err: &TollgateError) -> (u16, Envelope) {
        (self.status_of(err), err.to_envelope())
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// True if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

pub(crate) fn is_well_formed(kind: &str) -> bool {
    !kind.is_empty()
        && kind.split('.').all(|seg| {
            !seg.is_empty() && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn missing_parameters_message(data: &Value) -> Option<String> {
    let names: Vec<&str> = data
        .get("parameters")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .collect();
    match names.as_slice() {
        [] => None,
        [one] => Some(format!("Parameter '{one}' is missing")),
        many => {
            let quoted: Vec<String> = many.iter().map(|n| format!("'{n}'")).collect();
            Some(format!("Parameters {} are missing", quoted.join(", ")))
        }
    }
}

fn invalid_parameters_message(data: &Value) -> Option<String> {
    let name = data.get("parameter")?.as_str()?;
    match data.get("reason").and_then(Value::as_str) {
        Some(reason) => Some(format!("Parameter '{name}' is invalid: {reason}")),
        None => Some(format!("Parameter '{name}' is invalid")),
    }
}

fn not_found_message(data: &Value) -> Option<String> {
    let what = data.get("what")?.as_str()?;
    Some(format!("Not found: {what}"))
}

fn not_supported_message(data: &Value) -> Option<String> {
    let feature = data.get("feature")?.as_str()?;
    Some(format!("'{feature}' is not supported"))
}

fn internal_message(data: &Value) -> Option<String> {
    let cause = data.get("cause")?.as_str()?;
    Some(format!("Internal error: {cause}"))
}

fn upstream_name(data: &Value) -> Option<&str> {
    data.get("exchange")
        .or_else(|| data.get("service"))?
        .as_str()
}

fn timeout_message(data: &Value) -> Option<String> {
    Some(format!("Request to '{}' timed out", upstream_name(data)?))
}

fn ddos_message(data: &Value) -> Option<String> {
    Some(format!(
        "'{}' is throttling requests (DDoS protection)",
        upstream_name(data)?
    ))
}

fn not_available_message(data: &Value) -> Option<String> {
    Some(format!("'{}' is not available", upstream_name(data)?))
}

fn authentication_message(data: &Value) -> Option<String> {
    Some(format!("'{}' rejected our credentials", upstream_name(data)?))
}

type CatalogRow = (&'static str, u16, &'static str, Option<MessageTemplate>);

const BUILTIN_CATALOG: &[CatalogRow] = &[
    (kinds::INVALID_REQUEST, 400, "Invalid request", None),
    (
        kinds::MISSING_PARAMETERS,
        400,
        "Required parameters are missing",
        Some(missing_parameters_message),
    ),
    (
        kinds::INVALID_PARAMETERS,
        400,
        "Request parameters are invalid",
        Some(invalid_parameters_message),
    ),
    (kinds::NOT_FOUND, 404, "Resource not found", Some(not_found_message)),
    (
        kinds::NOT_SUPPORTED,
        501,
        "Feature not supported",
        Some(not_supported_message),
    ),
    (
        kinds::INVALID_CONFIGURATION,
        500,
        "Gateway configuration is invalid",
        None,
    ),
    (
        kinds::INTERNAL_ERROR,
        500,
        "Internal gateway error",
        Some(internal_message),
    ),
    (
        kinds::EXCHANGE_AUTHENTICATION_ERROR,
        401,
        "Exchange rejected authentication",
        Some(authentication_message),
    ),
    (
        kinds::EXCHANGE_PERMISSION_DENIED,
        403,
        "Exchange denied permission",
        None,
    ),
    (
        kinds::EXCHANGE_INSUFFICIENT_FUNDS,
        400,
        "Insufficient funds on exchange account",
        None,
    ),
    (kinds::EXCHANGE_INVALID_ORDER, 400, "Exchange rejected the order", None),
    (
        kinds::EXCHANGE_BAD_RESPONSE,
        502,
        "Exchange returned a malformed response",
        None,
    ),
    (
        kinds::EXCHANGE_NOT_AVAILABLE,
        503,
        "Exchange is not available",
        Some(not_available_message),
    ),
    (kinds::EXCHANGE_NETWORK_ERROR, 503, "Exchange network error", None),
    (
        kinds::EXCHANGE_REQUEST_TIMEOUT,
        504,
        "Exchange request timed out",
        Some(timeout_message),
    ),
    (
        kinds::EXCHANGE_DDOS_PROTECTION,
        429,
        "Exchange is throttling requests",
        Some(ddos_message),
    ),
    (
        kinds::SERVICE_AUTHENTICATION_ERROR,
        401,
        "Service rejected authentication",
        Some(authentication_message),
    ),
    (
        kinds::SERVICE_BAD_RESPONSE,
        502,
        "Service returned a malformed response",
        None,
    ),
    (
        kinds::SERVICE_NOT_AVAILABLE,
        503,
        "Service is not available",
        Some(not_available_message),
    ),
    (kinds::SERVICE_NETWORK_ERROR, 503, "Service network error", None),
    (
        kinds::SERVICE_REQUEST_TIMEOUT,
        504,
        "Service request timed out",
        Some(timeout_message),
    ),
    (
        kinds::SERVICE_DDOS_PROTECTION,
        429,
        "Service is throttling requests",
        Some(ddos_message),
    ),
];

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builtin_catalog_is_consistent() {
        let reg = ErrorRegistry::builtin().expect("catalog");
        assert_eq!(reg.len(), BUILTIN_CATALOG.len());
        assert_eq!(reg.types(), vec!["ExchangeError", "GatewayError", "ServiceError"]);
    }

    #[test]
    fn malformed_kinds_are_rejected() {
        let mut reg = ErrorRegistry::new();
        for bad in ["", "A..B", ".A", "A.", "A.B C"] {
            assert!(matches!(
                reg.register(bad, 400, "x"),
                Err(RegistryError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn missing_parameters_template_handles_plurals() {
        assert_eq!(
            missing_parameters_message(&json!({ "parameters": ["a", "b"] })).as_deref(),
            Some("Parameters 'a', 'b' are missing")
        );
        assert_eq!(missing_parameters_message(&json!({ "parameters": [] })), None);
        assert_eq!(missing_parameters_message(&Value::Null), None);
    }
}
