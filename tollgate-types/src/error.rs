use std::borrow::{Borrow, Cow};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;

use crate::envelope::{Envelope, ExtError};
use crate::registry::{ErrorRegistry, is_well_formed, kinds};

/// Family roots whose errors were detected while talking to an upstream.
pub const REMOTE_ROOTS: &[&str] = &["ExchangeError", "ServiceError"];

/// Dotted taxonomy path such as `ExchangeError.NetworkError.RequestTimeout`.
///
/// The first segment is the family root; every proper prefix on a `.` boundary
/// names an enclosing family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorKind(Cow<'static, str>);

impl ErrorKind {
    /// Wrap a static kind path without allocating.
    #[must_use]
    pub const fn from_static(kind: &'static str) -> Self {
        Self(Cow::Borrowed(kind))
    }

    /// Wrap an owned kind path.
    pub fn new(kind: impl Into<String>) -> Self {
        Self(Cow::Owned(kind.into()))
    }

    /// The full dotted path.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Path segments, root first.
    #[must_use]
    pub fn segments(&self) -> Vec<&str> {
        family_of(self.as_str())
    }

    /// The family root (first segment).
    #[must_use]
    pub fn root(&self) -> &str {
        self.as_str().split('.').next().unwrap_or_default()
    }

    /// The immediately enclosing family, if this kind is not a root.
    #[must_use]
    pub fn parent(&self) -> Option<&str> {
        self.as_str().rsplit_once('.').map(|(parent, _)| parent)
    }

    /// True if this kind equals `family` or lives underneath it.
    #[must_use]
    pub fn is_in_family(&self, family: &str) -> bool {
        is_in_family(self.as_str(), family)
    }

    /// Where failures of this kind are considered to originate.
    #[must_use]
    pub fn origin(&self) -> Origin {
        Origin::of(self.as_str())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ErrorKind {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for ErrorKind {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&'static str> for ErrorKind {
    fn from(kind: &'static str) -> Self {
        Self::from_static(kind)
    }
}

impl From<String> for ErrorKind {
    fn from(kind: String) -> Self {
        Self::new(kind)
    }
}

/// Split a dotted kind path into its segments.
#[must_use]
pub fn family_of(kind: &str) -> Vec<&str> {
    kind.split('.').collect()
}

/// Dot-boundary prefix test: `A.B.C` is in `A.B` and `A`, but not in `A.Bx`.
#[must_use]
pub fn is_in_family(kind: &str, family: &str) -> bool {
    if family.is_empty() {
        return false;
    }
    kind.strip_prefix(family)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Which side of the gateway detected a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Raised locally: validation, unsupported feature, internal fault.
    Gateway,
    /// Raised while talking to an upstream exchange or service.
    Remote,
}

impl Origin {
    /// Classify a kind path by its family root.
    #[must_use]
    pub fn of(kind: &str) -> Self {
        if REMOTE_ROOTS.iter().any(|root| is_in_family(kind, root)) {
            Self::Remote
        } else {
            Self::Gateway
        }
    }
}

/// The upstream family a failure belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpstreamFamily {
    /// A trading venue (per-exchange market data, account endpoints).
    Exchange,
    /// A third-party data service (market-cap feeds, FX rates).
    Service,
}

impl UpstreamFamily {
    /// Key under which the upstream name is recorded in error data.
    #[must_use]
    pub const fn data_key(self) -> &'static str {
        match self {
            Self::Exchange => "exchange",
            Self::Service => "service",
        }
    }

    const fn pick(self, exchange: &'static str, service: &'static str) -> &'static str {
        match self {
            Self::Exchange => exchange,
            Self::Service => service,
        }
    }
}

/// Anything that carries a taxonomy kind.
pub trait HasKind {
    /// The dotted kind path.
    fn kind_str(&self) -> &str;
}

impl HasKind for str {
    fn kind_str(&self) -> &str {
        self
    }
}

impl HasKind for String {
    fn kind_str(&self) -> &str {
        self
    }
}

impl HasKind for ErrorKind {
    fn kind_str(&self) -> &str {
        self.as_str()
    }
}

impl HasKind for TollgateError {
    fn kind_str(&self) -> &str {
        self.kind.as_str()
    }
}

impl<T: HasKind + ?Sized> HasKind for &T {
    fn kind_str(&self) -> &str {
        (**self).kind_str()
    }
}

/// A classified failure: taxonomy kind, human message, and structured context.
///
/// Instances are immutable once built. They are produced by
/// [`ErrorRegistry::create`] or by the typed constructors below, which target the
/// built-in catalog.
///
/// Deserializing rejects a kind that is not a well-formed dotted path. A
/// well-formed kind outside the built-in catalog is accepted so errors from a
/// custom [`ErrorRegistry`] survive the trip; render those through that
/// registry, the built-in catalog reports them as 503.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(try_from = "RawError")]
#[error("{message}")]
pub struct TollgateError {
    kind: ErrorKind,
    message: String,
    data: Value,
}

#[derive(Deserialize)]
struct RawError {
    kind: String,
    message: String,
    #[serde(default)]
    data: Value,
}

impl TryFrom<RawError> for TollgateError {
    type Error = String;

    fn try_from(raw: RawError) -> Result<Self, Self::Error> {
        if !is_well_formed(&raw.kind) {
            return Err(format!("malformed error kind `{}`", raw.kind));
        }
        Ok(Self::from_parts(ErrorKind::new(raw.kind), raw.message, raw.data))
    }
}

impl TollgateError {
    pub(crate) const fn from_parts(kind: ErrorKind, message: String, data: Value) -> Self {
        Self {
            kind,
            message,
            data,
        }
    }

    /// Build an instance of a built-in kind through the standard registry.
    fn builtin(kind: &'static str, message: Option<String>, data: Value) -> Self {
        match ErrorRegistry::standard().create(kind, message.clone(), data.clone()) {
            Ok(err) => err,
            Err(_) => Self::from_parts(
                ErrorKind::from_static(kind),
                message.unwrap_or_else(|| kind.to_string()),
                data,
            ),
        }
    }

    /// The taxonomy kind.
    #[must_use]
    pub const fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Structured diagnostic context, attached verbatim at construction.
    #[must_use]
    pub const fn data(&self) -> &Value {
        &self.data
    }

    /// Family membership on a `.` boundary.
    #[must_use]
    pub fn is_in_family(&self, family: &str) -> bool {
        self.kind.is_in_family(family)
    }

    /// Origin derived from the family root.
    #[must_use]
    pub fn origin(&self) -> Origin {
        self.kind.origin()
    }

    /// Transport status under the built-in catalog.
    ///
    /// Kinds registered only on a custom registry report 503 here; use
    /// [`ErrorRegistry::status_of`] on that registry instead.
    #[must_use]
    pub fn status(&self) -> u16 {
        ErrorRegistry::standard().status_of(self)
    }

    /// Boundary rendering of this error.
    #[must_use]
    pub fn to_envelope(&self) -> Envelope {
        Envelope {
            origin: self.origin(),
            error: self.message.clone(),
            ext_error: ExtError {
                kind: self.kind.clone(),
                message: self.message.clone(),
                data: self.data.clone(),
            },
        }
    }

    /// `GatewayError.InvalidRequest.MissingParameters` for the given parameter names.
    pub fn missing_parameters<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Self::builtin(
            kinds::MISSING_PARAMETERS,
            None,
            json!({ "parameters": names }),
        )
    }

    /// `GatewayError.InvalidRequest.InvalidParameters` for a single parameter.
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::builtin(
            kinds::INVALID_PARAMETERS,
            None,
            json!({ "parameter": name.into(), "reason": reason.into() }),
        )
    }

    /// `GatewayError.NotFound`.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::builtin(kinds::NOT_FOUND, None, json!({ "what": what.into() }))
    }

    /// `GatewayError.NotSupported`.
    pub fn not_supported(feature: impl Into<String>) -> Self {
        Self::builtin(
            kinds::NOT_SUPPORTED,
            None,
            json!({ "feature": feature.into() }),
        )
    }

    /// `GatewayError.InvalidConfiguration`.
    pub fn invalid_configuration(msg: impl Into<String>) -> Self {
        Self::builtin(kinds::INVALID_CONFIGURATION, Some(msg.into()), Value::Null)
    }

    /// `GatewayError.InternalError` wrapping an unclassified failure.
    pub fn internal(cause: impl fmt::Display) -> Self {
        Self::builtin(
            kinds::INTERNAL_ERROR,
            None,
            json!({ "cause": cause.to_string() }),
        )
    }

    /// `<Family>.NetworkError.RequestTimeout` for a named upstream.
    pub fn request_timeout(family: UpstreamFamily, upstream: impl Into<String>) -> Self {
        Self::upstream(
            family.pick(
                kinds::EXCHANGE_REQUEST_TIMEOUT,
                kinds::SERVICE_REQUEST_TIMEOUT,
            ),
            family,
            upstream.into(),
            None,
        )
    }

    /// `<Family>.NetworkError.DDosProtection`: the upstream pushed back on our rate.
    pub fn ddos_protection(family: UpstreamFamily, upstream: impl Into<String>) -> Self {
        Self::upstream(
            family.pick(kinds::EXCHANGE_DDOS_PROTECTION, kinds::SERVICE_DDOS_PROTECTION),
            family,
            upstream.into(),
            None,
        )
    }

    /// `<Family>.NetworkError` for an unclassified transport fault.
    pub fn network(
        family: UpstreamFamily,
        upstream: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::upstream(
            family.pick(kinds::EXCHANGE_NETWORK_ERROR, kinds::SERVICE_NETWORK_ERROR),
            family,
            upstream.into(),
            Some(msg.into()),
        )
    }

    /// `<Family>.BadResponse` for a malformed upstream payload.
    pub fn bad_response(
        family: UpstreamFamily,
        upstream: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        Self::upstream(
            family.pick(kinds::EXCHANGE_BAD_RESPONSE, kinds::SERVICE_BAD_RESPONSE),
            family,
            upstream.into(),
            Some(msg.into()),
        )
    }

    /// `<Family>.AuthenticationError`: the upstream refused our credentials.
    pub fn authentication(family: UpstreamFamily, upstream: impl Into<String>) -> Self {
        Self::upstream(
            family.pick(
                kinds::EXCHANGE_AUTHENTICATION_ERROR,
                kinds::SERVICE_AUTHENTICATION_ERROR,
            ),
            family,
            upstream.into(),
            None,
        )
    }

    /// `<Family>.NotAvailable`: the upstream is down or in maintenance.
    pub fn not_available(family: UpstreamFamily, upstream: impl Into<String>) -> Self {
        Self::upstream(
            family.pick(kinds::EXCHANGE_NOT_AVAILABLE, kinds::SERVICE_NOT_AVAILABLE),
            family,
            upstream.into(),
            None,
        )
    }

    fn upstream(
        kind: &'static str,
        family: UpstreamFamily,
        upstream: String,
        message: Option<String>,
    ) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(family.data_key().to_string(), Value::String(upstream));
        Self::builtin(kind, message, Value::Object(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_prefix_respects_dot_boundary() {
        assert!(is_in_family("A.B.C", "A.B"));
        assert!(is_in_family("A.B.C", "A"));
        assert!(is_in_family("A.B.C", "A.B.C"));
        assert!(!is_in_family("A.Bx.C", "A.B"));
        assert!(!is_in_family("A.B", "A.B.C"));
        assert!(!is_in_family("A.B", ""));
    }

    #[test]
    fn kind_parent_and_root() {
        let k = ErrorKind::from_static("ServiceError.NetworkError.RequestTimeout");
        assert_eq!(k.root(), "ServiceError");
        assert_eq!(k.parent(), Some("ServiceError.NetworkError"));
        assert_eq!(ErrorKind::from_static("GatewayError").parent(), None);
    }

    #[test]
    fn origin_follows_root() {
        assert_eq!(Origin::of("ExchangeError.PermissionDenied"), Origin::Remote);
        assert_eq!(Origin::of("ServiceError.BadResponse"), Origin::Remote);
        assert_eq!(Origin::of("GatewayError.InternalError"), Origin::Gateway);
        assert_eq!(Origin::of("ExchangeErrorish.Thing"), Origin::Gateway);
    }

    #[test]
    fn upstream_constructors_record_upstream_name() {
        let err = TollgateError::request_timeout(UpstreamFamily::Service, "coingecko");
        assert_eq!(
            err.kind().as_str(),
            "ServiceError.NetworkError.RequestTimeout"
        );
        assert_eq!(err.data()["service"], "coingecko");

        let err = TollgateError::ddos_protection(UpstreamFamily::Exchange, "kraken");
        assert_eq!(err.kind().as_str(), "ExchangeError.NetworkError.DDosProtection");
        assert_eq!(err.data()["exchange"], "kraken");
        assert_eq!(err.status(), 429);
    }
}
