//! Translation of failures into what HTTP-facing handlers send back.

use std::error::Error;

use tollgate_types::{Envelope, ErrorRegistry, TollgateError};

/// Transport status and JSON envelope for `err` under `registry`.
///
/// Handlers that only know the built-in kinds pass
/// [`ErrorRegistry::standard`]; a gateway with a custom catalog passes
/// [`Gateway::registry`](crate::Gateway::registry).
#[must_use]
pub fn render(registry: &ErrorRegistry, err: &TollgateError) -> (u16, Envelope) {
    registry.render(err)
}

/// Classify an arbitrary failure before it reaches the boundary.
///
/// A [`TollgateError`] passes through unchanged; anything else becomes
/// `GatewayError.InternalError` carrying the original message as its cause.
#[must_use]
pub fn classify_unknown(err: Box<dyn Error + Send + Sync + 'static>) -> TollgateError {
    match err.downcast::<TollgateError>() {
        Ok(classified) => *classified,
        Err(other) => {
            #[cfg(feature = "tracing")]
            tracing::warn!(error = %other, "unclassified failure reached the boundary");
            TollgateError::internal(other)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_becomes_internal() {
        let io = std::io::Error::other("disk on fire");
        let err = classify_unknown(Box::new(io));
        assert_eq!(err.kind().as_str(), "GatewayError.InternalError");
        assert_eq!(err.data()["cause"], "disk on fire");
        assert_eq!(render(ErrorRegistry::standard(), &err).0, 500);
    }

    #[test]
    fn classified_error_passes_through() {
        let original = TollgateError::not_found("pair FOO/BAR");
        let err = classify_unknown(Box::new(original.clone()));
        assert_eq!(err, original);
    }

    #[test]
    fn custom_kind_uses_the_given_catalog() {
        let mut registry = ErrorRegistry::builtin().expect("builtin catalog");
        registry
            .register("GatewayError.Custom", 418, "teapot")
            .expect("register");
        let err = registry
            .create("GatewayError.Custom", None, serde_json::Value::Null)
            .expect("registered");

        assert_eq!(render(&registry, &err).0, 418);
        assert_eq!(render(ErrorRegistry::standard(), &err).0, 503);
    }
}
