use proptest::prelude::*;
use serde_json::{Value, json};
use tollgate_types::{
    ErrorRegistry, Origin, RegistryError, TollgateError, UpstreamFamily, is_in_family, kinds,
};

#[test]
fn request_timeout_is_member_of_its_ancestors_only() {
    let err = ErrorRegistry::standard()
        .create(kinds::EXCHANGE_REQUEST_TIMEOUT, None, Value::Null)
        .unwrap();

    assert!(err.is_in_family("ExchangeError"));
    assert!(err.is_in_family("ExchangeError.NetworkError"));
    assert!(!err.is_in_family("ServiceError"));
    assert!(!err.is_in_family("ExchangeError.Network"));
    assert_eq!(
        ErrorRegistry::standard().family_of(err.kind().as_str()),
        vec!["ExchangeError", "NetworkError", "RequestTimeout"]
    );
}

#[test]
fn status_of_registered_and_unregistered_kinds() {
    let reg = ErrorRegistry::standard();
    assert_eq!(reg.status_of(kinds::EXCHANGE_DDOS_PROTECTION), 429);
    assert_eq!(reg.status_of(kinds::MISSING_PARAMETERS), 400);
    assert_eq!(reg.status_of(kinds::SERVICE_REQUEST_TIMEOUT), 504);
    assert_eq!(reg.status_of("ExchangeError.Totally.Made.Up"), 503);
    assert_eq!(reg.status_of(""), 503);

    let err = TollgateError::internal("boom");
    assert_eq!(reg.status_of(&err), 500);
}

#[test]
fn missing_parameter_renders_gateway_envelope() {
    let mut reg = ErrorRegistry::new();
    reg.register_with_template(
        kinds::MISSING_PARAMETERS,
        400,
        "Required parameters are missing",
        |data| {
            let names = data.get("parameters")?.as_array()?;
            let [one] = names.as_slice() else {
                return None;
            };
            Some(format!("Parameter '{}' is missing", one.as_str()?))
        },
    )
    .unwrap();

    let err = reg
        .create(
            kinds::MISSING_PARAMETERS,
            None,
            json!({ "parameters": ["pair"] }),
        )
        .unwrap();
    assert_eq!(err.message(), "Parameter 'pair' is missing");

    let (status, envelope) = reg.render(&err);
    assert_eq!(status, 400);
    assert_eq!(
        serde_json::to_value(&envelope).unwrap(),
        json!({
            "origin": "gateway",
            "error": "Parameter 'pair' is missing",
            "extError": {
                "kind": "GatewayError.InvalidRequest.MissingParameters",
                "message": "Parameter 'pair' is missing",
                "data": { "parameters": ["pair"] }
            }
        })
    );
}

#[test]
fn builtin_missing_parameters_matches_custom_registration() {
    let err = TollgateError::missing_parameters(["pair"]);
    assert_eq!(err.message(), "Parameter 'pair' is missing");
    assert_eq!(err.status(), 400);
    assert_eq!(err.origin(), Origin::Gateway);
}

#[test]
fn upstream_errors_render_as_remote() {
    let err = TollgateError::bad_response(UpstreamFamily::Service, "fx-feed", "unexpected body");
    let env = err.to_envelope();
    assert_eq!(env.origin, Origin::Remote);
    assert_eq!(env.error, "unexpected body");
    assert_eq!(env.ext_error.data, json!({ "service": "fx-feed" }));
    assert_eq!(err.status(), 502);
}

#[test]
fn duplicate_registration_fails_fast() {
    let mut reg = ErrorRegistry::new();
    reg.register("GatewayError.Custom", 418, "teapot").unwrap();
    let err = reg
        .register("GatewayError.Custom", 400, "again")
        .unwrap_err();
    assert_eq!(
        err,
        RegistryError::Duplicate {
            kind: "GatewayError.Custom".into()
        }
    );
    assert_eq!(reg.status_of("GatewayError.Custom"), 418);
}

#[test]
fn create_rejects_unregistered_kinds() {
    let reg = ErrorRegistry::new();
    assert!(matches!(
        reg.create("GatewayError.Nope", None, Value::Null),
        Err(RegistryError::Unknown { .. })
    ));
}

#[test]
fn explicit_message_wins_and_data_is_verbatim() {
    let data = json!({ "exchange": "kraken", "pair": "BTC/EUR", "quantity": 1.5, "rate": 61000 });
    let err = ErrorRegistry::standard()
        .create(
            kinds::EXCHANGE_INSUFFICIENT_FUNDS,
            Some("not enough EUR".to_string()),
            data.clone(),
        )
        .unwrap();
    assert_eq!(err.message(), "not enough EUR");
    assert_eq!(err.data(), &data);
}

#[test]
fn default_message_falls_back_to_description() {
    let err = ErrorRegistry::standard()
        .create(kinds::EXCHANGE_PERMISSION_DENIED, None, Value::Null)
        .unwrap();
    assert_eq!(err.message(), "Exchange denied permission");
}

#[test]
fn list_is_ordered_and_closed() {
    let reg = ErrorRegistry::standard();
    let kinds: Vec<&str> = reg.list().map(|s| s.kind().as_str()).collect();
    let mut sorted = kinds.clone();
    sorted.sort_unstable();
    assert_eq!(kinds, sorted);
    assert!(kinds.contains(&"GatewayError.InternalError"));
    assert_eq!(reg.types(), vec!["ExchangeError", "GatewayError", "ServiceError"]);
}

#[test]
fn error_roundtrips_through_json() {
    let err = TollgateError::request_timeout(UpstreamFamily::Exchange, "binance");
    let json = serde_json::to_string(&err).expect("serialize error");
    let de: TollgateError = serde_json::from_str(&json).expect("deserialize error");
    assert_eq!(de, err);
}

#[test]
fn deserialize_rejects_malformed_kinds() {
    for kind in ["", "GatewayError..NotFound", "GatewayError.Not Found", ".GatewayError"] {
        let raw = json!({ "kind": kind, "message": "boom" });
        assert!(
            serde_json::from_value::<TollgateError>(raw).is_err(),
            "{kind:?} should be rejected"
        );
    }
}

#[test]
fn deserialize_keeps_custom_kinds_for_their_registry() {
    let mut reg = ErrorRegistry::builtin().unwrap();
    reg.register("ServiceError.QuotaExhausted", 429, "Quota exhausted")
        .unwrap();

    let raw = json!({ "kind": "ServiceError.QuotaExhausted", "message": "monthly quota" });
    let err: TollgateError = serde_json::from_value(raw).expect("well-formed kind");
    assert_eq!(err.data(), &Value::Null);
    assert_eq!(reg.status_of(&err), 429);
    assert_eq!(err.status(), 503);
}

fn segment() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9]{0,6}"
}

proptest! {
    #[test]
    fn every_prefix_is_a_family(segs in prop::collection::vec(segment(), 1..5)) {
        let kind = segs.join(".");
        for n in 1..=segs.len() {
            let family = segs[..n].join(".");
            prop_assert!(is_in_family(&kind, &family));
        }
    }

    #[test]
    fn extending_the_last_segment_breaks_membership(
        segs in prop::collection::vec(segment(), 1..5),
        suffix in "[a-z]{1,3}",
    ) {
        let kind = segs.join(".");
        let family = format!("{kind}{suffix}");
        prop_assert!(!is_in_family(&kind, &family));
        let longer = format!("{kind}{suffix}.Leaf");
        prop_assert!(!is_in_family(&longer, &kind));
    }
}
