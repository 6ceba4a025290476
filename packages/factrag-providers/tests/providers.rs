use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value};

use factrag_providers::Error;

#[test]
fn builds_bearer_auth_header() {
	let headers =
		factrag_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn empty_api_key_skips_authorization() {
	let mut defaults = Map::new();

	defaults.insert("X-Client".to_string(), Value::String("factrag".to_string()));

	let headers =
		factrag_providers::auth_headers("", &defaults).expect("Failed to build headers.");

	assert!(headers.get(AUTHORIZATION).is_none());
	assert_eq!(headers.get("x-client").expect("Missing default header."), "factrag");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("X-Retries".to_string(), Value::from(3));

	let err = factrag_providers::auth_headers("secret", &defaults)
		.expect_err("Expected non-string header error.");

	assert!(matches!(err, Error::InvalidConfig { .. }), "Unexpected error: {err}");
}
