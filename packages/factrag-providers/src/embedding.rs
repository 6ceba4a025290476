use serde_json::Value;

use crate::{Result, invalid_response};
use factrag_config::EmbeddingProviderConfig;

pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
	});

	if let Some(dimensions) = cfg.dimensions {
		body["dimensions"] = Value::from(dimensions);
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_embedding_response(&json, texts.len())
}

/// Places each `data` item at its `index` (or its position when absent) and requires exactly one
/// vector per input text.
fn parse_embedding_response(json: &Value, expected: usize) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(Value::as_array)
		.ok_or_else(|| invalid_response("Embedding response is missing data array."))?;

	if data.len() != expected {
		return Err(invalid_response(&format!(
			"Embedding response has {} vectors for {expected} inputs.",
			data.len()
		)));
	}

	let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];

	for (position, item) in data.iter().enumerate() {
		let slot =
			item.get("index").and_then(Value::as_u64).map_or(position, |index| index as usize);
		let values = item
			.get("embedding")
			.and_then(Value::as_array)
			.ok_or_else(|| invalid_response("Embedding item is missing embedding array."))?;
		let vector = values
			.iter()
			.map(|value| value.as_f64().map(|number| number as f32))
			.collect::<Option<Vec<f32>>>()
			.ok_or_else(|| invalid_response("Embedding value must be numeric."))?;

		match slots.get_mut(slot) {
			Some(entry @ None) => *entry = Some(vector),
			Some(Some(_)) =>
				return Err(invalid_response(&format!("Embedding index {slot} appears twice."))),
			None => return Err(invalid_response(&format!("Embedding index {slot} is out of range."))),
		}
	}

	// Every slot is filled: `data.len() == expected` and no slot was written twice.
	Ok(slots.into_iter().flatten().collect())
}
