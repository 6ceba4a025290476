use serde_json::Value;
use tracing::warn;

use crate::{Result, invalid_response};
use factrag_config::ProviderConfig;

/// Scores every document against `query` with a cross-encoder endpoint.
///
/// The returned scores are aligned with `docs` by index.
pub async fn rerank(cfg: &ProviderConfig, query: &str, docs: &[String]) -> Result<Vec<f32>> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({ "model": cfg.model, "query": query, "documents": docs });
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rerank_response(json, docs.len())
}

fn parse_rerank_response(json: Value, doc_count: usize) -> Result<Vec<f32>> {
	let mut scores: Vec<Option<f32>> = vec![None; doc_count];
	let results = json
		.get("results")
		.or_else(|| json.get("data"))
		.and_then(|v| v.as_array())
		.ok_or_else(|| invalid_response("Rerank response is missing results array."))?;

	for item in results {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.ok_or_else(|| invalid_response("Rerank result missing index."))? as usize;
		let score = item
			.get("relevance_score")
			.or_else(|| item.get("score"))
			.and_then(|v| v.as_f64())
			.ok_or_else(|| invalid_response("Rerank result missing score."))? as f32;

		match scores.get_mut(index) {
			Some(slot) => *slot = Some(score),
			None => warn!(index, doc_count, "Ignoring rerank result with out-of-range index."),
		}
	}

	scores
		.into_iter()
		.map(|score| score.ok_or_else(|| invalid_response("Rerank response is missing a document.")))
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn aligns_scores_by_index() {
		let json = serde_json::json!({
			"results": [
				{ "index": 1, "relevance_score": 0.2 },
				{ "index": 0, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![0.9, 0.2]);
	}

	#[test]
	fn accepts_data_array_and_raw_logits() {
		let json = serde_json::json!({
			"data": [
				{ "index": 0, "score": -4.25 },
				{ "index": 1, "score": 7.5 }
			]
		});
		let scores = parse_rerank_response(json, 2).expect("parse failed");

		assert_eq!(scores, vec![-4.25, 7.5]);
	}

	#[test]
	fn rejects_partial_results() {
		let json = serde_json::json!({
			"results": [{ "index": 0, "relevance_score": 0.4 }]
		});

		assert!(parse_rerank_response(json, 2).is_err());
	}

	#[test]
	fn ignores_out_of_range_indices() {
		let json = serde_json::json!({
			"results": [
				{ "index": 0, "relevance_score": 0.4 },
				{ "index": 5, "relevance_score": 0.9 }
			]
		});
		let scores = parse_rerank_response(json, 1).expect("parse failed");

		assert_eq!(scores, vec![0.4]);
	}
}
