use crate::{Error, RerankProvider, Result, ScoredCandidate, store::cmp_f32_desc};
use factrag_config::ProviderConfig;

/// Re-scores candidates against the user query with a cross-encoder.
pub struct Reranker<'a> {
	provider: &'a dyn RerankProvider,
	cfg: &'a ProviderConfig,
}
impl<'a> Reranker<'a> {
	pub fn new(provider: &'a dyn RerankProvider, cfg: &'a ProviderConfig) -> Self {
		Self { provider, cfg }
	}

	/// Returns the same chunks ordered by descending rerank score.
	///
	/// An empty input returns immediately without calling the provider.
	pub async fn rerank(
		&self,
		query: &str,
		candidates: Vec<ScoredCandidate>,
	) -> Result<Vec<ScoredCandidate>> {
		if candidates.is_empty() {
			return Ok(candidates);
		}

		let docs: Vec<String> =
			candidates.iter().map(|candidate| candidate.chunk.as_str().to_string()).collect();
		let scores = self
			.provider
			.rerank(self.cfg, query, &docs)
			.await
			.map_err(|err| Error::RerankService { message: err.to_string() })?;

		apply_rerank_scores(candidates, scores)
	}
}

/// Replaces similarity scores with the provider's scores, position by position.
pub fn apply_rerank_scores(
	candidates: Vec<ScoredCandidate>,
	scores: Vec<f32>,
) -> Result<Vec<ScoredCandidate>> {
	if scores.len() != candidates.len() {
		return Err(Error::RerankService {
			message: format!(
				"Rerank provider returned {} scores for {} candidates.",
				scores.len(),
				candidates.len()
			),
		});
	}

	let mut reranked: Vec<ScoredCandidate> = candidates
		.into_iter()
		.zip(scores)
		.map(|(candidate, score)| ScoredCandidate::rerank(candidate.chunk, score))
		.collect();

	reranked.sort_by(|left, right| cmp_f32_desc(left.score.value(), right.score.value()));

	Ok(reranked)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::{BoxFuture, Chunk, ProviderResult, ScoreKind};

	struct LengthRerank;

	impl RerankProvider for LengthRerank {
		fn rerank<'a>(
			&'a self,
			_cfg: &'a ProviderConfig,
			_query: &'a str,
			docs: &'a [String],
		) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
			let scores = docs.iter().map(|doc| doc.len() as f32).collect();

			Box::pin(async move { Ok(scores) })
		}
	}

	struct PanickingRerank;

	impl RerankProvider for PanickingRerank {
		fn rerank<'a>(
			&'a self,
			_cfg: &'a ProviderConfig,
			_query: &'a str,
			_docs: &'a [String],
		) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
			panic!("Rerank provider must not be called.");
		}
	}

	fn cfg() -> ProviderConfig {
		ProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://localhost".to_string(),
			api_key: String::new(),
			path: "/rerank".to_string(),
			model: "test".to_string(),
			timeout_ms: 1_000,
			default_headers: serde_json::Map::new(),
		}
	}

	fn candidates(texts: &[&str]) -> Vec<ScoredCandidate> {
		texts.iter().map(|text| ScoredCandidate::similarity(Chunk::from(*text), 0.5)).collect()
	}

	#[tokio::test]
	async fn reorders_by_rerank_score() {
		let cfg = cfg();
		let out = Reranker::new(&LengthRerank, &cfg)
			.rerank("q", candidates(&["mid size", "a", "the longest text"]))
			.await
			.expect("Rerank failed.");
		let texts: Vec<&str> = out.iter().map(|candidate| candidate.chunk.as_str()).collect();

		assert_eq!(texts, vec!["the longest text", "mid size", "a"]);
		assert!(out.iter().all(|candidate| candidate.score.kind() == ScoreKind::Rerank));
	}

	#[tokio::test]
	async fn empty_input_skips_provider() {
		let cfg = cfg();
		let out = Reranker::new(&PanickingRerank, &cfg)
			.rerank("q", Vec::new())
			.await
			.expect("Rerank failed.");

		assert!(out.is_empty());
	}

	#[test]
	fn score_count_mismatch_is_an_error() {
		let err = apply_rerank_scores(candidates(&["a", "b"]), vec![1.0])
			.expect_err("Expected rerank error.");

		assert!(matches!(err, Error::RerankService { .. }));
		assert!(err.to_string().contains("1 scores for 2"), "Unexpected error: {err}");
	}

	#[test]
	fn equal_rerank_scores_keep_input_order() {
		let out = apply_rerank_scores(candidates(&["x", "y", "z"]), vec![1.0, 2.0, 1.0])
			.expect("Rerank failed.");
		let texts: Vec<&str> = out.iter().map(|candidate| candidate.chunk.as_str()).collect();

		assert_eq!(texts, vec!["y", "x", "z"]);
	}
}
