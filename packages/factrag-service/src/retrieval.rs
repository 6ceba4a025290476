use std::{cmp::Ordering, collections::HashMap};

use futures::future;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
	Chunk, Error, RagService, Result, ScoredCandidate, Stage,
	expansion::{ExpansionMode, resolve_expansion_mode, should_expand_dynamic},
	store::cmp_f32_desc,
};
use factrag_config::Config;

/// How duplicate chunks from different sub-queries are collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
	/// Keep the score from the first sub-query that returned the chunk.
	FirstSeen,
	/// Keep the highest score any sub-query produced for the chunk.
	HighestScore,
}

/// Everything one retrieval decided, for `--retrieve-only` output and tests.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievalTrace {
	pub query: String,
	pub top_n: usize,
	pub expansion_mode: ExpansionMode,
	pub sub_queries: Vec<String>,
	pub expansion_fallback: bool,
	pub merge_policy: MergePolicy,
	pub reranked: bool,
	pub candidates: Vec<ScoredCandidate>,
}

struct QueryPlan {
	sub_queries: Vec<String>,
	expansion_fallback: bool,
	baseline: Option<Vec<ScoredCandidate>>,
}

impl RagService {
	/// Returns the best `top_n` chunks for `query`, reranked when enabled.
	pub async fn retrieve(&self, query: &str, top_n: usize) -> Result<Vec<ScoredCandidate>> {
		Ok(self.retrieve_traced(query, top_n).await?.candidates)
	}

	pub async fn retrieve_traced(&self, query: &str, top_n: usize) -> Result<RetrievalTrace> {
		let expansion_mode = resolve_expansion_mode(&self.cfg);
		let merge_policy = resolve_merge_policy(&self.cfg);
		let plan = self.plan_sub_queries(query, top_n, expansion_mode).await?;
		let baseline = plan.baseline.as_ref();
		let per_query = future::try_join_all(plan.sub_queries.iter().map(|sub_query| async move {
			match baseline {
				Some(hits) if sub_query == query => Ok(hits.clone()),
				_ => self.search_one(sub_query, top_n).await,
			}
		}))
		.await?;
		let merged = merge_candidates(per_query, merge_policy, top_n);
		let reranked = self.cfg.search.rerank.enabled;
		let candidates = if reranked {
			let reranker = self.reranker().ok_or_else(|| Error::RerankService {
				message: "Reranking is enabled but no rerank provider is configured.".to_string(),
			})?;

			reranker.rerank(query, merged).await?
		} else {
			merged
		};

		info!(
			expansion_mode = expansion_mode.as_str(),
			sub_queries = plan.sub_queries.len(),
			expansion_fallback = plan.expansion_fallback,
			candidates = candidates.len(),
			reranked,
			"Retrieval finished."
		);

		Ok(RetrievalTrace {
			query: query.to_string(),
			top_n,
			expansion_mode,
			sub_queries: plan.sub_queries,
			expansion_fallback: plan.expansion_fallback,
			merge_policy,
			reranked,
			candidates,
		})
	}

	async fn plan_sub_queries(
		&self,
		query: &str,
		top_n: usize,
		expansion_mode: ExpansionMode,
	) -> Result<QueryPlan> {
		let mut baseline = None;

		match expansion_mode {
			ExpansionMode::Off => {
				return Ok(QueryPlan {
					sub_queries: vec![query.to_string()],
					expansion_fallback: false,
					baseline,
				});
			},
			ExpansionMode::Dynamic => {
				let hits = self.search_one(query, top_n).await?;
				let top_score = hits.first().map(|hit| hit.score.value()).unwrap_or(f32::MIN);

				if !should_expand_dynamic(hits.len(), top_n, top_score, &self.cfg.search.dynamic) {
					return Ok(QueryPlan {
						sub_queries: vec![query.to_string()],
						expansion_fallback: false,
						baseline: Some(hits),
					});
				}

				baseline = Some(hits);
			},
			ExpansionMode::Always => {},
		}

		let expanded = self.expander().expand(query).await;

		if expanded.is_empty() {
			warn!(
				stage = %Stage::Expansion,
				"Query expansion produced no sub-queries; searching with the original query."
			);

			return Ok(QueryPlan {
				sub_queries: vec![query.to_string()],
				expansion_fallback: true,
				baseline,
			});
		}

		Ok(QueryPlan { sub_queries: expanded, expansion_fallback: false, baseline })
	}

	async fn search_one(&self, sub_query: &str, top_n: usize) -> Result<Vec<ScoredCandidate>> {
		let vector = self.embed_query(sub_query).await?;
		let hits = self.store().rank_by_similarity(&vector, top_n)?;

		debug!(
			sub_query,
			hits = hits.len(),
			top_score = hits.first().map(|hit| hit.score.value()),
			"Sub-query searched."
		);

		Ok(hits)
	}

	async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await
			.map_err(|err| Error::embedding(Stage::Embedding, err))?;

		vectors.into_iter().next().ok_or_else(|| Error::EmbeddingService {
			stage: Stage::Embedding,
			message: "Embedding provider returned no vector for the query.".to_string(),
		})
	}
}

pub fn resolve_merge_policy(cfg: &Config) -> MergePolicy {
	match cfg.search.merge.keep.as_str() {
		"highest_score" => MergePolicy::HighestScore,
		_ => MergePolicy::FirstSeen,
	}
}

/// Flattens per-sub-query hits in sub-query order, keeps one entry per distinct chunk, and
/// returns the best `top_n` by score.
pub fn merge_candidates(
	per_query: Vec<Vec<ScoredCandidate>>,
	policy: MergePolicy,
	top_n: usize,
) -> Vec<ScoredCandidate> {
	let mut merged: Vec<ScoredCandidate> = Vec::new();
	let mut positions: HashMap<Chunk, usize> = HashMap::new();

	for candidate in per_query.into_iter().flatten() {
		match positions.get(&candidate.chunk) {
			Some(&idx) => {
				let kept = &mut merged[idx];

				if policy == MergePolicy::HighestScore
					&& cmp_f32_desc(candidate.score.value(), kept.score.value()) == Ordering::Less
				{
					kept.score = candidate.score;
				}
			},
			None => {
				positions.insert(candidate.chunk.clone(), merged.len());
				merged.push(candidate);
			},
		}
	}

	merged.sort_by(|left, right| cmp_f32_desc(left.score.value(), right.score.value()));
	merged.truncate(top_n);

	merged
}
