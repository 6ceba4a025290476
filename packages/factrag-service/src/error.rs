use std::fmt;

use serde::Serialize;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Corpus,
	Embedding,
	Expansion,
	SimilaritySearch,
	Reranking,
	Generation,
}
impl Stage {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Corpus => "corpus",
			Self::Embedding => "embedding",
			Self::Expansion => "expansion",
			Self::SimilaritySearch => "similarity_search",
			Self::Reranking => "reranking",
			Self::Generation => "generation",
		}
	}
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Embedding service error during {stage}: {message}")]
	EmbeddingService { stage: Stage, message: String },
	#[error("Generation service error during {stage}: {message}")]
	GenerationService { stage: Stage, message: String },
	#[error("Rerank service error: {message}")]
	RerankService { message: String },
	#[error("Vector store is empty.")]
	EmptyStore,
	#[error("Degenerate vector: {message}")]
	DegenerateVector { message: String },
	#[error("Vector dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Failed to read corpus at {path:?}.")]
	ReadCorpus { path: std::path::PathBuf, source: std::io::Error },
}
impl Error {
	pub fn stage(&self) -> Stage {
		match self {
			Self::EmbeddingService { stage, .. } | Self::GenerationService { stage, .. } => *stage,
			Self::RerankService { .. } => Stage::Reranking,
			Self::EmptyStore | Self::DegenerateVector { .. } | Self::DimensionMismatch { .. } =>
				Stage::SimilaritySearch,
			Self::ReadCorpus { .. } => Stage::Corpus,
		}
	}

	pub(crate) fn embedding(stage: Stage, err: factrag_providers::Error) -> Self {
		Self::EmbeddingService { stage, message: err.to_string() }
	}

	pub(crate) fn generation(stage: Stage, err: factrag_providers::Error) -> Self {
		Self::GenerationService { stage, message: err.to_string() }
	}
}
