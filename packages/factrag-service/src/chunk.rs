use std::{fmt, sync::Arc};

use serde::{Serialize, Serializer};

/// One retrievable line of the corpus. Two chunks are the same chunk when their text is equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Chunk(Arc<str>);
impl Chunk {
	pub fn new(text: impl Into<Arc<str>>) -> Self {
		Self(text.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for Chunk {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl AsRef<str> for Chunk {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl From<&str> for Chunk {
	fn from(text: &str) -> Self {
		Self::new(text)
	}
}

impl From<String> for Chunk {
	fn from(text: String) -> Self {
		Self::new(text)
	}
}

impl Serialize for Chunk {
	fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_str(&self.0)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreKind {
	Similarity,
	Rerank,
}
impl ScoreKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Similarity => "similarity",
			Self::Rerank => "rerank",
		}
	}
}

/// A relevance score tagged with the function that produced it.
///
/// Cosine similarities lie in `[-1, 1]`; rerank scores are unbounded logits. The two kinds are
/// never ordered against each other.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
	Similarity(f32),
	Rerank(f32),
}
impl Score {
	pub fn value(self) -> f32 {
		match self {
			Self::Similarity(value) | Self::Rerank(value) => value,
		}
	}

	pub fn kind(self) -> ScoreKind {
		match self {
			Self::Similarity(_) => ScoreKind::Similarity,
			Self::Rerank(_) => ScoreKind::Rerank,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredCandidate {
	pub chunk: Chunk,
	pub score: Score,
}
impl ScoredCandidate {
	pub fn similarity(chunk: Chunk, score: f32) -> Self {
		Self { chunk, score: Score::Similarity(score) }
	}

	pub fn rerank(chunk: Chunk, score: f32) -> Self {
		Self { chunk, score: Score::Rerank(score) }
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashSet;

	use super::*;

	#[test]
	fn chunk_identity_is_exact_text() {
		let mut seen = HashSet::new();

		assert!(seen.insert(Chunk::from("Cats purr.")));
		assert!(!seen.insert(Chunk::from("Cats purr.".to_string())));
		assert!(seen.insert(Chunk::from("cats purr.")));
		assert!(seen.insert(Chunk::from("Cats purr. ")));
	}

	#[test]
	fn scores_serialize_with_their_kind() {
		let candidate = ScoredCandidate::rerank(Chunk::from("Cats purr."), 3.5);
		let json = serde_json::to_value(&candidate).expect("serialize failed");

		assert_eq!(
			json,
			serde_json::json!({
				"chunk": "Cats purr.",
				"score": { "kind": "rerank", "value": 3.5 }
			})
		);
	}
}
