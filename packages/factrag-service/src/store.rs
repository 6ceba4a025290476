use std::cmp::Ordering;

use crate::{Chunk, Error, Result, ScoredCandidate};

/// In-memory list of embedded chunks, searched exhaustively.
///
/// Entries are appended once while the corpus is indexed and never changed afterwards.
#[derive(Debug, Default)]
pub struct VectorStore {
	entries: Vec<(Chunk, Vec<f32>)>,
}
impl VectorStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends one entry. Duplicate chunk text is allowed.
	pub fn append(&mut self, chunk: Chunk, vector: Vec<f32>) {
		self.entries.push((chunk, vector));
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Dimensionality of the stored vectors, taken from the first entry.
	pub fn dimensions(&self) -> Option<usize> {
		self.entries.first().map(|(_, vector)| vector.len())
	}

	pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
		self.entries.iter().map(|(chunk, _)| chunk)
	}

	/// Ranks every entry by cosine similarity to `query` and returns the best `top_n`.
	///
	/// Equal scores keep insertion order. Fails with [`Error::EmptyStore`] when nothing has been
	/// indexed.
	pub fn rank_by_similarity(&self, query: &[f32], top_n: usize) -> Result<Vec<ScoredCandidate>> {
		if self.entries.is_empty() {
			return Err(Error::EmptyStore);
		}

		let mut scored = Vec::with_capacity(self.entries.len());

		for (chunk, vector) in &self.entries {
			scored.push((chunk, cosine_similarity(query, vector)?));
		}

		scored.sort_by(|(_, left), (_, right)| cmp_f32_desc(*left, *right));

		Ok(scored
			.into_iter()
			.take(top_n)
			.map(|(chunk, score)| ScoredCandidate::similarity(chunk.clone(), score))
			.collect())
	}
}

/// `dot(a, b) / (|a| * |b|)`.
///
/// Zero-norm inputs fail with [`Error::DegenerateVector`] rather than producing `NaN`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
	if a.len() != b.len() {
		return Err(Error::DimensionMismatch { expected: a.len(), actual: b.len() });
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (x, y) in a.iter().zip(b) {
		dot += x * y;
		norm_a += x * x;
		norm_b += y * y;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return Err(Error::DegenerateVector {
			message: "Cosine similarity is undefined for a zero-norm vector.".to_string(),
		});
	}

	Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	const EPSILON: f32 = 1e-6;

	fn store(entries: Vec<(&str, Vec<f32>)>) -> VectorStore {
		let mut store = VectorStore::new();

		for (text, vector) in entries {
			store.append(Chunk::from(text), vector);
		}

		store
	}

	fn texts(candidates: &[ScoredCandidate]) -> Vec<&str> {
		candidates.iter().map(|candidate| candidate.chunk.as_str()).collect()
	}

	#[test]
	fn self_similarity_is_one() {
		let v = [0.3, -1.2, 4.0, 0.01];
		let sim = cosine_similarity(&v, &v).expect("cosine failed");

		assert!((sim - 1.0).abs() < EPSILON, "Unexpected self similarity: {sim}");
	}

	#[test]
	fn similarity_is_symmetric() {
		let a = [1.0, 2.0, 3.0];
		let b = [-2.0, 0.5, 1.0];
		let ab = cosine_similarity(&a, &b).expect("cosine failed");
		let ba = cosine_similarity(&b, &a).expect("cosine failed");

		assert_eq!(ab, ba);
	}

	#[test]
	fn opposite_vectors_score_minus_one() {
		let sim = cosine_similarity(&[1.0, 1.0], &[-2.0, -2.0]).expect("cosine failed");

		assert!((sim + 1.0).abs() < EPSILON, "Unexpected similarity: {sim}");
	}

	#[test]
	fn zero_vector_is_degenerate() {
		let err = cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).expect_err("expected error");

		assert!(matches!(err, Error::DegenerateVector { .. }));

		let err = cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]).expect_err("expected error");

		assert!(matches!(err, Error::DegenerateVector { .. }));
	}

	#[test]
	fn mismatched_dimensions_are_rejected() {
		let err = cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]).expect_err("expected error");

		assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
	}

	#[test]
	fn ranks_descending_and_truncates() {
		let store = store(vec![
			("east", vec![1.0, 0.0]),
			("north", vec![0.0, 1.0]),
			("north-east", vec![1.0, 1.0]),
			("west", vec![-1.0, 0.0]),
		]);
		let ranked = store.rank_by_similarity(&[1.0, 0.2], 2).expect("rank failed");

		assert_eq!(texts(&ranked), vec!["east", "north-east"]);
		assert!(ranked[0].score.value() >= ranked[1].score.value());
	}

	#[test]
	fn top_n_beyond_len_returns_whole_store_ordered() {
		let store = store(vec![
			("west", vec![-1.0, 0.0]),
			("east", vec![1.0, 0.0]),
			("north", vec![0.0, 1.0]),
		]);
		let ranked = store.rank_by_similarity(&[1.0, 0.0], 10).expect("rank failed");

		assert_eq!(texts(&ranked), vec!["east", "north", "west"]);

		for pair in ranked.windows(2) {
			assert!(pair[0].score.value() >= pair[1].score.value());
		}
	}

	#[test]
	fn equal_scores_keep_insertion_order() {
		let store = store(vec![
			("first", vec![0.0, 1.0]),
			("second", vec![0.0, 1.0]),
			("best", vec![1.0, 0.0]),
			("third", vec![0.0, 1.0]),
		]);
		let ranked = store.rank_by_similarity(&[1.0, 1.0], 4).expect("rank failed");

		assert_eq!(texts(&ranked), vec!["best", "first", "second", "third"]);
	}

	#[test]
	fn duplicates_are_kept() {
		let store = store(vec![("same", vec![1.0, 0.0]), ("same", vec![1.0, 0.0])]);

		assert_eq!(store.len(), 2);
		assert_eq!(store.rank_by_similarity(&[1.0, 0.0], 5).expect("rank failed").len(), 2);
	}

	#[test]
	fn empty_store_is_an_error() {
		let err = VectorStore::new().rank_by_similarity(&[1.0], 3).expect_err("expected error");

		assert!(matches!(err, Error::EmptyStore));
	}

	#[test]
	fn zero_top_n_returns_nothing() {
		let store = store(vec![("east", vec![1.0, 0.0])]);

		assert!(store.rank_by_similarity(&[1.0, 0.0], 0).expect("rank failed").is_empty());
	}

	#[test]
	fn nan_scores_sort_last() {
		let mut values = vec![0.2, f32::NAN, 0.9, -0.5];

		values.sort_by(|a, b| cmp_f32_desc(*a, *b));

		assert_eq!(&values[..3], &[0.9, 0.2, -0.5]);
		assert!(values[3].is_nan());
	}
}
