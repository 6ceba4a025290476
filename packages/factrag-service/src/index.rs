use futures::{StreamExt, stream};
use tracing::{debug, info, warn};

use crate::{Chunk, Error, RagService, Result, Stage};

impl RagService {
	/// Embeds `chunks` in batches and appends them to the store in input order.
	///
	/// Batches are embedded concurrently up to `corpus.embed_concurrency`. Returns the number of
	/// chunks appended. Nothing is appended unless every batch succeeds.
	pub async fn index(&mut self, chunks: Vec<Chunk>) -> Result<usize> {
		if chunks.is_empty() {
			warn!(stage = %Stage::Corpus, "Corpus is empty; nothing to index.");

			return Ok(0);
		}

		let batch_size = self.cfg.corpus.embed_batch_size.max(1) as usize;
		let concurrency = self.cfg.corpus.embed_concurrency.max(1) as usize;
		let cfg = &self.cfg.providers.embedding;
		let provider = self.providers.embedding.as_ref();
		let batches: Vec<Vec<Chunk>> = chunks.chunks(batch_size).map(<[Chunk]>::to_vec).collect();
		let total_batches = batches.len();
		let mut embedded = stream::iter(batches.into_iter().enumerate())
			.map(|(batch_index, batch)| async move {
				let texts: Vec<String> =
					batch.iter().map(|chunk| chunk.as_str().to_string()).collect();
				let vectors = provider
					.embed(cfg, &texts)
					.await
					.map_err(|err| Error::embedding(Stage::Embedding, err))?;

				if vectors.len() != batch.len() {
					return Err(Error::EmbeddingService {
						stage: Stage::Embedding,
						message: format!(
							"Embedding provider returned {} vectors for {} chunks.",
							vectors.len(),
							batch.len()
						),
					});
				}

				debug!(batch = batch_index + 1, total_batches, "Embedded corpus batch.");

				Ok((batch, vectors))
			})
			.buffered(concurrency);
		let mut expected_dim =
			cfg.dimensions.map(|dim| dim as usize).or_else(|| self.store.dimensions());
		let mut staged = Vec::with_capacity(chunks.len());

		while let Some(result) = embedded.next().await {
			let (batch, vectors) = result?;

			for (chunk, vector) in batch.into_iter().zip(vectors) {
				let expected = *expected_dim.get_or_insert(vector.len());

				if vector.len() != expected {
					return Err(Error::EmbeddingService {
						stage: Stage::Embedding,
						message: format!(
							"Embedding dimension mismatch: expected {expected}, got {}.",
							vector.len()
						),
					});
				}
				if vector.iter().all(|value| *value == 0.0) {
					return Err(Error::EmbeddingService {
						stage: Stage::Embedding,
						message: format!("Chunk {:?} embedded to a zero vector.", chunk.as_str()),
					});
				}

				staged.push((chunk, vector));
			}
		}

		drop(embedded);

		let appended = staged.len();

		for (chunk, vector) in staged {
			self.store.append(chunk, vector);
		}

		info!(
			chunks = appended,
			batches = total_batches,
			dimensions = expected_dim,
			store_len = self.store.len(),
			"Corpus indexed."
		);

		Ok(appended)
	}
}
