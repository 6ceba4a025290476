pub mod answer;
pub mod chunk;
pub mod corpus;
pub mod error;
pub mod expansion;
pub mod index;
pub mod rerank;
pub mod retrieval;
pub mod store;

pub use answer::{AnswerStream, GROUNDING_PREAMBLE, chat_messages, grounding_prompt};
pub use chunk::{Chunk, Score, ScoreKind, ScoredCandidate};
pub use corpus::{load_corpus, parse_corpus};
pub use error::{Error, Result, Stage};
pub use expansion::{ExpansionMode, QueryExpander, parse_sub_queries};
pub use rerank::Reranker;
pub use retrieval::{MergePolicy, RetrievalTrace, merge_candidates};
pub use store::{VectorStore, cosine_similarity};

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use factrag_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use factrag_providers::{chat, chat::TextStream, embedding, rerank as rerank_api};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type ProviderResult<T> = factrag_providers::Result<T>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>>;
}

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>>;

	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<TextStream>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
	pub chat: Arc<dyn ChatProvider>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
		chat: Arc<dyn ChatProvider>,
	) -> Self {
		Self { embedding, rerank, chat }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), rerank: provider.clone(), chat: provider }
	}
}

/// Owns the corpus index and runs the retrieval pipeline against it.
///
/// The store is filled by [`RagService::index`] and only read afterwards.
pub struct RagService {
	pub cfg: Config,
	pub providers: Providers,
	store: VectorStore,
}
impl RagService {
	pub fn new(cfg: Config) -> Self {
		Self::with_providers(cfg, Providers::default())
	}

	pub fn with_providers(cfg: Config, providers: Providers) -> Self {
		Self { cfg, providers, store: VectorStore::new() }
	}

	pub fn store(&self) -> &VectorStore {
		&self.store
	}

	pub fn expander(&self) -> QueryExpander<'_> {
		QueryExpander::new(
			self.providers.chat.as_ref(),
			&self.cfg.providers.llm,
			&self.cfg.search.expansion,
		)
	}

	/// Returns `None` when no rerank provider is configured.
	pub fn reranker(&self) -> Option<Reranker<'_>> {
		self.cfg
			.providers
			.rerank
			.as_ref()
			.map(|cfg| Reranker::new(self.providers.rerank.as_ref(), cfg))
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		Box::pin(rerank_api::rerank(cfg, query, docs))
	}
}

impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>> {
		Box::pin(chat::complete(cfg, messages))
	}

	fn stream<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<TextStream>> {
		Box::pin(chat::stream(cfg, messages))
	}
}
