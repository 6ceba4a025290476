//! Deterministic providers and configs for exercising the retrieval pipeline without a network.

use std::{
	collections::HashSet,
	path::PathBuf,
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use futures::{StreamExt, stream};
use serde_json::{Map, Value};

use factrag_config::{
	Config, Corpus, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig, Providers, Search,
	SearchDynamic, SearchExpansion, SearchMerge, SearchRerank, Service,
};
use factrag_providers::{Error as ProviderError, chat::TextStream};
use factrag_service::{
	BoxFuture, ChatProvider, Chunk, EmbeddingProvider, ProviderResult, RerankProvider,
};

/// The three facts used by the end-to-end retrieval scenario.
pub const SAMPLE_FACTS: [&str; 3] =
	["Cats sleep 12-16 hours a day.", "Cats have retractable claws.", "Dogs are loyal companions."];

pub const SAMPLE_KEYWORDS: [&str; 4] = ["cats", "sleep", "claws", "dogs"];

/// Embeds text as keyword presence: one dimension per keyword plus a constant bias dimension, so
/// no vector is ever all zeros.
pub struct KeywordEmbedding {
	keywords: Vec<String>,
	calls: AtomicUsize,
	texts: AtomicUsize,
}
impl KeywordEmbedding {
	pub fn new<I, S>(keywords: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		Self {
			keywords: keywords.into_iter().map(|keyword| keyword.into().to_lowercase()).collect(),
			calls: AtomicUsize::new(0),
			texts: AtomicUsize::new(0),
		}
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		let lowered = text.to_lowercase();
		let mut vector = Vec::with_capacity(self.keywords.len() + 1);

		vector.push(0.1);
		vector.extend(
			self.keywords
				.iter()
				.map(|keyword| if lowered.contains(keyword.as_str()) { 1.0 } else { 0.0 }),
		);

		vector
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	/// Total number of texts embedded across all calls.
	pub fn texts(&self) -> usize {
		self.texts.load(Ordering::SeqCst)
	}
}

impl EmbeddingProvider for KeywordEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);
		self.texts.fetch_add(texts.len(), Ordering::SeqCst);

		let vectors = texts.iter().map(|text| self.vector(text)).collect();

		Box::pin(async move { Ok(vectors) })
	}
}

pub struct FailingEmbedding;
impl EmbeddingProvider for FailingEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(async move { Err(unavailable("Embedding")) })
	}
}

/// Scores each document by how many distinct query words it contains.
#[derive(Default)]
pub struct OverlapRerank {
	calls: AtomicUsize,
}
impl OverlapRerank {
	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}

impl RerankProvider for OverlapRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let terms = words(query);
		let scores = docs
			.iter()
			.map(|doc| words(doc).intersection(&terms).count() as f32)
			.collect();

		Box::pin(async move { Ok(scores) })
	}
}

pub struct FailingRerank;
impl RerankProvider for FailingRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		_query: &'a str,
		_docs: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<f32>>> {
		Box::pin(async move { Err(unavailable("Rerank")) })
	}
}

/// Chat provider with a canned completion and canned stream fragments.
///
/// A missing completion makes `complete` fail. Every request's messages are recorded.
#[derive(Default)]
pub struct ScriptedChat {
	completion: Option<String>,
	fragments: Vec<String>,
	fail_stream_after: Option<usize>,
	complete_calls: AtomicUsize,
	stream_calls: AtomicUsize,
	produced: Arc<AtomicUsize>,
	requests: Mutex<Vec<Vec<Value>>>,
}
impl ScriptedChat {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn completing(text: impl Into<String>) -> Self {
		Self { completion: Some(text.into()), ..Self::default() }
	}

	pub fn with_fragments<I, S>(mut self, fragments: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.fragments = fragments.into_iter().map(Into::into).collect();

		self
	}

	/// Makes the stream yield an error after `count` fragments.
	pub fn failing_stream_after(mut self, count: usize) -> Self {
		self.fail_stream_after = Some(count);

		self
	}

	pub fn complete_calls(&self) -> usize {
		self.complete_calls.load(Ordering::SeqCst)
	}

	pub fn stream_calls(&self) -> usize {
		self.stream_calls.load(Ordering::SeqCst)
	}

	/// Number of stream fragments actually pulled by consumers.
	pub fn produced(&self) -> usize {
		self.produced.load(Ordering::SeqCst)
	}

	pub fn requests(&self) -> Vec<Vec<Value>> {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn record(&self, messages: &[Value]) {
		self.requests.lock().unwrap_or_else(|err| err.into_inner()).push(messages.to_vec());
	}
}

impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<String>> {
		self.complete_calls.fetch_add(1, Ordering::SeqCst);
		self.record(messages);

		let completion = self.completion.clone();

		Box::pin(async move { completion.ok_or_else(|| unavailable("Chat")) })
	}

	fn stream<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, ProviderResult<TextStream>> {
		self.stream_calls.fetch_add(1, Ordering::SeqCst);
		self.record(messages);

		let mut items: Vec<ProviderResult<String>> =
			self.fragments.iter().cloned().map(Ok).collect();

		if let Some(count) = self.fail_stream_after {
			items.truncate(count);
			items.push(Err(unavailable("Chat stream")));
		}

		let produced = self.produced.clone();
		let fragments: TextStream = Box::pin(stream::iter(items).inspect(move |_| {
			produced.fetch_add(1, Ordering::SeqCst);
		}));

		Box::pin(async move { Ok(fragments) })
	}
}

/// A config with expansion off, reranking disabled, and `top_n = 3`.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		corpus: Corpus {
			path: PathBuf::from("dataset/cat_facts.txt"),
			embed_batch_size: 2,
			embed_concurrency: 2,
		},
		providers: Providers {
			embedding: dummy_embedding_provider(),
			llm: dummy_llm_provider(),
			rerank: Some(dummy_provider()),
		},
		search: Search {
			top_n: 3,
			expansion: SearchExpansion {
				mode: "off".to_string(),
				max_queries: None,
				include_original: false,
			},
			dynamic: SearchDynamic { min_top_score: 0.5 },
			merge: SearchMerge { keep: "first_seen".to_string() },
			rerank: SearchRerank { enabled: false },
		},
	}
}

pub fn sample_chunks() -> Vec<Chunk> {
	SAMPLE_FACTS.iter().map(|fact| Chunk::from(*fact)).collect()
}

fn dummy_embedding_provider() -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: String::new(),
		path: "/v1/embeddings".to_string(),
		model: "test-embedding".to_string(),
		dimensions: None,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn dummy_provider() -> ProviderConfig {
	ProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: String::new(),
		path: "/v1/rerank".to_string(),
		model: "test-rerank".to_string(),
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn dummy_llm_provider() -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: "http://127.0.0.1:1".to_string(),
		api_key: String::new(),
		path: "/v1/chat/completions".to_string(),
		model: "test-chat".to_string(),
		temperature: 0.0,
		timeout_ms: 1_000,
		default_headers: Map::new(),
	}
}

fn words(text: &str) -> HashSet<String> {
	text.split(|c: char| !c.is_alphanumeric())
		.filter(|word| !word.is_empty())
		.map(str::to_lowercase)
		.collect()
}

fn unavailable(what: &str) -> ProviderError {
	ProviderError::InvalidResponse { message: format!("{what} provider is unavailable.") }
}
