use std::path::PathBuf;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub corpus: Corpus,
	pub providers: Providers,
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Corpus {
	pub path: PathBuf,
	#[serde(default = "default_embed_batch_size")]
	pub embed_batch_size: u32,
	#[serde(default = "default_embed_concurrency")]
	pub embed_concurrency: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	/// Optional. Required when `search.rerank.enabled` is true.
	pub rerank: Option<ProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	/// Optional. Sent to the provider and enforced on every returned vector when set.
	pub dimensions: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub top_n: u32,
	#[serde(default)]
	pub expansion: SearchExpansion,
	#[serde(default)]
	pub dynamic: SearchDynamic,
	#[serde(default)]
	pub merge: SearchMerge,
	#[serde(default)]
	pub rerank: SearchRerank,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchExpansion {
	pub mode: String,
	pub max_queries: Option<u32>,
	pub include_original: bool,
}
impl Default for SearchExpansion {
	fn default() -> Self {
		Self { mode: "always".to_string(), max_queries: None, include_original: false }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchDynamic {
	pub min_top_score: f32,
}
impl Default for SearchDynamic {
	fn default() -> Self {
		Self { min_top_score: 0.5 }
	}
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SearchMerge {
	pub keep: String,
}
impl Default for SearchMerge {
	fn default() -> Self {
		Self { keep: "first_seen".to_string() }
	}
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SearchRerank {
	pub enabled: bool,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_embed_batch_size() -> u32 {
	32
}

fn default_embed_concurrency() -> u32 {
	4
}
