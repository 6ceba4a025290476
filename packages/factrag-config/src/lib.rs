mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, Corpus, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig, Providers, Search,
	SearchDynamic, SearchExpansion, SearchMerge, SearchRerank, Service,
};

use std::{fs, path::Path};

use serde_json::{Map, Value};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.corpus.path.to_string_lossy().trim().is_empty() {
		return Err(Error::Validation { message: "corpus.path must be non-empty.".to_string() });
	}
	if cfg.corpus.embed_batch_size == 0 {
		return Err(Error::Validation {
			message: "corpus.embed_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.corpus.embed_concurrency == 0 {
		return Err(Error::Validation {
			message: "corpus.embed_concurrency must be greater than zero.".to_string(),
		});
	}

	if let Some(dimensions) = cfg.providers.embedding.dimensions
		&& dimensions == 0
	{
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}

	let llm_temperature = cfg.providers.llm.temperature;

	if !llm_temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&llm_temperature) {
		return Err(Error::Validation {
			message: "providers.llm.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}

	let embedding = &cfg.providers.embedding;
	let llm = &cfg.providers.llm;
	let mut endpoints = vec![
		(
			"embedding",
			embedding.api_base.as_str(),
			embedding.path.as_str(),
			embedding.model.as_str(),
			embedding.timeout_ms,
			&embedding.default_headers,
		),
		(
			"llm",
			llm.api_base.as_str(),
			llm.path.as_str(),
			llm.model.as_str(),
			llm.timeout_ms,
			&llm.default_headers,
		),
	];

	if let Some(rerank) = cfg.providers.rerank.as_ref() {
		endpoints.push((
			"rerank",
			rerank.api_base.as_str(),
			rerank.path.as_str(),
			rerank.model.as_str(),
			rerank.timeout_ms,
			&rerank.default_headers,
		));
	}

	for (label, api_base, path, model, timeout_ms, headers) in endpoints {
		validate_endpoint(label, api_base, path, model, timeout_ms, headers)?;
	}

	if cfg.search.top_n == 0 {
		return Err(Error::Validation {
			message: "search.top_n must be greater than zero.".to_string(),
		});
	}

	let expansion_mode = cfg.search.expansion.mode.as_str();

	if !matches!(expansion_mode, "off" | "always" | "dynamic") {
		return Err(Error::Validation {
			message: "search.expansion.mode must be one of off, always, or dynamic.".to_string(),
		});
	}

	if let Some(max) = cfg.search.expansion.max_queries
		&& max == 0
	{
		return Err(Error::Validation {
			message: "search.expansion.max_queries must be greater than zero.".to_string(),
		});
	}

	if !cfg.search.dynamic.min_top_score.is_finite() {
		return Err(Error::Validation {
			message: "search.dynamic.min_top_score must be a finite number.".to_string(),
		});
	}
	if !(-1.0..=1.0).contains(&cfg.search.dynamic.min_top_score) {
		return Err(Error::Validation {
			message: "search.dynamic.min_top_score must be in the range -1.0-1.0.".to_string(),
		});
	}
	if !matches!(cfg.search.merge.keep.as_str(), "first_seen" | "highest_score") {
		return Err(Error::Validation {
			message: "search.merge.keep must be one of first_seen or highest_score.".to_string(),
		});
	}
	if cfg.search.rerank.enabled && cfg.providers.rerank.is_none() {
		return Err(Error::Validation {
			message: "providers.rerank must be configured when search.rerank.enabled is true."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_endpoint(
	label: &str,
	api_base: &str,
	path: &str,
	model: &str,
	timeout_ms: u64,
	headers: &Map<String, Value>,
) -> Result<()> {
	if api_base.is_empty() {
		return Err(Error::Validation {
			message: format!("providers.{label}.api_base must be non-empty."),
		});
	}
	if !path.starts_with('/') {
		return Err(Error::Validation {
			message: format!("providers.{label}.path must start with '/'."),
		});
	}
	if model.trim().is_empty() {
		return Err(Error::Validation {
			message: format!("providers.{label}.model must be non-empty."),
		});
	}
	if timeout_ms == 0 {
		return Err(Error::Validation {
			message: format!("providers.{label}.timeout_ms must be greater than zero."),
		});
	}
	if headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: format!("providers.{label}.default_headers values must be strings."),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let trim_base = |base: &mut String| {
		let trimmed = base.trim().trim_end_matches('/').to_string();

		*base = trimmed;
	};

	trim_base(&mut cfg.providers.embedding.api_base);
	trim_base(&mut cfg.providers.llm.api_base);

	cfg.providers.embedding.api_key = cfg.providers.embedding.api_key.trim().to_string();
	cfg.providers.llm.api_key = cfg.providers.llm.api_key.trim().to_string();

	if let Some(rerank) = cfg.providers.rerank.as_mut() {
		trim_base(&mut rerank.api_base);

		rerank.api_key = rerank.api_key.trim().to_string();
	}

	cfg.search.expansion.mode = cfg.search.expansion.mode.trim().to_ascii_lowercase();
	cfg.search.merge.keep = cfg.search.merge.keep.trim().to_ascii_lowercase();
}

#[cfg(test)]
mod tests {
	use super::*;

	const MINIMAL: &str = r#"
[service]

[corpus]
path = "facts.txt"

[providers.embedding]
provider_id = "ollama"
api_base    = "http://localhost:11434/v1/"
api_key     = "  "
path        = "/embeddings"
model       = "bge-base-en-v1.5"
timeout_ms  = 1000

[providers.llm]
provider_id = "ollama"
api_base    = "http://localhost:11434/v1"
path        = "/chat/completions"
model       = "llama3.2:1b"
temperature = 0.2
timeout_ms  = 1000

[search]
top_n = 3
"#;

	#[test]
	fn applies_defaults_and_normalizes() {
		let mut cfg: Config = toml::from_str(MINIMAL).expect("Minimal config must parse.");

		normalize(&mut cfg);
		validate(&cfg).expect("Minimal config must be valid.");

		assert_eq!(cfg.service.log_level, "info");
		assert_eq!(cfg.corpus.embed_batch_size, 32);
		assert_eq!(cfg.corpus.embed_concurrency, 4);
		assert_eq!(cfg.providers.embedding.api_base, "http://localhost:11434/v1");
		assert!(cfg.providers.embedding.api_key.is_empty());
		assert_eq!(cfg.search.expansion.mode, "always");
		assert!(cfg.search.expansion.max_queries.is_none());
		assert_eq!(cfg.search.merge.keep, "first_seen");
		assert!(!cfg.search.rerank.enabled);
		assert!(cfg.providers.rerank.is_none());
	}
}
