use std::collections::HashSet;

use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use crate::{ChatProvider, Stage};
use factrag_config::{Config, LlmProviderConfig, SearchDynamic, SearchExpansion};

pub const EXPANSION_SYSTEM_PROMPT: &str =
	"Refine the query. Keep it simple and return only the queries.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionMode {
	Off,
	Always,
	Dynamic,
}
impl ExpansionMode {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Off => "off",
			Self::Always => "always",
			Self::Dynamic => "dynamic",
		}
	}
}

/// Rewrites a user query into sub-queries with one generative call.
///
/// Never fails: provider errors are logged and reported as an empty list, which callers treat as
/// "search with the original query".
pub struct QueryExpander<'a> {
	chat: &'a dyn ChatProvider,
	llm: &'a LlmProviderConfig,
	cfg: &'a SearchExpansion,
}
impl<'a> QueryExpander<'a> {
	pub fn new(
		chat: &'a dyn ChatProvider,
		llm: &'a LlmProviderConfig,
		cfg: &'a SearchExpansion,
	) -> Self {
		Self { chat, llm, cfg }
	}

	pub async fn expand(&self, query: &str) -> Vec<String> {
		let messages = build_expansion_messages(query);
		let raw = match self.chat.complete(self.llm, &messages).await {
			Ok(raw) => raw,
			Err(err) => {
				warn!(
					stage = %Stage::Expansion,
					error = %err,
					"Query expansion failed; falling back to original query."
				);

				return Vec::new();
			},
		};
		let parsed = parse_sub_queries(&raw);

		if parsed.is_empty() {
			return parsed;
		}

		normalize_queries(parsed, query, self.cfg.include_original, self.cfg.max_queries)
	}
}

pub fn resolve_expansion_mode(cfg: &Config) -> ExpansionMode {
	match cfg.search.expansion.mode.as_str() {
		"off" => ExpansionMode::Off,
		"always" => ExpansionMode::Always,
		"dynamic" => ExpansionMode::Dynamic,
		_ => ExpansionMode::Off,
	}
}

pub fn should_expand_dynamic(
	hit_count: usize,
	top_n: usize,
	top_score: f32,
	cfg: &SearchDynamic,
) -> bool {
	hit_count < top_n || top_score < cfg.min_top_score
}

pub fn build_expansion_messages(query: &str) -> Vec<Value> {
	let user_prompt = format!(
		"You are an assistant helping to refine questions. \
Rewrite the user's input query into smaller, relevant sub-queries:\nUser query: {query}\nRefined queries:"
	);

	vec![
		serde_json::json!({ "role": "system", "content": EXPANSION_SYSTEM_PROMPT }),
		serde_json::json!({ "role": "user", "content": user_prompt }),
	]
}

/// One sub-query per non-blank line, with leading list markers removed.
pub fn parse_sub_queries(text: &str) -> Vec<String> {
	text.lines()
		.map(strip_list_marker)
		.filter(|line| !line.is_empty())
		.map(str::to_string)
		.collect()
}

/// Applies `include_original` and `max_queries`.
///
/// When neither is in effect the parsed list is returned unchanged, duplicates included.
pub fn normalize_queries(
	queries: Vec<String>,
	original: &str,
	include_original: bool,
	max_queries: Option<u32>,
) -> Vec<String> {
	if !include_original && max_queries.is_none() {
		return queries;
	}

	let limit = max_queries.map_or(usize::MAX, |max| max as usize);
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	if include_original {
		push_query(&mut out, &mut seen, original);
	}

	for query in queries {
		if out.len() >= limit {
			break;
		}

		push_query(&mut out, &mut seen, &query);
	}

	out.truncate(limit);

	out
}

fn push_query(out: &mut Vec<String>, seen: &mut HashSet<String>, value: &str) {
	let trimmed = value.trim();

	if trimmed.is_empty() {
		return;
	}

	let key = trimmed.to_lowercase();

	if seen.insert(key) {
		out.push(trimmed.to_string());
	}
}

fn strip_list_marker(line: &str) -> &str {
	let line = line.trim();

	if let Some(rest) = line.strip_prefix(['-', '*', '•', '+']) {
		return rest.trim_start();
	}

	let digits = line.bytes().take_while(u8::is_ascii_digit).count();

	if digits > 0
		&& let Some(rest) = line[digits..].strip_prefix(['.', ')'])
		&& (rest.is_empty() || rest.starts_with(char::is_whitespace))
	{
		return rest.trim_start();
	}

	line
}

#[cfg(test)]
mod tests {
	use std::sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	};

	use super::*;
	use crate::{BoxFuture, ProviderResult};
	use factrag_providers::chat::TextStream;

	struct CannedChat {
		reply: Option<String>,
		calls: Arc<AtomicUsize>,
	}

	impl ChatProvider for CannedChat {
		fn complete<'a>(
			&'a self,
			_cfg: &'a LlmProviderConfig,
			_messages: &'a [Value],
		) -> BoxFuture<'a, ProviderResult<String>> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			let reply = self.reply.clone();

			Box::pin(async move {
				reply.ok_or_else(|| factrag_providers::Error::InvalidResponse {
					message: "Model is unavailable.".to_string(),
				})
			})
		}

		fn stream<'a>(
			&'a self,
			_cfg: &'a LlmProviderConfig,
			_messages: &'a [Value],
		) -> BoxFuture<'a, ProviderResult<TextStream>> {
			Box::pin(async move {
				Err(factrag_providers::Error::InvalidResponse {
					message: "Streaming is not scripted.".to_string(),
				})
			})
		}
	}

	fn llm_config() -> LlmProviderConfig {
		LlmProviderConfig {
			provider_id: "test".to_string(),
			api_base: "http://localhost".to_string(),
			api_key: String::new(),
			path: "/chat".to_string(),
			model: "test".to_string(),
			temperature: 0.0,
			timeout_ms: 1_000,
			default_headers: serde_json::Map::new(),
		}
	}

	fn expansion(include_original: bool, max_queries: Option<u32>) -> SearchExpansion {
		SearchExpansion { mode: "always".to_string(), max_queries, include_original }
	}

	#[test]
	fn strips_list_markers_and_blank_lines() {
		let parsed = parse_sub_queries(
			"- How long do cats sleep?\n\n* Do cats nap?\n  3. When are cats active?\n4) Why?\n• Dreams",
		);

		assert_eq!(
			parsed,
			vec![
				"How long do cats sleep?",
				"Do cats nap?",
				"When are cats active?",
				"Why?",
				"Dreams"
			]
		);
	}

	#[test]
	fn keeps_numbers_that_are_not_markers() {
		assert_eq!(parse_sub_queries("12 hours of sleep"), vec!["12 hours of sleep"]);
		assert!(parse_sub_queries("-\n  \n1.").is_empty());
	}

	#[test]
	fn keeps_leading_decimals_intact() {
		assert_eq!(
			parse_sub_queries("3.5 hours of cat sleep\n2) 1.5 naps\n10.x"),
			vec!["3.5 hours of cat sleep", "1.5 naps", "10.x"]
		);
	}

	#[test]
	fn normalize_queries_passes_through_when_unconstrained() {
		let queries = vec!["a".to_string(), "A".to_string()];

		assert_eq!(normalize_queries(queries.clone(), "q", false, None), queries);
	}

	#[test]
	fn normalize_queries_includes_original_and_dedupes() {
		let queries = vec!["Cats sleep".to_string(), "cats SLEEP".to_string(), "naps".to_string()];
		let out = normalize_queries(queries, "How long do cats sleep?", true, None);

		assert_eq!(out, vec!["How long do cats sleep?", "Cats sleep", "naps"]);
	}

	#[test]
	fn normalize_queries_respects_max_queries() {
		let queries = vec!["one".to_string(), "two".to_string(), "three".to_string()];
		let out = normalize_queries(queries, "original", true, Some(2));

		assert_eq!(out, vec!["original", "one"]);
	}

	#[test]
	fn dynamic_expansion_triggers() {
		let cfg = SearchDynamic { min_top_score: 0.5 };

		assert!(should_expand_dynamic(2, 3, 0.9, &cfg));
		assert!(should_expand_dynamic(3, 3, 0.2, &cfg));
		assert!(!should_expand_dynamic(3, 3, 0.9, &cfg));
	}

	#[test]
	fn expansion_prompt_embeds_query() {
		let messages = build_expansion_messages("How long do cats sleep?");

		assert_eq!(messages[0]["content"], EXPANSION_SYSTEM_PROMPT);

		let user = messages[1]["content"].as_str().expect("Missing user prompt.");

		assert!(user.contains("User query: How long do cats sleep?"));
		assert!(user.ends_with("Refined queries:"));
	}

	#[tokio::test]
	async fn expand_returns_parsed_lines() {
		let calls = Arc::new(AtomicUsize::new(0));
		let chat = CannedChat {
			reply: Some("- How long do cats sleep?\n- Cat sleep hours".to_string()),
			calls: calls.clone(),
		};
		let llm = llm_config();
		let cfg = expansion(false, None);
		let out = QueryExpander::new(&chat, &llm, &cfg).expand("cats sleep").await;

		assert_eq!(out, vec!["How long do cats sleep?", "Cat sleep hours"]);
		assert_eq!(calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn expand_swallows_provider_errors() {
		let chat = CannedChat { reply: None, calls: Arc::new(AtomicUsize::new(0)) };
		let llm = llm_config();
		let cfg = expansion(true, Some(3));

		assert!(QueryExpander::new(&chat, &llm, &cfg).expand("cats").await.is_empty());
	}

	#[tokio::test]
	async fn expand_returns_empty_for_blank_reply() {
		let chat =
			CannedChat { reply: Some("\n  \n".to_string()), calls: Arc::new(AtomicUsize::new(0)) };
		let llm = llm_config();
		let cfg = expansion(true, None);

		assert!(QueryExpander::new(&chat, &llm, &cfg).expand("cats").await.is_empty());
	}
}
