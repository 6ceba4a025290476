use std::pin::Pin;

use futures::{Stream, StreamExt};
use serde_json::Value;

use crate::{Error, RagService, Result, ScoredCandidate, Stage};

pub const GROUNDING_PREAMBLE: &str = "You are a helpful chatbot.\n\
Use only the following pieces of context to answer the question. Don't make up any new information:";

/// Answer fragments in generation order. Dropping the stream stops generation.
pub type AnswerStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Builds the system instruction that restricts the answer to `context`.
pub fn grounding_prompt(context: &[ScoredCandidate]) -> String {
	let mut prompt = String::from(GROUNDING_PREAMBLE);

	for candidate in context {
		prompt.push_str("\n - ");
		prompt.push_str(candidate.chunk.as_str());
	}

	prompt
}

pub fn chat_messages(system: &str, user: &str) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

impl RagService {
	pub async fn answer(&self, question: &str, context: &[ScoredCandidate]) -> Result<String> {
		let messages = chat_messages(&grounding_prompt(context), question);

		self.providers
			.chat
			.complete(&self.cfg.providers.llm, &messages)
			.await
			.map_err(|err| Error::generation(Stage::Generation, err))
	}

	pub async fn answer_stream(
		&self,
		question: &str,
		context: &[ScoredCandidate],
	) -> Result<AnswerStream> {
		let messages = chat_messages(&grounding_prompt(context), question);
		let fragments = self
			.providers
			.chat
			.stream(&self.cfg.providers.llm, &messages)
			.await
			.map_err(|err| Error::generation(Stage::Generation, err))?;

		Ok(Box::pin(
			fragments.map(|fragment| fragment.map_err(|err| Error::generation(Stage::Generation, err))),
		))
	}
}
