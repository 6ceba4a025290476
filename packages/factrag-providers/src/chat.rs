use std::{collections::VecDeque, pin::Pin};

use futures::{
	Stream, StreamExt,
	stream::{self, BoxStream},
};
use serde_json::Value;

use crate::{Error, Result, invalid_response};
use factrag_config::LlmProviderConfig;

/// A finite sequence of completion fragments.
///
/// The stream cannot be restarted. Dropping it closes the underlying connection; fragments
/// already yielded are unaffected.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

struct StreamEvent {
	fragment: Option<String>,
	done: bool,
}

#[derive(Default)]
struct LineBuffer {
	pending: Vec<u8>,
}
impl LineBuffer {
	fn push(&mut self, bytes: &[u8]) -> Vec<String> {
		self.pending.extend_from_slice(bytes);

		let mut lines = Vec::new();

		while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
			let line: Vec<u8> = self.pending.drain(..=pos).collect();

			lines.push(String::from_utf8_lossy(&line).trim().to_string());
		}

		lines
	}

	fn finish(&mut self) -> Option<String> {
		let rest = std::mem::take(&mut self.pending);
		let line = String::from_utf8_lossy(&rest).trim().to_string();

		(!line.is_empty()).then_some(line)
	}
}

struct StreamState {
	bytes: BoxStream<'static, Result<Vec<u8>>>,
	lines: LineBuffer,
	pending: VecDeque<String>,
	finished: bool,
}

pub async fn complete(cfg: &LlmProviderConfig, messages: &[Value]) -> Result<String> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"stream": false,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion(&json)
}

pub async fn stream(cfg: &LlmProviderConfig, messages: &[Value]) -> Result<TextStream> {
	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"stream": true,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?
		.error_for_status()?;
	let bytes = res
		.bytes_stream()
		.map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from));

	Ok(decode_fragments(bytes))
}

/// Turns a raw response body into completion fragments.
///
/// Accepts server-sent events (`data: {...}` lines terminated by `data: [DONE]`) and
/// newline-delimited JSON objects terminated by `"done": true`.
pub fn decode_fragments<S>(bytes: S) -> TextStream
where
	S: Stream<Item = Result<Vec<u8>>> + Send + 'static,
{
	let state = StreamState {
		bytes: bytes.boxed(),
		lines: LineBuffer::default(),
		pending: VecDeque::new(),
		finished: false,
	};

	Box::pin(stream::try_unfold(state, next_fragment))
}

async fn next_fragment(mut state: StreamState) -> Result<Option<(String, StreamState)>> {
	loop {
		if let Some(fragment) = state.pending.pop_front() {
			return Ok(Some((fragment, state)));
		}
		if state.finished {
			return Ok(None);
		}

		let lines = match state.bytes.next().await {
			Some(chunk) => state.lines.push(&chunk?),
			None => {
				state.finished = true;

				state.lines.finish().into_iter().collect()
			},
		};

		for line in lines {
			let Some(event) = parse_stream_line(&line)? else { continue };

			if let Some(fragment) = event.fragment
				&& !fragment.is_empty()
			{
				state.pending.push_back(fragment);
			}
			if event.done {
				state.finished = true;

				break;
			}
		}
	}
}

fn parse_stream_line(line: &str) -> Result<Option<StreamEvent>> {
	if line.is_empty() || line.starts_with(':') {
		return Ok(None);
	}

	let payload = match line.strip_prefix("data:") {
		Some(data) => data.trim_start(),
		None if line.starts_with('{') => line,
		// Other SSE fields (event, id, retry) carry no text.
		None => return Ok(None),
	};

	if payload == "[DONE]" {
		return Ok(Some(StreamEvent { fragment: None, done: true }));
	}

	let json: Value = serde_json::from_str(payload)?;

	if let Some(err) = json.get("error") {
		return Err(Error::InvalidResponse {
			message: format!("Chat stream reported an error: {err}"),
		});
	}

	let fragment = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("delta"))
		.and_then(|delta| delta.get("content"))
		.or_else(|| json.get("message").and_then(|msg| msg.get("content")))
		.and_then(|c| c.as_str())
		.map(str::to_string);
	let done = json.get("done").and_then(|v| v.as_bool()).unwrap_or(false);

	Ok(Some(StreamEvent { fragment, done }))
}

fn parse_completion(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.or_else(|| json.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.map(str::to_string)
		.ok_or_else(|| invalid_response("Chat response is missing message content."))
}
