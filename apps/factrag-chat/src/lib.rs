use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre;
use futures::StreamExt;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

use factrag_config::Config;
use factrag_service::{RagService, ScoredCandidate};

#[derive(Debug, Parser)]
#[command(
	version = factrag_cli::VERSION,
	rename_all = "kebab",
	styles = factrag_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Overrides `corpus.path` from the config.
	#[arg(long, value_name = "FILE")]
	pub corpus: Option<PathBuf>,
	/// Question to answer. Read from stdin when omitted.
	#[arg(long, short = 'q', value_name = "TEXT")]
	pub question: Option<String>,
	/// Overrides `search.top_n` from the config.
	#[arg(long, short = 'n', value_name = "N")]
	pub top_n: Option<u32>,
	#[arg(long)]
	pub no_rerank: bool,
	/// Print the retrieval trace as JSON and skip answer generation.
	#[arg(long)]
	pub retrieve_only: bool,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let mut config = factrag_config::load(&args.config)?;

	apply_overrides(&mut config, &args)?;
	init_tracing(&config)?;

	let chunks = factrag_service::load_corpus(&config.corpus.path)?;
	let top_n = config.search.top_n as usize;
	let mut service = RagService::new(config);

	service.index(chunks).await?;

	let question = match args.question {
		Some(question) => question,
		None => prompt_question().await?,
	};
	let question = question.trim();

	if question.is_empty() {
		return Err(eyre::eyre!("Question must not be empty."));
	}

	let trace = service.retrieve_traced(question, top_n).await?;
	let mut stdout = io::stdout();

	if args.retrieve_only {
		let json = serde_json::to_string_pretty(&trace)?;

		stdout.write_all(json.as_bytes()).await?;
		stdout.write_all(b"\n").await?;
		stdout.flush().await?;

		return Ok(());
	}

	stdout.write_all(render_knowledge(&trace.candidates).as_bytes()).await?;
	stdout.write_all(b"\nChatbot response:\n").await?;
	stdout.flush().await?;

	let mut answer = service.answer_stream(question, &trace.candidates).await?;
	let ctrl_c = tokio::signal::ctrl_c();

	tokio::pin!(ctrl_c);

	loop {
		tokio::select! {
			fragment = answer.next() => match fragment {
				Some(fragment) => {
					stdout.write_all(fragment?.as_bytes()).await?;
					stdout.flush().await?;
				},
				None => break,
			},
			_ = &mut ctrl_c => {
				tracing::info!("Interrupted; stopping the answer stream.");

				break;
			},
		}
	}

	stdout.write_all(b"\n").await?;
	stdout.flush().await?;

	Ok(())
}

/// Applies command-line overrides on top of the loaded config.
pub fn apply_overrides(config: &mut Config, args: &Args) -> color_eyre::Result<()> {
	if let Some(path) = args.corpus.as_ref() {
		config.corpus.path = path.clone();
	}
	if let Some(top_n) = args.top_n {
		if top_n == 0 {
			return Err(eyre::eyre!("--top-n must be greater than zero."));
		}

		config.search.top_n = top_n;
	}
	if args.no_rerank {
		config.search.rerank.enabled = false;
	}

	Ok(())
}

pub fn render_knowledge(candidates: &[ScoredCandidate]) -> String {
	let mut out = String::from("Retrieved knowledge:\n");

	for candidate in candidates {
		out.push_str(&format!(
			" - ({} {:.2}) {}\n",
			candidate.score.kind().as_str(),
			candidate.score.value(),
			candidate.chunk
		));
	}

	out
}

async fn prompt_question() -> color_eyre::Result<String> {
	let mut stdout = io::stdout();
	let mut line = String::new();

	stdout.write_all(b"Ask a question about the corpus: ").await?;
	stdout.flush().await?;
	BufReader::new(io::stdin()).read_line(&mut line).await?;

	Ok(line)
}

fn init_tracing(config: &Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
