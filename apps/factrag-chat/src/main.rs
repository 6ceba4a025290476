use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = factrag_chat::Args::parse();
	factrag_chat::run(args).await
}
