use std::{fs, path::Path};

use crate::{Chunk, Error, Result};

/// Reads a corpus file with one fact per line.
pub fn load_corpus(path: &Path) -> Result<Vec<Chunk>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadCorpus { path: path.to_path_buf(), source: err })?;

	Ok(parse_corpus(&raw))
}

/// Splits `raw` into one chunk per non-blank line, dropping trailing whitespace.
///
/// Duplicate lines are kept; identical chunks are merged at retrieval time.
pub fn parse_corpus(raw: &str) -> Vec<Chunk> {
	raw.lines()
		.map(str::trim_end)
		.filter(|line| !line.trim_start().is_empty())
		.map(Chunk::from)
		.collect()
}
