//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Ask grounded questions about financial filings.
#[derive(Parser, Debug)]
#[command(name = "filing-rag", version, about)]
pub struct Cli {
    /// TOML file with pipeline settings (chunk_size, top_k, min_score, ...)
    #[arg(long, global = true, env = "FILING_RAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Ingest filings and answer a single question
    Ask {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// The question to answer
        #[arg(long, short)]
        question: String,

        /// Print the answer as JSON
        #[arg(long)]
        json: bool,
    },

    /// Ingest filings, then answer questions interactively
    Chat {
        #[command(flatten)]
        corpus: CorpusArgs,
    },

    /// Show the passages that would be retrieved for a question (no generation)
    Retrieve {
        #[command(flatten)]
        corpus: CorpusArgs,

        /// The question to retrieve context for
        #[arg(long, short)]
        question: String,

        /// Use the offline hashing embedder instead of the embedding service
        #[arg(long)]
        offline: bool,
    },

    /// Split filings into chunks and print them (no external services)
    Chunk {
        /// Plain-text filings; form feeds separate pages
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Print at most this many characters of each chunk
        #[arg(long, default_value_t = 80)]
        preview: usize,
    },
}

/// Corpus selection and per-run overrides shared by the query commands.
#[derive(Args, Debug, Clone)]
pub struct CorpusArgs {
    /// Plain-text filings; form feeds separate pages
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Number of passages to retrieve
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Drop passages scoring below this similarity
    #[arg(long)]
    pub min_score: Option<f32>,

    /// Chunk size in characters
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Overlap between consecutive chunks in characters
    #[arg(long)]
    pub chunk_overlap: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ask_with_overrides() {
        let cli = Cli::try_parse_from([
            "filing-rag",
            "-vv",
            "ask",
            "aapl.txt",
            "--question",
            "What are Apple's key risks?",
            "--top-k",
            "6",
            "--min-score",
            "0.2",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Ask { corpus, question, json } => {
                assert_eq!(corpus.files, vec![PathBuf::from("aapl.txt")]);
                assert_eq!(corpus.top_k, Some(6));
                assert_eq!(corpus.min_score, Some(0.2));
                assert_eq!(question, "What are Apple's key risks?");
                assert!(!json);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn chunk_requires_files() {
        assert!(Cli::try_parse_from(["filing-rag", "chunk"]).is_err());
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
