//! Pipeline settings.
//!
//! Priority (highest to lowest):
//! 1. Command-line flags
//! 2. Environment variables (`FILING_RAG_TOP_K`, `FILING_RAG_RETRY__MAX_ATTEMPTS`, ...)
//! 3. The `--config` TOML file
//! 4. Built-in defaults

use std::path::Path;

use anyhow::{Context, Result, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use filing_rag::RagConfig;
use serde::Serialize;

use crate::cli::CorpusArgs;

/// Prefix of environment variables that override settings.
pub const ENV_PREFIX: &str = "FILING_RAG_";

/// Flag values that were actually given on the command line.
#[derive(Debug, Default, Serialize)]
struct Overrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chunk_overlap: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    min_score: Option<f32>,
}

impl From<&CorpusArgs> for Overrides {
    fn from(args: &CorpusArgs) -> Self {
        Self {
            chunk_size: args.chunk_size,
            chunk_overlap: args.chunk_overlap,
            top_k: args.top_k,
            min_score: args.min_score,
        }
    }
}

/// Defaults, then the settings file (if given), then the environment.
pub fn figment(path: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(RagConfig::default()));
    if let Some(path) = path {
        ensure!(path.is_file(), "settings file {} does not exist", path.display());
        figment = figment.merge(Toml::file_exact(path));
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

/// Extract and validate settings without command-line overrides.
pub fn extract(figment: &Figment) -> Result<RagConfig> {
    let config: RagConfig = figment.extract().context("invalid settings")?;
    config.validate()?;
    Ok(config)
}

/// Layer the query command's flags on top and validate the result.
pub fn resolve(figment: &Figment, args: &CorpusArgs) -> Result<RagConfig> {
    extract(&figment.clone().merge(Serialized::defaults(Overrides::from(args))))
}
