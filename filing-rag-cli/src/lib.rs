//! Command-line front end for `filing-rag`.
//!
//! Loads plain-text filings (one document per page), builds the index once
//! and answers questions against it, either one-shot (`ask`) or in an
//! interactive session (`chat`). `retrieve` and `chunk` inspect the
//! retrieval side without calling the generation service.

pub mod cli;
pub mod commands;
pub mod loader;
pub mod settings;
pub mod telemetry;
