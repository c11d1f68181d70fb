//! Subcommand implementations.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use filing_rag::{
    Answer, Chunker, EmbeddingIndex, EmbeddingProvider, FixedSizeChunker,
    HashingEmbeddingProvider, OpenAIEmbeddingProvider, OpenAIGenerationProvider, RagConfig,
    RagPipeline, RetrievalResult, Retriever, ServiceConfig, chunk_corpus,
};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing::{info, warn};

use crate::loader;

/// Dimensions of the offline embedder used by `retrieve --offline`.
const OFFLINE_DIMENSIONS: usize = 1024;

async fn ingested_pipeline(config: RagConfig, files: &[PathBuf]) -> Result<RagPipeline> {
    let service = ServiceConfig::from_env()?;
    info!(?service, "using model service");

    let pipeline = RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(OpenAIEmbeddingProvider::new(&service)?))
        .generation_provider(Arc::new(OpenAIGenerationProvider::new(&service)?))
        .build()?;

    let documents = loader::load_files(files)?;
    let report = pipeline.ingest(&documents).await.context("failed to index filings")?;
    for skipped in &report.skipped_documents {
        warn!(document = %skipped, "no extractable text, skipped");
    }
    info!(documents = report.documents, chunks = report.chunks, "corpus ready");
    Ok(pipeline)
}

/// `ask`: answer one question and exit.
pub async fn ask(config: RagConfig, files: &[PathBuf], question: &str, json: bool) -> Result<()> {
    let pipeline = ingested_pipeline(config, files).await?;
    let answer = pipeline.answer_query(question).await?;
    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &answer)?;
        writeln!(out)?;
    } else {
        write_answer(&mut out, &answer)?;
    }
    Ok(())
}

/// `chat`: index once, then answer questions until EOF.
pub async fn chat(config: RagConfig, files: &[PathBuf]) -> Result<()> {
    let pipeline = ingested_pipeline(config, files).await?;
    let mut editor = DefaultEditor::new()?;
    println!("Ask about the loaded filings. Ctrl-D to quit.");

    loop {
        let line = match editor.readline("question> ") {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        let _ = editor.add_history_entry(question);

        match pipeline.answer_query(question).await {
            Ok(answer) => write_answer(&mut std::io::stdout().lock(), &answer)?,
            // One failed question does not end the session.
            Err(e) => eprintln!("error: {e}"),
        }
    }
    Ok(())
}

/// `retrieve`: print the passages a question would be answered from.
pub async fn retrieve(
    config: RagConfig,
    files: &[PathBuf],
    question: &str,
    offline: bool,
) -> Result<()> {
    let provider: Arc<dyn EmbeddingProvider> = if offline {
        Arc::new(HashingEmbeddingProvider::new(OFFLINE_DIMENSIONS))
    } else {
        Arc::new(OpenAIEmbeddingProvider::new(&ServiceConfig::from_env()?)?)
    };

    let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap);
    let corpus = chunk_corpus(&chunker, &loader::load_files(files)?)?;

    let embedding_index = Arc::new(EmbeddingIndex::new(provider).with_config(&config));
    let index = embedding_index.build(corpus.chunks).await?;
    let retrieval = Retriever::new(embedding_index)
        .retrieve(&index, question, config.top_k, config.min_score)
        .await?;

    write_retrieval(&mut std::io::stdout().lock(), &retrieval)?;
    Ok(())
}

/// `chunk`: show how filings would be split with the current settings.
pub fn chunk(config: &RagConfig, files: &[PathBuf], preview: usize) -> Result<()> {
    if files.is_empty() {
        bail!("no files given");
    }
    let chunker = FixedSizeChunker::new(config.chunk_size, config.chunk_overlap);
    let mut out = std::io::stdout().lock();
    for document in loader::load_files(files)? {
        let chunks = match chunker.chunk(&document) {
            Ok(chunks) => chunks,
            Err(filing_rag::RagError::EmptyInput { .. }) => {
                writeln!(out, "{}: no extractable text", document.id)?;
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        writeln!(out, "{}: {} chunks", document.id, chunks.len())?;
        for chunk in &chunks {
            writeln!(
                out,
                "  {} [{}..{}] {}",
                chunk.id,
                chunk.start,
                chunk.end,
                preview_text(&chunk.text, preview)
            )?;
        }
    }
    Ok(())
}

/// Human-readable answer with numbered sources.
pub fn write_answer(out: &mut impl Write, answer: &Answer) -> std::io::Result<()> {
    writeln!(out, "{}", answer.text)?;
    if answer.sources.is_empty() {
        return Ok(());
    }
    writeln!(out)?;
    writeln!(out, "Sources:")?;
    for (i, source) in answer.sources.iter().enumerate() {
        writeln!(out, "  [{}] {} (score {:.3})", i + 1, source.chunk.provenance(), source.score)?;
    }
    if answer.dropped_sources > 0 {
        writeln!(out, "  ({} retrieved passages did not fit the context)", answer.dropped_sources)?;
    }
    Ok(())
}

fn write_retrieval(out: &mut impl Write, retrieval: &RetrievalResult) -> std::io::Result<()> {
    if retrieval.is_empty() {
        return writeln!(out, "no passages passed the relevance threshold");
    }
    for (i, hit) in retrieval.hits.iter().enumerate() {
        writeln!(out, "[{}] {} score={:.4}", i + 1, hit.chunk.provenance(), hit.score)?;
        writeln!(out, "{}", hit.chunk.text)?;
        writeln!(out)?;
    }
    Ok(())
}

fn preview_text(text: &str, max_chars: usize) -> String {
    let flat: String = text.chars().map(|c| if c.is_whitespace() { ' ' } else { c }).collect();
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &flat[..cut]),
        None => flat,
    }
}

#[cfg(test)]
mod tests {
    use filing_rag::{AnswerOutcome, Chunk, SearchResult};

    use super::*;

    fn hit(document_id: &str, page: Option<&str>) -> SearchResult {
        let mut chunk = Chunk {
            id: format!("{document_id}_0"),
            document_id: document_id.into(),
            index: 0,
            start: 0,
            end: 10,
            text: "supplier dependency".into(),
            metadata: Default::default(),
            source_uri: None,
        };
        if let Some(page) = page {
            chunk.metadata.insert("page".into(), page.into());
        }
        SearchResult { chunk, score: 0.75 }
    }

    #[test]
    fn answer_lists_numbered_sources() {
        let answer = Answer {
            question: "risks?".into(),
            text: "Supplier dependency [1].".into(),
            sources: vec![hit("aapl-10k", Some("12"))],
            outcome: AnswerOutcome::Grounded,
            context_truncated: false,
            dropped_sources: 2,
        };
        let mut buf = Vec::new();
        write_answer(&mut buf, &answer).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.starts_with("Supplier dependency [1].\n"));
        assert!(text.contains("[1] aapl-10k (page 12) (score 0.750)"));
        assert!(text.contains("2 retrieved passages did not fit"));
    }

    #[test]
    fn ungrounded_answer_has_no_sources_section() {
        let answer = Answer {
            question: "dividends?".into(),
            text: "No relevant passages.".into(),
            sources: vec![],
            outcome: AnswerOutcome::NoRelevantContext,
            context_truncated: false,
            dropped_sources: 0,
        };
        let mut buf = Vec::new();
        write_answer(&mut buf, &answer).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "No relevant passages.\n");
    }

    #[test]
    fn preview_flattens_and_cuts_on_char_boundaries() {
        assert_eq!(preview_text("a\nb", 10), "a b");
        assert_eq!(preview_text("€€€€", 2), "€€…");
    }

    #[test]
    fn empty_retrieval_is_reported() {
        let mut buf = Vec::new();
        write_retrieval(&mut buf, &RetrievalResult::default()).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains("relevance threshold"));
    }

    #[tokio::test]
    async fn offline_retrieve_rejects_missing_files() {
        let err = retrieve(
            RagConfig::default(),
            &[PathBuf::from("/no/such/filing.txt")],
            "risks",
            true,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("/no/such/filing.txt"));
    }
}
