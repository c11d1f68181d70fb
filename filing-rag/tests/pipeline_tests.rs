//! End-to-end pipeline scenarios with offline providers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use filing_rag::{
    AnswerOutcome, ChannelRelay, Document, EmbeddingProvider, HashingEmbeddingProvider,
    MockGenerationProvider, PipelineState, RagConfig, RagError, RagPipeline, RetryConfig,
};
use proptest::prelude::*;
use tokio::sync::Notify;

fn corpus() -> Vec<Document> {
    vec![
        Document::new(
            "aapl-10k",
            "Apple's 10-K filing mentions supplier dependency as a major risk.",
        )
        .with_metadata("page", "12"),
        Document::new("nflx-10k", "Netflix reported streaming subscriber growth in Brazil."),
        Document::new("amzn-10k", "Amazon web services operating income increased."),
    ]
}

fn pipeline_with(config: RagConfig, generator: Arc<MockGenerationProvider>) -> RagPipeline {
    RagPipeline::builder()
        .config(config)
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(1024)))
        .generation_provider(generator)
        .build()
        .unwrap()
}

fn pipeline(generator: Arc<MockGenerationProvider>) -> RagPipeline {
    pipeline_with(RagConfig::default(), generator)
}

#[tokio::test]
async fn empty_ingest_leaves_pipeline_not_ready() {
    let pipeline = pipeline(Arc::new(MockGenerationProvider::new("unused")));

    let err = pipeline.ingest(&[]).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus));
    assert_eq!(pipeline.state().await, PipelineState::Empty);
    assert!(matches!(
        pipeline.answer_query("What are Apple's key risks?").await,
        Err(RagError::NotReady)
    ));
}

#[tokio::test]
async fn documents_without_text_are_skipped() {
    let pipeline = pipeline(Arc::new(MockGenerationProvider::new("unused")));
    let mut docs = corpus();
    docs.push(Document::new("scanned-image", "   "));

    let report = pipeline.ingest(&docs).await.unwrap();
    assert_eq!(report.documents, 3);
    assert_eq!(report.skipped_documents, vec!["scanned-image".to_string()]);
    assert_eq!(report.chunks, 3);
    assert_eq!(pipeline.state().await, PipelineState::Ready);

    let only_blank = pipeline_with(
        RagConfig::default(),
        Arc::new(MockGenerationProvider::new("unused")),
    );
    assert!(matches!(
        only_blank.ingest(&[Document::new("blank", "")]).await,
        Err(RagError::EmptyCorpus)
    ));
}

#[tokio::test]
async fn risk_question_cites_the_supplier_chunk() {
    let generator = Arc::new(MockGenerationProvider::new(
        "Apple flags supplier dependency as a major risk [1].",
    ));
    let pipeline = pipeline(generator.clone());
    pipeline.ingest(&corpus()).await.unwrap();

    let retrieval = pipeline.retrieve("What are Apple's key risks?").await.unwrap();
    assert!(retrieval.hits[0].chunk.text.contains("supplier dependency as a major risk"));

    let answer = pipeline.answer_query("What are Apple's key risks?").await.unwrap();
    assert_eq!(answer.outcome, AnswerOutcome::Grounded);
    assert_eq!(answer.cited_documents()[0], "aapl-10k");
    assert!(answer.sources.iter().all(|s| retrieval.contains(&s.chunk.id)));

    let prompt = &generator.requests()[0].prompt;
    assert!(prompt.contains("What are Apple's key risks?"));
    assert!(prompt.contains("[1] aapl-10k (page 12)"));
}

#[tokio::test]
async fn unreachable_min_score_gives_no_grounded_answer() {
    let generator = Arc::new(MockGenerationProvider::new("should not be called"));
    let config = RagConfig::builder().min_score(0.99).build().unwrap();
    let pipeline = pipeline_with(config, generator.clone());
    pipeline.ingest(&corpus()).await.unwrap();

    let retrieval = pipeline.retrieve("What is the dividend payout ratio?").await.unwrap();
    assert!(retrieval.is_empty());

    let answer = pipeline.answer_query("What is the dividend payout ratio?").await.unwrap();
    assert_eq!(answer.outcome, AnswerOutcome::NoRelevantContext);
    assert!(!answer.is_grounded());
    assert!(answer.sources.is_empty());
    assert_eq!(generator.call_count(), 0);
}

/// Declares 4 dimensions but returns 3 for texts mentioning "broken".
struct FlakyDimensions;

#[async_trait]
impl EmbeddingProvider for FlakyDimensions {
    async fn embed(&self, text: &str) -> filing_rag::Result<Vec<f32>> {
        if text.contains("broken") { Ok(vec![1.0; 3]) } else { Ok(vec![1.0; 4]) }
    }

    fn dimensions(&self) -> usize {
        4
    }

    fn model_id(&self) -> &str {
        "flaky"
    }
}

#[tokio::test]
async fn failed_reingest_keeps_previous_index() {
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(FlakyDimensions))
        .generation_provider(Arc::new(MockGenerationProvider::new("ok")))
        .build()
        .unwrap();

    let report = pipeline.ingest(&[Document::new("good", "fine text")]).await.unwrap();
    assert_eq!(report.chunks, 1);

    let err = pipeline
        .ingest(&[Document::new("a", "more text"), Document::new("b", "broken text")])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmbeddingServiceError { .. }));

    assert_eq!(pipeline.state().await, PipelineState::Ready);
    assert_eq!(pipeline.indexed_chunks().await, Some(1));
    let answer = pipeline.answer_query("text").await.unwrap();
    assert_eq!(answer.sources[0].chunk.document_id, "good");
}

#[tokio::test]
async fn reingest_replaces_the_corpus() {
    let pipeline = pipeline(Arc::new(MockGenerationProvider::new("ok")));
    pipeline.ingest(&corpus()).await.unwrap();
    pipeline
        .ingest(&[Document::new("goog-10k", "Alphabet advertising revenue concentration risk.")])
        .await
        .unwrap();

    assert_eq!(pipeline.indexed_chunks().await, Some(1));
    let answer = pipeline.answer_query("What are Apple's key risks?").await.unwrap();
    assert!(answer.sources.iter().all(|s| s.chunk.document_id == "goog-10k"));
}

#[tokio::test]
async fn concurrent_queries_share_one_index() {
    let pipeline = Arc::new(pipeline(Arc::new(MockGenerationProvider::new("ok"))));
    pipeline.ingest(&corpus()).await.unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let pipeline = pipeline.clone();
            tokio::spawn(async move {
                let question = if i % 2 == 0 { "supplier risk" } else { "streaming subscribers" };
                pipeline.answer_query(question).await
            })
        })
        .collect();

    for handle in handles {
        let answer = handle.await.unwrap().unwrap();
        assert!(answer.is_grounded());
    }
}

#[tokio::test]
async fn relay_receives_questions_without_blocking_answers() {
    let (relay, mut rx) = ChannelRelay::new("financial_queries", 1);
    let pipeline = RagPipeline::builder()
        .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)))
        .generation_provider(Arc::new(MockGenerationProvider::new("ok")))
        .relay(Arc::new(relay))
        .build()
        .unwrap();
    pipeline.ingest(&corpus()).await.unwrap();

    pipeline.answer_query("first question").await.unwrap();
    // The channel is full now; the second answer must still succeed.
    pipeline.answer_query("second question").await.unwrap();

    assert_eq!(rx.recv().await.unwrap().question, "first question");
}

#[tokio::test(start_paused = true)]
async fn generation_failure_surfaces_after_retries() {
    let generator = Arc::new(
        MockGenerationProvider::new("late")
            .with_queued(Err(RagError::generation_transient("Mock", "503")))
            .with_queued(Err(RagError::generation_transient("Mock", "503"))),
    );
    let config = RagConfig::builder()
        .retry(RetryConfig { max_attempts: 2, initial_backoff_ms: 50, max_backoff_ms: 50 })
        .build()
        .unwrap();
    let pipeline = pipeline_with(config, generator.clone());
    pipeline.ingest(&corpus()).await.unwrap();

    let err = pipeline.answer_query("supplier risk").await.unwrap_err();
    assert!(matches!(err, RagError::GenerationServiceError { .. }));
    assert_eq!(generator.call_count(), 2);

    // The pipeline is still usable once the service recovers.
    let answer = pipeline.answer_query("supplier risk").await.unwrap();
    assert_eq!(answer.text, "late");
}

#[tokio::test]
async fn tiny_context_budget_still_sends_cited_text() {
    let generator = Arc::new(MockGenerationProvider::new("ok"));
    let config = RagConfig::builder().max_context_chars(10).build().unwrap();
    let pipeline = pipeline_with(config, generator.clone());
    pipeline.ingest(&corpus()).await.unwrap();

    let answer = pipeline.answer_query("What are Apple's key risks?").await.unwrap();
    assert!(answer.context_truncated);
    assert_eq!(answer.sources.len(), 1);

    let prompt = &generator.requests()[0].prompt;
    let cited: String = answer.sources[0].chunk.text.chars().take(6).collect();
    assert!(prompt.contains(&format!("[1]\n{cited}")), "{prompt}");
}

#[tokio::test]
async fn duplicate_document_ids_are_rejected() {
    let pipeline = pipeline(Arc::new(MockGenerationProvider::new("ok")));
    pipeline.ingest(&corpus()).await.unwrap();

    let err = pipeline
        .ingest(&[
            Document::new("aapl", "2020 annual report"),
            Document::new("aapl", "2021 annual report"),
        ])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::InvalidParameter(_)));
    assert_eq!(pipeline.indexed_chunks().await, Some(3));
}

/// Hashing embedder that parks on `gate` while embedding any text that
/// mentions "gated", and logs every corpus text it embeds.
struct GatedProvider {
    inner: HashingEmbeddingProvider,
    gate: Arc<Notify>,
    parked: Arc<Notify>,
    embedded: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl EmbeddingProvider for GatedProvider {
    async fn embed(&self, text: &str) -> filing_rag::Result<Vec<f32>> {
        if text.contains("gated") {
            self.parked.notify_one();
            self.gate.notified().await;
        }
        if text.contains("filing") {
            self.embedded.lock().unwrap().push(text.to_string());
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

#[tokio::test(start_paused = true)]
async fn reingest_is_exclusive_and_queries_see_the_old_index_meanwhile() {
    let gate = Arc::new(Notify::new());
    let parked = Arc::new(Notify::new());
    let embedded = Arc::new(Mutex::new(Vec::new()));
    let pipeline = Arc::new(
        RagPipeline::builder()
            .embedding_provider(Arc::new(GatedProvider {
                inner: HashingEmbeddingProvider::new(1024),
                gate: gate.clone(),
                parked: parked.clone(),
                embedded: embedded.clone(),
            }))
            .generation_provider(Arc::new(MockGenerationProvider::new("ok")))
            .build()
            .unwrap(),
    );
    pipeline.ingest(&corpus()).await.unwrap();
    embedded.lock().unwrap().clear();

    let first = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .ingest(&[Document::new("goog-10k", "Alphabet gated filing on advertising.")])
                .await
        }
    });
    parked.notified().await;

    // The old index keeps serving while the new one is being built.
    let answer = pipeline.answer_query("supplier risk").await.unwrap();
    let old_ids = ["aapl-10k", "nflx-10k", "amzn-10k"];
    assert!(!answer.sources.is_empty());
    assert!(answer.sources.iter().all(|s| old_ids.contains(&s.chunk.document_id.as_str())));

    let second = tokio::spawn({
        let pipeline = pipeline.clone();
        async move {
            pipeline
                .ingest(&[Document::new("msft-10k", "Microsoft cloud filing on Azure growth.")])
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(embedded.lock().unwrap().is_empty(), "second ingest started before the first ended");
    assert!(!first.is_finished());

    gate.notify_one();
    assert_eq!(first.await.unwrap().unwrap().chunks, 1);
    assert_eq!(second.await.unwrap().unwrap().chunks, 1);

    assert_eq!(
        *embedded.lock().unwrap(),
        vec![
            "Alphabet gated filing on advertising.".to_string(),
            "Microsoft cloud filing on Azure growth.".to_string(),
        ]
    );
    let answer = pipeline.answer_query("cloud growth").await.unwrap();
    assert!(answer.sources.iter().all(|s| s.chunk.document_id == "msft-10k"));
}

/// *For any* question and corpus, every cited chunk was part of the
/// retrieval result for that question.
mod prop_attribution_subset {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn sources_are_a_subset_of_retrieval(
            texts in proptest::collection::vec("[a-z ]{1,200}x", 1..6),
            question in "[a-z ]{1,40}",
            budget in 20usize..600,
            top_k in 1usize..6,
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let config = RagConfig::builder()
                    .chunk_size(64)
                    .chunk_overlap(16)
                    .top_k(top_k)
                    .max_context_chars(budget)
                    .build()
                    .unwrap();
                let pipeline =
                    pipeline_with(config, Arc::new(MockGenerationProvider::new("answer")));
                let docs: Vec<Document> = texts
                    .iter()
                    .enumerate()
                    .map(|(i, text)| Document::new(format!("doc{i}"), text.clone()))
                    .collect();
                pipeline.ingest(&docs).await.unwrap();

                let retrieval = pipeline.retrieve(&question).await.unwrap();
                let answer = pipeline.answer_query(&question).await.unwrap();

                assert!(retrieval.len() <= top_k);
                assert!(answer.sources.len() <= retrieval.len());
                for (source, hit) in answer.sources.iter().zip(&retrieval.hits) {
                    assert_eq!(source, hit);
                }
                assert_eq!(answer.sources.len() + answer.dropped_sources, retrieval.len());
            });
        }
    }
}
