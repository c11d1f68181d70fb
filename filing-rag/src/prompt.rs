//! Prompt templates and context budgeting.

use serde::{Deserialize, Serialize};

use crate::config::RagConfig;
use crate::document::SearchResult;

/// Default template for answering questions about filings.
pub const DEFAULT_TEMPLATE: &str = "\
You are a financial analyst specializing in large public companies. You write in a very \
concise way, similar to Wall Street Journal articles.
Answer the question using only the numbered context passages below. Cite the passages you \
rely on by their number, e.g. [1]. If the context does not contain the answer, say so.

Question: {question}

Context:
{context}

Answer:";

/// Returned instead of a generated answer when retrieval finds nothing relevant.
pub const DEFAULT_NO_ANSWER: &str =
    "No grounded answer available: the indexed filings contain no passage relevant to this question.";

const BLOCK_SEPARATOR: &str = "\n\n";
const QUESTION_SLOT: &str = "{question}";
const CONTEXT_SLOT: &str = "{context}";

/// How to turn a question and retrieved chunks into a generation request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PromptSpec {
    /// Template containing `{question}` and `{context}` placeholders.
    pub template: String,
    /// Character budget for the rendered context section.
    pub max_context_chars: usize,
    /// Upper bound on generated tokens.
    pub max_answer_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
    /// Text of the answer returned when there is no relevant context.
    pub no_answer_text: String,
}

impl Default for PromptSpec {
    fn default() -> Self {
        Self::from_config(&RagConfig::default())
    }
}

impl PromptSpec {
    /// Take the budget and sampling settings from `config`, with the default template.
    pub fn from_config(config: &RagConfig) -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            max_context_chars: config.max_context_chars,
            max_answer_tokens: config.max_answer_tokens,
            temperature: config.temperature,
            no_answer_text: DEFAULT_NO_ANSWER.to_string(),
        }
    }

    /// Replace the template.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    /// Fill the template in a single pass.
    ///
    /// Substituted text is never scanned again, so braces inside a filing
    /// or a question reach the model verbatim.
    pub fn render(&self, question: &str, context: &str) -> String {
        let mut out =
            String::with_capacity(self.template.len() + question.len() + context.len());
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let tail = &rest[open..];
            if let Some(after) = tail.strip_prefix(QUESTION_SLOT) {
                out.push_str(question);
                rest = after;
            } else if let Some(after) = tail.strip_prefix(CONTEXT_SLOT) {
                out.push_str(context);
                rest = after;
            } else {
                out.push('{');
                rest = &tail[1..];
            }
        }
        out.push_str(rest);
        out
    }
}

/// The context section chosen for a prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct PackedContext {
    /// Rendered context blocks joined by blank lines.
    pub text: String,
    /// Number of leading hits included.
    pub included: usize,
    /// Whether the single included hit had to be cut to fit.
    pub truncated: bool,
}

fn block_header(position: usize, hit: &SearchResult) -> String {
    format!("[{position}] {}\n", hit.chunk.provenance())
}

fn block(position: usize, hit: &SearchResult) -> String {
    format!("{}{}", block_header(position, hit), hit.chunk.text)
}

/// Fit hits into `budget` characters, dropping the lowest-scored first.
///
/// `hits` must be ordered best first. The longest prefix that fits is kept
/// whole. If not even the best hit fits on its own, its text is cut to the
/// budget and `truncated` is set; the block header shrinks (down to nothing)
/// so that at least one character of chunk text is included. A zero budget
/// includes nothing.
pub fn pack_context(hits: &[SearchResult], budget: usize) -> PackedContext {
    let mut text = String::new();
    let mut used = 0;
    let mut included = 0;

    for (i, hit) in hits.iter().enumerate() {
        let rendered = block(i + 1, hit);
        let cost = rendered.chars().count()
            + if included == 0 { 0 } else { BLOCK_SEPARATOR.len() };
        if used + cost > budget {
            break;
        }
        if included > 0 {
            text.push_str(BLOCK_SEPARATOR);
        }
        text.push_str(&rendered);
        used += cost;
        included += 1;
    }

    if included == 0 && budget > 0 {
        if let Some(best) = hits.first() {
            return truncated_block(best, budget);
        }
    }

    PackedContext { text, included, truncated: false }
}

fn truncated_block(best: &SearchResult, budget: usize) -> PackedContext {
    let header = [block_header(1, best), "[1]\n".to_string()]
        .into_iter()
        .find(|header| header.chars().count() < budget)
        .unwrap_or_default();
    let room = budget - header.chars().count();
    let cut: String = best.chunk.text.chars().take(room).collect();
    PackedContext { text: format!("{header}{cut}"), included: 1, truncated: true }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::document::Chunk;

    fn hit(id: &str, text: &str, score: f32) -> SearchResult {
        SearchResult {
            chunk: Chunk {
                id: format!("{id}_0"),
                document_id: id.to_string(),
                index: 0,
                start: 0,
                end: text.chars().count(),
                text: text.to_string(),
                metadata: HashMap::new(),
                source_uri: None,
            },
            score,
        }
    }

    #[test]
    fn render_fills_placeholders() {
        let spec = PromptSpec::default().with_template("Q={question} C={context}");
        assert_eq!(spec.render("why?", "because"), "Q=why? C=because");
    }

    #[test]
    fn braces_in_substituted_text_are_left_alone() {
        let spec = PromptSpec::default().with_template("Q={question}\nC={context} {other}");
        let rendered =
            spec.render("WHAT IS X?", "Placeholder {question} appears in filing text");
        assert_eq!(
            rendered,
            "Q=WHAT IS X?\nC=Placeholder {question} appears in filing text {other}"
        );
        assert_eq!(rendered.matches("WHAT IS X?").count(), 1);
    }

    #[test]
    fn everything_fits_under_a_large_budget() {
        let hits = vec![hit("a", "first", 0.9), hit("b", "second", 0.5)];
        let packed = pack_context(&hits, 10_000);
        assert_eq!(packed.included, 2);
        assert!(!packed.truncated);
        assert_eq!(packed.text, "[1] a\nfirst\n\n[2] b\nsecond");
    }

    #[test]
    fn lowest_scored_hits_are_dropped_first() {
        let hits = vec![hit("a", "aaaaaaaaaa", 0.9), hit("b", "bbbbbbbbbb", 0.5)];
        // "[1] a\n" + 10 chars = 16; the second block would need 18 more.
        let packed = pack_context(&hits, 20);
        assert_eq!(packed.included, 1);
        assert!(!packed.truncated);
        assert_eq!(packed.text, "[1] a\naaaaaaaaaa");
    }

    #[test]
    fn oversized_best_hit_is_cut_and_flagged() {
        let hits = vec![hit("a", "abcdefghijklmnopqrstuvwxyz", 0.9), hit("b", "b", 0.1)];
        let packed = pack_context(&hits, 10);
        assert_eq!(packed.included, 1);
        assert!(packed.truncated);
        assert_eq!(packed.text, "[1] a\nabcd");
        assert!(packed.text.chars().count() <= 10);
    }

    #[test]
    fn header_shrinks_so_some_chunk_text_always_fits() {
        let mut best = hit("aapl-10k#p12", "supplier dependency", 0.9);
        best.chunk.metadata.insert("page".into(), "12".into());

        let packed = pack_context(std::slice::from_ref(&best), 10);
        assert_eq!(packed.text, "[1]\nsuppli");
        assert_eq!(packed.included, 1);
        assert!(packed.truncated);

        let tiny = pack_context(std::slice::from_ref(&best), 3);
        assert_eq!(tiny.text, "sup");

        for budget in 1..40 {
            let packed = pack_context(std::slice::from_ref(&best), budget);
            assert!(packed.text.chars().count() <= budget);
            assert!(packed.text.contains(&best.chunk.text[..1]));
        }
    }

    #[test]
    fn zero_budget_includes_nothing() {
        let packed = pack_context(&[hit("a", "text", 0.9)], 0);
        assert_eq!(packed.included, 0);
        assert!(packed.text.is_empty());
    }

    #[test]
    fn no_hits_packs_nothing() {
        let packed = pack_context(&[], 100);
        assert_eq!(packed.included, 0);
        assert!(packed.text.is_empty());
    }
}
