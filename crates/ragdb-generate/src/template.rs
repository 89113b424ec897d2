//! Extractive answers assembled from the retrieved context itself.
use std::collections::HashSet;

use tracing::debug;

use ragdb_core::error::Result;
use ragdb_core::text::{split_sentences, tokenize};
use ragdb_core::traits::{AnswerGenerator, AnswerStream};
use ragdb_core::types::AnswerRequest;

pub const MAX_SENTENCES: usize = 3;

pub const INSUFFICIENT_INFORMATION: &str =
    "The available documents do not contain enough information to answer this question.";

const PREFIX: &str = "Based on the available documents:";
const FALLBACK_NOTE: &str =
    "Note: this answer was extracted directly from the retrieved documents because no language model is configured.";

/// Deterministic generator: picks the context sentences sharing the most
/// tokens with the question. Always ready, never fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateGenerator;

impl TemplateGenerator {
    pub fn new() -> Self { Self }

    pub fn answer(&self, question: &str, context: &str) -> String {
        let wanted: HashSet<String> = tokenize(question).into_iter().collect();
        let mut scored: Vec<(usize, usize, &str)> = context_sentences(context)
            .into_iter()
            .enumerate()
            .filter_map(|(pos, sentence)| {
                let overlap = tokenize(sentence).into_iter().collect::<HashSet<_>>().intersection(&wanted).count();
                (overlap > 0).then_some((overlap, pos, sentence))
            })
            .collect();

        if scored.is_empty() {
            debug!("no context sentence overlaps the question");
            return INSUFFICIENT_INFORMATION.to_string();
        }

        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.truncate(MAX_SENTENCES);
        scored.sort_by_key(|&(_, pos, _)| pos);

        let body = scored.iter().map(|&(_, _, s)| s).collect::<Vec<_>>().join(" ");
        format!("{PREFIX}\n\n{body}\n\n{FALLBACK_NOTE}")
    }
}

impl AnswerGenerator for TemplateGenerator {
    fn name(&self) -> &'static str { "template" }

    fn is_ready(&self) -> bool { true }

    fn generate(&self, request: &AnswerRequest) -> Result<String> {
        Ok(self.answer(&request.question, &request.context))
    }

    fn generate_stream(&self, request: &AnswerRequest) -> Result<AnswerStream> {
        let fragments: Vec<String> = self.answer(&request.question, &request.context).split_inclusive(' ').map(str::to_string).collect();
        Ok(Box::new(fragments.into_iter().map(Ok)))
    }
}

/// Sentences of the context body, skipping the `[Document i: ...]` headers
/// and `---` separators the façade adds.
fn context_sentences(context: &str) -> Vec<&str> {
    context
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && *line != "---" && !(line.starts_with("[Document ") && line.ends_with(']')))
        .flat_map(split_sentences)
        .collect()
}
