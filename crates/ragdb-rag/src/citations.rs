use std::fmt::Write as _;

use ragdb_core::types::SourceRef;

/// One line per source: `1. file.pdf (Page 2) - Relevance: 0.42`.
pub fn format_sources(sources: &[SourceRef]) -> String {
    if sources.is_empty() {
        return "No sources found.".to_string();
    }
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("{}. {} (Page {}) - Relevance: {:.2}", i + 1, s.filename, s.page, s.score))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Answer followed by a numbered `**Sources:**` block.
pub fn format_with_citations(answer: &str, sources: &[SourceRef]) -> String {
    if sources.is_empty() {
        return answer.to_string();
    }
    let mut out = format!("{answer}\n\n**Sources:**\n");
    for (i, s) in sources.iter().enumerate() {
        let _ = writeln!(out, "[{}] {}, Page {}", i + 1, s.filename, s.page);
    }
    out
}
