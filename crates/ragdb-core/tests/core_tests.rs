use std::collections::HashMap;
use std::fs;

use tempfile::TempDir;

use ragdb_core::chunker::{Chunker, ChunkingConfig};
use ragdb_core::config::{resolve_with_base, Config, Settings};
use ragdb_core::text::{normalize, tokenize};
use ragdb_core::types::{Chunk, IdfScheme, Meta, PageRef, StoredChunk};

const MANUAL: &str = "
    [PAGE 1]
    COMPANY OVERVIEW. The company builds roads, bridges and urban infrastructure across the region.
    It has completed more than five hundred major projects since it was founded.

    [PAGE 2]
    SAFETY PROTOCOLS. Personal Protective Equipment (PPE) must be worn at all times on construction sites.
    Daily safety meetings are mandatory before starting work! All equipment must be inspected before use.
";

#[test]
fn normalized_manual_chunks_per_page() {
    let text = normalize(MANUAL);
    let chunks = Chunker::default().chunk(&text, "manual.pdf");

    assert_eq!(chunks.len(), 2, "each short page becomes one chunk");
    assert_eq!(chunks[0].metadata.page, PageRef::Number(1));
    assert_eq!(chunks[1].metadata.page, PageRef::Number(2));
    assert!(chunks[1].content.contains("PPE"));
    assert!(chunks.iter().all(|c| c.metadata.filename == "manual.pdf"));
}

#[test]
fn every_chunk_exceeds_minimum_length() {
    let text = normalize(&MANUAL.repeat(6));
    let config = ChunkingConfig { chunk_size: 200, chunk_overlap: 40, min_chunk_chars: 50 };
    let chunks = Chunker::new(config).expect("chunker").chunk(&text, "manual.pdf");
    assert!(!chunks.is_empty());
    for chunk in &chunks {
        assert!(chunk.content.trim().chars().count() > 50, "short chunk: {:?}", chunk.content);
    }
}

#[test]
fn admitted_chunks_get_unique_ids_and_derived_tokens() {
    let a = StoredChunk::admit(Chunk::new("Safety protocols require PPE at all times.", "a.pdf", PageRef::Number(2)));
    let b = StoredChunk::admit(Chunk::new("Safety protocols require PPE at all times.", "a.pdf", PageRef::Number(2)));
    assert_ne!(a.id(), b.id());
    assert_eq!(a.tokens(), tokenize(a.content()).as_slice());
}

#[test]
fn page_ref_serializes_as_number_or_label() {
    assert_eq!(serde_json::to_string(&PageRef::Number(3)).expect("ser"), "3");
    assert_eq!(serde_json::to_string(&PageRef::Unknown).expect("ser"), "\"N/A\"");
    let back: PageRef = serde_json::from_str("\"N/A\"").expect("de");
    assert_eq!(back, PageRef::Unknown);
    let numeric_label: PageRef = serde_json::from_str("\"7\"").expect("de");
    assert_eq!(numeric_label, PageRef::Number(7));
}

#[test]
fn metadata_filter_is_exact_match() {
    let chunk = Chunk::new("content", "report.pdf", PageRef::Number(4));
    let mut filter: Meta = HashMap::new();
    filter.insert("filename".to_string(), "report.pdf".to_string());
    assert!(chunk.metadata.matches(&filter));
    filter.insert("page".to_string(), "4".to_string());
    assert!(chunk.metadata.matches(&filter));
    filter.insert("page".to_string(), "5".to_string());
    assert!(!chunk.metadata.matches(&filter));

    let mut unknown_field: Meta = HashMap::new();
    unknown_field.insert("author".to_string(), "x".to_string());
    assert!(!chunk.metadata.matches(&unknown_field));
    assert!(chunk.metadata.matches(&Meta::new()), "empty filter matches everything");
}

#[test]
fn idf_schemes() {
    assert_eq!(IdfScheme::Plain.weight(1, 1), 0.0);
    assert!((IdfScheme::Plain.weight(4, 1) - 4f64.ln()).abs() < 1e-12);
    assert!((IdfScheme::Smoothed.weight(1, 1) - 2f64.ln()).abs() < 1e-12);
    assert!(IdfScheme::Smoothed.weight(10, 1) > IdfScheme::Smoothed.weight(10, 5));
}

#[test]
fn config_merges_file_over_defaults() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(
        tmp.path().join("config.toml"),
        "[chunking]\nchunk_size = 500\n\n[index]\ncollection = \"manuals\"\nidf = \"plain\"\n",
    )
    .expect("write");
    fs::write(tmp.path().join("config.test.toml"), "[retrieval]\ntop_k = 3\n").expect("write");

    let config = Config::load_from(tmp.path(), "test").expect("config");
    let settings = config.settings();
    assert_eq!(settings.chunking.chunk_size, 500);
    assert_eq!(settings.chunking.chunk_overlap, 100, "unset keys keep defaults");
    assert_eq!(settings.index.collection, "manuals");
    assert_eq!(settings.index.idf, IdfScheme::Plain);
    assert_eq!(settings.retrieval.top_k, 3);
    assert_eq!(config.get::<usize>("chunking.chunk_size").expect("get"), 500);
}

#[test]
fn config_rejects_invalid_chunking() {
    let tmp = TempDir::new().expect("tmp");
    fs::write(tmp.path().join("config.toml"), "[chunking]\nchunk_size = 100\nchunk_overlap = 150\n").expect("write");
    assert!(Config::load_from(tmp.path(), "test").is_err());
}

#[test]
fn default_settings_are_valid() {
    let settings = Settings::default();
    assert!(settings.validate().is_ok());
    assert_eq!(settings.chunking.chunk_size, 800);
    assert_eq!(settings.retrieval.top_k, 5);
}

#[test]
fn generator_settings_debug_redacts_key() {
    let mut settings = Settings::default();
    settings.generator.api_key = "gsk-very-secret".to_string();
    let rendered = format!("{:?}", settings.generator);
    assert!(!rendered.contains("gsk-very-secret"));
    assert!(rendered.contains("<redacted>"));
}

#[test]
fn relative_paths_resolve_against_base() {
    let tmp = TempDir::new().expect("tmp");
    assert_eq!(resolve_with_base(tmp.path(), "data"), tmp.path().join("data"));
    let abs = tmp.path().join("abs");
    assert_eq!(resolve_with_base(tmp.path(), abs.to_string_lossy()), abs);
}
