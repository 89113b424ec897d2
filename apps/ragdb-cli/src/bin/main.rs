use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ragdb_core::config::Config;
use ragdb_core::error::Error;
use ragdb_core::text::validate_query;
use ragdb_core::types::Meta;
use ragdb_rag::{format_sources, format_with_citations, RagEngine};
use ragdb_source::{list_documents, sanitize_filename, source_for, validate_pdf_file};
use ragdb_text::LexicalIndex;

const USAGE: &str = "Usage: ragdb [-v] <command> [args...]

Commands:
  ingest <path>...               index PDF/text files or directories
  query \"<question>\" [-k N]      answer with citations
  ask \"<question>\" [-k N]        stream the answer as it is generated
  find <field>=<value>... [-n N] look up chunks by metadata
  stats                          collection and generator status
  clear                          remove every chunk, keep the collection
  delete                         delete the collection snapshot";

const NO_RESULTS: &str = "I couldn't find relevant information in the indexed documents to answer that question.";

type Engine = RagEngine<LexicalIndex>;

fn parse_args() -> (bool, String, Vec<String>) {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let before = args.len();
    args.retain(|a| a != "-v" && a != "--verbose");
    let verbose = args.len() != before;
    if args.is_empty() { eprintln!("{USAGE}"); std::process::exit(1); }
    let cmd = args.remove(0);
    (verbose, cmd, args)
}

/// Remove `flag N` from `args`, returning N.
fn take_count(args: &mut Vec<String>, flags: &[&str]) -> anyhow::Result<Option<usize>> {
    let Some(pos) = args.iter().position(|a| flags.contains(&a.as_str())) else { return Ok(None) };
    let flag = args.remove(pos);
    if pos >= args.len() { bail!("{flag} requires a number"); }
    let value = args.remove(pos);
    let n = value.parse::<usize>().with_context(|| format!("{flag} requires a number, got '{value}'"))?;
    if n == 0 { bail!("{flag} must be greater than zero"); }
    Ok(Some(n))
}

fn parse_filter(pairs: &[String]) -> anyhow::Result<Meta> {
    if pairs.is_empty() { bail!("find needs at least one <field>=<value> pair"); }
    pairs
        .iter()
        .map(|pair| {
            let (field, value) = pair.split_once('=').ok_or_else(|| anyhow!("expected <field>=<value>, got '{pair}'"))?;
            Ok((field.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

fn question(args: &[String]) -> anyhow::Result<String> {
    let question = args.join(" ");
    validate_query(&question)?;
    Ok(question)
}

fn ingest(engine: &Engine, inputs: &[String]) -> anyhow::Result<()> {
    if inputs.is_empty() { bail!("ingest needs at least one file or directory"); }
    let mut files: Vec<PathBuf> = Vec::new();
    for input in inputs {
        files.extend(list_documents(Path::new(input))?);
    }
    if files.is_empty() { bail!("no .pdf or .txt files found"); }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(ProgressStyle::default_bar().template("{msg} [{bar:40}] {pos}/{len}")?);
    pb.set_message("Indexing");

    let (mut documents, mut chunks) = (0usize, 0usize);
    for path in &files {
        let name = sanitize_filename(&path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default());
        let outcome = if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) && !validate_pdf_file(path) {
            Err(Error::Extraction("not a valid PDF (missing signature or larger than 50 MiB)".to_string()))
        } else {
            source_for(path).and_then(|source| source.extract(path)).and_then(|text| engine.add_document(&text, &name))
        };
        match outcome {
            Ok(added) => { documents += 1; chunks += added; }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipped document");
                pb.println(format!("⚠️  {}: {e}", path.display()));
            }
        }
        pb.inc(1);
    }
    pb.finish_and_clear();

    println!("✅ Indexed {documents}/{} documents ({chunks} chunks)", files.len());
    println!("📊 Collection now holds {} chunks", engine.stats().total_chunks);
    Ok(())
}

fn query(engine: &Engine, mut args: Vec<String>, default_k: usize) -> anyhow::Result<()> {
    let k = take_count(&mut args, &["-k", "--top-k"])?.unwrap_or(default_k);
    let question = question(&args)?;
    match engine.query(&question, k) {
        Ok(result) => {
            println!("{}", format_with_citations(&result.answer, &result.sources));
            println!("{}", format_sources(&result.sources));
            Ok(())
        }
        Err(Error::NoResults) => { println!("{NO_RESULTS}"); Ok(()) }
        Err(e) => Err(e.into()),
    }
}

fn ask(engine: &Engine, mut args: Vec<String>, default_k: usize) -> anyhow::Result<()> {
    let k = take_count(&mut args, &["-k", "--top-k"])?.unwrap_or(default_k);
    let question = question(&args)?;
    let stream = match engine.query_stream(&question, k) {
        Ok(stream) => stream,
        Err(Error::NoResults) => { println!("{NO_RESULTS}"); return Ok(()); }
        Err(e) => return Err(e.into()),
    };

    let mut out = io::stdout().lock();
    for fragment in stream.fragments {
        out.write_all(fragment?.as_bytes())?;
        out.flush()?;
    }
    writeln!(out, "\n\nSources:\n{}", format_sources(&stream.sources))?;
    Ok(())
}

fn find(engine: &Engine, mut args: Vec<String>) -> anyhow::Result<()> {
    let limit = take_count(&mut args, &["-n", "--limit"])?.unwrap_or(10);
    let filter = parse_filter(&args)?;
    let matches = engine.find(&filter, limit);
    if matches.is_empty() { println!("No chunks match."); }
    for (i, m) in matches.iter().enumerate() {
        let meta = m.chunk.metadata();
        println!("{}. {} (Page {}) [{} chars] {}", i + 1, meta.filename, meta.page, meta.chunk_length, m.chunk.id());
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let (verbose, cmd, args) = parse_args();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(if verbose { "info" } else { "warn" }));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).with_writer(io::stderr).init();

    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let settings = config.settings();
    let engine = RagEngine::from_settings(settings, &env::current_dir()?)?;
    let top_k = settings.retrieval.top_k;

    match cmd.as_str() {
        "ingest" => ingest(&engine, &args)?,
        "query" => query(&engine, args, top_k)?,
        "ask" => ask(&engine, args, top_k)?,
        "find" => find(&engine, args)?,
        "stats" => println!("{}", serde_json::to_string_pretty(&engine.stats())?),
        "clear" => { engine.clear()?; println!("🧹 Cleared collection '{}'", engine.index().collection()); }
        "delete" => { engine.index().delete()?; println!("🗑️  Deleted {}", engine.index().snapshot_path().display()); }
        _ => { eprintln!("Unknown command: {}\n\n{USAGE}", cmd); std::process::exit(1); }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn count_flag_is_removed_from_args() {
        let mut args = strings(&["what", "-k", "3", "is", "PPE"]);
        assert_eq!(take_count(&mut args, &["-k"]).expect("parse"), Some(3));
        assert_eq!(args, strings(&["what", "is", "PPE"]));
        assert_eq!(take_count(&mut args, &["-k"]).expect("parse"), None);
    }

    #[test]
    fn bad_counts_are_rejected() {
        assert!(take_count(&mut strings(&["q", "-k"]), &["-k"]).is_err());
        assert!(take_count(&mut strings(&["q", "-k", "many"]), &["-k"]).is_err());
        assert!(take_count(&mut strings(&["q", "-k", "0"]), &["-k"]).is_err());
    }

    #[test]
    fn filter_pairs_parse() {
        let filter = parse_filter(&strings(&["filename=safety.pdf", "page = 2"])).expect("filter");
        assert_eq!(filter.get("filename").map(String::as_str), Some("safety.pdf"));
        assert_eq!(filter.get("page").map(String::as_str), Some("2"));
        assert!(parse_filter(&strings(&["filename"])).is_err());
        assert!(parse_filter(&[]).is_err());
    }

    #[test]
    fn questions_are_validated() {
        assert_eq!(question(&strings(&["What", "PPE?"])).expect("valid"), "What PPE?");
        assert!(question(&strings(&["hi"])).is_err());
        assert!(question(&strings(&["<script>alert(1)</script>"])).is_err());
    }
}
