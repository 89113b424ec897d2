//! Server-sent event parsing for streamed chat completions.
use std::io::{BufRead, Lines};

use serde::Deserialize;
use tracing::debug;

use ragdb_core::error::{Error, Result};

const DONE: &str = "[DONE]";

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

/// Content fragments from a `text/event-stream` body. Ends at `data: [DONE]`
/// or end of input; the first read or decode error is yielded once and ends
/// the stream.
pub struct SseFragments<R> {
    lines: Lines<R>,
    finished: bool,
}

impl<R: BufRead> SseFragments<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), finished: false }
    }

    fn fail(&mut self, message: String) -> Option<Result<String>> {
        self.finished = true;
        Some(Err(Error::Generator(message)))
    }
}

impl<R: BufRead> Iterator for SseFragments<R> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return self.fail(format!("stream read failed: {e}")),
            };
            let Some(data) = line.trim().strip_prefix("data:") else { continue };
            let data = data.trim_start();
            if data == DONE {
                debug!("answer stream finished");
                self.finished = true;
                return None;
            }
            let chunk: StreamChunk = match serde_json::from_str(data) {
                Ok(chunk) => chunk,
                Err(e) => return self.fail(format!("malformed stream event: {e}")),
            };
            let content = chunk.choices.into_iter().next().and_then(|c| c.delta.content).unwrap_or_default();
            if !content.is_empty() {
                return Some(Ok(content));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn event(content: &str) -> String {
        format!("data: {}\n\n", serde_json::json!({ "choices": [{ "delta": { "content": content } }] }))
    }

    #[test]
    fn fragments_concatenate_until_done() {
        let body = format!(
            ": keep-alive\n\n{}{}data: {{\"choices\":[{{\"delta\":{{\"role\":\"assistant\"}}}}]}}\n\n{}data: [DONE]\n\n{}",
            event("Wear "),
            event("hard hats"),
            event("."),
            event("ignored after done"),
        );
        let fragments: Vec<String> = SseFragments::new(Cursor::new(body)).collect::<Result<_>>().expect("fragments");
        assert_eq!(fragments, vec!["Wear ", "hard hats", "."]);
        assert_eq!(fragments.concat(), "Wear hard hats.");
    }

    #[test]
    fn missing_done_ends_at_eof() {
        let body = event("partial");
        let fragments: Vec<String> = SseFragments::new(Cursor::new(body)).filter_map(Result::ok).collect();
        assert_eq!(fragments, vec!["partial"]);
    }

    #[test]
    fn malformed_event_errors_once() {
        let body = format!("{}data: {{not json\n\n{}", event("ok"), event("never"));
        let items: Vec<Result<String>> = SseFragments::new(Cursor::new(body)).collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(matches!(items[1], Err(Error::Generator(_))));
    }
}
