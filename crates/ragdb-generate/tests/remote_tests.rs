use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use ragdb_core::config::GeneratorSettings;
use ragdb_core::error::Error;
use ragdb_core::traits::AnswerGenerator;
use ragdb_core::types::AnswerRequest;
use ragdb_generate::RemoteGenerator;

/// Serves exactly one HTTP response and hands back the raw request.
fn serve_once(status: &'static str, content_type: &'static str, body: String) -> (String, JoinHandle<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let base_url = format!("http://{}/openai/v1", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut raw = Vec::new();
        let mut buf = [0u8; 4096];
        let header_end = loop {
            let n = stream.read(&mut buf).expect("read");
            raw.extend_from_slice(&buf[..n]);
            if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos + 4;
            }
            assert!(n > 0, "client closed before headers");
        };
        let headers = String::from_utf8_lossy(&raw[..header_end]).to_ascii_lowercase();
        let length: usize = headers
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse().expect("length"))
            .unwrap_or(0);
        while raw.len() < header_end + length {
            let n = stream.read(&mut buf).expect("read body");
            if n == 0 { break; }
            raw.extend_from_slice(&buf[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write");
        String::from_utf8_lossy(&raw).into_owned()
    });
    (base_url, handle)
}

fn generator(base_url: String) -> RemoteGenerator {
    RemoteGenerator::new(&GeneratorSettings { api_key: "gsk_test".to_string(), base_url, timeout_secs: 10, ..Default::default() }).expect("generator")
}

fn request() -> AnswerRequest {
    AnswerRequest {
        question: "What PPE is required?".to_string(),
        context: "[Document 1: safety.pdf, Page 2]\nSafety protocols require PPE at all times.\n".to_string(),
        system_prompt: "Answer only from the context.".to_string(),
    }
}

#[test]
fn completion_content_is_returned_trimmed() {
    let body = serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": "  PPE is required at all times.\n" } }],
        "usage": { "prompt_tokens": 40, "completion_tokens": 8, "total_tokens": 48 }
    })
    .to_string();
    let (base_url, server) = serve_once("200 OK", "application/json", body);

    let answer = generator(base_url).generate(&request()).expect("answer");
    assert_eq!(answer, "PPE is required at all times.");

    let raw = server.join().expect("server");
    assert!(raw.starts_with("POST /openai/v1/chat/completions "));
    assert!(raw.to_ascii_lowercase().contains("authorization: bearer gsk_test"));
    assert!(raw.contains("Question: What PPE is required?"));
}

#[test]
fn empty_completion_is_a_generator_error() {
    let body = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] }).to_string();
    let (base_url, server) = serve_once("200 OK", "application/json", body);
    assert!(matches!(generator(base_url).generate(&request()), Err(Error::Generator(_))));
    server.join().expect("server");
}

#[test]
fn http_error_status_is_a_generator_error() {
    let (base_url, server) = serve_once("401 Unauthorized", "application/json", "{\"error\":\"bad key\"}".to_string());
    match generator(base_url).generate(&request()) {
        Err(Error::Generator(message)) => assert!(message.contains("401")),
        other => panic!("expected generator error, got {other:?}"),
    }
    server.join().expect("server");
}

#[test]
fn streamed_completion_yields_fragments() {
    let mut body = String::new();
    for piece in ["PPE ", "is ", "required."] {
        body.push_str(&format!("data: {}\n\n", serde_json::json!({ "choices": [{ "delta": { "content": piece } }] })));
    }
    body.push_str("data: [DONE]\n\n");
    let (base_url, server) = serve_once("200 OK", "text/event-stream", body);

    let stream = generator(base_url).generate_stream(&request()).expect("stream");
    let fragments: Vec<String> = stream.collect::<Result<_, _>>().expect("fragments");
    assert_eq!(fragments.concat(), "PPE is required.");

    let raw = server.join().expect("server");
    assert!(raw.contains("\"stream\":true"));
}
