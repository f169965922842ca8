//! Use the translation layer without a server or network.
//!
//! Usage:
//!   `cargo run --example translate_only`

use std::collections::HashMap;

use vertex_openai_proxy::translate::gemini::types::GeminiResponse;
use vertex_openai_proxy::translate::gemini::{self, GeminiOptions, GeminiReassembler};
use vertex_openai_proxy::translate::openai_types::{ChatCompletionRequest, ChatMessage, Role};
use vertex_openai_proxy::translate::Reassembler;

fn main() -> anyhow::Result<()> {
    let req = ChatCompletionRequest {
        model: "google/gemini-2.5-pro".to_string(),
        messages: vec![
            ChatMessage::new(Role::System, "You are a geography expert. Be concise."),
            ChatMessage::new(Role::User, "What is the capital of France?"),
            ChatMessage::new(Role::Assistant, "The capital of France is Paris."),
            ChatMessage::new(Role::User, "And Germany?"),
        ],
        temperature: Some(0.7),
        stream: Some(true),
        ..ChatCompletionRequest::default()
    };

    let body = gemini::build_request(&req, &HashMap::new(), GeminiOptions::default())?;

    println!("=== Gemini request ===");
    println!("{}", serde_json::to_string_pretty(&body)?);

    // What a non-streaming reply looks like after translation.
    let reply: GeminiResponse = serde_json::from_value(serde_json::json!({
        "candidates": [{
            "content": {"role": "model", "parts": [{"text": "Berlin."}]},
            "finishReason": "STOP"
        }],
        "usageMetadata": {"promptTokenCount": 31, "candidatesTokenCount": 2, "totalTokenCount": 33}
    }))?;
    let assembly = gemini::assemble(&reply, &req.model, body.text_chars());

    println!();
    println!("=== Chat completion ===");
    println!("{}", serde_json::to_string_pretty(&assembly.response)?);

    // The same reply streamed in two chunks, one of them a tool call.
    let chunks: Vec<GeminiResponse> = vec![
        serde_json::from_value(serde_json::json!({
            "candidates": [{"content": {"role": "model", "parts": [{"text": "Let me check. "}]}}]
        }))?,
        serde_json::from_value(serde_json::json!({
            "candidates": [{
                "content": {"role": "model", "parts": [{
                    "functionCall": {"name": "lookup_capital", "args": {"country": "Germany"}}
                }]},
                "finishReason": "STOP"
            }]
        }))?,
    ];

    let mut reassembler = GeminiReassembler::new(&req.model);
    println!();
    println!("=== Stream ===");
    for chunk in chunks {
        for event in reassembler.process(chunk) {
            println!("data: {}", event.sse_data());
        }
    }
    for event in reassembler.finish() {
        println!("data: {}", event.sse_data());
    }

    Ok(())
}
