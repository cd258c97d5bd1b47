//! Tests for the chunk merger

use super::*;
use std::cell::RefCell;
use std::rc::Rc;

fn text_chunk(content: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        choices: vec![ChunkChoice {
            delta: MessageDelta {
                content: Some(content.to_string()),
                ..MessageDelta::default()
            },
            ..ChunkChoice::default()
        }],
        ..ChatCompletionChunk::default()
    }
}

fn opening_chunk(role: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        choices: vec![ChunkChoice {
            delta: MessageDelta {
                role: Some(role.to_string()),
                content: Some(String::new()),
                ..MessageDelta::default()
            },
            ..ChunkChoice::default()
        }],
        ..ChatCompletionChunk::default()
    }
}

fn tool_chunk(
    index: Option<u32>,
    id: Option<&str>,
    name: Option<&str>,
    arguments: Option<&str>,
) -> ChatCompletionChunk {
    let function = if name.is_some() || arguments.is_some() {
        Some(FunctionDelta {
            name: name.map(str::to_string),
            arguments: arguments.map(str::to_string),
        })
    } else {
        None
    };
    ChatCompletionChunk {
        choices: vec![ChunkChoice {
            delta: MessageDelta {
                tool_calls: Some(vec![ToolCallDelta {
                    index,
                    id: id.map(str::to_string),
                    r#type: id.map(|_| "function".to_string()),
                    function,
                }]),
                ..MessageDelta::default()
            },
            ..ChunkChoice::default()
        }],
        ..ChatCompletionChunk::default()
    }
}

#[test]
fn test_text_reassembly() {
    let mut merger = ChunkMerger::new();
    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("Hello"));
    merger.ingest(text_chunk("!"));

    let message = merger.finish();
    assert_eq!(message.role.as_deref(), Some("assistant"));
    assert_eq!(message.content.as_deref(), Some("Hello!"));
    assert!(message.tool_calls.is_none());
}

#[test]
fn test_text_concatenates_verbatim() {
    let mut merger = ChunkMerger::new();
    merger.ingest(text_chunk("no "));
    merger.ingest(text_chunk(" trimming"));
    merger.ingest(text_chunk("\n"));

    assert_eq!(merger.message().content.as_deref(), Some("no  trimming\n"));
}

#[test]
fn test_started_event_fires_once_even_for_empty_chunk() {
    let starts = Rc::new(RefCell::new(0u32));
    let mut merger = ChunkMerger::new();

    let counter = Rc::clone(&starts);
    let _sub = merger.subscribe(move |event| {
        if matches!(event, MergeEvent::Started) {
            *counter.borrow_mut() += 1;
        }
    });

    merger.ingest(ChatCompletionChunk::default());
    merger.ingest(text_chunk("hi"));
    merger.ingest(text_chunk("!"));

    assert_eq!(*starts.borrow(), 1);
}

#[test]
fn test_text_events_carry_each_increment() {
    let deltas = Rc::new(RefCell::new(Vec::new()));
    let mut merger = ChunkMerger::new();

    let sink = Rc::clone(&deltas);
    let _sub = merger.subscribe(move |event| {
        if let MergeEvent::Text { delta } = event {
            sink.borrow_mut().push(delta.clone());
        }
    });

    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("Hello"));
    merger.ingest(text_chunk("!"));

    // the opening chunk's empty string is merged but not published
    assert_eq!(*deltas.borrow(), vec!["Hello".to_string(), "!".to_string()]);
}

#[test]
fn test_tool_call_fragments_concatenate() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(Some(0), Some("call_123"), Some("search"), None));
    merger.ingest(tool_chunk(Some(0), None, Some("_file"), Some("{\"pat")));
    merger.ingest(tool_chunk(Some(0), None, None, Some("tern\": \"test\"}")));

    let message = merger.finish();
    let calls = message.tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_123");
    assert_eq!(calls[0].r#type, "function");
    assert_eq!(calls[0].function.name, "search_file");
    assert_eq!(calls[0].function.arguments, "{\"pattern\": \"test\"}");
}

#[test]
fn test_interleaved_indexes_stay_independent() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(Some(0), Some("call_a"), Some("alpha"), Some("{\"a\":")));
    merger.ingest(tool_chunk(Some(1), Some("call_b"), Some("beta"), Some("{\"b\":2}")));
    merger.ingest(tool_chunk(Some(0), None, None, Some("1}")));

    let message = merger.finish();
    let calls = message.tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].function.arguments, "{\"a\":1}");
    assert_eq!(calls[1].function.arguments, "{\"b\":2}");
}

#[test]
fn test_tool_calls_void_text_content() {
    let mut merger = ChunkMerger::new();
    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("Thinking..."));
    merger.ingest(tool_chunk(Some(0), Some("call_1"), Some("open"), Some("{}")));
    // text arriving after tool-call data is discarded as well
    merger.ingest(text_chunk("stray"));

    let message = merger.finish();
    assert!(message.content.is_none());
    assert_eq!(message.tool_calls.expect("tool calls recorded").len(), 1);
}

#[test]
fn test_mixed_delta_prefers_tool_calls() {
    let mut chunk = tool_chunk(Some(0), Some("call_1"), Some("open"), Some("{}"));
    chunk.choices[0].delta.content = Some("prose".to_string());

    let mut merger = ChunkMerger::new();
    merger.ingest(chunk);

    let message = merger.finish();
    assert!(message.content.is_none());
    assert!(message.tool_calls.is_some());
}

#[test]
fn test_noise_tool_call_dropped() {
    let mut merger = ChunkMerger::new();
    // index only, no id, no function data
    merger.ingest(tool_chunk(Some(0), None, None, None));

    let message = merger.finish();
    assert!(message.tool_calls.is_none());
    // the noise still voids text for this message
    assert!(message.content.is_none());
}

#[test]
fn test_id_first_fragment_joins_index_only_fragments() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(Some(2), Some("call_9"), Some("classify"), None));
    merger.ingest(tool_chunk(Some(2), None, None, Some("{\"kind\":\"bug\"}")));

    let calls = merger.finish().tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_9");
    assert_eq!(calls[0].function.arguments, "{\"kind\":\"bug\"}");
}

#[test]
fn test_distinct_ids_never_share_an_entry() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(Some(0), Some("call_x"), Some("one"), Some("{}")));
    // protocol-violating reuse of index 0 under a new id starts a new call
    merger.ingest(tool_chunk(Some(0), Some("call_y"), Some("two"), Some("{}")));

    let calls = merger.finish().tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].id, "call_x");
    assert_eq!(calls[1].id, "call_y");
}

#[test]
fn test_id_without_index_creates_entry_with_defaults() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(None, Some("call_5"), None, None));

    let calls = merger.finish().tool_calls.expect("tool calls recorded");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].id, "call_5");
    assert_eq!(calls[0].r#type, "function");
    assert_eq!(calls[0].function.name, "");
    assert_eq!(calls[0].function.arguments, "");
}

#[test]
fn test_empty_chunk_is_a_noop() {
    let mut merger = ChunkMerger::new();
    merger.ingest(ChatCompletionChunk::default());

    assert_eq!(merger.history().len(), 1);
    assert!(merger.accumulated_deltas().is_empty());
    assert_eq!(merger.message(), AccumulatedMessage::default());
}

#[test]
fn test_history_preserves_arrival_order() {
    let mut merger = ChunkMerger::new();
    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("Hello"));
    merger.ingest(text_chunk("!"));

    let history = merger.history();
    assert_eq!(history.len(), 3);
    assert_eq!(history[1].choices[0].delta.content.as_deref(), Some("Hello"));
    assert_eq!(history[2].choices[0].delta.content.as_deref(), Some("!"));
}

#[test]
fn test_accumulated_deltas_mid_stream() {
    let mut merger = ChunkMerger::new();
    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("Hel"));

    let deltas = merger.accumulated_deltas();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].role.as_deref(), Some("assistant"));
    assert_eq!(deltas[0].content.as_deref(), Some("Hel"));
}

#[test]
fn test_parallel_choices_get_separate_slots() {
    let chunk = ChatCompletionChunk {
        choices: vec![
            ChunkChoice {
                index: 0,
                delta: MessageDelta {
                    content: Some("first".to_string()),
                    ..MessageDelta::default()
                },
                ..ChunkChoice::default()
            },
            ChunkChoice {
                index: 1,
                delta: MessageDelta {
                    content: Some("second".to_string()),
                    ..MessageDelta::default()
                },
                ..ChunkChoice::default()
            },
        ],
        ..ChatCompletionChunk::default()
    };

    let mut merger = ChunkMerger::new();
    merger.ingest(chunk);

    let deltas = merger.accumulated_deltas();
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0].content.as_deref(), Some("first"));
    assert_eq!(deltas[1].content.as_deref(), Some("second"));
    // the primary-choice message is choice 0
    assert_eq!(merger.message().content.as_deref(), Some("first"));
}

#[test]
fn test_unsubscribe_stops_delivery() {
    let counts = Rc::new(RefCell::new((0u32, 0u32)));
    let mut merger = ChunkMerger::new();

    let left = Rc::clone(&counts);
    let sub = merger.subscribe(move |_event| left.borrow_mut().0 += 1);
    let right = Rc::clone(&counts);
    let _kept = merger.subscribe(move |_event| right.borrow_mut().1 += 1);

    merger.ingest(text_chunk("a"));
    sub.cancel();
    merger.ingest(text_chunk("b"));

    // first ingest publishes Started + Text; the cancelled listener saw
    // only those two, the surviving one saw the second Text as well
    assert_eq!(*counts.borrow(), (2, 3));
}

#[test]
fn test_finish_publishes_final_message() {
    let finished = Rc::new(RefCell::new(None));
    let mut merger = ChunkMerger::new();

    let sink = Rc::clone(&finished);
    let _sub = merger.subscribe(move |event| {
        if let MergeEvent::Finished { message } = event {
            *sink.borrow_mut() = Some(message.clone());
        }
    });

    merger.ingest(opening_chunk("assistant"));
    merger.ingest(text_chunk("done"));
    let returned = merger.finish();

    assert_eq!(finished.borrow().as_ref(), Some(&returned));
    assert_eq!(returned.content.as_deref(), Some("done"));
}

#[test]
fn test_fail_publishes_error() {
    let reasons = Rc::new(RefCell::new(Vec::new()));
    let mut merger = ChunkMerger::new();

    let sink = Rc::clone(&reasons);
    let _sub = merger.subscribe(move |event| {
        if let MergeEvent::Error { reason } = event {
            sink.borrow_mut().push(reason.clone());
        }
    });

    merger.fail("connection reset");
    assert_eq!(*reasons.borrow(), vec!["connection reset".to_string()]);
}

#[test]
fn test_chunk_deserializes_from_provider_json() {
    let line = r#"{
        "id": "chatcmpl-42",
        "object": "chat.completion.chunk",
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "delta": {
                "tool_calls": [{
                    "index": 0,
                    "id": "call_abc",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": "{\"city\":"}
                }]
            },
            "finish_reason": null
        }]
    }"#;

    let chunk: ChatCompletionChunk = serde_json::from_str(line).unwrap();
    assert_eq!(chunk.id.as_deref(), Some("chatcmpl-42"));

    let mut merger = ChunkMerger::new();
    merger.ingest(chunk);
    merger.ingest(tool_chunk(Some(0), None, None, Some("\"Oslo\"}")));

    let calls = merger.finish().tool_calls.expect("tool calls recorded");
    assert_eq!(calls[0].function.name, "get_weather");
    assert_eq!(calls[0].function.arguments, "{\"city\":\"Oslo\"}");
}

#[test]
fn test_parse_arguments_defers_json_validation() {
    let mut merger = ChunkMerger::new();
    merger.ingest(tool_chunk(Some(0), Some("call_1"), Some("open"), Some("{\"path\":")));

    // mid-stream the concatenation is not yet valid JSON
    let partial = merger.message().tool_calls.expect("tool calls recorded");
    assert!(partial[0].parse_arguments().is_err());

    merger.ingest(tool_chunk(Some(0), None, None, Some("\"a.rs\"}")));
    let calls = merger.finish().tool_calls.expect("tool calls recorded");
    let value = calls[0].parse_arguments().unwrap();
    assert_eq!(value["path"], "a.rs");
}
