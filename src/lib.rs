//! Seam - streaming chat reassembly
//!
//! This crate reconstructs complete logical messages from the incremental
//! fragments of a streaming chat-completion API. It handles free text
//! split mid-word as well as tool-call invocations whose names and
//! JSON-encoded arguments arrive in pieces, interleaved by call index,
//! across many fragments.
//!
//! ## Core Principles
//!
//! 1. **Order In, Order Out**: fragments are merged exactly in delivery
//!    order; the caller preserves arrival order, the merger never reorders.
//! 2. **Identity Separation**: tool-call deltas with different resolved
//!    identities (explicit id first, positional index as fallback) are
//!    never concatenated together.
//! 3. **Prose Xor Tool Calls**: once any tool-call data appears, the
//!    message's text content is treated as absent for good.
//! 4. **Never Throw On Protocol Noise**: malformed or empty fragments are
//!    skipped (and logged), not raised - a live stream favors robustness
//!    over strict validation.
//!
//! ## Components
//!
//! - [`ChunkMerger`]: stateful accumulator fed one [`ChatCompletionChunk`]
//!   per `ingest` call by an external transport.
//! - [`ListenerManager`]: synchronous publish/subscribe registry behind
//!   the merger's [`subscribe`](ChunkMerger::subscribe).
//! - [`StateMachine`]: generic state-transition engine for tracking agent
//!   progression (idle, running, paused, ...) above the merger.
//!
//! All components are single-threaded, synchronous, and cooperative; the
//! merger performs no I/O and never suspends.
//!
//! ## Usage
//!
//! ```rust
//! use seam::{ChatCompletionChunk, ChunkMerger, MergeEvent};
//!
//! let mut merger = ChunkMerger::new();
//! let _subscription = merger.subscribe(|event| {
//!     if let MergeEvent::Text { delta } = event {
//!         print!("{delta}");
//!     }
//! });
//!
//! for line in [
//!     r#"{"choices":[{"index":0,"delta":{"role":"assistant","content":""}}]}"#,
//!     r#"{"choices":[{"index":0,"delta":{"content":"Hello"}}]}"#,
//!     r#"{"choices":[{"index":0,"delta":{"content":"!"}}]}"#,
//! ] {
//!     let chunk: ChatCompletionChunk = serde_json::from_str(line).unwrap();
//!     merger.ingest(chunk);
//! }
//!
//! let message = merger.finish();
//! assert_eq!(message.content.as_deref(), Some("Hello!"));
//! assert!(message.tool_calls.is_none());
//! ```

// ============================================================================
// Listener Registry
// ============================================================================

pub mod listener;
pub use listener::{ListenerManager, Subscription};

// ============================================================================
// Delta Merging
// ============================================================================

pub mod merge;
pub use merge::{
    AccumulatedMessage, ChatCompletionChunk, ChunkChoice, ChunkMerger, FunctionCall,
    FunctionDelta, MergeEvent, MessageDelta, ToolCall, ToolCallDelta,
};

// ============================================================================
// State Tracking
// ============================================================================

pub mod machine;
pub use machine::{MachineContext, StateHooks, StateMachine};
