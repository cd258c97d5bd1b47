//! Delta merging for streaming chat completions.
//!
//! A streaming completion API delivers one logical message as many small
//! fragments: free text split mid-word, tool-call names and JSON argument
//! strings split across fragments and interleaved by call index. The
//! [`ChunkMerger`] consumes those fragments in delivery order and
//! reconstructs the complete message, publishing merge-progress events as
//! content is discovered.
//!
//! The single most safety-critical invariant here is identity separation:
//! tool-call deltas with different resolved identities (explicit id first,
//! positional index as fallback) are never concatenated together, however
//! interleaved they arrive.

mod merger;
mod types;

pub use merger::ChunkMerger;
pub use types::{
    AccumulatedMessage, ChatCompletionChunk, ChunkChoice, FunctionCall, FunctionDelta, MergeEvent,
    MessageDelta, ToolCall, ToolCallDelta,
};

#[cfg(test)]
mod tests;
