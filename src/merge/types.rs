//! Wire and accumulated types for streamed chat completions.
//!
//! The wire types mirror the OpenAI-compatible `chat.completion.chunk`
//! JSON shape: every field the provider may omit mid-stream is optional or
//! defaulted, so any fragment of a live stream deserializes without error.

use serde::{Deserialize, Serialize};

/// One incremental update from the completion provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatCompletionChunk {
    /// Provider-assigned completion id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Model that produced the chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Parallel completion choices; empty lists are valid no-ops
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A single completion choice within a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChunkChoice {
    /// Position of this choice, stable across the whole stream
    #[serde(default)]
    pub index: u32,
    /// What changed for this choice's in-progress message
    #[serde(default)]
    pub delta: MessageDelta,
    /// Reason the provider stopped, present on the closing chunk
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

/// Partial payload describing what changed for one in-progress message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageDelta {
    /// Message role, typically present only on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Text increment to append to the message so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Partial tool invocations carried by this fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Partial description of one tool invocation.
///
/// A delta is attributed to a logical call by its explicit `id` when
/// present, falling back to the positional `index` (stable for the
/// lifetime of the call) when the provider omits the id on later
/// fragments.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Positional identity within the message
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
    /// Explicit identity, usually present only on the first fragment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Invocation kind, usually "function"
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub r#type: Option<String>,
    /// Name/arguments fragments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionDelta>,
}

/// Name and argument fragments for a function-typed tool call.
///
/// Both fields arrive in pieces and are concatenated verbatim, in arrival
/// order, by the merger.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionDelta {
    /// Fragment of the function name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fragment of the JSON-encoded argument string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// Function call structure for a fully reconstructed tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /// Full function name
    pub name: String,
    /// Full JSON-encoded argument string
    pub arguments: String,
}

/// A fully reconstructed tool call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Provider-assigned call id
    pub id: String,
    /// Invocation kind, "function" unless the provider said otherwise
    #[serde(rename = "type")]
    pub r#type: String,
    /// Reconstructed name and arguments
    pub function: FunctionCall,
}

impl ToolCall {
    /// Parse the accumulated `arguments` string as JSON.
    ///
    /// The merger guarantees byte-accurate concatenation, not JSON
    /// validity: before the stream completes, a parse failure means the
    /// call is not yet fully assembled, not that the stream is corrupt.
    pub fn parse_arguments(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.function.arguments)
    }
}

/// The fully reconstructed logical message for one choice.
///
/// `content: None` is the explicit "no text" marker: it is the permanent
/// state of any message in which tool-call data ever appeared. Likewise
/// `tool_calls: None` means no call was ever recorded, never an empty
/// list - one message is prose or tool invocations, not a confirmed mix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccumulatedMessage {
    /// Message role, set once from the first fragment that carried it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Concatenated text, absent once any tool call was seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Reconstructed tool calls in arrival order, absent when none
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

/// Merge-progress event published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeEvent {
    /// The first fragment was ingested; streaming has begun.
    ///
    /// Fired unconditionally, even when that fragment carried no choices.
    Started,
    /// A non-empty text increment was merged.
    Text {
        /// The latest increment, exactly as it arrived
        delta: String,
    },
    /// The final message was assembled.
    Finished {
        /// Reconstructed message for the primary choice
        message: AccumulatedMessage,
    },
    /// The transport reported a stream failure.
    Error {
        /// Failure description from the transport
        reason: String,
    },
}
