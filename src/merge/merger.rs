//! Chunk merger: reassembles streamed fragments into logical messages.

use std::collections::{BTreeMap, HashMap};

use super::types::{
    AccumulatedMessage, ChatCompletionChunk, FunctionCall, MergeEvent, MessageDelta, ToolCall,
    ToolCallDelta,
};
use crate::listener::{ListenerManager, Subscription};

/// Accumulation state for one choice slot.
///
/// Tool calls are kept in arrival order, with identity maps keyed by
/// explicit id and by positional index. Resolution is id-first with an
/// index alias, so an id-bearing first fragment joins the index-only
/// fragments that follow it, while deltas with different resolved
/// identities never share an entry.
#[derive(Debug, Default)]
struct ChoiceSlot {
    role: Option<String>,
    content: Option<String>,
    tool_calls: Vec<ToolCall>,
    by_id: HashMap<String, usize>,
    by_index: HashMap<u32, usize>,
    saw_tool_calls: bool,
}

impl ChoiceSlot {
    fn snapshot(&self) -> AccumulatedMessage {
        AccumulatedMessage {
            role: self.role.clone(),
            content: if self.saw_tool_calls {
                None
            } else {
                self.content.clone()
            },
            tool_calls: if self.tool_calls.is_empty() {
                None
            } else {
                Some(self.tool_calls.clone())
            },
        }
    }

    /// Merge one delta into the slot.
    ///
    /// Returns the text increment that was actually merged, if any, so the
    /// merger can publish it.
    fn merge(&mut self, delta: &MessageDelta) -> Option<String> {
        if let Some(role) = &delta.role {
            if self.role.is_none() {
                self.role = Some(role.clone());
            }
        }

        if let Some(calls) = &delta.tool_calls {
            if !calls.is_empty() && !self.saw_tool_calls {
                // one message is prose or tool invocations, never both
                self.saw_tool_calls = true;
                self.content = None;
            }
            for call in calls {
                self.merge_tool_call(call);
            }
        }

        if self.saw_tool_calls {
            return None;
        }
        if let Some(text) = &delta.content {
            self.content.get_or_insert_with(String::new).push_str(text);
            if !text.is_empty() {
                return Some(text.clone());
            }
        }
        None
    }

    fn merge_tool_call(&mut self, delta: &ToolCallDelta) {
        let entry = match self.resolve_call(delta) {
            Some(entry) => entry,
            None => {
                log::debug!("dropping tool-call delta with no resolvable identity");
                return;
            }
        };
        let call = &mut self.tool_calls[entry];
        if let Some(id) = &delta.id {
            call.id = id.clone();
        }
        if let Some(kind) = &delta.r#type {
            call.r#type = kind.clone();
        }
        if let Some(function) = &delta.function {
            // raw concatenation in arrival order, never replacement
            if let Some(name) = &function.name {
                call.function.name.push_str(name);
            }
            if let Some(arguments) = &function.arguments {
                call.function.arguments.push_str(arguments);
            }
        }
    }

    /// Resolve the accumulated entry a tool-call delta belongs to.
    ///
    /// Explicit id wins; positional index is the fallback when the
    /// provider omits the id on later fragments. Deltas that carry neither
    /// identity, or that would create an entry with no id and no function
    /// data, resolve to nothing and are dropped as protocol noise.
    fn resolve_call(&mut self, delta: &ToolCallDelta) -> Option<usize> {
        if let Some(id) = &delta.id {
            if let Some(&entry) = self.by_id.get(id) {
                if let Some(index) = delta.index {
                    self.by_index.entry(index).or_insert(entry);
                }
                return Some(entry);
            }
            // an id arriving late attaches to a call first seen by index,
            // but never to one already claimed by a different id
            if let Some(index) = delta.index {
                if let Some(&entry) = self.by_index.get(&index) {
                    if self.tool_calls[entry].id.is_empty() {
                        self.by_id.insert(id.clone(), entry);
                        return Some(entry);
                    }
                }
            }
            let entry = self.push_call();
            self.by_id.insert(id.clone(), entry);
            if let Some(index) = delta.index {
                self.by_index.entry(index).or_insert(entry);
            }
            return Some(entry);
        }

        if let Some(index) = delta.index {
            if let Some(&entry) = self.by_index.get(&index) {
                return Some(entry);
            }
            if delta.function.is_none() {
                return None;
            }
            let entry = self.push_call();
            self.by_index.insert(index, entry);
            return Some(entry);
        }

        None
    }

    fn push_call(&mut self) -> usize {
        self.tool_calls.push(ToolCall {
            id: String::new(),
            r#type: "function".to_string(),
            function: FunctionCall {
                name: String::new(),
                arguments: String::new(),
            },
        });
        self.tool_calls.len() - 1
    }
}

/// Stateful accumulator that reassembles a streamed completion.
///
/// An external transport reads protocol frames and calls
/// [`ingest`](Self::ingest) once per fragment, in delivery order; the
/// merger performs no I/O, no reordering, and no buffering of its own.
/// Correctness of tool-call and text reconstruction depends entirely on
/// the caller preserving arrival order.
#[derive(Debug, Default)]
pub struct ChunkMerger {
    history: Vec<ChatCompletionChunk>,
    slots: BTreeMap<u32, ChoiceSlot>,
    listeners: ListenerManager<MergeEvent>,
}

impl ChunkMerger {
    /// Create an empty merger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ingest one fragment.
    ///
    /// The first-ever call publishes [`MergeEvent::Started`], even for a
    /// fragment with no choices. Each non-empty text increment that gets
    /// merged publishes a [`MergeEvent::Text`]. Malformed or empty
    /// fragments are valid no-ops; ingestion never fails.
    pub fn ingest(&mut self, chunk: ChatCompletionChunk) {
        if self.history.is_empty() {
            self.listeners.notify_listeners(&MergeEvent::Started);
        }
        if chunk.choices.is_empty() {
            log::trace!("chunk carried no choices");
        }

        let mut increments = Vec::new();
        for choice in &chunk.choices {
            let slot = self.slots.entry(choice.index).or_default();
            if let Some(delta) = slot.merge(&choice.delta) {
                increments.push(delta);
            }
        }
        self.history.push(chunk);

        for delta in increments {
            self.listeners.notify_listeners(&MergeEvent::Text { delta });
        }
    }

    /// Ordered, read-only view of every fragment ingested so far.
    pub fn history(&self) -> &[ChatCompletionChunk] {
        &self.history
    }

    /// Current best-known reconstruction of every choice slot, in
    /// choice-index order.
    ///
    /// Intended for mid-stream rendering before the stream completes.
    pub fn accumulated_deltas(&self) -> Vec<AccumulatedMessage> {
        self.slots.values().map(ChoiceSlot::snapshot).collect()
    }

    /// Current reconstruction of the primary choice (index 0).
    pub fn message(&self) -> AccumulatedMessage {
        self.slots
            .get(&0)
            .map(ChoiceSlot::snapshot)
            .unwrap_or_default()
    }

    /// Assemble the final primary-choice message and publish
    /// [`MergeEvent::Finished`] carrying it.
    pub fn finish(&mut self) -> AccumulatedMessage {
        let message = self.message();
        self.listeners.notify_listeners(&MergeEvent::Finished {
            message: message.clone(),
        });
        message
    }

    /// Surface an upstream stream failure to subscribers as
    /// [`MergeEvent::Error`].
    ///
    /// Cancellation itself belongs to the transport; this merely relays
    /// the failure through the same notification channel consumers already
    /// watch.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.listeners.notify_listeners(&MergeEvent::Error {
            reason: reason.into(),
        });
    }

    /// Register a merge-progress listener.
    ///
    /// Cancel the returned [`Subscription`] to stop delivery; other
    /// subscribers are unaffected.
    pub fn subscribe<F>(&mut self, listener: F) -> Subscription
    where
        F: FnMut(&MergeEvent) + 'static,
    {
        self.listeners.add_listener(listener)
    }

    /// Merge an entire stream of fragments into a final message.
    ///
    /// Convenience driver for transports already shaped as a
    /// [`futures_util::Stream`]; chunks are ingested in stream order and
    /// the merger is finished once the stream ends.
    #[cfg(feature = "streaming")]
    pub async fn merge_stream<S, E>(mut stream: S) -> Result<AccumulatedMessage, E>
    where
        S: futures_util::Stream<Item = Result<ChatCompletionChunk, E>> + Unpin,
    {
        use futures_util::StreamExt;

        let mut merger = Self::new();
        while let Some(chunk) = stream.next().await {
            merger.ingest(chunk?);
        }
        Ok(merger.finish())
    }
}
