//! Bounded per-session message history with eviction and compression.
//!
//! A `MessageLog` accepts every `append`; memory hygiene (eviction of old
//! messages, compression of oversized content) runs behind it and is always
//! best-effort. Hygiene never rejects an append and never removes system or
//! user messages, nor anything in the most recent window.

use bon::Builder;
use tracing::debug;

use crate::types::{Message, MessageId, Role};

/// Marker inserted where compressed content was removed.
const COMPRESSION_MARKER: &str = "characters compressed";

/// Tuning knobs for log hygiene. Defaults match observable behavior; change
/// them only for tests.
#[derive(Debug, Clone, Builder)]
pub struct LogLimits {
    /// Eviction runs once the log grows past this.
    #[builder(default = 60)]
    pub cleanup_threshold: usize,
    /// Eviction removes candidates until the log is back at this size.
    #[builder(default = 50)]
    pub target_size: usize,
    /// The newest N messages are exempt from eviction and compression.
    #[builder(default = 10)]
    pub keep_recent: usize,
    /// Content at or below this many chars is never compressed.
    #[builder(default = 1000)]
    pub compress_trigger_chars: usize,
    /// Chars kept from the head of compressed content.
    #[builder(default = 300)]
    pub compress_head_chars: usize,
    /// Chars kept from the tail of compressed content.
    #[builder(default = 200)]
    pub compress_tail_chars: usize,
    /// Flat per-message overhead for the byte estimate.
    #[builder(default = 100)]
    pub fixed_overhead_bytes: usize,
}

impl Default for LogLimits {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Ordered message history for one session and one mode.
#[derive(Debug, Clone, Default)]
pub struct MessageLog {
    messages: Vec<Message>,
    limits: LogLimits,
}

impl MessageLog {
    pub fn new(limits: LogLimits) -> Self {
        Self {
            messages: Vec::new(),
            limits,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn limits(&self) -> &LogLimits {
        &self.limits
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == id)
    }

    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Remove a message by id, returning it if present.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let idx = self.messages.iter().position(|m| m.id == id)?;
        Some(self.messages.remove(idx))
    }

    /// Append a message. Never fails; runs eviction if the log has grown
    /// past the cleanup threshold.
    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
        if self.messages.len() > self.limits.cleanup_threshold {
            self.evict();
        }
    }

    /// Remove the oldest eviction candidates until the log is back at the
    /// target size. Candidates exclude system and user messages and the
    /// newest `keep_recent` messages. Returns the number removed.
    ///
    /// When anything was removed, a synthetic system message reporting the
    /// removal is inserted at position 0, and a compression pass runs over
    /// the surviving older messages.
    pub fn evict(&mut self) -> usize {
        self.evict_to(self.limits.target_size)
    }

    /// Like [`evict`](Self::evict), but toward an explicit target size.
    /// Used for forced eviction under memory pressure.
    pub fn evict_to(&mut self, target_size: usize) -> usize {
        let deficit = self.messages.len().saturating_sub(target_size);
        if deficit == 0 {
            return 0;
        }

        let protected_from = self.messages.len().saturating_sub(self.limits.keep_recent);
        let candidates: Vec<MessageId> = self.messages[..protected_from]
            .iter()
            .filter(|m| !matches!(m.role, Role::System | Role::User))
            .take(deficit)
            .map(|m| m.id)
            .collect();

        let removed = candidates.len();
        if removed == 0 {
            return 0;
        }
        self.messages
            .retain(|m| !candidates.contains(&m.id));

        debug!(removed, remaining = self.messages.len(), "evicted old messages");
        self.messages.insert(
            0,
            Message::system(format!(
                "Removed {removed} older message{} to conserve memory.",
                if removed == 1 { "" } else { "s" }
            )),
        );
        self.compress_pass();
        removed
    }

    /// Compress oversized content on every message older than the recent
    /// window. Idempotent; failures here must never escape, so the pass has
    /// no error path at all.
    pub fn compress_pass(&mut self) {
        let protected_from = self.messages.len().saturating_sub(self.limits.keep_recent);
        let limits = self.limits.clone();
        for message in &mut self.messages[..protected_from] {
            compress_message(message, &limits);
        }
    }

    /// Heuristic memory footprint in bytes. Accounting only, never used for
    /// correctness.
    pub fn estimated_bytes(&self) -> usize {
        self.messages
            .iter()
            .map(|m| 2 * m.content.len() + self.limits.fixed_overhead_bytes)
            .sum()
    }
}

/// Replace oversized content with a head/tail excerpt around a marker that
/// records how many characters were dropped. No-op for short or
/// already-compressed content.
fn compress_message(message: &mut Message, limits: &LogLimits) {
    if message.compressed {
        return;
    }
    let total = message.content.chars().count();
    // Below the trigger, or too short for the excerpt to actually drop
    // anything (possible with a trigger smaller than head + tail).
    if total <= limits.compress_trigger_chars
        || total <= limits.compress_head_chars + limits.compress_tail_chars
    {
        return;
    }

    let head: String = message.content.chars().take(limits.compress_head_chars).collect();
    let tail: String = {
        let skip = total.saturating_sub(limits.compress_tail_chars);
        message.content.chars().skip(skip).collect()
    };
    let removed = total - limits.compress_head_chars - limits.compress_tail_chars;

    message.content = format!("{head}\n[... {removed} {COMPRESSION_MARKER} ...]\n{tail}");
    message.compressed = true;
}
