//! Collaborator contracts consumed by the turn pipeline.
//!
//! Everything slow, fallible, or external sits behind one of these traits:
//! transcription, the language model, the post-processing filter, context
//! lookups, transcript persistence, and the provider-held recording store.
//! The pipeline never knows how any of them work.

use crate::error::PipelineError;
use async_trait::async_trait;
use switchboard_types::{Channel, TurnRole};

/// Audio bytes to text. Fallible; an empty transcription is a valid return
/// the pipeline treats as "couldn't understand".
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, audio: &[u8]) -> Result<String, PipelineError>;
}

/// The language-model turn. Slow (seconds) and fallible.
#[async_trait]
pub trait Assistant: Send + Sync {
    async fn reply(&self, prompt: &str) -> Result<String, PipelineError>;
}

/// Post-processing over the assistant output (memory-intent extraction).
/// May side-effect a durable store; returns the text to speak.
#[async_trait]
pub trait PostFilter: Send + Sync {
    async fn filter(&self, text: &str) -> Result<String, PipelineError>;
}

/// Auxiliary context for prompt building. Both lookups are best-effort:
/// failures degrade to empty context, never to a failed turn.
#[async_trait]
pub trait ContextSource: Send + Sync {
    /// Recent-relevance lookup for the current utterance.
    async fn relevant(&self, utterance: &str) -> Result<String, PipelineError>;

    /// Durable memory summary.
    async fn memory_summary(&self) -> Result<String, PipelineError>;
}

/// Durable conversation log. Append-only; failure is logged, not propagated.
#[async_trait]
pub trait TurnSink: Send + Sync {
    async fn persist_turn(
        &self,
        role: TurnRole,
        content: &str,
        channel: Channel,
    ) -> Result<(), PipelineError>;
}

/// Provider-held recordings: fetch for transcription, delete once consumed
/// so stored audio stops accruing cost.
#[async_trait]
pub trait RecordingStore: Send + Sync {
    async fn fetch_recording(&self, url: &str) -> Result<Vec<u8>, PipelineError>;

    async fn delete_recording(&self, recording_sid: &str) -> Result<(), PipelineError>;
}

/// Outbound call creation. Returns the provider-assigned call SID without
/// blocking on call completion.
#[async_trait]
pub trait CallLauncher: Send + Sync {
    async fn create_call(&self, to: Option<&str>, message: &str) -> Result<String, PipelineError>;
}

/// A [`ContextSource`] that always returns empty context. Used when no
/// context collaborators are wired up.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

#[async_trait]
impl ContextSource for NoContext {
    async fn relevant(&self, _utterance: &str) -> Result<String, PipelineError> {
        Ok(String::new())
    }

    async fn memory_summary(&self) -> Result<String, PipelineError> {
        Ok(String::new())
    }
}

/// A [`PostFilter`] that passes text through unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughFilter;

#[async_trait]
impl PostFilter for PassthroughFilter {
    async fn filter(&self, text: &str) -> Result<String, PipelineError> {
        Ok(text.to_string())
    }
}
