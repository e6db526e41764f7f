//! The asynchronous turn pipeline.
//!
//! One caller utterance in, one published [`TurnReply`] out. The pipeline is
//! fire-and-forget: the webhook handler spawns it detached and answers the
//! provider immediately, while the provider's poll loop waits for the result
//! to land in the registry.
//!
//! Every exit path publishes. A drop guard backstops panics and early
//! returns so the poll loop is never stranded on a permanently in-flight
//! slot.

use crate::error::PipelineError;
use crate::intent::wants_hangup;
use crate::prompt::build_prompt;
use crate::traits::{
    Assistant, ContextSource, PostFilter, RecordingStore, Transcriber, TurnSink,
};
use std::sync::Arc;
use std::time::Duration;
use switchboard_store::{ResultRegistry, TurnReply};
use switchboard_types::{Channel, TurnRole};

/// Spoken when the recording could not be fetched from the provider.
pub const FALLBACK_COULDNT_HEAR: &str =
    "Sorry, I couldn't hear that. Could you say it again?";

/// Spoken when transcription failed or came back empty.
pub const FALLBACK_COULDNT_UNDERSTAND: &str =
    "Sorry, I couldn't quite understand that. Could you say it again?";

/// Spoken when anything downstream of transcription failed.
pub const FALLBACK_HICCUP: &str =
    "I had a hiccup processing that. Could you say it again?";

/// Spoken (and persisted) when the caller says goodbye.
pub const FAREWELL_LINE: &str = "Alright, goodbye! Talk to you soon.";

/// Everything the pipeline needs for one turn. Cheap to clone; all
/// collaborators are shared.
#[derive(Clone)]
pub struct TurnDeps {
    pub transcriber: Arc<dyn Transcriber>,
    pub assistant: Arc<dyn Assistant>,
    pub post_filter: Arc<dyn PostFilter>,
    pub context: Arc<dyn ContextSource>,
    pub sink: Arc<dyn TurnSink>,
    pub recordings: Arc<dyn RecordingStore>,
    pub registry: ResultRegistry,
    /// Wait before fetching the recording; the provider needs a moment to
    /// make it available after the webhook fires.
    pub grace: Duration,
}

/// Spawns the turn pipeline as a detached task. The caller must already
/// have claimed the registry slot via [`ResultRegistry::begin`].
pub fn spawn_turn(deps: TurnDeps, call_sid: String, recording_url: String, recording_sid: String) {
    tokio::spawn(run_turn(deps, call_sid, recording_url, recording_sid));
}

/// Publishes a fallback on drop unless a real result was published first.
/// Runs during unwinding too, so a panicking collaborator still resolves
/// the slot.
struct PublishGuard {
    registry: ResultRegistry,
    call_sid: String,
    published: bool,
}

impl PublishGuard {
    fn new(registry: ResultRegistry, call_sid: String) -> Self {
        Self {
            registry,
            call_sid,
            published: false,
        }
    }

    fn publish(mut self, reply: TurnReply) {
        if !self.registry.publish(&self.call_sid, reply) {
            tracing::debug!(
                call_sid = %self.call_sid,
                "turn result discarded, call already torn down"
            );
        }
        self.published = true;
    }
}

impl Drop for PublishGuard {
    fn drop(&mut self) {
        if !self.published {
            tracing::error!(
                call_sid = %self.call_sid,
                "turn pipeline exited without publishing, emitting fallback"
            );
            self.registry
                .publish(&self.call_sid, TurnReply::line(FALLBACK_HICCUP));
        }
    }
}

/// Runs one conversational turn end to end.
pub async fn run_turn(
    deps: TurnDeps,
    call_sid: String,
    recording_url: String,
    recording_sid: String,
) {
    let guard = PublishGuard::new(deps.registry.clone(), call_sid.clone());

    tokio::time::sleep(deps.grace).await;

    let audio = match deps.recordings.fetch_recording(&recording_url).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, error = %e, "recording fetch failed");
            guard.publish(TurnReply::line(FALLBACK_COULDNT_HEAR));
            return;
        }
    };

    let utterance = match deps.transcriber.transcribe(&audio).await {
        Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(_) => {
            tracing::info!(call_sid = %call_sid, "empty transcription");
            guard.publish(TurnReply::line(FALLBACK_COULDNT_UNDERSTAND));
            return;
        }
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, error = %e, "transcription failed");
            guard.publish(TurnReply::line(FALLBACK_COULDNT_UNDERSTAND));
            return;
        }
    };

    tracing::info!(call_sid = %call_sid, utterance = %utterance, "caller utterance transcribed");
    persist_best_effort(&deps, &call_sid, TurnRole::Caller, &utterance).await;

    if wants_hangup(&utterance) {
        persist_best_effort(&deps, &call_sid, TurnRole::System, FAREWELL_LINE).await;
        schedule_recording_deletion(&deps, &call_sid, &recording_sid);
        guard.publish(TurnReply::farewell(FAREWELL_LINE));
        return;
    }

    let relevant = match deps.context.relevant(&utterance).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, error = %e, "relevance lookup failed");
            String::new()
        }
    };
    let memory = match deps.context.memory_summary().await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, error = %e, "memory summary lookup failed");
            String::new()
        }
    };

    let prompt = build_prompt(&utterance, Channel::Voice, &relevant, &memory);

    let raw_reply = match deps.assistant.reply(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            tracing::error!(call_sid = %call_sid, error = %e, "assistant invocation failed");
            guard.publish(TurnReply::line(FALLBACK_HICCUP));
            return;
        }
    };

    let spoken = match deps.post_filter.filter(&raw_reply).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!(call_sid = %call_sid, error = %e, "post filter failed, using raw reply");
            raw_reply
        }
    };

    persist_best_effort(&deps, &call_sid, TurnRole::Assistant, &spoken).await;
    schedule_recording_deletion(&deps, &call_sid, &recording_sid);
    guard.publish(TurnReply::line(spoken));
}

async fn persist_best_effort(deps: &TurnDeps, call_sid: &str, role: TurnRole, content: &str) {
    if let Err(e) = deps.sink.persist_turn(role, content, Channel::Voice).await {
        tracing::warn!(call_sid, error = %e, "failed to persist transcript turn");
    }
}

/// Deletes the provider-held recording in a detached best-effort task.
fn schedule_recording_deletion(deps: &TurnDeps, call_sid: &str, recording_sid: &str) {
    let recordings = Arc::clone(&deps.recordings);
    let call_sid = call_sid.to_string();
    let recording_sid = recording_sid.to_string();
    tokio::spawn(async move {
        match recordings.delete_recording(&recording_sid).await {
            Ok(()) => {
                tracing::debug!(call_sid = %call_sid, recording_sid = %recording_sid, "recording deleted");
            }
            Err(e) => {
                tracing::warn!(
                    call_sid = %call_sid,
                    recording_sid = %recording_sid,
                    error = %e,
                    "failed to delete provider recording"
                );
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedTranscriber(&'static str);

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingTranscriber;

    #[async_trait]
    impl Transcriber for FailingTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String, PipelineError> {
            Err(PipelineError::Transcription("model exploded".into()))
        }
    }

    struct PanickingTranscriber;

    #[async_trait]
    impl Transcriber for PanickingTranscriber {
        async fn transcribe(&self, _audio: &[u8]) -> Result<String, PipelineError> {
            panic!("transcriber crashed");
        }
    }

    struct FixedAssistant(&'static str);

    #[async_trait]
    impl Assistant for FixedAssistant {
        async fn reply(&self, _prompt: &str) -> Result<String, PipelineError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingAssistant;

    #[async_trait]
    impl Assistant for FailingAssistant {
        async fn reply(&self, _prompt: &str) -> Result<String, PipelineError> {
            Err(PipelineError::Assistant("model timed out".into()))
        }
    }

    struct FailingFilter;

    #[async_trait]
    impl PostFilter for FailingFilter {
        async fn filter(&self, _text: &str) -> Result<String, PipelineError> {
            Err(PipelineError::Assistant("filter store unavailable".into()))
        }
    }

    #[derive(Default)]
    struct MemorySink {
        turns: Mutex<Vec<(TurnRole, String)>>,
    }

    #[async_trait]
    impl TurnSink for MemorySink {
        async fn persist_turn(
            &self,
            role: TurnRole,
            content: &str,
            _channel: Channel,
        ) -> Result<(), PipelineError> {
            self.turns
                .lock()
                .unwrap()
                .push((role, content.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeRecordings {
        deleted: Mutex<Vec<String>>,
        fail_fetch: bool,
    }

    #[async_trait]
    impl RecordingStore for FakeRecordings {
        async fn fetch_recording(&self, _url: &str) -> Result<Vec<u8>, PipelineError> {
            if self.fail_fetch {
                Err(PipelineError::Recording("404".into()))
            } else {
                Ok(vec![0u8; 16])
            }
        }

        async fn delete_recording(&self, recording_sid: &str) -> Result<(), PipelineError> {
            self.deleted.lock().unwrap().push(recording_sid.to_string());
            Ok(())
        }
    }

    struct Fixture {
        deps: TurnDeps,
        sink: Arc<MemorySink>,
        recordings: Arc<FakeRecordings>,
    }

    fn fixture(transcriber: Arc<dyn Transcriber>, assistant: Arc<dyn Assistant>) -> Fixture {
        let sink = Arc::new(MemorySink::default());
        let recordings = Arc::new(FakeRecordings::default());
        let deps = TurnDeps {
            transcriber,
            assistant,
            post_filter: Arc::new(crate::traits::PassthroughFilter),
            context: Arc::new(crate::traits::NoContext),
            sink: sink.clone(),
            recordings: recordings.clone(),
            registry: ResultRegistry::new(),
            grace: Duration::ZERO,
        };
        Fixture {
            deps,
            sink,
            recordings,
        }
    }

    async fn run(fx: &Fixture) {
        assert!(fx.deps.registry.begin("CA1"));
        run_turn(
            fx.deps.clone(),
            "CA1".into(),
            "https://recordings.test/RE1".into(),
            "RE1".into(),
        )
        .await;
        // Recording deletion is a detached task; give it a moment.
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn happy_path_publishes_assistant_reply() {
        let fx = fixture(
            Arc::new(FixedTranscriber("what's the weather like")),
            Arc::new(FixedAssistant("Sunny all day.")),
        );
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line("Sunny all day."));

        let turns = fx.sink.turns.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], (TurnRole::Caller, "what's the weather like".into()));
        assert_eq!(turns[1], (TurnRole::Assistant, "Sunny all day.".into()));

        assert_eq!(*fx.recordings.deleted.lock().unwrap(), vec!["RE1"]);
    }

    #[tokio::test]
    async fn goodbye_publishes_terminal_farewell() {
        let fx = fixture(
            Arc::new(FixedTranscriber("okay bye")),
            Arc::new(FixedAssistant("should never be called")),
        );
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert!(reply.terminal);
        assert_eq!(reply.text, FAREWELL_LINE);

        // Caller turn plus the farewell; no assistant invocation.
        let turns = fx.sink.turns.lock().unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1], (TurnRole::System, FAREWELL_LINE.into()));

        assert_eq!(*fx.recordings.deleted.lock().unwrap(), vec!["RE1"]);
    }

    #[tokio::test]
    async fn empty_transcription_publishes_couldnt_understand() {
        let fx = fixture(
            Arc::new(FixedTranscriber("   ")),
            Arc::new(FixedAssistant("unused")),
        );
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line(FALLBACK_COULDNT_UNDERSTAND));
        assert!(fx.sink.turns.lock().unwrap().is_empty());
        // Recording survives for a retry of the turn.
        assert!(fx.recordings.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transcription_error_publishes_couldnt_understand() {
        let fx = fixture(
            Arc::new(FailingTranscriber),
            Arc::new(FixedAssistant("unused")),
        );
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line(FALLBACK_COULDNT_UNDERSTAND));
    }

    #[tokio::test]
    async fn fetch_failure_publishes_couldnt_hear() {
        let sink = Arc::new(MemorySink::default());
        let recordings = Arc::new(FakeRecordings {
            fail_fetch: true,
            ..Default::default()
        });
        let deps = TurnDeps {
            transcriber: Arc::new(FixedTranscriber("unused")),
            assistant: Arc::new(FixedAssistant("unused")),
            post_filter: Arc::new(crate::traits::PassthroughFilter),
            context: Arc::new(crate::traits::NoContext),
            sink,
            recordings,
            registry: ResultRegistry::new(),
            grace: Duration::ZERO,
        };
        assert!(deps.registry.begin("CA1"));
        run_turn(deps.clone(), "CA1".into(), "u".into(), "RE1".into()).await;

        let reply = deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line(FALLBACK_COULDNT_HEAR));
    }

    #[tokio::test]
    async fn assistant_failure_publishes_hiccup() {
        let fx = fixture(
            Arc::new(FixedTranscriber("tell me a story")),
            Arc::new(FailingAssistant),
        );
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line(FALLBACK_HICCUP));
        assert!(!reply.terminal, "hiccup must not end the call");
    }

    #[tokio::test]
    async fn post_filter_failure_falls_back_to_raw_reply() {
        let mut fx = fixture(
            Arc::new(FixedTranscriber("hello there")),
            Arc::new(FixedAssistant("General greeting.")),
        );
        fx.deps.post_filter = Arc::new(FailingFilter);
        run(&fx).await;

        let reply = fx.deps.registry.take_ready("CA1").expect("result ready");
        assert_eq!(reply, TurnReply::line("General greeting."));
    }

    #[tokio::test]
    async fn panic_still_publishes_fallback() {
        let fx = fixture(
            Arc::new(PanickingTranscriber),
            Arc::new(FixedAssistant("unused")),
        );
        assert!(fx.deps.registry.begin("CA1"));

        let handle = tokio::spawn(run_turn(
            fx.deps.clone(),
            "CA1".into(),
            "u".into(),
            "RE1".into(),
        ));
        assert!(handle.await.is_err(), "task should have panicked");

        let reply = fx.deps.registry.take_ready("CA1").expect("guard published");
        assert_eq!(reply, TurnReply::line(FALLBACK_HICCUP));
    }

    #[tokio::test]
    async fn late_publish_after_teardown_is_dropped() {
        let fx = fixture(
            Arc::new(FixedTranscriber("hello")),
            Arc::new(FixedAssistant("hi")),
        );
        assert!(fx.deps.registry.begin("CA1"));
        // Call torn down (status callback) while the pipeline runs.
        fx.deps.registry.remove("CA1");

        run_turn(fx.deps.clone(), "CA1".into(), "u".into(), "RE1".into()).await;
        assert!(fx.deps.registry.is_empty(), "late write must not resurrect the slot");
    }
}
