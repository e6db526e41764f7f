//! The asynchronous turn pipeline for the Switchboard voice bridge.
//!
//! One caller utterance flows through fetch → transcribe → intent check →
//! prompt → assistant → post-filter, and the result lands in the shared
//! [`switchboard_store::ResultRegistry`] for the provider's poll loop to
//! collect. All slow or external steps sit behind the collaborator traits
//! in [`traits`]; subprocess-backed defaults live in [`exec`].

pub mod error;
pub mod exec;
pub mod intent;
pub mod prompt;
pub mod runner;
pub mod traits;

pub use error::PipelineError;
pub use exec::{CommandAssistant, CommandTranscriber};
pub use intent::wants_hangup;
pub use prompt::build_prompt;
pub use runner::{
    run_turn, spawn_turn, TurnDeps, FALLBACK_COULDNT_HEAR, FALLBACK_COULDNT_UNDERSTAND,
    FALLBACK_HICCUP, FAREWELL_LINE,
};
pub use traits::{
    Assistant, CallLauncher, ContextSource, NoContext, PassthroughFilter, PostFilter,
    RecordingStore, Transcriber, TurnSink,
};
