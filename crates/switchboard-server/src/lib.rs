//! Switchboard server library logic.
//!
//! Wires the webhook routes to the shared per-call state and the detached
//! turn pipeline. Each inbound webhook is handled concurrently; call SID is
//! the sharding key for all per-call state.

pub mod api_calls;
pub mod api_voice;
pub mod background;
pub mod config;

use axum::{
    routing::{get, post},
    Extension, Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use switchboard_pipeline::{
    Assistant, CallLauncher, ContextSource, PostFilter, RecordingStore, Transcriber, TurnDeps,
    TurnSink,
};
use switchboard_store::{ResultRegistry, SessionStore};
use tower_http::trace::TraceLayer;

/// Caller-facing lines that are not worth configuring.
pub mod lines {
    /// Spoken to an unrecognized caller before hanging up.
    pub const REJECTION: &str = "Sorry, this number is private. Goodbye.";
    /// Spoken when a recording-ready webhook carries no recording URL.
    pub const MISSING_RECORDING: &str = "Sorry, I didn't catch that. Goodbye for now.";
    /// Fallback prompt after a recording that never started.
    pub const REPROMPT: &str = "Are you still there? Say something, or hang up when you're done.";
}

/// Spoken-voice, recording, and authorization settings shared by the
/// webhook handlers.
#[derive(Debug, Clone)]
pub struct VoiceSettings {
    /// Provider voice name for `Say` directives.
    pub voice: String,
    /// Opening line for inbound calls.
    pub greeting: String,
    /// The single caller address allowed to start inbound calls.
    pub allowed_caller: String,
    /// Hard cap on each recording, in seconds.
    pub record_max_secs: u32,
    /// Seconds of silence that end a recording.
    pub record_timeout_secs: u32,
}

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Per-call session metadata.
    pub sessions: SessionStore,
    /// Per-call pending turn results.
    pub registry: ResultRegistry,
    /// Speech-to-text collaborator.
    pub transcriber: Arc<dyn Transcriber>,
    /// Language-model collaborator.
    pub assistant: Arc<dyn Assistant>,
    /// Post-processing filter over assistant output.
    pub post_filter: Arc<dyn PostFilter>,
    /// Auxiliary context lookups for prompt building.
    pub context: Arc<dyn ContextSource>,
    /// Durable transcript log.
    pub sink: Arc<dyn TurnSink>,
    /// Provider-held recording access.
    pub recordings: Arc<dyn RecordingStore>,
    /// Outbound call creation.
    pub launcher: Arc<dyn CallLauncher>,
    /// Voice and authorization settings.
    pub voice: VoiceSettings,
    /// Wait before fetching a fresh recording.
    pub grace: Duration,
}

impl AppState {
    /// Assembles the dependency bundle for one pipeline run.
    pub fn turn_deps(&self) -> TurnDeps {
        TurnDeps {
            transcriber: Arc::clone(&self.transcriber),
            assistant: Arc::clone(&self.assistant),
            post_filter: Arc::clone(&self.post_filter),
            context: Arc::clone(&self.context),
            sink: Arc::clone(&self.sink),
            recordings: Arc::clone(&self.recordings),
            registry: self.registry.clone(),
            grace: self.grace,
        }
    }
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/voice/incoming", post(api_voice::incoming_call_handler))
        .route("/voice/recording", post(api_voice::recording_ready_handler))
        .route(
            "/voice/poll",
            get(api_voice::poll_handler).post(api_voice::poll_handler),
        )
        .route(
            "/voice/outbound-greeting",
            post(api_voice::outbound_greeting_handler),
        )
        .route("/voice/status", post(api_voice::status_callback_handler))
        .route("/calls", post(api_calls::create_call_handler))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
