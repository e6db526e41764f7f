//! Webhook handlers for the telephony provider.
//!
//! Each handler is stateless per request: it maps one provider event to one
//! control-markup response, and may hand work to the detached turn pipeline.
//! The slow wait for transcription and the assistant lives in the provider's
//! own poll loop (`/voice/poll`), never in these handlers.

use crate::{lines, AppState};
use axum::{
    extract::{Extension, Form, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use switchboard_markup::{gather_turn, terminal, thinking, RecordSettings};
use switchboard_pipeline::spawn_turn;
use switchboard_types::{CallStatus, Channel, TurnRole};

/// Webhook payload for call start and outbound greeting.
#[derive(Debug, Deserialize)]
pub struct CallStartForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "From", default)]
    pub from: String,
}

/// Webhook payload for a finished recording.
#[derive(Debug, Deserialize)]
pub struct RecordingForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingSid", default)]
    pub recording_sid: Option<String>,
}

/// Query parameters for the poll route.
#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(rename = "callSid")]
    pub call_sid: String,
}

/// Query parameters for the outbound greeting route.
#[derive(Debug, Deserialize)]
pub struct GreetingQuery {
    #[serde(default)]
    pub message: Option<String>,
}

/// Webhook payload for call status transitions.
#[derive(Debug, Deserialize)]
pub struct StatusForm {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
}

fn xml(markup: switchboard_markup::Response) -> Response {
    ([(header::CONTENT_TYPE, "text/xml")], markup.to_xml()).into_response()
}

fn poll_url(call_sid: &str) -> String {
    // SIDs are opaque; encode so a hostile one cannot smuggle extra query
    // parameters into the redirect.
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("callSid", call_sid)
        .finish();
    format!("/voice/poll?{}", query)
}

fn record_settings(state: &AppState) -> RecordSettings {
    RecordSettings {
        action: "/voice/recording".to_string(),
        max_length_secs: state.voice.record_max_secs,
        timeout_secs: state.voice.record_timeout_secs,
    }
}

async fn persist_system_turn(state: &AppState, call_sid: &str, content: &str) {
    if let Err(e) = state
        .sink
        .persist_turn(TurnRole::System, content, Channel::Voice)
        .await
    {
        tracing::warn!(call_sid, error = %e, "failed to persist system turn");
    }
}

/// Handler for `POST /voice/incoming` — a new inbound call.
pub async fn incoming_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<CallStartForm>,
) -> Response {
    if form.from != state.voice.allowed_caller {
        tracing::warn!(call_sid = %form.call_sid, from = %form.from, "rejecting unrecognized caller");
        return xml(terminal(&state.voice.voice, lines::REJECTION));
    }

    state.sessions.create(&form.call_sid);
    tracing::info!(call_sid = %form.call_sid, "inbound call started");
    persist_system_turn(&state, &form.call_sid, "Inbound call started.").await;

    xml(gather_turn(
        &state.voice.voice,
        &state.voice.greeting,
        record_settings(&state),
        lines::REPROMPT,
    ))
}

/// Handler for `POST /voice/recording` — a caller utterance is ready.
///
/// Claims the per-call result slot, spawns the turn pipeline detached, and
/// answers immediately with thinking markup. The handler never awaits the
/// pipeline; the provider's response-time budget would not survive it.
pub async fn recording_ready_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<RecordingForm>,
) -> Response {
    let recording_url = match form.recording_url.filter(|u| !u.trim().is_empty()) {
        Some(url) => url,
        None => {
            tracing::warn!(call_sid = %form.call_sid, "recording event without a recording URL");
            return xml(terminal(&state.voice.voice, lines::MISSING_RECORDING));
        }
    };

    if !state.sessions.touch(&form.call_sid) {
        // The session may have been swept mid-call; recreate it rather than
        // stranding a live caller.
        tracing::warn!(call_sid = %form.call_sid, "recording for unknown session, recreating");
        state.sessions.create(&form.call_sid);
    }

    if !state.registry.begin(&form.call_sid) {
        // Strictly half-duplex per call: the prior turn is still unresolved,
        // so this event must not race a second pipeline run against it.
        tracing::warn!(
            call_sid = %form.call_sid,
            "turn already in flight, ignoring duplicate recording event"
        );
        return xml(thinking(&poll_url(&form.call_sid)));
    }

    let turn = state.sessions.begin_turn(&form.call_sid).unwrap_or(0);
    tracing::info!(call_sid = %form.call_sid, turn, "dispatching turn pipeline");

    spawn_turn(
        state.turn_deps(),
        form.call_sid.clone(),
        recording_url,
        form.recording_sid.unwrap_or_default(),
    );

    xml(thinking(&poll_url(&form.call_sid)))
}

/// Handler for `GET|POST /voice/poll` — the provider asking for the turn
/// result.
///
/// Unknown call SIDs and in-flight turns both get wait markup; the provider's
/// own call-duration limit bounds the loop. A ready result is consumed
/// exactly once.
pub async fn poll_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PollQuery>,
) -> Response {
    state.sessions.touch(&query.call_sid);

    match state.registry.take_ready(&query.call_sid) {
        Some(reply) if reply.terminal => {
            tracing::info!(call_sid = %query.call_sid, "delivering farewell");
            xml(terminal(&state.voice.voice, &reply.text))
        }
        Some(reply) => xml(gather_turn(
            &state.voice.voice,
            &reply.text,
            record_settings(&state),
            lines::REPROMPT,
        )),
        None => xml(thinking(&poll_url(&query.call_sid))),
    }
}

/// Handler for `POST /voice/outbound-greeting` — the callee answered an
/// outbound call.
///
/// The opening line was chosen by whoever created the call and rides in on
/// the callback URL; no pipeline run happens here.
pub async fn outbound_greeting_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<GreetingQuery>,
    Form(form): Form<CallStartForm>,
) -> Response {
    let message = query
        .message
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| state.voice.greeting.clone());

    state.sessions.create(&form.call_sid);
    tracing::info!(call_sid = %form.call_sid, "outbound call answered");
    persist_system_turn(
        &state,
        &form.call_sid,
        &format!("Outbound call opened with: {}", message),
    )
    .await;

    xml(gather_turn(
        &state.voice.voice,
        &message,
        record_settings(&state),
        lines::REPROMPT,
    ))
}

/// Handler for `POST /voice/status` — provider call lifecycle callback.
///
/// Terminal statuses tear down the session and any stray result slot; a
/// pipeline task still running will publish into the void harmlessly.
pub async fn status_callback_handler(
    Extension(state): Extension<Arc<AppState>>,
    Form(form): Form<StatusForm>,
) -> Response {
    match CallStatus::parse(&form.call_status) {
        Some(status) if status.is_terminal() => {
            let had_session = state.sessions.remove(&form.call_sid);
            let had_result = state.registry.remove(&form.call_sid);
            tracing::info!(
                call_sid = %form.call_sid,
                status = %form.call_status,
                had_session,
                had_result,
                "call ended, state torn down"
            );
        }
        Some(_) => {
            state.sessions.touch(&form.call_sid);
        }
        None => {
            tracing::debug!(
                call_sid = %form.call_sid,
                status = %form.call_status,
                "unrecognized call status, ignoring"
            );
        }
    }

    StatusCode::OK.into_response()
}
