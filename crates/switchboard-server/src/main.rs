//! Switchboard server binary.
//!
//! Starts the webhook bridge with structured logging, transcript database
//! initialization, the session sweeper, and graceful shutdown on
//! SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use switchboard_pipeline::{CommandAssistant, CommandTranscriber, NoContext, PassthroughFilter};
use switchboard_server::config;
use switchboard_server::{app, background, AppState, VoiceSettings};
use switchboard_store::{ResultRegistry, SessionStore};
use switchboard_telephony::{ProviderSettings, TelephonyClient};
use switchboard_transcript::{create_pool, run_migrations, DbRuntimeSettings, TranscriptLog};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("SWITCHBOARD_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().or(Some("config.toml"));

    // Load configuration
    let config = config::load_config(selected_config_path)
        .expect("failed to load configuration — the server cannot start without valid config");

    // Initialize tracing
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    tracing::info!(
        source = config_source,
        path = selected_config_path.unwrap_or("<none>"),
        "resolved startup configuration path"
    );

    config
        .validate()
        .expect("incomplete configuration — see the missing setting above");

    // Initialize the transcript database
    let pool = create_pool(
        &config.transcript.path,
        DbRuntimeSettings {
            busy_timeout_ms: config.transcript.busy_timeout_ms,
            pool_max_size: config.transcript.pool_max_size,
        },
    )
    .expect("failed to create transcript pool — check transcript.path in config");

    {
        let conn = pool
            .get()
            .expect("failed to get database connection for migrations");
        let applied = run_migrations(&conn).expect("failed to run database migrations");
        if applied > 0 {
            tracing::info!(count = applied, "applied database migrations");
        }
    }

    let telephony = Arc::new(TelephonyClient::new(ProviderSettings {
        api_base: config.provider.api_base.clone(),
        account_sid: config.provider.account_sid.clone(),
        auth_token: config.provider.auth_token.clone(),
        from_number: config.provider.from_number.clone(),
        default_to: config.provider.default_to.clone(),
        public_url: config.server.public_url.clone(),
    }));

    let state = Arc::new(AppState {
        sessions: SessionStore::new(),
        registry: ResultRegistry::new(),
        transcriber: Arc::new(CommandTranscriber::new(
            &config.pipeline.stt_command,
            config.pipeline.stt_args.clone(),
        )),
        assistant: Arc::new(CommandAssistant::new(
            &config.pipeline.assistant_command,
            config.pipeline.assistant_args.clone(),
        )),
        post_filter: Arc::new(PassthroughFilter),
        context: Arc::new(NoContext),
        sink: Arc::new(TranscriptLog::new(pool)),
        recordings: Arc::clone(&telephony) as Arc<dyn switchboard_pipeline::RecordingStore>,
        launcher: telephony,
        voice: VoiceSettings {
            voice: config.voice.voice.clone(),
            greeting: config.voice.greeting.clone(),
            allowed_caller: config.provider.allowed_caller.clone(),
            record_max_secs: config.voice.record_max_secs,
            record_timeout_secs: config.voice.record_timeout_secs,
        },
        grace: Duration::from_secs(config.session.grace_secs),
    });

    background::start_sweep_task(
        Arc::clone(&state),
        Duration::from_secs(config.session.sweep_interval_secs),
        Duration::from_secs(config.session.ttl_secs),
    );

    // Build application
    let app = app((*state).clone());
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting switchboard server");

    let listener = TcpListener::bind(addr)
        .await
        .expect("failed to bind to address — is another process using this port?");

    // Serve with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("switchboard server shut down");
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
