//! The append-only transcript log.

use crate::{DbPool, TranscriptError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use switchboard_pipeline::{PipelineError, TurnSink};
use switchboard_types::{Channel, TurnRecord, TurnRole};

/// SQLite-backed conversation log. Cheap to clone; the pool is shared.
#[derive(Debug, Clone)]
pub struct TranscriptLog {
    pool: DbPool,
}

impl TranscriptLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Appends a turn. Blocking; call from a blocking context or use
    /// [`TranscriptLog::append`].
    pub fn append_blocking(
        &self,
        role: TurnRole,
        content: &str,
        channel: Channel,
    ) -> Result<(), TranscriptError> {
        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO turns (role, content, channel) VALUES (?1, ?2, ?3)",
            rusqlite::params![role.label(), content, channel.label()],
        )?;
        Ok(())
    }

    /// Appends a turn, running the write on the blocking thread pool.
    pub async fn append(
        &self,
        role: TurnRole,
        content: &str,
        channel: Channel,
    ) -> Result<(), TranscriptError> {
        let log = self.clone();
        let content = content.to_string();
        tokio::task::spawn_blocking(move || log.append_blocking(role, &content, channel))
            .await
            .map_err(|e| TranscriptError::Join(e.to_string()))?
    }

    /// Returns the most recent turns, newest last.
    pub async fn recent(&self, limit: u32) -> Result<Vec<TurnRecord>, TranscriptError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let conn = pool.get()?;
            let mut stmt = conn.prepare(
                "SELECT role, content, channel, created_at FROM turns
                 ORDER BY id DESC LIMIT ?1",
            )?;
            let mut records = stmt
                .query_map([limit], |row| {
                    let role_label: String = row.get(0)?;
                    let content: String = row.get(1)?;
                    let channel_label: String = row.get(2)?;
                    let created_raw: String = row.get(3)?;

                    let role = TurnRole::from_label(&role_label).ok_or_else(|| {
                        conversion_error(0, format!("unknown role: {}", role_label))
                    })?;
                    let channel = Channel::from_label(&channel_label).ok_or_else(|| {
                        conversion_error(2, format!("unknown channel: {}", channel_label))
                    })?;
                    let created_at: DateTime<Utc> = created_raw
                        .parse()
                        .map_err(|e| conversion_error(3, format!("bad timestamp: {}", e)))?;

                    Ok(TurnRecord {
                        role,
                        content,
                        channel,
                        created_at,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            records.reverse();
            Ok(records)
        })
        .await
        .map_err(|e| TranscriptError::Join(e.to_string()))?
    }
}

fn conversion_error(column: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        message.into(),
    )
}

#[async_trait]
impl TurnSink for TranscriptLog {
    async fn persist_turn(
        &self,
        role: TurnRole,
        content: &str,
        channel: Channel,
    ) -> Result<(), PipelineError> {
        self.append(role, content, channel)
            .await
            .map_err(|e| PipelineError::Persist(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{create_pool, run_migrations, DbRuntimeSettings};

    fn log_with_fresh_db(dir: &tempfile::TempDir) -> TranscriptLog {
        let path = dir.path().join("transcript.db");
        let pool = create_pool(path.to_str().unwrap(), DbRuntimeSettings::default())
            .expect("pool creation");
        {
            let conn = pool.get().expect("connection");
            run_migrations(&conn).expect("migrations");
        }
        TranscriptLog::new(pool)
    }

    #[tokio::test]
    async fn append_and_read_back_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_with_fresh_db(&dir);

        log.append(TurnRole::Caller, "what's on my calendar", Channel::Voice)
            .await
            .expect("append caller turn");
        log.append(TurnRole::Assistant, "You have two meetings.", Channel::Voice)
            .await
            .expect("append assistant turn");

        let turns = log.recent(10).await.expect("read back");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::Caller);
        assert_eq!(turns[0].content, "what's on my calendar");
        assert_eq!(turns[0].channel, Channel::Voice);
        assert_eq!(turns[1].role, TurnRole::Assistant);
    }

    #[tokio::test]
    async fn recent_respects_limit_and_returns_newest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_with_fresh_db(&dir);

        for i in 0..5 {
            log.append(TurnRole::System, &format!("event {i}"), Channel::Voice)
                .await
                .expect("append");
        }

        let turns = log.recent(2).await.expect("read back");
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].content, "event 3");
        assert_eq!(turns[1].content, "event 4");
    }

    #[tokio::test]
    async fn persist_turn_via_sink_trait() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = log_with_fresh_db(&dir);
        let sink: &dyn TurnSink = &log;

        sink.persist_turn(TurnRole::Caller, "hello", Channel::Chat)
            .await
            .expect("persist through trait");

        let turns = log.recent(1).await.expect("read back");
        assert_eq!(turns[0].channel, Channel::Chat);
    }
}
