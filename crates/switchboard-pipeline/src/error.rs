use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("recording fetch error: {0}")]
    Recording(String),

    #[error("transcription error: {0}")]
    Transcription(String),

    #[error("assistant error: {0}")]
    Assistant(String),

    #[error("context lookup error: {0}")]
    Context(String),

    #[error("transcript persistence error: {0}")]
    Persist(String),

    #[error("call creation error: {0}")]
    CallCreation(String),
}
