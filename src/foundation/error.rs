use std::path::PathBuf;

/// Convenience result type used across reelsync.
pub type SyncResult<T> = Result<T, SyncError>;

/// Which side of the render queue stopped making progress.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StallStage {
    /// The consumer waited too long for the next composed frame.
    Producer,
    /// The producer waited too long for queue space.
    Consumer,
}

impl std::fmt::Display for StallStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Producer => f.write_str("producer"),
            Self::Consumer => f.write_str("consumer"),
        }
    }
}

/// Top-level error taxonomy used by engine APIs.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// A time code did not match the expected SRT/VTT pattern.
    #[error("malformed timecode: '{text}'")]
    MalformedTimecode {
        /// Raw input that failed to parse.
        text: String,
    },

    /// A timeline or subtitle document could not be interpreted.
    #[error("malformed document '{source_name}': {reason}")]
    MalformedDocument {
        /// File path or logical name of the document.
        source_name: String,
        /// Human readable reason.
        reason: String,
    },

    /// A document path does not exist.
    #[error("document not found: '{}'", path.display())]
    DocumentNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// An item draft lacks one of `id`, `startTime` or `duration`.
    #[error("item {} is missing required field '{field}'", id.as_deref().unwrap_or("<unnamed>"))]
    MissingRequiredField {
        /// Name of the absent field.
        field: &'static str,
        /// Item id when known.
        id: Option<String>,
    },

    /// Track name is not one of `subtitles`, `audio`, `video`.
    #[error("invalid track '{name}'")]
    InvalidTrack {
        /// Rejected track name.
        name: String,
    },

    /// An item id already exists in the target track.
    #[error("item '{id}' already exists in track '{track}'")]
    DuplicateItem {
        /// Track name.
        track: String,
        /// Conflicting id.
        id: String,
    },

    /// Start time or duration violates the span invariants.
    #[error("invalid timing for item '{id}': {reason}")]
    InvalidTiming {
        /// Item id.
        id: String,
        /// Violated constraint.
        reason: String,
    },

    /// The render queue stalled for longer than the configured timeout.
    #[error("render timed out waiting on {stage} after {frames_written}/{frames_total} frames")]
    RenderTimeout {
        /// Stalled stage.
        stage: StallStage,
        /// Frames the sink received before the abort.
        frames_written: u64,
        /// Frames the job required.
        frames_total: u64,
    },

    /// An external encoder process failed to start or exited unsuccessfully.
    #[error("{program} failed (status {}): {stderr}", status.map_or_else(|| "n/a".to_owned(), |s| s.to_string()))]
    EncoderProcessFailure {
        /// Program name.
        program: String,
        /// Exit code, if the process ran.
        status: Option<i32>,
        /// Captured (trimmed) stderr or spawn error text.
        stderr: String,
    },

    /// No usable audio could be produced.
    #[error("audio unavailable: {0}")]
    AudioUnavailable(String),

    /// Invalid user-provided options or data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    /// Wrapped lower-level error from dependencies or IO.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// Build a [`SyncError::Validation`] value.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`SyncError::Config`] value.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`SyncError::AudioUnavailable`] value.
    pub fn audio(msg: impl Into<String>) -> Self {
        Self::AudioUnavailable(msg.into())
    }

    /// Build a [`SyncError::MalformedTimecode`] value.
    pub fn timecode(text: impl Into<String>) -> Self {
        Self::MalformedTimecode { text: text.into() }
    }

    /// Build a [`SyncError::MalformedDocument`] value.
    pub fn malformed(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// Build a [`SyncError::EncoderProcessFailure`] value.
    pub fn encoder(program: impl Into<String>, status: Option<i32>, stderr: impl Into<String>) -> Self {
        Self::EncoderProcessFailure {
            program: program.into(),
            status,
            stderr: stderr.into(),
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
