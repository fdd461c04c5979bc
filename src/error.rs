//! Error taxonomy for the analysis pipeline.
//!
//! Precondition violations are never coerced into a default value: averaging
//! zero trials, a signal shorter than one spectrogram window or a baseline
//! longer than a trial all surface as an [`LfpError`]. Failures raised inside
//! the pipeline are wrapped in [`LfpError::Stage`] so the caller can tell
//! which session, stage and tone produced them.
use std::fmt;

use thiserror::Error;

use crate::pipeline::Tone;

#[derive(Error, Debug)]
pub enum LfpError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("singular system: {0}")]
    Singular(String),

    #[error("malformed session file: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("session {session}{}: {stage} failed: {source}", tone_suffix(.tone))]
    Stage {
        session: String,
        stage: Stage,
        tone: Option<Tone>,
        #[source]
        source: Box<LfpError>,
    },
}

pub type Result<T> = std::result::Result<T, LfpError>;

impl LfpError {
    /// Attach pipeline location to an error raised by one of the stages.
    pub fn at(self, session: &str, stage: Stage, tone: Option<Tone>) -> Self {
        LfpError::Stage {
            session: session.to_string(),
            stage,
            tone,
            source: Box::new(self),
        }
    }
}

fn tone_suffix(tone: &Option<Tone>) -> String {
    match tone {
        Some(t) => format!(", tone {t}"),
        None => String::new(),
    }
}

/// Per-session pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Load,
    DetectOutliers,
    Filter,
    GroupByCondition,
    Mean,
    Spectrogram,
    Contrast,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Load => "load",
            Stage::DetectOutliers => "outlier detection",
            Stage::Filter => "low-pass filtering",
            Stage::GroupByCondition => "condition grouping",
            Stage::Mean => "trial averaging",
            Stage::Spectrogram => "spectrogram",
            Stage::Contrast => "low/high contrast",
        };
        f.write_str(name)
    }
}
