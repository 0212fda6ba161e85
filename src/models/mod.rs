use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

mod error;

pub use error::{truncate_chars, AnalysisError, ErrorInfo, ErrorKind, BODY_PREVIEW_CHARS};

pub const UNKNOWN_ITEM_NAME: &str = "Unknown Item";

/// An image handed over by the user, before validation.
#[derive(Debug, Clone)]
pub struct ImageCandidate {
    pub bytes: Vec<u8>,
    pub declared_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SourceImage {
    pub bytes: Vec<u8>,
    pub mime_type: String,  // always image/*
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedImageRef {
    pub url: String,
}

/// The `choices[0].message.content` string, not yet parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawInferencePayload(pub String);

impl RawInferencePayload {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NutritionItem {
    pub name: String,
    pub calories: f64,
    pub protein_grams: f64,
    pub carbs_grams: f64,
    pub fat_grams: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutritionReport {
    pub items: Vec<NutritionItem>,  // never empty
    pub analyzed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Uploading,
    Analyzing,
    Finalizing,
}

impl Stage {
    pub fn percent(&self) -> u8 {
        match self {
            Stage::Uploading => 30,
            Stage::Analyzing => 60,
            Stage::Finalizing => 100,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Stage::Uploading => "Uploading image...",
            Stage::Analyzing => "Analyzing food...",
            Stage::Finalizing => "Complete!",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Uploading => "uploading",
            Stage::Analyzing => "analyzing",
            Stage::Finalizing => "finalizing",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    PreviewReady,
    Running { stage: Stage, percent: u8 },
    Succeeded { report: NutritionReport },
    Failed { error: ErrorInfo },
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    ImageSelected,
    Cleared,
    Started,
    StageEntered(Stage),
    Completed(NutritionReport),
    Failed(ErrorInfo),
}

impl PipelineEvent {
    fn name(&self) -> &'static str {
        match self {
            PipelineEvent::ImageSelected => "image_selected",
            PipelineEvent::Cleared => "cleared",
            PipelineEvent::Started => "started",
            PipelineEvent::StageEntered(_) => "stage_entered",
            PipelineEvent::Completed(_) => "completed",
            PipelineEvent::Failed(_) => "failed",
        }
    }
}

impl PipelineState {
    /// Transition function. Events that make no sense in the current state
    /// leave it untouched.
    pub fn next(self, event: PipelineEvent) -> PipelineState {
        use PipelineState::*;

        match (self, event) {
            (_, PipelineEvent::ImageSelected) => PreviewReady,
            (_, PipelineEvent::Cleared) => Idle,
            (Idle, PipelineEvent::Started) => {
                log::warn!("⚠️ Ignoring start without a selected image");
                Idle
            }
            (_, PipelineEvent::Started) => Running {
                stage: Stage::Uploading,
                percent: Stage::Uploading.percent(),
            },
            (Running { percent, .. }, PipelineEvent::StageEntered(entered)) if entered.percent() > percent => {
                Running {
                    stage: entered,
                    percent: entered.percent(),
                }
            }
            (Running { stage: Stage::Finalizing, .. }, PipelineEvent::Completed(report)) => {
                Succeeded { report }
            }
            (Running { .. }, PipelineEvent::Failed(error)) => Failed { error },
            (state, event) => {
                log::warn!(
                    "⚠️ Illegal transition ignored: {} while {}",
                    event.name(),
                    state.status()
                );
                state
            }
        }
    }

    /// Progress marker shown next to the bar.
    pub fn percent(&self) -> u8 {
        match self {
            PipelineState::Running { percent, .. } => *percent,
            PipelineState::Succeeded { .. } => 100,
            _ => 0,
        }
    }

    pub fn label(&self) -> Option<&'static str> {
        match self {
            PipelineState::Running { stage, .. } => Some(stage.label()),
            _ => None,
        }
    }

    pub fn status(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::PreviewReady => "preview_ready",
            PipelineState::Running { .. } => "running",
            PipelineState::Succeeded { .. } => "succeeded",
            PipelineState::Failed { .. } => "failed",
        }
    }
}
