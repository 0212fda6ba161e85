use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::models::{
    AnalysisError, ErrorInfo, ImageCandidate, PipelineEvent, PipelineState, SourceImage, Stage,
};
use crate::services::{cards, image_source, HostingClient, InferenceClient, ResponseNormalizer};

/// Receives every applied transition, tagged with the run generation.
pub trait ProgressSink: Send + Sync {
    fn on_transition(&self, generation: u64, state: &PipelineState);
}

/// Default sink: progress goes to the log.
pub struct LogProgressSink;

impl ProgressSink for LogProgressSink {
    fn on_transition(&self, generation: u64, state: &PipelineState) {
        match state {
            PipelineState::Running { stage, percent } => {
                log::info!("⏳ [run {}] {}% {}", generation, percent, stage.label());
            }
            PipelineState::Succeeded { report } => {
                log::info!("✅ [run {}] analysis complete: {} item(s)", generation, report.items.len());
                for card in cards::render_report(report) {
                    log::debug!("\n{}", cards::format_card(&card));
                }
            }
            PipelineState::Failed { error } => {
                log::info!("❌ [run {}] analysis failed: {}", generation, error.message);
            }
            other => log::debug!("🔄 [run {}] state -> {}", generation, other.status()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Preview {
    pub generation: u64,
    pub data_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    Finished { generation: u64, state: PipelineState },
    /// A newer selection (or run) took over; nothing from this run was applied.
    Superseded,
    NothingSelected,
}

struct Session {
    generation: u64,
    image: Option<Arc<SourceImage>>,
    state: PipelineState,
}

pub struct PipelineOrchestrator {
    hosting: Arc<dyn HostingClient>,
    inference: Arc<dyn InferenceClient>,
    normalizer: ResponseNormalizer,
    progress: Arc<dyn ProgressSink>,
    reveal_delay: Duration,
    session: Mutex<Session>,
}

impl PipelineOrchestrator {
    pub fn new(
        hosting: Arc<dyn HostingClient>,
        inference: Arc<dyn InferenceClient>,
        progress: Arc<dyn ProgressSink>,
        reveal_delay: Duration,
    ) -> Self {
        Self {
            hosting,
            inference,
            normalizer: ResponseNormalizer::new(),
            progress,
            reveal_delay,
            session: Mutex::new(Session {
                generation: 0,
                image: None,
                state: PipelineState::Idle,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> (u64, PipelineState) {
        let session = self.lock();
        (session.generation, session.state.clone())
    }

    /// Replaces the current image. Any run still in flight becomes stale.
    /// A rejected candidate leaves the current image and state untouched.
    pub fn select_image(&self, candidate: ImageCandidate) -> Result<Preview, AnalysisError> {
        let image = image_source::accept(candidate)?;
        let data_url = image.preview_data_url();

        let mut session = self.lock();
        session.generation += 1;
        session.image = Some(Arc::new(image));
        let generation = session.generation;
        self.transition(&mut session, PipelineEvent::ImageSelected);

        log::info!("🖼️ New image selected (run {})", generation);
        Ok(Preview { generation, data_url })
    }

    pub fn clear(&self) {
        let mut session = self.lock();
        session.generation += 1;
        session.image = None;
        self.transition(&mut session, PipelineEvent::Cleared);
    }

    /// Runs upload, analysis and normalization for the current image.
    pub async fn run(&self) -> RunOutcome {
        let (generation, image) = {
            let mut session = self.lock();
            let Some(image) = session.image.clone() else {
                log::warn!("⚠️ Analyze requested with no image selected");
                return RunOutcome::NothingSelected;
            };
            session.generation += 1;
            let generation = session.generation;
            self.transition(&mut session, PipelineEvent::Started);
            (generation, image)
        };

        log::info!("🚀 Starting analysis run {}", generation);

        let hosted = match self.hosting.upload(&image).await {
            Ok(hosted) => hosted,
            Err(e) => return self.fail(generation, Stage::Uploading, e),
        };

        if !self.advance(generation, Stage::Analyzing) {
            return RunOutcome::Superseded;
        }

        let payload = match self.inference.analyze(&hosted).await {
            Ok(payload) => payload,
            Err(e) => return self.fail(generation, Stage::Analyzing, e),
        };

        if !self.advance(generation, Stage::Finalizing) {
            return RunOutcome::Superseded;
        }

        let report = match self.normalizer.normalize(&payload) {
            Ok(report) => report,
            Err(e) => return self.fail(generation, Stage::Finalizing, e),
        };

        if !self.reveal_delay.is_zero() {
            tokio::time::sleep(self.reveal_delay).await;
        }

        self.apply(generation, PipelineEvent::Completed(report))
    }

    fn advance(&self, generation: u64, stage: Stage) -> bool {
        !matches!(
            self.apply(generation, PipelineEvent::StageEntered(stage)),
            RunOutcome::Superseded
        )
    }

    fn fail(&self, generation: u64, stage: Stage, error: AnalysisError) -> RunOutcome {
        log::error!("❌ {} stage failed (run {}, {}): {}", stage, generation, error.kind(), error);
        if let Some(detail) = error.diagnostic() {
            log::debug!("📦 Raw fragment from {} stage: {}", stage, detail);
        }

        let info = ErrorInfo::from_error(&error, Some(stage));
        self.apply(generation, PipelineEvent::Failed(info))
    }

    /// Applies `event` only if `generation` is still the current run.
    fn apply(&self, generation: u64, event: PipelineEvent) -> RunOutcome {
        let mut session = self.lock();
        if session.generation != generation {
            log::debug!(
                "⏭️ Dropping result of stale run {} (current is {})",
                generation,
                session.generation
            );
            return RunOutcome::Superseded;
        }

        self.transition(&mut session, event);
        RunOutcome::Finished {
            generation,
            state: session.state.clone(),
        }
    }

    fn transition(&self, session: &mut Session, event: PipelineEvent) {
        let current = std::mem::replace(&mut session.state, PipelineState::Idle);
        session.state = current.next(event);
        self.progress.on_transition(session.generation, &session.state);
    }
}
