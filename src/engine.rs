use crate::aligner::ReferenceAligner;
use crate::cancel::CancelSignal;
use crate::config::Config;
use crate::error::{EngineError, ExtractionError, StorageError};
use crate::extractor::{CapturedStroke, StrokeExtractor};
use crate::grader::{EvaluationResult, Grader};
use crate::guide::{CellFrame, GuideGeometry};
use crate::metrics::compute_all;
use crate::raster::InkImage;
use crate::reference::{ReferenceCatalog, ReferenceCharacter};
use crate::store::{SessionId, SessionStore};
use std::sync::{Arc, Mutex, TryLockError};
use tracing::{debug, info, warn};

/// A finished evaluation. The result is always present; `session` carries
/// the outcome of saving it.
#[derive(Debug)]
pub struct Evaluation {
    pub result: EvaluationResult,
    pub session: Result<SessionId, StorageError>,
}

impl Evaluation {
    pub fn saved(&self) -> bool {
        self.session.is_ok()
    }
}

/// Owns the reference catalog, the tuning and the session store, and runs
/// one evaluation at a time.
pub struct Engine {
    catalog: Arc<ReferenceCatalog>,
    config: Config,
    extractor: StrokeExtractor,
    aligner: ReferenceAligner,
    grader: Grader,
    store: Arc<dyn SessionStore>,
    gate: Mutex<()>,
}

impl Engine {
    pub fn new(
        catalog: Arc<ReferenceCatalog>,
        config: Config,
        store: Arc<dyn SessionStore>,
    ) -> Result<Self, EngineError> {
        config
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        let grader = Grader::new(config.weights.clone(), &config.grading)
            .map_err(|e| EngineError::Config(e.to_string()))?;

        Ok(Self {
            extractor: StrokeExtractor::new(config.extraction.clone()),
            aligner: ReferenceAligner::new(config.alignment.clone()),
            grader,
            catalog,
            config,
            store,
            gate: Mutex::new(()),
        })
    }

    pub fn catalog(&self) -> &ReferenceCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn reference(&self, character_id: &str) -> Result<Arc<ReferenceCharacter>, EngineError> {
        self.catalog
            .get(character_id)
            .ok_or_else(|| EngineError::UnknownCharacter(character_id.to_string()))
    }

    pub fn extract(
        &self,
        image: &InkImage,
        guide: Option<&GuideGeometry>,
        cancel: &dyn CancelSignal,
    ) -> Result<Vec<CapturedStroke>, EngineError> {
        Ok(self.extractor.extract(image, guide, cancel)?)
    }

    /// Align, measure and grade. Touches neither the store nor the gate.
    pub fn assess(
        &self,
        reference: &ReferenceCharacter,
        strokes: &[CapturedStroke],
        frame: &CellFrame,
        guide: Option<&GuideGeometry>,
        previous: Option<f64>,
        cancel: &dyn CancelSignal,
    ) -> Result<EvaluationResult, EngineError> {
        let aligned = self
            .aligner
            .align(strokes, frame, reference, guide, cancel)?;
        let metrics = compute_all(&aligned, reference, &self.config.metrics);
        debug!(
            "Metrics for '{}': {:?}",
            reference.id,
            metrics.iter().map(|m| (m.kind, m.value)).collect::<Vec<_>>()
        );
        self.grader
            .grade(
                &reference.id,
                reference.difficulty,
                strokes.len(),
                metrics,
                previous,
            )
            .map_err(|e| EngineError::Config(e.to_string()))
    }

    /// Full evaluation of one captured image, recorded in the store.
    pub fn evaluate(
        &self,
        image: &InkImage,
        character_id: &str,
        guide: Option<&GuideGeometry>,
        image_ref: &str,
        cancel: &dyn CancelSignal,
    ) -> Result<Evaluation, EngineError> {
        let _turn = self.enter()?;
        let reference = self.reference(character_id)?;

        let strokes = self.extract(image, guide, cancel)?;
        if cancel.is_cancelled() {
            return Err(ExtractionError::Cancelled.into());
        }
        info!(
            "✍️  Extracted {} strokes for '{}' (expected {})",
            strokes.len(),
            character_id,
            reference.expected_strokes
        );

        let frame = CellFrame::for_capture(image.width, image.height, guide);
        self.finish(&reference, &strokes, &frame, guide, image_ref, cancel)
    }

    /// Same as `evaluate` for strokes that were captured as polylines
    /// already (e.g. touch input), in the coordinates `frame` describes.
    pub fn evaluate_strokes(
        &self,
        character_id: &str,
        strokes: &[CapturedStroke],
        frame: &CellFrame,
        guide: Option<&GuideGeometry>,
        image_ref: &str,
        cancel: &dyn CancelSignal,
    ) -> Result<Evaluation, EngineError> {
        let _turn = self.enter()?;
        let reference = self.reference(character_id)?;
        self.finish(&reference, strokes, frame, guide, image_ref, cancel)
    }

    fn enter(&self) -> Result<std::sync::MutexGuard<'_, ()>, EngineError> {
        match self.gate.try_lock() {
            Ok(g) => Ok(g),
            Err(TryLockError::WouldBlock) => Err(EngineError::Busy),
            // The gate guards no data
            Err(TryLockError::Poisoned(p)) => Ok(p.into_inner()),
        }
    }

    fn finish(
        &self,
        reference: &ReferenceCharacter,
        strokes: &[CapturedStroke],
        frame: &CellFrame,
        guide: Option<&GuideGeometry>,
        image_ref: &str,
        cancel: &dyn CancelSignal,
    ) -> Result<Evaluation, EngineError> {
        let previous = match self.store.latest_for(&reference.id) {
            Ok(s) => s.map(|s| s.result.final_score),
            Err(e) => {
                warn!("Could not read history for '{}': {}", reference.id, e);
                None
            }
        };

        let result = self.assess(reference, strokes, frame, guide, previous, cancel)?;
        info!(
            "🏁 '{}' scored {:.1} ({})",
            result.character_id, result.final_score, result.grade
        );

        let session = self.store.record(&result, image_ref);
        if let Err(e) = &session {
            warn!("Result for '{}' not saved: {}", result.character_id, e);
        }
        Ok(Evaluation { result, session })
    }
}
