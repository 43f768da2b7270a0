//! Gesture session controller
//!
//! Drives one session at a time: capture while recording, then rasterize,
//! build the tensor, classify, gate by confidence and hand the label to the
//! host. A new session cannot begin until the previous one has been
//! dispatched and the host's cooldown has run out.

use anyhow::{Context, Result};
use image::DynamicImage;
use std::sync::Arc;

use super::host::GestureHost;
use super::state::{ClassifyStatus, SessionState};
use crate::capture::{CaptureOutcome, StrokeRecorder};
use crate::classify::{ClassifierEngine, InferenceWorker, InputTensor, TensorBuilder};
use crate::config::{GlyphConfig, InferenceMode};
use crate::debug;
use crate::domain::{ClassificationResult, Point3};
use crate::render::{RasterCanvas, Rasterizer};

pub struct GestureController {
    config: GlyphConfig,
    recorder: StrokeRecorder,
    rasterizer: Rasterizer,
    tensor_builder: TensorBuilder,
    engine: Arc<ClassifierEngine>,
    worker: Option<InferenceWorker>,
    canvas: RasterCanvas,
    state: SessionState,
    /// Tensor parked for the next tick in `InferenceMode::NextTick`
    pending: Option<InputTensor>,
    status: ClassifyStatus,
    elapsed: f32,
}

impl GestureController {
    /// Load the classifier and build the pipeline from configuration
    ///
    /// Fails if the configuration is invalid or the model cannot be loaded.
    pub fn init(config: GlyphConfig) -> Result<Self> {
        config.validate().context("Invalid gesture configuration")?;
        let engine = ClassifierEngine::load(&config)?;
        let rasterizer = Rasterizer::new(&config);
        let tensor_builder = TensorBuilder::new(config.channel_mode, config.canvas_size);
        Self::new(config, rasterizer, tensor_builder, engine)
    }

    /// Assemble a controller from already constructed stages
    pub fn new(
        config: GlyphConfig,
        rasterizer: Rasterizer,
        tensor_builder: TensorBuilder,
        engine: ClassifierEngine,
    ) -> Result<Self> {
        let side = rasterizer.canvas_size() as usize;
        if engine.input_shape() != [1, side, side, InputTensor::CHANNELS] {
            anyhow::bail!(
                "Canvas is {}x{} but classifier '{}' expects {:?}",
                side,
                side,
                engine.name(),
                engine.input_shape()
            );
        }

        let engine = Arc::new(engine);
        let worker = match config.inference_mode {
            InferenceMode::Worker => Some(InferenceWorker::spawn(engine.clone())?),
            InferenceMode::Inline | InferenceMode::NextTick => None,
        };
        log::info!(
            "Gesture controller ready ({:?} inference, threshold {})",
            config.inference_mode,
            config.confidence_threshold
        );

        Ok(Self {
            canvas: rasterizer.new_canvas(),
            config,
            recorder: StrokeRecorder::new(),
            rasterizer,
            tensor_builder,
            engine,
            worker,
            state: SessionState::Idle,
            pending: None,
            status: ClassifyStatus::Idle,
            elapsed: 0.0,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn status(&self) -> &ClassifyStatus {
        &self.status
    }

    /// Canvas of the current or last session
    pub fn canvas(&self) -> &RasterCanvas {
        &self.canvas
    }

    /// Points captured so far in the open session
    pub fn captured_points(&self) -> usize {
        self.recorder.len()
    }

    /// Open a new session
    ///
    /// Returns false while a session is open or pending, or while the host's
    /// cooldown is running.
    pub fn begin_session(&mut self, host: &dyn GestureHost) -> bool {
        if self.state != SessionState::Idle {
            log::debug!("Session start ignored in state {:?}", self.state);
            return false;
        }
        if host.cooldown_active() {
            log::debug!("Session start ignored during cooldown");
            return false;
        }
        self.canvas.clear();
        self.recorder.begin_session();
        self.elapsed = 0.0;
        self.state = SessionState::Recording;
        self.status = ClassifyStatus::Recording;
        true
    }

    /// Advance one frame
    ///
    /// While recording, `position` is captured if `recording_allowed` holds;
    /// otherwise the session is dropped. While finalizing, pending inference
    /// is advanced and its result dispatched to `host`.
    pub fn tick(
        &mut self,
        dt: f32,
        position: Point3,
        recording_allowed: bool,
        host: &mut dyn GestureHost,
    ) {
        match self.state {
            SessionState::Idle => {}
            SessionState::Recording => {
                self.elapsed += dt;
                if self.recorder.capture_tick(position, recording_allowed)
                    == CaptureOutcome::Aborted
                {
                    log::info!("Gesture session cancelled");
                    self.state = SessionState::Idle;
                    self.status = ClassifyStatus::Cancelled;
                }
            }
            SessionState::Finalizing => self.poll_inference(host),
        }
    }

    /// Close the session and start classification
    ///
    /// Returns the status right after the call. With deferred inference this
    /// is `Running`; the final status arrives through later ticks.
    pub fn end_session(&mut self, host: &mut dyn GestureHost) -> ClassifyStatus {
        if self.state != SessionState::Recording {
            return self.status.clone();
        }
        let Some(stroke) = self.recorder.end_session() else {
            self.state = SessionState::Idle;
            return self.status.clone();
        };
        self.state = SessionState::Finalizing;
        log::debug!(
            "Stroke finished: {} points over {:.2}s",
            stroke.len(),
            self.elapsed
        );

        if !stroke.is_drawable() {
            log::debug!("Stroke too short to classify");
            self.state = SessionState::Idle;
            self.status = ClassifyStatus::Skipped;
            return self.status.clone();
        }

        self.rasterizer.rasterize(&stroke, &mut self.canvas);
        if self.config.debug_dump
            && let Err(err) = debug::dump_canvas(&self.canvas, &self.config.debug_dir)
        {
            log::error!("Failed to dump gesture canvas: {:?}", err);
        }
        let tensor = self.tensor_builder.build(&self.canvas);

        match self.config.inference_mode {
            InferenceMode::Inline => {
                let result = self.engine.infer(&tensor);
                self.finish(result, host);
            }
            InferenceMode::NextTick => {
                self.pending = Some(tensor);
                self.status = ClassifyStatus::Running;
            }
            InferenceMode::Worker => match self.submit(tensor) {
                Ok(()) => self.status = ClassifyStatus::Running,
                Err(err) => self.finish(Err(err), host),
            },
        }
        self.status.clone()
    }

    /// Classify an externally supplied raster without dispatching
    ///
    /// Only valid between sessions, since the forward pass would otherwise
    /// overlap a pending one.
    pub fn classify_texture(&self, texture: Option<&DynamicImage>) -> ClassifyStatus {
        if self.state != SessionState::Idle {
            return ClassifyStatus::Error(format!(
                "Cannot classify a texture while a session is {:?}",
                self.state
            ));
        }
        let Some(tensor) = self.tensor_builder.build_from_image(texture) else {
            return ClassifyStatus::NoTexture;
        };
        match self.engine.infer(&tensor) {
            Ok(result) => ClassifyStatus::Done {
                result,
                emitted: result.gated(self.config.confidence_threshold),
            },
            Err(err) => ClassifyStatus::Error(format!("{:#}", err)),
        }
    }

    /// Stop the worker and release the classifier
    pub fn shutdown(mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        if self.state != SessionState::Idle {
            log::debug!("Shutting down with a {:?} session", self.state);
        }
        log::info!("Gesture controller shut down");
    }

    fn submit(&self, tensor: InputTensor) -> Result<()> {
        let worker = self
            .worker
            .as_ref()
            .context("Worker inference selected but no worker is running")?;
        worker.submit(tensor)
    }

    fn poll_inference(&mut self, host: &mut dyn GestureHost) {
        if let Some(tensor) = self.pending.take() {
            let result = self.engine.infer(&tensor);
            self.finish(result, host);
            return;
        }
        let polled = match self.worker.as_ref() {
            Some(worker) => worker.poll(),
            None => Some(Err(anyhow::anyhow!("Finalizing with no pending inference"))),
        };
        if let Some(result) = polled {
            self.finish(result, host);
        }
    }

    fn finish(&mut self, result: Result<ClassificationResult>, host: &mut dyn GestureHost) {
        self.state = SessionState::Idle;
        match result {
            Ok(result) => {
                let emitted = result.gated(self.config.confidence_threshold);
                log::info!(
                    "Gesture {} ({:.3}) -> {}",
                    result.label,
                    result.confidence,
                    emitted
                );
                host.dispatch_gesture(emitted.as_str());
                host.start_cooldown();
                self.status = ClassifyStatus::Done { result, emitted };
            }
            Err(err) => {
                log::error!("Gesture classification failed: {:#}", err);
                self.status = ClassifyStatus::Error(format!("{:#}", err));
            }
        }
    }
}
