//! Background inference worker
//!
//! A single thread owns a shared handle to the classifier. Jobs go through a
//! one-slot queue, so at most one tensor is ever waiting, and results come back
//! through a one-slot completion channel polled by the controller.

use anyhow::{Context, Result};
use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::engine::ClassifierEngine;
use super::tensor::InputTensor;
use crate::domain::ClassificationResult;

pub struct InferenceWorker {
    jobs: Option<Sender<InputTensor>>,
    results: Option<Receiver<Result<ClassificationResult>>>,
    handle: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Start the worker thread
    pub fn spawn(engine: Arc<ClassifierEngine>) -> Result<Self> {
        let (job_tx, job_rx) = crossbeam_channel::bounded::<InputTensor>(1);
        let (result_tx, result_rx) = crossbeam_channel::bounded(1);

        let handle = std::thread::Builder::new()
            .name("glyphcast-infer".to_string())
            .spawn(move || {
                for tensor in job_rx.iter() {
                    let result = engine.infer(&tensor);
                    if result_tx.send(result).is_err() {
                        break;
                    }
                }
                log::debug!("Inference worker exiting");
            })
            .context("Failed to spawn inference worker")?;

        Ok(Self {
            jobs: Some(job_tx),
            results: Some(result_rx),
            handle: Some(handle),
        })
    }

    /// Queue a tensor. Fails if a job is already waiting.
    pub fn submit(&self, tensor: InputTensor) -> Result<()> {
        let jobs = self.jobs.as_ref().context("Inference worker is shut down")?;
        match jobs.try_send(tensor) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => anyhow::bail!("An inference job is already pending"),
            Err(TrySendError::Disconnected(_)) => anyhow::bail!("Inference worker has stopped"),
        }
    }

    /// Completed result, if one is ready
    pub fn poll(&self) -> Option<Result<ClassificationResult>> {
        let results = self.results.as_ref()?;
        match results.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                Some(Err(anyhow::anyhow!("Inference worker has stopped")))
            }
        }
    }

    /// Stop accepting jobs and join the thread
    pub fn shutdown(&mut self) {
        // Closing both queues ends the worker loop, even mid-send
        self.jobs.take();
        self.results.take();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            log::error!("Inference worker panicked");
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
