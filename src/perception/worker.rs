//! Background perception thread
//!
//! Frames go in through a single-slot channel; a frame submitted while the
//! worker is busy is dropped rather than queued, so the estimate never lags
//! more than one frame behind. Results are read back non-blocking.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TryRecvError, TrySendError, bounded, unbounded};

use super::{Frame, PerceptionPipeline};
use crate::error::{SimError, SimResult};
use crate::perception::LaneObservation;

pub struct PerceptionWorker {
    frames: Option<Sender<Frame>>,
    results: Receiver<SimResult<LaneObservation>>,
    handle: Option<JoinHandle<()>>,
    dropped: u64,
}

impl PerceptionWorker {
    pub fn spawn(pipeline: PerceptionPipeline) -> SimResult<Self> {
        let (frame_tx, frame_rx) = bounded::<Frame>(1);
        let (result_tx, result_rx) = unbounded();

        let handle = thread::Builder::new()
            .name("perception".into())
            .spawn(move || {
                log::debug!("Perception worker started");
                for frame in frame_rx.iter() {
                    if result_tx.send(pipeline.process(&frame)).is_err() {
                        break;
                    }
                }
                log::debug!("Perception worker stopped");
            })?;

        Ok(Self {
            frames: Some(frame_tx),
            results: result_rx,
            handle: Some(handle),
            dropped: 0,
        })
    }

    /// Hand a frame to the worker. Returns false if it was dropped because
    /// the previous frame is still pending.
    pub fn submit(&mut self, frame: Frame) -> SimResult<bool> {
        let Some(tx) = &self.frames else {
            return Err(SimError::config("perception worker already shut down"));
        };
        match tx.try_send(frame) {
            Ok(()) => Ok(true),
            Err(TrySendError::Full(_)) => {
                self.dropped += 1;
                log::trace!("Perception busy, frame dropped ({} total)", self.dropped);
                Ok(false)
            }
            Err(TrySendError::Disconnected(_)) => Err(SimError::config("perception worker exited")),
        }
    }

    /// Most recent finished result, if any arrived since the last call
    pub fn latest(&self) -> Option<SimResult<LaneObservation>> {
        let mut latest = None;
        loop {
            match self.results.try_recv() {
                Ok(result) => latest = Some(result),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        latest
    }

    /// Block until the next result arrives
    pub fn wait(&self) -> Option<SimResult<LaneObservation>> {
        self.results.recv().ok()
    }

    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }

    /// Close the frame channel and join the thread
    pub fn shutdown(&mut self) {
        self.frames = None;
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Perception worker panicked");
            }
        }
    }
}

impl Drop for PerceptionWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn blank() -> Frame {
        Frame::from_image(RgbImage::from_pixel(64, 48, Rgb([40, 40, 40]))).unwrap()
    }

    #[test]
    fn test_worker_round_trip() {
        let mut worker = PerceptionWorker::spawn(PerceptionPipeline::default()).unwrap();
        assert!(worker.submit(blank()).unwrap());
        let result = worker.wait().unwrap().unwrap();
        assert!(result.lane_center.is_none());
        worker.shutdown();
    }

    #[test]
    fn test_busy_worker_drops_frames() {
        let mut worker = PerceptionWorker::spawn(PerceptionPipeline::default()).unwrap();
        // full-size frames keep the worker busy far longer than a submit takes
        let frames: Vec<Frame> = (0..20)
            .map(|_| Frame::from_image(RgbImage::from_pixel(800, 600, Rgb([40, 40, 40]))).unwrap())
            .collect();
        let accepted: Vec<bool> = frames.into_iter().map(|f| worker.submit(f).unwrap()).collect();
        assert!(accepted[0]);
        assert!(accepted.contains(&false), "{accepted:?}");
        let dropped = accepted.iter().filter(|a| !**a).count() as u64;
        assert_eq!(worker.dropped_frames(), dropped);
        worker.shutdown();
    }

    #[test]
    fn test_submit_after_shutdown_fails() {
        let mut worker = PerceptionWorker::spawn(PerceptionPipeline::default()).unwrap();
        worker.shutdown();
        assert!(worker.submit(blank()).is_err());
        assert!(worker.latest().is_none());
    }
}
