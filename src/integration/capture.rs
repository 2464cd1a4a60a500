//! Per-camera acquisition threads with a per-tick rendezvous.

use std::collections::BTreeMap;
use std::fmt::Display;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError, bounded};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::integration::detector::DetectionSource;
use crate::tracker::Detection;

type Reply = std::result::Result<Vec<Detection>, String>;

struct CameraWorker {
    camera: usize,
    requests: Sender<u64>,
    replies: Receiver<(u64, Reply)>,
    next_seq: u64,
    /// Request still being served after its tick gave up on it
    outstanding: Option<u64>,
    alive: bool,
}

impl CameraWorker {
    /// Discard answers to requests whose tick already timed out.
    fn drain_late_replies(&mut self) {
        loop {
            match self.replies.try_recv() {
                Ok((seq, _)) => {
                    if self.outstanding == Some(seq) {
                        self.outstanding = None;
                    }
                    debug!(camera = self.camera, seq, "discarding late frame");
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    info!(camera = self.camera, "camera stopped");
                    self.alive = false;
                    break;
                }
            }
        }
    }
}

/// Runs each [`DetectionSource`] on its own thread.
///
/// [`CaptureHub::collect`] asks every live camera for a frame and waits at
/// most `timeout` for the answers. Cameras that fail, time out or have
/// stopped are left out of that tick. A camera that timed out gets no new
/// request until its late answer arrives, and that answer is dropped so a
/// frame never lands in a later tick.
pub struct CaptureHub {
    workers: Vec<CameraWorker>,
    timeout: Duration,
}

impl CaptureHub {
    pub fn new(timeout: Duration) -> Self {
        Self {
            workers: Vec::new(),
            timeout,
        }
    }

    pub fn spawn<D>(&mut self, camera: usize, mut source: D) -> Result<()>
    where
        D: DetectionSource + Send + 'static,
        D::Error: Display,
    {
        let (request_tx, request_rx) = bounded::<u64>(1);
        let (reply_tx, reply_rx) = bounded::<(u64, Reply)>(1);

        thread::Builder::new()
            .name(format!("camera-{camera}"))
            .spawn(move || {
                while let Ok(seq) = request_rx.recv() {
                    let reply = source.detect().map_err(|e| e.to_string());
                    if reply_tx.send((seq, reply)).is_err() {
                        break;
                    }
                    if source.is_finished() {
                        debug!(camera, "detection source finished");
                        break;
                    }
                }
            })?;

        info!(camera, "camera capture started");
        self.workers.push(CameraWorker {
            camera,
            requests: request_tx,
            replies: reply_rx,
            next_seq: 0,
            outstanding: None,
            alive: true,
        });
        Ok(())
    }

    pub fn cameras(&self) -> impl Iterator<Item = usize> + '_ {
        self.workers.iter().map(|w| w.camera)
    }

    pub fn live_cameras(&self) -> usize {
        self.workers.iter().filter(|w| w.alive).count()
    }

    /// Gather one frame per live camera.
    pub fn collect(&mut self) -> BTreeMap<usize, Vec<Detection>> {
        let mut asked = Vec::with_capacity(self.workers.len());

        for (idx, worker) in self.workers.iter_mut().enumerate() {
            if !worker.alive {
                continue;
            }
            worker.drain_late_replies();
            if !worker.alive {
                continue;
            }
            if let Some(seq) = worker.outstanding {
                debug!(camera = worker.camera, seq, "camera still busy with an earlier frame");
                continue;
            }

            let seq = worker.next_seq;
            match worker.requests.try_send(seq) {
                Ok(()) => {
                    worker.next_seq += 1;
                    worker.outstanding = Some(seq);
                    asked.push((idx, seq));
                }
                Err(TrySendError::Full(_)) => {
                    warn!(camera = worker.camera, "camera request queue is full");
                }
                Err(TrySendError::Disconnected(_)) => {
                    info!(camera = worker.camera, "camera stopped");
                    worker.alive = false;
                }
            }
        }

        let deadline = Instant::now() + self.timeout;
        let mut frames = BTreeMap::new();
        for (idx, expected) in asked {
            let worker = &mut self.workers[idx];
            loop {
                match worker.replies.recv_deadline(deadline) {
                    Ok((seq, reply)) if seq == expected => {
                        worker.outstanding = None;
                        match reply {
                            Ok(detections) => {
                                frames.insert(worker.camera, detections);
                            }
                            Err(e) => {
                                warn!(camera = worker.camera, error = %e, "failed to read from camera")
                            }
                        }
                        break;
                    }
                    Ok((seq, _)) => {
                        debug!(camera = worker.camera, seq, "discarding late frame");
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        warn!(camera = worker.camera, "camera did not deliver a frame in time");
                        break;
                    }
                    Err(RecvTimeoutError::Disconnected) => {
                        info!(camera = worker.camera, "camera stopped");
                        worker.alive = false;
                        break;
                    }
                }
            }
        }
        frames
    }
}
