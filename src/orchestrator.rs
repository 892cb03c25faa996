//! Channel orchestrator: one render worker per audio channel.
//!
//! `dispatch` starts one worker thread per slot and returns immediately.
//! A slot that is still busy when a new request arrives has its worker
//! cancelled and replaced. The cancelled worker stops at its next stage
//! boundary; anything it still manages to send carries an old generation
//! tag and is dropped on arrival. When every slot dispatched
//! in the current generation has reported, the buffers are derived into
//! the output channels, post-processed, and handed to the callback.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use log::{debug, warn};

use crate::dsp::renderer::{finish, render_channel_cancellable};
use crate::error::{RequestError, WaveSynthError};
use crate::params::{ParameterSet, RenderOptions, RenderRequest};
use crate::wave::Wave;

/// How often `pump_blocking` checks for workers that died without reporting.
const WORKER_POLL: Duration = Duration::from_millis(20);

/// A finished channel render, tagged with the generation that asked for it.
#[derive(Debug)]
pub struct ChannelResult {
    pub channel: usize,
    pub generation: u64,
    pub samples: Vec<f32>,
}

/// The job currently owned by one worker slot.
#[derive(Debug)]
pub struct RenderJob {
    pub channel: usize,
    pub generation: u64,
    pub params: ParameterSet,
    pub is_running: bool,
    cancel: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl RenderJob {
    fn worker_lost(&self) -> bool {
        self.is_running && self.worker.as_ref().is_some_and(|w| w.is_finished())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}

/// The render cycle waiting on its barrier.
struct Cycle {
    generation: u64,
    request: RenderRequest,
    options: RenderOptions,
    buffers: Vec<Option<Vec<f32>>>,
    completed: usize,
}

pub struct ChannelOrchestrator {
    slots: Vec<Option<RenderJob>>,
    generation: u64,
    cycle: Option<Cycle>,
    tx: Sender<ChannelResult>,
    rx: Receiver<ChannelResult>,
    on_complete: Box<dyn FnMut(Wave) + Send>,
}

impl ChannelOrchestrator {
    /// Create an orchestrator with `channels` worker slots.
    pub fn new(channels: usize, on_complete: impl FnMut(Wave) + Send + 'static) -> Self {
        let (tx, rx) = unbounded();
        ChannelOrchestrator {
            slots: (0..channels).map(|_| None).collect(),
            generation: 0,
            cycle: None,
            tx,
            rx,
            on_complete: Box::new(on_complete),
        }
    }

    pub fn channels(&self) -> usize {
        self.slots.len()
    }

    /// Generation of the most recent dispatch (0 before the first).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when no cycle is waiting on its barrier.
    pub fn is_idle(&self) -> bool {
        self.cycle.is_none()
    }

    pub fn job(&self, channel: usize) -> Option<&RenderJob> {
        self.slots.get(channel).and_then(Option::as_ref)
    }

    /// Validate `request` and start one worker per slot it needs.
    ///
    /// Returns the new generation. A rejected request starts nothing and
    /// leaves any in-flight cycle untouched.
    pub fn dispatch(&mut self, request: RenderRequest, options: RenderOptions) -> Result<u64, WaveSynthError> {
        request.validate()?;
        let count = request.dispatch_count();
        if count > self.slots.len() {
            return Err(RequestError::TooManyChannels {
                requested: count,
                available: self.slots.len(),
            }
            .into());
        }

        self.generation += 1;
        let generation = self.generation;

        for params in request.channel_params() {
            let channel = params.channel_index;
            if let Some(previous) = self.slots[channel].take() {
                if previous.is_running {
                    previous.cancel.store(true, Ordering::Relaxed);
                    debug!(
                        "channel {channel}: cancelling generation {} for {generation}",
                        previous.generation
                    );
                }
            }
            let cancel = Arc::new(AtomicBool::new(false));
            let worker = spawn_worker(channel, generation, params.clone(), Arc::clone(&cancel), self.tx.clone());
            self.slots[channel] = Some(RenderJob {
                channel,
                generation,
                params,
                is_running: true,
                cancel,
                worker: Some(worker),
            });
        }

        debug!(
            "generation {generation}: dispatched {count} of {} channel(s), mode {:?}",
            request.total_channels, request.channel_mode
        );
        self.cycle = Some(Cycle {
            generation,
            request,
            options,
            buffers: vec![None; count],
            completed: 0,
        });
        Ok(generation)
    }

    /// Handle every result already waiting, without blocking.
    /// Returns true if this call completed a cycle.
    pub fn pump(&mut self) -> bool {
        let mut finished = false;
        while let Ok(result) = self.rx.try_recv() {
            finished |= self.deliver(result);
        }
        finished
    }

    /// Wait until the current cycle completes.
    ///
    /// Returns false if there was nothing to wait for, or if a worker
    /// exited without reporting (the cycle is then abandoned).
    pub fn pump_blocking(&mut self) -> bool {
        while self.cycle.is_some() {
            match self.rx.recv_timeout(WORKER_POLL) {
                Ok(result) => {
                    if self.deliver(result) {
                        return true;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {
                    if self.current_worker_lost() && self.rx.is_empty() {
                        warn!("generation {}: a worker exited without a result", self.generation);
                        self.cycle = None;
                        return false;
                    }
                }
                Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
        false
    }

    fn current_worker_lost(&self) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|job| job.generation == self.generation && job.worker_lost())
    }

    /// Apply one worker result. Returns true if it completed the cycle.
    fn deliver(&mut self, result: ChannelResult) -> bool {
        let Some(job) = self.slots.get_mut(result.channel).and_then(Option::as_mut) else {
            debug!("result for unknown channel {} dropped", result.channel);
            return false;
        };
        if job.generation != result.generation || !job.is_running {
            debug!(
                "channel {}: dropping stale result from generation {} (current {})",
                result.channel, result.generation, job.generation
            );
            return false;
        }
        job.is_running = false;
        job.worker = None;

        let Some(cycle) = self.cycle.as_mut() else {
            return false;
        };
        if cycle.generation != result.generation {
            return false;
        }
        if let Some(slot) = cycle.buffers.get_mut(result.channel) {
            if slot.is_none() {
                cycle.completed += 1;
            }
            *slot = Some(result.samples);
        }
        if cycle.completed < cycle.buffers.len() {
            return false;
        }

        let Some(cycle) = self.cycle.take() else {
            return false;
        };
        let buffers: Vec<Vec<f32>> = cycle.buffers.into_iter().flatten().collect();
        let wave = finish(&cycle.request, &cycle.options, buffers);
        debug!(
            "generation {}: all channels in, {} x {} frames",
            cycle.generation, wave.channels, wave.frames
        );
        (self.on_complete)(wave);
        true
    }
}

fn spawn_worker(
    channel: usize,
    generation: u64,
    params: ParameterSet,
    cancel: Arc<AtomicBool>,
    tx: Sender<ChannelResult>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let Some(samples) = render_channel_cancellable(&params, &cancel) else {
            debug!("channel {channel}: generation {generation} cancelled");
            return;
        };
        // the receiver only goes away with the orchestrator
        let _ = tx.send(ChannelResult { channel, generation, samples });
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::renderer::{render_channel, render_wave};
    use crate::params::{BaseShape, ChannelMode, RenderLength};
    use std::sync::{Arc, Mutex};

    fn quick(seed: u64) -> ParameterSet {
        ParameterSet {
            seed,
            base_shape: BaseShape::Saw,
            length: RenderLength::Seconds(0.05),
            over_sampling: 2,
            ..Default::default()
        }
    }

    fn collector(channels: usize) -> (ChannelOrchestrator, Arc<Mutex<Vec<Wave>>>) {
        let waves = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&waves);
        let orchestrator = ChannelOrchestrator::new(channels, move |wave| {
            sink.lock().expect("poisoned").push(wave);
        });
        (orchestrator, waves)
    }

    #[test]
    fn stereo_cycle_delivers_once() {
        let (mut orch, waves) = collector(2);
        let request = RenderRequest::new(quick(4), 2, ChannelMode::Independent);
        let generation = orch.dispatch(request.clone(), RenderOptions::default()).expect("dispatch failed");
        assert_eq!(generation, 1);
        assert!(orch.pump_blocking());
        assert!(orch.is_idle());

        let waves = waves.lock().expect("poisoned");
        assert_eq!(waves.len(), 1);
        let expected = render_wave(&request, &RenderOptions::default()).expect("render failed");
        assert_eq!(waves[0], expected);
        assert_ne!(waves[0].data[0], waves[0].data[1]);
    }

    #[test]
    fn superseded_generation_never_delivers() {
        let (mut orch, waves) = collector(2);
        let first = RenderRequest::new(quick(1), 2, ChannelMode::Independent);
        let second = RenderRequest::new(quick(2), 2, ChannelMode::Independent);
        orch.dispatch(first, RenderOptions::default()).expect("dispatch failed");
        let stale_workers: Vec<JoinHandle<()>> =
            orch.slots.iter_mut().flatten().filter_map(|job| job.worker.take()).collect();
        assert_eq!(stale_workers.len(), 2);

        let generation = orch.dispatch(second.clone(), RenderOptions::default()).expect("dispatch failed");
        assert_eq!(generation, 2);
        assert!(orch.pump_blocking());

        // whatever the old workers sent is queued once they have exited
        for worker in stale_workers {
            worker.join().expect("stale worker panicked");
        }
        orch.pump();

        let waves = waves.lock().expect("poisoned");
        assert_eq!(waves.len(), 1, "only the latest generation may complete");
        let expected = render_wave(&second, &RenderOptions::default()).expect("render failed");
        assert_eq!(waves[0], expected);
    }

    #[test]
    fn superseded_job_is_cancelled() {
        let (mut orch, waves) = collector(1);
        let slow = ParameterSet { length: RenderLength::Seconds(2.0), over_sampling: 16, ..quick(0) };
        orch.dispatch(RenderRequest::new(slow, 1, ChannelMode::Mono), RenderOptions::default())
            .expect("dispatch failed");
        let cancel = Arc::clone(&orch.job(0).expect("no job").cancel);
        let stale_worker = orch.slots[0].as_mut().and_then(|job| job.worker.take()).expect("no worker");
        assert!(!cancel.load(Ordering::Relaxed));

        let latest = RenderRequest::new(quick(1), 1, ChannelMode::Mono);
        orch.dispatch(latest.clone(), RenderOptions::default()).expect("dispatch failed");
        assert!(cancel.load(Ordering::Relaxed), "superseded job kept running");
        assert!(orch.job(0).is_some_and(|j| j.generation == 2 && !j.is_cancelled()));

        stale_worker.join().expect("stale worker panicked");
        assert!(orch.pump_blocking());
        let waves = waves.lock().expect("poisoned");
        assert_eq!(waves.len(), 1);
        let expected = render_wave(&latest, &RenderOptions::default()).expect("render failed");
        assert_eq!(waves[0], expected);
    }

    #[test]
    fn stale_result_is_ignored() {
        let (mut orch, waves) = collector(1);
        orch.dispatch(RenderRequest::new(quick(0), 1, ChannelMode::Mono), RenderOptions::default())
            .expect("dispatch failed");
        orch.dispatch(RenderRequest::new(quick(9), 1, ChannelMode::Mono), RenderOptions::default())
            .expect("dispatch failed");

        let stale = ChannelResult { channel: 0, generation: 1, samples: vec![0.25; 8] };
        assert!(!orch.deliver(stale));
        assert!(orch.job(0).is_some_and(|j| j.is_running && j.generation == 2));
        assert!(!orch.is_idle());

        assert!(orch.pump_blocking());
        let waves = waves.lock().expect("poisoned");
        assert_eq!(waves.len(), 1);
        assert_ne!(waves[0].frames, 8);
    }

    #[test]
    fn barrier_waits_for_every_channel() {
        let (mut orch, waves) = collector(2);
        orch.dispatch(RenderRequest::new(quick(0), 2, ChannelMode::Independent), RenderOptions::default())
            .expect("dispatch failed");
        // feed channel 0 by hand; the barrier must still hold for channel 1
        let fake = ChannelResult { channel: 0, generation: 1, samples: render_channel(&quick(0)) };
        orch.deliver(fake);
        assert!(waves.lock().expect("poisoned").is_empty());
        assert!(!orch.is_idle());
        assert!(orch.pump_blocking());
        assert_eq!(waves.lock().expect("poisoned").len(), 1);
    }

    #[test]
    fn phase_mode_uses_one_worker() {
        let (mut orch, waves) = collector(2);
        // edge fades are applied per channel after rotation, so leave them off here
        let options = RenderOptions { normalize: true, fade: false };
        orch.dispatch(RenderRequest::new(quick(5), 2, ChannelMode::Phase), options)
            .expect("dispatch failed");
        assert!(orch.job(1).is_none());
        assert!(orch.pump_blocking());

        let waves = waves.lock().expect("poisoned");
        let wave = &waves[0];
        assert_eq!(wave.channels, 2);
        let mut rotated = wave.data[0].clone();
        crate::wave::rotate(&mut rotated, wave.frames / 2);
        assert_eq!(rotated, wave.data[1]);
    }

    #[test]
    fn invalid_request_starts_nothing() {
        let (mut orch, _waves) = collector(2);
        let bad = RenderRequest::new(ParameterSet { base_frequency: 0.0, ..quick(0) }, 2, ChannelMode::Independent);
        assert!(orch.dispatch(bad, RenderOptions::default()).is_err());
        assert_eq!(orch.generation(), 0);
        assert!(orch.job(0).is_none() && orch.job(1).is_none());
        assert!(!orch.pump_blocking());
    }

    #[test]
    fn too_many_channels_is_rejected() {
        let (mut orch, _waves) = collector(1);
        let request = RenderRequest::new(quick(0), 2, ChannelMode::Independent);
        assert_eq!(
            orch.dispatch(request, RenderOptions::default()),
            Err(WaveSynthError::Request(RequestError::TooManyChannels { requested: 2, available: 1 }))
        );
    }
}
