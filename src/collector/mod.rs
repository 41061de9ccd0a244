//! Deferred reclamation for [`crate::frame::Frame`]s.
//!
//! Frames are cheap to produce and expensive to track with precise
//! refcounting across the receive path, decode, fan-out, and whatever a
//! control package does with them afterwards. Instead of that, a frame is
//! `register`ed once and reclaimed unconditionally after a fixed window —
//! see `SPEC_FULL.md` §4.1 and Design Notes §9 ("prefer explicit ownership
//! ... but if retained, make it a cleanly scoped facility").
//!
//! This is scoped per engine instance (an `Arc<FrameCollector>` you create
//! once and pass to every constructor that produces frames), not a
//! process-global singleton.

use crate::config::EngineConfig;
use crate::frame::Frame;
use crate::log::log_sink::LogSink;
use crate::util::now_micros;
use crate::{sink_debug, sink_trace};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

struct Registered {
    frame: Arc<Frame>,
}

/// Background reclamation service for `Frame`s.
pub struct FrameCollector {
    registry: Mutex<Vec<Registered>>,
    active: AtomicBool,
    run: Arc<AtomicBool>,
    wake: Arc<(Mutex<bool>, Condvar)>,
    worker: Mutex<Option<JoinHandle<()>>>,
    window: Duration,
    tick: Duration,
    logger: Arc<dyn LogSink>,
}

impl FrameCollector {
    #[must_use]
    pub fn new(cfg: &EngineConfig, logger: Arc<dyn LogSink>) -> Arc<Self> {
        Arc::new(Self {
            registry: Mutex::new(Vec::new()),
            active: AtomicBool::new(false),
            run: Arc::new(AtomicBool::new(false)),
            wake: Arc::new((Mutex::new(false), Condvar::new())),
            worker: Mutex::new(None),
            window: cfg.collector_window,
            tick: cfg.collector_tick,
            logger,
        })
    }

    /// Register a frame for later reclamation. No-op until [`Self::start`]
    /// has been called — matching the source's behavior of tolerating
    /// registration before the collector thread exists.
    pub fn register(self: &Arc<Self>, frame: Arc<Frame>) {
        if !self.active.load(Ordering::Acquire) {
            return;
        }
        if let Ok(mut reg) = self.registry.lock() {
            reg.push(Registered { frame });
        }
    }

    /// Start the background sweep thread. Must be called before the first
    /// frame is produced, per `SPEC_FULL.md` §6.
    pub fn start(self: &Arc<Self>) {
        if self.active.swap(true, Ordering::AcqRel) {
            return;
        }
        self.run.store(true, Ordering::Release);

        let this = Arc::clone(self);
        let run = Arc::clone(&self.run);
        let wake = Arc::clone(&self.wake);
        let tick = self.tick;

        let handle = thread::Builder::new()
            .name("frame-collector".into())
            .spawn(move || {
                sink_debug!(this.logger, "frame collector started, tick={:?}", tick);
                while run.load(Ordering::Acquire) {
                    let (lock, cvar) = &*wake;
                    if let Ok(guard) = lock.lock() {
                        let _ = cvar.wait_timeout(guard, tick);
                    }
                    if !run.load(Ordering::Acquire) {
                        break;
                    }
                    this.sweep(false);
                }
                sink_debug!(this.logger, "frame collector stopped");
            })
            .ok();

        if let Ok(mut w) = self.worker.lock() {
            *w = handle;
        }
    }

    /// Stop the collector, destroying every registered frame regardless of
    /// age (`spec.md` §4.1: "stop drains destroying all regardless of age").
    pub fn stop(self: &Arc<Self>) {
        if !self.active.swap(false, Ordering::AcqRel) {
            return;
        }
        self.run.store(false, Ordering::Release);
        {
            let (lock, cvar) = &*self.wake;
            if let Ok(mut woke) = lock.lock() {
                *woke = true;
                cvar.notify_all();
            }
        }
        if let Ok(mut w) = self.worker.lock() {
            if let Some(handle) = w.take() {
                let _ = handle.join();
            }
        }
        self.sweep(true);
    }

    fn sweep(&self, drain_all: bool) {
        let now = now_micros();
        let window_us = self.window.as_micros() as u64;
        let mut reclaimed = 0usize;
        if let Ok(mut reg) = self.registry.lock() {
            let before = reg.len();
            reg.retain(|r| !(drain_all || r.frame.reclaimable_at(now, window_us)));
            reclaimed = before - reg.len();
        }
        if reclaimed > 0 {
            sink_trace!(self.logger, "collector reclaimed {reclaimed} frame(s)");
        }
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.registry.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{FrameFormat, MediaKind};
    use crate::log::NoopLogSink;

    fn collector(window_us: u64, tick_ms: u64) -> Arc<FrameCollector> {
        let mut cfg = EngineConfig::default();
        cfg.collector_window = Duration::from_micros(window_us);
        cfg.collector_tick = Duration::from_millis(tick_ms);
        FrameCollector::new(&cfg, Arc::new(NoopLogSink))
    }

    #[test]
    fn register_before_start_is_noop() {
        let c = collector(3_000_000, 50);
        let f = Arc::new(Frame::new(vec![0u8; 4], MediaKind::Audio, FrameFormat::Raw, 0));
        c.register(f);
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn stop_drains_regardless_of_age() {
        let c = collector(3_000_000, 20);
        c.start();
        let f = Arc::new(Frame::new(
            vec![0u8; 4],
            MediaKind::Audio,
            FrameFormat::Raw,
            now_micros(),
        ));
        c.register(f);
        assert_eq!(c.pending_count(), 1);
        c.stop();
        assert_eq!(c.pending_count(), 0);
    }

    #[test]
    fn reclaims_old_frames_after_ticks() {
        let c = collector(50_000, 10);
        c.start();
        let old = Arc::new(Frame::new(vec![1u8], MediaKind::Audio, FrameFormat::Raw, 0));
        c.register(old);
        std::thread::sleep(Duration::from_millis(120));
        assert_eq!(c.pending_count(), 0);
        c.stop();
    }
}
