// Clock - free-running tick source
// Drives the sequencer from a dedicated timer thread

use crate::sequencer::tempo::Tempo;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default upper bound on a single sleep inside the timing loop
pub const DEFAULT_SLEEP_GRANULARITY: Duration = Duration::from_millis(1);

/// Called once per tick with the new tick number
pub type TickCallback = Box<dyn FnMut(u64) + Send>;

/// Anything that can report the current tick
pub trait TickSource: Send + Sync {
    fn current_tick(&self) -> u64;
}

struct ClockState {
    tempo: Tempo,
    callback: Option<TickCallback>,
}

struct ClockShared {
    current_tick: AtomicU64,
    running: AtomicBool,
    // Held for the whole tick so callbacks never overlap a tempo change
    state: Mutex<ClockState>,
    sleep_granularity: Duration,
}

impl ClockShared {
    fn tick(&self) -> u64 {
        let mut state = self.state.lock();
        let tick = self.current_tick.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(callback) = state.callback.as_mut() {
            callback(tick);
        }
        tick
    }
}

/// Thread-driven clock emitting `TICKS_PER_BEAT` ticks per beat
///
/// `start` and `stop` are not reentrant; callers serialise them.
pub struct SimpleClock {
    shared: Arc<ClockShared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl SimpleClock {
    pub fn new(tempo: Tempo) -> Self {
        Self::with_sleep_granularity(tempo, DEFAULT_SLEEP_GRANULARITY)
    }

    /// Lower granularity means less jitter and more wake-ups
    pub fn with_sleep_granularity(tempo: Tempo, sleep_granularity: Duration) -> Self {
        Self {
            shared: Arc::new(ClockShared {
                current_tick: AtomicU64::new(0),
                running: AtomicBool::new(false),
                state: Mutex::new(ClockState {
                    tempo,
                    callback: None,
                }),
                sleep_granularity: sleep_granularity.max(Duration::from_micros(100)),
            }),
            thread: Mutex::new(None),
        }
    }

    /// Replace the tick callback
    ///
    /// Waits for any in-flight tick to finish.
    pub fn set_callback<F>(&self, callback: F)
    where
        F: FnMut(u64) + Send + 'static,
    {
        self.shared.state.lock().callback = Some(Box::new(callback));
    }

    /// Start the timer thread, stopping any previous one first
    pub fn start(&self) -> std::io::Result<()> {
        self.stop();

        let shared = Arc::clone(&self.shared);
        let interval = shared.state.lock().tempo.tick_interval();
        shared.running.store(true, Ordering::Release);

        let spawned = thread::Builder::new()
            .name("steptracker-clock".to_string())
            .spawn(move || run_timer(shared, interval));

        match spawned {
            Ok(handle) => {
                *self.thread.lock() = Some(handle);
                log::info!("Clock started ({:?} per tick)", interval);
                Ok(())
            }
            Err(e) => {
                self.shared.running.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Stop the timer thread and wait for it to exit
    pub fn stop(&self) {
        self.shared.running.store(false, Ordering::Release);
        if let Some(handle) = self.thread.lock().take() {
            if handle.join().is_err() {
                log::error!("Clock thread panicked");
            }
            log::info!("Clock stopped at tick {}", self.current_tick());
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Acquire)
    }

    pub fn bpm(&self) -> f64 {
        self.shared.state.lock().tempo.bpm()
    }

    /// Change tempo; a running timer restarts with the new interval
    pub fn set_bpm(&self, bpm: f64) -> std::io::Result<()> {
        let was_running = self.is_running();
        self.stop();
        self.shared.state.lock().tempo.set_bpm(bpm);
        if was_running {
            self.start()?;
        }
        Ok(())
    }

    /// Advance one tick on the caller's thread
    pub fn tick(&self) -> u64 {
        self.shared.tick()
    }
}

impl TickSource for SimpleClock {
    fn current_tick(&self) -> u64 {
        self.shared.current_tick.load(Ordering::Acquire)
    }
}

impl Drop for SimpleClock {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(shared: Arc<ClockShared>, interval: Duration) {
    let mut last_tick = Instant::now();
    while shared.running.load(Ordering::Acquire) {
        let elapsed = last_tick.elapsed();
        if elapsed >= interval {
            last_tick = Instant::now();
            shared.tick();
        } else {
            let remaining = interval - elapsed;
            thread::sleep(remaining.min(shared.sleep_granularity));
        }
    }
}

/// Clock advanced explicitly by the caller
#[derive(Debug, Default)]
pub struct ManualClock {
    current_tick: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move forward one tick and return the new tick
    pub fn advance(&self) -> u64 {
        self.current_tick.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl TickSource for ManualClock {
    fn current_tick(&self) -> u64 {
        self.current_tick.load(Ordering::Acquire)
    }
}
