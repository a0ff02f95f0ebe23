//! Periodic update check scheduler.
//!
//! The period is operator-settable in whole hours (minimum 1). Changing it
//! cancels the in-flight loop and starts a new one atomically under the
//! scheduler lock, preserving the tick's wiring.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

/// One scheduler tick. Implemented by the update dispatch use-case; the
/// returned future must be `Send` because ticks run on a spawned task.
pub trait UpdateTick: Send + Sync + 'static {
    fn run(&self) -> impl Future<Output = ()> + Send;
}

pub const DEFAULT_PERIOD_HOURS: u32 = 1;

struct SchedulerState {
    period_hours: u32,
    cancel: CancellationToken,
}

pub struct Scheduler<T> {
    tick: Arc<T>,
    state: Mutex<SchedulerState>,
}

impl<T: UpdateTick> Scheduler<T> {
    pub fn new(tick: T) -> Self {
        Self {
            tick: Arc::new(tick),
            state: Mutex::new(SchedulerState {
                period_hours: DEFAULT_PERIOD_HOURS,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Start the periodic loop with the current period.
    pub fn start(&self) {
        let mut state = self.state.lock().unwrap();
        self.spawn_loop(&mut state);
    }

    /// Apply a new period (clamped to at least one hour), replacing the
    /// running loop. Returns the applied value.
    pub fn set_period_hours(&self, hours: u32) -> u32 {
        let hours = hours.max(1);
        let mut state = self.state.lock().unwrap();
        state.period_hours = hours;
        state.cancel.cancel();
        self.spawn_loop(&mut state);
        info!(hours, "update check period changed");
        hours
    }

    pub fn period_hours(&self) -> u32 {
        self.state.lock().unwrap().period_hours
    }

    /// Stop the running loop.
    pub fn stop(&self) {
        self.state.lock().unwrap().cancel.cancel();
    }

    fn spawn_loop(&self, state: &mut SchedulerState) {
        let cancel = CancellationToken::new();
        state.cancel = cancel.clone();
        let period = Duration::from_secs(u64::from(state.period_hours) * 3600);
        let tick = Arc::clone(&self.tick);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            // The interval's first tick is immediate; the first check is due
            // one full period after start.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => tick.run().await,
                }
            }
        });
    }
}
