//! Frame scheduling
//!
//! Variable frame deltas become a whole number of fixed simulation ticks.
//! Delayed actions are plain data advanced in simulation time, so tearing an
//! instance down simply drops them.

use serde::{Deserialize, Serialize};

use crate::consts::{MAX_FRAME_DT, MAX_SUBSTEPS, SIM_DT};

/// Fixed timestep accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedTimestep {
    dt: f32,
    accumulator: f32,
    max_steps: u32,
}

impl Default for FixedTimestep {
    fn default() -> Self {
        Self::new(SIM_DT)
    }
}

impl FixedTimestep {
    pub fn new(dt: f32) -> Self {
        Self {
            dt: if dt > 0.0 && dt.is_finite() { dt } else { SIM_DT },
            accumulator: 0.0,
            max_steps: MAX_SUBSTEPS,
        }
    }

    /// Add a frame delta (seconds) and return how many ticks to run.
    ///
    /// Deltas are clamped to `MAX_FRAME_DT` and steps to `MAX_SUBSTEPS`, so
    /// a long stall (tab in background) never triggers a catch-up burst.
    pub fn accumulate(&mut self, frame_dt: f32) -> u32 {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.clamp(0.0, MAX_FRAME_DT)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let mut steps = 0;
        while self.accumulator >= self.dt && steps < self.max_steps {
            self.accumulator -= self.dt;
            steps += 1;
        }
        steps
    }

    /// Interpolation alpha between ticks (0.0 to 1.0)
    pub fn alpha(&self) -> f32 {
        (self.accumulator / self.dt).clamp(0.0, 1.0)
    }

    pub fn dt(&self) -> f32 {
        self.dt
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }
}

/// Start/stop wrapper around the accumulator
#[derive(Debug, Clone, Default)]
pub struct Scheduler {
    timestep: FixedTimestep,
    running: bool,
}

impl Scheduler {
    pub fn new(dt: f32) -> Self {
        Self {
            timestep: FixedTimestep::new(dt),
            running: false,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            self.timestep.reset();
            self.running = true;
        }
    }

    pub fn stop(&mut self) {
        self.running = false;
        self.timestep.reset();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn timestep(&self) -> &FixedTimestep {
        &self.timestep
    }

    /// Number of fixed ticks due for a frame of `frame_dt` seconds
    /// (always 0 while stopped)
    pub fn due(&mut self, frame_dt: f32) -> u32 {
        if !self.running {
            return 0;
        }
        self.timestep.accumulate(frame_dt)
    }
}

/// Handle for cancelling a scheduled action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskHandle(u32);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Pending<A> {
    handle: TaskHandle,
    remaining_ms: f32,
    action: A,
}

/// Actions waiting for simulation time to pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayedTasks<A> {
    pending: Vec<Pending<A>>,
    next_handle: u32,
}

impl<A> Default for DelayedTasks<A> {
    fn default() -> Self {
        Self {
            pending: Vec::new(),
            next_handle: 0,
        }
    }
}

impl<A> DelayedTasks<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to come due after `after_ms` of simulation time
    pub fn schedule(&mut self, after_ms: f32, action: A) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle = self.next_handle.wrapping_add(1);
        self.pending.push(Pending {
            handle,
            remaining_ms: after_ms.max(0.0),
            action,
        });
        handle
    }

    /// Drop a pending action. Returns false if it already fired or was cleared.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.handle != handle);
        self.pending.len() != before
    }

    /// Advance time and return every action that came due, in schedule order
    pub fn advance(&mut self, dt_ms: f32) -> Vec<A> {
        for p in self.pending.iter_mut() {
            p.remaining_ms -= dt_ms;
        }
        let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|p| p.remaining_ms <= 0.0);
        self.pending = waiting;
        due.into_iter().map(|p| p.action).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_step_exact() {
        let mut ts = FixedTimestep::new(1.0 / 60.0);
        assert_eq!(ts.accumulate(1.0 / 60.0), 1);
    }

    #[test]
    fn test_accumulates_partial() {
        let mut ts = FixedTimestep::new(1.0 / 60.0);
        assert_eq!(ts.accumulate(0.008), 0);
        assert_eq!(ts.accumulate(0.010), 1);
    }

    #[test]
    fn test_long_stall_is_capped() {
        let mut ts = FixedTimestep::new(1.0 / 64.0);
        // A 5 second stall counts as 0.1 s: 6 ticks, under the substep cap
        assert_eq!(ts.accumulate(5.0), 6);
        assert!(ts.accumulate(f32::NAN) <= 1);
    }

    #[test]
    fn test_substep_cap() {
        let mut ts = FixedTimestep::new(0.001);
        assert_eq!(ts.accumulate(0.1), MAX_SUBSTEPS);
    }

    #[test]
    fn test_stopped_scheduler_runs_nothing() {
        let mut scheduler = Scheduler::new(1.0 / 64.0);
        assert_eq!(scheduler.due(0.05), 0);
        scheduler.start();
        assert_eq!(scheduler.due(0.05), 3);
        scheduler.stop();
        assert_eq!(scheduler.due(0.05), 0);
    }

    #[test]
    fn test_delayed_fires_once_when_due() {
        let mut tasks = DelayedTasks::new();
        tasks.schedule(50.0, "hop");
        assert!(tasks.advance(30.0).is_empty());
        assert_eq!(tasks.advance(30.0), vec!["hop"]);
        assert!(tasks.advance(100.0).is_empty());
    }

    #[test]
    fn test_delayed_order_and_cancel() {
        let mut tasks = DelayedTasks::new();
        let a = tasks.schedule(10.0, 1);
        tasks.schedule(10.0, 2);
        tasks.schedule(5.0, 3);
        assert!(tasks.cancel(a));
        assert!(!tasks.cancel(a));
        assert_eq!(tasks.advance(10.0), vec![2, 3]);
    }

    #[test]
    fn test_cleared_tasks_never_fire() {
        let mut tasks = DelayedTasks::new();
        tasks.schedule(2000.0, "next wave");
        tasks.clear();
        assert!(tasks.advance(5000.0).is_empty());
    }
}
