//! Step/render scheduler.
//!
//! A pure state machine: the host calls [`Scheduler::tick`] once per
//! presentable frame and executes the returned [`TickAction`]. No GPU types
//! appear here, so the timing policy is testable without a device.
//!
//! Frame 0 always paints the seeded state without stepping. The step counter
//! only advances when a compute dispatch is issued.

use std::time::Instant;

use crate::schema::Controls;

/// Lifecycle phase of the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Constructed or reset; the next tick paints frame 0.
    Idle,
    /// Stepping and drawing on the interval.
    Running,
    /// Cancelled; no further work is issued.
    TearingDown,
}

/// Work requested for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickAction {
    /// Draw the state current at `step` without dispatching compute.
    Draw { step: u64 },
    /// Dispatch one compute step reading the state current at `from`, then
    /// draw the result (current at `from + 1`).
    StepAndDraw { from: u64 },
    /// Nothing to do this tick.
    Wait,
    /// Teardown was requested; issue no work.
    Stopped,
}

/// Which of the two state buffers a bind group reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRoles {
    /// Index (0 = A, 1 = B) of the buffer read as current state.
    pub input: usize,
    /// Index of the buffer written as next state.
    pub output: usize,
}

impl StateRoles {
    /// Buffer roles at `step`. A function of step parity only.
    #[inline]
    pub fn for_step(step: u64) -> Self {
        let input = (step % 2) as usize;
        Self {
            input,
            output: 1 - input,
        }
    }

    /// Index of the bind group to use at `step`.
    #[inline]
    pub fn bind_group_index(step: u64) -> usize {
        Self::for_step(step).input
    }
}

/// Time-gated scheduler state.
#[derive(Debug, Clone)]
pub struct Scheduler {
    phase: SchedulerPhase,
    step: u64,
    last_step: Option<Instant>,
    repaint: bool,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            phase: SchedulerPhase::Idle,
            step: 0,
            last_step: None,
            repaint: false,
        }
    }

    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    /// Number of compute steps issued since the last reset.
    pub fn step(&self) -> u64 {
        self.step
    }

    /// Time of the last step (or of frame 0).
    pub fn last_step(&self) -> Option<Instant> {
        self.last_step
    }

    /// Back to step 0; the next tick repaints frame 0 from the seed.
    pub fn reset(&mut self) {
        self.phase = SchedulerPhase::Idle;
        self.step = 0;
        self.last_step = None;
        self.repaint = false;
    }

    /// Stop issuing work. Only [`Scheduler::reset`] resumes.
    pub fn cancel(&mut self) {
        self.phase = SchedulerPhase::TearingDown;
        self.repaint = false;
    }

    pub fn is_cancelled(&self) -> bool {
        self.phase == SchedulerPhase::TearingDown
    }

    /// Redraw the current state on the next tick that does not step.
    pub fn request_repaint(&mut self) {
        if self.phase == SchedulerPhase::Running {
            self.repaint = true;
        }
    }

    /// Decide the work for the frame presented at `now`.
    ///
    /// `playing` and the update interval are read from `controls` on every
    /// call.
    pub fn tick<C: Controls + ?Sized>(&mut self, now: Instant, controls: &C) -> TickAction {
        match self.phase {
            SchedulerPhase::TearingDown => TickAction::Stopped,
            SchedulerPhase::Idle => {
                self.phase = SchedulerPhase::Running;
                self.last_step = Some(now);
                self.repaint = false;
                TickAction::Draw { step: self.step }
            }
            SchedulerPhase::Running => {
                let due = match self.last_step {
                    Some(last) => now.saturating_duration_since(last) >= controls.update_interval(),
                    None => true,
                };

                if controls.playing() && due {
                    let from = self.step;
                    self.step += 1;
                    self.last_step = Some(now);
                    self.repaint = false;
                    TickAction::StepAndDraw { from }
                } else if self.repaint {
                    self.repaint = false;
                    TickAction::Draw { step: self.step }
                } else {
                    TickAction::Wait
                }
            }
        }
    }
}
