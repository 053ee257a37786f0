use std::time::{Duration, Instant};

/// Per-step timing and counters, reset at the start of every internal step.
#[derive(Debug, Default, Clone, Copy)]
pub struct PhysicsProfiler {
    pub broad_phase_time: Duration,
    pub narrow_phase_time: Duration,
    pub solver_time: Duration,
    pub integrator_time: Duration,
    pub total_frame_time: Duration,

    pub body_count: usize,
    pub pair_count: usize,
    pub contact_count: usize,
    pub friction_count: usize,
    pub solver_iterations: usize,
}

impl PhysicsProfiler {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Emits the last step's breakdown at debug level.
    pub fn report(&self) {
        let total_us = self.total_frame_time.as_micros() as f32;
        if total_us < 1.0 {
            return;
        }
        let share = |d: Duration| (d.as_micros() as f32 / total_us) * 100.0;

        log::debug!(
            "bodies {} pairs {} contacts {} friction {} iterations {}",
            self.body_count,
            self.pair_count,
            self.contact_count,
            self.friction_count,
            self.solver_iterations
        );
        log::debug!(
            "step {:.2} ms: broad {:.1}% narrow {:.1}% solver {:.1}% integrate {:.1}%",
            self.total_frame_time.as_secs_f32() * 1000.0,
            share(self.broad_phase_time),
            share(self.narrow_phase_time),
            share(self.solver_time),
            share(self.integrator_time)
        );
    }
}

/// Adds the elapsed time of its scope into a profiler field.
pub struct ScopedTimer<'a> {
    start: Instant,
    output: &'a mut Duration,
}

impl<'a> ScopedTimer<'a> {
    pub fn new(output: &'a mut Duration) -> Self {
        Self {
            start: Instant::now(),
            output,
        }
    }
}

impl Drop for ScopedTimer<'_> {
    fn drop(&mut self) {
        *self.output += self.start.elapsed();
    }
}
