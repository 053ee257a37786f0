use std::time::Duration;

use crate::config::WorldConfig;
use crate::utils::profiling::PhysicsProfiler;

/// Milliseconds by which `duration` overran `budget_ms`. A non-positive
/// budget disables the check.
pub fn budget_overrun_ms(duration: Duration, budget_ms: f32) -> Option<f32> {
    let elapsed_ms = duration.as_secs_f32() * 1000.0;
    (budget_ms > 0.0 && elapsed_ms > budget_ms).then(|| elapsed_ms - budget_ms)
}

/// Whether the last solve ran out of sweeps while rows were active.
pub fn solver_saturated(profiler: &PhysicsProfiler, max_iterations: u32) -> bool {
    let rows = profiler.contact_count + profiler.friction_count;
    rows > 0 && max_iterations > 0 && profiler.solver_iterations >= max_iterations as usize
}

/// Flags a finished step that ran over its time budget or left the solver
/// unconverged.
pub fn log_step_health(profiler: &PhysicsProfiler, config: &WorldConfig) {
    if let Some(over) = budget_overrun_ms(profiler.total_frame_time, config.frame_budget_ms) {
        log::warn!(
            "step over budget by {over:.2} ms ({} bodies, {} contacts)",
            profiler.body_count,
            profiler.contact_count
        );
    }
    if solver_saturated(profiler, config.solver.iterations) {
        log::debug!(
            "solver used all {} iterations on {} contact and {} friction rows",
            config.solver.iterations,
            profiler.contact_count,
            profiler.friction_count
        );
    }
}
