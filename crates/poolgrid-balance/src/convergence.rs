//! Convergence engine — bounded per-cycle step toward a desired count.

use crate::options::SupervisorOptions;

/// Compute a pool's next process count.
///
/// `current_total` is the live process count across all pools, including
/// this one. The step is bounded by `balance_max_shift` and the remaining
/// budget; a scale-up also leaves `min_processes` for every other pool.
/// `desired` is held to `[min_processes, max_processes]` before comparing,
/// so a pool below the floor is raised even when its target is zero.
/// Returns `current` when no move should be made.
pub fn converge(
    current: u32,
    current_total: u32,
    desired: u32,
    pool_count: usize,
    options: &SupervisorOptions,
) -> u32 {
    let min = options.min_processes;
    let max = options.max_processes;
    let shift = options.balance_max_shift;
    let ceiling = max.max(min);
    let desired = desired.clamp(min, ceiling);

    let next = if desired > current {
        let max_up_shift = max.saturating_sub(current_total).min(shift);
        let sibling_floors = u64::from(min) * pool_count.saturating_sub(1) as u64;
        let reserve_cap = u64::from(max).saturating_sub(sibling_floors) as u32;
        current
            .saturating_add(max_up_shift)
            .min(reserve_cap)
            .min(desired)
            .max(current)
    } else if desired < current {
        let max_down_shift = current_total.saturating_sub(min).min(shift);
        current
            .saturating_sub(max_down_shift)
            .max(min)
            .max(desired)
    } else {
        return current;
    };

    next.clamp(min, ceiling)
}
