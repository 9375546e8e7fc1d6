//! EWMA-driven worker mix retargeting (spec.md §4.8).
//!
//! Pure state + pure tick function: the scheduler owns one [`Autoscaler`]
//! and turns its [`ScaleActions`] into real `spawn`/`stop` calls against its
//! worker pool. Nothing here touches I/O or channels.

use crate::config::{
    AUTOSCALE_TARGET_DRAIN_MS, DEFAULT_HYBRID_ACTIVE_MS, DEFAULT_MARKDOWN_ACTIVE_MS,
    DEFAULT_MARKDOWN_UNAVAILABLE_RATE, EWMA_ALPHA, MAX_SPAWN_PER_TICK, MAX_STOP_PER_TICK,
    MIN_WORKERS_PER_KIND, MIN_TOTAL_WORKERS,
};
use crate::job::WorkerKind;

/// Snapshot the scheduler feeds the autoscaler each tick.
#[derive(Debug, Clone, Copy)]
pub struct TickInputs {
    pub pending_markdown: usize,
    pub pending_hybrid: usize,
    pub in_flight_markdown: usize,
    pub in_flight_hybrid: usize,
    pub idle_markdown: usize,
    pub idle_hybrid: usize,
    pub max_total_workers: usize,
}

/// What the scheduler should do this tick; counts only, no identities —
/// the scheduler picks which idle workers to stop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleActions {
    pub spawn_markdown: usize,
    pub spawn_hybrid: usize,
    pub stop_markdown: usize,
    pub stop_hybrid: usize,
}

pub struct Autoscaler {
    markdown_active_ms: f64,
    hybrid_active_ms: f64,
    markdown_unavailable_rate: f64,
}

impl Autoscaler {
    pub fn new() -> Self {
        Self {
            markdown_active_ms: DEFAULT_MARKDOWN_ACTIVE_MS,
            hybrid_active_ms: DEFAULT_HYBRID_ACTIVE_MS,
            markdown_unavailable_rate: DEFAULT_MARKDOWN_UNAVAILABLE_RATE,
        }
    }

    fn ewma_update(x: &mut f64, sample: f64) {
        if sample.is_finite() {
            *x = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * *x;
        }
    }

    /// Record one worker's active time (`fetch` onward to terminal).
    pub fn observe_active_ms(&mut self, kind: WorkerKind, active_ms: u64) {
        match kind {
            WorkerKind::Markdown => Self::ewma_update(&mut self.markdown_active_ms, active_ms as f64),
            WorkerKind::Hybrid => Self::ewma_update(&mut self.hybrid_active_ms, active_ms as f64),
        }
    }

    /// Record whether a markdown-source attempt ended up unavailable.
    pub fn observe_markdown_unavailable(&mut self, unavailable: bool) {
        Self::ewma_update(
            &mut self.markdown_unavailable_rate,
            if unavailable { 1.0 } else { 0.0 },
        );
    }

    fn desired_split(&self, inputs: &TickInputs) -> (usize, usize) {
        let markdown_demand = (inputs.pending_markdown + inputs.in_flight_markdown) as f64;
        let hybrid_demand = (inputs.pending_hybrid + inputs.in_flight_hybrid) as f64
            + markdown_demand * self.markdown_unavailable_rate;

        let markdown_work_ms = markdown_demand * self.markdown_active_ms;
        let hybrid_work_ms = hybrid_demand * self.hybrid_active_ms;
        let total_work_ms = markdown_work_ms + hybrid_work_ms;

        let desired_total = if total_work_ms > 0.0 {
            let raw = (total_work_ms / AUTOSCALE_TARGET_DRAIN_MS).ceil() as usize;
            raw.clamp(MIN_TOTAL_WORKERS, inputs.max_total_workers)
        } else {
            MIN_TOTAL_WORKERS
        };

        if total_work_ms <= 0.0 {
            let markdown = desired_total / 2;
            return (
                markdown.max(MIN_WORKERS_PER_KIND),
                (desired_total - markdown).max(MIN_WORKERS_PER_KIND),
            );
        }

        let markdown_share = markdown_work_ms / total_work_ms;
        let mut markdown = (desired_total as f64 * markdown_share).round() as usize;
        markdown = markdown.max(MIN_WORKERS_PER_KIND);
        let mut hybrid = desired_total.saturating_sub(markdown).max(MIN_WORKERS_PER_KIND);
        if markdown + hybrid > inputs.max_total_workers {
            hybrid = inputs.max_total_workers.saturating_sub(markdown).max(MIN_WORKERS_PER_KIND);
        }
        (markdown, hybrid)
    }

    /// One tick: rebalance idle workers, then scale up, then scale down,
    /// each capped by its per-tick budget.
    pub fn tick(&self, current_markdown: usize, current_hybrid: usize, inputs: &TickInputs) -> ScaleActions {
        let (target_markdown, target_hybrid) = self.desired_split(inputs);
        let mut actions = ScaleActions::default();

        let markdown_over = current_markdown as i64 - target_markdown as i64;
        let hybrid_over = current_hybrid as i64 - target_hybrid as i64;

        // 1. Rebalance: one kind over target with idle slack, the other under.
        if markdown_over > 0 && hybrid_over < 0 && inputs.idle_markdown > 0 {
            let swap = markdown_over.min(-hybrid_over).min(inputs.idle_markdown as i64) as usize;
            actions.stop_markdown += swap;
            actions.spawn_hybrid += swap;
        } else if hybrid_over > 0 && markdown_over < 0 && inputs.idle_hybrid > 0 {
            let swap = hybrid_over.min(-markdown_over).min(inputs.idle_hybrid as i64) as usize;
            actions.stop_hybrid += swap;
            actions.spawn_markdown += swap;
        }

        let markdown_after_rebalance = current_markdown - actions.stop_markdown + actions.spawn_markdown;
        let hybrid_after_rebalance = current_hybrid - actions.stop_hybrid + actions.spawn_hybrid;

        // 2. Scale up, budget-capped, larger deficit first.
        let markdown_deficit = target_markdown as i64 - markdown_after_rebalance as i64;
        let hybrid_deficit = target_hybrid as i64 - hybrid_after_rebalance as i64;
        let mut spawn_budget = MAX_SPAWN_PER_TICK;

        let deficits = if markdown_deficit >= hybrid_deficit {
            [(WorkerKind::Markdown, markdown_deficit), (WorkerKind::Hybrid, hybrid_deficit)]
        } else {
            [(WorkerKind::Hybrid, hybrid_deficit), (WorkerKind::Markdown, markdown_deficit)]
        };
        for (kind, deficit) in deficits {
            if deficit <= 0 || spawn_budget == 0 {
                continue;
            }
            let n = (deficit as usize).min(spawn_budget);
            spawn_budget -= n;
            match kind {
                WorkerKind::Markdown => actions.spawn_markdown += n,
                WorkerKind::Hybrid => actions.spawn_hybrid += n,
            }
        }

        // 3. Scale down idle workers of over-target kinds, budget-capped.
        let mut stop_budget = MAX_STOP_PER_TICK;
        let markdown_after_spawn = markdown_after_rebalance + actions.spawn_markdown;
        let hybrid_after_spawn = hybrid_after_rebalance + actions.spawn_hybrid;
        let markdown_surplus = (markdown_after_spawn as i64 - target_markdown as i64).max(0) as usize;
        let hybrid_surplus = (hybrid_after_spawn as i64 - target_hybrid as i64).max(0) as usize;

        let markdown_stop = markdown_surplus.min(inputs.idle_markdown).min(stop_budget);
        stop_budget -= markdown_stop;
        actions.stop_markdown += markdown_stop;

        let hybrid_stop = hybrid_surplus.min(inputs.idle_hybrid).min(stop_budget);
        actions.stop_hybrid += hybrid_stop;

        actions
    }
}

impl Default for Autoscaler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(pending_md: usize, pending_hy: usize, max_total: usize) -> TickInputs {
        TickInputs {
            pending_markdown: pending_md,
            pending_hybrid: pending_hy,
            in_flight_markdown: 0,
            in_flight_hybrid: 0,
            idle_markdown: 0,
            idle_hybrid: 0,
            max_total_workers: max_total,
        }
    }

    #[test]
    fn no_work_targets_minimum_total() {
        let scaler = Autoscaler::new();
        let (md, hy) = scaler.desired_split(&inputs(0, 0, 8));
        assert_eq!(md + hy, MIN_TOTAL_WORKERS.max(md + hy));
        assert!(md >= MIN_WORKERS_PER_KIND);
        assert!(hy >= MIN_WORKERS_PER_KIND);
    }

    #[test]
    fn heavy_markdown_backlog_biases_split_toward_markdown() {
        let scaler = Autoscaler::new();
        let (md, hy) = scaler.desired_split(&inputs(1000, 0, 20));
        assert!(md > hy);
    }

    #[test]
    fn ewma_update_moves_toward_sample() {
        let mut scaler = Autoscaler::new();
        let before = scaler.markdown_active_ms;
        scaler.observe_active_ms(WorkerKind::Markdown, 10_000);
        assert!(scaler.markdown_active_ms > before);
        assert!(scaler.markdown_active_ms < 10_000.0);
    }

    #[test]
    fn spawn_is_capped_per_tick() {
        let scaler = Autoscaler::new();
        let mut inputs = inputs(100_000, 100_000, 64);
        inputs.max_total_workers = 64;
        let actions = scaler.tick(1, 1, &inputs);
        assert!(actions.spawn_markdown + actions.spawn_hybrid <= MAX_SPAWN_PER_TICK);
    }

    #[test]
    fn idle_workers_of_overshot_kind_get_stopped() {
        let scaler = Autoscaler::new();
        let mut tick_inputs = inputs(0, 0, 4);
        tick_inputs.idle_markdown = 10;
        let actions = scaler.tick(10, 1, &tick_inputs);
        assert!(actions.stop_markdown > 0);
    }
}
