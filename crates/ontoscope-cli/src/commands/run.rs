use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use ontoscope_core::models::PeriodType;
use ontoscope_core::{CancelFlag, EvaluateRequest, Ontoscope, OntoscopeError};

use super::support::resolve_period;

#[derive(Debug, serde::Serialize, Default)]
pub(super) struct SchedulerReport {
    cycles: u32,
    succeeded: u32,
    failed: u32,
    facts_created: usize,
    narrative_facts: usize,
}

/// Materializes and evaluates the current period every `interval`.
/// A failed cycle is logged and the loop carries on; `max_cycles == 0` runs until cancelled.
pub(super) fn run_scheduler(
    app: &Ontoscope,
    period_type: PeriodType,
    narrative: bool,
    interval: Duration,
    max_cycles: u32,
) -> Result<SchedulerReport> {
    let mut total = SchedulerReport::default();
    let cancel = app.cancel_flag();

    loop {
        if max_cycles > 0 && total.cycles >= max_cycles {
            break;
        }
        if cancel.is_cancelled() {
            tracing::info!(cycles = total.cycles, "scheduler stopped by cancellation");
            break;
        }
        total.cycles += 1;

        let period = resolve_period(None, period_type);
        let request = EvaluateRequest {
            period,
            materialize: true,
            narrative,
        };
        match app.evaluate(request) {
            Ok(report) => {
                total.succeeded += 1;
                total.facts_created += report.facts_created;
                total.narrative_facts += report.narrative_facts.len();
                tracing::info!(
                    cycle = total.cycles,
                    period = %period,
                    facts = report.facts_created,
                    "scheduled evaluation finished"
                );
            }
            Err(OntoscopeError::Cancelled(stage)) => {
                tracing::info!(
                    cycle = total.cycles,
                    stage = %stage,
                    "scheduled evaluation cancelled"
                );
                break;
            }
            Err(err) => {
                total.failed += 1;
                tracing::warn!(
                    cycle = total.cycles,
                    period = %period,
                    code = err.code(),
                    error = %err,
                    "scheduled evaluation failed"
                );
            }
        }

        if max_cycles == 0 || total.cycles < max_cycles {
            sleep_unless_cancelled(&cancel, interval);
        }
    }

    Ok(total)
}

const SLEEP_SLICE: Duration = Duration::from_millis(200);

fn sleep_unless_cancelled(cancel: &CancelFlag, interval: Duration) {
    let deadline = Instant::now() + interval;
    while !cancel.is_cancelled() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        thread::sleep(remaining.min(SLEEP_SLICE));
    }
}
