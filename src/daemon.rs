//! Long-running scheduler loop (feature `daemon`).
//!
//! [`IngestDaemon`] ticks a tokio interval, builds a fresh trigger context on
//! every tick and runs one [`TriggerManager::run_cycle`]. It stops on Ctrl+C
//! or after a configured number of cycles.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Value, json};

use crate::error::TriggerResult;
use crate::integrator::{Claim, KnowledgeIntegrator};
use crate::trigger::{Trigger, TriggerContext, TriggerManager, TriggerPriority};

/// Drives a [`TriggerManager`] on a fixed interval.
pub struct IngestDaemon {
    triggers: TriggerManager,
    tick: Duration,
    /// Stop after this many cycles (0 = run until Ctrl+C).
    max_cycles: usize,
    total_cycles: usize,
}

impl IngestDaemon {
    /// Create a daemon ticking at the manager's configured interval.
    pub fn new(triggers: TriggerManager) -> Self {
        let tick = Duration::from_secs(triggers.config().tick_interval_secs);
        Self {
            triggers,
            tick,
            max_cycles: 0,
            total_cycles: 0,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn with_max_cycles(mut self, max_cycles: usize) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    pub fn triggers(&self) -> &TriggerManager {
        &self.triggers
    }

    pub fn total_cycles(&self) -> usize {
        self.total_cycles
    }

    /// Run the main loop. `context` is called once per tick.
    pub async fn run<F>(&mut self, mut context: F)
    where
        F: FnMut() -> TriggerContext,
    {
        use tokio::time::interval;

        let mut tick = interval(self.tick);
        let max_concurrent = self.triggers.config().max_concurrent;
        tracing::info!(
            tick_ms = self.tick.as_millis() as u64,
            triggers = self.triggers.list().len(),
            "daemon started"
        );

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    let ctx = context();
                    let executions = self.triggers.run_cycle(&ctx, max_concurrent).await;
                    self.total_cycles += 1;
                    tracing::info!(
                        cycle = self.total_cycles,
                        fired = executions.len(),
                        "daemon: cycle complete"
                    );
                    if self.max_cycles > 0 && self.total_cycles >= self.max_cycles {
                        tracing::info!(max_cycles = self.max_cycles, "daemon: max cycles reached, shutting down");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("daemon: received shutdown signal");
                    break;
                }
            }
        }

        let stats = self.triggers.execution_stats();
        tracing::info!(
            cycles = self.total_cycles,
            completed = stats.completed,
            failed = stats.failed,
            "daemon stopped"
        );
    }
}

/// A trigger that ingests `claims` every time it fires.
///
/// The condition is always true, so the cooldown alone paces it. The action
/// returns `{accepted, rejected}` counts.
pub fn ingest_trigger(
    id: impl Into<String>,
    integrator: Arc<KnowledgeIntegrator>,
    claims: Vec<Claim>,
    cooldown_secs: u64,
) -> Trigger {
    let claims = Arc::new(claims);
    let always = |_: &TriggerContext, _: &Value| -> TriggerResult<bool> { Ok(true) };
    let action = move |_ctx: TriggerContext, _params: Value| {
        let integrator = Arc::clone(&integrator);
        let claims = Arc::clone(&claims);
        async move {
            let accepted = claims
                .iter()
                .filter(|claim| integrator.ingest(claim).is_accepted())
                .count();
            TriggerResult::Ok(json!({
                "accepted": accepted,
                "rejected": claims.len() - accepted,
            }))
        }
    };
    Trigger::new(id, TriggerPriority::Medium, always, action).with_cooldown(cooldown_secs)
}
