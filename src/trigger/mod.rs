//! Trigger system: prioritized condition→action rules with per-trigger cooldown.
//!
//! A [`TriggerManager`] owns a registry of [`Trigger`]s. Each scheduler tick
//! the caller builds a [`TriggerContext`] (usually from the pure
//! [`detectors`]) and calls [`TriggerManager::run_cycle`], which evaluates
//! every eligible condition and runs the firing actions in priority order,
//! in fixed-size batches.
//!
//! Cooldown is only consumed by a *successful* execution: a failed action
//! leaves `last_fired` untouched, so the trigger may fire again on the next
//! cycle.

pub mod detectors;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::{BoxFuture, join_all};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::TriggerConfig;
use crate::error::{TriggerError, TriggerResult};
use crate::facts::now_secs;

/// Named values a condition is evaluated against.
pub type TriggerContext = serde_json::Map<String, Value>;

// ---------------------------------------------------------------------------
// Condition / Action interfaces
// ---------------------------------------------------------------------------

/// A pure predicate over a context and the trigger's own parameters.
pub trait Condition: Send + Sync {
    fn evaluate(&self, ctx: &TriggerContext, params: &Value) -> TriggerResult<bool>;
}

impl<F> Condition for F
where
    F: Fn(&TriggerContext, &Value) -> TriggerResult<bool> + Send + Sync,
{
    fn evaluate(&self, ctx: &TriggerContext, params: &Value) -> TriggerResult<bool> {
        self(ctx, params)
    }
}

/// An effect run when a trigger fires.
pub trait Action: Send + Sync {
    fn execute(&self, ctx: &TriggerContext, params: &Value) -> BoxFuture<'static, TriggerResult<Value>>;
}

impl<F, Fut> Action for F
where
    F: Fn(TriggerContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = TriggerResult<Value>> + Send + 'static,
{
    fn execute(&self, ctx: &TriggerContext, params: &Value) -> BoxFuture<'static, TriggerResult<Value>> {
        Box::pin(self(ctx.clone(), params.clone()))
    }
}

/// True when `ctx[key]` is boolean `true`. A missing key is false.
#[derive(Debug, Clone)]
pub struct ContextFlag(pub String);

impl Condition for ContextFlag {
    fn evaluate(&self, ctx: &TriggerContext, _params: &Value) -> TriggerResult<bool> {
        match ctx.get(&self.0) {
            None => Ok(false),
            Some(Value::Bool(flag)) => Ok(*flag),
            Some(_) => Err(TriggerError::ContextKey { key: self.0.clone() }),
        }
    }
}

/// True when the number at `ctx[key]` is at least `min`.
#[derive(Debug, Clone)]
pub struct ThresholdCondition {
    pub key: String,
    pub min: f64,
}

impl Condition for ThresholdCondition {
    fn evaluate(&self, ctx: &TriggerContext, _params: &Value) -> TriggerResult<bool> {
        ctx.get(&self.key)
            .and_then(Value::as_f64)
            .map(|v| v >= self.min)
            .ok_or_else(|| TriggerError::ContextKey {
                key: self.key.clone(),
            })
    }
}

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Firing order within a cycle; higher fires first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum TriggerPriority {
    Low = 1,
    Medium = 2,
    High = 3,
    Critical = 4,
}

/// A registered condition→action rule.
pub struct Trigger {
    /// Unique identifier.
    pub id: String,
    pub priority: TriggerPriority,
    /// Minimum seconds between successful firings.
    pub cooldown_secs: u64,
    pub enabled: bool,
    /// Unix timestamp of the last successful firing.
    pub last_fired: Option<u64>,
    pub fire_count: u64,
    /// Parameters handed to both the condition and the action.
    pub params: Value,
    condition: Arc<dyn Condition>,
    action: Arc<dyn Action>,
}

impl Trigger {
    /// Create an enabled trigger with no cooldown and null params.
    pub fn new(
        id: impl Into<String>,
        priority: TriggerPriority,
        condition: impl Condition + 'static,
        action: impl Action + 'static,
    ) -> Self {
        Self {
            id: id.into(),
            priority,
            cooldown_secs: 0,
            enabled: true,
            last_fired: None,
            fire_count: 0,
            params: Value::Null,
            condition: Arc::new(condition),
            action: Arc::new(action),
        }
    }

    pub fn with_cooldown(mut self, secs: u64) -> Self {
        self.cooldown_secs = secs;
        self
    }

    pub fn with_params(mut self, params: Value) -> Self {
        self.params = params;
        self
    }

    /// Enabled, and either never fired or out of cooldown at `now`.
    pub fn can_trigger(&self, now: u64) -> bool {
        if !self.enabled {
            return false;
        }
        match self.last_fired {
            None => true,
            Some(fired) => now.saturating_sub(fired) >= self.cooldown_secs,
        }
    }
}

impl std::fmt::Debug for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trigger")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("cooldown_secs", &self.cooldown_secs)
            .field("enabled", &self.enabled)
            .field("last_fired", &self.last_fired)
            .field("fire_count", &self.fire_count)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Executing,
    Completed,
    Failed,
}

/// One run of a trigger's action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerExecution {
    pub trigger_id: String,
    pub started_at: u64,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Summary of the execution history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    pub total: usize,
    pub completed: usize,
    pub failed: usize,
    pub per_trigger: BTreeMap<String, usize>,
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Registry and executor of triggers.
pub struct TriggerManager {
    config: TriggerConfig,
    /// Registration order.
    triggers: Vec<Trigger>,
    executions: Vec<TriggerExecution>,
}

impl Default for TriggerManager {
    fn default() -> Self {
        Self::new(TriggerConfig::default())
    }
}

impl TriggerManager {
    pub fn new(config: TriggerConfig) -> Self {
        Self {
            config,
            triggers: Vec::new(),
            executions: Vec::new(),
        }
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    /// Add a trigger. Ids must be unique.
    pub fn register(&mut self, trigger: Trigger) -> TriggerResult<()> {
        if self.position(&trigger.id).is_some() {
            return Err(TriggerError::Duplicate { id: trigger.id });
        }
        tracing::info!(id = %trigger.id, priority = ?trigger.priority, "registered trigger");
        self.triggers.push(trigger);
        Ok(())
    }

    /// Remove a trigger, returning it.
    pub fn unregister(&mut self, id: &str) -> TriggerResult<Trigger> {
        let pos = self.require(id)?;
        tracing::info!(id, "unregistered trigger");
        Ok(self.triggers.remove(pos))
    }

    pub fn enable(&mut self, id: &str) -> TriggerResult<()> {
        let pos = self.require(id)?;
        self.triggers[pos].enabled = true;
        Ok(())
    }

    pub fn disable(&mut self, id: &str) -> TriggerResult<()> {
        let pos = self.require(id)?;
        self.triggers[pos].enabled = false;
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&Trigger> {
        self.position(id).map(|pos| &self.triggers[pos])
    }

    /// Registered triggers in registration order.
    pub fn list(&self) -> &[Trigger] {
        &self.triggers
    }

    /// Execution history, oldest first.
    pub fn executions(&self) -> &[TriggerExecution] {
        &self.executions
    }

    pub fn execution_stats(&self) -> ExecutionStats {
        let mut stats = ExecutionStats {
            total: self.executions.len(),
            ..Default::default()
        };
        for exec in &self.executions {
            match exec.status {
                ExecutionStatus::Completed => stats.completed += 1,
                ExecutionStatus::Failed => stats.failed += 1,
                ExecutionStatus::Executing => {}
            }
            *stats.per_trigger.entry(exec.trigger_id.clone()).or_default() += 1;
        }
        stats
    }

    /// Ids of triggers that should fire now, highest priority first.
    pub fn check(&self, ctx: &TriggerContext) -> Vec<String> {
        self.check_at(ctx, now_secs())
    }

    /// [`check`](Self::check) at an explicit time.
    ///
    /// A condition that errors is logged and skipped; the rest of the scan
    /// continues. Ties in priority keep registration order.
    pub fn check_at(&self, ctx: &TriggerContext, now: u64) -> Vec<String> {
        let mut firing: Vec<&Trigger> = self
            .triggers
            .iter()
            .filter(|t| t.can_trigger(now))
            .filter(|t| match t.condition.evaluate(ctx, &t.params) {
                Ok(fire) => fire,
                Err(e) => {
                    tracing::warn!(id = %t.id, error = %e, "trigger condition failed, skipping");
                    false
                }
            })
            .collect();
        firing.sort_by(|a, b| b.priority.cmp(&a.priority));
        firing.into_iter().map(|t| t.id.clone()).collect()
    }

    /// Run one trigger's action regardless of its condition.
    ///
    /// Action failures are recorded as a failed execution, not returned as
    /// errors. Only an unknown id is an error.
    pub async fn execute(&mut self, id: &str, ctx: &TriggerContext) -> TriggerResult<TriggerExecution> {
        let pos = self.require(id)?;
        let started_at = now_secs();
        let pending = self.begin(pos, ctx, started_at);
        let (outcome, elapsed) = self.timed_action(id, pending).await;
        Ok(self.finish(pos, started_at, outcome, elapsed))
    }

    /// Check all triggers, then execute the firing set in batches of
    /// `max_concurrent` (0 counts as 1). Each batch completes before the next
    /// starts.
    pub async fn run_cycle(&mut self, ctx: &TriggerContext, max_concurrent: usize) -> Vec<TriggerExecution> {
        self.run_cycle_at(ctx, max_concurrent, now_secs()).await
    }

    /// [`run_cycle`](Self::run_cycle) at an explicit time.
    pub async fn run_cycle_at(
        &mut self,
        ctx: &TriggerContext,
        max_concurrent: usize,
        now: u64,
    ) -> Vec<TriggerExecution> {
        let firing = self.check_at(ctx, now);
        let batch_size = max_concurrent.max(1);
        let mut done = Vec::with_capacity(firing.len());
        tracing::debug!(firing = firing.len(), batch_size, "running trigger cycle");

        for batch in firing.chunks(batch_size) {
            let mut slots = Vec::with_capacity(batch.len());
            let mut pending = Vec::with_capacity(batch.len());
            for id in batch {
                let Some(pos) = self.position(id) else {
                    continue;
                };
                let fut = self.begin(pos, ctx, now);
                slots.push((pos, now));
                pending.push(self.timed_action(id, fut));
            }

            let outcomes = join_all(pending).await;
            for ((pos, started_at), (outcome, elapsed)) in slots.into_iter().zip(outcomes) {
                done.push(self.finish(pos, started_at, outcome, elapsed));
            }
        }
        done
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn position(&self, id: &str) -> Option<usize> {
        self.triggers.iter().position(|t| t.id == id)
    }

    fn require(&self, id: &str) -> TriggerResult<usize> {
        self.position(id)
            .ok_or_else(|| TriggerError::NotFound { id: id.to_owned() })
    }

    /// Record an `Executing` entry and start the action.
    fn begin(&mut self, pos: usize, ctx: &TriggerContext, started_at: u64) -> BoxFuture<'static, TriggerResult<Value>> {
        let trigger = &self.triggers[pos];
        let fut = trigger.action.execute(ctx, &trigger.params);
        self.executions.push(TriggerExecution {
            trigger_id: trigger.id.clone(),
            started_at,
            status: ExecutionStatus::Executing,
            result: None,
            error: None,
            duration_ms: 0,
        });
        fut
    }

    /// Apply the timeout and measure the action's own run time.
    fn timed_action(
        &self,
        id: &str,
        fut: BoxFuture<'static, TriggerResult<Value>>,
    ) -> BoxFuture<'static, (TriggerResult<Value>, Duration)> {
        let fut = self.with_timeout(id, fut);
        Box::pin(async move {
            let started = Instant::now();
            let outcome = fut.await;
            (outcome, started.elapsed())
        })
    }

    #[cfg(feature = "daemon")]
    fn with_timeout(
        &self,
        id: &str,
        fut: BoxFuture<'static, TriggerResult<Value>>,
    ) -> BoxFuture<'static, TriggerResult<Value>> {
        let Some(secs) = self.config.action_timeout_secs else {
            return fut;
        };
        let id = id.to_owned();
        Box::pin(async move {
            tokio::time::timeout(Duration::from_secs(secs), fut)
                .await
                .unwrap_or_else(|_| {
                    Err(TriggerError::Action {
                        id,
                        message: format!("timed out after {secs}s"),
                    })
                })
        })
    }

    /// Timeouts need the tokio timer, so without `daemon` actions run unbounded.
    #[cfg(not(feature = "daemon"))]
    fn with_timeout(
        &self,
        _id: &str,
        fut: BoxFuture<'static, TriggerResult<Value>>,
    ) -> BoxFuture<'static, TriggerResult<Value>> {
        fut
    }

    /// Settle the latest `Executing` entry for `pos` and update the trigger.
    fn finish(
        &mut self,
        pos: usize,
        started_at: u64,
        outcome: TriggerResult<Value>,
        elapsed: Duration,
    ) -> TriggerExecution {
        let duration_ms = elapsed.as_millis() as u64;
        let trigger = &mut self.triggers[pos];
        let entry = self
            .executions
            .iter_mut()
            .rev()
            .find(|e| e.trigger_id == trigger.id && e.status == ExecutionStatus::Executing);

        let mut settled = TriggerExecution {
            trigger_id: trigger.id.clone(),
            started_at,
            status: ExecutionStatus::Completed,
            result: None,
            error: None,
            duration_ms,
        };
        match outcome {
            Ok(value) => {
                trigger.last_fired = Some(started_at);
                trigger.fire_count += 1;
                settled.result = Some(value);
                tracing::info!(id = %trigger.id, duration_ms, "trigger fired");
            }
            Err(e) => {
                settled.status = ExecutionStatus::Failed;
                settled.error = Some(e.to_string());
                tracing::warn!(id = %trigger.id, error = %e, "trigger action failed");
            }
        }

        if let Some(entry) = entry {
            *entry = settled.clone();
        }
        settled
    }
}
