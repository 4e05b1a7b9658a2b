/// Recurring workflow scheduler
///
/// Each armed schedule is one tokio task holding a cancellation token: it sleeps
/// until the next fire time, launches the workflow run, recomputes and sleeps
/// again until stopped. Runs are spawned separately, so stopping a schedule never
/// interrupts a run that already started.

use crate::{
    error::EngineError,
    runtime::{
        engine::{RunOutcome, WorkflowExecutor},
        schedule::{compute_next_fire_time, Schedule, ScheduleConfig},
    },
    workflow::types::Workflow,
};
use chrono::NaiveDateTime;
use dashmap::DashMap;
use serde::Serialize;
use std::{sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Source of local wall-clock time
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Public view of an armed schedule
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleInfo {
    pub workflow_id: String,
    pub config: ScheduleConfig,
    pub input: String,
    pub next_fire_time: NaiveDateTime,
}

struct ArmedSchedule {
    /// Distinguishes this arming from a later one for the same workflow
    arming_id: Uuid,
    token: CancellationToken,
    info: ScheduleInfo,
}

/// Keeps at most one armed schedule per workflow
pub struct Scheduler {
    executor: Arc<WorkflowExecutor>,
    armed: Arc<DashMap<String, ArmedSchedule>>,
    clock: Clock,
}

impl Scheduler {
    /// Scheduler on the local system clock
    pub fn new(executor: Arc<WorkflowExecutor>) -> Self {
        Self::with_clock(executor, Arc::new(|| chrono::Local::now().naive_local()))
    }

    pub fn with_clock(executor: Arc<WorkflowExecutor>, clock: Clock) -> Self {
        Self {
            executor,
            armed: Arc::new(DashMap::new()),
            clock,
        }
    }

    /// Validate `config` and arm a recurring run of `workflow` with a fixed input
    ///
    /// Replaces any schedule already armed for the same workflow. Must be called
    /// from within a tokio runtime.
    pub fn start(&self, workflow: Workflow, input: String, config: ScheduleConfig) -> Result<ScheduleInfo, EngineError> {
        let schedule = config.validate()?;
        workflow.validate()?;

        let now = (self.clock)();
        let next_fire_time = compute_next_fire_time(now, &schedule)
            .ok_or_else(|| EngineError::validation("Schedule has no representable next fire time"))?;

        let info = ScheduleInfo {
            workflow_id: workflow.id.clone(),
            config,
            input: input.clone(),
            next_fire_time,
        };
        let arming_id = Uuid::new_v4();
        let token = CancellationToken::new();

        // one map operation, so concurrent starts always cancel whatever they displace
        let displaced = self.armed.insert(
            workflow.id.clone(),
            ArmedSchedule {
                arming_id,
                token: token.clone(),
                info: info.clone(),
            },
        );
        if let Some(previous) = displaced {
            tracing::info!("🔄 Replacing armed schedule for workflow: {}", workflow.id);
            previous.token.cancel();
        }

        tracing::info!("⏰ Armed schedule for workflow {}: next run at {}", workflow.id, next_fire_time);

        let task = ArmedTask {
            executor: Arc::clone(&self.executor),
            armed: Arc::clone(&self.armed),
            clock: Arc::clone(&self.clock),
            arming_id,
            token,
            workflow,
            input,
            schedule,
        };
        tokio::spawn(task.run(next_fire_time));

        Ok(info)
    }

    /// Cancel the pending timer; returns whether anything was armed
    pub fn stop(&self, workflow_id: &str) -> bool {
        match self.armed.remove(workflow_id) {
            Some((_, armed)) => {
                armed.token.cancel();
                tracing::info!("⏹️ Stopped schedule for workflow: {}", workflow_id);
                true
            }
            None => false,
        }
    }

    pub fn is_armed(&self, workflow_id: &str) -> bool {
        self.armed.contains_key(workflow_id)
    }

    pub fn info(&self, workflow_id: &str) -> Option<ScheduleInfo> {
        self.armed.get(workflow_id).map(|armed| armed.info.clone())
    }

    pub fn next_fire_time(&self, workflow_id: &str) -> Option<NaiveDateTime> {
        self.armed.get(workflow_id).map(|armed| armed.info.next_fire_time)
    }

    /// Cancel every armed schedule
    pub fn shutdown(&self) {
        let ids: Vec<String> = self.armed.iter().map(|entry| entry.key().clone()).collect();
        tracing::info!("⏹️ Stopping {} armed schedules", ids.len());
        for id in ids {
            self.stop(&id);
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for entry in self.armed.iter() {
            entry.token.cancel();
        }
    }
}

/// State owned by one armed schedule's task
struct ArmedTask {
    executor: Arc<WorkflowExecutor>,
    armed: Arc<DashMap<String, ArmedSchedule>>,
    clock: Clock,
    arming_id: Uuid,
    token: CancellationToken,
    workflow: Workflow,
    input: String,
    schedule: Schedule,
}

impl ArmedTask {
    async fn run(self, mut next_fire_time: NaiveDateTime) {
        loop {
            let delay = (next_fire_time - (self.clock)()).to_std().unwrap_or(Duration::ZERO);

            tokio::select! {
                biased;
                _ = self.token.cancelled() => {
                    tracing::debug!("🛑 Schedule task for workflow {} cancelled", self.workflow.id);
                    return;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            tracing::info!("🔔 Schedule fired for workflow: {}", self.workflow.id);
            self.launch_run();

            // the timer may wake a hair before the wall clock reaches the fire time
            let reference = (self.clock)().max(next_fire_time);
            match compute_next_fire_time(reference, &self.schedule) {
                Some(next) => next_fire_time = next,
                None => {
                    tracing::error!("❌ Schedule for workflow {} has no next fire time - disarming", self.workflow.id);
                    self.armed
                        .remove_if(&self.workflow.id, |_, armed| armed.arming_id == self.arming_id);
                    return;
                }
            }

            if let Some(mut armed) = self.armed.get_mut(&self.workflow.id) {
                if armed.arming_id == self.arming_id {
                    armed.info.next_fire_time = next_fire_time;
                }
            }
            tracing::debug!("⏰ Re-armed workflow {}: next run at {}", self.workflow.id, next_fire_time);
        }
    }

    fn launch_run(&self) {
        let executor = Arc::clone(&self.executor);
        let workflow = self.workflow.clone();
        let input = self.input.clone();

        tokio::spawn(async move {
            match executor.execute_workflow(&workflow, &input).await {
                Ok(RunOutcome::Completed(execution)) => {
                    tracing::info!(
                        "✅ Scheduled workflow completed: {} ({} nodes)",
                        workflow.id,
                        execution.nodes.len()
                    );
                }
                Ok(RunOutcome::AlreadyRunning) => {
                    tracing::info!("⏭️ Scheduled run skipped, workflow {} still executing", workflow.id);
                }
                Err(e) => {
                    tracing::error!("❌ Scheduled workflow failed: {} - Error: {}", workflow.id, e);
                }
            }
        });
    }
}
