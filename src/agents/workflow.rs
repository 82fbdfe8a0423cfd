// Office workflows
//
// The assignment and completion sequences: each step is an office operation
// followed by a pause standing in for the walk or the work. Cancellation is
// observed during pauses only, so a step is never half-applied.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::errors::{WorkflowError, WorkflowResult};
use super::state::OfficeStateManager;
use crate::domain::office::{OfficeEvent, TaskStatus};

/// Pause after each step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimings {
    pub after_wake: Duration,
    pub after_walk_to_board: Duration,
    pub after_claim: Duration,
    pub after_walk_to_desk: Duration,
    pub after_start_working: Duration,
    /// Time the completion note takes down the mail chute
    pub message_delay: Duration,
    /// Time a completed task spends in review
    pub finalize_delay: Duration,
    /// Time the walk back to the rest slot takes
    pub rest_walk: Duration,
}

impl Default for PhaseTimings {
    fn default() -> Self {
        Self {
            after_wake: Duration::from_millis(1000),
            after_walk_to_board: Duration::from_millis(2000),
            after_claim: Duration::from_millis(1000),
            after_walk_to_desk: Duration::from_millis(1500),
            after_start_working: Duration::from_millis(500),
            message_delay: Duration::from_millis(1000),
            finalize_delay: Duration::from_millis(5000),
            rest_walk: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Wake,
    WalkToBoard,
    ClaimTask,
    WalkToDesk,
    StartWorking,
    CompleteTask,
    FinalizeTask,
    ReturnToRest,
    SettleAtRest,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Wake => "wake",
            Phase::WalkToBoard => "walk_to_board",
            Phase::ClaimTask => "claim_task",
            Phase::WalkToDesk => "walk_to_desk",
            Phase::StartWorking => "start_working",
            Phase::CompleteTask => "complete_task",
            Phase::FinalizeTask => "finalize_task",
            Phase::ReturnToRest => "return_to_rest",
            Phase::SettleAtRest => "settle_at_rest",
        };
        f.write_str(name)
    }
}

/// How a workflow ended
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowOutcome {
    Completed,
    /// A step was rejected; earlier steps stay applied
    Aborted { phase: Phase, error: WorkflowError },
    /// Cancelled while pausing after `after`
    Cancelled { after: Phase },
}

impl WorkflowOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowOutcome::Completed)
    }
}

pub struct OfficeWorkflows {
    manager: Arc<OfficeStateManager>,
    timings: PhaseTimings,
}

impl OfficeWorkflows {
    pub fn new(manager: Arc<OfficeStateManager>, timings: PhaseTimings) -> Self {
        Self { manager, timings }
    }

    pub fn manager(&self) -> &Arc<OfficeStateManager> {
        &self.manager
    }

    /// Wake → board → claim → desk → working
    pub async fn assign(
        &self,
        agent_id: &str,
        task_id: &str,
        cancel: &CancellationToken,
    ) -> WorkflowOutcome {
        let t = self.timings;
        let steps = [
            (Phase::Wake, t.after_wake),
            (Phase::WalkToBoard, t.after_walk_to_board),
            (Phase::ClaimTask, t.after_claim),
            (Phase::WalkToDesk, t.after_walk_to_desk),
            (Phase::StartWorking, t.after_start_working),
        ];

        info!(agent_id, task_id, "Assignment started");
        for (phase, delay) in steps {
            if let Err(error) = self.step(phase, agent_id, task_id).await {
                warn!(agent_id, task_id, %phase, error = %error, "Assignment aborted");
                return WorkflowOutcome::Aborted { phase, error };
            }
            if !pause(delay, cancel).await {
                info!(agent_id, %phase, "Assignment cancelled");
                return WorkflowOutcome::Cancelled { after: phase };
            }
        }

        info!(agent_id, task_id, "Agent working");
        WorkflowOutcome::Completed
    }

    /// Complete → completion note → review delay → done → walk to rest → asleep
    pub async fn complete(&self, agent_id: &str, cancel: &CancellationToken) -> WorkflowOutcome {
        let events = match self.manager.complete_task(agent_id).await {
            Ok(events) => events,
            Err(error) => {
                warn!(agent_id, error = %error, "Completion aborted");
                return WorkflowOutcome::Aborted {
                    phase: Phase::CompleteTask,
                    error,
                };
            }
        };

        let Some(task_id) = reviewed_task(&events) else {
            return WorkflowOutcome::Aborted {
                phase: Phase::CompleteTask,
                error: WorkflowError::MissingCompletedTask(agent_id.to_string()),
            };
        };
        let review = self.timings.message_delay + self.timings.finalize_delay;
        if !pause(review, cancel).await {
            return WorkflowOutcome::Cancelled {
                after: Phase::CompleteTask,
            };
        }

        let t = self.timings;
        let steps = [
            (Phase::FinalizeTask, Duration::ZERO),
            (Phase::ReturnToRest, t.rest_walk),
            (Phase::SettleAtRest, Duration::ZERO),
        ];
        for (phase, delay) in steps {
            if let Err(error) = self.step(phase, agent_id, &task_id).await {
                warn!(
                    agent_id,
                    task_id = %task_id,
                    %phase,
                    error = %error,
                    "Completion aborted"
                );
                return WorkflowOutcome::Aborted { phase, error };
            }
            if !pause(delay, cancel).await {
                return WorkflowOutcome::Cancelled { after: phase };
            }
        }

        info!(agent_id, task_id = %task_id, "Agent back at rest");
        WorkflowOutcome::Completed
    }

    /// Assigns the first backlog task to the first sleeping agent
    ///
    /// Returns `None` when nobody is asleep or the backlog is empty.
    pub async fn assign_next_task(
        &self,
        cancel: &CancellationToken,
    ) -> Option<(String, WorkflowOutcome)> {
        let (agent_id, task_id) = self.manager.next_assignment().await?;
        let outcome = self.assign(&agent_id, &task_id, cancel).await;
        Some((agent_id, outcome))
    }

    async fn step(
        &self,
        phase: Phase,
        agent_id: &str,
        task_id: &str,
    ) -> WorkflowResult<Vec<OfficeEvent>> {
        let m = &self.manager;
        match phase {
            Phase::Wake => m.wake(agent_id, task_id).await,
            Phase::WalkToBoard => m.walk_to_board(agent_id).await,
            Phase::ClaimTask => m.claim_task(agent_id, task_id).await,
            Phase::WalkToDesk => m.walk_to_desk(agent_id).await,
            Phase::StartWorking => m.start_working(agent_id).await,
            Phase::CompleteTask => m.complete_task(agent_id).await,
            Phase::FinalizeTask => m.finalize_task(task_id).await,
            Phase::ReturnToRest => m.return_to_rest(agent_id).await,
            Phase::SettleAtRest => m.settle_at_rest(agent_id).await,
        }
    }
}

fn reviewed_task(events: &[OfficeEvent]) -> Option<String> {
    events.iter().find_map(|event| match event {
        OfficeEvent::TaskMoved {
            task_id,
            to: TaskStatus::Review,
            ..
        } => Some(task_id.clone()),
        _ => None,
    })
}

/// Sleeps unless cancelled first; false on cancellation
async fn pause(delay: Duration, cancel: &CancellationToken) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
