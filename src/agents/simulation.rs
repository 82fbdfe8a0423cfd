// Office simulation
//
// Keeps the office busy: sleeping agents are sent after backlog tasks, and
// every working agent completes after a fixed work duration.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::workflow::{OfficeWorkflows, WorkflowOutcome};
use crate::domain::office::AgentState;

/// Runs until cancelled, then waits for in-flight completions to stop
pub async fn run_simulation(
    workflows: Arc<OfficeWorkflows>,
    work_duration: Duration,
    cancel: CancellationToken,
) {
    let mut completions = JoinSet::new();

    let already_working: Vec<String> = workflows
        .manager()
        .with_office(|office| {
            office
                .agents()
                .filter(|a| a.state() == AgentState::Working)
                .map(|a| a.name().to_string())
                .collect()
        })
        .await;
    for agent_id in already_working {
        completions.spawn(finish_after(
            Arc::clone(&workflows),
            agent_id,
            work_duration,
            cancel.clone(),
        ));
    }

    info!(work_ms = work_duration.as_millis() as u64, "Simulation started");

    while !cancel.is_cancelled() {
        match workflows.assign_next_task(&cancel).await {
            Some((agent_id, WorkflowOutcome::Completed)) => {
                completions.spawn(finish_after(
                    Arc::clone(&workflows),
                    agent_id,
                    work_duration,
                    cancel.clone(),
                ));
            }
            Some((_, WorkflowOutcome::Cancelled { .. })) => break,
            Some((agent_id, WorkflowOutcome::Aborted { phase, error })) => {
                warn!(agent_id = %agent_id, %phase, error = %error, "Simulated assignment failed");
                idle(work_duration, &cancel).await;
            }
            None => {
                debug!("Nothing to assign");
                idle(work_duration, &cancel).await;
            }
        }

        while let Some(result) = completions.try_join_next() {
            if let Err(e) = result {
                warn!(error = %e, "Completion task failed");
            }
        }
    }

    while completions.join_next().await.is_some() {}
    info!("Simulation stopped");
}

async fn finish_after(
    workflows: Arc<OfficeWorkflows>,
    agent_id: String,
    work_duration: Duration,
    cancel: CancellationToken,
) {
    tokio::select! {
        _ = cancel.cancelled() => return,
        _ = tokio::time::sleep(work_duration) => {}
    }

    match workflows.complete(&agent_id, &cancel).await {
        WorkflowOutcome::Completed => {}
        outcome => debug!(agent_id = %agent_id, ?outcome, "Completion did not finish"),
    }
}

async fn idle(duration: Duration, cancel: &CancellationToken) {
    tokio::select! {
        _ = cancel.cancelled() => {}
        _ = tokio::time::sleep(duration) => {}
    }
}
