// Office state manager
//
// Owns the office aggregate, persists it after every accepted operation and
// publishes the resulting domain events.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use super::errors::{WorkflowError, WorkflowResult};
use super::events::OfficeEventBus;
use crate::domain::office::{
    AgentSnapshot, LocationTable, Office, OfficeEvent, OfficeResult, OfficeSnapshot,
};
use crate::domain::repositories::OfficeRepository;

pub struct OfficeStateManager {
    office: Mutex<Office>,
    repository: Arc<dyn OfficeRepository>,
    bus: OfficeEventBus,
}

impl OfficeStateManager {
    pub fn new(office: Office, repository: Arc<dyn OfficeRepository>, bus: OfficeEventBus) -> Self {
        Self {
            office: Mutex::new(office),
            repository,
            bus,
        }
    }

    /// Restores the saved office merged over the seeded defaults
    ///
    /// A saved blob that cannot be merged or breaks the office invariants is
    /// discarded in favour of the defaults. A failing repository is an error.
    pub async fn load_or_seed(
        repository: Arc<dyn OfficeRepository>,
        locations: Arc<LocationTable>,
        bus: OfficeEventBus,
    ) -> WorkflowResult<Self> {
        let seeded = Office::seeded(Arc::clone(&locations));
        let saved = repository.load().await.map_err(WorkflowError::Persistence)?;

        let office = match saved {
            Some(blob) => {
                let defaults = OfficeSnapshot::capture(&seeded);
                let restored = OfficeSnapshot::merge_over(&defaults, blob)
                    .and_then(|s| s.restore(locations));
                match restored {
                    Ok(office) => {
                        info!(
                            tasks_completed = office.tasks_completed(),
                            agents_active = office.agents_active(),
                            "Restored saved office"
                        );
                        office
                    }
                    Err(e) => {
                        warn!(error = %e, "Saved office unusable, starting from defaults");
                        seeded
                    }
                }
            }
            None => {
                info!("No saved office, starting from defaults");
                seeded
            }
        };

        Ok(Self::new(office, repository, bus))
    }

    pub fn bus(&self) -> &OfficeEventBus {
        &self.bus
    }

    /// Runs one office operation, then saves and publishes
    ///
    /// A rejected operation leaves the office untouched and is logged at warn.
    /// A failed save is logged; the change stays applied in memory.
    pub async fn apply<F>(&self, operation: &'static str, f: F) -> WorkflowResult<Vec<OfficeEvent>>
    where
        F: FnOnce(&mut Office) -> OfficeResult<Vec<OfficeEvent>>,
    {
        let (events, snapshot) = {
            let mut office = self.office.lock().await;
            match f(&mut office) {
                Ok(events) => (events, OfficeSnapshot::capture(&office)),
                Err(e) => {
                    warn!(operation, error = %e, "Office operation rejected");
                    return Err(e.into());
                }
            }
        };

        self.bus.publish_all(events.iter().cloned());
        self.persist(&snapshot).await;

        Ok(events)
    }

    async fn persist(&self, snapshot: &OfficeSnapshot) {
        let blob = match serde_json::to_value(snapshot) {
            Ok(blob) => blob,
            Err(e) => {
                warn!(error = %e, "Failed to serialize office");
                return;
            }
        };
        if let Err(e) = self.repository.save(&blob).await {
            warn!(error = %e, "Failed to save office");
        }
    }

    pub async fn wake(&self, agent_id: &str, task_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("wake", |o| o.wake(agent_id, task_id)).await
    }

    pub async fn walk_to_board(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("walk_to_board", |o| o.walk_to_board(agent_id)).await
    }

    pub async fn claim_task(
        &self,
        agent_id: &str,
        task_id: &str,
    ) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("claim_task", |o| o.claim_task(agent_id, task_id)).await
    }

    pub async fn walk_to_desk(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("walk_to_desk", |o| o.walk_to_desk(agent_id)).await
    }

    pub async fn start_working(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("start_working", |o| o.start_working(agent_id)).await
    }

    pub async fn complete_task(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("complete_task", |o| o.complete_task(agent_id)).await
    }

    pub async fn finalize_task(&self, task_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("finalize_task", |o| o.finalize_task(task_id)).await
    }

    pub async fn return_to_rest(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("return_to_rest", |o| o.return_to_rest(agent_id)).await
    }

    pub async fn settle_at_rest(&self, agent_id: &str) -> WorkflowResult<Vec<OfficeEvent>> {
        self.apply("settle_at_rest", |o| o.settle_at_rest(agent_id)).await
    }

    pub async fn agent_snapshot(&self, agent_id: &str) -> Option<AgentSnapshot> {
        self.office.lock().await.agent_snapshot(agent_id)
    }

    /// Every agent's observable state, in name order
    pub async fn agent_snapshots(&self) -> Vec<(String, AgentSnapshot)> {
        self.office
            .lock()
            .await
            .agents()
            .map(|a| (a.name().to_string(), a.snapshot()))
            .collect()
    }

    pub async fn snapshot(&self) -> OfficeSnapshot {
        OfficeSnapshot::capture(&*self.office.lock().await)
    }

    /// Read-only access to the aggregate
    pub async fn with_office<R>(&self, f: impl FnOnce(&Office) -> R) -> R {
        f(&*self.office.lock().await)
    }

    /// First sleeping agent paired with the first backlog task
    pub async fn next_assignment(&self) -> Option<(String, String)> {
        let office = self.office.lock().await;
        let task = office.next_backlog_task()?.to_string();
        let agent = office.sleeping_agents().next()?.name().to_string();
        Some((agent, task))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::office::{AgentState, OfficeError, TaskStatus};
    use crate::infrastructure::repositories::InMemoryOfficeRepository;
    use serde_json::json;

    fn locations() -> Arc<LocationTable> {
        Arc::new(LocationTable::office_default())
    }

    async fn manager(repo: Arc<InMemoryOfficeRepository>) -> OfficeStateManager {
        OfficeStateManager::load_or_seed(repo, locations(), OfficeEventBus::default())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn accepted_operation_is_saved_and_published() {
        let repo = Arc::new(InMemoryOfficeRepository::new());
        let manager = manager(repo.clone()).await;
        let mut events = manager.bus().subscribe();

        let emitted = manager.wake("beta", "OFFICE-2-1").await.unwrap();

        assert_eq!(emitted.len(), 2);
        assert_eq!(events.try_recv().unwrap(), emitted[0]);
        assert_eq!(events.try_recv().unwrap(), emitted[1]);
        assert_eq!(repo.save_count().await, 1);
        let saved = repo.load().await.unwrap().unwrap();
        assert_eq!(saved["agents"]["beta"]["state"], "waking");
    }

    #[tokio::test]
    async fn rejected_operation_changes_nothing() {
        let repo = Arc::new(InMemoryOfficeRepository::new());
        let manager = manager(repo.clone()).await;

        let result = manager.walk_to_board("beta").await;

        assert!(matches!(
            result,
            Err(WorkflowError::Office(OfficeError::InvalidAgentState { .. }))
        ));
        assert_eq!(repo.save_count().await, 0);
        assert_eq!(manager.agent_snapshot("beta").await.unwrap().state, AgentState::Sleeping);
    }

    #[tokio::test]
    async fn saved_progress_is_restored() {
        let repo = Arc::new(InMemoryOfficeRepository::new());
        {
            let first = manager(repo.clone()).await;
            first.wake("beta", "OFFICE-2-1").await.unwrap();
            first.walk_to_board("beta").await.unwrap();
            first.claim_task("beta", "OFFICE-2-1").await.unwrap();
        }

        let second = manager(repo).await;

        let beta = second.agent_snapshot("beta").await.unwrap();
        assert_eq!(beta.state, AgentState::Claiming);
        let status = second
            .with_office(|o| o.task("OFFICE-2-1").map(|t| t.status))
            .await;
        assert_eq!(status, Some(TaskStatus::InProgress));
    }

    #[tokio::test]
    async fn broken_blob_falls_back_to_defaults() {
        let repo = Arc::new(InMemoryOfficeRepository::with_blob(json!({ "kanban": "nope" })));

        let manager = manager(repo).await;

        assert_eq!(manager.snapshot().await.kanban.backlog.len(), 3);
    }

    #[tokio::test]
    async fn next_assignment_pairs_sleeper_with_backlog() {
        let manager = manager(Arc::new(InMemoryOfficeRepository::new())).await;

        let (agent, task) = manager.next_assignment().await.unwrap();

        assert_eq!(agent, "beta");
        assert_eq!(task, "OFFICE-2-1");
    }
}
