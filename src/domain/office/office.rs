use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::Utc;

use super::agent::{Agent, Task};
use super::errors::{OfficeError, OfficeResult};
use super::events::{AgentSnapshot, AgentTransition, Milestone, OfficeEvent};
use super::value_objects::{
    desk_for, is_rest_slot, AgentState, LocationTable, TaskPriority, TaskStatus, BOARD, REST_SLOTS,
};

/// The four ordered kanban columns, holding task ids
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KanbanBoard {
    backlog: Vec<String>,
    in_progress: Vec<String>,
    review: Vec<String>,
    done: Vec<String>,
}

impl KanbanBoard {
    pub fn new(
        backlog: Vec<String>,
        in_progress: Vec<String>,
        review: Vec<String>,
        done: Vec<String>,
    ) -> Self {
        Self {
            backlog,
            in_progress,
            review,
            done,
        }
    }

    pub fn column(&self, status: TaskStatus) -> &[String] {
        match status {
            TaskStatus::Backlog => &self.backlog,
            TaskStatus::InProgress => &self.in_progress,
            TaskStatus::Review => &self.review,
            TaskStatus::Done => &self.done,
        }
    }

    fn column_mut(&mut self, status: TaskStatus) -> &mut Vec<String> {
        match status {
            TaskStatus::Backlog => &mut self.backlog,
            TaskStatus::InProgress => &mut self.in_progress,
            TaskStatus::Review => &mut self.review,
            TaskStatus::Done => &mut self.done,
        }
    }

    /// Returns every column that lists the task
    pub fn columns_containing(&self, task_id: &str) -> Vec<TaskStatus> {
        [
            TaskStatus::Backlog,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
        ]
        .into_iter()
        .filter(|status| self.column(*status).iter().any(|id| id == task_id))
        .collect()
    }

    /// Moves a task to the end of `to`; false if it was not in `from`
    fn move_task(&mut self, task_id: &str, from: TaskStatus, to: TaskStatus) -> bool {
        let source = self.column_mut(from);
        match source.iter().position(|id| id == task_id) {
            Some(index) => {
                let id = source.remove(index);
                self.column_mut(to).push(id);
                true
            }
            None => false,
        }
    }
}

/// Office aggregate root
///
/// Owns every agent and task and enforces the agent cycle and the kanban
/// column invariants. Each operation either applies completely and returns
/// the events it produced, or fails without touching anything.
///
/// # Invariants
/// - A task id appears in exactly one column, matching its status
/// - A sleeping agent stands on a rest slot and holds no task
/// - An agent holds a task only while claiming, walking to its desk or working
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use office_realtime::domain::office::{AgentState, LocationTable, Office};
///
/// let mut office = Office::seeded(Arc::new(LocationTable::office_default()));
/// office.wake("beta", "OFFICE-2-1").expect("beta is asleep");
///
/// assert_eq!(office.agent("beta").unwrap().state(), AgentState::Waking);
/// ```
#[derive(Debug, Clone)]
pub struct Office {
    agents: BTreeMap<String, Agent>,
    tasks: BTreeMap<String, Task>,
    board: KanbanBoard,
    locations: Arc<LocationTable>,
    tasks_completed: u64,
}

impl Office {
    /// Builds an office from parts, checking every invariant
    pub fn from_parts(
        agents: Vec<Agent>,
        tasks: Vec<Task>,
        board: KanbanBoard,
        locations: Arc<LocationTable>,
        tasks_completed: u64,
    ) -> OfficeResult<Self> {
        let office = Self {
            agents: agents.into_iter().map(|a| (a.name.clone(), a)).collect(),
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            board,
            locations,
            tasks_completed,
        };
        office.check_invariants()?;
        Ok(office)
    }

    /// The default office: three agents at work, six asleep, three tasks waiting
    pub fn seeded(locations: Arc<LocationTable>) -> Self {
        let working = |name: &str, glyph: &str, task: &str| {
            Agent::from_persistence(
                name.to_string(),
                AgentState::Working,
                desk_for(name),
                Some(task.to_string()),
                Some(task.to_string()),
                glyph.to_string(),
            )
        };
        let agents = vec![
            working("alice", "🦜", "OFFICE-1-1"),
            working("alpha", "🐺", "OFFICE-1-2"),
            Agent::sleeping("beta", "🦊", "cot-1"),
            Agent::sleeping("gamma", "🦔", "cot-3"),
            Agent::sleeping("delta", "🦉", "cot-5"),
            Agent::sleeping("epsilon", "🐙", "cot-2"),
            working("zeta", "🦄", "OFFICE-1-4"),
            Agent::sleeping("eta", "🐼", "cot-4"),
            Agent::sleeping("theta", "🦝", "cot-6"),
        ];

        use TaskPriority::{High, Low, Medium};

        let in_progress = |id: &str, title: &str, assignee: &str, priority, kind: &str| Task {
            id: id.to_string(),
            title: title.to_string(),
            priority,
            kind: kind.to_string(),
            assignee: Some(assignee.to_string()),
            status: TaskStatus::InProgress,
        };
        let mut initial_setup = Task::backlog("OFFICE-0-1", "Initial Canvas Setup", High, "setup");
        initial_setup.status = TaskStatus::Done;

        let tasks = vec![
            in_progress("OFFICE-1-1", "State Management System", "alice", High, "core"),
            in_progress("OFFICE-1-2", "Animation Pipeline", "alpha", High, "core"),
            in_progress("OFFICE-1-4", "Notification System", "zeta", Medium, "feature"),
            Task::backlog("OFFICE-2-1", "Optimize Pool Table Physics", Medium, "enhancement"),
            Task::backlog("OFFICE-2-2", "Add Bird AI to Cage", Low, "feature"),
            Task::backlog("OFFICE-2-3", "Coffee Machine Integration", High, "integration"),
            initial_setup,
        ];

        let ids = |list: &[&str]| list.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        let board = KanbanBoard::new(
            ids(&["OFFICE-2-1", "OFFICE-2-2", "OFFICE-2-3"]),
            ids(&["OFFICE-1-1", "OFFICE-1-2", "OFFICE-1-4"]),
            Vec::new(),
            ids(&["OFFICE-0-1"]),
        );

        Self {
            agents: agents.into_iter().map(|a| (a.name.clone(), a)).collect(),
            tasks: tasks.into_iter().map(|t| (t.id.clone(), t)).collect(),
            board,
            locations,
            tasks_completed: 1,
        }
    }

    // ===== Agent cycle =====

    /// Wakes a sleeping agent for `task_id`
    ///
    /// # Business Rules
    /// - Agent must be sleeping
    /// - The task must exist
    /// - The agent leaves its rest slot (a `RestSlotVacated` event)
    pub fn wake(&mut self, agent_id: &str, task_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        self.task_or_err(task_id)?;
        let agent = self.agent_in(agent_id, AgentState::Sleeping)?;

        let previous = agent.snapshot();
        let slot = agent.location.clone();
        agent.assignment = Some(task_id.to_string());
        agent.state = AgentState::Waking;

        Ok(vec![
            OfficeEvent::RestSlotVacated {
                agent_id: agent_id.to_string(),
                slot,
            },
            transition(agent, previous, Milestone::AgentWoke),
        ])
    }

    /// Sends a waking agent to the kanban board
    pub fn walk_to_board(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        let agent = self.agent_in(agent_id, AgentState::Waking)?;

        let previous = agent.snapshot();
        agent.location = BOARD.to_string();
        agent.state = AgentState::WalkingToBoard;

        Ok(vec![transition(agent, previous, Milestone::AgentAtBoard)])
    }

    /// Claims a backlog task for an agent standing at the board
    ///
    /// # Business Rules
    /// - Agent must be walking to the board
    /// - Task must be in the backlog
    /// - Task moves to in-progress and is assigned to the agent
    pub fn claim_task(
        &mut self,
        agent_id: &str,
        task_id: &str,
    ) -> OfficeResult<Vec<OfficeEvent>> {
        self.require_agent_state(agent_id, AgentState::WalkingToBoard)?;
        self.require_task_status(task_id, TaskStatus::Backlog)?;

        let task_event = self.move_task(
            task_id,
            TaskStatus::Backlog,
            TaskStatus::InProgress,
            Some(agent_id),
        )?;

        let agent = self.agent_in(agent_id, AgentState::WalkingToBoard)?;
        let previous = agent.snapshot();
        agent.task = Some(task_id.to_string());
        agent.assignment = Some(task_id.to_string());
        agent.state = AgentState::Claiming;

        Ok(vec![task_event, transition(agent, previous, Milestone::TaskClaimed)])
    }

    /// Sends an agent that just claimed a task to its own desk
    pub fn walk_to_desk(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        let desk = desk_for(agent_id);
        self.require_agent_state(agent_id, AgentState::Claiming)?;
        if !self.locations.contains(&desk) {
            return Err(OfficeError::UnknownLocation(desk));
        }

        let agent = self.agent_in(agent_id, AgentState::Claiming)?;
        let previous = agent.snapshot();
        agent.location = desk;
        agent.state = AgentState::WalkingToDesk;

        Ok(vec![transition(agent, previous, Milestone::AgentAtDesk)])
    }

    /// Starts work at the desk; the assignment is complete from here on
    pub fn start_working(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        let agent = self.agent_in(agent_id, AgentState::WalkingToDesk)?;

        let task_id = agent
            .task
            .clone()
            .ok_or_else(|| OfficeError::NoTaskHeld(agent_id.to_string()))?;
        let previous = agent.snapshot();
        agent.state = AgentState::Working;

        Ok(vec![
            transition(agent, previous, Milestone::WorkStarted),
            OfficeEvent::TaskAssigned {
                task_id,
                agent_id: agent_id.to_string(),
            },
        ])
    }

    /// Hands a working agent's task over to review and sends the completion
    /// note down the mail chute
    ///
    /// The caller schedules [`Office::finalize_task`] and the walk back to rest.
    pub fn complete_task(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        self.require_agent_state(agent_id, AgentState::Working)?;
        let task_id = self
            .agents
            .get(agent_id)
            .and_then(|a| a.task.clone())
            .ok_or_else(|| OfficeError::NoTaskHeld(agent_id.to_string()))?;
        self.require_task_status(&task_id, TaskStatus::InProgress)?;

        let task_event =
            self.move_task(&task_id, TaskStatus::InProgress, TaskStatus::Review, None)?;
        self.tasks_completed += 1;

        let agent = self.agent_in(agent_id, AgentState::Working)?;
        let previous = agent.snapshot();
        agent.task = None;
        agent.state = AgentState::Completing;

        Ok(vec![
            task_event,
            transition(agent, previous, Milestone::TaskCompleted),
            OfficeEvent::MessageSent {
                task_id,
                agent_id: agent_id.to_string(),
            },
        ])
    }

    /// Moves a reviewed task to done
    pub fn finalize_task(&mut self, task_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        self.require_task_status(task_id, TaskStatus::Review)?;
        let event = self.move_task(task_id, TaskStatus::Review, TaskStatus::Done, None)?;
        let assignee = self.task(task_id).and_then(|t| t.assignee.clone());

        Ok(vec![
            event,
            OfficeEvent::TaskFinalized {
                task_id: task_id.to_string(),
                assignee,
            },
        ])
    }

    /// Sends a completing agent to the lowest free rest slot
    pub fn return_to_rest(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        self.require_agent_state(agent_id, AgentState::Completing)?;
        let slot = self.choose_rest_slot();

        let agent = self.agent_in(agent_id, AgentState::Completing)?;
        let previous = agent.snapshot();
        agent.location = slot;
        agent.state = AgentState::WalkingToRest;

        Ok(vec![transition(agent, previous, Milestone::HeadingToRest)])
    }

    /// Puts an agent that reached its rest slot to sleep
    pub fn settle_at_rest(&mut self, agent_id: &str) -> OfficeResult<Vec<OfficeEvent>> {
        let agent = self.agent_in(agent_id, AgentState::WalkingToRest)?;

        let previous = agent.snapshot();
        agent.assignment = None;
        agent.state = AgentState::Sleeping;

        Ok(vec![transition(agent, previous, Milestone::AgentResting)])
    }

    /// Lowest-numbered rest slot nobody sleeps on or walks to
    ///
    /// Falls back to the first slot when all are taken, so a slot can end
    /// up shared.
    pub fn choose_rest_slot(&self) -> String {
        let occupied: HashSet<&str> = self
            .agents
            .values()
            .filter(|a| matches!(a.state, AgentState::Sleeping | AgentState::WalkingToRest))
            .map(|a| a.location.as_str())
            .collect();

        REST_SLOTS
            .iter()
            .find(|slot| !occupied.contains(*slot))
            .unwrap_or(&REST_SLOTS[0])
            .to_string()
    }

    // ===== Queries =====

    pub fn agent(&self, agent_id: &str) -> Option<&Agent> {
        self.agents.get(agent_id)
    }

    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents.values()
    }

    pub fn agent_snapshot(&self, agent_id: &str) -> Option<AgentSnapshot> {
        self.agents.get(agent_id).map(Agent::snapshot)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.tasks.get(task_id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn board(&self) -> &KanbanBoard {
        &self.board
    }

    pub fn locations(&self) -> &Arc<LocationTable> {
        &self.locations
    }

    pub fn tasks_completed(&self) -> u64 {
        self.tasks_completed
    }

    /// Number of agents that are awake
    pub fn agents_active(&self) -> usize {
        self.agents
            .values()
            .filter(|a| a.state != AgentState::Sleeping)
            .count()
    }

    /// First task waiting in the backlog
    pub fn next_backlog_task(&self) -> Option<&str> {
        self.board.backlog.first().map(String::as_str)
    }

    pub fn sleeping_agents(&self) -> impl Iterator<Item = &Agent> {
        self.agents
            .values()
            .filter(|a| a.state == AgentState::Sleeping)
    }

    /// Verifies the column and agent invariants
    pub fn check_invariants(&self) -> OfficeResult<()> {
        for task in self.tasks.values() {
            let columns = self.board.columns_containing(&task.id);
            if columns != [task.status] {
                return Err(OfficeError::CorruptSnapshot(format!(
                    "task {} has status {} but is listed in {:?}",
                    task.id, task.status, columns
                )));
            }
        }

        let listed: usize = [
            TaskStatus::Backlog,
            TaskStatus::InProgress,
            TaskStatus::Review,
            TaskStatus::Done,
        ]
        .into_iter()
        .map(|s| self.board.column(s).len())
        .sum();
        if listed != self.tasks.len() {
            return Err(OfficeError::CorruptSnapshot(
                "board lists tasks that do not exist".to_string(),
            ));
        }

        for agent in self.agents.values() {
            let off_cot = !is_rest_slot(&agent.location) || agent.task.is_some();
            if agent.state == AgentState::Sleeping && off_cot {
                return Err(OfficeError::CorruptSnapshot(format!(
                    "sleeping agent {} must rest on a free cot",
                    agent.name
                )));
            }
            if agent.task.is_some() && !agent.state.may_hold_task() {
                return Err(OfficeError::CorruptSnapshot(format!(
                    "agent {} holds a task while {}",
                    agent.name, agent.state
                )));
            }
        }

        Ok(())
    }

    // ===== Internals =====

    fn agent_in(&mut self, agent_id: &str, expected: AgentState) -> OfficeResult<&mut Agent> {
        let agent = self
            .agents
            .get_mut(agent_id)
            .ok_or_else(|| OfficeError::AgentNotFound(agent_id.to_string()))?;

        if agent.state != expected {
            return Err(OfficeError::InvalidAgentState {
                agent: agent_id.to_string(),
                expected,
                actual: agent.state,
            });
        }

        Ok(agent)
    }

    fn require_agent_state(&self, agent_id: &str, expected: AgentState) -> OfficeResult<()> {
        let agent = self
            .agents
            .get(agent_id)
            .ok_or_else(|| OfficeError::AgentNotFound(agent_id.to_string()))?;

        if agent.state != expected {
            return Err(OfficeError::InvalidAgentState {
                agent: agent_id.to_string(),
                expected,
                actual: agent.state,
            });
        }
        Ok(())
    }

    fn task_or_err(&self, task_id: &str) -> OfficeResult<&Task> {
        self.tasks
            .get(task_id)
            .ok_or_else(|| OfficeError::TaskNotFound(task_id.to_string()))
    }

    fn require_task_status(&self, task_id: &str, expected: TaskStatus) -> OfficeResult<()> {
        let task = self.task_or_err(task_id)?;
        if task.status != expected {
            return Err(OfficeError::InvalidTaskStatus {
                task: task_id.to_string(),
                expected,
                actual: task.status,
            });
        }
        Ok(())
    }

    /// Moves a task between columns, keeping status and column in step
    fn move_task(
        &mut self,
        task_id: &str,
        from: TaskStatus,
        to: TaskStatus,
        assignee: Option<&str>,
    ) -> OfficeResult<OfficeEvent> {
        if !self.board.move_task(task_id, from, to) {
            return Err(OfficeError::CorruptSnapshot(format!(
                "task {} is not listed in {}",
                task_id, from
            )));
        }

        let task = self
            .tasks
            .get_mut(task_id)
            .ok_or_else(|| OfficeError::TaskNotFound(task_id.to_string()))?;
        task.status = to;
        if let Some(agent_id) = assignee {
            task.assignee = Some(agent_id.to_string());
        }

        Ok(OfficeEvent::TaskMoved {
            task_id: task_id.to_string(),
            from,
            to,
            assignee: task.assignee.clone(),
        })
    }
}

fn transition(agent: &Agent, previous: AgentSnapshot, milestone: Milestone) -> OfficeEvent {
    OfficeEvent::AgentTransitioned(AgentTransition {
        agent_id: agent.name.clone(),
        milestone,
        previous,
        current: agent.snapshot(),
        occurred_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn office() -> Office {
        Office::seeded(Arc::new(LocationTable::office_default()))
    }

    fn walk_to_work(office: &mut Office, agent: &str, task: &str) {
        office.wake(agent, task).unwrap();
        office.walk_to_board(agent).unwrap();
        office.claim_task(agent, task).unwrap();
        office.walk_to_desk(agent).unwrap();
        office.start_working(agent).unwrap();
    }

    #[test]
    fn seeded_office_is_consistent() {
        let office = office();

        assert!(office.check_invariants().is_ok());
        assert_eq!(office.agents().count(), 9);
        assert_eq!(office.agents_active(), 3);
        assert_eq!(office.next_backlog_task(), Some("OFFICE-2-1"));
    }

    #[test]
    fn beta_walks_from_cot_to_desk() {
        let mut office = office();

        walk_to_work(&mut office, "beta", "OFFICE-2-1");

        let beta = office.agent("beta").unwrap();
        assert_eq!(beta.state(), AgentState::Working);
        assert_eq!(beta.location(), "desk-beta");
        assert_eq!(beta.task(), Some("OFFICE-2-1"));

        let task = office.task("OFFICE-2-1").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.assignee.as_deref(), Some("beta"));
        assert_eq!(office.board().columns_containing("OFFICE-2-1"), vec![TaskStatus::InProgress]);
        assert!(office.check_invariants().is_ok());
    }

    #[test]
    fn wake_emits_vacated_slot_and_transition() {
        let mut office = office();

        let events = office.wake("gamma", "OFFICE-2-2").unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(
            events[0],
            OfficeEvent::RestSlotVacated {
                agent_id: "gamma".to_string(),
                slot: "cot-3".to_string()
            }
        );
        let t = events[1].as_transition().unwrap();
        assert_eq!(t.previous.state, AgentState::Sleeping);
        assert_eq!(t.current.state, AgentState::Waking);
        assert_eq!(t.current.task, None);
        assert_eq!(office.agent("gamma").unwrap().assignment(), Some("OFFICE-2-2"));
    }

    #[test]
    fn every_step_emits_observable_snapshots() {
        let mut office = office();
        office.wake("beta", "OFFICE-2-1").unwrap();

        let events = office.walk_to_board("beta").unwrap();
        let t = events[0].as_transition().unwrap();
        assert_eq!(t.previous.location, "cot-1");
        assert_eq!(t.current.location, BOARD);
        assert_eq!(t.current.state, AgentState::WalkingToBoard);

        let events = office.claim_task("beta", "OFFICE-2-1").unwrap();
        assert!(matches!(
            &events[0],
            OfficeEvent::TaskMoved { from: TaskStatus::Backlog, to: TaskStatus::InProgress, .. }
        ));
        let t = events[1].as_transition().unwrap();
        assert_eq!(t.previous.task, None);
        assert_eq!(t.current.task.as_deref(), Some("OFFICE-2-1"));
    }

    #[test]
    fn each_step_names_its_milestone() {
        let mut office = office();
        let mut milestones = Vec::new();
        let mut record = |events: Vec<OfficeEvent>| {
            let transitions = events.iter().filter_map(|e| e.as_transition());
            milestones.extend(transitions.map(|t| t.milestone));
            events
        };

        record(office.wake("beta", "OFFICE-2-1").unwrap());
        record(office.walk_to_board("beta").unwrap());
        record(office.claim_task("beta", "OFFICE-2-1").unwrap());
        record(office.walk_to_desk("beta").unwrap());
        let working = record(office.start_working("beta").unwrap());
        record(office.complete_task("beta").unwrap());
        record(office.return_to_rest("beta").unwrap());
        record(office.settle_at_rest("beta").unwrap());

        assert_eq!(
            working[1],
            OfficeEvent::TaskAssigned {
                task_id: "OFFICE-2-1".to_string(),
                agent_id: "beta".to_string(),
            }
        );
        assert_eq!(
            milestones,
            vec![
                Milestone::AgentWoke,
                Milestone::AgentAtBoard,
                Milestone::TaskClaimed,
                Milestone::AgentAtDesk,
                Milestone::WorkStarted,
                Milestone::TaskCompleted,
                Milestone::HeadingToRest,
                Milestone::AgentResting,
            ]
        );
    }

    #[test]
    fn waking_an_awake_agent_fails_without_change() {
        let mut office = office();
        let before = office.agent("alice").cloned();

        let result = office.wake("alice", "OFFICE-2-1");

        assert_eq!(
            result,
            Err(OfficeError::InvalidAgentState {
                agent: "alice".to_string(),
                expected: AgentState::Sleeping,
                actual: AgentState::Working,
            })
        );
        assert_eq!(office.agent("alice").cloned(), before);
    }

    #[test]
    fn unknown_agent_or_task_is_rejected() {
        let mut office = office();

        assert_eq!(
            office.wake("omega", "OFFICE-2-1"),
            Err(OfficeError::AgentNotFound("omega".to_string()))
        );
        assert_eq!(
            office.wake("beta", "OFFICE-9-9"),
            Err(OfficeError::TaskNotFound("OFFICE-9-9".to_string()))
        );
        assert_eq!(office.agent("beta").unwrap().state(), AgentState::Sleeping);
    }

    #[test]
    fn claiming_a_task_outside_backlog_fails() {
        let mut office = office();
        office.wake("beta", "OFFICE-1-1").unwrap();
        office.walk_to_board("beta").unwrap();

        let result = office.claim_task("beta", "OFFICE-1-1");

        assert!(matches!(
            result,
            Err(OfficeError::InvalidTaskStatus { actual: TaskStatus::InProgress, .. })
        ));
        assert_eq!(office.agent("beta").unwrap().state(), AgentState::WalkingToBoard);
        assert_eq!(office.task("OFFICE-1-1").unwrap().assignee.as_deref(), Some("alice"));
    }

    #[test]
    fn claiming_before_reaching_the_board_fails() {
        let mut office = office();
        office.wake("beta", "OFFICE-2-1").unwrap();

        assert!(office.claim_task("beta", "OFFICE-2-1").is_err());
        assert_eq!(office.task("OFFICE-2-1").unwrap().status, TaskStatus::Backlog);
    }

    #[test]
    fn desk_must_exist_in_location_table() {
        let mut table = std::collections::HashMap::new();
        table.insert("cot-1".to_string(), crate::domain::geometry::Point::new(0.0, 0.0));
        table.insert(BOARD.to_string(), crate::domain::geometry::Point::new(1.0, 1.0));
        let mut office = Office::seeded(Arc::new(LocationTable::new(table)));
        office.wake("beta", "OFFICE-2-1").unwrap();
        office.walk_to_board("beta").unwrap();
        office.claim_task("beta", "OFFICE-2-1").unwrap();

        assert_eq!(
            office.walk_to_desk("beta"),
            Err(OfficeError::UnknownLocation("desk-beta".to_string()))
        );
        assert_eq!(office.agent("beta").unwrap().state(), AgentState::Claiming);
    }

    #[test]
    fn completion_moves_task_through_review_to_done() {
        let mut office = office();
        walk_to_work(&mut office, "beta", "OFFICE-2-1");

        let events = office.complete_task("beta").unwrap();
        assert!(matches!(
            &events[0],
            OfficeEvent::TaskMoved {
                from: TaskStatus::InProgress,
                to: TaskStatus::Review,
                ..
            }
        ));
        assert_eq!(
            events[1].as_transition().map(|t| t.milestone),
            Some(Milestone::TaskCompleted)
        );
        assert_eq!(
            events[2],
            OfficeEvent::MessageSent {
                task_id: "OFFICE-2-1".to_string(),
                agent_id: "beta".to_string(),
            }
        );
        let beta = office.agent("beta").unwrap();
        assert_eq!(beta.state(), AgentState::Completing);
        assert_eq!(beta.task(), None);
        assert_eq!(office.task("OFFICE-2-1").unwrap().status, TaskStatus::Review);
        assert_eq!(office.tasks_completed(), 2);

        let events = office.finalize_task("OFFICE-2-1").unwrap();
        assert_eq!(
            events[1],
            OfficeEvent::TaskFinalized {
                task_id: "OFFICE-2-1".to_string(),
                assignee: Some("beta".to_string()),
            }
        );
        assert_eq!(office.task("OFFICE-2-1").unwrap().status, TaskStatus::Done);
        let done = office.board().column(TaskStatus::Done);
        assert_eq!(done.last().map(String::as_str), Some("OFFICE-2-1"));
        assert!(office.check_invariants().is_ok());
    }

    #[test]
    fn return_to_rest_picks_lowest_free_slot() {
        let mut office = office();
        // beta leaves cot-1, which becomes the lowest free slot
        walk_to_work(&mut office, "beta", "OFFICE-2-1");
        office.complete_task("beta").unwrap();

        assert_eq!(office.choose_rest_slot(), "cot-1");

        office.return_to_rest("beta").unwrap();
        assert_eq!(office.agent("beta").unwrap().location(), "cot-1");
        assert_eq!(office.agent("beta").unwrap().state(), AgentState::WalkingToRest);

        // cot-1 is now reserved by beta's walk; next free is cot-7
        assert_eq!(office.choose_rest_slot(), "cot-7");

        office.settle_at_rest("beta").unwrap();
        let beta = office.agent("beta").unwrap();
        assert_eq!(beta.state(), AgentState::Sleeping);
        assert_eq!(beta.assignment(), None);
        assert!(office.check_invariants().is_ok());
    }

    #[test]
    fn full_cots_fall_back_to_first_slot() {
        let mut office = office();
        walk_to_work(&mut office, "beta", "OFFICE-2-1");
        office.complete_task("beta").unwrap();
        // alice finishes as well and takes cot-1, alpha takes cot-7
        office.complete_task("alice").unwrap();
        office.return_to_rest("alice").unwrap();
        office.complete_task("alpha").unwrap();
        office.return_to_rest("alpha").unwrap();

        assert_eq!(office.agent("alice").unwrap().location(), "cot-1");
        assert_eq!(office.agent("alpha").unwrap().location(), "cot-7");
        assert_eq!(office.choose_rest_slot(), "cot-1");
    }

    #[test]
    fn complete_requires_working_agent() {
        let mut office = office();

        assert!(matches!(
            office.complete_task("beta"),
            Err(OfficeError::InvalidAgentState { expected: AgentState::Working, .. })
        ));
        assert!(office.finalize_task("OFFICE-2-1").is_err());
        assert!(office.return_to_rest("beta").is_err());
        assert!(office.settle_at_rest("beta").is_err());
    }

    #[test]
    fn from_parts_rejects_duplicated_task() {
        let board = KanbanBoard::new(
            vec!["T-1".to_string()],
            vec!["T-1".to_string()],
            Vec::new(),
            Vec::new(),
        );
        let tasks = vec![Task::backlog("T-1", "Twice", TaskPriority::Low, "bug")];

        let result = Office::from_parts(
            vec![Agent::sleeping("beta", "🦊", "cot-1")],
            tasks,
            board,
            Arc::new(LocationTable::office_default()),
            0,
        );

        assert!(matches!(result, Err(OfficeError::CorruptSnapshot(_))));
    }

    #[test]
    fn from_parts_rejects_sleeping_agent_off_cot() {
        let result = Office::from_parts(
            vec![Agent::sleeping("beta", "🦊", "board")],
            Vec::new(),
            KanbanBoard::default(),
            Arc::new(LocationTable::office_default()),
            0,
        );

        assert!(result.is_err());
    }
}
