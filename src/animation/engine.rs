use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::domain::geometry::{CurvedPath, Direction, Point};

pub const DEFAULT_WALK_DURATION: Duration = Duration::from_millis(2000);
pub const DEFAULT_CURVE_INTENSITY: f64 = 0.3;
pub const DEFAULT_FRAME_RATE: u32 = 60;

/// Engine shared between the frame loop and whoever starts walks
pub type SharedWalkEngine = Arc<Mutex<WalkEngine>>;

/// Identity of one walk, increasing across the engine's lifetime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u64);

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "walk-{}", self.0)
    }
}

/// One frame of a walk
#[derive(Debug, Clone, PartialEq)]
pub struct WalkUpdate {
    pub agent_id: String,
    pub position: Point,
    /// Eased progress in [0, 1]
    pub progress: f64,
    pub direction: Direction,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkCompletion {
    pub agent_id: String,
    pub position: Point,
    pub duration: Duration,
}

/// Where a walk stands by the clock, independent of the last rendered frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WalkProgress {
    /// Linear progress in [0, 1]
    pub progress: f64,
    pub started_at: Instant,
    pub duration: Duration,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WalkCancellation {
    pub agent_id: String,
    /// Last rendered position
    pub position: Point,
    pub progress: f64,
}

pub type UpdateCallback = Box<dyn FnMut(&WalkUpdate) + Send>;
pub type CompleteCallback = Box<dyn FnOnce(WalkCompletion) + Send>;
pub type CancelCallback = Box<dyn FnOnce(WalkCancellation) + Send>;

/// Per-walk overrides and callbacks
#[derive(Default)]
pub struct WalkOptions {
    pub duration: Option<Duration>,
    pub curve_intensity: Option<f64>,
    pub on_update: Option<UpdateCallback>,
    pub on_complete: Option<CompleteCallback>,
    pub on_cancel: Option<CancelCallback>,
}

impl WalkOptions {
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_curve(mut self, intensity: f64) -> Self {
        self.curve_intensity = Some(intensity);
        self
    }

    pub fn on_update(mut self, f: impl FnMut(&WalkUpdate) + Send + 'static) -> Self {
        self.on_update = Some(Box::new(f));
        self
    }

    pub fn on_complete(mut self, f: impl FnOnce(WalkCompletion) + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn on_cancel(mut self, f: impl FnOnce(WalkCancellation) + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for WalkOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalkOptions")
            .field("duration", &self.duration)
            .field("curve_intensity", &self.curve_intensity)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineSettings {
    pub default_duration: Duration,
    pub curve_intensity: f64,
    pub frame_rate: u32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_duration: DEFAULT_WALK_DURATION,
            curve_intensity: DEFAULT_CURVE_INTENSITY,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

struct ActiveWalk {
    id: HandleId,
    path: CurvedPath,
    started_at: Instant,
    duration: Duration,
    position: Point,
    progress: f64,
    on_update: Option<UpdateCallback>,
    on_complete: Option<CompleteCallback>,
    on_cancel: Option<CancelCallback>,
}

impl ActiveWalk {
    fn cancel(self, agent_id: String) {
        debug!(
            agent_id = %agent_id,
            handle = %self.id,
            progress = self.progress,
            "Walk cancelled"
        );
        if let Some(on_cancel) = self.on_cancel {
            on_cancel(WalkCancellation {
                agent_id,
                position: self.position,
                progress: self.progress,
            });
        }
    }
}

/// Drives at most one curved walk per agent
///
/// The engine never sleeps; `tick` is called once per frame with the frame
/// instant, and every active walk is advanced exactly once per call.
pub struct WalkEngine {
    settings: EngineSettings,
    walks: HashMap<String, ActiveWalk>,
    next_id: u64,
}

impl WalkEngine {
    pub fn new(settings: EngineSettings) -> Self {
        Self {
            settings,
            walks: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn shared(settings: EngineSettings) -> SharedWalkEngine {
        Arc::new(Mutex::new(Self::new(settings)))
    }

    pub fn settings(&self) -> EngineSettings {
        self.settings
    }

    /// Replaces the defaults for walks started from now on
    ///
    /// A running frame loop picks up a new frame rate on its next frame.
    pub fn update_settings(&mut self, settings: EngineSettings) {
        self.settings = settings;
    }

    pub fn start_walk(
        &mut self,
        agent_id: &str,
        from: Point,
        to: Point,
        options: WalkOptions,
    ) -> HandleId {
        self.start_walk_at(agent_id, from, to, options, Instant::now())
    }

    /// Starts a walk; an active walk for the same agent is cancelled first
    /// and its cancel callback runs before this returns.
    pub fn start_walk_at(
        &mut self,
        agent_id: &str,
        from: Point,
        to: Point,
        options: WalkOptions,
        now: Instant,
    ) -> HandleId {
        self.cancel_animation(agent_id);

        self.next_id += 1;
        let id = HandleId(self.next_id);
        let intensity = options.curve_intensity.unwrap_or(self.settings.curve_intensity);
        let duration = options.duration.unwrap_or(self.settings.default_duration);

        self.walks.insert(
            agent_id.to_string(),
            ActiveWalk {
                id,
                path: CurvedPath::new(from, to, intensity),
                started_at: now,
                duration,
                position: from,
                progress: 0.0,
                on_update: options.on_update,
                on_complete: options.on_complete,
                on_cancel: options.on_cancel,
            },
        );

        debug!(
            agent_id = %agent_id,
            handle = %id,
            duration_ms = duration.as_millis() as u64,
            "Walk started"
        );
        id
    }

    /// Advances every walk to `now`; finished walks snap to their end point,
    /// report completion and are removed. Returns the number still active.
    pub fn tick(&mut self, now: Instant) -> usize {
        let mut finished = Vec::new();

        for (agent_id, walk) in self.walks.iter_mut() {
            let linear = linear_progress(walk.started_at, walk.duration, now);
            if linear >= 1.0 {
                finished.push(agent_id.clone());
                continue;
            }

            let eased = ease_out_cubic(linear);
            walk.position = walk.path.position_at(eased);
            walk.progress = eased;

            if let Some(on_update) = walk.on_update.as_mut() {
                on_update(&WalkUpdate {
                    agent_id: agent_id.clone(),
                    position: walk.position,
                    progress: eased,
                    direction: walk.path.direction_at(eased),
                });
            }
        }

        for agent_id in finished {
            if let Some(walk) = self.walks.remove(&agent_id) {
                finish(agent_id, walk);
            }
        }

        self.walks.len()
    }

    /// Cancels the agent's walk; false when none was active
    pub fn cancel_animation(&mut self, agent_id: &str) -> bool {
        match self.walks.remove(agent_id) {
            Some(walk) => {
                walk.cancel(agent_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Cancels everything, returning the affected agents in name order
    pub fn cancel_all_animations(&mut self) -> Vec<String> {
        let mut cancelled: Vec<(String, ActiveWalk)> = self.walks.drain().collect();
        cancelled.sort_by(|a, b| a.0.cmp(&b.0));

        let names = cancelled.iter().map(|(name, _)| name.clone()).collect();
        for (agent_id, walk) in cancelled {
            walk.cancel(agent_id);
        }
        names
    }

    pub fn is_animating(&self, agent_id: &str) -> bool {
        self.walks.contains_key(agent_id)
    }

    pub fn active_animations(&self) -> Vec<String> {
        let mut names: Vec<String> = self.walks.keys().cloned().collect();
        names.sort();
        names
    }

    /// Progress of the agent's walk right now
    pub fn animation_progress(&self, agent_id: &str) -> Option<WalkProgress> {
        self.animation_progress_at(agent_id, Instant::now())
    }

    pub fn animation_progress_at(&self, agent_id: &str, now: Instant) -> Option<WalkProgress> {
        self.walks.get(agent_id).map(|walk| WalkProgress {
            progress: linear_progress(walk.started_at, walk.duration, now),
            started_at: walk.started_at,
            duration: walk.duration,
            elapsed: now.saturating_duration_since(walk.started_at),
        })
    }

    pub fn handle(&self, agent_id: &str) -> Option<HandleId> {
        self.walks.get(agent_id).map(|walk| walk.id)
    }
}

impl Default for WalkEngine {
    fn default() -> Self {
        Self::new(EngineSettings::default())
    }
}

fn finish(agent_id: String, mut walk: ActiveWalk) {
    let end = walk.path.end;

    if let Some(on_update) = walk.on_update.as_mut() {
        on_update(&WalkUpdate {
            agent_id: agent_id.clone(),
            position: end,
            progress: 1.0,
            direction: walk.path.direction_at(1.0),
        });
    }

    debug!(agent_id = %agent_id, handle = %walk.id, "Walk complete");
    if let Some(on_complete) = walk.on_complete {
        on_complete(WalkCompletion {
            agent_id,
            position: end,
            duration: walk.duration,
        });
    }
}

fn linear_progress(started_at: Instant, duration: Duration, now: Instant) -> f64 {
    if duration.is_zero() {
        return 1.0;
    }
    let elapsed = now.saturating_duration_since(started_at);
    (elapsed.as_secs_f64() / duration.as_secs_f64()).min(1.0)
}

pub fn ease_out_cubic(t: f64) -> f64 {
    1.0 - (1.0 - t).powi(3)
}
