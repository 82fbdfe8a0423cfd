// Animation engine
//
// Turns agent moves into eased walks along curved paths, one walk per agent.

pub mod engine;
pub mod frame_loop;

pub use engine::{
    EngineSettings, HandleId, SharedWalkEngine, WalkCancellation, WalkCompletion, WalkEngine,
    WalkOptions, WalkProgress, WalkUpdate,
};
pub use frame_loop::run_frame_loop;
