pub mod agents;
pub mod diagnostics;
pub mod ws;
