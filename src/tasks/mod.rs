pub mod counter;
pub mod dispatcher;
pub mod orchestrator;
