//! Session lifecycle: state machine, engine loading, the batching worker,
//! the anti-idle seam, and the orchestrator that ties them together.

pub mod inhibit;
pub mod loader;
pub mod orchestrator;
pub mod state;
pub mod worker;

pub use inhibit::{CappedGuard, IdleInhibitor, InhibitGuard, MockInhibitor, NoopInhibitor};
pub use loader::{EngineLoader, StaticLoader};
pub use orchestrator::SessionOrchestrator;
pub use state::{SessionEvent, SessionPhase, SessionState, StatePublisher};
pub use worker::{BatchWorker, WorkerOutcome};
