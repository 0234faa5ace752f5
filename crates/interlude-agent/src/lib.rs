//! Interlude Agent - interruptible execution engine
//!
//! One run = one `submit` or `resume` call. A run loops reason → route → act
//! until the agent answers, a tool suspends for human input, or something
//! fatal happens. Progress leaves through a single ordered `EventStream`.

pub mod executor;
pub mod lease;
pub mod multiplexer;
pub mod reasoner;
pub mod report;
pub mod router;
pub mod store;

pub use executor::Executor;
pub use lease::{ThreadLease, ThreadLeases};
pub use multiplexer::{EventStream, Fragment, Multiplexer, Signal, StepSignal, StepSink, TokenSink};
pub use reasoner::Reasoner;
pub use report::{RunReport, RunStatus};
pub use router::Route;
pub use store::{CheckpointStore, MemoryCheckpointStore};
