// Public library interface for IsoCreator-rs
// The command-line host and the debug-layout tool both build on these modules

pub mod app;
pub mod config;
pub mod error;
pub mod events;
pub mod iso;
pub mod layout;
pub mod scanner;
pub mod tree;
pub mod writer;

pub use app::{spawn_build, BuildHandle, BuildJob, BuildPhase, BuildSummary, CancelToken, IsoCreator};
pub use config::BuildOptions;
pub use error::{IsoError, Result};
pub use events::{AbortEvent, BuildEvent, EventSink, FinishEvent, ProgressEvent, ProgressState};
pub use tree::arena::{Content, IsoTree, NodeId};
