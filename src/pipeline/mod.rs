//! The coordination core: session state machine, staged progress, and the
//! controller that drives record → transcribe → clean → deliver.

pub mod controller;
pub mod progress;
pub mod session;

pub use controller::{PipelineController, STARTUP_ESTIMATE_SECS};
pub use progress::{startup_progress, ProgressStage, StageAnimator, StartupAnimator, STAGE_BOUNDARY};
pub use session::{new_shared_session, Phase, Session, SharedSession};
