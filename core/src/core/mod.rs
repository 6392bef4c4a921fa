pub mod interrupt;
pub mod pins;
pub mod scheduler;

pub use interrupt::{InterruptBank, InterruptKind, InterruptLine, InterruptState, LineDriver};
pub use pins::{LineInput, LineOutput, PortInput, PortOutput};
pub use scheduler::{CpuId, Scheduler, Trigger, run_frame};
