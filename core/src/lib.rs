pub mod core;
pub mod device;

pub mod prelude {
    pub use crate::core::interrupt::{
        InterruptBank, InterruptKind, InterruptLine, InterruptState, LineDriver,
    };
    pub use crate::core::pins::{LineInput, LineOutput, PortInput, PortOutput};
    pub use crate::core::scheduler::{CpuId, Scheduler, Trigger, run_frame};
    pub use crate::device::pia6821::{Pia6821, PiaBindings};
    pub use crate::device::pia_registry::{
        Addressing, BusWidth, MAX_PIAS, PiaRegistry, RegisterOrder,
    };
}
