pub mod pia6821;
pub mod pia_registry;

pub use pia6821::{Pia6821, PiaBindings};
pub use pia_registry::{Addressing, BusWidth, MAX_PIAS, PiaRegistry, RegisterOrder};
