pub mod c64;
pub mod cartridge;
pub mod cia;
pub mod config;
pub mod core;
pub mod cpu;
pub mod drive;
pub mod error;
pub mod formats;
pub mod fs;
pub mod iec;
pub mod memory;
pub mod message;
pub mod scheduler;
pub mod serialize;
pub mod sid;
pub mod vic;

pub mod prelude {
    pub use crate::c64::C64;
    pub use crate::config::{Config, ConfigOption, ConfigValue};
    pub use crate::core::{Bus, BusMaster, BusMasterComponent, Component, bus::InterruptState};
    pub use crate::cpu::Cpu;
    pub use crate::error::{Vc64Error, Vc64ErrorCode};
    pub use crate::message::{Message, MessageQueue};
    pub use crate::scheduler::{Runnable, Scheduler};
}
