// src/lib.rs - Host library for a G-code driven CMM probe
pub mod config;
pub mod console;
pub mod file_manager;
pub mod gcode;
pub mod hardware;
pub mod input;
pub mod jog;
pub mod motion;
pub mod scan;
pub mod session;
pub mod store;

pub use config::{Config, ConfigError};
pub use session::{MachineSession, SessionError, SessionOutcome};
