//! Dispenser - operator console for a networked token dispenser
//!
//! This library provides the device client and the orchestration engine
//! behind the console: health monitoring, dispense lifecycle tracking,
//! test cycles and bounded request history.

pub mod cli;
pub mod config;
pub mod console;
pub mod device;
pub mod dispense;
pub mod health;
pub mod history;
pub mod logging;
pub mod test_cycle;
