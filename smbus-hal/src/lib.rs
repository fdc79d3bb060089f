//! Hardware abstraction for the SMBus protocol stack
//!
//! This crate defines the contract between the SMBus protocol engines
//! (`smbus-core`) and the I2C peripheral they drive. The engines are
//! interrupt driven and step the bus one byte at a time, so the traits
//! model a register-level peripheral: data put/get, burst control
//! commands, and status/interrupt queries - not whole-transaction
//! transfers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application firmware                   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  smbus-core (protocol state machines)   │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  smbus-hal (this crate - traits)        │
//! └─────────────────────────────────────────┘
//!                     │
//!         ┌───────────┴───────────┐
//!         ▼                       ▼
//! ┌───────────────┐       ┌───────────────┐
//! │ chip-specific │       │ mock (tests)  │
//! │ peripheral    │       │               │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`I2cMaster`] - master half of the peripheral
//! - [`I2cSlave`] - slave half of the peripheral

#![no_std]
#![deny(unsafe_code)]

pub mod master;
#[cfg(feature = "mock")]
pub mod mock;
pub mod slave;

pub use master::{I2cConfig, I2cMaster, MasterControl, MasterInterrupts, MasterStatus};
pub use slave::{AddressSlot, I2cSlave, SlaveActivity, SlaveInterrupts, SlaveStatus};

#[cfg(feature = "mock")]
pub use mock::MockI2c;
