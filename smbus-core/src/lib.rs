//! SMBus protocol engines
//!
//! System Management Bus transaction protocols layered on an I2C
//! peripheral: two cooperating interrupt-driven state machines, one for
//! the bus-master role and one for the bus-slave role, with optional
//! Packet Error Checking (CRC-8 over the wire bytes, direction bit
//! included) and raw I2C pass-through.
//!
//! One [`SmBus`] instance exists per peripheral. The application starts
//! a master transaction (or arms slave buffers) at task level and calls
//! the matching `*_int_process` entry point from its interrupt handler;
//! every outcome is reported through return values, never through
//! panics or internal retries.
//!
//! ```no_run
//! # fn demo<T: smbus_hal::I2cMaster>(i2c: T) -> Result<(), smbus_core::SmBusError> {
//! use smbus_core::SmBus;
//! use smbus_hal::I2cConfig;
//!
//! let mut word = [0u8; 2];
//! let mut bus = SmBus::new_master(i2c, I2cConfig::SMBUS);
//! bus.pec_enable();
//! bus.read_byte_word(0x48, 0x06, &mut word)?;
//! // ... interrupt handler calls bus.master_int_process() until
//! // bus.status() reports completion ...
//! # Ok(())
//! # }
//! ```

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod arp;
pub mod crc;
mod instance;
mod master;
mod slave;
mod state;
mod status;

pub use arp::{Udid, UDID_PACKET_LEN};
pub use instance::SmBus;
pub use master::BLOCK_MAX;
pub use state::{MasterState, SlaveState, Transfer, TransferFlags};
pub use status::{SlaveEvent, SmBusError};
