//! Mock I2C peripheral for testing
//!
//! Implements both halves of the peripheral contract with plain memory.
//! Tests play the role of the interrupt controller: they load the data
//! register, raise interrupt/status bits, call the protocol engine's
//! processing entry point, then inspect the recorded wire activity.

use crate::master::{I2cConfig, I2cMaster, MasterControl, MasterInterrupts, MasterStatus};
use crate::slave::{AddressSlot, I2cSlave, SlaveInterrupts, SlaveStatus};

use heapless::Vec;

/// Capacity of the recorded wire logs
const LOG: usize = 64;

/// Mock I2C peripheral
///
/// Records every data write, control command, target change and ACK
/// value for test verification, and lets tests pre-load the data
/// registers and status bits that the engines will observe.
#[derive(Debug, Default)]
pub struct MockI2c {
    // Master half
    config: Option<I2cConfig>,
    busy: bool,
    bus_busy: bool,
    master_data: u8,
    master_interrupts: MasterInterrupts,
    master_error: MasterStatus,
    master_int_enabled: bool,
    /// Bytes the engine loaded into the master data register
    pub written: Vec<u8, LOG>,
    /// Control commands in issue order
    pub controls: Vec<MasterControl, LOG>,
    /// (address, receive) pairs in issue order
    pub targets: Vec<(u8, bool), LOG>,

    // Slave half
    addresses: [u8; 2],
    enabled: bool,
    slave_data: u8,
    slave_status: SlaveStatus,
    slave_interrupts: SlaveInterrupts,
    slave_int_enabled: bool,
    ack_override: bool,
    /// Bytes the engine loaded into the slave data register
    pub sent: Vec<u8, LOG>,
    /// ACK values supplied while override was active
    pub acks: Vec<bool, LOG>,
}

impl MockI2c {
    /// Create an idle peripheral
    pub fn new() -> Self {
        Self::default()
    }

    /// Raise or clear the peripheral-busy predicate
    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    /// Raise or clear the bus-busy predicate
    pub fn set_bus_busy(&mut self, busy: bool) {
        self.bus_busy = busy;
    }

    /// Load the master data register (the byte a slave "sent")
    pub fn set_master_data(&mut self, byte: u8) {
        self.master_data = byte;
    }

    /// Raise master interrupt sources
    pub fn raise_master_interrupts(&mut self, which: MasterInterrupts) {
        self.master_interrupts = which;
    }

    /// Set the master error status bits
    pub fn set_master_error(&mut self, status: MasterStatus) {
        self.master_error = status;
    }

    /// Load the slave data register (the byte a master "sent")
    pub fn set_slave_data(&mut self, byte: u8) {
        self.slave_data = byte;
    }

    /// Set the slave status register snapshot
    pub fn set_slave_status(&mut self, status: SlaveStatus) {
        self.slave_status = status;
    }

    /// Raise slave interrupt sources
    pub fn raise_slave_interrupts(&mut self, which: SlaveInterrupts) {
        self.slave_interrupts = which;
    }

    /// Last target latched via [`I2cMaster::set_target`]
    pub fn target(&self) -> Option<(u8, bool)> {
        self.targets.last().copied()
    }

    /// Applied configuration, if any
    pub fn config(&self) -> Option<I2cConfig> {
        self.config
    }

    /// Whether the slave half has been enabled
    pub fn slave_enabled(&self) -> bool {
        self.enabled
    }

    /// Whether the master interrupt sources have been enabled
    pub fn master_interrupts_enabled(&self) -> bool {
        self.master_int_enabled
    }

    /// Whether the slave interrupt sources have been enabled
    pub fn slave_interrupts_enabled(&self) -> bool {
        self.slave_int_enabled
    }

    /// Forget all recorded wire activity
    pub fn clear_log(&mut self) {
        self.written.clear();
        self.controls.clear();
        self.targets.clear();
        self.sent.clear();
        self.acks.clear();
    }
}

impl I2cMaster for MockI2c {
    fn configure(&mut self, config: I2cConfig) {
        self.config = Some(config);
    }

    fn busy(&self) -> bool {
        self.busy
    }

    fn bus_busy(&self) -> bool {
        self.bus_busy
    }

    fn set_target(&mut self, address: u8, receive: bool) {
        let _ = self.targets.push((address, receive));
    }

    fn data_put(&mut self, byte: u8) {
        self.master_data = byte;
        let _ = self.written.push(byte);
    }

    fn data_get(&mut self) -> u8 {
        self.master_data
    }

    fn control(&mut self, control: MasterControl) {
        let _ = self.controls.push(control);
    }

    fn interrupts(&self) -> MasterInterrupts {
        self.master_interrupts
    }

    fn clear_interrupts(&mut self, which: MasterInterrupts) {
        if which.data {
            self.master_interrupts.data = false;
        }
        if which.timeout {
            self.master_interrupts.timeout = false;
        }
    }

    fn error_status(&self) -> MasterStatus {
        self.master_error
    }

    fn interrupt_enable(&mut self) {
        self.master_int_enabled = true;
    }
}

impl I2cSlave for MockI2c {
    fn enable(&mut self) {
        self.enabled = true;
    }

    fn set_address(&mut self, slot: AddressSlot, address: u8) {
        match slot {
            AddressSlot::Primary => self.addresses[0] = address,
            AddressSlot::Secondary => self.addresses[1] = address,
        }
    }

    fn address(&self, slot: AddressSlot) -> u8 {
        match slot {
            AddressSlot::Primary => self.addresses[0],
            AddressSlot::Secondary => self.addresses[1],
        }
    }

    fn interrupts(&self) -> SlaveInterrupts {
        self.slave_interrupts
    }

    fn clear_interrupts(&mut self, which: SlaveInterrupts) {
        if which.start {
            self.slave_interrupts.start = false;
        }
        if which.stop {
            self.slave_interrupts.stop = false;
        }
        if which.data {
            self.slave_interrupts.data = false;
        }
    }

    fn status(&self) -> SlaveStatus {
        self.slave_status
    }

    fn data_put(&mut self, byte: u8) {
        let _ = self.sent.push(byte);
    }

    fn data_get(&mut self) -> u8 {
        self.slave_data
    }

    fn ack_override(&mut self, enable: bool) {
        self.ack_override = enable;
    }

    fn ack_override_enabled(&self) -> bool {
        self.ack_override
    }

    fn set_ack(&mut self, ack: bool) {
        let _ = self.acks.push(ack);
    }

    fn interrupt_enable(&mut self) {
        self.slave_int_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_master_writes_in_order() {
        let mut i2c = MockI2c::new();
        I2cMaster::data_put(&mut i2c, 0x10);
        I2cMaster::data_put(&mut i2c, 0x20);
        i2c.control(MasterControl::BurstSendStart);

        assert_eq!(i2c.written.as_slice(), &[0x10, 0x20]);
        assert_eq!(i2c.controls.as_slice(), &[MasterControl::BurstSendStart]);
    }

    #[test]
    fn clears_only_requested_interrupts() {
        let mut i2c = MockI2c::new();
        i2c.raise_master_interrupts(MasterInterrupts::ALL);
        I2cMaster::clear_interrupts(&mut i2c, MasterInterrupts::DATA);

        let pending = I2cMaster::interrupts(&i2c);
        assert!(!pending.data);
        assert!(pending.timeout);
    }

    #[test]
    fn address_slots_are_independent() {
        let mut i2c = MockI2c::new();
        i2c.set_address(AddressSlot::Primary, 0x40);
        i2c.set_address(AddressSlot::Secondary, 0x41);

        assert_eq!(i2c.address(AddressSlot::Primary), 0x40);
        assert_eq!(i2c.address(AddressSlot::Secondary), 0x41);
    }
}
