//! Slave half of the I2C peripheral
//!
//! The slave engine reacts to START/STOP/DATA interrupts raised while
//! an external master drives the bus. The peripheral reports which kind
//! of data activity occurred (first byte after the address, subsequent
//! byte, or a transmit request) and which of the two programmable own
//! addresses matched.

/// Which of the two own-address registers is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AddressSlot {
    Primary,
    Secondary,
}

/// Kind of data activity behind a slave data interrupt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveActivity {
    /// Spurious interrupt - no request bit set
    None,
    /// First byte after our own address was received
    ReceiveFirstByte,
    /// A subsequent data byte was received
    Receive,
    /// The master requests a byte from us
    TransmitRequest,
}

/// Pending slave interrupt sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveInterrupts {
    /// A START condition addressed this slave
    pub start: bool,
    /// A STOP condition ended the transfer
    pub stop: bool,
    /// Data activity (see [`SlaveStatus::activity`])
    pub data: bool,
}

impl SlaveInterrupts {
    /// Only the data source asserted
    pub const DATA: Self = Self {
        start: false,
        stop: false,
        data: true,
    };

    /// Only the stop source asserted
    pub const STOP: Self = Self {
        start: false,
        stop: true,
        data: false,
    };

    /// Only the start source asserted
    pub const START: Self = Self {
        start: true,
        stop: false,
        data: false,
    };
}

/// Snapshot of the slave status register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SlaveStatus {
    /// What kind of data activity is pending
    pub activity: SlaveActivity,
    /// Which own address matched the last address phase
    pub matched: AddressSlot,
    /// A Quick Command (address + R/S bit, no data) was received
    pub quick_command: bool,
    /// The data bit carried by the Quick Command
    pub quick_command_data: bool,
}

impl Default for SlaveStatus {
    fn default() -> Self {
        Self {
            activity: SlaveActivity::None,
            matched: AddressSlot::Primary,
            quick_command: false,
            quick_command_data: false,
        }
    }
}

/// Slave half of an I2C peripheral
///
/// # Contract
///
/// - Status and interrupt queries are fast, non-blocking register
///   reads, safe to call from an interrupt handler.
/// - When ACK override is enabled the peripheral stretches the clock
///   until [`I2cSlave::set_ack`] supplies the acknowledge value; the
///   protocol layer only classifies bytes, it never decides.
pub trait I2cSlave {
    /// Enable the slave half of the peripheral
    fn enable(&mut self);

    /// Program one of the two own-address registers
    fn set_address(&mut self, slot: AddressSlot, address: u8);

    /// Read back a programmed own address
    fn address(&self, slot: AddressSlot) -> u8;

    /// Pending (masked) interrupt sources
    fn interrupts(&self) -> SlaveInterrupts;

    /// Clear the given interrupt sources
    fn clear_interrupts(&mut self, which: SlaveInterrupts);

    /// Snapshot the status register
    fn status(&self) -> SlaveStatus;

    /// Load the data register for a transmit request
    fn data_put(&mut self, byte: u8);

    /// Read the received byte from the data register
    fn data_get(&mut self) -> u8;

    /// Enable or disable manual acknowledgement
    fn ack_override(&mut self, enable: bool);

    /// Whether manual acknowledgement is enabled
    fn ack_override_enabled(&self) -> bool;

    /// Supply the acknowledge value while ACK override is enabled
    fn set_ack(&mut self, ack: bool);

    /// Enable the data and stop interrupt sources
    fn interrupt_enable(&mut self);
}
