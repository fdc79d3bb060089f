//! Master half of the I2C peripheral
//!
//! The SMBus master engine steps the bus byte by byte from an interrupt
//! handler: it loads the data register, issues a burst control command,
//! and waits for the next data interrupt. These traits mirror that
//! register-level contract.

/// I2C configuration
///
/// SMBus mandates standard mode (100 kHz) and a 25 ms clock-low bus
/// timeout; [`I2cConfig::default`] returns exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Bus frequency in Hz
    pub frequency: u32,
    /// Bus timeout in microseconds (0 disables the hardware timer)
    pub timeout_us: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::SMBUS
    }
}

impl I2cConfig {
    /// SMBus-compliant configuration (100 kHz, 25 ms timeout)
    pub const SMBUS: Self = Self {
        frequency: 100_000,
        timeout_us: 25_000,
    };

    /// Standard mode without a bus timeout
    pub const STANDARD: Self = Self {
        frequency: 100_000,
        timeout_us: 0,
    };
}

/// Burst control commands for the master state machine
///
/// Each command is issued after the data register has been loaded (for
/// transmits) and tells the peripheral how to frame the next byte on
/// the wire: generate a START, keep the burst running, or close it
/// with a STOP.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterControl {
    /// START, address, single data byte, STOP
    SingleSend,
    /// START, address, receive one byte, STOP
    SingleReceive,
    /// START, address, first data byte of a transmit burst
    BurstSendStart,
    /// Next data byte of a transmit burst
    BurstSendCont,
    /// Last data byte of a transmit burst, then STOP
    BurstSendFinish,
    /// Abort a burst with an immediate STOP after an error
    BurstSendErrorStop,
    /// (Repeated) START, address, begin a receive burst
    BurstReceiveStart,
    /// Receive the next byte of a burst, ACK it
    BurstReceiveCont,
    /// Receive the final byte of a burst, NACK it, STOP
    BurstReceiveFinish,
    /// Address plus R/S bit only - no data phase
    QuickCommand,
}

/// Pending master interrupt sources
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterInterrupts {
    /// A data byte has been sent or received
    pub data: bool,
    /// The bus timeout expired (the peripheral auto-issues a STOP)
    pub timeout: bool,
}

impl MasterInterrupts {
    /// Both sources asserted
    pub const ALL: Self = Self {
        data: true,
        timeout: true,
    };

    /// Only the data source asserted
    pub const DATA: Self = Self {
        data: true,
        timeout: false,
    };
}

/// Error bits from the master status register
///
/// Valid after a data interrupt; all bits are cleared by the next
/// control command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MasterStatus {
    /// Arbitration was lost to another bus master
    pub arb_lost: bool,
    /// An error occurred during the last operation
    pub error: bool,
    /// The address phase was not acknowledged
    pub addr_nack: bool,
    /// A data phase was not acknowledged
    pub data_nack: bool,
}

/// Master half of an I2C peripheral
///
/// # Contract
///
/// - All methods are fast, non-blocking register accesses. Any latency
///   in the busy predicates is inherited synchronously by every
///   transaction-start call in the protocol layer.
/// - Exactly one byte moves per data interrupt; the peripheral must
///   deliver interrupts in wire order.
pub trait I2cMaster {
    /// Configure clock and bus timeout
    fn configure(&mut self, config: I2cConfig);

    /// Whether the peripheral itself is mid-transaction
    fn busy(&self) -> bool;

    /// Whether the bus is held by any controller
    fn bus_busy(&self) -> bool;

    /// Latch the target address and direction for the next START
    ///
    /// `receive` is the R/S bit: `true` reads from the slave.
    fn set_target(&mut self, address: u8, receive: bool);

    /// Load the data register
    fn data_put(&mut self, byte: u8);

    /// Read the data register
    fn data_get(&mut self) -> u8;

    /// Issue a burst control command
    fn control(&mut self, control: MasterControl);

    /// Pending (masked) interrupt sources
    fn interrupts(&self) -> MasterInterrupts;

    /// Clear the given interrupt sources
    fn clear_interrupts(&mut self, which: MasterInterrupts);

    /// Error bits from the status register
    fn error_status(&self) -> MasterStatus;

    /// Enable the data and timeout interrupt sources
    fn interrupt_enable(&mut self);
}
