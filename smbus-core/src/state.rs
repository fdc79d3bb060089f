//! State machine cursors and per-transfer flags
//!
//! A bus instance carries two independent cursors - one for the master
//! role, one for the slave role. They share instance fields (buffers,
//! counters, the CRC accumulator) but never each other's cursor, so
//! each role gets its own exhaustive enum.

/// Master engine cursor
///
/// The entry state is selected by the transaction-start call; every
/// terminal path (success or error) returns the cursor to [`Idle`].
///
/// [`Idle`]: MasterState::Idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MasterState {
    /// No transfer, or the final byte of a transmit has been issued
    Idle,
    /// Send the declared size byte of a block write
    WriteBlockSize,
    /// Send the next payload byte of a transmit burst
    WriteNext,
    /// Send the last byte: payload, PEC, or the process-call pivot
    WriteFinal,
    /// Arm a single-byte receive
    ReadOne,
    /// Turn the bus around and arm a receive burst
    ReadFirst,
    /// Receive the slave-declared size byte of a block read
    ReadBlockSize,
    /// Receive the next payload byte of a receive burst
    ReadNext,
    /// Receive the penultimate byte of a receive burst
    ReadFinal,
    /// Receive the final byte (the PEC byte when PEC is enabled)
    ReadWait,
    /// Drain one byte after a size error, then fail the transfer
    ReadErrorStop,
}

/// Slave engine cursor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveState {
    /// No transfer in progress
    Idle,
    /// The command byte has been received
    PostCommand,
    /// Receiving payload bytes
    ReadNext,
    /// The next received byte is the master's PEC
    ReadPec,
    /// Receive finished; further bytes are a protocol violation
    ReadDone,
    /// Transmitting payload bytes
    WriteNext,
    /// Transmit the last byte: payload or PEC
    WriteFinal,
    /// Transmit finished; further requests are answered with 0xFF
    WriteDone,
}

/// Per-instance flags
///
/// Each flag is independently settable. `pec`, `raw_i2c`, `arp`,
/// `address_resolved` and `address_valid` persist across transfers;
/// the rest are re-seeded by every transaction-start call (master) or
/// by [`transfer init`](crate::SmBus::slave_transfer_init) (slave).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TransferFlags {
    /// Append and verify a Packet Error Checking byte
    pub pec: bool,
    /// Write-then-read transaction; triggers the bus turnaround
    pub process_call: bool,
    /// First payload byte declares the length of the rest
    pub block_transfer: bool,
    /// A transfer is currently on the wire
    pub transfer_in_progress: bool,
    /// Pass bytes through without SMBus framing
    pub raw_i2c: bool,
    /// ARP: this device's address has been assigned
    pub address_resolved: bool,
    /// ARP: this device's address is valid
    pub address_valid: bool,
    /// An ARP session is active on this instance
    pub arp: bool,
}

/// Coarse transfer status, for polling completion from task level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Transfer {
    InProgress,
    Complete,
}
