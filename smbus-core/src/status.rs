//! Error and event codes surfaced by the engines
//!
//! Every engine operation reports through its return value; there is no
//! internal logging, no global error state and no automatic retry.
//! Recovery decisions belong to the calling application.

/// Errors reported by the protocol engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SmBusError {
    /// The I2C peripheral is mid-transaction; retry later
    PeripheralBusy,
    /// The bus is held by another controller; retry later
    BusBusy,
    /// Payload exceeds the protocol limit, a declared block size is
    /// out of range, or a buffer was exhausted unexpectedly
    DataSize,
    /// The bus timeout expired; the peripheral issued a STOP
    Timeout,
    /// Arbitration was lost to another bus master
    ArbitrationLost,
    /// The address phase was not acknowledged
    AddressAck,
    /// A data phase was not acknowledged
    DataAck,
    /// Unknown master error; reachable only through a malformed
    /// status report from the peripheral
    MasterFault,
    /// Computed and received PEC bytes differ
    Pec,
    /// Slave role: unexpected byte, buffer overrun, or a Quick
    /// Command that moved data
    SlaveFault,
    /// Slave role: transmit requested before the TX buffer was armed;
    /// recover with [`slave_data_send`](crate::SmBus::slave_data_send)
    NotReady,
}

/// Events reported by the slave interrupt processing entry point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SlaveEvent {
    /// The interrupt was consumed; nothing for the application to do
    Handled,
    /// The first byte (typically the command) has been received; with
    /// manual ACK enabled this is the moment to accept or reject it
    FirstByte,
    /// A Quick Command arrived carrying the given data bit
    QuickCommand { data: bool },
    /// A STOP ended the transfer
    TransferComplete,
}
