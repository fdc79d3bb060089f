//! Per-peripheral bus instance
//!
//! One [`SmBus`] exists per physical I2C peripheral and owns its
//! transport for the instance's lifetime. TX/RX buffers are borrowed
//! from the caller and are valid only for the duration of the
//! transaction that set them; the instance never copies them.
//!
//! # Re-entrancy
//!
//! The engines provide no internal locking. Task-level transaction
//! starts and the interrupt processing entry points must be serialized
//! externally (on hardware, by masking the peripheral interrupt while
//! a new transaction is being built; in tests, by calling both from the
//! same thread).

use smbus_hal::{AddressSlot, I2cConfig, I2cMaster, I2cSlave};

use crate::arp::Udid;
use crate::state::{MasterState, SlaveState, Transfer, TransferFlags};

/// SMBus instance bound to one I2C peripheral
pub struct SmBus<'b, T> {
    pub(crate) i2c: T,
    pub(crate) udid: Option<&'b Udid>,
    pub(crate) flags: TransferFlags,
    pub(crate) master_state: MasterState,
    pub(crate) slave_state: SlaveState,
    pub(crate) own_address: u8,
    pub(crate) target_address: u8,
    pub(crate) current_command: u8,
    pub(crate) calculated_crc: u8,
    pub(crate) received_crc: u8,
    pub(crate) tx: Option<&'b [u8]>,
    pub(crate) tx_size: u8,
    pub(crate) tx_index: u8,
    pub(crate) rx: Option<&'b mut [u8]>,
    pub(crate) rx_size: u8,
    pub(crate) rx_index: u8,
}

impl<'b, T> SmBus<'b, T> {
    fn bind(i2c: T) -> Self {
        Self {
            i2c,
            udid: None,
            flags: TransferFlags::default(),
            master_state: MasterState::Idle,
            slave_state: SlaveState::Idle,
            own_address: 0,
            target_address: 0,
            current_command: 0,
            calculated_crc: 0,
            received_crc: 0,
            tx: None,
            tx_size: 0,
            tx_index: 0,
            rx: None,
            rx_size: 0,
            rx_index: 0,
        }
    }

    /// Borrow the underlying transport
    pub fn transport(&self) -> &T {
        &self.i2c
    }

    /// Mutably borrow the underlying transport
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.i2c
    }

    /// Enable transmission and checking of the PEC byte
    pub fn pec_enable(&mut self) {
        self.flags.pec = true;
    }

    /// Disable transmission and checking of the PEC byte
    pub fn pec_disable(&mut self) {
        self.flags.pec = false;
    }

    /// Mark an ARP session as active on this instance
    pub fn arp_enable(&mut self) {
        self.flags.arp = true;
    }

    /// Mark the ARP session as finished
    pub fn arp_disable(&mut self) {
        self.flags.arp = false;
    }

    /// Set the ARP Address Resolved flag
    pub fn address_resolved_set(&mut self, value: bool) {
        self.flags.address_resolved = value;
    }

    /// Current value of the ARP Address Resolved flag
    pub fn address_resolved(&self) -> bool {
        self.flags.address_resolved
    }

    /// Set the ARP Address Valid flag
    pub fn address_valid_set(&mut self, value: bool) {
        self.flags.address_valid = value;
    }

    /// Current value of the ARP Address Valid flag
    pub fn address_valid(&self) -> bool {
        self.flags.address_valid
    }

    /// Snapshot of the instance flags
    pub fn flags(&self) -> TransferFlags {
        self.flags
    }

    /// Current master cursor position
    pub fn master_state(&self) -> MasterState {
        self.master_state
    }

    /// Current slave cursor position
    pub fn slave_state(&self) -> SlaveState {
        self.slave_state
    }

    /// Whether a transfer is on the wire or the last one completed
    pub fn status(&self) -> Transfer {
        if self.flags.transfer_in_progress {
            Transfer::InProgress
        } else {
            Transfer::Complete
        }
    }

    /// Number of bytes in the active receive buffer
    ///
    /// After a block read this is the size the slave actually sent.
    pub fn rx_packet_size(&self) -> u8 {
        self.rx_index
    }

    /// Transmit progress, for test and diagnostic snapshots
    pub fn tx_packet_size(&self) -> u8 {
        self.tx_index
    }

    /// The received bytes of the current or last transfer
    pub fn received(&self) -> &[u8] {
        match self.rx.as_deref() {
            Some(rx) => &rx[..usize::min(self.rx_index as usize, rx.len())],
            None => &[],
        }
    }

    /// The captured command byte (first byte after the address phase)
    pub fn slave_command(&self) -> u8 {
        self.current_command
    }

    /// Attach the UDID record this slave reports during ARP
    pub fn udid_set(&mut self, udid: &'b Udid) {
        self.udid = Some(udid);
    }

    /// The attached UDID record, if any
    pub fn udid(&self) -> Option<&Udid> {
        self.udid
    }

    /// Set the slave transmit buffer
    ///
    /// The slice is borrowed until the transfer that consumes it
    /// reaches a terminal state or [`SmBus::slave_transfer_init`] runs.
    pub fn slave_tx_buffer_set(&mut self, data: &'b [u8]) {
        self.tx_size = data.len() as u8;
        self.tx = Some(data);
    }

    /// Set the slave receive buffer
    ///
    /// The buffer length is the declared capacity: a block write whose
    /// size byte exceeds it is rejected with a size error.
    pub fn slave_rx_buffer_set(&mut self, data: &'b mut [u8]) {
        self.rx_size = data.len() as u8;
        self.rx = Some(data);
    }

    /// Set the process call flag for the next slave transfer
    pub fn slave_process_call_enable(&mut self) {
        self.flags.process_call = true;
    }

    /// Clear the process call flag
    pub fn slave_process_call_disable(&mut self) {
        self.flags.process_call = false;
    }

    /// Set the block transfer flag for the next slave transfer
    pub fn slave_block_transfer_enable(&mut self) {
        self.flags.block_transfer = true;
    }

    /// Clear the block transfer flag
    pub fn slave_block_transfer_disable(&mut self) {
        self.flags.block_transfer = false;
    }

    /// Respond to raw I2C (non-SMBus) requests
    ///
    /// Unlike the transfer-scoped flags this is a global setting; it
    /// survives [`SmBus::slave_transfer_init`].
    pub fn slave_raw_i2c_enable(&mut self) {
        self.flags.raw_i2c = true;
    }

    /// Stop responding to raw I2C requests
    pub fn slave_raw_i2c_disable(&mut self) {
        self.flags.raw_i2c = false;
    }

    /// Reset the instance for a new slave transfer
    ///
    /// Clears the transfer-scoped flags, returns both cursors to idle,
    /// zeroes the counters and the CRC accumulator, and releases the
    /// borrowed buffers.
    pub fn slave_transfer_init(&mut self) {
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.transfer_in_progress = false;
        self.master_state = MasterState::Idle;
        self.slave_state = SlaveState::Idle;
        self.current_command = 0;
        self.calculated_crc = 0;
        self.tx = None;
        self.tx_size = 0;
        self.tx_index = 0;
        self.rx = None;
        self.rx_size = 0;
        self.rx_index = 0;
    }

    /// Store a received byte, bounds-checked against the buffer
    pub(crate) fn rx_store(&mut self, byte: u8) {
        let index = self.rx_index as usize;
        if let Some(slot) = self.rx.as_mut().and_then(|rx| rx.get_mut(index)) {
            *slot = byte;
        }
    }

    /// Next TX byte, or the 0xFF filler on an exhausted buffer
    pub(crate) fn next_tx_byte(&mut self) -> u8 {
        let byte = self
            .tx
            .and_then(|tx| tx.get(self.tx_index as usize).copied())
            .unwrap_or(0xFF);
        self.tx_index = self.tx_index.wrapping_add(1);
        byte
    }
}

impl<'b, T: I2cMaster> SmBus<'b, T> {
    /// Initialize an I2C peripheral for SMBus master use
    ///
    /// Configures the peripheral per `config`; [`I2cConfig::SMBUS`]
    /// gives the 100 kHz clock and 25 ms bus timeout the SMBus
    /// specification requires.
    pub fn new_master(mut i2c: T, config: I2cConfig) -> Self {
        i2c.configure(config);
        Self::bind(i2c)
    }

    /// Enable the master data and timeout interrupt sources
    pub fn master_interrupt_enable(&mut self) {
        self.i2c.interrupt_enable();
    }
}

impl<'b, T: I2cSlave> SmBus<'b, T> {
    /// Initialize an I2C peripheral for SMBus slave use
    ///
    /// The slave half is enabled immediately: the specification
    /// requires every device to respond whenever its address appears
    /// on the bus. Automatic acknowledgement is the default; use
    /// [`SmBus::slave_manual_ack_enable`] to take over the ACK bit.
    pub fn new_slave(mut i2c: T) -> Self {
        i2c.enable();
        Self::bind(i2c)
    }

    /// Enable the slave half of a master-initialized instance
    pub fn slave_enable(&mut self) {
        self.i2c.enable();
    }

    /// Program the primary or secondary own address
    pub fn slave_address_set(&mut self, slot: AddressSlot, address: u8) {
        self.i2c.set_address(slot, address);
    }

    /// Which own address the master called out last
    pub fn slave_matched_address(&self) -> AddressSlot {
        self.i2c.status().matched
    }

    /// Supply the ACK value while manual acknowledgement is enabled
    pub fn slave_ack_send(&mut self, ack: bool) {
        self.i2c.set_ack(ack);
    }

    /// Enable manual acknowledgement
    ///
    /// The engine only classifies bytes (see
    /// [`SlaveEvent`](crate::SlaveEvent) and the error codes); the
    /// application decides whether to ACK or NACK and answers with
    /// [`SmBus::slave_ack_send`].
    pub fn slave_manual_ack_enable(&mut self) {
        self.i2c.ack_override(true);
    }

    /// Return to automatic acknowledgement
    pub fn slave_manual_ack_disable(&mut self) {
        self.i2c.ack_override(false);
    }

    /// Whether manual acknowledgement is enabled
    pub fn slave_manual_ack_enabled(&self) -> bool {
        self.i2c.ack_override_enabled()
    }

    /// Enable the slave data and stop interrupt sources
    pub fn slave_interrupt_enable(&mut self) {
        self.i2c.interrupt_enable();
    }
}
