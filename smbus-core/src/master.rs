//! Master engine: transaction starters and interrupt processing
//!
//! Each public operation arms one SMBus transaction and returns; the
//! rest of the transfer is driven by [`SmBus::master_int_process`],
//! called from the application's interrupt handler once per data or
//! timeout interrupt.
//!
//! Every starter follows the same shape: fail fast on a busy
//! peripheral, validate the payload size, record the transfer into the
//! instance, seed the PEC accumulator, load the first wire byte, pick
//! the entry state, and only then re-check the bus so a late collision
//! still surfaces as [`SmBusError::BusBusy`].

use smbus_hal::{I2cMaster, MasterControl, MasterInterrupts};

use crate::crc::crc8;
use crate::instance::SmBus;
use crate::state::MasterState;
use crate::status::SmBusError;

/// Largest payload of a Write Byte / Write Word style transfer
const WORD_MAX: usize = 2;

/// Largest payload of a block transfer, per the SMBus specification
pub const BLOCK_MAX: usize = 32;

impl<'b, T: I2cMaster> SmBus<'b, T> {
    /// Address byte as it appears on the wire, for the PEC calculation
    fn wire_address(address: u8, receive: bool) -> u8 {
        (address << 1) | receive as u8
    }

    fn check_idle(&self) -> Result<(), SmBusError> {
        if self.i2c.busy() {
            Err(SmBusError::PeripheralBusy)
        } else {
            Ok(())
        }
    }

    fn check_bus(&self) -> Result<(), SmBusError> {
        if self.i2c.bus_busy() {
            Err(SmBusError::BusBusy)
        } else {
            Ok(())
        }
    }

    /// Start a Quick Command transfer
    ///
    /// The single data bit travels in the R/S position of the address
    /// byte. Quick Command cannot carry a PEC byte, so the PEC flag is
    /// cleared; re-enable it afterwards if the session needs it.
    pub fn quick_command(&mut self, target: u8, data: bool) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = target;
        self.tx_size = 0;
        self.rx_size = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;
        self.flags.pec = false;
        self.tx_index = 0;
        self.master_state = MasterState::Idle;

        self.i2c.set_target(target, data);
        self.check_bus()?;
        self.i2c.control(MasterControl::QuickCommand);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Host Notify transfer to the SMBus Host (address 0x08)
    ///
    /// Sends this peripheral's own slave address followed by the fixed
    /// two-byte payload. Host Notify cannot carry a PEC byte.
    pub fn host_notify(&mut self, own_address: u8, data: &'b [u8; 2]) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = crate::arp::address::HOST;
        self.tx = Some(data);
        self.tx_size = 2;
        self.rx_size = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;
        self.flags.pec = false;
        self.tx_index = 0;
        self.master_state = MasterState::WriteNext;

        self.i2c.set_target(self.target_address, false);
        self.i2c.data_put(own_address);
        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Send Byte transfer
    ///
    /// Sends a single data byte with no command byte in front of it.
    pub fn send_byte(&mut self, target: u8, data: u8) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = target;
        self.current_command = data;
        self.tx = None;
        self.tx_size = 0;
        self.tx_index = 0;
        self.rx_size = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;

        self.i2c.set_target(target, false);
        self.i2c.data_put(data);

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[data]);
            self.master_state = MasterState::WriteFinal;
            self.check_bus()?;
            self.i2c.control(MasterControl::BurstSendStart);
        } else {
            // Single byte transfer; the next state is already idle.
            self.master_state = MasterState::Idle;
            self.check_bus()?;
            self.i2c.control(MasterControl::SingleSend);
        }
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Receive Byte transfer
    pub fn receive_byte(&mut self, target: u8, data: &'b mut [u8; 1]) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = target;
        self.tx_size = 0;
        self.tx_index = 0;
        self.rx = Some(data);
        self.rx_size = 1;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;

        self.i2c.set_target(target, true);

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, true)]);
            self.master_state = MasterState::ReadFinal;
            self.check_bus()?;
            self.i2c.control(MasterControl::BurstReceiveStart);
        } else {
            self.master_state = MasterState::ReadWait;
            self.check_bus()?;
            self.i2c.control(MasterControl::SingleReceive);
        }
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Write Byte or Write Word transfer
    ///
    /// `data` holds 1 or 2 bytes; anything else is a
    /// [`SmBusError::DataSize`] before any state is touched.
    pub fn write_byte_word(
        &mut self,
        target: u8,
        command: u8,
        data: &'b [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;
        if data.is_empty() || data.len() > WORD_MAX {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.current_command = command;
        self.tx = Some(data);
        self.tx_size = data.len() as u8;
        self.rx_size = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;
        self.tx_index = 0;

        self.i2c.set_target(target, false);

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
            self.calculated_crc = crc8(self.calculated_crc, data);
            self.master_state = MasterState::WriteNext;
        } else if data.len() == 1 {
            self.master_state = MasterState::WriteFinal;
        } else {
            self.master_state = MasterState::WriteNext;
        }

        self.i2c.data_put(command);
        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Read Byte or Read Word transfer
    ///
    /// `data` holds 1 or 2 bytes; anything else is a
    /// [`SmBusError::DataSize`] before any state is touched.
    pub fn read_byte_word(
        &mut self,
        target: u8,
        command: u8,
        data: &'b mut [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;
        if data.is_empty() || data.len() > WORD_MAX {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.current_command = command;
        self.rx_size = data.len() as u8;
        self.rx = Some(data);
        self.tx_size = 0;
        self.tx_index = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;

        self.i2c.set_target(target, false);
        self.i2c.data_put(command);

        if self.flags.pec {
            // The command phase travels in the write direction.
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
            self.master_state = MasterState::ReadFirst;
        } else if self.rx_size == 2 {
            self.master_state = MasterState::ReadFirst;
        } else {
            self.master_state = MasterState::ReadOne;
        }

        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Block Write transfer
    ///
    /// Sends the command byte, the payload size, then up to
    /// [`BLOCK_MAX`] payload bytes.
    pub fn block_write(
        &mut self,
        target: u8,
        command: u8,
        data: &'b [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;
        if data.is_empty() || data.len() > BLOCK_MAX {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.current_command = command;
        self.tx = Some(data);
        self.tx_size = data.len() as u8;
        self.rx_size = 0;
        self.rx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = true;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;
        self.tx_index = 0;

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
            self.calculated_crc = crc8(self.calculated_crc, &[self.tx_size]);
            self.calculated_crc = crc8(self.calculated_crc, data);
        }

        self.i2c.set_target(target, false);
        self.i2c.data_put(command);
        self.master_state = MasterState::WriteBlockSize;
        self.check_bus()?;
        self.flags.transfer_in_progress = true;
        self.i2c.control(MasterControl::BurstSendStart);
        Ok(())
    }

    /// Start a Block Read transfer
    ///
    /// The slave declares the payload length in its first byte; until
    /// that byte arrives the expected size is a placeholder that only
    /// has to route the state machine into the size-byte state. The
    /// declared size must be 1..=32 and fit `data`, otherwise the
    /// transfer ends in [`SmBusError::DataSize`]. After completion
    /// [`SmBus::rx_packet_size`] returns the actual count.
    pub fn block_read(
        &mut self,
        target: u8,
        command: u8,
        data: &'b mut [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = target;
        self.current_command = command;
        self.rx = Some(data);
        self.rx_index = 0;
        self.tx_size = 0;
        self.tx_index = 0;
        self.calculated_crc = 0;
        self.flags.block_transfer = true;
        self.flags.process_call = false;
        self.flags.raw_i2c = false;

        self.i2c.set_target(target, false);
        self.i2c.data_put(command);

        // Overwritten by the slave's size byte before first use.
        self.rx_size = 3;

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
        }

        self.master_state = MasterState::ReadFirst;
        self.check_bus()?;
        self.flags.transfer_in_progress = true;
        self.i2c.control(MasterControl::BurstSendStart);
        Ok(())
    }

    /// Start a Process Call transfer (write two bytes, read two back)
    pub fn process_call(
        &mut self,
        target: u8,
        command: u8,
        tx_data: &'b [u8; 2],
        rx_data: &'b mut [u8; 2],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;

        self.target_address = target;
        self.current_command = command;
        self.tx = Some(tx_data);
        self.rx = Some(rx_data);
        self.tx_index = 0;
        self.tx_size = 2;
        self.rx_index = 0;
        self.rx_size = 2;
        self.calculated_crc = 0;
        self.flags.process_call = true;
        self.flags.block_transfer = false;
        self.flags.raw_i2c = false;

        self.i2c.set_target(target, false);

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
            self.calculated_crc = crc8(self.calculated_crc, tx_data);
        }

        self.i2c.data_put(command);
        self.master_state = MasterState::WriteNext;
        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a Block Process Call transfer
    ///
    /// Writes up to [`BLOCK_MAX`] bytes, turns the bus around and reads
    /// a block reply whose size the slave declares in-band.
    pub fn block_process_call(
        &mut self,
        target: u8,
        command: u8,
        tx_data: &'b [u8],
        rx_data: &'b mut [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;
        if tx_data.is_empty() || tx_data.len() > BLOCK_MAX {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.current_command = command;
        self.tx = Some(tx_data);
        self.rx = Some(rx_data);
        self.tx_index = 0;
        self.tx_size = tx_data.len() as u8;
        self.rx_index = 0;
        self.rx_size = 3;
        self.calculated_crc = 0;
        self.flags.process_call = true;
        self.flags.block_transfer = true;
        self.flags.raw_i2c = false;

        if self.flags.pec {
            self.calculated_crc = crc8(0, &[Self::wire_address(target, false)]);
            self.calculated_crc = crc8(self.calculated_crc, &[command]);
            self.calculated_crc = crc8(self.calculated_crc, &[self.tx_size]);
            self.calculated_crc = crc8(self.calculated_crc, tx_data);
        }

        self.i2c.set_target(target, false);
        self.i2c.data_put(command);
        self.master_state = MasterState::WriteBlockSize;
        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a raw I2C write (no SMBus framing, no PEC)
    pub fn i2c_write(&mut self, target: u8, data: &'b [u8]) -> Result<(), SmBusError> {
        self.check_idle()?;
        if data.is_empty() || data.len() > u8::MAX as usize {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.tx = Some(data);
        self.tx_size = data.len() as u8;
        // The first byte goes out with the START below.
        self.tx_index = 1;
        self.rx_size = 0;
        self.rx_index = 0;
        self.flags.pec = false;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = true;

        self.i2c.set_target(target, false);
        self.i2c.data_put(data[0]);

        match data.len() {
            1 => {
                self.master_state = MasterState::Idle;
                self.check_bus()?;
                self.i2c.control(MasterControl::SingleSend);
            }
            2 => {
                self.master_state = MasterState::WriteFinal;
                self.check_bus()?;
                self.i2c.control(MasterControl::BurstSendStart);
            }
            _ => {
                self.master_state = MasterState::WriteNext;
                self.check_bus()?;
                self.i2c.control(MasterControl::BurstSendStart);
            }
        }
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a raw I2C read (no SMBus framing, no PEC)
    pub fn i2c_read(&mut self, target: u8, data: &'b mut [u8]) -> Result<(), SmBusError> {
        self.check_idle()?;
        if data.is_empty() || data.len() > u8::MAX as usize {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.rx_size = data.len() as u8;
        self.rx = Some(data);
        self.tx_size = 0;
        self.tx_index = 0;
        self.rx_index = 0;
        self.flags.pec = false;
        self.flags.block_transfer = false;
        self.flags.process_call = false;
        self.flags.raw_i2c = true;

        self.i2c.set_target(target, true);
        self.check_bus()?;

        match self.rx_size {
            1 => {
                self.master_state = MasterState::ReadWait;
                self.i2c.control(MasterControl::SingleReceive);
            }
            2 => {
                self.master_state = MasterState::ReadFinal;
                self.i2c.control(MasterControl::BurstReceiveStart);
            }
            _ => {
                self.master_state = MasterState::ReadNext;
                self.i2c.control(MasterControl::BurstReceiveStart);
            }
        }
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Start a raw I2C write followed by a read (no PEC)
    ///
    /// The process call flag drives the bus turnaround even though this
    /// is not an SMBus process call.
    pub fn i2c_write_read(
        &mut self,
        target: u8,
        tx_data: &'b [u8],
        rx_data: &'b mut [u8],
    ) -> Result<(), SmBusError> {
        self.check_idle()?;
        if tx_data.is_empty() || tx_data.len() > u8::MAX as usize {
            return Err(SmBusError::DataSize);
        }
        if rx_data.is_empty() || rx_data.len() > u8::MAX as usize {
            return Err(SmBusError::DataSize);
        }

        self.target_address = target;
        self.tx = Some(tx_data);
        self.tx_size = tx_data.len() as u8;
        self.tx_index = 1;
        self.rx_size = rx_data.len() as u8;
        self.rx = Some(rx_data);
        self.rx_index = 0;
        self.flags.pec = false;
        self.flags.process_call = true;
        self.flags.block_transfer = false;
        self.flags.raw_i2c = true;

        self.i2c.set_target(target, false);
        self.i2c.data_put(tx_data[0]);

        self.master_state = match self.tx_size {
            1 => MasterState::ReadFirst,
            2 => MasterState::WriteFinal,
            _ => MasterState::WriteNext,
        };

        self.check_bus()?;
        self.i2c.control(MasterControl::BurstSendStart);
        self.flags.transfer_in_progress = true;
        Ok(())
    }

    /// Process one master interrupt
    ///
    /// Call from the application ISR for every data or timeout
    /// interrupt. Errors are terminal for the in-flight transaction:
    /// the cursor returns to idle and `transfer-in-progress` clears (on
    /// a NACK, after the peripheral's second interrupt). No retry
    /// happens here; that policy belongs to the caller.
    pub fn master_int_process(&mut self) -> Result<(), SmBusError> {
        // Timeout first: the peripheral has already issued the STOP.
        let interrupts = self.i2c.interrupts();
        if interrupts.timeout {
            self.i2c.clear_interrupts(MasterInterrupts::ALL);
            self.master_state = MasterState::Idle;
            self.flags.transfer_in_progress = false;
            return Err(SmBusError::Timeout);
        }
        self.i2c.clear_interrupts(MasterInterrupts::DATA);

        let status = self.i2c.error_status();
        if status.arb_lost {
            self.master_state = MasterState::Idle;
            self.flags.transfer_in_progress = false;
            return Err(SmBusError::ArbitrationLost);
        }
        if status.error {
            self.master_state = MasterState::Idle;
            // A NACK raises two interrupts; the bus is only free on the
            // second. Issue the STOP on the first.
            if self.i2c.bus_busy() {
                self.i2c.control(MasterControl::BurstSendErrorStop);
            } else {
                self.flags.transfer_in_progress = false;
            }
            return Err(if status.addr_nack {
                SmBusError::AddressAck
            } else if status.data_nack {
                SmBusError::DataAck
            } else {
                SmBusError::MasterFault
            });
        }

        match self.master_state {
            // Reached after the last byte of a transmit has gone out.
            MasterState::Idle => {
                if !self.i2c.busy() {
                    self.flags.transfer_in_progress = false;
                }
            }

            MasterState::WriteBlockSize => {
                self.i2c.data_put(self.tx_size);
                self.i2c.control(MasterControl::BurstSendCont);
                self.master_state = if self.tx_size == 1 && !self.flags.pec {
                    MasterState::WriteFinal
                } else {
                    MasterState::WriteNext
                };
            }

            MasterState::WriteNext => {
                let byte = self.next_tx_byte();
                self.i2c.data_put(byte);
                self.i2c.control(MasterControl::BurstSendCont);

                // A process call transmit never carries a PEC byte, so
                // with PEC the handoff point depends on the flag.
                if self.flags.pec {
                    if self.flags.process_call {
                        if self.tx_index + 1 == self.tx_size {
                            self.master_state = MasterState::WriteFinal;
                        }
                    } else if self.tx_index == self.tx_size {
                        self.master_state = MasterState::WriteFinal;
                    }
                } else if self.tx_index + 1 == self.tx_size {
                    self.master_state = MasterState::WriteFinal;
                }
            }

            MasterState::WriteFinal => {
                if self.flags.pec && !self.flags.process_call {
                    let pec = self.calculated_crc;
                    self.i2c.data_put(pec);
                } else {
                    let byte = self.next_tx_byte();
                    self.i2c.data_put(byte);
                }

                if self.flags.process_call {
                    // Repeated START for the receive half.
                    self.master_state = MasterState::ReadFirst;
                    self.i2c.control(MasterControl::BurstSendCont);
                } else {
                    self.i2c.control(MasterControl::BurstSendFinish);
                    self.master_state = MasterState::Idle;
                }
            }

            MasterState::ReadOne => {
                self.i2c.set_target(self.target_address, true);
                self.i2c.control(MasterControl::SingleReceive);
                self.master_state = MasterState::ReadWait;
            }

            MasterState::ReadFirst => {
                self.i2c.set_target(self.target_address, true);

                if self.flags.pec {
                    let wire = Self::wire_address(self.target_address, true);
                    self.calculated_crc = crc8(self.calculated_crc, &[wire]);
                    self.master_state = if self.rx_size > 1 {
                        if self.flags.block_transfer {
                            MasterState::ReadBlockSize
                        } else {
                            MasterState::ReadNext
                        }
                    } else {
                        MasterState::ReadFinal
                    };
                } else {
                    self.master_state = if self.rx_size > 2 {
                        if self.flags.block_transfer {
                            MasterState::ReadBlockSize
                        } else {
                            MasterState::ReadNext
                        }
                    } else {
                        MasterState::ReadFinal
                    };
                }

                self.i2c.control(MasterControl::BurstReceiveStart);
            }

            MasterState::ReadBlockSize => {
                let size = self.i2c.data_get();
                let capacity = self.rx.as_deref().map_or(0, <[u8]>::len);

                if size == 0 || size as usize > BLOCK_MAX || size as usize > capacity {
                    self.master_state = MasterState::ReadErrorStop;
                    self.i2c.control(MasterControl::SingleReceive);
                } else {
                    self.rx_size = size;
                    if self.flags.pec {
                        self.calculated_crc = crc8(self.calculated_crc, &[size]);
                    }

                    self.master_state = match size {
                        1 if self.flags.pec => MasterState::ReadFinal,
                        1 => MasterState::ReadWait,
                        2 if self.flags.pec => MasterState::ReadNext,
                        2 => MasterState::ReadFinal,
                        _ => MasterState::ReadNext,
                    };

                    if size == 1 && !self.flags.pec {
                        // Exactly one byte left: read it and STOP.
                        self.i2c.control(MasterControl::BurstReceiveFinish);
                    } else {
                        self.i2c.control(MasterControl::BurstReceiveCont);
                    }
                }
            }

            MasterState::ReadNext => {
                if self.rx_index >= self.rx_size {
                    let _ = self.i2c.data_get();
                    self.i2c.control(MasterControl::BurstReceiveFinish);
                    self.master_state = MasterState::ReadErrorStop;
                } else {
                    let byte = self.i2c.data_get();
                    self.rx_store(byte);
                    self.i2c.control(MasterControl::BurstReceiveCont);

                    if self.flags.pec {
                        self.calculated_crc = crc8(self.calculated_crc, &[byte]);
                        self.rx_index += 1;
                        if self.rx_index + 1 == self.rx_size {
                            self.master_state = MasterState::ReadFinal;
                        }
                    } else {
                        self.rx_index += 1;
                        if self.rx_index + 2 == self.rx_size {
                            self.master_state = MasterState::ReadFinal;
                        }
                    }
                }
            }

            MasterState::ReadFinal => {
                if self.rx_index >= self.rx_size {
                    let _ = self.i2c.data_get();
                    self.i2c.control(MasterControl::BurstReceiveFinish);
                    self.master_state = MasterState::ReadErrorStop;
                } else {
                    let byte = self.i2c.data_get();
                    self.rx_store(byte);
                    self.master_state = MasterState::ReadWait;
                    self.i2c.control(MasterControl::BurstReceiveFinish);
                    if self.flags.pec {
                        self.calculated_crc = crc8(self.calculated_crc, &[byte]);
                    }
                    self.rx_index += 1;
                }
            }

            MasterState::ReadWait => {
                let byte = self.i2c.data_get();

                if self.flags.pec {
                    if self.rx_index > self.rx_size {
                        self.master_state = MasterState::Idle;
                        self.flags.transfer_in_progress = false;
                        return Err(SmBusError::DataSize);
                    }
                    self.received_crc = byte;
                    if self.received_crc != self.calculated_crc {
                        self.master_state = MasterState::Idle;
                        self.flags.transfer_in_progress = false;
                        return Err(SmBusError::Pec);
                    }
                } else {
                    if self.rx_index >= self.rx_size {
                        self.master_state = MasterState::Idle;
                        self.flags.transfer_in_progress = false;
                        return Err(SmBusError::DataSize);
                    }
                    self.rx_store(byte);
                    self.rx_index += 1;
                }

                self.master_state = MasterState::Idle;
                self.flags.transfer_in_progress = false;
            }

            MasterState::ReadErrorStop => {
                let _ = self.i2c.data_get();
                self.master_state = MasterState::Idle;
                self.flags.transfer_in_progress = false;
                return Err(SmBusError::DataSize);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{Transfer, TransferFlags};
    use proptest::prelude::*;
    use smbus_hal::{I2cConfig, MasterStatus, MockI2c};

    fn master_bus<'b>() -> SmBus<'b, MockI2c> {
        SmBus::new_master(MockI2c::new(), I2cConfig::SMBUS)
    }

    /// Simulate one data interrupt.
    fn pump(bus: &mut SmBus<'_, MockI2c>) -> Result<(), SmBusError> {
        bus.transport_mut()
            .raise_master_interrupts(MasterInterrupts::DATA);
        bus.master_int_process()
    }

    /// Simulate a data interrupt delivering a received byte.
    fn feed(bus: &mut SmBus<'_, MockI2c>, byte: u8) -> Result<(), SmBusError> {
        bus.transport_mut().set_master_data(byte);
        pump(bus)
    }

    #[test]
    fn test_send_byte_without_pec() {
        let mut bus = master_bus();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));

        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.status(), Transfer::InProgress);
        assert_eq!(bus.transport().target(), Some((0x50, false)));
        assert_eq!(bus.transport().written.as_slice(), &[0x42]);
        assert_eq!(
            bus.transport().controls.as_slice(),
            &[MasterControl::SingleSend]
        );

        // One interrupt at the end of the single-byte transmit.
        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_send_byte_with_pec() {
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));
        assert_eq!(bus.master_state(), MasterState::WriteFinal);

        assert_eq!(pump(&mut bus), Ok(())); // PEC byte out
        assert_eq!(pump(&mut bus), Ok(())); // transmit finished

        let pec = crc8(0, &[0x50 << 1, 0x42]);
        assert_eq!(bus.transport().written.as_slice(), &[0x42, pec]);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_quick_command_clears_pec_flag() {
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.quick_command(0x50, true), Ok(()));

        assert!(!bus.flags().pec);
        assert_eq!(bus.transport().target(), Some((0x50, true)));
        assert_eq!(
            bus.transport().controls.as_slice(),
            &[MasterControl::QuickCommand]
        );
        // No data bytes move at all.
        assert!(bus.transport().written.is_empty());

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_write_word_pec_wire_order() {
        let word = [0x34, 0x12];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.write_byte_word(0x50, 0x10, &word), Ok(()));

        assert_eq!(pump(&mut bus), Ok(())); // data[0]
        assert_eq!(pump(&mut bus), Ok(())); // data[1]
        assert_eq!(pump(&mut bus), Ok(())); // PEC
        assert_eq!(pump(&mut bus), Ok(())); // finished

        let pec = crc8(0, &[0x50 << 1, 0x10, 0x34, 0x12]);
        assert_eq!(
            bus.transport().written.as_slice(),
            &[0x10, 0x34, 0x12, pec]
        );
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_word_size_limit() {
        let data = [0u8; 3];
        let mut word = [0u8; 3];
        let mut bus = master_bus();
        let before = bus.flags();

        assert_eq!(
            bus.write_byte_word(0x50, 0x10, &data),
            Err(SmBusError::DataSize)
        );
        assert_eq!(
            bus.read_byte_word(0x50, 0x10, &mut word),
            Err(SmBusError::DataSize)
        );

        // Nothing was touched.
        assert_eq!(bus.flags(), before);
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.tx_packet_size(), 0);
        assert_eq!(bus.rx_packet_size(), 0);
        assert!(bus.transport().written.is_empty());
    }

    #[test]
    fn test_block_size_limit() {
        let data = [0u8; 33];
        let mut reply = [0u8; 32];
        let mut bus = master_bus();

        assert_eq!(
            bus.block_write(0x50, 0x10, &data),
            Err(SmBusError::DataSize)
        );
        assert_eq!(
            bus.block_process_call(0x50, 0x10, &data, &mut reply),
            Err(SmBusError::DataSize)
        );
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert!(bus.transport().written.is_empty());
    }

    #[test]
    fn test_peripheral_busy_rejects_everything_unchanged() {
        let tx = [0u8; 2];
        let notify = [0u8; 2];
        let txw = [0u8; 2];
        let mut byte = [0u8; 1];
        let mut word = [0u8; 2];
        let mut pc_reply = [0u8; 2];
        let mut block = [0u8; 32];
        let mut bpc_reply = [0u8; 32];
        let mut raw = [0u8; 2];
        let mut raw_reply = [0u8; 2];

        let mut bus = master_bus();
        bus.pec_enable();
        let before: TransferFlags = bus.flags();
        bus.transport_mut().set_busy(true);

        assert_eq!(bus.quick_command(0x50, false), Err(SmBusError::PeripheralBusy));
        assert_eq!(bus.host_notify(0x28, &notify), Err(SmBusError::PeripheralBusy));
        assert_eq!(bus.send_byte(0x50, 0x42), Err(SmBusError::PeripheralBusy));
        assert_eq!(bus.receive_byte(0x50, &mut byte), Err(SmBusError::PeripheralBusy));
        assert_eq!(
            bus.write_byte_word(0x50, 0x10, &tx),
            Err(SmBusError::PeripheralBusy)
        );
        assert_eq!(
            bus.read_byte_word(0x50, 0x10, &mut word),
            Err(SmBusError::PeripheralBusy)
        );
        assert_eq!(bus.block_write(0x50, 0x10, &tx), Err(SmBusError::PeripheralBusy));
        assert_eq!(
            bus.block_read(0x50, 0x10, &mut block),
            Err(SmBusError::PeripheralBusy)
        );
        assert_eq!(
            bus.process_call(0x50, 0x10, &txw, &mut pc_reply),
            Err(SmBusError::PeripheralBusy)
        );
        assert_eq!(
            bus.block_process_call(0x50, 0x10, &tx, &mut bpc_reply),
            Err(SmBusError::PeripheralBusy)
        );
        assert_eq!(bus.i2c_write(0x50, &tx), Err(SmBusError::PeripheralBusy));
        assert_eq!(bus.i2c_read(0x50, &mut raw), Err(SmBusError::PeripheralBusy));
        assert_eq!(
            bus.i2c_write_read(0x50, &tx, &mut raw_reply),
            Err(SmBusError::PeripheralBusy)
        );

        assert_eq!(bus.flags(), before);
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.tx_packet_size(), 0);
        assert_eq!(bus.rx_packet_size(), 0);
        assert!(bus.transport().written.is_empty());
        assert!(bus.transport().controls.is_empty());
        assert!(bus.transport().targets.is_empty());
    }

    #[test]
    fn test_bus_busy_surfaces_late_collision() {
        let mut bus = master_bus();
        bus.transport_mut().set_bus_busy(true);
        assert_eq!(bus.send_byte(0x50, 0x42), Err(SmBusError::BusBusy));
        // The command byte was already armed but no control was issued.
        assert!(bus.transport().controls.is_empty());
    }

    #[test]
    fn test_read_word_without_pec() {
        let mut word = [0u8; 2];
        let mut bus = master_bus();
        assert_eq!(bus.read_byte_word(0x50, 0x06, &mut word), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFirst);

        assert_eq!(pump(&mut bus), Ok(())); // command sent, turn around
        assert_eq!(bus.master_state(), MasterState::ReadFinal);
        assert_eq!(bus.transport().target(), Some((0x50, true)));

        assert_eq!(feed(&mut bus, 0xCD), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadWait);
        assert_eq!(feed(&mut bus, 0xAB), Ok(()));

        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0xCD, 0xAB]);
    }

    #[test]
    fn test_read_byte_pec_accepts_matching_crc() {
        let mut byte = [0u8; 1];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.read_byte_word(0x48, 0x06, &mut byte), Ok(()));

        assert_eq!(pump(&mut bus), Ok(())); // command sent
        assert_eq!(feed(&mut bus, 0x7F), Ok(())); // data byte

        let pec = crc8(0, &[0x48 << 1, 0x06, (0x48 << 1) | 1, 0x7F]);
        assert_eq!(feed(&mut bus, pec), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0x7F]);
    }

    #[test]
    fn test_read_byte_pec_rejects_corrupt_crc() {
        let mut byte = [0u8; 1];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.read_byte_word(0x48, 0x06, &mut byte), Ok(()));

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(feed(&mut bus, 0x7F), Ok(()));

        let pec = crc8(0, &[0x48 << 1, 0x06, (0x48 << 1) | 1, 0x7F]);
        assert_eq!(feed(&mut bus, pec ^ 0x01), Err(SmBusError::Pec));
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_receive_byte_without_pec() {
        let mut byte = [0u8; 1];
        let mut bus = master_bus();
        assert_eq!(bus.receive_byte(0x50, &mut byte), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadWait);
        assert_eq!(bus.transport().target(), Some((0x50, true)));

        assert_eq!(feed(&mut bus, 0x99), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0x99]);
    }

    #[test]
    fn test_receive_byte_with_pec() {
        let mut byte = [0u8; 1];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.receive_byte(0x50, &mut byte), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFinal);

        assert_eq!(feed(&mut bus, 0x99), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadWait);

        let pec = crc8(0, &[(0x50 << 1) | 1, 0x99]);
        assert_eq!(feed(&mut bus, pec), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0x99]);
    }

    #[test]
    fn test_read_byte_without_pec() {
        let mut byte = [0u8; 1];
        let mut bus = master_bus();
        assert_eq!(bus.read_byte_word(0x50, 0x06, &mut byte), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadOne);

        assert_eq!(pump(&mut bus), Ok(())); // command sent, arm receive
        assert_eq!(bus.master_state(), MasterState::ReadWait);
        assert_eq!(bus.transport().target(), Some((0x50, true)));

        assert_eq!(feed(&mut bus, 0x3C), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0x3C]);
    }

    #[test]
    fn test_raw_i2c_write_of_two_bytes() {
        let data = [0x0D, 0x0E];
        let mut bus = master_bus();
        assert_eq!(bus.i2c_write(0x50, &data), Ok(()));
        assert_eq!(bus.master_state(), MasterState::WriteFinal);

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(pump(&mut bus), Ok(()));

        assert_eq!(bus.transport().written.as_slice(), &[0x0D, 0x0E]);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_block_write_pec_wire_order() {
        let data = [0x11, 0x22, 0x33];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.block_write(0x50, 0x20, &data), Ok(()));
        assert_eq!(bus.master_state(), MasterState::WriteBlockSize);

        assert_eq!(pump(&mut bus), Ok(())); // size byte
        assert_eq!(pump(&mut bus), Ok(())); // data[0]
        assert_eq!(pump(&mut bus), Ok(())); // data[1]
        assert_eq!(pump(&mut bus), Ok(())); // data[2]
        assert_eq!(pump(&mut bus), Ok(())); // PEC
        assert_eq!(pump(&mut bus), Ok(())); // finished

        let pec = crc8(0, &[0x50 << 1, 0x20, 3, 0x11, 0x22, 0x33]);
        assert_eq!(
            bus.transport().written.as_slice(),
            &[0x20, 3, 0x11, 0x22, 0x33, pec]
        );
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_block_read_size_handshake() {
        let mut data = [0u8; 32];
        let mut bus = master_bus();
        assert_eq!(bus.block_read(0x50, 0x10, &mut data), Ok(()));

        assert_eq!(pump(&mut bus), Ok(())); // command sent, turn around
        assert_eq!(bus.master_state(), MasterState::ReadBlockSize);

        assert_eq!(feed(&mut bus, 4), Ok(())); // slave declares 4 bytes
        assert_eq!(feed(&mut bus, 0xDE), Ok(()));
        assert_eq!(feed(&mut bus, 0xAD), Ok(()));
        assert_eq!(feed(&mut bus, 0xBE), Ok(()));
        assert_eq!(feed(&mut bus, 0xEF), Ok(()));

        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.rx_packet_size(), 4);
        assert_eq!(bus.received(), &[0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn test_block_read_rejects_bad_declared_size() {
        for bad in [0u8, 33] {
            let mut data = [0u8; 64];
            let mut bus = master_bus();
            assert_eq!(bus.block_read(0x50, 0x10, &mut data), Ok(()));

            assert_eq!(pump(&mut bus), Ok(()));
            assert_eq!(feed(&mut bus, bad), Ok(()));
            assert_eq!(bus.master_state(), MasterState::ReadErrorStop);

            assert_eq!(pump(&mut bus), Err(SmBusError::DataSize));
            assert_eq!(bus.master_state(), MasterState::Idle);
            assert_eq!(bus.status(), Transfer::Complete);
        }
    }

    #[test]
    fn test_block_read_rejects_reply_larger_than_buffer() {
        let mut data = [0u8; 4];
        let mut bus = master_bus();
        assert_eq!(bus.block_read(0x50, 0x10, &mut data), Ok(()));

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(feed(&mut bus, 8), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadErrorStop);
        assert_eq!(pump(&mut bus), Err(SmBusError::DataSize));
    }

    #[test]
    fn test_process_call_turnaround() {
        let tx = [0xA1, 0xB2];
        let mut rx = [0u8; 2];
        let mut bus = master_bus();
        assert_eq!(bus.process_call(0x50, 0x30, &tx, &mut rx), Ok(()));
        assert_eq!(bus.master_state(), MasterState::WriteNext);

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::WriteFinal);
        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFirst);
        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFinal);
        assert_eq!(bus.transport().target(), Some((0x50, true)));
        assert_eq!(feed(&mut bus, 0xC3), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadWait);
        assert_eq!(feed(&mut bus, 0xD4), Ok(()));
        assert_eq!(bus.master_state(), MasterState::Idle);

        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.transport().written.as_slice(), &[0x30, 0xA1, 0xB2]);
        assert_eq!(bus.received(), &[0xC3, 0xD4]);
    }

    #[test]
    fn test_process_call_pec_covers_both_directions() {
        let tx = [0xA1, 0xB2];
        let mut rx = [0u8; 2];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.process_call(0x50, 0x30, &tx, &mut rx), Ok(()));

        assert_eq!(pump(&mut bus), Ok(())); // tx[0]
        assert_eq!(pump(&mut bus), Ok(())); // tx[1], turn around
        assert_eq!(pump(&mut bus), Ok(())); // arm receive
        assert_eq!(feed(&mut bus, 0xC3), Ok(()));
        assert_eq!(feed(&mut bus, 0xD4), Ok(()));

        let pec = crc8(
            0,
            &[
                0x50 << 1,
                0x30,
                0xA1,
                0xB2,
                (0x50 << 1) | 1,
                0xC3,
                0xD4,
            ],
        );
        assert_eq!(feed(&mut bus, pec), Ok(()));
        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.received(), &[0xC3, 0xD4]);
    }

    #[test]
    fn test_host_notify_wire_order() {
        let payload = [0x12, 0x34];
        let mut bus = master_bus();
        bus.pec_enable(); // must be forced off for this protocol
        assert_eq!(bus.host_notify(0x28, &payload), Ok(()));

        assert!(!bus.flags().pec);
        assert_eq!(bus.transport().target(), Some((crate::arp::address::HOST, false)));

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(pump(&mut bus), Ok(()));

        assert_eq!(bus.transport().written.as_slice(), &[0x28, 0x12, 0x34]);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_timeout_aborts_transfer() {
        let mut bus = master_bus();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));

        bus.transport_mut()
            .raise_master_interrupts(MasterInterrupts::ALL);
        assert_eq!(bus.master_int_process(), Err(SmBusError::Timeout));

        assert_eq!(bus.status(), Transfer::Complete);
        assert_eq!(bus.master_state(), MasterState::Idle);
        // Both sources must be cleared.
        assert_eq!(bus.transport().interrupts(), MasterInterrupts::default());
    }

    #[test]
    fn test_arbitration_loss_aborts_transfer() {
        let word = [0x01, 0x02];
        let mut bus = master_bus();
        assert_eq!(bus.write_byte_word(0x50, 0x10, &word), Ok(()));

        bus.transport_mut().set_master_error(MasterStatus {
            arb_lost: true,
            ..MasterStatus::default()
        });
        assert_eq!(pump(&mut bus), Err(SmBusError::ArbitrationLost));
        assert_eq!(bus.master_state(), MasterState::Idle);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_address_nack_stops_in_two_interrupts() {
        let mut bus = master_bus();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));

        bus.transport_mut().set_master_error(MasterStatus {
            error: true,
            addr_nack: true,
            ..MasterStatus::default()
        });

        // First interrupt: the bus is still held, issue the STOP.
        bus.transport_mut().set_bus_busy(true);
        assert_eq!(pump(&mut bus), Err(SmBusError::AddressAck));
        assert_eq!(bus.status(), Transfer::InProgress);
        assert_eq!(
            bus.transport().controls.last(),
            Some(&MasterControl::BurstSendErrorStop)
        );

        // Second interrupt: the bus is free, the transfer is over.
        bus.transport_mut().set_bus_busy(false);
        assert_eq!(pump(&mut bus), Err(SmBusError::AddressAck));
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_data_nack_and_unknown_error() {
        let mut bus = master_bus();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));
        bus.transport_mut().set_master_error(MasterStatus {
            error: true,
            data_nack: true,
            ..MasterStatus::default()
        });
        assert_eq!(pump(&mut bus), Err(SmBusError::DataAck));

        let mut bus = master_bus();
        assert_eq!(bus.send_byte(0x50, 0x42), Ok(()));
        bus.transport_mut().set_master_error(MasterStatus {
            error: true,
            ..MasterStatus::default()
        });
        assert_eq!(pump(&mut bus), Err(SmBusError::MasterFault));
    }

    #[test]
    fn test_raw_i2c_write_disables_pec() {
        let data = [0x01, 0x02, 0x03];
        let mut bus = master_bus();
        bus.pec_enable();
        assert_eq!(bus.i2c_write(0x50, &data), Ok(()));

        assert!(!bus.flags().pec);
        assert!(bus.flags().raw_i2c);
        assert_eq!(bus.master_state(), MasterState::WriteNext);

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(pump(&mut bus), Ok(()));

        assert_eq!(bus.transport().written.as_slice(), &[0x01, 0x02, 0x03]);
        assert_eq!(
            bus.transport().controls.last(),
            Some(&MasterControl::BurstSendFinish)
        );
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_raw_i2c_read() {
        let mut data = [0u8; 3];
        let mut bus = master_bus();
        assert_eq!(bus.i2c_read(0x50, &mut data), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadNext);
        assert_eq!(bus.transport().target(), Some((0x50, true)));

        assert_eq!(feed(&mut bus, 0x0A), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFinal);
        assert_eq!(feed(&mut bus, 0x0B), Ok(()));
        assert_eq!(feed(&mut bus, 0x0C), Ok(()));

        assert_eq!(bus.received(), &[0x0A, 0x0B, 0x0C]);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    #[test]
    fn test_raw_i2c_write_read_turnaround() {
        let tx = [0x10];
        let mut rx = [0u8; 2];
        let mut bus = master_bus();
        assert_eq!(bus.i2c_write_read(0x50, &tx, &mut rx), Ok(()));

        // Single-byte write goes straight to the turnaround state.
        assert_eq!(bus.master_state(), MasterState::ReadFirst);
        assert!(bus.flags().process_call);

        assert_eq!(pump(&mut bus), Ok(()));
        assert_eq!(bus.master_state(), MasterState::ReadFinal);
        assert_eq!(feed(&mut bus, 0xE1), Ok(()));
        assert_eq!(feed(&mut bus, 0xE2), Ok(()));

        assert_eq!(bus.transport().written.as_slice(), &[0x10]);
        assert_eq!(bus.received(), &[0xE1, 0xE2]);
        assert_eq!(bus.status(), Transfer::Complete);
    }

    proptest! {
        /// The PEC a write computes equals an independent CRC over the
        /// wire bytes in wire order.
        #[test]
        fn prop_write_pec_matches_reference(
            target in 0x08u8..0x78,
            command: u8,
            payload in proptest::collection::vec(any::<u8>(), 1..=2),
        ) {
            let mut bus = master_bus();
            bus.pec_enable();
            prop_assert_eq!(bus.write_byte_word(target, command, &payload), Ok(()));

            for _ in 0..payload.len() + 2 {
                prop_assert_eq!(pump(&mut bus), Ok(()));
            }

            let mut wire = std::vec![target << 1, command];
            wire.extend_from_slice(&payload);
            let reference = crc8(0, &wire);

            prop_assert_eq!(bus.transport().written.last(), Some(&reference));
        }
    }
}
