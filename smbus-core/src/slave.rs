//! Slave engine: interrupt processing and out-of-band data send
//!
//! The slave reacts to an external master. One entry point,
//! [`SmBus::slave_int_process`], dispatches the three interrupt
//! sources in fixed priority order (START, STOP, DATA) and reports
//! byte, command and transfer-boundary events back to the caller.

use smbus_hal::{I2cSlave, SlaveActivity, SlaveInterrupts};

use crate::crc::crc8;
use crate::instance::SmBus;
use crate::state::SlaveState;
use crate::status::{SlaveEvent, SmBusError};

impl<'b, T: I2cSlave> SmBus<'b, T> {
    /// Process one slave interrupt
    ///
    /// Call from the application ISR. With manual acknowledgement
    /// enabled the return value is the caller's only signal for the
    /// ACK decision: check [`SlaveEvent::FirstByte`] to validate the
    /// command and [`SmBusError::Pec`] to reject a corrupt packet,
    /// then answer with [`SmBus::slave_ack_send`].
    ///
    /// A Quick Command never moves payload: the STOP handler validates
    /// that both buffer indexes are still zero before reporting
    /// [`SlaveEvent::QuickCommand`]. A Quick Command with the data bit
    /// set raises a transmit request first; with no TX buffer armed
    /// that surfaces as [`SmBusError::NotReady`], which is expected and
    /// keeps the indexes untouched.
    pub fn slave_int_process(&mut self) -> Result<SlaveEvent, SmBusError> {
        let interrupts = self.i2c.interrupts();
        let status = self.i2c.status();

        // Only meaningful with the receive FIFO, which this stack does
        // not use.
        if interrupts.start {
            self.i2c.clear_interrupts(SlaveInterrupts::START);
            return Ok(SlaveEvent::Handled);
        }

        if interrupts.stop {
            // Safe for Quick Command too: in-progress is never set for
            // one.
            self.flags.transfer_in_progress = false;
            self.i2c.clear_interrupts(SlaveInterrupts::STOP);

            if status.quick_command {
                // No data may move during a Quick Command.
                if self.rx_index != 0 || self.tx_index != 0 {
                    return Err(SmBusError::SlaveFault);
                }
                return Ok(SlaveEvent::QuickCommand {
                    data: status.quick_command_data,
                });
            }

            self.slave_state = SlaveState::Idle;
            return Ok(SlaveEvent::TransferComplete);
        }

        if interrupts.data {
            self.i2c.clear_interrupts(SlaveInterrupts::DATA);

            if status.activity == SlaveActivity::None {
                return Err(SmBusError::SlaveFault);
            }

            self.flags.transfer_in_progress = true;

            match status.activity {
                SlaveActivity::None => Err(SmBusError::SlaveFault),
                SlaveActivity::ReceiveFirstByte => self.receive_first_byte(),
                SlaveActivity::Receive => self.receive_next_byte(),
                SlaveActivity::TransmitRequest => self.transmit_request(),
            }
        } else {
            Ok(SlaveEvent::Handled)
        }
    }

    /// Send the first response byte outside the interrupt path
    ///
    /// Only sanctioned after [`SmBusError::NotReady`]: arm the TX
    /// buffer with [`SmBus::slave_tx_buffer_set`], then call this. It
    /// performs the identical byte-selection, PEC and state-advance
    /// logic the interrupt path would have performed.
    pub fn slave_data_send(&mut self) -> Result<(), SmBusError> {
        self.first_transmit().map(|_| ())
    }

    /// First byte after the address phase: the command byte, or
    /// payload in raw I2C mode.
    fn receive_first_byte(&mut self) -> Result<SlaveEvent, SmBusError> {
        let matched = self.i2c.status().matched;
        self.own_address = self.i2c.address(matched);

        let byte = self.i2c.data_get();
        if self.flags.raw_i2c {
            self.rx_store(byte);
            self.rx_index += 1;
        } else {
            self.current_command = byte;
        }

        if self.flags.pec {
            // The address phase of a command is always a write.
            self.calculated_crc = crc8(0, &[self.own_address << 1]);
            self.calculated_crc = crc8(self.calculated_crc, &[self.current_command]);
        }

        self.slave_state = SlaveState::PostCommand;
        Ok(SlaveEvent::FirstByte)
    }

    /// A data byte after the first one.
    fn receive_next_byte(&mut self) -> Result<SlaveEvent, SmBusError> {
        match self.slave_state {
            SlaveState::PostCommand => {
                let byte = self.i2c.data_get();

                if self.flags.block_transfer {
                    // The first post-command byte is the master's
                    // declared size; it must fit the caller's buffer.
                    if byte > self.rx_size {
                        self.slave_state = SlaveState::ReadDone;
                        return Err(SmBusError::DataSize);
                    }
                    self.rx_size = byte;
                    if self.flags.pec {
                        self.calculated_crc = crc8(self.calculated_crc, &[byte]);
                    }
                    self.slave_state = SlaveState::ReadNext;
                    return Ok(SlaveEvent::Handled);
                }

                self.store_payload(byte, true)
            }

            SlaveState::ReadNext => {
                let byte = self.i2c.data_get();
                self.store_payload(byte, false)
            }

            SlaveState::ReadPec => {
                let byte = self.i2c.data_get();
                if self.calculated_crc != byte {
                    return Err(SmBusError::Pec);
                }
                self.slave_state = SlaveState::ReadDone;
                Ok(SlaveEvent::Handled)
            }

            SlaveState::ReadDone => {
                // Nothing more was expected; drain and report.
                let _ = self.i2c.data_get();
                Err(SmBusError::SlaveFault)
            }

            SlaveState::Idle
            | SlaveState::WriteNext
            | SlaveState::WriteFinal
            | SlaveState::WriteDone => Ok(SlaveEvent::Handled),
        }
    }

    /// Store one payload byte and pick the next receive state.
    ///
    /// `post_command` distinguishes the byte right after the command:
    /// on the ordinary receive path a process call ends its write half
    /// without a PEC byte, so the post-payload state differs.
    fn store_payload(&mut self, byte: u8, post_command: bool) -> Result<SlaveEvent, SmBusError> {
        if self.rx_index == self.rx_size {
            self.slave_state = SlaveState::ReadDone;
            return Err(SmBusError::SlaveFault);
        }

        self.rx_store(byte);
        self.rx_index += 1;

        if self.rx_index == self.rx_size {
            if self.flags.pec {
                self.calculated_crc = crc8(self.calculated_crc, &[byte]);
                self.slave_state = if !post_command && self.flags.process_call {
                    SlaveState::ReadDone
                } else {
                    SlaveState::ReadPec
                };
            } else {
                self.slave_state = SlaveState::ReadDone;
            }
        } else {
            if self.flags.pec {
                self.calculated_crc = crc8(self.calculated_crc, &[byte]);
            }
            self.slave_state = SlaveState::ReadNext;
        }

        Ok(SlaveEvent::Handled)
    }

    /// The master requested a byte from us.
    fn transmit_request(&mut self) -> Result<SlaveEvent, SmBusError> {
        match self.slave_state {
            // First byte of a new transmit direction: idle, right
            // after the command (repeated START with R/S = 1), after a
            // raw I2C receive turned around, or after a completed
            // receive.
            SlaveState::Idle
            | SlaveState::PostCommand
            | SlaveState::ReadNext
            | SlaveState::ReadDone => {
                let matched = self.i2c.status().matched;
                self.own_address = self.i2c.address(matched);
                self.first_transmit()
            }

            SlaveState::WriteNext => {
                let byte = self.next_tx_byte();

                if self.flags.pec {
                    self.calculated_crc = crc8(self.calculated_crc, &[byte]);
                    if self.tx_index == self.tx_size {
                        self.slave_state = SlaveState::WriteFinal;
                    }
                } else if self.tx_index + 1 == self.tx_size {
                    self.slave_state = SlaveState::WriteFinal;
                }

                self.i2c.data_put(byte);
                Ok(SlaveEvent::Handled)
            }

            SlaveState::WriteFinal => {
                let byte = if self.flags.pec {
                    self.calculated_crc
                } else {
                    self.next_tx_byte()
                };
                self.i2c.data_put(byte);
                self.slave_state = SlaveState::WriteDone;
                Ok(SlaveEvent::Handled)
            }

            SlaveState::WriteDone => {
                // Data exhausted; the specification mandates 0xFF.
                self.i2c.data_put(0xFF);
                Ok(SlaveEvent::Handled)
            }

            SlaveState::ReadPec => Ok(SlaveEvent::Handled),
        }
    }

    /// Select and send the first response byte; shared between the
    /// transmit-request interrupt and [`SmBus::slave_data_send`].
    fn first_transmit(&mut self) -> Result<SlaveEvent, SmBusError> {
        if self.tx_size == 0 {
            return Err(SmBusError::NotReady);
        }

        let byte = if self.flags.block_transfer {
            // A block reply leads with its size.
            self.tx_size
        } else if self.tx_index < self.tx_size {
            self.next_tx_byte()
        } else {
            0xFF
        };

        if self.flags.pec {
            let wire = (self.own_address << 1) | 1;
            self.calculated_crc = crc8(self.calculated_crc, &[wire]);
            self.calculated_crc = crc8(self.calculated_crc, &[byte]);
            self.slave_state = if self.tx_index == self.tx_size {
                SlaveState::WriteFinal
            } else {
                SlaveState::WriteNext
            };
        } else {
            self.slave_state = match self.tx_size - self.tx_index {
                0 => SlaveState::WriteDone,
                1 => SlaveState::WriteFinal,
                _ => SlaveState::WriteNext,
            };
        }

        self.i2c.data_put(byte);
        Ok(SlaveEvent::Handled)
    }
}
