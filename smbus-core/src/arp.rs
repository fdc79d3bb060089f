//! Address Resolution Protocol support
//!
//! ARP assigns bus addresses to slaves at run time. The master-side
//! helpers here are thin compositions of the ordinary transaction
//! starters; the slave side is covered by the AR/AV flags and the
//! attached [`Udid`] record on the instance.

use smbus_hal::I2cMaster;

use crate::instance::SmBus;
use crate::status::SmBusError;

/// Fixed bus addresses assigned by the SMBus specification
pub mod address {
    /// The SMBus Host
    pub const HOST: u8 = 0x08;
    /// Smart Battery Charger
    pub const CHARGER: u8 = 0x09;
    /// Smart Battery
    pub const SMART_BATTERY: u8 = 0x0B;
    /// SMBus Device Default Address, used for ARP
    pub const DEFAULT_DEVICE: u8 = 0x61;
}

/// ARP command codes
pub mod command {
    pub const PREPARE_TO_ARP: u8 = 0x01;
    pub const RESET_DEVICE: u8 = 0x02;
    pub const GET_UDID: u8 = 0x03;
    pub const ASSIGN_ADDRESS: u8 = 0x04;
}

/// Length of a UDID plus its device address on the wire
pub const UDID_PACKET_LEN: usize = 17;

/// Unique Device Identifier
///
/// A 16-byte identity record every ARP-capable slave carries. Fields
/// are host order here; [`Udid::encode`] produces the wire image with
/// each field MSB first and the device address as byte 16, and
/// [`Udid::decode`] reverses it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Udid {
    pub device_capabilities: u8,
    pub version: u8,
    pub vendor_id: u16,
    pub device_id: u16,
    pub interface: u16,
    pub subsystem_vendor_id: u16,
    pub subsystem_device_id: u16,
    pub vendor_specific_id: u32,
}

impl Udid {
    /// Encode with the device address into bus byte order
    pub fn encode(&self, address: u8) -> [u8; UDID_PACKET_LEN] {
        let mut data = [0u8; UDID_PACKET_LEN];
        data[0] = self.device_capabilities;
        data[1] = self.version;
        data[2..4].copy_from_slice(&self.vendor_id.to_be_bytes());
        data[4..6].copy_from_slice(&self.device_id.to_be_bytes());
        data[6..8].copy_from_slice(&self.interface.to_be_bytes());
        data[8..10].copy_from_slice(&self.subsystem_vendor_id.to_be_bytes());
        data[10..12].copy_from_slice(&self.subsystem_device_id.to_be_bytes());
        data[12..16].copy_from_slice(&self.vendor_specific_id.to_be_bytes());
        data[16] = address;
        data
    }

    /// Decode a bus-order packet into a record and device address
    pub fn decode(data: &[u8; UDID_PACKET_LEN]) -> (Self, u8) {
        let udid = Self {
            device_capabilities: data[0],
            version: data[1],
            vendor_id: u16::from_be_bytes([data[2], data[3]]),
            device_id: u16::from_be_bytes([data[4], data[5]]),
            interface: u16::from_be_bytes([data[6], data[7]]),
            subsystem_vendor_id: u16::from_be_bytes([data[8], data[9]]),
            subsystem_device_id: u16::from_be_bytes([data[10], data[11]]),
            vendor_specific_id: u32::from_be_bytes([data[12], data[13], data[14], data[15]]),
        };
        (udid, data[16])
    }
}

impl<'b, T: I2cMaster> SmBus<'b, T> {
    /// Request the UDID of any unresolved device (general form)
    ///
    /// The reply arrives in bus byte order; decode it with
    /// [`Udid::decode`] once the transfer completes.
    pub fn arp_get_udid(&mut self, data: &'b mut [u8]) -> Result<(), SmBusError> {
        self.block_read(address::DEFAULT_DEVICE, command::GET_UDID, data)
    }

    /// Request the UDID of one specific device (directed form)
    ///
    /// The target's address rides in the command byte with its read
    /// bit set.
    pub fn arp_get_udid_directed(
        &mut self,
        target: u8,
        data: &'b mut [u8],
    ) -> Result<(), SmBusError> {
        self.block_read(address::DEFAULT_DEVICE, (target << 1) | 1, data)
    }

    /// Return every non-PSA device to its initial state (general form)
    ///
    /// Devices also clear their Address Resolved and Address Valid
    /// flags.
    pub fn arp_reset_device(&mut self) -> Result<(), SmBusError> {
        self.send_byte(address::DEFAULT_DEVICE, command::RESET_DEVICE)
    }

    /// Reset one specific device (directed form)
    pub fn arp_reset_device_directed(&mut self, target: u8) -> Result<(), SmBusError> {
        self.send_byte(address::DEFAULT_DEVICE, target << 1)
    }

    /// Assign an address to the device matching the encoded UDID
    ///
    /// `data` is the 17-byte image from [`Udid::encode`].
    pub fn arp_assign_address(
        &mut self,
        data: &'b [u8; UDID_PACKET_LEN],
    ) -> Result<(), SmBusError> {
        self.block_write(address::DEFAULT_DEVICE, command::ASSIGN_ADDRESS, data)
    }

    /// Tell the ARP master this device needs attention
    ///
    /// The payload should be 0x0000 for this packet.
    pub fn arp_notify_master(&mut self, data: &'b [u8; 2]) -> Result<(), SmBusError> {
        self.host_notify(address::DEFAULT_DEVICE << 1, data)
    }

    /// Alert all ARP-capable devices that ARP is about to begin
    pub fn arp_prepare(&mut self) -> Result<(), SmBusError> {
        self.send_byte(address::DEFAULT_DEVICE, command::PREPARE_TO_ARP)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Udid {
        Udid {
            device_capabilities: 0x06,
            version: 0x08,
            vendor_id: 0x1CBF,
            device_id: 0x2001,
            interface: 0x0004,
            subsystem_vendor_id: 0x5544,
            subsystem_device_id: 0x3322,
            vendor_specific_id: 0xDEADBEEF,
        }
    }

    #[test]
    fn test_encode_is_msb_first() {
        let data = sample().encode(0x2A);

        assert_eq!(data.len(), UDID_PACKET_LEN);
        assert_eq!(data[0], 0x06);
        assert_eq!(data[1], 0x08);
        assert_eq!(&data[2..4], &[0x1C, 0xBF]);
        assert_eq!(&data[4..6], &[0x20, 0x01]);
        assert_eq!(&data[6..8], &[0x00, 0x04]);
        assert_eq!(&data[8..10], &[0x55, 0x44]);
        assert_eq!(&data[10..12], &[0x33, 0x22]);
        assert_eq!(&data[12..16], &[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(data[16], 0x2A);
    }

    #[test]
    fn test_roundtrip() {
        let udid = sample();
        let (decoded, address) = Udid::decode(&udid.encode(0x55));

        assert_eq!(decoded, udid);
        assert_eq!(address, 0x55);
    }

    mod helpers {
        use super::sample;
        use crate::arp::{address, command};
        use crate::instance::SmBus;
        use crate::state::MasterState;
        use smbus_hal::{I2cConfig, MockI2c};

        fn master_bus<'b>() -> SmBus<'b, MockI2c> {
            SmBus::new_master(MockI2c::new(), I2cConfig::SMBUS)
        }

        #[test]
        fn test_prepare_targets_default_device() {
            let mut bus = master_bus();
            assert_eq!(bus.arp_prepare(), Ok(()));
            assert_eq!(
                bus.transport().target(),
                Some((address::DEFAULT_DEVICE, false))
            );
            assert_eq!(
                bus.transport().written.as_slice(),
                &[command::PREPARE_TO_ARP]
            );
        }

        #[test]
        fn test_reset_device_directed_encodes_target() {
            let mut bus = master_bus();
            assert_eq!(bus.arp_reset_device_directed(0x2A), Ok(()));
            assert_eq!(bus.transport().written.as_slice(), &[0x2A << 1]);
        }

        #[test]
        fn test_get_udid_directed_sets_read_bit_in_command() {
            let mut reply = [0u8; 32];
            let mut bus = master_bus();
            assert_eq!(bus.arp_get_udid_directed(0x2A, &mut reply), Ok(()));
            assert_eq!(bus.transport().written.as_slice(), &[(0x2A << 1) | 1]);
            assert_eq!(bus.master_state(), MasterState::ReadFirst);
        }

        #[test]
        fn test_assign_address_is_a_17_byte_block_write() {
            let packet = sample().encode(0x2A);
            let mut bus = master_bus();
            assert_eq!(bus.arp_assign_address(&packet), Ok(()));
            assert_eq!(bus.master_state(), MasterState::WriteBlockSize);
            assert_eq!(
                bus.transport().written.as_slice(),
                &[command::ASSIGN_ADDRESS]
            );
        }

        #[test]
        fn test_notify_master_uses_host_notify() {
            let payload = [0x00, 0x00];
            let mut bus = master_bus();
            assert_eq!(bus.arp_notify_master(&payload), Ok(()));
            assert_eq!(bus.transport().target(), Some((address::HOST, false)));
            assert_eq!(
                bus.transport().written.as_slice(),
                &[address::DEFAULT_DEVICE << 1]
            );
        }
    }

    proptest::proptest! {
        /// Encode/decode are symmetric for every field pattern.
        #[test]
        fn prop_udid_round_trip(
            device_capabilities: u8,
            version: u8,
            vendor_id: u16,
            device_id: u16,
            interface: u16,
            subsystem_vendor_id: u16,
            subsystem_device_id: u16,
            vendor_specific_id: u32,
            address: u8,
        ) {
            let udid = Udid {
                device_capabilities,
                version,
                vendor_id,
                device_id,
                interface,
                subsystem_vendor_id,
                subsystem_device_id,
                vendor_specific_id,
            };

            let (decoded, decoded_address) = Udid::decode(&udid.encode(address));
            proptest::prop_assert_eq!(decoded, udid);
            proptest::prop_assert_eq!(decoded_address, address);
        }
    }
}
