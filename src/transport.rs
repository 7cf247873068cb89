//! What the CCID pipe needs from the USB side.
//!
//! Every method is non-blocking: `UsbError::WouldBlock` means "not now,
//! poll again later".

use usb_device::UsbError;

pub trait Transport {
    /// Reads one bulk-out packet into `buf`.
    fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, UsbError>;

    /// Writes one bulk-in packet (at most `PACKET_SIZE` bytes).
    fn write_bulk(&mut self, packet: &[u8]) -> Result<usize, UsbError>;

    /// Writes one interrupt-in packet.
    fn write_interrupt(&mut self, packet: &[u8]) -> Result<usize, UsbError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, UsbError> {
        (**self).read_bulk(buf)
    }

    fn write_bulk(&mut self, packet: &[u8]) -> Result<usize, UsbError> {
        (**self).write_bulk(packet)
    }

    fn write_interrupt(&mut self, packet: &[u8]) -> Result<usize, UsbError> {
        (**self).write_interrupt(packet)
    }
}
