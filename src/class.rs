use usb_device::class_prelude::*;
use usb_device::control::{Recipient, Request, RequestType};
use usb_device::UsbDirection;

use crate::{
    constants::*,
    iso7816::{Atr, Card},
    pipe::Pipe,
    transport::Transport,
    types::control::ClassRequest,
};

/// The three endpoints of the CCID interface.
pub struct UsbTransport<'bus, Bus: UsbBus> {
    read: EndpointOut<'bus, Bus>,
    write: EndpointIn<'bus, Bus>,
    interrupt: EndpointIn<'bus, Bus>,
}

impl<Bus: UsbBus> Transport for UsbTransport<'_, Bus> {
    fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, UsbError> {
        self.read.read(buf)
    }

    fn write_bulk(&mut self, packet: &[u8]) -> Result<usize, UsbError> {
        self.write.write(packet)
    }

    fn write_interrupt(&mut self, packet: &[u8]) -> Result<usize, UsbError> {
        self.interrupt.write(packet)
    }
}

pub struct Ccid<'bus, Bus: 'static + UsbBus, const F: usize> {
    interface_number: InterfaceNumber,
    pipe: Pipe<UsbTransport<'bus, Bus>, F>,
}

impl<'bus, Bus: 'static + UsbBus, const F: usize> Ccid<'bus, Bus, F> {
    /// Allocates the interface and its endpoints and puts `card` into slot 0.
    pub fn new(allocator: &'bus UsbBusAllocator<Bus>, card: Card<F>, atr: Atr) -> Self {
        let read = allocator.bulk(PACKET_SIZE as u16);
        let write = allocator.bulk(PACKET_SIZE as u16);
        let interrupt = allocator.interrupt(INTERRUPT_PACKET_SIZE as u16, INTERRUPT_INTERVAL_MS);
        let transport = UsbTransport {
            read,
            write,
            interrupt,
        };
        let interface_number = allocator.interface();
        Self {
            interface_number,
            pipe: Pipe::new(transport, card, atr),
        }
    }

    pub fn pipe(&self) -> &Pipe<UsbTransport<'bus, Bus>, F> {
        &self.pipe
    }

    pub fn pipe_mut(&mut self) -> &mut Pipe<UsbTransport<'bus, Bus>, F> {
        &mut self.pipe
    }

    pub fn set_card_present(&mut self, slot: u8, present: bool) -> bool {
        self.pipe.set_card_present(slot, present)
    }
}

impl<Bus: 'static + UsbBus, const F: usize> UsbClass<Bus> for Ccid<'_, Bus, F> {
    fn get_configuration_descriptors(
        &self,
        writer: &mut DescriptorWriter,
    ) -> usb_device::Result<()> {
        writer.interface(
            self.interface_number,
            CLASS_CCID,
            SUBCLASS_NONE,
            PROTOCOL_NONE,
        )?;
        writer.write(FUNCTIONAL_INTERFACE, &FUNCTIONAL_INTERFACE_DESCRIPTOR)?;
        let transport = self.pipe.transport();
        writer.endpoint(&transport.write)?;
        writer.endpoint(&transport.read)?;
        writer.endpoint(&transport.interrupt)?;
        Ok(())
    }

    fn reset(&mut self) {
        self.pipe.reset_state();
    }

    fn poll(&mut self) {
        self.pipe.poll();
    }

    fn endpoint_out(&mut self, addr: EndpointAddress) {
        if addr != self.pipe.transport().read.address() {
            return;
        }
        self.pipe.poll();
    }

    fn endpoint_in_complete(&mut self, addr: EndpointAddress) {
        if addr == self.pipe.transport().write.address() {
            self.pipe.maybe_send_packet();
        }
    }

    fn control_in(&mut self, xfer: ControlIn<Bus>) {
        let request = *xfer.request();
        match route(&request, u8::from(self.interface_number)) {
            Route::Ignore => {}
            Route::Reject => {
                info!("rejected class request {:?}", request.request);
                xfer.reject().ok();
            }
            Route::Handle(class_request) => match self.pipe.handle_control(class_request) {
                Some(data) => {
                    xfer.accept_with(data).ok();
                }
                None => {
                    xfer.reject().ok();
                }
            },
        }
    }

    fn control_out(&mut self, xfer: ControlOut<Bus>) {
        let request = *xfer.request();
        match route(&request, u8::from(self.interface_number)) {
            Route::Ignore => {}
            Route::Reject => {
                info!("rejected class request {:?}", request.request);
                xfer.reject().ok();
            }
            Route::Handle(class_request) => {
                if self.pipe.handle_control(class_request).is_some() {
                    xfer.accept().ok();
                } else {
                    xfer.reject().ok();
                }
            }
        }
    }
}

/// What to do with a control request seen by the CCID class.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Route {
    /// Not a class request to our interface, another class may want it.
    Ignore,
    Reject,
    Handle(ClassRequest),
}

fn route(request: &Request, interface: u8) -> Route {
    if request.request_type != RequestType::Class
        || request.recipient != Recipient::Interface
        || request.index != interface as u16
    {
        return Route::Ignore;
    }

    match ClassRequest::parse(request.request, request.value) {
        // ABORT has no data stage, so hosts may send it either way
        Some(abort @ ClassRequest::Abort { .. }) => Route::Handle(abort),
        // the queries answer with data, which needs an IN transfer
        Some(query) if request.direction == UsbDirection::In => Route::Handle(query),
        _ => Route::Reject,
    }
}
