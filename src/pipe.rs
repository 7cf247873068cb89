use usb_device::UsbError;

use crate::{
    constants::*,
    iso7816::{atr::Atr, card::Card, card::Response},
    slot::{AbortError, Slots},
    transport::Transport,
    types::{
        control::ClassRequest,
        packet::{
            declared_len, CommandKind, DataBlock, Error as PacketError, ExtPacket, IccStatus,
            Message, Reply, ReplyStatus, SlotError, SlotStatus,
        },
    },
};

#[allow(clippy::assertions_on_constants)]
const _: () = assert!(MAX_MSG_LENGTH >= PACKET_SIZE);
#[allow(clippy::assertions_on_constants)]
const _: () = assert!(1 + (SLOT_COUNT + 3) / 4 <= INTERRUPT_PACKET_SIZE);

/// Data stage of GET_CLOCK_FREQUENCIES and GET_DATA_RATES: none supported.
const NOTHING_SUPPORTED: &[u8] = &[0];

/// The CCID side of the reader.
///
/// Takes bulk-out packets, reassembles them into messages, answers every
/// message with exactly one bulk-in message and reports slot changes on
/// the interrupt endpoint. APDUs from XfrBlock messages go to the [`Card`].
pub struct Pipe<T: Transport, const F: usize> {
    transport: T,
    card: Card<F>,
    atr: Atr,
    slots: Slots<SLOT_COUNT>,

    ext_packet: ExtPacket,
    receiving_long: bool,
    long_packet_missing: usize,

    outbox: Option<Reply>,
    sent: usize,
}

impl<T: Transport, const F: usize> Pipe<T, F> {
    pub fn new(transport: T, card: Card<F>, atr: Atr) -> Self {
        Self {
            transport,
            card,
            atr,
            slots: Slots::new(),
            ext_packet: Default::default(),
            receiving_long: false,
            long_packet_missing: 0,
            outbox: None,
            sent: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn card(&self) -> &Card<F> {
        &self.card
    }

    pub fn atr(&self) -> &Atr {
        &self.atr
    }

    pub fn slots(&self) -> &Slots<SLOT_COUNT> {
        &self.slots
    }

    /// Reset the state of the CCID driver
    ///
    /// This is done on unexpected input instead of panicking
    pub fn reset_state(&mut self) {
        self.ext_packet.clear();
        self.receiving_long = false;
        self.long_packet_missing = 0;
        self.outbox = None;
        self.sent = 0;
        self.slots.reset();
    }

    /// One iteration of the reader's main loop.
    ///
    /// A pending slot change notification goes first; otherwise an
    /// unfinished reply is pushed further, and only then a new bulk-out
    /// packet is read.
    pub fn poll(&mut self) {
        if self.notify_slot_change() {
            return;
        }

        if self.outbox.is_some() {
            self.maybe_send_packet();
            return;
        }

        let mut packet = [0u8; PACKET_SIZE];
        match self.transport.read_bulk(&mut packet) {
            Ok(n) => self.handle_packet(&packet[..n]),
            Err(UsbError::WouldBlock) => {}
            Err(_err) => {
                error!("Failed to read packet {:?}", _err);
                self.reset_state();
            }
        }
    }

    pub fn handle_packet(&mut self, packet: &[u8]) {
        // The host splits messages longer than one packet into several
        // packets of one transfer. Only a full packet announces more data;
        // a short or zero length packet ends the transfer, whatever the
        // header's dwLength says.
        let transfer_continues = packet.len() == PACKET_SIZE;

        if !self.receiving_long {
            if packet.is_empty() {
                // zero length packet terminating a transfer
                return;
            }
            if packet.len() < CCID_HEADER_LEN {
                error!("unexpected short packet");
                self.reset_state();
                return;
            }
            self.ext_packet.clear();
            if self.ext_packet.extend_from_slice(packet).is_err() {
                error!("Packet larger than any message ({})", packet.len());
                self.reset_state();
                return;
            }

            let pl = declared_len(packet).unwrap_or(0);
            let received = packet.len() - CCID_HEADER_LEN;
            if pl > received {
                if transfer_continues {
                    self.receiving_long = true;
                    self.long_packet_missing = pl - received;
                    return;
                }
                info!("short transfer, {} of {} bytes", received, pl);
            }
        } else {
            if self.ext_packet.extend_from_slice(packet).is_err() {
                error!(
                    "Extended packet got larger than maximum size ({}), wants {}",
                    self.ext_packet.capacity(),
                    self.ext_packet.len() + packet.len(),
                );
                self.reset_state();
                return;
            }
            if packet.len() > self.long_packet_missing {
                error!("Got larger packet than expected");
                self.long_packet_missing = 0;
            } else {
                self.long_packet_missing -= packet.len();
            }
            if self.long_packet_missing != 0 {
                if transfer_continues {
                    return;
                }
                info!("transfer ended {} bytes early", self.long_packet_missing);
            }
            self.receiving_long = false;
            self.long_packet_missing = 0;
        }

        self.dispatch();
    }

    fn dispatch(&mut self) {
        let ext_packet = core::mem::take(&mut self.ext_packet);
        let message = match Message::parse(&ext_packet) {
            Ok(message) => message,
            Err(_) => {
                error!("Unexpectedly short packet");
                self.reset_state();
                return;
            }
        };
        debug!("{:?}", &message);

        let slot = message.slot();
        let seq = message.seq();
        let reply = match message.header.kind() {
            Ok(CommandKind::PowerOn) => self.power_on(slot, seq),
            Ok(CommandKind::PowerOff) => self.power_off(slot, seq),
            Ok(CommandKind::GetSlotStatus) => self.get_slot_status(slot, seq),
            Ok(CommandKind::XfrBlock) => self.transfer(slot, seq, message.payload),
            Ok(CommandKind::Abort) => self.confirm_abort(slot, seq),
            Err(PacketError::UnknownCommand(_command)) => {
                info!("unknown command {:X?}", _command);
                let mut reply = Reply::new();
                reply.resize_default(UNKNOWN_REPLY_LEN).ok();
                reply
            }
            Err(PacketError::ShortPacket) => {
                error!("Unexpectedly short packet");
                self.reset_state();
                return;
            }
        };
        self.send_reply(reply);
    }

    fn aborted(&self, slot: u8) -> bool {
        self.slots.abort().is_pending_for(slot)
    }

    fn slot_status(slot: u8, seq: u8, status: ReplyStatus, error: SlotError) -> Reply {
        SlotStatus {
            slot,
            seq,
            status,
            error,
        }
        .into()
    }

    fn power_on(&mut self, slot: u8, seq: u8) -> Reply {
        if self.aborted(slot) {
            let status = ReplyStatus::failed(IccStatus::PresentAndActive);
            return DataBlock::failed(slot, seq, status, SlotError::CmdAborted).into();
        }
        if slot != 0 {
            let status = ReplyStatus::failed(IccStatus::NoIccPresent);
            return DataBlock::failed(slot, seq, status, SlotError::SlotNotFound).into();
        }
        self.slots.set_active(slot, true);
        DataBlock::new(slot, seq, &self.atr[..]).into()
    }

    fn power_off(&mut self, slot: u8, seq: u8) -> Reply {
        if self.aborted(slot) {
            let status = ReplyStatus::failed(IccStatus::PresentAndActive);
            return Self::slot_status(slot, seq, status, SlotError::CmdAborted);
        }
        if slot != 0 {
            let status = ReplyStatus::failed(IccStatus::NoIccPresent);
            return Self::slot_status(slot, seq, status, SlotError::SlotNotFound);
        }
        self.slots.set_active(slot, false);
        let status = ReplyStatus::ok(IccStatus::NoIccPresent);
        Self::slot_status(slot, seq, status, SlotError::NoError)
    }

    fn get_slot_status(&mut self, slot: u8, seq: u8) -> Reply {
        if self.aborted(slot) {
            let status = ReplyStatus::failed(IccStatus::PresentAndActive);
            return Self::slot_status(slot, seq, status, SlotError::CmdAborted);
        }
        if slot != 0 {
            let status = ReplyStatus::failed(IccStatus::NoIccPresent);
            return Self::slot_status(slot, seq, status, SlotError::SlotNotFound);
        }
        let status = ReplyStatus::ok(IccStatus::PresentAndActive);
        Self::slot_status(slot, seq, status, SlotError::NoError)
    }

    fn transfer(&mut self, slot: u8, seq: u8, apdu: &[u8]) -> Reply {
        if self.aborted(slot) {
            info!("XfrBlock seq = {} rejected, abort pending", seq);
            let status = ReplyStatus::failed(IccStatus::PresentAndActive);
            return DataBlock::failed(slot, seq, status, SlotError::CmdAborted).into();
        }
        if slot != 0 {
            let status = ReplyStatus::failed(IccStatus::NoIccPresent);
            return DataBlock::failed(slot, seq, status, SlotError::SlotNotFound).into();
        }

        let mut response = Response::new();
        let _status = self.card.respond(apdu, &mut response);
        debug!("APDU answered with {:?}", _status);
        DataBlock::new(slot, seq, &response).into()
    }

    fn confirm_abort(&mut self, slot: u8, seq: u8) -> Reply {
        match self.slots.abort_mut().confirm(slot, seq) {
            Ok(()) => {
                info!("ABORT completed for seq = {}", seq);
                let status = ReplyStatus::ok(IccStatus::PresentAndActive);
                Self::slot_status(slot, seq, status, SlotError::NoError)
            }
            Err(AbortError::NoneInProgress) => {
                let status = ReplyStatus::ok(IccStatus::PresentAndActive);
                Self::slot_status(slot, seq, status, SlotError::CmdNotAborted)
            }
            Err(AbortError::Mismatch) => {
                let status = ReplyStatus::failed(IccStatus::NoIccPresent);
                let error = if slot != 0 {
                    SlotError::SlotNotFound
                } else {
                    SlotError::NotSupported
                };
                Self::slot_status(slot, seq, status, error)
            }
        }
    }

    fn send_reply(&mut self, reply: Reply) {
        if self.outbox.is_some() {
            info!("overwriting last reply..");
        }
        self.outbox = Some(reply);
        self.sent = 0;

        // fast-lane response attempt
        self.maybe_send_packet();
    }

    /// Writes the next packet of the pending reply, if the endpoint takes it.
    pub fn maybe_send_packet(&mut self) {
        let Some(reply) = self.outbox.as_ref() else {
            return;
        };
        let total = reply.len();
        let chunk_len = core::cmp::min(PACKET_SIZE, total - self.sent);
        let chunk = &reply[self.sent..][..chunk_len];

        match self.transport.write_bulk(chunk) {
            Ok(n) if n == chunk_len => {
                self.sent += n;
                if self.sent == total {
                    // a transfer ending on a full packet is terminated by a zero length packet
                    if chunk_len == PACKET_SIZE {
                        self.outbox = Some(Reply::new());
                    } else {
                        self.outbox = None;
                    }
                    self.sent = 0;
                }
            }
            Ok(_sent) => {
                error!("Failed to send entire packet, sent only {}", _sent);
                self.reset_state()
            }
            Err(UsbError::WouldBlock) => {
                // fine, can't write try later
                info!("waiting to send");
            }
            Err(_err) => {
                error!("Failed to send packet {:?}", _err);
                self.reset_state()
            }
        }
    }

    /// Sends NotifySlotChange if a slot changed; `true` if it went out.
    pub fn notify_slot_change(&mut self) -> bool {
        if !self.slots.any_changed() {
            return false;
        }

        let mut message = [0u8; INTERRUPT_PACKET_SIZE];
        message[0] = RDR_TO_PC_NOTIFY_SLOT_CHANGE;
        let len = 1 + self.slots.encode_slot_states(&mut message[1..]);

        match self.transport.write_interrupt(&message[..len]) {
            Ok(_) => {
                info!("slot change notified: {:02x?}", &message[..len]);
                self.slots.clear_changed();
                true
            }
            Err(UsbError::WouldBlock) => false,
            Err(_err) => {
                error!("Failed to notify slot change {:?}", _err);
                false
            }
        }
    }

    /// Inserts or removes the card in `slot`; `false` if there is no such slot.
    pub fn set_card_present(&mut self, slot: u8, present: bool) -> bool {
        self.slots.set_presence(slot, present)
    }

    /// Flips card presence in `slot`, like pressing an insert/remove button.
    pub fn toggle_card(&mut self, slot: u8) -> bool {
        let present = self.slots.get(slot).map_or(false, |state| state.present);
        self.slots.set_presence(slot, !present)
    }

    /// Called if we receive an ABORT request on the control pipe.
    ///
    /// Every command for `slot` fails with CMD_ABORTED until the matching
    /// Abort message arrives on the bulk endpoint.
    pub fn expect_abort(&mut self, slot: u8, seq: u8) {
        info!("ABORT expected for seq = {}", seq);
        self.slots.abort_mut().request(slot, seq);
    }

    /// Handles a class request; `None` means the request must be rejected.
    ///
    /// Returns the data stage to send back, empty for ABORT.
    pub fn handle_control(&mut self, request: ClassRequest) -> Option<&'static [u8]> {
        match request {
            ClassRequest::Abort { slot, seq } => {
                // We only have one slot (see FUNCTIONAL_INTERFACE_DESCRIPTOR in constants.rs)
                if slot as usize >= SLOT_COUNT {
                    warn!("ABORT for unknown slot {}", slot);
                    return None;
                }
                self.expect_abort(slot, seq);
                Some(&[][..])
            }
            ClassRequest::GetClockFrequencies | ClassRequest::GetDataRates => {
                Some(NOTHING_SUPPORTED)
            }
        }
    }
}
