use core::convert::TryFrom;

use crate::constants::*;

/// A complete bulk-in message, possibly spanning several packets.
pub type Reply = heapless::Vec<u8, REPLY_BUFFER_LEN>;

#[derive(Default, PartialEq, Eq)]
pub struct ExtPacket(heapless::Vec<u8, MAX_MSG_LENGTH>);

impl core::ops::Deref for ExtPacket {
    type Target = heapless::Vec<u8, MAX_MSG_LENGTH>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl core::ops::DerefMut for ExtPacket {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    ShortPacket,
    UnknownCommand(u8),
}

/// Payload length announced by the header at the start of `packet`.
pub fn declared_len(packet: &[u8]) -> Option<usize> {
    let bytes = packet.get(1..5)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize)
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandKind {
    PowerOn = PC_TO_RDR_ICC_POWER_ON,
    PowerOff = PC_TO_RDR_ICC_POWER_OFF,
    GetSlotStatus = PC_TO_RDR_GET_SLOT_STATUS,
    XfrBlock = PC_TO_RDR_XFR_BLOCK,
    Abort = PC_TO_RDR_ABORT,
}

impl TryFrom<u8> for CommandKind {
    type Error = Error;

    fn try_from(command_byte: u8) -> Result<Self, Error> {
        match command_byte {
            PC_TO_RDR_ICC_POWER_ON => Ok(CommandKind::PowerOn),
            PC_TO_RDR_ICC_POWER_OFF => Ok(CommandKind::PowerOff),
            PC_TO_RDR_GET_SLOT_STATUS => Ok(CommandKind::GetSlotStatus),
            PC_TO_RDR_XFR_BLOCK => Ok(CommandKind::XfrBlock),
            PC_TO_RDR_ABORT => Ok(CommandKind::Abort),
            _ => Err(Error::UnknownCommand(command_byte)),
        }
    }
}

/// `bMessageType dwLength bSlot bSeq`, common to all bulk messages.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BulkHeader {
    pub message_type: u8,
    pub length: u32,
    pub slot: u8,
    pub seq: u8,
}

impl BulkHeader {
    pub fn kind(&self) -> Result<CommandKind, Error> {
        CommandKind::try_from(self.message_type)
    }
}

/// A decoded bulk-out message.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct Message<'a> {
    pub header: BulkHeader,
    /// The three message specific header bytes (bBWI wLevelParameter for XfrBlock).
    pub params: [u8; 3],
    pub payload: &'a [u8],
}

impl<'a> Message<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, Error> {
        let mut reader = untrusted::Reader::new(untrusted::Input::from(bytes));

        let mut read = || -> Result<(BulkHeader, [u8; 3]), untrusted::EndOfInput> {
            let message_type = reader.read_byte()?;
            let mut length = [0u8; 4];
            for byte in length.iter_mut() {
                *byte = reader.read_byte()?;
            }
            let slot = reader.read_byte()?;
            let seq = reader.read_byte()?;
            let mut params = [0u8; 3];
            for byte in params.iter_mut() {
                *byte = reader.read_byte()?;
            }
            let header = BulkHeader {
                message_type,
                length: u32::from_le_bytes(length),
                slot,
                seq,
            };
            Ok((header, params))
        };
        let (header, params) = read().map_err(|_| Error::ShortPacket)?;

        let rest = reader.read_bytes_to_end().as_slice_less_safe();
        let len = core::cmp::min(rest.len(), header.length as usize);
        Ok(Self {
            header,
            params,
            payload: &rest[..len],
        })
    }

    pub fn slot(&self) -> u8 {
        self.header.slot
    }

    pub fn seq(&self) -> u8 {
        self.header.seq
    }
}

impl core::fmt::Debug for Message<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut debug_struct = f.debug_struct("Command");
        match self.header.kind() {
            Ok(kind) => debug_struct.field("cmd", &kind),
            Err(_) => debug_struct.field("cmd", &format_args!("{:02x}", self.header.message_type)),
        };
        debug_struct
            .field("slot", &self.header.slot)
            .field("seq", &self.header.seq);
        if self.params != [0; 3] {
            debug_struct.field("params", &format_args!("{:02x?}", self.params));
        }

        if !self.payload.is_empty() {
            let l = core::cmp::min(self.payload.len(), 8);
            debug_struct.field("len", &self.payload.len());
            if l < self.payload.len() {
                debug_struct.field("data[..8]", &format_args!("{:02x?}", &self.payload[..l]))
            } else {
                debug_struct.field("data", &format_args!("{:02x?}", self.payload))
            };
        }
        debug_struct.finish()
    }
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    ProcessedWithoutError = 0x00,
    Failed = 0x40,
    TimeExtensionRequested = 0x80,
}

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IccStatus {
    PresentAndActive = 0x00,
    PresentAndInactive = 0x01,
    NoIccPresent = 0x02,
}

/// bStatus: bmCommandStatus in bits 6-7, bmICCStatus in bits 0-1.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReplyStatus {
    pub command: CommandStatus,
    pub icc: IccStatus,
}

impl ReplyStatus {
    pub const fn new(command: CommandStatus, icc: IccStatus) -> Self {
        Self { command, icc }
    }

    pub const fn ok(icc: IccStatus) -> Self {
        Self::new(CommandStatus::ProcessedWithoutError, icc)
    }

    pub const fn failed(icc: IccStatus) -> Self {
        Self::new(CommandStatus::Failed, icc)
    }

    pub fn byte(self) -> u8 {
        self.command as u8 | self.icc as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        let command = match byte & 0xC0 {
            0x00 => CommandStatus::ProcessedWithoutError,
            0x40 => CommandStatus::Failed,
            0x80 => CommandStatus::TimeExtensionRequested,
            _ => return None,
        };
        let icc = match byte & 0x03 {
            0x00 => IccStatus::PresentAndActive,
            0x01 => IccStatus::PresentAndInactive,
            0x02 => IccStatus::NoIccPresent,
            _ => return None,
        };
        Some(Self::new(command, icc))
    }

    pub fn is_error(self) -> bool {
        self.command == CommandStatus::Failed
    }
}

/// bError of a reply.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotError {
    NoError,
    CmdAborted,
    CmdNotAborted,
    /// bSlot is not a slot of this reader.
    SlotNotFound,
    NotSupported,
}

impl SlotError {
    pub fn code(self) -> u8 {
        match self {
            SlotError::NoError => 0x00,
            SlotError::CmdAborted => 0xFF,
            SlotError::CmdNotAborted => 0xFE,
            SlotError::SlotNotFound => 0x05,
            SlotError::NotSupported => 0x00,
        }
    }
}

fn header(reply: &mut Reply, message_type: u8, len: usize, slot: u8, seq: u8) {
    reply.clear();
    reply.resize_default(CCID_HEADER_LEN).ok();
    reply[0] = message_type;
    reply[1..5].copy_from_slice(&(len as u32).to_le_bytes());
    reply[5] = slot;
    reply[6] = seq;
}

/// RDR_to_PC_DataBlock
pub struct DataBlock<'a> {
    slot: u8,
    seq: u8,
    status: ReplyStatus,
    error: SlotError,
    data: &'a [u8],
}

impl<'a> DataBlock<'a> {
    pub fn new(slot: u8, seq: u8, data: &'a [u8]) -> Self {
        Self {
            slot,
            seq,
            status: ReplyStatus::ok(IccStatus::PresentAndActive),
            error: SlotError::NoError,
            data,
        }
    }

    /// A data block without data.
    pub fn failed(slot: u8, seq: u8, status: ReplyStatus, error: SlotError) -> Self {
        Self {
            slot,
            seq,
            status,
            error,
            data: &[],
        }
    }
}

impl core::fmt::Debug for DataBlock<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let l = core::cmp::min(self.data.len(), 16);
        f.debug_struct("DataBlock")
            .field("seq", &self.seq)
            .field("status", &self.status)
            .field("error", &self.error)
            .field("len", &self.data.len())
            .field("data", &format_args!("{:02x?}", &self.data[..l]))
            .finish()
    }
}

impl From<DataBlock<'_>> for Reply {
    fn from(block: DataBlock<'_>) -> Reply {
        let len = core::cmp::min(block.data.len(), MAX_REPLY_LENGTH - CCID_HEADER_LEN);
        let mut reply = Reply::new();
        header(&mut reply, RDR_TO_PC_DATA_BLOCK, len, block.slot, block.seq);
        reply[7] = block.status.byte();
        reply[8] = block.error.code();
        // chain parameter: the whole response fits one block
        reply[9] = 0;
        reply.extend_from_slice(&block.data[..len]).ok();
        reply
    }
}

/// RDR_to_PC_SlotStatus
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SlotStatus {
    pub slot: u8,
    pub seq: u8,
    pub status: ReplyStatus,
    pub error: SlotError,
}

impl From<SlotStatus> for Reply {
    fn from(status: SlotStatus) -> Reply {
        let mut reply = Reply::new();
        header(&mut reply, RDR_TO_PC_SLOT_STATUS, 0, status.slot, status.seq);
        reply[7] = status.status.byte();
        reply[8] = status.error.code();
        // clock running
        reply[9] = 0;
        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header_and_payload() {
        let bytes = [0x6F, 0x04, 0, 0, 0, 0x00, 0x09, 0x00, 0x00, 0x00, 0x00, 0xA4, 0x00, 0x00, 0xEE];
        let message = Message::parse(&bytes).unwrap();
        assert_eq!(message.header.kind(), Ok(CommandKind::XfrBlock));
        assert_eq!(message.header.length, 4);
        assert_eq!(message.seq(), 9);
        assert_eq!(message.payload, &[0x00, 0xA4, 0x00, 0x00]);
    }

    #[test]
    fn debug_shows_set_params() {
        let bytes = [0x6F, 0x00, 0, 0, 0, 0x00, 0x02, 0x05, 0x00, 0x00];
        let message = Message::parse(&bytes).unwrap();
        assert_eq!(message.params, [0x05, 0x00, 0x00]);
        assert_eq!(
            format!("{:?}", message),
            "Command { cmd: XfrBlock, slot: 0, seq: 2, params: [05, 00, 00] }"
        );

        let bytes = [0x65, 0x00, 0, 0, 0, 0x00, 0x03, 0x00, 0x00, 0x00];
        let message = Message::parse(&bytes).unwrap();
        assert_eq!(format!("{:?}", message), "Command { cmd: GetSlotStatus, slot: 0, seq: 3 }");
    }

    #[test]
    fn short_header() {
        assert_eq!(Message::parse(&[0x62, 0, 0, 0, 0, 0, 1, 0, 0]), Err(Error::ShortPacket));
        assert_eq!(declared_len(&[0x62, 0x10, 0x01]), None);
        assert_eq!(declared_len(&[0x62, 0x10, 0x01, 0, 0]), Some(0x110));
    }

    #[test]
    fn unknown_kind() {
        let message = Message::parse(&[0x6C, 0, 0, 0, 0, 0, 1, 0, 0, 0]).unwrap();
        assert_eq!(message.header.kind(), Err(Error::UnknownCommand(0x6C)));
    }

    #[test]
    fn data_block_layout() {
        let reply: Reply = DataBlock::new(0, 3, &[0x90, 0x00]).into();
        assert_eq!(&reply[..], &[0x80, 2, 0, 0, 0, 0, 3, 0x00, 0x00, 0x00, 0x90, 0x00]);

        let status = ReplyStatus::failed(IccStatus::PresentAndActive);
        let reply: Reply = DataBlock::failed(0, 4, status, SlotError::CmdAborted).into();
        assert_eq!(&reply[..], &[0x80, 0, 0, 0, 0, 0, 4, 0x40, 0xFF, 0x00]);
    }

    #[test]
    fn slot_status_layout() {
        let reply: Reply = SlotStatus {
            slot: 2,
            seq: 5,
            status: ReplyStatus::failed(IccStatus::NoIccPresent),
            error: SlotError::SlotNotFound,
        }
        .into();
        assert_eq!(&reply[..], &[0x81, 0, 0, 0, 0, 2, 5, 0x42, 0x05, 0x00]);
    }

    #[test]
    fn status_byte_round_trip() {
        let status = ReplyStatus::failed(IccStatus::NoIccPresent);
        assert_eq!(ReplyStatus::from_byte(status.byte()), Some(status));
        assert_eq!(ReplyStatus::from_byte(0x03), None);
        assert!(status.is_error());
    }
}
