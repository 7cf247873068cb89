pub const CLASS_CCID: u8 = 0x0B;
pub const SUBCLASS_NONE: u8 = 0x0;
pub const PROTOCOL_NONE: u8 = 0x0;

#[cfg(not(feature = "highspeed-usb"))]
pub const PACKET_SIZE: usize = 64;
#[cfg(feature = "highspeed-usb")]
pub const PACKET_SIZE: usize = 512;

pub const INTERRUPT_PACKET_SIZE: usize = 8;
pub const INTERRUPT_INTERVAL_MS: u8 = 32;

pub const CCID_HEADER_LEN: usize = 10;

/// CLA INS P1 P2 Lc [255 bytes] Le
pub const MAX_APDU_LENGTH: usize = 4 + 1 + 255 + 1;
/// 256 response bytes + SW1 SW2
pub const MAX_RESPONSE_LENGTH: usize = 256 + 2;

pub const MAX_MSG_LENGTH: usize = CCID_HEADER_LEN + MAX_APDU_LENGTH;
pub const MAX_REPLY_LENGTH: usize = CCID_HEADER_LEN + MAX_RESPONSE_LENGTH;

/// Size of the zeroed reply sent for message types we do not know.
///
/// Deliberately one full packet rather than a fixed 32 byte block, so the
/// reply fills the bulk-in packet and ends with a zero length packet.
pub const UNKNOWN_REPLY_LEN: usize = PACKET_SIZE;

/// Room for any reply, the zeroed one included.
pub const REPLY_BUFFER_LEN: usize = if MAX_REPLY_LENGTH > UNKNOWN_REPLY_LEN {
    MAX_REPLY_LENGTH
} else {
    UNKNOWN_REPLY_LEN
};

/// Only slot 0 holds a card.
pub const SLOT_COUNT: usize = 1;

// PC_to_RDR
pub const PC_TO_RDR_ICC_POWER_ON: u8 = 0x62;
pub const PC_TO_RDR_ICC_POWER_OFF: u8 = 0x63;
pub const PC_TO_RDR_GET_SLOT_STATUS: u8 = 0x65;
pub const PC_TO_RDR_XFR_BLOCK: u8 = 0x6F;
pub const PC_TO_RDR_ABORT: u8 = 0x72;

// RDR_to_PC
pub const RDR_TO_PC_DATA_BLOCK: u8 = 0x80;
pub const RDR_TO_PC_SLOT_STATUS: u8 = 0x81;
pub const RDR_TO_PC_NOTIFY_SLOT_CHANGE: u8 = 0x50;

// class specific requests
pub const REQUEST_ABORT: u8 = 0x01;
pub const REQUEST_GET_CLOCK_FREQUENCIES: u8 = 0x02;
pub const REQUEST_GET_DATA_RATES: u8 = 0x03;

pub const FUNCTIONAL_INTERFACE: u8 = 0x21;
pub const FUNCTIONAL_INTERFACE_DESCRIPTOR: [u8; 0x34] = [
    // bcdCCID rev1.10
    0x10, 0x01,
    // bMaxSlotIndex
    (SLOT_COUNT - 1) as u8,
    // bVoltageSupport: 5.0V
    0x01,
    // dwProtocols: T=0 (the ATR carries no TD1)
    0x01, 0x00, 0x00, 0x00,
    // dwDefaultClock: 3.58 MHz
    0xfc, 0x0d, 0x00, 0x00,
    // dwMaximumClock
    0xfc, 0x0d, 0x00, 0x00,
    // bNumClockSupported: answered by GET_CLOCK_FREQUENCIES
    0x00,
    // dwDataRate: 9600 bps
    0x80, 0x25, 0x00, 0x00,
    // dwMaxDataRate
    0x80, 0x25, 0x00, 0x00,
    // bNumDataRatesSupported: answered by GET_DATA_RATES
    0x00,
    // dwMaxIFSD
    0x00, 0x00, 0x00, 0x00,
    // dwSynchProtocols
    0x00, 0x00, 0x00, 0x00,
    // dwMechanical
    0x00, 0x00, 0x00, 0x00,
    // dwFeatures: automatic parameters, short APDU level exchange
    0xbe, 0x00, 0x02, 0x00,
    // dwMaxCCIDMessageLength
    (MAX_MSG_LENGTH & 0xff) as u8, (MAX_MSG_LENGTH >> 8) as u8, 0x00, 0x00,
    // bClassGetResponse
    0xff,
    // bClassEnvelope
    0xff,
    // wLcdLayout
    0x00, 0x00,
    // bPinSupport
    0x00,
    // bMaxCCIDBusySlots
    0x01,
];
