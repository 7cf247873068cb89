use crate::constants::*;

/// CCID class requests addressed to our interface.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ClassRequest {
    /// wValue carries bSlot in the low byte and bSeq in the high byte.
    Abort { slot: u8, seq: u8 },
    GetClockFrequencies,
    GetDataRates,
}

impl ClassRequest {
    pub fn parse(request: u8, value: u16) -> Option<Self> {
        match request {
            REQUEST_ABORT => Some(ClassRequest::Abort {
                slot: value as u8,
                seq: (value >> 8) as u8,
            }),
            REQUEST_GET_CLOCK_FREQUENCIES => Some(ClassRequest::GetClockFrequencies),
            REQUEST_GET_DATA_RATES => Some(ClassRequest::GetDataRates),
            _ => None,
        }
    }
}
