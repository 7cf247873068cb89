//! Short command APDUs: `CLA INS P1 P2 [Lc Data] [Le]`.

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer than the four header bytes.
    TooShort,
    /// The trailer length disagrees with Lc.
    WrongLength,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Chaining {
    Last,
    NotLast,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SecureMessaging {
    None,
    Proprietary,
    CommandHeaderNotProcessed,
    CommandHeaderAuthenticated,
}

/// Interindustry class byte, first-interindustry encoding (`000x xxxx`).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Class(u8);

impl Class {
    /// No chaining, no secure messaging, basic logical channel.
    pub const PLAIN: Class = Class(0x00);

    pub fn chaining(self) -> Chaining {
        if self.0 & 0x10 != 0 {
            Chaining::NotLast
        } else {
            Chaining::Last
        }
    }

    pub fn secure_messaging(self) -> SecureMessaging {
        match (self.0 >> 2) & 0b11 {
            0b00 => SecureMessaging::None,
            0b01 => SecureMessaging::Proprietary,
            0b10 => SecureMessaging::CommandHeaderNotProcessed,
            _ => SecureMessaging::CommandHeaderAuthenticated,
        }
    }

    pub fn channel(self) -> u8 {
        self.0 & 0b11
    }

    pub fn is_proprietary(self) -> bool {
        self.0 & 0x80 != 0
    }
}

impl From<u8> for Class {
    fn from(cla: u8) -> Self {
        Class(cla)
    }
}

impl From<Class> for u8 {
    fn from(class: Class) -> u8 {
        class.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    DeactivateFile,
    EraseRecord,
    EraseBinary,
    Select,
    ReadBinary,
    ReadRecord,
    WriteBinary,
    WriteRecord,
    UpdateBinary,
    AppendRecord,
    Unknown(u8),
}

impl From<u8> for Instruction {
    fn from(ins: u8) -> Self {
        match ins {
            0x04 => Instruction::DeactivateFile,
            0x0C => Instruction::EraseRecord,
            0x0E => Instruction::EraseBinary,
            0xA4 => Instruction::Select,
            0xB0 => Instruction::ReadBinary,
            0xB2 => Instruction::ReadRecord,
            0xD0 => Instruction::WriteBinary,
            0xD2 => Instruction::WriteRecord,
            0xD6 => Instruction::UpdateBinary,
            0xE2 => Instruction::AppendRecord,
            other => Instruction::Unknown(other),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CommandHeader {
    pub cla: u8,
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
}

impl CommandHeader {
    pub const LEN: usize = 4;

    /// Splits a raw APDU into its header and the trailer that follows it.
    pub fn split(apdu: &[u8]) -> Result<(Self, &[u8]), ParseError> {
        if apdu.len() < Self::LEN {
            return Err(ParseError::TooShort);
        }
        let (header, trailer) = apdu.split_at(Self::LEN);
        Ok((
            Self {
                cla: header[0],
                ins: header[1],
                p1: header[2],
                p2: header[3],
            },
            trailer,
        ))
    }

    pub fn class(&self) -> Class {
        Class::from(self.cla)
    }

    pub fn instruction(&self) -> Instruction {
        Instruction::from(self.ins)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    pub header: CommandHeader,
    pub lc: u8,
    pub data: &'a [u8],
    /// 0 when absent.
    pub le: u8,
}

impl<'a> Command<'a> {
    /// Decodes the `[Lc Data] [Le]` trailer that follows `header`.
    ///
    /// Only three shapes are accepted: an empty trailer, `Lc Data Le`
    /// (length Lc + 2) and `Lc Data` (length Lc + 1), tried in that order.
    pub fn decode(header: CommandHeader, trailer: &'a [u8]) -> Result<Self, ParseError> {
        let Some((&lc, rest)) = trailer.split_first() else {
            return Ok(Self {
                header,
                lc: 0,
                data: &[],
                le: 0,
            });
        };

        let lc_len = lc as usize;
        let (data, le) = if trailer.len() == lc_len + 2 {
            (&rest[..lc_len], rest[lc_len])
        } else if trailer.len() == lc_len + 1 {
            (rest, 0)
        } else {
            return Err(ParseError::WrongLength);
        };

        Ok(Self {
            header,
            lc,
            data,
            le,
        })
    }

    pub fn parse(apdu: &'a [u8]) -> Result<Self, ParseError> {
        let (header, trailer) = CommandHeader::split(apdu)?;
        Self::decode(header, trailer)
    }
}
