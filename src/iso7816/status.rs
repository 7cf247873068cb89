use heapless::Vec;

use super::tlv::BufferFull;

/// Status words that go out on the wire.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Status {
    Success,
    WrongLength,
    FunctionNotSupported,
    FileNotFound,
    InstructionNotSupported,
    ClassNotSupported,
    NoPreciseDiagnosis,
}

impl Status {
    pub fn sw1(self) -> u8 {
        (u16::from(self) >> 8) as u8
    }

    pub fn sw2(self) -> u8 {
        u16::from(self) as u8
    }

    pub fn to_bytes(self) -> [u8; 2] {
        u16::from(self).to_be_bytes()
    }

    pub fn is_success(self) -> bool {
        self == Status::Success
    }

    /// Appends SW1 SW2 to a response.
    pub fn append_to<const N: usize>(self, response: &mut Vec<u8, N>) -> Result<(), BufferFull> {
        response
            .extend_from_slice(&self.to_bytes())
            .map_err(|_| BufferFull)
    }
}

impl From<Status> for u16 {
    fn from(status: Status) -> u16 {
        match status {
            Status::Success => 0x9000,
            Status::WrongLength => 0x6700,
            Status::FunctionNotSupported => 0x6A81,
            Status::FileNotFound => 0x6A82,
            Status::InstructionNotSupported => 0x6D00,
            Status::ClassNotSupported => 0x6E00,
            Status::NoPreciseDiagnosis => 0x6F00,
        }
    }
}

impl TryFrom<u16> for Status {
    type Error = u16;

    fn try_from(sw: u16) -> Result<Self, u16> {
        Ok(match sw {
            0x9000 => Status::Success,
            0x6700 => Status::WrongLength,
            0x6A81 => Status::FunctionNotSupported,
            0x6A82 => Status::FileNotFound,
            0x6D00 => Status::InstructionNotSupported,
            0x6E00 => Status::ClassNotSupported,
            0x6F00 => Status::NoPreciseDiagnosis,
            other => return Err(other),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailer() {
        let mut response = Vec::<u8, 4>::new();
        response.push(0x01).unwrap();
        Status::FileNotFound.append_to(&mut response).unwrap();
        assert_eq!(&response[..], &[0x01, 0x6A, 0x82]);
        assert_eq!(Status::Success.append_to(&mut response), Err(BufferFull));
        assert_eq!(response.len(), 3);
    }

    #[test]
    fn words() {
        assert_eq!(Status::Success.to_bytes(), [0x90, 0x00]);
        assert_eq!(Status::ClassNotSupported.sw1(), 0x6E);
        assert_eq!(Status::try_from(0x6D00), Ok(Status::InstructionNotSupported));
        assert_eq!(Status::try_from(0xDEAD), Err(0xDEAD));
    }
}
