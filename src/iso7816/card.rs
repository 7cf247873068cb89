//! The virtual card: dispatches command APDUs against its file tree.

use heapless::Vec;

use super::{
    command::{Class, Command, CommandHeader, Instruction, ParseError},
    file::{FileRef, FileSystem, MAX_NAME_LEN},
    status::Status,
    tlv::BufferFull,
};
use crate::constants::MAX_RESPONSE_LENGTH;

/// Response data followed by SW1 SW2.
pub type Response = Vec<u8, MAX_RESPONSE_LENGTH>;

pub const P1_SELECT_BY_FILE_ID: u8 = 0x00;
pub const P1_SELECT_BY_DF_NAME: u8 = 0x04;
pub const P1_SELECT_BY_PATH_FROM_MF: u8 = 0x08;
pub const P1_SELECT_BY_PATH_FROM_DF: u8 = 0x09;
pub const P2_FIRST_OR_ONLY_OCCURRENCE: u8 = 0x00;

/// Why a command did not succeed.
///
/// `NotImplemented` never reaches the host as such; it only leaves the
/// card as a [`Status`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    WrongLength,
    FileNotFound,
    InstructionNotSupported,
    ClassNotSupported,
    NotImplemented,
    ResponseTooLong,
}

impl From<Error> for Status {
    fn from(error: Error) -> Status {
        match error {
            Error::WrongLength => Status::WrongLength,
            Error::FileNotFound => Status::FileNotFound,
            Error::InstructionNotSupported => Status::InstructionNotSupported,
            Error::ClassNotSupported => Status::ClassNotSupported,
            Error::NotImplemented => Status::FunctionNotSupported,
            Error::ResponseTooLong => Status::NoPreciseDiagnosis,
        }
    }
}

impl From<ParseError> for Error {
    fn from(_: ParseError) -> Error {
        Error::WrongLength
    }
}

impl From<BufferFull> for Error {
    fn from(_: BufferFull) -> Error {
        Error::ResponseTooLong
    }
}

pub struct Card<const F: usize> {
    files: FileSystem<F>,
}

impl<const F: usize> Default for Card<F> {
    fn default() -> Self {
        Self::new(FileSystem::new())
    }
}

impl<const F: usize> Card<F> {
    pub fn new(files: FileSystem<F>) -> Self {
        Self { files }
    }

    pub fn files(&self) -> &FileSystem<F> {
        &self.files
    }

    /// Runs a raw command APDU, leaving response data and status word in `response`.
    ///
    /// Failed commands carry no response data.
    pub fn respond(&self, apdu: &[u8], response: &mut Response) -> Status {
        response.clear();

        let status = match self.process(apdu, response) {
            Ok(()) => Status::Success,
            Err(error) => {
                info!("APDU rejected: {:?}", error);
                response.clear();
                Status::from(error)
            }
        };

        // cannot fail on an empty response, so only retry after the data went in
        if status.append_to(response).is_err() {
            response.clear();
            let status = Status::from(Error::ResponseTooLong);
            status.append_to(response).ok();
            return status;
        }
        status
    }

    fn process(&self, apdu: &[u8], response: &mut Response) -> Result<(), Error> {
        let (header, trailer) = CommandHeader::split(apdu)?;
        if header.class() != Class::PLAIN {
            return Err(Error::ClassNotSupported);
        }
        let command = Command::decode(header, trailer)?;
        debug!("{:?}", &command);
        self.handle_command(&command, response)
    }

    /// Dispatches an already decoded command, appending any response data.
    pub fn handle_command(&self, command: &Command<'_>, response: &mut Response) -> Result<(), Error> {
        if command.header.class() != Class::PLAIN {
            return Err(Error::ClassNotSupported);
        }

        match command.header.instruction() {
            Instruction::Select => self.select(command, response),
            _ => Err(Error::InstructionNotSupported),
        }
    }

    fn select(&self, command: &Command<'_>, response: &mut Response) -> Result<(), Error> {
        let mf = self.files.master_file();
        let file = match (command.header.p1, command.header.p2) {
            (P1_SELECT_BY_FILE_ID, P2_FIRST_OR_ONLY_OCCURRENCE) => match command.lc {
                // no data selects the MF
                0 => mf,
                2 => self
                    .files
                    .select_by_file_id(mf, command.data)
                    .ok_or(Error::FileNotFound)?,
                _ => return Err(Error::WrongLength),
            },
            (P1_SELECT_BY_DF_NAME, P2_FIRST_OR_ONLY_OCCURRENCE) => {
                if command.data.is_empty() || command.data.len() > MAX_NAME_LEN {
                    return Err(Error::WrongLength);
                }
                self.files
                    .select_by_name(mf, command.data)
                    .ok_or(Error::FileNotFound)?
            }
            _ => return Err(Error::NotImplemented),
        };
        self.write_fci(file, response)
    }

    fn write_fci(&self, file: FileRef, response: &mut Response) -> Result<(), Error> {
        self.files.build_fci(file, response)?;
        Ok(())
    }
}
