//! ISO/IEC 7816-4 side of the reader: the virtual card behind slot 0.

pub mod atr;
pub mod card;
pub mod command;
pub mod file;
pub mod status;
pub mod tlv;

pub use atr::Atr;
pub use card::{Card, Response};
pub use command::{Command, CommandHeader};
pub use file::{DedicatedFile, FileRef, FileSystem};
pub use status::Status;
