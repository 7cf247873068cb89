#![cfg_attr(not(test), no_std)]

//! USB CCID smart card reader with a built-in ISO 7816-4 card.
//!
//! The reader exposes a single slot. Bulk messages from the host are handled
//! by the [`Pipe`]; APDUs carried in XfrBlock messages are answered by the
//! [`Card`](iso7816::Card) in slot 0, which knows SELECT on a tree of
//! dedicated files.
//!
//! [CCID Specification for Integrated Circuit(s) Cards Interface Devices](https://www.usb.org/sites/default/files/DWG_Smart-Card_CCID_Rev110.pdf)

#[macro_use]
extern crate delog;
generate_macros!();

pub mod class;
pub mod constants;
pub mod iso7816;
pub mod pipe;
pub mod slot;
pub mod transport;
pub mod types;

pub use class::Ccid;
pub use pipe::Pipe;
pub use transport::Transport;
