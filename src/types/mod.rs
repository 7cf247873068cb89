pub mod control;
pub mod packet;
