//! Mbox parsing: streaming reader, header decoding, body decoding, and
//! record assembly.

pub mod body;
pub mod header;
pub mod mbox;
pub mod record;
