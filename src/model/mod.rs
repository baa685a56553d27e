//! Core data model types: addresses, parsed message records, and contacts.

pub mod address;
pub mod contact;
pub mod message;
