//! `mboxcontacts`: build a deduplicated contact list from MBOX archives
//! of any size.
//!
//! The archive is streamed one message at a time ([`parser::mbox`]), each
//! message is reduced to a [`model::message::MessageRecord`]
//! ([`parser::record`]), and records are folded into one
//! [`model::contact::Contact`] per address ([`contacts::aggregator`]).
//! [`extract::run_extraction`] wires the stages together and writes the
//! JSON report.

pub mod config;
pub mod contacts;
pub mod error;
pub mod export;
pub mod extract;
pub mod i18n;
pub mod model;
pub mod parser;
