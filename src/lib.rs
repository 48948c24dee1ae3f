//! Imports DMARC aggregate reports from an IMAP mailbox into MySQL.
//!
//! Attachments are unpacked by [`payload::Extractor`], parsed by
//! [`dmarc::parse`] and handed to a [`store::ReportStore`] by
//! [`ingest::Importer`].

pub mod check;
pub mod config;
pub mod dmarc;
pub mod error;
pub mod ingest;
pub mod mailbox;
pub mod message;
pub mod payload;
pub mod store;
