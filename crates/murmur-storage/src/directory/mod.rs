//! Sender directory
//!
//! [`SessionDirectory`] is the in-memory registry of senders;
//! [`DirectoryJournal`] records its changes on disk so registrations survive
//! a restart.

pub mod journal;
pub mod session;

pub use journal::{DIRECTORY_JOURNAL_MAGIC, DirectoryEvent, DirectoryJournal};
pub use session::{RegisterError, SessionDirectory};
