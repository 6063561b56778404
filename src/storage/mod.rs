//! Session persistence
//!
//! CSV audit trail for one trigger session.

mod recorder;

pub use recorder::*;
