//! Monthly attendance ledger.
//!
//! Plain domain records and validation (no IO, no HTTP, no storage). Records
//! are organisation-wide and carry no user reference.

pub mod day;
pub mod period;

pub use day::{AttendanceChanges, AttendanceDay, NewAttendanceDay, ANNUAL_LEAVE_MAX_LEN};
pub use period::{Period, RECENT_WINDOW};
