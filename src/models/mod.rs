pub mod access_grants;
pub mod activities;
pub mod attendees;
pub mod check_in_records;
pub mod events;

pub use access_grants::{AccessGrantRow, CapabilitySet};
pub use activities::{ActivityRow, ActivityWithCountRow};
pub use attendees::AttendeeRow;
pub use check_in_records::{CheckInListingRow, CheckInRecordRow, CheckInStatus};
pub use events::{EventRow, EventWithCountRow};
