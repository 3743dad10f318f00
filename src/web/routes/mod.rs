pub mod activities;
pub mod attendees;
pub mod check_ins;
pub mod events;
pub mod grants;
pub mod health;
