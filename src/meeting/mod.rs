pub mod admission;
pub mod rooms;
pub mod token;

pub use rooms::{MeetingRegistry, MeetingRoom, WaitingGuest};
