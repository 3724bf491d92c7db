pub mod messages;
pub mod typing;
