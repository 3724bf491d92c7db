use crate::chat::typing::TypingTable;
use crate::db::DbPool;
use crate::meeting::MeetingRegistry;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex> — the message store collaborator
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Shared secret for meeting-room entry tokens (256-bit random key)
    pub meeting_token_secret: Vec<u8>,
    /// Lifetime of an issued room-entry token, in seconds
    pub meeting_token_ttl_secs: u64,
    /// Active WebSocket connections per user
    pub connections: ConnectionRegistry,
    /// Ephemeral typing state per (sender, recipient) pair
    pub typing: TypingTable,
    /// Live meeting rooms with their waiting queues
    pub meetings: MeetingRegistry,
}
