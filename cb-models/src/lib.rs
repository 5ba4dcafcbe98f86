//! Chatbase Models - Typed rows of the remote tables and auth payloads.
//!
//! Rows belong to the hosted backend; these types only describe how they
//! look on the wire. Unknown columns are tolerated so schema additions on
//! the backend do not break decoding.

pub mod models;

// Re-export key types
pub use models::chat::{Chat, ChatType, NewChat};
pub use models::chat_member::{ChatMember, MemberRole};
pub use models::message::{Message, NewMessage};
pub use models::profile::{Profile, ProfileUpdate};
pub use models::row_id::RowId;
pub use models::session::{Session, SignUpOutcome};
pub use models::user::{User, UserMetadata};
