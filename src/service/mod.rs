//! Request-independent business rules. Every call takes the acting user
//! explicitly.

mod characters;
mod chats;
mod lifecycle;
mod messages;
mod seed;
mod users;

pub use characters::CharacterService;
pub use chats::ChatService;
pub use lifecycle::Lifecycle;
pub use messages::{IncomingMessage, MessageService};
pub use seed::apply_seed;
pub use users::{LoginSession, UserService};
