pub mod errors;
pub mod messages;
pub mod pairing;
pub mod records;
pub mod session;

// Re-export all types
pub use errors::*;
pub use messages::*;
pub use pairing::*;
pub use records::*;
pub use session::*;

use uuid::Uuid;

pub type UserId = Uuid;
pub type RecordId = Uuid;
