pub mod notifications;
pub mod reducer;
pub mod validation;

pub use notifications::{HandlerId, NoticeHandler, Notifier, format_points};
pub use reducer::{Action, SnapshotData, reduce};
