#![forbid(unsafe_code)]
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod backend;
pub mod config;
pub mod error;
pub mod manager;
pub mod notification;
pub mod notifyrc;
pub mod request;
pub mod telemetry;
pub mod types;

pub use backend::{Backend, BackendProvider, BackendRegistry, Envelope};
pub use manager::{Completion, ManagerHandle, ManagerStats, NotificationManager};
pub use notification::{Notification, NotificationEvent};
pub use notifyrc::{ConfigResolver, EventConfig, FileResolver, NotifyRc, StaticResolver};
pub use request::{
    NotificationId, NotificationRequest, RESIDENT_HINT, RefCount, RequestId, RequestSnapshot,
};
pub use types::{Context, Icon, NotificationFlags, ReplyAction, ReplyFallback, Urgency};

pub type Result<T> = std::result::Result<T, error::Error>;
