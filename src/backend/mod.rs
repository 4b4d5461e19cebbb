//! Presentation backends.
//!
//! A backend is looked up by the name listed in an event's `Action` entry. The
//! manager hands it every dispatched request together with a [`Completion`]
//! token; the backend must eventually finish (or drop) that token exactly once
//! per `notify` call, including when it fails early.

use crate::manager::Completion;
use crate::notifyrc::EventConfig;
use crate::request::{NotificationId, NotificationRequest};

mod execute;
mod logfile;
#[cfg(target_os = "linux")]
mod popup;
mod registry;
mod sound;

pub use execute::ExecuteBackend;
pub use logfile::LogfileBackend;
#[cfg(target_os = "linux")]
pub use popup::PopupBackend;
pub use registry::{BackendProvider, BackendRegistry};
pub use sound::SoundBackend;

/// What a backend sees of a dispatched request.
#[derive(Clone, Copy, Debug)]
pub struct Envelope<'a> {
    pub id: NotificationId,
    /// Application name the configuration was resolved for.
    pub app_name: &'a str,
    pub request: &'a NotificationRequest,
}

pub trait Backend: Send {
    /// Name matched against the `Action` entry.
    fn option_name(&self) -> &str;

    /// Start presenting. `completion` must be finished once presentation is over.
    fn notify(&mut self, envelope: &Envelope<'_>, config: &EventConfig, completion: Completion);

    /// Refresh content of a request already being presented. Never touches the
    /// reference count.
    fn update(&mut self, envelope: &Envelope<'_>, config: &EventConfig) {
        let _ = (envelope, config);
    }

    /// Best-effort early termination of the presentation for `id`.
    fn close(&mut self, id: NotificationId) {
        let _ = id;
    }
}
