//! Outward notifications from the extension system to the rest of the host.
//!
//! The extension system never talks to the UI directly. It emits
//! [`HostEvent`]s through a [`HostNotifier`], which either forwards them over
//! a channel to whoever renders them or just logs them.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

/// Severity icon of a popup message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PopupIcon {
    Info,
    Success,
    Warning,
    Normal,
    Error,
}

/// Short user-visible message, e.g. a failed extension load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopupMessage {
    pub icon: PopupIcon,
    pub content: String,
}

/// System notification, used for errors after an extension has loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub title: String,
    pub content: String,
}

/// Events emitted by the extension system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", content = "payload", rename_all = "camelCase")]
pub enum HostEvent {
    /// Every discovered extension has been attempted. Fired exactly once.
    ExtensionReady,
    ExtensionListChanged,
    SourceListChanged,
    Popup(PopupMessage),
    Notification(NotificationMessage),
}

/// Sink for [`HostEvent`]s.
pub trait HostNotifier: Send + Sync {
    fn emit(&self, event: HostEvent);

    fn extension_ready(&self) {
        self.emit(HostEvent::ExtensionReady);
    }

    fn extension_list_changed(&self) {
        self.emit(HostEvent::ExtensionListChanged);
    }

    fn source_list_changed(&self) {
        self.emit(HostEvent::SourceListChanged);
    }

    fn popup(&self, icon: PopupIcon, content: String) {
        self.emit(HostEvent::Popup(PopupMessage { icon, content }));
    }

    fn notification(&self, title: String, content: String) {
        self.emit(HostEvent::Notification(NotificationMessage { title, content }));
    }
}

/// Title of the notification shown for post-load extension failures.
pub const RUNTIME_ERROR_TITLE: &str = "Extension Runtime Error";

/// Body of the notification shown for post-load extension failures.
pub const RUNTIME_ERROR_CONTENT: &str = "An unknown error occurred in an extension.";

/// Build the generic runtime error notification.
pub fn runtime_error_event() -> HostEvent {
    HostEvent::Notification(NotificationMessage {
        title: RUNTIME_ERROR_TITLE.to_string(),
        content: RUNTIME_ERROR_CONTENT.to_string(),
    })
}

/// Build an error popup.
pub fn error_popup(content: impl Into<String>) -> HostEvent {
    HostEvent::Popup(PopupMessage {
        icon: PopupIcon::Error,
        content: content.into(),
    })
}

/// Forwards events over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelNotifier {
    tx: mpsc::UnboundedSender<HostEvent>,
}

impl ChannelNotifier {
    /// Create a notifier and the receiving end of its channel.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<HostEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl HostNotifier for ChannelNotifier {
    fn emit(&self, event: HostEvent) {
        if self.tx.send(event).is_err() {
            warn!("Host event receiver dropped, event discarded");
        }
    }
}

/// Logs events instead of delivering them. Used when no UI is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl HostNotifier for TracingNotifier {
    fn emit(&self, event: HostEvent) {
        match event {
            HostEvent::Popup(PopupMessage {
                icon: PopupIcon::Error,
                content,
            }) => error!(%content, "popup"),
            HostEvent::Popup(PopupMessage { icon, content }) => info!(?icon, %content, "popup"),
            HostEvent::Notification(NotificationMessage { title, content }) => {
                warn!(%title, %content, "notification")
            }
            other => info!(event = ?other, "host event"),
        }
    }
}
