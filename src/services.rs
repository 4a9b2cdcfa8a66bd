//! Operating-system services consumed by mdpaste.
//!
//! Each trait wraps one OS capability. The application state and the menu
//! view only talk to these traits, so tests drive them with the mocks below
//! and the menu bar app plugs in the macOS implementations from
//! `menubar::platform`.

use anyhow::Result;

/// Registers the running application as a login item.
pub trait LoginItemService {
    fn register(&self) -> Result<()>;
    fn unregister(&self) -> Result<()>;
}

/// Completion for a notification permission request.
///
/// Called at most once with the grant result, possibly from another thread.
pub type PermissionReply = Box<dyn FnOnce(bool) + Send + 'static>;

/// Requests permission to post user notifications.
pub trait NotificationService {
    /// Ask for alert and sound permission. Returns immediately; `reply`
    /// receives the result later.
    fn request_authorization(&self, reply: PermissionReply);
}

/// App and window activation used by the "Settings..." action.
pub trait WindowService {
    /// Whether the OS can explicitly bring this app to the foreground
    /// before opening a window (macOS 14 and later).
    fn supports_foreground_activation(&self) -> bool;

    /// Bring the application to the foreground.
    fn activate_app(&mut self);

    /// Show the settings surface. Does not guarantee it is raised.
    fn open_settings(&mut self);

    /// On the next UI tick, make the first visible window that can become
    /// key the key window and order it front.
    fn raise_on_next_tick(&mut self);
}
