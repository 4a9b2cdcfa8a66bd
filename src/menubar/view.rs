//! Menu contents for the mdpaste menu bar.
//!
//! Turns the current [`AppState`] into a flat list of menu entries and maps
//! menu actions back onto the state and the window service. The native tray
//! menu is built from these entries in `menu`.

use crate::services::WindowService;
use crate::state::{AppState, ConversionStats};
use chrono::{DateTime, Utc};

pub const ENABLED_LABEL: &str = "Enabled";
pub const DISABLED_LABEL: &str = "Disabled";
pub const NO_CONVERSIONS_LABEL: &str = "No conversions yet";
pub const SETTINGS_LABEL: &str = "Settings...";
pub const QUIT_LABEL: &str = "Quit MarkdownPaste";

/// Something the user can trigger from the menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ToggleEnabled,
    OpenSettings,
    Quit,
}

impl MenuAction {
    /// Menu item ID used to route native menu events.
    pub fn id(&self) -> &'static str {
        match self {
            MenuAction::ToggleEnabled => "toggle_enabled",
            MenuAction::OpenSettings => "open_settings",
            MenuAction::Quit => "quit",
        }
    }

    pub fn from_id(id: &str) -> Option<MenuAction> {
        match id {
            "toggle_enabled" => Some(MenuAction::ToggleEnabled),
            "open_settings" => Some(MenuAction::OpenSettings),
            "quit" => Some(MenuAction::Quit),
            _ => None,
        }
    }
}

/// One row of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuEntry {
    /// Clickable row. `checked` is `Some` for rows showing a checkmark state.
    Action {
        action: MenuAction,
        title: String,
        checked: Option<bool>,
    },
    /// Informational, disabled row
    Label(String),
    Separator,
}

/// Whether the event loop should keep running after an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Build the menu for the current state.
///
/// Menu structure:
/// - "Enabled" (checked) or "Disabled"
/// - Separator
/// - Conversion summary
/// - Separator
/// - "Settings..."
/// - Separator
/// - "Quit MarkdownPaste"
pub fn menu_entries(state: &AppState, now: DateTime<Utc>) -> Vec<MenuEntry> {
    let mut entries = vec![status_entry(state.enabled()), MenuEntry::Separator];

    entries.extend(
        conversion_lines(state.conversion_stats(), now)
            .into_iter()
            .map(MenuEntry::Label),
    );

    entries.push(MenuEntry::Separator);
    entries.push(MenuEntry::Action {
        action: MenuAction::OpenSettings,
        title: SETTINGS_LABEL.to_string(),
        checked: None,
    });
    entries.push(MenuEntry::Separator);
    entries.push(MenuEntry::Action {
        action: MenuAction::Quit,
        title: QUIT_LABEL.to_string(),
        checked: None,
    });

    entries
}

fn status_entry(enabled: bool) -> MenuEntry {
    let (title, checked) = if enabled {
        (ENABLED_LABEL, Some(true))
    } else {
        (DISABLED_LABEL, None)
    };
    MenuEntry::Action {
        action: MenuAction::ToggleEnabled,
        title: title.to_string(),
        checked,
    }
}

/// Lines summarizing conversions: a placeholder when there are none,
/// otherwise the count and, if known, when the last one happened.
pub fn conversion_lines(stats: &ConversionStats, now: DateTime<Utc>) -> Vec<String> {
    if stats.count == 0 {
        return vec![NO_CONVERSIONS_LABEL.to_string()];
    }

    let mut lines = vec![format!("Conversions: {}", stats.count)];
    if let Some(last) = stats.last_conversion {
        lines.push(format!("Last: {}", format_relative_time(last, now)));
    }
    lines
}

/// Format a datetime relative to `now` (e.g., "5m ago", "2h ago", "12s ago").
pub fn format_relative_time(datetime: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let duration = now.signed_duration_since(datetime);

    if duration.num_seconds() < 0 {
        return "just now".to_string();
    }

    let seconds = duration.num_seconds();
    let minutes = duration.num_minutes();
    let hours = duration.num_hours();
    let days = duration.num_days();

    if days > 0 {
        format!("{}d ago", days)
    } else if hours > 0 {
        format!("{}h ago", hours)
    } else if minutes > 0 {
        format!("{}m ago", minutes)
    } else {
        format!("{}s ago", seconds)
    }
}

/// Run a menu action.
pub fn dispatch(action: MenuAction, state: &mut AppState, windows: &mut dyn WindowService) -> Flow {
    match action {
        MenuAction::ToggleEnabled => {
            state.toggle_enabled();
            Flow::Continue
        }
        MenuAction::OpenSettings => {
            open_settings(windows);
            Flow::Continue
        }
        MenuAction::Quit => Flow::Exit,
    }
}

/// Open the settings window.
///
/// Opening alone does not raise an already-open window, so where the OS
/// allows it the app is activated first and the window is re-raised on the
/// next tick. Older systems only get the plain open.
fn open_settings(windows: &mut dyn WindowService) {
    if windows.supports_foreground_activation() {
        windows.activate_app();
        windows.open_settings();
        windows.raise_on_next_tick();
    } else {
        windows.open_settings();
    }
}
