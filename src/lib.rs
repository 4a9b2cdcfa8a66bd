pub mod config;
pub mod menubar;
pub mod prefs;
pub mod services;
pub mod state;
pub mod watcher;

pub use config::{Config, MenubarConfig};
pub use prefs::{MemoryStore, PrefKey, PrefValue, PreferenceStore, Preferences, TomlFileStore};
pub use services::{LoginItemService, NotificationService, PermissionReply, WindowService};
pub use state::{AppState, Change, ConversionSettings, ConversionStats, PreferenceEdit};
