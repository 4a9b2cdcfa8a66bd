//! Preference storage for mdpaste.
//!
//! Preferences live in a flat key-value store under stable key names. The
//! default backend is a TOML table at `~/.mdpaste/preferences.toml`; every
//! write goes straight to disk.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of a persisted preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrefKey {
    Enabled,
    LaunchAtLogin,
    DetectionSensitivity,
    IncludeRtf,
    ShowNotifications,
    BaseFontSize,
}

impl PrefKey {
    pub const ALL: [PrefKey; 6] = [
        PrefKey::Enabled,
        PrefKey::LaunchAtLogin,
        PrefKey::DetectionSensitivity,
        PrefKey::IncludeRtf,
        PrefKey::ShowNotifications,
        PrefKey::BaseFontSize,
    ];

    /// Key under which the value is stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrefKey::Enabled => "isEnabled",
            PrefKey::LaunchAtLogin => "launchAtLogin",
            PrefKey::DetectionSensitivity => "detectionSensitivity",
            PrefKey::IncludeRtf => "includeRTF",
            PrefKey::ShowNotifications => "showNotifications",
            PrefKey::BaseFontSize => "baseFontSize",
        }
    }

    /// Value used when the store has nothing (or nothing usable) for this key.
    pub fn default_value(&self) -> PrefValue {
        match self {
            PrefKey::Enabled => PrefValue::Bool(true),
            PrefKey::LaunchAtLogin => PrefValue::Bool(false),
            PrefKey::DetectionSensitivity => PrefValue::Int(2),
            PrefKey::IncludeRtf => PrefValue::Bool(true),
            PrefKey::ShowNotifications => PrefValue::Bool(false),
            PrefKey::BaseFontSize => PrefValue::Int(14),
        }
    }
}

/// A stored preference value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefValue {
    Bool(bool),
    Int(i64),
}

impl PrefValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PrefValue::Bool(b) => Some(*b),
            PrefValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PrefValue::Int(i) => Some(*i),
            PrefValue::Bool(_) => None,
        }
    }
}

/// Key-value storage backing the preferences.
pub trait PreferenceStore {
    /// Read the stored value for `key`, if any.
    fn get(&self, key: PrefKey) -> Option<PrefValue>;

    /// Store `value` under `key`. Implementations persist before returning.
    fn set(&mut self, key: PrefKey, value: PrefValue) -> Result<()>;

    /// Re-read the backing storage after an outside change.
    fn reload(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Typed snapshot of every preference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preferences {
    /// Whether clipboard conversion is active
    pub enabled: bool,
    /// Whether the app is registered as a login item
    pub launch_at_login: bool,
    /// How eagerly clipboard text is treated as Markdown
    pub detection_sensitivity: i64,
    /// Whether converted output carries an RTF flavor
    pub include_rtf: bool,
    /// Whether a notification is posted after each conversion
    pub show_notifications: bool,
    /// Body font size used for converted output
    pub base_font_size: i64,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            enabled: true,
            launch_at_login: false,
            detection_sensitivity: 2,
            include_rtf: true,
            show_notifications: false,
            base_font_size: 14,
        }
    }
}

impl Preferences {
    /// Read every preference from `store`, falling back to defaults for
    /// missing or wrongly typed values.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        Self {
            enabled: read_bool(store, PrefKey::Enabled),
            launch_at_login: read_bool(store, PrefKey::LaunchAtLogin),
            detection_sensitivity: read_int(store, PrefKey::DetectionSensitivity),
            include_rtf: read_bool(store, PrefKey::IncludeRtf),
            show_notifications: read_bool(store, PrefKey::ShowNotifications),
            base_font_size: read_int(store, PrefKey::BaseFontSize),
        }
    }

    /// Current value of `key` in this snapshot.
    pub fn value(&self, key: PrefKey) -> PrefValue {
        match key {
            PrefKey::Enabled => PrefValue::Bool(self.enabled),
            PrefKey::LaunchAtLogin => PrefValue::Bool(self.launch_at_login),
            PrefKey::DetectionSensitivity => PrefValue::Int(self.detection_sensitivity),
            PrefKey::IncludeRtf => PrefValue::Bool(self.include_rtf),
            PrefKey::ShowNotifications => PrefValue::Bool(self.show_notifications),
            PrefKey::BaseFontSize => PrefValue::Int(self.base_font_size),
        }
    }
}

fn read_bool(store: &dyn PreferenceStore, key: PrefKey) -> bool {
    let default = key.default_value().as_bool().unwrap_or_default();
    match store.get(key) {
        Some(value) => value.as_bool().unwrap_or_else(|| {
            tracing::warn!("Preference {} is not a boolean, using default", key.as_str());
            default
        }),
        None => default,
    }
}

fn read_int(store: &dyn PreferenceStore, key: PrefKey) -> i64 {
    let default = key.default_value().as_int().unwrap_or_default();
    match store.get(key) {
        Some(value) => value.as_int().unwrap_or_else(|| {
            tracing::warn!("Preference {} is not an integer, using default", key.as_str());
            default
        }),
        None => default,
    }
}

/// In-memory store. Nothing survives the process.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<PrefKey, PrefValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for seeding a store.
    pub fn with(mut self, key: PrefKey, value: PrefValue) -> Self {
        self.values.insert(key, value);
        self
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: PrefKey) -> Option<PrefValue> {
        self.values.get(&key).copied()
    }

    fn set(&mut self, key: PrefKey, value: PrefValue) -> Result<()> {
        self.values.insert(key, value);
        Ok(())
    }
}

/// Store backed by a flat TOML table on disk.
///
/// Unknown keys in the file are preserved on write.
#[derive(Debug)]
pub struct TomlFileStore {
    path: PathBuf,
    table: toml::Table,
}

impl TomlFileStore {
    /// Open the store at `path`.
    ///
    /// - If the file doesn't exist, the store starts empty.
    /// - If the file can't be read or parsed, logs a warning and starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = Self::read_table(&path).unwrap_or_else(|e| {
            tracing::warn!("{:#}, using default preferences", e);
            toml::Table::new()
        });
        Self { path, table }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(path: &Path) -> Result<toml::Table> {
        if !path.exists() {
            return Ok(toml::Table::new());
        }
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        contents
            .parse::<toml::Table>()
            .with_context(|| format!("Invalid TOML in {}", path.display()))
    }

    /// Write the table atomically: temp file first, then rename over the target.
    fn write_table(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let contents = toml::to_string(&self.table).context("Failed to serialize preferences")?;
        let temp_path = self.path.with_extension("toml.tmp");

        fs::write(&temp_path, contents)
            .with_context(|| format!("Failed to write temp file: {:?}", temp_path))?;
        fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename temp file to {:?}", self.path))?;

        Ok(())
    }
}

impl PreferenceStore for TomlFileStore {
    fn get(&self, key: PrefKey) -> Option<PrefValue> {
        match self.table.get(key.as_str())? {
            toml::Value::Boolean(b) => Some(PrefValue::Bool(*b)),
            toml::Value::Integer(i) => Some(PrefValue::Int(*i)),
            other => {
                tracing::warn!(
                    "Preference {} has unsupported type {}, ignoring",
                    key.as_str(),
                    other.type_str()
                );
                None
            }
        }
    }

    fn set(&mut self, key: PrefKey, value: PrefValue) -> Result<()> {
        let value = match value {
            PrefValue::Bool(b) => toml::Value::Boolean(b),
            PrefValue::Int(i) => toml::Value::Integer(i),
        };
        self.table.insert(key.as_str().to_string(), value);
        self.write_table()
    }

    fn reload(&mut self) -> Result<()> {
        self.table = Self::read_table(&self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_key_names() {
        let names: Vec<&str> = PrefKey::ALL.iter().map(|k| k.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "isEnabled",
                "launchAtLogin",
                "detectionSensitivity",
                "includeRTF",
                "showNotifications",
                "baseFontSize"
            ]
        );
    }

    #[test]
    fn test_defaults_match_key_defaults() {
        let prefs = Preferences::default();
        for key in PrefKey::ALL {
            assert_eq!(prefs.value(key), key.default_value(), "{}", key.as_str());
        }
    }

    #[test]
    fn test_load_from_empty_store_uses_defaults() {
        let store = MemoryStore::new();
        assert_eq!(Preferences::load(&store), Preferences::default());
    }

    #[test]
    fn test_load_reads_stored_values() {
        let store = MemoryStore::new()
            .with(PrefKey::Enabled, PrefValue::Bool(false))
            .with(PrefKey::BaseFontSize, PrefValue::Int(18));
        let prefs = Preferences::load(&store);
        assert!(!prefs.enabled);
        assert_eq!(prefs.base_font_size, 18);
        assert_eq!(prefs.detection_sensitivity, 2);
    }

    #[test]
    fn test_load_wrong_type_uses_default() {
        let store = MemoryStore::new()
            .with(PrefKey::IncludeRtf, PrefValue::Int(0))
            .with(PrefKey::DetectionSensitivity, PrefValue::Bool(true));
        let prefs = Preferences::load(&store);
        assert!(prefs.include_rtf);
        assert_eq!(prefs.detection_sensitivity, 2);
    }

    #[test]
    fn test_toml_store_missing_file_is_empty() {
        let temp_dir = tempdir().unwrap();
        let store = TomlFileStore::open(temp_dir.path().join("preferences.toml"));
        assert!(store.get(PrefKey::Enabled).is_none());
    }

    #[test]
    fn test_toml_store_invalid_file_is_empty() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");
        fs::write(&path, "invalid { toml [").unwrap();

        let store = TomlFileStore::open(&path);
        assert_eq!(Preferences::load(&store), Preferences::default());
    }

    #[test]
    fn test_toml_store_set_persists() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");

        let mut store = TomlFileStore::open(&path);
        store.set(PrefKey::LaunchAtLogin, PrefValue::Bool(true)).unwrap();
        store.set(PrefKey::BaseFontSize, PrefValue::Int(16)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("launchAtLogin = true"));
        assert!(contents.contains("baseFontSize = 16"));
    }

    #[test]
    fn test_toml_store_ignores_unsupported_types() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");
        fs::write(&path, "baseFontSize = \"large\"\n").unwrap();

        let store = TomlFileStore::open(&path);
        assert!(store.get(PrefKey::BaseFontSize).is_none());
    }

    #[test]
    fn test_toml_store_preserves_unknown_keys() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");
        fs::write(&path, "lastSeenVersion = \"0.1.0\"\n").unwrap();

        let mut store = TomlFileStore::open(&path);
        store.set(PrefKey::Enabled, PrefValue::Bool(false)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("lastSeenVersion"));
        assert!(contents.contains("isEnabled = false"));
    }

    #[test]
    fn test_toml_store_reload_picks_up_outside_edits() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");

        let mut store = TomlFileStore::open(&path);
        store.set(PrefKey::Enabled, PrefValue::Bool(true)).unwrap();

        fs::write(&path, "isEnabled = false\n").unwrap();
        store.reload().unwrap();
        assert_eq!(store.get(PrefKey::Enabled), Some(PrefValue::Bool(false)));
    }

    #[test]
    fn test_toml_store_reload_invalid_keeps_previous_values() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.toml");

        let mut store = TomlFileStore::open(&path);
        store.set(PrefKey::Enabled, PrefValue::Bool(false)).unwrap();

        fs::write(&path, "isEnabled = ").unwrap();
        assert!(store.reload().is_err());
        assert_eq!(store.get(PrefKey::Enabled), Some(PrefValue::Bool(false)));
    }
}
