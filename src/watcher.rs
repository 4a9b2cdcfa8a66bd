//! File watcher for the preferences file.
//!
//! Uses the `notify` crate to watch the directory holding the preferences
//! file and reports when that file is created, modified, or removed, so
//! edits made outside the app show up in the menu and settings window.

use anyhow::{Context, Result};
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::ffi::OsString;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, TryRecvError};

/// Watches the preferences file for outside changes.
pub struct PreferencesWatcher {
    /// The watcher instance (kept alive to maintain the watch)
    _watcher: RecommendedWatcher,
    /// Receiver for file system events
    receiver: Receiver<Result<Event, notify::Error>>,
    /// File name of the preferences file within the watched directory
    file_name: OsString,
}

impl PreferencesWatcher {
    /// Start watching `prefs_path`.
    ///
    /// The parent directory is watched rather than the file, since atomic
    /// writes replace the file. The directory is created if missing.
    pub fn new(prefs_path: &Path) -> Result<Self> {
        let dir = prefs_path
            .parent()
            .with_context(|| format!("Preferences path has no parent: {:?}", prefs_path))?;
        let file_name = prefs_path
            .file_name()
            .with_context(|| format!("Preferences path has no file name: {:?}", prefs_path))?
            .to_os_string();

        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create preferences directory: {:?}", dir))?;
        }

        let (tx, rx) = channel();

        let mut watcher = RecommendedWatcher::new(
            move |res| {
                // Receiver may be dropped
                let _ = tx.send(res);
            },
            Config::default(),
        )
        .context("Failed to create file watcher")?;

        watcher
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("Failed to watch preferences directory: {:?}", dir))?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            file_name,
        })
    }

    /// Drain pending events without blocking.
    ///
    /// Returns `true` if any of them touched the preferences file.
    pub fn poll_changes(&mut self) -> bool {
        let mut has_changes = false;

        loop {
            match self.receiver.try_recv() {
                Ok(Ok(event)) => {
                    if Self::is_relevant_event(&event, &self.file_name) {
                        has_changes = true;
                    }
                }
                Ok(Err(e)) => {
                    tracing::warn!("File watcher error: {}", e);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("File watcher channel disconnected");
                    break;
                }
            }
        }

        has_changes
    }

    /// Create, modify, and remove events naming the preferences file.
    fn is_relevant_event(event: &Event, file_name: &OsString) -> bool {
        use notify::EventKind;

        matches!(
            event.kind,
            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
        ) && event
            .paths
            .iter()
            .any(|p| p.file_name() == Some(file_name.as_os_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, ModifyKind, RemoveKind};
    use notify::EventKind;
    use std::fs;
    use std::path::PathBuf;
    use std::thread;
    use std::time::Duration;
    use tempfile::tempdir;

    fn event(kind: EventKind, path: &str) -> Event {
        Event {
            kind,
            paths: vec![PathBuf::from(path)],
            attrs: Default::default(),
        }
    }

    #[test]
    fn test_is_relevant_event() {
        let name = OsString::from("preferences.toml");

        let create = event(EventKind::Create(CreateKind::File), "/x/preferences.toml");
        assert!(PreferencesWatcher::is_relevant_event(&create, &name));

        let modify = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/x/preferences.toml",
        );
        assert!(PreferencesWatcher::is_relevant_event(&modify, &name));

        let remove = event(EventKind::Remove(RemoveKind::File), "/x/preferences.toml");
        assert!(PreferencesWatcher::is_relevant_event(&remove, &name));

        let access = event(EventKind::Access(AccessKind::Read), "/x/preferences.toml");
        assert!(!PreferencesWatcher::is_relevant_event(&access, &name));
    }

    #[test]
    fn test_other_files_are_ignored() {
        let name = OsString::from("preferences.toml");

        let config = event(EventKind::Create(CreateKind::File), "/x/config.toml");
        assert!(!PreferencesWatcher::is_relevant_event(&config, &name));

        let temp = event(
            EventKind::Create(CreateKind::File),
            "/x/preferences.toml.tmp",
        );
        assert!(!PreferencesWatcher::is_relevant_event(&temp, &name));
    }

    #[test]
    fn test_new_creates_missing_directory() {
        let temp_dir = tempdir().unwrap();
        let prefs_path = temp_dir.path().join("nested").join("preferences.toml");

        let _watcher = PreferencesWatcher::new(&prefs_path).unwrap();
        assert!(prefs_path.parent().unwrap().exists());
    }

    #[test]
    fn test_watcher_detects_write() {
        let temp_dir = tempdir().unwrap();
        let prefs_path = temp_dir.path().join("preferences.toml");

        let mut watcher = PreferencesWatcher::new(&prefs_path).unwrap();
        fs::write(&prefs_path, "isEnabled = false\n").unwrap();

        // Give the watcher time to deliver the event
        let mut detected = false;
        for _ in 0..20 {
            thread::sleep(Duration::from_millis(50));
            if watcher.poll_changes() {
                detected = true;
                break;
            }
        }
        assert!(detected, "Should have seen the preferences write");
    }
}
