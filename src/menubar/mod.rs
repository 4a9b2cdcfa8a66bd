//! Menubar module for mdpaste.
//!
//! `view` holds the platform-independent menu model and action dispatch;
//! the remaining modules wire it to the macOS tray, windows, and services.

pub mod view;

#[cfg(target_os = "macos")]
pub mod app;

#[cfg(target_os = "macos")]
pub mod menu;

#[cfg(target_os = "macos")]
pub mod platform;

#[cfg(target_os = "macos")]
pub mod renderer;

#[cfg(target_os = "macos")]
pub mod settings;
