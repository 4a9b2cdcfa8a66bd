//! Native tray menu for the mdpaste menubar app.
//!
//! Renders the entries from [`view::menu_entries`](super::view::menu_entries)
//! into a `tray_icon` menu. Item IDs come from [`MenuAction::id`], so menu
//! events map straight back to actions.

use crate::menubar::view::{MenuAction, MenuEntry};
use tray_icon::menu::accelerator::{Accelerator, Code, Modifiers};
use tray_icon::menu::{CheckMenuItem, Menu, MenuItem, PredefinedMenuItem};

/// Prefix for informational rows (followed by the row index).
pub const LABEL_PREFIX: &str = "label:";

/// Build the tray menu from rendered entries.
pub fn build_menu(entries: &[MenuEntry]) -> Menu {
    let menu = Menu::new();

    for (index, entry) in entries.iter().enumerate() {
        match entry {
            MenuEntry::Action {
                action,
                title,
                checked: Some(checked),
            } => {
                let item = CheckMenuItem::with_id(
                    action.id(),
                    title,
                    true,
                    *checked,
                    Some(accelerator(*action)),
                );
                let _ = menu.append(&item);
            }
            MenuEntry::Action {
                action,
                title,
                checked: None,
            } => {
                let item = MenuItem::with_id(action.id(), title, true, Some(accelerator(*action)));
                let _ = menu.append(&item);
            }
            MenuEntry::Label(text) => {
                let label = MenuItem::with_id(
                    format!("{}{}", LABEL_PREFIX, index),
                    text,
                    false, // disabled - acts as label
                    None::<Accelerator>,
                );
                let _ = menu.append(&label);
            }
            MenuEntry::Separator => {
                let _ = menu.append(&PredefinedMenuItem::separator());
            }
        }
    }

    menu
}

/// Command-key accelerator for an action.
fn accelerator(action: MenuAction) -> Accelerator {
    Accelerator::new(Some(Modifiers::SUPER), key_code(action))
}

fn key_code(action: MenuAction) -> Code {
    match action {
        MenuAction::ToggleEnabled => Code::KeyE,
        MenuAction::OpenSettings => Code::Comma,
        MenuAction::Quit => Code::KeyQ,
    }
}
