//! egui settings window contents.
//!
//! Draws one control per preference and reports what the user changed as
//! [`PreferenceEdit`]s. The window itself (creation, input, visibility)
//! is managed in `app`.

use crate::prefs::Preferences;
use crate::state::PreferenceEdit;
use egui::{Color32, RichText, Slider};
use std::ops::RangeInclusive;

pub const SETTINGS_TITLE: &str = "MarkdownPaste Settings";
pub const SETTINGS_WIDTH: f32 = 380.0;
pub const SETTINGS_HEIGHT: f32 = 320.0;

const PADDING: f32 = 16.0;
const SECTION_GAP: f32 = 12.0;

/// Names for the sensitivity slider positions.
pub const SENSITIVITY_LEVELS: [&str; 5] = ["Off", "Low", "Medium", "High", "Aggressive"];

pub const FONT_SIZE_RANGE: RangeInclusive<i64> = 9..=32;

mod colors {
    use egui::Color32;

    pub const BG: Color32 = Color32::from_rgb(30, 30, 30);
    pub const TEXT: Color32 = Color32::from_rgb(228, 228, 228);
    pub const TEXT_MUTED: Color32 = Color32::from_rgb(136, 136, 136);
}

/// Display name for a sensitivity level. Values set outside the slider
/// range (by editing the preferences file) show as "Custom".
pub fn sensitivity_label(level: i64) -> &'static str {
    usize::try_from(level)
        .ok()
        .and_then(|i| SENSITIVITY_LEVELS.get(i))
        .copied()
        .unwrap_or("Custom")
}

fn section_header(ui: &mut egui::Ui, text: &str) {
    ui.label(
        RichText::new(text.to_uppercase())
            .color(colors::TEXT_MUTED)
            .size(11.0),
    );
}

fn checkbox(ui: &mut egui::Ui, value: bool, text: &str) -> Option<bool> {
    let mut value = value;
    let label = RichText::new(text).color(colors::TEXT);
    ui.checkbox(&mut value, label).changed().then_some(value)
}

/// Render the settings UI for `prefs`.
/// Returns the edits made during this frame, in the order they happened.
pub fn render_settings(ctx: &egui::Context, prefs: &Preferences) -> Vec<PreferenceEdit> {
    let mut edits = Vec::new();

    egui::CentralPanel::default()
        .frame(
            egui::Frame::none()
                .fill(colors::BG)
                .inner_margin(egui::Margin::same(PADDING)),
        )
        .show(ctx, |ui| {
            section_header(ui, "General");
            if let Some(v) = checkbox(ui, prefs.enabled, "Convert Markdown on the clipboard") {
                edits.push(PreferenceEdit::Enabled(v));
            }
            if let Some(v) = checkbox(ui, prefs.launch_at_login, "Launch at login") {
                edits.push(PreferenceEdit::LaunchAtLogin(v));
            }
            if let Some(v) = checkbox(ui, prefs.show_notifications, "Notify after each conversion") {
                edits.push(PreferenceEdit::ShowNotifications(v));
            }

            ui.add_space(SECTION_GAP);
            section_header(ui, "Detection");
            let mut sensitivity = prefs.detection_sensitivity;
            let max_level = SENSITIVITY_LEVELS.len() as i64 - 1;
            let response = ui.add(
                Slider::new(&mut sensitivity, 0..=max_level)
                    .text("Sensitivity")
                    .custom_formatter(|n, _| sensitivity_label(n as i64).to_string()),
            );
            if response.changed() {
                edits.push(PreferenceEdit::DetectionSensitivity(sensitivity));
            }

            ui.add_space(SECTION_GAP);
            section_header(ui, "Output");
            if let Some(v) = checkbox(ui, prefs.include_rtf, "Include RTF") {
                edits.push(PreferenceEdit::IncludeRtf(v));
            }
            let mut font_size = prefs.base_font_size;
            let response = ui.add(
                Slider::new(&mut font_size, FONT_SIZE_RANGE)
                    .text("Base font size")
                    .suffix(" pt"),
            );
            if response.changed() {
                edits.push(PreferenceEdit::BaseFontSize(font_size));
            }

            ui.add_space(SECTION_GAP);
            ui.label(
                RichText::new(format!("mdpaste {}", env!("CARGO_PKG_VERSION")))
                    .color(Color32::from_gray(90))
                    .size(10.0),
            );
        });

    edits
}
