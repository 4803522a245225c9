//! Color palette and style constants for the station map.

use ratatui::style::{Color, Modifier, Style};

use station_proto::MarkerKind;

// ── Color palette ─────────────────────────────────────────────────────────────

pub const C_BG: Color = Color::Rgb(18, 18, 18);
pub const C_ACCENT: Color = Color::Rgb(255, 95, 95);
pub const C_FAST: Color = Color::Rgb(80, 200, 120);
pub const C_STANDARD: Color = Color::Rgb(115, 115, 138); // the muted "no DC fast charger" marker
pub const C_CLUSTER: Color = Color::Rgb(80, 160, 220);
pub const C_LOADING: Color = Color::Rgb(255, 184, 80);
pub const C_ERROR: Color = Color::Rgb(255, 80, 80);
pub const C_MUTED: Color = Color::Rgb(72, 72, 88);
pub const C_SECONDARY: Color = Color::Rgb(115, 115, 138);
pub const C_PRIMARY: Color = Color::Rgb(210, 210, 225);
pub const C_PANEL_BORDER: Color = Color::Rgb(40, 40, 52);
pub const C_POPUP_BORDER: Color = Color::Rgb(120, 100, 200);
pub const C_CROSSHAIR: Color = Color::Rgb(255, 200, 80);

// ── Predefined styles ─────────────────────────────────────────────────────────

pub fn style_default() -> Style {
    Style::default().fg(C_PRIMARY)
}

pub fn style_secondary() -> Style {
    Style::default().fg(C_SECONDARY)
}

pub fn style_muted() -> Style {
    Style::default().fg(C_MUTED)
}

pub fn style_border() -> Style {
    Style::default().fg(C_PANEL_BORDER)
}

pub fn style_popup_border() -> Style {
    Style::default().fg(C_POPUP_BORDER)
}

pub fn style_crosshair() -> Style {
    Style::default().fg(C_CROSSHAIR).add_modifier(Modifier::BOLD)
}

/// Crosshair over a clickable feature.
pub fn style_crosshair_hover() -> Style {
    Style::default()
        .fg(C_BG)
        .bg(C_ACCENT)
        .add_modifier(Modifier::BOLD)
}

pub fn style_marker(kind: MarkerKind) -> Style {
    match kind {
        MarkerKind::Cluster => Style::default().fg(C_CLUSTER).add_modifier(Modifier::BOLD),
        MarkerKind::FastCharger => Style::default().fg(C_FAST),
        MarkerKind::Standard => Style::default().fg(C_STANDARD),
    }
}
