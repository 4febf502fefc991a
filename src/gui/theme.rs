//! テーマ設定 - ダークテーマ

use egui::{Color32, CornerRadius, Stroke, Style, Visuals};

/// カラーパレット
pub struct Colors;

impl Colors {
    pub const BG_DARK: Color32 = Color32::from_rgb(12, 16, 24);
    pub const BG_CARD: Color32 = Color32::from_rgb(22, 28, 42);
    pub const BG_HOVER: Color32 = Color32::from_rgb(32, 42, 62);
    /// Word の青
    pub const ACCENT: Color32 = Color32::from_rgb(43, 121, 215);
    pub const TEXT_PRIMARY: Color32 = Color32::from_rgb(240, 244, 250);
    pub const TEXT_SECONDARY: Color32 = Color32::from_rgb(140, 156, 186);
    pub const SUCCESS: Color32 = Color32::from_rgb(74, 222, 128);
    pub const WARNING: Color32 = Color32::from_rgb(250, 204, 21);
    pub const ERROR: Color32 = Color32::from_rgb(248, 113, 113);
    pub const BORDER: Color32 = Color32::from_rgb(44, 56, 82);
}

/// ダークテーマのスタイルを作成
pub fn dark_theme() -> Style {
    let mut style = Style::default();
    let mut visuals = Visuals::dark();

    visuals.panel_fill = Colors::BG_DARK;
    visuals.window_fill = Colors::BG_CARD;
    visuals.extreme_bg_color = Colors::BG_DARK;
    visuals.faint_bg_color = Colors::BG_CARD;

    let radius = CornerRadius::same(6);
    for (widget, fill, text) in [
        (&mut visuals.widgets.noninteractive, Colors::BG_CARD, Colors::TEXT_SECONDARY),
        (&mut visuals.widgets.inactive, Colors::BG_CARD, Colors::TEXT_PRIMARY),
        (&mut visuals.widgets.hovered, Colors::BG_HOVER, Colors::TEXT_PRIMARY),
        (&mut visuals.widgets.active, Colors::ACCENT, Colors::TEXT_PRIMARY),
    ] {
        widget.bg_fill = fill;
        widget.weak_bg_fill = fill;
        widget.fg_stroke = Stroke::new(1.0, text);
        widget.corner_radius = radius;
    }

    visuals.selection.bg_fill = Colors::ACCENT.gamma_multiply(0.5);
    visuals.selection.stroke = Stroke::new(1.0, Colors::ACCENT);

    style.visuals = visuals;
    style
}
