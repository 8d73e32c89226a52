use crate::config::{EngineConfig, LayoutConfig};

/// Approximate advance width of `ch` as a fraction of the font size.
pub(super) fn char_width_factor(ch: char) -> f32 {
    match ch {
        ' ' => 0.31,
        '.' | ',' | ':' | ';' | '|' | '!' | '\'' | '(' | ')' | '[' | ']' | '{' | '}' => 0.32,
        'i' | 'j' | 'l' | 'I' => 0.25,
        'f' | 't' | 'r' => 0.34,
        'm' | 'w' => 0.84,
        'M' | 'W' => 0.93,
        '@' | '#' | '%' | '&' => 0.95,
        '0'..='9' => 0.6,
        'A'..='Z' => 0.68,
        'a'..='z' => 0.57,
        c if is_wide(c) => 1.0,
        _ => 0.57,
    }
}

fn is_wide(ch: char) -> bool {
    matches!(ch as u32,
        0x1100..=0x115F
        | 0x2E80..=0xA4CF
        | 0xAC00..=0xD7A3
        | 0xF900..=0xFAFF
        | 0xFE30..=0xFE4F
        | 0xFF00..=0xFF60
        | 0x1F300..=0x1FAFF)
}

pub(super) fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n').map(str::trim).collect()
}

pub(super) fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().map(char_width_factor).sum::<f32>() * font_size
}

/// Box size for a label: width follows the widest line (clamped to at least the
/// configured node width and at most the usable canvas width), height is fixed.
pub(super) fn node_size_for_label(
    label: &str,
    layout: &LayoutConfig,
    engine: &EngineConfig,
) -> (f32, f32) {
    let widest = split_lines(label)
        .into_iter()
        .map(|line| text_width(line, engine.label_font_size))
        .fold(0.0f32, f32::max);
    let mut width = (widest + engine.label_padding * 2.0).max(layout.node_width);
    let max_width = layout.usable_width();
    if max_width >= layout.node_width {
        width = width.min(max_width);
    }
    (width, layout.node_height)
}
