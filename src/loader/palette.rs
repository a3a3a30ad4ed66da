//! Color assignment for segmentation classes.

use crate::render::Color;

/// Cycled for cell types without a built-in color.
pub const FALLBACK_PALETTE: [Color; 10] = [
    Color::rgb(255, 0, 0),     // red
    Color::rgb(0, 255, 0),     // green
    Color::rgb(0, 0, 255),     // blue
    Color::rgb(255, 255, 0),   // yellow
    Color::rgb(255, 0, 255),   // magenta
    Color::rgb(0, 255, 255),   // cyan
    Color::rgb(255, 128, 0),   // orange
    Color::rgb(128, 0, 255),   // purple
    Color::rgb(255, 192, 203), // pink
    Color::rgb(128, 128, 128), // gray
];

/// Distinguishable colors for common tissue classes, cycled by class id.
pub const TISSUE_PALETTE: [Color; 12] = [
    Color::rgb(255, 99, 71),   // tomato - tumor
    Color::rgb(144, 238, 144), // light green - stroma
    Color::rgb(135, 206, 235), // sky blue - necrosis
    Color::rgb(255, 218, 185), // peach - background/adipose
    Color::rgb(221, 160, 221), // plum - lymphocyte aggregate
    Color::rgb(240, 230, 140), // khaki - mucus
    Color::rgb(188, 143, 143), // rosy brown - blood
    Color::rgb(175, 238, 238), // pale turquoise - epithelium
    Color::rgb(255, 182, 193), // light pink - muscle
    Color::rgb(211, 211, 211), // light gray - cartilage
    Color::rgb(152, 251, 152), // pale green - nerve
    Color::rgb(255, 160, 122), // light salmon - other
];

/// Colors for cell-type names the models commonly emit.
const BUILTIN_CELL_COLORS: &[(&str, Color)] = &[
    ("neoplastic", Color::rgb(255, 0, 0)),
    ("tumor", Color::rgb(255, 0, 0)),
    ("inflammatory", Color::rgb(0, 255, 0)),
    ("lymphocyte", Color::rgb(0, 255, 0)),
    ("connective", Color::rgb(0, 128, 255)),
    ("stroma", Color::rgb(0, 128, 255)),
    ("dead", Color::rgb(160, 160, 160)),
    ("necrosis", Color::rgb(160, 160, 160)),
    ("epithelial", Color::rgb(255, 128, 0)),
];

/// Built-in color for a known cell-type name (case-insensitive substring
/// match, so "Neoplastic cells" still resolves).
pub fn cell_color(name: &str) -> Option<Color> {
    let lowered = name.to_ascii_lowercase();
    BUILTIN_CELL_COLORS
        .iter()
        .find(|(key, _)| lowered.contains(key))
        .map(|(_, color)| *color)
}

/// Fallback-palette color for the n-th unknown class.
pub fn fallback_color(index: usize) -> Color {
    FALLBACK_PALETTE[index % FALLBACK_PALETTE.len()]
}

/// Tissue-palette color for a class id.
pub fn tissue_color(class_id: i32) -> Color {
    TISSUE_PALETTE[class_id.rem_euclid(TISSUE_PALETTE.len() as i32) as usize]
}
