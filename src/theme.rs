use ratatui::style::Color;

// Color palette structure
#[allow(dead_code)]
#[derive(Clone, Copy)]
pub struct Base16Palette {
    pub base_00: Color, // Background
    pub base_01: Color, // Lighter background
    pub base_02: Color, // Selection background
    pub base_03: Color, // Comments, invisibles
    pub base_04: Color, // Dark foreground
    pub base_05: Color, // Default foreground
    pub base_06: Color, // Light foreground
    pub base_07: Color, // Light background
    pub base_08: Color, // Red
    pub base_09: Color, // Orange
    pub base_0a: Color, // Yellow
    pub base_0b: Color, // Green
    pub base_0c: Color, // Cyan
    pub base_0d: Color, // Blue
    pub base_0e: Color, // Purple
    pub base_0f: Color, // Brown
}

const fn rgb(hex: u32) -> Color {
    Color::Rgb((hex >> 16) as u8, (hex >> 8) as u8, hex as u8)
}

// Oceanic Next theme
pub const OCEANIC_NEXT: Base16Palette = Base16Palette {
    base_00: rgb(0x1B2B34),
    base_01: rgb(0x343D46),
    base_02: rgb(0x4F5B66),
    base_03: rgb(0x65737E),
    base_04: rgb(0xA7ADBA),
    base_05: rgb(0xC0C5CE),
    base_06: rgb(0xCDD3DE),
    base_07: rgb(0xD8DEE9),
    base_08: rgb(0xEC5f67),
    base_09: rgb(0xF99157),
    base_0a: rgb(0xFAC863),
    base_0b: rgb(0x99C794),
    base_0c: rgb(0x5FB3B3),
    base_0d: rgb(0x6699CC),
    base_0e: rgb(0xC594C5),
    base_0f: rgb(0xAB7967),
};

pub fn current_theme() -> &'static Base16Palette {
    &OCEANIC_NEXT
}
