//! Dashboard colours.
//! Usage:
//!   let theme = Theme::dark();
//!   let colour = theme.level(sample.memory_used_percent(), config.memory_threshold);

use ratatui::style::Color;

#[derive(Debug, Clone, Copy)]
pub struct Theme {
    pub primary: Color,
    pub secondary: Color,
    pub primary_background: Color,
    pub accent: Color,
    pub warning: Color,
    pub error: Color,
    pub success: Color,
    pub foreground: Color,
    pub background: Color,
    pub surface: Color,
}

impl Theme {
    pub const fn dark() -> Self {
        Self {
            primary: Color::from_u32(0x00ffff),
            secondary: Color::from_u32(0x008888),
            primary_background: Color::from_u32(0x225555),
            accent: Color::from_u32(0xffaa22),
            warning: Color::from_u32(0xffd700),
            error: Color::from_u32(0xff3030),
            success: Color::from_u32(0x00ff00),
            foreground: Color::from_u32(0xeeeeee),
            background: Color::from_u32(0x111111),
            surface: Color::from_u32(0x222222),
        }
    }

    /// Colour for a reading against its alert threshold: calm well below it,
    /// warning within the last tenth, error above it.
    pub fn level(&self, value: f64, threshold: f64) -> Color {
        if threshold <= 0.0 {
            return self.primary;
        }
        let ratio = value / threshold;
        if ratio > 1.0 {
            self.error
        } else if ratio > 0.9 {
            self.warning
        } else {
            self.primary
        }
    }

    /// Blend a colour towards black; `factor` 0.0 is unchanged, 1.0 is black.
    pub fn darken(color: Color, factor: f32) -> Color {
        let factor = factor.clamp(0.0, 1.0);
        match color {
            Color::Rgb(r, g, b) => {
                let scale = |c: u8| (c as f32 * (1.0 - factor)) as u8;
                Color::Rgb(scale(r), scale(g), scale(b))
            }
            _ => color,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_follows_threshold() {
        let theme = Theme::dark();
        assert_eq!(theme.level(50.0, 85.0), theme.primary);
        assert_eq!(theme.level(80.0, 85.0), theme.warning);
        assert_eq!(theme.level(88.75, 85.0), theme.error);
        assert_eq!(theme.level(10.0, 0.0), theme.primary);
    }

    #[test]
    fn darken_halves_channels() {
        assert_eq!(
            Theme::darken(Color::Rgb(255, 100, 0), 0.5),
            Color::Rgb(127, 50, 0)
        );
        assert_eq!(Theme::darken(Color::Red, 0.5), Color::Red);
    }
}
