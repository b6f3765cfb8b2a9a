//! Theme selection.
//!
//! Only the variant is tracked here; how a variant looks is up to the
//! presentation layer.

// ============================================================================
// Theme Mode
// ============================================================================

/// Available theme variants, cycled in declaration order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ThemeMode {
    #[default]
    Dark,
    Light,
    Black,
}

impl ThemeMode {
    /// Parse a variant name from a string (case-insensitive).
    pub fn from_str_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Some(Self::Dark),
            "light" => Some(Self::Light),
            "black" => Some(Self::Black),
            _ => None,
        }
    }

    /// Cycle to the next variant: Dark → Light → Black → Dark.
    pub fn next(self) -> Self {
        match self {
            Self::Dark => Self::Light,
            Self::Light => Self::Black,
            Self::Black => Self::Dark,
        }
    }

    /// Human-readable name for status display.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dark => "Dark",
            Self::Light => "Light",
            Self::Black => "Black",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_order() {
        assert_eq!(ThemeMode::Dark.next(), ThemeMode::Light);
        assert_eq!(ThemeMode::Light.next(), ThemeMode::Black);
        assert_eq!(ThemeMode::Black.next(), ThemeMode::Dark);
    }

    #[test]
    fn test_from_str_name() {
        assert_eq!(ThemeMode::from_str_name("BLACK"), Some(ThemeMode::Black));
        assert_eq!(ThemeMode::from_str_name(" light "), Some(ThemeMode::Light));
        assert_eq!(ThemeMode::from_str_name("solarized"), None);
    }
}
