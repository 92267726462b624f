//! Blend modes for compositing one layer over another.

use serde::{Deserialize, Serialize};

/// Blend mode for compositing layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u32)]
pub enum BlendMode {
    #[default]
    Normal = 0,
    Multiply = 1,
    Screen = 2,
    Add = 3,
    Difference = 4,
}

impl BlendMode {
    pub const ALL: [BlendMode; 5] = [
        Self::Normal,
        Self::Multiply,
        Self::Screen,
        Self::Add,
        Self::Difference,
    ];

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Normal => "Normal",
            Self::Multiply => "Multiply",
            Self::Screen => "Screen",
            Self::Add => "Add",
            Self::Difference => "Difference",
        }
    }

    /// Blend one normalized channel of `fg` onto `bg`, before alpha.
    #[inline]
    pub fn apply(self, bg: f32, fg: f32) -> f32 {
        match self {
            Self::Normal => fg,
            Self::Multiply => bg * fg,
            Self::Screen => 1.0 - (1.0 - bg) * (1.0 - fg),
            Self::Add => (bg + fg).min(1.0),
            Self::Difference => (bg - fg).abs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identities() {
        assert_eq!(BlendMode::Normal.apply(0.2, 0.7), 0.7);
        assert_eq!(BlendMode::Multiply.apply(1.0, 0.4), 0.4);
        assert_eq!(BlendMode::Screen.apply(0.0, 0.4), 0.4);
        assert_eq!(BlendMode::Add.apply(0.8, 0.8), 1.0);
        assert!((BlendMode::Difference.apply(0.25, 0.75) - 0.5).abs() < 1e-6);
    }
}
