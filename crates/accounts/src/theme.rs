//! Player theme lookup.

use entities::Theme;

/// Resolves theme names to themes.
pub trait ThemeLookup: Send + Sync {
    /// Finds a theme by name.
    fn find(&self, name: &str) -> Option<Theme>;

    /// Lists every available theme.
    fn all(&self) -> Vec<Theme>;
}

const BUILTIN: [(&str, &str); 5] = [
    ("asciinema", "asciinema"),
    ("tango", "Tango"),
    ("solarized-dark", "Solarized Dark"),
    ("solarized-light", "Solarized Light"),
    ("monokai", "Monokai"),
];

/// The themes bundled with the player.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinThemes;

impl ThemeLookup for BuiltinThemes {
    fn find(&self, name: &str) -> Option<Theme> {
        BUILTIN
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(n, label)| Theme::new(*n, *label))
    }

    fn all(&self) -> Vec<Theme> {
        BUILTIN
            .iter()
            .map(|(n, label)| Theme::new(*n, *label))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_lookup() {
        let themes = BuiltinThemes;
        assert_eq!(themes.all().len(), 5);
        assert_eq!(
            themes.find("solarized-dark").map(|t| t.label),
            Some("Solarized Dark".to_string())
        );
        assert!(themes.find("Tango").is_none());
        assert!(themes.find("neon").is_none());
    }
}
