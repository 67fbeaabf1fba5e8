//! Drink presets and ABV helpers for custom drinks.

use crate::types::{DrinkAmount, ETHANOL_DENSITY_G_PER_ML, GRAMS_PER_STANDARD_DRINK};

/// ABV used when a custom drink's spirit or strength is unknown.
pub const FALLBACK_CUSTOM_ABV: f64 = 10.0;

/// Serving volume assumed when a drink has no ABV to derive one from.
pub const DEFAULT_SERVING_ML: f64 = 355.0;

/// (spirit, light, medium, strong) ABV for mixed custom drinks.
const CUSTOM_ABV_TABLE: &[(&str, f64, f64, f64)] = &[
    ("vodka", 7.0, 10.0, 13.0),
    ("rum", 7.0, 10.0, 13.0),
    ("tequila", 8.0, 12.0, 16.0),
    ("gin", 8.0, 12.0, 16.0),
    ("whiskey", 10.0, 14.0, 18.0),
    ("bourbon", 10.0, 14.0, 18.0),
    ("scotch", 10.0, 14.0, 18.0),
    ("brandy", 8.0, 12.0, 16.0),
    ("wine", 9.0, 12.0, 14.5),
    ("beer", 3.5, 5.0, 7.0),
];

/// Estimate ABV of a custom drink from its base spirit and perceived strength.
///
/// Unknown spirits or strengths fall back to [`FALLBACK_CUSTOM_ABV`].
pub fn estimate_custom_abv(spirit: &str, strength: &str) -> f64 {
    let spirit = spirit.trim().to_lowercase();
    let Some(&(_, light, medium, strong)) =
        CUSTOM_ABV_TABLE.iter().find(|(name, ..)| *name == spirit)
    else {
        return FALLBACK_CUSTOM_ABV;
    };
    match strength.trim().to_lowercase().as_str() {
        "light" => light,
        "medium" => medium,
        "strong" => strong,
        _ => FALLBACK_CUSTOM_ABV,
    }
}

/// Serving volume (mL, rounded) holding `standard_drinks` at `abv` percent.
pub fn volume_ml_from_standard_drinks(standard_drinks: f64, abv: f64) -> f64 {
    if abv <= 0.0 {
        return DEFAULT_SERVING_ML;
    }
    ((standard_drinks * GRAMS_PER_STANDARD_DRINK * 100.0) / (ETHANOL_DENSITY_G_PER_ML * abv))
        .round()
}

/// A quick-log drink option.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrinkPreset {
    pub label: &'static str,
    pub category: &'static str,
    pub standard_drinks: f64,
    pub abv: f64,
}

impl DrinkPreset {
    pub fn amount(&self) -> DrinkAmount {
        DrinkAmount::StandardDrinks(self.standard_drinks)
    }

    /// Serving volume the backend log should record for this preset.
    pub fn volume_ml(&self) -> f64 {
        volume_ml_from_standard_drinks(self.standard_drinks, self.abv)
    }

    /// Look a preset up by label, case-insensitively.
    pub fn find(label: &str) -> Option<&'static DrinkPreset> {
        PRESETS
            .iter()
            .find(|preset| preset.label.eq_ignore_ascii_case(label.trim()))
    }
}

/// Built-in quick-log drinks.
pub const PRESETS: &[DrinkPreset] = &[
    DrinkPreset {
        label: "BEER",
        category: "beer",
        standard_drinks: 1.0,
        abv: 5.0,
    },
    DrinkPreset {
        label: "WINE",
        category: "wine",
        standard_drinks: 1.0,
        abv: 12.0,
    },
    DrinkPreset {
        label: "SHOT",
        category: "spirits",
        standard_drinks: 1.0,
        abv: 40.0,
    },
    DrinkPreset {
        label: "COCKTAIL",
        category: "cocktail",
        standard_drinks: 1.5,
        abv: 15.0,
    },
    DrinkPreset {
        label: "SELTZER",
        category: "cider",
        standard_drinks: 0.8,
        abv: 5.0,
    },
    DrinkPreset {
        label: "CIDER",
        category: "cider",
        standard_drinks: 1.0,
        abv: 5.0,
    },
];

/// Backend drink category for a free-text label; unknown labels are cocktails.
pub fn category_for_label(label: &str) -> &'static str {
    DrinkPreset::find(label)
        .map(|preset| preset.category)
        .unwrap_or("cocktail")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_abv_lookup() {
        assert_eq!(estimate_custom_abv("Tequila", "strong"), 16.0);
        assert_eq!(estimate_custom_abv("wine", "STRONG"), 14.5);
        assert_eq!(estimate_custom_abv("beer", "light"), 3.5);
    }

    #[test]
    fn test_custom_abv_fallbacks() {
        assert_eq!(estimate_custom_abv("absinthe", "strong"), FALLBACK_CUSTOM_ABV);
        assert_eq!(estimate_custom_abv("vodka", "extreme"), FALLBACK_CUSTOM_ABV);
    }

    #[test]
    fn test_volume_from_standard_drinks() {
        // One 5% beer ~ 355 mL
        assert_eq!(volume_ml_from_standard_drinks(1.0, 5.0), 355.0);
        assert_eq!(volume_ml_from_standard_drinks(1.0, 40.0), 44.0);
        assert_eq!(volume_ml_from_standard_drinks(2.0, 0.0), DEFAULT_SERVING_ML);
    }

    #[test]
    fn test_presets() {
        let cocktail = DrinkPreset::find("cocktail").unwrap();
        assert_eq!(cocktail.standard_drinks, 1.5);
        assert_eq!(category_for_label("shot"), "spirits");
        assert_eq!(category_for_label("Seltzer"), "cider");
        assert_eq!(category_for_label("Negroni"), "cocktail");
        assert!(DrinkPreset::find("water").is_none());
    }
}
