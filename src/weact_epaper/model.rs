//! WeAct panel model table
//!
//! Every model key maps to exactly one driver family and one native model value.
//! The table is fixed; lookups go through [`PanelCatalog`] so the set of models
//! that need a reset line stays configurable.

use std::fmt;

/// Native model values understood by the family A driver
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeAModel {
    WeactEpaper1in54 = 0,
    WeactEpaper1in54V2,
    WeactEpaper2in13,
    WeactEpaper2in13V2,
    WeactEpaper2in9,
    WeactEpaper2in9V2,
    WeactEpaper4in2,
}

impl TypeAModel {
    /// Visible width in pixels
    pub fn width(self) -> u16 {
        match self {
            TypeAModel::WeactEpaper1in54 | TypeAModel::WeactEpaper1in54V2 => 200,
            TypeAModel::WeactEpaper2in13 | TypeAModel::WeactEpaper2in13V2 => 122,
            TypeAModel::WeactEpaper2in9 | TypeAModel::WeactEpaper2in9V2 => 128,
            TypeAModel::WeactEpaper4in2 => 400,
        }
    }

    /// Visible height in pixels
    pub fn height(self) -> u16 {
        match self {
            TypeAModel::WeactEpaper1in54 | TypeAModel::WeactEpaper1in54V2 => 200,
            TypeAModel::WeactEpaper2in13 | TypeAModel::WeactEpaper2in13V2 => 250,
            TypeAModel::WeactEpaper2in9 | TypeAModel::WeactEpaper2in9V2 => 296,
            TypeAModel::WeactEpaper4in2 => 300,
        }
    }

    /// Row width of the controller RAM, which is wider than the glass on 2.13" panels
    pub fn controller_width(self) -> u16 {
        match self {
            TypeAModel::WeactEpaper2in13 | TypeAModel::WeactEpaper2in13V2 => 128,
            _ => self.width(),
        }
    }

    /// Bytes needed for one black/white frame
    pub fn buffer_length(self) -> usize {
        self.controller_width() as usize * self.height() as usize / 8
    }

    /// How long to wait for BUSY to drop before giving up, in milliseconds
    pub fn idle_timeout_ms(self) -> u32 {
        match self {
            TypeAModel::WeactEpaper1in54
            | TypeAModel::WeactEpaper1in54V2
            | TypeAModel::WeactEpaper2in13V2
            | TypeAModel::WeactEpaper4in2 => 2500,
            _ => 1000,
        }
    }

    /// Models the vendor recommends putting to deep sleep between updates
    pub fn sleeps_between_updates(self) -> bool {
        matches!(
            self,
            TypeAModel::WeactEpaper1in54
                | TypeAModel::WeactEpaper1in54V2
                | TypeAModel::WeactEpaper4in2
        )
    }

    /// Label used in config dumps
    pub fn label(self) -> &'static str {
        match self {
            TypeAModel::WeactEpaper1in54 => "1.54in",
            TypeAModel::WeactEpaper1in54V2 => "1.54inV2",
            TypeAModel::WeactEpaper2in13 => "2.13in",
            TypeAModel::WeactEpaper2in13V2 => "2.13inV2",
            TypeAModel::WeactEpaper2in9 => "2.9in",
            TypeAModel::WeactEpaper2in9V2 => "2.9inV2",
            TypeAModel::WeactEpaper4in2 => "4.2in",
        }
    }
}

/// Driver family tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    A,
    B,
}

impl Family {
    /// Single letter tag used in messages
    pub fn tag(self) -> char {
        match self {
            Family::A => 'a',
            Family::B => 'b',
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Family plus the native value handed to that family's constructor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NativeModel {
    TypeA(TypeAModel),
    /// Second product line sharing the configuration surface, no driver yet
    TypeB(u8),
}

/// One row of the model table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelModel {
    /// Lower case configuration key, e.g. `"2.13inv2"`
    pub key: &'static str,
    pub native: NativeModel,
}

impl PanelModel {
    pub const fn new(key: &'static str, native: NativeModel) -> Self {
        Self { key, native }
    }

    pub fn family(&self) -> Family {
        match self.native {
            NativeModel::TypeA(_) => Family::A,
            NativeModel::TypeB(_) => Family::B,
        }
    }
}

impl fmt::Display for PanelModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key)
    }
}

/// Models shipped by WeAct
pub const MODELS: &[PanelModel] = &[
    PanelModel::new("1.54in", NativeModel::TypeA(TypeAModel::WeactEpaper1in54)),
    PanelModel::new("1.54inv2", NativeModel::TypeA(TypeAModel::WeactEpaper1in54V2)),
    PanelModel::new("2.13in", NativeModel::TypeA(TypeAModel::WeactEpaper2in13)),
    PanelModel::new("2.13inv2", NativeModel::TypeA(TypeAModel::WeactEpaper2in13V2)),
    PanelModel::new("2.90in", NativeModel::TypeA(TypeAModel::WeactEpaper2in9)),
    PanelModel::new("2.90inv2", NativeModel::TypeA(TypeAModel::WeactEpaper2in9V2)),
    PanelModel::new("4.20in", NativeModel::TypeA(TypeAModel::WeactEpaper4in2)),
];

/// Models that cannot run without a physical reset line
pub const RESET_PIN_REQUIRED_MODELS: &[&str] = &["2.13inv2"];

/// Model table together with the model dependent rules
#[derive(Debug, Clone)]
pub struct PanelCatalog {
    models: Vec<PanelModel>,
    reset_pin_required: Vec<&'static str>,
}

impl Default for PanelCatalog {
    fn default() -> Self {
        Self::new(MODELS, RESET_PIN_REQUIRED_MODELS)
    }
}

impl PanelCatalog {
    pub fn new(models: &[PanelModel], reset_pin_required: &[&'static str]) -> Self {
        Self {
            models: models.to_vec(),
            reset_pin_required: reset_pin_required.to_vec(),
        }
    }

    /// All models in table order
    pub fn models(&self) -> &[PanelModel] {
        &self.models
    }

    /// Case-insensitive lookup
    pub fn find(&self, key: &str) -> Option<PanelModel> {
        let key = key.to_lowercase();
        self.models.iter().copied().find(|m| m.key == key)
    }

    /// Every model key, sorted
    pub fn sorted_keys(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self.models.iter().map(|m| m.key).collect();
        keys.sort_unstable();
        keys
    }

    /// Sorted keys of the models belonging to `family`
    pub fn keys_in_family(&self, family: Family) -> Vec<&'static str> {
        let mut keys: Vec<_> = self
            .models
            .iter()
            .filter(|m| m.family() == family)
            .map(|m| m.key)
            .collect();
        keys.sort_unstable();
        keys
    }

    pub fn requires_reset_pin(&self, model: &PanelModel) -> bool {
        self.reset_pin_required.contains(&model.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_model_key_is_lower_case_and_unique() {
        let catalog = PanelCatalog::default();
        let keys = catalog.sorted_keys();
        let mut deduped = keys.clone();
        deduped.dedup();
        assert_eq!(keys.len(), deduped.len());
        for key in keys {
            assert_eq!(key, key.to_lowercase());
        }
    }

    #[test]
    fn test_family_lookup_is_stable() {
        let catalog = PanelCatalog::default();
        for model in MODELS {
            let first = catalog.find(model.key).map(|m| m.family());
            let second = catalog.find(model.key).map(|m| m.family());
            assert_eq!(first, Some(Family::A));
            assert_eq!(first, second);
        }
    }

    #[test]
    fn test_find_ignores_case() {
        let catalog = PanelCatalog::default();
        let model = catalog.find("2.13inV2").unwrap();
        assert_eq!(
            model.native,
            NativeModel::TypeA(TypeAModel::WeactEpaper2in13V2)
        );
        assert!(catalog.find("2.13inv3").is_none());
    }

    #[test]
    fn test_reset_pin_requirement() {
        let catalog = PanelCatalog::default();
        assert!(catalog.requires_reset_pin(&catalog.find("2.13inv2").unwrap()));
        assert!(!catalog.requires_reset_pin(&catalog.find("2.13in").unwrap()));
    }

    #[test]
    fn test_controller_is_wider_on_2in13() {
        let model = TypeAModel::WeactEpaper2in13;
        assert_eq!(model.width(), 122);
        assert_eq!(model.controller_width(), 128);
        assert_eq!(model.buffer_length(), 128 * 250 / 8);
        assert_eq!(TypeAModel::WeactEpaper4in2.buffer_length(), 15_000);
    }

    #[test]
    fn test_keys_in_family_are_sorted() {
        let catalog = PanelCatalog::new(
            &[
                PanelModel::new("4.20in", NativeModel::TypeA(TypeAModel::WeactEpaper4in2)),
                PanelModel::new("3.70in", NativeModel::TypeB(0)),
                PanelModel::new("1.54in", NativeModel::TypeA(TypeAModel::WeactEpaper1in54)),
            ],
            &[],
        );
        assert_eq!(catalog.keys_in_family(Family::A), vec!["1.54in", "4.20in"]);
        assert_eq!(catalog.keys_in_family(Family::B), vec!["3.70in"]);
    }
}
