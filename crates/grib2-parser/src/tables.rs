//! GRIB2 parameter and level lookup tables.
//!
//! Translates the numeric codes of sections 0 and 4 into the short names the
//! decode strategies match on ("REFL", "surface", ...).

use std::collections::HashMap;

/// Lookup key for parameter: (discipline, category, number)
pub type ParamKey = (u8, u8, u8);

/// Level description - either static text or a template with {value} placeholder
#[derive(Debug, Clone)]
pub enum LevelDescription {
    /// Static description (e.g., "surface")
    Static(String),
    /// Template with {value} placeholder (e.g., "{value} m above MSL")
    Template(String),
}

impl LevelDescription {
    /// Format the description, substituting `{value}` for templates.
    pub fn format(&self, value: u32) -> String {
        match self {
            LevelDescription::Static(s) => s.clone(),
            LevelDescription::Template(t) => t.replace("{value}", &value.to_string()),
        }
    }
}

/// Short name and level code lookups used by the GRIB2 reader.
#[derive(Debug, Clone, Default)]
pub struct Grib2Tables {
    /// (discipline, category, number) -> parameter short name
    parameters: HashMap<ParamKey, String>,
    /// level_type -> description pattern
    levels: HashMap<u8, LevelDescription>,
}

/// Level type code for the ground or water surface (Code Table 4.5).
pub const LEVEL_SURFACE: u8 = 1;

impl Grib2Tables {
    /// Create empty tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Tables covering the MRMS reflectivity products and the WMO radar codes.
    ///
    /// MRMS publishes its products under the local discipline 209.
    pub fn radar() -> Self {
        let mut tables = Self::new();

        // MRMS local tables (discipline 209)
        tables.add_parameter(209, 9, 0, "REFL".to_string());
        tables.add_parameter(209, 10, 0, "RALA".to_string());
        tables.add_parameter(209, 3, 0, "REFL".to_string());
        // WMO discipline 0, category 15 (radar) and 16 (forecast radar imagery)
        tables.add_parameter(0, 15, 1, "DZ".to_string());
        tables.add_parameter(0, 16, 195, "REFD".to_string());
        tables.add_parameter(0, 16, 196, "REFC".to_string());

        tables.add_level(LEVEL_SURFACE, LevelDescription::Static("surface".to_string()));
        tables.add_level(
            102,
            LevelDescription::Template("{value} m above MSL".to_string()),
        );
        tables.add_level(
            103,
            LevelDescription::Template("{value} m above ground".to_string()),
        );
        tables.add_level(
            200,
            LevelDescription::Static("entire atmosphere".to_string()),
        );

        tables
    }

    /// Add a parameter mapping
    pub fn add_parameter(&mut self, discipline: u8, category: u8, number: u8, name: String) {
        self.parameters.insert((discipline, category, number), name);
    }

    /// Add a level description mapping
    pub fn add_level(&mut self, level_type: u8, description: LevelDescription) {
        self.levels.insert(level_type, description);
    }

    /// Look up parameter short name by GRIB2 codes.
    ///
    /// Returns "P{discipline}_{category}_{number}" if not found.
    pub fn get_parameter_name(&self, discipline: u8, category: u8, number: u8) -> String {
        self.parameters
            .get(&(discipline, category, number))
            .cloned()
            .unwrap_or_else(|| format!("P{}_{}_{}", discipline, category, number))
    }

    /// Look up level description by type code and value.
    ///
    /// Returns "Level type {type} value {value}" if not found.
    pub fn get_level_description(&self, level_type: u8, level_value: u32) -> String {
        match self.levels.get(&level_type) {
            Some(desc) => desc.format(level_value),
            None => format!("Level type {} value {}", level_type, level_value),
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.parameters.len()
    }

    pub fn level_count(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty() && self.levels.is_empty()
    }
}
