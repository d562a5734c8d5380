//! Declarative slot data model shared with the GUI layer.
//!
//! Slots are created and edited outside the core; a run receives a read-only
//! snapshot of them. The `TextureMap` is the only state that survives across
//! runs and must be handed back unchanged by the caller unless the previous
//! run reported success.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-slot synchronization mode.
///
/// `Managed` slots are actively uploaded/updated; `Ignored` slots are left
/// untouched but still occupy a position for diffing purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotMode {
    Managed,
    Ignored,
}

/// Numeric and boolean texture parameters for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotValues {
    pub size: f64,
    pub angle: f64,
    pub x_position: f64,
    pub y_position: f64,
    pub opacity: f64,
    #[serde(default)]
    pub h_flip: bool,
    #[serde(default)]
    pub v_flip: bool,
    #[serde(default)]
    pub h_repeat: bool,
    #[serde(default)]
    pub v_repeat: bool,
}

impl Default for SlotValues {
    /// Documented defaults of the target application's texture editor.
    fn default() -> Self {
        Self {
            size: 0.5,
            angle: 0.0,
            x_position: 0.5,
            y_position: 0.5,
            opacity: 1.0,
            h_flip: false,
            v_flip: false,
            h_repeat: false,
            v_repeat: false,
        }
    }
}

/// Declarative description of one fixed configuration slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub slot_id: u32,
    pub mode: SlotMode,
    pub group: Option<String>,
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub values: SlotValues,
    /// Synonyms the group lookup should also match, e.g. localized duplicates.
    #[serde(default)]
    pub alternate_groups: Vec<String>,
    /// Set by the caller when the slot's image content changed, the slot was
    /// newly assigned to its group, or a full run forces a refresh.
    #[serde(default)]
    pub is_updated: bool,
}

impl Slot {
    /// Whether this slot takes part in the upload/update phase.
    pub fn needs_management(&self) -> bool {
        self.mode == SlotMode::Managed && self.is_updated
    }
}

/// Persisted belief of what each group currently contains on screen, as an
/// ordered list of slot ids per group name.
pub type TextureMap = BTreeMap<String, Vec<u32>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_round_trips_through_json() {
        let slot = Slot {
            slot_id: 3,
            mode: SlotMode::Managed,
            group: Some("Skin".to_string()),
            image_path: Some(PathBuf::from("/tmp/tex.png")),
            values: SlotValues {
                size: 0.75,
                h_repeat: true,
                ..SlotValues::default()
            },
            alternate_groups: vec!["Haut".to_string()],
            is_updated: true,
        };

        let json = serde_json::to_string(&slot).unwrap();
        let back: Slot = serde_json::from_str(&json).unwrap();
        assert_eq!(back, slot);
    }

    #[test]
    fn missing_optional_fields_use_defaults() {
        let json = r#"{
            "slot_id": 0,
            "mode": "Ignored",
            "group": null,
            "image_path": null,
            "values": {"size": 0.5, "angle": 0.0, "x_position": 0.5,
                       "y_position": 0.5, "opacity": 1.0}
        }"#;
        let slot: Slot = serde_json::from_str(json).unwrap();
        assert!(!slot.is_updated);
        assert!(slot.alternate_groups.is_empty());
        assert!(!slot.values.h_flip);
        assert!(!slot.needs_management());
    }

    #[test]
    fn texture_map_round_trips_through_json() {
        let mut map = TextureMap::new();
        map.insert("Base".to_string(), vec![0, 2, 5]);
        map.insert("Detail".to_string(), vec![1]);

        let json = serde_json::to_string(&map).unwrap();
        let back: TextureMap = serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
