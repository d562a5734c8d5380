//! Texture map bookkeeping.
//!
//! After a run the map must reflect exactly what the target application now
//! contains, without re-scanning the screen: a full run rebuilds it from
//! declared slot state, an incremental run derives it from the executed
//! removal/upload operations.

use std::collections::{BTreeMap, BTreeSet};

use crate::logging::Logger;
use crate::slots::{Slot, TextureMap};

/// Rebuild the map from declared slot state: every grouped slot, Managed or
/// Ignored, sorted by slot id.
pub fn compute_new_texture_map_from_ui(logger: &Logger, slots: &[Slot]) -> TextureMap {
    let mut new_map = TextureMap::new();
    for slot in slots {
        if let Some(group) = &slot.group {
            new_map.entry(group.clone()).or_default().push(slot.slot_id);
        }
    }
    for ids in new_map.values_mut() {
        ids.sort_unstable();
    }
    logger.line(format!("Computed new texture map from UI state: {new_map:?}"));
    new_map
}

/// Derive the map from the previous run's order: survivors keep their
/// positions, uploads append in upload order, emptied groups disappear.
pub fn compute_new_texture_map_from_ops(
    logger: &Logger,
    old_map: &TextureMap,
    removed_by_group: &BTreeMap<String, Vec<u32>>,
    uploaded_by_group: &BTreeMap<String, Vec<u32>>,
) -> TextureMap {
    let mut all_groups: BTreeSet<&String> = old_map.keys().collect();
    all_groups.extend(uploaded_by_group.keys());

    let mut new_map = TextureMap::new();
    for group_name in all_groups {
        let old_order = old_map.get(group_name).cloned().unwrap_or_default();
        let removed: BTreeSet<u32> = removed_by_group
            .get(group_name)
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        let uploaded = uploaded_by_group
            .get(group_name)
            .cloned()
            .unwrap_or_default();

        let mut new_order: Vec<u32> = old_order
            .into_iter()
            .filter(|slot_id| !removed.contains(slot_id))
            .collect();
        new_order.extend(uploaded);

        if !new_order.is_empty() {
            new_map.insert(group_name.clone(), new_order);
        }
    }
    logger.line(format!(
        "Computed new texture map from operations: {new_map:?}"
    ));
    new_map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::SlotMode;

    fn slot(slot_id: u32, group: Option<&str>, mode: SlotMode) -> Slot {
        Slot {
            slot_id,
            mode,
            group: group.map(str::to_string),
            image_path: None,
            values: Default::default(),
            alternate_groups: Vec::new(),
            is_updated: false,
        }
    }

    #[test]
    fn from_ui_groups_and_sorts_by_slot_id() {
        let slots = vec![
            slot(4, Some("Base"), SlotMode::Managed),
            slot(1, Some("Base"), SlotMode::Ignored),
            slot(2, Some("Detail"), SlotMode::Managed),
            slot(3, None, SlotMode::Managed),
        ];
        let map = compute_new_texture_map_from_ui(&Logger::stdout(), &slots);

        assert_eq!(map.get("Base"), Some(&vec![1, 4]));
        assert_eq!(map.get("Detail"), Some(&vec![2]));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn from_ops_removes_survivors_and_appends_uploads() {
        let mut old_map = TextureMap::new();
        old_map.insert("Base".to_string(), vec![0, 1, 2]);

        let mut removed = BTreeMap::new();
        removed.insert("Base".to_string(), vec![1]);
        let mut uploaded = BTreeMap::new();
        uploaded.insert("Base".to_string(), vec![5]);
        uploaded.insert("Detail".to_string(), vec![3]);

        let map =
            compute_new_texture_map_from_ops(&Logger::stdout(), &old_map, &removed, &uploaded);

        assert_eq!(map.get("Base"), Some(&vec![0, 2, 5]));
        assert_eq!(map.get("Detail"), Some(&vec![3]));
    }

    #[test]
    fn emptied_groups_disappear_from_the_map() {
        let mut old_map = TextureMap::new();
        old_map.insert("Base".to_string(), vec![0]);

        let mut removed = BTreeMap::new();
        removed.insert("Base".to_string(), vec![0]);

        let map = compute_new_texture_map_from_ops(
            &Logger::stdout(),
            &old_map,
            &removed,
            &BTreeMap::new(),
        );
        assert!(map.is_empty());
    }

    #[test]
    fn from_ui_then_empty_ops_is_identity() {
        let slots = vec![
            slot(0, Some("Base"), SlotMode::Ignored),
            slot(1, Some("Base"), SlotMode::Managed),
            slot(2, Some("Detail"), SlotMode::Managed),
        ];
        let logger = Logger::stdout();
        let from_ui = compute_new_texture_map_from_ui(&logger, &slots);
        let from_ops = compute_new_texture_map_from_ops(
            &logger,
            &from_ui,
            &BTreeMap::new(),
            &BTreeMap::new(),
        );
        assert_eq!(from_ui, from_ops);
    }
}
