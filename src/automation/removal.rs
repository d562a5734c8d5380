//! Removal phase: clearing textures the declared configuration no longer
//! wants, by on-screen position.
//!
//! Full removal trusts only the declared slots; fast removal diffs against
//! the persisted texture map and refuses to touch a group whose on-screen
//! count no longer matches the record (the user changed it manually).

use std::collections::{BTreeMap, BTreeSet};

use crate::automation::groups;
use crate::automation::session::WorkflowSession;
use crate::automation::textures::remove_texture;
use crate::error::{AutomationError, AutomationResult};
use crate::slots::{Slot, SlotMode, TextureMap};
use crate::vision::geometry::Point;

/// Remove every texture whose position is not covered by an `Ignored` slot,
/// for all groups referenced by any slot. Declarative intent fully
/// overrides on-screen state.
pub fn process_removals_full(session: &mut WorkflowSession, slots: &[Slot]) -> AutomationResult<()> {
    session
        .logger
        .line("\n--- Phase 1: Processing removals for a Full Apply/First Run ---");

    let mut slots_by_group: BTreeMap<String, Vec<Slot>> = BTreeMap::new();
    for slot in slots {
        if let Some(group) = &slot.group {
            slots_by_group.entry(group.clone()).or_default().push(slot.clone());
        }
    }
    for group_slots in slots_by_group.values_mut() {
        group_slots.sort_by_key(|s| s.slot_id);
    }

    let group_names: Vec<String> = slots_by_group.keys().cloned().collect();
    for group_name in group_names {
        session.check_for_stop()?;
        session
            .logger
            .line(format!("\nScanning group for removal: '{group_name}'"));
        let slots_in_group = slots_by_group.get(&group_name).cloned().unwrap_or_default();

        let (header, arrow) =
            match groups::find_and_expand_group(session, &group_name, &slots_in_group) {
                Ok(found) => found,
                Err(AutomationError::Visibility { .. }) => {
                    session.logger.line(format!(
                        "  - Could not find group '{group_name}'. Assuming it's empty."
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };

        let on_screen = groups::textures_in_group(session, header, arrow)?;
        if on_screen.is_empty() {
            session
                .logger
                .line("  - Group is empty in web app. No removals needed.");
            continue;
        }

        let positions_to_remove = plan_full_removal(&slots_in_group, on_screen.len());
        session.logger.line(format!(
            "  - UI specifies {} slots for this group.",
            slots_in_group.len()
        ));
        if positions_to_remove.is_empty() {
            session
                .logger
                .line("  - No removals needed for this group based on 'Ignored' slots.");
            continue;
        }
        for &position in &positions_to_remove {
            session.logger.line(format!(
                "  - Marking texture at position {} for removal. {}",
                position, on_screen[position]
            ));
        }
        execute_removals(session, &group_name, &on_screen, &positions_to_remove)?;
    }
    Ok(())
}

/// Diff against the previous texture map, scanning only groups that changed
/// and refusing per-group when the on-screen count disagrees with the
/// record. Returns the slot ids removed per group.
pub fn process_removals_fast(
    session: &mut WorkflowSession,
    slots: &[Slot],
    old_map: &TextureMap,
) -> AutomationResult<BTreeMap<String, Vec<u32>>> {
    session
        .logger
        .line("\n--- Phase 1: Processing removals for a Fast Apply ---");
    if old_map.is_empty() {
        session.logger.line(
            "  - No previous texture map found. Cannot perform Fast Apply removals safely.",
        );
        return Err(AutomationError::FastApply {
            description: "No previous texture map available for Fast Apply".to_string(),
        });
    }

    let mut removed_by_group: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for (group_name, previous_order) in old_map {
        session.check_for_stop()?;

        if !group_needs_scan(previous_order, slots, group_name) {
            session.logger.line(format!(
                "\nSkipping removal scan for group '{group_name}': No updated or moved-out slots found."
            ));
            continue;
        }

        session
            .logger
            .line(format!("\nScanning group for removal: '{group_name}'"));
        let slots_for_group: Vec<Slot> = slots
            .iter()
            .filter(|s| s.group.as_deref() == Some(group_name))
            .cloned()
            .collect();

        let (header, arrow) =
            match groups::find_and_expand_group(session, group_name, &slots_for_group) {
                Ok(found) => found,
                Err(AutomationError::Visibility { .. }) => {
                    session.logger.line(format!(
                        "  - Warning: Could not find group '{group_name}'. Skipping."
                    ));
                    continue;
                }
                Err(e) => return Err(e),
            };

        let on_screen = groups::textures_in_group(session, header, arrow)?;
        let Some(plan) = plan_fast_group_after_scan(previous_order, slots, group_name, on_screen.len())
        else {
            session.logger.line(format!(
                "  - WARNING: Mismatch between expected textures ({}) and found textures ({}) in group '{}'. \
                 The user may have manually changed textures. Aborting removal for this group to be safe.",
                previous_order.len(),
                on_screen.len(),
                group_name
            ));
            continue;
        };
        if plan.is_empty() {
            continue;
        }
        for (_, slot_id) in &plan {
            let reason = match slots.iter().find(|s| s.slot_id == *slot_id) {
                Some(slot) if slot.group.as_deref() == Some(group_name) => "is Managed and updated",
                _ => "no longer in group",
            };
            session.logger.line(format!(
                "  - Slot {} {}. Marking for removal.",
                slot_id + 1,
                reason
            ));
        }

        let positions: Vec<usize> = plan.iter().map(|(position, _)| *position).collect();
        execute_removals(session, group_name, &on_screen, &positions)?;
        removed_by_group.insert(
            group_name.clone(),
            plan.into_iter().map(|(_, slot_id)| slot_id).collect(),
        );
    }
    Ok(removed_by_group)
}

/// Positions to remove for a full apply: every on-screen position whose
/// same-index declared slot (sorted by slot id) is not `Ignored`.
pub fn plan_full_removal(slots_in_group: &[Slot], on_screen_count: usize) -> Vec<usize> {
    let keep: BTreeSet<usize> = slots_in_group
        .iter()
        .enumerate()
        .filter(|(_, slot)| slot.mode == SlotMode::Ignored)
        .map(|(position, _)| position)
        .collect();
    (0..on_screen_count)
        .filter(|position| !keep.contains(position))
        .collect()
}

/// Whether a previously recorded group requires an on-screen scan: true if
/// any recorded slot left the group or is a re-uploaded `Managed` slot.
pub fn group_needs_scan(previous_order: &[u32], slots: &[Slot], group_name: &str) -> bool {
    previous_order.iter().any(|slot_id| {
        match slots.iter().find(|s| s.slot_id == *slot_id) {
            None => true,
            Some(slot) => {
                slot.group.as_deref() != Some(group_name)
                    || (slot.mode == SlotMode::Managed && slot.is_updated)
            }
        }
    })
}

/// Per-group decision after the on-screen scan of a fast apply. Returns
/// `None` when the on-screen count disagrees with the record, in which case
/// no removal may be issued for the group: position-based removal would
/// delete the wrong item.
pub fn plan_fast_group_after_scan(
    previous_order: &[u32],
    slots: &[Slot],
    group_name: &str,
    on_screen_count: usize,
) -> Option<Vec<(usize, u32)>> {
    if on_screen_count != previous_order.len() {
        return None;
    }
    Some(plan_fast_removal(previous_order, slots, group_name))
}

/// `(position, slot_id)` pairs to remove during a fast apply: recorded
/// positions whose slot left the group or is a re-uploaded `Managed` slot.
pub fn plan_fast_removal(
    previous_order: &[u32],
    slots: &[Slot],
    group_name: &str,
) -> Vec<(usize, u32)> {
    previous_order
        .iter()
        .enumerate()
        .filter(|(_, slot_id)| {
            match slots.iter().find(|s| s.slot_id == **slot_id) {
                None => true,
                Some(slot) => {
                    slot.group.as_deref() != Some(group_name)
                        || (slot.mode == SlotMode::Managed && slot.is_updated)
                }
            }
        })
        .map(|(position, slot_id)| (position, *slot_id))
        .collect()
}

/// Execute removals highest position first so earlier removals never shift
/// the indices of not-yet-removed items.
fn execute_removals(
    session: &mut WorkflowSession,
    group_name: &str,
    on_screen: &[Point],
    positions: &[usize],
) -> AutomationResult<()> {
    session.logger.line(format!(
        "\nExecuting {} removals for group '{}'",
        positions.len(),
        group_name
    ));
    let mut ordered: Vec<usize> = positions.to_vec();
    ordered.sort_unstable();
    for &position in ordered.iter().rev() {
        session.check_for_stop()?;
        remove_texture(session, on_screen[position])?;
        session.sleep(session.config.post_removal_delay)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(slot_id: u32, group: Option<&str>, mode: SlotMode, is_updated: bool) -> Slot {
        Slot {
            slot_id,
            mode,
            group: group.map(str::to_string),
            image_path: None,
            values: Default::default(),
            alternate_groups: Vec::new(),
            is_updated,
        }
    }

    #[test]
    fn full_removal_keeps_only_ignored_positions() {
        // Slots [{0,G,Ignored},{1,G,Managed}], two on-screen items:
        // only position 1 is removed.
        let slots = vec![
            slot(0, Some("G"), SlotMode::Ignored, false),
            slot(1, Some("G"), SlotMode::Managed, false),
        ];
        assert_eq!(plan_full_removal(&slots, 2), vec![1]);
    }

    #[test]
    fn full_removal_clears_extra_onscreen_positions() {
        let slots = vec![slot(0, Some("G"), SlotMode::Ignored, false)];
        // Three items on screen, only position 0 is declared Ignored
        assert_eq!(plan_full_removal(&slots, 3), vec![1, 2]);
    }

    #[test]
    fn full_removal_of_unreferenced_group_clears_everything() {
        assert_eq!(plan_full_removal(&[], 2), vec![0, 1]);
    }

    #[test]
    fn scan_skipped_when_nothing_changed() {
        let slots = vec![
            slot(0, Some("G"), SlotMode::Managed, false),
            slot(1, Some("G"), SlotMode::Ignored, false),
        ];
        assert!(!group_needs_scan(&[0, 1], &slots, "G"));
    }

    #[test]
    fn scan_needed_when_a_slot_moved_out_or_updated() {
        let moved = vec![
            slot(0, Some("H"), SlotMode::Managed, false),
            slot(1, Some("G"), SlotMode::Ignored, false),
        ];
        assert!(group_needs_scan(&[0, 1], &moved, "G"));

        let updated = vec![
            slot(0, Some("G"), SlotMode::Managed, true),
            slot(1, Some("G"), SlotMode::Ignored, false),
        ];
        assert!(group_needs_scan(&[0, 1], &updated, "G"));

        let deleted = vec![slot(1, Some("G"), SlotMode::Ignored, false)];
        assert!(group_needs_scan(&[0, 1], &deleted, "G"));
    }

    #[test]
    fn fast_plan_marks_moved_and_updated_slots_by_position() {
        let slots = vec![
            slot(0, Some("G"), SlotMode::Managed, false), // unchanged, stays
            slot(1, Some("H"), SlotMode::Managed, false), // moved to H
            slot(2, Some("G"), SlotMode::Managed, true),  // re-uploaded
        ];
        let plan = plan_fast_removal(&[0, 1, 2], &slots, "G");
        assert_eq!(plan, vec![(1, 1), (2, 2)]);
    }

    #[test]
    fn count_mismatch_blocks_the_whole_group() {
        // Previous map records [0,1,2] for "G" but only 2 items are on
        // screen: no removal may be issued for that group.
        let slots = vec![slot(0, Some("H"), SlotMode::Managed, false)];
        assert_eq!(plan_fast_group_after_scan(&[0, 1, 2], &slots, "G", 2), None);
        // Matching counts go through to the positional plan
        let plan = plan_fast_group_after_scan(&[0, 1, 2], &slots, "G", 3).unwrap();
        assert_eq!(plan, vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn ignored_slots_survive_fast_removal() {
        let slots = vec![slot(0, Some("G"), SlotMode::Ignored, true)];
        assert!(plan_fast_removal(&[0], &slots, "G").is_empty());
    }

    #[test]
    fn reverse_order_execution_removes_the_original_positions() {
        // Items at positions [0,1,2,3], removal set {1,3}: removing highest
        // index first must delete exactly the originals at 1 and 3.
        let mut items = vec!["a", "b", "c", "d"];
        let mut removed = Vec::new();
        let mut positions = vec![1usize, 3];
        positions.sort_unstable();
        for &position in positions.iter().rev() {
            removed.push(items.remove(position));
        }
        assert_eq!(removed, vec!["d", "b"]);
        assert_eq!(items, vec!["a", "c"]);
    }
}
