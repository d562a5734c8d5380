//! Upload and parameter-setting phase, plus the low-level removal primitive.
//!
//! Parameters within epsilon of their documented default are skipped to
//! avoid triggering spurious edits. The file path travels via the clipboard
//! with read-back verification and a typing fallback; the previous clipboard
//! contents are restored around the operation regardless of outcome.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use enigo::Key;

use crate::automation::groups;
use crate::automation::session::WorkflowSession;
use crate::error::{AutomationError, AutomationResult};
use crate::slots::{Slot, SlotValues};
use crate::vision::geometry::{Point, Region};

/// Bounded wait for the pasted path to read back from the clipboard.
const CLIPBOARD_VERIFY_TIMEOUT: Duration = Duration::from_millis(500);

/// Upload every slot in `slots_to_manage` and apply its parameters.
/// Returns the uploaded slot ids per group, in upload order.
pub fn manage_textures(
    session: &mut WorkflowSession,
    slots_to_manage: &[Slot],
) -> AutomationResult<BTreeMap<String, Vec<u32>>> {
    session
        .logger
        .line("\n--- Phase 2: Managing textures (upload/update) ---");
    let mut uploaded_by_group: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    if slots_to_manage.is_empty() {
        session
            .logger
            .line("  - No updated textures to manage in this run. Skipping phase.");
        return Ok(uploaded_by_group);
    }

    for (index, slot) in slots_to_manage.iter().enumerate() {
        let is_last_slot = index == slots_to_manage.len() - 1;
        session.check_for_stop()?;

        let (Some(group), Some(image_path)) = (slot.group.clone(), slot.image_path.clone()) else {
            continue;
        };
        session
            .logger
            .line(format!("\nProcessing texture: {}", image_path.display()));

        let (header, _arrow) =
            groups::find_and_expand_group(session, &group, std::slice::from_ref(slot))?;
        session.check_for_stop()?;
        upload_texture_to_group(session, header, &image_path)?;
        session.sleep(session.config.post_upload_finish_delay)?;
        session.check_for_stop()?;
        apply_texture_settings(session, &slot.values, is_last_slot)?;

        uploaded_by_group.entry(group).or_default().push(slot.slot_id);
    }
    Ok(uploaded_by_group)
}

/// Remove one texture item: select it, open its context menu, confirm the
/// removal dialog. Every wait has its own bounded timeout.
pub fn remove_texture(session: &mut WorkflowSession, item: Point) -> AutomationResult<()> {
    session.check_for_stop()?;
    let selection_point = Point::new(item.x, item.y - 10);
    session.controller.click(selection_point)?;

    let more_button_region = Region::new(item.x, item.y - 100, 200, 100);
    session.logger.line(format!(
        "More Button Search Region: {more_button_region}"
    ));
    let menu_timeout = session.config.menu_timeout;
    let more_button =
        session.wait_for_element("more_button", menu_timeout, None, Some(more_button_region), 0.8)?;
    session.controller.click(more_button)?;

    let remove_button = session.wait_for_element("remove_button", menu_timeout, None, None, 0.8)?;
    session.controller.click(remove_button)?;

    let dialog_timeout = session.config.dialog_timeout;
    let confirm_button = session.wait_for_element(
        "remove_confirm_button",
        dialog_timeout,
        Some("remove_confirm_dialog"),
        None,
        0.8,
    )?;
    session.controller.click(confirm_button)
}

/// Click the group's upload affordance and feed the file chooser the
/// absolute image path.
pub fn upload_texture_to_group(
    session: &mut WorkflowSession,
    header: Region,
    image_path: &Path,
) -> AutomationResult<()> {
    session.check_for_stop()?;
    session.logger.line(format!(
        "  - Action: Uploading '{}' to group.",
        image_path.display()
    ));

    let app_region = session
        .vision
        .app_region()
        .ok_or_else(|| AutomationError::Visibility {
            description: "App region not set; cannot locate upload button".to_string(),
        })?;
    let search_region = Region::new(
        header.left,
        header.top,
        400,
        app_region.bottom() - header.top,
    );
    let upload_button = session
        .vision
        .find_image("group_upload_button", Some(search_region), 0.8)?
        .ok_or_else(|| AutomationError::Visibility {
            description: "Could not find group upload button".to_string(),
        })?;
    session.controller.click(upload_button)?;

    let choose_file = session.wait_for_element(
        "choose_file_button",
        session.config.choose_file_timeout,
        None,
        None,
        0.8,
    )?;
    session.controller.click(choose_file)?;
    session.logger.line(format!(
        "  - Waiting {:.1} seconds for dialog to appear.",
        session.config.post_upload_dialog_delay.as_secs_f64()
    ));
    session.sleep(session.config.post_upload_dialog_delay)?;

    let real_path = std::fs::canonicalize(image_path)
        .unwrap_or_else(|_| image_path.to_path_buf())
        .to_string_lossy()
        .into_owned();
    supply_file_path(session, &real_path)
}

/// Paste the path via the clipboard, verified by reading it back; fall back
/// to slow typing when verification fails. The clipboard's prior contents
/// are restored either way.
fn supply_file_path(session: &mut WorkflowSession, real_path: &str) -> AutomationResult<()> {
    session
        .logger
        .line("  - Using robust clipboard paste for file path.");
    let saved_clipboard = session.clipboard.get_text().unwrap_or(None);

    let paste_result = clipboard_paste(session, real_path);
    let outcome = match paste_result {
        Ok(()) => Ok(()),
        Err(e) if e.is_stop() => Err(e),
        Err(e) => {
            session.logger.line(format!(
                "  - Clipboard paste method failed: {e}. Falling back to slower typing method."
            ));
            session
                .controller
                .type_text_slow(real_path, Duration::from_millis(10))
                .and_then(|()| session.controller.press(Key::Return))
        }
    };

    if let Some(previous) = saved_clipboard
        && session.clipboard.set_text(&previous).is_ok()
    {
        session.logger.line("  - Original clipboard content restored.");
    }
    outcome
}

fn clipboard_paste(session: &mut WorkflowSession, real_path: &str) -> AutomationResult<()> {
    session.clipboard.set_text(real_path)?;

    // Read the clipboard back before trusting the paste
    let deadline = Instant::now() + CLIPBOARD_VERIFY_TIMEOUT;
    loop {
        session.check_for_stop()?;
        if session.clipboard.get_text()?.as_deref() == Some(real_path) {
            break;
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::ClipboardFailed {
                description: "Clipboard content did not verify after copy".to_string(),
            });
        }
        session.sleep(Duration::from_millis(50))?;
    }

    let modifier = crate::input::InputController::paste_modifier();
    session.controller.hotkey(modifier, Key::Unicode('v'))?;
    session.sleep(session.config.post_paste_delay)?;
    session.controller.press(Key::Return)
}

/// Apply numeric and boolean parameters after an upload.
pub fn apply_texture_settings(
    session: &mut WorkflowSession,
    values: &SlotValues,
    is_last_slot: bool,
) -> AutomationResult<()> {
    session.check_for_stop()?;
    session.logger.line("  - Action: Applying texture settings.");
    let mut last_set_entry: Option<Point> = None;

    // Make sure both settings panels are open before touching inputs
    for panel_icon in ["adjust_panel_icon", "repeat_panel_icon"] {
        let icon = session
            .vision
            .find_image_with_cache(panel_icon, panel_icon, None, 0.8)?;
        if let Some(icon) = icon {
            let search_region = Region::new(icon.x + 50, icon.y - 10, 300, 40);
            if let Some(collapsed) =
                session
                    .vision
                    .find_image("panel_collapsed", Some(search_region), 0.8)?
            {
                session.controller.click(collapsed)?;
            }
        }
    }

    let defaults = session.config.default_values.clone();
    let epsilon = session.config.value_epsilon;
    let scalar_params = [
        ("size", "size_input", values.size, defaults.size),
        ("angle", "angle_input", values.angle, defaults.angle),
        ("opacity", "opacity_input", values.opacity, defaults.opacity),
    ];
    for (key, template_name, target, default) in scalar_params {
        if !needs_update(target, default, epsilon) {
            session.logger.line(format!(
                "  - Skipping '{key}' as its value ({target:.3}) matches the default."
            ));
            continue;
        }
        let (_, entry) = set_parameter_value(session, key, template_name, target, None)?;
        last_set_entry = Some(entry);
    }

    // X is resolved before Y; Y's search region hangs off X's location
    session
        .logger
        .line("  - Setting X and Y positions with stricter logic...");
    let x_pos_coords = if !needs_update(values.x_position, defaults.x_position, epsilon) {
        session.logger.line(format!(
            "  - Skipping 'x_position' as its value ({:.3}) matches the default.",
            values.x_position
        ));
        session.vision.find_image("x_pos_input", None, 0.8)?
    } else {
        let (label, entry) =
            set_parameter_value(session, "x_position", "x_pos_input", values.x_position, None)?;
        last_set_entry = Some(entry);
        Some(label)
    };

    if let Some(x_coords) = x_pos_coords {
        let y_search_region = Region::new(x_coords.x - 150, x_coords.y + 5, 300, 75);
        if !needs_update(values.y_position, defaults.y_position, epsilon) {
            session.logger.line(format!(
                "  - Skipping 'y_position' as its value ({:.3}) matches the default.",
                values.y_position
            ));
        } else {
            let (_, entry) = set_parameter_value(
                session,
                "y_position",
                "y_pos_input",
                values.y_position,
                Some(y_search_region),
            )?;
            last_set_entry = Some(entry);
        }
    } else {
        session
            .logger
            .line("  - Skipping Y position because X position was not found.");
    }

    if is_last_slot {
        // The target app only commits the final numeric edit once focus
        // moves, so nudge it with one extra click next to the field
        if let Some(entry) = last_set_entry {
            session
                .logger
                .line("  - Applying final click to confirm last input.");
            session
                .controller
                .click(Point::new(entry.x - 30, entry.y))?;
        } else {
            session.logger.line(
                "  - No numeric parameters were set for the last slot, skipping final confirmation click.",
            );
        }
    }

    let toggles = [
        ("h_flip", values.h_flip, defaults.h_flip),
        ("v_flip", values.v_flip, defaults.v_flip),
        ("h_repeat", values.h_repeat, defaults.h_repeat),
        ("v_repeat", values.v_repeat, defaults.v_repeat),
    ];
    for (base_name, target, default) in toggles {
        if target == default {
            session.logger.line(format!(
                "  - Skipping '{base_name}' as its value ({target}) matches the default."
            ));
        } else {
            set_checkbox_state(session, base_name, target)?;
        }
    }
    Ok(())
}

/// Whether a scalar parameter differs enough from its default to warrant a
/// UI interaction.
pub fn needs_update(target: f64, default: f64, epsilon: f64) -> bool {
    (target - default).abs() >= epsilon
}

/// Locate a labeled input, select its content with a triple click and
/// overwrite it with a fixed-precision decimal string. Returns the label
/// position and the clicked entry position.
fn set_parameter_value(
    session: &mut WorkflowSession,
    key: &str,
    template_name: &str,
    value: f64,
    region: Option<Region>,
) -> AutomationResult<(Point, Point)> {
    let timeout = session.config.generic_element_timeout;
    let label = session.wait_for_element(template_name, timeout, None, region, 0.8)?;

    let (template_width, _) = session.vision.assets_mut().template_size(template_name)?;
    let right_edge = label.x + template_width as i32 / 2;
    let entry = Point::new(right_edge + 5, label.y);
    session.logger.line(format!("  - Setting '{key}' to {value:.3}"));
    session.controller.click_times(entry, 3)?;
    session.controller.type_text(&format!("{value:.3}"))?;
    Ok((label, entry))
}

/// Bring a checkbox to the desired state, clicking only when the on-screen
/// state (presence of the "on" icon near the "off" icon) differs from it.
fn set_checkbox_state(
    session: &mut WorkflowSession,
    base_name: &str,
    should_be_checked: bool,
) -> AutomationResult<()> {
    session.check_for_stop()?;
    let on_template = format!("{base_name}_on");
    let off_template = format!("{base_name}_off");

    let Some(off_coords) = session.vision.find_image(&off_template, None, 0.8)? else {
        session.logger.line(format!(
            "  - Warning: Could not locate checkbox element using '{off_template}'. Skipping."
        ));
        return Ok(());
    };

    let check_region = Region::new(off_coords.x - 25, off_coords.y - 25, 350, 50);
    let is_on = session
        .vision
        .find_image(&on_template, Some(check_region), 0.8)?
        .is_some();

    if should_be_checked == is_on {
        session.logger.line(format!(
            "  - Checkbox '{base_name}' state is already correct."
        ));
        return Ok(());
    }
    session.logger.line(format!(
        "  - Checkbox '{base_name}' state is incorrect. Clicking to change."
    ));
    let (template_width, _) = session.vision.assets_mut().template_size(&off_template)?;
    let right_edge = off_coords.x + template_width as i32 / 2;
    session
        .controller
        .click(Point::new(right_edge - 5, off_coords.y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_at_default_is_skipped() {
        // Requested size 0.5 with default 0.5 -> no interaction
        assert!(!needs_update(0.5, 0.5, 1e-4));
    }

    #[test]
    fn value_past_epsilon_is_applied() {
        // 0.5001 with epsilon 1e-4 -> interaction is issued
        assert!(needs_update(0.5001, 0.5, 1e-4));
    }

    #[test]
    fn difference_below_epsilon_is_skipped() {
        assert!(!needs_update(0.50005, 0.5, 1e-4));
        assert!(!needs_update(0.49995, 0.5, 1e-4));
    }

    #[test]
    fn fixed_precision_formatting_matches_the_input_fields() {
        assert_eq!(format!("{:.3}", 0.5f64), "0.500");
        assert_eq!(format!("{:.3}", 0.1234f64), "0.123");
    }
}
