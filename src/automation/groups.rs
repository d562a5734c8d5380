//! Locating named, collapsible groups and enumerating their textures.
//!
//! A group lookup walks a fixed ladder: cached header bitmap, targeted OCR
//! next to expand/collapse arrows, wide-area OCR, then scroll-and-retry.
//! Candidate disambiguation combines the raw OCR score with a positional
//! prior (headers share indentation) and a structural bonus for an adjacent
//! arrow icon.

use crate::automation::session::WorkflowSession;
use crate::error::{AutomationError, AutomationResult};
use crate::slots::Slot;
use crate::vision::geometry::{Point, Region};
use crate::vision::locator::TextMatch;

/// Horizontal distance divisor for the indentation penalty.
const X_PENALTY_DIVISOR: f64 = 50.0;
/// Weight of the indentation penalty per divisor step.
const X_PENALTY_WEIGHT: f64 = 0.1;
/// Bonus for an expand/collapse arrow adjacent to the candidate text.
const ARROW_ADJACENT_BONUS: f64 = 0.5;
/// Absolute acceptance threshold for the best adjusted candidate.
/// Provisional, pending acceptance-test confirmation.
const GROUP_ACCEPT_FLOOR: f64 = 0.7;

/// Width/height of the targeted OCR box left of each arrow icon.
const TARGETED_OCR_WIDTH: i32 = 300;
const TARGETED_OCR_HEIGHT: i32 = 30;

/// Padding around a confirmed header bbox when capturing its cache crop.
const HEADER_CROP_PADDING: i32 = 2;

/// An OCR candidate augmented with the structural arrow signal.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupCandidate {
    pub text_match: TextMatch,
    pub arrow_adjacent: bool,
}

/// Find a group header, expand the group if collapsed, and return the
/// header box together with the expanded arrow position.
pub fn find_and_expand_group(
    session: &mut WorkflowSession,
    group_name: &str,
    slots_for_group: &[Slot],
) -> AutomationResult<(Region, Point)> {
    session.check_for_stop()?;
    session
        .logger
        .line(format!("Action: Find and expand group '{group_name}'."));

    let mut search_names = vec![group_name.to_string()];
    for slot in slots_for_group {
        for alternate in &slot.alternate_groups {
            if !search_names.contains(alternate) {
                search_names.push(alternate.clone());
            }
        }
    }
    if search_names.len() > 1 {
        session
            .logger
            .line(format!("  - Search candidates: {search_names:?}"));
    }

    let scan_region = session.group_scan_region();

    let mut header = attempt_to_find_header(session, group_name, &search_names, scan_region)?;
    if header.is_none() {
        if let Some(region) = scan_region {
            session
                .controller
                .move_to(Point::new(region.left + 150, region.top + 200))?;
        }
        for _ in 0..session.config.scroll_retries {
            session
                .controller
                .scroll_down(session.config.scroll_amount)?;
            session.sleep(session.config.scroll_delay)?;
            header = attempt_to_find_header(session, group_name, &search_names, scan_region)?;
            if header.is_some() {
                break;
            }
        }
    }

    let header = header.ok_or_else(|| AutomationError::Visibility {
        description: format!("Could not find group '{group_name}'"),
    })?;

    let arrow_region = arrow_search_region(&header);
    if let Some(expanded) = session
        .vision
        .find_image("group_expanded", Some(arrow_region), 0.8)?
    {
        return Ok((header, expanded));
    }
    if let Some(collapsed) = session
        .vision
        .find_image("group_collapsed", Some(arrow_region), 0.8)?
    {
        session.controller.click(collapsed)?;
        let timeout = session.config.generic_element_timeout;
        let expanded =
            session.wait_for_element("group_expanded", timeout, None, Some(arrow_region), 0.8)?;
        return Ok((header, expanded));
    }
    Err(AutomationError::Visibility {
        description: format!("Cannot determine state of group '{group_name}'"),
    })
}

/// One pass of the header search ladder, without scrolling.
fn attempt_to_find_header(
    session: &mut WorkflowSession,
    group_name: &str,
    search_names: &[String],
    scan_region: Option<Region>,
) -> AutomationResult<Option<Region>> {
    if let Some(cached) = session.group_header_cache.get(group_name).cloned() {
        session.logger.line(format!(
            "  - Attempting to find group '{group_name}' using cached image."
        ));
        if let Some(location) = session.vision.find_bitmap_box(&cached, scan_region, 0.95)? {
            session
                .logger
                .line(format!("  - Found group '{group_name}' via cached image."));
            return Ok(Some(location));
        }
        session.logger.line(format!(
            "  - Cached image for '{group_name}' not found. Falling back to other methods."
        ));
    }

    session
        .logger
        .line("  - Trying targeted OCR strategy based on group icons.");
    let mut arrows = session
        .vision
        .find_all_images("group_expanded", scan_region, 0.8)?;
    arrows.extend(
        session
            .vision
            .find_all_images("group_collapsed", scan_region, 0.8)?,
    );
    arrows.sort_by_key(|p| p.y);

    if arrows.is_empty() {
        session
            .logger
            .line("  - No group icons found for targeted OCR.");
    } else {
        session
            .logger
            .line(format!("  - Found {} group icons to target.", arrows.len()));
        let mut candidates = Vec::new();
        for arrow in &arrows {
            let targeted = targeted_ocr_region(*arrow, scan_region);
            for name in search_names {
                candidates.extend(session.vision.find_text_on_screen(name, Some(targeted))?);
            }
        }
        if !candidates.is_empty() {
            session.logger.line(format!(
                "  - Targeted OCR found {} potential matches across all icons.",
                candidates.len()
            ));
            if let Some(best) = select_best_group_match(session, candidates)? {
                return Ok(Some(confirm_and_cache_header(
                    session,
                    group_name,
                    &best,
                    scan_region,
                    "targeted OCR",
                )?));
            }
        }
    }

    session
        .logger
        .line("  - Targeted OCR failed. Falling back to wide-area OCR.");
    for name in search_names {
        session.logger.line(format!(
            "  - Attempting to find group '{name}' using OCR."
        ));
        let candidates = session.vision.find_text_on_screen(name, scan_region)?;
        if candidates.is_empty() {
            continue;
        }
        if let Some(best) = select_best_group_match(session, candidates)? {
            return Ok(Some(confirm_and_cache_header(
                session,
                group_name,
                &best,
                scan_region,
                "wide-area OCR",
            )?));
        }
    }
    Ok(None)
}

/// Record the winner's indentation, cache a padded crop of its header under
/// the primary group name, and prefer re-locating that fresh crop for a
/// tighter box.
fn confirm_and_cache_header(
    session: &mut WorkflowSession,
    group_name: &str,
    best: &TextMatch,
    scan_region: Option<Region>,
    method_name: &str,
) -> AutomationResult<Region> {
    session.logger.line(format!(
        "  - Found a match for '{}' via {}. Caching image for primary name '{}'.",
        best.text, method_name, group_name
    ));
    session.group_x_positions.push(best.bbox.left);

    let capture_region = Region::new(
        best.bbox.left - HEADER_CROP_PADDING,
        best.bbox.top - HEADER_CROP_PADDING,
        best.bbox.width + HEADER_CROP_PADDING * 2,
        best.bbox.height + HEADER_CROP_PADDING * 2,
    );
    match session.vision.screenshot(capture_region) {
        Ok(crop) => {
            session
                .group_header_cache
                .insert(group_name.to_string(), crop.clone());
            session
                .logger
                .line("  - Re-locating with newly cached image for precision.");
            match session.vision.find_bitmap_box(&crop, scan_region, 0.9)? {
                Some(precise) => Ok(precise),
                None => Ok(best.bbox),
            }
        }
        Err(e) => {
            session.logger.line(format!(
                "  - Warning: Could not cache/re-verify image for group '{group_name}'. Using OCR box. Error: {e}"
            ));
            Ok(best.bbox)
        }
    }
}

/// Disambiguate OCR candidates: structural arrow bonus, indentation prior
/// and an absolute acceptance floor.
pub fn select_best_group_match(
    session: &mut WorkflowSession,
    matches: Vec<TextMatch>,
) -> AutomationResult<Option<TextMatch>> {
    if matches.is_empty() {
        return Ok(None);
    }
    if let Some(predicted_x) = median(&session.group_x_positions) {
        session.logger.line(format!(
            "  - Applying heuristics with predicted X-indentation: {predicted_x:.0}"
        ));
    }

    let mut candidates = Vec::with_capacity(matches.len());
    for text_match in matches {
        let arrow_region = arrow_search_region(&text_match.bbox);
        let arrow_adjacent = session
            .vision
            .find_image("group_expanded", Some(arrow_region), 0.7)?
            .is_some()
            || session
                .vision
                .find_image("group_collapsed", Some(arrow_region), 0.7)?
                .is_some();
        if arrow_adjacent {
            session.logger.line(format!(
                "    - Candidate '{}' has an arrow nearby. Bonus applied.",
                text_match.text
            ));
        }
        candidates.push(GroupCandidate {
            text_match,
            arrow_adjacent,
        });
    }

    let selected = select_best_candidate(&candidates, &session.group_x_positions);
    match selected {
        Some(index) => {
            let winner = candidates[index].text_match.clone();
            session.logger.line(format!(
                "  - Selected best group match '{}'",
                winner.text
            ));
            Ok(Some(winner))
        }
        None => {
            session
                .logger
                .line("  - No candidate cleared the heuristic filter.");
            Ok(None)
        }
    }
}

/// Deterministic scoring over pre-collected candidates. Returns the index of
/// the winning candidate, or `None` when nothing clears the floor.
pub fn select_best_candidate(candidates: &[GroupCandidate], x_positions: &[i32]) -> Option<usize> {
    let predicted_x = median(x_positions);

    let mut best: Option<(usize, f64)> = None;
    for (index, candidate) in candidates.iter().enumerate() {
        let mut score = candidate.text_match.score;
        if let Some(predicted) = predicted_x {
            let x_diff = (candidate.text_match.bbox.left as f64 - predicted).abs();
            score -= (x_diff / X_PENALTY_DIVISOR) * X_PENALTY_WEIGHT;
        }
        if candidate.arrow_adjacent {
            score += ARROW_ADJACENT_BONUS;
        }
        if score <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, best_score)| score > best_score) {
            best = Some((index, score));
        }
    }

    best.and_then(|(index, score)| (score >= GROUP_ACCEPT_FLOOR).then_some(index))
}

/// Ordered texture item centers inside an expanded group, bounded so the
/// scan never leaks into a sibling group.
pub fn textures_in_group(
    session: &mut WorkflowSession,
    header: Region,
    arrow: Point,
) -> AutomationResult<Vec<Point>> {
    session.check_for_stop()?;
    let scan_region = session
        .texture_scan_region()
        .ok_or_else(|| AutomationError::Visibility {
            description: "App region not set; cannot enumerate textures".to_string(),
        })?;

    let search_x = header.left;
    let search_y_start = header.bottom();
    let search_width = 400;

    let bottom_boundary = {
        let upload_search = Region::new(
            search_x,
            search_y_start,
            search_width,
            scan_region.bottom() - search_y_start,
        );
        let upload_button = if upload_search.is_valid() {
            session
                .vision
                .find_image("group_upload_button", Some(upload_search), 0.8)?
        } else {
            None
        };
        if let Some(button) = upload_button {
            let boundary = button.y - 20;
            session.logger.line(format!(
                "  - Group upload button found at y={boundary}. Bounding search."
            ));
            boundary
        } else {
            let mut arrows = session
                .vision
                .find_all_images("group_expanded", Some(scan_region), 0.8)?;
            arrows.extend(
                session
                    .vision
                    .find_all_images("group_collapsed", Some(scan_region), 0.8)?,
            );
            arrows.sort_by_key(|p| p.y);
            match arrows.iter().find(|p| p.y > arrow.y + 5) {
                Some(next_arrow) => {
                    session.logger.line(format!(
                        "  - Next group found at y={}. Bounding search.",
                        next_arrow.y
                    ));
                    next_arrow.y
                }
                None => {
                    session.logger.line(
                        "  - No subsequent group or upload button found. Searching to bottom of region.",
                    );
                    scan_region.bottom()
                }
            }
        }
    };

    let search_height = bottom_boundary - search_y_start;
    if search_height <= 0 {
        session
            .logger
            .line("  - Search region has zero or negative height. No textures to find.");
        return Ok(Vec::new());
    }
    let search_region = Region::new(search_x, search_y_start, search_width, search_height);
    session.logger.line(format!(
        "  - Defined bounded search region for textures: {search_region}"
    ));

    let mut items = session
        .vision
        .find_all_images("texture_item", Some(search_region), 0.99)?;
    items.extend(
        session
            .vision
            .find_all_images("texture_item_selected", Some(search_region), 0.99)?,
    );
    items.sort_by_key(|p| p.y);

    if items.is_empty() {
        session.logger.line("  - No textures found in this group.");
    } else {
        session
            .logger
            .line(format!("  - Found {} textures in group.", items.len()));
    }
    Ok(items)
}

/// Strip right of a header/candidate box where its arrow icon lives.
fn arrow_search_region(bbox: &Region) -> Region {
    Region::new(bbox.right(), bbox.top - 5, 300, bbox.height + 10)
}

/// Narrow OCR box immediately left of an arrow icon, clamped to the scan
/// region's origin.
fn targeted_ocr_region(arrow: Point, scan_region: Option<Region>) -> Region {
    let left = arrow.x - TARGETED_OCR_WIDTH;
    let top = arrow.y - TARGETED_OCR_HEIGHT / 2;
    match scan_region {
        Some(bounds) => Region::new(
            left.max(bounds.left),
            top.max(bounds.top),
            TARGETED_OCR_WIDTH,
            TARGETED_OCR_HEIGHT,
        ),
        None => Region::new(left, top, TARGETED_OCR_WIDTH, TARGETED_OCR_HEIGHT),
    }
}

fn median(values: &[i32]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
    } else {
        sorted[mid] as f64
    };
    Some(median)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(text: &str, score: f64, left: i32, arrow_adjacent: bool) -> GroupCandidate {
        GroupCandidate {
            text_match: TextMatch {
                score,
                bbox: Region::new(left, 100, 80, 20),
                text: text.to_string(),
            },
            arrow_adjacent,
        }
    }

    #[test]
    fn best_raw_score_wins_without_priors() {
        let candidates = vec![
            candidate("Skin Tone", 0.75, 120, false),
            candidate("Skin", 0.95, 120, false),
        ];
        assert_eq!(select_best_candidate(&candidates, &[]), Some(1));
    }

    #[test]
    fn arrow_bonus_outranks_a_higher_raw_score() {
        let candidates = vec![
            candidate("Skin", 0.95, 120, false),
            candidate("Skin", 0.60, 120, true), // 0.60 + 0.5 = 1.10
        ];
        assert_eq!(select_best_candidate(&candidates, &[]), Some(1));
    }

    #[test]
    fn indentation_penalty_eliminates_distant_duplicates() {
        // Prior says headers sit around x=120. The duplicate at x=620 takes
        // a (500/50)*0.1 = 1.0 penalty and drops to <= 0.
        let candidates = vec![
            candidate("Skin", 0.95, 620, false),
            candidate("Skin", 0.80, 120, false),
        ];
        assert_eq!(select_best_candidate(&candidates, &[118, 120, 122]), Some(1));
    }

    #[test]
    fn best_survivor_below_the_floor_is_rejected() {
        let candidates = vec![candidate("Skin", 0.65, 120, false)];
        assert_eq!(select_best_candidate(&candidates, &[]), None);
    }

    #[test]
    fn empty_candidate_list_selects_nothing() {
        assert_eq!(select_best_candidate(&[], &[]), None);
    }

    #[test]
    fn disambiguation_is_idempotent() {
        let candidates = vec![
            candidate("Skin", 0.80, 115, true),
            candidate("Skin Tone", 0.70, 118, true),
            candidate("Skin", 0.95, 640, false),
        ];
        let priors = [110, 120, 125, 130];
        let first = select_best_candidate(&candidates, &priors);
        let second = select_best_candidate(&candidates, &priors);
        assert_eq!(first, second);
        assert!(first.is_some());
    }

    #[test]
    fn median_of_even_and_odd_sample_counts() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[7]), Some(7.0));
        assert_eq!(median(&[10, 20]), Some(15.0));
        assert_eq!(median(&[30, 10, 20]), Some(20.0));
    }

    #[test]
    fn targeted_region_is_clamped_to_the_scan_region() {
        let bounds = Region::new(100, 50, 500, 800);
        let region = targeted_ocr_region(Point::new(150, 60), Some(bounds));
        assert_eq!(region.left, 100);
        assert_eq!(region.top, 50);
        assert_eq!(region.width, TARGETED_OCR_WIDTH);
    }
}
