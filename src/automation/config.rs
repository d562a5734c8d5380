//! Centralized configuration for automation timings and default values.
//!
//! Tuning these values trades speed against reliability on slow target
//! applications. The scoring constants in the group search are tuned
//! empirically; changing them is a behavioral change that requires
//! re-validation against the acceptance scenarios.

use std::time::Duration;

use crate::slots::SlotValues;

/// Enumerated automation settings with documented defaults.
#[derive(Debug, Clone)]
pub struct AutomationConfig {
    /// Wait budget for contextual menu entries ("more", "remove").
    pub menu_timeout: Duration,
    /// Wait budget for confirmation dialogs.
    pub dialog_timeout: Duration,
    /// Wait budget for the file-chooser affordance.
    pub choose_file_timeout: Duration,
    /// Wait budget for generic elements (labels, arrows).
    pub generic_element_timeout: Duration,
    /// Settle time after opening the upload file dialog.
    pub post_upload_dialog_delay: Duration,
    /// Settle time after an upload finishes, before applying parameters.
    pub post_upload_finish_delay: Duration,
    /// Settle time after pasting the file path.
    pub post_paste_delay: Duration,
    /// Settle time between consecutive removals.
    pub post_removal_delay: Duration,
    /// Settle time after each scroll gesture during group search.
    pub scroll_delay: Duration,
    /// Scroll wheel units per group-search retry gesture.
    pub scroll_amount: i32,
    /// Scroll-retry attempts before a group counts as not visible.
    pub scroll_retries: u32,
    /// Scalar parameters within this distance of their default are skipped.
    /// Provisional, pending acceptance-test confirmation.
    pub value_epsilon: f64,
    /// Documented defaults of the target application's texture editor.
    pub default_values: SlotValues,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            menu_timeout: Duration::from_secs(2),
            dialog_timeout: Duration::from_secs(3),
            choose_file_timeout: Duration::from_secs(3),
            generic_element_timeout: Duration::from_secs(5),
            post_upload_dialog_delay: Duration::from_millis(800),
            post_upload_finish_delay: Duration::ZERO,
            post_paste_delay: Duration::ZERO,
            post_removal_delay: Duration::from_millis(200),
            scroll_delay: Duration::from_millis(250),
            scroll_amount: 200,
            scroll_retries: 5,
            value_epsilon: 1e-4,
            default_values: SlotValues::default(),
        }
    }
}
