//! Top-level workflow state machine.
//!
//! Sequences removal, upload and map recomputation for one run, owns the
//! session state and maps every failure mode to an outcome. Nothing
//! propagates to the caller as a panic; an interrupted or failed run hands
//! back the previous map untouched.

use crate::automation::config::AutomationConfig;
use crate::automation::session::WorkflowSession;
use crate::automation::{removal, state, textures};
use crate::cancel::CancelToken;
use crate::error::{AutomationError, AutomationResult};
use crate::logging::Logger;
use crate::slots::{Slot, TextureMap};
use crate::vision::geometry::Region;

/// Phases of one automation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Removing,
    Managing,
    RecomputingMap,
    Done,
    Failed,
    Stopped,
}

/// Final status of a run, the caller-facing tri-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    Halted,
    FastApplyFailed,
}

impl RunStatus {
    /// Legacy wire form used by the GUI layer.
    pub fn as_legacy_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "true",
            RunStatus::Halted => "false",
            RunStatus::FastApplyFailed => "FAST_APPLY_FAILED",
        }
    }
}

/// Result of one run: the status plus the map the caller must persist.
///
/// On anything but `Success` the map is the previous map, unmodified: an
/// interrupted run's on-screen state is not trustworthy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub texture_map: TextureMap,
}

/// Drives complete automation runs over one owned session.
pub struct WorkflowManager {
    session: WorkflowSession,
    phase: RunPhase,
}

impl WorkflowManager {
    pub fn new(
        assets_path: impl Into<std::path::PathBuf>,
        config: AutomationConfig,
        token: CancelToken,
        logger: Logger,
    ) -> Self {
        Self {
            session: WorkflowSession::new(assets_path, config, token, logger),
            phase: RunPhase::Idle,
        }
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.session.token.clone()
    }

    pub fn set_language(&mut self, lang_code: &str) {
        self.session.vision.set_language(lang_code);
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Locate the app anchor across monitors and pin the automation region
    /// to the monitor containing it.
    pub fn find_app_window_and_set_region(&mut self) -> AutomationResult<Option<Region>> {
        self.session
            .logger
            .line("Attempting to find app anchor 'app_anchor'...");
        let anchor = self.session.vision.find_image_box("app_anchor", None, 0.8)?;
        let Some(anchor) = anchor else {
            self.session
                .logger
                .line("ERROR: App anchor image not found on any screen.");
            self.session.anchor_box = None;
            self.session.vision.set_app_region(None);
            return Ok(None);
        };

        self.session.anchor_box = Some(anchor);
        self.session
            .logger
            .line(format!("Found anchor box at {anchor}"));
        let anchor_center = anchor.center();
        for monitor in self.session.vision.monitor_regions()? {
            if monitor.contains_point(anchor_center) {
                self.session.vision.set_app_region(Some(monitor));
                self.session
                    .logger
                    .line(format!("Set automation region to: {monitor}"));
                return Ok(Some(monitor));
            }
        }
        self.session
            .logger
            .line("ERROR: Could not determine monitor for the anchor.");
        Ok(None)
    }

    /// Execute one run. The cancel token must be armed (not stopped) by the
    /// caller; the worker re-arms it before every run.
    pub fn run(&mut self, slots: &[Slot], old_map: &TextureMap, full_run: bool) -> RunOutcome {
        self.set_phase(RunPhase::Idle);
        self.session.begin_run(full_run);
        self.session.logger.line("Starting automation workflow...");

        match self.execute(slots, old_map, full_run) {
            Ok(new_map) => {
                self.set_phase(RunPhase::Done);
                self.session
                    .logger
                    .line("\nAutomation workflow finished successfully.");
                RunOutcome {
                    status: RunStatus::Success,
                    texture_map: new_map,
                }
            }
            Err(AutomationError::FastApply { description }) => {
                self.set_phase(RunPhase::Failed);
                self.session
                    .logger
                    .line(format!("--- Fast Apply failed: {description} ---"));
                RunOutcome {
                    status: RunStatus::FastApplyFailed,
                    texture_map: old_map.clone(),
                }
            }
            Err(e @ (AutomationError::Stopped | AutomationError::Visibility { .. })) => {
                self.set_phase(if e.is_stop() {
                    RunPhase::Stopped
                } else {
                    RunPhase::Failed
                });
                self.session
                    .logger
                    .line(format!("--- Automation halted: {e} ---"));
                RunOutcome {
                    status: RunStatus::Halted,
                    texture_map: old_map.clone(),
                }
            }
            Err(e) => {
                self.set_phase(RunPhase::Failed);
                log::error!("Unexpected automation failure: {e:?}");
                self.session
                    .logger
                    .line(format!("--- An unexpected error occurred: {e} ---"));
                RunOutcome {
                    status: RunStatus::Halted,
                    texture_map: old_map.clone(),
                }
            }
        }
    }

    fn execute(
        &mut self,
        slots: &[Slot],
        old_map: &TextureMap,
        full_run: bool,
    ) -> AutomationResult<TextureMap> {
        self.set_phase(RunPhase::Removing);
        let removed_by_group = if full_run {
            removal::process_removals_full(&mut self.session, slots)?;
            Default::default()
        } else {
            removal::process_removals_fast(&mut self.session, slots, old_map)?
        };
        self.session.check_for_stop()?;

        self.set_phase(RunPhase::Managing);
        let slots_to_manage: Vec<Slot> = slots
            .iter()
            .filter(|slot| slot.needs_management())
            .cloned()
            .collect();
        let uploaded_by_group = textures::manage_textures(&mut self.session, &slots_to_manage)?;

        self.set_phase(RunPhase::RecomputingMap);
        let new_map = if full_run {
            state::compute_new_texture_map_from_ui(&self.session.logger, slots)
        } else {
            state::compute_new_texture_map_from_ops(
                &self.session.logger,
                old_map,
                &removed_by_group,
                &uploaded_by_group,
            )
        };
        Ok(new_map)
    }

    fn set_phase(&mut self, new_phase: RunPhase) {
        if self.phase != new_phase {
            log::debug!("Workflow phase: {:?} -> {:?}", self.phase, new_phase);
            self.phase = new_phase;
        }
    }
}

impl std::fmt::Debug for WorkflowManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowManager")
            .field("phase", &self.phase)
            .field("session", &self.session)
            .finish()
    }
}
