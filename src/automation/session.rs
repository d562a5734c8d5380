//! Per-run session state.
//!
//! One session value owns the vision locator, the input controller and every
//! cache; it is passed explicitly into each action so there is exactly one
//! writer and no ambient shared state.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::automation::config::AutomationConfig;
use crate::cancel::CancelToken;
use crate::error::{AutomationError, AutomationResult};
use crate::input::{InputController, SystemClipboard};
use crate::logging::Logger;
use crate::vision::geometry::{Point, Region};
use crate::vision::locator::Vision;

/// Interval between attempts while waiting for an element to appear.
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Mutable state and collaborators of one automation session.
pub struct WorkflowSession {
    pub vision: Vision,
    pub controller: InputController,
    pub clipboard: SystemClipboard,
    pub config: AutomationConfig,
    pub token: CancelToken,
    pub logger: Logger,
    /// Captured header crops keyed by primary group name. Survives across
    /// incremental runs, invalidated on every full run.
    pub group_header_cache: HashMap<String, RgbaImage>,
    /// Left-edge x samples of confirmed group headers in the current run,
    /// the positional prior for OCR disambiguation.
    pub group_x_positions: Vec<i32>,
    /// Bounding box of the app anchor found at run start.
    pub anchor_box: Option<Region>,
}

impl WorkflowSession {
    pub fn new(
        assets_path: impl Into<std::path::PathBuf>,
        config: AutomationConfig,
        token: CancelToken,
        logger: Logger,
    ) -> Self {
        Self {
            vision: Vision::new(assets_path, logger.clone()),
            controller: InputController::new(token.clone(), logger.clone()),
            clipboard: SystemClipboard::new(),
            config,
            token,
            logger,
            group_header_cache: HashMap::new(),
            group_x_positions: Vec::new(),
            anchor_box: None,
        }
    }

    pub fn check_for_stop(&self) -> AutomationResult<()> {
        self.token.check()
    }

    pub fn sleep(&self, duration: Duration) -> AutomationResult<()> {
        self.token.sleep(duration)
    }

    /// Reset per-run state. A full run also drops the header image cache so
    /// every group is re-identified from scratch.
    pub fn begin_run(&mut self, full_run: bool) {
        self.group_x_positions.clear();
        if full_run {
            self.logger
                .line("Full Apply detected. Clearing group header image cache.");
            self.group_header_cache.clear();
        }
    }

    /// Wait for a UI element to appear by repeatedly searching until the
    /// timeout elapses. Promotes the timeout into a visibility error.
    pub fn wait_for_element(
        &mut self,
        template_name: &str,
        timeout: Duration,
        cache_key: Option<&str>,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Point> {
        self.logger.line(format!(
            "  - Waiting up to {:.1}s for '{}' to appear...",
            timeout.as_secs_f64(),
            template_name
        ));
        let start = Instant::now();
        while start.elapsed() < timeout {
            self.check_for_stop()?;
            let location = match cache_key {
                Some(key) => {
                    self.vision
                        .find_image_with_cache(template_name, key, region, confidence)?
                }
                None => self.vision.find_image(template_name, region, confidence)?,
            };
            if let Some(point) = location {
                self.logger.line(format!(
                    "  - Found '{}' after {:.2}s",
                    template_name,
                    start.elapsed().as_secs_f64()
                ));
                return Ok(point);
            }
            self.sleep(WAIT_POLL_INTERVAL)?;
        }
        Err(AutomationError::wait_timeout(template_name, timeout))
    }

    /// Region scanned for group headers, derived from the app anchor: a
    /// column starting a quarter into the anchor and three anchor-heights
    /// below it, down to the bottom of the app region.
    pub fn group_scan_region(&self) -> Option<Region> {
        let anchor = self.anchor_box?;
        let app_region = self.vision.app_region()?;
        let left = anchor.left + anchor.width / 4;
        let top = anchor.top + anchor.height * 3;
        let width = anchor.width + anchor.width / 2;
        let height = app_region.bottom() - top;
        let region = Region::new(left, top, width, height);
        region.is_valid().then_some(region)
    }

    /// Wider region scanned for texture items and arrows below the anchor.
    pub fn texture_scan_region(&self) -> Option<Region> {
        let anchor = self.anchor_box?;
        let app_region = self.vision.app_region()?;
        let top = anchor.top + anchor.height;
        let width = anchor.width * 2 + anchor.width / 2;
        let height = app_region.bottom() - top;
        let region = Region::new(anchor.left, top, width, height);
        if region.is_valid() {
            Some(region)
        } else {
            self.vision.app_region()
        }
    }
}

impl std::fmt::Debug for WorkflowSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowSession")
            .field("anchor_box", &self.anchor_box)
            .field("cached_headers", &self.group_header_cache.len())
            .field("x_samples", &self.group_x_positions.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headless_session() -> WorkflowSession {
        WorkflowSession::new(
            "assets",
            AutomationConfig::default(),
            CancelToken::new(),
            Logger::stdout(),
        )
    }

    #[test]
    fn begin_run_clears_header_cache_only_on_full_runs() {
        let mut session = headless_session();
        session
            .group_header_cache
            .insert("Skin".to_string(), RgbaImage::new(4, 4));
        session.group_x_positions.push(120);

        session.begin_run(false);
        assert_eq!(session.group_header_cache.len(), 1);
        assert!(session.group_x_positions.is_empty());

        session.begin_run(true);
        assert!(session.group_header_cache.is_empty());
    }

    #[test]
    fn scan_regions_need_anchor_and_app_region() {
        let mut session = headless_session();
        assert!(session.group_scan_region().is_none());

        session.anchor_box = Some(Region::new(100, 50, 200, 40));
        session.vision.set_app_region(Some(Region::new(0, 0, 1920, 1080)));

        let group_region = session.group_scan_region().unwrap();
        assert_eq!(group_region.left, 150);
        assert_eq!(group_region.top, 170);
        assert_eq!(group_region.width, 300);
        assert_eq!(group_region.bottom(), 1080);

        let texture_region = session.texture_scan_region().unwrap();
        assert_eq!(texture_region.left, 100);
        assert_eq!(texture_region.top, 90);
        assert_eq!(texture_region.width, 500);
    }

    #[test]
    fn wait_for_element_respects_a_pending_stop() {
        let mut session = headless_session();
        session.token.request_stop();
        let result = session.wait_for_element(
            "more_button",
            Duration::from_secs(1),
            None,
            None,
            0.8,
        );
        assert!(matches!(result, Err(AutomationError::Stopped)));
    }
}
