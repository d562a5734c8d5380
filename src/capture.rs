//! Screen capture backed by xcap.
//!
//! Produces pixel buffers for arbitrary rectangular regions of the display
//! surface by capturing the monitor with the largest overlap and cropping.

use image::RgbaImage;
use xcap::Monitor;

use crate::error::{AutomationError, AutomationResult};
use crate::vision::geometry::Region;

/// Screen capture facade over the connected monitors.
#[derive(Debug, Default)]
pub struct ScreenCapture;

impl ScreenCapture {
    pub fn new() -> Self {
        Self
    }

    /// Bounds of every connected monitor, in absolute screen coordinates.
    pub fn monitor_regions(&self) -> AutomationResult<Vec<Region>> {
        Self::monitors()?.iter().map(Self::monitor_bounds).collect()
    }

    /// Bounds of the primary monitor, falling back to the first one.
    pub fn primary_region(&self) -> AutomationResult<Region> {
        let monitors = Self::monitors()?;
        let primary = monitors
            .iter()
            .find(|m| m.is_primary().unwrap_or(false))
            .or_else(|| monitors.first())
            .ok_or_else(|| AutomationError::CaptureFailed {
                description: "No monitors detected".to_string(),
            })?;
        Self::monitor_bounds(primary)
    }

    /// Capture a rectangular region of the display surface.
    ///
    /// A region with non-positive dimensions is a capture error, not an
    /// empty result. Regions clipped by monitor edges return the visible
    /// intersection.
    pub fn grab(&self, region: Region) -> AutomationResult<RgbaImage> {
        if !region.is_valid() {
            return Err(AutomationError::InvalidCaptureRegion { region });
        }

        let monitors = Self::monitors()?;
        let bounds: Vec<Region> = monitors
            .iter()
            .map(Self::monitor_bounds)
            .collect::<AutomationResult<_>>()?;
        let index = best_monitor_for(region, &bounds).ok_or_else(|| {
            AutomationError::CaptureFailed {
                description: format!("Region {region} does not overlap any monitor"),
            }
        })?;

        let monitor = &monitors[index];
        let monitor_bounds = bounds[index];
        let Some(visible) = region.intersection(&monitor_bounds) else {
            return Err(AutomationError::CaptureFailed {
                description: format!("Region {region} does not overlap any monitor"),
            });
        };

        let frame = monitor
            .capture_image()
            .map_err(|e| AutomationError::CaptureFailed {
                description: format!("Monitor capture failed: {e}"),
            })?;

        let crop_x = (visible.left - monitor_bounds.left) as u32;
        let crop_y = (visible.top - monitor_bounds.top) as u32;
        let crop_w = (visible.width as u32).min(frame.width().saturating_sub(crop_x));
        let crop_h = (visible.height as u32).min(frame.height().saturating_sub(crop_y));
        if crop_w == 0 || crop_h == 0 {
            return Err(AutomationError::CaptureFailed {
                description: format!("Region {region} is outside the captured frame"),
            });
        }

        Ok(image::imageops::crop_imm(&frame, crop_x, crop_y, crop_w, crop_h).to_image())
    }

    fn monitors() -> AutomationResult<Vec<Monitor>> {
        Monitor::all().map_err(|e| AutomationError::CaptureFailed {
            description: format!("Failed to enumerate monitors: {e}"),
        })
    }

    fn monitor_bounds(monitor: &Monitor) -> AutomationResult<Region> {
        let read_failed = |e: xcap::XCapError| AutomationError::CaptureFailed {
            description: format!("Failed to read monitor geometry: {e}"),
        };
        Ok(Region::new(
            monitor.x().map_err(read_failed)?,
            monitor.y().map_err(read_failed)?,
            monitor.width().map_err(read_failed)? as i32,
            monitor.height().map_err(read_failed)? as i32,
        ))
    }
}

/// Pick the monitor with the largest overlap with `region`.
fn best_monitor_for(region: Region, monitors: &[Region]) -> Option<usize> {
    monitors
        .iter()
        .enumerate()
        .filter_map(|(i, bounds)| {
            region
                .intersection(bounds)
                .map(|overlap| (i, overlap.width as i64 * overlap.height as i64))
        })
        .max_by_key(|&(_, area)| area)
        .map(|(i, _)| i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_the_monitor_with_most_overlap() {
        let monitors = [
            Region::new(0, 0, 1920, 1080),
            Region::new(1920, 0, 2560, 1440),
        ];

        // Fully inside the second monitor
        let index = best_monitor_for(Region::new(2000, 100, 400, 300), &monitors);
        assert_eq!(index, Some(1));

        // Straddling the seam, mostly on the first
        let index = best_monitor_for(Region::new(1800, 100, 200, 100), &monitors);
        assert_eq!(index, Some(0));
    }

    #[test]
    fn no_overlap_yields_none() {
        let monitors = [Region::new(0, 0, 1920, 1080)];
        assert_eq!(
            best_monitor_for(Region::new(3000, 3000, 100, 100), &monitors),
            None
        );
    }

    #[test]
    fn invalid_region_is_rejected_before_any_capture() {
        let capture = ScreenCapture::new();
        let result = capture.grab(Region::new(0, 0, -10, 40));
        assert!(matches!(
            result,
            Err(AutomationError::InvalidCaptureRegion { .. })
        ));
    }
}
