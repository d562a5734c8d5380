//! The element-finding facade used by everything above it.
//!
//! Combines screen capture, template matching and OCR text search behind
//! one API. Absence of an element is always a `None`/empty result; errors
//! are reserved for invalid regions, missing assets and broken backends.

use std::collections::HashMap;

use image::RgbaImage;

use crate::capture::ScreenCapture;
use crate::error::{AutomationError, AutomationResult};
use crate::logging::Logger;
use crate::vision::assets::AssetLibrary;
use crate::vision::geometry::{Point, Region};
use crate::vision::ocr::{OcrEngine, OcrFragment};
use crate::vision::{template, text_match};

/// Side length of the square region recorded around a cached hit.
pub const CACHE_REGION_SIZE: i32 = 150;

/// An OCR candidate scored against a target string, before disambiguation.
#[derive(Debug, Clone, PartialEq)]
pub struct TextMatch {
    pub score: f64,
    pub bbox: Region,
    pub text: String,
}

/// Vision locator: finds UI elements by template or text.
pub struct Vision {
    assets: AssetLibrary,
    capture: ScreenCapture,
    ocr: OcrEngine,
    ui_cache: HashMap<String, Region>,
    app_region: Option<Region>,
    logger: Logger,
}

impl Vision {
    pub fn new(assets_path: impl Into<std::path::PathBuf>, logger: Logger) -> Self {
        Self {
            assets: AssetLibrary::new(assets_path),
            capture: ScreenCapture::new(),
            ocr: OcrEngine::new(),
            ui_cache: HashMap::new(),
            app_region: None,
            logger,
        }
    }

    pub fn set_language(&mut self, lang_code: &str) {
        self.assets.set_language(lang_code);
        self.logger
            .line(format!("Vision language set to: {lang_code}"));
    }

    pub fn set_app_region(&mut self, region: Option<Region>) {
        self.app_region = region;
    }

    pub fn app_region(&self) -> Option<Region> {
        self.app_region
    }

    pub fn assets_mut(&mut self) -> &mut AssetLibrary {
        &mut self.assets
    }

    /// Capture a screen region as pixels.
    pub fn screenshot(&self, region: Region) -> AutomationResult<RgbaImage> {
        self.capture.grab(region)
    }

    /// Bounds of every connected monitor.
    pub fn monitor_regions(&self) -> AutomationResult<Vec<Region>> {
        self.capture.monitor_regions()
    }

    /// Find the first occurrence of a template and return its center point.
    /// Searches the app region or every monitor when no region is given.
    pub fn find_image(
        &mut self,
        template_name: &str,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Option<Point>> {
        Ok(self
            .find_image_box(template_name, region, confidence)?
            .map(|bbox| bbox.center()))
    }

    /// Find a template and return its bounding box.
    pub fn find_image_box(
        &mut self,
        template_name: &str,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Option<Region>> {
        let template_image = self.assets.load(template_name)?;
        self.find_bitmap_box_named(&template_image, template_name, region, confidence)
    }

    /// Find an in-memory bitmap (e.g. a cached group-header crop) and return
    /// its bounding box.
    pub fn find_bitmap_box(
        &mut self,
        template_image: &RgbaImage,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Option<Region>> {
        self.find_bitmap_box_named(template_image, "<bitmap>", region, confidence)
    }

    fn find_bitmap_box_named(
        &mut self,
        template_image: &RgbaImage,
        display_name: &str,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Option<Region>> {
        for search_region in self.search_regions(region)? {
            let haystack = match self.grab_search_region(search_region)? {
                Some(image) => image,
                None => continue,
            };
            if let Some(found) = template::best_match(&haystack, template_image, confidence) {
                let bbox = Region::new(
                    search_region.left + found.x as i32,
                    search_region.top + found.y as i32,
                    found.width as i32,
                    found.height as i32,
                );
                self.logger.line(format!(
                    "  - Found '{}' at {} (confidence {:.3}, scale {:.2})",
                    display_name, bbox, found.confidence, found.scale
                ));
                return Ok(Some(bbox));
            }
            self.logger.line(format!(
                "  - '{display_name}' not found in region {search_region}"
            ));
        }
        Ok(None)
    }

    /// Find all occurrences of a template within a region, as center points
    /// with near-coincident hits collapsed.
    pub fn find_all_images(
        &mut self,
        template_name: &str,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Vec<Point>> {
        let template_image = self.assets.load(template_name)?;
        let Some(search_region) = region.or(self.app_region) else {
            self.logger.line(format!(
                "  - ERROR: No search region provided for '{template_name}'"
            ));
            return Ok(Vec::new());
        };

        let Some(haystack) = self.grab_search_region(search_region)? else {
            return Ok(Vec::new());
        };
        let found = template::all_matches(&haystack, &template_image, confidence);
        if !found.is_empty() {
            self.logger.line(format!(
                "  - Found {} instances of '{}'",
                found.len(),
                template_name
            ));
        }
        Ok(found
            .iter()
            .map(|m| {
                let (cx, cy) = m.center();
                Point::new(search_region.left + cx as i32, search_region.top + cy as i32)
            })
            .collect())
    }

    /// OCR a region and return every fragment scored against the target,
    /// ranked best first. Disambiguation is the caller's responsibility;
    /// the same text can legitimately appear more than once.
    pub fn find_text_on_screen(
        &mut self,
        text_to_find: &str,
        region: Option<Region>,
    ) -> AutomationResult<Vec<TextMatch>> {
        let search_region = self.text_search_region(region)?;
        self.logger
            .line(format!("Reading text from region: {search_region}"));

        let haystack = match self.grab_search_region(search_region)? {
            Some(image) => image,
            None => return Ok(Vec::new()),
        };
        let fragments = self.ocr.recognize(&haystack)?;
        let matches = score_fragments(
            text_to_find,
            &fragments,
            Point::new(search_region.left, search_region.top),
        );
        for m in &matches {
            self.logger.line(format!(
                "  - Found potential match '{}' for '{}' with score {:.2}",
                m.text, text_to_find, m.score
            ));
        }
        Ok(matches)
    }

    /// All text readable in a region, joined with spaces.
    pub fn get_text_from_region(&mut self, region: Region) -> AutomationResult<String> {
        let Some(haystack) = self.grab_search_region(region)? else {
            return Ok(String::new());
        };
        let fragments = self.ocr.recognize(&haystack)?;
        Ok(fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Find an image, prioritizing the last successful region for this key.
    /// A hit anywhere records a fixed-size region centered on it as the new
    /// hint for the key.
    pub fn find_image_with_cache(
        &mut self,
        template_name: &str,
        cache_key: &str,
        region: Option<Region>,
        confidence: f32,
    ) -> AutomationResult<Option<Point>> {
        if let Some(&cached_region) = self.ui_cache.get(cache_key) {
            self.logger.line(format!(
                "  - Searching for '{template_name}' in cached region: {cached_region}"
            ));
            if let Some(location) =
                self.find_image(template_name, Some(cached_region), confidence)?
            {
                return Ok(Some(location));
            }
            self.logger
                .line("  - Not found in cached region. Searching wider area.");
        }

        let location = self.find_image(template_name, region, confidence)?;
        if let Some(point) = location {
            let hint = Region::centered_on(point, CACHE_REGION_SIZE);
            self.ui_cache.insert(cache_key.to_string(), hint);
            self.logger.line(format!(
                "  - Found '{template_name}' and updated cache '{cache_key}' to {hint}"
            ));
        }
        Ok(location)
    }

    fn search_regions(&self, explicit: Option<Region>) -> AutomationResult<Vec<Region>> {
        if let Some(region) = explicit {
            return Ok(vec![region]);
        }
        if let Some(region) = self.app_region {
            return Ok(vec![region]);
        }
        self.logger
            .line("  - No region specified. Searching all monitors.");
        self.capture.monitor_regions()
    }

    fn text_search_region(&self, explicit: Option<Region>) -> AutomationResult<Region> {
        if let Some(region) = explicit.or(self.app_region) {
            return Ok(region);
        }
        self.capture.primary_region()
    }

    /// Grab one search region; an invalid region propagates as an error,
    /// per-monitor capture hiccups degrade to a skipped region.
    fn grab_search_region(&self, region: Region) -> AutomationResult<Option<RgbaImage>> {
        match self.capture.grab(region) {
            Ok(image) => Ok(Some(image)),
            Err(err @ AutomationError::InvalidCaptureRegion { .. }) => Err(err),
            Err(e) => {
                self.logger.line(format!(
                    "  - ERROR: Failed to take screenshot for region {region}: {e}"
                ));
                Ok(None)
            }
        }
    }
}

impl std::fmt::Debug for Vision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vision")
            .field("assets", &self.assets)
            .field("app_region", &self.app_region)
            .field("cached_keys", &self.ui_cache.len())
            .finish()
    }
}

/// Score OCR fragments against a target and rank them best first, shifting
/// bounding boxes from image-relative to absolute coordinates.
fn score_fragments(target: &str, fragments: &[OcrFragment], offset: Point) -> Vec<TextMatch> {
    let mut matches: Vec<TextMatch> = fragments
        .iter()
        .filter_map(|fragment| {
            text_match::score_candidate(target, &fragment.text).map(|score| TextMatch {
                score,
                bbox: Region::new(
                    offset.x + fragment.left,
                    offset.y + fragment.top,
                    fragment.width,
                    fragment.height,
                ),
                text: fragment.text.clone(),
            })
        })
        .collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(text: &str, left: i32, top: i32) -> OcrFragment {
        OcrFragment {
            text: text.to_string(),
            left,
            top,
            width: 60,
            height: 14,
            confidence: 90.0,
        }
    }

    #[test]
    fn fragments_are_scored_ranked_and_offset() {
        let fragments = vec![
            fragment("Skin Tone", 10, 40),
            fragment("Skin", 10, 5),
            fragment("Opacity", 10, 80),
        ];
        let matches = score_fragments("Skin", &fragments, Point::new(100, 200));

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].text, "Skin");
        assert_eq!(matches[0].score, 1.0);
        assert_eq!(matches[0].bbox, Region::new(110, 205, 60, 14));
        assert_eq!(matches[1].text, "Skin Tone");
        assert!(matches[1].score < matches[0].score);
    }

    #[test]
    fn no_qualifying_fragment_means_empty_list() {
        let fragments = vec![fragment("Opacity", 0, 0)];
        assert!(score_fragments("Skin", &fragments, Point::new(0, 0)).is_empty());
    }
}
