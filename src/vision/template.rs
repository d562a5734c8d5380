//! Correlation-based template matching.
//!
//! Single best-match search runs at native scale first and falls back to a
//! fixed set of alternate scales to tolerate DPI differences, keeping the
//! best-scoring candidate across scales. Absence of a match is a first-class
//! outcome, not a failure.

use image::imageops::FilterType;
use image::{GrayImage, RgbaImage};
use imageproc::template_matching::{MatchTemplateMethod, match_template};

/// Scales tried after the native-resolution pass.
pub const ALTERNATE_SCALES: [f32; 3] = [1.25, 0.75, 1.5];

/// Matches closer together than this are treated as one instance.
pub const DEDUP_RADIUS: f64 = 15.0;

/// One template occurrence, in coordinates relative to the searched image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BitmapMatch {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub confidence: f32,
    pub scale: f32,
}

impl BitmapMatch {
    /// Center of the matched area, relative to the searched image.
    pub fn center(&self) -> (u32, u32) {
        (self.x + self.width / 2, self.y + self.height / 2)
    }
}

/// Find the best occurrence of `template` in `haystack` across the native
/// scale and the alternate scales, reporting it only if it clears
/// `confidence`.
pub fn best_match(haystack: &RgbaImage, template: &RgbaImage, confidence: f32) -> Option<BitmapMatch> {
    let haystack_gray = to_gray(haystack);
    let template_gray = to_gray(template);

    let mut best: Option<BitmapMatch> = None;
    for scale in std::iter::once(1.0f32).chain(ALTERNATE_SCALES) {
        let Some(candidate) = best_match_at_scale(&haystack_gray, &template_gray, scale) else {
            continue;
        };
        log::debug!(
            "template match at scale {:.2}: confidence {:.3}",
            scale,
            candidate.confidence
        );
        if best.is_none_or(|b| candidate.confidence > b.confidence) {
            best = Some(candidate);
        }
    }

    best.filter(|m| m.confidence >= confidence)
}

/// Find every occurrence of `template` in `haystack` at native scale,
/// de-duplicating near-coincident hits.
pub fn all_matches(haystack: &RgbaImage, template: &RgbaImage, confidence: f32) -> Vec<BitmapMatch> {
    let haystack_gray = to_gray(haystack);
    let template_gray = to_gray(template);

    if template_gray.width() > haystack_gray.width()
        || template_gray.height() > haystack_gray.height()
    {
        return Vec::new();
    }

    let scores = match_template(
        &haystack_gray,
        &template_gray,
        MatchTemplateMethod::CrossCorrelationNormalized,
    );

    let mut matches = Vec::new();
    for (x, y, pixel) in scores.enumerate_pixels() {
        let score = pixel[0];
        if score >= confidence {
            matches.push(BitmapMatch {
                x,
                y,
                width: template_gray.width(),
                height: template_gray.height(),
                confidence: score,
                scale: 1.0,
            });
        }
    }

    dedup_nearby(matches)
}

fn best_match_at_scale(
    haystack: &GrayImage,
    template: &GrayImage,
    scale: f32,
) -> Option<BitmapMatch> {
    let scaled = if (scale - 1.0).abs() > 0.01 {
        let width = (template.width() as f32 * scale) as u32;
        let height = (template.height() as f32 * scale) as u32;
        if width == 0 || height == 0 {
            return None;
        }
        image::imageops::resize(template, width, height, FilterType::Lanczos3)
    } else {
        template.clone()
    };

    if scaled.width() > haystack.width() || scaled.height() > haystack.height() {
        return None;
    }

    let scores = match_template(haystack, &scaled, MatchTemplateMethod::CrossCorrelationNormalized);

    let mut best_score = f32::MIN;
    let mut best_pos = (0u32, 0u32);
    for (x, y, pixel) in scores.enumerate_pixels() {
        if pixel[0] > best_score {
            best_score = pixel[0];
            best_pos = (x, y);
        }
    }
    if best_score == f32::MIN {
        return None;
    }

    Some(BitmapMatch {
        x: best_pos.0,
        y: best_pos.1,
        width: scaled.width(),
        height: scaled.height(),
        confidence: best_score,
        scale,
    })
}

/// Collapse hits within `DEDUP_RADIUS` pixels of an already kept hit.
fn dedup_nearby(matches: Vec<BitmapMatch>) -> Vec<BitmapMatch> {
    let mut kept: Vec<BitmapMatch> = Vec::new();
    for candidate in matches {
        let far_enough = kept.iter().all(|existing| {
            let dx = candidate.x as f64 - existing.x as f64;
            let dy = candidate.y as f64 - existing.y as f64;
            (dx * dx + dy * dy).sqrt() > DEDUP_RADIUS
        });
        if far_enough {
            kept.push(candidate);
        }
    }
    kept
}

fn to_gray(image: &RgbaImage) -> GrayImage {
    image::DynamicImage::ImageRgba8(image.clone()).to_luma8()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    /// Checkerboard pattern that correlates poorly with flat backgrounds.
    fn pattern(size: u32) -> RgbaImage {
        RgbaImage::from_fn(size, size, |x, y| {
            if (x + y) % 2 == 0 {
                Rgba([200, 200, 200, 255])
            } else {
                Rgba([40, 40, 40, 255])
            }
        })
    }

    fn haystack_with_pattern_at(positions: &[(u32, u32)], size: u32) -> RgbaImage {
        let mut haystack = RgbaImage::from_pixel(100, 100, Rgba([50, 50, 50, 255]));
        let patch = pattern(size);
        for &(px, py) in positions {
            image::imageops::overlay(&mut haystack, &patch, px as i64, py as i64);
        }
        haystack
    }

    #[test]
    fn finds_an_exact_occurrence() {
        let haystack = haystack_with_pattern_at(&[(30, 40)], 10);
        let found = best_match(&haystack, &pattern(10), 0.95).expect("pattern present");
        assert_eq!((found.x, found.y), (30, 40));
        assert!(found.confidence > 0.99);
        assert_eq!(found.scale, 1.0);
        assert_eq!(found.center(), (35, 45));
    }

    #[test]
    fn absence_is_a_none_result() {
        let haystack = RgbaImage::from_pixel(60, 60, Rgba([50, 50, 50, 255]));
        assert!(best_match(&haystack, &pattern(10), 0.95).is_none());
    }

    #[test]
    fn oversized_template_yields_no_matches() {
        let haystack = RgbaImage::from_pixel(8, 8, Rgba([50, 50, 50, 255]));
        assert!(best_match(&haystack, &pattern(16), 0.5).is_none());
        assert!(all_matches(&haystack, &pattern(16), 0.5).is_empty());
    }

    #[test]
    fn confidence_filtering_is_monotonic() {
        let haystack = haystack_with_pattern_at(&[(10, 10), (60, 60)], 10);
        let template = pattern(10);

        let strict = all_matches(&haystack, &template, 0.97);
        let loose = all_matches(&haystack, &template, 0.9);

        assert!(!strict.is_empty());
        for hit in &strict {
            assert!(
                loose.iter().any(|l| l.x == hit.x && l.y == hit.y),
                "match accepted at 0.97 must also be accepted at 0.9"
            );
        }
        // Same for the single-match entry point
        assert!(best_match(&haystack, &template, 0.97).is_some());
        assert!(best_match(&haystack, &template, 0.6).is_some());
    }

    #[test]
    fn all_matches_deduplicates_near_coincident_hits() {
        let haystack = haystack_with_pattern_at(&[(10, 10), (60, 60)], 10);
        let found = all_matches(&haystack, &pattern(10), 0.95);
        assert_eq!(found.len(), 2, "two well-separated instances expected");

        let mut positions: Vec<(u32, u32)> = found.iter().map(|m| (m.x, m.y)).collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![(10, 10), (60, 60)]);
    }
}
