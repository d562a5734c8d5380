// Vision module - on-screen element location.
// Layered strategy: exact template matching at native scale, scale-invariant
// fallback, and fuzzy OCR text search with caller-side disambiguation.

pub mod assets;
pub mod geometry;
pub mod locator;
pub mod ocr;
pub mod template;
pub mod text_match;

// Re-export the main types and functions for easy access
pub use assets::AssetLibrary;
pub use geometry::{Point, Region};
pub use locator::{CACHE_REGION_SIZE, TextMatch, Vision};
pub use ocr::{OcrEngine, OcrFragment};
