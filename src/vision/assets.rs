//! Template asset resolution and loading.
//!
//! Lookups take a logical asset name ("group_expanded", "remove_button")
//! resolved against the assets directory. A fixed subset of assets carries
//! language-suffixed variants; those are preferred when the active language
//! has one on disk. A missing base asset is a configuration error, not a
//! recoverable miss.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::RgbaImage;

use crate::error::{AutomationError, AutomationResult};

/// Assets that exist in language-suffixed variants (`<name>_<lang>.png`).
const LOCALIZED_ASSETS: [&str; 12] = [
    "angle_input",
    "choose_file_button",
    "h_repeat_on",
    "h_repeat_off",
    "v_repeat_on",
    "v_repeat_off",
    "opacity_input",
    "remove_button",
    "remove_confirm_button",
    "size_input",
    "x_pos_input",
    "y_pos_input",
];

/// Loads and caches template bitmaps from the assets directory.
pub struct AssetLibrary {
    assets_path: PathBuf,
    language: String,
    cache: HashMap<PathBuf, RgbaImage>,
}

impl AssetLibrary {
    pub fn new(assets_path: impl Into<PathBuf>) -> Self {
        Self {
            assets_path: assets_path.into(),
            language: "en".to_string(),
            cache: HashMap::new(),
        }
    }

    /// Set the active UI language for localized template variants.
    pub fn set_language(&mut self, lang_code: &str) {
        self.language = lang_code.to_string();
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Resolve a logical asset name to a file path, preferring the
    /// language-suffixed variant when one exists for this asset.
    pub fn resolve_path(&self, name: &str) -> PathBuf {
        if LOCALIZED_ASSETS.contains(&name) {
            let localized = self
                .assets_path
                .join(format!("{}_{}.png", name, self.language));
            if localized.exists() {
                return localized;
            }
        }
        self.assets_path.join(format!("{name}.png"))
    }

    /// Load a template bitmap, caching the decoded image by resolved path.
    pub fn load(&mut self, name: &str) -> AutomationResult<RgbaImage> {
        let path = self.resolve_path(name);
        if let Some(cached) = self.cache.get(&path) {
            return Ok(cached.clone());
        }
        let image = Self::load_file(&path)?;
        self.cache.insert(path, image.clone());
        Ok(image)
    }

    /// Pixel dimensions of a template, used to derive click offsets from
    /// label positions.
    pub fn template_size(&mut self, name: &str) -> AutomationResult<(u32, u32)> {
        let image = self.load(name)?;
        Ok((image.width(), image.height()))
    }

    fn load_file(path: &Path) -> AutomationResult<RgbaImage> {
        if !path.exists() {
            return Err(AutomationError::AssetMissing {
                path: path.to_path_buf(),
            });
        }
        let image = image::open(path).map_err(|source| AutomationError::AssetLoadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(image.to_rgba8())
    }
}

impl std::fmt::Debug for AssetLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLibrary")
            .field("assets_path", &self.assets_path)
            .field("language", &self.language)
            .field("cached", &self.cache.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_png(dir: &Path, name: &str, width: u32, height: u32) {
        let image = RgbaImage::from_pixel(width, height, image::Rgba([10, 20, 30, 255]));
        image.save(dir.join(name)).unwrap();
    }

    #[test]
    fn localized_variant_wins_when_present() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "remove_button.png", 4, 4);
        write_png(dir.path(), "remove_button_ja.png", 4, 4);

        let mut assets = AssetLibrary::new(dir.path());
        assets.set_language("ja");
        assert_eq!(
            assets.resolve_path("remove_button"),
            dir.path().join("remove_button_ja.png")
        );
    }

    #[test]
    fn missing_localized_variant_falls_back_to_base() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "remove_button.png", 4, 4);

        let mut assets = AssetLibrary::new(dir.path());
        assets.set_language("de");
        assert_eq!(
            assets.resolve_path("remove_button"),
            dir.path().join("remove_button.png")
        );
    }

    #[test]
    fn non_localized_assets_ignore_language_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "group_expanded.png", 4, 4);
        write_png(dir.path(), "group_expanded_ja.png", 4, 4);

        let mut assets = AssetLibrary::new(dir.path());
        assets.set_language("ja");
        assert_eq!(
            assets.resolve_path("group_expanded"),
            dir.path().join("group_expanded.png")
        );
    }

    #[test]
    fn missing_asset_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut assets = AssetLibrary::new(dir.path());
        assert!(matches!(
            assets.load("group_expanded"),
            Err(AutomationError::AssetMissing { .. })
        ));
    }

    #[test]
    fn template_size_reads_dimensions_and_caches() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "size_input.png", 48, 16);

        let mut assets = AssetLibrary::new(dir.path());
        assert_eq!(assets.template_size("size_input").unwrap(), (48, 16));
        assert_eq!(assets.cache.len(), 1);
        // Second load hits the cache
        assert_eq!(assets.template_size("size_input").unwrap(), (48, 16));
        assert_eq!(assets.cache.len(), 1);
    }
}
