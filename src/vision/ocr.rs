//! Text extraction through the external `tesseract` binary.
//!
//! The engine writes the captured region to a temporary PNG, invokes
//! tesseract with TSV output and folds the recognized words back into line
//! fragments with bounding boxes. English and Japanese models are loaded
//! together so localized group names resolve without reconfiguration.

use std::path::PathBuf;
use std::process::Command;

use image::RgbaImage;

use crate::error::{AutomationError, AutomationResult};

/// One recognized text fragment with its bounding box relative to the
/// OCR'd image.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrFragment {
    pub text: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

/// OCR engine driving the `tesseract` CLI.
pub struct OcrEngine {
    languages: String,
    verified: bool,
}

impl Default for OcrEngine {
    fn default() -> Self {
        Self {
            languages: "eng+jpn".to_string(),
            verified: false,
        }
    }
}

impl OcrEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_tesseract_available(&mut self) -> AutomationResult<()> {
        if self.verified {
            return Ok(());
        }
        match Command::new("tesseract").arg("--version").output() {
            Ok(out) if out.status.success() => {
                self.verified = true;
                Ok(())
            }
            Ok(out) => Err(AutomationError::OcrFailed {
                description: format!(
                    "'tesseract' command found but returned non-zero ({})",
                    out.status
                ),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AutomationError::OcrUnavailable)
            }
            Err(e) => Err(AutomationError::OcrFailed {
                description: format!("Failed to invoke 'tesseract': {e}"),
            }),
        }
    }

    /// Recognize all text in an image, returning line fragments sorted in
    /// reading order.
    pub fn recognize(&mut self, image: &RgbaImage) -> AutomationResult<Vec<OcrFragment>> {
        self.ensure_tesseract_available()?;

        let frame_path = temp_frame_path();
        image
            .save(&frame_path)
            .map_err(|e| AutomationError::OcrFailed {
                description: format!("Failed to write OCR frame {frame_path:?}: {e}"),
            })?;

        let output = Command::new("tesseract")
            .arg(&frame_path)
            .arg("stdout")
            .args(["--psm", "6", "-l", &self.languages, "tsv"])
            .output();
        let _ = std::fs::remove_file(&frame_path);

        let output = output.map_err(|e| AutomationError::OcrFailed {
            description: format!("Failed to run tesseract: {e}"),
        })?;
        if !output.status.success() {
            return Err(AutomationError::OcrFailed {
                description: format!(
                    "tesseract failed: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            });
        }

        Ok(parse_tsv(&String::from_utf8_lossy(&output.stdout)))
    }
}

impl std::fmt::Debug for OcrEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrEngine")
            .field("languages", &self.languages)
            .finish()
    }
}

fn temp_frame_path() -> PathBuf {
    std::env::temp_dir().join(format!("texture-slot-ocr-{}.png", std::process::id()))
}

/// Fold tesseract's word-level TSV rows into line fragments.
///
/// TSV columns: level page_num block_num par_num line_num word_num left top
/// width height conf text. Word rows carry level 5; rows with negative
/// confidence or blank text are layout artifacts and skipped.
fn parse_tsv(tsv: &str) -> Vec<OcrFragment> {
    struct LineAccumulator {
        key: (u32, u32, u32, u32),
        words: Vec<String>,
        left: i32,
        top: i32,
        right: i32,
        bottom: i32,
        confidence_sum: f32,
    }

    let mut lines: Vec<LineAccumulator> = Vec::new();

    for row in tsv.lines().skip(1) {
        let columns: Vec<&str> = row.split('\t').collect();
        if columns.len() < 12 {
            continue;
        }
        let Ok(level) = columns[0].parse::<u32>() else {
            continue;
        };
        if level != 5 {
            continue;
        }
        let Ok(confidence) = columns[10].parse::<f32>() else {
            continue;
        };
        let text = columns[11].trim();
        if confidence < 0.0 || text.is_empty() {
            continue;
        }
        let (Ok(page), Ok(block), Ok(par), Ok(line)) = (
            columns[1].parse::<u32>(),
            columns[2].parse::<u32>(),
            columns[3].parse::<u32>(),
            columns[4].parse::<u32>(),
        ) else {
            continue;
        };
        let (Ok(left), Ok(top), Ok(width), Ok(height)) = (
            columns[6].parse::<i32>(),
            columns[7].parse::<i32>(),
            columns[8].parse::<i32>(),
            columns[9].parse::<i32>(),
        ) else {
            continue;
        };

        let key = (page, block, par, line);
        match lines.last_mut() {
            Some(acc) if acc.key == key => {
                acc.words.push(text.to_string());
                acc.left = acc.left.min(left);
                acc.top = acc.top.min(top);
                acc.right = acc.right.max(left + width);
                acc.bottom = acc.bottom.max(top + height);
                acc.confidence_sum += confidence;
            }
            _ => lines.push(LineAccumulator {
                key,
                words: vec![text.to_string()],
                left,
                top,
                right: left + width,
                bottom: top + height,
                confidence_sum: confidence,
            }),
        }
    }

    lines
        .into_iter()
        .map(|acc| OcrFragment {
            text: acc.words.join(" "),
            left: acc.left,
            top: acc.top,
            width: acc.right - acc.left,
            height: acc.bottom - acc.top,
            confidence: acc.confidence_sum / acc.words.len() as f32,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str =
        "level\tpage_num\tblock_num\tpar_num\tline_num\tword_num\tleft\ttop\twidth\theight\tconf\ttext";

    #[test]
    fn words_on_one_line_are_joined() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t5\t40\t12\t91.5\tSkin\n\
             5\t1\t1\t1\t1\t2\t55\t5\t45\t12\t88.5\tTone\n"
        );
        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments.len(), 1);
        let fragment = &fragments[0];
        assert_eq!(fragment.text, "Skin Tone");
        assert_eq!(
            (fragment.left, fragment.top, fragment.width, fragment.height),
            (10, 5, 90, 12)
        );
        assert!((fragment.confidence - 90.0).abs() < 1e-3);
    }

    #[test]
    fn separate_lines_stay_separate() {
        let tsv = format!(
            "{HEADER}\n\
             5\t1\t1\t1\t1\t1\t10\t5\t40\t12\t91.0\tSkin\n\
             5\t1\t1\t1\t2\t1\t10\t25\t60\t12\t85.0\tClothes\n"
        );
        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].text, "Skin");
        assert_eq!(fragments[1].text, "Clothes");
        assert_eq!(fragments[1].top, 25);
    }

    #[test]
    fn layout_rows_and_blank_words_are_skipped() {
        let tsv = format!(
            "{HEADER}\n\
             1\t1\t0\t0\t0\t0\t0\t0\t200\t100\t-1\t\n\
             4\t1\t1\t1\t1\t0\t10\t5\t90\t12\t-1\t\n\
             5\t1\t1\t1\t1\t1\t10\t5\t40\t12\t-1\t \n\
             5\t1\t1\t1\t1\t2\t55\t5\t45\t12\t77.0\tBase\n"
        );
        let fragments = parse_tsv(&tsv);
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].text, "Base");
    }

    #[test]
    fn empty_output_parses_to_no_fragments() {
        assert!(parse_tsv(HEADER).is_empty());
        assert!(parse_tsv("").is_empty());
    }
}
