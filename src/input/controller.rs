//! Mouse and keyboard simulation.

use std::time::Duration;

use enigo::{Axis, Button, Coordinate, Direction, Enigo, Key, Keyboard, Mouse, Settings};

use crate::cancel::CancelToken;
use crate::error::{AutomationError, AutomationResult};
use crate::logging::Logger;
use crate::vision::geometry::Point;

/// Settle delay after every discrete input action.
const ACTION_DELAY: Duration = Duration::from_millis(100);

/// Handles all mouse and keyboard simulation.
///
/// The OS input backend is opened per action and never stored, so the
/// controller can travel into the worker thread freely and constructing it
/// never requires a display. Actions are cancellable between discrete steps
/// via the shared token.
pub struct InputController {
    token: CancelToken,
    logger: Logger,
}

impl InputController {
    pub fn new(token: CancelToken, logger: Logger) -> Self {
        Self { token, logger }
    }

    fn enigo() -> AutomationResult<Enigo> {
        Enigo::new(&Settings::default()).map_err(|e| AutomationError::InputFailed {
            description: format!("Failed to initialize input backend: {e}"),
        })
    }

    fn settle(&self) -> AutomationResult<()> {
        self.token.sleep(ACTION_DELAY)
    }

    /// Move the pointer to an absolute screen position.
    pub fn move_to(&mut self, point: Point) -> AutomationResult<()> {
        self.token.check()?;
        Self::enigo()?
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to move mouse: {e}"),
            })?;
        self.settle()
    }

    /// Move to a point and left-click it.
    pub fn click(&mut self, point: Point) -> AutomationResult<()> {
        self.click_times(point, 1)
    }

    /// Move to a point and click `clicks` times, with a short pause between
    /// clicks (a triple click selects the whole content of an input field).
    pub fn click_times(&mut self, point: Point, clicks: u32) -> AutomationResult<()> {
        self.token.check()?;
        self.logger.line(format!("  - Clicking at {point}"));
        let mut enigo = Self::enigo()?;
        enigo
            .move_mouse(point.x, point.y, Coordinate::Abs)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to move mouse: {e}"),
            })?;
        for i in 0..clicks {
            if i > 0 {
                self.token.sleep(Duration::from_millis(100))?;
            }
            enigo
                .button(Button::Left, Direction::Click)
                .map_err(|e| AutomationError::InputFailed {
                    description: format!("Failed to click: {e}"),
                })?;
        }
        self.settle()
    }

    /// Type a string of text in one burst.
    pub fn type_text(&mut self, text: &str) -> AutomationResult<()> {
        self.token.check()?;
        self.logger
            .line(format!("  - Typing: '{}'", truncate_for_log(text)));
        Self::enigo()?
            .text(text)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to type text: {e}"),
            })?;
        self.settle()
    }

    /// Type character by character with a delay, the slow-but-robust
    /// fallback when clipboard paste cannot be verified.
    pub fn type_text_slow(&mut self, text: &str, interval: Duration) -> AutomationResult<()> {
        self.logger
            .line(format!("  - Typing slowly: '{}'", truncate_for_log(text)));
        let mut enigo = Self::enigo()?;
        let mut buffer = [0u8; 4];
        for ch in text.chars() {
            self.token.check()?;
            enigo
                .text(ch.encode_utf8(&mut buffer))
                .map_err(|e| AutomationError::InputFailed {
                    description: format!("Failed to type text: {e}"),
                })?;
            self.token.sleep(interval)?;
        }
        self.settle()
    }

    /// Press and release a single key.
    pub fn press(&mut self, key: Key) -> AutomationResult<()> {
        self.token.check()?;
        self.logger.line(format!("  - Pressing key: {key:?}"));
        Self::enigo()?
            .key(key, Direction::Click)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to press key: {e}"),
            })?;
        self.settle()
    }

    /// Hold a modifier while clicking another key (e.g. Ctrl+V).
    pub fn hotkey(&mut self, modifier: Key, key: Key) -> AutomationResult<()> {
        self.token.check()?;
        self.logger
            .line(format!("  - Pressing hotkey: {modifier:?}+{key:?}"));
        let mut enigo = Self::enigo()?;
        enigo
            .key(modifier, Direction::Press)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to press modifier: {e}"),
            })?;
        let result = enigo.key(key, Direction::Click);
        let release = enigo.key(modifier, Direction::Release);
        result.map_err(|e| AutomationError::InputFailed {
            description: format!("Failed to press hotkey: {e}"),
        })?;
        release.map_err(|e| AutomationError::InputFailed {
            description: format!("Failed to release modifier: {e}"),
        })?;
        self.settle()
    }

    /// Scroll the wheel down by `amount` units.
    pub fn scroll_down(&mut self, amount: i32) -> AutomationResult<()> {
        self.token.check()?;
        self.logger.line(format!("  - Scrolling down by {amount}"));
        Self::enigo()?
            .scroll(amount, Axis::Vertical)
            .map_err(|e| AutomationError::InputFailed {
                description: format!("Failed to scroll: {e}"),
            })?;
        self.settle()
    }

    /// Platform modifier for clipboard paste.
    pub fn paste_modifier() -> Key {
        if cfg!(target_os = "macos") {
            Key::Meta
        } else {
            Key::Control
        }
    }
}

impl std::fmt::Debug for InputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputController").finish_non_exhaustive()
    }
}

fn truncate_for_log(text: &str) -> String {
    if text.chars().count() <= 30 {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(30).collect();
        format!("{prefix}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stopped_token_blocks_actions_before_backend_init() {
        let token = CancelToken::new();
        token.request_stop();
        let mut controller = InputController::new(token, Logger::stdout());
        let result = controller.click(Point::new(10, 10));
        assert!(matches!(result, Err(AutomationError::Stopped)));
    }

    #[test]
    fn paste_modifier_matches_the_platform() {
        let modifier = InputController::paste_modifier();
        if cfg!(target_os = "macos") {
            assert!(matches!(modifier, Key::Meta));
        } else {
            assert!(matches!(modifier, Key::Control));
        }
    }

    #[test]
    fn log_truncation_keeps_short_text_intact() {
        assert_eq!(truncate_for_log("short"), "short");
        let long = "x".repeat(64);
        let truncated = truncate_for_log(&long);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncated.chars().count(), 33);
    }
}
