//! System clipboard access for the file-path paste flow.

use arboard::Clipboard;

use crate::error::{AutomationError, AutomationResult};

/// Lazily initialized handle to the system clipboard.
///
/// Initialization is deferred to first use so that sessions which never
/// upload anything (pure removal runs) never touch the clipboard.
#[derive(Default)]
pub struct SystemClipboard {
    inner: Option<Clipboard>,
}

impl SystemClipboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn clipboard(&mut self) -> AutomationResult<&mut Clipboard> {
        let clipboard = match self.inner.take() {
            Some(clipboard) => clipboard,
            None => Clipboard::new().map_err(|e| AutomationError::ClipboardFailed {
                description: format!("Failed to open clipboard: {e}"),
            })?,
        };
        Ok(self.inner.insert(clipboard))
    }

    /// Current clipboard text, or `None` when the clipboard holds no text.
    pub fn get_text(&mut self) -> AutomationResult<Option<String>> {
        match self.clipboard()?.get_text() {
            Ok(text) => Ok(Some(text)),
            Err(arboard::Error::ContentNotAvailable) => Ok(None),
            Err(e) => Err(AutomationError::ClipboardFailed {
                description: format!("Failed to read clipboard: {e}"),
            }),
        }
    }

    pub fn set_text(&mut self, text: &str) -> AutomationResult<()> {
        self.clipboard()?
            .set_text(text.to_string())
            .map_err(|e| AutomationError::ClipboardFailed {
                description: format!("Failed to write clipboard: {e}"),
            })
    }
}

impl std::fmt::Debug for SystemClipboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemClipboard")
            .field("initialized", &self.inner.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction_is_lazy() {
        let clipboard = SystemClipboard::new();
        assert!(clipboard.inner.is_none());
    }
}
