//! Notification and clipboard collaborator contracts (spec §6).

use async_trait::async_trait;

use crate::core::error::CoreError;

#[cfg_attr(test, mockall::automock)]
pub trait NotificationService: Send + Sync {
    /// Fires an off-screen desktop notification that a session finished.
    fn session_completed(&self, name: &str);

    /// Fires a flash-style warning (e.g. auto-merge gave up, CI failing).
    fn warn(&self, message: &str);
}

#[derive(Debug, Clone)]
pub struct ClipboardImage {
    pub data: Vec<u8>,
    pub media_type: String,
    pub size_bytes: usize,
}

impl ClipboardImage {
    /// Rejects implausible images (empty payload or bad mime family).
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.data.is_empty() {
            return Err(CoreError::UserInput("clipboard image is empty".to_string()));
        }
        if !self.media_type.starts_with("image/") {
            return Err(CoreError::UserInput(format!(
                "unsupported clipboard media type: {}",
                self.media_type
            )));
        }
        Ok(())
    }
}

#[async_trait]
#[cfg_attr(test, mockall::automock)]
pub trait ClipboardService: Send + Sync {
    async fn read_image(&self) -> Result<Option<ClipboardImage>, CoreError>;
}
