//! `arboard`-backed [`ClipboardService`] (spec §6).

use crate::collab::notify::{ClipboardImage, ClipboardService};
use crate::core::error::CoreError;

pub struct ArboardClipboardService;

impl ArboardClipboardService {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ArboardClipboardService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl ClipboardService for ArboardClipboardService {
    async fn read_image(&self) -> Result<Option<ClipboardImage>, CoreError> {
        tokio::task::spawn_blocking(|| {
            let mut clipboard = arboard::Clipboard::new()
                .map_err(|err| CoreError::transient("<clipboard>", err))?;

            match clipboard.get_image() {
                Ok(image) => {
                    let image = ClipboardImage {
                        data: image.bytes.into_owned(),
                        media_type: "image/png".to_string(),
                        size_bytes: image.width * image.height * 4,
                    };
                    image.validate()?;
                    Ok(Some(image))
                }
                Err(arboard::Error::ContentNotAvailable) => Ok(None),
                Err(err) => Err(CoreError::transient("<clipboard>", err)),
            }
        })
        .await
        .map_err(|err| CoreError::fatal("<clipboard>", err))?
    }
}
