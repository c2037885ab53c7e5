use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::attachment_validation::{AttachmentError, read_image_as_data_url, validate_image_url};

/// Where the draft's image came from
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachmentSource {
    File(PathBuf),
    Url,
}

/// The image attached to a draft
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DraftAttachment {
    pub source: AttachmentSource,
    /// http(s) URL or base64 `data:` URL, ready to embed
    pub url: String,
}

/// What the composer hands to the chat controller on send
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub image_url: Option<String>,
}

/// State for the message composer.
///
/// Holds the draft text and at most one image. Picking a file and typing a
/// URL are alternative ways to set the image; whichever happened last wins.
#[derive(Debug, Default)]
pub struct Composer {
    text: String,
    attachment: Option<DraftAttachment>,
    url_picker_open: bool,
}

impl Composer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    pub fn attachment(&self) -> Option<&DraftAttachment> {
        self.attachment.as_ref()
    }

    /// Attach a local image file, replacing any previous attachment.
    /// On error the previous attachment is kept.
    pub fn attach_file(&mut self, path: &Path) -> Result<(), AttachmentError> {
        match read_image_as_data_url(path) {
            Ok(url) => {
                debug!(?path, "Attached image file");
                self.attachment = Some(DraftAttachment {
                    source: AttachmentSource::File(path.to_path_buf()),
                    url,
                });
                Ok(())
            }
            Err(err) => {
                warn!(?path, ?err, "File validation failed");
                Err(err)
            }
        }
    }

    /// Attach an image by URL, replacing any previous attachment
    pub fn attach_url(&mut self, url: &str) -> Result<(), AttachmentError> {
        let url = validate_image_url(url)?;
        self.attachment = Some(DraftAttachment {
            source: AttachmentSource::Url,
            url,
        });
        self.url_picker_open = false;
        Ok(())
    }

    pub fn clear_attachment(&mut self) {
        self.attachment = None;
    }

    pub fn toggle_url_picker(&mut self) {
        self.url_picker_open = !self.url_picker_open;
    }

    pub fn is_url_picker_open(&self) -> bool {
        self.url_picker_open
    }

    /// Whether the send affordance should be enabled
    pub fn can_send(&self, is_streaming: bool) -> bool {
        !is_streaming && !self.text.trim().is_empty()
    }

    /// Take the draft for sending and reset the composer.
    ///
    /// Returns `None` (and keeps the draft) when the text is blank; an image
    /// on its own is not sendable.
    pub fn send(&mut self) -> Option<OutboundMessage> {
        if self.text.trim().is_empty() {
            debug!("Message is empty, not sending");
            return None;
        }

        let outbound = OutboundMessage {
            text: std::mem::take(&mut self.text),
            image_url: self.attachment.take().map(|a| a.url),
        };
        self.url_picker_open = false;
        Some(outbound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_blank_send_is_noop_even_with_attachment() {
        let mut composer = Composer::new();
        composer.set_text("   \n");
        composer.attach_url("https://example.com/a.png").unwrap();

        assert!(composer.send().is_none());
        assert!(composer.attachment().is_some());
        assert_eq!(composer.text(), "   \n");
    }

    #[test]
    fn test_send_emits_and_clears_everything() {
        let mut composer = Composer::new();
        composer.set_text("What is in this picture?");
        composer.toggle_url_picker();
        composer.attach_url("https://example.com/a.png").unwrap();
        composer.toggle_url_picker();

        let outbound = composer.send().unwrap();
        assert_eq!(outbound.text, "What is in this picture?");
        assert_eq!(outbound.image_url.as_deref(), Some("https://example.com/a.png"));
        assert_eq!(composer.text(), "");
        assert!(composer.attachment().is_none());
        assert!(!composer.is_url_picker_open());
    }

    #[test]
    fn test_last_attachment_wins() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("pic.png");
        std::fs::write(&path, [0x89, b'P', b'N', b'G']).unwrap();

        let mut composer = Composer::new();
        composer.attach_url("https://example.com/a.png").unwrap();
        composer.attach_file(&path).unwrap();
        let attachment = composer.attachment().unwrap();
        assert_eq!(attachment.source, AttachmentSource::File(path.clone()));
        assert!(attachment.url.starts_with("data:image/png;base64,"));

        composer.attach_url("https://example.com/b.png").unwrap();
        let attachment = composer.attachment().unwrap();
        assert_eq!(attachment.source, AttachmentSource::Url);
        assert_eq!(attachment.url, "https://example.com/b.png");
    }

    #[test]
    fn test_failed_attach_keeps_previous() {
        let mut composer = Composer::new();
        composer.attach_url("https://example.com/a.png").unwrap();

        assert!(composer.attach_url("not a url").is_err());
        assert!(composer.attach_file(Path::new("/definitely/missing.png")).is_err());
        assert_eq!(composer.attachment().unwrap().url, "https://example.com/a.png");
    }

    #[test]
    fn test_can_send() {
        let mut composer = Composer::new();
        assert!(!composer.can_send(false));
        composer.set_text("hi");
        assert!(composer.can_send(false));
        assert!(!composer.can_send(true));
    }
}
