//! Outbound relay messages.

/// One message bound for the webhook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    /// Message body.
    pub text: String,
    /// Relative-time markup rendered ahead of the body.
    pub timestamp_tag: Option<String>,
}

impl OutboundMessage {
    /// Create a message without a timestamp tag.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp_tag: None,
        }
    }

    /// Attach a rendered timestamp tag.
    #[must_use]
    pub fn with_timestamp_tag(mut self, tag: impl Into<String>) -> Self {
        self.timestamp_tag = Some(tag.into());
        self
    }

    /// Announcement sent once before a relay session starts tailing.
    #[must_use]
    pub fn announcement(listener: &str) -> Self {
        Self::new(format!("Relaying fleet chat for `{listener}`"))
    }

    /// The full `content` field posted to the webhook.
    #[must_use]
    pub fn content(&self) -> String {
        match &self.timestamp_tag {
            Some(tag) => format!("{tag} {}", self.text),
            None => self.text.clone(),
        }
    }
}
