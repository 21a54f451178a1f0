//! Content source resolution for a player.
//!
//! A source is `project/mediaType[/subfolder]`. The server announces one on
//! connect and on every `setSource`; each player decides what to actually
//! show:
//! - a player pinned to a media type shows that type of the announced project
//! - a player started with an explicit source keeps it until the first
//!   server announcement has been seen
//! - otherwise the announced source is used as-is
//!
//! Re-announcing the current source is ignored, so a player does not restart
//! on the echo of its own navigation.

/// Parsed `project/mediaType[/subfolder]` source id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRef {
    pub project: String,
    pub media_type: String,
    pub subfolder: Option<String>,
}

impl SourceRef {
    /// Parse a source id; `None` when the project or media type is missing.
    #[must_use]
    pub fn parse(source: &str) -> Option<Self> {
        let mut parts = source.split('/').filter(|p| !p.is_empty());
        let project = parts.next()?.to_owned();
        let media_type = parts.next()?.to_owned();
        let subfolder = parts.next().map(str::to_owned);
        Some(Self { project, media_type, subfolder })
    }
}

#[derive(Debug, Clone, Default)]
pub struct SourceResolver {
    pinned_media: Option<String>,
    explicit: Option<String>,
    seen_announcement: bool,
    current: Option<String>,
}

impl SourceResolver {
    /// `explicit` becomes the current source immediately.
    #[must_use]
    pub fn new(pinned_media: Option<String>, explicit: Option<String>) -> Self {
        let current = explicit.clone();
        Self { pinned_media, explicit, seen_announcement: false, current }
    }

    #[must_use]
    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Feed a server announcement. Returns the new source when it changed.
    pub fn resolve(&mut self, announced: &str) -> Option<String> {
        let wanted = if let Some(media) = &self.pinned_media {
            announced
                .split('/')
                .next()
                .filter(|p| !p.is_empty())
                .map(|project| format!("{project}/{media}"))
        } else if self.explicit.is_some() && !self.seen_announcement {
            self.explicit.clone()
        } else if announced.is_empty() {
            None
        } else {
            Some(announced.to_owned())
        };
        self.seen_announcement = true;

        let wanted = wanted?;
        if self.current.as_deref() == Some(wanted.as_str()) {
            return None;
        }
        self.current = Some(wanted.clone());
        Some(wanted)
    }
}
