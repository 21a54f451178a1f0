//! Playback session state for one client.

/// Timing role of the local device.
///
/// The master's attached audio is the timing reference for its own visuals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncRole {
    Master,
    #[default]
    Slave,
}

/// The shared-clock instant the current playback started at, if any.
///
/// `active` and `target_instant` are set and cleared together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackSession {
    target_instant: Option<i64>,
    role: SyncRole,
}

impl PlaybackSession {
    #[must_use]
    pub fn new(role: SyncRole) -> Self {
        Self { target_instant: None, role }
    }

    pub fn begin(&mut self, target_instant: i64) {
        self.target_instant = Some(target_instant);
    }

    pub fn clear(&mut self) {
        self.target_instant = None;
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.target_instant.is_some()
    }

    #[must_use]
    pub fn target_instant(&self) -> Option<i64> {
        self.target_instant
    }

    #[must_use]
    pub fn role(&self) -> SyncRole {
        self.role
    }

    pub fn set_role(&mut self, role: SyncRole) {
        self.role = role;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_inactive() {
        let session = PlaybackSession::new(SyncRole::Master);
        assert!(!session.is_active());
        assert_eq!(session.target_instant(), None);
        assert_eq!(session.role(), SyncRole::Master);
    }

    #[test]
    fn begin_and_clear_move_together() {
        let mut session = PlaybackSession::default();
        session.begin(1_234);
        assert!(session.is_active());
        assert_eq!(session.target_instant(), Some(1_234));

        session.clear();
        assert!(!session.is_active());
        assert_eq!(session.target_instant(), None);
        assert_eq!(session.role(), SyncRole::Slave);
    }
}
