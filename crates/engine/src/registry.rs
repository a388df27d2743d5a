//! Session exclusivity registry.
//!
//! A character may have at most one progression session at a time. A second
//! concurrent session against the same character is a programming error in
//! the host, not a race to resolve, so acquisition simply fails.

use dashmap::DashMap;

use sagaforge_domain::{CharacterId, SessionId};

/// Tracks which characters currently have an active session.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    active: DashMap<CharacterId, SessionId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim exclusive ownership of a character for a session. Returns
    /// `false` if another session already owns it.
    pub fn acquire(&self, character: CharacterId, session: SessionId) -> bool {
        match self.active.entry(character) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(session);
                true
            }
        }
    }

    /// Release a character's lock, if `session` is the owner.
    pub fn release(&self, character: CharacterId, session: SessionId) {
        self.active
            .remove_if(&character, |_, owner| *owner == session);
    }

    /// Whether a character currently has an active session.
    pub fn is_active(&self, character: CharacterId) -> bool {
        self.active.contains_key(&character)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let registry = SessionRegistry::new();
        let character = CharacterId::new();
        let first = SessionId::new();
        let second = SessionId::new();

        assert!(registry.acquire(character, first));
        assert!(!registry.acquire(character, second));
        assert!(registry.is_active(character));

        registry.release(character, first);
        assert!(!registry.is_active(character));
        assert!(registry.acquire(character, second));
    }

    #[test]
    fn release_by_non_owner_is_ignored() {
        let registry = SessionRegistry::new();
        let character = CharacterId::new();
        let owner = SessionId::new();

        assert!(registry.acquire(character, owner));
        registry.release(character, SessionId::new());
        assert!(registry.is_active(character));
    }
}
