//! In-memory session directory
//!
//! Maps sender ids to [`Sender`] records. At most `capacity` senders may be
//! active at once; deactivated senders stay in the directory so their old
//! messages keep a name.

use std::collections::BTreeMap;

use murmur_core::{
    CapacityError, Sender, SenderId, Timestamp, ValidationError, validate_display_name,
};
use thiserror::Error;
use tracing::debug;

use super::journal::DirectoryEvent;

/// Why a registration was refused
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    #[error(transparent)]
    Capacity(#[from] CapacityError),

    #[error(transparent)]
    InvalidName(#[from] ValidationError),
}

/// Bounded registry of senders
#[derive(Debug, Clone)]
pub struct SessionDirectory {
    capacity: usize,
    senders: BTreeMap<SenderId, Sender>,
    active: usize,
    next_id: SenderId,
}

impl SessionDirectory {
    /// Create an empty directory allowing `capacity` active senders
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            senders: BTreeMap::new(),
            active: 0,
            next_id: SenderId::FIRST,
        }
    }

    /// Register a sender and return its fresh id
    pub fn register(
        &mut self,
        display_name: &str,
        now: Timestamp,
    ) -> Result<SenderId, RegisterError> {
        let event = self.prepare_registration(display_name, now)?;
        let id = self.next_id;
        self.apply(&event);
        Ok(id)
    }

    /// Validate a registration without changing the directory
    ///
    /// Returns the event that [`SessionDirectory::apply`] will accept. Used by
    /// callers that must persist the event before it takes effect.
    pub fn prepare_registration(
        &self,
        display_name: &str,
        now: Timestamp,
    ) -> Result<DirectoryEvent, RegisterError> {
        validate_display_name(display_name)?;
        if self.active >= self.capacity {
            return Err(CapacityError {
                capacity: self.capacity,
            }
            .into());
        }
        Ok(DirectoryEvent::Registered {
            id: self.next_id,
            display_name: display_name.to_string(),
            registered_at: now,
        })
    }

    /// Mark a sender inactive
    ///
    /// Returns `true` if the sender was active. Unknown and already inactive
    /// ids are left alone.
    pub fn deactivate(&mut self, id: SenderId) -> bool {
        if !self.is_active(id) {
            return false;
        }
        self.apply(&DirectoryEvent::Deactivated { id });
        true
    }

    /// Apply a (validated or replayed) event
    ///
    /// Replayed registrations bypass the capacity check: they were valid when
    /// they were written.
    pub fn apply(&mut self, event: &DirectoryEvent) {
        match event {
            DirectoryEvent::Registered {
                id,
                display_name,
                registered_at,
            } => {
                if self.senders.contains_key(id) {
                    debug!(id = %id, "Ignoring duplicate registration");
                    return;
                }
                self.senders
                    .insert(*id, Sender::new(*id, display_name.clone(), *registered_at));
                self.active += 1;
                if *id >= self.next_id {
                    self.next_id = id.next();
                }
            }
            DirectoryEvent::Deactivated { id } => {
                if let Some(sender) = self.senders.get_mut(id)
                    && sender.active
                {
                    sender.active = false;
                    self.active -= 1;
                }
            }
        }
    }

    /// Look up a sender whether or not it is still active
    pub fn lookup(&self, id: SenderId) -> Option<&Sender> {
        self.senders.get(&id)
    }

    /// Whether the id belongs to an active sender
    pub fn is_active(&self, id: SenderId) -> bool {
        self.senders.get(&id).is_some_and(|s| s.active)
    }

    /// Active senders in id order
    pub fn list_active(&self) -> Vec<Sender> {
        self.senders.values().filter(|s| s.active).cloned().collect()
    }

    /// Every sender ever registered, in id order
    pub fn all(&self) -> impl Iterator<Item = &Sender> {
        self.senders.values()
    }

    /// Number of active senders
    pub fn active_count(&self) -> usize {
        self.active
    }

    /// Number of senders ever registered
    pub fn len(&self) -> usize {
        self.senders.len()
    }

    /// Whether no sender was ever registered
    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Maximum number of active senders
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use murmur_core::MAX_DISPLAY_NAME_LEN;

    fn now() -> Timestamp {
        Timestamp::from_micros(1_000)
    }

    #[test]
    fn test_register_assigns_sequential_ids() {
        let mut dir = SessionDirectory::new(10);
        assert_eq!(dir.register("alice", now()).unwrap(), SenderId(1));
        assert_eq!(dir.register("bob", now()).unwrap(), SenderId(2));
        // Names need not be unique
        assert_eq!(dir.register("alice", now()).unwrap(), SenderId(3));
        assert_eq!(dir.active_count(), 3);
    }

    #[test]
    fn test_capacity_counts_active_senders() {
        let mut dir = SessionDirectory::new(2);
        let a = dir.register("a", now()).unwrap();
        dir.register("b", now()).unwrap();

        assert_eq!(
            dir.register("c", now()),
            Err(RegisterError::Capacity(CapacityError { capacity: 2 }))
        );
        assert_eq!(dir.len(), 2);

        assert!(dir.deactivate(a));
        let c = dir.register("c", now()).unwrap();
        // Ids are never reused
        assert_eq!(c, SenderId(3));
    }

    #[test]
    fn test_invalid_names_are_rejected() {
        let mut dir = SessionDirectory::new(2);
        assert!(matches!(
            dir.register("", now()),
            Err(RegisterError::InvalidName(ValidationError::EmptyName))
        ));
        assert!(matches!(
            dir.register(&"x".repeat(MAX_DISPLAY_NAME_LEN + 1), now()),
            Err(RegisterError::InvalidName(ValidationError::NameTooLong { .. }))
        ));
        assert!(dir.is_empty());
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let mut dir = SessionDirectory::new(5);
        let id = dir.register("alice", now()).unwrap();

        assert!(dir.deactivate(id));
        assert!(!dir.deactivate(id));
        assert!(!dir.deactivate(SenderId(99)));
        assert_eq!(dir.active_count(), 0);
    }

    #[test]
    fn test_lookup_finds_inactive_senders() {
        let mut dir = SessionDirectory::new(5);
        let id = dir.register("alice", now()).unwrap();
        dir.deactivate(id);

        let sender = dir.lookup(id).unwrap();
        assert_eq!(sender.display_name, "alice");
        assert!(!sender.active);
        assert!(dir.list_active().is_empty());
        assert_eq!(dir.all().count(), 1);
    }

    #[test]
    fn test_list_active_in_id_order() {
        let mut dir = SessionDirectory::new(5);
        for name in ["carol", "alice", "bob"] {
            dir.register(name, now()).unwrap();
        }
        dir.deactivate(SenderId(2));

        let names: Vec<_> = dir
            .list_active()
            .into_iter()
            .map(|s| s.display_name)
            .collect();
        assert_eq!(names, vec!["carol", "bob"]);
    }

    #[test]
    fn test_prepare_does_not_mutate() {
        let dir = SessionDirectory::new(1);
        let first = dir.prepare_registration("a", now()).unwrap();
        let again = dir.prepare_registration("a", now()).unwrap();
        assert_eq!(first, again);
        assert!(dir.is_empty());
    }

    #[test]
    fn test_replayed_events_restore_next_id() {
        let mut dir = SessionDirectory::new(1);
        dir.apply(&DirectoryEvent::Registered {
            id: SenderId(7),
            display_name: "old".into(),
            registered_at: now(),
        });
        dir.apply(&DirectoryEvent::Deactivated { id: SenderId(7) });

        assert_eq!(dir.register("new", now()).unwrap(), SenderId(8));
    }

    #[test]
    fn test_duplicate_registration_is_ignored() {
        let mut dir = SessionDirectory::new(5);
        let event = dir.prepare_registration("alice", now()).unwrap();
        dir.apply(&event);
        dir.apply(&event);
        assert_eq!(dir.active_count(), 1);
    }
}
