use crate::identity::Caller;
use crate::model::{Event, SlotKey, SlotState, UserId};
use crate::observability;

use super::{policy, Engine, EngineError};

impl Engine {
    /// Add the caller as a holder of the slot. Check order: authentication,
    /// booking window, slot integrity, then the booking policy — the whole
    /// read-decide-append-apply sequence runs under the slot's write lock.
    pub async fn book(&self, key: SlotKey, caller: &Caller) -> Result<(), EngineError> {
        let user = resolve(caller)?;
        policy::check_window(key.date, policy::today())?;

        let slot = self.slot_entry(key);
        let mut guard = slot.write().await;
        policy::check_integrity(&guard)?;
        policy::can_book(&guard, &user)?;

        let event = Event::HolderAdded {
            booking_id: self.next_booking_id(),
            key,
            user,
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
        Ok(())
    }

    /// Lock the slot against further bookings. First-holder privilege.
    pub async fn lock(&self, key: SlotKey, caller: &Caller) -> Result<(), EngineError> {
        self.set_locked(key, caller, true).await
    }

    /// Release the lock. First-holder privilege.
    pub async fn unlock(&self, key: SlotKey, caller: &Caller) -> Result<(), EngineError> {
        self.set_locked(key, caller, false).await
    }

    async fn set_locked(
        &self,
        key: SlotKey,
        caller: &Caller,
        locked: bool,
    ) -> Result<(), EngineError> {
        let user = resolve(caller)?;
        policy::check_window(key.date, policy::today())?;

        let slot = self.slot_entry(key);
        let mut guard = slot.write().await;
        policy::check_integrity(&guard)?;
        if locked {
            policy::can_lock(&guard, &user)?;
        } else {
            policy::can_unlock(&guard, &user)?;
        }

        let event = if locked {
            Event::SlotLocked { key }
        } else {
            Event::SlotUnlocked { key }
        };
        self.persist_and_apply(&mut guard, &event).await?;
        metrics::counter!(observability::LOCK_CHANGES_TOTAL).increment(1);
        Ok(())
    }
}

fn resolve(caller: &Caller) -> Result<UserId, EngineError> {
    caller
        .authorized_user()
        .cloned()
        .ok_or(EngineError::NotLoggedIn)
}

/// Store-level guard: a lock mark for a holderless slot must never be
/// persisted, whatever the policy upstream decided.
pub(super) fn guard_lock_event(state: &SlotState, event: &Event) -> Result<(), EngineError> {
    match event {
        Event::SlotLocked { .. } | Event::SlotUnlocked { .. } if state.holders.is_empty() => {
            Err(EngineError::SlotEmpty)
        }
        _ => Ok(()),
    }
}
