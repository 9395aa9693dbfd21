use chrono::NaiveDate;

use crate::model::{booking_week, in_booking_window, SlotState, MAX_OCCUPANTS};

use super::EngineError;

/// The single implicit local clock.
pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Gate applied to every mutation before any capacity or lock rule.
pub(crate) fn check_window(date: NaiveDate, today: NaiveDate) -> Result<(), EngineError> {
    if in_booking_window(date, today) {
        return Ok(());
    }
    let (week_start, week_end) = booking_week(today);
    Err(EngineError::OutOfWindow { date, week_start, week_end })
}

/// A state that already violates an invariant is a data-integrity condition.
/// It is reported as-is; nothing is repaired.
pub(crate) fn check_integrity(state: &SlotState) -> Result<(), EngineError> {
    if state.holders.len() > MAX_OCCUPANTS {
        return Err(EngineError::CorruptSlot(format!(
            "{} holders persisted, limit is {MAX_OCCUPANTS}",
            state.holders.len()
        )));
    }
    if state.locked && state.holders.is_empty() {
        return Err(EngineError::CorruptSlot("locked slot with no holders".into()));
    }
    Ok(())
}

/// Denial priority: already-holding beats locked beats full.
pub(crate) fn can_book(state: &SlotState, user: &str) -> Result<(), EngineError> {
    if state.holds(user) {
        return Err(EngineError::UserAlreadyHolds);
    }
    if state.locked {
        return Err(EngineError::SlotLocked);
    }
    if state.is_full() {
        return Err(EngineError::SlotFull);
    }
    Ok(())
}

pub(crate) fn can_lock(state: &SlotState, user: &str) -> Result<(), EngineError> {
    check_first_holder(state, user)?;
    if state.locked {
        return Err(EngineError::AlreadyLocked);
    }
    Ok(())
}

pub(crate) fn can_unlock(state: &SlotState, user: &str) -> Result<(), EngineError> {
    check_first_holder(state, user)?;
    if !state.locked {
        return Err(EngineError::NotLocked);
    }
    Ok(())
}

fn check_first_holder(state: &SlotState, user: &str) -> Result<(), EngineError> {
    match state.first_holder() {
        Some(first) if first.user == user => Ok(()),
        _ => Err(EngineError::NotFirstHolder),
    }
}
