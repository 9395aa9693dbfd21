use chrono::NaiveDate;

use crate::grid::{DayGrid, SlotView};
use crate::model::{CourtId, SlotKey, SlotState, SlotTime};

use super::Engine;

impl Engine {
    /// Snapshot one slot. Absent slots read as empty and unlocked. Reads are
    /// consistent per slot, not across slots, and are never window-gated:
    /// any date may be viewed.
    pub async fn slot_state(&self, key: SlotKey) -> SlotState {
        let Some(slot) = self.slots.get(&key).map(|e| e.value().clone()) else {
            return SlotState::new();
        };
        let guard = slot.read().await;
        guard.clone()
    }

    /// Bulk read-projection for rendering: every 30-minute step in
    /// `[start, end]` × the requested courts (all nine if empty).
    pub async fn day_grid(
        &self,
        date: NaiveDate,
        start: SlotTime,
        end: SlotTime,
        courts: &[CourtId],
    ) -> DayGrid {
        let courts: Vec<CourtId> = if courts.is_empty() {
            CourtId::all().collect()
        } else {
            courts.to_vec()
        };
        let times = SlotTime::steps(start, end);

        let mut cells = Vec::with_capacity(times.len() * courts.len());
        for &time in &times {
            for &court in &courts {
                let state = self.slot_state(SlotKey::new(date, time, court)).await;
                cells.push(SlotView {
                    holders: state.holders.into_iter().map(|h| h.user).collect(),
                    locked: state.locked,
                });
            }
        }

        DayGrid::from_cells(date, times, courts, cells)
    }
}
