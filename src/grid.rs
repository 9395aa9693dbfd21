use std::hash::{DefaultHasher, Hash, Hasher};

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{CourtId, SlotTime, UserId};

/// What one grid cell shows: holder names in booking order plus the lock flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub holders: Vec<UserId>,
    pub locked: bool,
}

/// Rectangular time × court projection of one day, ready for rendering.
/// Cells are row-major by time; absent slots are empty unlocked cells.
#[derive(Debug, Clone)]
pub struct DayGrid {
    pub date: NaiveDate,
    pub times: Vec<SlotTime>,
    pub courts: Vec<CourtId>,
    cells: Vec<SlotView>,
}

impl DayGrid {
    pub(crate) fn from_cells(
        date: NaiveDate,
        times: Vec<SlotTime>,
        courts: Vec<CourtId>,
        cells: Vec<SlotView>,
    ) -> Self {
        debug_assert_eq!(cells.len(), times.len() * courts.len());
        Self { date, times, courts, cells }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn cell(&self, time_idx: usize, court_idx: usize) -> &SlotView {
        &self.cells[time_idx * self.courts.len() + court_idx]
    }

    /// One time row, in court order.
    pub fn row(&self, time_idx: usize) -> &[SlotView] {
        let w = self.courts.len();
        &self.cells[time_idx * w..(time_idx + 1) * w]
    }
}

/// At most this many holder names are shown per cell in the overview.
pub const MAX_SHOWN_HOLDERS: usize = 2;

/// Presentation truncation: the overview shows at most two names.
pub fn shown_holders(holders: &[UserId]) -> &[UserId] {
    &holders[..holders.len().min(MAX_SHOWN_HOLDERS)]
}

const USER_COLORS: [&str; 9] = [
    "red", "blue", "green", "orange", "purple", "brown", "pink", "yellow", "cyan",
];

/// Deterministic pseudo-random color tag for a username. Derived
/// presentation only, not a reservation concern.
pub fn user_color(user: &str) -> &'static str {
    let mut hasher = DefaultHasher::new();
    user.hash(&mut hasher);
    USER_COLORS[(hasher.finish() % USER_COLORS.len() as u64) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_indexing() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 15).unwrap();
        let times = vec![SlotTime::parse("09:00").unwrap(), SlotTime::parse("09:30").unwrap()];
        let courts: Vec<CourtId> = [1, 2, 3].iter().map(|&n| CourtId::new(n).unwrap()).collect();
        let mut cells = vec![SlotView::default(); 6];
        cells[1 * 3 + 2] = SlotView { holders: vec!["alf".into()], locked: true };

        let grid = DayGrid::from_cells(date, times, courts, cells);
        assert_eq!(grid.cell_count(), 6);
        assert!(grid.cell(1, 2).locked);
        assert!(grid.cell(0, 0).holders.is_empty());
        assert_eq!(grid.row(1)[2].holders, vec!["alf".to_string()]);
    }

    #[test]
    fn holder_truncation() {
        let holders: Vec<UserId> = vec!["a".into(), "b".into(), "c".into()];
        assert_eq!(shown_holders(&holders).len(), 2);
        assert_eq!(shown_holders(&holders[..1]).len(), 1);
        assert!(shown_holders(&[]).is_empty());
    }

    #[test]
    fn color_is_deterministic_and_in_palette() {
        let c = user_color("alf");
        assert_eq!(c, user_color("alf"));
        assert!(USER_COLORS.contains(&c));
    }
}
