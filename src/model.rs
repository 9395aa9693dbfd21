use std::fmt;

use chrono::{Datelike, Days, NaiveDate};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Username as resolved by the identity layer.
pub type UserId = String;

/// Maximum holders per slot.
pub const MAX_OCCUPANTS: usize = 6;

/// Court numbers run 1..=9.
pub const COURT_MIN: u8 = 1;
pub const COURT_MAX: u8 = 9;

/// Slot granularity in minutes.
pub const SLOT_MINUTES: u16 = 30;

const MINUTES_PER_DAY: u16 = 24 * 60;

/// Time of day on the 30-minute slot grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotTime(u16);

impl SlotTime {
    /// Minutes since midnight; must be on the 30-minute grid.
    pub fn from_minutes(minutes: u16) -> Option<Self> {
        (minutes < MINUTES_PER_DAY && minutes % SLOT_MINUTES == 0).then_some(Self(minutes))
    }

    pub fn from_hm(hour: u16, minute: u16) -> Option<Self> {
        Self::from_minutes(hour.checked_mul(60)?.checked_add(minute)?)
    }

    /// Parse `"HH:MM"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        Self::from_hm(h.parse().ok()?, m.parse().ok()?)
    }

    pub fn minutes(self) -> u16 {
        self.0
    }

    /// The next slot on the grid, if any remains today.
    pub fn next(self) -> Option<Self> {
        Self::from_minutes(self.0.checked_add(SLOT_MINUTES)?)
    }

    /// Every slot time in `[start, end]`, inclusive both ends.
    pub fn steps(start: SlotTime, end: SlotTime) -> Vec<SlotTime> {
        let mut times = Vec::new();
        let mut cur = start;
        while cur <= end {
            times.push(cur);
            match cur.next() {
                Some(next) => cur = next,
                None => break,
            }
        }
        times
    }
}

impl fmt::Display for SlotTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 60, self.0 % 60)
    }
}

/// One of the nine courts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CourtId(u8);

impl CourtId {
    pub fn new(n: u8) -> Option<Self> {
        (COURT_MIN..=COURT_MAX).contains(&n).then_some(Self(n))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    /// All courts in numeric order.
    pub fn all() -> impl Iterator<Item = CourtId> {
        (COURT_MIN..=COURT_MAX).map(CourtId)
    }
}

impl fmt::Display for CourtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lookup key for every slot: one date, one 30-minute time, one court.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub date: NaiveDate,
    pub time: SlotTime,
    pub court: CourtId,
}

impl SlotKey {
    pub fn new(date: NaiveDate, time: SlotTime, court: CourtId) -> Self {
        Self { date, time, court }
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} court {}", self.date, self.time, self.court)
    }
}

/// One user's occupancy of a slot. The booking id is a Ulid, so ordering by
/// it recovers booking order durably without relying on storage scan order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Holder {
    pub booking_id: Ulid,
    pub user: UserId,
}

/// Full state of one slot. `holders` is kept sorted by booking id, so
/// `holders[0]` is the first booker; `locked` is slot-scoped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotState {
    pub holders: Vec<Holder>,
    pub locked: bool,
}

impl SlotState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn holds(&self, user: &str) -> bool {
        self.holders.iter().any(|h| h.user == user)
    }

    pub fn first_holder(&self) -> Option<&Holder> {
        self.holders.first()
    }

    pub fn is_full(&self) -> bool {
        self.holders.len() >= MAX_OCCUPANTS
    }

    /// Insert maintaining sort order by booking id.
    pub fn insert_holder(&mut self, holder: Holder) {
        let pos = self
            .holders
            .binary_search_by(|h| h.booking_id.cmp(&holder.booking_id))
            .unwrap_or_else(|e| e);
        self.holders.insert(pos, holder);
    }
}

/// The event types — flat, no nesting. This is the WAL record format.
/// `HolderAdded` is the persisted booking record; lock state is a
/// slot-level fact, not a per-holder one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    HolderAdded {
        booking_id: Ulid,
        key: SlotKey,
        user: UserId,
    },
    SlotLocked {
        key: SlotKey,
    },
    SlotUnlocked {
        key: SlotKey,
    },
}

impl Event {
    pub fn key(&self) -> SlotKey {
        match self {
            Event::HolderAdded { key, .. }
            | Event::SlotLocked { key }
            | Event::SlotUnlocked { key } => *key,
        }
    }
}

/// The Monday–Sunday calendar week containing `today`, inclusive both ends.
pub fn booking_week(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
    (monday, monday + Days::new(6))
}

/// Mutations are only permitted for dates inside the current week.
pub fn in_booking_window(date: NaiveDate, today: NaiveDate) -> bool {
    let (monday, sunday) = booking_week(today);
    monday <= date && date <= sunday
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn slot_time_grid() {
        assert_eq!(SlotTime::from_minutes(570).unwrap().to_string(), "09:30");
        assert!(SlotTime::from_minutes(571).is_none()); // off-grid
        assert!(SlotTime::from_minutes(1440).is_none()); // past midnight
        assert_eq!(SlotTime::parse("07:00"), SlotTime::from_hm(7, 0));
        assert!(SlotTime::parse("7").is_none());
        assert!(SlotTime::parse("25:00").is_none());
    }

    #[test]
    fn slot_time_steps_inclusive() {
        let start = SlotTime::parse("09:00").unwrap();
        let end = SlotTime::parse("10:30").unwrap();
        let steps = SlotTime::steps(start, end);
        assert_eq!(steps.len(), 4); // 09:00 09:30 10:00 10:30
        assert_eq!(steps[0], start);
        assert_eq!(steps[3], end);
    }

    #[test]
    fn slot_time_steps_end_of_day() {
        let start = SlotTime::parse("23:00").unwrap();
        let end = SlotTime::parse("23:30").unwrap();
        let steps = SlotTime::steps(start, end);
        assert_eq!(steps.len(), 2); // no overflow past 23:30
    }

    #[test]
    fn court_range() {
        assert!(CourtId::new(0).is_none());
        assert!(CourtId::new(10).is_none());
        assert_eq!(CourtId::new(9).unwrap().number(), 9);
        assert_eq!(CourtId::all().count(), 9);
    }

    #[test]
    fn week_of_a_wednesday() {
        // 2024-05-15 is a Wednesday
        let (mon, sun) = booking_week(date(2024, 5, 15));
        assert_eq!(mon, date(2024, 5, 13));
        assert_eq!(sun, date(2024, 5, 19));
    }

    #[test]
    fn week_edges_inclusive() {
        let today = date(2024, 5, 15);
        assert!(in_booking_window(date(2024, 5, 13), today)); // Monday
        assert!(in_booking_window(date(2024, 5, 19), today)); // Sunday
        assert!(!in_booking_window(date(2024, 5, 12), today));
        assert!(!in_booking_window(date(2024, 5, 20), today));
    }

    #[test]
    fn week_of_a_monday_and_sunday() {
        let (mon, sun) = booking_week(date(2024, 5, 13));
        assert_eq!((mon, sun), (date(2024, 5, 13), date(2024, 5, 19)));
        let (mon, sun) = booking_week(date(2024, 5, 19));
        assert_eq!((mon, sun), (date(2024, 5, 13), date(2024, 5, 19)));
    }

    #[test]
    fn week_crossing_month_boundary() {
        // 2024-06-01 is a Saturday; its week starts in May
        let (mon, sun) = booking_week(date(2024, 6, 1));
        assert_eq!(mon, date(2024, 5, 27));
        assert_eq!(sun, date(2024, 6, 2));
    }

    #[test]
    fn holders_sorted_by_booking_id() {
        let mut state = SlotState::new();
        let a = Ulid::from_parts(1, 7);
        let b = Ulid::from_parts(2, 7);
        state.insert_holder(Holder { booking_id: b, user: "bea".into() });
        state.insert_holder(Holder { booking_id: a, user: "alf".into() });
        assert_eq!(state.first_holder().unwrap().user, "alf");
        assert!(state.holds("bea"));
        assert!(!state.holds("cleo"));
    }

    #[test]
    fn full_at_max_occupants() {
        let mut state = SlotState::new();
        for i in 0..MAX_OCCUPANTS {
            state.insert_holder(Holder { booking_id: Ulid::new(), user: format!("u{i}") });
        }
        assert!(state.is_full());
    }

    #[test]
    fn event_serialization_roundtrip() {
        let event = Event::HolderAdded {
            booking_id: Ulid::new(),
            key: SlotKey::new(
                date(2024, 5, 15),
                SlotTime::parse("09:00").unwrap(),
                CourtId::new(3).unwrap(),
            ),
            user: "alf".into(),
        };
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
