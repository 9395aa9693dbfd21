use chrono::NaiveDate;

/// Everything a booking call can come back with. All variants up to and
/// including `NotLocked` are expected, user-facing denials; `CorruptSlot`
/// and `WalError` are the unexpected categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Mutating call without an authorized identity.
    NotLoggedIn,
    /// Mutation date outside the current Monday–Sunday week.
    OutOfWindow {
        date: NaiveDate,
        week_start: NaiveDate,
        week_end: NaiveDate,
    },
    UserAlreadyHolds,
    SlotLocked,
    SlotFull,
    NotFirstHolder,
    AlreadyLocked,
    NotLocked,
    SlotEmpty,
    /// Persisted state violates a slot invariant; surfaced, never repaired.
    CorruptSlot(String),
    /// Durable-store I/O failure. The in-memory state was not mutated.
    WalError(String),
}

impl EngineError {
    /// Stable identifier used on the wire and as a metrics label.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::NotLoggedIn => "NotLoggedIn",
            EngineError::OutOfWindow { .. } => "OutOfWindow",
            EngineError::UserAlreadyHolds => "UserAlreadyHolds",
            EngineError::SlotLocked => "SlotLocked",
            EngineError::SlotFull => "SlotFull",
            EngineError::NotFirstHolder => "NotFirstHolder",
            EngineError::AlreadyLocked => "AlreadyLocked",
            EngineError::NotLocked => "NotLocked",
            EngineError::SlotEmpty => "SlotEmpty",
            EngineError::CorruptSlot(_) => "CorruptSlot",
            EngineError::WalError(_) => "StorageUnavailable",
        }
    }

    /// True for the policy-level denials that are normal outcomes.
    pub fn is_denial(&self) -> bool {
        !matches!(self, EngineError::CorruptSlot(_) | EngineError::WalError(_))
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotLoggedIn => write!(f, "not logged in"),
            EngineError::OutOfWindow { date, week_start, week_end } => write!(
                f,
                "{date} is outside the booking week {week_start} – {week_end}"
            ),
            EngineError::UserAlreadyHolds => write!(f, "you already hold this slot"),
            EngineError::SlotLocked => write!(f, "slot is locked"),
            EngineError::SlotFull => write!(f, "slot is full"),
            EngineError::NotFirstHolder => write!(f, "only the first booker may lock or unlock"),
            EngineError::AlreadyLocked => write!(f, "slot is already locked"),
            EngineError::NotLocked => write!(f, "slot is not locked"),
            EngineError::SlotEmpty => write!(f, "slot has no holders"),
            EngineError::CorruptSlot(msg) => write!(f, "corrupt slot state: {msg}"),
            EngineError::WalError(e) => write!(f, "storage unavailable: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
