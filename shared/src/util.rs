use chrono::{DateTime, SubsecRound, Utc};

/// Current UTC time truncated to microseconds (PostgreSQL `TIMESTAMPTZ` precision)
///
/// Values produced here survive a round trip through the database unchanged,
/// so in-memory and persisted records compare equal.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}
