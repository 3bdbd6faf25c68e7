//! Session request arbitration
//!
//! Pure decision logic shared by every adaptor family: many sessions ask
//! for intervals, standby overrides and data ranges; one effective value
//! reaches the hardware.

use std::collections::BTreeMap;

use contracts::{DataRange, SessionId};

/// Outcome of interval arbitration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arbitration {
    /// Interval to program, in milliseconds
    pub interval_ms: u32,
    /// Session holding the winning request, `None` when the default applies
    pub winner: Option<SessionId>,
}

impl Arbitration {
    /// Winner as the wire-level session id (`-1` when none)
    pub fn winner_id(&self) -> i32 {
        self.winner.map_or(SessionId::SENTINEL, SessionId::get)
    }
}

/// Pick the effective interval from per-session requests.
///
/// The smallest strictly positive request wins. A request of 0 means "no
/// preference" and never wins. With no positive request the default
/// interval applies and no session is reported. Ties go to the lowest
/// session id.
pub fn evaluate_interval_requests(
    requests: &BTreeMap<SessionId, u32>,
    default_interval: u32,
) -> Arbitration {
    let mut best: Option<(SessionId, u32)> = None;
    for (&session, &value) in requests {
        if value == 0 {
            continue;
        }
        match best {
            Some((_, current)) if current <= value => {}
            _ => best = Some((session, value)),
        }
    }

    match best {
        Some((session, value)) => Arbitration {
            interval_ms: value,
            winner: Some(session),
        },
        None => Arbitration {
            interval_ms: default_interval,
            winner: None,
        },
    }
}

/// First-come data range requests; the head of the queue is in effect
#[derive(Debug, Clone, Default)]
pub struct DataRangeQueue {
    queue: Vec<(SessionId, DataRange)>,
}

impl DataRangeQueue {
    /// Queue a request, replacing any earlier request from the same session
    pub fn request(&mut self, session: SessionId, range: DataRange) {
        self.remove(session);
        self.queue.push((session, range));
    }

    /// Drop the session's request, returns whether one existed
    pub fn remove(&mut self, session: SessionId) -> bool {
        let before = self.queue.len();
        self.queue.retain(|(s, _)| *s != session);
        before != self.queue.len()
    }

    /// Range currently in effect
    pub fn current(&self) -> Option<(SessionId, DataRange)> {
        self.queue.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Everything sessions have asked of one adaptor
#[derive(Debug, Clone, Default)]
pub struct SessionRequests {
    pub intervals: BTreeMap<SessionId, u32>,
    pub standby_overrides: BTreeMap<SessionId, bool>,
    pub data_ranges: DataRangeQueue,
}

impl SessionRequests {
    /// OR of every session's standby override
    pub fn standby_override(&self) -> bool {
        self.standby_overrides.values().any(|v| *v)
    }

    /// Forget everything a session asked for
    pub fn remove_session(&mut self, session: SessionId) {
        self.intervals.remove(&session);
        self.standby_overrides.remove(&session);
        self.data_ranges.remove(session);
    }
}
