//! Per-student attendance ledger: an append-only history of dated status
//! events plus the cached counters in `Student::stats`. All three mutation
//! paths (record, undo, reclassify) go through here so the counters and the
//! history can never drift apart.

use crate::model::{AbsenceReason, AttendanceStatus, HistoryEntry, RosterError, Student};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reclassification {
    Late,
    Justified,
    Erroneous,
}

impl Reclassification {
    pub fn parse(s: &str) -> Option<Reclassification> {
        match s {
            "late" => Some(Reclassification::Late),
            "justified" => Some(Reclassification::Justified),
            "erroneous" => Some(Reclassification::Erroneous),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReclassifyOutcome {
    pub prior: AttendanceStatus,
    pub status: AttendanceStatus,
}

/// Appends a history entry and bumps the matching counter. Duplicate dates
/// are allowed (multiple sessions per day). Returns the new entry's id.
pub fn record(
    student: &mut Student,
    status: AttendanceStatus,
    date: &str,
) -> Result<String, RosterError> {
    if status == AttendanceStatus::Late {
        return Err(RosterError::InvalidInput(
            "late is assigned by reclassification, not by marking".to_string(),
        ));
    }
    match status {
        AttendanceStatus::Present => student.stats.present += 1,
        AttendanceStatus::Absent => student.stats.absent += 1,
        AttendanceStatus::Later => student.stats.later += 1,
        AttendanceStatus::Late => unreachable!(),
    }
    let id = Uuid::new_v4().to_string();
    student.history.push(HistoryEntry {
        id: id.clone(),
        date: date.to_string(),
        status,
        reason: None,
    });
    Ok(id)
}

/// Removes the most recently appended entry with the given status (and date,
/// when one is supplied), scanning from the end of the history backward, and
/// decrements the matching counter without going below zero. Returns whether
/// anything was removed; no match is a safe no-op, not an error.
pub fn undo(student: &mut Student, status: AttendanceStatus, date: Option<&str>) -> bool {
    let idx = student
        .history
        .iter()
        .rposition(|h| h.status == status && date.map_or(true, |d| h.date == d));
    let Some(idx) = idx else {
        return false;
    };
    student.history.remove(idx);
    match status {
        AttendanceStatus::Present => student.stats.present = student.stats.present.saturating_sub(1),
        AttendanceStatus::Absent => student.stats.absent = student.stats.absent.saturating_sub(1),
        AttendanceStatus::Later => student.stats.later = student.stats.later.saturating_sub(1),
        AttendanceStatus::Late => {}
    }
    true
}

/// Applies an after-the-fact correction to one history entry. The entry's
/// prior status is read before any counter moves; the transition rules depend
/// on it, never on the new label alone.
pub fn reclassify(
    student: &mut Student,
    entry_id: &str,
    change: Reclassification,
) -> Result<ReclassifyOutcome, RosterError> {
    let idx = student
        .history
        .iter()
        .position(|h| h.id == entry_id)
        .ok_or(RosterError::EntryNotFound)?;
    let prior = student.history[idx].status;
    let stats = &mut student.stats;

    let status = match change {
        Reclassification::Erroneous => {
            if prior == AttendanceStatus::Absent {
                stats.absent = stats.absent.saturating_sub(1);
            }
            if prior == AttendanceStatus::Late {
                stats.later = stats.later.saturating_sub(1);
            }
            stats.present += 1;
            student.history[idx].status = AttendanceStatus::Present;
            student.history[idx].reason = None;
            AttendanceStatus::Present
        }
        Reclassification::Late => {
            if prior == AttendanceStatus::Absent {
                stats.absent = stats.absent.saturating_sub(1);
            }
            if prior != AttendanceStatus::Late {
                stats.later += 1;
            }
            // A late arrival still counts as a presence for the percentage.
            stats.present += 1;
            student.history[idx].status = AttendanceStatus::Late;
            student.history[idx].reason = None;
            AttendanceStatus::Late
        }
        Reclassification::Justified => {
            // Annotation only: a justified absence still counts as absent.
            student.history[idx].status = AttendanceStatus::Absent;
            student.history[idx].reason = Some(AbsenceReason::Justified);
            AttendanceStatus::Absent
        }
    };

    Ok(ReclassifyOutcome { prior, status })
}
