//! Transient roll-call traversal for one sitting. The session owns only the
//! card order, the cursor, and the undo stack; every mark or undo commits
//! exactly one ledger mutation (done by the caller) before the session state
//! moves. Deferring a student ("later") splices them to the back of the
//! order, so undo records both indexes to restore the permutation exactly.

use crate::model::AttendanceStatus;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollCallOp {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub from: usize,
    pub to: usize,
}

#[derive(Debug, Clone)]
pub struct RollCallSession {
    course_id: String,
    order: Vec<String>,
    cursor: usize,
    ops: Vec<RollCallOp>,
}

impl RollCallSession {
    /// Builds a session from a snapshot of the active course's student ids,
    /// already in display order. The session is independent of the document
    /// from here on; callers drop it when the snapshot goes stale.
    pub fn start(course_id: String, order: Vec<String>) -> RollCallSession {
        RollCallSession {
            course_id,
            order,
            cursor: 0,
            ops: Vec::new(),
        }
    }

    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    pub fn order(&self) -> &[String] {
        &self.order
    }

    pub fn total(&self) -> usize {
        self.order.len()
    }

    /// 1-based card position for display, capped at the total.
    pub fn position(&self) -> usize {
        (self.cursor + 1).min(self.order.len())
    }

    pub fn is_complete(&self) -> bool {
        self.cursor >= self.order.len()
    }

    pub fn current(&self) -> Option<&str> {
        self.order.get(self.cursor).map(|s| s.as_str())
    }

    pub fn last_op(&self) -> Option<&RollCallOp> {
        self.ops.last()
    }

    /// Advances the session after the ledger commit for the current student
    /// succeeded. Present/absent move the cursor forward; `later` sends the
    /// student to the back of the order and leaves the cursor in place so the
    /// next student slides into the same slot.
    pub fn apply_mark(&mut self, status: AttendanceStatus) {
        let Some(student_id) = self.current().map(|s| s.to_string()) else {
            return;
        };
        let from = self.cursor;
        if status == AttendanceStatus::Later {
            let moved = self.order.remove(from);
            self.order.push(moved);
            self.ops.push(RollCallOp {
                student_id,
                status,
                from,
                to: self.order.len() - 1,
            });
            return;
        }
        self.ops.push(RollCallOp {
            student_id,
            status,
            from,
            to: from,
        });
        self.cursor = (self.cursor + 1).min(self.order.len());
    }

    /// Pops the most recent mark and restores order and cursor. The caller
    /// inverts the ledger entry first, using the returned op. Empty stack is
    /// a no-op; undo from the completed state lands on the last card.
    pub fn undo(&mut self) -> Option<RollCallOp> {
        let op = self.ops.pop()?;
        if op.status == AttendanceStatus::Later {
            let moved = self.order.remove(op.to);
            self.order.insert(op.from, moved);
            self.cursor = op.from;
        } else {
            self.cursor = self.cursor.saturating_sub(1);
        }
        Some(op)
    }
}
