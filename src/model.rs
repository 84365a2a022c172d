use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub fn today_str() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Attendance statuses a history entry can carry. `Present`, `Absent` and
/// `Later` are produced by roll-call marking; `Late` only ever arises when an
/// absence is reclassified after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Later,
    Late,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Later => "later",
            AttendanceStatus::Late => "late",
        }
    }

    /// Statuses a roll-call mark may assign. `Late` is rejected here; it is
    /// the reclassification path's job to produce it.
    pub fn parse_mark(s: &str) -> Option<AttendanceStatus> {
        match s {
            "present" => Some(AttendanceStatus::Present),
            "absent" => Some(AttendanceStatus::Absent),
            "later" => Some(AttendanceStatus::Later),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AbsenceReason {
    Justified,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Condition {
    #[default]
    Active,
    Repeating,
}

impl Condition {
    pub fn parse(s: &str) -> Option<Condition> {
        match s {
            "active" => Some(Condition::Active),
            "repeating" => Some(Condition::Repeating),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GradeKind {
    #[default]
    Written,
    Oral,
    Practical,
    Conceptual,
}

impl GradeKind {
    pub fn parse(s: &str) -> Option<GradeKind> {
        match s {
            "written" => Some(GradeKind::Written),
            "oral" => Some(GradeKind::Oral),
            "practical" => Some(GradeKind::Practical),
            "conceptual" => Some(GradeKind::Conceptual),
            _ => None,
        }
    }
}

/// Cached attendance counters. Every mutation path keeps these in sync with
/// `Student::history`; they are never recomputed from scratch on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    #[serde(default)]
    pub present: u32,
    #[serde(default)]
    pub absent: u32,
    #[serde(default)]
    pub later: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    #[serde(default)]
    pub date: String,
    pub status: AttendanceStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<AbsenceReason>,
}

/// Grade values tolerate arbitrary JSON from imported documents; averages
/// skip anything that is not a finite number. Values written by this daemon
/// are always validated numbers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grade {
    pub id: String,
    #[serde(default)]
    pub kind: GradeKind,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub value: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub condition: Condition,
    #[serde(default)]
    pub stats: Stats,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub grades: Vec<Grade>,
}

impl Student {
    pub fn new(id: String, name: String, condition: Condition) -> Student {
        Student {
            id,
            name,
            condition,
            stats: Stats::default(),
            history: Vec::new(),
            grades: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Preceptor {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub phone: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub days: Vec<String>,
    #[serde(default)]
    pub preceptor: Preceptor,
    #[serde(default)]
    pub students: HashMap<String, Student>,
}

/// The whole persisted document. `selected_date` is reset to today on every
/// load and import; the stored value is never trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default)]
    pub courses: HashMap<String, Course>,
    #[serde(default)]
    pub selected_course_id: Option<String>,
    #[serde(default = "today_str")]
    pub selected_date: String,
}

impl Document {
    pub fn empty() -> Document {
        Document {
            courses: HashMap::new(),
            selected_course_id: None,
            selected_date: today_str(),
        }
    }

    /// Tolerant construction from untrusted JSON (stored row or imported
    /// snapshot). A missing or malformed `courses` field becomes the empty
    /// mapping rather than an error; `selectedDate` is always reset.
    pub fn from_value(raw: serde_json::Value) -> Document {
        let courses = raw
            .get("courses")
            .cloned()
            .and_then(|v| serde_json::from_value::<HashMap<String, Course>>(v).ok())
            .unwrap_or_default();
        let selected_course_id = raw
            .get("selectedCourseId")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string());
        Document {
            courses,
            selected_course_id,
            selected_date: today_str(),
        }
    }

    pub fn course(&self, course_id: &str) -> Option<&Course> {
        self.courses.get(course_id)
    }

    pub fn selected_course(&self) -> Option<&Course> {
        self.selected_course_id
            .as_deref()
            .and_then(|id| self.courses.get(id))
    }

    /// Produces a new document with the named course mutated, leaving `self`
    /// untouched. The replacement value only becomes visible once the caller
    /// persists and swaps it, so a failed mutation never leaks partial state.
    pub fn with_course<T>(
        &self,
        course_id: &str,
        f: impl FnOnce(&mut Course) -> Result<T, RosterError>,
    ) -> Result<(Document, T), RosterError> {
        let mut next = self.clone();
        let course = next
            .courses
            .get_mut(course_id)
            .ok_or(RosterError::CourseNotFound)?;
        let out = f(course)?;
        Ok((next, out))
    }

    pub fn with_student<T>(
        &self,
        course_id: &str,
        student_id: &str,
        f: impl FnOnce(&mut Student) -> Result<T, RosterError>,
    ) -> Result<(Document, T), RosterError> {
        self.with_course(course_id, |course| {
            let student = course
                .students
                .get_mut(student_id)
                .ok_or(RosterError::StudentNotFound)?;
            f(student)
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RosterError {
    CourseNotFound,
    StudentNotFound,
    EntryNotFound,
    GradeNotFound,
    InvalidInput(String),
}

impl RosterError {
    pub fn code(&self) -> &'static str {
        match self {
            RosterError::CourseNotFound
            | RosterError::StudentNotFound
            | RosterError::EntryNotFound
            | RosterError::GradeNotFound => "not_found",
            RosterError::InvalidInput(_) => "bad_params",
        }
    }

    pub fn message(&self) -> String {
        match self {
            RosterError::CourseNotFound => "course not found".to_string(),
            RosterError::StudentNotFound => "student not found".to_string(),
            RosterError::EntryNotFound => "history entry not found".to_string(),
            RosterError::GradeNotFound => "grade not found".to_string(),
            RosterError::InvalidInput(m) => m.clone(),
        }
    }
}

impl std::fmt::Display for RosterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for RosterError {}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_value_substitutes_empty_courses_for_garbage() {
        let doc = Document::from_value(json!({ "courses": 42, "selectedCourseId": "x" }));
        assert!(doc.courses.is_empty());
        assert_eq!(doc.selected_course_id.as_deref(), Some("x"));

        let doc = Document::from_value(json!({}));
        assert!(doc.courses.is_empty());
        assert!(doc.selected_course_id.is_none());
    }

    #[test]
    fn from_value_resets_selected_date() {
        let doc = Document::from_value(json!({ "selectedDate": "1999-01-01" }));
        assert_eq!(doc.selected_date, today_str());
    }

    #[test]
    fn with_student_leaves_original_untouched_on_error() {
        let mut doc = Document::empty();
        let course = Course {
            id: "c1".to_string(),
            name: "3B".to_string(),
            days: vec![],
            preceptor: Preceptor::default(),
            students: HashMap::new(),
        };
        doc.courses.insert("c1".to_string(), course);

        let res = doc.with_student("c1", "missing", |_| Ok(()));
        assert_eq!(res.unwrap_err(), RosterError::StudentNotFound);
        assert!(doc.courses["c1"].students.is_empty());
    }
}
