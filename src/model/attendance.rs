use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::error::AppError;
use crate::model::worker::avatar_initial;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, AsRefStr, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Present,
    Absent,
    LateArrival,
    OnLeave,
}

impl AttendanceStatus {
    /// Present and late arrivals both count as on-site.
    pub fn is_on_site(&self) -> bool {
        matches!(self, AttendanceStatus::Present | AttendanceStatus::LateArrival)
    }
}

impl TryFrom<String> for AttendanceStatus {
    type Error = strum::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Attendance {
    pub id: u64,
    pub worker_id: u64,
    pub worker_name: String,
    pub worker_designation: String,
    pub project_id: Option<u64>,
    pub project_name: Option<String>,
    pub date: NaiveDate,
    #[sqlx(try_from = "String")]
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub notes: String,
}

pub const ATTENDANCE_SELECT: &str = r#"
    SELECT a.id, a.worker_id, u.name AS worker_name, w.designation AS worker_designation,
           a.project_id, p.name AS project_name, a.date, a.status,
           a.check_in, a.check_out, a.notes
    FROM attendance a
    JOIN workers w ON w.id = a.worker_id
    JOIN users u ON u.id = w.user_id
    LEFT JOIN projects p ON p.id = a.project_id AND p.is_deleted = 0
"#;

#[derive(Serialize)]
pub struct AttendanceResponse<'a> {
    pub id: u64,
    pub worker: u64,
    pub worker_name: &'a str,
    pub worker_designation: &'a str,
    pub avatar_initial: String,
    pub project: Option<u64>,
    pub project_name: Option<&'a str>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: Option<NaiveTime>,
    pub check_out: Option<NaiveTime>,
    pub notes: &'a str,
}

impl Attendance {
    pub fn response(&self) -> AttendanceResponse<'_> {
        AttendanceResponse {
            id: self.id,
            worker: self.worker_id,
            worker_name: &self.worker_name,
            worker_designation: &self.worker_designation,
            avatar_initial: avatar_initial(&self.worker_name),
            project: self.project_id,
            project_name: self.project_name.as_deref(),
            date: self.date,
            status: self.status,
            check_in: self.check_in,
            check_out: self.check_out,
            notes: &self.notes,
        }
    }
}

/// Where a worker's day stands, derived from the (at most one) record for that date.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum DayState {
    NotCheckedIn,
    CheckedIn,
    CheckedOut,
}

impl DayState {
    pub fn of(record: Option<&Attendance>) -> Self {
        match record {
            None => DayState::NotCheckedIn,
            Some(a) if a.check_out.is_some() => DayState::CheckedOut,
            Some(_) => DayState::CheckedIn,
        }
    }

    pub fn check_in(self) -> Result<DayState, AppError> {
        match self {
            DayState::NotCheckedIn => Ok(DayState::CheckedIn),
            _ => Err(already_checked_in()),
        }
    }

    /// Checking out again overwrites the previous check-out time.
    pub fn check_out(self) -> Result<DayState, AppError> {
        match self {
            DayState::NotCheckedIn => Err(AppError::NotFound(
                "No check-in found for today.".to_string(),
            )),
            _ => Ok(DayState::CheckedOut),
        }
    }
}

pub fn already_checked_in() -> AppError {
    AppError::Conflict("Already checked in today.".to_string())
}

/// Present at or before the cutoff, late arrival after it.
pub fn arrival_status(check_in: NaiveTime, late_after: NaiveTime) -> AttendanceStatus {
    if check_in > late_after {
        AttendanceStatus::LateArrival
    } else {
        AttendanceStatus::Present
    }
}

/// A new attendance row opened by a check-in.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckIn {
    pub worker_id: u64,
    pub project_id: Option<u64>,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub check_in: NaiveTime,
    pub notes: String,
}

impl NewCheckIn {
    pub fn at(
        worker_id: u64,
        project_id: Option<u64>,
        notes: String,
        now: NaiveDateTime,
        late_after: NaiveTime,
    ) -> Self {
        let check_in = now.time();
        Self {
            worker_id,
            project_id,
            date: now.date(),
            status: arrival_status(check_in, late_after),
            check_in,
            notes,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nine() -> NaiveTime {
        NaiveTime::from_hms_opt(9, 0, 0).unwrap()
    }

    fn record(check_out: Option<NaiveTime>) -> Attendance {
        Attendance {
            id: 1,
            worker_id: 7,
            worker_name: "Karim".into(),
            worker_designation: "Mason".into(),
            project_id: None,
            project_name: None,
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            status: AttendanceStatus::Present,
            check_in: NaiveTime::from_hms_opt(8, 30, 0),
            check_out,
            notes: String::new(),
        }
    }

    #[test]
    fn check_in_before_cutoff_is_present() {
        let t = NaiveTime::from_hms_opt(8, 59, 0).unwrap();
        assert_eq!(arrival_status(t, nine()), AttendanceStatus::Present);
        assert_eq!(arrival_status(nine(), nine()), AttendanceStatus::Present);
    }

    #[test]
    fn check_in_after_cutoff_is_late() {
        let t = NaiveTime::from_hms_opt(9, 1, 0).unwrap();
        assert_eq!(arrival_status(t, nine()), AttendanceStatus::LateArrival);
    }

    #[test]
    fn new_check_in_takes_date_and_time_from_now() {
        let now = NaiveDate::from_ymd_opt(2026, 3, 2)
            .unwrap()
            .and_hms_opt(9, 1, 0)
            .unwrap();
        let row = NewCheckIn::at(7, Some(3), "gate B".into(), now, nine());
        assert_eq!(row.date, now.date());
        assert_eq!(row.check_in, now.time());
        assert_eq!(row.status, AttendanceStatus::LateArrival);
    }

    #[test]
    fn second_check_in_conflicts() {
        let state = DayState::of(None).check_in().unwrap();
        assert_eq!(state, DayState::CheckedIn);
        assert!(matches!(
            DayState::of(Some(&record(None))).check_in(),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            DayState::of(Some(&record(NaiveTime::from_hms_opt(17, 0, 0)))).check_in(),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn check_out_without_check_in_is_not_found() {
        assert!(matches!(DayState::of(None).check_out(), Err(AppError::NotFound(_))));
        assert_eq!(
            DayState::of(Some(&record(None))).check_out().unwrap(),
            DayState::CheckedOut
        );
    }

    #[test]
    fn on_site_statuses() {
        assert!(AttendanceStatus::Present.is_on_site());
        assert!(AttendanceStatus::LateArrival.is_on_site());
        assert!(!AttendanceStatus::Absent.is_on_site());
        assert!(!AttendanceStatus::OnLeave.is_on_site());
        assert_eq!(AttendanceStatus::LateArrival.as_ref(), "late_arrival");
    }

    #[test]
    fn response_carries_avatar_initial() {
        let rec = record(None);
        let resp = rec.response();
        assert_eq!(resp.avatar_initial, "K");
        assert_eq!(resp.worker, 7);
    }
}
