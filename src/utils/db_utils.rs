use chrono::NaiveDate;
use serde_json::{Map, Value};
use sqlx::MySqlPool;

use crate::error::AppError;
use crate::utils::validation::FieldErrors;

/// ===============================
/// Soft-delete visibility
/// ===============================
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Visibility {
    /// Default reads: rows flagged `is_deleted` are invisible.
    Active,
    /// Administrative reads that must see soft-deleted rows too.
    IncludeDeleted,
}

impl Visibility {
    /// Predicate for `alias.is_deleted`, ready to be AND-ed into a WHERE clause.
    pub fn predicate(self, alias: &str) -> String {
        match self {
            Visibility::Active => format!("{alias}.is_deleted = 0"),
            Visibility::IncludeDeleted => "1 = 1".to_string(),
        }
    }
}

/// Flags one row as deleted. Returns false when there was no live row to delete.
pub async fn soft_delete(pool: &MySqlPool, table: &str, id: u64) -> Result<bool, sqlx::Error> {
    let sql = format!("UPDATE {table} SET is_deleted = 1, updated_at = NOW() WHERE id = ? AND is_deleted = 0");
    let result = sqlx::query(&sql).bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

/// ===============================
/// SQL bindable value enum
/// ===============================
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    U64(u64),
    F64(f64),
    Date(NaiveDate),
    Null,
}

/// ===============================
/// Patchable column whitelist
/// ===============================
#[derive(Debug, Copy, Clone)]
pub enum ColumnKind {
    /// Non-empty text.
    Text,
    /// Text that may be blank.
    OptionalText,
    /// Non-negative number.
    Amount,
    /// Number within 0..=100.
    Percent,
    /// `YYYY-MM-DD` or null.
    OptionalDate,
    /// Foreign key or null.
    OptionalId,
    /// One of a fixed set of stored names.
    Choice(&'static [&'static str]),
}

#[derive(Debug, Copy, Clone)]
pub struct Column {
    /// Name accepted in the JSON payload.
    pub field: &'static str,
    /// Column written in the table.
    pub column: &'static str,
    pub kind: ColumnKind,
}

impl Column {
    pub const fn new(field: &'static str, kind: ColumnKind) -> Self {
        Self {
            field,
            column: field,
            kind,
        }
    }

    pub const fn mapped(field: &'static str, column: &'static str, kind: ColumnKind) -> Self {
        Self { field, column, kind }
    }

    fn convert(&self, value: &Value) -> Result<SqlValue, &'static str> {
        match (self.kind, value) {
            (ColumnKind::Text, Value::String(s)) if s.trim().is_empty() => {
                Err("This field may not be blank.")
            }
            (ColumnKind::Text | ColumnKind::OptionalText, Value::String(s)) => {
                Ok(SqlValue::String(s.trim().to_string()))
            }
            (ColumnKind::Amount, Value::Number(n)) => match n.as_f64() {
                Some(f) if f >= 0.0 => Ok(SqlValue::F64(f)),
                _ => Err("Ensure this value is greater than or equal to 0."),
            },
            (ColumnKind::Percent, Value::Number(n)) => match n.as_f64() {
                Some(f) if (0.0..=100.0).contains(&f) => Ok(SqlValue::F64(f)),
                _ => Err("Ensure this value is between 0 and 100."),
            },
            (ColumnKind::OptionalDate | ColumnKind::OptionalId, Value::Null) => Ok(SqlValue::Null),
            (ColumnKind::OptionalDate, Value::String(s)) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(SqlValue::Date)
                .map_err(|_| "Date has wrong format. Use YYYY-MM-DD."),
            (ColumnKind::OptionalId, Value::Number(n)) => {
                n.as_u64().map(SqlValue::U64).ok_or("Invalid pk.")
            }
            (ColumnKind::Choice(options), Value::String(s)) => {
                if options.contains(&s.as_str()) {
                    Ok(SqlValue::String(s.clone()))
                } else {
                    Err("Not a valid choice.")
                }
            }
            (ColumnKind::Text | ColumnKind::OptionalText | ColumnKind::Choice(_), _) => {
                Err("Not a valid string.")
            }
            (ColumnKind::Amount | ColumnKind::Percent, _) => Err("A valid number is required."),
            (ColumnKind::OptionalDate, _) => Err("Date has wrong format. Use YYYY-MM-DD."),
            (ColumnKind::OptionalId, _) => Err("Invalid pk."),
        }
    }
}

/// ===============================
/// SQL update container
/// ===============================
#[derive(Debug)]
pub struct SqlUpdate {
    pub table: &'static str,
    pub assignments: Vec<String>,
    pub values: Vec<SqlValue>,
    pub id: u64,
}

impl SqlUpdate {
    /// Adds an assignment that binds nothing, e.g. `paid_at = NOW()`.
    pub fn set_raw(&mut self, assignment: &str) {
        self.assignments.push(assignment.to_string());
    }

    pub fn sql(&self) -> String {
        format!(
            "UPDATE {} SET {}, updated_at = NOW() WHERE id = ? AND is_deleted = 0",
            self.table,
            self.assignments.join(", ")
        )
    }
}

/// ===============================
/// Build a partial UPDATE from a JSON object
/// ===============================
///
/// Only whitelisted fields are accepted; every rejected field is reported
/// under its own key.
pub fn build_update_sql(
    table: &'static str,
    payload: &Value,
    columns: &[Column],
    id: u64,
) -> Result<SqlUpdate, AppError> {
    let obj: &Map<String, Value> = payload
        .as_object()
        .ok_or_else(|| AppError::bad_request("Payload must be a JSON object"))?;

    if obj.is_empty() {
        return Err(AppError::bad_request("No fields provided for update"));
    }

    let mut errors = FieldErrors::default();
    let mut assignments = Vec::with_capacity(obj.len());
    let mut values = Vec::with_capacity(obj.len());

    for (key, value) in obj {
        let Some(column) = columns.iter().find(|c| c.field == key) else {
            errors.add(key, "This field cannot be updated.");
            continue;
        };

        match column.convert(value) {
            Ok(v) => {
                assignments.push(format!("{} = ?", column.column));
                values.push(v);
            }
            Err(msg) => errors.add(key, msg),
        }
    }

    errors.into_result()?;

    Ok(SqlUpdate {
        table,
        assignments,
        values,
        id,
    })
}

/// ===============================
/// Execute the update
/// ===============================
pub async fn execute_update(pool: &MySqlPool, update: SqlUpdate) -> Result<u64, sqlx::Error> {
    let sql = update.sql();
    let mut query = sqlx::query(&sql);

    for value in update.values {
        query = match value {
            SqlValue::String(v) => query.bind(v),
            SqlValue::U64(v) => query.bind(v),
            SqlValue::F64(v) => query.bind(v),
            SqlValue::Date(v) => query.bind(v),
            SqlValue::Null => query.bind(None::<String>),
        };
    }

    let result = query.bind(update.id).execute(pool).await?;
    Ok(result.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const COLUMNS: [Column; 5] = [
        Column::new("name", ColumnKind::Text),
        Column::new("progress", ColumnKind::Percent),
        Column::new("budget", ColumnKind::Amount),
        Column::mapped("site_manager", "site_manager_id", ColumnKind::OptionalId),
        Column::new("status", ColumnKind::Choice(&["planning", "completed"])),
    ];

    fn field_errors(err: AppError) -> Map<String, Value> {
        match err {
            AppError::Validation { errors, .. } => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn active_visibility_filters_deleted_rows() {
        assert_eq!(Visibility::Active.predicate("p"), "p.is_deleted = 0");
        assert_eq!(Visibility::IncludeDeleted.predicate("p"), "1 = 1");
    }

    #[test]
    fn builds_update_for_whitelisted_fields() {
        let payload = json!({ "progress": 40, "site_manager": null, "status": "completed" });
        let update = build_update_sql("projects", &payload, &COLUMNS, 7).unwrap();

        assert_eq!(update.assignments.len(), 3);
        assert!(update.assignments.contains(&"site_manager_id = ?".to_string()));
        assert!(update.values.contains(&SqlValue::F64(40.0)));
        assert!(update.values.contains(&SqlValue::Null));
        assert!(update.sql().starts_with("UPDATE projects SET "));
        assert!(update.sql().ends_with("updated_at = NOW() WHERE id = ? AND is_deleted = 0"));
        assert_eq!(update.id, 7);
    }

    #[test]
    fn rejects_unknown_and_invalid_fields_per_field() {
        let payload = json!({
            "progress": 140,
            "budget": -1,
            "name": "  ",
            "is_deleted": true,
            "status": "demolished"
        });
        let errors = field_errors(build_update_sql("projects", &payload, &COLUMNS, 1).unwrap_err());

        assert_eq!(errors.len(), 5);
        assert!(errors.contains_key("progress"));
        assert!(errors.contains_key("budget"));
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("is_deleted"));
        assert!(errors.contains_key("status"));
    }

    #[test]
    fn rejects_empty_and_non_object_payloads() {
        assert!(matches!(
            build_update_sql("projects", &json!({}), &COLUMNS, 1),
            Err(AppError::Validation { .. })
        ));
        assert!(matches!(
            build_update_sql("projects", &json!([1, 2]), &COLUMNS, 1),
            Err(AppError::Validation { .. })
        ));
    }

    #[test]
    fn raw_assignments_are_appended() {
        let payload = json!({ "name": "Tower B" });
        let mut update = build_update_sql("projects", &payload, &COLUMNS, 3).unwrap();
        update.set_raw("paid_at = NOW()");
        assert!(update.sql().contains("name = ?, paid_at = NOW(), updated_at = NOW()"));
    }
}
