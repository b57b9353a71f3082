use chrono::{NaiveDateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;

use crate::app::{AppError, DbConn};
use crate::schema::admin_audit_logs;

/// Append-only trail of privileged actions. Best effort: a failed write is
/// logged and swallowed, it never fails the mutation that triggered it.
#[derive(Debug, Queryable, Clone, Serialize)]
pub struct AuditLog {
    pub id: i32,
    pub admin_id: String,
    pub action: String,
    pub target_table: String,
    pub target_id: String,
    pub details: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Insertable)]
#[table_name = "admin_audit_logs"]
struct AuditLogInsert {
    admin_id: String,
    action: String,
    target_table: String,
    target_id: String,
    details: Option<String>,
    created_at: NaiveDateTime,
}

impl AuditLog {
    pub fn record(
        conn: &DbConn,
        admin_id: &str,
        action: &str,
        target_table: &str,
        target_id: &str,
        details: serde_json::Value,
    ) {
        let row = AuditLogInsert {
            admin_id: admin_id.to_string(),
            action: action.to_string(),
            target_table: target_table.to_string(),
            target_id: target_id.to_string(),
            details: if details.is_null() {
                None
            } else {
                Some(details.to_string())
            },
            created_at: Utc::now().naive_utc(),
        };

        if let Err(err) = diesel::insert_into(admin_audit_logs::table)
            .values(&row)
            .execute(conn)
        {
            log::warn!(
                "audit log write failed for '{}' on {}/{}: {}",
                action,
                target_table,
                target_id,
                err
            );
        }
    }

    /// Paginated listing, newest first.
    pub fn list(conn: &DbConn, page: i64, limit: i64) -> Result<(Vec<AuditLog>, i64), AppError> {
        let total: i64 = admin_audit_logs::table.count().get_result(conn)?;
        let items = admin_audit_logs::table
            .order(admin_audit_logs::created_at.desc())
            .offset((page - 1) * limit)
            .limit(limit)
            .load::<AuditLog>(conn)?;
        Ok((items, total))
    }
}
