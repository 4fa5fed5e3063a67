//! Follow-ups repository.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tether_core::{FollowUp, FollowUpKind, FollowUpStatus};
use uuid::Uuid;

use crate::error::Result;

/// Repository for follow-up operations.
pub struct FollowUpsRepo;

impl FollowUpsRepo {
    /// Insert or update a follow-up, keyed by id.
    pub fn upsert(conn: &Connection, followup: &FollowUp) -> Result<()> {
        conn.execute(
            "INSERT INTO follow_ups (id, title, kind, status, contact_label, web_url,
                 completed, notify, due_at, snoozed_until, last_scheduled_at,
                 last_overdue_notified_at, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
             ON CONFLICT(id) DO UPDATE SET
                 title = ?2, kind = ?3, status = ?4, contact_label = ?5, web_url = ?6,
                 completed = ?7, notify = ?8, due_at = ?9, snoozed_until = ?10,
                 last_scheduled_at = ?11, last_overdue_notified_at = ?12,
                 updated_at = datetime('now')",
            params![
                followup.id.to_string(),
                followup.title,
                followup.kind.as_str(),
                followup.status.as_str(),
                followup.contact_label,
                followup.web_url,
                followup.completed as i32,
                followup.notify as i32,
                followup.due_at.map(to_rfc3339),
                followup.snoozed_until.map(to_rfc3339),
                followup.last_scheduled_at.map(to_rfc3339),
                followup.last_overdue_notified_at.map(to_rfc3339),
                to_rfc3339(followup.created_at),
            ],
        )?;

        Ok(())
    }

    /// Get a follow-up by id.
    pub fn get_by_id(conn: &Connection, id: Uuid) -> Result<Option<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups WHERE id = ?1",
        )?;

        let followup = stmt.query_row([id.to_string()], row_to_followup).ok();

        Ok(followup)
    }

    /// Delete a follow-up.
    pub fn delete(conn: &Connection, id: Uuid) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM follow_ups WHERE id = ?1", [id.to_string()])?;
        Ok(deleted > 0)
    }

    /// Get all open follow-ups, soonest due first, undated last.
    pub fn get_open(conn: &Connection) -> Result<Vec<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups WHERE completed = 0
             ORDER BY due_at IS NULL, due_at ASC",
        )?;

        let followups = stmt
            .query_map([], row_to_followup)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(followups)
    }

    /// Get all follow-ups, oldest first.
    pub fn get_all(conn: &Connection) -> Result<Vec<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups ORDER BY created_at ASC",
        )?;

        let followups = stmt
            .query_map([], row_to_followup)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(followups)
    }

    /// Open, notifying follow-ups with a due time, soonest first. Rows with
    /// no snooze sort ahead of snoozed ones.
    pub fn due_candidates(conn: &Connection, limit: usize) -> Result<Vec<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups
             WHERE completed = 0 AND notify = 1 AND due_at IS NOT NULL
             ORDER BY snoozed_until ASC, due_at ASC
             LIMIT ?1",
        )?;

        let followups = stmt
            .query_map([limit as i64], row_to_followup)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(followups)
    }

    /// Follow-ups that must not notify: completed or opted out.
    pub fn suppressed(conn: &Connection) -> Result<Vec<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups WHERE completed = 1 OR notify = 0",
        )?;

        let followups = stmt
            .query_map([], row_to_followup)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(followups)
    }

    /// Notifying follow-ups due before `due_before` whose last overdue alert
    /// is absent or predates `not_notified_since`.
    pub fn overdue_candidates(
        conn: &Connection,
        due_before: DateTime<Utc>,
        not_notified_since: DateTime<Utc>,
    ) -> Result<Vec<FollowUp>> {
        let mut stmt = conn.prepare(
            "SELECT id, title, kind, status, contact_label, web_url, completed, notify,
                 due_at, snoozed_until, last_scheduled_at, last_overdue_notified_at, created_at
             FROM follow_ups
             WHERE completed = 0 AND notify = 1 AND due_at IS NOT NULL
               AND due_at < ?1
               AND (last_overdue_notified_at IS NULL OR last_overdue_notified_at < ?2)
             ORDER BY due_at ASC",
        )?;

        let followups = stmt
            .query_map(
                params![to_rfc3339(due_before), to_rfc3339(not_notified_since)],
                row_to_followup,
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(followups)
    }

    /// Count total follow-ups.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM follow_ups", [], |row| row.get(0))?;
        Ok(count)
    }
}

/// Map a database row onto a follow-up. Column order matches the SELECT
/// lists above.
fn row_to_followup(row: &Row<'_>) -> rusqlite::Result<FollowUp> {
    let id_str: String = row.get(0)?;
    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let kind_str: String = row.get(2)?;
    let status_str: String = row.get(3)?;

    Ok(FollowUp {
        id,
        title: row.get(1)?,
        kind: FollowUpKind::parse(&kind_str).unwrap_or(FollowUpKind::DoIt),
        status: FollowUpStatus::parse(&status_str).unwrap_or(FollowUpStatus::Open),
        contact_label: row.get(4)?,
        web_url: row.get(5)?,
        completed: row.get::<_, i32>(6)? != 0,
        notify: row.get::<_, i32>(7)? != 0,
        due_at: row.get::<_, Option<String>>(8)?.map(|s| parse_datetime(&s)),
        snoozed_until: row.get::<_, Option<String>>(9)?.map(|s| parse_datetime(&s)),
        last_scheduled_at: row.get::<_, Option<String>>(10)?.map(|s| parse_datetime(&s)),
        last_overdue_notified_at: row.get::<_, Option<String>>(11)?.map(|s| parse_datetime(&s)),
        created_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

/// Storage form for timestamps. The fixed-width fraction keeps SQL string
/// comparison consistent with chronological order.
fn to_rfc3339(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true)
}

/// Parse a datetime from SQLite format.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|dt| dt.and_utc())
        })
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::run_migrations;
    use chrono::Duration;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    fn sample(title: &str, due_in_minutes: i64) -> FollowUp {
        FollowUp::new(title, FollowUpKind::DoIt)
            .with_due_at(Utc::now() + Duration::minutes(due_in_minutes))
    }

    #[test]
    fn test_upsert_and_get() {
        let conn = setup_db();

        let f = sample("Send invoice", 60)
            .with_contact("Priya")
            .with_web_url("https://example.com/thread/9");
        FollowUpsRepo::upsert(&conn, &f).unwrap();

        let retrieved = FollowUpsRepo::get_by_id(&conn, f.id).unwrap().unwrap();
        assert_eq!(retrieved, f);
    }

    #[test]
    fn test_get_unknown_is_none() {
        let conn = setup_db();
        let retrieved = FollowUpsRepo::get_by_id(&conn, Uuid::new_v4()).unwrap();
        assert!(retrieved.is_none());
    }

    #[test]
    fn test_upsert_updates_in_place() {
        let conn = setup_db();

        let mut f = sample("Original", 60);
        FollowUpsRepo::upsert(&conn, &f).unwrap();

        f.title = "Renamed".to_string();
        f.snoozed_until = Some(Utc::now() + Duration::hours(2));
        FollowUpsRepo::upsert(&conn, &f).unwrap();

        assert_eq!(FollowUpsRepo::count(&conn).unwrap(), 1);
        let retrieved = FollowUpsRepo::get_by_id(&conn, f.id).unwrap().unwrap();
        assert_eq!(retrieved.title, "Renamed");
        assert_eq!(retrieved.snoozed_until, f.snoozed_until);
        assert_eq!(retrieved.created_at, f.created_at);
    }

    #[test]
    fn test_delete() {
        let conn = setup_db();

        let f = sample("To delete", 60);
        FollowUpsRepo::upsert(&conn, &f).unwrap();

        assert!(FollowUpsRepo::delete(&conn, f.id).unwrap());
        assert!(FollowUpsRepo::get_by_id(&conn, f.id).unwrap().is_none());
        assert!(!FollowUpsRepo::delete(&conn, f.id).unwrap());
    }

    #[test]
    fn test_get_open_excludes_completed() {
        let conn = setup_db();

        FollowUpsRepo::upsert(&conn, &sample("Open", 60)).unwrap();

        let mut done = sample("Done", 30);
        done.mark_done();
        FollowUpsRepo::upsert(&conn, &done).unwrap();

        let open = FollowUpsRepo::get_open(&conn).unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].title, "Open");
    }

    #[test]
    fn test_get_open_puts_undated_last() {
        let conn = setup_db();

        FollowUpsRepo::upsert(&conn, &FollowUp::new("Undated", FollowUpKind::DoIt)).unwrap();
        FollowUpsRepo::upsert(&conn, &sample("Dated", 60)).unwrap();

        let open = FollowUpsRepo::get_open(&conn).unwrap();
        assert_eq!(open[0].title, "Dated");
        assert_eq!(open[1].title, "Undated");
    }

    #[test]
    fn test_due_candidates_filter_and_order() {
        let conn = setup_db();

        let plain = sample("Plain", 120);
        let mut snoozed = sample("Snoozed", 10);
        snoozed.snooze_until(Utc::now() + Duration::hours(1));
        let mut muted = sample("Muted", 5);
        muted.notify = false;
        let undated = FollowUp::new("Undated", FollowUpKind::DoIt);

        for f in [&plain, &snoozed, &muted, &undated] {
            FollowUpsRepo::upsert(&conn, f).unwrap();
        }

        let rows = FollowUpsRepo::due_candidates(&conn, 10).unwrap();
        assert_eq!(rows.len(), 2);
        // NULL snoozed_until sorts ahead of any snooze time
        assert_eq!(rows[0].id, plain.id);
        assert_eq!(rows[1].id, snoozed.id);
    }

    #[test]
    fn test_due_candidates_respects_limit() {
        let conn = setup_db();

        for i in 0..5 {
            FollowUpsRepo::upsert(&conn, &sample("x", i + 1)).unwrap();
        }

        let rows = FollowUpsRepo::due_candidates(&conn, 3).unwrap();
        assert_eq!(rows.len(), 3);
    }

    #[test]
    fn test_suppressed_returns_done_and_muted() {
        let conn = setup_db();

        FollowUpsRepo::upsert(&conn, &sample("Live", 60)).unwrap();

        let mut done = sample("Done", 30);
        done.mark_done();
        FollowUpsRepo::upsert(&conn, &done).unwrap();

        let mut muted = sample("Muted", 30);
        muted.notify = false;
        FollowUpsRepo::upsert(&conn, &muted).unwrap();

        let rows = FollowUpsRepo::suppressed(&conn).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|f| !f.is_notify_eligible()));
    }

    #[test]
    fn test_overdue_candidates_gates() {
        let conn = setup_db();
        let now = Utc::now();
        let day_start = now - Duration::hours(8);

        let old_enough = sample("Old", -90);
        let too_recent = sample("Recent", -10);
        let mut already = sample("Already", -120);
        already.last_overdue_notified_at = Some(now - Duration::hours(1));
        let mut yesterday = sample("Yesterday", -120);
        yesterday.last_overdue_notified_at = Some(day_start - Duration::hours(2));

        for f in [&old_enough, &too_recent, &already, &yesterday] {
            FollowUpsRepo::upsert(&conn, f).unwrap();
        }

        let rows =
            FollowUpsRepo::overdue_candidates(&conn, now - Duration::minutes(30), day_start)
                .unwrap();
        let titles: Vec<&str> = rows.iter().map(|f| f.title.as_str()).collect();
        assert!(titles.contains(&"Old"));
        assert!(titles.contains(&"Yesterday"));
        assert!(!titles.contains(&"Recent"));
        assert!(!titles.contains(&"Already"));
    }

    #[test]
    fn test_kind_and_status_survive_storage() {
        let conn = setup_db();

        let mut f = FollowUp::new("Waiting on Sam", FollowUpKind::WaitingOn);
        f.snooze_until(Utc::now() + Duration::hours(1));
        FollowUpsRepo::upsert(&conn, &f).unwrap();

        let retrieved = FollowUpsRepo::get_by_id(&conn, f.id).unwrap().unwrap();
        assert_eq!(retrieved.kind, FollowUpKind::WaitingOn);
        assert_eq!(retrieved.status, FollowUpStatus::Snoozed);
    }

    #[test]
    fn test_count() {
        let conn = setup_db();
        assert_eq!(FollowUpsRepo::count(&conn).unwrap(), 0);

        FollowUpsRepo::upsert(&conn, &sample("a", 1)).unwrap();
        FollowUpsRepo::upsert(&conn, &sample("b", 2)).unwrap();
        assert_eq!(FollowUpsRepo::count(&conn).unwrap(), 2);
    }
}
