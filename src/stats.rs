use chrono::{DateTime, Local};
use rusqlite::{params, Connection, Result};
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;
use crate::controller::SessionSummary;

/// One finished memorization session as stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRecord {
    pub surah_id: u32,
    pub start_ayah: u32,
    pub end_ayah: u32,
    pub ayah_repetitions: u32,
    pub surah_repetitions: u32,
    pub elapsed_secs: u64,
    pub total_mistakes: u32,
    pub verses_played: u32,
    pub outcome: String,
    pub finished_at: DateTime<Local>,
}

impl SessionRecord {
    pub fn from_summary(summary: &SessionSummary, finished_at: DateTime<Local>) -> Self {
        Self {
            surah_id: summary.surah_id,
            start_ayah: summary.start_ayah,
            end_ayah: summary.end_ayah,
            ayah_repetitions: summary.ayah_repetitions,
            surah_repetitions: summary.surah_repetitions,
            elapsed_secs: summary.elapsed.as_secs(),
            total_mistakes: summary.total_mistakes,
            verses_played: summary.verses_played,
            outcome: summary.reason.as_str().to_string(),
            finished_at,
        }
    }
}

/// Aggregates over the whole history
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Totals {
    pub sessions: u32,
    pub completed: u32,
    pub total_secs: u64,
    pub total_mistakes: u32,
}

/// Session history database
#[derive(Debug)]
pub struct StatsDb {
    conn: Connection,
}

impl StatsDb {
    /// Open the database at the default state location
    pub fn new() -> Result<Self> {
        let db_path = AppDirs::db_path().unwrap_or_else(|| PathBuf::from("ayah_echo_sessions.db"));
        Self::with_path(db_path)
    }

    pub fn with_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CANTOPEN),
                    Some(format!("Failed to create directory: {e}")),
                )
            })?;
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                surah_id INTEGER NOT NULL,
                start_ayah INTEGER NOT NULL,
                end_ayah INTEGER NOT NULL,
                ayah_repetitions INTEGER NOT NULL,
                surah_repetitions INTEGER NOT NULL,
                elapsed_secs INTEGER NOT NULL,
                total_mistakes INTEGER NOT NULL,
                verses_played INTEGER NOT NULL,
                outcome TEXT NOT NULL,
                finished_at TEXT NOT NULL
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_sessions_finished_at ON sessions(finished_at)",
            [],
        )?;

        Ok(StatsDb { conn })
    }

    pub fn record_session(&self, record: &SessionRecord) -> Result<()> {
        self.conn.execute(
            r#"
            INSERT INTO sessions
            (surah_id, start_ayah, end_ayah, ayah_repetitions, surah_repetitions,
             elapsed_secs, total_mistakes, verses_played, outcome, finished_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.surah_id,
                record.start_ayah,
                record.end_ayah,
                record.ayah_repetitions,
                record.surah_repetitions,
                record.elapsed_secs as i64,
                record.total_mistakes,
                record.verses_played,
                record.outcome,
                record.finished_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Most recent sessions first
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<SessionRecord>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT surah_id, start_ayah, end_ayah, ayah_repetitions, surah_repetitions,
                   elapsed_secs, total_mistakes, verses_played, outcome, finished_at
            FROM sessions
            ORDER BY finished_at DESC, id DESC
            LIMIT ?1
            "#,
        )?;

        let rows = stmt.query_map([limit as i64], |row| {
            let finished_at: String = row.get(9)?;
            let finished_at = DateTime::parse_from_rfc3339(&finished_at)
                .map_err(|_| {
                    rusqlite::Error::InvalidColumnType(
                        9,
                        "finished_at".to_string(),
                        rusqlite::types::Type::Text,
                    )
                })?
                .with_timezone(&Local);

            Ok(SessionRecord {
                surah_id: row.get(0)?,
                start_ayah: row.get(1)?,
                end_ayah: row.get(2)?,
                ayah_repetitions: row.get(3)?,
                surah_repetitions: row.get(4)?,
                elapsed_secs: row.get::<_, i64>(5)?.max(0) as u64,
                total_mistakes: row.get(6)?,
                verses_played: row.get(7)?,
                outcome: row.get(8)?,
                finished_at,
            })
        })?;

        rows.collect()
    }

    pub fn totals(&self) -> Result<Totals> {
        self.conn.query_row(
            r#"
            SELECT
                COUNT(*),
                COALESCE(SUM(CASE WHEN outcome = 'completed' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(elapsed_secs), 0),
                COALESCE(SUM(total_mistakes), 0)
            FROM sessions
            "#,
            [],
            |row| {
                Ok(Totals {
                    sessions: row.get(0)?,
                    completed: row.get(1)?,
                    total_secs: row.get::<_, i64>(2)?.max(0) as u64,
                    total_mistakes: row.get(3)?,
                })
            },
        )
    }

    /// Forget every recorded session, returning how many were removed.
    pub fn clear_all(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM sessions", [])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::EndReason;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration;
    use tempfile::tempdir;

    fn summary(reason: EndReason, secs: u64, mistakes: u32) -> SessionSummary {
        SessionSummary {
            surah_id: 112,
            start_ayah: 1,
            end_ayah: 4,
            ayah_repetitions: 3,
            surah_repetitions: 2,
            elapsed: Duration::from_secs(secs),
            final_mistakes: 0,
            total_mistakes: mistakes,
            verses_played: 8,
            reason,
        }
    }

    #[test]
    fn test_record_and_read_back() {
        let db = StatsDb::in_memory().unwrap();
        let now = Local::now();
        let record = SessionRecord::from_summary(&summary(EndReason::Completed, 125, 4), now);

        db.record_session(&record).unwrap();
        let recent = db.recent_sessions(10).unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].surah_id, 112);
        assert_eq!(recent[0].elapsed_secs, 125);
        assert_eq!(recent[0].total_mistakes, 4);
        assert_eq!(recent[0].outcome, "completed");
        assert_eq!(recent[0].finished_at.timestamp(), now.timestamp());
    }

    #[test]
    fn test_recent_sessions_newest_first_with_limit() {
        let db = StatsDb::in_memory().unwrap();
        let base = Local::now();
        for i in 0..5 {
            let record = SessionRecord::from_summary(
                &summary(EndReason::Completed, i, 0),
                base + ChronoDuration::minutes(i as i64),
            );
            db.record_session(&record).unwrap();
        }

        let recent = db.recent_sessions(3).unwrap();

        assert_eq!(
            recent.iter().map(|r| r.elapsed_secs).collect::<Vec<_>>(),
            vec![4, 3, 2]
        );
    }

    #[test]
    fn test_totals() {
        let db = StatsDb::in_memory().unwrap();
        assert_eq!(db.totals().unwrap(), Totals::default());

        let now = Local::now();
        db.record_session(&SessionRecord::from_summary(
            &summary(EndReason::Completed, 60, 2),
            now,
        ))
        .unwrap();
        db.record_session(&SessionRecord::from_summary(
            &summary(EndReason::ContentUnavailable("offline".into()), 10, 1),
            now,
        ))
        .unwrap();

        let totals = db.totals().unwrap();
        assert_eq!(totals.sessions, 2);
        assert_eq!(totals.completed, 1);
        assert_eq!(totals.total_secs, 70);
        assert_eq!(totals.total_mistakes, 3);
    }

    #[test]
    fn test_clear_all() {
        let db = StatsDb::in_memory().unwrap();
        db.record_session(&SessionRecord::from_summary(
            &summary(EndReason::EndedByUser, 5, 0),
            Local::now(),
        ))
        .unwrap();

        assert_eq!(db.clear_all().unwrap(), 1);
        assert!(db.recent_sessions(10).unwrap().is_empty());
        assert_eq!(db.clear_all().unwrap(), 0);
    }

    #[test]
    fn test_file_backed_db_persists() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state").join("sessions.db");

        {
            let db = StatsDb::with_path(&path).unwrap();
            db.record_session(&SessionRecord::from_summary(
                &summary(EndReason::Completed, 30, 0),
                Local::now(),
            ))
            .unwrap();
        }

        let db = StatsDb::with_path(&path).unwrap();
        assert_eq!(db.recent_sessions(10).unwrap().len(), 1);
    }
}
