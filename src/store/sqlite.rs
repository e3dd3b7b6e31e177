use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use rusqlite_migration::{Migrations, M};

use crate::app::{NewsdeskError, Result};
use crate::domain::{NewsRecord, RecordFilter};
use crate::store::Store;

const RECORD_COLUMNS: &str = "link, title, image_url, category, source, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.conn()?;
        migrations.to_latest(&mut conn)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            NewsdeskError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        // Fixed width and always `Z`, so text order is time order.
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
    }

    fn row_to_record(row: &Row<'_>) -> rusqlite::Result<NewsRecord> {
        Ok(NewsRecord {
            link: row.get(0)?,
            title: row.get(1)?,
            image_url: row.get(2)?,
            category: row.get(3)?,
            source: row.get(4)?,
            created_at: row
                .get::<_, String>(5)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
        })
    }
}

impl Store for SqliteStore {
    fn upsert_record(&self, record: &NewsRecord) -> Result<()> {
        let persist_failed = |reason: String| NewsdeskError::PersistFailed {
            link: record.link.clone(),
            reason,
        };

        let conn = self.conn().map_err(|e| persist_failed(e.to_string()))?;
        conn.execute(
            "INSERT INTO news (link, title, image_url, category, source, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(link) DO UPDATE SET
                title = excluded.title,
                image_url = excluded.image_url,
                category = excluded.category,
                source = excluded.source,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                record.link,
                record.title,
                record.image_url,
                record.category,
                record.source,
                Self::format_datetime(&record.created_at),
                Self::format_datetime(&Utc::now()),
            ],
        )
        .map_err(|e| persist_failed(e.to_string()))?;

        Ok(())
    }

    fn get_record(&self, link: &str) -> Result<Option<NewsRecord>> {
        let conn = self.conn()?;

        let record = conn
            .query_row(
                &format!("SELECT {} FROM news WHERE link = ?1", RECORD_COLUMNS),
                params![link],
                Self::row_to_record,
            )
            .optional()?;

        Ok(record)
    }

    fn count_records(&self) -> Result<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM news", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn list_records(&self, filter: &RecordFilter) -> Result<Vec<NewsRecord>> {
        let mut clauses = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(ref category) = filter.category {
            values.push(Value::Text(category.clone()));
            clauses.push(format!("category = ?{}", values.len()));
        }
        if let Some(ref source) = filter.source {
            values.push(Value::Text(source.clone()));
            clauses.push(format!("source = ?{}", values.len()));
        }
        if let Some(ref categories) = filter.categories {
            if categories.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders: Vec<String> = categories
                .iter()
                .map(|c| {
                    values.push(Value::Text(c.clone()));
                    format!("?{}", values.len())
                })
                .collect();
            clauses.push(format!("category IN ({})", placeholders.join(", ")));
        }

        let mut sql = format!("SELECT {} FROM news", RECORD_COLUMNS);
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        values.push(Value::Integer(filter.limit as i64));
        sql.push_str(&format!(
            " ORDER BY created_at DESC, link LIMIT ?{}",
            values.len()
        ));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    fn get_interests(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(
            "SELECT category FROM user_interests WHERE user_id = ?1 ORDER BY rowid",
        )?;
        let categories = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(categories)
    }

    fn set_interests(&self, user_id: &str, categories: &[String]) -> Result<()> {
        let mut conn = self.conn()?;

        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM user_interests WHERE user_id = ?1",
            params![user_id],
        )?;
        for category in categories {
            tx.execute(
                "INSERT OR IGNORE INTO user_interests (user_id, category) VALUES (?1, ?2)",
                params![user_id, category],
            )?;
        }
        tx.commit()?;

        Ok(())
    }
}
