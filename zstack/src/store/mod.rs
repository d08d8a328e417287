//! Metadata store access: image records, their alignment results and the
//! per-record stacking status.

mod migrations;

use std::path::Path;

use rusqlite::{params, params_from_iter, Connection, Row};
use thiserror::Error;

use migrations::run_migrations;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database schema version {found} is newer than supported version {supported}")]
    NewerSchema { found: i32, supported: i32 },

    #[error("No migration to schema version {version}")]
    UnknownMigration { version: i32 },

    #[error("Migration to schema version {version} failed: {source}")]
    Migration {
        version: i32,
        #[source]
        source: rusqlite::Error,
    },
}

/// Stacking state of one image record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackStatus {
    Unprocessed,
    Stacked(String),
    Failed,
}

/// Result of processing one group, applied to all of its source records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Stacked(String),
    Failed,
}

/// One image record: a found target in one exposure, with its alignment
/// result and stacking status.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageRow {
    pub foundid: i64,
    pub desg: String,
    pub nightid: i64,
    pub night: Option<String>,
    pub obsjd: f64,
    pub filter: String,
    pub archivefile: Option<String>,
    pub rh: Option<f64>,
    pub rdot: Option<f64>,
    pub delta: Option<f64>,
    pub sangleimg: Option<i64>,
    pub vangleimg: Option<i64>,
    pub status: StackStatus,
}

impl ImageRow {
    /// Alignment succeeded with non-zero position angles and a cutout exists.
    pub fn is_eligible(&self) -> bool {
        self.sangleimg.is_some_and(|v| v != 0)
            && self.vangleimg.is_some_and(|v| v != 0)
            && self.archivefile.is_some()
    }

    pub fn is_processed(&self) -> bool {
        self.status != StackStatus::Unprocessed
    }
}

const IMAGE_ROWS_SQL: &str = "
    SELECT found.foundid, found.desg, obs.nightid, nights.date,
           CAST(found.obsjd AS REAL) AS obsjd, obs.filtercode, found.archivefile,
           found.rh, found.rdot, found.delta,
           projections.sangleimg, projections.vangleimg,
           stacks.stackfile, stacks.stacked
    FROM found
    INNER JOIN obs ON obs.pid = found.pid
    LEFT JOIN nights ON nights.nightid = obs.nightid
    LEFT JOIN projections ON projections.foundid = found.foundid
    LEFT JOIN stacks ON stacks.foundid = found.foundid";

fn row_to_image(row: &Row) -> rusqlite::Result<ImageRow> {
    let stackfile: Option<String> = row.get("stackfile")?;
    let stacked: Option<i64> = row.get("stacked")?;
    let status = match (stacked, stackfile) {
        (None, _) => StackStatus::Unprocessed,
        (Some(0), _) | (Some(_), None) => StackStatus::Failed,
        (Some(_), Some(file)) => StackStatus::Stacked(file),
    };

    Ok(ImageRow {
        foundid: row.get("foundid")?,
        desg: row.get("desg")?,
        nightid: row.get("nightid")?,
        night: row.get("date")?,
        obsjd: row.get("obsjd")?,
        filter: row.get("filtercode")?,
        archivefile: row.get("archivefile")?,
        rh: row.get("rh")?,
        rdot: row.get("rdot")?,
        delta: row.get("delta")?,
        sangleimg: row.get("sangleimg")?,
        vangleimg: row.get("vangleimg")?,
        status,
    })
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(mut conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        Ok(Self { conn })
    }

    /// Raw access for populating records; upstream tools own those tables.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// All image records, optionally restricted to the given designations,
    /// ordered by record id.
    pub fn image_rows(&self, desgs: &[String]) -> Result<Vec<ImageRow>, StoreError> {
        let mut sql = IMAGE_ROWS_SQL.to_string();
        if !desgs.is_empty() {
            let placeholders = vec!["?"; desgs.len()].join(", ");
            sql.push_str(&format!(" WHERE found.desg IN ({placeholders})"));
        }
        sql.push_str(" ORDER BY found.foundid");

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(desgs.iter()), row_to_image)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Writes `outcome` for every id in one transaction, replacing earlier status.
    pub fn record_outcome(&mut self, ids: &[i64], outcome: &Outcome) -> Result<(), StoreError> {
        let (stackfile, stacked) = match outcome {
            Outcome::Stacked(file) => (Some(file.as_str()), 1),
            Outcome::Failed => (None, 0),
        };

        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO stacks (foundid, stackfile, stacked) VALUES (?1, ?2, ?3)",
            )?;
            for id in ids {
                stmt.execute(params![id, stackfile, stacked])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// `(foundid, stackfile)` of every successfully stacked record.
    pub fn stacked_files(&self) -> Result<Vec<(i64, String)>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT foundid, stackfile FROM stacks
             WHERE stacked != 0 AND stackfile IS NOT NULL
             ORDER BY foundid",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Forgets the status of the given records so they are selected again.
    pub fn clear_status(&mut self, ids: &[i64]) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        let mut cleared = 0;
        {
            let mut stmt = tx.prepare("DELETE FROM stacks WHERE foundid = ?1")?;
            for id in ids {
                cleared += stmt.execute([id])?;
            }
        }
        tx.commit()?;
        Ok(cleared)
    }
}
