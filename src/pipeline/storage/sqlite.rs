use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Transaction};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::constants::RUN_LEDGER_TABLE;
use crate::error::Result;
use crate::pipeline::processing::normalize::ValidatedBatch;
use crate::types::{Batch, Cell, Column};

/// One successful load, as written to the run ledger
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    /// Sortable run time (`%Y-%m-%d %H:%M:%S` in the configured zone); one
    /// ledger row per second
    pub run_at: String,
    pub source: String,
    pub file_name: String,
    /// SHA-256 of the downloaded file
    pub sha256: String,
    pub row_count: usize,
}

/// The brewing log database
pub struct LogDatabase {
    conn: Connection,
}

impl LogDatabase {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {RUN_LEDGER_TABLE} (
                run_at     TEXT PRIMARY KEY,
                source     TEXT NOT NULL,
                file_name  TEXT NOT NULL,
                sha256     TEXT NOT NULL,
                row_count  INTEGER NOT NULL
            );
            "#
        ))?;
        Ok(Self { conn })
    }

    /// Execute an operator-supplied script (e.g. the table create script)
    pub fn run_script(&self, sql: &str) -> Result<()> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Drop `name` and recreate it holding exactly the rows of `batch`
    pub fn replace_table(&mut self, name: &str, batch: &Batch) -> Result<()> {
        let tx = self.conn.transaction()?;
        write_table(&tx, name, batch)?;
        tx.commit()?;
        info!("💾 Replaced table {} with {} rows", name, batch.num_rows());
        Ok(())
    }

    /// Replace the staging table with the validated batch, run the merge
    /// script into the final table and record the run, all in one transaction
    pub fn load_validated(
        &mut self,
        staging_table: &str,
        batch: &ValidatedBatch,
        insert_sql: &str,
        run: &RunRecord,
    ) -> Result<usize> {
        let tx = self.conn.transaction()?;
        write_table(&tx, staging_table, batch.batch())?;
        tx.execute_batch(insert_sql)?;
        write_run(&tx, run)?;
        tx.commit()?;
        info!(
            "💾 Merged {} validated rows from {}",
            batch.num_rows(),
            staging_table
        );
        Ok(batch.num_rows())
    }

    pub fn record_run(&self, run: &RunRecord) -> Result<()> {
        write_run(&self.conn, run)
    }

    /// Time of the latest run that loaded a file with this checksum
    pub fn find_run_by_checksum(&self, sha256: &str) -> Result<Option<String>> {
        let run_at = self
            .conn
            .query_row(
                &format!(
                    "SELECT run_at FROM {RUN_LEDGER_TABLE} WHERE sha256 = ?1 \
                     ORDER BY run_at DESC, rowid DESC LIMIT 1"
                ),
                params![sha256],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(run_at)
    }

    pub fn count_rows(&self, table: &str) -> Result<i64> {
        let count = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", quote_ident(table)),
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn write_run(conn: &Connection, run: &RunRecord) -> Result<()> {
    conn.execute(
        &format!(
            "INSERT OR REPLACE INTO {RUN_LEDGER_TABLE} (run_at, source, file_name, sha256, row_count) \
             VALUES (?1, ?2, ?3, ?4, ?5)"
        ),
        params![
            run.run_at,
            run.source,
            run.file_name,
            run.sha256,
            run.row_count as i64
        ],
    )?;
    Ok(())
}

fn write_table(tx: &Transaction<'_>, name: &str, batch: &Batch) -> Result<()> {
    let table = quote_ident(name);
    tx.execute_batch(&format!("DROP TABLE IF EXISTS {table};"))?;

    if batch.columns().is_empty() {
        warn!("Batch for {} has no columns, table left dropped", name);
        return Ok(());
    }

    let definitions: Vec<String> = batch
        .columns()
        .iter()
        .map(|c| format!("{} {}", quote_ident(c.name()), column_affinity(c)))
        .collect();
    tx.execute_batch(&format!("CREATE TABLE {table} ({});", definitions.join(", ")))?;

    let names: Vec<String> = batch.columns().iter().map(|c| quote_ident(c.name())).collect();
    let placeholders: Vec<String> = (1..=names.len()).map(|i| format!("?{i}")).collect();
    let mut stmt = tx.prepare(&format!(
        "INSERT INTO {table} ({}) VALUES ({})",
        names.join(", "),
        placeholders.join(", ")
    ))?;
    for position in 0..batch.num_rows() {
        stmt.execute(params_from_iter(batch.row(position).into_iter().map(sql_value)))?;
    }
    debug!("Wrote {} rows into {}", batch.num_rows(), name);
    Ok(())
}

fn column_affinity(column: &Column) -> &'static str {
    let present = || column.values().iter().filter(|c| !c.is_null());
    if present().next().is_none() {
        "TEXT"
    } else if present().all(|c| matches!(c, Cell::Int(_))) {
        "INTEGER"
    } else if present().all(|c| matches!(c, Cell::Int(_) | Cell::Float(_))) {
        "REAL"
    } else {
        "TEXT"
    }
}

fn sql_value(cell: &Cell) -> Value {
    match cell {
        Cell::Null => Value::Null,
        Cell::Int(v) => Value::Integer(*v),
        Cell::Float(v) => Value::Real(*v),
        Cell::Text(s) => Value::Text(s.clone()),
    }
}

/// Quote an identifier for interpolation into SQL
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Batch {
        Batch::from_columns(vec![
            Column::new("brew_date", vec![Cell::Int(1), Cell::Int(2)]),
            Column::new("rating", vec![Cell::Float(4.5), Cell::Int(3)]),
            Column::new("Bean Name", vec!["Guji".into(), Cell::Null]),
        ])
        .unwrap()
    }

    #[test]
    fn test_replace_table_infers_affinity() {
        let mut db = LogDatabase::open_in_memory().unwrap();
        db.replace_table("raw_logs", &sample()).unwrap();
        assert_eq!(db.count_rows("raw_logs").unwrap(), 2);

        let types: Vec<String> = db
            .connection()
            .prepare("SELECT type FROM pragma_table_info('raw_logs') ORDER BY cid")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<_, _>>()
            .unwrap();
        assert_eq!(types, vec!["INTEGER", "REAL", "TEXT"]);
    }

    #[test]
    fn test_replace_table_drops_previous_rows() {
        let mut db = LogDatabase::open_in_memory().unwrap();
        db.replace_table("raw_logs", &sample()).unwrap();
        let one_row = Batch::from_columns(vec![Column::new("brew_date", vec![Cell::Int(9)])]).unwrap();
        db.replace_table("raw_logs", &one_row).unwrap();
        assert_eq!(db.count_rows("raw_logs").unwrap(), 1);
    }

    #[test]
    fn test_failed_script_leaves_no_partial_table() {
        let mut db = LogDatabase::open_in_memory().unwrap();
        db.run_script("CREATE TABLE logs (brew_date INTEGER PRIMARY KEY);").unwrap();
        db.replace_table("logs_tmp", &sample()).unwrap();

        let tx_result = {
            let tx = db.conn.transaction().unwrap();
            write_table(&tx, "logs_tmp", &Batch::new()).unwrap();
            tx.execute_batch("INSERT INTO missing_table SELECT 1;")
        };
        assert!(tx_result.is_err());
        // Rolled back on drop: staging rows are still there
        assert_eq!(db.count_rows("logs_tmp").unwrap(), 2);
    }

    #[test]
    fn test_run_ledger() {
        let db = LogDatabase::open_in_memory().unwrap();
        let run = RunRecord {
            run_at: "2024-03-01 08:15:00".to_string(),
            source: "coffee_guru".to_string(),
            file_name: "coffee_logs.csv".to_string(),
            sha256: sha256_hex(b"payload"),
            row_count: 12,
        };
        db.record_run(&run).unwrap();
        db.record_run(&RunRecord { row_count: 13, ..run.clone() }).unwrap();

        assert_eq!(db.count_rows(RUN_LEDGER_TABLE).unwrap(), 1);
        assert_eq!(
            db.find_run_by_checksum(&run.sha256).unwrap(),
            Some("2024-03-01 08:15:00".to_string())
        );
        assert_eq!(db.find_run_by_checksum("nope").unwrap(), None);
    }

    #[test]
    fn test_latest_run_is_found_across_noon() {
        let db = LogDatabase::open_in_memory().unwrap();
        let run = |run_at: &str| RunRecord {
            run_at: run_at.to_string(),
            source: "coffee_guru".to_string(),
            file_name: "coffee_logs.csv".to_string(),
            sha256: sha256_hex(b"payload"),
            row_count: 2,
        };
        db.record_run(&run("2024-03-01 13:05:00")).unwrap();
        db.record_run(&run("2024-03-01 12:05:00")).unwrap();
        db.record_run(&run("2024-03-01 09:30:00")).unwrap();

        assert_eq!(
            db.find_run_by_checksum(&sha256_hex(b"payload")).unwrap(),
            Some("2024-03-01 13:05:00".to_string())
        );
    }

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("Score (out of 5)"), "\"Score (out of 5)\"");
        assert_eq!(quote_ident("a\"b"), "\"a\"\"b\"");
    }
}
