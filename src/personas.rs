use crate::error::StoreError;
use chrono::Utc;
use rusqlite::{params, Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::info;
use uuid::Uuid;

/// Characters that are unsafe as row keys in the backing store.
const UNSAFE_NAME_CHARS: [char; 4] = ['/', '\\', '#', '?'];

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Persona {
    pub name: String,
    pub wins: i64,
    pub losses: i64,
    pub total_debates: i64,
}

impl Persona {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            wins: 0,
            losses: 0,
            total_debates: 0,
        }
    }

    pub fn win_pct(&self) -> f64 {
        if self.total_debates == 0 {
            0.0
        } else {
            self.wins as f64 / self.total_debates as f64
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct LeaderboardRow {
    pub name: String,
    pub wins: i64,
    pub losses: i64,
    pub total_debates: i64,
    pub win_pct: f64,
}

/// Writes go through `writer`; `list`/`get` run on a dedicated read-only
/// connection and never wait on an in-flight write transaction.
pub struct PersonaStore {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
}

impl PersonaStore {
    /// Open (and create if needed) the store at `connection`, a SQLite path
    /// or `:memory:`.
    ///
    /// File databases run in WAL mode so the reader connection sees point
    /// reads without blocking on the writer. `:memory:` is mapped to a
    /// unique shared-cache database so both connections share one store.
    pub fn open(connection: &str) -> Result<Self, StoreError> {
        let in_memory = connection == ":memory:";
        let target = if in_memory {
            format!("file:personas-{}?mode=memory&cache=shared", Uuid::new_v4())
        } else {
            connection.to_string()
        };

        let writer = Connection::open(&target)?;
        if !in_memory {
            writer.pragma_update(None, "journal_mode", "WAL")?;
        }
        writer.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS personas (
                name TEXT PRIMARY KEY,
                wins INTEGER NOT NULL DEFAULT 0,
                losses INTEGER NOT NULL DEFAULT 0,
                total_debates INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );
        ",
        )?;

        let reader = Connection::open_with_flags(
            &target,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Ok(Self {
            writer: Mutex::new(writer),
            reader: Mutex::new(reader),
        })
    }

    fn validate_name(name: &str) -> Result<(), StoreError> {
        if name.trim().is_empty() || name.contains(UNSAFE_NAME_CHARS) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Persona>, StoreError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT name, wins, losses, total_debates FROM personas ORDER BY name ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Persona {
                name: row.get(0)?,
                wins: row.get(1)?,
                losses: row.get(2)?,
                total_debates: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get(&self, name: &str) -> Result<Option<Persona>, StoreError> {
        let conn = self.reader.lock().unwrap();
        Self::fetch(&conn, name)
    }

    fn fetch(conn: &Connection, name: &str) -> Result<Option<Persona>, StoreError> {
        let mut stmt = conn
            .prepare("SELECT name, wins, losses, total_debates FROM personas WHERE name = ?1")?;
        let mut rows = stmt.query_map(params![name], |row| {
            Ok(Persona {
                name: row.get(0)?,
                wins: row.get(1)?,
                losses: row.get(2)?,
                total_debates: row.get(3)?,
            })
        })?;
        match rows.next() {
            Some(row) => Ok(Some(row?)),
            None => Ok(None),
        }
    }

    pub fn upsert(&self, persona: &Persona) -> Result<(), StoreError> {
        Self::validate_name(&persona.name)?;
        let conn = self.writer.lock().unwrap();
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO personas (name, wins, losses, total_debates, version, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 0, ?5, ?5)
             ON CONFLICT(name) DO UPDATE SET
                wins = excluded.wins,
                losses = excluded.losses,
                total_debates = excluded.total_debates,
                version = personas.version + 1,
                updated_at = excluded.updated_at",
            params![
                persona.name,
                persona.wins,
                persona.losses,
                persona.total_debates,
                now
            ],
        )?;
        Ok(())
    }

    /// Insert zeroed personas for `names`, but only when the store holds none.
    /// Returns how many rows were seeded.
    pub fn seed_if_empty(&self, names: &[String]) -> Result<usize, StoreError> {
        for name in names {
            Self::validate_name(name)?;
        }
        let mut conn = self.writer.lock().unwrap();
        let tx = conn.transaction()?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM personas", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(0);
        }
        let now = Utc::now().to_rfc3339();
        for name in names {
            tx.execute(
                "INSERT INTO personas (name, wins, losses, total_debates, version, created_at, updated_at)
                 VALUES (?1, 0, 0, 0, 0, ?2, ?2)",
                params![name, now],
            )?;
        }
        tx.commit()?;
        info!(seeded = names.len(), "seeded persona store");
        Ok(names.len())
    }

    /// Record one debate outcome: winner gains a win, loser a loss, both gain
    /// a debate. Both rows are updated inside a single transaction with their
    /// versions bumped, so overlapping outcomes cannot lose an increment.
    pub fn record_outcome(&self, winner: &str, loser: &str) -> Result<(), StoreError> {
        let mut conn = self.writer.lock().unwrap();
        let tx = conn.transaction()?;
        let win_row =
            Self::fetch(&tx, winner)?.ok_or_else(|| StoreError::NotFound(winner.to_string()))?;
        let lose_row =
            Self::fetch(&tx, loser)?.ok_or_else(|| StoreError::NotFound(loser.to_string()))?;
        let now = Utc::now().to_rfc3339();
        tx.execute(
            "UPDATE personas SET wins = ?1, total_debates = ?2, version = version + 1, updated_at = ?3 WHERE name = ?4",
            params![win_row.wins + 1, win_row.total_debates + 1, now, winner],
        )?;
        tx.execute(
            "UPDATE personas SET losses = ?1, total_debates = ?2, version = version + 1, updated_at = ?3 WHERE name = ?4",
            params![lose_row.losses + 1, lose_row.total_debates + 1, now, loser],
        )?;
        tx.commit()?;
        info!(winner, loser, "recorded debate outcome");
        Ok(())
    }

    /// Personas ranked by win percentage desc, then wins desc, then losses asc.
    pub fn leaderboard(&self, cap: usize) -> Result<Vec<LeaderboardRow>, StoreError> {
        let mut rows: Vec<LeaderboardRow> = self
            .list()?
            .into_iter()
            .map(|p| LeaderboardRow {
                win_pct: p.win_pct(),
                name: p.name,
                wins: p.wins,
                losses: p.losses,
                total_debates: p.total_debates,
            })
            .collect();
        rows.sort_by(|a, b| {
            b.win_pct
                .partial_cmp(&a.win_pct)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(b.wins.cmp(&a.wins))
                .then(a.losses.cmp(&b.losses))
        });
        rows.truncate(cap);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_test_store() -> PersonaStore {
        PersonaStore::open(":memory:").expect("in-memory store should initialize")
    }

    fn seed_names(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn unit_validate_name_rejects_store_separators() {
        let store = new_test_store();
        for bad in ["a/b", "a\\b", "a#b", "a?b", "", "   "] {
            assert!(
                store.upsert(&Persona::new(bad)).is_err(),
                "{bad:?} should be rejected"
            );
        }
        assert!(store.upsert(&Persona::new("The Notorious B.I.G.")).is_ok());
    }

    #[test]
    fn integration_seed_if_empty_only_seeds_once() {
        let store = new_test_store();
        let seeded = store
            .seed_if_empty(&seed_names(&["A", "B"]))
            .expect("seed should succeed");
        assert_eq!(seeded, 2);

        let seeded_again = store
            .seed_if_empty(&seed_names(&["C"]))
            .expect("second seed should succeed");
        assert_eq!(seeded_again, 0);
        assert_eq!(store.list().expect("list should succeed").len(), 2);
    }

    #[test]
    fn integration_record_outcome_updates_both_rows() {
        let store = new_test_store();
        store
            .seed_if_empty(&seed_names(&["A", "B"]))
            .expect("seed should succeed");

        store.record_outcome("A", "B").expect("outcome should record");
        store.record_outcome("A", "B").expect("outcome should record");
        store.record_outcome("B", "A").expect("outcome should record");

        let a = store.get("A").expect("get should succeed").expect("A exists");
        let b = store.get("B").expect("get should succeed").expect("B exists");
        assert_eq!((a.wins, a.losses, a.total_debates), (2, 1, 3));
        assert_eq!((b.wins, b.losses, b.total_debates), (1, 2, 3));
        assert_eq!(a.total_debates, a.wins + a.losses);
    }

    #[test]
    fn integration_record_outcome_missing_persona_is_not_found() {
        let store = new_test_store();
        store
            .seed_if_empty(&seed_names(&["A"]))
            .expect("seed should succeed");

        let err = store.record_outcome("A", "ghost").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(ref n) if n == "ghost"));

        // The failed pairwise update must not half-apply.
        let a = store.get("A").expect("get should succeed").expect("A exists");
        assert_eq!((a.wins, a.total_debates), (0, 0));
    }

    #[test]
    fn integration_leaderboard_orders_by_pct_then_wins_then_losses() {
        let store = new_test_store();
        for (name, wins, losses) in [
            ("half", 2, 2),
            ("champ", 3, 0),
            ("grinder", 6, 6),
            ("rookie", 0, 0),
        ] {
            store
                .upsert(&Persona {
                    name: name.to_string(),
                    wins,
                    losses,
                    total_debates: wins + losses,
                })
                .expect("upsert should succeed");
        }

        let board = store.leaderboard(10).expect("leaderboard should load");
        let names: Vec<&str> = board.iter().map(|r| r.name.as_str()).collect();
        // grinder beats half on wins at equal pct; rookie trails at 0%.
        assert_eq!(names, vec!["champ", "grinder", "half", "rookie"]);

        let capped = store.leaderboard(2).expect("leaderboard should load");
        assert_eq!(capped.len(), 2);
    }

    #[test]
    fn integration_upsert_bumps_version_for_existing_rows() {
        let store = new_test_store();
        let mut p = Persona::new("A");
        store.upsert(&p).expect("insert should succeed");
        p.wins = 5;
        p.total_debates = 5;
        store.upsert(&p).expect("update should succeed");

        let version: i64 = store
            .reader
            .lock()
            .unwrap()
            .query_row(
                "SELECT version FROM personas WHERE name = 'A'",
                [],
                |row| row.get(0),
            )
            .expect("version query should succeed");
        assert_eq!(version, 1);
    }

    #[test]
    fn unit_reader_connection_rejects_writes() {
        let store = new_test_store();
        let result = store.reader.lock().unwrap().execute(
            "INSERT INTO personas (name, wins, losses, total_debates, version, created_at, updated_at)
             VALUES ('X', 0, 0, 0, 0, '', '')",
            [],
        );
        assert!(result.is_err());
    }

    #[test]
    fn integration_reads_observe_writes_from_the_writer_connection() {
        let store = new_test_store();
        store
            .seed_if_empty(&seed_names(&["A", "B"]))
            .expect("seed should succeed");
        store.record_outcome("A", "B").expect("outcome should record");

        // Both read paths go through the dedicated reader connection.
        let a = store.get("A").expect("get should succeed").expect("A exists");
        assert_eq!(a.wins, 1);
        assert_eq!(store.list().expect("list should succeed").len(), 2);
    }
}
