//! SQLite-backed remote store.
//!
//! One connection behind a mutex. Run paths and captured areas are stored
//! as MessagePack blobs; each run also keeps a simplified, encoded polyline
//! for map display. Territory cells are keyed on `(lat_idx, lon_idx)` and upserted,
//! so whichever write lands last owns the cell.

use std::sync::{Mutex, MutexGuard};

use geo::LineString;
use log::{debug, info};
use rusqlite::{Connection, OptionalExtension, Row, params};
use rusqlite_migration::{M, Migrations};
use turfcore::geo_utils::simplify_path;
use turfcore::{AreaModel, LocationModel, RunSession, TerritoryCell, UserProfile};

use crate::error::AppResult;
use crate::store::{FriendRequest, FriendRequestStatus, RemoteStore};

/// Polyline precision (5 decimal places, Google format)
const POLYLINE_PRECISION: u32 = 5;

/// Douglas-Peucker tolerance for the display polyline (m).
const POLYLINE_TOLERANCE_M: f64 = 2.0;

fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            r#"
            CREATE TABLE users (
                uid TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                email TEXT NOT NULL,
                height_cm REAL,
                weight_kg REAL,
                weekly_goal_km REAL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE runs (
                id TEXT PRIMARY KEY,
                uid TEXT NOT NULL,
                start_time INTEGER NOT NULL,
                end_time INTEGER,
                distance REAL NOT NULL,
                duration INTEGER NOT NULL,
                average_pace TEXT NOT NULL,
                is_active INTEGER NOT NULL,
                polyline TEXT NOT NULL,
                path BLOB NOT NULL,
                areas BLOB NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX idx_runs_uid_start ON runs(uid, start_time);

            CREATE TABLE territory_cells (
                lat_idx INTEGER NOT NULL,
                lon_idx INTEGER NOT NULL,
                owner_uid TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (lat_idx, lon_idx)
            );

            CREATE TABLE friend_requests (
                from_uid TEXT NOT NULL,
                to_uid TEXT NOT NULL,
                status TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (from_uid, to_uid)
            );

            CREATE TABLE friends (
                uid TEXT NOT NULL,
                friend_uid TEXT NOT NULL,
                PRIMARY KEY (uid, friend_uid)
            );
            "#,
        ),
        // Owner lookups for per-user territory and leaderboards
        M::up("CREATE INDEX idx_territory_owner ON territory_cells(owner_uid);"),
    ])
}

// ============================================================================
// Polyline helpers
// ============================================================================

/// Encode a path as a Google polyline.
pub fn encode_path(points: &[LocationModel]) -> String {
    if points.is_empty() {
        return String::new();
    }
    let line: LineString<f64> = points.iter().map(|p| (p.longitude, p.latitude)).collect();
    polyline::encode_coordinates(line, POLYLINE_PRECISION).unwrap_or_default()
}

/// Decode a Google polyline into positions (no altitude or timestamps).
pub fn decode_path(encoded: &str) -> Vec<LocationModel> {
    if encoded.is_empty() {
        return Vec::new();
    }
    polyline::decode_polyline(encoded, POLYLINE_PRECISION)
        .map(|line| {
            line.coords()
                .map(|c| LocationModel::new(c.y, c.x))
                .collect()
        })
        .unwrap_or_default()
}

// ============================================================================
// Store
// ============================================================================

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database and bring the schema up to date.
    pub fn open(db_path: &str) -> AppResult<Self> {
        let mut conn = Connection::open(db_path)?;
        migrations().to_latest(&mut conn)?;
        info!("[SqliteStore] Opened {}", db_path);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> AppResult<Self> {
        let mut conn = Connection::open_in_memory()?;
        migrations().to_latest(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn run_count(&self) -> AppResult<u32> {
        let count: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))?;
        Ok(count as u32)
    }

    /// Encoded polyline stored alongside a run.
    pub fn run_polyline(&self, run_id: &str) -> AppResult<Option<String>> {
        let polyline = self
            .conn()
            .query_row(
                "SELECT polyline FROM runs WHERE id = ?",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(polyline)
    }
}

fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

struct RunRow {
    id: String,
    start_time: i64,
    end_time: Option<i64>,
    distance: f64,
    duration: i64,
    average_pace: String,
    is_active: bool,
    path: Vec<u8>,
    areas: Vec<u8>,
}

impl RunRow {
    const COLUMNS: &'static str =
        "id, start_time, end_time, distance, duration, average_pace, is_active, path, areas";

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            distance: row.get(3)?,
            duration: row.get(4)?,
            average_pace: row.get(5)?,
            is_active: row.get(6)?,
            path: row.get(7)?,
            areas: row.get(8)?,
        })
    }

    fn into_session(self) -> AppResult<RunSession> {
        let path: Vec<LocationModel> = rmp_serde::from_slice(&self.path)?;
        let captured_areas: Vec<AreaModel> = rmp_serde::from_slice(&self.areas)?;
        Ok(RunSession {
            id: self.id,
            start_time: self.start_time,
            end_time: self.end_time,
            path,
            distance: self.distance,
            duration: self.duration,
            average_pace: self.average_pace,
            captured_areas,
            is_active: self.is_active,
        })
    }
}

fn cell_from_row(row: &Row<'_>) -> rusqlite::Result<TerritoryCell> {
    Ok(TerritoryCell {
        owner_uid: row.get(0)?,
        lat_idx: row.get(1)?,
        lon_idx: row.get(2)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<FriendRequest> {
    let status: String = row.get(2)?;
    let status = FriendRequestStatus::parse(&status).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown friend request status '{}'", status).into(),
        )
    })?;
    Ok(FriendRequest {
        from_uid: row.get(0)?,
        to_uid: row.get(1)?,
        status,
        created_at: row.get(3)?,
    })
}

impl RemoteStore for SqliteStore {
    fn save_user(&self, profile: &UserProfile) -> AppResult<()> {
        self.conn().execute(
            "INSERT INTO users (uid, display_name, email, height_cm, weight_kg, weekly_goal_km, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(uid) DO UPDATE SET
                display_name = excluded.display_name,
                email = excluded.email,
                height_cm = excluded.height_cm,
                weight_kg = excluded.weight_kg,
                weekly_goal_km = excluded.weekly_goal_km",
            params![
                profile.uid,
                profile.display_name,
                profile.email,
                profile.height_cm,
                profile.weight_kg,
                profile.weekly_goal_km,
                now_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn get_user(&self, uid: &str) -> AppResult<Option<UserProfile>> {
        let user = self
            .conn()
            .query_row(
                "SELECT uid, display_name, email, height_cm, weight_kg, weekly_goal_km
                 FROM users WHERE uid = ?",
                params![uid],
                |row| {
                    Ok(UserProfile {
                        uid: row.get(0)?,
                        display_name: row.get(1)?,
                        email: row.get(2)?,
                        height_cm: row.get(3)?,
                        weight_kg: row.get(4)?,
                        weekly_goal_km: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn save_run(&self, uid: &str, run: &RunSession) -> AppResult<()> {
        let path = rmp_serde::to_vec(&run.path)?;
        let areas = rmp_serde::to_vec(&run.captured_areas)?;
        let polyline = encode_path(&simplify_path(&run.path, POLYLINE_TOLERANCE_M));

        self.conn().execute(
            "INSERT OR REPLACE INTO runs
                (id, uid, start_time, end_time, distance, duration, average_pace,
                 is_active, polyline, path, areas, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                run.id,
                uid,
                run.start_time,
                run.end_time,
                run.distance,
                run.duration,
                run.average_pace,
                run.is_active,
                polyline,
                path,
                areas,
                now_rfc3339(),
            ],
        )?;
        debug!(
            "[SqliteStore] Saved run {} ({} points, {:.0} m)",
            run.id,
            run.path.len(),
            run.distance
        );
        Ok(())
    }

    fn get_run(&self, run_id: &str) -> AppResult<Option<RunSession>> {
        let sql = format!("SELECT {} FROM runs WHERE id = ?", RunRow::COLUMNS);
        let row = self
            .conn()
            .query_row(&sql, params![run_id], RunRow::from_row)
            .optional()?;
        row.map(RunRow::into_session).transpose()
    }

    fn list_runs(&self, uid: &str) -> AppResult<Vec<RunSession>> {
        let sql = format!(
            "SELECT {} FROM runs WHERE uid = ? ORDER BY start_time DESC",
            RunRow::COLUMNS
        );
        let rows: Vec<RunRow> = {
            let conn = self.conn();
            let mut stmt = conn.prepare(&sql)?;
            stmt.query_map(params![uid], RunRow::from_row)?
                .collect::<rusqlite::Result<_>>()?
        };
        rows.into_iter().map(RunRow::into_session).collect()
    }

    fn delete_run(&self, run_id: &str) -> AppResult<bool> {
        let deleted = self
            .conn()
            .execute("DELETE FROM runs WHERE id = ?", params![run_id])?;
        Ok(deleted > 0)
    }

    fn upsert_cells(&self, cells: &[TerritoryCell]) -> AppResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let updated_at = now_rfc3339();
        {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO territory_cells (lat_idx, lon_idx, owner_uid, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(lat_idx, lon_idx) DO UPDATE SET
                    owner_uid = excluded.owner_uid,
                    updated_at = excluded.updated_at",
            )?;
            for cell in cells {
                stmt.execute(params![
                    cell.lat_idx,
                    cell.lon_idx,
                    cell.owner_uid,
                    updated_at,
                ])?;
            }
        }
        tx.commit()?;
        debug!("[SqliteStore] Upserted {} territory cells", cells.len());
        Ok(cells.len())
    }

    fn all_cells(&self) -> AppResult<Vec<TerritoryCell>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT owner_uid, lat_idx, lon_idx FROM territory_cells ORDER BY lat_idx, lon_idx",
        )?;
        let cells = stmt
            .query_map([], cell_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    fn cells_for_owner(&self, uid: &str) -> AppResult<Vec<TerritoryCell>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT owner_uid, lat_idx, lon_idx FROM territory_cells
             WHERE owner_uid = ? ORDER BY lat_idx, lon_idx",
        )?;
        let cells = stmt
            .query_map(params![uid], cell_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(cells)
    }

    fn save_friend_request(&self, request: &FriendRequest) -> AppResult<()> {
        self.conn().execute(
            "INSERT INTO friend_requests (from_uid, to_uid, status, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(from_uid, to_uid) DO UPDATE SET status = excluded.status",
            params![
                request.from_uid,
                request.to_uid,
                request.status.as_str(),
                request.created_at,
            ],
        )?;
        Ok(())
    }

    fn get_friend_request(
        &self,
        from_uid: &str,
        to_uid: &str,
    ) -> AppResult<Option<FriendRequest>> {
        let request = self
            .conn()
            .query_row(
                "SELECT from_uid, to_uid, status, created_at FROM friend_requests
                 WHERE from_uid = ?1 AND to_uid = ?2",
                params![from_uid, to_uid],
                request_from_row,
            )
            .optional()?;
        Ok(request)
    }

    fn incoming_requests(&self, uid: &str) -> AppResult<Vec<FriendRequest>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT from_uid, to_uid, status, created_at FROM friend_requests
             WHERE to_uid = ?1 AND status = 'pending' ORDER BY created_at",
        )?;
        let requests = stmt
            .query_map(params![uid], request_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(requests)
    }

    fn add_friendship(&self, a: &str, b: &str) -> AppResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT OR IGNORE INTO friends (uid, friend_uid) VALUES (?1, ?2)",
            params![a, b],
        )?;
        tx.execute(
            "INSERT OR IGNORE INTO friends (uid, friend_uid) VALUES (?1, ?2)",
            params![b, a],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn remove_friendship(&self, a: &str, b: &str) -> AppResult<()> {
        self.conn().execute(
            "DELETE FROM friends
             WHERE (uid = ?1 AND friend_uid = ?2) OR (uid = ?2 AND friend_uid = ?1)",
            params![a, b],
        )?;
        Ok(())
    }

    fn friends_of(&self, uid: &str) -> AppResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT friend_uid FROM friends WHERE uid = ? ORDER BY friend_uid")?;
        let friends = stmt
            .query_map(params![uid], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(friends)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use turfcore::CellIndex;

    fn finished_run(id: &str, start: i64) -> RunSession {
        let mut run = RunSession::start(id, start);
        let config = turfcore::SessionConfig::default();
        for i in 0..4 {
            let p = LocationModel::new(51.5 + i as f64 * 0.0005, -0.12).at(start + i * 20_000);
            run.record_location(p, p.timestamp, &config);
        }
        run.add_area(AreaModel {
            polygon: vec![
                LocationModel::new(51.5, -0.12),
                LocationModel::new(51.501, -0.12),
                LocationModel::new(51.5005, -0.1185),
            ],
            area: 5_000.0,
        });
        run.finish(start + 60_000);
        run
    }

    #[test]
    fn test_run_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let run = finished_run("run-1", 1_000);
        store.save_run("alice", &run).unwrap();

        let loaded = store.get_run("run-1").unwrap().unwrap();
        assert_eq!(loaded, run);
        assert!(store.get_run("missing").unwrap().is_none());

        // Collinear samples collapse to the endpoints
        let polyline = store.run_polyline("run-1").unwrap().unwrap();
        assert_eq!(decode_path(&polyline).len(), 2);
    }

    #[test]
    fn test_list_runs_newest_first() {
        let store = SqliteStore::in_memory().unwrap();
        store.save_run("alice", &finished_run("a", 1_000)).unwrap();
        store.save_run("alice", &finished_run("b", 5_000)).unwrap();
        store.save_run("bob", &finished_run("c", 3_000)).unwrap();

        let ids: Vec<_> = store
            .list_runs("alice")
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(store.run_count().unwrap(), 3);

        assert!(store.delete_run("a").unwrap());
        assert!(!store.delete_run("a").unwrap());
    }

    #[test]
    fn test_cells_last_write_wins() {
        let store = SqliteStore::in_memory().unwrap();
        let idx = CellIndex {
            lat_idx: 10,
            lon_idx: -4,
        };
        store
            .upsert_cells(&[TerritoryCell::new("alice", idx)])
            .unwrap();
        store
            .upsert_cells(&[TerritoryCell::new("bob", idx)])
            .unwrap();

        let cells = store.all_cells().unwrap();
        assert_eq!(cells.len(), 1);
        assert_eq!(cells[0].owner_uid, "bob");
        assert!(store.cells_for_owner("alice").unwrap().is_empty());
    }

    #[test]
    fn test_users_and_friends() {
        let store = SqliteStore::in_memory().unwrap();
        let profile = UserProfile {
            uid: "alice".to_string(),
            display_name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            height_cm: Some(170.0),
            weight_kg: None,
            weekly_goal_km: None,
        };
        store.save_user(&profile).unwrap();
        assert_eq!(store.get_user("alice").unwrap(), Some(profile));

        store.add_friendship("alice", "bob").unwrap();
        store.add_friendship("bob", "alice").unwrap();
        assert_eq!(store.friends_of("alice").unwrap(), vec!["bob"]);
        assert_eq!(store.friends_of("bob").unwrap(), vec!["alice"]);

        store.remove_friendship("bob", "alice").unwrap();
        assert!(store.friends_of("alice").unwrap().is_empty());
    }

    #[test]
    fn test_friend_request_status_update() {
        let store = SqliteStore::in_memory().unwrap();
        let mut request = FriendRequest {
            from_uid: "alice".to_string(),
            to_uid: "bob".to_string(),
            status: FriendRequestStatus::Pending,
            created_at: 42,
        };
        store.save_friend_request(&request).unwrap();
        assert_eq!(store.incoming_requests("bob").unwrap().len(), 1);

        request.status = FriendRequestStatus::Declined;
        store.save_friend_request(&request).unwrap();
        assert!(store.incoming_requests("bob").unwrap().is_empty());
        let stored = store.get_friend_request("alice", "bob").unwrap().unwrap();
        assert_eq!(stored.status, FriendRequestStatus::Declined);
        assert_eq!(stored.created_at, 42);
    }

    #[test]
    fn test_polyline_helpers() {
        assert_eq!(encode_path(&[]), "");
        assert!(decode_path("").is_empty());
        let path = vec![
            LocationModel::new(38.5, -120.2),
            LocationModel::new(40.7, -120.95),
            LocationModel::new(43.252, -126.453),
        ];
        assert_eq!(encode_path(&path), "_p~iF~ps|U_ulLnnqC_mqNvxq`@");
        let decoded = decode_path("_p~iF~ps|U_ulLnnqC_mqNvxq`@");
        assert!((decoded[2].latitude - 43.252).abs() < 1e-5);
        assert!((decoded[2].longitude + 126.453).abs() < 1e-5);
    }
}
