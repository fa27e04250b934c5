use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::error::Result;
use crate::model::{
    Invitation, MatchRecord, PlayerSide, RivalLink, RivalStatus, UserProfile, UserStatus,
};

const DATA_DIR: &str = "fifados";
const DB_FILE: &str = "fifados.sqlite";

pub fn default_db_path() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME")
        && !base.trim().is_empty()
    {
        return Some(PathBuf::from(base).join(DATA_DIR).join(DB_FILE));
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(DATA_DIR).join(DB_FILE))
}

pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).ok();
    }
    let conn = Connection::open(path)?;
    init_schema(&conn)?;
    debug!(path = %path.display(), "opened database");
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS users (
            user_id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            username TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NULL
        );
        DROP INDEX IF EXISTS idx_users_email;
        CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email_unique ON users(email);

        CREATE TABLE IF NOT EXISTS usernames (
            username_lower TEXT PRIMARY KEY,
            user_id TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS rivals (
            rival_id INTEGER PRIMARY KEY AUTOINCREMENT,
            participant_a TEXT NOT NULL,
            participant_b TEXT NOT NULL,
            status TEXT NOT NULL,
            requested_by TEXT NOT NULL,
            created_at TEXT NOT NULL,
            username TEXT NOT NULL,
            email TEXT NOT NULL,
            UNIQUE(participant_a, participant_b)
        );
        CREATE INDEX IF NOT EXISTS idx_rivals_a ON rivals(participant_a);
        CREATE INDEX IF NOT EXISTS idx_rivals_b ON rivals(participant_b);

        CREATE TABLE IF NOT EXISTS matches (
            match_id INTEGER PRIMARY KEY AUTOINCREMENT,
            date TEXT NOT NULL,
            participant_a TEXT NOT NULL,
            participant_b TEXT NOT NULL,
            p1_user_id TEXT NOT NULL,
            p1_team TEXT NOT NULL,
            p1_goals INTEGER NOT NULL,
            p2_user_id TEXT NOT NULL,
            p2_team TEXT NOT NULL,
            p2_goals INTEGER NOT NULL,
            winner TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_matches_a ON matches(participant_a);
        CREATE INDEX IF NOT EXISTS idx_matches_b ON matches(participant_b);
        CREATE INDEX IF NOT EXISTS idx_matches_date ON matches(date);

        CREATE TABLE IF NOT EXISTS invitations (
            invitation_id INTEGER PRIMARY KEY AUTOINCREMENT,
            email TEXT NOT NULL,
            invited_by TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

impl FromSql for UserStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        UserStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown user status {raw:?}").into()))
    }
}

impl ToSql for UserStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for RivalStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        RivalStatus::parse(raw)
            .ok_or_else(|| FromSqlError::Other(format!("unknown rival status {raw:?}").into()))
    }
}

impl ToSql for RivalStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

// ---------------------------------------------------------------------------
// users

const USER_COLUMNS: &str = "user_id, email, username, status, created_at, updated_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        status: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub fn insert_user(conn: &Connection, user: &UserProfile) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, email, username, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            user.user_id,
            user.email,
            user.username,
            user.status,
            user.created_at,
            user.updated_at,
        ],
    )?;
    Ok(())
}

pub fn load_user(conn: &Connection, user_id: &str) -> Result<Option<UserProfile>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
    let user = conn
        .query_row(&sql, params![user_id], user_from_row)
        .optional()?;
    Ok(user)
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> Result<Option<UserProfile>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let user = conn
        .query_row(&sql, params![email], user_from_row)
        .optional()?;
    Ok(user)
}

pub fn update_profile(
    conn: &Connection,
    user_id: &str,
    username: &str,
    status: UserStatus,
    updated_at: &str,
) -> Result<()> {
    conn.execute(
        "UPDATE users SET username = ?2, status = ?3, updated_at = ?4 WHERE user_id = ?1",
        params![user_id, username, status, updated_at],
    )?;
    Ok(())
}

pub fn username_reserved(conn: &Connection, username: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT user_id FROM usernames WHERE username_lower = ?1",
            params![username.to_lowercase()],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn reserve_username(conn: &Connection, username: &str, user_id: &str) -> Result<()> {
    conn.execute(
        "INSERT INTO usernames (username_lower, user_id) VALUES (?1, ?2)",
        params![username.to_lowercase(), user_id],
    )?;
    Ok(())
}

/// Display names for `ids`. Unknown ids are absent from the map.
pub fn username_directory(conn: &Connection, ids: &[&str]) -> Result<HashMap<String, String>> {
    let mut stmt = conn.prepare_cached("SELECT username FROM users WHERE user_id = ?1")?;
    let mut out = HashMap::new();
    for id in ids {
        if out.contains_key(*id) {
            continue;
        }
        let name: Option<String> = stmt
            .query_row(params![id], |row| row.get(0))
            .optional()?;
        if let Some(name) = name {
            out.insert(id.to_string(), name);
        }
    }
    Ok(out)
}

/// Rewrites every reference to `old_id`. Pairs are re-sorted so membership
/// and uniqueness checks keep working.
pub fn rename_user(conn: &Connection, old_id: &str, new_id: &str) -> Result<()> {
    conn.execute(
        "UPDATE users SET user_id = ?2 WHERE user_id = ?1",
        params![old_id, new_id],
    )?;
    conn.execute(
        "UPDATE usernames SET user_id = ?2 WHERE user_id = ?1",
        params![old_id, new_id],
    )?;
    for table in ["rivals", "matches"] {
        let sql = format!(
            r#"
            UPDATE {table} SET
                participant_a = min(
                    CASE WHEN participant_a = ?1 THEN ?2 ELSE participant_a END,
                    CASE WHEN participant_b = ?1 THEN ?2 ELSE participant_b END),
                participant_b = max(
                    CASE WHEN participant_a = ?1 THEN ?2 ELSE participant_a END,
                    CASE WHEN participant_b = ?1 THEN ?2 ELSE participant_b END)
            WHERE participant_a = ?1 OR participant_b = ?1
            "#
        );
        conn.execute(&sql, params![old_id, new_id])?;
    }
    conn.execute(
        "UPDATE rivals SET requested_by = ?2 WHERE requested_by = ?1",
        params![old_id, new_id],
    )?;
    conn.execute(
        r#"
        UPDATE matches SET
            p1_user_id = CASE WHEN p1_user_id = ?1 THEN ?2 ELSE p1_user_id END,
            p2_user_id = CASE WHEN p2_user_id = ?1 THEN ?2 ELSE p2_user_id END,
            winner = CASE WHEN winner = ?1 THEN ?2 ELSE winner END
        WHERE p1_user_id = ?1 OR p2_user_id = ?1
        "#,
        params![old_id, new_id],
    )?;
    conn.execute(
        "UPDATE invitations SET invited_by = ?2 WHERE invited_by = ?1",
        params![old_id, new_id],
    )?;
    Ok(())
}

// ---------------------------------------------------------------------------
// rivals

const RIVAL_COLUMNS: &str =
    "rival_id, participant_a, participant_b, status, requested_by, created_at, username, email";

fn rival_from_row(row: &Row<'_>) -> rusqlite::Result<RivalLink> {
    Ok(RivalLink {
        id: row.get(0)?,
        participants: [row.get(1)?, row.get(2)?],
        status: row.get(3)?,
        requested_by: row.get(4)?,
        created_at: row.get(5)?,
        username: row.get(6)?,
        email: row.get(7)?,
    })
}

/// Inserts `link` and returns its row id. `link.id` is ignored.
pub fn insert_rival(conn: &Connection, link: &RivalLink) -> Result<i64> {
    let [a, b] = &link.participants;
    conn.execute(
        "INSERT INTO rivals (participant_a, participant_b, status, requested_by, created_at, username, email)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            a,
            b,
            link.status,
            link.requested_by,
            link.created_at,
            link.username,
            link.email,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn load_rival(conn: &Connection, rival_id: i64) -> Result<Option<RivalLink>> {
    let sql = format!("SELECT {RIVAL_COLUMNS} FROM rivals WHERE rival_id = ?1");
    let link = conn
        .query_row(&sql, params![rival_id], rival_from_row)
        .optional()?;
    Ok(link)
}

pub fn find_rival_by_pair(conn: &Connection, pair: &[String; 2]) -> Result<Option<RivalLink>> {
    let sql = format!(
        "SELECT {RIVAL_COLUMNS} FROM rivals WHERE participant_a = ?1 AND participant_b = ?2"
    );
    let link = conn
        .query_row(&sql, params![pair[0], pair[1]], rival_from_row)
        .optional()?;
    Ok(link)
}

pub fn rivals_for(conn: &Connection, user_id: &str) -> Result<Vec<RivalLink>> {
    let sql = format!(
        "SELECT {RIVAL_COLUMNS} FROM rivals
         WHERE participant_a = ?1 OR participant_b = ?1
         ORDER BY created_at ASC, rival_id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id], rival_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    debug!(user_id, count = out.len(), "loaded rivals");
    Ok(out)
}

pub fn set_rival_status(conn: &Connection, rival_id: i64, status: RivalStatus) -> Result<()> {
    conn.execute(
        "UPDATE rivals SET status = ?2 WHERE rival_id = ?1",
        params![rival_id, status],
    )?;
    Ok(())
}

/// Accepts every pending link that involves `user_id`.
pub fn accept_pending_rivals_of(conn: &Connection, user_id: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE rivals SET status = ?2
         WHERE (participant_a = ?1 OR participant_b = ?1) AND status = ?3",
        params![user_id, RivalStatus::Accepted, RivalStatus::Pending],
    )?;
    Ok(changed)
}

// ---------------------------------------------------------------------------
// matches

const MATCH_COLUMNS: &str = "match_id, date, participant_a, participant_b, \
     p1_user_id, p1_team, p1_goals, p2_user_id, p2_team, p2_goals, winner";

fn match_from_row(row: &Row<'_>) -> rusqlite::Result<MatchRecord> {
    Ok(MatchRecord {
        id: row.get::<_, i64>(0)?.to_string(),
        date: row.get(1)?,
        participants: [row.get(2)?, row.get(3)?],
        player1: PlayerSide {
            user_id: row.get(4)?,
            username: None,
            team: row.get(5)?,
            goals: row.get(6)?,
        },
        player2: PlayerSide {
            user_id: row.get(7)?,
            username: None,
            team: row.get(8)?,
            goals: row.get(9)?,
        },
        winner: row.get(10)?,
    })
}

/// Inserts `m` and returns its row id. `m.id` is ignored.
pub fn insert_match(conn: &Connection, m: &MatchRecord) -> Result<i64> {
    let [a, b] = &m.participants;
    conn.execute(
        r#"
        INSERT INTO matches (
            date, participant_a, participant_b,
            p1_user_id, p1_team, p1_goals,
            p2_user_id, p2_team, p2_goals,
            winner
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
        "#,
        params![
            m.date,
            a,
            b,
            m.player1.user_id,
            m.player1.team,
            m.player1.goals,
            m.player2.user_id,
            m.player2.team,
            m.player2.goals,
            m.winner,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Matches `user_id` took part in, oldest first.
pub fn load_matches_for(conn: &Connection, user_id: &str) -> Result<Vec<MatchRecord>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE participant_a = ?1 OR participant_b = ?1
         ORDER BY date ASC, match_id ASC"
    );
    query_matches(conn, &sql, params![user_id])
}

/// The `limit` most recent matches `user_id` took part in, newest first.
pub fn load_recent_matches_for(
    conn: &Connection,
    user_id: &str,
    limit: usize,
) -> Result<Vec<MatchRecord>> {
    let sql = format!(
        "SELECT {MATCH_COLUMNS} FROM matches
         WHERE participant_a = ?1 OR participant_b = ?1
         ORDER BY date DESC, match_id DESC
         LIMIT ?2"
    );
    query_matches(conn, &sql, params![user_id, limit as i64])
}

fn query_matches(
    conn: &Connection,
    sql: &str,
    args: &[&dyn ToSql],
) -> Result<Vec<MatchRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, match_from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// invitations

pub fn insert_invitation(conn: &Connection, invitation: &Invitation) -> Result<i64> {
    conn.execute(
        "INSERT INTO invitations (email, invited_by, status, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            invitation.email,
            invitation.invited_by,
            invitation.status,
            invitation.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn invitations_for_email(conn: &Connection, email: &str) -> Result<Vec<Invitation>> {
    let mut stmt = conn.prepare(
        "SELECT invitation_id, email, invited_by, status, created_at
         FROM invitations WHERE email = ?1 ORDER BY invitation_id ASC",
    )?;
    let rows = stmt.query_map(params![email], |row| {
        Ok(Invitation {
            id: row.get(0)?,
            email: row.get(1)?,
            invited_by: row.get(2)?,
            status: row.get(3)?,
            created_at: row.get(4)?,
        })
    })?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

pub fn set_invitations_status(conn: &Connection, email: &str, status: &str) -> Result<usize> {
    let changed = conn.execute(
        "UPDATE invitations SET status = ?2 WHERE email = ?1",
        params![email, status],
    )?;
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::sorted_pair;

    fn user(id: &str, email: &str, status: UserStatus) -> UserProfile {
        UserProfile {
            user_id: id.to_string(),
            email: email.to_string(),
            username: id.to_uppercase(),
            status,
            created_at: "2024-01-01T00:00:00Z".to_string(),
            updated_at: None,
        }
    }

    #[test]
    fn schema_is_idempotent() {
        let conn = open_in_memory().expect("in-memory db");
        init_schema(&conn).expect("second init");
    }

    #[test]
    fn user_status_round_trips_through_sqlite() {
        let conn = open_in_memory().expect("in-memory db");
        insert_user(&conn, &user("p", "p@x.io", UserStatus::Pending)).expect("insert");
        let loaded = load_user(&conn, "p").expect("query").expect("present");
        assert_eq!(loaded.status, UserStatus::Pending);
        assert!(load_user(&conn, "missing").expect("query").is_none());
    }

    #[test]
    fn one_profile_per_email() {
        let conn = open_in_memory().expect("in-memory db");
        insert_user(&conn, &user("a", "same@x.io", UserStatus::Active)).expect("insert");
        assert!(insert_user(&conn, &user("b", "same@x.io", UserStatus::Pending)).is_err());
        let found = find_user_by_email(&conn, "same@x.io").expect("query").expect("present");
        assert_eq!(found.user_id, "a");
    }

    #[test]
    fn username_reservation_ignores_case() {
        let conn = open_in_memory().expect("in-memory db");
        reserve_username(&conn, "Messi", "u1").expect("reserve");
        assert!(username_reserved(&conn, "MESSI").expect("query"));
        assert!(!username_reserved(&conn, "Pele").expect("query"));
    }

    #[test]
    fn rename_user_resorts_pairs() {
        let conn = open_in_memory().expect("in-memory db");
        insert_rival(
            &conn,
            &RivalLink {
                id: 0,
                participants: sorted_pair("m", "pending_1"),
                status: RivalStatus::Pending,
                requested_by: "m".to_string(),
                created_at: "2024-01-01T00:00:00Z".to_string(),
                username: "ana".to_string(),
                email: "ana@x.io".to_string(),
            },
        )
        .expect("insert rival");

        rename_user(&conn, "pending_1", "a").expect("rename");

        let link = find_rival_by_pair(&conn, &sorted_pair("a", "m"))
            .expect("query")
            .expect("renamed link present");
        assert_eq!(link.participants, ["a".to_string(), "m".to_string()]);
    }
}
