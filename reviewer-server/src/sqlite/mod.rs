//! SQLite implementation of `ReviewRepository`.
//!
//! This provides persistent storage that survives service restarts.
//! Teams, users, pull requests and reviewer slots are stored in explicit
//! relational columns.
//!
//! # Schema Versioning
//!
//! The database has a `schema_version` table that tracks the schema version.
//! When the schema needs to change, increment `CURRENT_SCHEMA_VERSION` and add
//! a migration in `run_migrations()`. Migrations run sequentially from the
//! current version to the target version.


use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use reviewer_core::{
    ChangeSet, PrStatus, PullRequest, PullRequestId, RepositoryError, ReviewRepository, Team,
    TeamName, User, UserId,
};

/// Current schema version. Increment this when making schema changes and add
/// corresponding migration logic in `run_migrations()`.
pub(crate) const CURRENT_SCHEMA_VERSION: i64 = 1;

/// SQLite-backed review repository.
///
/// Uses `tokio::task::spawn_blocking` to run synchronous rusqlite operations
/// without blocking the async runtime. Every write method runs inside one
/// SQLite transaction.
pub struct SqliteRepository {
    pub(crate) conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    /// Create a new SQLite repository at the given path.
    ///
    /// Creates the database file and schema if they don't exist, and runs any
    /// pending migrations.
    ///
    /// # Durability
    ///
    /// - `journal_mode = WAL` for better concurrency and crash safety
    /// - `synchronous = FULL` so committed reviewer changes survive power loss
    /// - `busy_timeout = 5000ms` to handle concurrent access gracefully
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, RepositoryError> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy();
        let is_in_memory = path_str == ":memory:";

        if !is_in_memory && !path_str.is_empty() {
            if let Some(parent) = path_ref.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        RepositoryError::storage(
                            "create database directory",
                            format!("{}: {}", parent.display(), e),
                        )
                    })?;
                }
            }
        }

        let conn = Connection::open(path_ref)
            .map_err(|e| RepositoryError::storage("open database", e.to_string()))?;

        // SQLite can silently keep DELETE mode on filesystems without shared
        // memory support; in-memory databases report "memory".
        let journal_mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .map_err(|e| RepositoryError::storage("set journal_mode", e.to_string()))?;

        let journal_mode_ok = journal_mode.eq_ignore_ascii_case("wal")
            || (is_in_memory && journal_mode.eq_ignore_ascii_case("memory"));
        if !journal_mode_ok {
            return Err(RepositoryError::storage(
                "configure journal_mode",
                format!(
                    "Failed to enable WAL mode: SQLite returned '{}' instead of 'wal'",
                    journal_mode
                ),
            ));
        }

        conn.execute_batch(
            r#"
            PRAGMA synchronous = FULL;
            PRAGMA busy_timeout = 5000;
            "#,
        )
        .map_err(|e| RepositoryError::storage("configure pragmas", e.to_string()))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                version INTEGER NOT NULL
            );
            "#,
        )
        .map_err(|e| RepositoryError::storage("create schema_version table", e.to_string()))?;

        let current_version: i64 = conn
            .query_row(
                "SELECT version FROM schema_version WHERE id = 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| RepositoryError::storage("get schema version", e.to_string()))?
            .unwrap_or(0);

        Self::run_migrations(&conn, current_version)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create a new in-memory SQLite repository.
    pub fn new_in_memory() -> Result<Self, RepositoryError> {
        Self::new(":memory:")
    }

    /// Run migrations from `from_version` to `CURRENT_SCHEMA_VERSION`.
    fn run_migrations(conn: &Connection, from_version: i64) -> Result<(), RepositoryError> {
        if from_version > CURRENT_SCHEMA_VERSION {
            return Err(RepositoryError::storage(
                "schema version",
                format!(
                    "Database schema version {} is newer than supported version {}. \
                     Please upgrade the application.",
                    from_version, CURRENT_SCHEMA_VERSION
                ),
            ));
        }

        if from_version == CURRENT_SCHEMA_VERSION {
            return Ok(());
        }

        if from_version < 1 {
            conn.execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS teams (
                    team_name TEXT PRIMARY KEY
                );

                CREATE TABLE IF NOT EXISTS users (
                    user_id TEXT PRIMARY KEY,
                    username TEXT NOT NULL,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    team_name TEXT REFERENCES teams(team_name)
                );

                CREATE TABLE IF NOT EXISTS pull_requests (
                    pull_request_id TEXT PRIMARY KEY,
                    pull_request_name TEXT NOT NULL,
                    author_id TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'OPEN',
                    created_at TEXT NOT NULL,
                    merged_at TEXT
                );

                CREATE TABLE IF NOT EXISTS pr_reviewers (
                    pull_request_id TEXT NOT NULL REFERENCES pull_requests(pull_request_id),
                    slot INTEGER NOT NULL,
                    user_id TEXT NOT NULL,
                    PRIMARY KEY (pull_request_id, slot),
                    UNIQUE (pull_request_id, user_id)
                );

                CREATE INDEX IF NOT EXISTS idx_users_team ON users(team_name);
                CREATE INDEX IF NOT EXISTS idx_pr_reviewers_user ON pr_reviewers(user_id);
                CREATE INDEX IF NOT EXISTS idx_pull_requests_open
                    ON pull_requests(status) WHERE status = 'OPEN';
                "#,
            )
            .map_err(|e| RepositoryError::storage("migration v1", e.to_string()))?;
        }

        conn.execute(
            "INSERT OR REPLACE INTO schema_version (id, version) VALUES (1, ?1)",
            params![CURRENT_SCHEMA_VERSION],
        )
        .map_err(|e| RepositoryError::storage("update schema version", e.to_string()))?;

        Ok(())
    }

    /// Run `f` against the connection on the blocking thread pool.
    async fn with_conn<T, F>(&self, operation: &'static str, f: F) -> Result<T, RepositoryError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, RepositoryError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = conn
                .lock()
                .map_err(|_| RepositoryError::storage(operation, "connection mutex poisoned"))?;
            f(&mut conn)
        })
        .await
        .map_err(|e| RepositoryError::storage(operation, e.to_string()))?
    }
}

fn storage(operation: &'static str) -> impl Fn(rusqlite::Error) -> RepositoryError {
    move |e| RepositoryError::storage(operation, e.to_string())
}

fn parse_timestamp(raw: &str, what: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|_| RepositoryError::corruption(what))
}

fn load_user(conn: &Connection, id: &str) -> Result<Option<User>, RepositoryError> {
    conn.query_row(
        "SELECT user_id, username, is_active, team_name FROM users WHERE user_id = ?1",
        params![id],
        |row| {
            Ok(User {
                id: UserId(row.get(0)?),
                username: row.get(1)?,
                active: row.get(2)?,
                team: row.get::<_, Option<String>>(3)?.map(TeamName),
            })
        },
    )
    .optional()
    .map_err(storage("find_user"))
}

fn load_team(conn: &Connection, name: &str) -> Result<Option<Team>, RepositoryError> {
    let exists = conn
        .query_row(
            "SELECT 1 FROM teams WHERE team_name = ?1",
            params![name],
            |_| Ok(()),
        )
        .optional()
        .map_err(storage("find_team"))?
        .is_some();
    if !exists {
        return Ok(None);
    }

    let mut stmt = conn
        .prepare(
            "SELECT user_id, username, is_active, team_name FROM users
             WHERE team_name = ?1 ORDER BY user_id",
        )
        .map_err(storage("find_team"))?;
    let members = stmt
        .query_map(params![name], |row| {
            Ok(User {
                id: UserId(row.get(0)?),
                username: row.get(1)?,
                active: row.get(2)?,
                team: row.get::<_, Option<String>>(3)?.map(TeamName),
            })
        })
        .map_err(storage("find_team"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage("find_team"))?;

    Ok(Some(Team {
        name: TeamName(name.to_string()),
        members,
    }))
}

fn load_pull_request(conn: &Connection, id: &str) -> Result<Option<PullRequest>, RepositoryError> {
    let row: Option<(String, String, String, String, String, Option<String>)> = conn
        .query_row(
            "SELECT pull_request_id, pull_request_name, author_id, status, created_at, merged_at
             FROM pull_requests WHERE pull_request_id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                ))
            },
        )
        .optional()
        .map_err(storage("find_pull_request"))?;

    let Some((pr_id, name, author, status, created_at, merged_at)) = row else {
        return Ok(None);
    };

    let status = PrStatus::parse(&status)
        .ok_or_else(|| RepositoryError::corruption(format!("status of pull request {}", pr_id)))?;
    let created_at = parse_timestamp(&created_at, "pull request created_at")?;
    let merged_at = merged_at
        .as_deref()
        .map(|raw| parse_timestamp(raw, "pull request merged_at"))
        .transpose()?;

    let mut stmt = conn
        .prepare("SELECT user_id FROM pr_reviewers WHERE pull_request_id = ?1 ORDER BY slot")
        .map_err(storage("find_pull_request"))?;
    let reviewers = stmt
        .query_map(params![pr_id], |row| Ok(UserId(row.get(0)?)))
        .map_err(storage("find_pull_request"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage("find_pull_request"))?;

    Ok(Some(PullRequest {
        id: PullRequestId(pr_id),
        name,
        author: UserId(author),
        status,
        reviewers,
        created_at,
        merged_at,
    }))
}

/// Load every pull request whose id is returned by `sql` (bound to `arg`).
fn load_pull_requests_where(
    conn: &Connection,
    operation: &'static str,
    sql: &str,
    arg: &str,
) -> Result<Vec<PullRequest>, RepositoryError> {
    let mut stmt = conn.prepare(sql).map_err(storage(operation))?;
    let ids = stmt
        .query_map(params![arg], |row| row.get::<_, String>(0))
        .map_err(storage(operation))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage(operation))?;

    let mut prs = Vec::with_capacity(ids.len());
    for id in ids {
        match load_pull_request(conn, &id)? {
            Some(pr) => prs.push(pr),
            None => warn!("Pull request {} vanished during {}", id, operation),
        }
    }
    Ok(prs)
}

fn upsert_user(conn: &Connection, user: &User) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO users (user_id, username, is_active, team_name)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(user_id) DO UPDATE SET
             username = excluded.username,
             is_active = excluded.is_active,
             team_name = excluded.team_name",
        params![
            user.id.0,
            user.username,
            user.active,
            user.team.as_ref().map(|t| t.0.as_str())
        ],
    )
    .map_err(storage("save_user"))?;
    Ok(())
}

fn upsert_pull_request(conn: &Connection, pr: &PullRequest) -> Result<(), RepositoryError> {
    conn.execute(
        "INSERT INTO pull_requests
             (pull_request_id, pull_request_name, author_id, status, created_at, merged_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(pull_request_id) DO UPDATE SET
             pull_request_name = excluded.pull_request_name,
             author_id = excluded.author_id,
             status = excluded.status,
             created_at = excluded.created_at,
             merged_at = excluded.merged_at",
        params![
            pr.id.0,
            pr.name,
            pr.author.0,
            pr.status.as_str(),
            pr.created_at.to_rfc3339(),
            pr.merged_at.map(|t| t.to_rfc3339())
        ],
    )
    .map_err(storage("save_pull_request"))?;

    conn.execute(
        "DELETE FROM pr_reviewers WHERE pull_request_id = ?1",
        params![pr.id.0],
    )
    .map_err(storage("save_pull_request"))?;

    for (slot, reviewer) in pr.reviewers.iter().enumerate() {
        conn.execute(
            "INSERT INTO pr_reviewers (pull_request_id, slot, user_id) VALUES (?1, ?2, ?3)",
            params![pr.id.0, slot as i64, reviewer.0],
        )
        .map_err(storage("save_pull_request"))?;
    }
    Ok(())
}

#[async_trait]
impl ReviewRepository for SqliteRepository {
    async fn find_team(&self, name: &TeamName) -> Result<Option<Team>, RepositoryError> {
        let name = name.0.clone();
        self.with_conn("find_team", move |conn| load_team(conn, &name))
            .await
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("find_user", move |conn| load_user(conn, &id))
            .await
    }

    async fn find_pull_request(
        &self,
        id: &PullRequestId,
    ) -> Result<Option<PullRequest>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("find_pull_request", move |conn| {
            load_pull_request(conn, &id)
        })
        .await
    }

    async fn list_open_pull_requests(
        &self,
        team: &TeamName,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let team = team.0.clone();
        self.with_conn("list_open_pull_requests", move |conn| {
            load_pull_requests_where(
                conn,
                "list_open_pull_requests",
                "SELECT p.pull_request_id FROM pull_requests p
                 WHERE p.status = 'OPEN'
                   AND (p.author_id IN (SELECT user_id FROM users WHERE team_name = ?1)
                        OR EXISTS (
                            SELECT 1 FROM pr_reviewers r
                            JOIN users u ON u.user_id = r.user_id
                            WHERE r.pull_request_id = p.pull_request_id
                              AND u.team_name = ?1))
                 ORDER BY p.pull_request_id",
                &team,
            )
        })
        .await
    }

    async fn list_reviews_for_user(
        &self,
        id: &UserId,
    ) -> Result<Vec<PullRequest>, RepositoryError> {
        let id = id.0.clone();
        self.with_conn("list_reviews_for_user", move |conn| {
            load_pull_requests_where(
                conn,
                "list_reviews_for_user",
                "SELECT DISTINCT pull_request_id FROM pr_reviewers
                 WHERE user_id = ?1 ORDER BY pull_request_id",
                &id,
            )
        })
        .await
    }

    async fn save_user(&self, user: User) -> Result<(), RepositoryError> {
        self.with_conn("save_user", move |conn| upsert_user(conn, &user))
            .await
    }

    async fn save_pull_request(&self, pr: PullRequest) -> Result<(), RepositoryError> {
        self.with_conn("save_pull_request", move |conn| {
            let tx = conn.transaction().map_err(storage("save_pull_request"))?;
            upsert_pull_request(&tx, &pr)?;
            tx.commit().map_err(storage("save_pull_request"))
        })
        .await
    }

    async fn commit_batch(&self, changes: ChangeSet) -> Result<(), RepositoryError> {
        self.with_conn("commit_batch", move |conn| {
            let tx = conn.transaction().map_err(storage("commit_batch"))?;
            if let Some(team) = &changes.team {
                tx.execute(
                    "INSERT OR IGNORE INTO teams (team_name) VALUES (?1)",
                    params![team.0],
                )
                .map_err(storage("commit_batch"))?;
            }
            for user in &changes.users {
                upsert_user(&tx, user)?;
            }
            for pr in &changes.pull_requests {
                upsert_pull_request(&tx, pr)?;
            }
            tx.commit().map_err(storage("commit_batch"))
        })
        .await
    }
}
