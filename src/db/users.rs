//! Identity: user accounts and bearer-token sessions.

use super::Database;
use crate::auth::{hash_password, mint_token, valid_email, verify_password};
use crate::error::ApiError;
use crate::types::{Session, User};
use anyhow::Result;
use rusqlite::{Connection, Row, params};
use uuid::Uuid;

pub(crate) fn parse_user_row(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get("id")?,
        email: row.get("email")?,
        name: row.get("name")?,
        created_at: row.get("created_at")?,
    })
}

/// Internal helper to get a user using an existing connection.
pub(crate) fn get_user_internal(conn: &Connection, user_id: &str) -> Result<Option<User>> {
    let mut stmt =
        conn.prepare("SELECT id, email, name, created_at FROM users WHERE id = ?1")?;

    let result = stmt.query_row(params![user_id], parse_user_row);

    match result {
        Ok(user) => Ok(Some(user)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn insert_session(conn: &Connection, user_id: &str, now: i64, ttl_ms: i64) -> Result<Session> {
    let session = Session {
        token: mint_token(),
        user_id: user_id.to_string(),
        created_at: now,
        expires_at: now + ttl_ms,
    };

    conn.execute(
        "INSERT INTO sessions (token, user_id, created_at, expires_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            session.token,
            session.user_id,
            session.created_at,
            session.expires_at
        ],
    )?;

    Ok(session)
}

impl Database {
    /// Register a new user and provision their personal workspace.
    pub fn signup(
        &self,
        email: &str,
        password: &str,
        name: &str,
        session_ttl_ms: i64,
    ) -> Result<(User, Session)> {
        let email = email.trim().to_lowercase();
        let name = name.trim().to_string();

        if name.is_empty() {
            return Err(ApiError::missing_field("name").into());
        }
        if !valid_email(&email) {
            return Err(ApiError::invalid_value("email", "invalid email address").into());
        }
        if password.len() < 6 {
            return Err(ApiError::invalid_value(
                "password",
                "password must be at least 6 characters",
            )
            .into());
        }

        let now = self.now_ms();
        let password_hash = hash_password(password);

        self.with_conn_mut(|conn| {
            let tx =
                conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;

            let taken: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM users WHERE email = ?1)",
                params![email],
                |row| row.get(0),
            )?;
            if taken {
                return Err(ApiError::already_exists("user").into());
            }

            let user_id = Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO users (id, email, name, password_hash, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![user_id, email, name, password_hash, now],
            )?;

            // Every account gets a personal workspace with an owner membership.
            let workspace_id = Uuid::now_v7().to_string();
            tx.execute(
                "INSERT INTO workspaces (id, name, owner_id, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![workspace_id, format!("{}'s Workspace", name), user_id, now],
            )?;
            tx.execute(
                "INSERT INTO workspace_members (workspace_id, user_id, role)
                 VALUES (?1, ?2, 'owner')",
                params![workspace_id, user_id],
            )?;

            let session = insert_session(&tx, &user_id, now, session_ttl_ms)?;

            tx.commit()?;

            Ok((
                User {
                    id: user_id,
                    email,
                    name,
                    created_at: now,
                },
                session,
            ))
        })
    }

    /// Exchange credentials for a fresh session.
    ///
    /// Unknown email and wrong password produce the same error so the
    /// response does not leak which accounts exist.
    pub fn login(
        &self,
        email: &str,
        password: &str,
        session_ttl_ms: i64,
    ) -> Result<(User, Session)> {
        let email = email.trim().to_lowercase();
        let now = self.now_ms();

        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT id, email, name, password_hash, created_at
                 FROM users WHERE email = ?1",
                params![email],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            name: row.get(2)?,
                            created_at: row.get(4)?,
                        },
                        row.get::<_, String>(3)?,
                    ))
                },
            );

            let (user, stored_hash) = match result {
                Ok(pair) => pair,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(ApiError::unauthenticated("invalid credentials").into());
                }
                Err(e) => return Err(e.into()),
            };

            if !verify_password(password, &stored_hash) {
                return Err(ApiError::unauthenticated("invalid credentials").into());
            }

            let session = insert_session(conn, &user.id, now, session_ttl_ms)?;

            Ok((user, session))
        })
    }

    /// Drop a session. Succeeds even if the token was already gone.
    pub fn logout(&self, token: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
            Ok(())
        })
    }

    /// Resolve a bearer token to its user. Expired sessions are pruned on
    /// sight and rejected like missing ones.
    pub fn authenticate(&self, token: &str) -> Result<User> {
        let now = self.now_ms();

        self.with_conn(|conn| {
            let result = conn.query_row(
                "SELECT u.id, u.email, u.name, u.created_at, s.expires_at
                 FROM sessions s
                 JOIN users u ON u.id = s.user_id
                 WHERE s.token = ?1",
                params![token],
                |row| {
                    Ok((
                        User {
                            id: row.get(0)?,
                            email: row.get(1)?,
                            name: row.get(2)?,
                            created_at: row.get(3)?,
                        },
                        row.get::<_, i64>(4)?,
                    ))
                },
            );

            let (user, expires_at) = match result {
                Ok(pair) => pair,
                Err(rusqlite::Error::QueryReturnedNoRows) => {
                    return Err(ApiError::unauthenticated("invalid or expired session").into());
                }
                Err(e) => return Err(e.into()),
            };

            if expires_at <= now {
                conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
                return Err(ApiError::unauthenticated("invalid or expired session").into());
            }

            Ok(user)
        })
    }
}
