// 🔑 Actor resolution - bearer credential -> portal user
//
// Tokens are provisioned out of band (admin CLI). Only the SHA-256 digest of a
// token is stored; resolution hashes the presented credential and looks the
// digest up.

use anyhow::{Context, Result};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

use crate::db::SharedConnection;
use crate::entities::Actor;
use crate::store::StoreError;

pub trait ActorResolver: Send + Sync {
    /// `Ok(None)` means the credential is unknown; callers must reject the
    /// request before touching the workflow.
    fn resolve(&self, credential: &str) -> Result<Option<Actor>, StoreError>;
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

/// Hex SHA-256 of a token, as stored in `portal_users.token_hash`
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

// ============================================================================
// SQLITE RESOLVER
// ============================================================================

#[derive(Clone)]
pub struct SqliteActorResolver {
    conn: SharedConnection,
}

impl SqliteActorResolver {
    pub fn new(conn: SharedConnection) -> Self {
        Self { conn }
    }
}

impl ActorResolver for SqliteActorResolver {
    fn resolve(&self, credential: &str) -> Result<Option<Actor>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;

        let actor = conn
            .query_row(
                "SELECT id, name, email FROM portal_users WHERE token_hash = ?1",
                [hash_token(credential)],
                |row| Ok(Actor::new(row.get(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?)),
            )
            .optional()?;

        Ok(actor)
    }
}

/// Create a portal user whose bearer token is `token`
pub fn register_portal_user(
    conn: &SharedConnection,
    name: &str,
    email: &str,
    token: &str,
) -> Result<Actor> {
    let conn = conn
        .lock()
        .map_err(|_| anyhow::anyhow!("database connection lock poisoned"))?;

    conn.execute(
        "INSERT INTO portal_users (name, email, token_hash) VALUES (?1, ?2, ?3)",
        params![name, email, hash_token(token)],
    )
    .with_context(|| format!("Failed to register portal user {}", email))?;

    Ok(Actor::new(conn.last_insert_rowid(), name, email))
}

// ============================================================================
// STATIC RESOLVER
// ============================================================================

/// Fixed token table, for tests and local demos
#[derive(Default, Clone)]
pub struct StaticActorResolver {
    actors: HashMap<String, Actor>,
}

impl StaticActorResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_actor(mut self, token: &str, actor: Actor) -> Self {
        self.actors.insert(token.to_string(), actor);
        self
    }
}

impl ActorResolver for StaticActorResolver {
    fn resolve(&self, credential: &str) -> Result<Option<Actor>, StoreError> {
        Ok(self.actors.get(credential).cloned())
    }
}
