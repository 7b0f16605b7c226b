use campuscart_shared::constants::UNKNOWN_USERNAME;
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Profile;
use crate::rows;

impl Database {
    /// Create the profile for `id`, or rename it if it already exists.
    /// `created_at` is kept from the first insert.
    pub fn upsert_profile(&self, id: Uuid, username: &str) -> Result<Profile> {
        let username = username.trim();
        if username.is_empty() {
            return Err(StoreError::Validation("username is required".into()));
        }

        self.conn().execute(
            "INSERT INTO profiles (id, username, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(id) DO UPDATE SET username = excluded.username",
            params![id.to_string(), username, rows::ts_to_sql(&rows::now())],
        )?;

        self.get_profile(id)
    }

    pub fn get_profile(&self, id: Uuid) -> Result<Profile> {
        self.conn()
            .query_row(
                "SELECT id, username, created_at FROM profiles WHERE id = ?1",
                params![id.to_string()],
                row_to_profile,
            )
            .optional()?
            .ok_or(StoreError::NotFound("profile"))
    }

    /// Display name for `id`, falling back to a placeholder when the user
    /// never created a profile.
    pub fn username_or_unknown(&self, id: Uuid) -> Result<String> {
        match self.get_profile(id) {
            Ok(profile) => Ok(profile.username),
            Err(StoreError::NotFound(_)) => Ok(UNKNOWN_USERNAME.to_string()),
            Err(e) => Err(e),
        }
    }
}

fn row_to_profile(row: &rusqlite::Row<'_>) -> rusqlite::Result<Profile> {
    Ok(Profile {
        id: rows::uuid_at(row, 0)?,
        username: row.get(1)?,
        created_at: rows::timestamp_at(row, 2)?,
    })
}
