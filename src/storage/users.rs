// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User profiles, stored in an embedded redb database.
//!
//! ## Table Layout
//!
//! - `users`: openid → serialized [`User`] (JSON bytes)
//! - `user_phone_index`: phone → openid, keeps phone numbers unique

use std::path::Path;

use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

const USER_PHONE_INDEX: TableDefinition<&str, &str> = TableDefinition::new("user_phone_index");

pub const NICKNAME_MAX_CHARS: usize = 50;
pub const NAME_MAX_CHARS: usize = 100;
pub const PHONE_MAX_CHARS: usize = 11;

#[derive(Debug, thiserror::Error)]
pub enum UserStoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("user not found: {0}")]
    NotFound(String),

    #[error("phone number is already bound to another user")]
    PhoneTaken,

    #[error("{field} must be at most {max} characters")]
    FieldTooLong { field: &'static str, max: usize },
}

pub type UserStoreResult<T> = Result<T, UserStoreError>;

/// A mini-program user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub openid: String,
    pub nickname: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    /// Media path relative to the configured media URL.
    #[serde(default)]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    fn new(openid: &str, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            openid: openid.to_string(),
            nickname: default_nickname(openid),
            name: None,
            phone: None,
            address: None,
            avatar: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// `User` followed by the last six characters of the openid.
fn default_nickname(openid: &str) -> String {
    let chars: Vec<char> = openid.chars().collect();
    let tail: String = chars[chars.len().saturating_sub(6)..].iter().collect();
    format!("User{tail}")
}

/// Partial profile update.
///
/// `None` leaves a field untouched, `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub nickname: Option<Option<String>>,
    pub name: Option<Option<String>>,
    pub phone: Option<Option<String>>,
    pub address: Option<Option<String>>,
    pub avatar: Option<Option<String>>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn validate(&self) -> UserStoreResult<()> {
        check_length("nickname", &self.nickname, NICKNAME_MAX_CHARS)?;
        check_length("name", &self.name, NAME_MAX_CHARS)?;
        check_length("phone", &self.phone, PHONE_MAX_CHARS)?;
        Ok(())
    }
}

fn check_length(
    field: &'static str,
    value: &Option<Option<String>>,
    max: usize,
) -> UserStoreResult<()> {
    match value {
        Some(Some(v)) if v.chars().count() > max => {
            Err(UserStoreError::FieldTooLong { field, max })
        }
        _ => Ok(()),
    }
}

/// Blank strings clear the field.
fn normalize(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

pub struct UserRepository {
    db: Database,
}

impl UserRepository {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> UserStoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(USER_PHONE_INDEX)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    pub fn get(&self, openid: &str) -> UserStoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        match table.get(openid)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Look up a user, creating one on first login.
    ///
    /// Returns the user and whether it was just created.
    pub fn get_or_create(&self, openid: &str) -> UserStoreResult<(User, bool)> {
        let write_txn = self.db.begin_write()?;
        let result = {
            let mut table = write_txn.open_table(USERS)?;
            let existing = table
                .get(openid)?
                .map(|value| serde_json::from_slice::<User>(value.value()))
                .transpose()?;

            match existing {
                Some(user) => (user, false),
                None => {
                    let user = User::new(openid, Utc::now());
                    let json = serde_json::to_vec(&user)?;
                    table.insert(openid, json.as_slice())?;
                    (user, true)
                }
            }
        };
        write_txn.commit()?;
        Ok(result)
    }

    /// Apply `patch` to the user's profile and refresh `updated_at`.
    pub fn update_profile(&self, openid: &str, patch: ProfilePatch) -> UserStoreResult<User> {
        patch.validate()?;

        let write_txn = self.db.begin_write()?;
        let user = {
            let mut users = write_txn.open_table(USERS)?;
            let mut phones = write_txn.open_table(USER_PHONE_INDEX)?;

            let mut user: User = match users.get(openid)? {
                Some(value) => serde_json::from_slice(value.value())?,
                None => return Err(UserStoreError::NotFound(openid.to_string())),
            };

            if let Some(phone) = patch.phone {
                let phone = normalize(phone);
                if phone != user.phone {
                    if let Some(new_phone) = &phone {
                        let owner = phones.get(new_phone.as_str())?.map(|v| v.value().to_string());
                        if owner.is_some_and(|owner| owner != openid) {
                            return Err(UserStoreError::PhoneTaken);
                        }
                        phones.insert(new_phone.as_str(), openid)?;
                    }
                    if let Some(old_phone) = &user.phone {
                        phones.remove(old_phone.as_str())?;
                    }
                    user.phone = phone;
                }
            }
            if let Some(nickname) = patch.nickname {
                user.nickname = nickname.unwrap_or_default();
            }
            if let Some(name) = patch.name {
                user.name = normalize(name);
            }
            if let Some(address) = patch.address {
                user.address = normalize(address);
            }
            if let Some(avatar) = patch.avatar {
                user.avatar = normalize(avatar);
            }
            user.updated_at = Utc::now();

            let json = serde_json::to_vec(&user)?;
            users.insert(openid, json.as_slice())?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    pub fn count(&self) -> UserStoreResult<u64> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        Ok(table.len()?)
    }
}
