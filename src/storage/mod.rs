// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistent state owned by this service. Vectors live in the external
//! vector database; only user profiles are stored locally.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   users.redb        # User profiles and the phone index
//! {EXPORT_DIR}/
//!   vectors_export_YYYYMMDD_HHMMSS.csv
//! ```

pub mod users;

pub use users::{ProfilePatch, User, UserRepository, UserStoreError, UserStoreResult};
