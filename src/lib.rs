//! Jotter - personal note and file storage backend
//!
//! Owner-scoped folders and files with a storage quota, a PIN-gated private
//! space and an activity log, served over a JSON API.

pub mod activity;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod file;
pub mod logging;
pub mod quota;
pub mod web;

pub use activity::{Activity, ActivityAction, ActivityLog, ResourceType};
pub use config::Config;
pub use db::{Database, NewUser, User, UserRepository, UserSettings};
pub use error::{JotterError, Result};
pub use file::{BlobStore, FileService, FileStorage, FolderTree};
pub use quota::{QuotaLedger, StorageBreakdown, StorageSummary};
