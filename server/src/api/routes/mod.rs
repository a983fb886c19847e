//! Route handlers, one module per resource

pub mod backups;
pub mod documents;
pub mod health;
pub mod messages;
pub mod models;
pub mod profiles;
pub mod sessions;
pub mod stream;
pub mod usage;
