//! Schema definitions
//!
//! Each numbered migration is a pair of SQL scripts. Forward scripts use
//! `IF NOT EXISTS` so re-running the ladder is a no-op; every forward script
//! has a matching backward script that restores the previous version,
//! rewriting tables by copy where SQLite cannot drop a column in place.

// =============================================================================
// v1: initial schema
// =============================================================================

pub const V1_UP: &str = r#"
-- Model catalog, bulk upserted by sync. Unit prices are dollars per token.
CREATE TABLE IF NOT EXISTS models (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    context_length INTEGER NOT NULL DEFAULT 0 CHECK(context_length >= 0),
    prompt_price REAL CHECK(prompt_price IS NULL OR prompt_price >= 0),
    completion_price REAL CHECK(completion_price IS NULL OR completion_price >= 0),
    supports_reasoning INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS profiles (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    system_prompt TEXT,
    temperature REAL NOT NULL DEFAULT 0.7,
    max_tokens INTEGER NOT NULL DEFAULT 2048 CHECK(max_tokens > 0),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    session_type TEXT NOT NULL DEFAULT 'chat'
        CHECK(session_type IN ('chat', 'code', 'documents', 'playground')),
    title TEXT,
    profile_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sessions_type ON sessions(session_type);
CREATE INDEX IF NOT EXISTS idx_sessions_profile ON sessions(profile_id);

CREATE TABLE IF NOT EXISTS messages (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    role TEXT NOT NULL CHECK(role IN ('system', 'user', 'assistant', 'tool')),
    content TEXT NOT NULL,
    created_at INTEGER NOT NULL
);

-- Total order of a session's messages is (created_at, id)
CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at, id);

CREATE TABLE IF NOT EXISTS usage_logs (
    id TEXT PRIMARY KEY,
    session_id TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
    profile_id INTEGER REFERENCES profiles(id) ON DELETE SET NULL,
    model_id TEXT NOT NULL,
    prompt_tokens INTEGER NOT NULL DEFAULT 0 CHECK(prompt_tokens >= 0),
    completion_tokens INTEGER NOT NULL DEFAULT 0 CHECK(completion_tokens >= 0),
    total_tokens INTEGER NOT NULL DEFAULT 0
        CHECK(total_tokens = prompt_tokens + completion_tokens),
    cost_usd REAL NOT NULL DEFAULT 0 CHECK(cost_usd >= 0),
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_usage_session ON usage_logs(session_id);
CREATE INDEX IF NOT EXISTS idx_usage_model ON usage_logs(model_id);
CREATE INDEX IF NOT EXISTS idx_usage_created ON usage_logs(created_at);
"#;

pub const V1_DOWN: &str = r#"
DROP INDEX IF EXISTS idx_usage_created;
DROP INDEX IF EXISTS idx_usage_model;
DROP INDEX IF EXISTS idx_usage_session;
DROP TABLE IF EXISTS usage_logs;
DROP INDEX IF EXISTS idx_messages_session;
DROP TABLE IF EXISTS messages;
DROP INDEX IF EXISTS idx_sessions_profile;
DROP INDEX IF EXISTS idx_sessions_type;
DROP TABLE IF EXISTS sessions;
DROP TABLE IF EXISTS profiles;
DROP TABLE IF EXISTS models;
"#;

// =============================================================================
// v2: full-text shadow over message content
// =============================================================================

pub const V2_UP: &str = r#"
-- External-content FTS index over messages. Metadata columns ride along
-- unindexed so search can filter without joining back for every candidate.
CREATE VIRTUAL TABLE IF NOT EXISTS messages_fts USING fts5(
    content,
    role UNINDEXED,
    session_id UNINDEXED,
    created_at UNINDEXED,
    content='messages',
    content_rowid='rowid'
);

CREATE TRIGGER IF NOT EXISTS messages_fts_ai AFTER INSERT ON messages BEGIN
    INSERT INTO messages_fts(rowid, content, role, session_id, created_at)
    VALUES (new.rowid, new.content, new.role, new.session_id, new.created_at);
END;

CREATE TRIGGER IF NOT EXISTS messages_fts_ad AFTER DELETE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content, role, session_id, created_at)
    VALUES ('delete', old.rowid, old.content, old.role, old.session_id, old.created_at);
END;

CREATE TRIGGER IF NOT EXISTS messages_fts_au AFTER UPDATE ON messages BEGIN
    INSERT INTO messages_fts(messages_fts, rowid, content, role, session_id, created_at)
    VALUES ('delete', old.rowid, old.content, old.role, old.session_id, old.created_at);
    INSERT INTO messages_fts(rowid, content, role, session_id, created_at)
    VALUES (new.rowid, new.content, new.role, new.session_id, new.created_at);
END;

-- One-shot backfill of rows inserted before the shadow existed
INSERT INTO messages_fts(messages_fts) VALUES ('rebuild');
"#;

pub const V2_DOWN: &str = r#"
DROP TRIGGER IF EXISTS messages_fts_au;
DROP TRIGGER IF EXISTS messages_fts_ad;
DROP TRIGGER IF EXISTS messages_fts_ai;
DROP TABLE IF EXISTS messages_fts;
"#;

// =============================================================================
// v3: profile preset labels
// =============================================================================

pub const V3_UP: &str = r#"
ALTER TABLE profiles ADD COLUMN preset TEXT;
"#;

// SQLite of this vintage cannot drop a column, so the backward script
// rewrites the table preserving the remaining columns and data.
pub const V3_DOWN: &str = r#"
CREATE TABLE profiles_v2 (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    system_prompt TEXT,
    temperature REAL NOT NULL DEFAULT 0.7,
    max_tokens INTEGER NOT NULL DEFAULT 2048 CHECK(max_tokens > 0),
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
INSERT INTO profiles_v2 (id, name, system_prompt, temperature, max_tokens, created_at, updated_at)
    SELECT id, name, system_prompt, temperature, max_tokens, created_at, updated_at FROM profiles;
DROP TABLE profiles;
ALTER TABLE profiles_v2 RENAME TO profiles;
"#;
