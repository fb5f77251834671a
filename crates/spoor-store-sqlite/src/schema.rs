//! SQL schema for the Spoor SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS observers (
    observer_id   TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    email         TEXT NOT NULL COLLATE NOCASE UNIQUE,
    password_hash TEXT NOT NULL,    -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- last_* columns are NULL until the first sighting and only ever change
-- together with `version`.
CREATE TABLE IF NOT EXISTS subjects (
    subject_id     TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    date_of_birth  TEXT NOT NULL,   -- YYYY-MM-DD
    created_at     TEXT NOT NULL,
    last_seen_at   TEXT,
    last_latitude  REAL,
    last_longitude REAL,
    version        INTEGER NOT NULL DEFAULT 0
);

-- Sightings are strictly append-only.
CREATE TABLE IF NOT EXISTS sightings (
    sighting_id TEXT PRIMARY KEY,
    subject_id  TEXT NOT NULL REFERENCES subjects(subject_id),
    observer_id TEXT NOT NULL REFERENCES observers(observer_id),
    seen_at     TEXT NOT NULL,
    latitude    REAL NOT NULL CHECK (latitude  BETWEEN -90  AND 90),
    longitude   REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
    image_url   TEXT,
    recorded_at TEXT NOT NULL       -- server-assigned
);

CREATE INDEX IF NOT EXISTS sightings_subject_seen_idx ON sightings(subject_id, seen_at);
CREATE INDEX IF NOT EXISTS subjects_last_seen_idx     ON subjects(last_seen_at);

PRAGMA user_version = 1;
";
