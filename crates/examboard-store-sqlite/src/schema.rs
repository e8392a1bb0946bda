//! SQL schema for the examboard SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Admins, leaders and members share one key space.
CREATE TABLE IF NOT EXISTS identities (
    identity_key TEXT PRIMARY KEY,
    kind         TEXT NOT NULL CHECK (kind IN ('admin', 'leader', 'member')),
    username     TEXT UNIQUE,
    first_name   TEXT NOT NULL DEFAULT '',
    last_name    TEXT NOT NULL DEFAULT '',
    email        TEXT UNIQUE,
    phone        TEXT,
    address      TEXT,
    gender       TEXT,
    school       TEXT,
    stream       TEXT,                 -- 'MATHS' | 'BIO'
    leader_key   TEXT REFERENCES identities(identity_key) ON DELETE RESTRICT,
    role         TEXT,                 -- explicit role tag, if any
    secret_hash  TEXT,                 -- argon2 PHC string
    created_at   TEXT NOT NULL,
    CHECK (kind != 'member' OR leader_key IS NOT NULL)
);

CREATE TABLE IF NOT EXISTS subjects (
    id     INTEGER PRIMARY KEY AUTOINCREMENT,
    name   TEXT NOT NULL UNIQUE,
    stream TEXT                        -- NULL = common to all streams
);

CREATE TABLE IF NOT EXISTS identity_subjects (
    identity_key TEXT    NOT NULL REFERENCES identities(identity_key) ON DELETE CASCADE,
    subject_id   INTEGER NOT NULL REFERENCES subjects(id) ON DELETE CASCADE,
    PRIMARY KEY (identity_key, subject_id)
);

CREATE TABLE IF NOT EXISTS exams (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT    NOT NULL,
    date       TEXT    NOT NULL,       -- YYYY-MM-DD
    start_time TEXT    NOT NULL,       -- HH:MM:SS
    end_time   TEXT    NOT NULL,
    day        TEXT    NOT NULL,
    subject_id INTEGER NOT NULL REFERENCES subjects(id) ON DELETE RESTRICT,
    admin_key  TEXT    NOT NULL REFERENCES identities(identity_key) ON DELETE RESTRICT
);

CREATE TABLE IF NOT EXISTS exam_leaders (
    exam_id    INTEGER NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
    leader_key TEXT    NOT NULL REFERENCES identities(identity_key) ON DELETE CASCADE,
    PRIMARY KEY (exam_id, leader_key)
);

CREATE TABLE IF NOT EXISTS exam_members (
    exam_id    INTEGER NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
    member_key TEXT    NOT NULL REFERENCES identities(identity_key) ON DELETE CASCADE,
    PRIMARY KEY (exam_id, member_key)
);

-- Held by exactly one of a member or a leader.
CREATE TABLE IF NOT EXISTS results (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    score      REAL    NOT NULL,
    status     TEXT    NOT NULL,       -- 'PASS' | 'FAIL' | 'ABSENT'
    exam_id    INTEGER NOT NULL REFERENCES exams(id) ON DELETE CASCADE,
    member_key TEXT    REFERENCES identities(identity_key) ON DELETE CASCADE,
    leader_key TEXT    REFERENCES identities(identity_key) ON DELETE CASCADE,
    created_at TEXT    NOT NULL,
    CHECK ((member_key IS NULL) != (leader_key IS NULL))
);

CREATE TABLE IF NOT EXISTS events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT,
    start_time  TEXT NOT NULL,
    exam_id     INTEGER REFERENCES exams(id) ON DELETE SET NULL
);

CREATE TABLE IF NOT EXISTS announcements (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT NOT NULL,
    description TEXT,
    exam_id     INTEGER REFERENCES exams(id) ON DELETE SET NULL,
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS identities_kind_idx     ON identities(kind);
CREATE INDEX IF NOT EXISTS identities_leader_idx   ON identities(leader_key);
CREATE INDEX IF NOT EXISTS exam_leaders_key_idx    ON exam_leaders(leader_key);
CREATE INDEX IF NOT EXISTS exam_members_key_idx    ON exam_members(member_key);
CREATE INDEX IF NOT EXISTS results_exam_idx        ON results(exam_id);
CREATE INDEX IF NOT EXISTS results_created_idx     ON results(created_at);
CREATE INDEX IF NOT EXISTS announcements_exam_idx  ON announcements(exam_id);

PRAGMA user_version = 1;
";
