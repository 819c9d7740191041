//! SQL schema for the ISS SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS staff (
    staff_id     TEXT PRIMARY KEY,
    display_name TEXT NOT NULL,
    role         TEXT NOT NULL,   -- 'staff' | 'supervisor' | 'admin' | 'auditor'
    created_at   TEXT NOT NULL
);

-- Children are never deleted; discharge is a status.
CREATE TABLE IF NOT EXISTS children (
    child_id         TEXT PRIMARY KEY,
    first_name       TEXT NOT NULL,
    last_name        TEXT NOT NULL,
    date_of_birth    TEXT NOT NULL,   -- YYYY-MM-DD
    overall_status   TEXT NOT NULL DEFAULT 'active',
    caseload_status  TEXT NOT NULL DEFAULT 'awaiting_assignment',
    on_hold          INTEGER NOT NULL DEFAULT 0,
    start_date       TEXT NOT NULL,
    end_date         TEXT,
    discharge_reason TEXT,
    created_at       TEXT NOT NULL,
    updated_at       TEXT NOT NULL,
    CHECK (overall_status IN ('active', 'discharged')),
    CHECK (caseload_status IN ('caseload', 'non_caseload', 'awaiting_assignment'))
);

-- An assignment is open while unassigned_at IS NULL.
CREATE TABLE IF NOT EXISTS assignments (
    assignment_id TEXT PRIMARY KEY,
    child_id      TEXT NOT NULL REFERENCES children(child_id),
    staff_id      TEXT NOT NULL REFERENCES staff(staff_id),
    is_primary    INTEGER NOT NULL DEFAULT 0,
    assigned_at   TEXT NOT NULL,
    unassigned_at TEXT,
    assigned_by   TEXT
);

-- At most one open primary per child, one open assignment per staff member.
CREATE UNIQUE INDEX IF NOT EXISTS assignments_open_primary_idx
    ON assignments(child_id) WHERE is_primary = 1 AND unassigned_at IS NULL;
CREATE UNIQUE INDEX IF NOT EXISTS assignments_open_staff_idx
    ON assignments(child_id, staff_id) WHERE unassigned_at IS NULL;
CREATE INDEX IF NOT EXISTS assignments_staff_idx
    ON assignments(staff_id, unassigned_at);

-- Append-only.
CREATE TABLE IF NOT EXISTS audit_log (
    audit_id    TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id   TEXT NOT NULL,
    action      TEXT NOT NULL,
    field_name  TEXT,
    old_value   TEXT,
    new_value   TEXT,
    metadata    TEXT NOT NULL DEFAULT '{}',
    actor       TEXT,
    recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS children_caseload_idx ON children(caseload_status);
CREATE INDEX IF NOT EXISTS children_name_idx     ON children(last_name, first_name);
CREATE INDEX IF NOT EXISTS audit_entity_idx      ON audit_log(entity_id, recorded_at);

PRAGMA user_version = 1;
";
