//! SQL schema for the SQLite record store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS microtheories (
    iri         TEXT PRIMARY KEY,
    project_id  TEXT NOT NULL,
    label       TEXT NOT NULL,
    parent_iri  TEXT,               -- clone source, if any
    is_default  INTEGER NOT NULL DEFAULT 0,
    created_by  TEXT,
    created_at  TEXT NOT NULL
);

-- At most one default microtheory per project.
CREATE UNIQUE INDEX IF NOT EXISTS microtheories_default_idx
    ON microtheories(project_id) WHERE is_default = 1;
CREATE INDEX IF NOT EXISTS microtheories_project_idx
    ON microtheories(project_id, created_at);

CREATE TABLE IF NOT EXISTS competency_questions (
    cq_id       TEXT PRIMARY KEY,
    project_id  TEXT NOT NULL,
    name        TEXT NOT NULL,
    problem     TEXT NOT NULL,
    template    TEXT NOT NULL,
    parameters  TEXT NOT NULL DEFAULT '[]',  -- JSON array of names
    contract    TEXT NOT NULL,               -- JSON Contract
    default_mt  TEXT REFERENCES microtheories(iri) ON DELETE SET NULL,
    status      TEXT NOT NULL DEFAULT 'draft',
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE (project_id, name)
);

-- Runs are append-only. No UPDATE is ever issued against this table.
-- microtheory is not a foreign key; run history outlives the graph.
CREATE TABLE IF NOT EXISTS cq_runs (
    run_id       TEXT PRIMARY KEY,
    cq_id        TEXT NOT NULL REFERENCES competency_questions(cq_id) ON DELETE CASCADE,
    project_id   TEXT NOT NULL,
    microtheory  TEXT NOT NULL,
    params       TEXT NOT NULL,   -- JSON object
    pass         INTEGER NOT NULL,
    reason       TEXT NOT NULL,
    columns      TEXT NOT NULL,   -- JSON array
    row_count    INTEGER NOT NULL,
    preview      TEXT NOT NULL,   -- JSON array of rows
    latency_ms   INTEGER NOT NULL,
    executed_by  TEXT,
    executed_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS cq_runs_cq_idx ON cq_runs(cq_id, executed_at);

CREATE TABLE IF NOT EXISTS dependency_edges (
    edge_id            TEXT PRIMARY KEY,
    microtheory        TEXT NOT NULL REFERENCES microtheories(iri) ON DELETE CASCADE,
    ontology_graph     TEXT NOT NULL,
    element_iri        TEXT NOT NULL,
    kind               TEXT NOT NULL,
    valid              INTEGER NOT NULL DEFAULT 1,
    first_seen_at      TEXT NOT NULL,
    last_validated_at  TEXT,
    UNIQUE (microtheory, element_iri)
);

CREATE INDEX IF NOT EXISTS dependency_edges_element_idx
    ON dependency_edges(ontology_graph, element_iri);

PRAGMA user_version = 1;
";
