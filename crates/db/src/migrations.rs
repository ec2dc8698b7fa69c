/// Inline SQL migrations for the dupe-manager job store.
///
/// Append only. Entry N is schema version N, applied once and recorded in
/// `_migrations`.

pub const MIGRATIONS: &[&str] = &[
    // 1: one row per scan job
    r#"
CREATE TABLE IF NOT EXISTS scan_jobs (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    root_path TEXT NOT NULL,
    extensions TEXT,
    status TEXT NOT NULL CHECK (status IN ('running', 'completed', 'failed')),
    total_files INTEGER NOT NULL DEFAULT 0,
    scanned_files INTEGER NOT NULL DEFAULT 0,
    message TEXT
);
"#,
    // 2
    r#"CREATE INDEX IF NOT EXISTS idx_scan_jobs_created ON scan_jobs(created_at DESC);"#,
    // 3: result groups, one row per member
    r#"
CREATE TABLE IF NOT EXISTS result_groups (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES scan_jobs(id),
    found_at TEXT NOT NULL,
    group_key TEXT NOT NULL,
    file_name TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    path TEXT NOT NULL,
    UNIQUE(job_id, group_key, path)
);
"#,
    // 4
    r#"CREATE INDEX IF NOT EXISTS idx_result_groups_job ON result_groups(job_id, group_key);"#,
    // 5: append-only action records
    r#"
CREATE TABLE IF NOT EXISTS action_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id TEXT NOT NULL REFERENCES scan_jobs(id),
    recorded_at TEXT NOT NULL,
    path TEXT NOT NULL,
    file_name TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    result TEXT NOT NULL CHECK (result IN ('deleted', 'skipped', 'failed')),
    message TEXT
);
"#,
    // 6
    r#"CREATE INDEX IF NOT EXISTS idx_action_records_job ON action_records(job_id);"#,
    // 7: terminal jobs are immutable
    r#"
CREATE TRIGGER IF NOT EXISTS scan_jobs_terminal_guard
BEFORE UPDATE ON scan_jobs
WHEN OLD.status != 'running'
BEGIN
    SELECT RAISE(ABORT, 'scan job is terminal');
END;
"#,
    // 8: action records are never rewritten
    r#"
CREATE TRIGGER IF NOT EXISTS action_records_append_only
BEFORE UPDATE ON action_records
BEGIN
    SELECT RAISE(ABORT, 'action records are append-only');
END;
"#,
];
