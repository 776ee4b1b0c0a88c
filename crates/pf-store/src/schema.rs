use rusqlite::Connection;

pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS sessions (
            id                        TEXT PRIMARY KEY,
            user_id                   TEXT NOT NULL,
            operator_id               TEXT NOT NULL,
            status                    TEXT NOT NULL,
            current_phase_id          TEXT NOT NULL,
            current_phase_entered_at  TEXT NOT NULL,
            start_time                TEXT NOT NULL,
            created_at                TEXT NOT NULL,
            updated_at                TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            session_id    TEXT NOT NULL REFERENCES sessions(id),
            role          TEXT NOT NULL,
            content       TEXT NOT NULL,
            message_type  TEXT NOT NULL,
            metadata      TEXT,
            created_at    TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session_created
            ON messages(session_id, created_at);

        CREATE TABLE IF NOT EXISTS field_values (
            session_id          TEXT NOT NULL REFERENCES sessions(id),
            field_name          TEXT NOT NULL,
            value               TEXT NOT NULL,
            collected_in_phase  TEXT NOT NULL,
            type_tag            TEXT NOT NULL,
            updated_at          TEXT NOT NULL,
            PRIMARY KEY (session_id, field_name)
        );
        ",
    )
}
