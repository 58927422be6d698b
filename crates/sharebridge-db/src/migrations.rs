use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password        TEXT NOT NULL,
                name            TEXT NOT NULL,
                phone           TEXT,
                address         TEXT,
                role            TEXT NOT NULL CHECK (role IN ('DONOR', 'ACCEPTOR', 'ADMIN')),
                latitude        REAL,
                longitude       REAL,
                is_verified     INTEGER NOT NULL DEFAULT 0,
                otp_hash        TEXT,
                otp_purpose     TEXT,
                otp_expires_at  TEXT,
                otp_attempts    INTEGER NOT NULL DEFAULT 0,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            CREATE TABLE listings (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category    TEXT NOT NULL,
                status      TEXT NOT NULL DEFAULT 'ACTIVE'
                            CHECK (status IN ('ACTIVE', 'CLAIMED', 'COMPLETED')),
                image_url   TEXT,
                address     TEXT,
                latitude    REAL,
                longitude   REAL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_listings_user ON listings(user_id);
            CREATE INDEX idx_listings_category_status ON listings(category, status);
            CREATE INDEX idx_listings_location ON listings(latitude, longitude);

            CREATE TABLE requests (
                id          TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                title       TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                category    TEXT NOT NULL,
                quantity    INTEGER CHECK (quantity IS NULL OR quantity >= 1),
                status      TEXT NOT NULL DEFAULT 'OPEN'
                            CHECK (status IN ('OPEN', 'FULFILLED', 'CLOSED')),
                address     TEXT,
                latitude    REAL,
                longitude   REAL,
                created_at  TEXT NOT NULL,
                updated_at  TEXT NOT NULL
            );

            CREATE INDEX idx_requests_user ON requests(user_id);
            CREATE INDEX idx_requests_category_status ON requests(category, status);
            CREATE INDEX idx_requests_location ON requests(latitude, longitude);

            CREATE TABLE messages (
                id          TEXT PRIMARY KEY,
                sender_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                receiver_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                listing_id  TEXT REFERENCES listings(id) ON DELETE SET NULL,
                request_id  TEXT REFERENCES requests(id) ON DELETE SET NULL,
                content     TEXT NOT NULL,
                is_read     INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_messages_pair ON messages(sender_id, receiver_id, created_at);
            CREATE INDEX idx_messages_receiver ON messages(receiver_id, is_read);

            CREATE TABLE logs (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id     TEXT REFERENCES users(id) ON DELETE SET NULL,
                action      TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_logs_user ON logs(user_id);

            -- Append-only: only the SET NULL cascade may touch existing rows.
            CREATE TRIGGER logs_no_update
                BEFORE UPDATE OF id, action, created_at ON logs
            BEGIN
                SELECT RAISE(ABORT, 'logs are append-only');
            END;

            CREATE TRIGGER logs_no_delete
                BEFORE DELETE ON logs
            BEGIN
                SELECT RAISE(ABORT, 'logs are append-only');
            END;

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(version, 1);
    }

    #[test]
    fn logs_reject_update_and_delete() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        conn.execute(
            "INSERT INTO logs (action, created_at) VALUES ('boot', '2024-01-01 00:00:00')",
            [],
        )
        .unwrap();

        assert!(conn.execute("UPDATE logs SET action = 'tampered'", []).is_err());
        assert!(conn.execute("DELETE FROM logs", []).is_err());

        let action: String = conn.query_row("SELECT action FROM logs", [], |r| r.get(0)).unwrap();
        assert_eq!(action, "boot");
    }
}
