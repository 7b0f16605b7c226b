//! v001 -- Initial schema creation.
//!
//! Creates the four marketplace tables: `profiles`, `barter_posts`,
//! `barter_requests` and `barter_messages`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profiles (
    id         TEXT PRIMARY KEY NOT NULL,     -- auth user id (UUID)
    username   TEXT NOT NULL,
    created_at TEXT NOT NULL                  -- RFC-3339, microsecond precision
);

-- ----------------------------------------------------------------
-- Posts (listings)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS barter_posts (
    post_id     TEXT PRIMARY KEY NOT NULL,    -- UUID v4
    user_id     TEXT NOT NULL,                -- owner
    name        TEXT NOT NULL,
    description TEXT NOT NULL,
    type        TEXT NOT NULL,                -- clothes|furniture|supplies|other
    price_cents INTEGER,                      -- NULL = barter only
    image_url   TEXT,                         -- object key in post-images
    latitude    REAL,
    longitude   REAL,
    status      TEXT NOT NULL DEFAULT 'active',
    deadline    TEXT NOT NULL,                -- YYYY-MM-DD
    created_at  TEXT NOT NULL,

    CHECK ((latitude IS NULL) = (longitude IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_posts_status_created
    ON barter_posts(status, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_posts_user ON barter_posts(user_id);

-- ----------------------------------------------------------------
-- Requests (trade proposals)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS barter_requests (
    id                TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    post_id           TEXT NOT NULL,              -- FK -> barter_posts(post_id)
    from_user_id      TEXT NOT NULL,              -- requester
    to_user_id        TEXT NOT NULL,              -- poster
    offer_name        TEXT NOT NULL,
    offer_description TEXT NOT NULL DEFAULT '',
    offer_image       TEXT,                       -- object key in offer-images
    status            TEXT NOT NULL DEFAULT 'pending',
    trade_type        TEXT NOT NULL DEFAULT 'barter',
    requester_status  INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    poster_status     INTEGER NOT NULL DEFAULT 0, -- boolean 0/1
    created_at        TEXT NOT NULL,

    CHECK (from_user_id <> to_user_id),
    FOREIGN KEY (post_id) REFERENCES barter_posts(post_id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_requests_to ON barter_requests(to_user_id, status);
CREATE INDEX IF NOT EXISTS idx_requests_from ON barter_requests(from_user_id, status);

-- ----------------------------------------------------------------
-- Messages (per-request chat log)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS barter_messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    barter_id  TEXT NOT NULL,                 -- FK -> barter_requests(id)
    sender_id  TEXT NOT NULL,
    content    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (barter_id) REFERENCES barter_requests(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_messages_barter_ts
    ON barter_messages(barter_id, created_at ASC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
