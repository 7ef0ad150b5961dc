//! The subset of the Messages schema this crate reads.

/// Tables that must exist for [`crate::SqliteStore::open`] to succeed.
pub const REQUIRED_TABLES: [&str; 7] = [
    "message",
    "handle",
    "chat",
    "chat_message_join",
    "attachment",
    "message_attachment_join",
    "chat_handle_join",
];

/// DDL for the columns the store reads. Real databases carry many more.
/// Used to build fixture databases.
pub const MINIMAL_SCHEMA: &str = "
CREATE TABLE handle (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL,
    service TEXT NOT NULL DEFAULT 'iMessage'
);
CREATE TABLE chat (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT UNIQUE NOT NULL,
    display_name TEXT
);
CREATE TABLE message (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT UNIQUE NOT NULL,
    text TEXT,
    subject TEXT,
    handle_id INTEGER DEFAULT 0,
    is_from_me INTEGER DEFAULT 0,
    item_type INTEGER DEFAULT 0,
    group_action_type INTEGER DEFAULT 0,
    group_title TEXT,
    error INTEGER DEFAULT 0,
    date INTEGER,
    date_delivered INTEGER DEFAULT 0,
    date_read INTEGER DEFAULT 0
);
CREATE TABLE attachment (
    ROWID INTEGER PRIMARY KEY AUTOINCREMENT,
    guid TEXT UNIQUE NOT NULL,
    transfer_name TEXT,
    mime_type TEXT,
    total_bytes INTEGER DEFAULT 0
);
CREATE TABLE chat_message_join (
    chat_id INTEGER REFERENCES chat (ROWID) ON DELETE CASCADE,
    message_id INTEGER REFERENCES message (ROWID) ON DELETE CASCADE,
    message_date INTEGER DEFAULT 0,
    PRIMARY KEY (chat_id, message_id)
);
CREATE TABLE chat_handle_join (
    chat_id INTEGER REFERENCES chat (ROWID) ON DELETE CASCADE,
    handle_id INTEGER REFERENCES handle (ROWID) ON DELETE CASCADE,
    UNIQUE (chat_id, handle_id)
);
CREATE TABLE message_attachment_join (
    message_id INTEGER REFERENCES message (ROWID) ON DELETE CASCADE,
    attachment_id INTEGER REFERENCES attachment (ROWID) ON DELETE CASCADE,
    UNIQUE (message_id, attachment_id)
);
";
