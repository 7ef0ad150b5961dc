//! Read-only [`MessageStore`] over a Messages `chat.db`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, OpenFlags, OptionalExtension};

use courier_core::{
    Attachment, ChatGuid, ChatRef, Handle, ItemFilter, Message, MessageGuid, MessageQuery,
    MessageStore, StoreError, TimePredicate,
};

use crate::apple_time::{from_apple, to_apple_nanos};
use crate::schema::REQUIRED_TABLES;

/// How long a query waits on the Messages app's write lock.
const BUSY_TIMEOUT: Duration = Duration::from_millis(250);

const MESSAGE_COLUMNS: &str = "\
    m.ROWID, m.guid, m.text, m.subject, m.is_from_me, m.item_type, \
    m.group_action_type, m.group_title, m.error, m.date, m.date_delivered, \
    m.date_read, h.ROWID, h.id, h.service";

pub struct SqliteStore {
    path: PathBuf,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").field("path", &self.path).finish()
    }
}

impl SqliteStore {
    /// Open `path` read-only and check the tables this store reads exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(StoreError::NotFound { path });
        }
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_URI,
        )
        .map_err(|e| open_err(&path, e))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| open_err(&path, e))?;

        for table in REQUIRED_TABLES {
            let found: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| open_err(&path, e))?;
            if found.is_none() {
                return Err(StoreError::Open {
                    path,
                    message: format!("missing table `{table}`; is this a Messages database?"),
                });
            }
        }

        tracing::debug!(path = %path.display(), "opened chat database");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MessageStore for SqliteStore {
    fn messages(&self, query: &MessageQuery) -> Result<Vec<Message>, StoreError> {
        let (sql, params) = build_sql(query);
        let conn = self.conn.lock();

        let mut stmt = conn.prepare_cached(&sql).map_err(query_err)?;
        let raw = stmt
            .query_map(params_from_iter(params.iter()), RawMessage::from_row)
            .map_err(query_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(query_err)?;

        let mut messages = Vec::with_capacity(raw.len());
        for raw in raw {
            // Unmappable rows are skipped, never fatal to the query.
            let mut message = match raw.into_message() {
                Ok(message) => message,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping malformed message row");
                    continue;
                }
            };
            message.chats = load_chats(&conn, message.rowid)?;
            message.attachments = load_attachments(&conn, message.rowid)?;
            messages.push(message);
        }
        tracing::trace!(rows = messages.len(), "store query returned");
        Ok(messages)
    }
}

// ---------------------------------------------------------------------------
// Query construction
// ---------------------------------------------------------------------------

/// SQL and positional parameters for `query`.
///
/// The time predicate is parenthesised as a unit, so every filter applies to
/// both branches of the delivered-or-read disjunction.
pub fn build_sql(query: &MessageQuery) -> (String, Vec<Value>) {
    let window = query.time.window();
    let mut params = vec![
        Value::Integer(to_apple_nanos(window.after)),
        Value::Integer(to_apple_nanos(window.before)),
    ];
    let time = match query.time {
        TimePredicate::Created(_) => "(m.date >= ?1 AND m.date < ?2)",
        TimePredicate::DeliveredOrRead(_) => {
            "((m.date_delivered >= ?1 AND m.date_delivered < ?2) \
             OR (m.date_read >= ?1 AND m.date_read < ?2))"
        }
    };

    let mut clauses = vec![time.to_string()];
    if let Some(from_me) = query.from_me {
        params.push(Value::Integer(i64::from(from_me)));
        clauses.push(format!("m.is_from_me = ?{}", params.len()));
    }
    match query.items {
        ItemFilter::Any => {}
        ItemFilter::PlainOnly => clauses.push("m.item_type = 0".to_string()),
        ItemFilter::GroupActionsOnly => clauses.push("m.item_type != 0".to_string()),
    }
    if let Some(chat) = &query.chat {
        params.push(Value::Text(chat.0.clone()));
        clauses.push(format!(
            "m.ROWID IN (SELECT cmj.message_id FROM chat_message_join cmj \
             JOIN chat c ON c.ROWID = cmj.chat_id WHERE c.guid = ?{})",
            params.len()
        ));
    }

    let mut sql = format!(
        "SELECT {MESSAGE_COLUMNS} FROM message m \
         LEFT JOIN handle h ON h.ROWID = m.handle_id \
         WHERE {} ORDER BY m.date ASC, m.ROWID ASC",
        clauses.join(" AND ")
    );
    if let Some(limit) = query.limit {
        params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        sql.push_str(&format!(" LIMIT ?{}", params.len()));
    }
    (sql, params)
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct RawMessage {
    rowid: i64,
    guid: String,
    text: Option<String>,
    subject: Option<String>,
    is_from_me: bool,
    item_type: i64,
    group_action_type: i64,
    group_title: Option<String>,
    error: i64,
    date: Option<i64>,
    date_delivered: Option<i64>,
    date_read: Option<i64>,
    handle: Option<(i64, String, String)>,
}

impl RawMessage {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let handle_rowid: Option<i64> = row.get(12)?;
        let handle = match handle_rowid {
            Some(rowid) => Some((
                rowid,
                row.get::<_, Option<String>>(13)?.unwrap_or_default(),
                row.get::<_, Option<String>>(14)?.unwrap_or_default(),
            )),
            None => None,
        };
        Ok(Self {
            rowid: row.get(0)?,
            guid: row.get(1)?,
            text: row.get(2)?,
            subject: row.get(3)?,
            is_from_me: row.get::<_, Option<bool>>(4)?.unwrap_or(false),
            item_type: row.get::<_, Option<i64>>(5)?.unwrap_or(0),
            group_action_type: row.get::<_, Option<i64>>(6)?.unwrap_or(0),
            group_title: row.get(7)?,
            error: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
            date: row.get(9)?,
            date_delivered: row.get(10)?,
            date_read: row.get(11)?,
            handle,
        })
    }

    fn into_message(self) -> Result<Message, StoreError> {
        let raw_date = self.date.unwrap_or(0);
        let date_created = from_apple(raw_date).ok_or_else(|| StoreError::Malformed {
            rowid: self.rowid,
            column: "date",
            message: format!("unusable timestamp {raw_date}"),
        })?;
        Ok(Message {
            rowid: self.rowid,
            guid: MessageGuid(self.guid),
            text: self.text,
            subject: self.subject,
            handle: self.handle.map(|(rowid, address, service)| Handle {
                rowid,
                address,
                service,
            }),
            is_from_me: self.is_from_me,
            item_type: self.item_type,
            group_action_type: self.group_action_type,
            group_title: self.group_title,
            error: self.error,
            date_created,
            date_delivered: self.date_delivered.and_then(from_apple),
            date_read: self.date_read.and_then(from_apple),
            chats: Vec::new(),
            attachments: Vec::new(),
        })
    }
}

fn load_chats(conn: &Connection, message_rowid: i64) -> Result<Vec<ChatRef>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT c.ROWID, c.guid, c.display_name FROM chat c \
             JOIN chat_message_join cmj ON cmj.chat_id = c.ROWID \
             WHERE cmj.message_id = ?1 ORDER BY c.ROWID",
        )
        .map_err(query_err)?;
    let chats = stmt
        .query_map([message_rowid], |row| {
            Ok(ChatRef {
                rowid: row.get(0)?,
                guid: ChatGuid(row.get(1)?),
                display_name: row.get(2)?,
            })
        })
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)?;
    Ok(chats)
}

fn load_attachments(conn: &Connection, message_rowid: i64) -> Result<Vec<Attachment>, StoreError> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT a.ROWID, a.guid, a.transfer_name, a.mime_type, a.total_bytes \
             FROM attachment a \
             JOIN message_attachment_join maj ON maj.attachment_id = a.ROWID \
             WHERE maj.message_id = ?1 ORDER BY a.ROWID",
        )
        .map_err(query_err)?;
    let attachments = stmt
        .query_map([message_rowid], |row| {
            Ok(Attachment {
                rowid: row.get(0)?,
                guid: row.get(1)?,
                transfer_name: row.get(2)?,
                mime_type: row.get(3)?,
                total_bytes: row.get::<_, Option<i64>>(4)?.unwrap_or(0),
            })
        })
        .map_err(query_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(query_err)?;
    Ok(attachments)
}

fn query_err(err: rusqlite::Error) -> StoreError {
    StoreError::Query(err.to_string())
}

fn open_err(path: &Path, err: rusqlite::Error) -> StoreError {
    StoreError::Open {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
