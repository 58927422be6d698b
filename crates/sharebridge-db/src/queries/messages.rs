use anyhow::Result;
use rusqlite::{Row, params};
use uuid::Uuid;

use sharebridge_types::models::{Conversation, Message};

use crate::Database;
use crate::filter::PageRequest;
use crate::models::{opt_uuid_col, uuid_col};

fn message_from_row(row: &Row) -> rusqlite::Result<Message> {
    Ok(Message {
        id: uuid_col(row, 0)?,
        sender_id: uuid_col(row, 1)?,
        receiver_id: uuid_col(row, 2)?,
        listing_id: opt_uuid_col(row, 3)?,
        request_id: opt_uuid_col(row, 4)?,
        content: row.get(5)?,
        is_read: row.get(6)?,
        created_at: row.get(7)?,
    })
}

impl Database {
    pub fn insert_message(&self, message: &Message) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, listing_id, request_id, content, is_read, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    message.id.to_string(),
                    message.sender_id.to_string(),
                    message.receiver_id.to_string(),
                    message.listing_id.map(|id| id.to_string()),
                    message.request_id.map(|id| id.to_string()),
                    message.content,
                    message.is_read,
                    message.created_at,
                ],
            )?;
            Ok(())
        })
    }

    /// One page of the thread between `me` and `other`. Pages count back from
    /// the newest message; each page is returned oldest first.
    pub fn get_thread(&self, me: Uuid, other: Uuid, page: &PageRequest) -> Result<(Vec<Message>, u64)> {
        self.with_conn(|conn| {
            let (me, other) = (me.to_string(), other.to_string());

            let total: i64 = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)",
                params![me, other],
                |row| row.get(0),
            )?;

            let mut stmt = conn.prepare(
                "SELECT id, sender_id, receiver_id, listing_id, request_id, content, is_read, created_at
                 FROM messages
                 WHERE (sender_id = ?1 AND receiver_id = ?2) OR (sender_id = ?2 AND receiver_id = ?1)
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?3 OFFSET ?4",
            )?;
            let mut rows = stmt
                .query_map(params![me, other, page.limit, page.offset()], message_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows.reverse();

            Ok((rows, total as u64))
        })
    }

    /// Marks everything `sender` sent to `receiver` as read. Returns how many
    /// rows changed.
    pub fn mark_thread_read(&self, receiver: Uuid, sender: Uuid) -> Result<usize> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE messages SET is_read = 1 WHERE receiver_id = ?1 AND sender_id = ?2 AND is_read = 0",
                params![receiver.to_string(), sender.to_string()],
            )?;
            Ok(changed)
        })
    }

    /// Latest message per counterpart, most recent conversation first.
    pub fn list_conversations(&self, me: Uuid) -> Result<Vec<Conversation>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "WITH mine AS (
                     SELECT CASE WHEN sender_id = ?1 THEN receiver_id ELSE sender_id END AS partner_id,
                            content, created_at, rowid AS seq,
                            CASE WHEN receiver_id = ?1 AND is_read = 0 THEN 1 ELSE 0 END AS unread
                     FROM messages
                     WHERE sender_id = ?1 OR receiver_id = ?1
                 ),
                 ranked AS (
                     SELECT partner_id, content, created_at, seq,
                            ROW_NUMBER() OVER (PARTITION BY partner_id ORDER BY created_at DESC, seq DESC) AS rn,
                            SUM(unread) OVER (PARTITION BY partner_id) AS unread_total
                     FROM mine
                 )
                 SELECT r.partner_id, u.name, r.content, r.created_at, r.unread_total
                 FROM ranked r
                 JOIN users u ON u.id = r.partner_id
                 WHERE r.rn = 1
                 ORDER BY r.created_at DESC, r.seq DESC",
            )?;

            let rows = stmt
                .query_map([me.to_string()], |row| {
                    Ok(Conversation {
                        user_id: uuid_col(row, 0)?,
                        name: row.get(1)?,
                        last_message: row.get(2)?,
                        last_at: row.get(3)?,
                        unread: row.get::<_, i64>(4)? as u64,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn count_messages(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let total: i64 = conn.query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
            Ok(total as u64)
        })
    }
}
