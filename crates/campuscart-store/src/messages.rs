use rusqlite::params;
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::Message;
use crate::rows;

impl Database {
    /// Persist a chat line for request `barter_id`. Content is trimmed and
    /// must not be empty afterwards.
    pub fn append_message(&self, barter_id: Uuid, sender_id: Uuid, content: &str) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(StoreError::Validation("message cannot be empty".into()));
        }

        let message = Message {
            id: Uuid::new_v4(),
            barter_id,
            sender_id,
            content: content.to_string(),
            created_at: rows::now(),
        };

        self.conn().execute(
            "INSERT INTO barter_messages (id, barter_id, sender_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id.to_string(),
                message.barter_id.to_string(),
                message.sender_id.to_string(),
                message.content,
                rows::ts_to_sql(&message.created_at),
            ],
        )?;
        Ok(message)
    }

    /// Full conversation for a request, oldest first.
    pub fn get_messages_for_request(&self, barter_id: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, barter_id, sender_id, content, created_at
             FROM barter_messages
             WHERE barter_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![barter_id.to_string()], row_to_message)?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: rows::uuid_at(row, 0)?,
        barter_id: rows::uuid_at(row, 1)?,
        sender_id: rows::uuid_at(row, 2)?,
        content: row.get(3)?,
        created_at: rows::timestamp_at(row, 4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewPost, NewRequest};
    use campuscart_shared::{Category, TradeType};
    use chrono::NaiveDate;

    fn request(db: &Database) -> (Uuid, Uuid, Uuid) {
        let poster = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let post = db
            .create_post(
                poster,
                &NewPost {
                    name: "Desk".into(),
                    description: "Oak".into(),
                    category: Category::Furniture,
                    price_cents: None,
                    location: None,
                    image_url: None,
                    deadline: NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(),
                },
            )
            .unwrap();
        let request = db
            .create_request(&NewRequest {
                post_id: post.post_id,
                from_user_id: requester,
                to_user_id: poster,
                offer_name: "Chair".into(),
                offer_description: String::new(),
                offer_image: None,
                trade_type: TradeType::Barter,
            })
            .unwrap();
        (request.id, requester, poster)
    }

    #[test]
    fn history_is_in_send_order() {
        let db = Database::open_in_memory().unwrap();
        let (id, requester, poster) = request(&db);

        let a = db.append_message(id, requester, "hi").unwrap();
        let b = db.append_message(id, poster, "  hello  ").unwrap();
        let c = db.append_message(id, requester, "tomorrow?").unwrap();
        assert_eq!(b.content, "hello");

        let history = db.get_messages_for_request(id).unwrap();
        assert_eq!(history, vec![a, b, c]);
    }

    #[test]
    fn blank_message_rejected() {
        let db = Database::open_in_memory().unwrap();
        let (id, requester, _) = request(&db);
        assert!(matches!(
            db.append_message(id, requester, " \n "),
            Err(StoreError::Validation(_))
        ));
        assert!(db.get_messages_for_request(id).unwrap().is_empty());
    }

    #[test]
    fn message_needs_existing_request() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .append_message(Uuid::new_v4(), Uuid::new_v4(), "orphan")
            .unwrap_err();
        assert!(matches!(err, StoreError::Sqlite(_)));
    }
}
