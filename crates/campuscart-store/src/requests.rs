//! Request repository: trade proposals and their status machine.
//!
//! Every status write is conditional on the status it was validated
//! against, so two writers racing on the same row cannot both succeed.

use campuscart_shared::{Direction, Party, PostStatus, RequestStatus};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewRequest, TradeRequest};
use crate::rows;

const REQUEST_COLUMNS: &str = "id, post_id, from_user_id, to_user_id, offer_name, \
     offer_description, offer_image, status, trade_type, requester_status, poster_status, created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a pending request with both completion flags cleared.
    pub fn create_request(&self, data: &NewRequest) -> Result<TradeRequest> {
        if data.from_user_id == data.to_user_id {
            return Err(StoreError::Validation(
                "cannot send a request to yourself".into(),
            ));
        }
        if data.offer_name.trim().is_empty() {
            return Err(StoreError::Validation("offer name is required".into()));
        }

        let post = self.get_post(data.post_id)?;
        if post.status != PostStatus::Active {
            return Err(StoreError::Validation("post is no longer active".into()));
        }
        if post.user_id != data.to_user_id {
            return Err(StoreError::Validation(
                "request recipient must be the post owner".into(),
            ));
        }

        let request = TradeRequest {
            id: Uuid::new_v4(),
            post_id: data.post_id,
            from_user_id: data.from_user_id,
            to_user_id: data.to_user_id,
            offer_name: data.offer_name.trim().to_string(),
            offer_description: data.offer_description.trim().to_string(),
            offer_image: data
                .offer_image
                .clone()
                .filter(|key| !key.trim().is_empty()),
            status: RequestStatus::Pending,
            trade_type: data.trade_type,
            requester_status: false,
            poster_status: false,
            created_at: rows::now(),
        };

        self.conn().execute(
            "INSERT INTO barter_requests (id, post_id, from_user_id, to_user_id, offer_name,
                                          offer_description, offer_image, status, trade_type,
                                          requester_status, poster_status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 0, 0, ?10)",
            params![
                request.id.to_string(),
                request.post_id.to_string(),
                request.from_user_id.to_string(),
                request.to_user_id.to_string(),
                request.offer_name,
                request.offer_description,
                request.offer_image,
                request.status.as_str(),
                request.trade_type.as_str(),
                rows::ts_to_sql(&request.created_at),
            ],
        )?;

        tracing::debug!(request_id = %request.id, post_id = %request.post_id, "request created");
        Ok(request)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_request(&self, id: Uuid) -> Result<TradeRequest> {
        fetch_request(self.conn(), id)
    }

    /// Pending requests addressed to (incoming) or sent by (outgoing) `user_id`,
    /// newest first.
    pub fn list_requests(&self, user_id: Uuid, direction: Direction) -> Result<Vec<TradeRequest>> {
        let column = match direction {
            Direction::Incoming => "to_user_id",
            Direction::Outgoing => "from_user_id",
        };
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM barter_requests
             WHERE {column} = ?1 AND status = ?2
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(
            params![user_id.to_string(), RequestStatus::Pending.as_str()],
            row_to_request,
        )?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    /// Requests in `status` where `user_id` is either party, newest first.
    pub fn list_trades(&self, user_id: Uuid, status: RequestStatus) -> Result<Vec<TradeRequest>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {REQUEST_COLUMNS} FROM barter_requests
             WHERE (from_user_id = ?1 OR to_user_id = ?1) AND status = ?2
             ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt.query_map(params![user_id.to_string(), status.as_str()], row_to_request)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Overwrite the status of a request along a legal edge of the state
    /// machine. `completed` is only reachable through
    /// [`confirm_completion`](Self::confirm_completion).
    pub fn update_request_status(&self, id: Uuid, status: RequestStatus) -> Result<TradeRequest> {
        let current = self.get_request(id)?;
        if status == RequestStatus::Completed || !current.status.can_transition_to(status) {
            return Err(StoreError::transition(current.status, status));
        }

        let affected = self.conn().execute(
            "UPDATE barter_requests SET status = ?3 WHERE id = ?1 AND status = ?2",
            params![id.to_string(), current.status.as_str(), status.as_str()],
        )?;
        if affected == 0 {
            let latest = self.get_request(id)?;
            return Err(StoreError::transition(latest.status, status));
        }

        tracing::debug!(request_id = %id, from = %current.status, to = %status, "request status updated");
        Ok(TradeRequest { status, ..current })
    }

    /// Accept a pending request and deactivate its post in one transaction.
    /// Fails without writing anything once the post is no longer active, so
    /// one post never ends up with two accepted requests.
    pub fn accept_request(&self, id: Uuid) -> Result<TradeRequest> {
        let tx = self.conn().unchecked_transaction()?;

        let current = fetch_request(&tx, id)?;
        if !current.status.can_transition_to(RequestStatus::Accepted) {
            return Err(StoreError::transition(current.status, RequestStatus::Accepted));
        }

        let affected = tx.execute(
            "UPDATE barter_requests SET status = ?2 WHERE id = ?1 AND status = ?3",
            params![
                id.to_string(),
                RequestStatus::Accepted.as_str(),
                RequestStatus::Pending.as_str(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::transition(current.status, RequestStatus::Accepted));
        }

        let closed = tx.execute(
            "UPDATE barter_posts SET status = ?2 WHERE post_id = ?1 AND status = ?3",
            params![
                current.post_id.to_string(),
                PostStatus::Inactive.as_str(),
                PostStatus::Active.as_str(),
            ],
        )?;
        if closed == 0 {
            // Dropping `tx` rolls the request update back.
            return Err(StoreError::Validation("post is no longer active".into()));
        }

        tx.commit()?;

        tracing::debug!(request_id = %id, post_id = %current.post_id, "request accepted, post closed");
        Ok(TradeRequest {
            status: RequestStatus::Accepted,
            ..current
        })
    }

    /// Record `party`'s completion attestation on an accepted request.
    ///
    /// The flag write and the derived `accepted -> completed` step are one
    /// statement: whichever party confirms second observes the other flag
    /// inside the same UPDATE. Repeating a confirmation is a no-op, also
    /// after the request has completed.
    pub fn confirm_completion(&self, id: Uuid, party: Party) -> Result<TradeRequest> {
        let (mine, theirs) = match party {
            Party::Requester => ("requester_status", "poster_status"),
            Party::Poster => ("poster_status", "requester_status"),
        };

        let affected = self.conn().execute(
            &format!(
                "UPDATE barter_requests
                 SET {mine} = 1,
                     status = CASE WHEN {theirs} = 1 THEN ?2 ELSE status END
                 WHERE id = ?1 AND status = ?3"
            ),
            params![
                id.to_string(),
                RequestStatus::Completed.as_str(),
                RequestStatus::Accepted.as_str(),
            ],
        )?;

        let request = self.get_request(id)?;
        if affected == 0
            && !(request.status == RequestStatus::Completed && request.is_confirmed_by(party))
        {
            return Err(StoreError::transition(request.status, RequestStatus::Completed));
        }

        tracing::debug!(
            request_id = %id,
            ?party,
            status = %request.status,
            "completion confirmed"
        );
        Ok(request)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Withdraw a pending request. Only the requester may do this.
    pub fn delete_request(&self, id: Uuid, acting_user: Uuid) -> Result<()> {
        let request = self.get_request(id)?;
        if request.from_user_id != acting_user {
            return Err(StoreError::Permission(
                "only the requester can cancel a request".into(),
            ));
        }
        if request.status != RequestStatus::Pending {
            return Err(StoreError::Permission(format!(
                "cannot cancel a {} request",
                request.status
            )));
        }

        let affected = self.conn().execute(
            "DELETE FROM barter_requests WHERE id = ?1 AND from_user_id = ?2 AND status = ?3",
            params![
                id.to_string(),
                acting_user.to_string(),
                RequestStatus::Pending.as_str(),
            ],
        )?;
        if affected == 0 {
            return Err(StoreError::Permission(
                "request is no longer pending".into(),
            ));
        }

        tracing::debug!(request_id = %id, "request deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn fetch_request(conn: &Connection, id: Uuid) -> Result<TradeRequest> {
    conn.query_row(
        &format!("SELECT {REQUEST_COLUMNS} FROM barter_requests WHERE id = ?1"),
        params![id.to_string()],
        row_to_request,
    )
    .optional()?
    .ok_or(StoreError::NotFound("request"))
}

fn row_to_request(row: &rusqlite::Row<'_>) -> rusqlite::Result<TradeRequest> {
    Ok(TradeRequest {
        id: rows::uuid_at(row, 0)?,
        post_id: rows::uuid_at(row, 1)?,
        from_user_id: rows::uuid_at(row, 2)?,
        to_user_id: rows::uuid_at(row, 3)?,
        offer_name: row.get(4)?,
        offer_description: row.get(5)?,
        offer_image: row.get(6)?,
        status: rows::enum_at(row, 7)?,
        trade_type: rows::enum_at(row, 8)?,
        requester_status: rows::bool_at(row, 9)?,
        poster_status: rows::bool_at(row, 10)?,
        created_at: rows::timestamp_at(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewPost;
    use campuscart_shared::{Category, TradeType};
    use chrono::NaiveDate;

    struct Fixture {
        db: Database,
        poster: Uuid,
        requester: Uuid,
        post_id: Uuid,
    }

    fn fixture() -> Fixture {
        let db = Database::open_in_memory().unwrap();
        let poster = Uuid::new_v4();
        let requester = Uuid::new_v4();
        let post = db
            .create_post(
                poster,
                &NewPost {
                    name: "Mini fridge".into(),
                    description: "Works, a bit loud".into(),
                    category: Category::Furniture,
                    price_cents: Some(4000),
                    location: None,
                    image_url: None,
                    deadline: NaiveDate::from_ymd_opt(2030, 1, 31).unwrap(),
                },
            )
            .unwrap();
        Fixture {
            db,
            poster,
            requester,
            post_id: post.post_id,
        }
    }

    impl Fixture {
        fn request(&self) -> TradeRequest {
            self.db
                .create_request(&NewRequest {
                    post_id: self.post_id,
                    from_user_id: self.requester,
                    to_user_id: self.poster,
                    offer_name: "Textbooks".into(),
                    offer_description: "Calc I and II".into(),
                    offer_image: None,
                    trade_type: TradeType::Barter,
                })
                .unwrap()
        }
    }

    #[test]
    fn new_request_is_pending_with_flags_cleared() {
        let f = fixture();
        let r = f.request();
        assert_eq!(r.status, RequestStatus::Pending);
        assert!(!r.requester_status && !r.poster_status);
        assert_eq!(f.db.get_request(r.id).unwrap(), r);
    }

    #[test]
    fn self_request_rejected() {
        let f = fixture();
        let err = f
            .db
            .create_request(&NewRequest {
                post_id: f.post_id,
                from_user_id: f.poster,
                to_user_id: f.poster,
                offer_name: "Anything".into(),
                offer_description: String::new(),
                offer_image: None,
                trade_type: TradeType::Barter,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn recipient_must_own_post() {
        let f = fixture();
        let err = f
            .db
            .create_request(&NewRequest {
                post_id: f.post_id,
                from_user_id: f.requester,
                to_user_id: Uuid::new_v4(),
                offer_name: "Anything".into(),
                offer_description: String::new(),
                offer_image: None,
                trade_type: TradeType::Barter,
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn directions_split_by_role() {
        let f = fixture();
        let r = f.request();
        let incoming = f.db.list_requests(f.poster, Direction::Incoming).unwrap();
        let outgoing = f.db.list_requests(f.requester, Direction::Outgoing).unwrap();
        assert_eq!(incoming, vec![r.clone()]);
        assert_eq!(outgoing, vec![r]);
        assert!(f.db.list_requests(f.poster, Direction::Outgoing).unwrap().is_empty());
    }

    #[test]
    fn accept_closes_post() {
        let f = fixture();
        let r = f.request();
        let accepted = f.db.accept_request(r.id).unwrap();
        assert_eq!(accepted.status, RequestStatus::Accepted);
        assert_eq!(f.db.get_post(f.post_id).unwrap().status, PostStatus::Inactive);
        assert!(f.db.list_requests(f.poster, Direction::Incoming).unwrap().is_empty());
    }

    #[test]
    fn second_accept_on_closed_post_fails() {
        let f = fixture();
        let first = f.request();
        let second = f.request();

        f.db.accept_request(first.id).unwrap();
        let err = f.db.accept_request(second.id).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));

        // The failed accept left nothing behind.
        assert_eq!(f.db.get_request(second.id).unwrap().status, RequestStatus::Pending);
        assert_eq!(
            f.db.list_trades(f.poster, RequestStatus::Accepted).unwrap(),
            vec![TradeRequest {
                status: RequestStatus::Accepted,
                ..first
            }]
        );
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let f = fixture();
        let r = f.request();
        f.db.update_request_status(r.id, RequestStatus::Rejected).unwrap();

        for next in [
            RequestStatus::Pending,
            RequestStatus::Accepted,
            RequestStatus::Cancelled,
            RequestStatus::Completed,
        ] {
            let err = f.db.update_request_status(r.id, next).unwrap_err();
            assert!(matches!(err, StoreError::InvalidTransition { .. }), "{next}");
        }
        assert!(matches!(
            f.db.accept_request(r.id),
            Err(StoreError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn completed_cannot_be_written_directly() {
        let f = fixture();
        let r = f.request();
        f.db.accept_request(r.id).unwrap();
        let err = f
            .db
            .update_request_status(r.id, RequestStatus::Completed)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn dual_confirmation_completes() {
        let f = fixture();
        let r = f.request();
        f.db.accept_request(r.id).unwrap();

        let after_first = f.db.confirm_completion(r.id, Party::Requester).unwrap();
        assert!(after_first.requester_status);
        assert!(!after_first.poster_status);
        assert_eq!(after_first.status, RequestStatus::Accepted);

        let again = f.db.confirm_completion(r.id, Party::Requester).unwrap();
        assert_eq!(again, after_first);

        let done = f.db.confirm_completion(r.id, Party::Poster).unwrap();
        assert_eq!(done.status, RequestStatus::Completed);
        assert!(done.requester_status && done.poster_status);

        // Confirming after completion is still a quiet no-op.
        assert_eq!(f.db.confirm_completion(r.id, Party::Poster).unwrap(), done);
        assert_eq!(
            f.db.list_trades(f.requester, RequestStatus::Completed).unwrap(),
            vec![done]
        );
    }

    #[test]
    fn confirmation_requires_accepted() {
        let f = fixture();
        let r = f.request();
        let err = f.db.confirm_completion(r.id, Party::Poster).unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
        assert!(!f.db.get_request(r.id).unwrap().poster_status);
    }

    #[test]
    fn only_requester_deletes_pending() {
        let f = fixture();
        let r = f.request();
        assert!(matches!(
            f.db.delete_request(r.id, f.poster),
            Err(StoreError::Permission(_))
        ));

        f.db.delete_request(r.id, f.requester).unwrap();
        assert!(matches!(
            f.db.get_request(r.id),
            Err(StoreError::NotFound("request"))
        ));

        let accepted = f.request();
        f.db.accept_request(accepted.id).unwrap();
        assert!(matches!(
            f.db.delete_request(accepted.id, f.requester),
            Err(StoreError::Permission(_))
        ));
    }
}
