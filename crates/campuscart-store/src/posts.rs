//! Post repository: CRUD over [`Post`] listings.

use campuscart_shared::{GeoPoint, PostStatus, RequestStatus};
use rusqlite::{params, params_from_iter, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{NewPost, Post, PostFilter, PostWithOwner};
use crate::rows;

const POST_COLUMNS: &str = "p.post_id, p.user_id, p.name, p.description, p.type, \
     p.price_cents, p.image_url, p.latitude, p.longitude, p.status, p.deadline, p.created_at";

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new active listing owned by `owner_id`.
    pub fn create_post(&self, owner_id: Uuid, new_post: &NewPost) -> Result<Post> {
        new_post.validate()?;

        let post = Post {
            post_id: Uuid::new_v4(),
            user_id: owner_id,
            name: new_post.name.trim().to_string(),
            description: new_post.description.trim().to_string(),
            category: new_post.category,
            price_cents: new_post.price_cents,
            location: new_post.location,
            image_url: new_post
                .image_url
                .clone()
                .filter(|key| !key.trim().is_empty()),
            status: PostStatus::Active,
            deadline: new_post.deadline,
            created_at: rows::now(),
        };

        self.conn().execute(
            "INSERT INTO barter_posts (post_id, user_id, name, description, type, price_cents,
                                       image_url, latitude, longitude, status, deadline, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                post.post_id.to_string(),
                post.user_id.to_string(),
                post.name,
                post.description,
                post.category.as_str(),
                post.price_cents,
                post.image_url,
                post.location.map(|l| l.latitude),
                post.location.map(|l| l.longitude),
                post.status.as_str(),
                rows::date_to_sql(&post.deadline),
                rows::ts_to_sql(&post.created_at),
            ],
        )?;

        tracing::debug!(post_id = %post.post_id, owner = %owner_id, "post created");
        Ok(post)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    pub fn get_post(&self, post_id: Uuid) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM barter_posts p WHERE p.post_id = ?1"),
                params![post_id.to_string()],
                row_to_post,
            )
            .optional()?
            .ok_or(StoreError::NotFound("post"))
    }

    /// Active posts matching `filter`, newest first, with owner usernames.
    pub fn list_posts(&self, filter: &PostFilter) -> Result<Vec<PostWithOwner>> {
        let mut sql = format!(
            "SELECT {POST_COLUMNS}, pr.username
             FROM barter_posts p
             LEFT JOIN profiles pr ON pr.id = p.user_id
             WHERE p.status = ?1"
        );
        let mut args = vec![PostStatus::Active.as_str().to_string()];

        if let Some(owner) = filter.exclude_owner {
            args.push(owner.to_string());
            sql.push_str(&format!(" AND p.user_id <> ?{}", args.len()));
        }
        if let Some(category) = filter.category {
            args.push(category.as_str().to_string());
            sql.push_str(&format!(" AND p.type = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY p.created_at DESC, p.rowid DESC");

        let mut stmt = self.conn().prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok(PostWithOwner {
                post: row_to_post(row)?,
                owner_username: row.get(12)?,
            })
        })?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }

    /// Every post owned by `owner_id` regardless of status, newest first.
    pub fn list_posts_by_owner(&self, owner_id: Uuid) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {POST_COLUMNS} FROM barter_posts p
             WHERE p.user_id = ?1
             ORDER BY p.created_at DESC, p.rowid DESC"
        ))?;
        let rows = stmt.query_map(params![owner_id.to_string()], row_to_post)?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(StoreError::Sqlite)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Move a post along `active -> inactive`. Reactivation is refused.
    pub fn set_post_status(&self, post_id: Uuid, status: PostStatus) -> Result<()> {
        let current = self.get_post(post_id)?.status;
        if current == status {
            return Ok(());
        }
        if current == PostStatus::Inactive {
            return Err(StoreError::transition(current, status));
        }

        self.conn().execute(
            "UPDATE barter_posts SET status = ?2 WHERE post_id = ?1",
            params![post_id.to_string(), status.as_str()],
        )?;
        tracing::debug!(post_id = %post_id, status = %status, "post status updated");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Hard-delete a post. Only its owner may do this. Pending requests
    /// against the post (and their chat) go with it through
    /// `ON DELETE CASCADE`; once any request has left `pending` the post is
    /// part of a trade record and is kept.
    pub fn delete_post(&self, post_id: Uuid, acting_user: Uuid) -> Result<()> {
        let post = self.get_post(post_id)?;
        if post.user_id != acting_user {
            return Err(StoreError::Permission(
                "only the owner can delete a post".into(),
            ));
        }

        let tx = self.conn().unchecked_transaction()?;
        let history: i64 = tx.query_row(
            "SELECT COUNT(*) FROM barter_requests WHERE post_id = ?1 AND status <> ?2",
            params![post_id.to_string(), RequestStatus::Pending.as_str()],
            |row| row.get(0),
        )?;
        if history > 0 {
            return Err(StoreError::Permission(
                "post has trade history and cannot be deleted".into(),
            ));
        }

        tx.execute(
            "DELETE FROM barter_posts WHERE post_id = ?1 AND user_id = ?2",
            params![post_id.to_string(), acting_user.to_string()],
        )?;
        tx.commit()?;
        tracing::debug!(post_id = %post_id, "post deleted");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map the first twelve columns of a row (see `POST_COLUMNS`) to a [`Post`].
pub(crate) fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let latitude: Option<f64> = row.get(7)?;
    let longitude: Option<f64> = row.get(8)?;

    Ok(Post {
        post_id: rows::uuid_at(row, 0)?,
        user_id: rows::uuid_at(row, 1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        category: rows::enum_at(row, 4)?,
        price_cents: row.get(5)?,
        image_url: row.get(6)?,
        location: GeoPoint::from_parts(latitude, longitude),
        status: rows::enum_at(row, 9)?,
        deadline: rows::date_at(row, 10)?,
        created_at: rows::timestamp_at(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewRequest;
    use campuscart_shared::{Category, TradeType};
    use chrono::NaiveDate;

    fn new_post(name: &str, category: Category) -> NewPost {
        NewPost {
            name: name.into(),
            description: format!("{name} in good condition"),
            category,
            price_cents: None,
            location: None,
            image_url: None,
            deadline: NaiveDate::from_ymd_opt(2030, 5, 1).unwrap(),
        }
    }

    #[test]
    fn create_then_get() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let mut input = new_post("Bookshelf", Category::Furniture);
        input.location = Some(GeoPoint::new(40.73, -73.935).unwrap());
        input.price_cents = Some(2500);

        let created = db.create_post(owner, &input).unwrap();
        assert_eq!(created.status, PostStatus::Active);

        let fetched = db.get_post(created.post_id).unwrap();
        assert_eq!(fetched, created);
    }

    #[test]
    fn create_rejects_blank_name() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .create_post(Uuid::new_v4(), &new_post(" ", Category::Other))
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn list_excludes_owner_and_filters_category() {
        let db = Database::open_in_memory().unwrap();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let chair = db.create_post(u1, &new_post("Chair", Category::Furniture)).unwrap();
        db.create_post(u1, &new_post("Jacket", Category::Clothes)).unwrap();
        db.create_post(u2, &new_post("Sofa", Category::Furniture)).unwrap();

        let seen_by_u2 = db
            .list_posts(&PostFilter {
                exclude_owner: Some(u2),
                category: Some(Category::Furniture),
            })
            .unwrap();
        assert_eq!(seen_by_u2.len(), 1);
        assert_eq!(seen_by_u2[0].post.post_id, chair.post_id);

        let seen_by_u1 = db
            .list_posts(&PostFilter {
                exclude_owner: Some(u1),
                category: Some(Category::Furniture),
            })
            .unwrap();
        assert!(seen_by_u1.iter().all(|p| p.post.user_id != u1));
    }

    #[test]
    fn list_is_newest_first_and_active_only() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let first = db.create_post(owner, &new_post("Lamp", Category::Other)).unwrap();
        let second = db.create_post(owner, &new_post("Rug", Category::Other)).unwrap();
        let third = db.create_post(owner, &new_post("Mug", Category::Other)).unwrap();
        db.set_post_status(second.post_id, PostStatus::Inactive).unwrap();

        let ids: Vec<Uuid> = db
            .list_posts(&PostFilter::default())
            .unwrap()
            .into_iter()
            .map(|p| p.post.post_id)
            .collect();
        assert_eq!(ids, vec![third.post_id, first.post_id]);

        // The owner still sees everything on their own page.
        assert_eq!(db.list_posts_by_owner(owner).unwrap().len(), 3);
    }

    #[test]
    fn list_joins_owner_username() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        db.upsert_profile(owner, "maria").unwrap();
        db.create_post(owner, &new_post("Kettle", Category::Supplies)).unwrap();

        let posts = db.list_posts(&PostFilter::default()).unwrap();
        assert_eq!(posts[0].owner_username.as_deref(), Some("maria"));
    }

    #[test]
    fn status_is_one_way() {
        let db = Database::open_in_memory().unwrap();
        let post = db
            .create_post(Uuid::new_v4(), &new_post("Desk", Category::Furniture))
            .unwrap();

        db.set_post_status(post.post_id, PostStatus::Inactive).unwrap();
        db.set_post_status(post.post_id, PostStatus::Inactive).unwrap();
        let err = db
            .set_post_status(post.post_id, PostStatus::Active)
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[test]
    fn only_owner_deletes() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let post = db.create_post(owner, &new_post("Desk", Category::Furniture)).unwrap();

        let err = db.delete_post(post.post_id, Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, StoreError::Permission(_)));

        db.delete_post(post.post_id, owner).unwrap();
        assert!(matches!(
            db.get_post(post.post_id),
            Err(StoreError::NotFound("post"))
        ));
    }

    fn offer(db: &Database, post: &Post, from: Uuid) -> Uuid {
        db.create_request(&NewRequest {
            post_id: post.post_id,
            from_user_id: from,
            to_user_id: post.user_id,
            offer_name: "Lamp".into(),
            offer_description: String::new(),
            offer_image: None,
            trade_type: TradeType::Barter,
        })
        .unwrap()
        .id
    }

    #[test]
    fn delete_takes_pending_requests_along() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let post = db.create_post(owner, &new_post("Chair", Category::Furniture)).unwrap();
        let request_id = offer(&db, &post, Uuid::new_v4());

        db.delete_post(post.post_id, owner).unwrap();
        assert!(matches!(
            db.get_request(request_id),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn delete_refused_once_a_request_was_accepted() {
        let db = Database::open_in_memory().unwrap();
        let owner = Uuid::new_v4();
        let post = db.create_post(owner, &new_post("Chair", Category::Furniture)).unwrap();
        let accepted = offer(&db, &post, Uuid::new_v4());
        let pending = offer(&db, &post, Uuid::new_v4());
        db.accept_request(accepted).unwrap();

        let err = db.delete_post(post.post_id, owner).unwrap_err();
        assert!(matches!(err, StoreError::Permission(_)));

        // Nothing was removed, pending siblings included.
        assert_eq!(db.get_post(post.post_id).unwrap().status, PostStatus::Inactive);
        assert_eq!(db.get_request(accepted).unwrap().status, RequestStatus::Accepted);
        assert_eq!(db.get_request(pending).unwrap().status, RequestStatus::Pending);
    }
}
