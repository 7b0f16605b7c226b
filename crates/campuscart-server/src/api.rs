use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, Method, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{delete, get, post, put},
    Json, Router,
};
use campuscart_shared::{Bucket, Category, Direction, GeoPoint, ImageResolver, MarketError, RequestStatus};
use campuscart_store::{Message, NewPost, Profile};
use futures::stream::{self, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

use crate::auth::{ActingUser, USER_ID_HEADER};
use crate::chat::ChatHub;
use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::lifecycle::{CreateRequest, RequestLifecycle, RequestView};
use crate::listings::{ListingQuery, ListingService, ListingView};
use crate::media_store::{content_type_for, MediaStore};
use crate::payments::PaymentClient;
use crate::SharedDb;

/// Headroom on top of the image cap for multipart framing.
const MULTIPART_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub listings: ListingService,
    pub lifecycle: RequestLifecycle,
    pub chat: ChatHub,
    pub media: Arc<MediaStore>,
    pub payments: PaymentClient,
    pub images: ImageResolver,
}

impl AppState {
    pub fn new(db: SharedDb, media: Arc<MediaStore>, config: &ServerConfig) -> anyhow::Result<Self> {
        let images = ImageResolver::new(config.public_base_url.clone());
        Ok(Self {
            listings: ListingService::new(db.clone(), images.clone(), config.nearby_radius_miles),
            lifecycle: RequestLifecycle::new(db.clone(), images.clone()),
            chat: ChatHub::new(db.clone()),
            payments: PaymentClient::new(config)?,
            db,
            media,
            images,
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let body_limit = state.media.max_size() + MULTIPART_OVERHEAD;

    Router::new()
        .route("/health", get(health_check))
        .route("/profile", put(upsert_profile))
        .route("/posts", get(list_posts).post(create_post))
        .route("/posts/mine", get(my_posts))
        .route("/posts/{id}", get(post_detail).delete(delete_post))
        .route("/media/{bucket}", post(media_upload))
        .route("/media/{bucket}/{key}", get(media_download))
        .route("/requests", post(create_request))
        .route("/requests/incoming", get(incoming_requests))
        .route("/requests/outgoing", get(outgoing_requests))
        .route("/requests/{id}", delete(cancel_request))
        .route("/requests/{id}/accept", post(accept_request))
        .route("/requests/{id}/reject", post(reject_request))
        .route("/requests/{id}/complete", post(confirm_completion))
        .route("/requests/{id}/messages", get(message_history).post(send_message))
        .route("/requests/{id}/messages/stream", get(message_stream))
        .route("/trades", get(list_trades))
        .route("/payments/session", post(create_payment_session))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Deserialize)]
struct ProfileBody {
    username: String,
}

/// `GET /posts` query string. `category` also accepts the `all` and
/// `nearby` sentinels; `nearby` requires `lat` and `lon`.
#[derive(Debug, Default, Deserialize)]
struct ListingParams {
    category: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    radius: Option<f64>,
}

#[derive(Serialize)]
struct UploadResponse {
    bucket: Bucket,
    key: String,
    url: String,
}

#[derive(Deserialize)]
struct TradesParams {
    status: Option<RequestStatus>,
}

#[derive(Deserialize)]
struct MessageBody {
    content: String,
}

#[derive(Deserialize)]
struct PaymentSessionBody {
    post_id: Uuid,
}

#[derive(Serialize)]
struct PaymentSessionResponse {
    id: String,
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ─── Profiles ───

async fn upsert_profile(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(body): Json<ProfileBody>,
) -> Result<Json<Profile>, ServerError> {
    let profile = state.db.lock().await.upsert_profile(user, &body.username)?;
    Ok(Json(profile))
}

// ─── Posts ───

fn listing_query(viewer: Uuid, params: ListingParams) -> Result<ListingQuery, MarketError> {
    let (category, nearby) = match params.category.as_deref().map(str::trim) {
        None | Some("") | Some("all") => (None, false),
        Some("nearby") => (None, true),
        Some(other) => (Some(other.parse::<Category>()?), false),
    };

    let near = match (params.lat, params.lon) {
        (Some(lat), Some(lon)) => Some(GeoPoint::new(lat, lon)?),
        (None, None) => None,
        _ => return Err(MarketError::validation("lat and lon must be given together")),
    };
    if nearby && near.is_none() {
        return Err(MarketError::validation("nearby listing requires lat and lon"));
    }

    Ok(ListingQuery {
        viewer,
        category,
        near,
        radius_miles: params.radius,
    })
}

async fn list_posts(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Query(params): Query<ListingParams>,
) -> Result<Json<Vec<ListingView>>, ServerError> {
    let query = listing_query(user, params)?;
    Ok(Json(state.listings.query(&query).await?))
}

async fn create_post(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(new_post): Json<NewPost>,
) -> Result<(StatusCode, Json<ListingView>), ServerError> {
    let listing = state.listings.create_post(user, &new_post).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

async fn my_posts(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> Result<Json<Vec<ListingView>>, ServerError> {
    Ok(Json(state.listings.my_posts(user).await?))
}

async fn post_detail(
    State(state): State<AppState>,
    ActingUser(_): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ListingView>, ServerError> {
    Ok(Json(state.listings.post_detail(id).await?))
}

async fn delete_post(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.listings.delete_post(id, user).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Media ───

async fn media_upload(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(bucket): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ServerError> {
    let bucket: Bucket = bucket.parse()?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let extension = field
            .file_name()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read field: {}", e)))?;

        let key = state
            .media
            .upload(bucket, &data, extension.as_deref())
            .await?;

        info!(%bucket, key = %key, size = data.len(), uploader = %user, "Image uploaded");

        return Ok(Json(UploadResponse {
            bucket,
            url: state.images.public_url(bucket, &key),
            key,
        }));
    }

    Err(ServerError::BadRequest(
        "Missing 'file' field in multipart form".to_string(),
    ))
}

async fn media_download(
    State(state): State<AppState>,
    Path((bucket, key)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let bucket: Bucket = bucket.parse()?;
    let data = state.media.read(bucket, &key).await?;
    Ok(([(header::CONTENT_TYPE, content_type_for(&key))], data).into_response())
}

// ─── Requests ───

async fn create_request(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(body): Json<CreateRequest>,
) -> Result<(StatusCode, Json<RequestView>), ServerError> {
    let view = state.lifecycle.create_request(user, body).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

async fn incoming_requests(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> Result<Json<Vec<RequestView>>, ServerError> {
    Ok(Json(
        state.lifecycle.fetch_requests(user, Direction::Incoming).await?,
    ))
}

async fn outgoing_requests(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
) -> Result<Json<Vec<RequestView>>, ServerError> {
    Ok(Json(
        state.lifecycle.fetch_requests(user, Direction::Outgoing).await?,
    ))
}

async fn cancel_request(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServerError> {
    state.lifecycle.cancel(user, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn accept_request(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    Ok(Json(state.lifecycle.accept(user, id).await?))
}

async fn reject_request(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    Ok(Json(state.lifecycle.reject(user, id).await?))
}

async fn confirm_completion(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<RequestView>, ServerError> {
    Ok(Json(state.lifecycle.confirm_completion(user, id).await?))
}

/// `GET /trades?status=accepted|completed|...`, ongoing trades by default.
async fn list_trades(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Query(params): Query<TradesParams>,
) -> Result<Json<Vec<RequestView>>, ServerError> {
    let status = params.status.unwrap_or(RequestStatus::Accepted);
    Ok(Json(state.lifecycle.list_trades(user, status).await?))
}

// ─── Chat ───

async fn message_history(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ServerError> {
    Ok(Json(state.chat.load_history(id, user).await?))
}

async fn send_message(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
    Json(body): Json<MessageBody>,
) -> Result<(StatusCode, Json<Message>), ServerError> {
    let message = state.chat.send_message(id, user, &body.content).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// History first, then live messages, as `message` events.
async fn message_stream(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Path(id): Path<Uuid>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ServerError> {
    let (history, subscription) = state.chat.open(id, user).await?;

    let backlog = stream::iter(history).map(message_event);
    let live = stream::unfold(subscription, |mut subscription| async move {
        let message = subscription.next().await?;
        Some((message_event(message), subscription))
    });

    Ok(Sse::new(backlog.chain(live)).keep_alive(KeepAlive::default()))
}

fn message_event(message: Message) -> Result<Event, axum::Error> {
    Event::default()
        .event("message")
        .id(message.id.to_string())
        .json_data(&message)
}

// ─── Payments ───

/// Price a listing server-side and open a checkout session for it.
async fn create_payment_session(
    State(state): State<AppState>,
    ActingUser(user): ActingUser,
    Json(body): Json<PaymentSessionBody>,
) -> Result<Json<PaymentSessionResponse>, ServerError> {
    let listing = state.listings.post_detail(body.post_id).await?;
    let Some(amount) = listing.post.price_cents else {
        return Err(MarketError::validation("this post is not for sale").into());
    };
    if listing.post.user_id == user {
        return Err(MarketError::validation("cannot buy your own post").into());
    }

    let id = state
        .payments
        .create_payment_session(amount, &listing.post.name)
        .await?;
    Ok(Json(PaymentSessionResponse { id }))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, header = USER_ID_HEADER, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
