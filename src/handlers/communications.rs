// handlers/communications.rs - /api/v1/communications messages and inbox

use axum::extract::{Path, Query};
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::database::models::message::Message;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, TrustDb};
use crate::services::communication_service::{CommunicationService, Inbox, InboxQuery, SendMessageRequest, SentMessage};
use crate::validation::ValidJson;

#[derive(Debug, Default, Deserialize)]
pub struct SentQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MarkedRead {
    pub message_id: i64,
    pub read: bool,
}

/// POST /api/v1/communications/messages - send to a resolved audience
pub async fn send_message(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    ValidJson(request): ValidJson<SendMessageRequest>,
) -> ApiResult<SentMessage> {
    let sent = CommunicationService::new(&pool).send(request, user.id()).await?;
    Ok(ApiResponse::created(sent))
}

/// GET /api/v1/communications/messages - messages the caller sent
pub async fn sent_messages(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<SentQuery>,
) -> ApiResult<Vec<Message>> {
    let messages = CommunicationService::new(&pool).sent(user.id(), query.page, query.limit).await?;
    Ok(ApiResponse::success(messages))
}

/// GET /api/v1/communications/inbox?unread_only=&page=&limit=
pub async fn inbox(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Query(query): Query<InboxQuery>,
) -> ApiResult<Inbox> {
    Ok(ApiResponse::success(CommunicationService::new(&pool).inbox(user.id(), query).await?))
}

/// POST /api/v1/communications/inbox/:id/read
pub async fn mark_read(
    Extension(TrustDb(pool)): Extension<TrustDb>,
    Extension(user): Extension<AuthUser>,
    Path(message_id): Path<i64>,
) -> ApiResult<MarkedRead> {
    CommunicationService::new(&pool).mark_read(message_id, user.id()).await?;
    Ok(ApiResponse::success(MarkedRead { message_id, read: true }))
}
