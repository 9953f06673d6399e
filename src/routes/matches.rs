use actix_web::{http::StatusCode, web, HttpResponse, Responder};
use validator::Validate;
use crate::engine::{RankedQueryService, RecomputeTrigger};
use crate::error::EngineError;
use crate::models::{
    ChangeEvent, ErrorResponse, EventAcceptedResponse, FounderMatchesResponse, HealthResponse,
    ListMatchesQuery, RecomputeRequest, TalentMatchesResponse, ViewerRole,
};
use crate::routes::viewer::{ensure_founder_access, ensure_service, ensure_talent_access, AuthenticatedViewer};
use crate::services::{MatchStore, ProfileRepository};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Bounds for the `limit` query parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListLimits {
    pub default_limit: u16,
    pub max_limit: u16,
}

impl Default for ListLimits {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub trigger: Arc<RecomputeTrigger>,
    pub ranking: Arc<RankedQueryService>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub store: Arc<dyn MatchStore>,
    pub events: mpsc::Sender<ChangeEvent>,
    pub limits: ListLimits,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/matches/recompute", web::post().to(recompute))
        .route("/matches/refresh", web::post().to(refresh))
        .route("/matches/events", web::post().to(submit_event))
        .route("/matches/talent/{talent_id}", web::get().to(list_for_talent))
        .route("/matches/founder/{founder_id}", web::get().to(list_for_founder));
}

/// Map an engine error onto its HTTP response
fn error_response(err: EngineError) -> HttpResponse {
    let status = match &err {
        EngineError::Input(_) => StatusCode::BAD_REQUEST,
        EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
        EngineError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        EngineError::Conflict { .. } => StatusCode::CONFLICT,
        EngineError::PartialBatchFailure(report) => {
            tracing::warn!("Recompute finished with failures: {}", err);
            return HttpResponse::build(StatusCode::MULTI_STATUS).json(report);
        }
        EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("Request failed: {}", err);
    } else {
        tracing::info!("Request rejected: {}", err);
    }

    HttpResponse::build(status).json(ErrorResponse {
        error: err.kind().to_string(),
        message: err.to_string(),
        status_code: status.as_u16(),
        retryable: err.is_retryable(),
    })
}

fn validation_response(errors: validator::ValidationErrors) -> HttpResponse {
    tracing::info!("Validation failed: {}", errors);
    HttpResponse::BadRequest().json(ErrorResponse {
        error: "validation_failed".to_string(),
        message: errors.to_string(),
        status_code: 400,
        retryable: false,
    })
}

/// Resolve `limit`, rejecting anything outside `1..=max_limit`
fn resolve_limit(query: &ListMatchesQuery, limits: ListLimits) -> Result<usize, HttpResponse> {
    query.validate().map_err(validation_response)?;
    let limit = query.limit.unwrap_or(limits.default_limit);
    if limit > limits.max_limit {
        return Err(error_response(EngineError::Input(format!(
            "limit must be between 1 and {}",
            limits.max_limit
        ))));
    }
    Ok(limit as usize)
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let store_healthy = state.store.health_check().await.unwrap_or(false);

    let status = if store_healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Recompute an explicit set of pairs
///
/// POST /api/v1/matches/recompute
///
/// Request body:
/// ```json
/// {
///   "talentIds": ["string"],
///   "startupIds": ["string"]
/// }
/// ```
///
/// Founders may only name their own startups.
async fn recompute(
    state: web::Data<AppState>,
    viewer: AuthenticatedViewer,
    req: web::Json<RecomputeRequest>,
) -> impl Responder {
    if let Err(errors) = req.validate() {
        return validation_response(errors);
    }
    let viewer = viewer.0;

    match viewer.role {
        ViewerRole::Service => {}
        ViewerRole::Founder => {
            let startups = match state.profiles.get_startups(&req.startup_ids).await {
                Ok(startups) => startups,
                Err(e) => return error_response(e.into()),
            };
            if let Some(foreign) = startups.iter().find(|s| s.founder_id != viewer.viewer_id) {
                return error_response(EngineError::Forbidden(format!(
                    "startup {} belongs to another founder",
                    foreign.startup_id
                )));
            }
        }
        ViewerRole::Talent => {
            return error_response(EngineError::Forbidden(
                "talent viewers may only refresh their own matches".to_string(),
            ));
        }
    }

    tracing::info!(
        "Recompute requested by {} for {} talents x {} startups",
        viewer.viewer_id,
        req.talent_ids.len(),
        req.startup_ids.len()
    );

    match state.trigger.recompute(&req.talent_ids, &req.startup_ids).await {
        Ok(report) => HttpResponse::Ok().json(report),
        Err(e) => error_response(e),
    }
}

/// Refresh the caller's own matches
///
/// POST /api/v1/matches/refresh
async fn refresh(state: web::Data<AppState>, viewer: AuthenticatedViewer) -> impl Responder {
    let viewer = viewer.0;

    let result = match viewer.role {
        ViewerRole::Talent => state.trigger.refresh_talent(&viewer.viewer_id).await,
        ViewerRole::Founder => state.trigger.recompute_for_founder(&viewer.viewer_id).await,
        ViewerRole::Service => Err(EngineError::Forbidden(
            "refresh requires a talent or founder viewer".to_string(),
        )),
    };

    match result {
        Ok(report) => {
            tracing::info!("Refreshed {} pairs for {}", report.outcomes.len(), viewer.viewer_id);
            HttpResponse::Ok().json(report)
        }
        Err(e) => error_response(e),
    }
}

/// Accept a change-feed event for asynchronous processing
///
/// POST /api/v1/matches/events
///
/// Request body:
/// ```json
/// {
///   "entityType": "talent|startup",
///   "id": "string",
///   "changedFields": ["string"]
/// }
/// ```
async fn submit_event(
    state: web::Data<AppState>,
    viewer: AuthenticatedViewer,
    event: web::Json<ChangeEvent>,
) -> impl Responder {
    if let Err(e) = ensure_service(&viewer.0) {
        return error_response(e);
    }
    if event.id.trim().is_empty() {
        return error_response(EngineError::Input("change event without id".to_string()));
    }

    match state.events.try_send(event.into_inner()) {
        Ok(()) => HttpResponse::Accepted().json(EventAcceptedResponse { accepted: true }),
        Err(TrySendError::Full(event)) => {
            tracing::warn!("Change queue full, rejecting {:?} {}", event.entity_type, event.id);
            error_response(EngineError::StoreUnavailable("change queue is full".to_string()))
        }
        Err(TrySendError::Closed(_)) => {
            error_response(EngineError::StoreUnavailable("change listener is not running".to_string()))
        }
    }
}

/// Ranked startups for a talent
///
/// GET /api/v1/matches/talent/{talentId}?limit=20
async fn list_for_talent(
    state: web::Data<AppState>,
    viewer: AuthenticatedViewer,
    path: web::Path<String>,
    query: web::Query<ListMatchesQuery>,
) -> impl Responder {
    let talent_id = path.into_inner();
    if let Err(e) = ensure_talent_access(&viewer.0, &talent_id) {
        return error_response(e);
    }
    let limit = match resolve_limit(&query, state.limits) {
        Ok(limit) => limit,
        Err(response) => return response,
    };

    match state.ranking.list_matches_for_talent(&talent_id, limit).await {
        Ok(matches) => HttpResponse::Ok().json(TalentMatchesResponse {
            talent_id,
            count: matches.len(),
            matches,
        }),
        Err(e) => error_response(e),
    }
}

/// Ranked talent for a founder, grouped by startup
///
/// GET /api/v1/matches/founder/{founderId}?limit=20
async fn list_for_founder(
    state: web::Data<AppState>,
    viewer: AuthenticatedViewer,
    path: web::Path<String>,
    query: web::Query<ListMatchesQuery>,
) -> impl Responder {
    let founder_id = path.into_inner();
    if let Err(e) = ensure_founder_access(&viewer.0, &founder_id) {
        return error_response(e);
    }
    let limit = match resolve_limit(&query, state.limits) {
        Ok(limit) => limit,
        Err(response) => return response,
    };

    match state.ranking.list_matches_for_founder(&founder_id, limit).await {
        Ok(groups) => HttpResponse::Ok().json(FounderMatchesResponse {
            founder_id,
            count: groups.iter().map(|g| g.matches.len()).sum(),
            groups,
        }),
        Err(e) => error_response(e),
    }
}
