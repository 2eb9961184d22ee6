//! API route handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::betting::price_signal;
use crate::config::AppConfig;
use crate::error::EngineError;
use crate::feed::{FeedClient, MatchResult};
use crate::outcome_bins::BinFilter;
use crate::sgm::{self, SgmError, SgmQuery};
use crate::storage::MatchRepository;
use crate::try_rate::RatePolicy;
use crate::types::{
    DistributionQuery, ErrorResponse, HealthResponse, JointProbabilityRequest,
    JointProbabilityResponse, OutcomeBinsResponse, ResultsQuery, ScoringDistributionResponse,
    SgmRequest, SgmResponse,
};

/// Application state shared across handlers.
pub struct AppState {
    pub repo: Mutex<MatchRepository>,
    pub config: AppConfig,
    pub feed: FeedClient,
}

impl AppState {
    fn repo(&self) -> Result<MutexGuard<'_, MatchRepository>, ApiError> {
        self.repo
            .lock()
            .map_err(|_| ApiError::internal("Repository lock poisoned"))
    }

    fn policy(&self) -> RatePolicy {
        RatePolicy::from(&self.config.engine)
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::InvalidInput(msg) => Self::bad_request(msg),
            EngineError::NotFound(msg) => Self::not_found(msg),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Request failed: {:#}", err);
        Self::internal(format!("{:#}", err))
    }
}

impl From<SgmError> for ApiError {
    fn from(err: SgmError) -> Self {
        match err {
            SgmError::Engine(e) => e.into(),
            SgmError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Scoring distribution for one team's named players.
pub async fn scoring_distribution(
    State(state): State<Arc<AppState>>,
    Path((match_id, team_id)): Path<(i64, i64)>,
    Query(query): Query<DistributionQuery>,
) -> Result<Json<ScoringDistributionResponse>, ApiError> {
    let probabilities = {
        let repo = state.repo()?;
        sgm::team_scoring_distribution(
            &*repo,
            match_id,
            team_id,
            &state.config.stats.seasons,
            query.position.as_deref(),
            &state.policy(),
        )?
    };

    Ok(Json(ScoringDistributionResponse {
        match_id,
        team_id,
        probabilities,
    }))
}

/// Joint minimum-tries probability endpoint.
pub async fn joint_probability(
    State(state): State<Arc<AppState>>,
    Json(req): Json<JointProbabilityRequest>,
) -> Result<Json<JointProbabilityResponse>, ApiError> {
    let probability = sgm::joint_probability(&req.try_dist, &req.player_probs, &req.min_tries)?;

    let pricing = req
        .offered_odds
        .map(|odds| price_signal(probability, Some(odds), &state.config.betting));

    Ok(Json(JointProbabilityResponse {
        probability,
        pricing,
    }))
}

/// Outcome bin aggregation endpoint.
pub async fn outcome_bins(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    Query(filter): Query<BinFilter>,
) -> Result<Json<OutcomeBinsResponse>, ApiError> {
    let outcome = {
        let repo = state.repo()?;
        sgm::aggregate_outcome_bins(&*repo, match_id, &filter)?
    };

    Ok(Json(OutcomeBinsResponse { match_id, outcome }))
}

/// Same-game multi pricing endpoint.
pub async fn price_sgm(
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<i64>,
    Json(req): Json<SgmRequest>,
) -> Result<Json<SgmResponse>, ApiError> {
    let query = SgmQuery {
        team_id: req.team_id,
        legs: req.legs.clone(),
        filter: req.filter(),
        position: req.position.clone(),
    };

    let price = {
        let repo = state.repo()?;
        sgm::price_sgm(
            &*repo,
            match_id,
            &query,
            &state.config.stats.seasons,
            &state.policy(),
        )?
    };
    let pricing = price_signal(price.probability, req.offered_odds, &state.config.betting);

    Ok(Json(SgmResponse { price, pricing }))
}

/// Completed results from the live fixture feed.
pub async fn latest_results(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ResultsQuery>,
) -> Result<Json<Vec<MatchResult>>, ApiError> {
    let results = state.feed.latest_results(query.season, query.round).await?;
    Ok(Json(results))
}
