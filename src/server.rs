use crate::config::ServerConfig;
use crate::data::{Classroom, Placement, Section, Subject, Teacher, WeeklyRequest};
use crate::error::{SchedulingError, StoreError};
use crate::grid::SlotGrid;
use crate::report::ScheduleStatistics;
use crate::service::{GenerationResult, SchedulingService};
use crate::store::{CatalogStore, MemoryStore, PlacementStore};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub service: Arc<SchedulingService>,
    /// Held for the whole of a generation run so runs never interleave their commits.
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(store: Arc<MemoryStore>, grid: SlotGrid) -> Self {
        let service = SchedulingService::new(store.clone(), grid);
        Self {
            store,
            service: Arc::new(service),
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::Internal(msg) => {
                error!("Request failed: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg)
            }
        };
        (status, Json(ErrorBody { code, message })).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<SchedulingError> for ApiError {
    fn from(err: SchedulingError) -> Self {
        match err {
            SchedulingError::InvalidDateRange { .. } => ApiError::BadRequest(err.to_string()),
            SchedulingError::Store(e) => e.into(),
            SchedulingError::Config(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError::Internal(format!("scheduling task failed: {err}"))
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQuery {
    week_start: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WeekQuery {
    week_start: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RangeQuery {
    start_date: NaiveDate,
    end_date: NaiveDate,
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn generate_optimized_handler(
    State(state): State<AppState>,
    Query(query): Query<GenerateQuery>,
) -> ApiResult<GenerationResult> {
    let _run = state.run_lock.lock().await;
    let service = state.service.clone();
    let result = tokio::task::spawn_blocking(move || match query.week_start {
        Some(week_start) => service.generate_optimized_schedule_for_week(week_start),
        None => service.generate_optimized_schedule(),
    })
    .await?;
    Ok(Json(result))
}

async fn generate_weekly_handler(
    State(state): State<AppState>,
    Query(query): Query<WeekQuery>,
    Json(requests): Json<Vec<WeeklyRequest>>,
) -> ApiResult<Vec<Placement>> {
    let _run = state.run_lock.lock().await;
    let service = state.service.clone();
    let placed = tokio::task::spawn_blocking(move || {
        service.generate_weekly_schedule(&requests, query.week_start)
    })
    .await??;
    Ok(Json(placed))
}

async fn statistics_handler(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<ScheduleStatistics> {
    Ok(Json(
        state
            .service
            .schedule_statistics(range.start_date, range.end_date)?,
    ))
}

async fn placements_handler(State(state): State<AppState>) -> ApiResult<Vec<Placement>> {
    Ok(Json(state.store.placements()?))
}

async fn placements_on_handler(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> ApiResult<Vec<Placement>> {
    Ok(Json(state.store.placements_on(date)?))
}

async fn placements_between_handler(
    State(state): State<AppState>,
    Query(range): Query<RangeQuery>,
) -> ApiResult<Vec<Placement>> {
    if range.start_date > range.end_date {
        return Err(SchedulingError::InvalidDateRange {
            start: range.start_date,
            end: range.end_date,
        }
        .into());
    }
    Ok(Json(
        state
            .store
            .placements_between(range.start_date, range.end_date)?,
    ))
}

async fn list_teachers(State(state): State<AppState>) -> ApiResult<Vec<Teacher>> {
    Ok(Json(state.store.teachers()?))
}

async fn upsert_teacher(
    State(state): State<AppState>,
    Json(teacher): Json<Teacher>,
) -> (StatusCode, Json<Teacher>) {
    state.store.upsert_teacher(teacher.clone());
    (StatusCode::CREATED, Json(teacher))
}

async fn list_classrooms(State(state): State<AppState>) -> ApiResult<Vec<Classroom>> {
    Ok(Json(state.store.classrooms()?))
}

async fn upsert_classroom(
    State(state): State<AppState>,
    Json(classroom): Json<Classroom>,
) -> (StatusCode, Json<Classroom>) {
    state.store.upsert_classroom(classroom.clone());
    (StatusCode::CREATED, Json(classroom))
}

async fn list_sections(State(state): State<AppState>) -> ApiResult<Vec<Section>> {
    Ok(Json(state.store.sections()?))
}

async fn upsert_section(
    State(state): State<AppState>,
    Json(section): Json<Section>,
) -> (StatusCode, Json<Section>) {
    state.store.upsert_section(section.clone());
    (StatusCode::CREATED, Json(section))
}

async fn list_subjects(State(state): State<AppState>) -> ApiResult<Vec<Subject>> {
    Ok(Json(state.store.subjects()?))
}

async fn upsert_subject(
    State(state): State<AppState>,
    Json(subject): Json<Subject>,
) -> (StatusCode, Json<Subject>) {
    state.store.upsert_subject(subject.clone());
    (StatusCode::CREATED, Json(subject))
}

pub fn build_router(state: AppState) -> Router {
    let api_v1 = Router::new()
        .route("/schedules", get(placements_handler))
        .route(
            "/schedules/generate-optimized",
            post(generate_optimized_handler),
        )
        .route("/schedules/generate-weekly", post(generate_weekly_handler))
        .route("/schedules/statistics", get(statistics_handler))
        .route("/schedules/date/:date", get(placements_on_handler))
        .route("/schedules/week", get(placements_between_handler))
        .route("/teachers", get(list_teachers).post(upsert_teacher))
        .route("/classrooms", get(list_classrooms).post(upsert_classroom))
        .route("/sections", get(list_sections).post(upsert_section))
        .route("/subjects", get(list_subjects).post(upsert_subject));

    Router::new()
        .route("/health", get(health_handler))
        .nest("/v1", api_v1)
        .with_state(state)
}

pub async fn run_server(config: &ServerConfig, state: AppState) -> std::io::Result<()> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind((config.host.as_str(), config.port)).await?;

    info!("Server running at http://{}", listener.local_addr()?);

    axum::serve(listener, app).await
}
