#![cfg(not(tarpaulin_include))]

use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::chart::{self, ChartKind};
use crate::config;
use crate::dataset::{Caller, Dataset, Store};
use crate::error::ApiError;
use crate::graph::{self, GraphOptions};
use crate::loader;
use crate::login;
use crate::mailer::Mailer;
use crate::query::{self, QueryOptions, SortDirection};
use crate::saving;
use crate::summary::{self, SAMPLE_LIMIT};
use crate::team;

pub struct AppState {
    store: RwLock<Store>,
}

#[derive(Deserialize)]
struct RowsParams {
    page: Option<usize>,
    limit: Option<usize>,

    #[serde(rename = "sortColumn")]
    sort_column: Option<String>,

    #[serde(rename = "sortDirection")]
    sort_direction: Option<String>,

    /// JSON-encoded map column -> substring pattern
    filters: Option<String>,
}

#[derive(Deserialize)]
struct CellUpdate {
    #[serde(rename = "rowId")]
    row_id: String,
    column: String,
    value: crate::value::CellValue,
}

#[derive(Deserialize)]
struct RenameRequest {
    name: String,
}

#[derive(Deserialize)]
struct CreateTeamRequest {
    name: Option<String>,
}

#[derive(Deserialize)]
struct InviteRequest {
    email: String,
}

#[derive(Deserialize)]
struct ChartParams {
    column: String,
    kind: Option<String>,
}

#[derive(Deserialize)]
struct TokenParams {
    token: String,
}

/// Start the web application: load persisted datasets and serve the API.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    login::init_database()?;

    let store = saving::load_store(&config::data_dir())?;
    let app_state = Arc::new(AppState {
        store: RwLock::new(store),
    });

    let app = router(app_state);

    let addr = config::bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    log::info!("Listening on http://{}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/api/csv/upload", post(upload_csv))
        .route("/api/csv", get(list_datasets))
        .route(
            "/api/csv/:id",
            get(get_dataset).patch(rename_dataset).delete(delete_dataset),
        )
        .route("/api/csv/:id/share", post(share_dataset))
        .route("/api/csv/:id/rows", get(list_rows).patch(update_row))
        .route("/api/csv/:id/summary", get(summarize_dataset))
        .route("/api/csv/:id/chart", get(chart_data))
        .route("/api/csv/:id/chart.png", get(chart_png))
        .route("/api/team", get(get_team).post(create_team))
        .route("/api/team/invite", post(invite_member))
        .route("/api/team/members/:username", delete(remove_member))
        .route("/api/user/activity", get(user_activity))
        .route_layer(axum::middleware::from_fn(login::require_auth));

    let public = Router::new()
        .route("/api/auth/signup", post(login::handle_signup))
        .route("/api/auth/login", post(login::handle_login))
        .route("/api/auth/logout", post(login::handle_logout))
        .route("/api/auth/reset", post(login::handle_reset_request))
        .route("/api/auth/reset/confirm", post(login::handle_reset_confirm))
        .route("/api/invitations/validate", get(validate_invitation));

    public
        .merge(protected)
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

/// Build the explicit caller token from the authenticated username and the
/// user's team membership.
fn caller_for(username: &str) -> Result<Caller, ApiError> {
    let team_id = team::team_of(username)
        .map_err(ApiError::internal)?
        .map(|t| t.id);
    Ok(Caller::new(username, team_id))
}

fn dataset_json(dataset: &Dataset) -> serde_json::Value {
    json!({
        "id": dataset.id,
        "fileName": dataset.name,
        "originalName": dataset.name,
        "uploadedAt": dataset.created_at,
        "columnHeaders": dataset.column_names(),
        "rowCount": dataset.row_count(),
        "teamId": dataset.team_id,
        "owner": dataset.owner,
    })
}

/// The first rows of a dataset, in stored order, used as the statistics
/// sample.
fn sample_rows(dataset: &Dataset) -> Vec<crate::dataset::Row> {
    dataset.rows.iter().take(SAMPLE_LIMIT).cloned().collect()
}

async fn upload_csv(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let mut file_text: Option<String> = None;
    let mut name: Option<String> = None;

    while let Some(field) = multipart.next_field().await.unwrap_or(None) {
        match field.name().unwrap_or("unknown") {
            "file" => {
                file_text = field.text().await.ok();
            }
            "name" => {
                name = field.text().await.ok();
            }
            _ => {}
        }
    }

    let file_text = file_text.ok_or_else(|| ApiError::invalid("Missing file field"))?;
    let name = name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("Missing name field"))?;

    let parsed = loader::parse_csv(&file_text)?;
    let dataset = Dataset::new(&name, &username, parsed.columns, parsed.rows);
    let row_count = dataset.row_count();

    log::info!(
        "[CSV_UPLOAD] {} uploaded \"{}\": {} columns, {} rows",
        username,
        name,
        dataset.column_count(),
        row_count
    );

    saving::save_dataset(&dataset, &config::data_dir())?;
    let response = dataset_json(&dataset);

    login::record_activity(
        &username,
        "uploaded_csv",
        json!({ "fileName": name, "rowCount": row_count }),
    );

    // Email notification if enabled for this account
    if let Ok(users) = login::get_users() {
        if let Some(user) = users.get(&username) {
            if user.receive_import_notifications {
                match Mailer::new() {
                    Ok(mailer) => {
                        if let Err(e) = mailer.send_import_notification(&user.email, &name, row_count)
                        {
                            log::error!("[CSV_UPLOAD] Notification email failed: {}", e);
                        }
                    }
                    Err(e) => log::error!("[CSV_UPLOAD] Mailer unavailable: {}", e),
                }
            }
        }
    }

    state.store.write().unwrap().insert(dataset);

    Ok((StatusCode::CREATED, Json(response)).into_response())
}

async fn list_datasets(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_for(&username)?;
    let store = state.store.read().unwrap();
    let datasets: Vec<serde_json::Value> = store
        .list_visible(&caller)
        .into_iter()
        .map(dataset_json)
        .collect();
    Ok(Json(json!({ "files": datasets })))
}

async fn get_dataset(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_for(&username)?;
    let store = state.store.read().unwrap();
    let dataset = store.visible(&id, &caller).ok_or(ApiError::NotFound)?;
    log::info!("[CSV_FILE_GET] {} fetched file {}", username, id);
    Ok(Json(dataset_json(dataset)))
}

async fn rename_dataset(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
    Json(request): Json<RenameRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if request.name.trim().is_empty() {
        return Err(ApiError::invalid("Invalid name"));
    }

    let caller = caller_for(&username)?;
    let mut store = state.store.write().unwrap();
    let dataset = store.get(&id).ok_or(ApiError::NotFound)?;

    // The owner may rename; so may the owner of the team the file is
    // shared with.
    let team_owner_of_file = match (&dataset.team_id, team::team_of(&username).ok().flatten()) {
        (Some(file_team), Some(team)) => *file_team == team.id && team.is_owner(&username),
        _ => false,
    };
    if !dataset.owned_by(&caller) && !team_owner_of_file {
        return Err(ApiError::Forbidden);
    }

    let dataset = store.visible_mut(&id, &caller).ok_or(ApiError::NotFound)?;
    dataset.name = request.name.clone();
    saving::save_dataset(dataset, &config::data_dir())?;

    log::info!("[CSV_FILE_PATCH] {} renamed file {}", username, id);
    Ok(Json(json!({ "id": id, "name": request.name })))
}

async fn delete_dataset(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_for(&username)?;
    let mut store = state.store.write().unwrap();

    let owned = store
        .get(&id)
        .is_some_and(|dataset| dataset.owned_by(&caller));
    if !owned {
        // absent and not-owned are indistinguishable to the caller
        return Err(ApiError::NotFound);
    }

    let dataset = store.remove(&id).ok_or(ApiError::NotFound)?;
    saving::remove_dataset(&config::data_dir(), &dataset.owner, &dataset.id)?;

    login::record_activity(
        &username,
        "deleted_csv",
        json!({ "fileName": dataset.name }),
    );
    log::info!("[CSV_FILE_DELETE] {} deleted file {}", username, id);
    Ok(Json(json!({ "ok": true })))
}

async fn share_dataset(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team = team::team_of(&username)
        .map_err(ApiError::internal)?
        .filter(|t| t.is_owner(&username))
        .ok_or(ApiError::Forbidden)?;

    let caller = Caller::new(&username, Some(team.id.clone()));
    let mut store = state.store.write().unwrap();
    let dataset = store.get(&id).ok_or(ApiError::NotFound)?;
    if !dataset.owned_by(&caller) {
        return Err(ApiError::NotFound);
    }

    if dataset.team_id.as_deref() == Some(team.id.as_str()) {
        return Ok(Json(
            json!({ "message": "File is already shared with your team" }),
        ));
    }

    let dataset = store.visible_mut(&id, &caller).ok_or(ApiError::NotFound)?;
    dataset.team_id = Some(team.id.clone());
    saving::save_dataset(dataset, &config::data_dir())?;

    log::info!("[API_SHARE_CSV] {} shared file {} with team {}", username, id, team.id);
    Ok(Json(json!({ "message": "File shared with team successfully" })))
}

async fn list_rows(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
    Query(params): Query<RowsParams>,
) -> Result<Json<query::RowPage>, ApiError> {
    let caller = caller_for(&username)?;

    let filters: HashMap<String, String> = match &params.filters {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|_| ApiError::invalid("Malformed filters JSON"))?,
        None => HashMap::new(),
    };

    let options = QueryOptions {
        page: params.page.unwrap_or(1),
        page_size: params.limit.unwrap_or(10),
        sort_column: params.sort_column.clone(),
        sort_direction: params
            .sort_direction
            .as_deref()
            .map(SortDirection::parse)
            .unwrap_or_default(),
        filters,
        ..Default::default()
    };

    log::info!(
        "[CSV_ROWS_GET] file {} page {} limit {} sort {:?}",
        id,
        options.page,
        options.page_size,
        options.sort_column
    );

    let store = state.store.read().unwrap();
    let page = query::query_rows(&store, &id, &caller, &options)?;
    Ok(Json(page))
}

async fn update_row(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
    Json(update): Json<CellUpdate>,
) -> Result<Json<crate::dataset::Row>, ApiError> {
    let caller = caller_for(&username)?;
    let mut store = state.store.write().unwrap();

    let row = query::update_cell(
        &mut store,
        &id,
        &update.row_id,
        &update.column,
        update.value,
        &caller,
    )?;

    let dataset = store.get(&id).ok_or(ApiError::NotFound)?;
    saving::save_dataset(dataset, &config::data_dir())?;

    log::info!(
        "[CSV_ROWS_PATCH] {} updated row {} column {} in file {}",
        username,
        update.row_id,
        update.column,
        id
    );
    Ok(Json(row))
}

async fn summarize_dataset(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_for(&username)?;
    let store = state.store.read().unwrap();
    let dataset = store.visible(&id, &caller).ok_or(ApiError::NotFound)?;

    let sample = sample_rows(dataset);
    let stats = summary::summarize(&sample, &dataset.column_names());

    Ok(Json(json!({
        "sampleSize": sample.len(),
        "statistics": stats,
    })))
}

/// Shared flow of the chart endpoints: sample, infer, pick a kind, build.
fn chart_series(
    dataset: &Dataset,
    column: &str,
    requested: Option<ChartKind>,
) -> Result<(Vec<ChartKind>, Option<ChartKind>, Vec<chart::ChartPoint>), ApiError> {
    if !dataset.has_column(column) {
        return Err(ApiError::NotFound);
    }

    let sample = sample_rows(dataset);
    let stats = summary::summarize(&sample, &[column.to_string()])
        .remove(column)
        .ok_or(ApiError::NotFound)?;

    let available = chart::available_chart_kinds(&stats);
    let kind = chart::select_chart_kind(requested, &available);
    let points = match kind {
        Some(kind) => chart::build_chart_data(&sample, column, &stats, kind),
        None => Vec::new(),
    };
    Ok((available, kind, points))
}

async fn chart_data(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let caller = caller_for(&username)?;
    let store = state.store.read().unwrap();
    let dataset = store.visible(&id, &caller).ok_or(ApiError::NotFound)?;

    let requested = params.kind.as_deref().and_then(ChartKind::parse);
    let (available, kind, points) = chart_series(dataset, &params.column, requested)?;

    Ok(Json(json!({
        "column": params.column,
        "availableKinds": available,
        "kind": kind,
        "points": points,
    })))
}

async fn chart_png(
    State(state): State<Arc<AppState>>,
    Extension(username): Extension<String>,
    Path(id): Path<String>,
    Query(params): Query<ChartParams>,
) -> Result<Response, ApiError> {
    let caller = caller_for(&username)?;
    let store = state.store.read().unwrap();
    let dataset = store.visible(&id, &caller).ok_or(ApiError::NotFound)?;

    let requested = params.kind.as_deref().and_then(ChartKind::parse);
    let (_, kind, points) = chart_series(dataset, &params.column, requested)?;

    let Some(kind) = kind.filter(|_| !points.is_empty()) else {
        return Err(ApiError::NotFound);
    };

    let options = GraphOptions {
        title: format!("{} - {}", dataset.name, params.column),
        x_label: params.column.clone(),
        y_label: "Count".to_string(),
        ..Default::default()
    };
    let png_data =
        graph::render_chart(&points, kind, &options).map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "image/png")
        .body(axum::body::Body::from(png_data))
        .unwrap())
}

async fn get_team(
    Extension(username): Extension<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let team = team::team_of(&username).map_err(ApiError::internal)?;
    Ok(Json(json!({ "team": team })))
}

async fn create_team(
    Extension(username): Extension<String>,
    Json(request): Json<CreateTeamRequest>,
) -> Result<Response, ApiError> {
    match team::create_team(&username, request.name) {
        Ok(team) => Ok((StatusCode::CREATED, Json(json!({ "team": team }))).into_response()),
        Err(e) => Err(ApiError::invalid(e)),
    }
}

async fn invite_member(
    Extension(username): Extension<String>,
    Json(request): Json<InviteRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match team::invite(&username, &request.email) {
        Ok(_) => Ok(Json(
            json!({ "message": "Invitation sent successfully", "success": true }),
        )),
        Err(e) => {
            log::error!("[INVITE] {}", e);
            Err(ApiError::invalid(e))
        }
    }
}

async fn remove_member(
    Extension(username): Extension<String>,
    Path(member): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match team::remove_member(&username, &member) {
        Ok(team) => Ok(Json(json!({ "team": team }))),
        Err(e) => Err(ApiError::invalid(e)),
    }
}

async fn user_activity(
    Extension(username): Extension<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let entries = login::recent_activity(&username);
    Ok(Json(json!({ "activity": entries })))
}

async fn validate_invitation(
    Query(params): Query<TokenParams>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let invitation = team::validate_invitation(&params.token).map_err(ApiError::internal)?;
    match invitation {
        Some(invitation) => Ok(Json(json!({
            "valid": true,
            "email": invitation.email,
            "teamId": invitation.team_id,
        }))),
        None => Ok(Json(json!({ "valid": false }))),
    }
}
