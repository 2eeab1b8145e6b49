//! HTTP endpoint handlers

use std::{convert::Infallible, sync::Arc};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode, Uri},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Json, Response,
    },
};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::{
    state::{AppState, Command, CommandOutcome, RoutineId, RoutineListView, UiEvent},
    worker::cache::normalize_path,
};
use super::{
    responses::{
        AddRoutineRequest, ApiResponse, ClickResponse, HealthResponse, NotificationClickRequest,
        NotificationCloseRequest, PermissionResponse, RoutinesResponse, StatusResponse,
    },
    ApiContext,
};

type CommandResult = Result<Json<ApiResponse>, (StatusCode, Json<ApiResponse>)>;

fn current_view(state: &AppState) -> RoutineListView {
    state.view().unwrap_or_else(|e| {
        error!("Failed to render routines: {}", e);
        RoutineListView::render(&[])
    })
}

fn describe(outcome: &CommandOutcome) -> String {
    match outcome {
        CommandOutcome::Added { routine } => format!("Added routine {}", routine.name),
        CommandOutcome::Started { id } => format!("Routine {} started", id),
        CommandOutcome::Stopped { id } => format!("Routine {} stopped", id),
        CommandOutcome::Deleted { id } => format!("Routine {} deleted", id),
        CommandOutcome::StoppedAll { ids } => format!("Stopped {} routines", ids.len()),
        CommandOutcome::Permission { status } => status.message.clone(),
        CommandOutcome::Unchanged => "Nothing to do".to_string(),
    }
}

/// Run a command and wrap the outcome with the current view
fn run_command(state: &Arc<AppState>, command: Command) -> CommandResult {
    let label = command.label();

    match state.handle(command) {
        Ok(outcome) => {
            let message = describe(&outcome);
            let view = current_view(state);
            if outcome.changed() {
                info!("{} command applied: {}", label, message);
                Ok(Json(ApiResponse::applied(message, outcome, view)))
            } else {
                debug!("{} command changed nothing", label);
                Ok(Json(ApiResponse::unchanged(message, view)))
            }
        }
        Err(e) if e.is_validation() => {
            warn!("Rejected {} command: {}", label, e);
            Err((
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ApiResponse::error(e.to_string(), current_view(state))),
            ))
        }
        Err(e) => {
            error!("Failed to run {} command: {}", label, e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiResponse::error(e.to_string(), current_view(state))),
            ))
        }
    }
}

/// Handle GET /routines - Return the routine collection
pub async fn list_routines_handler(State(ctx): State<Arc<ApiContext>>) -> Result<Json<RoutinesResponse>, StatusCode> {
    match ctx.state.routines() {
        Ok(routines) => Ok(Json(RoutinesResponse { routines })),
        Err(e) => {
            error!("Failed to list routines: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /routines - Add a routine
pub async fn add_routine_handler(
    State(ctx): State<Arc<ApiContext>>,
    Json(request): Json<AddRoutineRequest>,
) -> CommandResult {
    run_command(&ctx.state, Command::Add {
        name: request.name,
        duration: request.duration,
    })
}

/// Handle POST /routines/:id/start - Start a countdown
pub async fn start_routine_handler(State(ctx): State<Arc<ApiContext>>, Path(id): Path<RoutineId>) -> CommandResult {
    run_command(&ctx.state, Command::Start { id })
}

/// Handle POST /routines/:id/stop - Stop a countdown
pub async fn stop_routine_handler(State(ctx): State<Arc<ApiContext>>, Path(id): Path<RoutineId>) -> CommandResult {
    run_command(&ctx.state, Command::Stop { id })
}

/// Handle DELETE /routines/:id - Delete a routine
pub async fn delete_routine_handler(State(ctx): State<Arc<ApiContext>>, Path(id): Path<RoutineId>) -> CommandResult {
    run_command(&ctx.state, Command::Delete { id })
}

/// Handle POST /routines/stop-all - Stop every countdown
pub async fn stop_all_handler(State(ctx): State<Arc<ApiContext>>) -> CommandResult {
    run_command(&ctx.state, Command::StopAll)
}

/// Handle GET /view - Current render model
pub async fn view_handler(State(ctx): State<Arc<ApiContext>>) -> Result<Json<RoutineListView>, StatusCode> {
    ctx.state.view().map(Json).map_err(|e| {
        error!("Failed to render routines: {}", e);
        StatusCode::INTERNAL_SERVER_ERROR
    })
}

/// Handle GET /events - Stream UI events; opens with a full render and the
/// permission status
pub async fn events_handler(
    State(ctx): State<Arc<ApiContext>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let live = BroadcastStream::new(ctx.state.events.subscribe());
    info!("Page connected to the event stream");

    let initial = vec![
        UiEvent::Render { view: current_view(&ctx.state) },
        UiEvent::PermissionStatus { status: ctx.state.permission_status() },
    ];

    let live = live.filter_map(|message| match message {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Page fell behind the event stream: {}", e);
            None
        }
    });

    let stream = tokio_stream::iter(initial)
        .chain(live)
        .filter_map(|event| match Event::default().event(event.name()).json_data(&event) {
            Ok(sse) => Some(Ok(sse)),
            Err(e) => {
                error!("Failed to encode {} event: {}", event.name(), e);
                None
            }
        });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Handle GET /notifications/permission - Current permission status
pub async fn permission_status_handler(State(ctx): State<Arc<ApiContext>>) -> Json<PermissionResponse> {
    Json(PermissionResponse {
        status: ctx.state.permission_status(),
    })
}

/// Handle POST /notifications/permission - Ask the platform for permission
pub async fn request_permission_handler(
    State(ctx): State<Arc<ApiContext>>,
) -> Result<Json<PermissionResponse>, StatusCode> {
    let state = Arc::clone(&ctx.state);
    // The platform query may block on the session bus
    match tokio::task::spawn_blocking(move || state.handle(Command::RequestPermission)).await {
        Ok(Ok(CommandOutcome::Permission { status })) => Ok(Json(PermissionResponse { status })),
        Ok(Ok(_)) => Ok(Json(PermissionResponse { status: ctx.state.permission_status() })),
        Ok(Err(e)) => {
            error!("Permission request failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
        Err(e) => {
            error!("Permission request task failed: {}", e);
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// Handle POST /worker/notification-click - Report a notification click
pub async fn notification_click_handler(
    State(ctx): State<Arc<ApiContext>>,
    Json(request): Json<NotificationClickRequest>,
) -> Json<ClickResponse> {
    match &ctx.worker {
        Some(worker) => {
            let outcome = worker.notification_click(request.action.as_deref());
            Json(ClickResponse { registered: true, outcome: Some(outcome) })
        }
        None => {
            warn!("Notification click reported but no worker is registered");
            Json(ClickResponse { registered: false, outcome: None })
        }
    }
}

/// Handle POST /worker/notification-close - Report a dismissed notification
pub async fn notification_close_handler(
    State(ctx): State<Arc<ApiContext>>,
    Json(request): Json<NotificationCloseRequest>,
) -> StatusCode {
    match &ctx.worker {
        Some(worker) => worker.notification_close(&request.title),
        None => debug!("Notification closed without a worker: {}", request.title),
    }
    StatusCode::NO_CONTENT
}

/// Fallback - Serve page assets, cache-first when the worker is registered
pub async fn asset_handler(State(ctx): State<Arc<ApiContext>>, uri: Uri) -> Response {
    let path = uri.path();
    let fetched = match &ctx.worker {
        Some(worker) => worker.fetch(path).await,
        None => ctx.assets.fetch(&normalize_path(path)).await,
    };

    match fetched {
        Ok(asset) => ([(header::CONTENT_TYPE, asset.content_type)], asset.bytes).into_response(),
        Err(e) => {
            debug!("Asset {} unavailable: {}", path, e);
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// Handle GET /status - Return current routine and timer status
pub async fn status_handler(State(ctx): State<Arc<ApiContext>>) -> Result<Json<StatusResponse>, StatusCode> {
    let snapshot = match ctx.state.snapshot() {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to get routine status: {}", e);
            return Err(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let settings = ctx.state.settings();
    let (last_action, last_action_time) = ctx.state.get_last_action();

    Ok(Json(StatusResponse {
        routines: snapshot.routines,
        active_routines: snapshot.active,
        pending_restarts: snapshot.pending_restarts,
        permission: snapshot.permission,
        policy: ctx.state.policy(),
        worker_registered: ctx.state.worker_registered(),
        uptime: ctx.state.get_uptime(),
        port: settings.port,
        host: settings.host.clone(),
        last_action,
        last_action_time,
    }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
