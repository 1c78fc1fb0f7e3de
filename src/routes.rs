use axum::{http::Uri, routing, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    api::v1::{auth, notification, password_reset, presence, request, socket, task, workshop},
    app::AppState,
    error::Error,
};

async fn health() -> &'static str {
    "ok"
}

async fn fallback(uri: Uri) -> Error {
    Error::NotFound(uri)
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", routing::post(auth::register))
        .route("/login", routing::post(auth::login))
        .route("/worker-login", routing::post(auth::worker_login))
        .route("/user-login", routing::post(auth::user_login))
        .route("/me", routing::get(auth::me))
        .route("/profile", routing::put(auth::update_profile))
        .route("/users", routing::get(auth::list_users))
        .route("/users/:id/role", routing::put(auth::update_role))
        .route("/users/:id/active", routing::put(auth::set_active))
        .route(
            "/forgot-password",
            routing::post(password_reset::forgot_password),
        )
        .route(
            "/verify-reset-token",
            routing::post(password_reset::verify_reset_token),
        )
        .route(
            "/reset-password",
            routing::post(password_reset::reset_password),
        )
}

fn request_routes() -> Router<AppState> {
    Router::new()
        .route("/send", routing::post(request::send))
        .route(
            "/service-requests",
            routing::post(request::create_service_request),
        )
        .route("/admin/:admin_id", routing::get(request::index_admin))
        .route("/user/:user_id", routing::get(request::index_user))
        .route("/worker/:worker_id", routing::get(request::index_worker))
        .route(
            "/:id",
            routing::get(request::show).delete(request::delete),
        )
        .route("/:id/status", routing::patch(request::update_status))
        .route("/:id/assign", routing::patch(request::assign))
}

fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(task::index).post(task::create))
        .route("/:id", routing::get(task::show))
        .route("/:id/status", routing::patch(task::advance_status))
        .route("/:id/quotation", routing::put(task::set_quotation))
        .route("/:id/notes", routing::post(task::add_note))
        .route("/:id/location", routing::put(task::update_location))
}

fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(notification::index))
        .route("/read-all", routing::put(notification::mark_all_read))
        .route("/:id/read", routing::put(notification::mark_read))
}

fn worker_routes() -> Router<AppState> {
    Router::new()
        .route("/login", routing::post(presence::login))
        .route("/logout", routing::post(presence::logout))
        .route("/activity", routing::post(presence::activity))
        .route("/logged-in", routing::get(presence::logged_in))
}

fn workshop_routes() -> Router<AppState> {
    Router::new()
        .route("/", routing::get(workshop::index).post(workshop::create))
        .route("/:id", routing::get(workshop::show))
}

pub fn router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", routing::get(health))
        .route("/ws", routing::get(socket::connect))
        .nest("/auth", auth_routes())
        .nest("/requests", request_routes())
        .nest("/tasks", task_routes())
        .nest("/notifications", notification_routes())
        .nest("/workers", worker_routes())
        .nest("/workshops", workshop_routes())
        .fallback(fallback)
        .with_state(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
