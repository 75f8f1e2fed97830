use std::sync::Arc;

use axum::http::Method;
use axum::routing::{get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::SqliteMembershipStore;
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{activity, auth, health, members, projects};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub memberships: Arc<SqliteMembershipStore>,
    pub event_bus: EventBus,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            memberships: Arc::new(SqliteMembershipStore::new(pool.clone())),
            pool,
            jwt: Arc::new(jwt),
            event_bus,
        }
    }
}

/// Builds the router and spawns the activity listener. Must run inside a tokio runtime.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, event_rx) = init_event_bus();
    tokio::spawn(start_activity_listener(event_rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route(
            "/:id",
            get(projects::get_project)
                .put(projects::update_project)
                .delete(projects::delete_project),
        )
        .route("/:id/archive", post(projects::archive_project))
        .route("/:id/restore", post(projects::restore_project))
        .route("/:id/transfer-ownership", post(projects::transfer_ownership))
        .route("/:id/permissions", get(projects::get_project_permissions))
        .route("/:id/activity", get(activity::list_project_activity));

    // Members are scoped to a project: /projects/:id/members (param must stay `:id`)
    let member_routes = Router::new()
        .route("/", get(members::list_members).post(members::invite_member))
        .route("/:user_id", put(members::change_member_role).delete(members::remove_member));

    let router = Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/projects", project_routes)
        .nest("/projects/:id/members", member_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    Ok(router)
}
