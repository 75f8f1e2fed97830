use std::sync::Arc;

use axum::{routing::get, Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::server::Server;
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::{authz, models, routes};

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::projects::list_projects,
		routes::projects::create_project,
		routes::projects::get_project,
		routes::projects::update_project,
		routes::projects::archive_project,
		routes::projects::restore_project,
		routes::projects::delete_project,
		routes::projects::transfer_ownership,
		routes::projects::get_project_permissions,
		routes::activity::list_project_activity,
		routes::members::list_members,
		routes::members::invite_member,
		routes::members::change_member_role,
		routes::members::remove_member
	),
	components(
		schemas(
			authz::ProjectRole,
			authz::ProjectPermission,
			authz::UserRole,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::project::Project,
			models::project::ProjectWithRole,
			models::project::ProjectCreateRequest,
			models::project::ProjectUpdateRequest,
			models::project::TransferOwnershipRequest,
			models::project::ProjectPermissionsResponse,
			models::member::ProjectMember,
			models::member::MemberInviteRequest,
			models::member::MemberRoleUpdateRequest,
			models::activity::ActivityEntry,
			routes::auth::MessageResponse,
			routes::health::HealthResponse
		)
	),
	modifiers(&BearerAuth),
	security(("bearerAuth" = [])),
	tags(
		(name = "Health", description = "Service health"),
		(name = "Auth", description = "Authentication endpoints"),
		(name = "Projects", description = "Project lifecycle"),
		(name = "Members", description = "Project membership and roles")
	)
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
	fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
		let components = openapi.components.get_or_insert_with(Default::default);
		components.add_security_scheme(
			"bearerAuth",
			SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).bearer_format("JWT").build()),
		);
	}
}

/// OpenAPI document with a `servers` entry pointing at the local backend.
pub fn build_openapi(port: u16) -> utoipa::openapi::OpenApi {
	let mut doc = ApiDoc::openapi();
	doc.servers = Some(vec![Server::new(format!("http://localhost:{port}"))]);
	doc
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}
