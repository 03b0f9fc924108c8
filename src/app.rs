use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::audit::AuditLogger;
use crate::authz::{AccessFilter, TenantContextResolver};
use crate::config::IdentityConfig;
use crate::db::{SqliteAccessRequestStore, SqliteDirectory, SqliteDocumentCatalog, SqliteRoleRequestStore};
use crate::docs;
use crate::errors::AppError;
use crate::jwt::JwtConfig;
use crate::routes::{
    access_requests, answers, audit, clients, context, documents, health, projects, role_requests, users,
};
use crate::services::{
    AccessWorkflow, AnswerBoundary, AnswerComposer, DocumentRegistry, ExtractiveComposer, RoleRequestWorkflow,
    TenantAdmin,
};
use crate::store::{AccessRequestStore, DocumentCatalog, RoleRequestStore, TenantDirectory};

/// Everything a handler needs, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub identity: Arc<IdentityConfig>,
    pub resolver: TenantContextResolver,
    pub filter: AccessFilter,
    pub audit: AuditLogger,
    pub admin: TenantAdmin,
    pub documents: DocumentRegistry,
    pub workflow: AccessWorkflow,
    pub role_requests: RoleRequestWorkflow,
    pub answers: AnswerBoundary,
}

impl AppState {
    /// SQLite-backed state with the extractive composer.
    pub fn new(pool: SqlitePool, jwt: JwtConfig, identity: IdentityConfig) -> Self {
        let directory: Arc<dyn TenantDirectory> = Arc::new(SqliteDirectory::new(pool.clone()));
        let catalog: Arc<dyn DocumentCatalog> = Arc::new(SqliteDocumentCatalog::new(pool.clone()));
        let requests: Arc<dyn AccessRequestStore> = Arc::new(SqliteAccessRequestStore::new(pool.clone()));
        let role_requests: Arc<dyn RoleRequestStore> = Arc::new(SqliteRoleRequestStore::new(pool.clone()));

        Self::with_stores(
            pool,
            jwt,
            identity,
            directory,
            catalog,
            requests,
            role_requests,
            Arc::new(ExtractiveComposer),
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_stores(
        pool: SqlitePool,
        jwt: JwtConfig,
        identity: IdentityConfig,
        directory: Arc<dyn TenantDirectory>,
        catalog: Arc<dyn DocumentCatalog>,
        requests: Arc<dyn AccessRequestStore>,
        role_requests: Arc<dyn RoleRequestStore>,
        composer: Arc<dyn AnswerComposer>,
    ) -> Self {
        let audit = AuditLogger::new(pool.clone());
        let filter = AccessFilter::new(catalog.clone());
        let admin = TenantAdmin::new(directory.clone(), audit.clone());

        Self {
            jwt: Arc::new(jwt),
            identity: Arc::new(identity),
            resolver: TenantContextResolver::new(directory.clone()),
            role_requests: RoleRequestWorkflow::new(role_requests, admin.clone(), audit.clone()),
            admin,
            documents: DocumentRegistry::new(
                directory,
                catalog.clone(),
                requests.clone(),
                filter.clone(),
                audit.clone(),
            ),
            workflow: AccessWorkflow::new(catalog.clone(), requests, audit.clone()),
            answers: AnswerBoundary::new(catalog, composer).with_audit(audit.clone()),
            filter,
            audit,
            pool,
        }
    }
}

pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let state = AppState::new(pool, JwtConfig::from_env()?, IdentityConfig::from_env()?);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let client_routes = Router::new()
        .route("/", get(clients::list_clients).post(clients::create_client))
        .route("/:id", get(clients::get_client))
        .route("/:id/status", put(clients::update_client_status));

    let project_routes = Router::new()
        .route("/", get(projects::list_projects).post(projects::create_project))
        .route("/:id", get(projects::get_project))
        .route("/:id/status", put(projects::update_project_status))
        .route("/:id/documents", get(documents::list_project_documents));

    let user_routes = Router::new()
        .route("/", post(users::create_user))
        .route("/:id", get(users::get_user))
        .route("/:id/clients", post(users::assign_client))
        .route("/:id/clients/:client_id", delete(users::revoke_client))
        .route("/:id/projects", post(users::assign_project))
        .route("/:id/projects/:project_id", delete(users::revoke_project));

    let document_routes = Router::new()
        .route("/", post(documents::register_document))
        .route("/:id", get(documents::get_document).delete(documents::delete_document))
        .route("/:id/access-requests", post(access_requests::request_access));

    // static `/bulk` segments are matched before `/:id`
    let access_request_routes = Router::new()
        .route("/", get(access_requests::list_requests))
        .route("/bulk", post(access_requests::request_bulk_access))
        .route("/bulk/:id", get(access_requests::get_bulk))
        .route("/:id", get(access_requests::get_request))
        .route("/:id/approve", post(access_requests::approve_request))
        .route("/:id/deny", post(access_requests::deny_request));

    let role_request_routes = Router::new()
        .route("/", get(role_requests::list_role_requests).post(role_requests::create_role_request))
        .route("/:id", get(role_requests::get_role_request))
        .route("/:id/approve", post(role_requests::approve_role_request))
        .route("/:id/deny", post(role_requests::deny_role_request));

    Router::new()
        .route("/api/health", get(health::health))
        .route("/api-docs/openapi.json", get(docs::openapi_json))
        .route("/me/context", get(context::me))
        .route("/answers", post(answers::compose_answer))
        .route("/audit", get(audit::list_entries))
        .route("/audit/verify", get(audit::verify_chain))
        .nest("/clients", client_routes)
        .nest("/projects", project_routes)
        .nest("/users", user_routes)
        .nest("/documents", document_routes)
        .nest("/access-requests", access_request_routes)
        .nest("/role-requests", role_request_routes)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
