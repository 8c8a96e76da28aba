mod assist;
mod home;
mod video;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::api_key::api_key_auth;
use crate::state::AppState;

// Define the OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    paths(
        // General endpoints
        home::root,
        // Video generation endpoints
        video::generate_video,
        video::generate_and_wait,
        video::video_status,
        video::list_archive,
        video::delete_archive,
        video::video_health,
        // Assistant endpoints
        assist::chat,
        assist::analyze_prescription,
    ),
    components(
        schemas(
            // Video schemas
            video::GenerateVideoRequest,
            video::VideoJobResponse,
            video::ArchiveListResponse,
            video::HealthResponse,
            crate::services::s3::ArchivedVideo,
            // Assistant schemas
            assist::ChatRequest,
            assist::ChatResponse,
            assist::PrescriptionRequest,
            assist::PrescriptionResponse,
        )
    ),
    tags(
        (name = "General", description = "General API information"),
        (name = "Video", description = "Avatar video generation, status polling, and archive management"),
        (name = "Assistant", description = "Language and vision model passthrough endpoints")
    ),
    info(
        title = "Media AI Gateway",
        version = "0.1.0",
        description = "Gateway in front of a video-avatar provider, a generative-language model, and object storage",
    ),
    modifiers(&SecurityAddon)
)]
struct ApiDoc;

// Add security scheme for the shared API key header
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "api_key",
            utoipa::openapi::security::SecurityScheme::ApiKey(
                utoipa::openapi::security::ApiKey::Header(
                    utoipa::openapi::security::ApiKeyValue::new("x-api-key"),
                ),
            ),
        );
    }
}

pub fn create_routes(state: AppState) -> Router {
    // Swagger UI (stateless)
    let swagger_router: Router = SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDoc::openapi())
        .into();

    // Everything except health and the landing page requires the shared key
    let protected_routes = Router::new()
        .route("/video/generate", post(video::generate_video))
        .route("/video/generate-and-wait", post(video::generate_and_wait))
        .route("/video/status/{job_id}", get(video::video_status))
        .route("/video/archive", get(video::list_archive))
        .route("/video/archive/{*key}", delete(video::delete_archive))
        .route("/assist/chat", post(assist::chat))
        .route("/assist/prescription", post(assist::analyze_prescription))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_auth,
        ));

    let app_routes = Router::new()
        .route("/", get(home::root))
        .route("/video/health", get(video::video_health))
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Merge Swagger UI (which has no state) with the rest
    Router::new()
        .merge(swagger_router)
        .merge(app_routes)
}
