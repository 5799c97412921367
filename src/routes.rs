// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{delete, get, patch, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{admin, application, attempt, auth, certificate, quiz, topic},
    state::AppState,
    utils::jwt::{admin_middleware, auth_middleware},
};

/// Assembles the main application router.
///
/// * Public browsing lives under /api/certificates and /api/topics.
/// * Guide actions (quizzes, attempts, applications) require a valid token.
/// * All management routes live under /api/admin behind the double
///   middleware (Auth first, then Admin check).
/// * Applies global middleware (Trace, CORS) and injects global state.
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    let certificate_routes = Router::new()
        .route("/", get(certificate::list_certificates))
        .route("/available", get(certificate::available_certificates))
        .route("/{id}", get(certificate::get_certificate))
        .route("/{id}/progress", get(certificate::certificate_progress))
        .route("/{id}/topics", get(topic::list_topics));

    let topic_routes = Router::new()
        .route("/{id}", get(topic::get_topic))
        // Protected routes for guides studying a topic
        .merge(
            Router::new()
                .route("/{id}/quiz", get(quiz::get_quiz))
                .route("/{id}/attempt", get(attempt::get_my_attempt))
                .layer(auth_layer.clone()),
        );

    let attempt_routes = Router::new()
        .route("/", post(attempt::submit_attempt))
        .layer(auth_layer.clone());

    let application_routes = Router::new()
        .route("/", post(application::apply))
        .route("/mine", get(application::my_applications))
        .route(
            "/certified",
            get(application::my_certified).post(application::request_certified),
        )
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/certificates", post(certificate::create_certificate))
        .route(
            "/certificates/{id}",
            put(certificate::update_certificate).delete(certificate::delete_certificate),
        )
        .route("/certificates/{id}/topics", post(topic::create_topic))
        .route(
            "/topics/{id}/quiz",
            get(quiz::get_quiz_full)
                .post(quiz::create_quiz)
                .put(quiz::replace_questions),
        )
        .route("/topics/{id}/quiz/settings", patch(quiz::update_settings))
        .route("/topics/{id}/quiz/questions", post(quiz::add_question))
        .route(
            "/topics/{topic_id}/quiz/questions/{question_id}",
            patch(quiz::update_question).delete(quiz::delete_question),
        )
        .route("/topics/{id}/materials", post(topic::add_material))
        .route("/materials/{id}", delete(topic::delete_material))
        .route("/applications", get(application::admin_list))
        .route("/applications/{id}/status", patch(application::update_status))
        .route("/users", get(admin::list_users).post(admin::create_user))
        .route(
            "/users/{id}",
            put(admin::update_user).delete(admin::delete_user),
        )
        // Double middleware protection: Auth first, then Admin check
        .layer(middleware::from_fn(admin_middleware))
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/certificates", certificate_routes)
        .nest("/api/topics", topic_routes)
        .nest("/api/quiz-attempts", attempt_routes)
        .nest("/api/applications", application_routes)
        .nest("/api/admin", admin_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
