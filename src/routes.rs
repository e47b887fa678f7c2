// src/routes.rs

use axum::{
    Router, http::Method, middleware,
    routing::{get, post, put},
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{announcement, auth, classroom, performance, quiz, session},
    state::AppState,
    utils::jwt::{auth_middleware, faculty_middleware},
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, classrooms, quizzes, performance).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (pool, config, session store).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        "http://localhost:3000".parse().unwrap(),
        "http://127.0.0.1:3000".parse().unwrap(),
    ];

    let cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
        ]);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login));

    // Faculty-only writes share paths with member reads, so role checks for
    // these live in the handlers rather than in a route layer.
    let classroom_routes = Router::new()
        .route(
            "/",
            get(classroom::list_classrooms).post(classroom::create_classroom),
        )
        .route("/join", post(classroom::join_classroom))
        .route("/{id}", get(classroom::get_classroom))
        .route("/{id}/members", get(classroom::list_members))
        .route(
            "/{id}/announcements",
            get(announcement::list_announcements).post(announcement::create_announcement),
        )
        .route(
            "/{id}/quizzes",
            get(quiz::list_quizzes).post(quiz::create_quiz),
        )
        .route("/{id}/leaderboard", get(quiz::classroom_leaderboard))
        .route("/{id}/performance", get(performance::class_performance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let quiz_routes = Router::new()
        .route(
            "/{id}/session",
            post(session::start_session).delete(session::abandon_session),
        )
        .route("/{id}/session/answer", put(session::record_answer))
        .route("/{id}/session/submit", post(session::submit_session))
        // Faculty-only quiz routes
        .merge(
            Router::new()
                .route("/{id}/results", get(quiz::quiz_results))
                .layer(middleware::from_fn(faculty_middleware)),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let performance_routes = Router::new()
        .route("/me", get(performance::my_performance))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/classrooms", classroom_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/performance", performance_routes)
        // Global Middleware (applied from outside in)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
