// src/routes.rs

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, patch, post},
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{
    handlers::{auth, invite, question, quiz, submission},
    state::AppState,
    utils::jwt::auth_middleware,
};

/// Assembles the main application router.
///
/// * Merges all sub-routers (auth, invites, quizzes, participants).
/// * Applies global middleware (Trace, CORS).
/// * Injects global state (Database Pool, Config, Mailer).
pub fn create_router(state: AppState) -> Router {
    let origins = [
        HeaderValue::from_static("http://localhost:3000"),
        HeaderValue::from_static("http://127.0.0.1:3000"),
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
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    let auth_layer = middleware::from_fn_with_state(state.clone(), auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .merge(
            Router::new()
                .route("/me", get(auth::me))
                .layer(auth_layer.clone()),
        );

    // The invite code doubles as the credential here
    let invite_routes = Router::new().route("/{uuid}/accept", post(invite::accept_invite));

    let quiz_routes = Router::new()
        .route("/", get(quiz::list_quizzes).post(quiz::create_quiz))
        .route(
            "/{quiz_id}",
            get(quiz::get_quiz)
                .put(quiz::replace_quiz)
                .patch(quiz::update_quiz)
                .delete(quiz::delete_quiz),
        )
        .route("/{quiz_id}/questions", post(question::create_question))
        .route(
            "/{quiz_id}/questions/{question_id}",
            patch(question::update_question).delete(question::delete_question),
        )
        .route(
            "/{quiz_id}/questions/{question_id}/answers",
            post(question::create_answer),
        )
        .route(
            "/{quiz_id}/questions/{question_id}/answers/{answer_id}",
            patch(question::update_answer).delete(question::delete_answer),
        )
        .route("/{quiz_id}/invite", post(invite::invite_participant))
        .layer(auth_layer.clone());

    let participant_routes = Router::new()
        .route("/{participant_id}/submissions", get(submission::list_submissions))
        .route(
            "/{participant_id}/submissions/{quiz_id}",
            get(submission::get_submission),
        )
        .route(
            "/{participant_id}/submissions/{quiz_id}/answers",
            post(submission::create_user_answer),
        )
        .layer(auth_layer);

    Router::new()
        .nest("/api/auth", auth_routes)
        .nest("/api/invites", invite_routes)
        .nest("/api/quizzes", quiz_routes)
        .nest("/api/participants", participant_routes)
        // Global Middleware (applied from outside in)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}
