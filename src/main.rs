// src/main.rs

use std::{sync::Arc, time::Duration};

use dotenvy::dotenv;
use quizzes::config::Config;
use quizzes::mail::LogMailer;
use quizzes::models::user::normalize_email;
use quizzes::routes;
use quizzes::state::AppState;
use quizzes::utils::hash::hash_password;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file (if present)
    dotenv().ok();

    // Load configuration from environment
    let config = Config::from_env()?;

    let file_appender = tracing_appender::rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let env_filter = EnvFilter::new(&config.rust_log);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout).with_target(false);
    let file_layer = fmt::layer().with_writer(non_blocking).with_ansi(false);

    // Initialize Tracing (Logging)
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    // Initialize Database Pool with Retry
    let mut retry_count = 0;
    let pool = loop {
        match PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(3))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => break pool,
            Err(e) => {
                retry_count += 1;
                if retry_count > 5 {
                    tracing::error!("Failed to connect to database after 5 retries: {}", e);
                    return Err(e.into());
                }
                tracing::warn!("Database not ready, retrying in 2s... (Attempt {})", retry_count);
                tokio::time::sleep(Duration::from_secs(2)).await;
            }
        }
    };

    tracing::info!("Database connected...");

    // Run Migrations Automatically
    tracing::info!("Running migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Migrations applied successfully.");

    // Seed Superuser
    if let Err(e) = seed_superuser(&pool, &config).await {
        tracing::error!("Failed to seed superuser: {:?}", e);
    }

    let state = AppState {
        pool: pool.clone(),
        config: config.clone(),
        mailer: Arc::new(LogMailer),
    };

    // Create the Axum application router
    let app = routes::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;

    // Start the server
    axum::serve(listener, app).await?;

    Ok(())
}

async fn seed_superuser(pool: &PgPool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        let email = normalize_email(email);

        let user_exists = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE LOWER(email) = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        if user_exists.is_none() {
            tracing::info!("Seeding superuser: {}", email);
            let hashed_password = hash_password(password)?;

            sqlx::query("INSERT INTO users (email, password, is_superuser) VALUES ($1, $2, TRUE)")
                .bind(&email)
                .bind(hashed_password)
                .execute(pool)
                .await?;
            tracing::info!("Superuser created successfully.");
        }
    }
    Ok(())
}
