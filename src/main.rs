use chrono::{NaiveDate, Utc};
use person_registry::{
    AppState,
    auth::hash_password,
    authz::Role,
    config::{AppConfig, BootstrapAccount, Env},
    create_router,
    models::{NewPerson, calculate_age},
    repository::{PostgresRepository, RepositoryError, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Configuration first: AppConfig::load() fails fast on missing secrets.
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "person_registry=debug,tower_http=info,axum=trace".into());

    // Pretty output for local debugging, JSON for log aggregation in prod.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.db_url)
        .await
        .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("FATAL: database migration failed");

    let repo = Arc::new(PostgresRepository::new(pool)) as RepositoryState;

    // One admin and one guest always exist so the API is reachable on a
    // fresh database. Re-running is a no-op.
    seed_account(&repo, &config.bootstrap_admin, Role::Admin, "Admin", "1995-09-01")
        .await
        .expect("FATAL: failed to seed admin account");
    seed_account(&repo, &config.bootstrap_guest, Role::Guest, "Guest", "2015-01-01")
        .await
        .expect("FATAL: failed to seed guest account");

    let app_state = AppState {
        repo,
        config,
    };

    let app = create_router(app_state);

    let listener = TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("FATAL: failed to bind 0.0.0.0:3000");

    tracing::info!("Listening on 0.0.0.0:3000");
    tracing::info!("API documentation available at http://localhost:3000/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("FATAL: server error");
}

/// Idempotently creates one of the bootstrap accounts; an existing username
/// or email means a previous run already seeded it.
async fn seed_account(
    repo: &RepositoryState,
    account: &BootstrapAccount,
    role: Role,
    first_name: &str,
    date_of_birth: &str,
) -> Result<(), RepositoryError> {
    let date_of_birth: NaiveDate = date_of_birth
        .parse()
        .expect("FATAL: invalid bootstrap date of birth");
    let today = Utc::now().date_naive();

    let new_person = NewPerson {
        first_name: first_name.to_string(),
        last_name: "User".to_string(),
        email: format!("{}@example.com", account.username),
        phone_number: None,
        date_of_birth,
        age: calculate_age(date_of_birth, today),
        username: account.username.clone(),
        password_hash: hash_password(&account.password)
            .unwrap_or_else(|e| panic!("FATAL: failed to hash bootstrap password: {e}")),
        role,
        is_active: true,
    };

    match repo.create_person(new_person).await {
        Ok(person) => {
            tracing::info!(username = %person.username, role = %person.role, "seeded account");
            Ok(())
        }
        Err(RepositoryError::Duplicate { .. }) => Ok(()),
        Err(other) => Err(other),
    }
}
