use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use person_registry::{
    AppConfig, AppState, MemoryRepository,
    auth::{self, AuthUser},
    authz::Role,
    error::{ApiError, ApiJson},
    handlers,
    models::{CreatePersonRequest, LoginRequest, NewPerson, UpdatePersonRequest},
    pagination::PageParams,
    query::FilterParams,
};
use std::sync::Arc;
use uuid::Uuid;

// --- Test utilities ---

fn test_state() -> AppState {
    AppState {
        repo: Arc::new(MemoryRepository::new()),
        config: AppConfig::default(),
    }
}

fn admin_user() -> AuthUser {
    AuthUser {
        id: 1,
        username: "admin".to_string(),
        role: Role::Admin,
        session_id: Uuid::new_v4(),
    }
}

fn guest_user() -> AuthUser {
    AuthUser {
        id: 2,
        username: "guest".to_string(),
        role: Role::Guest,
        session_id: Uuid::new_v4(),
    }
}

/// Seeds a record straight through the repository, bypassing the handler.
async fn seed_person(
    state: &AppState,
    first_name: &str,
    last_name: &str,
    age: i32,
    username: &str,
) -> i64 {
    let new_person = NewPerson {
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("{username}@example.com"),
        phone_number: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        age,
        username: username.to_string(),
        password_hash: "unused".to_string(),
        role: Role::Guest,
        is_active: true,
    };
    state.repo.create_person(new_person).await.unwrap().id
}

fn create_payload(username: &str) -> CreatePersonRequest {
    CreatePersonRequest {
        first_name: "Nevil".to_string(),
        last_name: "Patel".to_string(),
        email: format!("{username}@example.com"),
        phone_number: Some("+35311112222".to_string()),
        date_of_birth: NaiveDate::from_ymd_opt(1996, 4, 2).unwrap(),
        username: username.to_string(),
        password: "secret123".to_string(),
        role: None,
    }
}

fn page_params(page: Option<&str>, page_size: Option<&str>) -> PageParams {
    PageParams {
        page: page.map(String::from),
        page_size: page_size.map(String::from),
    }
}

// --- Role gating ---

#[tokio::test]
async fn guest_is_denied_all_crud_handlers() {
    let state = test_state();
    let id = seed_person(&state, "Ada", "Lovelace", 36, "ada").await;

    let err = handlers::list_people(guest_user(), State(state.clone()), Query(page_params(None, None)))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = handlers::create_person(guest_user(), State(state.clone()), ApiJson(create_payload("new")))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = handlers::get_person(guest_user(), State(state.clone()), Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = handlers::update_person(
        guest_user(),
        State(state.clone()),
        Path(id),
        ApiJson(UpdatePersonRequest::default()),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    let err = handlers::delete_person(guest_user(), State(state.clone()), Path(id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "unauthorized");

    // The record is untouched.
    assert!(state.repo.get_person(id).await.unwrap().is_some());
}

#[tokio::test]
async fn guest_may_search() {
    let state = test_state();
    seed_person(&state, "Ada", "Lovelace", 36, "ada").await;

    let Json(page) = handlers::filter_people(
        guest_user(),
        State(state),
        Query(FilterParams::default()),
    )
    .await
    .unwrap();

    assert_eq!(page.count, 1);
}

// --- CRUD lifecycle ---

#[tokio::test]
async fn admin_create_retrieve_update_delete() {
    let state = test_state();

    let (status, Json(created)) =
        handlers::create_person(admin_user(), State(state.clone()), ApiJson(create_payload("nevil")))
            .await
            .unwrap();
    assert_eq!(status, StatusCode::CREATED);
    assert!(created.id > 0);
    // Unspecified role defaults to guest.
    assert_eq!(created.role, Role::Guest);

    let Json(fetched) = handlers::get_person(admin_user(), State(state.clone()), Path(created.id))
        .await
        .unwrap();
    assert_eq!(fetched.username, "nevil");

    // Patch one field; the others keep their values.
    let patch = UpdatePersonRequest {
        first_name: Some("Neville".to_string()),
        ..UpdatePersonRequest::default()
    };
    let Json(updated) =
        handlers::update_person(admin_user(), State(state.clone()), Path(created.id), ApiJson(patch))
            .await
            .unwrap();
    assert_eq!(updated.first_name, "Neville");
    assert_eq!(updated.last_name, "Patel");
    assert_eq!(updated.age, created.age);

    let status = handlers::delete_person(admin_user(), State(state.clone()), Path(created.id))
        .await
        .unwrap();
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Deleting the same id again reports not_found, not a second success.
    let err = handlers::delete_person(admin_user(), State(state.clone()), Path(created.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = handlers::get_person(admin_user(), State(state), Path(created.id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[tokio::test]
async fn updating_date_of_birth_rederives_age() {
    let state = test_state();

    let (_, Json(created)) =
        handlers::create_person(admin_user(), State(state.clone()), ApiJson(create_payload("amy")))
            .await
            .unwrap();

    let new_dob = NaiveDate::from_ymd_opt(2000, 1, 1).unwrap();
    let patch = UpdatePersonRequest {
        date_of_birth: Some(new_dob),
        ..UpdatePersonRequest::default()
    };
    let Json(updated) =
        handlers::update_person(admin_user(), State(state), Path(created.id), ApiJson(patch))
            .await
            .unwrap();

    assert_eq!(updated.date_of_birth, new_dob);
    assert_ne!(updated.age, created.age);
}

#[tokio::test]
async fn duplicate_username_and_email_fail_validation() {
    let state = test_state();

    handlers::create_person(admin_user(), State(state.clone()), ApiJson(create_payload("dup")))
        .await
        .unwrap();

    // Same username, fresh email.
    let mut payload = create_payload("dup");
    payload.email = "other@example.com".to_string();
    let err = handlers::create_person(admin_user(), State(state.clone()), ApiJson(payload))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation { field: "username", .. }));

    // Fresh username, same email.
    let mut payload = create_payload("dup2");
    payload.email = "dup@example.com".to_string();
    let err = handlers::create_person(admin_user(), State(state), ApiJson(payload))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation { field: "email", .. }));
}

#[tokio::test]
async fn missing_person_is_not_found() {
    let state = test_state();

    let err = handlers::get_person(admin_user(), State(state.clone()), Path(4242))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "not_found");

    let err = handlers::update_person(
        admin_user(),
        State(state),
        Path(4242),
        ApiJson(UpdatePersonRequest {
            first_name: Some("Nobody".to_string()),
            ..UpdatePersonRequest::default()
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

// --- Listing & pagination through the handler ---

#[tokio::test]
async fn list_people_paginates_in_id_order() {
    let state = test_state();
    for i in 0..25 {
        seed_person(&state, "Person", "Number", 20 + (i % 5), &format!("user{i}")).await;
    }

    let Json(page1) = handlers::list_people(
        admin_user(),
        State(state.clone()),
        Query(page_params(None, None)),
    )
    .await
    .unwrap();
    assert_eq!(page1.count, 25);
    assert_eq!(page1.results.len(), 10);
    assert_eq!(page1.next, Some(2));
    assert_eq!(page1.previous, None);
    let ids: Vec<i64> = page1.results.iter().map(|p| p.id).collect();
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    assert_eq!(ids, sorted);

    let Json(page3) = handlers::list_people(
        admin_user(),
        State(state.clone()),
        Query(page_params(Some("3"), None)),
    )
    .await
    .unwrap();
    assert_eq!(page3.results.len(), 5);
    assert_eq!(page3.next, None);

    let err = handlers::list_people(
        admin_user(),
        State(state),
        Query(page_params(Some("4"), None)),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "page_not_found");
}

// --- Search through the handler ---

#[tokio::test]
async fn filter_people_is_conjunctive_and_redacts_username() {
    let state = test_state();
    seed_person(&state, "Nevil", "Patel", 29, "nevil").await;
    seed_person(&state, "Nevil", "Shah", 35, "nevil2").await;
    seed_person(&state, "Ada", "Patel", 29, "ada").await;

    let params = FilterParams {
        first_name: Some("nevil".to_string()),
        age: Some("29".to_string()),
        ..FilterParams::default()
    };

    let Json(page) = handlers::filter_people(guest_user(), State(state), Query(params))
        .await
        .unwrap();

    assert_eq!(page.count, 1);
    assert_eq!(page.results[0].first_name, "Nevil");
    assert_eq!(page.results[0].last_name, "Patel");

    let json = serde_json::to_value(&page.results[0]).unwrap();
    assert!(json.get("username").is_none());
}

#[tokio::test]
async fn filter_with_malformed_age_fails_before_querying() {
    let state = test_state();
    seed_person(&state, "Nevil", "Patel", 29, "nevil").await;

    let params = FilterParams {
        age: Some("abc".to_string()),
        ..FilterParams::default()
    };

    let err = handlers::filter_people(admin_user(), State(state), Query(params))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Validation { field: "age", .. }));
}

// --- Login / logout ---

async fn seed_credentialed(
    state: &AppState,
    username: &str,
    password: &str,
    role: Role,
    is_active: bool,
) -> i64 {
    let new_person = NewPerson {
        first_name: "Login".to_string(),
        last_name: "Tester".to_string(),
        email: format!("{username}@example.com"),
        phone_number: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        age: 36,
        username: username.to_string(),
        password_hash: auth::hash_password(password).unwrap(),
        role,
        is_active,
    };
    state.repo.create_person(new_person).await.unwrap().id
}

#[tokio::test]
async fn login_issues_a_token_and_bad_credentials_are_rejected() {
    let state = test_state();
    seed_credentialed(&state, "alice", "password123", Role::Admin, true).await;

    let Json(response) = handlers::login(
        State(state.clone()),
        ApiJson(LoginRequest {
            username: "alice".to_string(),
            password: "password123".to_string(),
        }),
    )
    .await
    .unwrap();
    assert_eq!(response.message, "Successfully logged in");
    assert!(!response.token.is_empty());

    // Wrong password and unknown username produce the same error.
    let err = handlers::login(
        State(state.clone()),
        ApiJson(LoginRequest {
            username: "alice".to_string(),
            password: "wrongpassword".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.kind(), "unauthenticated");
    assert_eq!(err.to_string(), "invalid credentials");

    let err = handlers::login(
        State(state),
        ApiJson(LoginRequest {
            username: "nobody".to_string(),
            password: "password123".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "invalid credentials");
}

#[tokio::test]
async fn inactive_person_cannot_log_in() {
    let state = test_state();
    seed_credentialed(&state, "bob", "password123", Role::Guest, false).await;

    let err = handlers::login(
        State(state),
        ApiJson(LoginRequest {
            username: "bob".to_string(),
            password: "password123".to_string(),
        }),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "inactive person");
}

#[tokio::test]
async fn logout_revokes_the_session() {
    let state = test_state();
    let id = seed_credentialed(&state, "carol", "password123", Role::Guest, true).await;
    let person = state.repo.get_person(id).await.unwrap().unwrap();

    let (session, _token) = auth::issue_session(&person, &state.config).unwrap();
    let session_id = session.id;
    state.repo.create_session(session).await.unwrap();
    assert!(state.repo.get_session(session_id).await.unwrap().is_some());

    let caller = AuthUser {
        id,
        username: person.username.clone(),
        role: person.role,
        session_id,
    };
    let Json(response) = handlers::logout(caller, State(state.clone())).await.unwrap();
    assert_eq!(response.message, "Successfully logged out");

    assert!(state.repo.get_session(session_id).await.unwrap().is_none());
}
