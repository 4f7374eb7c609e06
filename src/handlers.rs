use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use chrono::Utc;

use crate::{
    AppState,
    auth::{self, AuthUser},
    authz::{Operation, Role, authorize},
    error::{ApiError, ApiJson},
    models::{
        CreatePersonRequest, LoginRequest, LoginResponse, MessageResponse, NewPerson, Person,
        PersonChanges, PersonResponse, PersonSummary, UpdatePersonRequest, calculate_age,
    },
    pagination::{Page, PageParams, PageRequest, paginate},
    query::{FilterParams, build_filter},
};

/// login
///
/// [Public Route] Verifies username/password and opens a session. A wrong
/// username and a wrong password produce the same error so the endpoint
/// does not reveal which usernames exist.
#[utoipa::path(
    post,
    path = "/api/login/",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = crate::error::ErrorBody)
    )
)]
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let person = state
        .repo
        .find_person_by_username(&payload.username)
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::Unauthenticated("invalid credentials".to_string()))?;

    if !auth::verify_password(&person.password_hash, &payload.password) {
        return Err(ApiError::Unauthenticated("invalid credentials".to_string()));
    }

    if !person.is_active {
        return Err(ApiError::Unauthenticated("inactive person".to_string()));
    }

    let (session, token) = auth::issue_session(&person, &state.config)?;
    state
        .repo
        .create_session(session)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(username = %person.username, role = %person.role, "login");

    Ok(Json(LoginResponse {
        message: "Successfully logged in".to_string(),
        token,
    }))
}

/// logout
///
/// [Authenticated Route] Deletes the caller's session row, which revokes
/// the token even though its signature stays valid until `exp`.
#[utoipa::path(
    post,
    path = "/api/logout/",
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 401, description = "Not authenticated", body = crate::error::ErrorBody)
    )
)]
pub async fn logout(
    auth_user: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .repo
        .delete_session(auth_user.session_id)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(username = %auth_user.username, "logout");

    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}

/// list_people
///
/// [Admin Route] Lists every person, ordered by id, paginated.
#[utoipa::path(
    get,
    path = "/api/person/",
    params(PageParams),
    responses(
        (status = 200, description = "One page of people", body = Page<PersonResponse>),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody),
        (status = 404, description = "Page out of range", body = crate::error::ErrorBody)
    )
)]
pub async fn list_people(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Page<PersonResponse>>, ApiError> {
    authorize(&auth_user, Operation::List)?;

    let request = PageRequest::from_params(
        params.page.as_deref(),
        params.page_size.as_deref(),
        &state.config,
    )?;

    let people = state.repo.list_people().await.map_err(ApiError::from)?;
    let page = paginate(people, &request)?;

    Ok(Json(page.map(PersonResponse::from)))
}

/// create_person
///
/// [Admin Route] Creates a person. `age` is derived from `date_of_birth`;
/// the role defaults to Guest and cannot be changed later.
#[utoipa::path(
    post,
    path = "/api/person/",
    request_body = CreatePersonRequest,
    responses(
        (status = 201, description = "Created", body = PersonResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 403, description = "Admin only", body = crate::error::ErrorBody)
    )
)]
pub async fn create_person(
    auth_user: AuthUser,
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<CreatePersonRequest>,
) -> Result<(StatusCode, Json<PersonResponse>), ApiError> {
    authorize(&auth_user, Operation::Create)?;

    let today = Utc::now().date_naive();
    payload.validate(today)?;

    let new_person = NewPerson {
        age: calculate_age(payload.date_of_birth, today),
        password_hash: auth::hash_password(&payload.password)?,
        first_name: payload.first_name,
        last_name: payload.last_name,
        email: payload.email,
        phone_number: payload.phone_number,
        date_of_birth: payload.date_of_birth,
        username: payload.username,
        role: payload.role.unwrap_or(Role::Guest),
        is_active: true,
    };

    let person = state
        .repo
        .create_person(new_person)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(id = person.id, username = %person.username, "person created");

    Ok((StatusCode::CREATED, Json(PersonResponse::from(person))))
}

/// get_person
///
/// [Admin Route] Retrieves one person by id.
#[utoipa::path(
    get,
    path = "/api/person/{id}/",
    params(("id" = i64, Path, description = "Person id")),
    responses(
        (status = 200, description = "Found", body = PersonResponse),
        (status = 404, description = "No such person", body = crate::error::ErrorBody)
    )
)]
pub async fn get_person(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<PersonResponse>, ApiError> {
    authorize(&auth_user, Operation::Retrieve)?;

    let person = state
        .repo
        .get_person(id)
        .await
        .map_err(ApiError::from)?
        .ok_or(ApiError::NotFound("person"))?;

    Ok(Json(PersonResponse::from(person)))
}

/// update_person
///
/// [Admin Route] Partial update; absent fields keep their stored value.
/// A new `date_of_birth` re-derives `age`, a new password is re-hashed.
#[utoipa::path(
    patch,
    path = "/api/person/{id}/",
    params(("id" = i64, Path, description = "Person id")),
    request_body = UpdatePersonRequest,
    responses(
        (status = 200, description = "Updated", body = PersonResponse),
        (status = 400, description = "Validation error", body = crate::error::ErrorBody),
        (status = 404, description = "No such person", body = crate::error::ErrorBody)
    )
)]
pub async fn update_person(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
    ApiJson(payload): ApiJson<UpdatePersonRequest>,
) -> Result<Json<PersonResponse>, ApiError> {
    authorize(&auth_user, Operation::Update)?;

    let today = Utc::now().date_naive();
    payload.validate(today)?;

    // An empty patch is a read: no write, no updated_at bump.
    let person: Option<Person> = if payload.is_empty() {
        state.repo.get_person(id).await.map_err(ApiError::from)?
    } else {
        let changes = PersonChanges {
            age: payload.date_of_birth.map(|dob| calculate_age(dob, today)),
            password_hash: payload
                .password
                .as_deref()
                .map(auth::hash_password)
                .transpose()?,
            first_name: payload.first_name,
            last_name: payload.last_name,
            email: payload.email,
            phone_number: payload.phone_number,
            date_of_birth: payload.date_of_birth,
            username: payload.username,
        };
        state
            .repo
            .update_person(id, changes)
            .await
            .map_err(ApiError::from)?
    };

    let person = person.ok_or(ApiError::NotFound("person"))?;
    Ok(Json(PersonResponse::from(person)))
}

/// delete_person
///
/// [Admin Route] Deletes a person. Deleting an id that is already gone is
/// `not_found`, so a repeated delete never reports a second success.
#[utoipa::path(
    delete,
    path = "/api/person/{id}/",
    params(("id" = i64, Path, description = "Person id")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "No such person", body = crate::error::ErrorBody)
    )
)]
pub async fn delete_person(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    authorize(&auth_user, Operation::Delete)?;

    if state.repo.delete_person(id).await.map_err(ApiError::from)? {
        tracing::info!(id, "person deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound("person"))
    }
}

/// filter_people
///
/// [Admin or Guest Route] Search with the conjunctive filter, paginated.
/// Result rows use the summary shape, which leaves out `username`.
#[utoipa::path(
    get,
    path = "/api/person/filter-people/",
    params(FilterParams),
    responses(
        (status = 200, description = "One page of matches", body = Page<PersonSummary>),
        (status = 400, description = "Malformed filter value", body = crate::error::ErrorBody),
        (status = 404, description = "Page out of range", body = crate::error::ErrorBody)
    )
)]
pub async fn filter_people(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Json<Page<PersonSummary>>, ApiError> {
    authorize(&auth_user, Operation::Search)?;

    let filter = build_filter(&params)?;
    let request = PageRequest::from_params(
        params.page.as_deref(),
        params.page_size.as_deref(),
        &state.config,
    )?;

    let people = state
        .repo
        .search_people(&filter)
        .await
        .map_err(ApiError::from)?;
    let page = paginate(people, &request)?;

    Ok(Json(page.map(PersonSummary::from)))
}
