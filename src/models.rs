use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{authz::Role, error::ApiError};

// --- Core Application Schemas (Mapped to Database) ---

/// Person
///
/// Canonical identity record from the `people` table. Deliberately not
/// `Serialize`: responses go through [`PersonResponse`]/[`PersonSummary`]
/// so the password hash can never leak into a payload.
#[derive(Debug, Clone, FromRow)]
pub struct Person {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
    /// Derived from `date_of_birth` on every write, mirrored into the table
    /// so the search path can match on it.
    pub age: i32,
    pub username: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Inactive people cannot log in and their sessions stop resolving.
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session
///
/// One row per live login. The token's `sid` claim points here; logout
/// deletes the row, which revokes the token before its `exp`.
#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub person_id: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// calculate_age
///
/// Whole years between `date_of_birth` and `today`, counting the birthday
/// itself as completed.
pub fn calculate_age(date_of_birth: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - date_of_birth.year();
    if (today.month(), today.day()) < (date_of_birth.month(), date_of_birth.day()) {
        age -= 1;
    }
    age
}

// --- Request Payloads (Input Schemas) ---

/// Login payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// CreatePersonRequest
///
/// Input for POST /api/person/. Carries every Person field except `id`
/// (store-assigned) and `age` (always derived from `date_of_birth`).
/// `role` defaults to Guest when omitted and is immutable afterwards.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreatePersonRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
    pub username: String,
    pub password: String,
    pub role: Option<Role>,
}

impl CreatePersonRequest {
    /// Field-level validation; duplicate checks happen in the store.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        validate_required("username", &self.username)?;
        validate_required("password", &self.password)?;
        validate_required("first_name", &self.first_name)?;
        validate_required("last_name", &self.last_name)?;
        validate_email(&self.email)?;
        validate_date_of_birth(self.date_of_birth, today)?;
        Ok(())
    }
}

/// UpdatePersonRequest
///
/// Partial update payload for PATCH /api/person/{id}/. Absent fields keep
/// their current value. `role` is intentionally not here; roles are fixed
/// at creation.
#[derive(Debug, Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct UpdatePersonRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl UpdatePersonRequest {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.phone_number.is_none()
            && self.date_of_birth.is_none()
            && self.username.is_none()
            && self.password.is_none()
    }

    /// Validates only the supplied fields.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ApiError> {
        if let Some(username) = &self.username {
            validate_required("username", username)?;
        }
        if let Some(password) = &self.password {
            validate_required("password", password)?;
        }
        if let Some(first_name) = &self.first_name {
            validate_required("first_name", first_name)?;
        }
        if let Some(last_name) = &self.last_name {
            validate_required("last_name", last_name)?;
        }
        if let Some(email) = &self.email {
            validate_email(email)?;
        }
        if let Some(date_of_birth) = self.date_of_birth {
            validate_date_of_birth(date_of_birth, today)?;
        }
        Ok(())
    }
}

fn validate_required(field: &'static str, value: &str) -> Result<(), ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::validation(field, format!("{field} must not be empty")));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), ApiError> {
    if email.trim().is_empty() {
        return Err(ApiError::validation("email", "email must not be empty"));
    }
    // Address syntax beyond this is the mail system's problem.
    if !email.contains('@') {
        return Err(ApiError::validation("email", "email must contain '@'"));
    }
    Ok(())
}

fn validate_date_of_birth(date_of_birth: NaiveDate, today: NaiveDate) -> Result<(), ApiError> {
    // Age must be non-negative, so a future birth date is rejected here.
    if date_of_birth > today {
        return Err(ApiError::validation(
            "date_of_birth",
            "date_of_birth must not be in the future",
        ));
    }
    Ok(())
}

// --- Store Write Payloads ---

/// Validated insert payload handed to the repository. The password has
/// already been hashed and `age` derived by the handler.
#[derive(Debug, Clone)]
pub struct NewPerson {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub username: String,
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
}

/// Validated column changes for a partial update. `age` is populated by the
/// handler whenever `date_of_birth` changes.
#[derive(Debug, Clone, Default)]
pub struct PersonChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub age: Option<i32>,
    pub username: Option<String>,
    pub password_hash: Option<String>,
}

// --- Response Schemas (Output) ---

/// PersonResponse
///
/// Full person view for the admin CRUD endpoints. The password never
/// appears; the field set matches the create payload plus `id` and `age`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonResponse {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub username: String,
    pub role: Role,
}

impl From<Person> for PersonResponse {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            phone_number: person.phone_number,
            date_of_birth: person.date_of_birth,
            age: person.age,
            username: person.username,
            role: person.role,
        }
    }
}

/// PersonSummary
///
/// Search-result view returned by the filter endpoint. Guests can reach
/// that endpoint, so the login identifier (`username`) is left out.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PersonSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub date_of_birth: NaiveDate,
    pub age: i32,
}

impl From<Person> for PersonSummary {
    fn from(person: Person) -> Self {
        Self {
            id: person.id,
            first_name: person.first_name,
            last_name: person.last_name,
            email: person.email,
            phone_number: person.phone_number,
            date_of_birth: person.date_of_birth,
            age: person.age,
        }
    }
}

/// Body of a successful login.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginResponse {
    pub message: String,
    /// Bearer token for subsequent requests.
    pub token: String,
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}
