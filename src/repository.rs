use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Postgres, query_builder::QueryBuilder};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    models::{NewPerson, Person, PersonChanges, Session},
    query::PersonFilter,
};

/// Failures surfaced by the persistence layer. Unique-constraint conflicts
/// get their own variant so the API boundary can report which field
/// collided; everything else stays a database error.
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("duplicate {field}")]
    Duplicate { field: &'static str },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Repository
///
/// Abstract contract for all persistence operations, shared across handlers
/// as `Arc<dyn Repository>`. Concrete implementations: [`PostgresRepository`]
/// for deployments and [`MemoryRepository`] for tests and demo runs.
///
/// Reads that feed pagination (`list_people`, `search_people`) return the
/// full match set ordered by id ascending; the paginator slices it.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- People ---
    async fn list_people(&self) -> Result<Vec<Person>, RepositoryError>;
    async fn get_person(&self, id: i64) -> Result<Option<Person>, RepositoryError>;
    async fn find_person_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Person>, RepositoryError>;
    async fn create_person(&self, new: NewPerson) -> Result<Person, RepositoryError>;
    /// Applies the provided changes; absent fields keep their value.
    /// Returns `None` when the id does not exist.
    async fn update_person(
        &self,
        id: i64,
        changes: PersonChanges,
    ) -> Result<Option<Person>, RepositoryError>;
    /// Returns true only when a row was actually removed.
    async fn delete_person(&self, id: i64) -> Result<bool, RepositoryError>;
    async fn search_people(&self, filter: &PersonFilter) -> Result<Vec<Person>, RepositoryError>;

    // --- Sessions ---
    async fn create_session(&self, session: Session) -> Result<(), RepositoryError>;
    /// Resolves a live session; expired rows are treated as absent.
    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, RepositoryError>;
    async fn delete_session(&self, id: Uuid) -> Result<bool, RepositoryError>;
}

/// Shared handle to the persistence layer.
pub type RepositoryState = Arc<dyn Repository>;

const PERSON_COLUMNS: &str = "id, first_name, last_name, email, phone_number, date_of_birth, \
     age, username, password_hash, role, is_active, created_at, updated_at";

/// PostgresRepository
///
/// The production implementation, backed by a sqlx connection pool.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Maps a write failure, pulling unique violations out into `Duplicate`
/// with the colliding field derived from the constraint name.
fn map_write_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            let field = match db_err.constraint() {
                Some(constraint) if constraint.contains("username") => "username",
                Some(constraint) if constraint.contains("email") => "email",
                _ => "record",
            };
            return RepositoryError::Duplicate { field };
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn list_people(&self) -> Result<Vec<Person>, RepositoryError> {
        let people = sqlx::query_as::<_, Person>(&format!(
            "SELECT {PERSON_COLUMNS} FROM people ORDER BY id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(people)
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    async fn find_person_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Person>, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(&format!(
            "SELECT {PERSON_COLUMNS} FROM people WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(person)
    }

    async fn create_person(&self, new: NewPerson) -> Result<Person, RepositoryError> {
        let person = sqlx::query_as::<_, Person>(&format!(
            "INSERT INTO people \
                 (first_name, last_name, email, phone_number, date_of_birth, age, \
                  username, password_hash, role, is_active, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW()) \
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(new.first_name)
        .bind(new.last_name)
        .bind(new.email)
        .bind(new.phone_number)
        .bind(new.date_of_birth)
        .bind(new.age)
        .bind(new.username)
        .bind(new.password_hash)
        .bind(new.role.as_str())
        .bind(new.is_active)
        .fetch_one(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(person)
    }

    async fn update_person(
        &self,
        id: i64,
        changes: PersonChanges,
    ) -> Result<Option<Person>, RepositoryError> {
        // COALESCE keeps the stored value for every column the caller left
        // out of the patch.
        let person = sqlx::query_as::<_, Person>(&format!(
            "UPDATE people SET \
                 first_name = COALESCE($2, first_name), \
                 last_name = COALESCE($3, last_name), \
                 email = COALESCE($4, email), \
                 phone_number = COALESCE($5, phone_number), \
                 date_of_birth = COALESCE($6, date_of_birth), \
                 age = COALESCE($7, age), \
                 username = COALESCE($8, username), \
                 password_hash = COALESCE($9, password_hash), \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {PERSON_COLUMNS}"
        ))
        .bind(id)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .bind(changes.email)
        .bind(changes.phone_number)
        .bind(changes.date_of_birth)
        .bind(changes.age)
        .bind(changes.username)
        .bind(changes.password_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_write_error)?;
        Ok(person)
    }

    async fn delete_person(&self, id: i64) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM people WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn search_people(&self, filter: &PersonFilter) -> Result<Vec<Person>, RepositoryError> {
        // Same conditions as PersonFilter::matches, rendered as SQL with
        // bound parameters.
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {PERSON_COLUMNS} FROM people"));

        let mut prefix = " WHERE ";
        if let Some(first_name) = filter.first_name() {
            builder.push(prefix);
            builder.push("LOWER(first_name) = ");
            builder.push_bind(first_name.to_string());
            prefix = " AND ";
        }
        if let Some(last_name) = filter.last_name() {
            builder.push(prefix);
            builder.push("LOWER(last_name) = ");
            builder.push_bind(last_name.to_string());
            prefix = " AND ";
        }
        if let Some(age) = filter.age() {
            builder.push(prefix);
            builder.push("age = ");
            builder.push_bind(age);
        }

        builder.push(" ORDER BY id ASC");

        let people = builder
            .build_query_as::<Person>()
            .fetch_all(&self.pool)
            .await?;
        Ok(people)
    }

    async fn create_session(&self, session: Session) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO sessions (id, person_id, created_at, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(session.id)
        .bind(session.person_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let session = sqlx::query_as::<_, Session>(
            "SELECT id, person_id, created_at, expires_at FROM sessions \
             WHERE id = $1 AND expires_at > NOW()",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

/// MemoryRepository
///
/// In-process implementation of the same contract, used by the test suite
/// and available for database-free demo runs. Filtering goes through
/// `PersonFilter::matches`, so both stores share one predicate definition.
#[derive(Default)]
pub struct MemoryRepository {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    people: Vec<Person>,
    sessions: HashMap<Uuid, Session>,
    next_id: i64,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().expect("memory repository state poisoned")
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn list_people(&self) -> Result<Vec<Person>, RepositoryError> {
        let state = self.lock();
        let mut people = state.people.clone();
        people.sort_by_key(|p| p.id);
        Ok(people)
    }

    async fn get_person(&self, id: i64) -> Result<Option<Person>, RepositoryError> {
        let state = self.lock();
        Ok(state.people.iter().find(|p| p.id == id).cloned())
    }

    async fn find_person_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Person>, RepositoryError> {
        let state = self.lock();
        Ok(state.people.iter().find(|p| p.username == username).cloned())
    }

    async fn create_person(&self, new: NewPerson) -> Result<Person, RepositoryError> {
        let mut state = self.lock();

        if state.people.iter().any(|p| p.username == new.username) {
            return Err(RepositoryError::Duplicate { field: "username" });
        }
        if state.people.iter().any(|p| p.email == new.email) {
            return Err(RepositoryError::Duplicate { field: "email" });
        }

        state.next_id += 1;
        let now = Utc::now();
        let person = Person {
            id: state.next_id,
            first_name: new.first_name,
            last_name: new.last_name,
            email: new.email,
            phone_number: new.phone_number,
            date_of_birth: new.date_of_birth,
            age: new.age,
            username: new.username,
            password_hash: new.password_hash,
            role: new.role,
            is_active: new.is_active,
            created_at: now,
            updated_at: now,
        };
        state.people.push(person.clone());
        Ok(person)
    }

    async fn update_person(
        &self,
        id: i64,
        changes: PersonChanges,
    ) -> Result<Option<Person>, RepositoryError> {
        let mut state = self.lock();

        if let Some(username) = &changes.username {
            if state.people.iter().any(|p| p.id != id && p.username == *username) {
                return Err(RepositoryError::Duplicate { field: "username" });
            }
        }
        if let Some(email) = &changes.email {
            if state.people.iter().any(|p| p.id != id && p.email == *email) {
                return Err(RepositoryError::Duplicate { field: "email" });
            }
        }

        let Some(person) = state.people.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };

        if let Some(first_name) = changes.first_name {
            person.first_name = first_name;
        }
        if let Some(last_name) = changes.last_name {
            person.last_name = last_name;
        }
        if let Some(email) = changes.email {
            person.email = email;
        }
        if let Some(phone_number) = changes.phone_number {
            person.phone_number = Some(phone_number);
        }
        if let Some(date_of_birth) = changes.date_of_birth {
            person.date_of_birth = date_of_birth;
        }
        if let Some(age) = changes.age {
            person.age = age;
        }
        if let Some(username) = changes.username {
            person.username = username;
        }
        if let Some(password_hash) = changes.password_hash {
            person.password_hash = password_hash;
        }
        person.updated_at = Utc::now();

        Ok(Some(person.clone()))
    }

    async fn delete_person(&self, id: i64) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        let before = state.people.len();
        state.people.retain(|p| p.id != id);
        Ok(state.people.len() < before)
    }

    async fn search_people(&self, filter: &PersonFilter) -> Result<Vec<Person>, RepositoryError> {
        let state = self.lock();
        let mut people: Vec<Person> = state
            .people
            .iter()
            .filter(|p| filter.matches(p))
            .cloned()
            .collect();
        people.sort_by_key(|p| p.id);
        Ok(people)
    }

    async fn create_session(&self, session: Session) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        state.sessions.insert(session.id, session);
        Ok(())
    }

    async fn get_session(&self, id: Uuid) -> Result<Option<Session>, RepositoryError> {
        let state = self.lock();
        Ok(state
            .sessions
            .get(&id)
            .filter(|s| s.expires_at > Utc::now())
            .cloned())
    }

    async fn delete_session(&self, id: Uuid) -> Result<bool, RepositoryError> {
        let mut state = self.lock();
        Ok(state.sessions.remove(&id).is_some())
    }
}
