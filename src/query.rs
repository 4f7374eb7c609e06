use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::ApiError, models::Person};

/// FilterParams
///
/// Raw query parameters accepted by the filter endpoint. Everything arrives
/// as an optional string; unknown parameters are dropped by serde rather
/// than rejected, keeping the endpoint forgiving. `page`/`page_size` ride
/// along here and are handed to the paginator untouched.
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct FilterParams {
    /// Case-insensitive exact match on first name.
    pub first_name: Option<String>,
    /// Case-insensitive exact match on last name.
    pub last_name: Option<String>,
    /// Exact integer match on age.
    pub age: Option<String>,
    pub page: Option<String>,
    pub page_size: Option<String>,
}

/// PersonFilter
///
/// Validated conjunctive filter over person records. Names are stored
/// lowercased so both evaluation paths compare the same way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersonFilter {
    first_name: Option<String>,
    last_name: Option<String>,
    age: Option<i32>,
}

impl PersonFilter {
    /// True when no criteria were supplied; the filter matches everything.
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none() && self.last_name.is_none() && self.age.is_none()
    }

    pub fn first_name(&self) -> Option<&str> {
        self.first_name.as_deref()
    }

    pub fn last_name(&self) -> Option<&str> {
        self.last_name.as_deref()
    }

    pub fn age(&self) -> Option<i32> {
        self.age
    }

    /// The predicate form: a record matches when every supplied criterion
    /// holds. Used by the in-memory store; the Postgres store renders the
    /// same conditions as SQL.
    pub fn matches(&self, person: &Person) -> bool {
        if let Some(first_name) = &self.first_name {
            if person.first_name.to_lowercase() != *first_name {
                return false;
            }
        }
        if let Some(last_name) = &self.last_name {
            if person.last_name.to_lowercase() != *last_name {
                return false;
            }
        }
        if let Some(age) = self.age {
            if person.age != age {
                return false;
            }
        }
        true
    }
}

/// build_filter
///
/// Translates raw request parameters into a [`PersonFilter`].
///
/// - blank values count as absent, so `?first_name=` lists everyone;
/// - name matching is case-insensitive exact (documented decision, see
///   DESIGN.md);
/// - a non-integer `age` is a validation error naming the field, never a
///   silently dropped or zeroed criterion.
pub fn build_filter(params: &FilterParams) -> Result<PersonFilter, ApiError> {
    let first_name = params
        .first_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase);

    let last_name = params
        .last_name
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase);

    let age = match params.age.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
        None => None,
        Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
            ApiError::validation("age", format!("age must be an integer, got '{raw}'"))
        })?),
    };

    Ok(PersonFilter {
        first_name,
        last_name,
        age,
    })
}
