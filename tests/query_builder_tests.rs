use chrono::{NaiveDate, Utc};
use person_registry::authz::Role;
use person_registry::error::ApiError;
use person_registry::models::Person;
use person_registry::query::{FilterParams, build_filter};

fn person(id: i64, first_name: &str, last_name: &str, age: i32) -> Person {
    let now = Utc::now();
    Person {
        id,
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
        email: format!("person{id}@example.com"),
        phone_number: None,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
        age,
        username: format!("user{id}"),
        password_hash: "unused".to_string(),
        role: Role::Guest,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}

fn params(
    first_name: Option<&str>,
    last_name: Option<&str>,
    age: Option<&str>,
) -> FilterParams {
    FilterParams {
        first_name: first_name.map(String::from),
        last_name: last_name.map(String::from),
        age: age.map(String::from),
        page: None,
        page_size: None,
    }
}

#[test]
fn no_parameters_matches_everything() {
    let filter = build_filter(&params(None, None, None)).unwrap();

    assert!(filter.is_empty());
    assert!(filter.matches(&person(1, "Nevil", "Patel", 29)));
    assert!(filter.matches(&person(2, "Ada", "Lovelace", 36)));
}

#[test]
fn blank_parameters_count_as_absent() {
    let filter = build_filter(&params(Some("  "), Some(""), Some(""))).unwrap();
    assert!(filter.is_empty());
}

#[test]
fn name_matching_is_case_insensitive_exact() {
    let filter = build_filter(&params(Some("NEVIL"), None, None)).unwrap();

    assert!(filter.matches(&person(1, "nevil", "Patel", 29)));
    assert!(filter.matches(&person(2, "Nevil", "Shah", 40)));
    // Exact match, not substring.
    assert!(!filter.matches(&person(3, "Nevilson", "Patel", 29)));
    assert!(!filter.matches(&person(4, "Nev", "Patel", 29)));
}

#[test]
fn supplied_fields_combine_conjunctively() {
    let filter = build_filter(&params(Some("nevil"), None, Some("29"))).unwrap();

    assert!(filter.matches(&person(1, "Nevil", "Patel", 29)));
    // Right name, wrong age.
    assert!(!filter.matches(&person(2, "Nevil", "Patel", 30)));
    // Right age, wrong name.
    assert!(!filter.matches(&person(3, "Ada", "Patel", 29)));
}

#[test]
fn all_three_fields_must_match() {
    let filter =
        build_filter(&params(Some("nevil"), Some("patel"), Some("29"))).unwrap();

    assert!(filter.matches(&person(1, "Nevil", "Patel", 29)));
    assert!(!filter.matches(&person(2, "Nevil", "Shah", 29)));
}

#[test]
fn age_filter_applied_to_full_set_returns_exact_matches() {
    let people = vec![
        person(1, "Nevil", "Patel", 29),
        person(2, "Ada", "Lovelace", 36),
        person(3, "Grace", "Hopper", 29),
    ];

    let filter = build_filter(&params(None, None, Some("29"))).unwrap();
    let matched: Vec<i64> = people
        .iter()
        .filter(|p| filter.matches(p))
        .map(|p| p.id)
        .collect();

    assert_eq!(matched, vec![1, 3]);
}

#[test]
fn malformed_age_is_a_validation_error() {
    let err = build_filter(&params(None, None, Some("abc"))).unwrap_err();

    assert_eq!(err.kind(), "validation_error");
    assert!(matches!(err, ApiError::Validation { field: "age", .. }));
}

#[test]
fn negative_age_value_still_parses() {
    // A negative age matches nothing in practice, but it is an integer and
    // therefore not a malformed filter value.
    let filter = build_filter(&params(None, None, Some("-1"))).unwrap();
    assert_eq!(filter.age(), Some(-1));
}
