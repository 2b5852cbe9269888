use std::collections::BTreeMap;

use serde_json::{Value, json};
use tool_runtime::{ToolError, ToolRecord, bind, validate};

#[derive(Debug, ToolRecord)]
struct Order {
    items: Vec<Item>,
    address: Option<Address>,
    backup: Option<Box<Address>>,
    labels: BTreeMap<String, Item>,
}

#[derive(Debug, ToolRecord)]
struct Item {
    #[tool("required,minLength=2")]
    name: String,
    origin: Option<Address>,
}

#[derive(Debug, ToolRecord)]
struct Address {
    #[tool("required")]
    city: String,
}

#[derive(Debug, ToolRecord)]
struct Checkout {
    items: Vec<Item>,
    #[tool("required")]
    reference: String,
}

#[derive(Debug, ToolRecord)]
struct Signup {
    #[tool("required,minLength=3")]
    user: String,
    #[tool("minimum=18")]
    age: u8,
}

fn check<T: ToolRecord>(payload: &Value) -> Result<(), (String, String)> {
    let record: T = bind(payload).unwrap();
    validate(&record).map_err(|err| match err {
        ToolError::Validation { field, message } => (field, message),
        other => panic!("expected validation error, got {other:?}"),
    })
}

fn failing_field<T: ToolRecord>(payload: &Value) -> String {
    check::<T>(payload).unwrap_err().0
}

#[test]
fn valid_nested_records_pass() {
    let payload = json!({
        "items": [{"name": "ab", "origin": {"city": "Oslo"}}],
        "address": {"city": "Bergen"},
        "backup": {"city": "Tromso"},
        "labels": {"gift": {"name": "wrap"}}
    });
    assert_eq!(check::<Order>(&payload), Ok(()));
}

#[test]
fn sequence_elements_report_indexed_paths() {
    let payload = json!({"items": [{"name": "ab"}, {"name": "x"}]});
    assert_eq!(
        check::<Order>(&payload),
        Err((
            "items[1].name".to_owned(),
            "must be at least 2 characters".to_owned()
        ))
    );
}

#[test]
fn optional_records_report_dotted_paths() {
    let payload = json!({"items": [], "address": {"city": ""}});
    assert_eq!(
        check::<Order>(&payload),
        Err(("address.city".to_owned(), "is required".to_owned()))
    );
}

#[test]
fn boxed_records_are_entered() {
    assert_eq!(failing_field::<Order>(&json!({"backup": {"city": ""}})), "backup.city");
}

#[test]
fn map_values_are_keyed_by_entry() {
    assert_eq!(
        failing_field::<Order>(&json!({"labels": {"gift": {"name": "x"}}})),
        "labels.gift.name"
    );
}

#[test]
fn paths_compose_across_levels() {
    let payload = json!({"items": [{"name": "ab", "origin": {"city": ""}}]});
    assert_eq!(failing_field::<Order>(&payload), "items[0].origin.city");
}

#[test]
fn absent_optional_records_skip_nested_checks() {
    assert_eq!(check::<Order>(&json!({})), Ok(()));
    assert_eq!(check::<Order>(&json!({"address": null, "backup": null})), Ok(()));
}

#[test]
fn own_fields_are_checked_before_nested_records() {
    let payload = json!({"items": [{"name": "x"}]});
    assert_eq!(failing_field::<Checkout>(&payload), "reference");
}

#[test]
fn earlier_sibling_subtree_fails_first() {
    let payload = json!({
        "items": [{"name": "ab", "origin": {"city": ""}}],
        "address": {"city": ""}
    });
    assert_eq!(failing_field::<Order>(&payload), "items[0].origin.city");
}

#[test]
fn first_declared_field_wins() {
    assert_eq!(
        check::<Signup>(&json!({"user": "ab", "age": 10})),
        Err(("user".to_owned(), "must be at least 3 characters".to_owned()))
    );
    assert_eq!(
        check::<Signup>(&json!({"user": "abc", "age": 10})),
        Err(("age".to_owned(), "must be >= 18".to_owned()))
    );
}
