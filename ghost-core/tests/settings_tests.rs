//! Settings error messages and on-disk format.

use assert_fs::prelude::*;
use ghost_core::{settings, CoreError};
use predicates::prelude::predicate;

#[test]
fn corrupt_yaml_returns_parse_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ghost/config.yaml")
        .write_str(": : corrupt : yaml : !!!\n  - broken: [unclosed")
        .expect("write");

    let err = settings::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"), "got: {err}");
}

#[test]
fn empty_file_is_treated_as_defaults() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ghost/config.yaml").write_str("\n").expect("write");
    let loaded = settings::load_at(home.path()).expect("load");
    assert!(loaded.smtp.is_none());
    assert!(loaded.site_contacts.is_empty());
}

#[test]
fn saved_file_is_human_readable_yaml() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    settings::update_at(home.path(), |s| {
        s.site_contacts
            .insert("abc123".to_string(), vec!["owner@example.com".to_string()]);
    })
    .expect("update");

    home.child(".ghost/config.yaml")
        .assert(predicate::str::contains("site_contacts"))
        .assert(predicate::str::contains("owner@example.com"));
}

#[test]
fn contacts_written_by_hand_are_loaded() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".ghost/config.yaml")
        .write_str("site_contacts:\n  s1:\n    - a@example.com\n    - b@example.com\n")
        .expect("write");
    let loaded = settings::load_at(home.path()).expect("load");
    assert_eq!(loaded.contacts_for("s1").len(), 2);
}
