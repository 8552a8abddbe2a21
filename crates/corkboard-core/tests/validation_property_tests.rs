#![allow(clippy::unwrap_used, clippy::expect_used)]

use corkboard_core::errors::{BoardError, ErrorKind, ValidationError};
use corkboard_core::rules::validation::{validate_label, validate_priority, validate_title, MAX_TITLE_LEN};
use corkboard_core::{validate_mutation, Mutation, NewIssue};
use proptest::prelude::*;

proptest! {
    #[test]
    fn priorities_in_range_are_accepted(p in 0i64..=4) {
        prop_assert!(validate_priority(p).is_ok());
    }

    #[test]
    fn priorities_out_of_range_are_rejected(p in prop_oneof![i64::MIN..0i64, 5i64..i64::MAX]) {
        prop_assert_eq!(
            validate_priority(p),
            Err(ValidationError::PriorityOutOfRange { priority: p })
        );
    }

    #[test]
    fn titles_with_visible_text_are_accepted(title in "[a-zA-Z0-9][a-zA-Z0-9 ]{0,80}") {
        prop_assert!(validate_title(&title).is_ok());
    }

    #[test]
    fn whitespace_only_titles_are_rejected(title in "[ \t\n]{0,20}") {
        prop_assert_eq!(validate_title(&title), Err(ValidationError::EmptyTitle));
    }

    #[test]
    fn labels_without_whitespace_are_accepted(label in "[a-z0-9:_-]{1,30}") {
        prop_assert!(validate_label(&label).is_ok());
    }
}

#[test]
fn test_title_length_boundary() {
    let at_limit = "x".repeat(MAX_TITLE_LEN);
    let over_limit = "x".repeat(MAX_TITLE_LEN + 1);

    assert!(validate_title(&at_limit).is_ok());
    assert_eq!(
        validate_title(&over_limit),
        Err(ValidationError::TitleTooLong { max: MAX_TITLE_LEN })
    );
}

#[test]
fn test_invalid_create_maps_to_validation_kind() {
    let m = Mutation::Create(NewIssue::new("ok").with_priority(9));
    let err: BoardError = validate_mutation(&m).unwrap_err().into();

    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.code(), "ERR_VALIDATION");
}

#[test]
fn test_bad_label_on_create_is_rejected() {
    let m = Mutation::Create(NewIssue::new("ok").with_label(""));
    assert!(matches!(
        validate_mutation(&m),
        Err(ValidationError::InvalidLabel { .. })
    ));
}
