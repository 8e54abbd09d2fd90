use smime_assembler::{AddressField, AddressSet, AddressValidator, AssemblyError};

fn addresses(set: &AddressSet) -> Vec<&str> {
    set.iter().map(|a| a.as_str()).collect()
}

#[test]
fn duplicates_collapse_across_separators() {
    let set = AddressValidator::validate("a@x.com; a@x.com, b@x.com", AddressField::Cc)
        .expect("valid field");
    assert_eq!(addresses(&set), vec!["a@x.com", "b@x.com"]);

    let reordered = AddressValidator::validate("b@x.com,a@x.com", AddressField::Cc).unwrap();
    assert_eq!(set, reordered);
}

#[test]
fn one_bad_token_fails_the_whole_field() {
    let err = AddressValidator::validate("a@x.com; not an address; b@x.com", AddressField::Bcc)
        .unwrap_err();
    assert!(matches!(err, AssemblyError::InvalidAddress(AddressField::Bcc)));
}

#[test]
fn trailing_dot_is_rejected() {
    let err = AddressValidator::validate_single("a@x.com.", AddressField::From).unwrap_err();
    assert!(matches!(err, AssemblyError::InvalidAddress(AddressField::From)));

    let err = AddressValidator::validate("ok@x.com, a@x.com.", AddressField::Recipient).unwrap_err();
    assert!(matches!(err, AssemblyError::InvalidAddress(AddressField::Recipient)));
}

#[test]
fn display_names_are_not_silently_repaired() {
    for raw in ["Alice <a@x.com>", "<a@x.com>", "a@@x.com", "a..b@x.com", ".a@x.com"] {
        assert!(
            AddressValidator::validate_single(raw, AddressField::ReplyTo).is_err(),
            "{raw} should be rejected"
        );
    }
}

#[test]
fn required_field_needs_an_address() {
    for raw in ["", "   ", " ; , "] {
        let err = AddressValidator::validate_required(raw, AddressField::Recipient).unwrap_err();
        assert!(matches!(err, AssemblyError::InvalidAddress(AddressField::Recipient)));
    }
}

#[test]
fn optional_field_may_be_empty() {
    let set = AddressValidator::validate("", AddressField::Cc).unwrap();
    assert!(set.is_empty());
}

#[test]
fn error_names_the_field() {
    let err = AddressValidator::validate("nope", AddressField::Bcc).unwrap_err();
    assert_eq!(err.to_string(), "Invalid recipient (BCC) address");
}
