use hydragraph::error::TransformError;
use pretty_assertions::assert_eq;

use crate::support::first_error;
use crate::support::transform;

#[test]
fn rejects_undefined_implemented_interface() {
    let message = first_error(
        r#"
        interface Entity @implements(interface: "NonExistingInterface") {
          name: String!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"The "NonExistingInterface" in `interface Entity @implements(interface: "NonExistingInterface")` is not defined in the schema"#
    );
}

#[test]
fn rejects_implementing_a_non_interface() {
    let message = first_error(
        r#"
        interface Entity @implements(interface: "String") {
          name: String!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"The "String" in `interface Entity @implements(interface: "String")` is not an interface type"#
    );
}

#[test]
fn names_object_types_with_their_keyword() {
    let message = first_error(
        r#"
        type Entity @implements(interface: "Missing") {
          name: String!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"The "Missing" in `type Entity @implements(interface: "Missing")` is not defined in the schema"#
    );
}

#[test]
fn rejects_native_implementation_of_node() {
    let message = first_error(
        r#"
        type Entity implements Node {
          id: ID!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"Type "Entity" cannot implement "Node" interface directly. Please use @implements directive instead"#
    );
}

#[test]
fn reports_every_orphan_of_the_chain() {
    let message = first_error(
        r#"
        interface Entity @implements(interface: "Node") {
          name: String!
        }
        interface Component {
          name: String!
        }
        interface WebComponent @implements(interface: "Component") {
          name: String!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"The following interfaces are not in @implements chain from "Node": WebComponent, Component"#
    );
}

#[test]
fn collects_every_error_of_a_stage() {
    let error = transform(
        r#"
        interface Entity @implements(interface: "Missing") {
          name: String!
        }
        type Component @implements(interface: "String") {
          name: String!
        }
        "#,
    )
    .expect_err("two broken edges");
    let TransformError::Multiple(errors) = &error else {
        panic!("expected multiple errors, got {error:?}");
    };
    let codes: Vec<_> = errors.errors.iter().map(|error| error.code()).collect();
    assert_eq!(
        codes,
        vec!["UNDEFINED_IMPLEMENTS_TARGET", "IMPLEMENTS_TARGET_NOT_INTERFACE"]
    );
    insta::assert_snapshot!(error, @r#"
    The "Missing" in `interface Entity @implements(interface: "Missing")` is not defined in the schema
    The "String" in `type Component @implements(interface: "String")` is not an interface type
    "#);
}

#[test]
fn reports_native_implementations_inside_the_chain() {
    let message = first_error(
        r#"
        extend interface Node @discriminates(with: "kind")

        interface Entity @implements(interface: "Node") {
          name: String!
        }
        interface Component implements Entity @implements(interface: "Node") {
          name: String!
        }
        "#,
        false,
    );
    assert_eq!(
        message,
        r#"The "Component" interface implements some interface without @implements directive"#
    );
}

#[test]
fn reports_invalid_graphql() {
    let error = transform("type Entity { name: Strin }").expect_err("unknown type");
    assert!(error.to_string().contains("Strin"), "{error}");
}
