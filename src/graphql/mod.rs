//! Static analysis of GraphQL operation documents
//!
//! Persisted operations are registered ahead of time, so everything the
//! knowledge base needs to know about an operation's inputs can be read off
//! its document without talking to the router.

use crate::error::{Error, Result};
use async_graphql_parser::types::{DocumentOperations, ExecutableDocument, VariableDefinition};
use async_graphql_parser::{parse_query, Pos};
use std::collections::BTreeSet;

/// Names (without `$`) of variables an operation cannot run without
pub type RequiredVariables = BTreeSet<String>;

/// Parse an operation document
pub fn parse_document(source: &str) -> Result<ExecutableDocument> {
    parse_query(source).map_err(|e| Error::Parse(e.to_string()))
}

/// A variable is required when its type is non-null at the top level and it
/// has no default value. `[String!]` is still optional; `[String]!` is not.
pub fn is_required(definition: &VariableDefinition) -> bool {
    !definition.var_type.node.nullable && definition.default_value.is_none()
}

/// Extract the required variables of every operation in `operation_body`
pub fn analyze(operation_body: &str) -> Result<RequiredVariables> {
    let document = parse_document(operation_body)?;
    Ok(required_variables(&document))
}

/// Required variables of an already parsed document
pub fn required_variables(document: &ExecutableDocument) -> RequiredVariables {
    document
        .operations
        .iter()
        .flat_map(|(_, operation)| operation.node.variable_definitions.iter())
        .filter(|definition| is_required(&definition.node))
        .map(|definition| definition.node.name.node.to_string())
        .collect()
}

/// Name of the first definition in the document, when that definition is a
/// named operation. Fragments and anonymous operations yield `None`, and so
/// does a document holding only fragments.
pub fn leading_operation_name(source: &str) -> Result<Option<String>> {
    let document = match parse_query(source) {
        Ok(document) => document,
        Err(async_graphql_parser::Error::MissingOperation) => return Ok(None),
        Err(e) => return Err(Error::Parse(e.to_string())),
    };

    // Named operations are keyed by name; a lone anonymous operation is not.
    let (name, operation_pos) = match &document.operations {
        DocumentOperations::Single(operation) => (None, operation.pos),
        DocumentOperations::Multiple(operations) => {
            match operations.iter().min_by_key(|(_, op)| position_key(op.pos)) {
                Some((name, op)) => (Some(name.to_string()), op.pos),
                None => return Ok(None),
            }
        }
    };

    let fragment_first = document
        .fragments
        .values()
        .any(|fragment| position_key(fragment.pos) < position_key(operation_pos));

    if fragment_first {
        return Ok(None);
    }
    Ok(name)
}

fn position_key(pos: Pos) -> (usize, usize) {
    (pos.line, pos.column)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(set: &RequiredVariables) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_non_null_without_default_is_required() {
        let required = analyze("query GetFlight($id: ID!) { flight(id: $id) { id } }").unwrap();
        assert_eq!(names(&required), vec!["id"]);
    }

    #[test]
    fn test_default_or_nullable_is_optional() {
        let body = r#"
            query Flights($x: String!, $y: String = "d", $z: String, $w: Int! = 10) {
                flights(x: $x, y: $y, z: $z, w: $w) { id }
            }
        "#;
        let required = analyze(body).unwrap();
        assert_eq!(names(&required), vec!["x"]);
    }

    #[test]
    fn test_list_nullability() {
        let body = r#"
            query Seats($a: [String!], $b: [String]!, $c: [String!]!) {
                seats(a: $a, b: $b, c: $c) { id }
            }
        "#;
        let required = analyze(body).unwrap();
        assert_eq!(names(&required), vec!["b", "c"]);
    }

    #[test]
    fn test_no_variables_is_empty() {
        let required = analyze("query AllFlights { flights { id } }").unwrap();
        assert!(required.is_empty());

        let required = analyze("{ flights { id } }").unwrap();
        assert!(required.is_empty());
    }

    #[test]
    fn test_names_have_no_sigil() {
        let required = analyze("mutation Book($seatId: ID!) { book(seatId: $seatId) }").unwrap();
        assert!(required.iter().all(|name| !name.starts_with('$')));
    }

    #[test]
    fn test_comments_are_ignored() {
        let body = "# Fetch one flight\n# by id\nquery GetFlight($id: ID!) { flight(id: $id) { id } }";
        assert_eq!(names(&analyze(body).unwrap()), vec!["id"]);
    }

    #[test]
    fn test_invalid_document_fails() {
        let err = analyze("query GetFlight($id: ID!) { flight(id: $id) { id }").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_leading_operation_name() {
        let source = "# comment\nquery GetFlight($id: ID!) { flight(id: $id) { id } }";
        assert_eq!(
            leading_operation_name(source).unwrap(),
            Some("GetFlight".to_string())
        );

        assert_eq!(leading_operation_name("{ flights { id } }").unwrap(), None);

        let fragment_first = r#"
            fragment FlightFields on Flight { id }
            query GetFlight($id: ID!) { flight(id: $id) { ...FlightFields } }
        "#;
        assert_eq!(leading_operation_name(fragment_first).unwrap(), None);

        let fragments_only = "# Shared\nfragment FlightFields on Flight { id }";
        assert_eq!(leading_operation_name(fragments_only).unwrap(), None);
        assert!(matches!(
            leading_operation_name("fragment Broken on Flight {"),
            Err(Error::Parse(_))
        ));

        let two_operations = r#"
            query Second { flights { id } }
            query Third { seats { id } }
        "#;
        assert_eq!(
            leading_operation_name(two_operations).unwrap(),
            Some("Second".to_string())
        );
    }
}
