//! Tests for marker recognition and the stability of the parsed AST.

mod common;
use common::*;

use sqlbind_core::QueryPart;

/// Concatenates the source projection of every part.
fn reconstruct(input: &str) -> String {
    let parsed = parse_ok(input);
    let mut rebuilt = String::new();
    for part in parsed.parts() {
        match part {
            QueryPart::Bypass { chunk } => rebuilt.push_str(chunk),
            QueryPart::Input { raw, .. } | QueryPart::Output { raw, .. } => {
                rebuilt.push_str(raw);
            }
        }
    }
    rebuilt
}

#[test]
fn ast_debug_format_is_stable() {
    let parsed = parse_ok("SELECT p.* AS &Person.* FROM person WHERE name = $Address.street");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[SELECT ] Output[[p.*] [Person.*]] \
         Bypass[ FROM person WHERE name = ] Input[Address.street]]"
    );
}

#[test]
fn string_literal_with_doubled_quote() {
    let parsed = parse_ok("SELECT foo FROM t WHERE x = 'O''Donnell'");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[SELECT foo FROM t WHERE x = ] Bypass['O''Donnell']]"
    );
}

#[test]
fn double_quoted_literal_with_doubled_quote() {
    let parsed = parse_ok(r#"SELECT foo FROM t WHERE x = "he said ""hi""""#);
    assert_eq!(
        parsed.to_string(),
        r#"[Bypass[SELECT foo FROM t WHERE x = ] Bypass["he said ""hi"""]]"#
    );
}

#[test]
fn literals_and_comments_round_trip() {
    for input in [
        "SELECT 'it''s' FROM t",
        r#"SELECT "col ""x""" FROM t"#,
        "SELECT a -- trailing comment",
        "SELECT a -- comment\nFROM t",
        "SELECT a /* inline */ FROM t",
        "SELECT a /* multi\nline */ FROM t",
    ] {
        assert_eq!(reconstruct(input), input, "round trip failed for: {input}");
    }
}

#[test]
fn reconstruction_covers_markers() {
    for input in [
        "SELECT &Person.* FROM person WHERE name = $Address.street",
        "SELECT (a.district, a.street) AS &Address.* FROM address AS a",
        "SELECT (c1, c2) AS (&Person.name, &Person.id) FROM t",
        "SELECT &(Person.name, Person.id) FROM t",
        "INSERT INTO t VALUES $Ids[:]",
        "UPDATE person SET name = $Person.name WHERE id = $Person.id",
    ] {
        assert_eq!(reconstruct(input), input, "reconstruction failed for: {input}");
    }
}

#[test]
fn markers_inside_literals_and_comments_are_bypass() {
    for input in [
        "SELECT '&Person.*' FROM t",
        "SELECT \"$Address.street\" FROM t",
        "SELECT a -- &Person.* $Address.street\nFROM t",
        "SELECT a /* &Person.* */ FROM t",
    ] {
        let parsed = parse_ok(input);
        for part in parsed.parts() {
            assert!(
                matches!(part, QueryPart::Bypass { .. }),
                "expected only bypass parts for: {input}, got {part}"
            );
        }
    }
}

#[test]
fn escaped_metacharacters_pass_through() {
    let parsed = parse_ok(r"SELECT a \& b FROM t WHERE c = \$d");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[SELECT a ] Bypass[&] Bypass[ b FROM t WHERE c = ] Bypass[$] Bypass[d]]"
    );
}

#[test]
fn input_star_and_slice_forms() {
    let parsed = parse_ok("INSERT INTO person VALUES $Person.*");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[INSERT INTO person VALUES ] Input[Person.*]]"
    );

    let parsed = parse_ok("SELECT x FROM t WHERE id IN $Ids[:]");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[SELECT x FROM t WHERE id IN ] Input[Ids[:]]]"
    );
}

#[test]
fn output_forms() {
    let cases = [
        ("SELECT &Person.* FROM t", "Output[[] [Person.*]]"),
        ("SELECT &Person.id FROM t", "Output[[] [Person.id]]"),
        (
            "SELECT &(Person.id, Address.id) FROM t",
            "Output[[] [Person.id Address.id]]",
        ),
        (
            "SELECT street AS &Address.street FROM t",
            "Output[[street] [Address.street]]",
        ),
        (
            "SELECT (c1, c2) AS (&Person.id, &Person.name) FROM t",
            "Output[[c1 c2] [Person.id Person.name]]",
        ),
        ("SELECT t.* AS &Person.* FROM t", "Output[[t.*] [Person.*]]"),
        ("SELECT * AS &Person.* FROM t", "Output[[*] [Person.*]]"),
        (
            "SELECT (c1, c2) AS &Person.* FROM t",
            "Output[[c1 c2] [Person.*]]",
        ),
    ];
    for (input, expected) in cases {
        let parsed = parse_ok(input);
        let rendered = parsed.to_string();
        assert!(
            rendered.contains(expected),
            "expected {expected} in {rendered} for: {input}"
        );
    }
}

#[test]
fn marker_needs_preceding_boundary() {
    // Mid-word metacharacters stay bypass.
    let parsed = parse_ok("SELECT a&b, c$d FROM t");
    assert_eq!(parsed.to_string(), "[Bypass[SELECT a&b, c$d FROM t]]");
}

#[test]
fn markers_after_list_punctuation() {
    let parsed = parse_ok("SELECT &Person.id,&Address.id FROM t WHERE x =$Person.id");
    assert_eq!(
        parsed.to_string(),
        "[Bypass[SELECT ] Output[[] [Person.id]] Bypass[,] Output[[] [Address.id]] \
         Bypass[ FROM t WHERE x =] Input[Person.id]]"
    );
}

#[test]
fn whitespace_variants_between_tokens() {
    let parsed = parse_ok("SELECT (c1,\tc2)\nAS\n(&Person.id,\r\n&Person.name) FROM t");
    assert_eq!(
        parsed.parts().len(),
        3,
        "expected bypass, output, bypass: {parsed}"
    );
}
