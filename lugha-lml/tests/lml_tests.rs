use lugha_lml::{import_html, parse, serialize, AttrValue, LmlError, Node};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::PathBuf;

fn get_fixture_path(filename: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("fixtures");
    path.push(filename);
    path
}

fn read_fixture(filename: &str) -> String {
    fs::read_to_string(get_fixture_path(filename)).unwrap()
}

fn top_level(doc: &Node) -> Vec<&Node> {
    let list = doc.children()[0];
    list.children()
}

// Fixtures
#[test]
fn test_answer_fixture_parses() {
    let doc = parse(&read_fixture("answer.lml")).expect("answer.lml should be valid");
    let names: Vec<_> = top_level(&doc).iter().map(|n| n.tag_name().to_string()).collect();
    assert_eq!(names, vec!["reason", "answer"]);
    assert_eq!(doc.code_block_count(), 1);
}

#[test]
fn test_notes_fixture_parses() {
    let doc = parse(&read_fixture("notes.lml")).expect("notes.lml should be valid");
    assert_eq!(top_level(&doc).len(), 7);
}

#[test]
fn test_invalid_unclosed_fixture() {
    let result = parse(&read_fixture("invalid-unclosed.lml"));
    assert!(matches!(result, Err(LmlError::Parse { .. })));
}

#[test]
fn test_invalid_attribute_fixture() {
    let err = parse(&read_fixture("invalid-attribute.lml")).unwrap_err();
    match err {
        LmlError::Parse { line, message, .. } => {
            assert_eq!(line, 1);
            assert!(message.contains("'='"), "message: {}", message);
        }
        other => panic!("Expected parse error, got {:?}", other),
    }
}

// Code content
#[test]
fn test_code_body_keeps_escaped_newlines() {
    let doc = parse(&read_fixture("answer.lml")).unwrap();
    let mut code = None;
    doc.walk(&mut |n| {
        if let Node::Code(e) = n {
            code = Some(e);
        }
    });
    let code = code.expect("code element");
    let attrs = code.attribute_map();
    assert_eq!(attrs.get("lang"), Some(&AttrValue::String("lugha".into())));
    assert!(attrs["run"].is_true());
    assert_eq!(
        code.body.as_deref().unwrap().text(),
        "fun main(): unit {\n  print(\"hello\")\n}"
    );
}

// Serializer
#[test]
fn test_fixtures_serialize_idempotently() {
    for name in ["answer.lml", "notes.lml"] {
        let doc = parse(&read_fixture(name)).unwrap();
        let once = serialize(&doc).unwrap();
        let reparsed = parse(&once).unwrap_or_else(|e| panic!("{} reparse failed: {}", name, e));
        assert_eq!(reparsed, doc, "{} changed shape", name);
        assert_eq!(serialize(&reparsed).unwrap(), once);
    }
}

#[test]
fn test_stamped_filename_is_persisted() {
    let mut doc = parse(r#"code[lang="lugha", run="true"] { `print(1)` }"#).unwrap();
    let el = doc.find_element_mut(0).unwrap();
    el.attributes
        .as_mut()
        .unwrap()
        .insert("filename", Node::string("main.lg"));

    assert_eq!(
        serialize(&doc).unwrap(),
        "code[lang=`lugha`, run=`true`, filename=`main.lg`] { `print(1)` }"
    );
}

#[test]
fn test_button_call_survives() {
    let out = serialize(&parse("button[onclick=greet(`x`, 2)] `Greet`").unwrap()).unwrap();
    assert_eq!(out, "button[onclick=greet(`x`, 2)] `Greet`");
}

// Importer
#[test]
fn test_import_output_is_valid_lml() {
    let html = concat!(
        r#"<div data-lml="answer">"#,
        r#"<h2 data-lml="h2">Hello</h2>"#,
        r#"<p data-lml="p">Press <b data-lml="b">Greet</b>.</p>"#,
        r#"<ul data-lml="ul"><li data-lml="li">one</li><li data-lml="li"><i data-lml="i">two</i></li></ul>"#,
        "</div>"
    );
    let lml = import_html(html).unwrap();
    let doc = parse(&lml).unwrap();
    assert_eq!(doc.text(), "HelloPress Greet.onetwo");
}

#[test]
fn test_import_is_lossy() {
    // Inline spacing and element kinds without markers do not come back.
    let source = "p { `Press ` button[onclick=greet()] `Greet` }";
    let html = r#"<p data-lml="p">Press <button data-lml="button">Greet</button></p>"#;
    let imported = import_html(html).unwrap();

    assert_ne!(imported, serialize(&parse(source).unwrap()).unwrap());
    assert_eq!(imported, "p { `Press `\n`Greet` }");

    let mut buttons = 0;
    parse(&imported).unwrap().walk(&mut |n| {
        if matches!(n, Node::Button(_)) {
            buttons += 1;
        }
    });
    assert_eq!(buttons, 0);
}

#[test]
fn test_ast_dumps_as_json() {
    let doc = parse("p { `x` }").unwrap();
    let json = serde_json::to_value(&doc).unwrap();
    assert_eq!(json["type"], "Document");
    let back: Node = serde_json::from_value(json).unwrap();
    assert_eq!(back, doc);
}
