use super::*;

#[test]
fn builder_assigns_unique_ids_and_line_spans() {
    let mut b = AstBuilder::new();
    let left = b.int(1);
    let right = b.int(2);
    let sum = b.binary(BinaryOp::Add, left.clone(), right.clone());

    assert_ne!(left.id, right.id);
    assert_ne!(right.id, sum.id);
    assert_eq!(sum.span.start_line, sum.id.to_raw() as usize);
}

#[test]
fn source_file_survives_json_round_trip() {
    let mut b = AstBuilder::new();
    let x = b.param("x", TypeAnnotation::simple("String").nullable());
    let read = b.name("x");
    let function = b
        .function("describe")
        .param(x)
        .returns(TypeAnnotation::simple("Any").nullable())
        .expression_body(read)
        .declaration();
    let file = b.file("main.tn", Some("demo"), Vec::new(), vec![function]);

    let json = serde_json::to_string(&file).expect("serialize");
    let restored: SourceFile = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(restored, file);
}

#[test]
fn import_visible_name_prefers_alias() {
    let mut b = AstBuilder::new();
    let mut import = b.import("lib.text.format");
    assert_eq!(import.visible_name(), Some("format"));
    import.alias = Some("fmt".into());
    assert_eq!(import.visible_name(), Some("fmt"));
    let star = b.star_import("lib.text");
    assert_eq!(star.visible_name(), None);
}

#[test]
fn type_annotation_display_matches_source_form() {
    let list = TypeAnnotation::generic("List", vec![TypeAnnotation::simple("String").nullable()]);
    assert_eq!(list.to_string(), "List<String?>");
    let function = TypeAnnotation::function(
        vec![TypeAnnotation::simple("Int")],
        TypeAnnotation::simple("Unit"),
    )
    .nullable();
    assert_eq!(function.to_string(), "((Int) -> Unit)?");
}

#[test]
fn span_merge_covers_both_ranges() {
    let first = Span::new(2, 4, 2, 9);
    let second = Span::new(1, 7, 3, 1);
    assert_eq!(first.merge(&second), Span::new(1, 7, 3, 1));
}
