use std::fs;
use std::sync::Arc;
use std::thread;

use vql_lang::config::{EngineConfig, IntervalFields};
use vql_lang::output::{JsonSink, MemorySink, TextSink};
use vql_lang::value::COUNT_FIELD;
use vql_lang::{
    Engine, ErrorKind, Feature, FeatureSet, MemoryLoader, MemoryWordSets, Outcome,
    SharedWorkspace, Table, Value, VqlError, Workspace,
};

fn variant(chr: &str, pos: i64, gene: &str, score: i64) -> Feature {
    Feature::new()
        .with("chr", chr)
        .with("pos", pos)
        .with("gene", gene)
        .with("score", score)
}

fn workspace() -> Workspace {
    let mut ws = Workspace::new();
    ws.bind(
        "variants",
        FeatureSet::new(
            "variants",
            vec![
                variant("chr1", 100, "CFTR", 12),
                variant("chr1", 200, "CFTR", 3),
                variant("chr2", 150, "GJB2", 40),
                variant("chr2", 300, "BRCA1", 10),
                variant("chr3", 50, "BRCA2", 9),
            ],
        ),
    );
    ws
}

fn run_one(engine: &Engine, ws: &mut Workspace, text: &str) -> Result<Outcome, VqlError> {
    let mut outcomes = engine.run(ws, text)?;
    assert_eq!(outcomes.len(), 1, "Expected one outcome for: {}", text);
    Ok(outcomes.remove(0))
}

fn rows(outcome: Outcome) -> Table {
    match outcome {
        Outcome::Rows(table) | Outcome::Show(table) => table,
        other => panic!("Expected a table, got {:?}", other),
    }
}

fn count(engine: &Engine, ws: &mut Workspace, source: &str) -> usize {
    match run_one(engine, ws, &format!("COUNT FROM {}", source)).unwrap() {
        Outcome::Count(n) => n,
        other => panic!("Expected a count, got {:?}", other),
    }
}

// ============================================================================
// SELECT
// ============================================================================

#[test]
fn test_select_projects_matching_features() {
    let engine = Engine::new();
    let mut ws = workspace();
    let table = rows(
        run_one(&engine, &mut ws, "SELECT gene, pos FROM variants WHERE chr = 'chr1'").unwrap(),
    );
    assert_eq!(table.columns, vec!["gene", "pos"]);
    assert_eq!(
        table.rows,
        vec![
            vec![Value::from("CFTR"), Value::Integer(100)],
            vec![Value::from("CFTR"), Value::Integer(200)],
        ]
    );
}

#[test]
fn test_select_without_from_reads_default_source() {
    let engine = Engine::new();
    let mut ws = workspace();
    let table = rows(run_one(&engine, &mut ws, "SELECT gene WHERE score > 30").unwrap());
    assert_eq!(table.rows, vec![vec![Value::from("GJB2")]]);

    let config = EngineConfig {
        default_source: "calls".into(),
        ..EngineConfig::default()
    };
    let err = run_one(&Engine::with_config(config), &mut ws, "SELECT gene").unwrap_err();
    assert!(matches!(err, VqlError::UnknownSet(ref n) if n == "calls"));
}

#[test]
fn test_engine_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("panel.txt"), "CFTR\nGJB2\n").unwrap();
    let path = dir.path().join("engine.json");
    fs::write(
        &path,
        format!(
            r#"{{"default_source": "calls", "wordset_dir": {:?}}}"#,
            dir.path().to_str().unwrap()
        ),
    )
    .unwrap();

    let engine = Engine::from_config_file(&path).unwrap();
    assert_eq!(engine.config().default_source, "calls");

    let mut ws = workspace();
    let variants = ws.get("variants").unwrap();
    ws.bind("calls", FeatureSet::clone(&variants));
    let outcome = run_one(&engine, &mut ws, "SELECT gene WHERE gene in WORDSET['panel']").unwrap();
    assert_eq!(rows(outcome).len(), 3);
}

#[test]
fn test_select_group_by_appends_count() {
    let engine = Engine::new();
    let mut ws = workspace();
    let table = rows(
        run_one(&engine, &mut ws, "SELECT chr, gene FROM variants GROUP BY chr").unwrap(),
    );
    assert_eq!(table.columns, vec!["chr", "gene", COUNT_FIELD]);
    assert_eq!(
        table.rows,
        vec![
            vec![Value::from("chr1"), Value::from("CFTR"), Value::Integer(2)],
            vec![Value::from("chr2"), Value::from("GJB2"), Value::Integer(2)],
            vec![Value::from("chr3"), Value::from("BRCA2"), Value::Integer(1)],
        ]
    );

    let table = rows(
        run_one(
            &engine,
            &mut ws,
            "SELECT chr FROM variants GROUP BY chr HAVING count = 1",
        )
        .unwrap(),
    );
    assert_eq!(table.column("chr").unwrap(), vec![&Value::from("chr3")]);
}

#[test]
fn test_select_function_fields() {
    let engine = Engine::new();
    let mut ws = Workspace::new();
    ws.bind(
        "variants",
        FeatureSet::selection(vec![
            Feature::new()
                .with("pos", 1)
                .with("sample.TUMOR.gt", 1)
                .with("sample.NORMAL.gt", 0),
            Feature::new()
                .with("pos", 2)
                .with("sample.TUMOR.gt", 2)
                .with("sample.NORMAL.gt", 2),
        ]),
    );
    let table = rows(
        run_one(
            &engine,
            &mut ws,
            "SELECT pos, sample['NORMAL'].gt FROM variants WHERE sample['TUMOR'].gt >= 1 AND sample['NORMAL'].gt = 0",
        )
        .unwrap(),
    );
    assert_eq!(table.columns, vec!["pos", "sample['NORMAL'].gt"]);
    assert_eq!(table.rows, vec![vec![Value::Integer(1), Value::Integer(0)]]);
}

#[test]
fn test_registered_function() {
    let mut engine = Engine::new();
    engine
        .functions_mut()
        .register("upper", |f: &Feature, arg: &str, _: Option<&str>| {
            match f.get(arg) {
                Some(Value::String(s)) => Value::String(s.to_uppercase()),
                _ => Value::Null,
            }
        });
    let mut ws = Workspace::new();
    ws.bind(
        "v",
        FeatureSet::selection(vec![Feature::new().with("gene", "cftr")]),
    );
    let table = rows(run_one(&engine, &mut ws, "SELECT upper['gene'] FROM v WHERE upper['gene'] = 'CFTR'").unwrap());
    assert_eq!(table.rows, vec![vec![Value::from("CFTR")]]);
}

// ============================================================================
// Resolution and Type Errors
// ============================================================================

#[test]
fn test_error_kinds() {
    let engine = Engine::new();
    let test_cases = vec![
        ("COUNT FROM missing", ErrorKind::Resolution),
        ("COUNT FROM variants WHERE nope = 1", ErrorKind::Resolution),
        ("SELECT nope FROM variants", ErrorKind::Resolution),
        ("SELECT gene FROM variants GROUP BY nope", ErrorKind::Resolution),
        ("COUNT FROM variants WHERE whatever['x'] = 1", ErrorKind::Resolution),
        ("COUNT FROM variants WHERE gene in WORDSET['nope']", ErrorKind::Resolution),
        ("COUNT FROM variants WHERE gene in 'CFTR'", ErrorKind::TypeMismatch),
        ("COUNT FROM variants WHERE gene ~ '(('", ErrorKind::TypeMismatch),
        ("COUNT FROM variants WHERE gene like 5", ErrorKind::TypeMismatch),
        ("COUNT FROM variants WHERE gene = WORDSET['x']", ErrorKind::TypeMismatch),
        ("DROP feature nope", ErrorKind::Resolution),
        ("SHOW feature nope", ErrorKind::Resolution),
        ("IMPORT feature '/nowhere.bed'", ErrorKind::Io),
        ("COUNT FROM variants WHERE", ErrorKind::Syntax),
    ];

    for (input, kind) in test_cases {
        let mut ws = workspace();
        let err = engine.run(&mut ws, input).unwrap_err();
        assert_eq!(err.kind(), kind, "Failed for input: {} ({})", input, err);
    }
}

#[test]
fn test_syntax_error_carries_position() {
    let engine = Engine::new();
    let mut ws = workspace();
    let err = engine.run(&mut ws, "COUNT FROM variants;\nCOUNT variants").unwrap_err();
    let position = err.position().unwrap();
    assert_eq!(position.line, 2);
    assert_eq!(position.column, 7);
}

#[test]
fn test_mismatched_comparison_is_false_not_error() {
    let engine = Engine::new();
    let mut ws = workspace();
    let outcome = run_one(&engine, &mut ws, "COUNT FROM variants WHERE gene > 5").unwrap();
    assert_eq!(outcome, Outcome::Count(0));
}

#[test]
fn test_unknown_field_allowed_on_empty_set() {
    let engine = Engine::new();
    let mut ws = Workspace::new();
    ws.bind("empty", FeatureSet::selection(vec![]));
    let outcome = run_one(&engine, &mut ws, "COUNT FROM empty WHERE anything = 1").unwrap();
    assert_eq!(outcome, Outcome::Count(0));
}

#[test]
fn test_field_missing_on_some_features_reads_null() {
    let engine = Engine::new();
    let mut ws = Workspace::new();
    ws.bind(
        "v",
        FeatureSet::selection(vec![
            Feature::new().with("pos", 1).with("af", 0.5),
            Feature::new().with("pos", 2),
        ]),
    );
    assert_eq!(
        run_one(&engine, &mut ws, "COUNT FROM v WHERE af = NULL").unwrap(),
        Outcome::Count(1)
    );
    assert_eq!(
        run_one(&engine, &mut ws, "COUNT FROM v WHERE af < 1").unwrap(),
        Outcome::Count(1)
    );
}

// ============================================================================
// CREATE
// ============================================================================

#[test]
fn test_create_copy_keeps_kind() {
    let engine = Engine::new();
    let mut ws = workspace();
    let outcome = run_one(&engine, &mut ws, "CREATE backup FROM variants").unwrap();
    assert_eq!(
        outcome,
        Outcome::Created {
            name: "backup".into(),
            count: 5
        }
    );
    assert_eq!(ws.get("backup"), ws.get("variants"));
}

#[test]
fn test_create_filtered_is_a_selection() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine
        .run(&mut ws, "CREATE brca FROM variants WHERE gene like 'brca%'")
        .unwrap();
    let set = ws.get("brca").unwrap();
    assert_eq!(set.kind, "selection");
    assert_eq!(set.len(), 2);
}

#[test]
fn test_create_overwrites_existing_name() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine
        .run(
            &mut ws,
            "CREATE a FROM variants WHERE chr = 'chr1'; CREATE a FROM variants WHERE chr = 'chr2';",
        )
        .unwrap();
    let a = ws.get("a").unwrap();
    assert_eq!(a.len(), 2);
    assert!(a.iter().all(|f| f.get("chr") == Some(&Value::from("chr2"))));
}

#[test]
fn test_overwrite_releases_previous_set() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine.run(&mut ws, "CREATE a FROM variants").unwrap();
    let old = ws.get("a").unwrap();
    assert_eq!(Arc::strong_count(&old), 2);
    engine.run(&mut ws, "CREATE a FROM variants WHERE pos > 1000").unwrap();
    assert_eq!(Arc::strong_count(&old), 1);
    assert_eq!(ws.get("a").unwrap().len(), 0);
}

#[test]
fn test_create_group_by_builds_grouped_set() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine
        .run(&mut ws, "CREATE g FROM variants GROUP BY gene HAVING count >= 2")
        .unwrap();
    let g = ws.get("g").unwrap();
    assert_eq!(g.grouping.as_ref().unwrap().keys, vec!["gene"]);
    assert_eq!(
        g.features,
        vec![Feature::new().with("gene", "CFTR").with(COUNT_FIELD, 2)]
    );
}

#[test]
fn test_set_operations() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine
        .run(
            &mut ws,
            "CREATE a FROM variants WHERE chr = 'chr1' OR chr = 'chr2';\n\
             CREATE b FROM variants WHERE score >= 10;\n\
             CREATE u = a | b;\n\
             CREATE d = a - b;\n\
             CREATE i = a & b;\n\
             CREATE e = (a - b) | (b - a);",
        )
        .unwrap();
    assert_eq!(count(&engine, &mut ws, "u"), 4);
    assert_eq!(count(&engine, &mut ws, "d"), 1);
    assert_eq!(count(&engine, &mut ws, "i"), 3);
    assert_eq!(count(&engine, &mut ws, "e"), 1);
}

#[test]
fn test_set_operation_with_grouped_set_fails() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine.run(&mut ws, "CREATE g FROM variants GROUP BY chr").unwrap();
    let err = engine.run(&mut ws, "CREATE x = g | variants").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert!(!ws.contains("x"));
}

// ============================================================================
// INTERSECT
// ============================================================================

fn interval(chr: &str, start: i64, end: i64) -> Feature {
    Feature::new().with("chr", chr).with("start", start).with("end", end)
}

#[test]
fn test_intersect_bounds_are_inclusive() {
    let loader = MemoryLoader::new().with_file(
        "/data/x.bed",
        vec![interval("chr1", 100, 150), interval("chr2", 10, 149)],
    );
    let engine = Engine::new().with_loader(loader);
    let mut ws = workspace();
    engine
        .run(&mut ws, "CREATE y FROM variants INTERSECT '/data/x.bed'")
        .unwrap();
    let y = ws.get("y").unwrap();
    let positions: Vec<&Value> = y.iter().filter_map(|f| f.get("pos")).collect();
    assert_eq!(positions, vec![&Value::Integer(100)]);

    let loader = MemoryLoader::new().with_file("/data/z.bed", vec![interval("chr2", 150, 300)]);
    let engine = Engine::new().with_loader(loader);
    engine
        .run(&mut ws, "CREATE z FROM variants INTERSECT '/data/z.bed'")
        .unwrap();
    assert_eq!(ws.get("z").unwrap().len(), 2);
}

#[test]
fn test_intersect_uses_configured_fields() {
    let config = EngineConfig {
        interval: IntervalFields {
            chrom: "chromosome".into(),
            position: "location".into(),
            record_chrom: "seq".into(),
            start: "from".into(),
            end: "to".into(),
        },
        ..EngineConfig::default()
    };
    let loader = MemoryLoader::new().with_file(
        "regions",
        vec![Feature::new().with("seq", "X").with("from", 5).with("to", 9)],
    );
    let engine = Engine::with_config(config).with_loader(loader);
    let mut ws = Workspace::new();
    ws.bind(
        "calls",
        FeatureSet::selection(vec![
            Feature::new().with("chromosome", "X").with("location", 7),
            Feature::new().with("chromosome", "X").with("location", 10),
            Feature::new().with("chromosome", "Y").with("location", 7),
        ]),
    );
    engine
        .run(&mut ws, "CREATE hits FROM calls INTERSECT 'regions'")
        .unwrap();
    assert_eq!(ws.get("hits").unwrap().len(), 1);
}

#[test]
fn test_intersect_failures() {
    let loader = MemoryLoader::new().with_file("bad.bed", vec![Feature::new().with("chr", "chr1")]);
    let engine = Engine::new().with_loader(loader);
    let mut ws = workspace();

    let err = engine
        .run(&mut ws, "CREATE y FROM variants INTERSECT 'missing.bed'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);

    let err = engine
        .run(&mut ws, "CREATE y FROM variants INTERSECT 'bad.bed'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);

    let err = engine
        .run(&mut ws, "CREATE y FROM nope INTERSECT 'bad.bed'")
        .unwrap_err();
    assert!(matches!(err, VqlError::UnknownSet(_)));
    assert!(!ws.contains("y"));
}

#[test]
fn test_intersect_source_without_position_fields() {
    let loader = MemoryLoader::new().with_file("/x.bed", vec![interval("chr1", 0, 500)]);
    let engine = Engine::new().with_loader(loader);
    let mut ws = Workspace::new();
    ws.bind("s", FeatureSet::selection(vec![interval("chr1", 10, 20)]));

    let err = engine
        .run(&mut ws, "CREATE y FROM s INTERSECT '/x.bed'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(matches!(err, VqlError::UnknownField { ref field, .. } if field == "pos"));
    assert!(!ws.contains("y"));

    // An empty source has nothing to check
    ws.bind("empty", FeatureSet::selection(vec![]));
    let outcome = run_one(&engine, &mut ws, "CREATE y FROM empty INTERSECT '/x.bed'").unwrap();
    assert_eq!(outcome, Outcome::Created { name: "y".into(), count: 0 });
}

// ============================================================================
// DROP, SHOW, IMPORT
// ============================================================================

#[test]
fn test_drop_removes_binding() {
    let engine = Engine::new();
    let mut ws = workspace();
    let outcome = run_one(&engine, &mut ws, "DROP variants variants").unwrap();
    assert_eq!(
        outcome,
        Outcome::Dropped {
            feature: "variants".into(),
            name: "variants".into()
        }
    );
    assert!(ws.is_empty());
}

#[test]
fn test_show_set_respects_limit() {
    let config = EngineConfig {
        show_limit: Some(2),
        ..EngineConfig::default()
    };
    let engine = Engine::with_config(config);
    let mut ws = workspace();
    let table = rows(run_one(&engine, &mut ws, "SHOW feature variants").unwrap());
    assert_eq!(table.columns, vec!["chr", "pos", "gene", "score"]);
    assert_eq!(table.len(), 2);

    // A bare set name shows the set too
    let table = rows(run_one(&engine, &mut ws, "SHOW variants").unwrap());
    assert_eq!(table.len(), 2);
}

#[test]
fn test_show_selections_lists_every_set() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine.run(&mut ws, "CREATE a FROM variants WHERE chr = 'chr1'").unwrap();
    let table = rows(run_one(&engine, &mut ws, "SHOW selections").unwrap());
    assert_eq!(table.columns, vec!["name", "kind", "count"]);
    assert_eq!(
        table.rows,
        vec![
            vec![Value::from("a"), Value::from("selection"), Value::Integer(2)],
            vec![
                Value::from("variants"),
                Value::from("variants"),
                Value::Integer(5)
            ],
        ]
    );
}

#[test]
fn test_show_kind_lists_sets_of_that_kind() {
    let loader = MemoryLoader::new().with_file("/data/x.bed", vec![interval("chr1", 1, 2)]);
    let engine = Engine::new().with_loader(loader);
    let mut ws = workspace();
    engine
        .run(&mut ws, "IMPORT bed '/data/x.bed' AS x; IMPORT bed '/data/x.bed' AS x2;")
        .unwrap();
    let table = rows(run_one(&engine, &mut ws, "SHOW bed").unwrap());
    assert_eq!(table.column("name").unwrap(), vec![&Value::from("x"), &Value::from("x2")]);
}

#[test]
fn test_show_unknown_word_is_an_error() {
    let engine = Engine::new();
    let mut ws = workspace();
    let err = run_one(&engine, &mut ws, "SHOW typo").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Resolution);
    assert!(matches!(err, VqlError::UnknownSet(ref name) if name == "typo"));

    // Listing keywords still succeed on an empty workspace
    let mut empty = Workspace::new();
    assert!(rows(run_one(&engine, &mut empty, "SHOW selections").unwrap()).is_empty());
}

#[test]
fn test_import_without_name_uses_file_stem() {
    let loader = MemoryLoader::new().with_file("/data/regions.bed", vec![interval("chr1", 1, 2)]);
    let engine = Engine::new().with_loader(loader);
    let mut ws = Workspace::new();
    let outcome = run_one(&engine, &mut ws, "IMPORT bed '/data/regions.bed'").unwrap();
    assert_eq!(
        outcome,
        Outcome::Imported {
            feature: "bed".into(),
            name: "regions".into(),
            count: 1
        }
    );
    assert_eq!(ws.get("regions").unwrap().kind, "bed");
}

#[test]
fn test_import_overwrites_existing_name() {
    let loader = MemoryLoader::new()
        .with_file("one", vec![interval("chr1", 1, 2)])
        .with_file("two", vec![interval("chr1", 1, 2), interval("chr2", 3, 4)]);
    let engine = Engine::new().with_loader(loader);
    let mut ws = Workspace::new();
    engine
        .run(&mut ws, "IMPORT bed 'one' AS x; IMPORT bed 'two' AS x;")
        .unwrap();
    assert_eq!(ws.get("x").unwrap().len(), 2);
    assert_eq!(ws.len(), 1);
}

#[test]
fn test_wordsets_lifecycle() {
    let loader = MemoryLoader::new().with_file(
        "genes.txt",
        vec![
            Feature::new().with("word", "CFTR"),
            Feature::new().with("word", "BRCA1"),
        ],
    );
    let engine = Engine::new().with_loader(loader);
    let mut ws = workspace();

    let outcome = run_one(&engine, &mut ws, "IMPORT wordsets 'genes.txt' AS panel").unwrap();
    assert_eq!(
        outcome,
        Outcome::Imported {
            feature: "wordsets".into(),
            name: "panel".into(),
            count: 2
        }
    );
    assert_eq!(
        run_one(&engine, &mut ws, "COUNT FROM variants WHERE gene in WORDSET['panel']").unwrap(),
        Outcome::Count(3)
    );

    let table = rows(run_one(&engine, &mut ws, "SHOW wordsets").unwrap());
    assert_eq!(table.rows, vec![vec![Value::from("panel"), Value::Integer(2)]]);
    let table = rows(run_one(&engine, &mut ws, "SHOW wordsets panel").unwrap());
    assert_eq!(table.column("word").unwrap(), vec![&Value::from("BRCA1"), &Value::from("CFTR")]);

    engine.run(&mut ws, "DROP wordsets panel").unwrap();
    let err = engine
        .run(&mut ws, "COUNT FROM variants WHERE gene in WORDSET['panel']")
        .unwrap_err();
    assert!(matches!(err, VqlError::UnknownWordSet(_)));
}

#[test]
fn test_external_wordset_resolver() {
    let engine = Engine::new().with_wordsets(MemoryWordSets::new().with_set("deafness", ["GJB2"]));
    let mut ws = workspace();
    assert_eq!(
        run_one(&engine, &mut ws, "COUNT FROM variants WHERE gene not in WORDSET['deafness']").unwrap(),
        Outcome::Count(4)
    );
}

// ============================================================================
// Atomicity and Batches
// ============================================================================

#[test]
fn test_failing_command_leaves_workspace_untouched() {
    let engine = Engine::new();
    let mut ws = workspace();
    engine.run(&mut ws, "CREATE a FROM variants WHERE chr = 'chr1'").unwrap();
    let before = ws.clone();

    let err = engine
        .run(&mut ws, "CREATE a FROM variants WHERE gene in 'CFTR'")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TypeMismatch);
    assert_eq!(ws.names(), before.names());
    assert_eq!(ws.get("a"), before.get("a"));
}

#[test]
fn test_syntax_error_runs_nothing() {
    let engine = Engine::new();
    let mut ws = workspace();
    let err = engine
        .run(&mut ws, "CREATE a FROM variants; DROP feature variants; COUNT a;")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert_eq!(ws.names(), vec!["variants"]);
}

#[test]
fn test_failure_keeps_earlier_commands_and_stops_batch() {
    let engine = Engine::new();
    let mut ws = workspace();
    let err = engine
        .run(
            &mut ws,
            "CREATE a FROM variants; CREATE b FROM missing; CREATE c FROM variants;",
        )
        .unwrap_err();
    assert!(matches!(err, VqlError::UnknownSet(ref n) if n == "missing"));
    assert!(ws.contains("a"));
    assert!(!ws.contains("b"));
    assert!(!ws.contains("c"));
}

#[test]
fn test_later_commands_see_earlier_bindings() {
    let engine = Engine::new();
    let mut ws = workspace();
    let outcomes = engine
        .run(
            &mut ws,
            "CREATE a FROM variants WHERE score >= 10; CREATE b FROM a WHERE chr = 'chr2'; COUNT FROM b;",
        )
        .unwrap();
    assert_eq!(outcomes[2], Outcome::Count(2));
}

// ============================================================================
// Cancellation and Sharing
// ============================================================================

#[test]
fn test_cancelled_engine_commits_nothing() {
    let engine = Engine::new();
    let token = engine.cancellation_token();
    let mut ws = workspace();
    token.cancel();
    let err = engine
        .run(&mut ws, "CREATE a FROM variants WHERE score > 1")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Cancelled);
    assert!(!ws.contains("a"));

    token.reset();
    engine.run(&mut ws, "CREATE a FROM variants WHERE score > 1").unwrap();
    assert!(ws.contains("a"));
}

#[test]
fn test_shared_workspace_across_threads() {
    let engine = Arc::new(Engine::new());
    let shared = SharedWorkspace::new(workspace());

    let handles: Vec<_> = (0..4)
        .map(|i| {
            let engine = Arc::clone(&engine);
            let shared = shared.clone();
            thread::spawn(move || {
                let text = format!("CREATE s{} FROM variants WHERE score >= {}; COUNT FROM s{};", i, i * 10, i);
                engine.run_shared(&shared, &text).unwrap()
            })
        })
        .collect();

    let mut counts = vec![];
    for handle in handles {
        let outcomes = handle.join().unwrap();
        counts.push(outcomes[1].clone());
    }
    assert_eq!(
        counts,
        vec![
            Outcome::Count(5),
            Outcome::Count(3),
            Outcome::Count(1),
            Outcome::Count(1)
        ]
    );
    assert_eq!(shared.read().unwrap().len(), 5);
}

// ============================================================================
// Output Sinks
// ============================================================================

#[test]
fn test_text_sink() {
    let engine = Engine::new();
    let mut ws = workspace();
    let mut sink = TextSink::new(Vec::new());
    let executed = engine
        .run_into(
            &mut ws,
            "SELECT gene, score FROM variants WHERE score > 11; CREATE a FROM variants WHERE chr = 'chr3'; COUNT FROM a;",
            &mut sink,
        )
        .unwrap();
    assert_eq!(executed, 3);
    let text = String::from_utf8(sink.into_inner()).unwrap();
    assert_eq!(
        text,
        "gene\tscore\nCFTR\t12\nGJB2\t40\ncreated a (1 features)\n1\n"
    );
}

#[test]
fn test_json_sink() {
    let engine = Engine::new();
    let mut ws = workspace();
    let mut sink = JsonSink::new(Vec::new(), false);
    engine
        .run_into(&mut ws, "SELECT gene FROM variants WHERE pos = 50; COUNT FROM variants;", &mut sink)
        .unwrap();
    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<serde_json::Value> = text
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(
        lines,
        vec![
            serde_json::json!({"columns": ["gene"], "rows": [["BRCA2"]]}),
            serde_json::json!({"count": 5}),
        ]
    );
}

#[test]
fn test_memory_sink_receives_outcomes_before_failure() {
    let engine = Engine::new();
    let mut ws = workspace();
    let mut sink = MemorySink::new();
    let err = engine
        .run_into(&mut ws, "COUNT FROM variants; COUNT FROM nope; COUNT FROM variants;", &mut sink)
        .unwrap_err();
    assert!(matches!(err, VqlError::UnknownSet(_)));
    assert_eq!(sink.outcomes, vec![Outcome::Count(5)]);
}
