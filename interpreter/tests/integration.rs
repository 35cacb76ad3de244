use interpreter::{
    CommandTree, InterpretError, Interpreter, InterpreterConfig, MarkerProvider, MemoryDocument,
    ProviderError, VisitError,
};
use wm::command::{Command, CommandKind};

fn document(length: usize, markers: &[(&str, usize, usize)]) -> MemoryDocument {
    let mut doc = MemoryDocument::new("letter.odt", length);
    for &(name, start, end) in markers {
        doc.create_marker(name, start..end).expect("marker in bounds");
    }
    doc
}

fn accept_all(command: &Command, _: &mut MemoryDocument) -> Result<(), VisitError> {
    match command.kind() {
        CommandKind::Invalid { message } => Err(VisitError::new(message.clone())),
        _ => Ok(()),
    }
}

/// `(depth, keyword)` for every command in document order.
fn outline(tree: &CommandTree) -> Vec<(usize, &'static str)> {
    tree.depth_first(false)
        .map(|id| (tree.depth(id), tree.command(id).unwrap().kind().keyword()))
        .collect()
}

#[test]
fn fragment_inside_group_inherits_its_group() {
    let doc = document(
        40,
        &[
            ("WM(CMD'setGroups' GROUPS('A'))", 0, 40),
            ("WM(CMD'insertFrag' FRAG_ID'Greeting')", 5, 5),
        ],
    );
    let mut interpreter = Interpreter::default();
    assert!(interpreter.scan(&doc));

    let tree = interpreter.tree();
    assert_eq!(outline(tree), vec![(0, "setGroups"), (1, "insertFrag")]);
    assert_eq!(tree.children(CommandTree::ROOT).len(), 1);

    let frag = tree.find("WM(CMD'insertFrag' FRAG_ID'Greeting')").unwrap();
    assert!(interpreter.groups().groups_of(frag).unwrap().contains("A"));
}

#[test]
fn identical_spans_nest_leaf_under_container_in_either_order() {
    let group = ("WM(CMD'setGroups' GROUPS('A'))", 7, 7);
    let value = ("WM(CMD'insertValue' DB_SPALTE'Name')", 7, 7);
    for markers in [[group, value], [value, group]] {
        let doc = document(20, &markers);
        let mut interpreter = Interpreter::default();
        interpreter.scan(&doc);
        assert_eq!(
            outline(interpreter.tree()),
            vec![(0, "setGroups"), (1, "insertValue")]
        );
        let value = interpreter.tree().find(value.0).unwrap();
        assert!(interpreter.groups().groups_of(value).unwrap().contains("A"));
    }
}

#[test]
fn second_leaf_at_identical_span_is_invalid() {
    let doc = document(
        20,
        &[
            ("WM(CMD'insertValue' DB_SPALTE'Name')", 3, 3),
            ("WM(CMD'insertValue' DB_SPALTE'Ort')", 3, 3),
        ],
    );
    let mut interpreter = Interpreter::default();
    interpreter.scan(&doc);
    let tree = interpreter.tree();

    let first = tree.find("WM(CMD'insertValue' DB_SPALTE'Name')").unwrap();
    assert!(!tree.command(first).unwrap().is_invalid());

    let second = tree.command(tree.find("WM(CMD'insertValue' DB_SPALTE'Ort')").unwrap()).unwrap();
    match second.kind() {
        CommandKind::Invalid { message } => {
            assert!(message.contains("WM(CMD'insertValue' DB_SPALTE'Name')"), "{}", message)
        }
        other => panic!("expected an invalid command, got {:?}", other),
    }
}

#[test]
fn self_replicating_fragment_is_an_endless_loop() {
    let mut doc = document(10, &[("WM(CMD'insertFrag' FRAG_ID'Loop')", 2, 2)]);
    let config = InterpreterConfig {
        max_iterations: 5,
        ..InterpreterConfig::default()
    };
    let mut interpreter = Interpreter::new(config);
    let result = interpreter.execute(
        &mut doc,
        &mut |command: &Command, doc: &mut MemoryDocument| -> Result<(), VisitError> {
            let at = command.span().start;
            doc.create_marker("WM(CMD'insertFrag' FRAG_ID'Loop')", at..at)
                .map_err(|e| VisitError::new(e.to_string()))?;
            Ok(())
        },
    );

    match result {
        Err(error @ InterpretError::EndlessLoop { .. }) => {
            assert!(error.to_string().contains("letter.odt"));
            assert!(matches!(error, InterpretError::EndlessLoop { iterations: 5, .. }));
        }
        other => panic!("expected an endless loop, got {:?}", other),
    }
}

#[test]
fn failures_do_not_stop_other_commands() {
    let mut doc = document(
        50,
        &[
            ("WM(CMD'insertValue' DB_SPALTE'A')", 1, 1),
            ("WM(CMD'insertValue' DB_SPALTE'B')", 5, 5),
            ("WM(CMD'insertValue' DB_SPALTE'C')", 10, 10),
            ("WM(CMD'insertValue' DB_SPALTE'D')", 20, 20),
            ("WM(CMD'insertValue' DB_SPALTE'E')", 30, 30),
        ],
    );
    let mut interpreter = Interpreter::default();
    let result = interpreter.execute(
        &mut doc,
        &mut |command: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
            match command.kind() {
                CommandKind::InsertValue { column, .. } if column == "B" || column == "D" => {
                    Err(VisitError::new(format!("unknown column {}", column)))
                }
                _ => Ok(()),
            }
        },
    );

    assert!(matches!(result, Err(InterpretError::CommandsFailed(2))));
    assert_eq!(
        doc.names(),
        vec![
            "WM(CMD'insertValue' DB_SPALTE'A' STATE(DONE 'true'))",
            "WM(CMD'insertValue' DB_SPALTE'B' STATE(ERROR 'true'))",
            "WM(CMD'insertValue' DB_SPALTE'C' STATE(DONE 'true'))",
            "WM(CMD'insertValue' DB_SPALTE'D' STATE(ERROR 'true'))",
            "WM(CMD'insertValue' DB_SPALTE'E' STATE(DONE 'true'))",
        ]
    );
    assert_eq!(doc.annotations().len(), 2);
}

#[test]
fn done_commands_are_never_visited_again() {
    let mut doc = document(
        20,
        &[
            ("WM(CMD'insertValue' DB_SPALTE'Name' STATE(DONE 'true'))", 1, 1),
            ("WM(CMD'setJumpMark')", 4, 4),
        ],
    );
    let mut interpreter = Interpreter::default();
    let mut visited = Vec::new();
    let mut record = |command: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
        visited.push(command.kind().keyword());
        Ok(())
    };

    interpreter.execute(&mut doc, &mut record).unwrap();
    doc.create_marker("Textmarke", 0..2).unwrap();
    interpreter.execute(&mut doc, &mut record).unwrap();

    assert_eq!(visited, vec!["setJumpMark"]);
}

#[test]
fn persisted_state_causes_no_further_renames() {
    let mut doc = document(20, &[("WM(CMD'form')", 0, 20), ("WM(CMD'setJumpMark')", 4, 4)]);
    let mut interpreter = Interpreter::default();

    let first = interpreter.execute(&mut doc, &mut accept_all).unwrap();
    assert_eq!(first.renames, 2);
    assert_eq!(first.executed, 2);

    let second = interpreter.execute(&mut doc, &mut accept_all).unwrap();
    assert_eq!(second.renames, 0);
    assert_eq!(second.executed, 0);
    assert_eq!(doc.renames(), 2);

    // A fresh interpreter reads the state back from the names.
    let third = Interpreter::default().execute(&mut doc, &mut accept_all).unwrap();
    assert_eq!(third.executed, 0);
}

#[test]
fn host_suffixes_are_tracked_and_ignored() {
    let mut doc = document(
        20,
        &[("WM(CMD'setJumpMark')", 1, 1), ("WM(CMD'setJumpMark') 1", 6, 6)],
    );
    let mut interpreter = Interpreter::default();
    let report = interpreter.execute(&mut doc, &mut accept_all).unwrap();
    assert_eq!(report.renames, 2);
    assert_eq!(
        doc.names(),
        vec![
            "WM(CMD'setJumpMark' STATE(DONE 'true'))",
            "WM(CMD'setJumpMark' STATE(DONE 'true')) 1",
        ]
    );

    assert!(!interpreter.scan(&doc));
    let mut fresh = Interpreter::default();
    fresh.scan(&doc);
    let tree = fresh.tree();
    assert!(tree.depth_first(false).all(|id| tree.command(id).unwrap().is_done()));
}

#[test]
fn marker_renamed_by_the_user_is_read_again() {
    let mut doc = document(20, &[("WM(CMD'insertValue' DB_SPALTE'Name')", 5, 5)]);
    let mut interpreter = Interpreter::default();
    interpreter.scan(&doc);

    doc.rename_marker(
        "WM(CMD'insertValue' DB_SPALTE'Name')",
        "WM(CMD'insertValue' DB_SPALTE'Ort')",
    )
    .unwrap();

    let mut columns = Vec::new();
    let report = interpreter
        .execute(
            &mut doc,
            &mut |command: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
                if let CommandKind::InsertValue { column, .. } = command.kind() {
                    columns.push(column.clone());
                }
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(report.executed, 1);
    assert_eq!(columns, vec!["Ort"]);
    let tree = interpreter.tree();
    assert_eq!(tree.len(), 1);
    assert!(tree.depth_first(false).all(|id| !tree.command(id).unwrap().is_invalid()));
    assert_eq!(
        doc.names(),
        vec!["WM(CMD'insertValue' DB_SPALTE'Ort' STATE(DONE 'true'))"]
    );
}

#[test]
fn clearing_the_error_state_retries_the_command() {
    let mut doc = document(20, &[("WM(CMD'insertValue' DB_SPALTE'Ort')", 5, 5)]);
    let mut interpreter = Interpreter::default();

    let first = interpreter.execute(
        &mut doc,
        &mut |_: &Command, _: &mut MemoryDocument| -> Result<(), VisitError> {
            Err(VisitError::new("no such column: Ort"))
        },
    );
    assert!(matches!(first, Err(InterpretError::CommandsFailed(1))));
    assert_eq!(
        doc.names(),
        vec!["WM(CMD'insertValue' DB_SPALTE'Ort' STATE(ERROR 'true'))"]
    );

    doc.rename_marker(
        "WM(CMD'insertValue' DB_SPALTE'Ort' STATE(ERROR 'true'))",
        "WM(CMD'insertValue' DB_SPALTE'Ort')",
    )
    .unwrap();

    let second = interpreter.execute(&mut doc, &mut accept_all).unwrap();
    assert_eq!(second.executed, 1);
    assert_eq!(interpreter.tree().len(), 1);
    assert_eq!(
        doc.names(),
        vec!["WM(CMD'insertValue' DB_SPALTE'Ort' STATE(DONE 'true'))"]
    );
}

#[test]
fn rescan_without_changes_is_idempotent() {
    let doc = document(
        100,
        &[
            ("WM(CMD'setGroups' GROUPS('A'))", 0, 60),
            ("WM(CMD'insertFrag' FRAG_ID'Head')", 10, 30),
            ("WM(CMD'insertValue' DB_SPALTE'Name')", 12, 12),
            ("WM(CMD'setJumpMark')", 70, 70),
            ("Bookmark", 80, 90),
        ],
    );
    let mut interpreter = Interpreter::default();
    assert!(interpreter.scan(&doc));
    let before = outline(interpreter.tree());
    let comparisons = interpreter.tree().comparisons();

    assert!(!interpreter.scan(&doc));
    assert_eq!(outline(interpreter.tree()), before);
    assert_eq!(interpreter.tree().comparisons(), comparisons);
}

#[test]
fn removing_a_container_keeps_its_children() {
    let mut doc = document(
        100,
        &[
            ("WM(CMD'setGroups' GROUPS('A'))", 0, 60),
            ("WM(CMD'insertValue' DB_SPALTE'A')", 10, 10),
            ("WM(CMD'insertValue' DB_SPALTE'B')", 20, 20),
            ("WM(CMD'insertValue' DB_SPALTE'C')", 30, 30),
        ],
    );
    let mut interpreter = Interpreter::default();
    interpreter.scan(&doc);
    assert_eq!(interpreter.tree().len(), 4);

    let id = doc.marker("WM(CMD'setGroups' GROUPS('A'))").unwrap().id;
    doc.delete_marker(id).unwrap();
    assert!(interpreter.scan(&doc));

    let tree = interpreter.tree();
    assert_eq!(tree.len(), 3);
    assert_eq!(outline(tree), vec![(0, "insertValue"); 3]);
}

#[test]
fn command_removing_itself_counts_as_success() {
    let mut doc = document(
        30,
        &[
            ("WM(CMD'insertContent')", 10, 20),
            ("WM(CMD'setJumpMark')", 2, 2),
        ],
    );
    let mut interpreter = Interpreter::default();
    let report = interpreter
        .execute(
            &mut doc,
            &mut |command: &Command, doc: &mut MemoryDocument| -> Result<(), VisitError> {
                if matches!(command.kind(), CommandKind::InsertContent) {
                    doc.delete_range(command.span().range())
                        .map_err(|e| VisitError::new(e.to_string()))?;
                }
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(report.executed, 2);
    assert_eq!(report.renames, 1);
    assert_eq!(doc.names(), vec!["WM(CMD'setJumpMark' STATE(DONE 'true'))"]);
    assert_eq!(doc.len(), 20);
}

#[test]
fn inserted_fragments_are_scanned_and_executed() {
    let mut doc = document(10, &[("WM(CMD'insertFrag' FRAG_ID'Greeting')", 2, 2)]);
    let mut interpreter = Interpreter::default();
    let mut visited = Vec::new();
    let report = interpreter
        .execute(
            &mut doc,
            &mut |command: &Command, doc: &mut MemoryDocument| -> Result<(), VisitError> {
                visited.push(command.kind().keyword());
                if let CommandKind::InsertFrag { .. } = command.kind() {
                    let at = command.span().start;
                    let host = |e: ProviderError| VisitError::new(e.to_string());
                    doc.insert_text(at, 20).map_err(host)?;
                    doc.create_marker("WM(CMD'insertValue' DB_SPALTE'Name')", at + 5..at + 5)
                        .map_err(host)?;
                }
                Ok(())
            },
        )
        .unwrap();

    assert_eq!(visited, vec!["insertFrag", "insertValue"]);
    assert_eq!(report.iterations, 2);
    assert_eq!(
        outline(interpreter.tree()),
        vec![(0, "insertFrag"), (1, "insertValue")]
    );
}

#[test]
fn overlapping_command_is_reported_and_annotated() {
    let mut doc = document(
        30,
        &[("WM(CMD'setGroups' GROUPS('A'))", 0, 10), ("WM(CMD'form')", 5, 15)],
    );
    let mut interpreter = Interpreter::default();
    let result = interpreter.execute(&mut doc, &mut accept_all);

    assert!(matches!(result, Err(InterpretError::CommandsFailed(1))));
    assert_eq!(doc.annotations().len(), 1);
    assert!(doc.annotations()[0].message.contains("overlaps"));
    assert_eq!(doc.annotations()[0].range, 5..15);
    assert_eq!(
        doc.names(),
        vec![
            "WM(CMD'setGroups' GROUPS('A') STATE(DONE 'true'))",
            "WM(CMD'form' STATE(ERROR 'true'))",
        ]
    );
}

#[test]
fn malformed_commands_fail_without_renaming() {
    let mut doc = document(10, &[("WM(CMD'insertFrag' FRAG_ID)", 1, 1)]);
    let mut interpreter = Interpreter::default();
    let result = interpreter.execute(&mut doc, &mut accept_all);
    assert!(matches!(result, Err(InterpretError::CommandsFailed(1))));
    assert_eq!(doc.renames(), 0);
    assert_eq!(doc.annotations().len(), 1);
}
