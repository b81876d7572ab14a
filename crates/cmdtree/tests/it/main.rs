
use std::{cell::RefCell, ffi::OsString, rc::Rc};

use clap::error::ErrorKind;
use cmdtree::{dispatch, selector_help, Arg, Bundle, Cmd, Error, Namespace, Parser, Ty, Value};
use expect_test::{expect, Expect};

fn parse(root: &Cmd, args: Vec<OsString>) -> cmdtree::Result<Bundle<'_>> {
    let parser = Parser::new(root)?;
    let ns = parser.parse_from(args)?;
    dispatch::bundle(root, &ns)
}

fn bundle_of<'a>(root: &'a Cmd, args: &[&str]) -> Bundle<'a> {
    parse(root, args.iter().map(OsString::from).collect()).unwrap()
}

fn check(root: &Cmd, args: &str, expect: Expect) {
    let args = args.split_ascii_whitespace().map(OsString::from).collect::<Vec<_>>();
    match parse(root, args) {
        Ok(bundle) => expect.assert_debug_eq(&bundle),
        Err(err) => expect.assert_eq(&err.to_string()),
    }
}

fn parse_error(root: &Cmd, args: &[&str]) -> ErrorKind {
    match cmdtree::main_from(root, args) {
        Err(Error::Parse(err)) => err.kind(),
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn smoke() {
    check(
        &trees::smoke(),
        "",
        expect![[r#"
            Bundle {
                cmds: [
                    "smoke",
                ],
                args: {
                    "jobs": Int(
                        4,
                    ),
                    "level": Str(
                        "low",
                    ),
                    "verbose": Bool(
                        false,
                    ),
                    "dry-run": Bool(
                        false,
                    ),
                },
            }
        "#]],
    );
    check(
        &trees::smoke(),
        "-j 8 --dry-run a b",
        expect![[r#"
            Bundle {
                cmds: [
                    "smoke",
                ],
                args: {
                    "jobs": Int(
                        8,
                    ),
                    "level": Str(
                        "low",
                    ),
                    "verbose": Bool(
                        false,
                    ),
                    "dry-run": Bool(
                        true,
                    ),
                    "paths": List(
                        [
                            Str(
                                "a",
                            ),
                            Str(
                                "b",
                            ),
                        ],
                    ),
                },
            }
        "#]],
    );
    check(
        &trees::smoke(),
        "--ratio 0.5 -v --level high x",
        expect![[r#"
            Bundle {
                cmds: [
                    "smoke",
                ],
                args: {
                    "jobs": Int(
                        4,
                    ),
                    "level": Str(
                        "high",
                    ),
                    "verbose": Bool(
                        true,
                    ),
                    "dry-run": Bool(
                        false,
                    ),
                    "ratio": Float(
                        0.5,
                    ),
                    "paths": List(
                        [
                            Str(
                                "x",
                            ),
                        ],
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn rejects_bad_values() {
    assert_eq!(parse_error(&trees::smoke(), &["--level", "medium"]), ErrorKind::InvalidValue);
    assert_eq!(parse_error(&trees::smoke(), &["-j", "many"]), ErrorKind::InvalidValue);
    assert_eq!(parse_error(&trees::smoke(), &["--ratio"]), ErrorKind::InvalidValue);
}

#[test]
fn unselected_sibling_never_runs() {
    let log = trees::Log::default();
    let tool = trees::tool(&log);
    assert_eq!(cmdtree::main_from(&tool, ["test"]).unwrap(), 0);
    assert_eq!(*log.borrow(), ["test"]);
    assert!(bundle_of(&tool, &["build"]).is_empty());

    check(
        &tool,
        "build",
        expect![[r#"
            Bundle {
                cmds: [
                    "tool",
                    "build",
                ],
                args: {},
            }
        "#]],
    );
}

#[test]
fn subcommand_is_mandatory() {
    let log = trees::Log::default();
    assert_eq!(parse_error(&trees::tool(&log), &[]), ErrorKind::MissingSubcommand);
    assert!(log.borrow().is_empty());
}

#[test]
fn failing_parent_stops_the_chain() {
    let log = trees::Log::default();
    assert_eq!(cmdtree::main_from(&trees::gated(&log, 2), ["deploy"]).unwrap(), 2);
    assert_eq!(*log.borrow(), ["gated"]);

    let log = trees::Log::default();
    assert_eq!(cmdtree::main_from(&trees::gated(&log, 0), ["--force", "deploy"]).unwrap(), 0);
    assert_eq!(*log.borrow(), ["gated", "deploy"]);
}

#[test]
fn greet_round_trip() {
    let seen = Rc::new(RefCell::new(None));
    let app = Cmd::new("app").cmd(Cmd::new("greet").arg(Arg::new("name").count(1)).run({
        let seen = Rc::clone(&seen);
        move |cmd, bundle| {
            *seen.borrow_mut() = bundle.value(cmd, "name").cloned();
            0
        }
    }));

    assert_eq!(cmdtree::main_from(&app, ["greet", "Ada"]).unwrap(), 0);
    assert_eq!(*seen.borrow(), Some(Value::from("Ada")));
    let bundle = bundle_of(&app, &["greet", "Ada"]);
    assert_eq!(bundle.leaf().map(|it| it.name.as_str()), Some("greet"));
    assert_eq!(bundle.len(), 1);

    check(
        &app,
        "greet Ada",
        expect![[r#"
            Bundle {
                cmds: [
                    "app",
                    "greet",
                ],
                args: {
                    "name": Str(
                        "Ada",
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn same_name_at_two_depths() {
    let app = trees::nested();
    let parser = Parser::new(&app).unwrap();
    let ns = parser.parse_from(["run", "-q", "run", "x"]).unwrap();
    assert_eq!(ns.get("app-cmd"), Some(&Value::from("run")));
    assert_eq!(ns.get("app-run-cmd"), Some(&Value::from("run")));
    let ids = ns.iter().map(|(id, _)| id).collect::<Vec<_>>();
    assert_eq!(ids, ["app-cmd", "app-run-cmd", "quiet", "target"]);

    check(
        &app,
        "run -q run x",
        expect![[r#"
            Bundle {
                cmds: [
                    "app",
                    "run",
                    "run",
                ],
                args: {
                    "quiet": Bool(
                        true,
                    ),
                    "target": Str(
                        "x",
                    ),
                },
            }
        "#]],
    );
    check(
        &app,
        "run stop",
        expect![[r#"
            Bundle {
                cmds: [
                    "app",
                    "run",
                    "stop",
                ],
                args: {
                    "quiet": Bool(
                        false,
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn computed_defaults_and_transforms() {
    check(
        &trees::greeting(),
        "--name ada",
        expect![[r#"
            Bundle {
                cmds: [
                    "greeting",
                ],
                args: {
                    "name": Str(
                        "ADA",
                    ),
                    "greeting": Str(
                        "hello, ada",
                    ),
                },
            }
        "#]],
    );
    check(
        &trees::greeting(),
        "",
        expect![[r#"
            Bundle {
                cmds: [
                    "greeting",
                ],
                args: {
                    "greeting": Str(
                        "hello, nobody",
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn unknown_selector_value() {
    let log = trees::Log::default();
    let tool = trees::tool(&log);
    let mut ns = Namespace::new();
    ns.insert("tool-cmd", Value::from("lint"));

    let err = dispatch::dispatch(&tool, &ns).unwrap_err();
    expect![[r#"cmdtree: selector `tool-cmd` chose Some("lint"), which names no subcommand"#]]
        .assert_eq(&err.to_string());
    assert!(log.borrow().is_empty());
}

#[test]
fn schema_errors_prevent_parsing() {
    let log = trees::Log::default();
    let app = Cmd::new("app").arg(Arg::new("9lives")).run(trees::record(&log, 0));
    let err = cmdtree::main_from(&app, ["x"]).unwrap_err();
    assert!(matches!(err, Error::Schema(_)));
    assert!(log.borrow().is_empty());
}

#[test]
fn help() {
    let log = trees::Log::default();
    let tool = trees::tool(&log).epilog("See the manual.");
    assert_eq!(parse_error(&tool, &["--help"]), ErrorKind::DisplayHelp);

    let help = Parser::new(&tool).unwrap().render_help();
    assert!(help.contains(&selector_help(&tool.cmds)), "{help}");
    assert!(help.trim_end().ends_with("See the manual."), "{help}");
}

#[test]
fn selector_help_layout() {
    let cmds = [
        Cmd::new("build").brief("Compile the workspace"),
        Cmd::new("test").brief("Run tests\nacross the workspace"),
        Cmd::new("fmt"),
    ];
    expect![[r#"
        One of the following:
        * build - Compile the workspace
        * test  - Run tests
                  across the workspace
        * fmt
    "#]]
    .assert_eq(&format!("{}\n", selector_help(&cmds)));
}

#[test]
fn negative_numbers() {
    let calc = Cmd::new("calc")
        .arg(Arg::new("offset").option("--offset").ty(Ty::Int))
        .arg(Arg::new("scale").option("--scale").choices([-1, 0, 1]).default(1))
        .arg(Arg::new("value").ty(Ty::Float));
    check(
        &calc,
        "-2.5 --offset -3 --scale -1",
        expect![[r#"
            Bundle {
                cmds: [
                    "calc",
                ],
                args: {
                    "offset": Int(
                        -3,
                    ),
                    "scale": Int(
                        -1,
                    ),
                    "value": Float(
                        -2.5,
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn repeated_flag_keeps_last() {
    let app = Cmd::new("app")
        .arg(Arg::new("name").option("--name"))
        .arg(Arg::new("include").option("-I").count('*'));
    check(
        &app,
        "--name a --name b -I x -I y",
        expect![[r#"
            Bundle {
                cmds: [
                    "app",
                ],
                args: {
                    "name": Str(
                        "b",
                    ),
                    "include": List(
                        [
                            Str(
                                "y",
                            ),
                        ],
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn fixed_count_positional_before_another() {
    let cp = Cmd::new("cp").arg(Arg::new("src").count(2)).arg(Arg::new("dst"));
    check(
        &cp,
        "a b c",
        expect![[r#"
            Bundle {
                cmds: [
                    "cp",
                ],
                args: {
                    "src": List(
                        [
                            Str(
                                "a",
                            ),
                            Str(
                                "b",
                            ),
                        ],
                    ),
                    "dst": Str(
                        "c",
                    ),
                },
            }
        "#]],
    );
}

#[test]
fn argument_named_help() {
    let docs = Cmd::new("docs").arg(Arg::new("help").option("--topic"));
    check(
        &docs,
        "--topic intro",
        expect![[r#"
            Bundle {
                cmds: [
                    "docs",
                ],
                args: {
                    "help": Str(
                        "intro",
                    ),
                },
            }
        "#]],
    );
    assert_eq!(parse_error(&docs, &["--help"]), ErrorKind::DisplayHelp);
}
