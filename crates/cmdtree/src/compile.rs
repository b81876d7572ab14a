//! Compiles a command tree into a `clap` parser.
//!
//! One `clap::Command` per [`Cmd`], one `clap::Arg` per argument and, for a
//! command with children, a required subcommand slot standing for the
//! selector. Alongside the clap structure we keep a `Node` tree recording
//! which identifiers each level binds, so the nested matches clap produces
//! can be flattened back into a [`Namespace`].
use std::{
    ffi::{OsStr, OsString},
    fmt::Write,
    path::Path,
};

use clap::{
    builder::{PossibleValue, TypedValueParser, ValueRange},
    error::ErrorKind,
    ArgAction, ArgMatches,
};
use tracing::{debug, trace};

use crate::{
    eval::{self, Arity, Shape},
    model::{Cmd, DefaultValue, Namespace, Ty, Value},
    validate::{self, SchemaError, Scope},
};

macro_rules! w {
    ($($tt:tt)*) => {
        drop(write!($($tt)*))
    };
}

/// Header line of the synthesized selector help.
const SELECTOR_HEADER: &str = "One of the following:";

/// A validated command tree turned into a parser.
#[derive(Debug)]
pub struct Parser {
    command: clap::Command,
    root: Node,
}

#[derive(Debug, Default)]
struct Node {
    bindings: Vec<Binding>,
    selector: Option<String>,
    cmds: Vec<(String, Node)>,
}

#[derive(Debug)]
struct Binding {
    id: String,
    key: String,
    switch: bool,
    multiple: bool,
}

impl Parser {
    /// Validates and compiles `root`. Nothing is built unless the whole tree
    /// is well-formed.
    pub fn new(root: &Cmd) -> Result<Parser, SchemaError> {
        let mut scope = Scope::new(root);
        let (command, node) = compile(root, &mut scope, &[])?;
        let command = command.no_binary_name(true);
        debug!(name = %root.name, "compiled command tree");
        Ok(Parser { command, root: node })
    }

    /// The compiled engine structure.
    pub fn command(&self) -> &clap::Command {
        &self.command
    }

    pub fn render_help(&self) -> String {
        self.command.clone().render_help().to_string()
    }

    /// Parses `args`, which do not include the binary name.
    pub fn parse_from<I, T>(&self, args: I) -> Result<Namespace, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = self.command.clone().try_get_matches_from(args)?;
        Ok(self.namespace(&matches))
    }

    /// Parses the arguments of the current process.
    pub fn parse_env(&self) -> Result<Namespace, clap::Error> {
        let mut args = std::env::args_os();
        let bin = args.next();
        let mut command = self.command.clone();
        if command.get_name().is_empty() {
            if let Some(name) = bin.as_deref().map(Path::new).and_then(Path::file_name) {
                command = command.bin_name(name.to_string_lossy().into_owned());
            }
        }
        let matches = command.try_get_matches_from(args)?;
        Ok(self.namespace(&matches))
    }

    fn namespace(&self, matches: &ArgMatches) -> Namespace {
        let mut res = Namespace::new();
        collect(&self.root, matches, &mut res);
        trace!(namespace = ?res, "parsed");
        res
    }
}

fn compile(
    cmd: &Cmd,
    scope: &mut Scope,
    earlier: &[Cmd],
) -> Result<(clap::Command, Node), SchemaError> {
    validate::cmd(cmd, scope, earlier)?;

    let mut command = clap::Command::new(cmd.name.clone())
        .disable_help_subcommand(true)
        .args_override_self(true);
    if let Some(brief) = &cmd.brief {
        command = command.about(brief.clone());
    }
    if let Some(prolog) = &cmd.prolog {
        command = command.before_help(prolog.clone());
    }

    validate::args(cmd, scope)?;
    let mut node = Node::default();
    for arg in &cmd.args {
        let shape = eval::arg(arg);
        trace!(origin = scope.path(), id = %shape.id, arity = ?shape.arity, "registered argument");
        node.bindings.push(Binding {
            id: shape.id.clone(),
            key: key(&shape.id),
            switch: shape.is_switch(),
            multiple: shape.arity.is_multiple(),
        });
        command = command.arg(register(&shape));
    }

    let mut after_help = Vec::new();
    if !cmd.cmds.is_empty() {
        let names = scope.names().collect::<Vec<_>>();
        let id = selector_id(&names);
        debug!(origin = scope.path(), selector = %id, "registered selector");
        command = command.subcommand_required(true).subcommand_value_name("APP");
        after_help.push(selector_help(&cmd.cmds));
        node.selector = Some(id);

        for (idx, child) in cmd.cmds.iter().enumerate() {
            let mark = scope.push(child, idx);
            let (sub, sub_node) = compile(child, scope, &cmd.cmds[..idx])?;
            scope.pop(mark);
            command = command.subcommand(sub.hide(true));
            node.cmds.push((child.name.clone(), sub_node));
        }
    }
    if let Some(epilog) = &cmd.epilog {
        after_help.push(epilog.clone());
    }
    if !after_help.is_empty() {
        command = command.after_help(after_help.join("\n\n"));
    }

    Ok((command, node))
}

fn register(shape: &Shape<'_>) -> clap::Arg {
    let mut arg = clap::Arg::new(key(&shape.id));

    let (longs, shorts): (Vec<&str>, Vec<&str>) =
        shape.options.iter().partition(|it| it.starts_with("--"));
    for (idx, short) in shorts.iter().filter_map(|it| it.chars().nth(1)).enumerate() {
        arg = if idx == 0 { arg.short(short) } else { arg.visible_short_alias(short) };
    }
    for (idx, long) in longs.iter().map(|it| it[2..].to_string()).enumerate() {
        arg = if idx == 0 { arg.long(long) } else { arg.visible_alias(long) };
    }
    if let Some(help) = shape.help {
        arg = arg.help(help.to_string());
    }

    if shape.is_switch() {
        return arg.action(ArgAction::SetTrue).required(shape.required);
    }

    arg = arg
        .action(ArgAction::Set)
        .value_name(shape.display.clone())
        .num_args(range(shape.arity))
        .required(shape.engine_required())
        .value_parser(ElementParser { ty: shape.ty, choices: shape.choices.clone() });
    if matches!(shape.ty, Ty::Int | Ty::Float) {
        arg = arg.allow_negative_numbers(true);
    }
    if let Some(DefaultValue::Static(value)) = shape.default {
        arg = arg.default_values(value.items().iter().map(ToString::to_string));
    }
    arg
}

/// Engine-side id of the argument bound to `id`. Identifiers never contain
/// `-`, so this never equals an id clap generates itself (`help`).
fn key(id: &str) -> String {
    format!("arg-{id}")
}

fn range(arity: Arity) -> ValueRange {
    match arity {
        Arity::Exact(n) => ValueRange::new(n),
        Arity::Optional => ValueRange::new(0..=1),
        Arity::Repeated => ValueRange::new(0..),
        Arity::AtLeastOne => ValueRange::new(1..),
    }
}

/// Internal binding name of the selector below the command at the end of
/// `names` (the path of command names from the root).
///
/// Identifiers never contain `-`, so neither the joined path nor the suffix
/// can be mistaken for an argument's binding, and selectors at different
/// depths always differ.
pub fn selector_id(names: &[&str]) -> String {
    let mut res = String::new();
    for name in names {
        w!(res, "{}-", eval::id(name));
    }
    res.push_str("cmd");
    res
}

/// Help text listing the subcommands a selector chooses from.
pub fn selector_help(cmds: &[Cmd]) -> String {
    let width = cmds.iter().map(|it| it.name.chars().count()).max().unwrap_or(0);
    // "* " + name + " - "
    let indent = format!("\n{:width$}", "", width = width + 5);

    let mut buf = String::from(SELECTOR_HEADER);
    for cmd in cmds {
        match &cmd.brief {
            Some(brief) => w!(buf, "\n* {:width$} - {}", cmd.name, brief.replace('\n', &indent)),
            None => w!(buf, "\n* {}", cmd.name),
        }
    }
    buf
}

fn collect(node: &Node, matches: &ArgMatches, ns: &mut Namespace) {
    for binding in &node.bindings {
        if let Some(value) = binding.extract(matches) {
            ns.insert(binding.id.clone(), value);
        }
    }
    let Some(selector) = &node.selector else {
        return;
    };
    if let Some((name, sub)) = matches.subcommand() {
        ns.insert(selector.clone(), Value::Str(name.to_string()));
        if let Some((_, child)) = node.cmds.iter().find(|(it, _)| it == name) {
            collect(child, sub, ns);
        }
    }
}

impl Binding {
    fn extract(&self, matches: &ArgMatches) -> Option<Value> {
        if self.switch {
            let on = matches.try_get_one::<bool>(&self.key).ok().flatten().copied();
            return Some(Value::Bool(on.unwrap_or(false)));
        }
        let mut values = matches.try_get_many::<Value>(&self.key).ok().flatten()?.cloned();
        if self.multiple {
            Some(Value::List(values.collect()))
        } else {
            values.next()
        }
    }
}

/// Parses tokens into [`Value`]s of one element type and enforces the
/// allowed choices.
#[derive(Debug, Clone)]
struct ElementParser {
    ty: Ty,
    choices: Option<Vec<Value>>,
}

impl TypedValueParser for ElementParser {
    type Value = Value;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &OsStr,
    ) -> Result<Value, clap::Error> {
        let Some(text) = value.to_str() else {
            return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
        };
        let value = self.ty.parse(text).map_err(|err| invalid(cmd, arg, text, &err))?;
        if let Some(choices) = &self.choices {
            if !choices.contains(&value) {
                let expected = choices.iter().map(ToString::to_string).collect::<Vec<_>>();
                let reason = format!("expected one of: {}", expected.join(", "));
                return Err(invalid(cmd, arg, text, &reason));
            }
        }
        Ok(value)
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        let choices = self.choices.as_ref()?;
        Some(Box::new(choices.iter().map(|it| PossibleValue::new(it.to_string()))))
    }
}

fn invalid(cmd: &clap::Command, arg: Option<&clap::Arg>, text: &str, reason: &str) -> clap::Error {
    let arg = arg.map(ToString::to_string).unwrap_or_else(|| "...".to_string());
    let message = format!("invalid value '{text}' for '{arg}': {reason}\n");
    clap::Error::raw(ErrorKind::InvalidValue, message).with_cmd(cmd)
}
