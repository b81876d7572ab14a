//! Shape rules for descriptors.
//!
//! Checks are structural only and run before anything is parsed. The first
//! failure in document order wins: a command's own fields, then its arguments
//! in declaration order, then its subcommands, depth first.
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    eval,
    model::{Arg, Cmd, Count, DefaultValue, Value},
};

static NAME: Lazy<Regex> = Lazy::new(|| re(r"^[a-zA-Z][a-zA-Z0-9_-]*[a-zA-Z0-9]$"));
static SHORT: Lazy<Regex> = Lazy::new(|| re(r"^-[a-zA-Z]$"));
static LONG: Lazy<Regex> = Lazy::new(|| re(r"^--[a-zA-Z][a-zA-Z0-9_-]*[a-zA-Z0-9]$"));

/// Options the engine generates on its own.
const RESERVED: &[&str] = &["-h", "--help"];

fn re(pattern: &str) -> Regex {
    match Regex::new(pattern) {
        Ok(it) => it,
        Err(err) => panic!("invalid builtin pattern `{pattern}`: {err}"),
    }
}

/// A descriptor broke one of the shape rules.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cmdtree: {origin}: {message}")]
pub struct SchemaError {
    /// Path to the offending node: `root/sub` for commands, `root/sub.arg`
    /// for arguments.
    pub origin: String,
    pub message: String,
}

type Result<T = (), E = SchemaError> = std::result::Result<T, E>;

/// Where the walk currently is.
///
/// Stands in for parent links: the path and the identifiers bound along it
/// are pushed when entering a command and truncated when leaving it.
#[derive(Debug, Default)]
pub(crate) struct Scope {
    path: String,
    names: Vec<String>,
    ids: Vec<(String, String)>,
}

/// Lengths to restore when leaving a command.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Mark {
    path: usize,
    names: usize,
    ids: usize,
}

impl Scope {
    pub(crate) fn new(root: &Cmd) -> Scope {
        let mut res = Scope::default();
        res.path.push_str(&segment("App", &root.name, 0));
        res.names.push(root.name.clone());
        res
    }

    pub(crate) fn push(&mut self, cmd: &Cmd, idx: usize) -> Mark {
        let mark = Mark { path: self.path.len(), names: self.names.len(), ids: self.ids.len() };
        self.path.push('/');
        self.path.push_str(&segment("App", &cmd.name, idx));
        self.names.push(cmd.name.clone());
        mark
    }

    pub(crate) fn pop(&mut self, mark: Mark) {
        self.path.truncate(mark.path);
        self.names.truncate(mark.names);
        self.ids.truncate(mark.ids);
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Command names from the root down to the current command.
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn arg_origin(&self, arg: &Arg, idx: usize) -> String {
        format!("{}.{}", self.path, segment("Arg", &arg.name, idx))
    }

    fn error(&self, message: impl Into<String>) -> SchemaError {
        SchemaError { origin: self.path.clone(), message: message.into() }
    }
}

fn segment(kind: &str, name: &str, idx: usize) -> String {
    if name.is_empty() {
        format!("{kind}{idx}")
    } else {
        name.to_string()
    }
}

/// Checks a whole tree, the root and everything below it.
pub fn tree(root: &Cmd) -> Result {
    let mut scope = Scope::new(root);
    cmd(root, &scope, &[])?;
    tree_rec(root, &mut scope)
}

fn tree_rec(parent: &Cmd, scope: &mut Scope) -> Result {
    args(parent, scope)?;
    for (idx, child) in parent.cmds.iter().enumerate() {
        let mark = scope.push(child, idx);
        cmd(child, scope, &parent.cmds[..idx])?;
        tree_rec(child, scope)?;
        scope.pop(mark);
    }
    Ok(())
}

/// All arguments of `cmd` in declaration order, then the rules that span
/// them. Identifiers stay bound in `scope` until the command is left.
pub(crate) fn args(cmd: &Cmd, scope: &mut Scope) -> Result {
    let mut taken = Vec::new();
    for (idx, it) in cmd.args.iter().enumerate() {
        arg(it, idx, scope, &mut taken)?;
    }
    positionals(cmd, scope)
}

/// The rules on a command's own fields. `earlier` are the siblings declared
/// before it.
pub(crate) fn cmd(cmd: &Cmd, scope: &Scope, earlier: &[Cmd]) -> Result {
    let is_root = scope.names.len() == 1;
    if cmd.name.is_empty() {
        if is_root {
            return Ok(());
        }
        return Err(scope.error("Only the root Cmd.name can be empty."));
    }
    if !NAME.is_match(&cmd.name) {
        return Err(scope.error(
            "Cmd.name must consist of letters (a-z, A-Z), numbers (0-9), dashes (-), or \
             underscores (_). The first character must be a letter, the last - a letter or a \
             number.",
        ));
    }
    if earlier.iter().any(|it| it.name == cmd.name) {
        return Err(scope.error(format!(
            "Cmd.name `{}` is already used by a sibling command.",
            cmd.name
        )));
    }
    // brief, prolog, epilog and run are well-formed by construction.
    Ok(())
}

/// The rules on one argument. `taken` collects the option strings of the
/// arguments checked before it, with their owners.
fn arg(
    arg: &Arg,
    idx: usize,
    scope: &mut Scope,
    taken: &mut Vec<(String, String)>,
) -> Result {
    let origin = scope.arg_origin(arg, idx);
    let err = |message: String| SchemaError { origin: origin.clone(), message };

    name(arg).map_err(err)?;
    options(arg, taken).map_err(err)?;
    display(arg).map_err(err)?;
    default(arg).map_err(err)?;
    choices(arg).map_err(err)?;
    count(arg).map_err(err)?;

    let id = eval::id(&arg.name);
    if let Some((_, owner)) = scope.ids.iter().find(|(it, _)| *it == id) {
        return Err(err(format!("Arg.name binds `{id}`, which is already bound by {owner}.")));
    }
    scope.ids.push((id, origin.clone()));
    Ok(())
}

fn name(arg: &Arg) -> Result<(), String> {
    if arg.name.is_empty() {
        return Err("Arg.name must be a non-empty string.".to_string());
    }
    if !NAME.is_match(&arg.name) {
        return Err("Arg.name must consist of letters (a-z, A-Z), numbers (0-9), dashes (-), or \
                    underscores (_). The first character must be a letter, the last - a \
                    letter or a number."
            .to_string());
    }
    Ok(())
}

fn options(arg: &Arg, taken: &mut Vec<(String, String)>) -> Result<(), String> {
    for (idx, option) in arg.options.iter().flatten().enumerate() {
        let len = option.chars().count();
        if len < 2 {
            return Err(format!(
                "Invalid option {idx}. Each option must have at least two characters."
            ));
        }
        if len == 2 && !SHORT.is_match(option) {
            return Err(format!(
                "Invalid option {idx}. A short option must consist of a dash (-) followed by a \
                 letter (a-z, A-Z)."
            ));
        }
        if len > 2 && !LONG.is_match(option) {
            return Err(format!(
                "Invalid option {idx}. A long option must consist of letters (a-z, A-Z), \
                 numbers (0-9), dashes (-), or underscores (_). It must start with \"--\" \
                 followed by a letter. The last character must be a letter or a number."
            ));
        }
        if RESERVED.contains(&option.as_str()) {
            return Err(format!("Invalid option {idx}. `{option}` is generated automatically."));
        }
        if let Some((_, owner)) = taken.iter().find(|(it, _)| it == option) {
            return Err(format!("Invalid option {idx}. `{option}` is already used by {owner}."));
        }
    }
    for option in arg.options.iter().flatten() {
        taken.push((option.clone(), format!("Arg.{}", arg.name)));
    }
    Ok(())
}

fn display(arg: &Arg) -> Result<(), String> {
    match arg.display.as_deref() {
        Some(display) if !display.is_empty() && !NAME.is_match(display) => Err(
            "Arg.display must consist of letters (a-z, A-Z), numbers (0-9), dashes (-), or \
             underscores (_)."
                .to_string(),
        ),
        _ => Ok(()),
    }
}

fn default(arg: &Arg) -> Result<(), String> {
    let Some(DefaultValue::Static(value)) = &arg.default else {
        return Ok(());
    };
    // The default's own type is no evidence here: only an explicit type or
    // the choices constrain it.
    let Some(ty) = arg.ty.or_else(|| first_choice(arg).and_then(Value::ty)) else {
        return Ok(());
    };
    if value.items().iter().any(|it| it.ty() != Some(ty)) {
        return Err(format!("Arg.default must be absent, computed, or {ty}."));
    }
    Ok(())
}

fn choices(arg: &Arg) -> Result<(), String> {
    let Some(choices) = &arg.choices else {
        return Ok(());
    };
    if choices.is_empty() {
        return Err("Arg.choices must not be empty.".to_string());
    }
    let mut expected = arg.ty.or_else(|| match &arg.default {
        Some(DefaultValue::Static(value)) => value.items().first().and_then(Value::ty),
        _ => None,
    });
    for (idx, choice) in choices.iter().enumerate() {
        let Some(ty) = choice.ty() else {
            return Err(format!("Choice {idx} must be a single value, not a list."));
        };
        let expected = *expected.get_or_insert(ty);
        if ty != expected {
            return Err(format!("Choice {idx} is {ty} not {expected}."));
        }
    }
    if let Some(DefaultValue::Static(value)) = &arg.default {
        if let Some(missing) = value.items().iter().find(|it| !choices.contains(it)) {
            return Err(format!("Arg.default `{missing}` must be one of Arg.choices."));
        }
    }
    Ok(())
}

fn count(arg: &Arg) -> Result<(), String> {
    match arg.count {
        None => (),
        Some(Count::Exact(n)) if n < 0 => {
            return Err("Arg.count as int must have a non-negative value.".to_string());
        }
        Some(Count::Exact(0)) if arg.is_positional() => {
            return Err("Arg.count must be greater than 0 for positional arguments.".to_string());
        }
        Some(Count::Exact(_)) => (),
        Some(Count::Symbol('?' | '*' | '+')) => (),
        Some(Count::Symbol(_)) => {
            return Err("Arg.count as char must be '+' (1 or more), '*' (0 or more) or '?' \
                        (0 or 1)."
                .to_string());
        }
    }
    let shape = eval::arg(arg);
    if shape.is_switch() {
        return Ok(());
    }
    if let Some(DefaultValue::Static(value)) = &arg.default {
        let fits = shape.arity.accepts(value.len())
            && (value.as_list().is_none() || shape.arity.is_multiple());
        if !fits {
            return Err(format!(
                "Arg.default provides {} value(s), which Arg.count does not accept.",
                value.len()
            ));
        }
    }
    Ok(())
}

fn first_choice(arg: &Arg) -> Option<&Value> {
    arg.choices.as_ref()?.first()
}

/// Ordering rules among a command's positionals, so the engine can always
/// tell which token belongs where.
fn positionals(cmd: &Cmd, scope: &Scope) -> Result {
    let positionals =
        cmd.args.iter().enumerate().filter(|(_, it)| it.is_positional()).collect::<Vec<_>>();
    let mut optional = false;
    let mut multiple = false;
    for (pos, (idx, arg)) in positionals.iter().enumerate() {
        let shape = eval::arg(arg);
        let err = |message: &str| SchemaError {
            origin: scope.arg_origin(arg, *idx),
            message: message.to_string(),
        };
        let last = pos + 1 == positionals.len();
        if !last && shape.arity.max().is_none() {
            return Err(err(
                "Only the last positional argument can take an unbounded number of values.",
            ));
        }
        if shape.arity.is_multiple() && multiple {
            return Err(err("Only one positional argument can take more than one value."));
        }
        if !shape.engine_required() && multiple {
            return Err(err(
                "A positional argument following a multi-valued one must be required.",
            ));
        }
        if shape.engine_required() && optional {
            return Err(err("A required positional argument cannot follow an optional one."));
        }
        optional |= !shape.engine_required();
        multiple |= shape.arity.is_multiple();
    }
    Ok(())
}
