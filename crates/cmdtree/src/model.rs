//! Descriptor records for a command tree.
//!
//! Everything here is plain data. Nothing validates or infers on
//! construction: see [`crate::validate`] and [`crate::eval`] for that.
use std::{collections::BTreeMap, fmt, ptr};

/// Handler attached to a [`Cmd`], called with the command itself and the
/// bundle of the current invocation. A non-zero return stops the chain.
pub type Handler = Box<dyn Fn(&Cmd, &Bundle<'_>) -> i32>;

/// Deferred default, computed once the bundle is known.
pub type Compute = Box<dyn Fn(&Arg, &Cmd, &Bundle<'_>) -> Value>;

/// Post-parse transformation of a bound value.
pub type Evaluate = Box<dyn Fn(Value, &Arg, &Cmd, &Bundle<'_>) -> Value>;

/// Element type of an argument's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ty {
    Str,
    Int,
    Float,
    Bool,
}

impl Ty {
    pub(crate) fn parse(self, text: &str) -> Result<Value, String> {
        let res = match self {
            Ty::Str => Value::Str(text.to_string()),
            Ty::Int => Value::Int(text.parse().map_err(|err| format!("{err}"))?),
            Ty::Float => Value::Float(text.parse().map_err(|err| format!("{err}"))?),
            Ty::Bool => Value::Bool(text.parse().map_err(|err| format!("{err}"))?),
        };
        Ok(res)
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Ty::Str => "str",
            Ty::Int => "int",
            Ty::Float => "float",
            Ty::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// Element type of a single value, `None` for lists.
    pub fn ty(&self) -> Option<Ty> {
        match self {
            Value::Str(_) => Some(Ty::Str),
            Value::Int(_) => Some(Ty::Int),
            Value::Float(_) => Some(Ty::Float),
            Value::Bool(_) => Some(Ty::Bool),
            Value::List(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(it) => Some(it),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(it) => Some(*it),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(it) => Some(*it),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(it) => Some(*it),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(it) => Some(it),
            _ => None,
        }
    }

    /// Number of individual values this stands for.
    pub(crate) fn len(&self) -> usize {
        match self {
            Value::List(it) => it.len(),
            _ => 1,
        }
    }

    /// The individual values, a list flattened one level.
    pub(crate) fn items(&self) -> &[Value] {
        match self {
            Value::List(it) => it,
            it => std::slice::from_ref(it),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(it) => f.write_str(it),
            Value::Int(it) => fmt::Display::fmt(it, f),
            Value::Float(it) => fmt::Display::fmt(it, f),
            Value::Bool(it) => fmt::Display::fmt(it, f),
            Value::List(it) => {
                let mut sep = "";
                for item in it {
                    write!(f, "{sep}{item}")?;
                    sep = " ";
                }
                Ok(())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(it: &str) -> Value {
        Value::Str(it.to_string())
    }
}

impl From<String> for Value {
    fn from(it: String) -> Value {
        Value::Str(it)
    }
}

impl From<i64> for Value {
    fn from(it: i64) -> Value {
        Value::Int(it)
    }
}

impl From<i32> for Value {
    fn from(it: i32) -> Value {
        Value::Int(it.into())
    }
}

impl From<f64> for Value {
    fn from(it: f64) -> Value {
        Value::Float(it)
    }
}

impl From<bool> for Value {
    fn from(it: bool) -> Value {
        Value::Bool(it)
    }
}

impl From<Vec<Value>> for Value {
    fn from(it: Vec<Value>) -> Value {
        Value::List(it)
    }
}

/// Arity as written by the author: a count or one of `?`, `*`, `+`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Count {
    Exact(i32),
    Symbol(char),
}

impl From<i32> for Count {
    fn from(it: i32) -> Count {
        Count::Exact(it)
    }
}

impl From<char> for Count {
    fn from(it: char) -> Count {
        Count::Symbol(it)
    }
}

pub enum DefaultValue {
    Static(Value),
    Computed(Compute),
}

impl PartialEq for DefaultValue {
    fn eq(&self, other: &DefaultValue) -> bool {
        match (self, other) {
            (DefaultValue::Static(lhs), DefaultValue::Static(rhs)) => lhs == rhs,
            (DefaultValue::Computed(lhs), DefaultValue::Computed(rhs)) => {
                ptr::addr_eq(lhs.as_ref(), rhs.as_ref())
            }
            _ => false,
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Static(it) => f.debug_tuple("Static").field(it).finish(),
            DefaultValue::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// One bindable value of a command, positional when it has no options.
#[derive(Default)]
pub struct Arg {
    pub name: String,
    pub options: Option<Vec<String>>,
    pub display: Option<String>,
    pub ty: Option<Ty>,
    pub default: Option<DefaultValue>,
    pub choices: Option<Vec<Value>>,
    pub count: Option<Count>,
    pub required: Option<bool>,
    pub help: Option<String>,
    pub evaluate: Option<Evaluate>,
}

impl Arg {
    pub fn new(name: impl Into<String>) -> Arg {
        Arg { name: name.into(), ..Default::default() }
    }

    /// Adds one option string, `-x` or `--long`.
    pub fn option(mut self, option: impl Into<String>) -> Arg {
        self.options.get_or_insert_with(Vec::new).push(option.into());
        self
    }

    pub fn options<I, S>(mut self, options: I) -> Arg
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    pub fn display(mut self, display: impl Into<String>) -> Arg {
        self.display = Some(display.into());
        self
    }

    pub fn ty(mut self, ty: Ty) -> Arg {
        self.ty = Some(ty);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Arg {
        self.default = Some(DefaultValue::Static(value.into()));
        self
    }

    pub fn default_with<F>(mut self, f: F) -> Arg
    where
        F: Fn(&Arg, &Cmd, &Bundle<'_>) -> Value + 'static,
    {
        self.default = Some(DefaultValue::Computed(Box::new(f)));
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Arg
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn count(mut self, count: impl Into<Count>) -> Arg {
        self.count = Some(count.into());
        self
    }

    pub fn required(mut self, required: bool) -> Arg {
        self.required = Some(required);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Arg {
        self.help = Some(help.into());
        self
    }

    pub fn evaluate<F>(mut self, f: F) -> Arg
    where
        F: Fn(Value, &Arg, &Cmd, &Bundle<'_>) -> Value + 'static,
    {
        self.evaluate = Some(Box::new(f));
        self
    }

    pub fn is_positional(&self) -> bool {
        self.options.as_ref().map_or(true, |it| it.is_empty())
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arg")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("display", &self.display)
            .field("ty", &self.ty)
            .field("default", &self.default)
            .field("choices", &self.choices)
            .field("count", &self.count)
            .field("required", &self.required)
            .field("help", &self.help)
            .field("evaluate", &self.evaluate.as_ref().map(|_| ".."))
            .finish()
    }
}

/// A node of the command tree: the root, or a subcommand.
///
/// An empty `name` stands for "no name" and is only legal at the root.
#[derive(Default)]
pub struct Cmd {
    pub name: String,
    pub brief: Option<String>,
    pub prolog: Option<String>,
    pub epilog: Option<String>,
    pub run: Option<Handler>,
    pub args: Vec<Arg>,
    pub cmds: Vec<Cmd>,
}

impl Cmd {
    pub fn new(name: impl Into<String>) -> Cmd {
        Cmd { name: name.into(), ..Default::default() }
    }

    pub fn brief(mut self, brief: impl Into<String>) -> Cmd {
        self.brief = Some(brief.into());
        self
    }

    pub fn prolog(mut self, prolog: impl Into<String>) -> Cmd {
        self.prolog = Some(prolog.into());
        self
    }

    pub fn epilog(mut self, epilog: impl Into<String>) -> Cmd {
        self.epilog = Some(epilog.into());
        self
    }

    pub fn run<F>(mut self, f: F) -> Cmd
    where
        F: Fn(&Cmd, &Bundle<'_>) -> i32 + 'static,
    {
        self.run = Some(Box::new(f));
        self
    }

    pub fn arg(mut self, arg: Arg) -> Cmd {
        self.args.push(arg);
        self
    }

    pub fn cmd(mut self, cmd: Cmd) -> Cmd {
        self.cmds.push(cmd);
        self
    }

    pub fn arg_named(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|it| it.name == name)
    }

    pub fn cmd_named(&self, name: &str) -> Option<&Cmd> {
        self.cmds.iter().find(|it| it.name == name)
    }
}

impl fmt::Debug for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cmd")
            .field("name", &self.name)
            .field("brief", &self.brief)
            .field("prolog", &self.prolog)
            .field("epilog", &self.epilog)
            .field("run", &self.run.as_ref().map(|_| ".."))
            .field("args", &self.args)
            .field("cmds", &self.cmds)
            .finish()
    }
}

/// Raw output of one parse: argument identifiers and selector names mapped to
/// the values the engine produced.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Namespace {
    values: BTreeMap<String, Value>,
}

impl Namespace {
    pub fn new() -> Namespace {
        Namespace::default()
    }

    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    pub fn insert(&mut self, id: impl Into<String>, value: Value) {
        self.values.insert(id.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(id, value)| (id.as_str(), value))
    }
}

/// The matched chain of commands together with the values bound to their
/// arguments. Built once per invocation, read-only afterwards.
pub struct Bundle<'a> {
    pub(crate) cmds: Vec<&'a Cmd>,
    pub(crate) args: Vec<(&'a Cmd, &'a Arg, Value)>,
}

impl<'a> Bundle<'a> {
    /// Matched commands, root first.
    pub fn cmds(&self) -> &[&'a Cmd] {
        &self.cmds
    }

    /// The deepest matched command.
    pub fn leaf(&self) -> Option<&'a Cmd> {
        self.cmds.last().copied()
    }

    /// Value bound to `arg`, looked up by identity.
    pub fn get(&self, arg: &Arg) -> Option<&Value> {
        self.args.iter().find(|(_, it, _)| ptr::eq(*it, arg)).map(|(_, _, value)| value)
    }

    /// Value bound to the argument of `cmd` called `name`.
    pub fn value(&self, cmd: &Cmd, name: &str) -> Option<&Value> {
        self.get(cmd.arg_named(name)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'a Arg, &Value)> + '_ {
        self.args.iter().map(|(_, arg, value)| (*arg, value))
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

impl fmt::Debug for Bundle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        struct Args<'b, 'a>(&'b [(&'a Cmd, &'a Arg, Value)]);

        impl fmt::Debug for Args<'_, '_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.debug_map().entries(self.0.iter().map(|(_, arg, value)| (&arg.name, value))).finish()
            }
        }

        let cmds = self.cmds.iter().map(|it| it.name.as_str()).collect::<Vec<_>>();
        f.debug_struct("Bundle").field("cmds", &cmds).field("args", &Args(&self.args)).finish()
    }
}
