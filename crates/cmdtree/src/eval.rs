//! Derives the effective shape of an [`Arg`], filling in every field the
//! author left out.
//!
//! Resolution order is fixed, so a partially specified descriptor always
//! yields the same shape:
//!
//! * value type: explicit type, then the type of a static default, then the
//!   type of the first choice, then `str`;
//! * display: explicit display, then the identifier upper-cased;
//! * arity: explicit count, then exactly one;
//! * required: explicit flag, then `true` for positionals and `false` for
//!   flagged arguments.
//!
//! Evaluation is pure and assumes the descriptor already passed
//! [`crate::validate`].
use crate::model::{Arg, Count, DefaultValue, Ty, Value};

/// How many values an argument consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    /// `?`
    Optional,
    /// `*`
    Repeated,
    /// `+`
    AtLeastOne,
}

impl Arity {
    pub fn min(self) -> usize {
        match self {
            Arity::Exact(n) => n,
            Arity::Optional | Arity::Repeated => 0,
            Arity::AtLeastOne => 1,
        }
    }

    pub fn max(self) -> Option<usize> {
        match self {
            Arity::Exact(n) => Some(n),
            Arity::Optional => Some(1),
            Arity::Repeated | Arity::AtLeastOne => None,
        }
    }

    /// Whether the bound value is a list rather than a single value.
    pub fn is_multiple(self) -> bool {
        self.max().map_or(true, |it| it > 1)
    }

    /// Whether `n` values satisfy this arity.
    pub fn accepts(self, n: usize) -> bool {
        n >= self.min() && self.max().map_or(true, |max| n <= max)
    }
}

/// Effective values of one argument.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape<'a> {
    pub id: String,
    pub options: Vec<&'a str>,
    pub display: String,
    pub ty: Ty,
    pub default: Option<&'a DefaultValue>,
    pub choices: Option<Vec<Value>>,
    pub arity: Arity,
    pub required: bool,
    pub help: Option<&'a str>,
}

impl Shape<'_> {
    pub fn is_positional(&self) -> bool {
        self.options.is_empty()
    }

    /// A flag that takes no values and only records its presence.
    pub fn is_switch(&self) -> bool {
        self.arity == Arity::Exact(0)
    }

    /// Whether the engine itself should insist on the argument. A default, or
    /// an arity that admits zero values, already satisfies it.
    pub(crate) fn engine_required(&self) -> bool {
        self.required && self.default.is_none() && self.arity.min() > 0
    }
}

pub fn arg(arg: &Arg) -> Shape<'_> {
    let options = arg.options.iter().flatten().map(String::as_str).collect::<Vec<_>>();
    Shape {
        id: id(&arg.name),
        display: display(arg),
        ty: ty(arg),
        default: arg.default.as_ref(),
        choices: arg.choices.clone(),
        arity: arity(arg.count),
        required: arg.required.unwrap_or(options.is_empty()),
        help: arg.help.as_deref(),
        options,
    }
}

/// Binding key for a name: `_` is doubled, then `-` becomes `_`.
pub fn id(name: &str) -> String {
    name.replace('_', "__").replace('-', "_")
}

fn display(arg: &Arg) -> String {
    match arg.display.as_deref() {
        Some(display) if !display.is_empty() => display.to_string(),
        _ => id(&arg.name).to_uppercase(),
    }
}

fn ty(arg: &Arg) -> Ty {
    if let Some(ty) = arg.ty {
        return ty;
    }
    if let Some(DefaultValue::Static(value)) = &arg.default {
        if let Some(ty) = value.items().first().and_then(Value::ty) {
            return ty;
        }
    }
    arg.choices.iter().flatten().next().and_then(Value::ty).unwrap_or(Ty::Str)
}

fn arity(count: Option<Count>) -> Arity {
    match count {
        None => Arity::Exact(1),
        Some(Count::Exact(n)) => Arity::Exact(usize::try_from(n).unwrap_or(0)),
        Some(Count::Symbol('?')) => Arity::Optional,
        Some(Count::Symbol('*')) => Arity::Repeated,
        Some(Count::Symbol('+')) => Arity::AtLeastOne,
        Some(Count::Symbol(_)) => Arity::Exact(1),
    }
}
