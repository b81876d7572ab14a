//! Declarative command trees on top of `clap`.
//!
//! Describe the whole interface as a tree of [`Cmd`]s and [`Arg`]s, attach
//! handlers, and let the crate check, compile, parse and dispatch it:
//!
//! ```no_run
//! use cmdtree::{Arg, Cmd};
//!
//! let app = Cmd::new("app").cmd(
//!     Cmd::new("greet")
//!         .brief("Say hello")
//!         .arg(Arg::new("name"))
//!         .run(|cmd, bundle| {
//!             let name = bundle.value(cmd, "name").and_then(|it| it.as_str()).unwrap_or("");
//!             println!("hello, {name}");
//!             0
//!         }),
//! );
//! cmdtree::main_or_exit(&app);
//! ```
//!
//! Handlers run root first. The first one to return non-zero stops the chain
//! and its code becomes the exit status.
//!
//! The tree is checked as a whole before anything is parsed: a single bad
//! descriptor anywhere makes [`Parser::new`] fail with a [`SchemaError`]
//! pointing at it.

mod compile;
pub mod dispatch;
pub mod eval;
mod model;
pub mod validate;

use std::ffi::OsString;

use tracing::debug;

pub use crate::{
    compile::{selector_help, selector_id, Parser},
    eval::{Arity, Shape},
    model::{
        Arg, Bundle, Cmd, Compute, Count, DefaultValue, Evaluate, Handler, Namespace, Ty, Value,
    },
    validate::SchemaError,
};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The tree itself is malformed.
    #[error(transparent)]
    Schema(#[from] SchemaError),
    /// The command line did not match the tree, or help was requested.
    #[error(transparent)]
    Parse(#[from] clap::Error),
    /// A selector named a subcommand the tree does not have.
    #[error("cmdtree: selector `{selector}` chose {value:?}, which names no subcommand")]
    Inconsistent { selector: String, value: Option<String> },
}

impl Error {
    /// Reports the error and exits. Help and usage go through `clap`, with its
    /// own exit codes.
    pub fn exit(self) -> ! {
        match self {
            Error::Parse(err) => err.exit(),
            err => {
                eprintln!("{err}");
                std::process::exit(1)
            }
        }
    }
}

/// Compiles `root`, parses `args` (without the binary name) and dispatches.
pub fn main_from<I, T>(root: &Cmd, args: I) -> Result<i32>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let parser = Parser::new(root)?;
    let ns = parser.parse_from(args)?;
    dispatch::dispatch(root, &ns)
}

/// Like [`main_from`], for the arguments of the current process.
pub fn main(root: &Cmd) -> Result<i32> {
    let parser = Parser::new(root)?;
    let ns = parser.parse_env()?;
    dispatch::dispatch(root, &ns)
}

pub fn main_or_exit(root: &Cmd) -> ! {
    match main(root) {
        Ok(code) => {
            debug!(code, "exiting");
            std::process::exit(code)
        }
        Err(err) => err.exit(),
    }
}
