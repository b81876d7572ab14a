//! Turns a parsed [`Namespace`] back into the matched chain of commands and
//! runs their handlers.
//!
//! Finalizing a bundle happens in three passes over the chain, each in
//! declaration order:
//!
//! 1. values present in the namespace are bound as is;
//! 2. computed defaults of arguments left unbound are resolved, each seeing
//!    the bundle as it stood after pass 1;
//! 3. `evaluate` transforms run on every bound value, each seeing the bundle
//!    as it stood after pass 2.
use tracing::{debug, trace};

use crate::{
    compile::selector_id,
    eval,
    model::{Arg, Bundle, Cmd, DefaultValue, Namespace, Value},
    Error, Result,
};

/// Builds the bundle for `ns` and runs its handlers.
pub fn dispatch(root: &Cmd, ns: &Namespace) -> Result<i32> {
    let bundle = bundle(root, ns)?;
    Ok(run(&bundle))
}

/// Walks down from `root` following the selectors recorded in `ns`.
pub fn bundle<'a>(root: &'a Cmd, ns: &Namespace) -> Result<Bundle<'a>> {
    let mut cmds = Vec::new();
    let mut slots = Vec::new();
    let mut names = Vec::new();

    let mut cmd = root;
    loop {
        cmds.push(cmd);
        names.push(cmd.name.as_str());
        for arg in &cmd.args {
            slots.push(Slot { cmd, arg, state: bind(arg, ns) });
        }
        if cmd.cmds.is_empty() {
            break;
        }

        let selector = selector_id(&names);
        let chosen = ns.get(&selector).and_then(Value::as_str);
        let Some(child) = chosen.and_then(|name| cmd.cmd_named(name)) else {
            return Err(Error::Inconsistent { selector, value: chosen.map(str::to_string) });
        };
        trace!(selector = %selector, cmd = %child.name, "descending");
        cmd = child;
    }
    debug!(chain = ?names, "matched");

    // Computed defaults.
    let raw = snapshot(&cmds, &slots);
    let computed = slots
        .iter()
        .map(|slot| match (&slot.state, &slot.arg.default) {
            (State::Deferred, Some(DefaultValue::Computed(f))) => Some(f(slot.arg, slot.cmd, &raw)),
            _ => None,
        })
        .collect::<Vec<_>>();
    for (slot, value) in slots.iter_mut().zip(computed) {
        if let State::Deferred = slot.state {
            slot.state = value.map_or(State::Unbound, State::Bound);
        }
    }

    // Transforms.
    let defaulted = snapshot(&cmds, &slots);
    let evaluated = slots
        .iter()
        .map(|slot| match (&slot.state, &slot.arg.evaluate) {
            (State::Bound(value), Some(f)) => Some(f(value.clone(), slot.arg, slot.cmd, &defaulted)),
            _ => None,
        })
        .collect::<Vec<_>>();
    for (slot, value) in slots.iter_mut().zip(evaluated) {
        if let Some(value) = value {
            slot.state = State::Bound(value);
        }
    }

    Ok(snapshot(&cmds, &slots))
}

/// Calls the handlers of the chain, root first, until one returns non-zero.
pub fn run(bundle: &Bundle<'_>) -> i32 {
    for &cmd in bundle.cmds() {
        let Some(handler) = &cmd.run else {
            continue;
        };
        let code = handler(cmd, bundle);
        debug!(cmd = %cmd.name, code, "handler returned");
        if code != 0 {
            return code;
        }
    }
    0
}

struct Slot<'a> {
    cmd: &'a Cmd,
    arg: &'a Arg,
    state: State,
}

enum State {
    Bound(Value),
    /// Waits for its computed default.
    Deferred,
    Unbound,
}

fn bind(arg: &Arg, ns: &Namespace) -> State {
    let shape = eval::arg(arg);
    let raw = ns.get(&shape.id);

    if shape.is_switch() {
        // Present switches bind their default in place of `true`.
        let on = raw.and_then(Value::as_bool).unwrap_or(false);
        return match &arg.default {
            None => State::Bound(Value::Bool(on)),
            Some(_) if !on => State::Unbound,
            Some(DefaultValue::Static(value)) => State::Bound(value.clone()),
            Some(DefaultValue::Computed(_)) => State::Deferred,
        };
    }

    match (raw, &arg.default) {
        (Some(value), _) => State::Bound(value.clone()),
        (None, Some(DefaultValue::Computed(_))) => State::Deferred,
        (None, _) => State::Unbound,
    }
}

fn snapshot<'a>(cmds: &[&'a Cmd], slots: &[Slot<'a>]) -> Bundle<'a> {
    let args = slots
        .iter()
        .filter_map(|slot| match &slot.state {
            State::Bound(value) => Some((slot.cmd, slot.arg, value.clone())),
            State::Deferred | State::Unbound => None,
        })
        .collect();
    Bundle { cmds: cmds.to_vec(), args }
}
