//! Generic finite-state machine for agent-loop progression.
//!
//! States are plain string names, events are string labels, and transition
//! logic lives in per-state handlers. The machine records every state it
//! leaves, so the full progression of an agent session (idle, running,
//! paused, ...) can be replayed after the fact.
//!
//! A "terminal" state is not a special construct: it is simply a state
//! whose handler always returns `None`, or one with no handler at all.
//!
//! ```rust
//! use seam::StateMachine;
//!
//! let mut machine = StateMachine::new("idle");
//! machine
//!     .state("idle", |_event, _machine| Some("running".to_string()))
//!     .state("running", |_event, _machine| Some("idle".to_string()));
//!
//! assert!(machine.send("turn_started"));
//! assert!(machine.is("running"));
//! assert_eq!(machine.past(), vec!["idle".to_string()]);
//! ```

use std::collections::HashMap;

/// Read-only view of the machine handed to transition handlers.
///
/// Handlers receive a view rather than the machine itself, so a handler
/// cannot re-enter [`StateMachine::send`] while a transition is being
/// decided.
#[derive(Debug, Clone, Copy)]
pub struct MachineContext<'a> {
    current: &'a str,
    past: &'a [String],
}

impl<'a> MachineContext<'a> {
    /// Name of the state the machine is in.
    pub fn current_state(&self) -> &'a str {
        self.current
    }

    /// Check the current state against `name`.
    pub fn is(&self, name: &str) -> bool {
        self.current == name
    }

    /// States the machine has left so far, oldest first.
    pub fn past(&self) -> &'a [String] {
        self.past
    }
}

type Handler = Box<dyn FnMut(&str, MachineContext<'_>) -> Option<String>>;
type Hook = Box<dyn FnMut()>;

/// Optional enter/exit callbacks for a registered state.
///
/// ```rust
/// use seam::StateHooks;
///
/// let hooks = StateHooks::new()
///     .enter(|| println!("entering"))
///     .exit(|| println!("leaving"));
/// ```
#[derive(Default)]
pub struct StateHooks {
    enter: Option<Hook>,
    exit: Option<Hook>,
}

impl StateHooks {
    /// Hooks with neither callback set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the callback invoked after the machine enters the state.
    pub fn enter<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.enter = Some(Box::new(hook));
        self
    }

    /// Set the callback invoked before the machine leaves the state.
    pub fn exit<F>(mut self, hook: F) -> Self
    where
        F: FnMut() + 'static,
    {
        self.exit = Some(Box::new(hook));
        self
    }
}

struct StateEntry {
    handler: Handler,
    hooks: StateHooks,
}

/// State-transition engine with named states, handlers, hooks, and history.
///
/// Registration is fluent ([`state`](Self::state) returns the machine) and
/// independent of transition order: states may be registered before or
/// interleaved with use, and registering a name twice replaces its handler
/// and hooks.
pub struct StateMachine {
    current: String,
    history: Vec<String>,
    states: HashMap<String, StateEntry>,
}

impl std::fmt::Debug for StateMachine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.current)
            .field("history", &self.history)
            .field("states", &self.states.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl StateMachine {
    /// Create a machine sitting in `initial`; no states need exist yet.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            current: initial.into(),
            history: Vec::new(),
            states: HashMap::new(),
        }
    }

    /// Register (or replace) the handler for `name`, with no hooks.
    pub fn state<H>(&mut self, name: impl Into<String>, handler: H) -> &mut Self
    where
        H: FnMut(&str, MachineContext<'_>) -> Option<String> + 'static,
    {
        self.state_with_hooks(name, handler, StateHooks::new())
    }

    /// Register (or replace) the handler and enter/exit hooks for `name`.
    pub fn state_with_hooks<H>(
        &mut self,
        name: impl Into<String>,
        handler: H,
        hooks: StateHooks,
    ) -> &mut Self
    where
        H: FnMut(&str, MachineContext<'_>) -> Option<String> + 'static,
    {
        self.states.insert(
            name.into(),
            StateEntry {
                handler: Box::new(handler),
                hooks,
            },
        );
        self
    }

    /// Dispatch `event` to the current state's handler.
    ///
    /// Returns `false`, without mutating anything or firing any hook, when
    /// the current state has no registered handler, when the handler
    /// returns `None`, or when it names the current state again
    /// (self-transitions are rejected). Otherwise the current state's exit
    /// hook fires, the old state is appended to history, the machine moves,
    /// the new state's enter hook fires, and `send` returns `true`.
    ///
    /// Transitioning into a name with no registered state is legal; further
    /// `send` calls simply return `false` until a handler is registered
    /// for it.
    pub fn send(&mut self, event: &str) -> bool {
        let next = match self.states.get_mut(self.current.as_str()) {
            Some(entry) => {
                let context = MachineContext {
                    current: &self.current,
                    past: &self.history,
                };
                (entry.handler)(event, context)
            }
            None => return false,
        };
        let next = match next {
            Some(next) if next != self.current => next,
            _ => return false,
        };

        // exit fires strictly before the move, enter strictly after
        if let Some(entry) = self.states.get_mut(self.current.as_str()) {
            if let Some(exit) = entry.hooks.exit.as_mut() {
                exit();
            }
        }
        let previous = std::mem::replace(&mut self.current, next);
        self.history.push(previous);
        if let Some(entry) = self.states.get_mut(self.current.as_str()) {
            if let Some(enter) = entry.hooks.enter.as_mut() {
                enter();
            }
        }
        true
    }

    /// Check the current state against `name`.
    pub fn is(&self, name: &str) -> bool {
        self.current == name
    }

    /// Name of the state the machine is in.
    pub fn current_state(&self) -> &str {
        &self.current
    }

    /// Defensive copy of the transition history, oldest first.
    ///
    /// Mutating the returned vector never affects the machine.
    pub fn past(&self) -> Vec<String> {
        self.history.clone()
    }
}
