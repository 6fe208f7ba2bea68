use std::any::Any;
use std::fmt;

use mcm_types::ObjectKind;

/// Name reported for the fallback handler.
pub const FALLBACK: &str = "fallback";

struct Handler<F: ?Sized> {
    kind: ObjectKind,
    name: String,
    function: Box<F>,
}

/// Ordered handler table with break semantics.
///
/// `F` is the handler's function type, usually a `dyn Fn(..)`. The table
/// only chooses a handler; calling it is left to the specialization, which
/// knows the handler's arguments.
pub struct BreakPipeline<F: ?Sized> {
    handlers: Vec<Handler<F>>,
    fallback: Box<F>,
}

/// The handler chosen for one candidate.
pub struct Selected<'a, F: ?Sized> {
    pub name: &'a str,
    /// Kind the handler was registered for; `None` for the fallback.
    pub kind: Option<ObjectKind>,
    pub function: &'a F,
}

impl<F: ?Sized> Selected<'_, F> {
    pub fn is_fallback(&self) -> bool {
        self.kind.is_none()
    }

    /// Label of the candidate for diagnostics.
    pub fn candidate_label(&self) -> &'static str {
        self.kind.map_or("unhandled candidate", |kind| kind.name())
    }
}

impl<F: ?Sized> BreakPipeline<F> {
    /// Create an empty table routing everything to `fallback`.
    pub fn new(fallback: Box<F>) -> Self {
        Self {
            handlers: Vec::new(),
            fallback,
        }
    }

    /// Append a handler for `kind`. Earlier handlers of the same kind win.
    pub fn push(&mut self, kind: ObjectKind, name: impl Into<String>, function: Box<F>) {
        self.handlers.push(Handler {
            kind,
            name: name.into(),
            function,
        });
    }

    pub fn set_fallback(&mut self, fallback: Box<F>) {
        self.fallback = fallback;
    }

    /// The first handler whose kind is the runtime type of `candidate`, or
    /// the fallback.
    pub fn select(&self, candidate: &dyn Any) -> Selected<'_, F> {
        self.handlers
            .iter()
            .find(|handler| handler.kind.matches(candidate))
            .map_or(
                Selected {
                    name: FALLBACK,
                    kind: None,
                    function: &*self.fallback,
                },
                |handler| Selected {
                    name: &handler.name,
                    kind: Some(handler.kind),
                    function: &*handler.function,
                },
            )
    }

    /// Returns `true` if some handler other than the fallback accepts `kind`.
    pub fn handles(&self, kind: ObjectKind) -> bool {
        self.handlers.iter().any(|handler| handler.kind == kind)
    }

    /// Number of registered handlers, fallback excluded.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handler names in registration order.
    pub fn handler_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.handlers.iter().map(|handler| handler.name.as_str())
    }
}

impl<F: ?Sized> fmt::Debug for BreakPipeline<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.handlers.iter().map(|h| (h.kind, &h.name)))
            .finish()
    }
}
