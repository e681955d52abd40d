//! Transition hooks for circuit breakers

use std::sync::Arc;

type Hook = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional hooks fired on circuit state transitions.
///
/// Each hook receives the circuit name. Hooks fire after the transition has
/// been committed and the state lock released, so a hook may safely query
/// the circuit it fires for.
#[derive(Clone, Default)]
pub struct Callbacks {
    pub on_open: Option<Hook>,
    pub on_close: Option<Hook>,
    pub on_half_open: Option<Hook>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify_open(&self, circuit: &str) {
        if let Some(hook) = &self.on_open {
            hook(circuit);
        }
    }

    pub fn notify_close(&self, circuit: &str) {
        if let Some(hook) = &self.on_close {
            hook(circuit);
        }
    }

    pub fn notify_half_open(&self, circuit: &str) {
        if let Some(hook) = &self.on_half_open {
            hook(circuit);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_open", &self.on_open.is_some())
            .field("on_close", &self.on_close.is_some())
            .field("on_half_open", &self.on_half_open.is_some())
            .finish()
    }
}
