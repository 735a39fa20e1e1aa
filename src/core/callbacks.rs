//! User handlers fired by the polling cycle.

use crate::source::PulseKind;

/// A user handler. Runs on the polling thread, once per cycle at most.
pub type Handler = Box<dyn FnMut() + Send>;

/// At most one handler per pulse kind.
#[derive(Default)]
pub struct CallbackRegistry {
    radiation: Option<Handler>,
    noise: Option<Handler>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install, replace, or (with `None`) clear the handler for `kind`.
    pub fn set(&mut self, kind: PulseKind, handler: Option<Handler>) {
        *self.slot(kind) = handler;
    }

    pub fn is_registered(&self, kind: PulseKind) -> bool {
        match kind {
            PulseKind::Radiation => self.radiation.is_some(),
            PulseKind::Noise => self.noise.is_some(),
        }
    }

    /// Invoke the handler for `kind` if one is installed.
    ///
    /// Returns whether a handler ran.
    pub fn fire(&mut self, kind: PulseKind) -> bool {
        match self.slot(kind) {
            Some(handler) => {
                handler();
                true
            }
            None => false,
        }
    }

    fn slot(&mut self, kind: PulseKind) -> &mut Option<Handler> {
        match kind {
            PulseKind::Radiation => &mut self.radiation,
            PulseKind::Noise => &mut self.noise,
        }
    }
}

impl std::fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackRegistry")
            .field("radiation", &self.radiation.is_some())
            .field("noise", &self.noise.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_handler(hits: &Arc<AtomicUsize>) -> Handler {
        let hits = Arc::clone(hits);
        Box::new(move || {
            hits.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn test_fire_without_handler_is_skipped() {
        let mut registry = CallbackRegistry::new();
        assert!(!registry.fire(PulseKind::Radiation));
        assert!(!registry.fire(PulseKind::Noise));
    }

    #[test]
    fn test_later_registration_replaces_earlier() {
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();

        registry.set(PulseKind::Radiation, Some(counting_handler(&first)));
        registry.set(PulseKind::Radiation, Some(counting_handler(&second)));
        assert!(registry.fire(PulseKind::Radiation));

        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_none_clears_handler() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut registry = CallbackRegistry::new();

        registry.set(PulseKind::Noise, Some(counting_handler(&hits)));
        assert!(registry.is_registered(PulseKind::Noise));
        registry.set(PulseKind::Noise, None);
        assert!(!registry.is_registered(PulseKind::Noise));
        assert!(!registry.fire(PulseKind::Noise));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
