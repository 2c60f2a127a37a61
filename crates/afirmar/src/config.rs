//! Spy factory configuration.
//!
//! Statements create spies through a configured [`SpyFactory`]. The setting
//! must be initialized before the first statement that spies on anything:
//!
//! ```
//! afirmar::config::configure_default();
//! assert!(afirmar::config::is_configured());
//! afirmar::config::reset();
//! ```
//!
//! The setting belongs to the current thread. Statements run synchronously
//! on the thread that built them and spies are `!Send`, so a thread-scoped
//! setting gives every test thread its own configuration without leaking
//! between tests that run in parallel.

use crate::result::{AfirmarError, AfirmarResult};
use crate::spy::{RecordingSpyFactory, SpyFactory};
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static SPY_FACTORY: RefCell<Option<Rc<dyn SpyFactory>>> = const { RefCell::new(None) };
}

const REMEDIATION: &str = "no spy factory configured; call afirmar::config::configure_default() \
     (or afirmar::config::configure(factory)) before running statements that spy, \
     or attach one with Statement::with_spy_factory";

/// Install a spy factory for the current thread
pub fn configure<F>(factory: F)
where
    F: SpyFactory + 'static,
{
    configure_shared(Rc::new(factory));
}

/// Install an already shared spy factory
pub fn configure_shared(factory: Rc<dyn SpyFactory>) {
    SPY_FACTORY.with(|slot| *slot.borrow_mut() = Some(factory));
    tracing::debug!("spy factory configured");
}

/// Install the recording spy factory
pub fn configure_default() {
    configure(RecordingSpyFactory);
}

/// Remove the configured factory
pub fn reset() {
    SPY_FACTORY.with(|slot| *slot.borrow_mut() = None);
}

/// Whether a factory is configured on this thread
#[must_use]
pub fn is_configured() -> bool {
    SPY_FACTORY.with(|slot| slot.borrow().is_some())
}

/// The configured factory.
///
/// # Errors
///
/// Returns [`AfirmarError::Misconfiguration`] when nothing was configured.
pub fn spy_factory() -> AfirmarResult<Rc<dyn SpyFactory>> {
    SPY_FACTORY
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| AfirmarError::Misconfiguration {
            message: REMEDIATION.to_string(),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::spy::{Spy, SpyBehavior};

    #[test]
    fn test_unconfigured_fails_with_remediation() {
        reset();
        assert!(!is_configured());
        let err = spy_factory().err().unwrap();
        assert!(matches!(err, AfirmarError::Misconfiguration { .. }));
        assert!(err.to_string().contains("configure_default"));
    }

    #[test]
    fn test_configure_and_reset() {
        configure_default();
        assert!(is_configured());
        let spy = spy_factory().unwrap().create("A.b", SpyBehavior::default());
        assert_eq!(spy.label(), "A.b");
        reset();
        assert!(!is_configured());
    }

    #[test]
    fn test_custom_factory() {
        configure(|label: &str, behavior: SpyBehavior| Spy::new(format!("mine:{label}"), behavior));
        let spy = spy_factory().unwrap().create("A.b", SpyBehavior::CallThrough);
        assert_eq!(spy.label(), "mine:A.b");
        reset();
    }

    #[test]
    fn test_setting_is_per_thread() {
        configure_default();
        let seen_elsewhere = std::thread::spawn(is_configured).join().unwrap();
        assert!(!seen_elsewhere);
        assert!(is_configured());
        reset();
    }
}
