//! Execution Engine
//!
//! Runs a finished [`TestState`]:
//!
//! ```text
//! for each predicate:  place pending spies, run predicate
//! once more:           place pending spies
//! for each assertion:  run assertion (first failure aborts)
//! finally:             every spy must have been placed
//! ```
//!
//! Only spy placement is retried. A failing predicate or assertion stops
//! execution with its own error.

use crate::result::AfirmarResult;
use crate::state::TestState;
use serde::Serialize;
use tracing::debug_span;

/// Counters describing one execution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    /// Predicates run
    pub predicates_run: usize,
    /// Assertions run
    pub assertions_run: usize,
    /// Placement rounds that found pending spies
    pub placement_rounds: usize,
    /// Spies placed during execution
    pub spies_placed: usize,
}

/// Run predicates, then assertions, then verify spy placement
///
/// # Errors
///
/// The first failing predicate or assertion, a spy placement error that is
/// not a missing host, or `SpyPlacementFailed` for spies that never found
/// their host.
pub fn execute(state: &TestState) -> AfirmarResult<ExecutionSummary> {
    let _span = debug_span!(
        "afirmar.execute",
        predicates = state.predicates().len(),
        assertions = state.assertions().len(),
        negated = state.negate_assertion()
    )
    .entered();
    tracing::debug!("statement execution started");

    let registry = state.spy_registry();
    let mut summary = ExecutionSummary::default();
    let place = |summary: &mut ExecutionSummary| -> AfirmarResult<()> {
        if registry.pending_count() == 0 {
            return Ok(());
        }
        summary.placement_rounds += 1;
        summary.spies_placed += registry.place_pending()?;
        Ok(())
    };

    for predicate in state.predicates() {
        place(&mut summary)?;
        tracing::debug!(step = predicate.label(), "predicate");
        predicate.run()?;
        summary.predicates_run += 1;
    }
    place(&mut summary)?;

    for assertion in state.assertions() {
        tracing::debug!(step = assertion.label(), "assertion");
        if let Err(err) = assertion.run() {
            tracing::debug!(step = assertion.label(), error = %err, "assertion failed");
            return Err(err);
        }
        summary.assertions_run += 1;
    }

    registry.verify()?;
    tracing::debug!(
        predicates_run = summary.predicates_run,
        assertions_run = summary.assertions_run,
        spies_placed = summary.spies_placed,
        "statement execution finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::component::Instance;
    use crate::registry::SpyEntry;
    use crate::result::AfirmarError;
    use crate::spy::{Spy, SpyBehavior, SpyHost};
    use crate::state::{StatePatch, Step};
    use serde_json::json;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn recorder() -> Rc<RefCell<Vec<String>>> {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn step(log: &Rc<RefCell<Vec<String>>>, name: &str) -> Step {
        let log = log.clone();
        let entry = name.to_string();
        Step::new(name, move || {
            log.borrow_mut().push(entry.clone());
            Ok(())
        })
    }

    fn failing(name: &str) -> Step {
        let message = format!("{name} failed");
        Step::new(name, move || Err(AfirmarError::assertion(message.clone())))
    }

    mod ordering_tests {
        use super::*;

        #[test]
        fn test_predicates_then_assertions() {
            let log = recorder();
            let mut state = TestState::new();
            state.apply(StatePatch::assertion(step(&log, "check")));
            state.apply(StatePatch::predicate(step(&log, "first")));
            state.apply(StatePatch::predicate(step(&log, "second")));
            let summary = execute(&state).unwrap();
            assert_eq!(*log.borrow(), vec!["first", "second", "check"]);
            assert_eq!(summary.predicates_run, 2);
            assert_eq!(summary.assertions_run, 1);
            assert_eq!(summary.placement_rounds, 0);
        }

        #[test]
        fn test_assertions_fail_fast() {
            let log = recorder();
            let mut state = TestState::new();
            state.apply(StatePatch::assertion(failing("a")));
            state.apply(StatePatch::assertion(step(&log, "b")));
            let err = execute(&state).unwrap_err();
            assert_eq!(err, AfirmarError::assertion("a failed"));
            assert!(log.borrow().is_empty());
        }

        #[test]
        fn test_failing_predicate_skips_assertions() {
            let log = recorder();
            let mut state = TestState::new();
            state.apply(StatePatch::predicate(failing("p")));
            state.apply(StatePatch::assertion(step(&log, "a")));
            assert!(execute(&state).is_err());
            assert!(log.borrow().is_empty());
        }

        #[test]
        fn test_summary_serializes() {
            let summary = execute(&TestState::new()).unwrap();
            let json = serde_json::to_value(summary).unwrap();
            assert_eq!(json["predicates_run"], json!(0));
            assert_eq!(json["spies_placed"], json!(0));
        }
    }

    mod placement_tests {
        use super::*;

        fn deferred_entry(slot: &Rc<RefCell<Option<Instance>>>) -> (SpyEntry, Spy) {
            let spy = Spy::new("Api.load", SpyBehavior::default());
            let slot = slot.clone();
            let entry = SpyEntry::new(
                "Api",
                Rc::new(move || -> AfirmarResult<Box<dyn SpyHost>> {
                    slot.borrow()
                        .clone()
                        .map(|i| Box::new(i) as Box<dyn SpyHost>)
                        .ok_or_else(|| AfirmarError::DependencyNotFound { token: "Api".into() })
                }),
                "load",
                spy.clone(),
            );
            (entry, spy)
        }

        #[test]
        fn test_host_created_by_predicate_is_placed_before_assertions() {
            let slot = Rc::new(RefCell::new(None));
            let (entry, spy) = deferred_entry(&slot);
            let mut state = TestState::new();
            state.spy_registry().register(entry);

            let creator = slot.clone();
            state.apply(StatePatch::predicate(Step::new("create api", move || {
                let api = Instance::new("Api").with_method("load", |_, _| json!("real"));
                *creator.borrow_mut() = Some(api);
                Ok(())
            })));
            let placed = spy.clone();
            state.apply(StatePatch::assertion(Step::new("spy placed", move || {
                if placed.is_installed() {
                    Ok(())
                } else {
                    Err(AfirmarError::assertion("spy not installed"))
                }
            })));

            let summary = execute(&state).unwrap();
            assert_eq!(summary.spies_placed, 1);
            assert_eq!(summary.placement_rounds, 2);
            assert!(spy.is_installed());
        }

        #[test]
        fn test_unplaced_spy_fails_after_assertions() {
            let slot = Rc::new(RefCell::new(None));
            let (entry, _spy) = deferred_entry(&slot);
            let log = recorder();
            let mut state = TestState::new();
            state.spy_registry().register(entry);
            state.apply(StatePatch::predicate(step(&log, "noop")));
            state.apply(StatePatch::assertion(step(&log, "check")));

            let err = execute(&state).unwrap_err();
            assert_eq!(
                err,
                AfirmarError::SpyPlacementFailed {
                    unplaced: vec!["Api.load".into()]
                }
            );
            assert_eq!(*log.borrow(), vec!["noop", "check"]);
        }
    }
}
