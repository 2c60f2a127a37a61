//! Test state accumulated by a statement.
//!
//! Extensions never touch a [`TestState`] directly. They return a
//! [`StatePatch`] and the statement folds it in with [`TestState::apply`],
//! the one place where fields are merged.

use crate::registry::SpyRegistry;
use crate::result::AfirmarResult;
use crate::spy::SpyFactory;
use std::fmt;
use std::rc::Rc;

/// Body of a recorded step
pub type StepFn = Rc<dyn Fn() -> AfirmarResult<()>>;

/// A recorded predicate or assertion.
///
/// Cloning shares the closure, so builders can wrap an earlier step.
#[derive(Clone)]
pub struct Step {
    label: String,
    run: StepFn,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Step({})", self.label)
    }
}

impl Step {
    /// Record a step
    pub fn new<F>(label: impl Into<String>, run: F) -> Self
    where
        F: Fn() -> AfirmarResult<()> + 'static,
    {
        Self {
            label: label.into(),
            run: Rc::new(run),
        }
    }

    /// Human-readable label, logged by the engine
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Execute the step
    ///
    /// # Errors
    ///
    /// Whatever the step body returns.
    pub fn run(&self) -> AfirmarResult<()> {
        (self.run)()
    }
}

/// Partial update produced by an extension
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    /// Appended to the predicate list
    pub predicates: Vec<Step>,
    /// Replaces the whole predicate list before `predicates` is appended
    pub replace_predicates: Option<Vec<Step>>,
    /// Appended to the assertion list
    pub assertions: Vec<Step>,
    /// Overwrites the negation flag
    pub negate_assertion: Option<bool>,
    /// Overwrites the registry handle
    pub spy_registry: Option<SpyRegistry>,
}

impl StatePatch {
    /// Empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch appending one predicate
    #[must_use]
    pub fn predicate(step: Step) -> Self {
        Self {
            predicates: vec![step],
            ..Self::default()
        }
    }

    /// Patch appending one assertion
    #[must_use]
    pub fn assertion(step: Step) -> Self {
        Self {
            assertions: vec![step],
            ..Self::default()
        }
    }

    /// Patch setting the negation flag
    #[must_use]
    pub fn negation(negated: bool) -> Self {
        Self {
            negate_assertion: Some(negated),
            ..Self::default()
        }
    }

    /// Also append an assertion
    #[must_use]
    pub fn and_assertion(mut self, step: Step) -> Self {
        self.assertions.push(step);
        self
    }

    /// Replace the predicate list
    #[must_use]
    pub fn replacing_predicates(mut self, steps: Vec<Step>) -> Self {
        self.replace_predicates = Some(steps);
        self
    }

    /// Whether applying the patch changes nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
            && self.replace_predicates.is_none()
            && self.assertions.is_empty()
            && self.negate_assertion.is_none()
            && self.spy_registry.is_none()
    }
}

/// Everything one statement has accumulated
#[derive(Clone, Default)]
pub struct TestState {
    negate_assertion: bool,
    predicates: Vec<Step>,
    assertions: Vec<Step>,
    spy_registry: SpyRegistry,
    spy_factory: Option<Rc<dyn SpyFactory>>,
}

impl fmt::Debug for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestState")
            .field("negate_assertion", &self.negate_assertion)
            .field("predicates", &self.predicates)
            .field("assertions", &self.assertions)
            .field("spy_registry", &self.spy_registry)
            .field("spy_factory", &self.spy_factory.is_some())
            .finish()
    }
}

impl TestState {
    /// Fresh state with its own registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty, un-negated state sharing this state's registry and factory
    #[must_use]
    pub fn scoped(&self) -> Self {
        Self {
            spy_registry: self.spy_registry.clone(),
            spy_factory: self.spy_factory.clone(),
            ..Self::default()
        }
    }

    /// Whether assertions built now are negated
    #[must_use]
    pub const fn negate_assertion(&self) -> bool {
        self.negate_assertion
    }

    /// Flip the negation flag
    pub fn toggle_negation(&mut self) {
        self.negate_assertion = !self.negate_assertion;
    }

    /// Predicates in declaration order
    #[must_use]
    pub fn predicates(&self) -> &[Step] {
        &self.predicates
    }

    /// Assertions in declaration order
    #[must_use]
    pub fn assertions(&self) -> &[Step] {
        &self.assertions
    }

    /// Registry handle
    #[must_use]
    pub const fn spy_registry(&self) -> &SpyRegistry {
        &self.spy_registry
    }

    /// Statement-level spy factory override
    #[must_use]
    pub fn spy_factory(&self) -> Option<Rc<dyn SpyFactory>> {
        self.spy_factory.clone()
    }

    /// Set the statement-level spy factory
    pub fn set_spy_factory(&mut self, factory: Rc<dyn SpyFactory>) {
        self.spy_factory = Some(factory);
    }

    /// Fold a patch in, field by field.
    ///
    /// A replacement registry takes over the entries already registered.
    pub fn apply(&mut self, patch: StatePatch) {
        let StatePatch {
            predicates,
            replace_predicates,
            assertions,
            negate_assertion,
            spy_registry,
        } = patch;

        if let Some(replacement) = replace_predicates {
            self.predicates = replacement;
        }
        self.predicates.extend(predicates);
        self.assertions.extend(assertions);
        if let Some(negated) = negate_assertion {
            self.negate_assertion = negated;
        }
        if let Some(mut registry) = spy_registry {
            registry.absorb(&mut self.spy_registry);
            self.spy_registry = registry;
        }
    }

    /// Import another statement's state: lists are concatenated, the
    /// negation flag is overwritten and both share one registry.
    pub fn import(&mut self, other: &mut Self) {
        self.predicates.extend(other.predicates.iter().cloned());
        self.assertions.extend(other.assertions.iter().cloned());
        self.negate_assertion = other.negate_assertion;
        self.spy_registry.absorb(&mut other.spy_registry);
        if self.spy_factory.is_none() {
            self.spy_factory = other.spy_factory.clone();
        }
    }
}
