//! Declarative Statement Builder
//!
//! ```text
//! when(&subject)            subject bound
//!   .has(predicates)        predicates accumulate (repeatable)
//!   .expect(&object)        object bound
//!   .not()                  negation toggled (repeatable)
//!   .to(assertions)         executed
//! ```
//!
//! `.will(..)` executes like `.to(..)` and hands back a [`ComposedAssertion`]
//! that other statements can pass to their own `.to(..)`.
//!
//! ## Toyota Way Application
//!
//! - **Poka-Yoke**: Builders are consumed by value, so a negated chain can
//!   never leak its flag into another chain
//! - **Jidoka**: Building errors surface at the terminal call, before any
//!   step runs

use crate::engine::{self, ExecutionSummary};
use crate::extension::{Extension, ExtensionContext, IntoExtensions};
use crate::result::{AfirmarError, AfirmarResult};
use crate::spy::SpyFactory;
use crate::state::{StatePatch, Step, TestState};
use crate::target::Target;
use std::fmt;
use std::rc::Rc;

/// Start a statement about `subject`
#[must_use]
pub fn when(subject: &Target) -> Statement {
    Statement::new(subject)
}

/// A statement accumulating predicates about a subject
pub struct Statement {
    subject: Target,
    state: TestState,
    error: Option<AfirmarError>,
    described: Vec<String>,
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("subject", &self.subject.label())
            .field("state", &self.state)
            .field("error", &self.error)
            .finish()
    }
}

impl Statement {
    /// Fresh statement with its own state and registry
    #[must_use]
    pub fn new(subject: &Target) -> Self {
        Self {
            subject: subject.clone(),
            state: TestState::new(),
            error: None,
            described: Vec::new(),
        }
    }

    /// Use this factory instead of the configured one
    #[must_use]
    pub fn with_spy_factory<F>(mut self, factory: F) -> Self
    where
        F: SpyFactory + 'static,
    {
        self.state.set_spy_factory(Rc::new(factory));
        self
    }

    /// Current subject
    #[must_use]
    pub const fn subject(&self) -> &Target {
        &self.subject
    }

    /// Accumulated state
    #[must_use]
    pub const fn state(&self) -> &TestState {
        &self.state
    }

    /// Apply predicates to the subject
    #[must_use]
    pub fn has(mut self, extensions: impl IntoExtensions) -> Self {
        let subject = self.subject.clone();
        self.apply_all(&subject, extensions);
        self
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn have(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn is(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn are(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn does(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn gets(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Alias of [`Statement::has`]
    #[must_use]
    pub fn get(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// More predicates on the same subject
    #[must_use]
    pub fn and(self, extensions: impl IntoExtensions) -> Self {
        self.has(extensions)
    }

    /// Switch to another subject, keeping state and registry
    #[must_use]
    pub fn and_when(mut self, subject: &Target) -> Self {
        self.subject = subject.clone();
        self
    }

    /// Import another statement: its predicates and assertions are appended,
    /// its negation flag wins and both share one spy registry
    #[must_use]
    pub fn and_statement(mut self, mut other: Self) -> Self {
        if self.error.is_none() {
            self.error = other.error.take();
        }
        self.state.import(&mut other.state);
        self.described.append(&mut other.described);
        self
    }

    /// Bind the object under test
    #[must_use]
    pub fn expect(self, object: &Target) -> Expectation {
        Expectation {
            statement: self,
            object: object.clone(),
        }
    }

    fn apply_all(&mut self, target: &Target, extensions: impl IntoExtensions) {
        for extension in extensions.into_extensions() {
            if self.error.is_some() {
                tracing::trace!(extension = %extension.describe(), "skipped after build error");
                continue;
            }
            let patch = {
                let ctx = ExtensionContext::new(target, &self.state);
                extension.apply(&ctx)
            };
            match patch {
                Ok(patch) => {
                    tracing::trace!(extension = %extension.describe(), target = target.label(), "applied");
                    self.described.push(extension.describe());
                    self.state.apply(patch);
                }
                Err(err) => {
                    tracing::debug!(extension = %extension.describe(), error = %err, "build error");
                    self.error = Some(err);
                }
            }
        }
    }
}

/// The assertion half of a statement
pub struct Expectation {
    statement: Statement,
    object: Target,
}

impl fmt::Debug for Expectation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expectation")
            .field("object", &self.object.label())
            .field("negated", &self.statement.state.negate_assertion())
            .finish()
    }
}

impl Expectation {
    /// Flip negation for the assertions of this chain only
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.statement.state.toggle_negation();
        self
    }

    /// Whether assertions applied now are negated
    #[must_use]
    pub const fn is_negated(&self) -> bool {
        self.statement.state.negate_assertion()
    }

    /// Apply assertions to the object and execute the statement
    ///
    /// # Errors
    ///
    /// A building error, or whatever execution fails with.
    pub fn to(self, extensions: impl IntoExtensions) -> AfirmarResult<()> {
        self.run(extensions).map(|_| ())
    }

    /// Like [`Expectation::to`], returning the assertions for reuse
    ///
    /// # Errors
    ///
    /// A building error, or whatever execution fails with.
    pub fn will(self, extensions: impl IntoExtensions) -> AfirmarResult<ComposedAssertion> {
        let extensions = extensions.into_extensions();
        let object = self.object.clone();
        let negated = self.is_negated();
        let (statement, summary, label) = self.run(extensions.clone())?;
        Ok(ComposedAssertion {
            label,
            object,
            negated,
            extensions,
            spy_factory: statement.state.spy_factory(),
            summary,
        })
    }

    fn run(self, extensions: impl IntoExtensions) -> AfirmarResult<(Statement, ExecutionSummary, String)> {
        let Self { mut statement, object } = self;
        let first_assertion = statement.described.len();
        statement.apply_all(&object, extensions);
        if let Some(err) = statement.error.take() {
            return Err(err);
        }
        let label = statement.described[first_assertion..].join(", ");
        let summary = engine::execute(&statement.state)?;
        Ok((statement, summary, label))
    }
}

/// Assertions captured by [`Expectation::will`].
///
/// Applying it to another statement re-applies the captured extensions
/// against the object they were written for, so spies are requested again
/// in the new statement's registry and start from zero calls. Under
/// negation, extensions that honour negation are re-applied with the flag
/// flipped; otherwise the whole group is inverted and passes when any of its
/// assertions fails.
#[derive(Clone)]
pub struct ComposedAssertion {
    label: String,
    object: Target,
    negated: bool,
    extensions: Vec<Rc<dyn Extension>>,
    spy_factory: Option<Rc<dyn SpyFactory>>,
    summary: ExecutionSummary,
}

impl fmt::Debug for ComposedAssertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComposedAssertion")
            .field("label", &self.label)
            .field("object", &self.object.label())
            .field("negated", &self.negated)
            .field("extensions", &self.extensions.len())
            .field("summary", &self.summary)
            .finish()
    }
}

impl ComposedAssertion {
    /// Rename, e.g. to `to_be_opened`
    #[must_use]
    pub fn named(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Label
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Object the assertions were written against
    #[must_use]
    pub const fn object(&self) -> &Target {
        &self.object
    }

    /// Summary of the execution that produced it
    #[must_use]
    pub const fn summary(&self) -> &ExecutionSummary {
        &self.summary
    }

    /// Number of captured extensions
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Whether nothing was captured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    fn inverted(label: String, steps: Vec<Step>) -> Step {
        Step::new(format!("not {label}"), move || {
            for step in &steps {
                match step.run() {
                    Ok(()) => {}
                    Err(err) if err.is_assertion() => return Ok(()),
                    Err(err) => return Err(err),
                }
            }
            Err(AfirmarError::assertion(format!("Expected {label} not to hold, but it did")))
        })
    }
}

impl Extension for ComposedAssertion {
    fn describe(&self) -> String {
        format!("will({})", self.label)
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        let flip = ctx.negated() && self.extensions.iter().all(|e| e.honours_negation());
        let invert = ctx.negated() && !flip;

        let mut scoped = ctx.state().scoped();
        if scoped.spy_factory().is_none() {
            if let Some(factory) = &self.spy_factory {
                scoped.set_spy_factory(Rc::clone(factory));
            }
        }
        if self.negated != flip {
            scoped.toggle_negation();
        }
        for extension in &self.extensions {
            let patch = extension.apply(&ExtensionContext::new(&self.object, &scoped))?;
            scoped.apply(patch);
        }
        tracing::trace!(
            composed = %self.label,
            object = self.object.label(),
            flip,
            invert,
            "re-applied"
        );

        let assertions = scoped.assertions().to_vec();
        let assertions = if invert {
            vec![Self::inverted(self.label.clone(), assertions)]
        } else {
            assertions
        };
        Ok(StatePatch {
            predicates: scoped.predicates().to_vec(),
            assertions,
            ..StatePatch::new()
        })
    }

    fn honours_negation(&self) -> bool {
        true
    }
}
