//! Built-in assertions.

use super::{expectation_failed, json_contains, normalize_text};
use crate::component::Instance;
use crate::dom::Element;
use crate::extension::{extension, Extension, ExtensionContext};
use crate::result::{AfirmarError, AfirmarResult};
use crate::spy::{Spy, SpyBehavior};
use crate::state::{StatePatch, Step};
use crate::target::Target;
use serde_json::Value;
use std::fmt::Write as _;
use std::rc::Rc;

/// Outcome of checking one element or instance
type Check = (bool, String);

fn not_prefix(negated: bool) -> &'static str {
    if negated {
        "not "
    } else {
        ""
    }
}

/// Assertion over every resolved element of the object
fn each_element<F>(description: String, check: F) -> impl Extension
where
    F: Fn(&Element) -> Check + 'static,
{
    let check = Rc::new(check);
    extension(description.clone(), move |ctx| {
        let target = ctx.target().clone();
        let negated = ctx.negated();
        let check = Rc::clone(&check);
        let description = description.clone();
        let label = format!("{target} {}to {description}", not_prefix(negated));
        Ok(StatePatch::assertion(Step::new(label, move || {
            for element in target.require_all()? {
                let (holds, actual) = check(&element);
                if holds == negated {
                    return Err(expectation_failed(&target, negated, &description, &actual));
                }
            }
            Ok(())
        })))
    })
    .honouring_negation()
}

/// Assertion over every component instance behind the object
fn each_instance<F>(description: String, check: F) -> impl Extension
where
    F: Fn(&Instance) -> Check + 'static,
{
    let check = Rc::new(check);
    extension(description.clone(), move |ctx| {
        let target = ctx.target().clone();
        let negated = ctx.negated();
        let check = Rc::clone(&check);
        let description = description.clone();
        let label = format!("{target} {}to {description}", not_prefix(negated));
        Ok(StatePatch::assertion(Step::new(label, move || {
            for instance in target.instances()? {
                let (holds, actual) = check(&instance);
                if holds == negated {
                    return Err(expectation_failed(&target, negated, &description, &actual));
                }
            }
            Ok(())
        })))
    })
    .honouring_negation()
}

// ============================================================================
// Presence
// ============================================================================

/// Presence check, see [`be_found`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BeFound {
    count: Option<usize>,
}

impl BeFound {
    /// Require exactly `n` matches
    #[must_use]
    pub const fn count(mut self, n: usize) -> Self {
        self.count = Some(n);
        self
    }
}

/// The object resolves to at least one element (or exactly `count`)
#[must_use]
pub const fn be_found() -> BeFound {
    BeFound { count: None }
}

impl Extension for BeFound {
    fn honours_negation(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        match self.count {
            Some(n) => format!("be_found(count: {n})"),
            None => "be_found".into(),
        }
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        let target = ctx.target().clone();
        let negated = ctx.negated();
        let expected = self.count;
        let label = format!("{target} {}{}", not_prefix(negated), self.describe());
        Ok(StatePatch::assertion(Step::new(label, move || {
            let found = target.resolve().len();
            let holds = expected.map_or(found > 0, |n| found == n);
            if holds != negated {
                return Ok(());
            }
            let message = match (expected, negated) {
                (Some(n), false) => format!("Expected {n} matches of {target}, found {found}"),
                (Some(n), true) => format!("Expected {target} not to be found {n} times, but it was"),
                (None, false) => format!("Target {target} wasn't found"),
                (None, true) => format!("Expected {target} not to be found, but found {found}"),
            };
            Err(AfirmarError::assertion(message))
        })))
    }
}

// ============================================================================
// Elements
// ============================================================================

/// Every element carries the class
pub fn have_class(class: impl Into<String>) -> impl Extension {
    let class = class.into();
    each_element(format!("have class '{class}'"), move |el| {
        (el.has_class(&class), format!("its classes were {:?}", el.classes()))
    })
}

/// Every element's whitespace-collapsed text equals `text`
pub fn have_text(text: impl Into<String>) -> impl Extension {
    let expected = normalize_text(&text.into());
    each_element(format!("have text \"{expected}\""), move |el| {
        let actual = el.text_content();
        (actual == expected, format!("its text was \"{actual}\""))
    })
}

/// Every element's text contains `text`
pub fn contain_text(text: impl Into<String>) -> impl Extension {
    let expected = normalize_text(&text.into());
    each_element(format!("contain text \"{expected}\""), move |el| {
        let actual = el.text_content();
        (actual.contains(&expected), format!("its text was \"{actual}\""))
    })
}

/// Every element has all the attribute values
pub fn have_attributes<I, K, V>(pairs: I) -> impl Extension
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let pairs: Vec<(String, String)> = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
    let wanted = pairs
        .iter()
        .map(|(k, v)| format!("{k}=\"{v}\""))
        .collect::<Vec<_>>()
        .join(" ");
    each_element(format!("have attributes {wanted}"), move |el| {
        let mut actual = String::new();
        let mut holds = true;
        for (name, value) in &pairs {
            let current = el.attribute(name);
            holds &= current.as_deref() == Some(value.as_str());
            let _ = write!(actual, " {name}={current:?}");
        }
        (holds, format!("it had{actual}"))
    })
}

/// Every element has all the native property values
pub fn have_properties(fields: Value) -> impl Extension {
    each_element(format!("have properties {fields}"), move |el| {
        let actual = el.properties();
        (json_contains(&actual, &fields), format!("its properties were {actual}"))
    })
}

// ============================================================================
// Components
// ============================================================================

/// Every component state contains the fields (recursively for objects)
pub fn have_state(fields: Value) -> impl Extension {
    each_instance(format!("have state {fields}"), move |instance| {
        let actual = instance.state();
        (json_contains(&actual, &fields), format!("its state was {actual}"))
    })
}

/// Free-form check on the object
pub fn satisfy<F>(label: impl Into<String>, check: F) -> impl Extension
where
    F: Fn(&Target) -> AfirmarResult<bool> + 'static,
{
    let label = label.into();
    let check = Rc::new(check);
    extension(format!("satisfy({label})"), move |ctx| {
        let target = ctx.target().clone();
        let negated = ctx.negated();
        let check = Rc::clone(&check);
        let description = format!("satisfy {label}");
        Ok(StatePatch::assertion(Step::new(
            format!("{target} {}to {description}", not_prefix(negated)),
            move || {
                if check(&target)? == negated {
                    let actual = if negated { "it did" } else { "it did not" };
                    return Err(expectation_failed(&target, negated, &description, actual));
                }
                Ok(())
            },
        )))
    })
    .honouring_negation()
}

// ============================================================================
// Spies
// ============================================================================

/// How many calls count as a match
fn call_matches(spy: &Spy, args: Option<&[Value]>) -> usize {
    match args {
        Some(args) => spy.calls().iter().filter(|c| c.as_slice() == args).count(),
        None => spy.call_count(),
    }
}

fn times_text(times: Option<usize>) -> String {
    match times {
        Some(1) => " once".into(),
        Some(n) => format!(" {n} times"),
        None => String::new(),
    }
}

/// Build the spy assertion step shared by calls and emissions
fn spy_step(
    target: &Target,
    spy: Spy,
    negated: bool,
    description: String,
    times: Option<usize>,
    args: Option<Vec<Value>>,
) -> Step {
    let target = target.clone();
    let label = format!("{target} {}to {description}", not_prefix(negated));
    Step::new(label, move || {
        if !spy.is_installed() {
            return Err(AfirmarError::SpyPlacementFailed {
                unplaced: vec![spy.label().to_string()],
            });
        }
        let matching = call_matches(&spy, args.as_deref());
        let holds = times.map_or(matching > 0, |n| matching == n);
        if holds == negated {
            let calls = spy.calls();
            let actual = format!("{} was called {} time(s): {calls:?}", spy.label(), calls.len());
            return Err(expectation_failed(&target, negated, &description, &actual));
        }
        Ok(())
    })
}

/// Call-count check on a component method, see [`have_been_called`]
#[derive(Debug, Clone)]
pub struct CalledAssertion {
    method: String,
    times: Option<usize>,
    args: Option<Vec<Value>>,
    behavior: SpyBehavior,
}

/// A spy replacing `method` on the object's component was called.
///
/// The spy returns null unless configured with [`CalledAssertion::returning`]
/// or [`CalledAssertion::call_through`]. Negated without `times`, the method
/// must not have been called at all; with `times(n)`, the count must differ
/// from `n`.
pub fn have_been_called(method: impl Into<String>) -> CalledAssertion {
    CalledAssertion {
        method: method.into(),
        times: None,
        args: None,
        behavior: SpyBehavior::default(),
    }
}

impl CalledAssertion {
    /// Exactly `n` (matching) calls
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Only count calls with exactly these arguments
    #[must_use]
    pub fn with_args(mut self, args: Vec<Value>) -> Self {
        self.args = Some(args);
        self
    }

    /// Stub the method with a fixed return value
    #[must_use]
    pub fn returning(mut self, value: Value) -> Self {
        self.behavior = SpyBehavior::Returns(value);
        self
    }

    /// Keep running the real method
    #[must_use]
    pub fn call_through(mut self) -> Self {
        self.behavior = SpyBehavior::CallThrough;
        self
    }
}

impl Extension for CalledAssertion {
    fn honours_negation(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        let mut text = format!("have_been_called({}){}", self.method, times_text(self.times));
        if let Some(args) = &self.args {
            let _ = write!(text, " with {}", Value::Array(args.clone()));
        }
        text
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        let spy = ctx.spy_on_component(ctx.target(), &self.method, self.behavior.clone())?;
        Ok(StatePatch::assertion(spy_step(
            ctx.target(),
            spy,
            ctx.negated(),
            self.describe(),
            self.times,
            self.args.clone(),
        )))
    }
}

/// Emission check on a component output, see [`have_emitted`]
#[derive(Debug, Clone)]
pub struct EmittedAssertion {
    output: String,
    times: Option<usize>,
    value: Option<Value>,
}

/// The object's component emitted on `output`.
///
/// Emissions still reach subscribers. Polarity follows
/// [`have_been_called`].
pub fn have_emitted(output: impl Into<String>) -> EmittedAssertion {
    EmittedAssertion {
        output: output.into(),
        times: None,
        value: None,
    }
}

impl EmittedAssertion {
    /// Exactly `n` (matching) emissions
    #[must_use]
    pub const fn times(mut self, n: usize) -> Self {
        self.times = Some(n);
        self
    }

    /// Only count emissions of this value
    #[must_use]
    pub fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

impl Extension for EmittedAssertion {
    fn honours_negation(&self) -> bool {
        true
    }

    fn describe(&self) -> String {
        let mut text = format!("have_emitted({}){}", self.output, times_text(self.times));
        if let Some(value) = &self.value {
            let _ = write!(text, " with {value}");
        }
        text
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        let spy = ctx.spy_on_output(ctx.target(), &self.output, SpyBehavior::CallThrough)?;
        Ok(StatePatch::assertion(spy_step(
            ctx.target(),
            spy,
            ctx.negated(),
            self.describe(),
            self.times,
            self.value.clone().map(|v| vec![v]),
        )))
    }
}
