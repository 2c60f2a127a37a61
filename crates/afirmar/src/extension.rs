//! Extension Function Protocol
//!
//! Every predicate and assertion builder is an [`Extension`]: given the
//! current target, a read-only view of the state and a way to request spies,
//! it returns a [`StatePatch`]. Applying an extension only records work; the
//! recorded steps run later, when the statement executes.
//!
//! ## Toyota Way Application
//!
//! - **Standardized Work**: One contract for built-in and user extensions
//! - **Poka-Yoke**: Extensions cannot reach the mutable state, only patch it

use crate::component::Instance;
use crate::config;
use crate::fixture::Fixture;
use crate::registry::HostResolver;
use crate::result::AfirmarResult;
use crate::spy::{Spy, SpyBehavior, SpyFactory, SpyHost};
use crate::state::{StatePatch, TestState};
use crate::target::Target;
use std::fmt;
use std::rc::Rc;

/// A predicate or assertion builder
pub trait Extension {
    /// Short description, used in logs and step labels
    fn describe(&self) -> String;

    /// Record work for later execution
    ///
    /// # Errors
    ///
    /// Building errors, e.g. no spy factory configured.
    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch>;

    /// Whether applying under negation records the inverted check.
    ///
    /// Extensions that record no assertion qualify trivially. A reused
    /// [`ComposedAssertion`](crate::statement::ComposedAssertion) re-applies
    /// such extensions with the flag flipped and inverts the others as a
    /// group.
    fn honours_negation(&self) -> bool {
        false
    }
}

impl<E: Extension + ?Sized> Extension for Rc<E> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        (**self).apply(ctx)
    }

    fn honours_negation(&self) -> bool {
        (**self).honours_negation()
    }
}

impl<E: Extension + ?Sized> Extension for Box<E> {
    fn describe(&self) -> String {
        (**self).describe()
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        (**self).apply(ctx)
    }

    fn honours_negation(&self) -> bool {
        (**self).honours_negation()
    }
}

/// What an extension sees while it is applied
pub struct ExtensionContext<'a> {
    target: &'a Target,
    state: &'a TestState,
}

impl fmt::Debug for ExtensionContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("target", &self.target.label())
            .field("negated", &self.negated())
            .finish()
    }
}

impl<'a> ExtensionContext<'a> {
    /// Context for applying extensions against `target`
    #[must_use]
    pub const fn new(target: &'a Target, state: &'a TestState) -> Self {
        Self { target, state }
    }

    /// Subject (in predicates) or object (in assertions)
    #[must_use]
    pub const fn target(&self) -> &Target {
        self.target
    }

    /// Fixture of the target
    #[must_use]
    pub const fn fixture(&self) -> &Fixture {
        self.target.fixture()
    }

    /// State accumulated so far
    #[must_use]
    pub const fn state(&self) -> &TestState {
        self.state
    }

    /// Whether assertions built now are negated
    #[must_use]
    pub const fn negated(&self) -> bool {
        self.state.negate_assertion()
    }

    /// The statement's spy factory, or the configured one
    ///
    /// # Errors
    ///
    /// `Misconfiguration` when neither exists.
    pub fn spy_factory(&self) -> AfirmarResult<Rc<dyn SpyFactory>> {
        match self.state.spy_factory() {
            Some(factory) => Ok(factory),
            None => config::spy_factory(),
        }
    }

    /// Request a spy on whatever `host` resolves to at execution time
    ///
    /// # Errors
    ///
    /// `Misconfiguration` when no spy factory is available.
    pub fn spy_on(
        &self,
        host_label: &str,
        host: HostResolver,
        method: &str,
        behavior: SpyBehavior,
    ) -> AfirmarResult<Spy> {
        let factory = self.spy_factory()?;
        Ok(self
            .state
            .spy_registry()
            .spy_on(factory.as_ref(), host_label, host, method, behavior))
    }

    /// Request a spy on a method of the component behind `target`
    ///
    /// # Errors
    ///
    /// `Misconfiguration` when no spy factory is available.
    pub fn spy_on_component(&self, target: &Target, method: &str, behavior: SpyBehavior) -> AfirmarResult<Spy> {
        let target = target.clone();
        let label = target.label().to_string();
        self.spy_on(
            &label,
            Rc::new(move || target.instance().map(|i: Instance| Box::new(i) as Box<dyn SpyHost>)),
            method,
            behavior,
        )
    }

    /// Request a spy on the `emit` of a component output
    ///
    /// # Errors
    ///
    /// `Misconfiguration` when no spy factory is available.
    pub fn spy_on_output(&self, target: &Target, output: &str, behavior: SpyBehavior) -> AfirmarResult<Spy> {
        let target = target.clone();
        let label = format!("{}.{output}", target.label());
        let name = output.to_string();
        self.spy_on(
            &label,
            Rc::new(move || -> AfirmarResult<Box<dyn SpyHost>> {
                let emitter = target.instance()?.output(&name)?;
                Ok(Box::new(emitter) as Box<dyn SpyHost>)
            }),
            "emit",
            behavior,
        )
    }
}

/// Closure-backed extension, see [`extension`]
pub struct FnExtension<F> {
    label: String,
    build: F,
    honours_negation: bool,
}

impl<F> FnExtension<F> {
    /// Declare that the closure reads [`ExtensionContext::negated`]
    #[must_use]
    pub fn honouring_negation(mut self) -> Self {
        self.honours_negation = true;
        self
    }
}

impl<F> fmt::Debug for FnExtension<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FnExtension({})", self.label)
    }
}

impl<F> Extension for FnExtension<F>
where
    F: Fn(&ExtensionContext<'_>) -> AfirmarResult<StatePatch>,
{
    fn describe(&self) -> String {
        self.label.clone()
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        (self.build)(ctx)
    }

    fn honours_negation(&self) -> bool {
        self.honours_negation
    }
}

/// Adapt a closure into an extension
pub fn extension<F>(label: impl Into<String>, build: F) -> FnExtension<F>
where
    F: Fn(&ExtensionContext<'_>) -> AfirmarResult<StatePatch>,
{
    FnExtension {
        label: label.into(),
        build,
        honours_negation: false,
    }
}

/// Negation-marking extension, see [`negate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Negate;

impl Extension for Negate {
    fn describe(&self) -> String {
        "not".into()
    }

    fn apply(&self, ctx: &ExtensionContext<'_>) -> AfirmarResult<StatePatch> {
        Ok(StatePatch::negation(!ctx.negated()))
    }

    fn honours_negation(&self) -> bool {
        true
    }
}

/// Flip negation for the extensions that follow in the same call
#[must_use]
pub const fn negate() -> Negate {
    Negate
}

/// One or several extensions
pub trait IntoExtensions {
    /// Collect into a list, preserving order
    fn into_extensions(self) -> Vec<Rc<dyn Extension>>;
}

impl<E: Extension + 'static> IntoExtensions for E {
    fn into_extensions(self) -> Vec<Rc<dyn Extension>> {
        vec![Rc::new(self) as Rc<dyn Extension>]
    }
}

impl<E: Extension + 'static> IntoExtensions for Vec<E> {
    fn into_extensions(self) -> Vec<Rc<dyn Extension>> {
        self.into_iter()
            .map(|e| Rc::new(e) as Rc<dyn Extension>)
            .collect()
    }
}

macro_rules! tuple_extensions {
    ($($name:ident),+) => {
        impl<$($name: Extension + 'static),+> IntoExtensions for ($($name,)+) {
            #[allow(non_snake_case)]
            fn into_extensions(self) -> Vec<Rc<dyn Extension>> {
                let ($($name,)+) = self;
                vec![$(Rc::new($name) as Rc<dyn Extension>),+]
            }
        }
    };
}

tuple_extensions!(A, B);
tuple_extensions!(A, B, C);
tuple_extensions!(A, B, C, D);
tuple_extensions!(A, B, C, D, E);
tuple_extensions!(A, B, C, D, E, F);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::Element;
    use crate::result::AfirmarError;
    use crate::state::Step;
    use serde_json::json;

    fn fixture() -> Fixture {
        Fixture::new(
            Element::new("app-root").with_component(
                Instance::new("Root")
                    .with_method("save", |_, _| json!("saved"))
                    .with_output("saved"),
            ),
        )
    }

    fn noop(label: &'static str) -> FnExtension<impl Fn(&ExtensionContext<'_>) -> AfirmarResult<StatePatch>> {
        extension(label, move |_| Ok(StatePatch::predicate(Step::new(label, || Ok(())))))
    }

    mod protocol_tests {
        use super::*;

        #[test]
        fn test_closure_extension_records_without_running() {
            let fixture = fixture();
            let host = fixture.host();
            let state = TestState::new();
            let ctx = ExtensionContext::new(&host, &state);
            let ext = extension("boom", |_| {
                Ok(StatePatch::predicate(Step::new("boom", || {
                    Err(AfirmarError::assertion("ran"))
                })))
            });
            let patch = ext.apply(&ctx).unwrap();
            assert_eq!(patch.predicates.len(), 1);
            assert_eq!(ext.describe(), "boom");
        }

        #[test]
        fn test_negate_toggles_relative_to_state() {
            let fixture = fixture();
            let host = fixture.host();
            let mut state = TestState::new();
            let patch = negate().apply(&ExtensionContext::new(&host, &state)).unwrap();
            assert_eq!(patch.negate_assertion, Some(true));
            state.apply(patch);
            let patch = negate().apply(&ExtensionContext::new(&host, &state)).unwrap();
            assert_eq!(patch.negate_assertion, Some(false));
        }

        #[test]
        fn test_into_extensions_keeps_order() {
            let list = (noop("a"), noop("b"), negate()).into_extensions();
            let labels: Vec<_> = list.iter().map(|e| e.describe()).collect();
            assert_eq!(labels, vec!["a", "b", "not"]);
            assert_eq!(vec![noop("x"), noop("y")].into_extensions().len(), 2);
            assert_eq!(noop("z").into_extensions().len(), 1);
        }

        #[test]
        fn test_shared_extension_is_extension() {
            let shared: Rc<dyn Extension> = Rc::new(noop("shared"));
            assert_eq!(shared.clone().into_extensions()[0].describe(), "shared");
        }
    }

    mod spy_request_tests {
        use super::*;

        #[test]
        fn test_spy_on_component_without_factory_fails() {
            config::reset();
            let fixture = fixture();
            let host = fixture.host();
            let state = TestState::new();
            let ctx = ExtensionContext::new(&host, &state);
            let err = ctx
                .spy_on_component(&host, "save", SpyBehavior::default())
                .unwrap_err();
            assert!(matches!(err, AfirmarError::Misconfiguration { .. }));
        }

        #[test]
        fn test_statement_factory_overrides_config() {
            config::reset();
            let fixture = fixture();
            let host = fixture.host();
            let mut state = TestState::new();
            state.set_spy_factory(Rc::new(crate::spy::RecordingSpyFactory));
            let ctx = ExtensionContext::new(&host, &state);
            let spy = ctx.spy_on_component(&host, "save", SpyBehavior::default()).unwrap();
            assert_eq!(spy.label(), "host.save");
            assert_eq!(state.spy_registry().place_pending().unwrap(), 1);
            let root = fixture.host_component().unwrap();
            assert_eq!(root.call("save", &[]).unwrap(), serde_json::Value::Null);
            assert_eq!(spy.call_count(), 1);
        }

        #[test]
        fn test_spy_on_output() {
            config::configure_default();
            let fixture = fixture();
            let host = fixture.host();
            let state = TestState::new();
            let ctx = ExtensionContext::new(&host, &state);
            let spy = ctx.spy_on_output(&host, "saved", SpyBehavior::CallThrough).unwrap();
            assert_eq!(spy.label(), "host.saved.emit");
            let _ = state.spy_registry().place_pending().unwrap();
            fixture.host_component().unwrap().output("saved").unwrap().emit(json!(1)).unwrap();
            assert!(spy.was_called_with(&[json!(1)]));
            config::reset();
        }
    }
}
