//! Component fixtures.
//!
//! A [`Fixture`] owns a rendered element tree, an injector of shared service
//! instances and a virtual clock. `propagate_changes` is the synchronous
//! "re-render": it re-evaluates bindings top-down and creates or destroys
//! factory-built components as their elements are shown or hidden.

use crate::clock::VirtualClock;
use crate::component::Instance;
use crate::dom::Element;
use crate::result::{AfirmarError, AfirmarResult};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

struct FixtureInner {
    root: Element,
    providers: RefCell<BTreeMap<String, Instance>>,
    clock: VirtualClock,
    propagations: Cell<usize>,
}

/// Shared handle to a rendered component tree
#[derive(Clone)]
pub struct Fixture {
    inner: Rc<FixtureInner>,
}

impl fmt::Debug for Fixture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fixture")
            .field("root", &self.inner.root)
            .field("providers", &self.inner.providers.borrow().keys().collect::<Vec<_>>())
            .field("clock", &self.inner.clock)
            .field("propagations", &self.inner.propagations.get())
            .finish()
    }
}

impl Fixture {
    /// Build a fixture around a root element and propagate once
    #[must_use]
    pub fn new(root: Element) -> Self {
        FixtureBuilder::new(root).build()
    }

    /// Start a builder
    #[must_use]
    pub fn builder(root: Element) -> FixtureBuilder {
        FixtureBuilder::new(root)
    }

    /// Root element
    #[must_use]
    pub fn root(&self) -> Element {
        self.inner.root.clone()
    }

    /// Component attached to the root element
    pub fn host_component(&self) -> AfirmarResult<Instance> {
        self.inner
            .root
            .component()
            .ok_or_else(|| AfirmarError::NotAComponent {
                target: "host".into(),
            })
    }

    /// The simulated clock
    #[must_use]
    pub fn clock(&self) -> &VirtualClock {
        &self.inner.clock
    }

    /// Register a service instance under a token, replacing any previous one
    pub fn provide(&self, token: impl Into<String>, instance: Instance) {
        let _ = self
            .inner
            .providers
            .borrow_mut()
            .insert(token.into(), instance);
    }

    /// Resolve a service instance
    pub fn lookup(&self, token: &str) -> AfirmarResult<Instance> {
        self.inner
            .providers
            .borrow()
            .get(token)
            .cloned()
            .ok_or_else(|| AfirmarError::DependencyNotFound {
                token: token.to_string(),
            })
    }

    /// How many times changes were propagated
    #[must_use]
    pub fn propagation_count(&self) -> usize {
        self.inner.propagations.get()
    }

    /// Re-evaluate bindings and sync component lifecycles, top-down
    pub fn propagate_changes(&self) {
        self.inner.propagations.set(self.inner.propagations.get() + 1);
        propagate(&self.inner.root);
    }
}

fn propagate(element: &Element) {
    evaluate_bindings(element);
    if element.sync_lifecycle() {
        // Own-component bindings could not run before the instance existed
        evaluate_bindings(element);
    }
    if element.is_visible() {
        for child in element.all_children() {
            propagate(&child);
        }
    }
}

fn evaluate_bindings(element: &Element) {
    for binding in element.bindings() {
        let context = match &binding.context {
            Some(weak) => weak.upgrade(),
            None => element.component(),
        };
        if let Some(instance) = context {
            let value = (binding.source)(&instance);
            element.apply_binding(&binding.kind, value);
        }
    }
}

/// Builder for [`Fixture`]
#[derive(Debug)]
pub struct FixtureBuilder {
    root: Element,
    providers: Vec<(String, Instance)>,
    clock: VirtualClock,
    initial_propagation: bool,
}

impl FixtureBuilder {
    /// Create a builder for a root element
    #[must_use]
    pub fn new(root: Element) -> Self {
        Self {
            root,
            providers: Vec::new(),
            clock: VirtualClock::new(),
            initial_propagation: true,
        }
    }

    /// Register a service instance
    #[must_use]
    pub fn provide(mut self, token: impl Into<String>, instance: Instance) -> Self {
        self.providers.push((token.into(), instance));
        self
    }

    /// Start the clock at a fixed time
    #[must_use]
    pub fn clock_at(mut self, time_ms: u64) -> Self {
        self.clock = VirtualClock::starting_at(time_ms);
        self
    }

    /// Share an existing clock (e.g. one captured by component methods)
    #[must_use]
    pub fn with_clock(mut self, clock: VirtualClock) -> Self {
        self.clock = clock;
        self
    }

    /// Skip the first change propagation
    #[must_use]
    pub const fn without_initial_propagation(mut self) -> Self {
        self.initial_propagation = false;
        self
    }

    /// Build the fixture
    #[must_use]
    pub fn build(self) -> Fixture {
        let fixture = Fixture {
            inner: Rc::new(FixtureInner {
                root: self.root,
                providers: RefCell::new(self.providers.into_iter().collect()),
                clock: self.clock,
                propagations: Cell::new(0),
            }),
        };
        if self.initial_propagation {
            fixture.propagate_changes();
        }
        fixture
    }
}
