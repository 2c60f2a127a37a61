//! Spies: substitute callables that record how they were invoked.
//!
//! A [`Spy`] is created first and installed later. Assertions capture the
//! handle as soon as they are built; the registry installs it into its host
//! (through [`SpyHost`]) once the host exists.

use crate::component::{Callable, EventEmitter, Instance};
use crate::result::{AfirmarError, AfirmarResult};
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// What an installed spy does when called
#[derive(Clone)]
pub enum SpyBehavior {
    /// Return a fixed value without running the original
    Returns(Value),
    /// Run the replaced original and return its value
    CallThrough,
    /// Run a substitute implementation
    Fake(Callable),
}

impl Default for SpyBehavior {
    fn default() -> Self {
        Self::Returns(Value::Null)
    }
}

impl fmt::Debug for SpyBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Returns(v) => write!(f, "Returns({v})"),
            Self::CallThrough => write!(f, "CallThrough"),
            Self::Fake(_) => write!(f, "Fake"),
        }
    }
}

struct SpyInner {
    label: String,
    behavior: SpyBehavior,
    calls: RefCell<Vec<Vec<Value>>>,
    original: RefCell<Option<Callable>>,
    installed: Cell<bool>,
}

/// Shared handle to a recording spy
#[derive(Clone)]
pub struct Spy {
    inner: Rc<SpyInner>,
}

impl fmt::Debug for Spy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spy")
            .field("label", &self.inner.label)
            .field("behavior", &self.inner.behavior)
            .field("calls", &self.inner.calls.borrow().len())
            .field("installed", &self.inner.installed.get())
            .finish()
    }
}

impl Spy {
    /// Create an uninstalled spy
    #[must_use]
    pub fn new(label: impl Into<String>, behavior: SpyBehavior) -> Self {
        Self {
            inner: Rc::new(SpyInner {
                label: label.into(),
                behavior,
                calls: RefCell::new(Vec::new()),
                original: RefCell::new(None),
                installed: Cell::new(false),
            }),
        }
    }

    /// Label, usually `Host.method`
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Record a call and produce the configured result
    pub fn invoke(&self, args: &[Value]) -> Value {
        self.inner.calls.borrow_mut().push(args.to_vec());
        match &self.inner.behavior {
            SpyBehavior::Returns(value) => value.clone(),
            SpyBehavior::CallThrough => {
                let original = self.inner.original.borrow().clone();
                original.map_or(Value::Null, |f| f(args))
            }
            SpyBehavior::Fake(fake) => fake(args),
        }
    }

    /// The spy as a plain callable
    #[must_use]
    pub fn as_callable(&self) -> Callable {
        let spy = self.clone();
        Rc::new(move |args: &[Value]| spy.invoke(args))
    }

    /// Argument lists of every call so far
    #[must_use]
    pub fn calls(&self) -> Vec<Vec<Value>> {
        self.inner.calls.borrow().clone()
    }

    /// Number of calls so far
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.inner.calls.borrow().len()
    }

    /// Whether any call received exactly these arguments
    #[must_use]
    pub fn was_called_with(&self, args: &[Value]) -> bool {
        self.inner.calls.borrow().iter().any(|c| c == args)
    }

    /// Forget recorded calls
    pub fn reset(&self) {
        self.inner.calls.borrow_mut().clear();
    }

    /// Whether a host accepted the spy
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.inner.installed.get()
    }

    /// Mark installed, keeping the replaced callable for call-through
    pub fn attach(&self, original: Callable) {
        *self.inner.original.borrow_mut() = Some(original);
        self.inner.installed.set(true);
    }
}

/// Something a spy can be installed into
pub trait SpyHost {
    /// Host description used in labels and errors
    fn describe(&self) -> String;

    /// Replace `method` with the spy
    fn install(&self, method: &str, spy: &Spy) -> AfirmarResult<()>;
}

impl SpyHost for Instance {
    fn describe(&self) -> String {
        self.type_name().to_string()
    }

    fn install(&self, method: &str, spy: &Spy) -> AfirmarResult<()> {
        let original = self
            .method(method)
            .ok_or_else(|| AfirmarError::MethodNotFound {
                host: self.describe(),
                method: method.to_string(),
            })?;
        let weak = self.downgrade();
        spy.attach(Rc::new(move |args: &[Value]| {
            weak.upgrade()
                .map_or(Value::Null, |this| original(&this, args))
        }));
        let replacement = spy.clone();
        let _ = self.replace_method(
            method,
            Rc::new(move |_: &Instance, args: &[Value]| replacement.invoke(args)),
        );
        Ok(())
    }
}

impl SpyHost for EventEmitter {
    fn describe(&self) -> String {
        EventEmitter::describe(self)
    }

    fn install(&self, method: &str, spy: &Spy) -> AfirmarResult<()> {
        if method != "emit" {
            return Err(AfirmarError::MethodNotFound {
                host: EventEmitter::describe(self),
                method: method.to_string(),
            });
        }
        let original = self.intercept(spy.as_callable());
        spy.attach(original);
        Ok(())
    }
}

/// Creates spies for statements
pub trait SpyFactory {
    /// Create an uninstalled spy
    fn create(&self, label: &str, behavior: SpyBehavior) -> Spy;
}

impl<F> SpyFactory for F
where
    F: Fn(&str, SpyBehavior) -> Spy,
{
    fn create(&self, label: &str, behavior: SpyBehavior) -> Spy {
        self(label, behavior)
    }
}

/// Default factory: plain recording spies
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordingSpyFactory;

impl SpyFactory for RecordingSpyFactory {
    fn create(&self, label: &str, behavior: SpyBehavior) -> Spy {
        Spy::new(label, behavior)
    }
}
