//! Logical component instances.
//!
//! An [`Instance`] is the data object behind a rendered element: a JSON state
//! map, a table of named methods and a set of named outputs. Methods are
//! looked up at call time, which is what lets a spy replace one after the
//! instance was created.

use crate::result::{AfirmarError, AfirmarResult};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// A free-standing callable taking JSON arguments
pub type Callable = Rc<dyn Fn(&[Value]) -> Value>;

/// A component method: receives the instance it is called on
pub type Method = Rc<dyn Fn(&Instance, &[Value]) -> Value>;

struct InstanceInner {
    type_name: String,
    state: RefCell<Map<String, Value>>,
    methods: RefCell<BTreeMap<String, Method>>,
    outputs: RefCell<BTreeMap<String, EventEmitter>>,
}

/// Shared handle to a component instance.
///
/// Cloning the handle does not clone the component.
#[derive(Clone)]
pub struct Instance {
    inner: Rc<InstanceInner>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.inner.type_name)
            .field("state", &*self.inner.state.borrow())
            .field("methods", &self.inner.methods.borrow().keys().collect::<Vec<_>>())
            .field("outputs", &self.inner.outputs.borrow().keys().collect::<Vec<_>>())
            .finish()
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Instance {
    /// Create an empty instance of the given component type
    #[must_use]
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(InstanceInner {
                type_name: type_name.into(),
                state: RefCell::new(Map::new()),
                methods: RefCell::new(BTreeMap::new()),
                outputs: RefCell::new(BTreeMap::new()),
            }),
        }
    }

    /// Seed state from a JSON object (non-object values are ignored)
    #[must_use]
    pub fn with_state(self, state: Value) -> Self {
        self.patch(&state);
        self
    }

    /// Add a method
    #[must_use]
    pub fn with_method<F>(self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Value + 'static,
    {
        self.define_method(name, method);
        self
    }

    /// Add an output
    #[must_use]
    pub fn with_output(self, name: impl Into<String>) -> Self {
        let name = name.into();
        let emitter = EventEmitter::new(&self.inner.type_name, &name);
        let _ = self.inner.outputs.borrow_mut().insert(name, emitter);
        self
    }

    /// Component type token
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.inner.type_name
    }

    /// Read one state field
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.state.borrow().get(key).cloned()
    }

    /// Write one state field
    pub fn set(&self, key: impl Into<String>, value: Value) {
        let _ = self.inner.state.borrow_mut().insert(key.into(), value);
    }

    /// Snapshot of the whole state as a JSON object
    #[must_use]
    pub fn state(&self) -> Value {
        Value::Object(self.inner.state.borrow().clone())
    }

    /// Merge the top-level fields of a JSON object into the state
    pub fn patch(&self, fields: &Value) {
        if let Value::Object(fields) = fields {
            let mut state = self.inner.state.borrow_mut();
            for (key, value) in fields {
                let _ = state.insert(key.clone(), value.clone());
            }
        }
    }

    /// Define or overwrite a method
    pub fn define_method<F>(&self, name: impl Into<String>, method: F)
    where
        F: Fn(&Instance, &[Value]) -> Value + 'static,
    {
        let _ = self
            .inner
            .methods
            .borrow_mut()
            .insert(name.into(), Rc::new(method));
    }

    /// Whether the method table has an entry
    #[must_use]
    pub fn has_method(&self, name: &str) -> bool {
        self.inner.methods.borrow().contains_key(name)
    }

    /// Current method table entry
    #[must_use]
    pub fn method(&self, name: &str) -> Option<Method> {
        self.inner.methods.borrow().get(name).cloned()
    }

    /// Swap a method table entry, returning the previous one
    pub fn replace_method(&self, name: &str, method: Method) -> Option<Method> {
        self.inner
            .methods
            .borrow_mut()
            .insert(name.to_string(), method)
    }

    /// Call a method by name.
    ///
    /// The table borrow is released before the method runs, so methods may
    /// call other methods or redefine themselves.
    pub fn call(&self, name: &str, args: &[Value]) -> AfirmarResult<Value> {
        let method = self
            .method(name)
            .ok_or_else(|| AfirmarError::MethodNotFound {
                host: self.inner.type_name.clone(),
                method: name.to_string(),
            })?;
        Ok(method(self, args))
    }

    /// Look up an output
    pub fn output(&self, name: &str) -> AfirmarResult<EventEmitter> {
        self.inner
            .outputs
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| AfirmarError::OutputNotFound {
                component: self.inner.type_name.clone(),
                output: name.to_string(),
            })
    }

    /// Weak handle, used by listeners and bindings
    #[must_use]
    pub fn downgrade(&self) -> WeakInstance {
        WeakInstance {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to an [`Instance`]
#[derive(Clone)]
pub struct WeakInstance {
    inner: Weak<InstanceInner>,
}

impl WeakInstance {
    /// Upgrade if the instance is still alive
    #[must_use]
    pub fn upgrade(&self) -> Option<Instance> {
        self.inner.upgrade().map(|inner| Instance { inner })
    }
}

impl fmt::Debug for WeakInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(instance) => write!(f, "WeakInstance({})", instance.type_name()),
            None => write!(f, "WeakInstance(dropped)"),
        }
    }
}

/// Receiver of an element event or component output
#[derive(Clone)]
pub enum Listener {
    /// Dispatch through the host's method table
    Method {
        /// Host instance
        host: WeakInstance,
        /// Method name, resolved at dispatch time
        method: String,
    },
    /// Plain callback
    Callback(Callable),
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method { host, method } => write!(f, "Listener::Method({host:?}.{method})"),
            Self::Callback(_) => write!(f, "Listener::Callback"),
        }
    }
}

impl Listener {
    /// Listener calling `host.method(args)`
    #[must_use]
    pub fn method(host: &Instance, method: impl Into<String>) -> Self {
        Self::Method {
            host: host.downgrade(),
            method: method.into(),
        }
    }

    /// Listener calling a closure
    #[must_use]
    pub fn callback<F>(callback: F) -> Self
    where
        F: Fn(&[Value]) -> Value + 'static,
    {
        Self::Callback(Rc::new(callback))
    }

    /// Deliver arguments. A listener whose host was destroyed is a no-op.
    pub fn invoke(&self, args: &[Value]) -> AfirmarResult<Value> {
        match self {
            Self::Method { host, method } => match host.upgrade() {
                Some(instance) => instance.call(method, args),
                None => Ok(Value::Null),
            },
            Self::Callback(callback) => Ok(callback(args)),
        }
    }
}

struct EmitterInner {
    owner: String,
    name: String,
    subscribers: RefCell<Vec<Listener>>,
    interceptor: RefCell<Option<Callable>>,
}

/// Named component output.
///
/// `emit` delivers to subscribers unless an interceptor (a spy) replaced it.
#[derive(Clone)]
pub struct EventEmitter {
    inner: Rc<EmitterInner>,
}

impl fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventEmitter")
            .field("owner", &self.inner.owner)
            .field("name", &self.inner.name)
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("intercepted", &self.inner.interceptor.borrow().is_some())
            .finish()
    }
}

impl EventEmitter {
    fn new(owner: &str, name: &str) -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                owner: owner.to_string(),
                name: name.to_string(),
                subscribers: RefCell::new(Vec::new()),
                interceptor: RefCell::new(None),
            }),
        }
    }

    /// `Owner.output`
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}.{}", self.inner.owner, self.inner.name)
    }

    /// Output name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Attach a subscriber
    pub fn subscribe(&self, listener: Listener) {
        self.inner.subscribers.borrow_mut().push(listener);
    }

    /// Emit a value
    pub fn emit(&self, value: Value) -> AfirmarResult<()> {
        let interceptor = self.inner.interceptor.borrow().clone();
        match interceptor {
            Some(intercept) => {
                let _ = intercept(std::slice::from_ref(&value));
                Ok(())
            }
            None => self.deliver(&value),
        }
    }

    /// Deliver to subscribers, bypassing any interceptor
    pub fn deliver(&self, value: &Value) -> AfirmarResult<()> {
        let subscribers = self.inner.subscribers.borrow().clone();
        for subscriber in subscribers {
            let _ = subscriber.invoke(std::slice::from_ref(value))?;
        }
        Ok(())
    }

    /// Replace `emit`; returns a callable performing the original delivery
    pub fn intercept(&self, interceptor: Callable) -> Callable {
        *self.inner.interceptor.borrow_mut() = Some(interceptor);
        let weak = Rc::downgrade(&self.inner);
        Rc::new(move |args: &[Value]| {
            if let Some(inner) = weak.upgrade() {
                let emitter = EventEmitter { inner };
                let value = args.first().cloned().unwrap_or(Value::Null);
                if let Err(err) = emitter.deliver(&value) {
                    tracing::warn!(output = %emitter.describe(), error = %err, "delivery failed");
                }
            }
            Value::Null
        })
    }
}
