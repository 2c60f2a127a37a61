//! Afirmar: Declarative When/Expect Testing for Component Trees
//!
//! Afirmar (Spanish: "to affirm") turns component tests into sentences.
//! A statement binds a subject, accumulates predicates, binds an object,
//! optionally negates, and executes assertions in one terminal call.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                    AFIRMAR Architecture                         │
//! ├─────────────────────────────────────────────────────────────────┤
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Statement  │    │ Extension  │    │ TestState  │            │
//! │   │ when/has/  │───►│ apply(ctx) │───►│ predicates │            │
//! │   │ expect/to  │    │ -> patch   │    │ assertions │            │
//! │   └────────────┘    └────────────┘    │ spies      │            │
//! │         │                             └─────┬──────┘            │
//! │         ▼                                   ▼                   │
//! │   ┌────────────┐    ┌────────────┐    ┌────────────┐            │
//! │   │ Target     │    │ Fixture    │◄───│ Engine     │            │
//! │   │ lazy refs  │───►│ elements,  │    │ place spies│            │
//! │   │            │    │ components │    │ run steps  │            │
//! │   └────────────┘    └────────────┘    └────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use afirmar::prelude::*;
//! use serde_json::json;
//!
//! let counter = Instance::new("Counter")
//!     .with_state(json!({"count": 0}))
//!     .with_method("increment", |this, _| {
//!         let count = this.get("count").and_then(|v| v.as_i64()).unwrap_or(0);
//!         this.set("count", json!(count + 1));
//!         json!(null)
//!     });
//! let root = Element::new("app-counter")
//!     .with_component(counter.clone())
//!     .with_child(
//!         Element::new("button")
//!             .with_class("inc")
//!             .on("click", Listener::method(&counter, "increment")),
//!     );
//! let fixture = Fixture::new(root);
//! let button = fixture.query(".inc").unwrap();
//! let host = fixture.host();
//!
//! when(&button)
//!     .has(click())
//!     .and(click())
//!     .expect(&host)
//!     .to(have_state(json!({"count": 2})))
//!     .unwrap();
//! ```

#![warn(missing_docs)]

/// Built-in predicates and assertions
pub mod catalog;
/// Virtual clock driving timers
pub mod clock;
mod component;
/// Process-wide (per-thread) spy factory configuration
pub mod config;
mod dom;
/// Execution engine
pub mod engine;
/// Extension protocol
pub mod extension;
mod fixture;
mod registry;
mod result;
mod spy;
mod state;
/// Statement builder
pub mod statement;
mod target;

pub use clock::{TimerId, VirtualClock};
pub use component::{Callable, EventEmitter, Instance, Listener, Method, WeakInstance};
pub use dom::{truthy, BindingKind, BindingSource, ComponentFactory, Element, IntoQuery, Query, Selector};
pub use engine::{execute, ExecutionSummary};
pub use extension::{extension, negate, Extension, ExtensionContext, FnExtension, IntoExtensions, Negate};
pub use fixture::{Fixture, FixtureBuilder};
pub use registry::{HostResolver, SpyEntry, SpyRegistry};
pub use result::{AfirmarError, AfirmarResult};
pub use spy::{RecordingSpyFactory, Spy, SpyBehavior, SpyFactory, SpyHost};
pub use state::{StatePatch, Step, StepFn, TestState};
pub use statement::{when, ComposedAssertion, Expectation, Statement};
pub use target::{Cardinality, ElementCollection, ElementResolver, Target};

/// Everything a test needs, in one import
pub mod prelude {
    pub use super::catalog::*;
    pub use super::config;
    pub use super::{
        extension, negate, when, AfirmarError, AfirmarResult, BindingKind, Cardinality, ComposedAssertion,
        Element, ElementCollection, EventEmitter, Expectation, Extension, ExtensionContext, Fixture, FixtureBuilder,
        Instance, IntoExtensions, Listener, Query, RecordingSpyFactory, Spy, SpyBehavior, SpyFactory, StatePatch,
        Statement, Step, Target, VirtualClock,
    };
}
