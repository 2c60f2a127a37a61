//! Spy Registry with Deferred Placement
//!
//! Assertions ask for spies on hosts that may not exist yet: a dialog
//! created by a click, a service provided after the statement was built.
//! The registry remembers each request as a resolver plus a method name,
//! and the engine asks it to retry placement before every predicate.
//!
//! ## Toyota Way Application
//!
//! - **Jidoka**: A spy that never found its host fails the run by name
//! - **Poka-Yoke**: Only "does not exist yet" errors are deferred; anything
//!   else stops the line immediately

use crate::result::{AfirmarError, AfirmarResult};
use crate::spy::{Spy, SpyBehavior, SpyFactory, SpyHost};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Resolves the object a spy should be installed into
pub type HostResolver = Rc<dyn Fn() -> AfirmarResult<Box<dyn SpyHost>>>;

/// One requested spy installation
#[derive(Clone)]
pub struct SpyEntry {
    host_label: String,
    host: HostResolver,
    method: String,
    spy: Spy,
    done: bool,
}

impl fmt::Debug for SpyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpyEntry")
            .field("host", &self.host_label)
            .field("method", &self.method)
            .field("done", &self.done)
            .finish()
    }
}

impl SpyEntry {
    /// Create a pending entry
    #[must_use]
    pub fn new(host_label: impl Into<String>, host: HostResolver, method: impl Into<String>, spy: Spy) -> Self {
        Self {
            host_label: host_label.into(),
            host,
            method: method.into(),
            spy,
            done: false,
        }
    }

    /// `host.method`
    #[must_use]
    pub fn describe(&self) -> String {
        format!("{}.{}", self.host_label, self.method)
    }

    /// The spy handle
    #[must_use]
    pub const fn spy(&self) -> &Spy {
        &self.spy
    }

    /// Whether placement succeeded
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }
}

/// Shared list of spy requests.
///
/// Clones share the same list, so a statement imported into another keeps
/// registering into one registry.
#[derive(Clone, Default)]
pub struct SpyRegistry {
    entries: Rc<RefCell<Vec<SpyEntry>>>,
}

impl fmt::Debug for SpyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.entries.borrow().iter()).finish()
    }
}

impl SpyRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both handles share one list
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    /// Create a spy through `factory` and queue it for placement
    pub fn spy_on(
        &self,
        factory: &dyn SpyFactory,
        host_label: &str,
        host: HostResolver,
        method: &str,
        behavior: SpyBehavior,
    ) -> Spy {
        let spy = factory.create(&format!("{host_label}.{method}"), behavior);
        self.register(SpyEntry::new(host_label, host, method, spy.clone()));
        spy
    }

    /// Queue an entry
    pub fn register(&self, entry: SpyEntry) {
        tracing::trace!(spy = %entry.describe(), "spy registered");
        self.entries.borrow_mut().push(entry);
    }

    /// Try to place every pending spy.
    ///
    /// Hosts that do not exist yet are skipped and retried on the next call.
    /// Returns how many spies were placed by this call.
    ///
    /// # Errors
    ///
    /// Any resolution or installation error other than an unresolved host.
    pub fn place_pending(&self) -> AfirmarResult<usize> {
        let pending: Vec<(usize, SpyEntry)> = self
            .entries
            .borrow()
            .iter()
            .enumerate()
            .filter(|(_, e)| !e.done)
            .map(|(i, e)| (i, e.clone()))
            .collect();

        let mut placed = 0;
        for (index, entry) in pending {
            match (entry.host)() {
                Ok(host) => {
                    host.install(&entry.method, &entry.spy)?;
                    if let Some(slot) = self.entries.borrow_mut().get_mut(index) {
                        slot.done = true;
                    }
                    placed += 1;
                    tracing::debug!(spy = %entry.describe(), host = %host.describe(), "spy placed");
                }
                Err(err) if err.is_unresolved() => {
                    tracing::trace!(spy = %entry.describe(), reason = %err, "spy placement deferred");
                }
                Err(err) => return Err(err),
            }
        }
        Ok(placed)
    }

    /// Fail if any spy was never placed
    ///
    /// # Errors
    ///
    /// [`AfirmarError::SpyPlacementFailed`] naming every unplaced `host.method`.
    pub fn verify(&self) -> AfirmarResult<()> {
        let unplaced = self.unplaced();
        if unplaced.is_empty() {
            Ok(())
        } else {
            tracing::warn!(unplaced = ?unplaced, "spies never placed");
            Err(AfirmarError::SpyPlacementFailed { unplaced })
        }
    }

    /// `host.method` of every pending entry
    #[must_use]
    pub fn unplaced(&self) -> Vec<String> {
        self.entries
            .borrow()
            .iter()
            .filter(|e| !e.done)
            .map(SpyEntry::describe)
            .collect()
    }

    /// Entries still waiting for their host
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.entries.borrow().iter().filter(|e| !e.done).count()
    }

    /// Entries already placed
    #[must_use]
    pub fn placed_count(&self) -> usize {
        self.entries.borrow().iter().filter(|e| e.done).count()
    }

    /// Total entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Whether nothing was registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Move the entries of another registry into this one.
    ///
    /// Afterwards both handles share this registry's list. No-op when they
    /// already share it.
    pub fn absorb(&mut self, other: &mut Self) {
        if self.same_as(other) {
            return;
        }
        let moved = std::mem::take(&mut *other.entries.borrow_mut());
        self.entries.borrow_mut().extend(moved);
        other.entries = Rc::clone(&self.entries);
    }
}
