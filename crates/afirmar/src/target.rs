//! Target References
//!
//! A [`Target`] names something in a fixture and finds it again every time
//! it is resolved. Nothing is cached: a target built before a click sees the
//! tree as it is after the click.
//!
//! ```
//! use afirmar::{Element, Fixture};
//!
//! let fixture = Fixture::new(
//!     Element::new("ul")
//!         .with_child(Element::new("li").with_class("item").with_text("a"))
//!         .with_child(Element::new("li").with_class("item").with_text("b")),
//! );
//! let items = fixture.query_all(".item").unwrap();
//! assert_eq!(items.resolve().len(), 2);
//! assert_eq!(items.nth(2).one().map(|e| e.text_content()), Some("b".to_string()));
//! assert!(items.at_index(5).one().is_none());
//! ```

use crate::component::Instance;
use crate::dom::{select, Element, IntoQuery, Query};
use crate::fixture::Fixture;
use crate::result::{AfirmarError, AfirmarResult};
use std::fmt;
use std::rc::Rc;

/// Element lookup behind a target
pub type ElementResolver = Rc<dyn Fn() -> Vec<Element>>;

/// Whether a target stands for one element or many
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cardinality {
    /// At most one element
    Single,
    /// Any number of elements
    Multi,
}

#[derive(Clone)]
enum Source {
    Elements(ElementResolver),
    Service(String),
}

/// Lazy reference to elements (or an injected service) of a fixture
#[derive(Clone)]
pub struct Target {
    label: String,
    cardinality: Cardinality,
    fixture: Fixture,
    source: Source,
}

impl fmt::Debug for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Target")
            .field("label", &self.label)
            .field("cardinality", &self.cardinality)
            .finish()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label)
    }
}

impl Target {
    /// Target over an arbitrary element lookup
    pub fn new<F>(label: impl Into<String>, cardinality: Cardinality, fixture: &Fixture, resolver: F) -> Self
    where
        F: Fn() -> Vec<Element> + 'static,
    {
        Self {
            label: label.into(),
            cardinality,
            fixture: fixture.clone(),
            source: Source::Elements(Rc::new(resolver)),
        }
    }

    /// Label used in error messages
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Single or multi
    #[must_use]
    pub const fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    /// Whether this target stands for many elements
    #[must_use]
    pub fn is_multi(&self) -> bool {
        self.cardinality == Cardinality::Multi
    }

    /// Fixture the target looks into
    #[must_use]
    pub const fn fixture(&self) -> &Fixture {
        &self.fixture
    }

    /// Current matches. Single targets yield at most one element; service
    /// targets yield none.
    #[must_use]
    pub fn resolve(&self) -> Vec<Element> {
        match &self.source {
            Source::Elements(resolver) => {
                let mut found = resolver();
                if self.cardinality == Cardinality::Single {
                    found.truncate(1);
                }
                found
            }
            Source::Service(_) => Vec::new(),
        }
    }

    /// Current matches as a collection
    #[must_use]
    pub fn collect(&self) -> ElementCollection {
        ElementCollection::new(self.resolve())
    }

    /// First current match
    #[must_use]
    pub fn one(&self) -> Option<Element> {
        self.resolve().into_iter().next()
    }

    /// First current match, or [`AfirmarError::TargetNotFound`]
    pub fn require(&self) -> AfirmarResult<Element> {
        self.one().ok_or_else(|| AfirmarError::not_found(&self.label))
    }

    /// Every current match; empty is [`AfirmarError::TargetNotFound`]
    pub fn require_all(&self) -> AfirmarResult<Vec<Element>> {
        let found = self.resolve();
        if found.is_empty() {
            Err(AfirmarError::not_found(&self.label))
        } else {
            Ok(found)
        }
    }

    /// Component instance behind the target.
    ///
    /// Service targets go through the injector; element targets need a
    /// resolved element carrying a component.
    pub fn instance(&self) -> AfirmarResult<Instance> {
        match &self.source {
            Source::Service(token) => self.fixture.lookup(token),
            Source::Elements(_) => self.require()?.component().ok_or_else(|| AfirmarError::NotAComponent {
                target: self.label.clone(),
            }),
        }
    }

    /// Component instances behind every match
    pub fn instances(&self) -> AfirmarResult<Vec<Instance>> {
        match &self.source {
            Source::Service(token) => Ok(vec![self.fixture.lookup(token)?]),
            Source::Elements(_) => self
                .require_all()?
                .iter()
                .map(|el| {
                    el.component().ok_or_else(|| AfirmarError::NotAComponent {
                        target: self.label.clone(),
                    })
                })
                .collect(),
        }
    }

    fn derive<F>(&self, label: String, cardinality: Cardinality, pick: F) -> Self
    where
        F: Fn(Vec<Element>) -> Vec<Element> + 'static,
    {
        let parent = self.clone();
        Self::new(label, cardinality, &self.fixture, move || pick(parent.resolve()))
    }

    // === Positional accessors ===

    /// First match
    #[must_use]
    pub fn first(&self) -> Self {
        self.at_position(format!("{}.first()", self.label), Some(0))
    }

    /// Last match
    #[must_use]
    pub fn last(&self) -> Self {
        self.derive(format!("{}.last()", self.label), Cardinality::Single, |all| {
            all.into_iter().last().into_iter().collect()
        })
    }

    /// Match at a 1-based position; 0 never matches
    #[must_use]
    pub fn nth(&self, position: usize) -> Self {
        self.at_position(format!("{}.nth({position})", self.label), position.checked_sub(1))
    }

    /// Match at a 0-based index
    #[must_use]
    pub fn at_index(&self, index: usize) -> Self {
        self.at_position(format!("{}.at_index({index})", self.label), Some(index))
    }

    fn at_position(&self, label: String, index: Option<usize>) -> Self {
        self.derive(label, Cardinality::Single, move |all| {
            index.and_then(|i| all.into_iter().nth(i)).into_iter().collect()
        })
    }

    /// Matches satisfying a predicate
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Element) -> bool + 'static,
    {
        self.derive(format!("{}.filter(..)", self.label), Cardinality::Multi, move |all| {
            all.into_iter().filter(|el| predicate(el)).collect()
        })
    }

    /// First match satisfying a predicate
    #[must_use]
    pub fn find<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Element) -> bool + 'static,
    {
        self.derive(format!("{}.find(..)", self.label), Cardinality::Single, move |all| {
            all.into_iter().find(|el| predicate(el)).into_iter().collect()
        })
    }

    // === Scoped lookups ===

    /// First descendant of the (first) match
    pub fn get(&self, query: impl IntoQuery) -> AfirmarResult<Self> {
        let query = query.into_query()?;
        let label = format!("{} {}", self.label, query.describe());
        let parent = self.clone();
        Ok(Self::new(label, Cardinality::Single, &self.fixture, move || {
            parent.one().and_then(|el| el.get(&query)).into_iter().collect()
        }))
    }

    /// Every matching descendant of every match
    pub fn get_all(&self, query: impl IntoQuery) -> AfirmarResult<Self> {
        let query = query.into_query()?;
        let label = format!("{} {}", self.label, query.describe());
        let parent = self.clone();
        Ok(Self::new(label, Cardinality::Multi, &self.fixture, move || {
            parent.resolve().iter().flat_map(|el| el.get_all(&query)).collect()
        }))
    }
}

impl Fixture {
    fn query_target(&self, query: Query, cardinality: Cardinality) -> Target {
        let root = self.root();
        Target::new(query.describe(), cardinality, self, move || select(&root, &query, true))
    }

    /// First element matching the query
    pub fn query(&self, query: impl IntoQuery) -> AfirmarResult<Target> {
        Ok(self.query_target(query.into_query()?, Cardinality::Single))
    }

    /// Every element matching the query
    pub fn query_all(&self, query: impl IntoQuery) -> AfirmarResult<Target> {
        Ok(self.query_target(query.into_query()?, Cardinality::Multi))
    }

    /// The root element
    #[must_use]
    pub fn host(&self) -> Target {
        let root = self.root();
        Target::new("host", Cardinality::Single, self, move || vec![root.clone()])
    }

    /// First element carrying a component of this type
    #[must_use]
    pub fn component(&self, type_name: impl Into<String>) -> Target {
        self.query_target(Query::component(type_name), Cardinality::Single)
    }

    /// Every element carrying a component of this type
    #[must_use]
    pub fn components(&self, type_name: impl Into<String>) -> Target {
        self.query_target(Query::component(type_name), Cardinality::Multi)
    }

    /// Injected service, looked up by token at resolution time
    #[must_use]
    pub fn service(&self, token: impl Into<String>) -> Target {
        let token = token.into();
        Target {
            label: token.clone(),
            cardinality: Cardinality::Single,
            fixture: self.clone(),
            source: Source::Service(token),
        }
    }
}

/// A resolved list of elements with positional accessors
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ElementCollection {
    elements: Vec<Element>,
}

impl ElementCollection {
    /// Wrap a list
    #[must_use]
    pub const fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    /// Number of elements
    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the list is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// First element
    #[must_use]
    pub fn first(&self) -> Option<Element> {
        self.elements.first().cloned()
    }

    /// Last element
    #[must_use]
    pub fn last(&self) -> Option<Element> {
        self.elements.last().cloned()
    }

    /// Element at a 1-based position
    #[must_use]
    pub fn nth(&self, position: usize) -> Option<Element> {
        position.checked_sub(1).and_then(|i| self.at_index(i))
    }

    /// Element at a 0-based index
    #[must_use]
    pub fn at_index(&self, index: usize) -> Option<Element> {
        self.elements.get(index).cloned()
    }

    /// Elements satisfying a predicate
    #[must_use]
    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&Element) -> bool,
    {
        Self::new(self.elements.iter().filter(|el| predicate(el)).cloned().collect())
    }

    /// First element satisfying a predicate
    #[must_use]
    pub fn find<P>(&self, predicate: P) -> Option<Element>
    where
        P: Fn(&Element) -> bool,
    {
        self.elements.iter().find(|el| predicate(el)).cloned()
    }

    /// Iterate
    pub fn iter(&self) -> std::slice::Iter<'_, Element> {
        self.elements.iter()
    }

    /// Unwrap the list
    #[must_use]
    pub fn into_vec(self) -> Vec<Element> {
        self.elements
    }
}

impl IntoIterator for ElementCollection {
    type Item = Element;
    type IntoIter = std::vec::IntoIter<Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<'a> IntoIterator for &'a ElementCollection {
    type Item = &'a Element;
    type IntoIter = std::slice::Iter<'a, Element>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.iter()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dom::BindingKind;
    use serde_json::{json, Value};

    fn list_fixture(n: usize) -> Fixture {
        Fixture::new(Element::new("ul").with_class("list").with_children(
            (1..=n).map(|i| Element::new("li").with_class("item").with_text(format!("item {i}"))),
        ))
    }

    mod resolution_tests {
        use super::*;

        #[test]
        fn test_resolution_is_lazy() {
            let fixture = list_fixture(2);
            let items = fixture.query_all(".item").unwrap();
            assert_eq!(items.resolve().len(), 2);
            fixture.root().append_child(Element::new("li").with_class("item"));
            assert_eq!(items.resolve().len(), 3);
        }

        #[test]
        fn test_single_truncates() {
            let fixture = list_fixture(3);
            let item = fixture.query(".item").unwrap();
            assert_eq!(item.resolve().len(), 1);
            assert!(!item.is_multi());
        }

        #[test]
        fn test_query_matches_root() {
            let fixture = list_fixture(1);
            assert!(fixture.query("ul.list").unwrap().one().is_some());
        }

        #[test]
        fn test_require_names_target() {
            let fixture = list_fixture(0);
            let err = fixture.query(".item").unwrap().require().unwrap_err();
            assert_eq!(err.to_string(), "Target .item wasn't found");
            assert!(fixture.query_all(".item").unwrap().require_all().is_err());
        }

        #[test]
        fn test_invalid_selector() {
            let fixture = list_fixture(0);
            assert!(matches!(
                fixture.query("[unclosed").unwrap_err(),
                AfirmarError::InvalidSelector { .. }
            ));
        }

        #[test]
        fn test_host() {
            let fixture = list_fixture(1);
            assert_eq!(fixture.host().one(), Some(fixture.root()));
            assert_eq!(fixture.host().label(), "host");
        }
    }

    mod accessor_tests {
        use super::*;

        #[test]
        fn test_positional() {
            let fixture = list_fixture(3);
            let items = fixture.query_all(".item").unwrap();
            let text = |t: Target| t.one().map(|e| e.text_content());
            assert_eq!(text(items.first()), Some("item 1".into()));
            assert_eq!(text(items.last()), Some("item 3".into()));
            assert_eq!(text(items.nth(2)), Some("item 2".into()));
            assert_eq!(text(items.at_index(2)), Some("item 3".into()));
            assert_eq!(items.nth(2).label(), ".item.nth(2)");
        }

        #[test]
        fn test_out_of_range_is_not_found() {
            let fixture = list_fixture(2);
            let items = fixture.query_all(".item").unwrap();
            assert!(items.nth(0).one().is_none());
            assert!(items.nth(3).one().is_none());
            assert!(items.at_index(7).one().is_none());
            assert!(fixture.query_all(".none").unwrap().last().one().is_none());
        }

        #[test]
        fn test_filter_and_find() {
            let fixture = list_fixture(4);
            let items = fixture.query_all(".item").unwrap();
            let even = items.filter(|e| e.text_content().ends_with('2') || e.text_content().ends_with('4'));
            assert_eq!(even.resolve().len(), 2);
            assert!(even.is_multi());
            let third = items.find(|e| e.text_content() == "item 3");
            assert_eq!(third.one().map(|e| e.text_content()), Some("item 3".into()));
        }

        #[test]
        fn test_positional_accessors_stay_lazy() {
            let fixture = list_fixture(1);
            let second = fixture.query_all(".item").unwrap().nth(2);
            assert!(second.one().is_none());
            fixture
                .root()
                .append_child(Element::new("li").with_class("item").with_text("late"));
            assert_eq!(second.one().map(|e| e.text_content()), Some("late".into()));
        }

        #[test]
        fn test_scoped_get() {
            let fixture = Fixture::new(
                Element::new("div")
                    .with_child(Element::new("section").with_id("a").with_child(Element::new("button")))
                    .with_child(Element::new("section").with_id("b").with_child(Element::new("button"))),
            );
            let sections = fixture.query_all("section").unwrap();
            assert_eq!(sections.get_all("button").unwrap().resolve().len(), 2);
            let in_b = fixture.query("#b").unwrap().get("button").unwrap();
            assert_eq!(in_b.label(), "#b button");
            assert!(in_b.one().is_some());
        }
    }

    mod instance_tests {
        use super::*;

        #[test]
        fn test_component_target() {
            let counter = Instance::new("Counter");
            let fixture = Fixture::new(Element::new("div").with_child(Element::new("app-counter").with_component(counter.clone())));
            assert_eq!(fixture.component("Counter").instance().unwrap(), counter);
            assert_eq!(fixture.components("Counter").instances().unwrap().len(), 1);
        }

        #[test]
        fn test_element_without_component() {
            let fixture = list_fixture(1);
            let err = fixture.query(".item").unwrap().instance().unwrap_err();
            assert!(matches!(err, AfirmarError::NotAComponent { .. }));
        }

        #[test]
        fn test_service_target() {
            let fixture = list_fixture(0);
            let api = fixture.service("Api");
            assert!(api.resolve().is_empty());
            assert!(matches!(api.instance().unwrap_err(), AfirmarError::DependencyNotFound { .. }));
            fixture.provide("Api", Instance::new("Api"));
            assert_eq!(api.instance().unwrap().type_name(), "Api");
        }

        #[test]
        fn test_factory_component_appears_after_propagation() {
            let host = Instance::new("Shell").with_state(json!({"open": false}));
            let fixture = Fixture::new(
                Element::new("app-shell").with_component(host.clone()).with_child(
                    Element::new("app-dialog")
                        .bind(BindingKind::Visible, &host, |h| h.get("open").unwrap_or(Value::Null))
                        .with_factory(|_| Instance::new("Dialog")),
                ),
            );
            let dialog = fixture.component("Dialog");
            assert!(dialog.instance().unwrap_err().is_unresolved());
            host.set("open", json!(true));
            fixture.propagate_changes();
            assert_eq!(dialog.instance().unwrap().type_name(), "Dialog");
        }
    }

    mod collection_tests {
        use super::*;

        #[test]
        fn test_collection_accessors() {
            let fixture = list_fixture(3);
            let all = fixture.query_all(".item").unwrap().collect();
            assert_eq!(all.len(), 3);
            assert_eq!(all.nth(1), all.first());
            assert_eq!(all.nth(3), all.last());
            assert!(all.nth(0).is_none());
            assert_eq!(all.filter(|e| e.text_content() != "item 2").len(), 2);
            assert!(all.find(|e| e.text_content() == "item 9").is_none());
            assert_eq!(all.iter().count(), 3);
        }
    }
}
