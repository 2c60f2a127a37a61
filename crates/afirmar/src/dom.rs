//! Element tree and queries.
//!
//! [`Element`] is the query facade the declarative layer talks to: a shared
//! node with tag, id, classes, attributes, JSON native properties, text,
//! children, event listeners and one-way bindings to a component instance.
//!
//! Selectors are deliberately small:
//! - `"button"` - by tag (`*` matches any tag)
//! - `"#submit"` - by id
//! - `".toggle"` - by class
//! - `"[disabled]"`, `"[type='button']"` - by attribute
//! - `"li.item[data-x=1]"` - compound
//! - `"ul .item"` - descendant

use crate::component::{Instance, Listener, WeakInstance};
use crate::result::{AfirmarError, AfirmarResult};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Builds a component instance for an element the first time it is shown
pub type ComponentFactory = Rc<dyn Fn(&Element) -> Instance>;

/// Computes a bound value from a component instance
pub type BindingSource = Rc<dyn Fn(&Instance) -> Value>;

/// What a binding writes to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    /// Own text
    Text,
    /// Toggle a class on truthy values
    Class(String),
    /// Set an attribute (null removes it)
    Attribute(String),
    /// Set a native property
    Property(String),
    /// Structural visibility (falsy hides the element and its subtree)
    Visible,
}

#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) kind: BindingKind,
    /// `None` means "the element's own component"
    pub(crate) context: Option<WeakInstance>,
    pub(crate) source: BindingSource,
}

struct NodeData {
    tag: String,
    id: Option<String>,
    classes: BTreeSet<String>,
    attributes: BTreeMap<String, String>,
    properties: Map<String, Value>,
    text: String,
    children: Vec<Element>,
    listeners: Vec<(String, Listener)>,
    bindings: Vec<Binding>,
    component: Option<Instance>,
    factory: Option<ComponentFactory>,
    visible: bool,
}

/// Shared handle to a node in the element tree
#[derive(Clone)]
pub struct Element {
    inner: Rc<RefCell<NodeData>>,
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = self.inner.borrow();
        f.debug_struct("Element")
            .field("tag", &node.tag)
            .field("id", &node.id)
            .field("classes", &node.classes)
            .field("children", &node.children.len())
            .field("component", &node.component.as_ref().map(|c| c.type_name().to_string()))
            .field("visible", &node.visible)
            .finish()
    }
}

impl Element {
    /// Create a visible element
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(NodeData {
                tag: tag.into(),
                id: None,
                classes: BTreeSet::new(),
                attributes: BTreeMap::new(),
                properties: Map::new(),
                text: String::new(),
                children: Vec::new(),
                listeners: Vec::new(),
                bindings: Vec::new(),
                component: None,
                factory: None,
                visible: true,
            })),
        }
    }

    // === Builders ===

    /// Set the id
    #[must_use]
    pub fn with_id(self, id: impl Into<String>) -> Self {
        self.inner.borrow_mut().id = Some(id.into());
        self
    }

    /// Add a class
    #[must_use]
    pub fn with_class(self, class: impl Into<String>) -> Self {
        self.add_class(class);
        self
    }

    /// Set an attribute
    #[must_use]
    pub fn with_attr(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    /// Set a native property
    #[must_use]
    pub fn with_property(self, name: impl Into<String>, value: Value) -> Self {
        self.set_property(name, value);
        self
    }

    /// Set own text
    #[must_use]
    pub fn with_text(self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Append a child
    #[must_use]
    pub fn with_child(self, child: Element) -> Self {
        self.append_child(child);
        self
    }

    /// Append several children
    #[must_use]
    pub fn with_children(self, children: impl IntoIterator<Item = Element>) -> Self {
        for child in children {
            self.append_child(child);
        }
        self
    }

    /// Attach a component instance
    #[must_use]
    pub fn with_component(self, instance: Instance) -> Self {
        self.inner.borrow_mut().component = Some(instance);
        self
    }

    /// Attach a component factory.
    ///
    /// The instance is created by change propagation the first time the
    /// element is visible. Hiding the element destroys the instance and the
    /// children the factory created; showing it again rebuilds both.
    #[must_use]
    pub fn with_factory<F>(self, factory: F) -> Self
    where
        F: Fn(&Element) -> Instance + 'static,
    {
        self.inner.borrow_mut().factory = Some(Rc::new(factory));
        self
    }

    /// Listen to an element event
    #[must_use]
    pub fn on(self, event: impl Into<String>, listener: Listener) -> Self {
        self.inner
            .borrow_mut()
            .listeners
            .push((event.into(), listener));
        self
    }

    /// Bind to a value computed from `context`
    #[must_use]
    pub fn bind<F>(self, kind: BindingKind, context: &Instance, source: F) -> Self
    where
        F: Fn(&Instance) -> Value + 'static,
    {
        self.inner.borrow_mut().bindings.push(Binding {
            kind,
            context: Some(context.downgrade()),
            source: Rc::new(source),
        });
        self
    }

    /// Bind to a value computed from the element's own component
    #[must_use]
    pub fn bind_own<F>(self, kind: BindingKind, source: F) -> Self
    where
        F: Fn(&Instance) -> Value + 'static,
    {
        self.inner.borrow_mut().bindings.push(Binding {
            kind,
            context: None,
            source: Rc::new(source),
        });
        self
    }

    // === Mutation ===

    /// Add a class
    pub fn add_class(&self, class: impl Into<String>) {
        let _ = self.inner.borrow_mut().classes.insert(class.into());
    }

    /// Remove a class
    pub fn remove_class(&self, class: &str) {
        let _ = self.inner.borrow_mut().classes.remove(class);
    }

    /// Set an attribute
    pub fn set_attribute(&self, name: impl Into<String>, value: impl Into<String>) {
        let _ = self
            .inner
            .borrow_mut()
            .attributes
            .insert(name.into(), value.into());
    }

    /// Remove an attribute
    pub fn remove_attribute(&self, name: &str) {
        let _ = self.inner.borrow_mut().attributes.remove(name);
    }

    /// Set a native property
    pub fn set_property(&self, name: impl Into<String>, value: Value) {
        let _ = self
            .inner
            .borrow_mut()
            .properties
            .insert(name.into(), value);
    }

    /// Replace own text
    pub fn set_text(&self, text: impl Into<String>) {
        self.inner.borrow_mut().text = text.into();
    }

    /// Append a child
    pub fn append_child(&self, child: Element) {
        self.inner.borrow_mut().children.push(child);
    }

    /// Show or hide the element
    pub fn set_visible(&self, visible: bool) {
        self.inner.borrow_mut().visible = visible;
    }

    // === Reading ===

    /// Tag name
    #[must_use]
    pub fn tag(&self) -> String {
        self.inner.borrow().tag.clone()
    }

    /// Id, if any
    #[must_use]
    pub fn id(&self) -> Option<String> {
        self.inner.borrow().id.clone()
    }

    /// Whether the class is present
    #[must_use]
    pub fn has_class(&self, class: &str) -> bool {
        self.inner.borrow().classes.contains(class)
    }

    /// All classes, sorted
    #[must_use]
    pub fn classes(&self) -> Vec<String> {
        self.inner.borrow().classes.iter().cloned().collect()
    }

    /// Attribute value
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<String> {
        self.inner.borrow().attributes.get(name).cloned()
    }

    /// Native property value
    #[must_use]
    pub fn property(&self, name: &str) -> Option<Value> {
        self.inner.borrow().properties.get(name).cloned()
    }

    /// Snapshot of native properties
    #[must_use]
    pub fn properties(&self) -> Value {
        Value::Object(self.inner.borrow().properties.clone())
    }

    /// Own text plus the text of visible descendants, whitespace-collapsed
    #[must_use]
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        self.collect_text(&mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    /// Attached component instance
    #[must_use]
    pub fn component(&self) -> Option<Instance> {
        self.inner.borrow().component.clone()
    }

    /// Whether the element is shown
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.inner.borrow().visible
    }

    /// Visible children
    #[must_use]
    pub fn children(&self) -> Vec<Element> {
        self.inner
            .borrow()
            .children
            .iter()
            .filter(|c| c.is_visible())
            .cloned()
            .collect()
    }

    // === Events ===

    /// Dispatch an event to every listener registered for it
    pub fn trigger_event(&self, event: &str, args: &[Value]) -> AfirmarResult<()> {
        let listeners: Vec<Listener> = self
            .inner
            .borrow()
            .listeners
            .iter()
            .filter(|(name, _)| name == event)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in listeners {
            let _ = listener.invoke(args)?;
        }
        Ok(())
    }

    // === Queries ===

    /// First visible descendant matching the query
    #[must_use]
    pub fn get(&self, query: &Query) -> Option<Element> {
        select(self, query, false).into_iter().next()
    }

    /// Every visible descendant matching the query, in document order
    #[must_use]
    pub fn get_all(&self, query: &Query) -> Vec<Element> {
        select(self, query, false)
    }

    // === Change propagation ===

    pub(crate) fn bindings(&self) -> Vec<Binding> {
        self.inner.borrow().bindings.clone()
    }

    pub(crate) fn apply_binding(&self, kind: &BindingKind, value: Value) {
        match kind {
            BindingKind::Text => self.set_text(display(&value)),
            BindingKind::Class(class) => {
                if truthy(&value) {
                    self.add_class(class.clone());
                } else {
                    self.remove_class(class);
                }
            }
            BindingKind::Attribute(name) => {
                if value.is_null() {
                    self.remove_attribute(name);
                } else {
                    self.set_attribute(name.clone(), display(&value));
                }
            }
            BindingKind::Property(name) => self.set_property(name.clone(), value),
            BindingKind::Visible => self.set_visible(truthy(&value)),
        }
    }

    /// Instantiate or destroy a factory-built component to match visibility.
    /// Returns true when a new instance was created.
    pub(crate) fn sync_lifecycle(&self) -> bool {
        let (visible, factory, has_component) = {
            let node = self.inner.borrow();
            (node.visible, node.factory.clone(), node.component.is_some())
        };
        let Some(factory) = factory else {
            return false;
        };
        if visible && !has_component {
            let instance = factory(self);
            self.inner.borrow_mut().component = Some(instance);
            true
        } else if !visible && has_component {
            let mut node = self.inner.borrow_mut();
            node.component = None;
            node.children.clear();
            false
        } else {
            false
        }
    }

    pub(crate) fn all_children(&self) -> Vec<Element> {
        self.inner.borrow().children.clone()
    }

    fn collect_text(&self, out: &mut String) {
        let node = self.inner.borrow();
        out.push_str(&node.text);
        for child in node.children.iter().filter(|c| c.is_visible()) {
            out.push(' ');
            child.collect_text(out);
        }
    }
}

/// Text form of a bound value: strings unquoted, null empty
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// JS-style truthiness
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

// ============================================================================
// Queries
// ============================================================================

/// What to look for in the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Selector string
    Selector(Selector),
    /// Component type token
    Component(String),
    /// Union of queries, in document order
    AnyOf(Vec<Query>),
}

impl Query {
    /// Parse a selector query
    pub fn parse(selector: &str) -> AfirmarResult<Self> {
        Selector::parse(selector).map(Self::Selector)
    }

    /// Match elements carrying a component of this type
    #[must_use]
    pub fn component(type_name: impl Into<String>) -> Self {
        Self::Component(type_name.into())
    }

    /// Human-readable form, used in target labels
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Selector(s) => s.raw.clone(),
            Self::Component(t) => format!("<{t}>"),
            Self::AnyOf(list) => list
                .iter()
                .map(Self::describe)
                .collect::<Vec<_>>()
                .join(" | "),
        }
    }

    fn matches(&self, element: &Element, ancestors: &[Element]) -> bool {
        match self {
            Self::Selector(selector) => selector.matches(element, ancestors),
            Self::Component(token) => element
                .component()
                .is_some_and(|c| c.type_name() == token),
            Self::AnyOf(list) => list.iter().any(|q| q.matches(element, ancestors)),
        }
    }
}

/// Anything usable as a query
pub trait IntoQuery {
    /// Convert, parsing selector strings
    fn into_query(self) -> AfirmarResult<Query>;
}

impl IntoQuery for Query {
    fn into_query(self) -> AfirmarResult<Query> {
        Ok(self)
    }
}

impl IntoQuery for &str {
    fn into_query(self) -> AfirmarResult<Query> {
        Query::parse(self)
    }
}

impl IntoQuery for String {
    fn into_query(self) -> AfirmarResult<Query> {
        Query::parse(&self)
    }
}

impl IntoQuery for &[&str] {
    fn into_query(self) -> AfirmarResult<Query> {
        self.iter()
            .map(|s| Query::parse(s))
            .collect::<AfirmarResult<Vec<_>>>()
            .map(Query::AnyOf)
    }
}

impl<const N: usize> IntoQuery for [&str; N] {
    fn into_query(self) -> AfirmarResult<Query> {
        self.as_slice().into_query()
    }
}

impl IntoQuery for Vec<Query> {
    fn into_query(self) -> AfirmarResult<Query> {
        Ok(Query::AnyOf(self))
    }
}

/// Collect matches under `root` in document order, skipping hidden subtrees
pub(crate) fn select(root: &Element, query: &Query, include_root: bool) -> Vec<Element> {
    let mut out = Vec::new();
    if !root.is_visible() {
        return out;
    }
    let mut ancestors = Vec::new();
    if include_root && query.matches(root, &ancestors) {
        out.push(root.clone());
    }
    ancestors.push(root.clone());
    walk(root, query, &mut ancestors, &mut out);
    out
}

fn walk(node: &Element, query: &Query, ancestors: &mut Vec<Element>, out: &mut Vec<Element>) {
    for child in node.children() {
        if query.matches(&child, ancestors) {
            out.push(child.clone());
        }
        ancestors.push(child.clone());
        walk(&child, query, ancestors, out);
        let _ = ancestors.pop();
    }
}

// ============================================================================
// Selectors
// ============================================================================

/// One compound selector, e.g. `li.item[data-x=1]`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attributes: Vec<(String, Option<String>)>,
}

impl Compound {
    fn matches(&self, element: &Element) -> bool {
        let node = element.inner.borrow();
        self.tag.as_ref().map_or(true, |t| t == "*" || *t == node.tag)
            && self.id.as_ref().map_or(true, |id| node.id.as_ref() == Some(id))
            && self.classes.iter().all(|c| node.classes.contains(c))
            && self.attributes.iter().all(|(name, expected)| {
                match (node.attributes.get(name), expected) {
                    (Some(actual), Some(expected)) => actual == expected,
                    (Some(_), None) => true,
                    (None, _) => false,
                }
            })
    }
}

/// Parsed selector: compounds joined by descendant combinators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    raw: String,
    chain: Vec<Compound>,
}

impl Selector {
    /// Parse a selector string
    pub fn parse(input: &str) -> AfirmarResult<Self> {
        let chain = SelectorParser::new(input)
            .parse_chain()
            .map_err(|message| AfirmarError::InvalidSelector {
                selector: input.to_string(),
                message,
            })?;
        if chain.is_empty() {
            return Err(AfirmarError::InvalidSelector {
                selector: input.to_string(),
                message: "empty selector".into(),
            });
        }
        Ok(Self {
            raw: input.trim().to_string(),
            chain,
        })
    }

    /// Selector as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn matches(&self, element: &Element, ancestors: &[Element]) -> bool {
        let Some((last, rest)) = self.chain.split_last() else {
            return false;
        };
        if !last.matches(element) {
            return false;
        }
        // Greedy right-to-left walk over the ancestor chain
        let mut remaining = rest.iter().rev().peekable();
        for ancestor in ancestors.iter().rev() {
            match remaining.peek() {
                Some(compound) if compound.matches(ancestor) => {
                    let _ = remaining.next();
                }
                Some(_) => {}
                None => break,
            }
        }
        remaining.peek().is_none()
    }
}

struct SelectorParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> SelectorParser<'a> {
    const fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    /// Compounds separated by whitespace outside attribute brackets
    fn parse_chain(&mut self) -> Result<Vec<Compound>, String> {
        let mut chain = Vec::new();
        loop {
            while self.peek_char().is_some_and(char::is_whitespace) {
                self.advance();
            }
            if self.peek_char().is_none() {
                return Ok(chain);
            }
            chain.push(self.parse_compound()?);
        }
    }

    fn parse_compound(&mut self) -> Result<Compound, String> {
        let mut compound = Compound::default();
        if let Some(c) = self.peek_char() {
            if c == '*' {
                self.advance();
                compound.tag = Some("*".into());
            } else if is_ident_char(c) {
                compound.tag = Some(self.read_identifier()?);
            }
        }
        while let Some(c) = self.peek_char() {
            match c {
                '#' => {
                    self.advance();
                    compound.id = Some(self.read_identifier()?);
                }
                '.' => {
                    self.advance();
                    compound.classes.push(self.read_identifier()?);
                }
                '[' => {
                    self.advance();
                    compound.attributes.push(self.read_attribute()?);
                }
                c if c.is_whitespace() => break,
                other => return Err(format!("unexpected '{other}' at {}", self.pos)),
            }
        }
        Ok(compound)
    }

    fn read_attribute(&mut self) -> Result<(String, Option<String>), String> {
        let name = self.read_identifier()?;
        match self.peek_char() {
            Some(']') => {
                self.advance();
                Ok((name, None))
            }
            Some('=') => {
                self.advance();
                let quote = self.peek_char().filter(|c| *c == '\'' || *c == '"');
                if quote.is_some() {
                    self.advance();
                }
                let start = self.pos;
                while let Some(c) = self.peek_char() {
                    if Some(c) == quote || (quote.is_none() && c == ']') {
                        break;
                    }
                    self.advance();
                }
                let value = self.input[start..self.pos].to_string();
                if quote.is_some() {
                    if self.peek_char() != quote {
                        return Err("unclosed quote".into());
                    }
                    self.advance();
                }
                if self.peek_char() != Some(']') {
                    return Err("unclosed attribute".into());
                }
                self.advance();
                Ok((name, Some(value)))
            }
            _ => Err("unclosed attribute".into()),
        }
    }

    fn read_identifier(&mut self) -> Result<String, String> {
        let start = self.pos;
        while let Some(c) = self.peek_char() {
            if is_ident_char(c) {
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(format!("expected identifier at {}", self.pos));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(c) = self.peek_char() {
            self.pos += c.len_utf8();
        }
    }
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_'
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn list() -> Element {
        Element::new("ul").with_id("menu").with_children([
            Element::new("li").with_class("item").with_text("One"),
            Element::new("li")
                .with_class("item")
                .with_class("active")
                .with_attr("data-x", "1")
                .with_text("Two"),
            Element::new("li")
                .with_class("item")
                .with_child(Element::new("span").with_class("badge").with_text("3")),
        ])
    }

    mod selector_tests {
        use super::*;

        #[test]
        fn test_parse_compound() {
            let s = Selector::parse("li.item.active[data-x='1']").unwrap();
            assert_eq!(s.chain.len(), 1);
            assert_eq!(s.chain[0].tag.as_deref(), Some("li"));
            assert_eq!(s.chain[0].classes, vec!["item", "active"]);
            assert_eq!(
                s.chain[0].attributes,
                vec![("data-x".to_string(), Some("1".to_string()))]
            );
        }

        #[test]
        fn test_parse_descendant_chain() {
            let s = Selector::parse("ul  .item span").unwrap();
            assert_eq!(s.chain.len(), 3);
            assert_eq!(s.as_str(), "ul  .item span");
        }

        #[test]
        fn test_quoted_attribute_value_keeps_spaces() {
            let s = Selector::parse("section [title='a b'] span").unwrap();
            assert_eq!(s.chain.len(), 3);
            assert_eq!(
                s.chain[1].attributes,
                vec![("title".to_string(), Some("a b".to_string()))]
            );

            let root = Element::new("div")
                .with_child(Element::new("p").with_attr("title", "a b").with_text("match"))
                .with_child(Element::new("p").with_attr("title", "a").with_text("other"));
            let query = Query::parse("[title=\"a b\"]").unwrap();
            let found = root.get_all(&query);
            assert_eq!(found.len(), 1);
            assert_eq!(found[0].text_content(), "match");
        }

        #[test]
        fn test_parse_errors() {
            assert!(Selector::parse("").is_err());
            assert!(Selector::parse("li..x").is_err());
            assert!(Selector::parse("[data-x='1'").is_err());
            assert!(Selector::parse("li>a").is_err());
        }

        #[test]
        fn test_invalid_selector_error_names_input() {
            let err = Query::parse("li..x").unwrap_err();
            assert!(matches!(err, AfirmarError::InvalidSelector { ref selector, .. } if selector == "li..x"));
        }
    }

    mod query_tests {
        use super::*;

        #[test]
        fn test_get_all_in_document_order() {
            let root = list();
            let items = root.get_all(&Query::parse(".item").unwrap());
            assert_eq!(items.len(), 3);
            assert_eq!(items[1].text_content(), "Two");
        }

        #[test]
        fn test_attribute_presence_and_value() {
            let root = list();
            assert_eq!(root.get_all(&Query::parse("[data-x]").unwrap()).len(), 1);
            assert_eq!(root.get_all(&Query::parse("[data-x=2]").unwrap()).len(), 0);
        }

        #[test]
        fn test_descendant_combinator() {
            let root = Element::new("div").with_child(list());
            assert_eq!(root.get_all(&Query::parse("ul span").unwrap()).len(), 1);
            assert_eq!(root.get_all(&Query::parse("ol span").unwrap()).len(), 0);
            assert_eq!(root.get_all(&Query::parse("#menu .item .badge").unwrap()).len(), 1);
        }

        #[test]
        fn test_hidden_subtree_is_invisible() {
            let root = list();
            let items = root.get_all(&Query::parse(".item").unwrap());
            items[2].set_visible(false);
            assert_eq!(root.get_all(&Query::parse(".item").unwrap()).len(), 2);
            assert!(root.get(&Query::parse(".badge").unwrap()).is_none());
            assert_eq!(root.text_content(), "One Two");
        }

        #[test]
        fn test_any_of_is_union_in_document_order() {
            let root = list();
            let q = ["span", ".active"].into_query().unwrap();
            let found = root.get_all(&q);
            assert_eq!(found.len(), 2);
            assert!(found[0].has_class("active"));
            assert_eq!(found[1].tag(), "span");
        }

        #[test]
        fn test_component_query() {
            let root = Element::new("main")
                .with_child(Element::new("app-dialog").with_component(Instance::new("Dialog")));
            let q = Query::component("Dialog");
            assert_eq!(root.get_all(&q).len(), 1);
            assert_eq!(q.describe(), "<Dialog>");
        }
    }

    mod binding_tests {
        use super::*;

        #[test]
        fn test_apply_binding_kinds() {
            let el = Element::new("button");
            el.apply_binding(&BindingKind::Text, json!("Save"));
            el.apply_binding(&BindingKind::Class("busy".into()), json!(true));
            el.apply_binding(&BindingKind::Attribute("aria-pressed".into()), json!(false));
            el.apply_binding(&BindingKind::Property("disabled".into()), json!(true));
            assert_eq!(el.text_content(), "Save");
            assert!(el.has_class("busy"));
            assert_eq!(el.attribute("aria-pressed").as_deref(), Some("false"));
            assert_eq!(el.property("disabled"), Some(json!(true)));

            el.apply_binding(&BindingKind::Class("busy".into()), json!(0));
            el.apply_binding(&BindingKind::Attribute("aria-pressed".into()), Value::Null);
            assert!(!el.has_class("busy"));
            assert_eq!(el.attribute("aria-pressed"), None);
        }

        #[test]
        fn test_truthiness() {
            assert!(!truthy(&json!(null)));
            assert!(!truthy(&json!("")));
            assert!(!truthy(&json!(0)));
            assert!(truthy(&json!("x")));
            assert!(truthy(&json!([])));
        }
    }

    mod event_tests {
        use super::*;

        #[test]
        fn test_trigger_event_calls_matching_listeners() {
            let host = Instance::new("Toggle")
                .with_state(json!({"on": false}))
                .with_method("flip", |this, _| {
                    let on = this.get("on").and_then(|v| v.as_bool()).unwrap_or(false);
                    this.set("on", json!(!on));
                    Value::Null
                });
            let button = Element::new("button")
                .on("click", Listener::method(&host, "flip"))
                .on("focus", Listener::callback(|_| Value::Null));
            button.trigger_event("click", &[]).unwrap();
            assert_eq!(host.get("on"), Some(json!(true)));
            button.trigger_event("keydown", &[]).unwrap();
            assert_eq!(host.get("on"), Some(json!(true)));
        }
    }
}
