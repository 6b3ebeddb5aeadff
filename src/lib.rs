//! Deterministic harness for in-page anchor smooth scrolling.
//!
//! The crate hosts a tiny DOM built from an HTML string, dispatches click
//! events through capture/target/bubble phases, and ships one delegated
//! document-level handler: clicks landing inside an `a[href^="#"]` anchor
//! suppress native navigation and record a smooth scroll request for the
//! element the fragment resolves to. Scroll requests are recorded, never
//! performed; tests observe them through [`Harness::scroll_requests`] and
//! the `assert_*` helpers.

use std::collections::{HashMap, HashSet};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

mod html;
mod selector;


use selector::{SelectorCombinator, SelectorPart, SelectorStep, parse_selector_groups};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    HtmlParse(String),
    SelectorNotFound(String),
    UnsupportedSelector(String),
    Harness(String),
    AssertionFailed {
        selector: String,
        expected: String,
        actual: String,
        dom_snippet: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HtmlParse(msg) => write!(f, "html parse error: {msg}"),
            Self::SelectorNotFound(selector) => write!(f, "selector not found: {selector}"),
            Self::UnsupportedSelector(selector) => write!(f, "unsupported selector: {selector}"),
            Self::Harness(msg) => write!(f, "harness error: {msg}"),
            Self::AssertionFailed {
                selector,
                expected,
                actual,
                dom_snippet,
            } => write!(
                f,
                "assertion failed for {selector}: expected {expected}, actual {actual}, snippet {dom_snippet}"
            ),
        }
    }
}

impl StdError for Error {}

/// Opaque handle to a node in the harness DOM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
enum NodeType {
    Document,
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    node_type: NodeType,
}

#[derive(Debug, Clone)]
struct Element {
    tag_name: String,
    attrs: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct Dom {
    nodes: Vec<Node>,
    root: NodeId,
    id_index: HashMap<String, NodeId>,
}

impl Dom {
    fn new() -> Self {
        let root = Node {
            parent: None,
            children: Vec::new(),
            node_type: NodeType::Document,
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            id_index: HashMap::new(),
        }
    }

    fn create_node(&mut self, parent: Option<NodeId>, node_type: NodeType) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            node_type,
        });
        if let Some(parent_id) = parent {
            self.nodes[parent_id.0].children.push(id);
        }
        id
    }

    fn create_element(
        &mut self,
        parent: NodeId,
        tag_name: String,
        attrs: HashMap<String, String>,
    ) -> NodeId {
        let id_attr = attrs.get("id").filter(|id| !id.is_empty()).cloned();
        let node = self.create_node(Some(parent), NodeType::Element(Element { tag_name, attrs }));
        if let Some(id) = id_attr {
            // First element in document order wins, as in a browser.
            self.id_index.entry(id).or_insert(node);
        }
        node
    }

    fn create_text(&mut self, parent: NodeId, text: String) -> NodeId {
        self.create_node(Some(parent), NodeType::Text(text))
    }

    fn parent(&self, node_id: NodeId) -> Option<NodeId> {
        self.nodes[node_id.0].parent
    }

    fn element(&self, node_id: NodeId) -> Option<&Element> {
        match &self.nodes[node_id.0].node_type {
            NodeType::Element(element) => Some(element),
            NodeType::Document | NodeType::Text(_) => None,
        }
    }

    fn tag_name(&self, node_id: NodeId) -> Option<&str> {
        self.element(node_id).map(|e| e.tag_name.as_str())
    }

    fn attr(&self, node_id: NodeId, name: &str) -> Option<&str> {
        self.element(node_id)
            .and_then(|e| e.attrs.get(name))
            .map(String::as_str)
    }

    fn by_id(&self, id: &str) -> Option<NodeId> {
        self.id_index.get(id).copied()
    }

    fn text_content(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document | NodeType::Element(_) => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    let text = stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
                        self.text_content(*child)
                    });
                    out.push_str(&text);
                }
                out
            }
            NodeType::Text(text) => text.clone(),
        }
    }

    fn set_text_content(&mut self, node_id: NodeId, value: &str) -> Result<()> {
        if self.element(node_id).is_none() {
            return Err(Error::Harness("text target is not an element".into()));
        }
        self.nodes[node_id.0].children.clear();
        if !value.is_empty() {
            self.create_text(node_id, value.to_string());
        }
        Ok(())
    }

    fn collect_elements_dfs(&self, node_id: NodeId, out: &mut Vec<NodeId>) {
        if matches!(self.nodes[node_id.0].node_type, NodeType::Element(_)) {
            out.push(node_id);
        }
        for child in &self.nodes[node_id.0].children {
            stacker::maybe_grow(32 * 1024, 1024 * 1024, || {
                self.collect_elements_dfs(*child, out)
            });
        }
    }

    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        let all = self.query_selector_all(selector)?;
        Ok(all.into_iter().next())
    }

    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>> {
        let groups = parse_selector_groups(selector)?;

        let mut ids = Vec::new();
        self.collect_elements_dfs(self.root, &mut ids);

        let mut seen = HashSet::new();
        let mut matched = Vec::new();
        for candidate in ids {
            if groups
                .iter()
                .any(|parts| self.matches_selector_chain(candidate, parts))
                && seen.insert(candidate)
            {
                matched.push(candidate);
            }
        }
        Ok(matched)
    }

    fn matches_selector(&self, node_id: NodeId, selector: &str) -> Result<bool> {
        if self.element(node_id).is_none() {
            return Ok(false);
        }
        let groups = parse_selector_groups(selector)?;
        Ok(groups
            .iter()
            .any(|parts| self.matches_selector_chain(node_id, parts)))
    }

    fn closest(&self, node_id: NodeId, selector: &str) -> Result<Option<NodeId>> {
        let groups = parse_selector_groups(selector)?;
        let mut cursor = Some(node_id);
        while let Some(current) = cursor {
            if self.element(current).is_some()
                && groups
                    .iter()
                    .any(|parts| self.matches_selector_chain(current, parts))
            {
                return Ok(Some(current));
            }
            cursor = self.parent(current);
        }
        Ok(None)
    }

    fn matches_selector_chain(&self, node_id: NodeId, parts: &[SelectorPart]) -> bool {
        let Some((last, rest)) = parts.split_last() else {
            return false;
        };
        if !self.matches_step(node_id, &last.step) {
            return false;
        }
        if rest.is_empty() {
            return true;
        }

        match last.combinator {
            Some(SelectorCombinator::Child) => match self.parent(node_id) {
                Some(parent) => self.matches_selector_chain(parent, rest),
                None => false,
            },
            Some(SelectorCombinator::Descendant) | None => {
                let mut cursor = self.parent(node_id);
                while let Some(ancestor) = cursor {
                    if self.matches_selector_chain(ancestor, rest) {
                        return true;
                    }
                    cursor = self.parent(ancestor);
                }
                false
            }
        }
    }

    fn matches_step(&self, node_id: NodeId, step: &SelectorStep) -> bool {
        let Some(element) = self.element(node_id) else {
            return false;
        };
        if let Some(tag) = &step.tag {
            if !element.tag_name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if let Some(id) = &step.id {
            if element.attrs.get("id").map(String::as_str) != Some(id.as_str()) {
                return false;
            }
        }
        step.classes.iter().all(|class| has_class(element, class))
            && step.attrs.iter().all(|cond| cond.matches(&element.attrs))
    }

    fn node_label(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => "#document".to_string(),
            NodeType::Text(_) => "#text".to_string(),
            NodeType::Element(element) => match element.attrs.get("id") {
                Some(id) if !id.is_empty() => format!("{}#{}", element.tag_name, id),
                _ => element.tag_name.clone(),
            },
        }
    }

    fn dump_node(&self, node_id: NodeId) -> String {
        match &self.nodes[node_id.0].node_type {
            NodeType::Document => {
                let mut out = String::new();
                for child in &self.nodes[node_id.0].children {
                    out.push_str(&self.dump_node(*child));
                }
                out
            }
            NodeType::Text(text) => text.clone(),
            NodeType::Element(element) => {
                let mut out = String::new();
                out.push('<');
                out.push_str(&element.tag_name);
                let mut attrs: Vec<_> = element.attrs.iter().collect();
                attrs.sort();
                for (k, v) in attrs {
                    out.push(' ');
                    out.push_str(k);
                    out.push_str("=\"");
                    out.push_str(v);
                    out.push('"');
                }
                out.push('>');
                for child in &self.nodes[node_id.0].children {
                    let rendered =
                        stacker::maybe_grow(32 * 1024, 1024 * 1024, || self.dump_node(*child));
                    out.push_str(&rendered);
                }
                out.push_str("</");
                out.push_str(&element.tag_name);
                out.push('>');
                out
            }
        }
    }
}

fn has_class(element: &Element, class_name: &str) -> bool {
    element
        .attrs
        .get("class")
        .map(|classes| classes.split_whitespace().any(|c| c == class_name))
        .unwrap_or(false)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Token returned by listener registration; the only way to remove a
/// native listener, since closures have no notion of equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type ListenerFn = dyn for<'a> Fn(&mut EventTurn<'a>);

#[derive(Clone)]
struct Listener {
    id: ListenerId,
    capture: bool,
    handler: Rc<ListenerFn>,
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("capture", &self.capture)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct ListenerStore {
    map: HashMap<NodeId, HashMap<String, Vec<Listener>>>,
}

impl ListenerStore {
    fn add(&mut self, node_id: NodeId, event: String, listener: Listener) {
        self.map
            .entry(node_id)
            .or_default()
            .entry(event)
            .or_default()
            .push(listener);
    }

    fn remove(&mut self, id: ListenerId) -> bool {
        for events in self.map.values_mut() {
            for listeners in events.values_mut() {
                if let Some(pos) = listeners.iter().position(|listener| listener.id == id) {
                    listeners.remove(pos);
                    return true;
                }
            }
        }
        false
    }

    fn get(&self, node_id: NodeId, event: &str, capture: bool) -> Vec<Listener> {
        self.map
            .get(&node_id)
            .and_then(|events| events.get(event))
            .map(|listeners| {
                listeners
                    .iter()
                    .filter(|listener| listener.capture == capture)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
struct EventState {
    event_type: String,
    target: NodeId,
    current_target: NodeId,
    default_prevented: bool,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl EventState {
    fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            default_prevented: false,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }
}

/// How a recorded scroll request was asked to behave.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollBehavior {
    /// Animated transition, as requested by the delegated anchor handler.
    Smooth,
    /// Instant jump, as performed by the native fragment default action.
    Auto,
}

impl fmt::Display for ScrollBehavior {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smooth => write!(f, "smooth"),
            Self::Auto => write!(f, "auto"),
        }
    }
}

/// One fire-and-forget "bring element into view" request, recorded in
/// arrival order and never coalesced. `target` is a label such as
/// `div#sec2`, resolved at record time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrollRequest {
    pub target: String,
    pub behavior: ScrollBehavior,
}

enum DeferredAction {
    SetText(NodeId, String),
    ScrollIntoView(NodeId, ScrollBehavior),
}

/// The view a listener gets of one event dispatch: read-only DOM queries,
/// event controls, and deferred side effects the harness applies after the
/// listener returns.
pub struct EventTurn<'a> {
    dom: &'a Dom,
    event: &'a mut EventState,
    actions: &'a mut Vec<DeferredAction>,
}

impl EventTurn<'_> {
    pub fn event_type(&self) -> &str {
        &self.event.event_type
    }

    pub fn target(&self) -> NodeId {
        self.event.target
    }

    pub fn current_target(&self) -> NodeId {
        self.event.current_target
    }

    pub fn default_prevented(&self) -> bool {
        self.event.default_prevented
    }

    pub fn prevent_default(&mut self) {
        self.event.default_prevented = true;
    }

    pub fn stop_propagation(&mut self) {
        self.event.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.event.propagation_stopped = true;
        self.event.immediate_propagation_stopped = true;
    }

    pub fn tag_name(&self, node: NodeId) -> Option<&str> {
        self.dom.tag_name(node)
    }

    pub fn attr(&self, node: NodeId, name: &str) -> Option<&str> {
        self.dom.attr(node, name)
    }

    /// Inclusive ancestor search, as `Element.closest`.
    pub fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>> {
        self.dom.closest(node, selector)
    }

    /// Fresh document-wide lookup; nothing is cached between events.
    pub fn query_selector(&self, selector: &str) -> Result<Option<NodeId>> {
        self.dom.query_selector(selector)
    }

    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool> {
        self.dom.matches_selector(node, selector)
    }

    /// Replace the element's children with a single text node once the
    /// listener returns.
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        self.actions
            .push(DeferredAction::SetText(node, text.to_string()));
    }

    /// Request that `node` be brought into view. The harness records the
    /// request; completion is outside the listener's observation.
    pub fn scroll_into_view(&mut self, node: NodeId, behavior: ScrollBehavior) {
        self.actions
            .push(DeferredAction::ScrollIntoView(node, behavior));
    }
}

const FRAGMENT_ANCHOR_SELECTOR: &str = "a[href^=\"#\"]";

/// The delegated document-level click handler: find the nearest fragment
/// anchor around the click target, look its href up as a selector, and on a
/// hit suppress native navigation and ask for a smooth scroll. Every miss,
/// including an href the selector parser rejects, falls through silently so
/// the native fragment jump still runs.
fn scroll_link_click(turn: &mut EventTurn<'_>) {
    let Ok(Some(anchor)) = turn.closest(turn.target(), FRAGMENT_ANCHOR_SELECTOR) else {
        return;
    };
    let Some(href) = turn.attr(anchor, "href") else {
        return;
    };
    let Ok(Some(found)) = turn.query_selector(href) else {
        return;
    };
    turn.prevent_default();
    turn.scroll_into_view(found, ScrollBehavior::Smooth);
}

#[derive(Debug)]
pub struct Harness {
    dom: Dom,
    listeners: ListenerStore,
    next_listener_id: u64,
    anchor_scroll_listener: Option<ListenerId>,
    scroll_requests: Vec<ScrollRequest>,
    location_hash: String,
    trace: bool,
    trace_logs: Vec<String>,
    trace_log_limit: usize,
    trace_to_stderr: bool,
}

impl Harness {
    pub fn from_html(html: &str) -> Result<Self> {
        let dom = html::parse_html(html)?;
        Ok(Self {
            dom,
            listeners: ListenerStore::default(),
            next_listener_id: 1,
            anchor_scroll_listener: None,
            scroll_requests: Vec::new(),
            location_hash: String::new(),
            trace: false,
            trace_logs: Vec::new(),
            trace_log_limit: 10_000,
            trace_to_stderr: true,
        })
    }

    pub fn enable_trace(&mut self, enabled: bool) {
        self.trace = enabled;
    }

    pub fn take_trace_logs(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace_logs)
    }

    pub fn set_trace_stderr(&mut self, enabled: bool) {
        self.trace_to_stderr = enabled;
    }

    pub fn set_trace_log_limit(&mut self, max_entries: usize) -> Result<()> {
        if max_entries == 0 {
            return Err(Error::Harness(
                "set_trace_log_limit requires at least 1 entry".into(),
            ));
        }
        self.trace_log_limit = max_entries;
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
        Ok(())
    }

    /// Register the delegated anchor-scroll click handler on the document.
    /// Registered once for the harness lifetime; calling again is a no-op
    /// returning the original id.
    pub fn enable_anchor_scrolling(&mut self) -> ListenerId {
        if let Some(id) = self.anchor_scroll_listener {
            return id;
        }
        let id = self.add_document_listener("click", false, scroll_link_click);
        self.anchor_scroll_listener = Some(id);
        id
    }

    /// Attach a listener to the element matched by `selector`.
    pub fn add_listener<F>(
        &mut self,
        selector: &str,
        event_type: &str,
        capture: bool,
        handler: F,
    ) -> Result<ListenerId>
    where
        F: for<'a> Fn(&mut EventTurn<'a>) + 'static,
    {
        let node = self.select_one(selector)?;
        Ok(self.register_listener(node, event_type, capture, Rc::new(handler)))
    }

    /// Attach a listener to the document node itself (event delegation).
    pub fn add_document_listener<F>(&mut self, event_type: &str, capture: bool, handler: F) -> ListenerId
    where
        F: for<'a> Fn(&mut EventTurn<'a>) + 'static,
    {
        let root = self.dom.root;
        self.register_listener(root, event_type, capture, Rc::new(handler))
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        if self.anchor_scroll_listener == Some(id) {
            self.anchor_scroll_listener = None;
        }
        self.listeners.remove(id)
    }

    fn register_listener(
        &mut self,
        node: NodeId,
        event_type: &str,
        capture: bool,
        handler: Rc<ListenerFn>,
    ) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.add(
            node,
            event_type.to_string(),
            Listener {
                id,
                capture,
                handler,
            },
        );
        id
    }

    /// Click the element matched by `selector`: dispatch the event, then run
    /// the native fragment-anchor default action unless a listener called
    /// `prevent_default`.
    pub fn click(&mut self, selector: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let outcome = self.dispatch_event(target, "click")?;
        if outcome.default_prevented {
            return Ok(());
        }
        self.run_fragment_default(target)
    }

    /// Dispatch an arbitrary event with no default action attached.
    pub fn dispatch(&mut self, selector: &str, event: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        self.dispatch_event(target, event)?;
        Ok(())
    }

    /// Scroll requests recorded so far, oldest first.
    pub fn scroll_requests(&self) -> &[ScrollRequest] {
        &self.scroll_requests
    }

    pub fn take_scroll_requests(&mut self) -> Vec<ScrollRequest> {
        std::mem::take(&mut self.scroll_requests)
    }

    /// Current fragment portion of the location, e.g. `#sec2`, or empty if
    /// no native fragment jump has run.
    pub fn location_hash(&self) -> &str {
        &self.location_hash
    }

    pub fn assert_text(&self, selector: &str, expected: &str) -> Result<()> {
        let target = self.select_one(selector)?;
        let actual = self.dom.text_content(target);
        if actual != expected {
            return Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: expected.to_string(),
                actual,
                dom_snippet: self.node_snippet(target),
            });
        }
        Ok(())
    }

    pub fn assert_exists(&self, selector: &str) -> Result<()> {
        let _ = self.select_one(selector)?;
        Ok(())
    }

    pub fn assert_hash(&self, expected: &str) -> Result<()> {
        if self.location_hash != expected {
            return Err(Error::AssertionFailed {
                selector: "location hash".to_string(),
                expected: expected.to_string(),
                actual: self.location_hash.clone(),
                dom_snippet: String::new(),
            });
        }
        Ok(())
    }

    pub fn assert_scroll_count(&self, expected: usize) -> Result<()> {
        if self.scroll_requests.len() != expected {
            return Err(Error::AssertionFailed {
                selector: "scroll requests".to_string(),
                expected: expected.to_string(),
                actual: self.scroll_requests.len().to_string(),
                dom_snippet: format!("{:?}", self.scroll_requests),
            });
        }
        Ok(())
    }

    /// Assert the most recent scroll request targets the element matched by
    /// `selector` with the given behavior.
    pub fn assert_last_scroll(&self, selector: &str, behavior: ScrollBehavior) -> Result<()> {
        let target = self.select_one(selector)?;
        let expected = ScrollRequest {
            target: self.dom.node_label(target),
            behavior,
        };
        match self.scroll_requests.last() {
            Some(actual) if *actual == expected => Ok(()),
            other => Err(Error::AssertionFailed {
                selector: selector.to_string(),
                expected: format!("{expected:?}"),
                actual: format!("{other:?}"),
                dom_snippet: self.node_snippet(target),
            }),
        }
    }

    pub fn dump_dom(&self, selector: &str) -> Result<String> {
        let target = self.select_one(selector)?;
        Ok(self.dom.dump_node(target))
    }

    fn select_one(&self, selector: &str) -> Result<NodeId> {
        self.dom
            .query_selector(selector)?
            .ok_or_else(|| Error::SelectorNotFound(selector.to_string()))
    }

    fn node_snippet(&self, node_id: NodeId) -> String {
        truncate_chars(&self.dom.dump_node(node_id), 200)
    }

    fn dispatch_event(&mut self, target: NodeId, event_type: &str) -> Result<EventState> {
        let mut event = EventState::new(event_type, target);

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.dom.parent(node);
        }
        path.reverse();

        if path.is_empty() {
            self.trace_event_done(&event, "empty_path");
            return Ok(event);
        }

        // Capture phase.
        if path.len() >= 2 {
            for node in &path[..path.len() - 1] {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, true)?;
                if event.propagation_stopped {
                    self.trace_event_done(&event, "propagation_stopped");
                    return Ok(event);
                }
            }
        }

        // Target phase: capture listeners first.
        event.current_target = target;
        self.invoke_listeners(target, &mut event, true)?;
        if event.propagation_stopped {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        // Target phase: bubble listeners.
        self.invoke_listeners(target, &mut event, false)?;
        if event.propagation_stopped {
            self.trace_event_done(&event, "propagation_stopped");
            return Ok(event);
        }

        // Bubble phase.
        if path.len() >= 2 {
            for node in path[..path.len() - 1].iter().rev() {
                event.current_target = *node;
                self.invoke_listeners(*node, &mut event, false)?;
                if event.propagation_stopped {
                    self.trace_event_done(&event, "propagation_stopped");
                    return Ok(event);
                }
            }
        }

        self.trace_event_done(&event, "completed");
        Ok(event)
    }

    fn invoke_listeners(
        &mut self,
        node_id: NodeId,
        event: &mut EventState,
        capture: bool,
    ) -> Result<()> {
        let listeners = self.listeners.get(node_id, &event.event_type, capture);
        for listener in listeners {
            if self.trace {
                let phase = if capture { "capture" } else { "bubble" };
                let line = format!(
                    "[event] {} target={} current={} phase={} default_prevented={}",
                    event.event_type,
                    self.dom.node_label(event.target),
                    self.dom.node_label(node_id),
                    phase,
                    event.default_prevented
                );
                self.push_trace(line);
            }

            let mut actions = Vec::new();
            {
                let mut turn = EventTurn {
                    dom: &self.dom,
                    event: &mut *event,
                    actions: &mut actions,
                };
                (listener.handler)(&mut turn);
            }
            self.apply_actions(actions)?;

            if event.immediate_propagation_stopped {
                break;
            }
        }
        Ok(())
    }

    fn apply_actions(&mut self, actions: Vec<DeferredAction>) -> Result<()> {
        for action in actions {
            match action {
                DeferredAction::SetText(node, text) => {
                    self.dom.set_text_content(node, &text)?;
                }
                DeferredAction::ScrollIntoView(node, behavior) => {
                    self.record_scroll(node, behavior);
                }
            }
        }
        Ok(())
    }

    // Native default action for clicks landing inside a fragment anchor:
    // update the hash, and jump (instantly) if the bare fragment resolves
    // through the id index.
    fn run_fragment_default(&mut self, target: NodeId) -> Result<()> {
        let Some(anchor) = self.dom.closest(target, FRAGMENT_ANCHOR_SELECTOR)? else {
            return Ok(());
        };
        let Some(href) = self.dom.attr(anchor, "href") else {
            return Ok(());
        };
        let href = href.to_string();

        self.location_hash = href.clone();
        if self.trace {
            let line = format!("[nav] fragment jump {href}");
            self.push_trace(line);
        }

        let fragment = &href[1..];
        if !fragment.is_empty() {
            if let Some(node) = self.dom.by_id(fragment) {
                self.record_scroll(node, ScrollBehavior::Auto);
            }
        }
        Ok(())
    }

    fn record_scroll(&mut self, node: NodeId, behavior: ScrollBehavior) {
        let target = self.dom.node_label(node);
        if self.trace {
            let line = format!("[scroll] into_view target={target} behavior={behavior}");
            self.push_trace(line);
        }
        self.scroll_requests.push(ScrollRequest { target, behavior });
    }

    fn trace_event_done(&mut self, event: &EventState, outcome: &str) {
        if !self.trace {
            return;
        }
        let line = format!(
            "[event] done {} target={} outcome={} default_prevented={}",
            event.event_type,
            self.dom.node_label(event.target),
            outcome,
            event.default_prevented
        );
        self.push_trace(line);
    }

    fn push_trace(&mut self, line: String) {
        if self.trace_to_stderr {
            eprintln!("{line}");
        }
        self.trace_logs.push(line);
        while self.trace_logs.len() > self.trace_log_limit {
            self.trace_logs.remove(0);
        }
    }
}
