//! The element model the directive binds to.
//!
//! Hosts implement [`Element`] for their own widgets. [`Node`] is a small
//! in-memory implementation used by the demo host and the tests.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identity of an element, used in logs and by hosts to tell elements apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ElementId(Uuid);

impl ElementId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ElementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Scroll geometry of a container, in pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_height: f64,
    pub client_height: f64,
}

impl ScrollMetrics {
    pub fn new(scroll_top: f64, scroll_height: f64, client_height: f64) -> Self {
        Self {
            scroll_top,
            scroll_height,
            client_height,
        }
    }

    /// Furthest `scroll_top` the container can reach. Zero or negative when
    /// the content does not overflow.
    pub fn max_scroll(&self) -> f64 {
        self.scroll_height - self.client_height
    }

    /// Whether the container is within `threshold` pixels of its maximum scroll.
    pub fn is_near_bottom(&self, threshold: f64) -> bool {
        self.scroll_top >= self.max_scroll() - threshold
    }
}

/// A scroll notification delivered to listeners.
#[derive(Clone)]
pub struct ScrollEvent {
    /// The element that scrolled.
    pub target: Arc<dyn Element>,
}

impl fmt::Debug for ScrollEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollEvent")
            .field("target", &self.target.id())
            .finish()
    }
}

pub type ScrollListener = Arc<dyn Fn(ScrollEvent) + Send + Sync>;

/// The subset of a UI element the infinite-scroll directive needs.
pub trait Element: Send + Sync {
    fn id(&self) -> ElementId;

    /// Current scroll geometry.
    fn metrics(&self) -> ScrollMetrics;

    /// First descendant matching `selector`, if any.
    fn query_selector(&self, selector: &str) -> Option<Arc<dyn Element>>;

    /// Register a listener for scroll events on this element.
    fn add_scroll_listener(&self, listener: ScrollListener);

    /// Flag this element as carrying the infinite-scroll listener.
    ///
    /// Returns `false` if the flag was already set. The flag is never cleared.
    fn mark_scroll_attached(&self) -> bool;

    /// Whether [`Element::mark_scroll_attached`] has been called.
    fn is_scroll_attached(&self) -> bool;
}

/// In-memory element tree node.
pub struct Node {
    id: ElementId,
    tag: String,
    dom_id: Option<String>,
    classes: Vec<String>,
    metrics: RwLock<ScrollMetrics>,
    children: RwLock<Vec<Arc<Node>>>,
    listeners: Mutex<Vec<ScrollListener>>,
    scroll_attached: AtomicBool,
    this: Weak<Node>,
}

/// Builder for [`Node`].
#[derive(Debug, Default)]
pub struct NodeBuilder {
    tag: String,
    dom_id: Option<String>,
    classes: Vec<String>,
    metrics: ScrollMetrics,
}

impl NodeBuilder {
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.dom_id = Some(id.into());
        self
    }

    pub fn class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    pub fn metrics(mut self, metrics: ScrollMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn build(self) -> Arc<Node> {
        Arc::new_cyclic(|this| Node {
            id: ElementId::new(),
            tag: self.tag,
            dom_id: self.dom_id,
            classes: self.classes,
            metrics: RwLock::new(self.metrics),
            children: RwLock::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            scroll_attached: AtomicBool::new(false),
            this: this.clone(),
        })
    }
}

impl Node {
    pub fn builder(tag: impl Into<String>) -> NodeBuilder {
        NodeBuilder {
            tag: tag.into(),
            ..NodeBuilder::default()
        }
    }

    pub fn append_child(&self, child: Arc<Node>) {
        self.children.write().push(child);
    }

    pub fn set_metrics(&self, metrics: ScrollMetrics) {
        *self.metrics.write() = metrics;
    }

    /// Move the scroll position, leaving the geometry untouched.
    pub fn scroll_to(&self, scroll_top: f64) {
        self.metrics.write().scroll_top = scroll_top;
    }

    /// Grow the scrollable content, as when a new page of items is appended.
    pub fn extend_content(&self, by: f64) {
        self.metrics.write().scroll_height += by;
    }

    /// Deliver a scroll event to every listener registered on this node.
    pub fn dispatch_scroll(&self) {
        let Some(this) = self.this.upgrade() else {
            return;
        };
        let target: Arc<dyn Element> = this;
        let listeners = self.listeners.lock().clone();
        for listener in listeners {
            listener(ScrollEvent {
                target: Arc::clone(&target),
            });
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn matches(&self, selector: &str) -> bool {
        if let Some(id) = selector.strip_prefix('#') {
            self.dom_id.as_deref() == Some(id)
        } else if let Some(class) = selector.strip_prefix('.') {
            self.classes.iter().any(|c| c == class)
        } else {
            self.tag.eq_ignore_ascii_case(selector)
        }
    }

    fn find_descendant(&self, selector: &str) -> Option<Arc<Node>> {
        let children = self.children.read();
        for child in children.iter() {
            if child.matches(selector) {
                return Some(Arc::clone(child));
            }
            if let Some(found) = child.find_descendant(selector) {
                return Some(found);
            }
        }
        None
    }
}

impl Element for Node {
    fn id(&self) -> ElementId {
        self.id
    }

    fn metrics(&self) -> ScrollMetrics {
        *self.metrics.read()
    }

    fn query_selector(&self, selector: &str) -> Option<Arc<dyn Element>> {
        let selector = selector.trim();
        if selector.is_empty() {
            return None;
        }
        self.find_descendant(selector)
            .map(|node| node as Arc<dyn Element>)
    }

    fn add_scroll_listener(&self, listener: ScrollListener) {
        self.listeners.lock().push(listener);
    }

    fn mark_scroll_attached(&self) -> bool {
        !self.scroll_attached.swap(true, Ordering::SeqCst)
    }

    fn is_scroll_attached(&self) -> bool {
        self.scroll_attached.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("tag", &self.tag)
            .field("dom_id", &self.dom_id)
            .field("classes", &self.classes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn tree() -> (Arc<Node>, Arc<Node>, Arc<Node>) {
        let root = Node::builder("section").id("page").build();
        let wrapper = Node::builder("div").class("table-wrapper").build();
        let body = Node::builder("tbody").id("rows").class("scroll-body").build();
        wrapper.append_child(Arc::clone(&body));
        root.append_child(Arc::clone(&wrapper));
        (root, wrapper, body)
    }

    #[test]
    fn test_max_scroll_and_threshold() {
        let metrics = ScrollMetrics::new(499.0, 1000.0, 400.0);
        assert_eq!(metrics.max_scroll(), 600.0);
        assert!(!metrics.is_near_bottom(100.0));

        let metrics = ScrollMetrics::new(500.0, 1000.0, 400.0);
        assert!(metrics.is_near_bottom(100.0));
    }

    #[test]
    fn test_no_overflow_is_always_near_bottom() {
        let metrics = ScrollMetrics::new(0.0, 400.0, 600.0);
        assert!(metrics.max_scroll() < 0.0);
        assert!(metrics.is_near_bottom(0.0));
        assert!(metrics.is_near_bottom(100.0));
    }

    #[test]
    fn test_query_selector_by_id_class_and_tag() {
        let (root, wrapper, body) = tree();

        assert_eq!(root.query_selector("#rows").map(|e| e.id()), Some(body.id()));
        assert_eq!(
            root.query_selector(".table-wrapper").map(|e| e.id()),
            Some(wrapper.id())
        );
        assert_eq!(root.query_selector("TBODY").map(|e| e.id()), Some(body.id()));
    }

    #[test]
    fn test_query_selector_excludes_self_and_misses() {
        let (root, _, _) = tree();

        assert!(root.query_selector("#page").is_none());
        assert!(root.query_selector(".missing").is_none());
        assert!(root.query_selector("   ").is_none());
    }

    #[test]
    fn test_dispatch_reaches_every_listener() {
        let node = Node::builder("div")
            .metrics(ScrollMetrics::new(10.0, 300.0, 100.0))
            .build();
        let seen = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let seen = Arc::clone(&seen);
            node.add_scroll_listener(Arc::new(move |event: ScrollEvent| {
                assert_eq!(event.target.metrics().scroll_top, 10.0);
                seen.fetch_add(1, Ordering::SeqCst);
            }));
        }
        node.dispatch_scroll();

        assert_eq!(node.listener_count(), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_scroll_attached_flag_is_set_once() {
        let node = Node::builder("div").build();

        assert!(!node.is_scroll_attached());
        assert!(node.mark_scroll_attached());
        assert!(!node.mark_scroll_attached());
        assert!(node.is_scroll_attached());
    }

    #[test]
    fn test_scroll_and_extend_content() {
        let node = Node::builder("div")
            .metrics(ScrollMetrics::new(0.0, 1000.0, 400.0))
            .build();

        node.scroll_to(550.0);
        node.extend_content(500.0);

        assert_eq!(node.metrics(), ScrollMetrics::new(550.0, 1500.0, 400.0));
    }
}
