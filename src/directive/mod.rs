//! The infinite-scroll directive and the element model it binds to.

mod element;
mod infinite_scroll;

pub use element::{Element, ElementId, Node, NodeBuilder, ScrollEvent, ScrollListener, ScrollMetrics};
pub use infinite_scroll::{Binding, Callback, InfiniteScroll, ScrollOptions};
