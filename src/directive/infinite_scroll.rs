//! Infinite-scroll directive: call back when a container nears its bottom.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::element::{Element, ScrollEvent, ScrollListener};
use crate::config::ScrollDefaults;
use crate::error::Result;
use crate::timing::{millis, Debounced};

/// Callback invoked when a bound container nears its bottom.
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Options recognised in a binding value. Unset fields fall back to the
/// directive's [`ScrollDefaults`].
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ScrollOptions {
    /// Called when the container is near its bottom
    #[serde(skip)]
    pub func: Option<Callback>,

    /// Selector of a descendant to watch instead of the bound element
    #[serde(default)]
    pub target: Option<String>,

    /// Quiet period of the debounced scroll handler, in milliseconds
    #[serde(default, rename = "delay", alias = "delay_ms")]
    pub delay_ms: Option<u64>,

    /// Distance from the bottom that counts as near, in pixels
    #[serde(default)]
    pub threshold: Option<f64>,
}

impl ScrollOptions {
    /// Set the near-bottom callback.
    pub fn func(mut self, func: impl Fn() + Send + Sync + 'static) -> Self {
        self.func = Some(Arc::new(func));
        self
    }

    /// Watch the first descendant matching `selector` instead of the bound element.
    pub fn target(mut self, selector: impl Into<String>) -> Self {
        self.target = Some(selector.into());
        self
    }

    /// Set the debounce delay of the scroll handler.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay_ms = Some(millis(delay));
        self
    }

    /// Set the near-bottom distance, in pixels.
    pub fn threshold(mut self, threshold: f64) -> Self {
        self.threshold = Some(threshold);
        self
    }
}

impl fmt::Debug for ScrollOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScrollOptions")
            .field("func", &self.func.is_some())
            .field("target", &self.target)
            .field("delay_ms", &self.delay_ms)
            .field("threshold", &self.threshold)
            .finish()
    }
}

/// The value a host passes when binding the directive to an element.
#[derive(Clone)]
pub struct Binding {
    /// Fallback callback, used when the options carry no `func`
    value: Callback,
    options: ScrollOptions,
}

impl Binding {
    /// Create a binding whose value is `value`, with default options.
    pub fn new(value: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            value: Arc::new(value),
            options: ScrollOptions::default(),
        }
    }

    /// Replace the binding options.
    pub fn with_options(mut self, options: ScrollOptions) -> Self {
        self.options = options;
        self
    }

    /// The binding options.
    pub fn options(&self) -> &ScrollOptions {
        &self.options
    }

    fn callback(&self) -> Callback {
        self.options
            .func
            .clone()
            .unwrap_or_else(|| Arc::clone(&self.value))
    }
}

/// The directive. Hosts call [`InfiniteScroll::updated`] whenever a bound
/// element is updated.
///
/// The attachment flag lives on the element itself, so an element gets at
/// most one scroll listener however many directive instances it is bound to.
#[derive(Debug, Default)]
pub struct InfiniteScroll {
    defaults: ScrollDefaults,
}

impl InfiniteScroll {
    /// Create a directive with the built-in defaults (500ms delay, 100px threshold).
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a directive whose unset binding options fall back to `defaults`.
    pub fn with_defaults(defaults: ScrollDefaults) -> Self {
        Self { defaults }
    }

    /// Lifecycle hook for a bound element.
    ///
    /// Returns `Ok(true)` if a listener was registered, `Ok(false)` if the
    /// element already had one. Fails only when called outside a Tokio runtime.
    pub fn updated(&self, el: &dyn Element, binding: &Binding) -> Result<bool> {
        if el.is_scroll_attached() {
            trace!(element = %el.id(), "Scroll listener already attached");
            return Ok(false);
        }

        let (listener, delay, threshold) = self.listener(binding)?;
        if !el.mark_scroll_attached() {
            trace!(element = %el.id(), "Scroll listener already attached");
            return Ok(false);
        }

        let options = binding.options();
        let container = options
            .target
            .as_deref()
            .and_then(|selector| el.query_selector(selector));

        match container {
            Some(container) => {
                debug!(
                    element = %el.id(),
                    container = %container.id(),
                    delay_ms = millis(delay),
                    threshold,
                    "Attaching scroll listener to target"
                );
                container.add_scroll_listener(listener);
            }
            None => {
                if let Some(selector) = &options.target {
                    debug!(
                        element = %el.id(),
                        selector = %selector,
                        "Target selector matched nothing, using bound element"
                    );
                }
                debug!(
                    element = %el.id(),
                    delay_ms = millis(delay),
                    threshold,
                    "Attaching scroll listener"
                );
                el.add_scroll_listener(listener);
            }
        }
        Ok(true)
    }

    /// Same as [`InfiniteScroll::updated`], for hosts binding at mount time.
    pub fn attach(&self, el: &dyn Element, binding: &Binding) -> Result<bool> {
        self.updated(el, binding)
    }

    /// Build the debounced scroll listener for `binding`, along with the
    /// delay and threshold it resolved to.
    fn listener(&self, binding: &Binding) -> Result<(ScrollListener, Duration, f64)> {
        let options = binding.options();
        let delay = options
            .delay_ms
            .map(Duration::from_millis)
            .unwrap_or_else(|| self.defaults.delay());
        let threshold = options.threshold.unwrap_or(self.defaults.threshold);
        let callback = binding.callback();

        let handler = Debounced::new(
            move |event: ScrollEvent| {
                let metrics = event.target.metrics();
                if metrics.is_near_bottom(threshold) {
                    debug!(
                        element = %event.target.id(),
                        scroll_top = metrics.scroll_top,
                        max_scroll = metrics.max_scroll(),
                        threshold,
                        "Scroll container near bottom"
                    );
                    callback();
                } else {
                    trace!(
                        element = %event.target.id(),
                        scroll_top = metrics.scroll_top,
                        "Scroll container not near bottom"
                    );
                }
            },
            delay,
            false,
        )?;
        let listener: ScrollListener = Arc::new(move |event: ScrollEvent| handler.call(event));
        Ok((listener, delay, threshold))
    }
}
