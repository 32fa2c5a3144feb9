//! Tag-based handler dispatch
//!
//! A consumer receiving several payload kinds on one channel registers one
//! handler per tag, then dispatches every event through the registry.
//! Registration takes `&mut self`: once the registry is moved into an actor
//! (before its run loop starts) nothing can register concurrently with
//! dispatch.

use crate::error::HandlerError;
use hyphae_protocol::{Event, MessageTag, Tagged};
use std::collections::HashMap;

/// Boxed handler for one tag. `C` is the context handed to every call
/// (`ActorContext<T>` inside actors, `()` for standalone consumers).
pub type HandlerFn<T, C> = Box<dyn FnMut(T, &mut C) -> anyhow::Result<()> + Send>;

/// Maps message tags to handlers
///
/// # Example
///
/// ```rust
/// use hyphae_protocol::{message_tag, Tagged};
/// use hyphae_transport::HandlerRegistry;
///
/// message_tag! {
///     pub enum FeedTag {
///         Book => "feed.book",
///         Trade => "feed.trade",
///     }
/// }
///
/// enum Feed {
///     Book(u32),
///     Trade(u64),
/// }
///
/// impl Tagged for Feed {
///     type Tag = FeedTag;
///     fn tag(&self) -> FeedTag {
///         match self {
///             Feed::Book(_) => FeedTag::Book,
///             Feed::Trade(_) => FeedTag::Trade,
///         }
///     }
/// }
///
/// let mut volume = 0u64;
/// let mut registry: HandlerRegistry<Feed, u64> = HandlerRegistry::new();
/// registry.register(FeedTag::Trade, |msg, volume: &mut u64| {
///     if let Feed::Trade(qty) = msg {
///         *volume += qty;
///     }
///     Ok(())
/// });
///
/// registry.dispatch(Feed::Trade(5), &mut volume).unwrap();
/// assert_eq!(volume, 5);
/// assert!(registry.dispatch(Feed::Book(10), &mut volume).is_err());
/// ```
pub struct HandlerRegistry<T: Tagged, C = ()> {
    handlers: HashMap<T::Tag, HandlerFn<T, C>>,
}

impl<T: Tagged, C> HandlerRegistry<T, C> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register the handler for `tag`, replacing any previous one
    pub fn register<F>(&mut self, tag: T::Tag, handler: F) -> &mut Self
    where
        F: FnMut(T, &mut C) -> anyhow::Result<()> + Send + 'static,
    {
        if self.handlers.insert(tag, Box::new(handler)).is_some() {
            tracing::warn!(tag = tag.as_str(), "Replaced existing handler");
        }
        self
    }

    /// Handler registered for `tag`, if any
    pub fn lookup(&mut self, tag: T::Tag) -> Option<&mut HandlerFn<T, C>> {
        self.handlers.get_mut(&tag)
    }

    pub fn contains(&self, tag: T::Tag) -> bool {
        self.handlers.contains_key(&tag)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Every registered tag (unordered)
    pub fn tags(&self) -> impl Iterator<Item = T::Tag> + '_ {
        self.handlers.keys().copied()
    }

    /// Route a payload to the handler registered for its tag.
    ///
    /// An unregistered tag yields [`HandlerError::HandlerNotFound`]; callers
    /// log it and drop the message.
    pub fn dispatch(&mut self, payload: T, ctx: &mut C) -> Result<(), HandlerError> {
        let tag = payload.tag();
        let handler = self
            .handlers
            .get_mut(&tag)
            .ok_or(HandlerError::HandlerNotFound { tag: tag.as_str() })?;
        handler(payload, ctx).map_err(HandlerError::Failed)
    }

    /// Route an event's payload to its handler
    pub fn dispatch_event(&mut self, event: Event<T>, ctx: &mut C) -> Result<(), HandlerError> {
        self.dispatch(event.into_payload(), ctx)
    }
}

impl<T: Tagged, C> Default for HandlerRegistry<T, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Tagged, C> std::fmt::Debug for HandlerRegistry<T, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tags: Vec<&'static str> = self.handlers.keys().map(|tag| tag.as_str()).collect();
        f.debug_struct("HandlerRegistry").field("tags", &tags).finish()
    }
}
