use std::fmt::Debug;
use std::hash::Hash;

/// Discriminant of a payload family.
///
/// Tags are plain enums (one variant per payload kind) so dispatch is a hash
/// lookup on a `Copy` value rather than a runtime type inspection. The string
/// name is what shows up in logs and metrics.
pub trait MessageTag: Debug + Copy + Eq + Hash + Send + Sync + 'static {
    /// Stable, human-readable name of this tag (e.g. `"market.quote"`)
    fn as_str(&self) -> &'static str;
}

/// A payload that knows its own tag.
///
/// Implemented by the sum types that flow through channels. The tag is always
/// derived from the payload itself, so an [`Event`](crate::Event) can never
/// carry a tag that disagrees with its contents.
///
/// # Example
///
/// ```rust
/// use hyphae_protocol::{message_tag, MessageTag, Tagged};
///
/// message_tag! {
///     pub enum MarketTag {
///         Quote => "market.quote",
///         Trade => "market.trade",
///     }
/// }
///
/// enum MarketEvent {
///     Quote { bid: f64, ask: f64 },
///     Trade { price: f64, qty: f64 },
/// }
///
/// impl Tagged for MarketEvent {
///     type Tag = MarketTag;
///
///     fn tag(&self) -> MarketTag {
///         match self {
///             MarketEvent::Quote { .. } => MarketTag::Quote,
///             MarketEvent::Trade { .. } => MarketTag::Trade,
///         }
///     }
/// }
///
/// let event = MarketEvent::Trade { price: 101.5, qty: 2.0 };
/// assert_eq!(event.tag().as_str(), "market.trade");
/// ```
pub trait Tagged: Send + 'static {
    /// The tag enum for this payload family
    type Tag: MessageTag;

    /// Discriminant of this particular value
    fn tag(&self) -> Self::Tag;
}

/// Declare a tag enum and its [`MessageTag`] implementation.
///
/// Every variant is paired with the string name used in logs.
#[macro_export]
macro_rules! message_tag {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $($variant:ident => $label:expr),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant),+
        }

        impl $name {
            /// Every tag of this family, in declaration order
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
        }

        impl $crate::message::MessageTag for $name {
            fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.write_str($crate::message::MessageTag::as_str(self))
            }
        }
    };
}

/// Implement [`Tagged`] for a single-kind payload type.
///
/// `impl_tagged!(Heartbeat, SessionTag, SessionTag::Heartbeat);`
#[macro_export]
macro_rules! impl_tagged {
    ($type:ty, $tag_type:ty, $tag:expr) => {
        impl $crate::message::Tagged for $type {
            type Tag = $tag_type;

            fn tag(&self) -> Self::Tag {
                $tag
            }
        }
    };
}
