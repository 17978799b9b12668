/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Message identity and declaration.
//!
//! A message is declared once as a marker type and addressed everywhere else
//! through that type. Identity is the marker's [`TypeId`]: process-stable,
//! collision-free across distinct types, and usable as a map key — the same
//! scheme the broker uses for its receiver table.

use std::any::TypeId;

/// Process-stable identity of a message type.
pub type MessageId = TypeId;

/// Identity plus diagnostic name, carried on invocations so listeners can
/// render human-readable traces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageInfo {
    /// The message's process-stable id.
    pub id: MessageId,
    /// The declared name, for diagnostics only.
    pub name: &'static str,
}

/// A query message: a request with arguments and a typed reply.
///
/// The same declaration serves synchronous and asynchronous publication;
/// which style applies is decided by the publishing component. Multi-argument
/// signatures use a tuple for `Args`, which is what [`declare_query!`]
/// generates.
///
/// [`declare_query!`]: crate::declare_query
pub trait QueryMessage: Sized + Send + 'static {
    /// Argument tuple of the query.
    type Args: Send + 'static;
    /// Reply value produced by the handler.
    type Reply: Send + 'static;
    /// Diagnostic name.
    const NAME: &'static str;

    /// Identity and name of this message.
    fn info() -> MessageInfo {
        MessageInfo {
            id: TypeId::of::<Self>(),
            name: Self::NAME,
        }
    }
}

/// An event message: a value fanned out to any number of subscribers.
///
/// Events cross executor boundaries by value, hence `Clone`.
pub trait EventMessage: Clone + Send + Sized + 'static {
    /// Diagnostic name.
    const NAME: &'static str;

    /// Identity and name of this message.
    fn info() -> MessageInfo {
        MessageInfo {
            id: TypeId::of::<Self>(),
            name: Self::NAME,
        }
    }
}

/// Declares a query message type with its signature.
///
/// ```
/// crossbar::declare_query!(pub Sum: (i32, i32) -> i32);
/// ```
///
/// expands to a marker struct `Sum` implementing
/// [`QueryMessage`](crate::message::QueryMessage) with
/// `Args = (i32, i32)` and `Reply = i32`.
#[macro_export]
macro_rules! declare_query {
    ($(#[$meta:meta])* $vis:vis $name:ident: ($($arg:ty),* $(,)?) -> $reply:ty) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy)]
        $vis struct $name;

        impl $crate::message::QueryMessage for $name {
            type Args = ($($arg,)*);
            type Reply = $reply;
            const NAME: &'static str = stringify!($name);
        }
    };
}

/// Implements [`EventMessage`](crate::message::EventMessage) for an existing
/// struct, using the type name as the diagnostic name.
///
/// ```
/// #[derive(Clone)]
/// pub struct SummationFinished { pub sum: i32 }
/// crossbar::impl_event!(SummationFinished);
/// ```
#[macro_export]
macro_rules! impl_event {
    ($name:ident) => {
        impl $crate::message::EventMessage for $name {
            const NAME: &'static str = stringify!($name);
        }
    };
}
