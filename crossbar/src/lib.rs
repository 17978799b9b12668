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

#![warn(missing_docs)]

//! # Crossbar
//!
//! An in-process component messaging runtime. Loosely-coupled components
//! address each other by declared *message types* instead of direct
//! references; each component runs on a serial [`Executor`] that may or may
//! not share a thread with others. The runtime delivers three message
//! styles — synchronous queries, asynchronous queries with a typed result
//! callback, and many-receiver events — and transparently picks between
//! direct invocation (same executor), lock-protected invocation
//! (cross-thread sync), and enqueue-on-executor (async cross-executor).
//!
//! ## Key Concepts
//!
//! - **Messages**: declared once as marker types
//!   ([`declare_query!`], [`impl_event!`]) and addressed by type everywhere.
//! - **Broker** ([`broker::Broker`]): the registry mapping each message id
//!   to an immutable snapshot of its receivers; every change publishes a new
//!   snapshot, which is how cached references learn to rebuild.
//! - **Components** ([`component::Component`]): publish handlers, subscribe
//!   to events, and look up cached query/event/interface references.
//! - **Executors** ([`executor::Executor`]): serial FIFO work queues,
//!   drained explicitly by their owning thread.
//! - **Lifetimes** ([`common::Lifetime`]): cancellation tokens; a callback
//!   whose lifetime expired is silently dropped.
//! - **Interfaces**: named bundles of queries published and resolved as one
//!   unit, with `#[derive(Interface)]`.
//! - **Registry** ([`common::Registry`]): the composition root, with
//!   dependency verification.
//!
//! ## Quick Start
//!
//! ```
//! use crossbar::prelude::*;
//!
//! crossbar::declare_query!(pub Sum: (i32, i32) -> i32);
//!
//! let broker = Broker::new();
//! let executor = Executor::new();
//!
//! let receiver = Component::new("receiver", &broker, executor.clone());
//! receiver.publish_sync_query::<Sum>(|(a, b)| a + b);
//! receiver.publish();
//!
//! let sender = Component::new("sender", &broker, executor);
//! sender.publish();
//! let sum = sender.lookup_sync_query::<Sum>();
//!
//! assert_eq!(sum.call((2, 3)), 5);
//! ```

pub mod broker;
pub mod common;
pub mod component;
pub mod dispatch;
pub mod executor;
pub mod interface;
pub mod message;
pub mod resolve;

/// Convenient imports for component authors.
pub mod prelude {
    pub use crate::broker::Broker;
    pub use crate::common::{
        DispatchKind, Error, Lifetime, LifetimeWeak, Listener, QueryResult, Registry,
    };
    pub use crate::component::{
        AsyncHandler, Component, ComponentConfig, EventHandler, SyncHandler,
    };
    pub use crate::dispatch::{
        AsyncQuery, CallbackResult, EventEmitter, QueryFuture, QueryInvoker, SyncQuery,
    };
    pub use crate::executor::{Executor, ExecutorHandle};
    pub use crate::interface::{
        BindContext, IfAsyncQuery, IfSyncQuery, Interface, InterfaceClient, InterfaceField,
    };
    pub use crate::message::{EventMessage, MessageId, MessageInfo, QueryMessage};
    pub use crate::resolve::{DependencyDirection, DependencyInfo, DependencyKind};
}
