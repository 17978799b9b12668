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

//! Cached, invalidation-aware resolution from a sender's view of a message
//! to a receiver's handler.
//!
//! A resolver caches everything the dispatch path needs — handler, receiver,
//! receiver executor, same-executor flag — keyed on the broker snapshot it
//! resolved against. The cache stays valid exactly as long as the weak
//! snapshot upgrades; the broker expires it on any change to the receiver
//! set, and the next lookup rebuilds.

pub(crate) use self::iface::InterfaceRef;
pub(crate) use self::mono::{AsyncMarker, MonoKind, MonoRef, ResolvedMono, SyncMarker};
pub(crate) use self::poly::{PolyEntry, PolyRef};

use crate::message::MessageInfo;

mod iface;
mod mono;
mod poly;

/// Whether a dependency is consumed or offered by the component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyDirection {
    /// The component looks the message up on others.
    Import,
    /// The component publishes a handler, an interface, or emits an event.
    Export,
}

/// What shape of dependency a record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    /// A synchronous query.
    SyncQuery,
    /// An asynchronous query.
    AsyncQuery,
    /// An event stream.
    Event,
    /// A grouped interface of queries.
    Interface,
}

/// One edge of a component's dependency description, as produced by
/// [`Component::dependencies`](crate::component::Component::dependencies).
#[derive(Debug, Clone)]
pub struct DependencyInfo {
    /// Consumed or offered.
    pub direction: DependencyDirection,
    /// Message shape.
    pub kind: DependencyKind,
    /// The message this edge is about.
    pub info: MessageInfo,
    /// Names of the components the edge currently resolves to.
    pub resolved_targets: Vec<String>,
}

/// Object-safe view of a resolver, kept in the owning component's ledger for
/// dependency reporting and cache reset at unpublish.
pub(crate) trait ResolverRef: Send + Sync {
    /// Clears the cached resolution.
    fn reset(&self);

    /// Triggers a lookup so the dependency description reflects reality.
    fn force_resolve(&self);

    /// Describes this resolver as a dependency edge.
    fn describe_dependency(&self) -> DependencyInfo;
}
