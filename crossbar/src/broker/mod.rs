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

//! The central registry mapping message ids to receiver snapshots.
//!
//! For every message id the broker stores an immutable [`ReceiverSet`]
//! behind an `Arc`. Every mutation — associate, disassociate, invalidate —
//! publishes a *new* snapshot and drops the strong reference to the old one,
//! which expires every `Weak` a resolver may be holding. That expiry is the
//! only cache-invalidation signal in the runtime: resolvers keep the weak
//! snapshot and rebuild when it no longer upgrades.

use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

use crate::component::ComponentCore;
use crate::message::MessageId;

pub(crate) type WeakComponent = Weak<ComponentCore>;

/// Immutable set of components associated with one message id.
#[derive(Default)]
pub(crate) struct ReceiverSet {
    pub(crate) receivers: Vec<WeakComponent>,
}

/// Facilitates communication between components. It knows which component
/// listens to what message type, and tells interested parties when that
/// changes — by expiring the snapshot they hold.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone, Default)]
pub struct Broker {
    lookups: Arc<DashMap<MessageId, Arc<ReceiverSet>>>,
}

impl Broker {
    /// Creates an empty broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a receiver for `id`, publishing a fresh snapshot.
    pub(crate) fn associate(&self, id: MessageId, receiver: WeakComponent) {
        match self.lookups.entry(id) {
            Entry::Occupied(mut entry) => {
                // The copy preserves immutability of the published snapshot.
                let mut receivers = entry.get().receivers.clone();
                receivers.push(receiver);
                entry.insert(Arc::new(ReceiverSet { receivers }));
            }
            Entry::Vacant(entry) => {
                entry.insert(Arc::new(ReceiverSet {
                    receivers: vec![receiver],
                }));
            }
        }
        trace!(message = ?id, "associated receiver");
    }

    /// Removes `component` (and any stale entries encountered) from the
    /// receiver set of `id`, publishing a fresh snapshot. Unknown ids are
    /// ignored.
    pub(crate) fn disassociate(&self, id: MessageId, component: *const ComponentCore) {
        if let Some(mut entry) = self.lookups.get_mut(&id) {
            let receivers: Vec<WeakComponent> = entry
                .receivers
                .iter()
                .filter(|weak| weak.strong_count() > 0 && !std::ptr::eq(weak.as_ptr(), component))
                .cloned()
                .collect();
            *entry.value_mut() = Arc::new(ReceiverSet { receivers });
        }
    }

    /// Publishes a fresh, equal-content snapshot for `id`, expiring every
    /// outstanding weak reference to the old one. Used after a handler
    /// filter prepend changes a handler while keeping the receiver set.
    pub fn invalidate(&self, id: MessageId) {
        if let Some(mut entry) = self.lookups.get_mut(&id) {
            let receivers = entry.receivers.clone();
            *entry.value_mut() = Arc::new(ReceiverSet { receivers });
            trace!(message = ?id, "invalidated snapshot");
        }
    }

    /// Removes `component` from every known message id. Called during
    /// unpublish. The key set is snapshotted up front so per-key removal
    /// never iterates and mutates the map at the same time.
    pub(crate) fn disassociate_everything(&self, component: *const ComponentCore) {
        let ids: Vec<MessageId> = self.lookups.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            self.disassociate(id, component);
        }
    }

    /// Returns the current snapshot for `id` as a weak reference, creating
    /// an empty one if the id has never been seen.
    ///
    /// Returning weak is the contract: hold it, and rebuild your cached view
    /// once it expires.
    pub(crate) fn lookup(&self, id: MessageId) -> Weak<ReceiverSet> {
        let entry = self.lookups.entry(id).or_default();
        Arc::downgrade(entry.value())
    }
}
