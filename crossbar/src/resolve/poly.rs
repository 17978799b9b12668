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

use std::any::TypeId;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::broker::{Broker, ReceiverSet};
use crate::component::handlers::EventHandler;
use crate::component::ComponentCore;
use crate::executor::ExecutorHandle;
use crate::message::EventMessage;
use crate::resolve::{DependencyDirection, DependencyInfo, DependencyKind, ResolverRef};

/// One resolved receiver of an event.
pub(crate) struct PolyEntry<M: EventMessage> {
    pub(crate) receiver: Arc<ComponentCore>,
    pub(crate) handler: EventHandler<M>,
    pub(crate) executor: ExecutorHandle,
    pub(crate) same_executor: bool,
}

impl<M: EventMessage> Clone for PolyEntry<M> {
    fn clone(&self) -> Self {
        PolyEntry {
            receiver: Arc::clone(&self.receiver),
            handler: Arc::clone(&self.handler),
            executor: Arc::clone(&self.executor),
            same_executor: self.same_executor,
        }
    }
}

struct PolyState<M: EventMessage> {
    snapshot: Weak<ReceiverSet>,
    entries: Vec<PolyEntry<M>>,
}

/// The many-receiver counterpart of `MonoRef`: resolves every component
/// subscribed to an event, skipping entries that fail to upgrade or whose
/// handler table is out of sync with the broker.
pub(crate) struct PolyRef<M: EventMessage> {
    broker: Broker,
    owner: Weak<ComponentCore>,
    state: Mutex<PolyState<M>>,
}

impl<M: EventMessage> PolyRef<M> {
    pub(crate) fn new(broker: Broker, owner: Weak<ComponentCore>) -> Self {
        PolyRef {
            broker,
            owner,
            state: Mutex::new(PolyState {
                snapshot: Weak::new(),
                entries: Vec::new(),
            }),
        }
    }

    /// Returns the resolved receiver list, rebuilding on snapshot expiry.
    pub(crate) fn resolve(&self) -> Vec<PolyEntry<M>> {
        let mut state = self.state.lock();

        if !state.entries.is_empty() && state.snapshot.upgrade().is_some() {
            return state.entries.clone();
        }

        state.entries.clear();

        let weak = self.broker.lookup(TypeId::of::<M>());
        state.snapshot = weak.clone();
        let Some(snapshot) = weak.upgrade() else {
            return Vec::new();
        };
        let Some(owner) = self.owner.upgrade() else {
            return Vec::new();
        };

        for weak_receiver in &snapshot.receivers {
            let Some(receiver) = weak_receiver.upgrade() else {
                continue;
            };
            let Some(handler) = receiver.event_handler::<M>() else {
                continue;
            };
            let executor = Arc::clone(&receiver.executor);
            let same_executor = Arc::ptr_eq(&owner.executor, &executor);
            state.entries.push(PolyEntry {
                receiver,
                handler,
                executor,
                same_executor,
            });
        }

        state.entries.clone()
    }
}

impl<M: EventMessage> ResolverRef for PolyRef<M> {
    fn reset(&self) {
        let mut state = self.state.lock();
        state.snapshot = Weak::new();
        state.entries.clear();
    }

    fn force_resolve(&self) {
        let _ = self.resolve();
    }

    fn describe_dependency(&self) -> DependencyInfo {
        let state = self.state.lock();
        DependencyInfo {
            direction: DependencyDirection::Export,
            kind: DependencyKind::Event,
            info: M::info(),
            resolved_targets: state
                .entries
                .iter()
                .map(|entry| entry.receiver.name.clone())
                .collect(),
        }
    }
}
