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
use std::marker::PhantomData;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

use crate::broker::{Broker, ReceiverSet};
use crate::component::handlers::{AsyncHandler, SyncHandler};
use crate::component::ComponentCore;
use crate::message::QueryMessage;
use crate::resolve::{DependencyDirection, DependencyInfo, DependencyKind, ResolverRef};

/// Selects which handler table a [`MonoRef`] resolves against, and the
/// handler type it yields.
pub(crate) trait MonoKind<M: QueryMessage>: Send + Sync + 'static {
    /// The cached handler type.
    type Handler: Clone + Send + Sync + 'static;
    /// Dependency shape reported for this resolver.
    const KIND: DependencyKind;
    /// Fetches the handler from the receiver's tables.
    fn fetch(receiver: &ComponentCore) -> Option<Self::Handler>;
}

/// Resolves against the synchronous handler table.
pub(crate) struct SyncMarker;

impl<M: QueryMessage> MonoKind<M> for SyncMarker {
    type Handler = SyncHandler<M>;
    const KIND: DependencyKind = DependencyKind::SyncQuery;

    fn fetch(receiver: &ComponentCore) -> Option<Self::Handler> {
        receiver.sync_handler::<M>()
    }
}

/// Resolves against the asynchronous handler table.
pub(crate) struct AsyncMarker;

impl<M: QueryMessage> MonoKind<M> for AsyncMarker {
    type Handler = AsyncHandler<M>;
    const KIND: DependencyKind = DependencyKind::AsyncQuery;

    fn fetch(receiver: &ComponentCore) -> Option<Self::Handler> {
        receiver.async_handler::<M>()
    }
}

/// Everything a dispatch path needs from one successful resolution.
pub(crate) struct ResolvedMono<H> {
    pub(crate) handler: H,
    pub(crate) receiver: Arc<ComponentCore>,
    pub(crate) receiver_executor: crate::executor::ExecutorHandle,
    pub(crate) same_executor: bool,
}

struct MonoState<H> {
    handler: Option<H>,
    snapshot: Weak<ReceiverSet>,
    receiver: Option<Arc<ComponentCore>>,
    receiver_executor: Option<crate::executor::ExecutorHandle>,
    same_executor: bool,
}

impl<H> Default for MonoState<H> {
    fn default() -> Self {
        MonoState {
            handler: None,
            snapshot: Weak::new(),
            receiver: None,
            receiver_executor: None,
            same_executor: false,
        }
    }
}

/// References a single component's handler for a message type. Expects
/// exactly one handler to exist; zero or several resolve to "no handler".
///
/// Caches as much of the indirection as possible and relies on the broker to
/// signal changes by expiring the cached snapshot. Invoking a cached handler
/// must not bump any refcount, so the handler `Arc` is cloned once per
/// rebuild, not per call.
pub(crate) struct MonoRef<M: QueryMessage, K: MonoKind<M>> {
    broker: Broker,
    owner: Weak<ComponentCore>,
    state: Mutex<MonoState<K::Handler>>,
    _marker: PhantomData<fn() -> (M, K)>,
}

impl<M: QueryMessage, K: MonoKind<M>> MonoRef<M, K> {
    pub(crate) fn new(broker: Broker, owner: Weak<ComponentCore>) -> Self {
        MonoRef {
            broker,
            owner,
            state: Mutex::new(MonoState::default()),
            _marker: PhantomData,
        }
    }

    /// Returns the cached resolution, rebuilding it if the broker has
    /// published a new snapshot since the last lookup.
    pub(crate) fn resolve(&self) -> Option<ResolvedMono<K::Handler>> {
        let mut state = self.state.lock();

        if state.handler.is_some() && state.snapshot.upgrade().is_some() {
            return Some(ResolvedMono {
                handler: state.handler.clone()?,
                receiver: state.receiver.clone()?,
                receiver_executor: state.receiver_executor.clone()?,
                same_executor: state.same_executor,
            });
        }

        state.handler = None;
        state.receiver = None;
        state.receiver_executor = None;

        let weak = self.broker.lookup(TypeId::of::<M>());
        state.snapshot = weak.clone();
        let snapshot = weak.upgrade()?;

        if snapshot.receivers.len() != 1 {
            // Zero receivers, or too many for a mono resolution. Fail closed.
            trace!(
                message = M::NAME,
                receivers = snapshot.receivers.len(),
                "mono resolution failed"
            );
            return None;
        }

        // Upgrades can fail in races with component teardown.
        let receiver = snapshot.receivers[0].upgrade()?;

        // Receiver possibly out of sync with the broker.
        let handler = K::fetch(&receiver)?;

        let receiver_executor = receiver.executor_for(TypeId::of::<M>());
        let owner = self.owner.upgrade()?;

        // Executor handle identity, not thread identity. Enables lock and
        // queue elision on the dispatch paths.
        let same_executor = Arc::ptr_eq(&owner.executor, &receiver_executor);

        state.handler = Some(handler.clone());
        state.receiver = Some(Arc::clone(&receiver));
        state.receiver_executor = Some(receiver_executor.clone());
        state.same_executor = same_executor;

        Some(ResolvedMono {
            handler,
            receiver,
            receiver_executor,
            same_executor,
        })
    }
}

impl<M: QueryMessage, K: MonoKind<M>> ResolverRef for MonoRef<M, K> {
    fn reset(&self) {
        *self.state.lock() = MonoState::default();
    }

    fn force_resolve(&self) {
        let _ = self.resolve();
    }

    fn describe_dependency(&self) -> DependencyInfo {
        let state = self.state.lock();
        DependencyInfo {
            direction: DependencyDirection::Import,
            kind: K::KIND,
            info: M::info(),
            resolved_targets: state
                .receiver
                .iter()
                .map(|receiver| receiver.name.clone())
                .collect(),
        }
    }
}
