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
use tracing::trace;

use crate::broker::{Broker, ReceiverSet};
use crate::component::ComponentCore;
use crate::interface::{BindContext, Interface};
use crate::resolve::{DependencyDirection, DependencyInfo, DependencyKind, ResolverRef};

struct IfaceState<I> {
    snapshot: Weak<ReceiverSet>,
    proxy: Option<Arc<I>>,
    receiver: Option<Arc<ComponentCore>>,
}

/// Like a mono resolver, but for a whole interface: on a successful
/// resolution it builds a *local proxy* of the published interface, bound to
/// the owning (sending) component so every query inside the proxy knows its
/// caller at invocation time.
pub(crate) struct InterfaceRef<I: Interface> {
    broker: Broker,
    owner: Weak<ComponentCore>,
    state: Mutex<IfaceState<I>>,
}

impl<I: Interface> InterfaceRef<I> {
    pub(crate) fn new(broker: Broker, owner: Weak<ComponentCore>) -> Self {
        InterfaceRef {
            broker,
            owner,
            state: Mutex::new(IfaceState {
                snapshot: Weak::new(),
                proxy: None,
                receiver: None,
            }),
        }
    }

    /// Returns the bound proxy, rebuilding it if the broker invalidated the
    /// interface id since the last lookup.
    pub(crate) fn resolve(&self) -> Option<Arc<I>> {
        let mut state = self.state.lock();

        if let Some(proxy) = &state.proxy {
            if state.snapshot.upgrade().is_some() {
                return Some(Arc::clone(proxy));
            }
        }

        state.proxy = None;
        state.receiver = None;

        let weak = self.broker.lookup(TypeId::of::<I>());
        state.snapshot = weak.clone();
        let snapshot = weak.upgrade()?;

        if snapshot.receivers.len() != 1 {
            trace!(
                interface = I::NAME,
                receivers = snapshot.receivers.len(),
                "interface resolution failed"
            );
            return None;
        }

        let receiver = snapshot.receivers[0].upgrade()?;
        let published = receiver.interface::<I>()?;
        let owner = self.owner.upgrade()?;

        let ctx = BindContext::new(Arc::clone(&owner), owner.default_lifetime.view());
        let proxy = Arc::new(published.bind(&ctx));

        state.proxy = Some(Arc::clone(&proxy));
        state.receiver = Some(receiver);

        Some(proxy)
    }
}

impl<I: Interface> ResolverRef for InterfaceRef<I> {
    fn reset(&self) {
        let mut state = self.state.lock();
        state.snapshot = Weak::new();
        state.proxy = None;
        state.receiver = None;
    }

    fn force_resolve(&self) {
        let _ = self.resolve();
    }

    fn describe_dependency(&self) -> DependencyInfo {
        let state = self.state.lock();
        DependencyInfo {
            direction: DependencyDirection::Import,
            kind: DependencyKind::Interface,
            info: I::info(),
            resolved_targets: state
                .receiver
                .iter()
                .map(|receiver| receiver.name.clone())
                .collect(),
        }
    }
}
