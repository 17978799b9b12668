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

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::common::{DispatchKind, Listener};
use crate::component::handlers::SyncHandler;
use crate::component::ComponentCore;
use crate::message::{MessageInfo, QueryMessage};
use crate::resolve::{MonoRef, SyncMarker};

/// Proxy for synchronously invoking a query on another component.
///
/// - Same executor: plain direct call. The serial-queue contract guarantees
///   nobody else is touching the receiver on this thread.
/// - Different executor: the call runs under the receiver's reentrant lock.
///   A receiver built with `allow_locking_calls_sync = false` refuses such
///   calls outright, which turns potential lock cycles into loud errors.
pub struct SyncQuery<M: QueryMessage> {
    mono: Arc<MonoRef<M, SyncMarker>>,
    owner: Weak<ComponentCore>,
    fallback: Mutex<Option<SyncHandler<M>>>,
}

impl<M: QueryMessage> SyncQuery<M> {
    pub(crate) fn new(mono: Arc<MonoRef<M, SyncMarker>>, owner: Weak<ComponentCore>) -> Self {
        SyncQuery {
            mono,
            owner,
            fallback: Mutex::new(None),
        }
    }

    /// Invokes the query and returns its value.
    ///
    /// If no component answers and no fallback is registered, panics — a
    /// missing mono handler is a composition error.
    pub fn call(&self, args: M::Args) -> M::Reply {
        let Some(resolved) = self.mono.resolve() else {
            if let Some(fallback) = self.fallback.lock().clone() {
                return fallback(args);
            }
            panic!("no handler registered for `{}`", M::NAME);
        };

        let sender_name = self
            .owner
            .upgrade()
            .map(|sender| sender.name.clone())
            .unwrap_or_default();

        dispatch_sync::<M>(
            &resolved.handler,
            &resolved.receiver,
            resolved.same_executor,
            &sender_name,
            &M::info(),
            args,
            false,
        )
    }

    /// Whether any component currently answers this query.
    pub fn reachable(&self) -> bool {
        self.mono.resolve().is_some()
    }

    /// Registers a handler invoked when no component answers this query.
    pub fn set_fallback(
        &self,
        handler: impl Fn(M::Args) -> M::Reply + Send + Sync + 'static,
    ) {
        *self.fallback.lock() = Some(Arc::new(handler));
    }
}

/// The dual-path core of a sync invocation, shared with interface proxies.
///
/// `notify_unlocked` controls whether `Request`/`Response` invoke
/// notifications fire on the same-executor path; the locked path always
/// fires `LockedRequest` before taking the lock and `LockedResponse` after
/// releasing it, whether or not the handler panics.
pub(crate) fn dispatch_sync<M: QueryMessage>(
    handler: &SyncHandler<M>,
    receiver: &Arc<ComponentCore>,
    same_executor: bool,
    sender_name: &str,
    info: &MessageInfo,
    args: M::Args,
    notify_unlocked: bool,
) -> M::Reply {
    let listener = receiver.listener();

    if same_executor {
        if notify_unlocked {
            if let Some(listener) = &listener {
                listener.on_invoke(sender_name, &receiver.name, info, DispatchKind::Request);
            }
        }
        let reply = handler(args);
        if notify_unlocked {
            if let Some(listener) = &listener {
                listener.on_invoke(&receiver.name, sender_name, info, DispatchKind::Response);
            }
        }
        reply
    } else {
        if !receiver.allow_locking_calls_sync {
            panic!(
                "component `{}` refuses cross-executor sync calls (allow_locking_calls_sync = false)",
                receiver.name
            );
        }
        if let Some(listener) = &listener {
            listener.on_invoke(sender_name, &receiver.name, info, DispatchKind::LockedRequest);
        }
        let _response_guard = ListenerGuard {
            listener,
            sender: receiver.name.clone(),
            receiver: sender_name.to_string(),
            info: *info,
        };
        let _lock = receiver.lock.lock();
        handler(args)
        // Drop order: the lock releases first, then the guard fires
        // `LockedResponse` — also while unwinding out of a panicking handler.
    }
}

struct ListenerGuard {
    listener: Option<Arc<dyn Listener>>,
    sender: String,
    receiver: String,
    info: MessageInfo,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        if let Some(listener) = &self.listener {
            listener.on_invoke(
                &self.sender,
                &self.receiver,
                &self.info,
                DispatchKind::LockedResponse,
            );
        }
    }
}
