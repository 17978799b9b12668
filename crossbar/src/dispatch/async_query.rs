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
use tracing::trace;

use crate::common::{DispatchKind, Lifetime, LifetimeView, LifetimeWeak, QueryResult};
use crate::component::handlers::AsyncHandler;
use crate::component::ComponentCore;
use crate::dispatch::callback::{CallbackFn, RouteInfo};
use crate::dispatch::CallbackResult;
use crate::executor::ExecutorHandle;
use crate::message::{MessageInfo, QueryMessage};
use crate::resolve::{AsyncMarker, MonoRef, ResolvedMono};

/// Proxy for asynchronously invoking a query on another component.
///
/// - If the sender and receiver share an executor, the handler runs inline
///   and the result callback runs inline in the same batch.
/// - Otherwise the request is enqueued on the receiver's executor and the
///   result hops back to the sender's executor.
///
/// Calls are bound to the owning component's default lifetime unless rebound
/// with [`with_scope`](AsyncQuery::with_scope) or overridden per call with
/// [`with_lifetime`](QueryInvoker::with_lifetime).
pub struct AsyncQuery<M: QueryMessage> {
    mono: Arc<MonoRef<M, AsyncMarker>>,
    owner: Weak<ComponentCore>,
    scope: LifetimeView,
    fallback: Mutex<Option<AsyncHandler<M>>>,
}

impl<M: QueryMessage> AsyncQuery<M> {
    pub(crate) fn new(
        mono: Arc<MonoRef<M, AsyncMarker>>,
        owner: Weak<ComponentCore>,
        scope: LifetimeView,
    ) -> Self {
        AsyncQuery {
            mono,
            owner,
            scope,
            fallback: Mutex::new(None),
        }
    }

    /// Starts an invocation. The returned builder executes when dropped, so
    /// a bare `query.call(args)` fires the request and discards the result,
    /// while `.with_callback(..)` / `.with_lifetime(..)` refine it first.
    pub fn call(&self, args: M::Args) -> QueryInvoker<'_, M> {
        QueryInvoker {
            query: self,
            args: Some(args),
            lifetime: self.scope.create_weak(),
            callback: None,
        }
    }

    /// Whether any component currently answers this query.
    pub fn reachable(&self) -> bool {
        self.mono.resolve().is_some()
    }

    /// Registers a handler invoked when no component answers this query.
    pub fn set_fallback(
        &self,
        handler: impl Fn(M::Args, CallbackResult<M::Reply>) + Send + Sync + 'static,
    ) {
        *self.fallback.lock() = Some(Arc::new(handler));
    }

    /// A copy of this query bound to a different lifetime scope. Useful for
    /// sessions: callbacks of calls made through the copy die with the
    /// session instead of the component.
    pub fn with_scope(&self, lifetime: &Lifetime) -> AsyncQuery<M> {
        AsyncQuery {
            mono: Arc::clone(&self.mono),
            owner: self.owner.clone(),
            scope: lifetime.view(),
            fallback: Mutex::new(self.fallback.lock().clone()),
        }
    }

    fn execute(&self, args: M::Args, lifetime: LifetimeWeak, callback: Option<CallbackFn<M::Reply>>) {
        let callback: CallbackFn<M::Reply> = callback.unwrap_or_else(|| Box::new(|_| {}));

        let Some(resolved) = self.mono.resolve() else {
            if let Some(fallback) = self.fallback.lock().clone() {
                let result = CallbackResult::with_route(None, lifetime, None, callback);
                fallback(args, result);
                return;
            }
            panic!("no handler registered for `{}`", M::NAME);
        };

        let Some(sender) = self.owner.upgrade() else {
            trace!(message = M::NAME, "sender component gone, dropping call");
            return;
        };

        dispatch_async::<M>(resolved, &sender, M::info(), args, lifetime, callback);
    }
}

/// The dual-path core of an async invocation, shared with interface proxies.
pub(crate) fn dispatch_async<M: QueryMessage>(
    resolved: ResolvedMono<AsyncHandler<M>>,
    sender: &Arc<ComponentCore>,
    info: MessageInfo,
    args: M::Args,
    lifetime: LifetimeWeak,
    callback: CallbackFn<M::Reply>,
) {
    let route = RouteInfo {
        requester: Arc::downgrade(sender),
        responder_name: resolved.receiver.name.clone(),
        info,
    };

    if resolved.same_executor && sender.allow_direct_call_async {
        if let Some(listener) = resolved.receiver.listener() {
            listener.on_invoke(&sender.name, &resolved.receiver.name, &info, DispatchKind::Request);
        }
        // No response executor: the callback runs inline when the handler
        // resolves the result, still in the caller's batch.
        let result = CallbackResult::with_route(None, lifetime, Some(route), callback);
        (resolved.handler)(args, result);
    } else {
        let request = RequestData::<M> {
            handler: resolved.handler,
            args,
            callback,
            // The response leg hops back onto the sender's executor.
            response_executor: Arc::clone(&sender.executor),
            lifetime,
            route,
        };
        resolved.receiver_executor.enqueue(request, run_request::<M>);

        if let Some(listener) = resolved.receiver.listener() {
            listener.on_enqueue(&sender.name, &resolved.receiver.name, &info, DispatchKind::Request);
        }
    }
}

struct RequestData<M: QueryMessage> {
    handler: AsyncHandler<M>,
    args: M::Args,
    callback: CallbackFn<M::Reply>,
    response_executor: ExecutorHandle,
    lifetime: LifetimeWeak,
    route: RouteInfo,
}

fn run_request<M: QueryMessage>(request: RequestData<M>) {
    let result = CallbackResult::with_route(
        Some(request.response_executor),
        request.lifetime,
        Some(request.route),
        request.callback,
    );
    (request.handler)(request.args, result);
}

/// A deferred async invocation.
///
/// Execution happens when the invoker drops, which allows the chained
/// `.with_lifetime(..)` and `.with_callback(..)` forms without ordering
/// pitfalls.
pub struct QueryInvoker<'q, M: QueryMessage> {
    query: &'q AsyncQuery<M>,
    args: Option<M::Args>,
    lifetime: LifetimeWeak,
    callback: Option<CallbackFn<M::Reply>>,
}

impl<'q, M: QueryMessage> QueryInvoker<'q, M> {
    /// Binds the callback of this call to `lifetime` instead of the query's
    /// scope.
    pub fn with_lifetime(mut self, lifetime: &Lifetime) -> Self {
        self.lifetime = lifetime.create_weak();
        self
    }

    /// Sets the result callback.
    pub fn with_callback(
        mut self,
        callback: impl FnOnce(QueryResult<M::Reply>) + Send + 'static,
    ) -> Self {
        self.callback = Some(Box::new(callback));
        self
    }

    /// Chains this call into an outer [`CallbackResult`]: failures propagate
    /// to `outer` untouched, successes run `success` with the value and the
    /// still-unresolved `outer`.
    pub fn with_successful_callback<U: Send + 'static>(
        self,
        outer: CallbackResult<U>,
        success: impl FnOnce(M::Reply, CallbackResult<U>) + Send + 'static,
    ) -> Self {
        self.with_callback(move |result| match result {
            Ok(value) => success(value, outer),
            Err(error) => outer.resolve(Err(error)),
        })
    }
}

impl<'q, M: QueryMessage> Drop for QueryInvoker<'q, M> {
    fn drop(&mut self) {
        if let Some(args) = self.args.take() {
            self.query
                .execute(args, self.lifetime.clone(), self.callback.take());
        }
    }
}
