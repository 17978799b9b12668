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

//! Interface grouping: a named bundle of queries published and looked up
//! atomically.
//!
//! An interface is a plain struct whose fields are [`IfSyncQuery`] /
//! [`IfAsyncQuery`] declarations. The publishing component fills in the
//! handlers and calls
//! [`publish_interface`](crate::component::Component::publish_interface);
//! a sender looks the whole bundle up with
//! [`lookup_interface`](crate::component::Component::lookup_interface) and
//! receives a *proxy*: a rebound copy of the struct in which every query
//! carries the sender's identity, the cached receiver executor, and the
//! mutual-executor flag. Subsequent calls through the proxy dispatch with no
//! further broker traffic until the broker invalidates the interface id.
//!
//! `#[derive(Interface)]` writes the [`bind`](Interface::bind) /
//! [`attach`](Interface::attach) plumbing for such structs.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::trace;

pub use crossbar_macro::Interface;

use crate::common::{Lifetime, LifetimeView, LifetimeWeak, QueryResult};
use crate::component::handlers::{AsyncHandler, SyncHandler};
use crate::component::ComponentCore;
use crate::dispatch::{
    dispatch_async, dispatch_sync, CallbackFn, CallbackResult, QueryFuture,
};
use crate::executor::Executor;
use crate::message::{MessageInfo, QueryMessage};
use crate::resolve::{InterfaceRef, ResolvedMono};

/// The caller-side context under which an interface proxy is built.
///
/// Carries the sending component and the lifetime scope its calls bind to.
/// Passed explicitly to [`Interface::bind`] instead of stashing the current
/// component in a thread-local.
pub struct BindContext {
    pub(crate) sender: Arc<ComponentCore>,
    pub(crate) lifetime: LifetimeView,
}

impl BindContext {
    pub(crate) fn new(sender: Arc<ComponentCore>, lifetime: LifetimeView) -> Self {
        BindContext { sender, lifetime }
    }
}

/// The publisher-side context wiring an interface to its owning component.
pub struct AttachContext {
    pub(crate) component: Weak<ComponentCore>,
    pub(crate) executor: Weak<Executor>,
}

/// A named group of queries published as one unit.
///
/// Implemented with `#[derive(Interface)]` on a struct of
/// [`IfSyncQuery`] / [`IfAsyncQuery`] fields.
pub trait Interface: Any + Send + Sync + 'static {
    /// Diagnostic name of the interface.
    const NAME: &'static str;

    /// Identity and name of the interface message id.
    fn info() -> MessageInfo
    where
        Self: Sized,
    {
        MessageInfo {
            id: TypeId::of::<Self>(),
            name: Self::NAME,
        }
    }

    /// Builds the sender-local proxy: a copy of `self` in which every query
    /// field is rebound to the calling component.
    fn bind(&self, ctx: &BindContext) -> Self
    where
        Self: Sized;

    /// Wires the publishing component into every query field. Called by
    /// `publish_interface`.
    fn attach(&self, ctx: &AttachContext);
}

/// One field of an interface struct. Implemented by [`IfSyncQuery`] and
/// [`IfAsyncQuery`]; `#[derive(Interface)]` folds these over all fields.
pub trait InterfaceField {
    /// Rebinds the field to a calling component.
    fn bind_field(&self, ctx: &BindContext) -> Self
    where
        Self: Sized;

    /// Attaches the field to its publishing component.
    fn attach_field(&self, ctx: &AttachContext);
}

#[derive(Clone)]
struct IfOwner {
    component: Weak<ComponentCore>,
    executor: Weak<Executor>,
}

// Caller-side cache, filled in by bind_field. Plain weak pointers are fine:
// the broker invalidates the interface id if the publisher goes away, which
// rebuilds the proxy.
#[derive(Clone)]
struct IfLink {
    sender: Weak<ComponentCore>,
    receiver: Weak<ComponentCore>,
    receiver_executor: Weak<Executor>,
    lifetime: LifetimeView,
    mutual_executor: bool,
}

fn invalidate_owner_interfaces(owner: &Mutex<Option<IfOwner>>) {
    let component = owner
        .lock()
        .as_ref()
        .and_then(|owner| owner.component.upgrade());
    if let Some(component) = component {
        component.invalidate_interfaces();
    }
}

/// An asynchronous query declared inside an interface.
///
/// On the publishing side it holds the handler; on the caller side (after
/// binding) it holds cached dispatch state and is invoked like a standalone
/// [`AsyncQuery`](crate::dispatch::AsyncQuery).
pub struct IfAsyncQuery<M: QueryMessage> {
    slot: Arc<IfAsyncSlot<M>>,
    link: Option<IfLink>,
}

struct IfAsyncSlot<M: QueryMessage> {
    handler: Mutex<Option<AsyncHandler<M>>>,
    owner: Mutex<Option<IfOwner>>,
}

impl<M: QueryMessage> IfAsyncQuery<M> {
    /// An unpublished query slot.
    pub fn new() -> Self {
        IfAsyncQuery {
            slot: Arc::new(IfAsyncSlot {
                handler: Mutex::new(None),
                owner: Mutex::new(None),
            }),
            link: None,
        }
    }

    /// Sets the handler. Called by the publishing component while building
    /// the interface value.
    pub fn publish(
        &self,
        handler: impl Fn(M::Args, CallbackResult<M::Reply>) + Send + Sync + 'static,
    ) {
        *self.slot.handler.lock() = Some(Arc::new(handler));
    }

    /// Wraps the published handler with `filter`, which decides whether and
    /// how to call the original. Usable through a bound proxy as well; the
    /// filter lands on the publishing side either way.
    ///
    /// Every interface id of the owning component is invalidated so cached
    /// proxies rebuild — there is no reverse map from a query to the single
    /// interface containing it.
    pub fn prepend_filter(
        &self,
        filter: impl Fn(M::Args, CallbackResult<M::Reply>, AsyncHandler<M>) + Send + Sync + 'static,
    ) {
        {
            let mut slot = self.slot.handler.lock();
            let Some(next) = slot.clone() else {
                panic!("no handler published for interface query `{}`", M::NAME);
            };
            *slot = Some(Arc::new(move |args, result| {
                filter(args, result, Arc::clone(&next))
            }));
        }
        invalidate_owner_interfaces(&self.slot.owner);
    }

    /// Starts an invocation through a bound proxy. Panics on an unbound
    /// (publisher-side) instance.
    pub fn call(&self, args: M::Args) -> IfQueryInvoker<'_, M> {
        let link = self.link().expect("interface query invoked without a bound caller");
        IfQueryInvoker {
            query: self,
            args: Some(args),
            lifetime: link.lifetime.create_weak(),
            callback: None,
        }
    }

    /// Invokes the query and returns a future of its result.
    pub fn query(&self, args: M::Args) -> QueryFuture<M::Reply> {
        crate::dispatch::future_for(|callback| {
            let _ = self.call(args).with_callback(callback);
        })
    }

    fn link(&self) -> Option<&IfLink> {
        self.link.as_ref()
    }

    fn execute(&self, args: M::Args, lifetime: LifetimeWeak, callback: Option<CallbackFn<M::Reply>>) {
        let callback: CallbackFn<M::Reply> = callback.unwrap_or_else(|| Box::new(|_| {}));
        let link = self.link().expect("interface query invoked without a bound caller");

        let Some(handler) = self.slot.handler.lock().clone() else {
            panic!("no handler published for interface query `{}`", M::NAME);
        };

        let (Some(sender), Some(receiver), Some(receiver_executor)) = (
            link.sender.upgrade(),
            link.receiver.upgrade(),
            link.receiver_executor.upgrade(),
        ) else {
            trace!(message = M::NAME, "interface endpoint gone, dropping call");
            return;
        };

        let resolved = ResolvedMono {
            handler,
            receiver,
            receiver_executor,
            same_executor: link.mutual_executor,
        };
        dispatch_async::<M>(resolved, &sender, M::info(), args, lifetime, callback);
    }
}

impl<M: QueryMessage> Default for IfAsyncQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: QueryMessage> InterfaceField for IfAsyncQuery<M> {
    fn bind_field(&self, ctx: &BindContext) -> Self {
        let owner = self.slot.owner.lock().clone();
        let Some(owner) = owner else {
            panic!("interface query `{}` bound before being attached", M::NAME);
        };
        let mutual_executor = owner
            .executor
            .upgrade()
            .map(|executor| Arc::ptr_eq(&executor, &ctx.sender.executor))
            .unwrap_or(false);
        IfAsyncQuery {
            slot: Arc::clone(&self.slot),
            link: Some(IfLink {
                sender: Arc::downgrade(&ctx.sender),
                receiver: owner.component,
                receiver_executor: owner.executor,
                lifetime: ctx.lifetime.clone(),
                mutual_executor,
            }),
        }
    }

    fn attach_field(&self, ctx: &AttachContext) {
        *self.slot.owner.lock() = Some(IfOwner {
            component: ctx.component.clone(),
            executor: ctx.executor.clone(),
        });
    }
}

/// A deferred invocation of an interface async query. Executes when dropped,
/// like [`QueryInvoker`](crate::dispatch::QueryInvoker).
pub struct IfQueryInvoker<'q, M: QueryMessage> {
    query: &'q IfAsyncQuery<M>,
    args: Option<M::Args>,
    lifetime: LifetimeWeak,
    callback: Option<CallbackFn<M::Reply>>,
}

impl<'q, M: QueryMessage> IfQueryInvoker<'q, M> {
    /// Binds the callback of this call to `lifetime`.
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

    /// Chains this call into an outer [`CallbackResult`]; see
    /// [`QueryInvoker::with_successful_callback`](crate::dispatch::QueryInvoker::with_successful_callback).
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

impl<'q, M: QueryMessage> Drop for IfQueryInvoker<'q, M> {
    fn drop(&mut self) {
        if let Some(args) = self.args.take() {
            self.query
                .execute(args, self.lifetime.clone(), self.callback.take());
        }
    }
}

/// A synchronous query declared inside an interface.
pub struct IfSyncQuery<M: QueryMessage> {
    slot: Arc<IfSyncSlot<M>>,
    link: Option<IfLink>,
}

struct IfSyncSlot<M: QueryMessage> {
    handler: Mutex<Option<SyncHandler<M>>>,
    owner: Mutex<Option<IfOwner>>,
}

impl<M: QueryMessage> IfSyncQuery<M> {
    /// An unpublished query slot.
    pub fn new() -> Self {
        IfSyncQuery {
            slot: Arc::new(IfSyncSlot {
                handler: Mutex::new(None),
                owner: Mutex::new(None),
            }),
            link: None,
        }
    }

    /// Sets the handler. Called by the publishing component while building
    /// the interface value.
    pub fn publish(&self, handler: impl Fn(M::Args) -> M::Reply + Send + Sync + 'static) {
        *self.slot.handler.lock() = Some(Arc::new(handler));
    }

    /// Wraps the published handler with `filter`, which receives the
    /// arguments and the original handler and returns the reply.
    /// Invalidates every interface id of the owning component.
    pub fn prepend_filter(
        &self,
        filter: impl Fn(M::Args, SyncHandler<M>) -> M::Reply + Send + Sync + 'static,
    ) {
        {
            let mut slot = self.slot.handler.lock();
            let Some(next) = slot.clone() else {
                panic!("no handler published for interface query `{}`", M::NAME);
            };
            *slot = Some(Arc::new(move |args| filter(args, Arc::clone(&next))));
        }
        invalidate_owner_interfaces(&self.slot.owner);
    }

    /// Invokes the query through a bound proxy and returns its value.
    pub fn call(&self, args: M::Args) -> M::Reply {
        let link = self
            .link
            .as_ref()
            .expect("interface query invoked without a bound caller");

        let Some(handler) = self.slot.handler.lock().clone() else {
            panic!("no handler published for interface query `{}`", M::NAME);
        };

        let (Some(sender), Some(receiver)) = (link.sender.upgrade(), link.receiver.upgrade())
        else {
            panic!("interface endpoint gone for `{}`", M::NAME);
        };

        dispatch_sync::<M>(
            &handler,
            &receiver,
            link.mutual_executor,
            &sender.name,
            &M::info(),
            args,
            true,
        )
    }
}

impl<M: QueryMessage> Default for IfSyncQuery<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M: QueryMessage> InterfaceField for IfSyncQuery<M> {
    fn bind_field(&self, ctx: &BindContext) -> Self {
        let owner = self.slot.owner.lock().clone();
        let Some(owner) = owner else {
            panic!("interface query `{}` bound before being attached", M::NAME);
        };
        let mutual_executor = owner
            .executor
            .upgrade()
            .map(|executor| Arc::ptr_eq(&executor, &ctx.sender.executor))
            .unwrap_or(false);
        IfSyncQuery {
            slot: Arc::clone(&self.slot),
            link: Some(IfLink {
                sender: Arc::downgrade(&ctx.sender),
                receiver: owner.component,
                receiver_executor: owner.executor,
                lifetime: ctx.lifetime.clone(),
                mutual_executor,
            }),
        }
    }

    fn attach_field(&self, ctx: &AttachContext) {
        *self.slot.owner.lock() = Some(IfOwner {
            component: ctx.component.clone(),
            executor: ctx.executor.clone(),
        });
    }
}

/// A sender's cached handle to a published interface.
pub struct InterfaceClient<I: Interface> {
    iref: Arc<InterfaceRef<I>>,
}

impl<I: Interface> InterfaceClient<I> {
    pub(crate) fn new(iref: Arc<InterfaceRef<I>>) -> Self {
        InterfaceClient { iref }
    }

    /// The bound proxy. Panics if no single component publishes `I`.
    pub fn get(&self) -> Arc<I> {
        self.iref
            .resolve()
            .unwrap_or_else(|| panic!("no component publishes interface `{}`", I::NAME))
    }

    /// The bound proxy, or `None` when unresolved.
    pub fn try_get(&self) -> Option<Arc<I>> {
        self.iref.resolve()
    }

    /// Whether a publisher currently exists.
    pub fn reachable(&self) -> bool {
        self.iref.resolve().is_some()
    }
}
