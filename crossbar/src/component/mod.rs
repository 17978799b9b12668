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

//! Components and their lifecycle.
//!
//! A component talks to other components by sending messages through a
//! broker. It follows this lifecycle:
//!
//! 1. **Constructed** — dependencies injected; other components might not
//!    exist yet. Handlers are registered and queries looked up here.
//! 2. **Published** — handlers registered with the broker; references to
//!    other components resolve lazily from now on.
//! 3. **Unpublished** — broker associations removed and own resolver caches
//!    reset. Handler tables are deliberately *not* cleared, so cross-thread
//!    in-flight calls holding direct handler references complete safely.
//! 4. **Destroyed** — handler tables released.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use tracing::{instrument, trace};

pub use handlers::{AsyncHandler, EventHandler, SyncHandler};
use handlers::{AsyncEntry, EventEntry, SyncEntry};

use crate::broker::Broker;
use crate::common::{Lifetime, Listener};
use crate::dispatch::{AsyncQuery, CallbackResult, EventEmitter, SyncQuery};
use crate::executor::ExecutorHandle;
use crate::interface::{AttachContext, Interface, InterfaceClient};
use crate::message::{EventMessage, MessageId, QueryMessage};
use crate::resolve::{
    AsyncMarker, DependencyDirection, DependencyInfo, DependencyKind, InterfaceRef, MonoRef,
    PolyRef, ResolverRef, SyncMarker,
};

pub mod handlers;

/// Construction-time settings of a [`Component`].
#[derive(Clone)]
pub struct ComponentConfig {
    name: String,
    listener: Option<Arc<dyn Listener>>,
    allow_direct_call_async: bool,
    allow_locking_calls_sync: bool,
}

impl ComponentConfig {
    /// Settings with the given component name and all defaults: no listener,
    /// direct same-executor async calls allowed, cross-executor sync calls
    /// allowed.
    pub fn new(name: impl Into<String>) -> Self {
        ComponentConfig {
            name: name.into(),
            listener: None,
            allow_direct_call_async: true,
            allow_locking_calls_sync: true,
        }
    }

    /// Attaches a listener from the start.
    pub fn listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Whether same-executor async calls may skip the queue and run inline.
    /// Disabling forces every async call through the executor.
    pub fn allow_direct_call_async(mut self, allow: bool) -> Self {
        self.allow_direct_call_async = allow;
        self
    }

    /// Whether other executors may call this component synchronously under
    /// its lock. Disabling turns such calls into errors, which breaks
    /// potential lock cycles loudly instead of deadlocking.
    pub fn allow_locking_calls_sync(mut self, allow: bool) -> Self {
        self.allow_locking_calls_sync = allow;
        self
    }
}

/// Shared state of one component. Reached through [`Component`] handles and
/// through the weak references the broker and resolvers hold.
pub(crate) struct ComponentCore {
    pub(crate) name: String,
    pub(crate) broker: Broker,
    pub(crate) executor: ExecutorHandle,
    /// Component-level lock for synchronous queries across executors.
    /// Reentrant: a sync handler may synchronously query its own component.
    pub(crate) lock: ReentrantMutex<()>,
    pub(crate) default_lifetime: Lifetime,
    pub(crate) allow_direct_call_async: bool,
    pub(crate) allow_locking_calls_sync: bool,
    listener: Mutex<Option<Arc<dyn Listener>>>,

    sync_handlers: Mutex<HashMap<MessageId, Box<dyn Any + Send + Sync>>>,
    async_handlers: Mutex<HashMap<MessageId, Box<dyn Any + Send + Sync>>>,
    event_handlers: Mutex<HashMap<MessageId, Box<dyn Any + Send + Sync>>>,
    interfaces: Mutex<HashMap<MessageId, Arc<dyn Any + Send + Sync>>>,
    interface_ids: Mutex<Vec<MessageId>>,
    executor_overrides: Mutex<HashMap<MessageId, ExecutorHandle>>,

    /// Resolvers created by this component, for dependency reporting and
    /// cache reset at unpublish.
    resolvers: Mutex<Vec<Arc<dyn ResolverRef>>>,
    exports: Mutex<Vec<DependencyInfo>>,
    /// Message ids to (re-)associate with the broker on publish.
    registered_ids: Mutex<Vec<MessageId>>,
    published: AtomicBool,
}

impl ComponentCore {
    pub(crate) fn listener(&self) -> Option<Arc<dyn Listener>> {
        self.listener.lock().clone()
    }

    pub(crate) fn sync_handler<M: QueryMessage>(&self) -> Option<SyncHandler<M>> {
        self.sync_handlers
            .lock()
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<SyncEntry<M>>())
            .map(|entry| Arc::clone(&entry.handler))
    }

    pub(crate) fn async_handler<M: QueryMessage>(&self) -> Option<AsyncHandler<M>> {
        self.async_handlers
            .lock()
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<AsyncEntry<M>>())
            .map(|entry| Arc::clone(&entry.handler))
    }

    pub(crate) fn event_handler<M: EventMessage>(&self) -> Option<EventHandler<M>> {
        self.event_handlers
            .lock()
            .get(&TypeId::of::<M>())
            .and_then(|entry| entry.downcast_ref::<EventEntry<M>>())
            .map(|entry| Arc::clone(&entry.handler))
    }

    pub(crate) fn interface<I: Interface>(&self) -> Option<Arc<I>> {
        self.interfaces
            .lock()
            .get(&TypeId::of::<I>())
            .cloned()
            .and_then(|any| any.downcast::<I>().ok())
    }

    /// The executor a message should be handled on: the per-message override
    /// if one was registered, the component default otherwise.
    pub(crate) fn executor_for(&self, id: MessageId) -> ExecutorHandle {
        self.executor_overrides
            .lock()
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.executor))
    }

    /// Expires every cached proxy of every interface this component
    /// publishes. Coarse on purpose: there is no reverse map from a query to
    /// the interface containing it.
    pub(crate) fn invalidate_interfaces(&self) {
        for id in self.interface_ids.lock().iter() {
            self.broker.invalidate(*id);
        }
    }
}

impl Drop for ComponentCore {
    fn drop(&mut self) {
        if self.published.load(Ordering::Acquire) {
            self.broker
                .disassociate_everything(self as *const ComponentCore);
        }
    }
}

/// A handle to a component. Cheap to clone; all clones address the same
/// component.
#[derive(Clone)]
pub struct Component {
    core: Arc<ComponentCore>,
}

impl Component {
    /// Creates a component with default settings on the given executor.
    pub fn new(name: impl Into<String>, broker: &Broker, executor: ExecutorHandle) -> Self {
        Self::with_config(ComponentConfig::new(name), broker, executor)
    }

    /// Creates a component from explicit settings.
    pub fn with_config(config: ComponentConfig, broker: &Broker, executor: ExecutorHandle) -> Self {
        Component {
            core: Arc::new(ComponentCore {
                name: config.name,
                broker: broker.clone(),
                executor,
                lock: ReentrantMutex::new(()),
                default_lifetime: Lifetime::new(),
                allow_direct_call_async: config.allow_direct_call_async,
                allow_locking_calls_sync: config.allow_locking_calls_sync,
                listener: Mutex::new(config.listener),
                sync_handlers: Mutex::new(HashMap::new()),
                async_handlers: Mutex::new(HashMap::new()),
                event_handlers: Mutex::new(HashMap::new()),
                interfaces: Mutex::new(HashMap::new()),
                interface_ids: Mutex::new(Vec::new()),
                executor_overrides: Mutex::new(HashMap::new()),
                resolvers: Mutex::new(Vec::new()),
                exports: Mutex::new(Vec::new()),
                registered_ids: Mutex::new(Vec::new()),
                published: AtomicBool::new(false),
            }),
        }
    }

    /// The component's name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The component's default executor.
    pub fn executor(&self) -> &ExecutorHandle {
        &self.core.executor
    }

    /// The lifetime async callbacks bind to by default.
    pub fn default_lifetime(&self) -> &Lifetime {
        &self.core.default_lifetime
    }

    /// Attaches a listener observing this component's message traffic.
    pub fn set_listener(&self, listener: Arc<dyn Listener>) {
        *self.core.listener.lock() = Some(listener);
    }

    /// Whether the component is currently published.
    pub fn is_published(&self) -> bool {
        self.core.published.load(Ordering::Acquire)
    }

    // --- publication -----------------------------------------------------

    /// Stores a synchronous handler for `M`.
    pub fn publish_sync_query<M: QueryMessage>(
        &self,
        handler: impl Fn(M::Args) -> M::Reply + Send + Sync + 'static,
    ) {
        self.core.sync_handlers.lock().insert(
            TypeId::of::<M>(),
            Box::new(SyncEntry::<M> {
                handler: Arc::new(handler),
            }),
        );
        self.record_export(DependencyKind::SyncQuery, M::info());
        self.register(TypeId::of::<M>());
    }

    /// Stores an asynchronous handler for `M`. The handler produces its
    /// result through the [`CallbackResult`] it receives — immediately or
    /// long after returning.
    pub fn publish_async_query<M: QueryMessage>(
        &self,
        handler: impl Fn(M::Args, CallbackResult<M::Reply>) + Send + Sync + 'static,
    ) {
        self.core.async_handlers.lock().insert(
            TypeId::of::<M>(),
            Box::new(AsyncEntry::<M> {
                handler: Arc::new(handler),
            }),
        );
        self.record_export(DependencyKind::AsyncQuery, M::info());
        self.register(TypeId::of::<M>());
    }

    /// Like [`publish_async_query`](Self::publish_async_query), but requests
    /// for `M` are handled on `executor` instead of the component default.
    pub fn publish_async_query_on<M: QueryMessage>(
        &self,
        executor: ExecutorHandle,
        handler: impl Fn(M::Args, CallbackResult<M::Reply>) + Send + Sync + 'static,
    ) {
        self.core
            .executor_overrides
            .lock()
            .insert(TypeId::of::<M>(), executor);
        self.publish_async_query::<M>(handler);
    }

    /// Subscribes a handler to the event `M`.
    pub fn subscribe_event<M: EventMessage>(
        &self,
        handler: impl Fn(&M) + Send + Sync + 'static,
    ) {
        self.core.event_handlers.lock().insert(
            TypeId::of::<M>(),
            Box::new(EventEntry::<M> {
                handler: Arc::new(handler),
            }),
        );
        self.record_export(DependencyKind::Event, M::info());
        self.register(TypeId::of::<M>());
    }

    /// Publishes an interface: the bundle becomes discoverable under the
    /// interface's own message id, and its query fields are wired to this
    /// component.
    pub fn publish_interface<I: Interface>(&self, interface: I) {
        interface.attach(&AttachContext {
            component: Arc::downgrade(&self.core),
            executor: Arc::downgrade(&self.core.executor),
        });
        let id = TypeId::of::<I>();
        self.core
            .interfaces
            .lock()
            .insert(id, Arc::new(interface) as Arc<dyn Any + Send + Sync>);
        self.core.interface_ids.lock().push(id);
        self.record_export(DependencyKind::Interface, I::info());
        self.register(id);
    }

    /// Wraps the published async handler for `M` with `filter`, which
    /// receives the arguments, the result object, and the previous handler,
    /// and decides whether and how to call it.
    ///
    /// The broker snapshot for `M` is invalidated so every cached resolver
    /// picks the new handler up on its next lookup. Calls already resolved
    /// and in flight complete against the unfiltered handler.
    pub fn prepend_async_query_filter<M: QueryMessage>(
        &self,
        filter: impl Fn(M::Args, CallbackResult<M::Reply>, AsyncHandler<M>) + Send + Sync + 'static,
    ) {
        let id = TypeId::of::<M>();
        {
            let mut table = self.core.async_handlers.lock();
            let Some(current) = table
                .get(&id)
                .and_then(|entry| entry.downcast_ref::<AsyncEntry<M>>())
                .map(|entry| Arc::clone(&entry.handler))
            else {
                panic!("no async handler published for `{}`", M::NAME);
            };
            table.insert(
                id,
                Box::new(AsyncEntry::<M> {
                    handler: Arc::new(move |args, result| {
                        filter(args, result, Arc::clone(&current))
                    }),
                }),
            );
        }
        self.core.broker.invalidate(id);
    }

    // --- lookups ----------------------------------------------------------

    /// A cached reference to the single synchronous handler of `M`.
    pub fn lookup_sync_query<M: QueryMessage>(&self) -> SyncQuery<M> {
        let mono = Arc::new(MonoRef::<M, SyncMarker>::new(
            self.core.broker.clone(),
            Arc::downgrade(&self.core),
        ));
        self.core
            .resolvers
            .lock()
            .push(Arc::clone(&mono) as Arc<dyn ResolverRef>);
        SyncQuery::new(mono, Arc::downgrade(&self.core))
    }

    /// A cached reference to the single asynchronous handler of `M`, bound
    /// to this component's default lifetime.
    pub fn lookup_async_query<M: QueryMessage>(&self) -> AsyncQuery<M> {
        let mono = Arc::new(MonoRef::<M, AsyncMarker>::new(
            self.core.broker.clone(),
            Arc::downgrade(&self.core),
        ));
        self.core
            .resolvers
            .lock()
            .push(Arc::clone(&mono) as Arc<dyn ResolverRef>);
        AsyncQuery::new(
            mono,
            Arc::downgrade(&self.core),
            self.core.default_lifetime.view(),
        )
    }

    /// A cached emitter for the event `M`.
    pub fn lookup_event<M: EventMessage>(&self) -> EventEmitter<M> {
        let poly = Arc::new(PolyRef::<M>::new(
            self.core.broker.clone(),
            Arc::downgrade(&self.core),
        ));
        self.core
            .resolvers
            .lock()
            .push(Arc::clone(&poly) as Arc<dyn ResolverRef>);
        EventEmitter::new(poly, Arc::downgrade(&self.core))
    }

    /// A cached client of the interface `I`.
    pub fn lookup_interface<I: Interface>(&self) -> InterfaceClient<I> {
        let iref = Arc::new(InterfaceRef::<I>::new(
            self.core.broker.clone(),
            Arc::downgrade(&self.core),
        ));
        self.core
            .resolvers
            .lock()
            .push(Arc::clone(&iref) as Arc<dyn ResolverRef>);
        InterfaceClient::new(iref)
    }

    // --- lifecycle ---------------------------------------------------------

    /// Registers every stored handler with the broker, making the component
    /// discoverable. Idempotent.
    #[instrument(skip(self), fields(component = %self.core.name))]
    pub fn publish(&self) {
        if self.core.published.swap(true, Ordering::AcqRel) {
            return;
        }
        trace!("publishing");
        for id in self.core.registered_ids.lock().iter() {
            self.core.broker.associate(*id, Arc::downgrade(&self.core));
        }
    }

    /// Removes every broker association and resets this component's own
    /// resolver caches. Handler tables are kept — in-flight calls that
    /// already resolved a direct handler reference complete safely.
    #[instrument(skip(self), fields(component = %self.core.name))]
    pub fn unpublish(&self) {
        if !self.core.published.swap(false, Ordering::AcqRel) {
            return;
        }
        trace!("unpublishing");
        self.core
            .broker
            .disassociate_everything(Arc::as_ptr(&self.core));
        for resolver in self.core.resolvers.lock().iter() {
            resolver.reset();
        }
    }

    /// Describes this component's dependency edges: everything it publishes
    /// plus everything it looks up, with the lookups force-resolved so the
    /// report reflects the current composition.
    pub fn dependencies(&self) -> Vec<DependencyInfo> {
        let mut edges = self.core.exports.lock().clone();
        for resolver in self.core.resolvers.lock().iter() {
            resolver.force_resolve();
            edges.push(resolver.describe_dependency());
        }
        edges
    }

    fn record_export(&self, kind: DependencyKind, info: crate::message::MessageInfo) {
        self.core.exports.lock().push(DependencyInfo {
            direction: DependencyDirection::Export,
            kind,
            info,
            resolved_targets: Vec::new(),
        });
    }

    fn register(&self, id: MessageId) {
        let mut ids = self.core.registered_ids.lock();
        if !ids.contains(&id) {
            ids.push(id);
            if self.core.published.load(Ordering::Acquire) {
                self.core.broker.associate(id, Arc::downgrade(&self.core));
            }
        }
    }
}
