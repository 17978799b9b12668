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

//! Handler storage.
//!
//! Handlers are boxed closures behind `Arc`. Resolvers cache a clone of the
//! `Arc` at rebuild time, so invoking a cached handler touches no refcount
//! and stays valid even after the table entry is replaced (a filter prepend)
//! or the component unpublishes — the tables are deliberately not cleared
//! until the component is destroyed.

use std::sync::Arc;

use crate::dispatch::CallbackResult;
use crate::message::{EventMessage, QueryMessage};

/// A published synchronous query handler.
pub type SyncHandler<M> = Arc<
    dyn Fn(<M as QueryMessage>::Args) -> <M as QueryMessage>::Reply + Send + Sync,
>;

/// A published asynchronous query handler. Produces its result through the
/// [`CallbackResult`] it is handed.
pub type AsyncHandler<M> = Arc<
    dyn Fn(<M as QueryMessage>::Args, CallbackResult<<M as QueryMessage>::Reply>) + Send + Sync,
>;

/// A subscribed event handler. Receives the event by reference; remote
/// deliveries hand it a clone owned by the task.
pub type EventHandler<M> = Arc<dyn Fn(&M) + Send + Sync>;

// Concrete table entries, stored type-erased behind `dyn Any` and recovered
// by downcast keyed on the message type.

pub(crate) struct SyncEntry<M: QueryMessage> {
    pub(crate) handler: SyncHandler<M>,
}

pub(crate) struct AsyncEntry<M: QueryMessage> {
    pub(crate) handler: AsyncHandler<M>,
}

pub(crate) struct EventEntry<M: EventMessage> {
    pub(crate) handler: EventHandler<M>,
}
