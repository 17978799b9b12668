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

//! The three dispatch paths: synchronous queries, asynchronous queries with
//! result callbacks, and many-receiver events — plus the future adapter.

pub use self::async_query::{AsyncQuery, QueryInvoker};
pub use self::callback::CallbackResult;
pub use self::event::EventEmitter;
pub use self::future::QueryFuture;
pub use self::sync_query::SyncQuery;

pub(crate) use self::async_query::dispatch_async;
pub(crate) use self::callback::{CallbackFn, RouteInfo};
pub(crate) use self::future::future_for;
pub(crate) use self::sync_query::dispatch_sync;

mod async_query;
mod callback;
mod event;
mod future;
mod sync_query;
