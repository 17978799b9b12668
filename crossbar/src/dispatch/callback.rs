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

use std::sync::Weak;

use tracing::trace;

use crate::common::{DispatchKind, LifetimeWeak, QueryResult};
use crate::component::ComponentCore;
use crate::executor::ExecutorHandle;
use crate::message::MessageInfo;

pub(crate) type CallbackFn<T> = Box<dyn FnOnce(QueryResult<T>) + Send>;

/// Listener bookkeeping for the response leg: who asked, who answered.
pub(crate) struct RouteInfo {
    /// The original caller; the response notification fires on its listener.
    pub(crate) requester: Weak<ComponentCore>,
    pub(crate) responder_name: String,
    pub(crate) info: MessageInfo,
}

/// The object an async handler calls to return its result.
///
/// Created by the runtime per invocation and handed to the handler alongside
/// the arguments. Knows how to get the result back to the caller:
///
/// - cross-executor: enqueue a response task on the *caller's* executor;
///   the task drops the callback silently if the caller's lifetime expired
///   in the meantime;
/// - same executor: invoke the callback inline, after the same lifetime
///   check.
///
/// A handler may hold on to the `CallbackResult` and resolve it much later —
/// that is the whole point of the async path. [`canceled`] lets it skip
/// producing an expensive result nobody will see.
///
/// [`canceled`]: CallbackResult::canceled
pub struct CallbackResult<T: Send + 'static> {
    response_executor: Option<ExecutorHandle>,
    lifetime: LifetimeWeak,
    route: Option<RouteInfo>,
    callback: CallbackFn<T>,
}

impl<T: Send + 'static> CallbackResult<T> {
    pub(crate) fn with_route(
        response_executor: Option<ExecutorHandle>,
        lifetime: LifetimeWeak,
        route: Option<RouteInfo>,
        callback: CallbackFn<T>,
    ) -> Self {
        CallbackResult {
            response_executor,
            lifetime,
            route,
            callback,
        }
    }

    /// Creates a result object that invokes `callback` directly, guarded by
    /// `lifetime`. Useful when adapting the callback path by hand, e.g. a
    /// coalescing handler that fans one underlying result out to several
    /// stored `CallbackResult`s.
    pub fn new_direct(
        lifetime: LifetimeWeak,
        callback: impl FnOnce(QueryResult<T>) + Send + 'static,
    ) -> Self {
        CallbackResult {
            response_executor: None,
            lifetime,
            route: None,
            callback: Box::new(callback),
        }
    }

    /// Whether the caller's lifetime has already expired. The result of a
    /// canceled query is dropped unseen; handlers may check this before
    /// doing expensive work.
    pub fn canceled(&self) -> bool {
        self.lifetime.expired()
    }

    /// Delivers the result to the caller.
    pub fn resolve(self, result: QueryResult<T>) {
        let CallbackResult {
            response_executor,
            lifetime,
            route,
            callback,
        } = self;

        match response_executor {
            Some(executor) => {
                notify(&route, DispatchKind::Response, Hook::Enqueue);
                executor.enqueue(
                    ResponseData {
                        result,
                        lifetime,
                        callback,
                    },
                    run_response::<T>,
                );
            }
            None => {
                notify(&route, DispatchKind::Response, Hook::Invoke);
                if lifetime.expired() {
                    trace!("dropping response for expired lifetime");
                } else {
                    callback(result);
                }
            }
        }
    }
}

enum Hook {
    Enqueue,
    Invoke,
}

fn notify(route: &Option<RouteInfo>, kind: DispatchKind, hook: Hook) {
    let Some(route) = route else { return };
    let Some(requester) = route.requester.upgrade() else {
        return;
    };
    let Some(listener) = requester.listener() else {
        return;
    };
    match hook {
        Hook::Enqueue => {
            listener.on_enqueue(&route.responder_name, &requester.name, &route.info, kind)
        }
        Hook::Invoke => {
            listener.on_invoke(&route.responder_name, &requester.name, &route.info, kind)
        }
    }
}

struct ResponseData<T: Send + 'static> {
    result: QueryResult<T>,
    lifetime: LifetimeWeak,
    callback: CallbackFn<T>,
}

fn run_response<T: Send + 'static>(data: ResponseData<T>) {
    if data.lifetime.expired() {
        trace!("dropping response for expired lifetime");
        return;
    }
    (data.callback)(data.result);
}
