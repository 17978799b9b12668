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

//! Future adapter over the async callback path.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::task::AtomicWaker;
use parking_lot::Mutex;

use crate::common::QueryResult;
use crate::dispatch::callback::CallbackFn;
use crate::dispatch::AsyncQuery;
use crate::message::QueryMessage;

struct FutureShared<T> {
    result: Mutex<Option<QueryResult<T>>>,
    waker: AtomicWaker,
}

/// Builds a future and hands the matching resolver callback to `invoke`,
/// which is expected to fire the underlying query with it.
pub(crate) fn future_for<T: Send + 'static>(
    invoke: impl FnOnce(CallbackFn<T>),
) -> QueryFuture<T> {
    let shared = Arc::new(FutureShared {
        result: Mutex::new(None),
        waker: AtomicWaker::new(),
    });
    let resolver = Arc::clone(&shared);
    invoke(Box::new(move |result| {
        *resolver.result.lock() = Some(result);
        resolver.waker.wake();
    }));
    QueryFuture { shared }
}

/// A query result as a [`Future`].
///
/// Resolves once the response leg delivers the result on the sender's
/// executor. A call whose lifetime expires before the response arrives never
/// resolves — cancellation surfaces as a future that stays pending, the
/// awaitable twin of the silently dropped callback.
pub struct QueryFuture<T: Send + 'static> {
    shared: Arc<FutureShared<T>>,
}

impl<M: QueryMessage> AsyncQuery<M> {
    /// Invokes the query and returns a future of its result.
    ///
    /// Equivalent to `call(args).with_callback(resolver)` where the resolver
    /// fulfills the future.
    pub fn query(&self, args: M::Args) -> QueryFuture<M::Reply> {
        future_for(|callback| {
            let _ = self.call(args).with_callback(callback);
        })
    }
}

impl<T: Send + 'static> Future for QueryFuture<T> {
    type Output = QueryResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.shared.waker.register(cx.waker());
        match self.shared.result.lock().take() {
            Some(result) => Poll::Ready(result),
            None => Poll::Pending,
        }
    }
}
