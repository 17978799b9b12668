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

#![allow(dead_code, unused_doc_comments)]

//! The request-coalescing pattern: a handler that keys outstanding
//! `CallbackResult`s by argument so concurrent identical requests share one
//! underlying operation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbar::prelude::*;

use crate::setup::initialize_tracing;
use crate::setup::messages::LongOperation;

mod setup;

type PendingMap = Arc<Mutex<HashMap<i32, Vec<CallbackResult<i32>>>>>;

/// N concurrent calls with the same key cause exactly one underlying
/// invocation; resolving it fans equal results out to every caller.
#[test]
fn concurrent_requests_are_coalesced() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();

    let receiver = Component::new("receiver", &broker, executor.clone());
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let invocations = Arc::new(AtomicUsize::new(0));
    // The deferred completion of the one in-flight operation.
    let operation: Arc<Mutex<Option<CallbackResult<i32>>>> = Arc::new(Mutex::new(None));

    {
        let pending = Arc::clone(&pending);
        let invocations = Arc::clone(&invocations);
        let operation = Arc::clone(&operation);
        let lifetime = receiver.default_lifetime().create_weak();
        receiver.publish_async_query::<LongOperation>(move |(key,), result| {
            let mut map = pending.lock().unwrap();
            let callbacks = map.entry(key).or_default();
            callbacks.push(result);
            if callbacks.len() > 1 {
                // Someone is already working on this key.
                return;
            }
            drop(map);

            invocations.fetch_add(1, Ordering::SeqCst);
            let fanout_pending = Arc::clone(&pending);
            let completion = CallbackResult::new_direct(lifetime.clone(), move |outcome| {
                let callbacks = fanout_pending
                    .lock()
                    .unwrap()
                    .remove(&key)
                    .unwrap_or_default();
                for callback in callbacks {
                    callback.resolve(outcome.clone());
                }
            });
            *operation.lock().unwrap() = Some(completion);
        });
    }
    receiver.publish();

    let sender = Component::new("sender", &broker, executor);
    sender.publish();
    let long_operation = sender.lookup_async_query::<LongOperation>();

    let response1 = Arc::new(AtomicI32::new(0));
    let response2 = Arc::new(AtomicI32::new(0));
    {
        let response1 = Arc::clone(&response1);
        long_operation
            .call((123,))
            .with_callback(move |result| response1.store(result.unwrap(), Ordering::SeqCst));
    }
    {
        let response2 = Arc::clone(&response2);
        long_operation
            .call((123,))
            .with_callback(move |result| response2.store(result.unwrap(), Ordering::SeqCst));
    }

    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    let completion = operation.lock().unwrap().take().expect("operation started");
    completion.resolve(Ok(535));

    assert_eq!(response1.load(Ordering::SeqCst), 535);
    assert_eq!(response2.load(Ordering::SeqCst), 535);
}
