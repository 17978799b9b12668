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

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crossbar::prelude::*;

use crate::setup::initialize_tracing;
use crate::setup::messages::Sum;

mod setup;

/// Like the cross-executor round trip, but the call carries its own
/// lifetime, and the lifetime is reset before the response is drained.
///
/// **Verification:** the handler still ran — there is no in-flight handler
/// cancellation — but the callback is dropped silently.
#[test]
fn expired_response_is_dropped() {
    initialize_tracing();
    let broker = Broker::new();
    let sender_executor = Executor::new();
    let receiver_executor = Executor::new();

    let receiver = Component::new("receiver", &broker, receiver_executor.clone());
    let handler_ran = Arc::new(AtomicBool::new(false));
    {
        let handler_ran = Arc::clone(&handler_ran);
        receiver.publish_async_query::<Sum>(move |(a, b), result| {
            handler_ran.store(true, Ordering::SeqCst);
            result.resolve(Ok(a + b));
        });
    }
    receiver.publish();

    let sender = Component::new("sender", &broker, sender_executor.clone());
    sender.publish();
    let sum = sender.lookup_async_query::<Sum>();

    let lifetime = Lifetime::new();
    let callback_ran = Arc::new(AtomicBool::new(false));
    {
        let callback_ran = Arc::clone(&callback_ran);
        sum.call((444, 555))
            .with_lifetime(&lifetime)
            .with_callback(move |_| callback_ran.store(true, Ordering::SeqCst));
    }

    receiver_executor.execute();
    assert!(handler_ran.load(Ordering::SeqCst));

    lifetime.reset();
    sender_executor.execute();

    assert!(!callback_ran.load(Ordering::SeqCst));
}

/// One reset cancels every callback bound to the lifetime, across executors
/// and batches.
#[test]
fn reset_cancels_all_pending_callbacks() {
    initialize_tracing();
    let broker = Broker::new();
    let sender_executor = Executor::new();
    let receiver_executor = Executor::new();

    let receiver = Component::new("receiver", &broker, receiver_executor.clone());
    receiver.publish_async_query::<Sum>(|(a, b), result| result.resolve(Ok(a + b)));
    receiver.publish();

    let sender = Component::new("sender", &broker, sender_executor.clone());
    sender.publish();
    let sum = sender.lookup_async_query::<Sum>();

    let lifetime = Lifetime::new();
    let delivered = Arc::new(AtomicUsize::new(0));
    for i in 0..5 {
        let delivered = Arc::clone(&delivered);
        sum.call((i, i))
            .with_lifetime(&lifetime)
            .with_callback(move |_| {
                delivered.fetch_add(1, Ordering::SeqCst);
            });
    }

    receiver_executor.execute();
    lifetime.reset();
    sender_executor.execute();
    receiver_executor.execute();
    sender_executor.execute();

    assert_eq!(delivered.load(Ordering::SeqCst), 0);
}

/// A handler holding a deferred `CallbackResult` can observe cancellation,
/// and a late resolve is dropped even on the direct path.
#[test]
fn cancellation_observable_through_callback_result() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();

    let receiver = Component::new("receiver", &broker, executor.clone());
    let parked: Arc<Mutex<Option<CallbackResult<i32>>>> = Arc::new(Mutex::new(None));
    {
        let parked = Arc::clone(&parked);
        receiver.publish_async_query::<Sum>(move |_, result| {
            *parked.lock().unwrap() = Some(result);
        });
    }
    receiver.publish();

    let sender = Component::new("sender", &broker, executor);
    sender.publish();
    let sum = sender.lookup_async_query::<Sum>();

    let lifetime = Lifetime::new();
    let delivered = Arc::new(AtomicBool::new(false));
    {
        let delivered = Arc::clone(&delivered);
        sum.call((444, 555))
            .with_lifetime(&lifetime)
            .with_callback(move |_| delivered.store(true, Ordering::SeqCst));
    }

    let result = parked.lock().unwrap().take().expect("handler parked the result");
    assert!(!result.canceled());

    lifetime.reset();
    assert!(result.canceled());

    result.resolve(Ok(999));
    assert!(!delivered.load(Ordering::SeqCst));
}

/// Dropping a lifetime expires its handles just like resetting it.
#[test]
fn dropping_lifetime_expires_handles() {
    let lifetime = Lifetime::new();
    let weak = lifetime.create_weak();
    assert!(!weak.expired());
    drop(lifetime);
    assert!(weak.expired());
}

/// Handles minted after a reset track the fresh token: the scope stays
/// usable, only older callbacks die.
#[test]
fn reset_only_expires_older_handles() {
    let lifetime = Lifetime::new();
    let old = lifetime.create_weak();
    lifetime.reset();
    let new = lifetime.create_weak();
    assert!(old.expired());
    assert!(!new.expired());
}

/// A query rebound to a session lifetime dies with the session while the
/// component-scoped original keeps working.
#[test]
fn with_scope_binds_calls_to_session() {
    initialize_tracing();
    let broker = Broker::new();
    let sender_executor = Executor::new();
    let receiver_executor = Executor::new();

    let receiver = Component::new("receiver", &broker, receiver_executor.clone());
    receiver.publish_async_query::<Sum>(|(a, b), result| result.resolve(Ok(a + b)));
    receiver.publish();

    let sender = Component::new("sender", &broker, sender_executor.clone());
    sender.publish();
    let sum = sender.lookup_async_query::<Sum>();

    let session = Lifetime::new();
    let session_sum = sum.with_scope(&session);

    let session_delivered = Arc::new(AtomicBool::new(false));
    let component_delivered = Arc::new(AtomicBool::new(false));
    {
        let session_delivered = Arc::clone(&session_delivered);
        session_sum
            .call((1, 2))
            .with_callback(move |_| session_delivered.store(true, Ordering::SeqCst));
    }
    {
        let component_delivered = Arc::clone(&component_delivered);
        sum.call((3, 4))
            .with_callback(move |_| component_delivered.store(true, Ordering::SeqCst));
    }

    receiver_executor.execute();
    session.reset();
    sender_executor.execute();

    assert!(!session_delivered.load(Ordering::SeqCst));
    assert!(component_delivered.load(Ordering::SeqCst));
}
