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

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

use crossbar::prelude::*;

use crate::setup::messages::CalculatorApi;
use crate::setup::{initialize_tracing, RecordingListener};

mod setup;

fn publish_calculator(broker: &Broker, executor: ExecutorHandle) -> Component {
    let calculator = Component::new("calculator", broker, executor);
    let api = CalculatorApi::unpublished();
    api.sum.publish(|(a, b), result| result.resolve(Ok(a + b)));
    api.magnitude.publish(|(value,)| value.abs());
    calculator.publish_interface(api);
    calculator.publish();
    calculator
}

/// Same-executor round trip through both query styles of a published
/// interface.
#[test]
fn interface_queries_resolve_same_executor() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let _calculator = publish_calculator(&broker, executor.clone());

    let client_component = Component::new("client", &broker, executor);
    client_component.publish();
    let api = client_component.lookup_interface::<CalculatorApi>();

    assert!(api.reachable());
    assert_eq!(api.get().magnitude.call((-5,)), 5);

    let response = Arc::new(AtomicI32::new(0));
    {
        let response = Arc::clone(&response);
        api.get()
            .sum
            .call((444, 555))
            .with_callback(move |result| response.store(result.unwrap(), Ordering::SeqCst));
    }
    assert_eq!(response.load(Ordering::SeqCst), 999);
}

/// Cross-executor interface async calls hop executors like standalone async
/// queries.
#[test]
fn interface_async_crosses_executors() {
    initialize_tracing();
    let broker = Broker::new();
    let client_executor = Executor::new();
    let calculator_executor = Executor::new();
    let _calculator = publish_calculator(&broker, calculator_executor.clone());

    let client_component = Component::new("client", &broker, client_executor.clone());
    client_component.publish();
    let api = client_component.lookup_interface::<CalculatorApi>();

    let response = Arc::new(AtomicI32::new(0));
    {
        let response = Arc::clone(&response);
        api.get()
            .sum
            .call((40, 2))
            .with_callback(move |result| response.store(result.unwrap(), Ordering::SeqCst));
    }

    assert_eq!(response.load(Ordering::SeqCst), 0);
    calculator_executor.execute();
    client_executor.execute();
    assert_eq!(response.load(Ordering::SeqCst), 42);
}

/// The proxy caches its dispatch state: repeat calls hit no broker rebuild
/// (the same proxy instance keeps answering), and the proxy survives until
/// the interface id is invalidated.
#[test]
fn proxy_is_cached_between_calls() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let _calculator = publish_calculator(&broker, executor.clone());

    let client_component = Component::new("client", &broker, executor);
    client_component.publish();
    let api = client_component.lookup_interface::<CalculatorApi>();

    let first = api.get();
    let second = api.get();
    assert!(Arc::ptr_eq(&first, &second));
}

/// A filter prepended through the publishing side short-circuits the
/// original handler for existing clients.
#[test]
fn interface_filter_short_circuits() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();

    let calculator = Component::new("calculator", &broker, executor.clone());
    let api = CalculatorApi::unpublished();
    let handler_ran = Arc::new(AtomicBool::new(false));
    {
        let handler_ran = Arc::clone(&handler_ran);
        api.sum.publish(move |(a, b), result| {
            handler_ran.store(true, Ordering::SeqCst);
            result.resolve(Ok(a + b));
        });
    }
    api.magnitude.publish(|(value,)| value.abs());
    calculator.publish_interface(api);
    calculator.publish();

    let client_component = Component::new("client", &broker, executor);
    client_component.publish();
    let client = client_component.lookup_interface::<CalculatorApi>();

    // Resolve once so the client holds a bound proxy.
    let warmup = Arc::new(AtomicI32::new(0));
    {
        let warmup = Arc::clone(&warmup);
        client
            .get()
            .sum
            .call((1, 1))
            .with_callback(move |result| warmup.store(result.unwrap(), Ordering::SeqCst));
    }
    assert_eq!(warmup.load(Ordering::SeqCst), 2);

    // Prepend through the proxy: it lands on the published handler slot and
    // invalidates every interface id of the calculator.
    client.get().sum.prepend_filter(|_, result, _next| {
        result.resolve(Ok(123));
    });

    handler_ran.store(false, Ordering::SeqCst);
    let filtered = Arc::new(AtomicI32::new(0));
    {
        let filtered = Arc::clone(&filtered);
        client
            .get()
            .sum
            .call((444, 555))
            .with_callback(move |result| filtered.store(result.unwrap(), Ordering::SeqCst));
    }
    assert_eq!(filtered.load(Ordering::SeqCst), 123);
    assert!(!handler_ran.load(Ordering::SeqCst));
}

/// The interface sync path notifies the publisher's listener with the
/// `Request`/`Response` invoke pair on the mutual-executor path.
#[test]
fn interface_sync_notifies_listener() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let calculator = publish_calculator(&broker, executor.clone());

    let listener = Arc::new(RecordingListener::default());
    calculator.set_listener(listener.clone());

    let client_component = Component::new("client", &broker, executor);
    client_component.publish();
    let api = client_component.lookup_interface::<CalculatorApi>();

    assert_eq!(api.get().magnitude.call((-3,)), 3);
    assert_eq!(
        listener.invoked_kinds(),
        vec![DispatchKind::Request, DispatchKind::Response]
    );
}

/// Unpublishing the provider expires client proxies.
#[test]
fn unpublish_breaks_interface_resolution() {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let calculator = publish_calculator(&broker, executor.clone());

    let client_component = Component::new("client", &broker, executor);
    client_component.publish();
    let api = client_component.lookup_interface::<CalculatorApi>();
    assert!(api.reachable());

    calculator.unpublish();
    assert!(!api.reachable());
    assert!(api.try_get().is_none());
}
