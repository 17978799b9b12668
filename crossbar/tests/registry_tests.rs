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

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use anyhow::Result;
use crossbar::prelude::*;

use crate::setup::initialize_tracing;
use crate::setup::messages::Sum;

mod setup;

/// The registry publishes components on add and unpublishes them all, in
/// reverse order, when it drops.
#[test]
fn registry_manages_publication_lifecycle() -> Result<()> {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();

    let outside = Component::new("outside", &broker, executor.clone());
    outside.publish();
    let sum = outside.lookup_sync_query::<Sum>();
    sum.set_fallback(|_| -1);

    {
        let mut registry = Registry::new();
        let receiver = Component::new("receiver", &broker, executor.clone());
        receiver.publish_sync_query::<Sum>(|(a, b)| a + b);
        let receiver = registry.add(receiver);
        assert!(receiver.is_published());
        assert_eq!(sum.call((1, 2)), 3);
    }

    // Registry dropped: everything unpublished.
    assert_eq!(sum.call((1, 2)), -1);
    Ok(())
}

/// Dependency verification passes for a complete composition and names the
/// missing message for an incomplete one.
#[test]
fn verify_dependencies_reports_missing_imports() -> Result<()> {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let mut registry = Registry::new();

    let sender = Component::new("sender", &broker, executor.clone());
    let _sum = sender.lookup_sync_query::<Sum>();
    registry.add(sender);

    let unresolved = registry
        .verify_dependencies()
        .expect_err("Sum has no publisher yet");
    assert_eq!(unresolved.len(), 1);
    assert!(unresolved[0].contains("Sum"), "got: {}", unresolved[0]);
    assert!(unresolved[0].contains("sender"), "got: {}", unresolved[0]);

    let receiver = Component::new("receiver", &broker, executor);
    receiver.publish_sync_query::<Sum>(|(a, b)| a + b);
    registry.add(receiver);

    assert!(registry.verify_dependencies().is_ok());
    Ok(())
}

/// The dependency dump records exports and resolved imports with their
/// targets.
#[test]
fn dependency_dump_names_resolved_targets() -> Result<()> {
    initialize_tracing();
    let broker = Broker::new();
    let executor = Executor::new();
    let mut registry = Registry::new();

    let receiver = Component::new("receiver", &broker, executor.clone());
    receiver.publish_sync_query::<Sum>(|(a, b)| a + b);
    registry.add(receiver);

    let sender = Component::new("sender", &broker, executor);
    let _sum = sender.lookup_sync_query::<Sum>();
    registry.add(sender);

    let dump = registry.dependencies();
    let (_, receiver_edges) = dump.iter().find(|(name, _)| name == "receiver").unwrap();
    assert!(receiver_edges.iter().any(|edge| {
        edge.direction == DependencyDirection::Export
            && edge.kind == DependencyKind::SyncQuery
            && edge.info.name == "Sum"
    }));

    let (_, sender_edges) = dump.iter().find(|(name, _)| name == "sender").unwrap();
    assert!(sender_edges.iter().any(|edge| {
        edge.direction == DependencyDirection::Import
            && edge.kind == DependencyKind::SyncQuery
            && edge.resolved_targets == vec!["receiver".to_string()]
    }));
    Ok(())
}

/// Unpublish safety: a request already enqueued keeps its direct handler
/// reference and completes even though the receiver unpublished in between.
#[test]
fn unpublish_does_not_invalidate_inflight_requests() -> Result<()> {
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

    let response = Arc::new(AtomicI32::new(0));
    {
        let response = Arc::clone(&response);
        sum.call((444, 555))
            .with_callback(move |result| response.store(result.unwrap(), Ordering::SeqCst));
    }

    // The request is parked on the receiver's executor; unpublish now.
    receiver.unpublish();

    receiver_executor.execute();
    sender_executor.execute();

    assert_eq!(response.load(Ordering::SeqCst), 999);
    Ok(())
}
