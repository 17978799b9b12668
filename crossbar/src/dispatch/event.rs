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

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use tracing::error;

use crate::common::DispatchKind;
use crate::component::handlers::EventHandler;
use crate::component::ComponentCore;
use crate::message::EventMessage;
use crate::resolve::PolyRef;

/// Proxy for emitting an event to every subscribed component.
///
/// Same-executor receivers see the event inline, by reference, before
/// [`emit`](EventEmitter::emit) returns; remote receivers get their own
/// clone enqueued on their executor. No receivers at all is a silent no-op.
///
/// Fan-out is best effort: a panicking handler is caught and reported, and
/// dispatch continues with the remaining receivers. Ordering between
/// different receivers is unspecified; deliveries to a single receiver
/// arrive in emit order.
pub struct EventEmitter<M: EventMessage> {
    poly: Arc<PolyRef<M>>,
    owner: Weak<ComponentCore>,
}

impl<M: EventMessage> EventEmitter<M> {
    pub(crate) fn new(poly: Arc<PolyRef<M>>, owner: Weak<ComponentCore>) -> Self {
        EventEmitter { poly, owner }
    }

    /// Delivers `event` to every resolved receiver.
    pub fn emit(&self, event: M) {
        let info = M::info();
        let sender = self.owner.upgrade();
        let listener = sender.as_ref().and_then(|sender| sender.listener());
        let sender_name = sender
            .as_ref()
            .map(|sender| sender.name.as_str())
            .unwrap_or_default();

        for entry in self.poly.resolve() {
            if entry.same_executor {
                if let Some(listener) = &listener {
                    listener.on_invoke(sender_name, &entry.receiver.name, &info, DispatchKind::Event);
                }
                let handler = &entry.handler;
                if catch_unwind(AssertUnwindSafe(|| handler(&event))).is_err() {
                    error!(
                        event = info.name,
                        receiver = %entry.receiver.name,
                        "event handler panicked"
                    );
                }
            } else {
                if let Some(listener) = &listener {
                    listener.on_enqueue(sender_name, &entry.receiver.name, &info, DispatchKind::Event);
                }
                entry.executor.enqueue(
                    EventData {
                        handler: Arc::clone(&entry.handler),
                        event: event.clone(),
                        receiver: entry.receiver.name.clone(),
                    },
                    run_event::<M>,
                );
            }
        }
    }
}

struct EventData<M: EventMessage> {
    handler: EventHandler<M>,
    event: M,
    receiver: String,
}

fn run_event<M: EventMessage>(data: EventData<M>) {
    if catch_unwind(AssertUnwindSafe(|| (data.handler)(&data.event))).is_err() {
        error!(
            event = M::NAME,
            receiver = %data.receiver,
            "event handler panicked"
        );
    }
}
