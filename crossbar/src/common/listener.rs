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

use crate::message::MessageInfo;

/// What kind of dispatch a listener notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DispatchKind {
    /// A query request reaching its handler.
    Request,
    /// A query result traveling back to the caller.
    Response,
    /// A synchronous request invoked under the receiver's lock.
    LockedRequest,
    /// Completion of a lock-protected synchronous request.
    LockedResponse,
    /// An event delivery.
    Event,
}

/// An observer of message traffic, attached per component.
///
/// `on_enqueue` fires when a task is queued on an executor for later
/// execution; `on_invoke` fires when a handler or callback runs directly on
/// the current thread. Sequence-diagram and dependency-graph tooling hangs
/// off these two hooks.
pub trait Listener: Send + Sync {
    /// A task carrying this message was enqueued on the receiver's executor.
    fn on_enqueue(&self, sender: &str, receiver: &str, info: &MessageInfo, kind: DispatchKind);

    /// This message was dispatched inline on the calling thread.
    fn on_invoke(&self, sender: &str, receiver: &str, info: &MessageInfo, kind: DispatchKind);
}
