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

use std::sync::{Mutex, Once};

use crossbar::prelude::*;

pub mod messages;

static INIT: Once = Once::new();

/// Initializes tracing for test output. Safe to call from every test.
pub fn initialize_tracing() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// One observed listener notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observed {
    pub sender: String,
    pub receiver: String,
    pub message: &'static str,
    pub kind: DispatchKind,
}

/// A listener that records every notification it sees.
#[derive(Default)]
pub struct RecordingListener {
    pub enqueues: Mutex<Vec<Observed>>,
    pub invokes: Mutex<Vec<Observed>>,
}

impl RecordingListener {
    pub fn enqueue_count(&self) -> usize {
        self.enqueues.lock().unwrap().len()
    }

    pub fn invoke_count(&self) -> usize {
        self.invokes.lock().unwrap().len()
    }

    pub fn enqueued_kinds(&self) -> Vec<DispatchKind> {
        self.enqueues.lock().unwrap().iter().map(|o| o.kind).collect()
    }

    pub fn invoked_kinds(&self) -> Vec<DispatchKind> {
        self.invokes.lock().unwrap().iter().map(|o| o.kind).collect()
    }
}

impl Listener for RecordingListener {
    fn on_enqueue(&self, sender: &str, receiver: &str, info: &MessageInfo, kind: DispatchKind) {
        assert!(!receiver.is_empty());
        self.enqueues.lock().unwrap().push(Observed {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            message: info.name,
            kind,
        });
    }

    fn on_invoke(&self, sender: &str, receiver: &str, info: &MessageInfo, kind: DispatchKind) {
        assert!(!receiver.is_empty());
        self.invokes.lock().unwrap().push(Observed {
            sender: sender.to_string(),
            receiver: receiver.to_string(),
            message: info.name,
            kind,
        });
    }
}
