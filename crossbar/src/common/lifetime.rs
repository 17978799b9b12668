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

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// An owning cancellation token.
///
/// Work scheduled on behalf of a lifetime carries a [`LifetimeWeak`] handle;
/// the runtime checks the handle right before invoking a callback and drops
/// the callback silently if the handle has expired. Calling [`reset`] — or
/// dropping the `Lifetime` — expires every handle created so far.
///
/// Every component owns a default lifetime; sub-scopes such as sessions own
/// their own and attach them per call with
/// [`with_lifetime`](crate::dispatch::QueryInvoker::with_lifetime).
///
/// [`reset`]: Lifetime::reset
pub struct Lifetime {
    cell: Arc<LifetimeCell>,
}

struct LifetimeCell {
    // `None` marks a dead scope: weak handles created from it are born expired.
    token: Mutex<Option<Arc<()>>>,
}

impl Lifetime {
    /// Creates a live lifetime.
    pub fn new() -> Self {
        Self {
            cell: Arc::new(LifetimeCell {
                token: Mutex::new(Some(Arc::new(()))),
            }),
        }
    }

    /// Creates a weak handle that expires when this lifetime is reset or dropped.
    pub fn create_weak(&self) -> LifetimeWeak {
        self.cell.create_weak()
    }

    /// Expires every outstanding weak handle. The lifetime itself stays
    /// usable: handles created after the reset track the fresh token.
    pub fn reset(&self) {
        *self.cell.token.lock() = Some(Arc::new(()));
    }

    pub(crate) fn view(&self) -> LifetimeView {
        LifetimeView {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl Default for Lifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Lifetime {
    fn drop(&mut self) {
        *self.cell.token.lock() = None;
    }
}

impl fmt::Debug for Lifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lifetime").finish_non_exhaustive()
    }
}

impl LifetimeCell {
    fn create_weak(&self) -> LifetimeWeak {
        let token = self
            .token
            .lock()
            .as_ref()
            .map(Arc::downgrade)
            .unwrap_or_default();
        LifetimeWeak { token }
    }
}

/// An internal, shareable view of a [`Lifetime`].
///
/// Queries hold a view of the scope they are bound to so that weak handles
/// are minted from the *current* token at call time; a `reset` between two
/// calls therefore only expires the first.
#[derive(Clone)]
pub(crate) struct LifetimeView {
    cell: Arc<LifetimeCell>,
}

impl LifetimeView {
    pub(crate) fn create_weak(&self) -> LifetimeWeak {
        self.cell.create_weak()
    }
}

/// A weak handle to a [`Lifetime`].
#[derive(Clone, Default)]
pub struct LifetimeWeak {
    token: Weak<()>,
}

impl LifetimeWeak {
    /// Whether the owning lifetime has been reset or dropped.
    pub fn expired(&self) -> bool {
        self.token.strong_count() == 0
    }

    /// A handle that is already expired. Useful as a placeholder for work
    /// that must never fire.
    pub fn dangling() -> Self {
        Self::default()
    }
}

impl fmt::Debug for LifetimeWeak {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifetimeWeak")
            .field("expired", &self.expired())
            .finish()
    }
}
