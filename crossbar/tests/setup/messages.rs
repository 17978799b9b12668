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

//! Messages shared by the test components.

use crossbar::interface::Interface;
use crossbar::prelude::{IfAsyncQuery, IfSyncQuery};

crossbar::declare_query!(pub Sum: (i32, i32) -> i32);
crossbar::declare_query!(pub Print: (i32,) -> ());
crossbar::declare_query!(pub GetValueMapping: (i32,) -> i32);
crossbar::declare_query!(pub LongOperation: (i32,) -> i32);
crossbar::declare_query!(pub Magnitude: (i32,) -> i32);

/// Broadcast when a summation completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummationFinished {
    pub sum: i32,
}

crossbar::impl_event!(SummationFinished);

/// The calculator's grouped query surface.
#[derive(Interface)]
pub struct CalculatorApi {
    pub sum: IfAsyncQuery<Sum>,
    pub magnitude: IfSyncQuery<Magnitude>,
}

impl CalculatorApi {
    pub fn unpublished() -> Self {
        CalculatorApi {
            sum: IfAsyncQuery::new(),
            magnitude: IfSyncQuery::new(),
        }
    }
}
