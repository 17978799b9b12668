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

use thiserror::Error;

/// The failure type carried through the asynchronous result path.
///
/// Handlers resolve a [`CallbackResult`](crate::dispatch::CallbackResult)
/// with `Result<T, Error>`; the runtime itself only produces the variants
/// below, everything else is application-defined via [`Error::Failed`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// No component currently answers the named message.
    #[error("no handler registered for `{0}`")]
    NoHandler(&'static str),

    /// The query was abandoned before a result was produced.
    #[error("query canceled")]
    Canceled,

    /// An application-level failure produced by a handler.
    #[error("{0}")]
    Failed(String),
}

/// Shorthand for the result type delivered to query callbacks.
pub type QueryResult<T> = Result<T, Error>;
