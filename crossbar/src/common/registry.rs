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

use tracing::{instrument, trace};

use crate::component::Component;
use crate::resolve::{DependencyDirection, DependencyInfo, DependencyKind};

/// The composition root: owns the set of components of one runtime.
///
/// Adding a component publishes it; dropping the registry unpublishes all of
/// them in reverse order, so later components lose their broker presence
/// before the ones they depend on.
#[derive(Default)]
pub struct Registry {
    components: Vec<Component>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `component` and takes ownership of its lifecycle. The
    /// returned handle stays usable by the caller.
    pub fn add(&mut self, component: Component) -> Component {
        component.publish();
        self.components.push(component.clone());
        component
    }

    /// Handles of all registered components, in add order.
    pub fn components(&self) -> &[Component] {
        &self.components
    }

    /// Checks that every query and interface import of every component
    /// resolves to a publisher. Event emitters are exempt: zero receivers is
    /// a valid composition.
    #[instrument(skip(self))]
    pub fn verify_dependencies(&self) -> Result<(), Vec<String>> {
        let mut unresolved = Vec::new();
        for component in &self.components {
            for edge in component.dependencies() {
                let checkable = edge.direction == DependencyDirection::Import
                    && matches!(
                        edge.kind,
                        DependencyKind::SyncQuery
                            | DependencyKind::AsyncQuery
                            | DependencyKind::Interface
                    );
                if checkable && edge.resolved_targets.is_empty() {
                    unresolved.push(format!(
                        "`{}` imports `{}` but no component publishes it",
                        component.name(),
                        edge.info.name
                    ));
                }
            }
        }
        if unresolved.is_empty() {
            Ok(())
        } else {
            trace!(count = unresolved.len(), "unresolved dependencies");
            Err(unresolved)
        }
    }

    /// Every component's dependency edges, for diagram tooling.
    pub fn dependencies(&self) -> Vec<(String, Vec<DependencyInfo>)> {
        self.components
            .iter()
            .map(|component| (component.name().to_string(), component.dependencies()))
            .collect()
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        for component in self.components.iter().rev() {
            component.unpublish();
        }
    }
}
