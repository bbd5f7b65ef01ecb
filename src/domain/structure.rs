//! Structure Builder
//!
//! Turns the flat node/edge records of the structural dataset into a
//! [`Hierarchy`]:
//!
//! 1. one component per node (unknown kinds skipped)
//! 2. containment, invocation and specialization edges
//! 3. method invocations lifted to their containers
//! 4. invocations inherited through specialization
//! 5. unique root detection and a reachability check over ownership
//! 6. leaf-descendant counts and single-child root collapsing

use std::collections::{BTreeMap, HashMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::domain::component::{Component, ComponentId, ComponentKind, Hierarchy};
use crate::error::{ModelError, Result};

pub const CONTAINS_LABEL: &str = "contains";
pub const SPECIALIZES_LABEL: &str = "specializes";
pub const INVOKES_LABEL: &str = "invokes";

/// A node record of the structural dataset.
#[derive(Debug, Clone)]
pub struct StructureNode {
    pub id: String,
    pub kind: String,
    pub name: String,
}

/// An edge record of the structural dataset. `weight` is only meaningful
/// for `invokes` edges.
#[derive(Debug, Clone)]
pub struct StructureEdge {
    pub source: String,
    pub target: String,
    pub label: String,
    pub weight: Option<u64>,
}

pub struct StructureBuilder {
    components: Vec<Component>,
    index: HashMap<String, ComponentId>,
}

impl StructureBuilder {
    /// Build the hierarchy and return it with its root already collapsed.
    pub fn build(nodes: &[StructureNode], edges: &[StructureEdge]) -> Result<Hierarchy> {
        let mut builder = StructureBuilder {
            components: Vec::with_capacity(nodes.len()),
            index: HashMap::with_capacity(nodes.len()),
        };

        builder.build_nodes(nodes)?;
        builder.build_edges(edges)?;
        builder.lift_invocations();
        builder.solve_specializations();

        let root = builder.find_root()?;
        builder.check_ownership(root)?;
        builder.count_indirect_children();

        let mut hierarchy = Hierarchy {
            components: builder.components,
            index: builder.index,
            root,
        };
        hierarchy.collapse_root();

        info!(
            components = hierarchy.len(),
            root = hierarchy.root_component().id(),
            "structure hierarchy built"
        );
        Ok(hierarchy)
    }

    fn build_nodes(&mut self, nodes: &[StructureNode]) -> Result<()> {
        for node in nodes {
            let Some(kind) = ComponentKind::from_label(&node.kind) else {
                debug!(id = %node.id, kind = %node.kind, "skipping node of unknown kind");
                continue;
            };

            if self.index.contains_key(&node.id) {
                return Err(ModelError::MalformedDataset(format!(
                    "duplicate component id: {}",
                    node.id
                )));
            }

            let handle = ComponentId(self.components.len());
            self.components.push(Component::new(&node.id, &node.name, kind));
            self.index.insert(node.id.clone(), handle);
        }
        Ok(())
    }

    fn build_edges(&mut self, edges: &[StructureEdge]) -> Result<()> {
        for edge in edges {
            let (Some(&source), Some(&target)) =
                (self.index.get(&edge.source), self.index.get(&edge.target))
            else {
                debug!(source = %edge.source, target = %edge.target, "skipping edge with unknown endpoint");
                continue;
            };

            match edge.label.as_str() {
                CONTAINS_LABEL => {
                    if let Some(existing) = self.components[target.0].parent {
                        return Err(ModelError::MalformedDataset(format!(
                            "{} is contained by both {} and {}",
                            edge.target, self.components[existing.0].id, edge.source
                        )));
                    }
                    let owner = &mut self.components[source.0];
                    owner.contains.push(edge.target.clone());
                    owner.children.push(target);
                    self.components[target.0].parent = Some(source);
                }
                INVOKES_LABEL => {
                    let weight = edge.weight.ok_or_else(|| {
                        ModelError::MalformedDataset(format!(
                            "invokes edge {} -> {} has no weight",
                            edge.source, edge.target
                        ))
                    })?;
                    self.components[source.0].add_invocation(target, weight);
                }
                SPECIALIZES_LABEL => {
                    if source == target
                        || !self.components[source.0].kind.is_class()
                        || !self.components[target.0].kind.is_class()
                    {
                        return Err(ModelError::InvalidSpecialization {
                            from: edge.source.clone(),
                            to: edge.target.clone(),
                        });
                    }
                    self.components[source.0].specializes.push(target);
                }
                other => {
                    debug!(label = other, "skipping edge with unknown label");
                }
            }
        }
        Ok(())
    }

    /// Copy method calls that cross container boundaries onto the method's
    /// container, pointing at the callee's container.
    fn lift_invocations(&mut self) {
        let mut lifted: Vec<(ComponentId, ComponentId, u64)> = Vec::new();

        for method in self.components.iter().filter(|c| c.kind.is_method()) {
            let Some(owner) = method.parent else { continue };
            for (&target, &amount) in &method.invokes {
                let Some(target_owner) = self.components[target.0].parent else { continue };
                if target_owner != owner {
                    lifted.push((owner, target_owner, amount));
                }
            }
        }

        debug!(count = lifted.len(), "lifting method invocations");
        for (owner, target_owner, amount) in lifted {
            self.components[owner.0].add_invocation(target_owner, amount);
        }
    }

    /// Give every class the invocations of all classes it transitively
    /// specializes.
    fn solve_specializations(&mut self) {
        let mut inherited: Vec<(ComponentId, BTreeMap<ComponentId, u64>)> = Vec::new();

        for (i, component) in self.components.iter().enumerate() {
            if !component.kind.is_class() || component.specializes.is_empty() {
                continue;
            }
            let mut pending = BTreeMap::new();
            let mut visited_edges = HashSet::new();
            self.collect_inherited(ComponentId(i), &mut visited_edges, &mut pending);
            if !pending.is_empty() {
                inherited.push((ComponentId(i), pending));
            }
        }

        for (class, invocations) in inherited {
            self.components[class.0].add_invocations(&invocations);
        }
    }

    // Edges are tracked rather than classes, so a base reachable through two
    // chains is merged twice.
    fn collect_inherited(
        &self,
        current: ComponentId,
        visited_edges: &mut HashSet<(ComponentId, ComponentId)>,
        pending: &mut BTreeMap<ComponentId, u64>,
    ) {
        for &base in &self.components[current.0].specializes {
            if !visited_edges.insert((current, base)) {
                continue;
            }
            for (&target, &amount) in &self.components[base.0].invokes {
                *pending.entry(target).or_insert(0) += amount;
            }
            self.collect_inherited(base, visited_edges, pending);
        }
    }

    fn count_indirect_children(&mut self) {
        let counts: Vec<usize> = (0..self.components.len())
            .into_par_iter()
            .map(|i| self.count_leaves(ComponentId(i)))
            .collect();

        for (component, count) in self.components.iter_mut().zip(counts) {
            component.indirect_children_count = count;
        }
    }

    fn count_leaves(&self, id: ComponentId) -> usize {
        self.components[id.0]
            .children
            .iter()
            .map(|child| {
                if self.components[child.0].children.is_empty() {
                    1
                } else {
                    self.count_leaves(*child)
                }
            })
            .sum()
    }

    /// Every component must be owned, directly or not, by `root`. With at
    /// most one parent each, a `contains` cycle is never reachable from the
    /// root, so this also rejects cycles.
    fn check_ownership(&self, root: ComponentId) -> Result<()> {
        let mut reached = vec![false; self.components.len()];
        let mut stack = vec![root];
        reached[root.0] = true;

        while let Some(id) = stack.pop() {
            for &child in &self.components[id.0].children {
                if !reached[child.0] {
                    reached[child.0] = true;
                    stack.push(child);
                }
            }
        }

        match reached.iter().position(|r| !r) {
            Some(orphan) => Err(ModelError::MalformedDataset(format!(
                "{} is not owned by root {} (containment cycle or detached subtree)",
                self.components[orphan].id, self.components[root.0].id
            ))),
            None => Ok(()),
        }
    }

    fn find_root(&self) -> Result<ComponentId> {
        let roots: Vec<ComponentId> = self
            .components
            .iter()
            .enumerate()
            .filter(|(_, c)| c.parent.is_none())
            .map(|(i, _)| ComponentId(i))
            .collect();

        match roots.as_slice() {
            [root] => Ok(*root),
            _ => Err(ModelError::MissingRoot { found: roots.len() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, kind: &str) -> StructureNode {
        StructureNode {
            id: id.to_string(),
            kind: kind.to_string(),
            name: id.rsplit('.').next().unwrap_or(id).to_string(),
        }
    }

    fn edge(source: &str, target: &str, label: &str, weight: Option<u64>) -> StructureEdge {
        StructureEdge {
            source: source.to_string(),
            target: target.to_string(),
            label: label.to_string(),
            weight,
        }
    }

    #[test]
    fn test_unknown_kinds_are_skipped() {
        let nodes = vec![node("p", "package"), node("p.E", "enum"), node("p.A", "class")];
        let edges = vec![
            edge("p", "p.A", CONTAINS_LABEL, None),
            edge("p", "p.E", CONTAINS_LABEL, None),
        ];
        let hierarchy = StructureBuilder::build(&nodes, &edges).unwrap();
        assert!(hierarchy.find("p.E").is_none());
        assert_eq!(hierarchy.len(), 2);
    }

    #[test]
    fn test_specialization_requires_classes() {
        let nodes = vec![node("p", "package"), node("p.A", "class"), node("p.m", "method")];
        let edges = vec![
            edge("p", "p.A", CONTAINS_LABEL, None),
            edge("p", "p.m", CONTAINS_LABEL, None),
            edge("p.A", "p.m", SPECIALIZES_LABEL, None),
        ];
        let err = StructureBuilder::build(&nodes, &edges).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSpecialization { .. }));
    }

    #[test]
    fn test_missing_weight_is_malformed() {
        let nodes = vec![node("p", "package"), node("p.A", "class"), node("p.B", "class")];
        let edges = vec![
            edge("p", "p.A", CONTAINS_LABEL, None),
            edge("p", "p.B", CONTAINS_LABEL, None),
            edge("p.A", "p.B", INVOKES_LABEL, None),
        ];
        let err = StructureBuilder::build(&nodes, &edges).unwrap_err();
        assert!(matches!(err, ModelError::MalformedDataset(_)));
    }

    #[test]
    fn test_two_roots_are_rejected() {
        let nodes = vec![node("a", "package"), node("b", "package")];
        let err = StructureBuilder::build(&nodes, &[]).unwrap_err();
        assert!(matches!(err, ModelError::MissingRoot { found: 2 }));
    }

    #[test]
    fn test_self_specialization_is_rejected() {
        let nodes = vec![node("p", "package"), node("p.A", "class")];
        let edges = vec![
            edge("p", "p.A", CONTAINS_LABEL, None),
            edge("p.A", "p.A", SPECIALIZES_LABEL, None),
        ];
        let err = StructureBuilder::build(&nodes, &edges).unwrap_err();
        assert!(matches!(err, ModelError::InvalidSpecialization { .. }));
    }

    #[test]
    fn test_containment_cycle_is_rejected() {
        let nodes = vec![node("root", "package"), node("a", "package"), node("b", "package")];
        let edges = vec![
            edge("a", "b", CONTAINS_LABEL, None),
            edge("b", "a", CONTAINS_LABEL, None),
        ];
        let err = StructureBuilder::build(&nodes, &edges).unwrap_err();
        assert!(matches!(err, ModelError::MalformedDataset(_)));
    }

    #[test]
    fn test_specialization_cycle_terminates() {
        let nodes = vec![node("p", "package"), node("p.A", "class"), node("p.B", "class"), node("p.C", "class")];
        let edges = vec![
            edge("p", "p.A", CONTAINS_LABEL, None),
            edge("p", "p.B", CONTAINS_LABEL, None),
            edge("p", "p.C", CONTAINS_LABEL, None),
            edge("p.A", "p.B", SPECIALIZES_LABEL, None),
            edge("p.B", "p.A", SPECIALIZES_LABEL, None),
            edge("p.B", "p.C", INVOKES_LABEL, Some(2)),
        ];
        let hierarchy = StructureBuilder::build(&nodes, &edges).unwrap();
        let a = hierarchy.find("p.A").unwrap();
        let c = hierarchy.lookup("p.C").unwrap();
        assert_eq!(a.invokes().get(&c), Some(&2));
    }
}
