//! Component Model
//!
//! Typed hierarchy entities (packages, classes, interfaces, methods) stored in
//! an arena. Ownership, invocation and specialization links are all expressed
//! as `ComponentId` handles into the arena.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

/// Handle of a component inside a [`Hierarchy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(pub(crate) usize);

impl ComponentId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Closed set of component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Package,
    Class,
    #[serde(rename = "abstract")]
    AbstractClass,
    Interface,
    Method,
}

impl ComponentKind {
    /// Parse the `kind` label used by the structural dataset.
    pub fn from_label(label: &str) -> Option<ComponentKind> {
        match label {
            "package" => Some(ComponentKind::Package),
            "class" => Some(ComponentKind::Class),
            "abstract" => Some(ComponentKind::AbstractClass),
            "interface" => Some(ComponentKind::Interface),
            "method" => Some(ComponentKind::Method),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComponentKind::Package => "package",
            ComponentKind::Class => "class",
            ComponentKind::AbstractClass => "abstract",
            ComponentKind::Interface => "interface",
            ComponentKind::Method => "method",
        }
    }

    /// Abstract classes and interfaces are classes too: they may specialize
    /// and be specialized.
    pub fn is_class(&self) -> bool {
        matches!(
            self,
            ComponentKind::Class | ComponentKind::AbstractClass | ComponentKind::Interface
        )
    }

    pub fn is_method(&self) -> bool {
        matches!(self, ComponentKind::Method)
    }

    pub fn is_package(&self) -> bool {
        matches!(self, ComponentKind::Package)
    }
}

/// A node of the structural hierarchy.
#[derive(Debug, Clone)]
pub struct Component {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) kind: ComponentKind,
    pub(crate) parent: Option<ComponentId>,
    pub(crate) children: Vec<ComponentId>,
    pub(crate) contains: Vec<String>,
    pub(crate) invokes: BTreeMap<ComponentId, u64>,
    /// Base classes; only ever filled for class kinds.
    pub(crate) specializes: Vec<ComponentId>,
    pub(crate) indirect_children_count: usize,
}

impl Component {
    pub(crate) fn new(id: impl Into<String>, name: impl Into<String>, kind: ComponentKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            parent: None,
            children: Vec::new(),
            contains: Vec::new(),
            invokes: BTreeMap::new(),
            specializes: Vec::new(),
            indirect_children_count: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn parent(&self) -> Option<ComponentId> {
        self.parent
    }

    pub fn children(&self) -> &[ComponentId] {
        &self.children
    }

    /// Identifiers of the owned children, in the same order as `children`.
    pub fn contains(&self) -> &[String] {
        &self.contains
    }

    pub fn invokes(&self) -> &BTreeMap<ComponentId, u64> {
        &self.invokes
    }

    pub fn specializes(&self) -> &[ComponentId] {
        &self.specializes
    }

    /// Number of descendants without children of their own.
    pub fn indirect_children_count(&self) -> usize {
        self.indirect_children_count
    }

    pub(crate) fn add_invocation(&mut self, target: ComponentId, amount: u64) {
        *self.invokes.entry(target).or_insert(0) += amount;
    }

    pub(crate) fn add_invocations<'a>(&mut self, invocations: impl IntoIterator<Item = (&'a ComponentId, &'a u64)>) {
        for (target, amount) in invocations {
            self.add_invocation(*target, *amount);
        }
    }
}

/// Relation types shown between the classes of one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    Calls,
    Specializes,
}

/// A directed relation between two sibling components.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    pub source: ComponentId,
    pub target: ComponentId,
    pub weight: u64,
}

/// Arena of components plus the effective root.
#[derive(Debug, Clone)]
pub struct Hierarchy {
    pub(crate) components: Vec<Component>,
    pub(crate) index: HashMap<String, ComponentId>,
    pub(crate) root: ComponentId,
}

impl Hierarchy {
    pub fn root(&self) -> ComponentId {
        self.root
    }

    pub fn root_component(&self) -> &Component {
        self.get(self.root)
    }

    pub fn get(&self, id: ComponentId) -> &Component {
        &self.components[id.0]
    }

    pub fn lookup(&self, id: &str) -> Option<ComponentId> {
        self.index.get(id).copied()
    }

    pub fn find(&self, id: &str) -> Option<&Component> {
        self.lookup(id).map(|handle| self.get(handle))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ComponentId, &Component)> {
        self.components
            .iter()
            .enumerate()
            .map(|(i, component)| (ComponentId(i), component))
    }

    /// Promote the effective root while it has exactly one child.
    ///
    /// Each promoted component is renamed to its identifier so the root
    /// label carries the full namespace. Running this again is a no-op.
    pub fn collapse_root(&mut self) {
        loop {
            let children = &self.components[self.root.0].children;
            if children.len() != 1 {
                break;
            }
            let only_child = children[0];
            let promoted = &mut self.components[only_child.0];
            promoted.name = promoted.id.clone();
            self.root = only_child;
        }
    }

    /// Identifier with the root namespace prefix removed.
    pub fn display_label<'a>(&self, id: &'a str) -> &'a str {
        let root = self.root_component().id();
        id.strip_prefix(root)
            .and_then(|rest| rest.strip_prefix('.'))
            .unwrap_or(id)
    }

    pub fn all_children_are_packages(&self, id: ComponentId) -> bool {
        self.all_children_match(id, ComponentKind::is_package)
    }

    pub fn all_children_are_classes(&self, id: ComponentId) -> bool {
        self.all_children_match(id, ComponentKind::is_class)
    }

    pub fn all_children_are_methods(&self, id: ComponentId) -> bool {
        self.all_children_match(id, ComponentKind::is_method)
    }

    fn all_children_match(&self, id: ComponentId, predicate: impl Fn(&ComponentKind) -> bool) -> bool {
        self.get(id)
            .children
            .iter()
            .all(|child| predicate(&self.get(*child).kind))
    }

    /// Relations between the direct children of `id`, as a class diagram
    /// of that component would draw them.
    pub fn relations(&self, id: ComponentId, kind: RelationKind) -> Vec<Relation> {
        let siblings = self.get(id).children();
        let mut relations = Vec::new();

        for &source in siblings {
            let component = self.get(source);
            match kind {
                RelationKind::Calls => {
                    for (&target, &weight) in component.invokes() {
                        if siblings.contains(&target) {
                            relations.push(Relation { source, target, weight });
                        }
                    }
                }
                RelationKind::Specializes => {
                    for &target in component.specializes() {
                        if siblings.contains(&target) {
                            relations.push(Relation { source, target, weight: 1 });
                        }
                    }
                }
            }
        }

        relations
    }
}

/// Package part of a dotted identifier (everything before the last `.`).
pub fn package_of(id: &str) -> &str {
    id.rfind('.').map(|pos| &id[..pos]).unwrap_or(id)
}
