//! Scene tree types.
//!
//! A `SceneNode` places registry resources in the world. Nodes hold
//! [`ResourceKey`]s, never the resources themselves, so many nodes can share
//! one mesh or material. Each node owns its children.

use ilo_math::{trs_degrees, Aabb, Mat4, Mat4Ext, Vec3};
use thiserror::Error;

use crate::error::AssetResult;
use crate::registry::{Registry, ResourceKey};

/// Errors from composing a node tree.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum NodeError {
    #[error("node '{parent}' already has a child '{child}'")]
    DuplicateChild { parent: String, child: String },

    #[error("node '{parent}' has no child '{child}'")]
    NoSuchChild { parent: String, child: String },
}

/// Translation, per-axis rotation in degrees and per-axis scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NodeTransform {
    pub translation: Vec3,

    /// Rotation around X, Y and Z in degrees
    pub rotation: Vec3,

    pub scale: Vec3,
}

impl Default for NodeTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl NodeTransform {
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// T * Rx * Ry * Rz * S
    pub fn to_matrix(&self) -> Mat4 {
        trs_degrees(self.translation, self.rotation, self.scale)
    }
}

/// Scene header from the markup (`sceneid`, `scenename`, `scenetype`).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SceneInfo {
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
}

/// A positioned element of the scene tree.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneNode {
    id: String,
    geometry: Option<ResourceKey>,
    material: Option<ResourceKey>,
    pub transform: NodeTransform,
    pub visible: bool,
    pub hittest: bool,
    pub shadow: bool,
    children: Vec<SceneNode>,
    /// Id of the root of the tree this node belongs to; `None` for a root
    root_id: Option<String>,
}

impl SceneNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            geometry: None,
            material: None,
            transform: NodeTransform::default(),
            visible: true,
            hittest: false,
            shadow: false,
            children: Vec::new(),
            root_id: None,
        }
    }

    pub fn with_geometry(mut self, key: ResourceKey) -> Self {
        self.geometry = Some(key);
        self
    }

    pub fn with_material(mut self, key: ResourceKey) -> Self {
        self.material = Some(key);
        self
    }

    pub fn with_transform(mut self, transform: NodeTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn geometry(&self) -> Option<&ResourceKey> {
        self.geometry.as_ref()
    }

    pub fn material(&self) -> Option<&ResourceKey> {
        self.material.as_ref()
    }

    /// Id of the owning root, `None` when this node is a root.
    pub fn root_id(&self) -> Option<&str> {
        self.root_id.as_deref()
    }

    pub fn is_root(&self) -> bool {
        self.root_id.is_none()
    }

    pub fn children(&self) -> &[SceneNode] {
        &self.children
    }

    /// Add a child. Children form a set keyed by id.
    pub fn add_child(&mut self, mut child: SceneNode) -> Result<&mut SceneNode, NodeError> {
        if self.child(&child.id).is_some() {
            return Err(NodeError::DuplicateChild {
                parent: self.id.clone(),
                child: child.id,
            });
        }
        let root = self.root_id.clone().unwrap_or_else(|| self.id.clone());
        child.set_root(Some(root));

        let index = self.children.len();
        self.children.push(child);
        Ok(&mut self.children[index])
    }

    /// Detach a child; it becomes the root of its own subtree.
    pub fn remove_child(&mut self, id: &str) -> Result<SceneNode, NodeError> {
        let index = self
            .children
            .iter()
            .position(|c| c.id == id)
            .ok_or_else(|| NodeError::NoSuchChild {
                parent: self.id.clone(),
                child: id.to_string(),
            })?;
        let mut child = self.children.remove(index);
        child.set_root(None);
        Ok(child)
    }

    pub fn child(&self, id: &str) -> Option<&SceneNode> {
        self.children.iter().find(|c| c.id == id)
    }

    pub fn child_mut(&mut self, id: &str) -> Option<&mut SceneNode> {
        self.children.iter_mut().find(|c| c.id == id)
    }

    /// Depth-first search of this node and all its descendants.
    pub fn find(&self, id: &str) -> Option<&SceneNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn local_matrix(&self) -> Mat4 {
        self.transform.to_matrix()
    }

    /// Visit this node and its descendants depth first, parents before
    /// children, with each node's depth and world matrix.
    pub fn visit<F>(&self, mut f: F)
    where
        F: FnMut(&SceneNode, usize, &Mat4),
    {
        self.visit_inner(&mut f, 0, &Mat4::IDENTITY);
    }

    fn visit_inner<F>(&self, f: &mut F, depth: usize, parent: &Mat4)
    where
        F: FnMut(&SceneNode, usize, &Mat4),
    {
        let world = *parent * self.local_matrix();
        f(self, depth, &world);
        for child in &self.children {
            child.visit_inner(f, depth + 1, &world);
        }
    }

    /// This node plus all descendants.
    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(SceneNode::node_count).sum::<usize>()
    }

    fn set_root(&mut self, root: Option<String>) {
        let below = root.clone().unwrap_or_else(|| self.id.clone());
        self.root_id = root;
        for child in &mut self.children {
            child.set_root(Some(below.clone()));
        }
    }
}

/// An assembled scene: header plus node tree.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    pub info: SceneInfo,
    pub root: SceneNode,
}

impl Scene {
    pub fn new(info: SceneInfo, root: SceneNode) -> Self {
        Self { info, root }
    }

    pub fn node_count(&self) -> usize {
        self.root.node_count()
    }

    /// World-space box around every visible node's geometry.
    ///
    /// Fails with `UnresolvedReference` if a node names geometry that is no
    /// longer in the registry.
    pub fn world_bounds(&self, registry: &Registry) -> AssetResult<Aabb> {
        let mut nodes = Vec::new();
        self.root.visit(|node, _, world| {
            if let (true, Some(key)) = (node.visible, node.geometry()) {
                nodes.push((key.clone(), *world));
            }
        });

        let mut bounds = Aabb::empty();
        for (key, world) in nodes {
            let mesh = registry.geometry().get_key(&key)?;
            bounds = Aabb::surrounding(&bounds, &world.transform_aabb(mesh.bounds()));
        }
        Ok(bounds)
    }
}
