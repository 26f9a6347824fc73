use crate::{Error, Result};

use super::bone::Bone;

/// A validated bone hierarchy.
///
/// Every parent is either absent or another existing bone, and every bone reaches a root
/// by following its parents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skeleton {
    parents: Vec<Option<usize>>,
    children: Vec<Vec<usize>>,
    depths: Vec<usize>,
}

impl Skeleton {
    /// # Errors
    ///
    /// Returns `Err` if a bone has an invalid parent or the hierarchy has a cycle.
    pub fn new(bones: &[Bone]) -> Result<Self> {
        let parents: Vec<i32> = bones.iter().map(|b| b.parent_bone_index.get()).collect();
        Self::from_parents(&parents)
    }

    /// Builds a skeleton from raw parent indexes, `-1` meaning a root bone.
    ///
    /// # Errors
    ///
    /// Returns `Err` if a parent is not `-1` or another existing bone, or if following
    /// the parents from some bone never reaches a root.
    pub fn from_parents(parents: &[i32]) -> Result<Self> {
        let bone_count = parents.len();

        let parents = parents
            .iter()
            .enumerate()
            .map(|(bone, &parent)| match parent {
                -1 => Ok(None),
                p => usize::try_from(p)
                    .ok()
                    .filter(|&p| p < bone_count && p != bone)
                    .map(Some)
                    .ok_or(Error::InvalidBoneParent { bone, parent }),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut depths = Vec::with_capacity(bone_count);
        for bone in 0..bone_count {
            let mut depth = 0;
            let mut current = bone;

            while let Some(parent) = parents.get(current).copied().flatten() {
                depth += 1;
                if depth > bone_count {
                    return Err(Error::BoneCycle { bone });
                }
                current = parent;
            }

            depths.push(depth);
        }

        let mut children = vec![Vec::new(); bone_count];
        for (bone, parent) in parents.iter().enumerate() {
            if let Some(siblings) = parent.and_then(|p| children.get_mut(p)) {
                siblings.push(bone);
            }
        }

        Ok(Self {
            parents,
            children,
            depths,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.parents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn roots(&self) -> impl Iterator<Item = usize> + '_ {
        self.parents
            .iter()
            .enumerate()
            .filter(|(_, parent)| parent.is_none())
            .map(|(bone, _)| bone)
    }

    #[must_use]
    pub fn parent(&self, bone: usize) -> Option<usize> {
        self.parents.get(bone).copied().flatten()
    }

    #[must_use]
    pub fn children(&self, bone: usize) -> &[usize] {
        self.children.get(bone).map_or(&[], Vec::as_slice)
    }

    /// Number of ancestors of the bone, zero for roots.
    #[must_use]
    pub fn depth(&self, bone: usize) -> Option<usize> {
        self.depths.get(bone).copied()
    }

    /// Bones in depth first order, parents before their children.
    #[must_use]
    pub fn depth_first(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len());
        let mut stack: Vec<usize> = self.roots().collect();
        stack.reverse();

        while let Some(bone) = stack.pop() {
            order.push(bone);
            stack.extend(self.children(bone).iter().rev());
        }

        order
    }
}
