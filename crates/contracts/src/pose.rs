//! Skeleton topology and pose frames.

use serde::{Deserialize, Serialize};

use crate::SynthError;

/// Channel semantics of every joint value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// 2D or 3D joint positions, composed by vector addition
    #[default]
    Position,
    /// Local joint rotations as unit quaternions `(w, x, y, z)`
    Rotation,
}

impl ChannelKind {
    /// Whether `joint_dim` is a legal channel width for this kind
    pub fn accepts_joint_dim(self, joint_dim: usize) -> bool {
        match self {
            Self::Position => joint_dim == 2 || joint_dim == 3,
            Self::Rotation => joint_dim == 4,
        }
    }

    /// Number of trailing command arguments that carry one pose value.
    ///
    /// Rotations travel as axis (3) + angle (1).
    pub fn value_width(self, joint_dim: usize) -> usize {
        match self {
            Self::Position => joint_dim,
            Self::Rotation => 4,
        }
    }
}

/// Static joint topology
#[derive(Debug, Clone, PartialEq)]
pub struct Skeleton {
    joint_count: usize,
    joint_dim: usize,
    channel: ChannelKind,
    joint_names: Vec<String>,
    edges: Vec<(usize, usize)>,
}

impl Skeleton {
    /// Build a skeleton from a children map (`children[parent] = [child, ...]`).
    ///
    /// `joint_count` is the length of the map. Edges keep parent order, then child order.
    pub fn from_children(
        children: &[Vec<usize>],
        joint_dim: usize,
        channel: ChannelKind,
    ) -> Result<Self, SynthError> {
        if children.is_empty() {
            return Err(SynthError::invalid_skeleton("children map is empty"));
        }
        if !channel.accepts_joint_dim(joint_dim) {
            return Err(SynthError::invalid_skeleton(format!(
                "joint_dim {joint_dim} is not valid for {channel:?} channels"
            )));
        }

        let joint_count = children.len();
        let mut edges = Vec::new();
        for (parent, kids) in children.iter().enumerate() {
            for &child in kids {
                if child >= joint_count {
                    return Err(SynthError::invalid_skeleton(format!(
                        "joint {parent} lists child {child}, but joint_count is {joint_count}"
                    )));
                }
                edges.push((parent, child));
            }
        }

        Ok(Self {
            joint_count,
            joint_dim,
            channel,
            joint_names: Vec::new(),
            edges,
        })
    }

    /// Attach joint names (must match `joint_count`)
    pub fn with_names(mut self, names: Vec<String>) -> Result<Self, SynthError> {
        if names.len() != self.joint_count {
            return Err(SynthError::invalid_skeleton(format!(
                "{} joint names for {} joints",
                names.len(),
                self.joint_count
            )));
        }
        self.joint_names = names;
        Ok(self)
    }

    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    pub fn joint_dim(&self) -> usize {
        self.joint_dim
    }

    /// Width of one flattened frame
    pub fn pose_dim(&self) -> usize {
        self.joint_count * self.joint_dim
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    /// `(parent, child)` joint pairs
    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn joint_name(&self, index: usize) -> Option<&str> {
        self.joint_names.get(index).map(String::as_str)
    }

    /// Whether a (possibly negative) command index addresses a joint
    pub fn contains_joint(&self, index: i64) -> bool {
        index >= 0 && (index as u64) < self.joint_count as u64
    }
}

/// One pose: `joint_count` joints of `joint_dim` channels, stored flat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseFrame {
    joint_dim: usize,
    values: Vec<f32>,
}

impl PoseFrame {
    /// Zero-filled frame
    pub fn zeros(joint_count: usize, joint_dim: usize) -> Self {
        Self {
            joint_dim,
            values: vec![0.0; joint_count * joint_dim],
        }
    }

    /// Frame where every joint holds the same pose
    pub fn uniform(joint_count: usize, pose: &[f32]) -> Self {
        Self {
            joint_dim: pose.len(),
            values: pose.repeat(joint_count),
        }
    }

    /// Wrap flat values; length must be a multiple of `joint_dim`
    pub fn from_flat(values: Vec<f32>, joint_dim: usize) -> Result<Self, SynthError> {
        if joint_dim == 0 || values.len() % joint_dim != 0 {
            return Err(SynthError::Other(format!(
                "{} values cannot be split into joints of width {joint_dim}",
                values.len()
            )));
        }
        Ok(Self { joint_dim, values })
    }

    pub fn joint_count(&self) -> usize {
        if self.joint_dim == 0 {
            0
        } else {
            self.values.len() / self.joint_dim
        }
    }

    pub fn joint_dim(&self) -> usize {
        self.joint_dim
    }

    /// Pose of one joint
    pub fn joint(&self, index: usize) -> Option<&[f32]> {
        let start = index.checked_mul(self.joint_dim)?;
        self.values.get(start..start + self.joint_dim)
    }

    pub fn joint_mut(&mut self, index: usize) -> Option<&mut [f32]> {
        let start = index.checked_mul(self.joint_dim)?;
        self.values.get_mut(start..start + self.joint_dim)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.values
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edges_from_children() {
        let children = vec![vec![1, 3], vec![2], vec![], vec![]];
        let skeleton = Skeleton::from_children(&children, 3, ChannelKind::Position).unwrap();
        assert_eq!(skeleton.joint_count(), 4);
        assert_eq!(skeleton.pose_dim(), 12);
        assert_eq!(skeleton.edges(), &[(0, 1), (0, 3), (1, 2)]);
    }

    #[test]
    fn test_child_out_of_range() {
        let children = vec![vec![5], vec![]];
        let result = Skeleton::from_children(&children, 3, ChannelKind::Position);
        assert!(matches!(result, Err(SynthError::InvalidSkeleton { .. })));
    }

    #[test]
    fn test_joint_dim_must_match_channel() {
        let children = vec![vec![]];
        assert!(Skeleton::from_children(&children, 4, ChannelKind::Position).is_err());
        assert!(Skeleton::from_children(&children, 3, ChannelKind::Rotation).is_err());
        assert!(Skeleton::from_children(&children, 4, ChannelKind::Rotation).is_ok());
        assert!(Skeleton::from_children(&children, 2, ChannelKind::Position).is_ok());
    }

    #[test]
    fn test_contains_joint() {
        let skeleton = Skeleton::from_children(&[vec![1], vec![]], 2, ChannelKind::Position).unwrap();
        assert!(skeleton.contains_joint(0));
        assert!(skeleton.contains_joint(1));
        assert!(!skeleton.contains_joint(2));
        assert!(!skeleton.contains_joint(-1));
    }

    #[test]
    fn test_pose_frame_joint_access() {
        let mut frame = PoseFrame::zeros(3, 2);
        frame.joint_mut(1).unwrap().copy_from_slice(&[1.0, 2.0]);
        assert_eq!(frame.as_slice(), &[0.0, 0.0, 1.0, 2.0, 0.0, 0.0]);
        assert_eq!(frame.joint(1), Some(&[1.0, 2.0][..]));
        assert!(frame.joint(3).is_none());
        assert_eq!(frame.joint_count(), 3);
    }

    #[test]
    fn test_from_flat_rejects_ragged() {
        assert!(PoseFrame::from_flat(vec![0.0; 7], 3).is_err());
        assert!(PoseFrame::from_flat(vec![0.0; 9], 3).is_ok());
    }

    #[test]
    fn test_value_width() {
        assert_eq!(ChannelKind::Position.value_width(3), 3);
        assert_eq!(ChannelKind::Position.value_width(2), 2);
        assert_eq!(ChannelKind::Rotation.value_width(4), 4);
    }
}
