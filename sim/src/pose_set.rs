//! Fixed initial-pose sets for reproducible evaluation.
//!
//! A pose set is a JSON file of [`InitPose`] records generated once and then
//! replayed at every evaluation reset.

use crate::init_pose::{InitPose, ResetOptions};
use serde::{Deserialize, Serialize};
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// A recorded list of initial poses and how they were drawn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseSet {
    pub seed: u64,
    pub num_targets: usize,
    /// Reset options used while sampling
    #[serde(default)]
    pub options: ResetOptions,
    pub poses: Vec<InitPose>,
}

/// Save a pose set to a JSON file.
pub fn save_pose_set(set: &PoseSet, path: &Path) -> anyhow::Result<()> {
    let file = std::fs::File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, set)?;
    Ok(())
}

/// Load a pose set from a JSON file.
pub fn load_pose_set(path: &Path) -> anyhow::Result<PoseSet> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let set: PoseSet = serde_json::from_reader(reader)?;
    anyhow::ensure!(
        set.poses
            .iter()
            .all(|p| p.targets.len() == set.num_targets && p.belief_targets.len() == set.num_targets),
        "pose set {} has records with the wrong target count",
        path.display()
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::Pose;

    fn record(x: f64) -> InitPose {
        InitPose {
            agent: Pose::new(x, 0.0, 0.0),
            targets: vec![Pose::new(x + 6.0, 0.0, 0.0)],
            belief_targets: vec![Pose::new(x + 7.0, 1.0, 0.0)],
        }
    }

    #[test]
    fn save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.json");
        let set = PoseSet {
            seed: 4,
            num_targets: 1,
            options: ResetOptions {
                blocked: Some(false),
                ..Default::default()
            },
            poses: vec![record(0.0), record(3.0)],
        };
        save_pose_set(&set, &path).unwrap();
        assert_eq!(load_pose_set(&path).unwrap(), set);
    }

    #[test]
    fn mismatched_target_count_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("poses.json");
        let set = PoseSet {
            seed: 0,
            num_targets: 2,
            options: ResetOptions::default(),
            poses: vec![record(0.0)],
        };
        save_pose_set(&set, &path).unwrap();
        assert!(load_pose_set(&path).is_err());
    }
}
