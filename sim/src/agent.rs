//! Agent kinematics and the discrete action space.
//!
//! The agent is a unicycle driven by one `(v, w)` pair per step. A proposed
//! move is vetoed, and replaced by the stop action, when it would end in an
//! obstacle or within `margin` of a target.

use crate::config::AgentConfig;
use crate::map::ObstacleMap;
use sensor_models::geometry::{distance, wrap_angle};
use std::collections::HashMap;
use tracker_core::{Control, Pose, Result, TrackingError};

/// Below this |w·dt| the arc is integrated as a straight line.
const STRAIGHT_LINE_TURN: f64 = 0.001;

// ---------------------------------------------------------------------------
// Action map
// ---------------------------------------------------------------------------

/// Immutable lookup between action indices and `(v, w)` controls.
///
/// Index of `(action_v[i], action_w[j])` is `action_w.len() * i + j`.
#[derive(Clone, Debug)]
pub struct ActionMap {
    controls: Vec<Control>,
    index: HashMap<(u64, u64), usize>,
    stop: usize,
}

fn control_key(c: Control) -> (u64, u64) {
    // `+ 0.0` folds -0.0 onto 0.0
    ((c.v + 0.0).to_bits(), (c.w + 0.0).to_bits())
}

impl ActionMap {
    pub fn new(action_v: &[f64], action_w: &[f64]) -> Result<Self> {
        if action_v.is_empty() || action_w.is_empty() {
            return Err(TrackingError::Configuration("action grids must not be empty".into()));
        }
        let mut controls = Vec::with_capacity(action_v.len() * action_w.len());
        let mut index = HashMap::new();
        for &v in action_v {
            for &w in action_w {
                if !(v.is_finite() && w.is_finite()) {
                    return Err(TrackingError::Configuration(format!(
                        "non-finite control ({v}, {w})"
                    )));
                }
                let c = Control::new(v, w);
                if index.insert(control_key(c), controls.len()).is_some() {
                    return Err(TrackingError::Configuration(format!(
                        "duplicate control ({v}, {w}) in action grid"
                    )));
                }
                controls.push(c);
            }
        }
        let stop = index.get(&control_key(Control::STOP)).copied().ok_or_else(|| {
            TrackingError::Configuration("action grid must contain the stop control (0, 0)".into())
        })?;
        Ok(Self { controls, index, stop })
    }

    pub fn from_config(config: &AgentConfig) -> Result<Self> {
        Self::new(&config.action_v, &config.action_w)
    }

    pub fn len(&self) -> usize {
        self.controls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.controls.is_empty()
    }

    pub fn control(&self, action: usize) -> Option<Control> {
        self.controls.get(action).copied()
    }

    pub fn index_of(&self, control: Control) -> Option<usize> {
        self.index.get(&control_key(control)).copied()
    }

    /// Index of the zero-motion action.
    pub fn stop_action(&self) -> usize {
        self.stop
    }
}

// ---------------------------------------------------------------------------
// Kinematics
// ---------------------------------------------------------------------------

/// Integrate a unicycle for `dt` seconds under a constant control.
pub fn integrate_unicycle(pose: &Pose, control: Control, dt: f64) -> Pose {
    let tw = dt * control.w;
    let th = pose.heading;
    let (dx, dy) = if tw.abs() < STRAIGHT_LINE_TURN {
        (
            dt * control.v * (th + tw / 2.0).cos(),
            dt * control.v * (th + tw / 2.0).sin(),
        )
    } else {
        let k = control.v / control.w;
        (k * ((th + tw).sin() - th.sin()), k * (th.cos() - (th + tw).cos()))
    };
    Pose::new(pose.x + dx, pose.y + dy, wrap_angle(th + tw))
}

/// What the motion model actually did for one requested action.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MotionOutcome {
    /// Pose after the applied action
    pub pose: Pose,
    /// Action index actually applied
    pub action: usize,
    pub control: Control,
    /// Control of the action that was asked for, before any veto
    pub requested: Control,
    /// True if the requested action was replaced by the stop action
    pub vetoed: bool,
}

/// Agent motion model with collision / target-proximity veto.
#[derive(Clone, Debug)]
pub struct AgentMotion {
    pub action_map: ActionMap,
    pub sampling_period: f64,
    pub margin: f64,
}

impl AgentMotion {
    pub fn new(config: &AgentConfig) -> Result<Self> {
        Ok(Self {
            action_map: ActionMap::from_config(config)?,
            sampling_period: config.sampling_period,
            margin: config.margin,
        })
    }

    /// Decode `action`, integrate it, and veto the move if it is unsafe.
    pub fn step<M: ObstacleMap + ?Sized>(
        &self,
        pose: &Pose,
        action: usize,
        target_positions: &[[f64; 2]],
        map: &M,
    ) -> Result<MotionOutcome> {
        let control = self.action_map.control(action).ok_or_else(|| {
            TrackingError::Configuration(format!(
                "action {action} out of range (0..{})",
                self.action_map.len()
            ))
        })?;
        let candidate = integrate_unicycle(pose, control, self.sampling_period);

        let hits_obstacle = map.is_collision(candidate.xy());
        let near_target = target_positions
            .iter()
            .any(|t| distance(candidate.xy(), *t) < self.margin);

        if hits_obstacle || near_target {
            let stop = self.action_map.stop_action();
            tracing::debug!(action, hits_obstacle, near_target, "move vetoed, stopping");
            return Ok(MotionOutcome {
                pose: integrate_unicycle(pose, Control::STOP, self.sampling_period),
                action: stop,
                control: Control::STOP,
                requested: control,
                vetoed: action != stop,
            });
        }

        Ok(MotionOutcome {
            pose: candidate,
            action,
            control,
            requested: control,
            vetoed: false,
        })
    }
}
