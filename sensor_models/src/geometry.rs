//! Planar geometry between the world frame and the agent's body frame.
//!
//! # Conventions
//! - World frame: x east, y north, angles counter-clockwise from +x.
//! - Agent frame: origin at the agent, +x along its heading.
//! - Bearings are always wrapped to (-π, π].

use std::f64::consts::PI;

/// Wrap an angle to (-π, π].
pub fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid maps +π onto -π; keep the half-open interval closed at +π.
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

/// Range and bearing of a world-frame point as seen from the agent.
pub fn to_polar_relative(target_xy: [f64; 2], agent_xy: [f64; 2], agent_heading: f64) -> (f64, f64) {
    let dx = target_xy[0] - agent_xy[0];
    let dy = target_xy[1] - agent_xy[1];
    let range = (dx * dx + dy * dy).sqrt();
    let bearing = wrap_angle(dy.atan2(dx) - agent_heading);
    (range, bearing)
}

/// Inverse of [`to_polar_relative`]: world-frame point at `(range, bearing)`
/// from the agent.
pub fn from_polar_relative(
    range: f64,
    bearing: f64,
    agent_xy: [f64; 2],
    agent_heading: f64,
) -> [f64; 2] {
    let angle = bearing + agent_heading;
    [
        agent_xy[0] + range * angle.cos(),
        agent_xy[1] + range * angle.sin(),
    ]
}

/// Time derivative of the agent-relative range and bearing.
///
/// The agent moves with linear velocity `agent_v` along its heading and turns
/// at `agent_w`. With `d = p_target − p_agent` and the relative velocity
/// `u = v_target − agent_v·(cos θ, sin θ)`:
///
/// ṙ = (d·u) / r,   α̇ = (d × u) / r² − w
///
/// Both rates are undefined at zero range; this returns `(0.0, 0.0)` there.
pub fn to_polar_rate_relative(
    target_xy: [f64; 2],
    target_vel: [f64; 2],
    agent_xy: [f64; 2],
    agent_heading: f64,
    agent_v: f64,
    agent_w: f64,
) -> (f64, f64) {
    let dx = target_xy[0] - agent_xy[0];
    let dy = target_xy[1] - agent_xy[1];
    let r2 = dx * dx + dy * dy;
    if r2 == 0.0 {
        return (0.0, 0.0);
    }
    let r = r2.sqrt();

    let ux = target_vel[0] - agent_v * agent_heading.cos();
    let uy = target_vel[1] - agent_v * agent_heading.sin();

    let range_rate = (dx * ux + dy * uy) / r;
    let bearing_rate = (dx * uy - dy * ux) / r2 - agent_w;
    (range_rate, bearing_rate)
}

/// Euclidean distance between two planar points.
pub fn distance(a: [f64; 2], b: [f64; 2]) -> f64 {
    ((a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn wrap_keeps_half_open_interval() {
        assert_abs_diff_eq!(wrap_angle(PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(-PI), PI, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(3.0 * PI / 2.0), -PI / 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(wrap_angle(0.25), 0.25, epsilon = 1e-12);
    }

    #[test]
    fn polar_relative_accounts_for_heading() {
        let (r, b) = to_polar_relative([0.0, 5.0], [0.0, 0.0], PI / 2.0);
        assert_abs_diff_eq!(r, 5.0, epsilon = 1e-12);
        assert_abs_diff_eq!(b, 0.0, epsilon = 1e-12);

        let (_, b) = to_polar_relative([-1.0, 0.0], [0.0, 0.0], 0.0);
        assert_abs_diff_eq!(b, PI, epsilon = 1e-12);
    }

    #[test]
    fn polar_inverse_reconstructs_point() {
        let agents = [([0.0, 0.0], 0.0), ([3.5, -2.0], 2.7), ([-10.0, 4.0], -1.2)];
        let targets = [[1.0, 1.0], [-4.0, 7.5], [0.3, -9.0], [12.0, 0.0]];
        for (agent_xy, heading) in agents {
            for target in targets {
                let (r, b) = to_polar_relative(target, agent_xy, heading);
                let back = from_polar_relative(r, b, agent_xy, heading);
                assert_abs_diff_eq!(back[0], target[0], epsilon = 1e-9);
                assert_abs_diff_eq!(back[1], target[1], epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn rates_match_finite_difference() {
        let agent = [1.0, -2.0];
        let heading = 0.4;
        let (v, w) = (1.3, 0.5);
        let target = [6.0, 3.0];
        let target_vel = [-0.7, 0.9];
        let (r_dot, a_dot) = to_polar_rate_relative(target, target_vel, agent, heading, v, w);

        let h = 1e-6;
        let agent_h = [agent[0] + v * heading.cos() * h, agent[1] + v * heading.sin() * h];
        let target_h = [target[0] + target_vel[0] * h, target[1] + target_vel[1] * h];
        let (r0, a0) = to_polar_relative(target, agent, heading);
        let (r1, a1) = to_polar_relative(target_h, agent_h, heading + w * h);
        assert_abs_diff_eq!(r_dot, (r1 - r0) / h, epsilon = 1e-4);
        assert_abs_diff_eq!(a_dot, wrap_angle(a1 - a0) / h, epsilon = 1e-4);
    }

    #[test]
    fn rates_are_zero_at_zero_range() {
        let (r_dot, a_dot) = to_polar_rate_relative([1.0, 1.0], [3.0, 0.0], [1.0, 1.0], 0.0, 1.0, 0.2);
        assert_eq!(r_dot, 0.0);
        assert_eq!(a_dot, 0.0);
    }
}
