//! Topology-guided receding-horizon optimization planner. Three chained
//! stages: a cubic-spline reference, a small set of topology-labeled
//! guidance candidates built from the signed-distance field, and a
//! per-candidate local optimization that shapes a smooth,
//! collision-validated trajectory.
//!
//! The guidance + collision-gated candidate selection is the non-negotiable
//! core; the per-candidate optimizer satisfies the same cost/constraint
//! contract with a lateral-offset parametrization rather than full
//! polynomial trajectory segments.

use crate::plugin::{Deadline, PlannerPlugin, PluginKind, PluginMetadata};
use crate::stats::{CallCounters, FailureCategory};
use crate::types::trajectory::DebugPath;
use crate::types::{PlanningContext, PlanningResult, Pose2d, SignedDistanceField, TrajectoryPoint, Twist2d};
use nalgebra::Vector2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TopologyPlannerConfig {
    /// How far ahead on the reference (in seconds at `default_velocity`) the
    /// guidance candidates reach.
    pub guidance_horizon_s: f64,
    /// K, the maximum number of guidance candidates (default ~4).
    pub num_candidates: usize,
    pub reference_samples: usize,
    pub ego_radius: f64,
    pub safety_margin: f64,
    pub sample_time: f64,
    pub default_velocity: f64,
    pub w_time: f64,
    pub w_accel: f64,
    pub w_omega: f64,
    pub w_collision: f64,
    pub w_moment: f64,
    pub w_end_state: f64,
    pub w_centripetal: f64,
    pub safe_dis: f64,
    pub residual_safe_dis: f64,
    pub outer_iterations: u32,
    pub inner_iterations: u32,
    pub lbfgs_history: usize,
}

impl Default for TopologyPlannerConfig {
    fn default() -> Self {
        Self {
            guidance_horizon_s: 4.0,
            num_candidates: 4,
            reference_samples: 16,
            ego_radius: 1.2,
            safety_margin: 0.3,
            sample_time: 0.1,
            default_velocity: 2.0,
            w_time: 1.0,
            w_accel: 0.5,
            w_omega: 0.5,
            w_collision: 20.0,
            w_moment: 0.2,
            w_end_state: 10.0,
            w_centripetal: 0.3,
            safe_dis: 1.0,
            residual_safe_dis: 0.15,
            outer_iterations: 6,
            inner_iterations: 20,
            lbfgs_history: 6,
        }
    }
}

/// Natural cubic spline over scalar knots, used once per axis to build the
/// arc-length parameterized (x(s), y(s)) reference (Stage A).
struct CubicSpline1d {
    knots: Vec<f64>,
    a: Vec<f64>,
    b: Vec<f64>,
    c: Vec<f64>,
    d: Vec<f64>,
}

impl CubicSpline1d {
    fn new(knots: &[f64], values: &[f64]) -> Self {
        let n = knots.len();
        assert!(n >= 2, "cubic spline needs at least two knots");
        let mut h = vec![0.0; n - 1];
        for i in 0..n - 1 {
            h[i] = (knots[i + 1] - knots[i]).max(1e-9);
        }
        // Tridiagonal system for the second-derivative coefficients (natural
        // boundary conditions: c[0] = c[n-1] = 0).
        let mut alpha = vec![0.0; n];
        for i in 1..n - 1 {
            alpha[i] = 3.0 * (values[i + 1] - values[i]) / h[i] - 3.0 * (values[i] - values[i - 1]) / h[i - 1];
        }
        let mut l = vec![1.0; n];
        let mut mu = vec![0.0; n];
        let mut z = vec![0.0; n];
        for i in 1..n - 1 {
            l[i] = 2.0 * (knots[i + 1] - knots[i - 1]) - h[i - 1] * mu[i - 1];
            mu[i] = h[i] / l[i];
            z[i] = (alpha[i] - h[i - 1] * z[i - 1]) / l[i];
        }
        let mut c = vec![0.0; n];
        let mut b = vec![0.0; n - 1];
        let mut d = vec![0.0; n - 1];
        for j in (0..n - 1).rev() {
            c[j] = z[j] - mu[j] * c[j + 1];
            b[j] = (values[j + 1] - values[j]) / h[j] - h[j] * (c[j + 1] + 2.0 * c[j]) / 3.0;
            d[j] = (c[j + 1] - c[j]) / (3.0 * h[j]);
        }
        Self {
            knots: knots.to_vec(),
            a: values.to_vec(),
            b,
            c,
            d,
        }
    }

    fn segment_for(&self, t: f64) -> usize {
        let n = self.knots.len();
        if t <= self.knots[0] {
            return 0;
        }
        if t >= self.knots[n - 1] {
            return n - 2;
        }
        match self.knots.binary_search_by(|k| k.partial_cmp(&t).unwrap()) {
            Ok(i) => i.min(n - 2),
            Err(i) => (i - 1).min(n - 2),
        }
    }

    fn eval(&self, t: f64) -> f64 {
        let i = self.segment_for(t);
        let dt = t - self.knots[i];
        self.a[i] + self.b[i] * dt + self.c[i] * dt * dt + self.d[i] * dt * dt * dt
    }

    fn eval_derivative(&self, t: f64) -> f64 {
        let i = self.segment_for(t);
        let dt = t - self.knots[i];
        self.b[i] + 2.0 * self.c[i] * dt + 3.0 * self.d[i] * dt * dt
    }
}

/// Arc-length parameterized 2D reference curve (Stage A).
struct ReferenceSpline {
    sx: CubicSpline1d,
    sy: CubicSpline1d,
    length: f64,
}

impl ReferenceSpline {
    /// Samples the straight segment from `start` to `goal` uniformly (no
    /// external reference is provided to the core) and fits the spline.
    fn from_straight_segment(start: Pose2d, goal: Pose2d, samples: usize) -> Self {
        let samples = samples.max(2);
        let mut xs = Vec::with_capacity(samples);
        let mut ys = Vec::with_capacity(samples);
        let mut s_knots = Vec::with_capacity(samples);
        let mut s = 0.0;
        for i in 0..samples {
            let t = i as f64 / (samples - 1) as f64;
            let x = start.x + t * (goal.x - start.x);
            let y = start.y + t * (goal.y - start.y);
            if i > 0 {
                let dx = x - xs[i - 1];
                let dy = y - ys[i - 1];
                s += (dx * dx + dy * dy).sqrt();
            }
            xs.push(x);
            ys.push(y);
            s_knots.push(s);
        }
        // A degenerate (ego == goal) segment still needs strictly increasing
        // knots for the tridiagonal solve.
        for i in 1..s_knots.len() {
            if s_knots[i] <= s_knots[i - 1] {
                s_knots[i] = s_knots[i - 1] + 1e-6;
            }
        }
        let length = *s_knots.last().unwrap();
        Self {
            sx: CubicSpline1d::new(&s_knots, &xs),
            sy: CubicSpline1d::new(&s_knots, &ys),
            length,
        }
    }

    fn position(&self, s: f64) -> Vector2<f64> {
        let s = s.clamp(0.0, self.length);
        Vector2::new(self.sx.eval(s), self.sy.eval(s))
    }

    fn tangent(&self, s: f64) -> Vector2<f64> {
        let s = s.clamp(0.0, self.length);
        let t = Vector2::new(self.sx.eval_derivative(s), self.sy.eval_derivative(s));
        if t.norm() < 1e-9 {
            Vector2::new(1.0, 0.0)
        } else {
            t.normalize()
        }
    }

    fn normal(&self, s: f64) -> Vector2<f64> {
        let t = self.tangent(s);
        Vector2::new(-t.y, t.x)
    }
}

/// One homotopy-labeled candidate geometric path (Stage B): a lateral
/// offset applied to the reference, tapered to zero at both ends so every
/// candidate starts at ego and ends near the reference's forward horizon
/// point.
struct GuidanceCandidate {
    waypoints: Vec<Vector2<f64>>,
    /// Signed lateral offset magnitude this candidate was built from;
    /// `topology_class` buckets its sign as an integer invariant under
    /// continuous deformations that do not cross an obstacle.
    topology_class: i32,
    length: f64,
    yaw_change: f64,
    obstacle_proximity_cost: f64,
    min_clearance: f64,
}

fn build_guidance_candidates(
    reference: &ReferenceSpline,
    horizon_s: f64,
    default_velocity: f64,
    num_candidates: usize,
    clearance_needed: f64,
    esdf: &SignedDistanceField,
    sample_count: usize,
) -> Vec<GuidanceCandidate> {
    let horizon_len = (horizon_s * default_velocity).max(1e-3).min(reference.length.max(1e-3));
    let sample_count = sample_count.max(4);

    // Offsets symmetric around the centerline; step scaled by the
    // obstacle-avoidance envelope (ego radius + safety margin).
    let step = clearance_needed.max(0.1);
    let half = (num_candidates / 2) as i32;
    let offsets: Vec<f64> = (0..num_candidates.max(1))
        .map(|i| (i as i32 - half) as f64 * step)
        .collect();

    // Each offset's waypoint sampling and ESDF clearance lookup is
    // independent of every other candidate; `rayon` fans the up-to-K
    // evaluations out across the worker pool instead of chaining them.
    offsets
        .into_par_iter()
        .map(|offset| {
            let mut waypoints = Vec::with_capacity(sample_count);
            for i in 0..sample_count {
                let t = i as f64 / (sample_count - 1) as f64;
                let s = t * horizon_len;
                // Tapered window: 0 at both ends, peak at the midpoint, so
                // every candidate starts at the reference (ego) and rejoins
                // it at the horizon point.
                let window = (std::f64::consts::PI * t).sin();
                let p = reference.position(s) + reference.normal(s) * (offset * window);
                waypoints.push(p);
            }

            let mut length = 0.0;
            let mut yaw_change = 0.0;
            let mut obstacle_proximity_cost = 0.0;
            let mut min_clearance = f64::INFINITY;
            for i in 0..waypoints.len() {
                let d = esdf.distance_at_world(waypoints[i].x, waypoints[i].y);
                min_clearance = min_clearance.min(d);
                let violation = (clearance_needed - d).max(0.0);
                obstacle_proximity_cost += violation * violation;
                if i > 0 {
                    length += (waypoints[i] - waypoints[i - 1]).norm();
                    if i > 1 {
                        let prev_heading = heading_of(waypoints[i - 1] - waypoints[i - 2]);
                        let heading = heading_of(waypoints[i] - waypoints[i - 1]);
                        yaw_change += (heading - prev_heading).abs();
                    }
                }
            }

            let topology_class = if offset.abs() < 1e-9 {
                0
            } else {
                offset.signum() as i32
            };

            GuidanceCandidate {
                waypoints,
                topology_class,
                length,
                yaw_change,
                obstacle_proximity_cost,
                min_clearance,
            }
        })
        .collect()
}

impl GuidanceCandidate {
    fn selection_cost(&self) -> f64 {
        self.length + self.yaw_change + self.obstacle_proximity_cost
    }

    fn is_feasible(&self, clearance_needed: f64) -> bool {
        self.min_clearance >= clearance_needed
    }
}

/// Compact L-BFGS (two-loop recursion) minimizer with Armijo backtracking
/// (Stage C's quasi-Newton inner loop). Gradients are central finite
/// differences: the parameter count here (per-waypoint lateral offsets) is
/// small enough that this stays well inside a tick's deadline.
struct Lbfgs {
    history: usize,
    s_history: Vec<Vec<f64>>,
    y_history: Vec<Vec<f64>>,
}

impl Lbfgs {
    fn new(history: usize) -> Self {
        Self {
            history,
            s_history: Vec::new(),
            y_history: Vec::new(),
        }
    }

    fn direction(&self, grad: &[f64]) -> Vec<f64> {
        let mut q = grad.to_vec();
        let m = self.s_history.len();
        let mut alpha = vec![0.0; m];
        let mut rho = vec![0.0; m];
        for i in (0..m).rev() {
            let s = &self.s_history[i];
            let y = &self.y_history[i];
            let sy: f64 = dot(s, y);
            rho[i] = if sy.abs() > 1e-12 { 1.0 / sy } else { 0.0 };
            alpha[i] = rho[i] * dot(s, &q);
            for k in 0..q.len() {
                q[k] -= alpha[i] * y[k];
            }
        }
        let gamma = if m > 0 {
            let s = &self.s_history[m - 1];
            let y = &self.y_history[m - 1];
            let yy = dot(y, y);
            if yy > 1e-12 {
                dot(s, y) / yy
            } else {
                1.0
            }
        } else {
            1.0
        };
        let mut r: Vec<f64> = q.iter().map(|v| v * gamma).collect();
        for i in 0..m {
            let s = &self.s_history[i];
            let y = &self.y_history[i];
            let beta = rho[i] * dot(y, &r);
            for k in 0..r.len() {
                r[k] += s[k] * (alpha[i] - beta);
            }
        }
        r.iter_mut().for_each(|v| *v = -*v);
        r
    }

    fn push(&mut self, s: Vec<f64>, y: Vec<f64>) {
        self.s_history.push(s);
        self.y_history.push(y);
        if self.s_history.len() > self.history {
            self.s_history.remove(0);
            self.y_history.remove(0);
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn numeric_gradient(x: &[f64], f: &mut dyn FnMut(&[f64]) -> f64) -> Vec<f64> {
    let eps = 1e-4;
    let mut grad = vec![0.0; x.len()];
    for i in 0..x.len() {
        let mut xp = x.to_vec();
        let mut xm = x.to_vec();
        xp[i] += eps;
        xm[i] -= eps;
        grad[i] = (f(&xp) - f(&xm)) / (2.0 * eps);
    }
    grad
}

/// Runs a bounded L-BFGS descent on `cost`, checking `deadline` between
/// outer iterations and exiting early (not failing) if it expires, per
/// spec.md section 4.5: "inner loop is a quasi-Newton descent with early
/// exit on deadline".
fn lbfgs_minimize(
    mut x: Vec<f64>,
    outer_iterations: u32,
    history: usize,
    deadline: &Deadline,
    mut cost: impl FnMut(&[f64]) -> f64,
) -> (Vec<f64>, f64, u32) {
    let mut lbfgs = Lbfgs::new(history);
    let mut f_x = cost(&x);
    let mut iterations = 0;
    for _ in 0..outer_iterations {
        if deadline.is_expired() {
            break;
        }
        let grad = numeric_gradient(&x, &mut cost);
        let grad_norm = dot(&grad, &grad).sqrt();
        if grad_norm < 1e-8 {
            break;
        }
        let direction = lbfgs.direction(&grad);

        // Armijo backtracking line search.
        let mut step = 1.0;
        let mut accepted = None;
        for _ in 0..12 {
            let candidate: Vec<f64> = x.iter().zip(&direction).map(|(xi, di)| xi + step * di).collect();
            let f_candidate = cost(&candidate);
            if f_candidate <= f_x - 1e-4 * step * grad_norm * grad_norm {
                accepted = Some((candidate, f_candidate));
                break;
            }
            step *= 0.5;
        }
        let (x_next, f_next) = match accepted {
            Some(v) => v,
            None => break,
        };

        let s: Vec<f64> = x_next.iter().zip(&x).map(|(a, b)| a - b).collect();
        let grad_next = numeric_gradient(&x_next, &mut cost);
        let y: Vec<f64> = grad_next.iter().zip(&grad).map(|(a, b)| a - b).collect();
        lbfgs.push(s, y);

        x = x_next;
        f_x = f_next;
        iterations += 1;
    }
    (x, f_x, iterations)
}

pub struct TopologyGuidedPlanner {
    config: TopologyPlannerConfig,
    counters: CallCounters,
    previous_topology_class: Option<i32>,
    previous_first_control: Option<(f64, f64)>,
}

impl Default for TopologyGuidedPlanner {
    fn default() -> Self {
        Self {
            config: TopologyPlannerConfig::default(),
            counters: CallCounters::default(),
            previous_topology_class: None,
            previous_first_control: None,
        }
    }
}

impl TopologyGuidedPlanner {
    pub fn new() -> Self {
        Self::default()
    }

    fn clearance_needed(&self) -> f64 {
        self.config.ego_radius + self.config.safety_margin
    }

    /// Selection rule (spec.md section 4.5): prefer the candidate whose
    /// topology class matches the previously selected one (hysteresis);
    /// otherwise the lowest-cost feasible candidate.
    fn select_candidate(&self, candidates: &[GuidanceCandidate]) -> usize {
        let clearance = self.clearance_needed();
        if let Some(prev_class) = self.previous_topology_class {
            if let Some((idx, _)) = candidates
                .iter()
                .enumerate()
                .filter(|(_, c)| c.topology_class == prev_class && c.is_feasible(clearance))
                .min_by(|(_, a), (_, b)| a.selection_cost().partial_cmp(&b.selection_cost()).unwrap())
            {
                return idx;
            }
        }
        candidates
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| a.selection_cost().partial_cmp(&b.selection_cost()).unwrap())
            .map(|(idx, _)| idx)
            .unwrap_or(0)
    }

    /// Stage C (spec.md section 4.5): optimizes the per-waypoint lateral
    /// offset from the candidate's own centerline to minimize
    /// `J = w_t*T + w_a*integral(a^2) + w_omega*integral(domega^2) +
    /// w_c*P_collision + w_m*P_moment + w_e*P_end + w_s*P_centripetal`,
    /// with an augmented-Lagrangian outer loop enforcing end-state matching.
    fn optimize_candidate(
        &self,
        candidate: &GuidanceCandidate,
        goal: Pose2d,
        ego_twist: Twist2d,
        v_max: f64,
        a_max: f64,
        omega_max: f64,
        esdf: &SignedDistanceField,
        deadline: &Deadline,
    ) -> (Vec<TrajectoryPoint>, f64) {
        let waypoints = &candidate.waypoints;
        let n = waypoints.len();
        let cfg = &self.config;

        // Free parameters: lateral offset (meters) of each interior
        // waypoint relative to the candidate's own path; endpoints are
        // pinned so the trajectory always starts at ego and reaches the
        // candidate's horizon point.
        let mut x = vec![0.0f64; n.saturating_sub(2)];

        let mut lambda = 0.0; // augmented-Lagrangian multiplier on end-state equality
        let mut rho = 1.0;
        let mut best_points = Vec::new();

        for _outer in 0..cfg.outer_iterations.max(1) {
            if deadline.is_expired() {
                break;
            }
            let points = shape_points(waypoints, &x);
            let sample_time = cfg.sample_time.max(1e-3);

            let lambda_capture = lambda;
            let rho_capture = rho;
            let cost_fn = |p: &[f64]| -> f64 {
                let points = shape_points(waypoints, p);
                evaluate_cost(
                    &points,
                    sample_time,
                    v_max,
                    a_max,
                    omega_max,
                    esdf,
                    cfg,
                    goal,
                    lambda_capture,
                    rho_capture,
                )
            };
            let (x_next, f_next, _iters) = lbfgs_minimize(x.clone(), cfg.inner_iterations, cfg.lbfgs_history, deadline, cost_fn);
            x = x_next;
            best_points = points;

            let final_point = *shape_points(waypoints, &x).last().unwrap();
            let violation = (final_point - Vector2::new(goal.x, goal.y)).norm();
            lambda += rho * violation;
            rho = (rho * 1.5).min(1e4);
            if violation < 1e-2 || f_next.is_nan() {
                break;
            }
        }
        if best_points.is_empty() {
            best_points = waypoints.clone();
        }

        let trajectory = points_to_trajectory(&best_points, cfg.sample_time.max(1e-3), v_max, a_max, goal.yaw(), ego_twist);
        let cost = evaluate_cost(
            &best_points,
            cfg.sample_time.max(1e-3),
            v_max,
            a_max,
            omega_max,
            esdf,
            cfg,
            goal,
            lambda,
            rho,
        );
        (trajectory, cost)
    }
}

/// Rebuilds a candidate's waypoints with the optimizer's lateral-offset
/// parameters applied to interior points (endpoints stay pinned).
fn shape_points(base: &[Vector2<f64>], offsets: &[f64]) -> Vec<Vector2<f64>> {
    let n = base.len();
    let mut out = base.to_vec();
    for i in 1..n.saturating_sub(1) {
        let tangent = if i + 1 < n { base[i + 1] - base[i - 1] } else { base[i] - base[i - 1] };
        let normal = if tangent.norm() > 1e-9 {
            Vector2::new(-tangent.y, tangent.x).normalize()
        } else {
            Vector2::new(0.0, 1.0)
        };
        out[i] = base[i] + normal * offsets[i - 1];
    }
    out
}

/// The section 4.5 cost contract, evaluated over a fixed-lateral-offset
/// shape. `P_collision` uses the ESDF-based penalty that "grows sharply
/// below `safe_dis`"; `P_end_state` and the augmented-Lagrangian term both
/// pull the final sample toward the goal -- the AL term is the one actually
/// updated by the outer loop, `w_e` keeps a baseline pull even at rho=0.
#[allow(clippy::too_many_arguments)]
fn evaluate_cost(
    points: &[Vector2<f64>],
    sample_time: f64,
    v_max: f64,
    a_max: f64,
    omega_max: f64,
    esdf: &SignedDistanceField,
    cfg: &TopologyPlannerConfig,
    goal: Pose2d,
    lambda: f64,
    rho: f64,
) -> f64 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    let total_time = (n - 1) as f64 * sample_time;

    let mut accel_cost = 0.0;
    let mut omega_cost = 0.0;
    let mut collision_cost = 0.0;
    let mut centripetal_cost = 0.0;
    let mut moment_cost = 0.0;

    let mut prev_speed = 0.0;
    let mut prev_heading = heading_of(points[1] - points[0]);
    let mut prev_omega = 0.0;

    for i in 0..n {
        let d = esdf.distance_at_world(points[i].x, points[i].y);
        // Quadratic below `safe_dis`, with an extra steep term once the
        // margin drops under a third of it -- "grows sharply below
        // safe_dis" (spec.md section 4.5) without blowing up to infinity.
        let violation = (cfg.safe_dis - d).max(0.0);
        let steep_zone = (cfg.safe_dis / 3.0 - d).max(0.0);
        collision_cost += violation * violation + 10.0 * steep_zone * steep_zone;

        if i + 1 < n {
            let step = points[i + 1] - points[i];
            let speed = (step.norm() / sample_time).min(v_max * 2.0);
            let heading = heading_of(step);
            let accel = (speed - prev_speed) / sample_time;
            let dheading = wrap_angle(heading - prev_heading);
            let omega = dheading / sample_time;
            let domega = (omega - prev_omega) / sample_time;

            accel_cost += (accel / a_max.max(1e-6)).powi(2);
            omega_cost += (domega / omega_max.max(1e-6)).powi(2);
            moment_cost += domega.powi(2);
            let curvature = if speed > 1e-3 { dheading / (speed * sample_time).max(1e-6) } else { 0.0 };
            centripetal_cost += (speed * speed * curvature).powi(2);

            prev_speed = speed;
            prev_heading = heading;
            prev_omega = omega;
        }
    }

    let final_point = points[n - 1];
    let end_state_error = (final_point - Vector2::new(goal.x, goal.y)).norm();

    cfg.w_time * total_time
        + cfg.w_accel * accel_cost
        + cfg.w_omega * omega_cost
        + cfg.w_collision * collision_cost
        + cfg.w_moment * moment_cost
        + cfg.w_centripetal * centripetal_cost
        + cfg.w_end_state * end_state_error * end_state_error
        + lambda * end_state_error
        + 0.5 * rho * end_state_error * end_state_error
}

fn heading_of(v: Vector2<f64>) -> f64 {
    v.y.atan2(v.x)
}

fn wrap_angle(a: f64) -> f64 {
    let mut a = a % (2.0 * std::f64::consts::PI);
    if a > std::f64::consts::PI {
        a -= 2.0 * std::f64::consts::PI;
    } else if a < -std::f64::consts::PI {
        a += 2.0 * std::f64::consts::PI;
    }
    a
}

fn points_to_trajectory(
    points: &[Vector2<f64>],
    sample_time: f64,
    v_max: f64,
    a_max: f64,
    goal_yaw: f64,
    ego_twist: Twist2d,
) -> Vec<TrajectoryPoint> {
    let n = points.len();
    let mut trajectory = Vec::with_capacity(n);
    let mut prev_speed = ego_twist.speed();
    for i in 0..n {
        let yaw = if i + 1 < n {
            (points[i + 1].y - points[i].y).atan2(points[i + 1].x - points[i].x)
        } else {
            goal_yaw
        };
        let speed = if i + 1 < n {
            let raw = (points[i + 1] - points[i]).norm() / sample_time;
            raw.min(v_max)
        } else {
            0.0
        };
        let accel = ((speed - prev_speed) / sample_time).clamp(-a_max, a_max);
        let curvature = if i > 0 && i + 1 < n {
            let h0 = (points[i].y - points[i - 1].y).atan2(points[i].x - points[i - 1].x);
            let h1 = (points[i + 1].y - points[i].y).atan2(points[i + 1].x - points[i].x);
            let step = (points[i + 1] - points[i - 1]).norm() / 2.0;
            if step > 1e-6 {
                wrap_angle(h1 - h0) / step
            } else {
                0.0
            }
        } else {
            0.0
        };
        trajectory.push(TrajectoryPoint {
            pose: Pose2d::new(points[i].x, points[i].y, yaw),
            twist: Twist2d::new(speed, 0.0, 0.0),
            acceleration: accel,
            steering_angle: 0.0,
            curvature,
            time_from_start_s: i as f64 * sample_time,
            path_length_m: 0.0,
        });
        prev_speed = speed;
    }
    PlanningResult::fill_arc_length(&mut trajectory);
    trajectory
}

impl PlannerPlugin for TopologyGuidedPlanner {
    fn metadata(&self) -> PluginMetadata {
        PluginMetadata {
            name: "TopologyGuidedPlanner".into(),
            version: "1.0".into(),
            description: "Topology-guided receding-horizon optimization planner over an ESDF".into(),
            kind: PluginKind::Planner,
            required_artifacts: vec!["esdf".into()],
            may_be_fallback: false,
        }
    }

    fn initialize(&mut self, config: &serde_json::Value) -> crate::error::Result<()> {
        if !config.is_null() {
            self.config = serde_json::from_value(config.clone())?;
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.counters.reset();
        self.previous_topology_class = None;
        self.previous_first_control = None;
    }

    fn statistics(&self) -> HashMap<String, f64> {
        self.counters.snapshot()
    }

    fn is_available(&self, context: &PlanningContext) -> (bool, String) {
        match &context.esdf {
            Some(_) => (true, String::new()),
            None => (false, crate::error::PlannerError::NoSignedDistanceField.to_string()),
        }
    }

    fn plan(&mut self, context: &PlanningContext, deadline: Deadline, result: &mut PlanningResult) -> crate::error::Result<()> {
        let start = std::time::Instant::now();
        let esdf = match &context.esdf {
            Some(e) => e,
            None => {
                result.success = false;
                result.failure_reason = crate::error::PlannerError::NoSignedDistanceField.to_string();
                self.counters.record_failure(FailureCategory::Invalid);
                return Ok(());
            }
        };

        if deadline.is_expired() {
            result.success = false;
            result.failure_reason = "deadline".into();
            self.counters.record_failure(FailureCategory::Deadline);
            return Ok(());
        }

        let ego = context.ego.pose;
        let goal = context.task.goal;
        let reference = ReferenceSpline::from_straight_segment(ego, goal, self.config.reference_samples);

        let clearance = self.clearance_needed();
        let candidates = build_guidance_candidates(
            &reference,
            self.config.guidance_horizon_s,
            self.config.default_velocity.max(0.1),
            self.config.num_candidates.max(1),
            clearance,
            esdf,
            self.config.reference_samples,
        );

        // Try candidates in preference order: the hysteresis winner first
        // (if feasible), then the rest ranked by feasibility and selection
        // cost, so a mid-optimization deadline still leaves the best
        // available candidate tried first.
        let preferred = self.select_candidate(&candidates);
        let mut order: Vec<usize> = (0..candidates.len()).collect();
        order.sort_by(|&a, &b| {
            let a_preferred = a == preferred && candidates[a].is_feasible(clearance);
            let b_preferred = b == preferred && candidates[b].is_feasible(clearance);
            b_preferred.cmp(&a_preferred).then_with(|| {
                let a_feasible = candidates[a].is_feasible(clearance);
                let b_feasible = candidates[b].is_feasible(clearance);
                b_feasible.cmp(&a_feasible).then_with(|| {
                    candidates[a]
                        .selection_cost()
                        .partial_cmp(&candidates[b].selection_cost())
                        .unwrap()
                })
            })
        });

        let mut debug_paths = Vec::new();
        let mut accepted: Option<(Vec<TrajectoryPoint>, i32, f64, f64)> = None;

        for &idx in &order {
            if deadline.is_expired() {
                break;
            }
            let candidate = &candidates[idx];
            let (trajectory, cost) = self.optimize_candidate(
                candidate,
                goal,
                context.ego.twist,
                context.ego.chassis.v_max,
                context.ego.chassis.a_max,
                context.ego.chassis.omega_max,
                esdf,
                &deadline,
            );

            debug_paths.push(DebugPath {
                label: format!("candidate_{idx}_class_{}", candidate.topology_class),
                points: trajectory.iter().map(|p| (p.pose.x, p.pose.y)).collect(),
            });

            let min_clearance = trajectory
                .iter()
                .map(|p| esdf.distance_at_world(p.pose.x, p.pose.y))
                .fold(f64::INFINITY, f64::min);

            if min_clearance >= self.config.residual_safe_dis {
                let control_distance = self.previous_first_control.map(|(pa, ps)| {
                    let first = &trajectory[0];
                    ((first.acceleration - pa).powi(2) + (first.steering_angle - ps).powi(2)).sqrt()
                });
                let tie_break_bonus = control_distance.unwrap_or(0.0) * 0.01;
                let effective_cost = cost + tie_break_bonus;
                let better = match &accepted {
                    None => true,
                    Some((_, _, _, best_cost)) => effective_cost < *best_cost,
                };
                if better {
                    accepted = Some((trajectory, candidate.topology_class, min_clearance, effective_cost));
                }
                // First feasible candidate in preference order is good enough;
                // stop early to leave margin for the next tick's deadline.
                if accepted.is_some() {
                    break;
                }
            }
        }

        result.debug_paths = Some(debug_paths);

        match accepted {
            Some((trajectory, class, min_clearance, _cost)) => {
                self.previous_topology_class = Some(class);
                self.previous_first_control = trajectory.first().map(|p| (p.acceleration, p.steering_angle));
                result.trajectory = trajectory;
                result.success = true;
                result.failure_reason.clear();
                result.metadata.insert("topology_class".into(), class as f64);
                result.metadata.insert("min_clearance_m".into(), min_clearance);
                result.iterations = self.config.outer_iterations;
                self.counters.record_success();
            }
            None => {
                result.success = false;
                result.failure_reason = "No path found".into();
                self.counters.record_failure(FailureCategory::NoSolution);
            }
        }
        result.planner_name = self.metadata().name;
        result.computation_time_ms = start.elapsed().as_secs_f64() * 1000.0;
        Ok(())
    }
}
