use std::collections::HashMap;

use ::core::f64::consts::PI;

use log::trace;
use nalgebra::{DMatrix, SMatrix};
use serde::{Deserialize, Serialize};

use super::greedy::greedy;
use super::hungarian::hungarian;
use crate::tracker::Tracker;
use crate::types::labels::ObjectLabel;
use crate::types::object::{DetectedObject, DetectedObjects, TrackedObject};
use crate::utils::{formed_yaw_angle, get_2d_iou};
use crate::{Result, TrackerError};

/// Scores below this are treated as no match.
pub const SCORE_THRESHOLD: f64 = 0.01;

/// Upper bound of the total tie-break bias added to Hungarian costs.
/// Assignments whose total scores differ by less than this count as tied.
const TIE_BREAK_TOTAL: f64 = 1e-9;

/// Union area below which IoU is reported as zero.
const MIN_UNION_IOU_AREA: f64 = 1e-2;

const N: usize = ObjectLabel::COUNT;

/// Per class-pair table, row = tracker label, column = measurement label.
type LabelTable<T> = SMatrix<T, N, N>;

// ============================================================================
// Configuration
// ============================================================================

/// Global assignment strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentSolver {
    /// Optimal total score
    #[default]
    Hungarian,
    /// Highest score first
    Greedy,
}

/// Gating tables for association, indexed by [`ObjectLabel::index`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    pub can_assign_matrix: Vec<Vec<bool>>,
    /// Meters
    pub max_dist_matrix: Vec<Vec<f64>>,
    /// Detection footprint area bounds, m²
    pub max_area_matrix: Vec<Vec<f64>>,
    pub min_area_matrix: Vec<Vec<f64>>,
    /// Heading difference bound, radians; `>= π` disables the gate
    pub max_rad_matrix: Vec<Vec<f64>>,
    pub min_iou_matrix: Vec<Vec<f64>>,
    pub solver: AssignmentSolver,
}

fn rows<T: Copy>(data: [[T; N]; N]) -> Vec<Vec<T>> {
    data.iter().map(|r| r.to_vec()).collect()
}

impl Default for AssociationConfig {
    fn default() -> Self {
        const T: bool = true;
        const F: bool = false;
        const X: f64 = 10000.0;
        const R: f64 = 3.150;
        const V: f64 = 1.047;

        Self {
            // UNKNOWN, CAR, TRUCK, BUS, TRAILER, MOTORCYCLE, BICYCLE, PEDESTRIAN
            can_assign_matrix: rows([
                [T, F, F, F, F, F, F, F],
                [F, T, T, T, T, F, F, F],
                [F, T, T, T, T, F, F, F],
                [F, T, T, T, T, F, F, F],
                [F, T, T, T, T, F, F, F],
                [F, F, F, F, F, T, T, T],
                [F, F, F, F, F, T, T, T],
                [F, F, F, F, F, T, T, T],
            ]),
            max_dist_matrix: rows([
                [4.0, 4.0, 5.0, 5.0, 5.0, 2.0, 2.0, 2.0],
                [4.0, 2.0, 5.0, 5.0, 5.0, 2.0, 2.0, 2.0],
                [5.0, 5.0, 5.0, 5.0, 5.0, 2.0, 2.0, 2.0],
                [5.0, 5.0, 5.0, 5.0, 5.0, 2.0, 2.0, 2.0],
                [5.0, 5.0, 5.0, 5.0, 5.0, 2.0, 2.0, 2.0],
                [2.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0],
                [2.0, 2.0, 2.0, 2.0, 2.0, 3.0, 3.0, 3.0],
                [2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0],
            ]),
            max_area_matrix: rows([
                [X, X, X, X, X, X, X, X],
                [12.10, 12.10, 36.00, 60.00, 60.00, X, X, X],
                [36.00, 12.10, 36.00, 60.00, 60.00, X, X, X],
                [60.00, 12.10, 36.00, 60.00, 60.00, X, X, X],
                [60.00, 12.10, 36.00, 60.00, 60.00, X, X, X],
                [2.50, X, X, X, X, 2.50, 2.50, 1.00],
                [2.50, X, X, X, X, 2.50, 2.50, 1.00],
                [2.00, X, X, X, X, 1.50, 1.50, 1.00],
            ]),
            min_area_matrix: rows([
                [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
                [3.6, 3.6, 6.0, 10.0, 10.0, 0.0, 0.0, 0.0],
                [6.0, 3.6, 6.0, 10.0, 10.0, 0.0, 0.0, 0.0],
                [10.0, 3.6, 6.0, 10.0, 10.0, 0.0, 0.0, 0.0],
                [10.0, 3.6, 6.0, 10.0, 10.0, 0.0, 0.0, 0.0],
                [0.001, 0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.1],
                [0.001, 0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.1],
                [0.001, 0.0, 0.0, 0.0, 0.0, 0.1, 0.1, 0.1],
            ]),
            max_rad_matrix: rows([
                [R, R, R, R, R, R, R, R],
                [R, V, V, V, V, R, R, R],
                [R, V, V, V, V, R, R, R],
                [R, V, V, V, V, R, R, R],
                [R, V, V, V, V, R, R, R],
                [R, R, R, R, R, R, R, R],
                [R, R, R, R, R, R, R, R],
                [R, R, R, R, R, R, R, R],
            ]),
            min_iou_matrix: rows([
                [0.0001, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
                [0.1, 0.1, 0.2, 0.2, 0.2, 0.1, 0.1, 0.1],
                [0.1, 0.2, 0.3, 0.3, 0.3, 0.1, 0.1, 0.1],
                [0.1, 0.2, 0.3, 0.3, 0.3, 0.1, 0.1, 0.1],
                [0.1, 0.2, 0.3, 0.3, 0.3, 0.1, 0.1, 0.1],
                [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
                [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1],
                [0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.1, 0.0001],
            ]),
            solver: AssignmentSolver::default(),
        }
    }
}

fn to_table<T: nalgebra::Scalar + Copy>(name: &str, data: &[Vec<T>]) -> Result<LabelTable<T>> {
    if data.len() != N || data.iter().any(|row| row.len() != N) {
        return Err(TrackerError::InvalidConfig(format!(
            "{} must be {}x{}",
            name, N, N
        )));
    }
    Ok(LabelTable::from_fn(|i, j| data[i][j]))
}

impl AssociationConfig {
    /// Checks table shapes and value ranges.
    pub fn validate(&self) -> Result<()> {
        Tables::from_config(self).map(|_| ())
    }
}

// ============================================================================
// Data Association
// ============================================================================

/// Validated gating tables.
#[derive(Debug, Clone)]
struct Tables {
    can_assign: LabelTable<bool>,
    max_dist: LabelTable<f64>,
    max_area: LabelTable<f64>,
    min_area: LabelTable<f64>,
    max_rad: LabelTable<f64>,
    min_iou: LabelTable<f64>,
}

impl Tables {
    fn from_config(config: &AssociationConfig) -> Result<Self> {
        let tables = Self {
            can_assign: to_table("can_assign_matrix", &config.can_assign_matrix)?,
            max_dist: to_table("max_dist_matrix", &config.max_dist_matrix)?,
            max_area: to_table("max_area_matrix", &config.max_area_matrix)?,
            min_area: to_table("min_area_matrix", &config.min_area_matrix)?,
            max_rad: to_table("max_rad_matrix", &config.max_rad_matrix)?,
            min_iou: to_table("min_iou_matrix", &config.min_iou_matrix)?,
        };

        if tables.max_dist.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
            return Err(TrackerError::InvalidConfig(
                "max_dist_matrix entries must be positive".into(),
            ));
        }
        if tables
            .min_area
            .iter()
            .zip(tables.max_area.iter())
            .any(|(lo, hi)| lo.is_nan() || hi.is_nan() || lo > hi)
        {
            return Err(TrackerError::InvalidConfig(
                "min_area_matrix exceeds max_area_matrix".into(),
            ));
        }
        if tables.min_iou.iter().any(|v| !(0.0..=1.0).contains(v)) {
            return Err(TrackerError::InvalidConfig(
                "min_iou_matrix entries must be in [0, 1]".into(),
            ));
        }
        Ok(tables)
    }
}

/// Track/detection pairing of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssignmentResult {
    /// Track index to detection index
    pub direct: HashMap<usize, usize>,
    /// Detection index to track index
    pub reverse: HashMap<usize, usize>,
}

/// Scores and assigns detections to tracks.
#[derive(Debug, Clone)]
pub struct DataAssociation {
    tables: Tables,
    solver: AssignmentSolver,
}

impl DataAssociation {
    /// # Errors
    /// [`TrackerError::InvalidConfig`] if a table is not 8x8 or out of range.
    pub fn new(config: AssociationConfig) -> Result<Self> {
        Ok(Self {
            tables: Tables::from_config(&config)?,
            solver: config.solver,
        })
    }

    #[inline]
    pub fn solver(&self) -> AssignmentSolver {
        self.solver
    }

    /// Score of every track (rows) against every detection (columns).
    ///
    /// Tracks are evaluated at the detection stamp. A track that cannot
    /// export a state scores zero against everything.
    pub fn calc_score_matrix(
        &self,
        detections: &DetectedObjects,
        trackers: &[Tracker],
    ) -> DMatrix<f64> {
        let mut score = DMatrix::zeros(trackers.len(), detections.len());

        for (i, tracker) in trackers.iter().enumerate() {
            let Some(tracked) = tracker.get_tracked_object(detections.stamp) else {
                trace!("track {} has no state at {}", tracker.id(), detections.stamp);
                continue;
            };
            for (j, object) in detections.objects.iter().enumerate() {
                score[(i, j)] = self.pair_score(&tracked, object);
            }
        }

        score
    }

    fn pair_score(&self, tracked: &TrackedObject, object: &DetectedObject) -> f64 {
        let t = tracked.label().index();
        let m = object.label().index();

        if !self.tables.can_assign[(t, m)] {
            return 0.0;
        }

        let max_dist = self.tables.max_dist[(t, m)];
        let dist = tracked.kinematics.pose.distance_2d(&object.kinematics.pose);
        if dist > max_dist {
            return 0.0;
        }

        let area = object.shape.area();
        if area < self.tables.min_area[(t, m)] || area > self.tables.max_area[(t, m)] {
            return 0.0;
        }

        let max_rad = self.tables.max_rad[(t, m)];
        if max_rad.abs() < PI {
            let angle = formed_yaw_angle(
                object.kinematics.pose.yaw,
                tracked.kinematics.pose.yaw,
                false,
            );
            if angle.abs() > max_rad {
                return 0.0;
            }
        }

        let iou = get_2d_iou(
            &tracked.kinematics.pose,
            &tracked.shape,
            &object.kinematics.pose,
            &object.shape,
            MIN_UNION_IOU_AREA,
        );
        if iou < self.tables.min_iou[(t, m)] {
            return 0.0;
        }

        let score = (max_dist - dist.min(max_dist)) / max_dist;
        if score < SCORE_THRESHOLD {
            0.0
        } else {
            score
        }
    }

    /// Assignment maximizing the total score.
    ///
    /// Pairs scoring below [`SCORE_THRESHOLD`] are never assigned.
    pub fn assign(&self, score: &DMatrix<f64>) -> Result<AssignmentResult> {
        let assignment = match self.solver {
            AssignmentSolver::Greedy => greedy(score, SCORE_THRESHOLD),
            AssignmentSolver::Hungarian => {
                // every complete assignment has the same size, so minimizing
                // (1 - score) maximizes the total score; the row term breaks
                // ties toward the lower track index
                let rows = score.nrows().max(1) as f64;
                let tie_step = TIE_BREAK_TOTAL / (rows * rows);
                let cost = DMatrix::from_fn(score.nrows(), score.ncols(), |i, j| {
                    let s = score[(i, j)];
                    let s = if s.is_finite() { s } else { 0.0 };
                    1.0 - s + i as f64 * tie_step
                });
                hungarian(&cost)?
            }
        };

        let mut result = AssignmentResult::default();
        for (track, detection) in assignment.pairs() {
            if score[(track, detection)] < SCORE_THRESHOLD {
                continue;
            }
            result.direct.insert(track, detection);
            result.reverse.insert(detection, track);
        }
        Ok(result)
    }
}
