//! Neighborhood metrics for mapper IN spaces.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::Coord;

/// Neighborhood queries in a coordinate space.
pub trait Metric: fmt::Debug + Send + Sync {
    /// Coordinates within `radius` of `center`, including `center` itself.
    ///
    /// May return coordinates outside the space; callers filter them.
    fn neighbors(&self, center: &[usize], radius: f64) -> Vec<Coord>;
}

/// Distance function on grid offsets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Distance {
    #[default]
    Euclidean,
    Manhattan,
    Chebyshev,
}

impl Distance {
    /// Distance of a physical offset vector from the origin.
    pub fn eval(self, offset: &[f64]) -> f64 {
        match self {
            Distance::Euclidean => offset.iter().map(|d| d * d).sum::<f64>().sqrt(),
            Distance::Manhattan => offset.iter().map(|d| d.abs()).sum(),
            Distance::Chebyshev => offset.iter().fold(0.0, |m, d| m.max(d.abs())),
        }
    }
}

/// Neighborhoods on a regular grid.
///
/// `element_size` is the physical extent of one grid step per axis; a
/// single value applies to every axis.
///
/// ```
/// use mvpa::mapper::{Distance, GridMetric, Metric};
///
/// let metric = GridMetric::new(vec![1.0, 1.0]).with_distance(Distance::Manhattan);
/// let around = metric.neighbors(&[1, 1], 1.0);
/// assert_eq!(around, vec![vec![0, 1], vec![1, 0], vec![1, 1], vec![1, 2], vec![2, 1]]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridMetric {
    pub element_size: Vec<f64>,
    pub distance: Distance,
}

impl GridMetric {
    pub fn new(element_size: Vec<f64>) -> Self {
        Self {
            element_size,
            distance: Distance::default(),
        }
    }

    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }

    fn step(&self, axis: usize) -> Option<f64> {
        match self.element_size.as_slice() {
            [single] => Some(*single),
            sizes => sizes.get(axis).copied(),
        }
    }
}

impl Metric for GridMetric {
    fn neighbors(&self, center: &[usize], radius: f64) -> Vec<Coord> {
        if center.is_empty() || radius < 0.0 {
            return Vec::new();
        }
        let mut steps = Vec::with_capacity(center.len());
        for axis in 0..center.len() {
            match self.step(axis) {
                Some(s) if s > 0.0 => steps.push(s),
                _ => return Vec::new(),
            }
        }

        // Search box per axis, clipped at zero.
        let bounds: Vec<(usize, usize)> = center
            .iter()
            .zip(&steps)
            .map(|(&c, &s)| {
                let reach = (radius / s).floor() as usize;
                (c.saturating_sub(reach), c + reach)
            })
            .collect();

        let mut out = Vec::new();
        let mut current: Vec<usize> = bounds.iter().map(|b| b.0).collect();
        let mut offset = vec![0.0; center.len()];
        loop {
            for (o, ((&x, &c), &s)) in offset.iter_mut().zip(current.iter().zip(center).zip(&steps)) {
                *o = (x as f64 - c as f64) * s;
            }
            if self.distance.eval(&offset) <= radius {
                out.push(current.clone());
            }

            // Odometer increment, last axis fastest.
            let mut axis = current.len();
            loop {
                if axis == 0 {
                    return out;
                }
                axis -= 1;
                if current[axis] < bounds[axis].1 {
                    current[axis] += 1;
                    break;
                }
                current[axis] = bounds[axis].0;
            }
        }
    }
}
