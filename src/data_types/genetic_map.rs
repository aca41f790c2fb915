use crate::errors::PhasingError;

/// A piecewise-linear map from physical positions (bp) to genetic positions (cM)
#[derive(Clone, Debug)]
pub struct GeneticMap {
    /// physical positions, strictly increasing
    positions: Vec<u32>,
    /// genetic position at each physical position, non-decreasing
    centimorgans: Vec<f64>
}

impl GeneticMap {
    /// Builds a map from (position, cM) points.
    /// # Errors
    /// * if there are no points, positions are not strictly increasing, or cM values are not finite and non-decreasing
    pub fn new(points: Vec<(u32, f64)>) -> Result<GeneticMap, PhasingError> {
        if points.is_empty() {
            return Err(PhasingError::InvalidGeneticMap { reason: "no map points".to_string() });
        }
        for window in points.windows(2) {
            let (p0, c0) = window[0];
            let (p1, c1) = window[1];
            if p1 <= p0 {
                return Err(PhasingError::InvalidGeneticMap {
                    reason: format!("positions not in ascending order at {p1}")
                });
            }
            if c1 < c0 {
                return Err(PhasingError::InvalidGeneticMap {
                    reason: format!("genetic position decreases at {p1}")
                });
            }
        }
        if let Some(&(position, cm)) = points.iter().find(|(_p, cm)| !cm.is_finite()) {
            return Err(PhasingError::InvalidGeneticMap {
                reason: format!("genetic position {cm} at {position} is not finite")
            });
        }

        let (positions, centimorgans) = points.into_iter().unzip();
        Ok(GeneticMap {
            positions,
            centimorgans
        })
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Local rate (cM/bp) between two map points
    fn rate(&self, left: usize, right: usize) -> f64 {
        (self.centimorgans[right] - self.centimorgans[left]) / (self.positions[right] - self.positions[left]) as f64
    }

    /// Interpolates the genetic position of a physical position.
    /// Positions outside of the map are extrapolated with the rate of the nearest interval.
    /// # Arguments
    /// * `position` - the physical position
    /// * `default_rate` - rate (cM/bp) to extrapolate with when the map has a single point
    pub fn genetic_position(&self, position: u32, default_rate: f64) -> f64 {
        let last = self.positions.len() - 1;
        match self.positions.binary_search(&position) {
            Ok(index) => self.centimorgans[index],
            Err(0) => {
                let rate = if last > 0 { self.rate(0, 1) } else { default_rate };
                self.centimorgans[0] - rate * (self.positions[0] - position) as f64
            },
            Err(index) if index > last => {
                let rate = if last > 0 { self.rate(last - 1, last) } else { default_rate };
                self.centimorgans[last] + rate * (position - self.positions[last]) as f64
            },
            Err(index) => {
                let fraction = (position - self.positions[index - 1]) as f64
                    / (self.positions[index] - self.positions[index - 1]) as f64;
                self.centimorgans[index - 1] + fraction * (self.centimorgans[index] - self.centimorgans[index - 1])
            }
        }
    }

    /// Genetic distance (cM) between two physical positions
    pub fn genetic_distance(&self, pos1: u32, pos2: u32, default_rate: f64) -> f64 {
        (self.genetic_position(pos2, default_rate) - self.genetic_position(pos1, default_rate)).abs()
    }
}
