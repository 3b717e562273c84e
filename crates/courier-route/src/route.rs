//! Simulated driver route
//!
//! Pure stepping logic behind the position simulator: `steps` ticks that
//! linearly interpolate from an origin to a destination. Each intermediate
//! point gets bounded bearing noise, then is pulled back onto the circle of
//! the straight-line remaining distance, so noise never costs progress.
//!
//! ```
//! use courier_route::{RouteConfig, SimulatedRoute};
//! use courier_types::GeoPoint;
//!
//! let mut route = SimulatedRoute::new(
//!     GeoPoint::new(19.0760, 72.8777),
//!     GeoPoint::new(19.1136, 72.8697),
//!     RouteConfig::default().with_steps(4),
//! );
//! let mut last = 0.0;
//! while let Some(tick) = route.next_tick() {
//!     assert!(tick.progress >= last);
//!     last = tick.progress;
//! }
//! assert_eq!(last, 100.0);
//! ```

use courier_types::GeoPoint;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Stepping parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RouteConfig {
    /// Number of ticks from origin to destination
    pub steps: u32,
    /// Maximum jitter in degrees applied across the direction of travel
    pub max_jitter_deg: f64,
    /// Seed for reproducible jitter (`None` = entropy)
    pub seed: Option<u64>,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            steps: 50,
            max_jitter_deg: 0.0005,
            seed: None,
        }
    }
}

impl RouteConfig {
    /// Set the number of steps (at least one)
    pub fn with_steps(mut self, steps: u32) -> Self {
        self.steps = steps.max(1);
        self
    }

    /// Set the jitter bound
    pub fn with_jitter(mut self, max_jitter_deg: f64) -> Self {
        self.max_jitter_deg = max_jitter_deg.abs();
        self
    }

    /// Use a fixed seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// One simulated position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTick {
    /// Simulated driver position
    pub position: GeoPoint,
    /// Progress of this run, 0-100
    pub progress: f64,
    /// Last tick of the run (position equals the destination)
    pub terminal: bool,
}

/// Interpolated route from origin to destination
#[derive(Debug)]
pub struct SimulatedRoute {
    origin: GeoPoint,
    destination: GeoPoint,
    config: RouteConfig,
    step: u32,
    finished: bool,
    rng: StdRng,
}

impl SimulatedRoute {
    /// Create a route; nothing is produced until [`next_tick`](Self::next_tick)
    pub fn new(origin: GeoPoint, destination: GeoPoint, config: RouteConfig) -> Self {
        let config = config.with_steps(config.steps);
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            origin,
            destination,
            config,
            step: 0,
            finished: false,
            rng,
        }
    }

    /// Route start
    pub fn origin(&self) -> GeoPoint {
        self.origin
    }

    /// Route end
    pub fn destination(&self) -> GeoPoint {
        self.destination
    }

    /// Check if the terminal tick has been produced
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Progress of the most recent tick
    pub fn progress(&self) -> f64 {
        self.step as f64 / self.config.steps as f64 * 100.0
    }

    /// Produce the next position
    ///
    /// Returns `None` once the terminal tick has been emitted.
    pub fn next_tick(&mut self) -> Option<SimTick> {
        if self.finished {
            return None;
        }

        self.step += 1;
        let fraction = self.step as f64 / self.config.steps as f64;

        if self.step >= self.config.steps {
            self.finished = true;
            return Some(SimTick {
                position: self.destination,
                progress: 100.0,
                terminal: true,
            });
        }

        let straight = self.origin.lerp(&self.destination, fraction);
        let position = self.jittered(straight);

        Some(SimTick {
            position,
            progress: fraction * 100.0,
            terminal: false,
        })
    }

    /// Add bearing noise without increasing the remaining distance
    ///
    /// Works in a local frame around the destination where a degree of
    /// longitude is scaled by `cos(lat)`, so lengths track ground distance.
    fn jittered(&mut self, straight: GeoPoint) -> GeoPoint {
        if self.config.max_jitter_deg == 0.0 {
            return straight;
        }

        let k = self.destination.lat.to_radians().cos();
        if k <= f64::EPSILON {
            return straight;
        }

        let (dn, de) = (
            self.destination.lat - self.origin.lat,
            (self.destination.lng - self.origin.lng) * k,
        );
        let len = dn.hypot(de);
        if len == 0.0 {
            return straight;
        }

        // Straight point relative to the destination
        let (sn, se) = (
            straight.lat - self.destination.lat,
            (straight.lng - self.destination.lng) * k,
        );
        let want = sn.hypot(se);

        // Offset perpendicular to the direction of travel, then pull back
        // onto the circle of the straight-line remaining distance
        let offset = self.rng.gen_range(-1.0..=1.0) * self.config.max_jitter_deg;
        let (vn, ve) = (sn - de / len * offset, se + dn / len * offset);
        let have = vn.hypot(ve);
        if have == 0.0 {
            return straight;
        }
        let scale = want / have;
        let (mut vn, mut ve) = (vn * scale, ve * scale);

        // The local frame only approximates the sphere; settle the last
        // bit against great-circle distance
        let limit = straight.distance_km(&self.destination);
        for _ in 0..3 {
            let noisy = GeoPoint::new(self.destination.lat + vn, self.destination.lng + ve / k);
            let actual = noisy.distance_km(&self.destination);
            if actual <= limit {
                return noisy;
            }
            let shrink = limit / actual;
            vn *= shrink;
            ve *= shrink;
        }
        straight
    }
}
