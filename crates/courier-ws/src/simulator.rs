//! Timer-driven position simulator
//!
//! Wraps a [`SimulatedRoute`] with its own interval. The simulator is owned
//! by the connection manager and polled from its `select!` loop, so there is
//! never a timer running on its own.

use courier_route::{PositionUpdate, RouteConfig, SimulatedRoute};
use courier_types::GeoPoint;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::debug;

/// Simulator configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimulatorConfig {
    /// Time between simulated positions
    pub interval: Duration,
    /// Route stepping parameters
    pub route: RouteConfig,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            route: RouteConfig::default(),
        }
    }
}

impl SimulatorConfig {
    /// Set the tick interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the route parameters
    pub fn with_route(mut self, route: RouteConfig) -> Self {
        self.route = route;
        self
    }
}

struct Run {
    route: SimulatedRoute,
    interval: Interval,
    base_progress: f64,
}

/// Produces simulated positions while the live feed is unavailable
pub struct PositionSimulator {
    config: SimulatorConfig,
    run: Option<Run>,
}

impl PositionSimulator {
    /// Create a stopped simulator
    pub fn new(config: SimulatorConfig) -> Self {
        Self { config, run: None }
    }

    /// Start a run from `origin` to `destination`
    ///
    /// Progress of the run is mapped onto `base_progress..=100`, so a run
    /// resumed mid-route continues from where the session already is.
    /// Replaces any run in progress.
    pub fn start(&mut self, origin: GeoPoint, destination: GeoPoint, base_progress: f64) {
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        debug!(%origin, %destination, base_progress, "Simulator started");
        self.run = Some(Run {
            route: SimulatedRoute::new(origin, destination, self.config.route),
            interval,
            base_progress: base_progress.clamp(0.0, 100.0),
        });
    }

    /// Halt production immediately; idempotent
    pub fn stop(&mut self) {
        if self.run.take().is_some() {
            debug!("Simulator stopped");
        }
    }

    /// Check if a run is in progress
    pub fn is_running(&self) -> bool {
        self.run.is_some()
    }

    /// Wait for the next simulated position
    ///
    /// Pends forever while stopped. After the terminal tick (at the
    /// destination, progress 100) the simulator stops itself.
    /// Cancel-safe.
    pub async fn tick(&mut self) -> PositionUpdate {
        let Some(run) = self.run.as_mut() else {
            return std::future::pending().await;
        };
        run.interval.tick().await;

        let base = run.base_progress;
        match run.route.next_tick() {
            Some(tick) if tick.terminal => {
                self.run = None;
                debug!("Simulated route finished");
                PositionUpdate::simulated(tick.position, 100.0)
            }
            Some(tick) => {
                PositionUpdate::simulated(tick.position, base + (100.0 - base) * tick.progress / 100.0)
            }
            None => {
                self.run = None;
                std::future::pending().await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: GeoPoint = GeoPoint::new(19.0760, 72.8777);
    const DEST: GeoPoint = GeoPoint::new(19.1136, 72.8697);

    fn config(steps: u32) -> SimulatorConfig {
        SimulatorConfig::default().with_route(RouteConfig::default().with_steps(steps).with_seed(3))
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reaches_destination_and_stops() {
        let mut sim = PositionSimulator::new(config(5));
        sim.start(ORIGIN, DEST, 0.0);

        let started = Instant::now();
        let mut last = 0.0;
        let mut updates = Vec::new();
        while sim.is_running() {
            let update = sim.tick().await;
            let p = update.progress.unwrap();
            assert!(p >= last);
            last = p;
            updates.push(update);
        }

        assert_eq!(updates.len(), 5);
        assert_eq!(last, 100.0);
        assert_eq!(updates.last().unwrap().position, DEST);
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resumed_run_keeps_progress() {
        let mut sim = PositionSimulator::new(config(4));
        sim.start(ORIGIN.lerp(&DEST, 0.5), DEST, 60.0);

        let first = sim.tick().await;
        assert_eq!(first.progress, Some(70.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_simulator_pends() {
        let mut sim = PositionSimulator::new(config(4));
        sim.start(ORIGIN, DEST, 0.0);
        sim.stop();
        sim.stop();
        assert!(!sim.is_running());

        let res = tokio::time::timeout(Duration::from_secs(60), sim.tick()).await;
        assert!(res.is_err());
    }
}
