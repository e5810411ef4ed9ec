//! Time System - logical clock and acceleration

use crate::components::Clock;
use crate::config::TimeConfig;
use crate::error::{Result, SimError};

/// Converts a tick into elapsed simulation time.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSystem {
    tick_length: f64,
    acceleration: f64,
}

impl TimeSystem {
    pub fn new(config: &TimeConfig) -> Self {
        Self {
            tick_length: config.tick_length,
            acceleration: config.acceleration,
        }
    }

    pub fn acceleration(&self) -> f64 {
        self.acceleration
    }

    /// Takes effect from the next tick.
    pub fn set_acceleration(&mut self, acceleration: f64) -> Result<()> {
        if !(acceleration.is_finite() && acceleration >= 0.0) {
            return Err(SimError::Config(format!(
                "acceleration must be finite and non-negative, got {acceleration}"
            )));
        }
        self.acceleration = acceleration;
        Ok(())
    }

    pub fn tick_length(&self) -> f64 {
        self.tick_length
    }

    /// Simulation time one tick covers.
    pub fn delta(&self) -> f64 {
        self.tick_length * self.acceleration
    }

    /// Advance the clock by one tick; returns the elapsed time.
    pub fn advance(&self, clock: &mut Clock) -> f64 {
        let dt = self.delta();
        clock.advance(dt);
        dt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acceleration_scales_tick() {
        let mut time = TimeSystem::new(&TimeConfig::default());
        let mut clock = Clock::default();
        assert_eq!(time.advance(&mut clock), 1.0);

        time.set_acceleration(2.5).unwrap();
        time.advance(&mut clock);
        assert_eq!(clock.time, 3.5);
        assert_eq!(clock.ticks, 2);
    }

    #[test]
    fn test_rejects_negative_acceleration() {
        let mut time = TimeSystem::new(&TimeConfig::default());
        assert!(time.set_acceleration(-1.0).is_err());
        assert!(time.set_acceleration(f64::NAN).is_err());
        assert_eq!(time.acceleration(), 1.0);
    }
}
