//! Motion sensor abstraction

/// Three-axis acceleration sample (m/s^2)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Acceleration {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Acceleration {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// True if any single axis magnitude is strictly above `threshold`
    pub fn exceeds(&self, threshold: f32) -> bool {
        self.x.abs() > threshold || self.y.abs() > threshold || self.z.abs() > threshold
    }
}

/// Trait for accelerometer drivers
pub trait MotionSensor {
    /// Error type for sensor reads
    type Error: std::fmt::Display;

    /// Read the current acceleration
    fn acceleration(&mut self) -> Result<Acceleration, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::Acceleration;

    #[test]
    fn threshold_is_strict() {
        assert!(!Acceleration::new(20.0, 0.0, 0.0).exceeds(20.0));
        assert!(!Acceleration::new(-20.0, 20.0, -20.0).exceeds(20.0));
        assert!(Acceleration::new(20.01, 0.0, 0.0).exceeds(20.0));
        assert!(Acceleration::new(0.0, -25.0, 0.0).exceeds(20.0));
        assert!(Acceleration::new(0.0, 0.0, 21.0).exceeds(20.0));
    }

    #[test]
    fn axes_are_not_combined() {
        // magnitude of the vector is ~24, but no single axis is over
        assert!(!Acceleration::new(14.0, 14.0, 14.0).exceeds(20.0));
    }
}
