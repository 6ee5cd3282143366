//! Annotation marker state
//!
//! At most one marker exists. Its visual entity is created lazily by the
//! viewer on the first placement and only mutated afterwards; this module
//! owns the logical side: where the marker is, whether it is shown, and the
//! emissive pulse curve driven by the render clock.

use bevy_math::Vec3;

/// Emissive intensity floor of the pulse
pub const PULSE_BASE: f32 = 0.3;
/// Peak-to-floor amplitude of the pulse
pub const PULSE_AMPLITUDE: f32 = 0.4;
/// Pulse angular rate in radians per second
pub const PULSE_RATE: f32 = 2.0;

/// Logical state of the single annotation marker
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarkerState {
    /// World-space position of the last placement, if any
    pub position: Option<Vec3>,
    /// Whether the marker is currently shown
    pub visible: bool,
}

impl MarkerState {
    /// Place the marker at a world point and show it
    pub fn place(&mut self, point: Vec3) {
        self.position = Some(point);
        self.visible = true;
    }

    /// Show or hide the marker without moving it
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Hide the marker; the position is kept so the entity survives resets
    pub fn reset(&mut self) {
        self.visible = false;
    }

    /// True once the marker has been placed at least once
    pub fn is_placed(&self) -> bool {
        self.position.is_some()
    }
}

/// Emissive intensity at a given render-clock time, in seconds
pub fn pulse_intensity(elapsed_secs: f32) -> f32 {
    PULSE_BASE + (elapsed_secs * PULSE_RATE).sin().abs() * PULSE_AMPLITUDE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_shows_and_last_call_wins() {
        let mut marker = MarkerState::default();
        assert!(!marker.is_placed());

        marker.place(Vec3::new(1.0, 2.0, 3.0));
        marker.place(Vec3::new(-4.0, 0.5, 2.0));
        assert_eq!(marker.position, Some(Vec3::new(-4.0, 0.5, 2.0)));
        assert!(marker.visible);
    }

    #[test]
    fn test_reset_hides_but_keeps_position() {
        let mut marker = MarkerState::default();
        marker.place(Vec3::ONE);
        marker.reset();

        assert!(!marker.visible);
        assert_eq!(marker.position, Some(Vec3::ONE));

        marker.set_visible(true);
        assert!(marker.visible);
    }

    #[test]
    fn test_pulse_intensity_range() {
        assert!((pulse_intensity(0.0) - PULSE_BASE).abs() < 1e-6);

        // Peak of |sin| at PULSE_RATE * t = pi/2
        let peak = pulse_intensity(std::f32::consts::FRAC_PI_2 / PULSE_RATE);
        assert!((peak - (PULSE_BASE + PULSE_AMPLITUDE)).abs() < 1e-5);

        // |sin| keeps the curve above the floor everywhere
        for i in 0..100 {
            let v = pulse_intensity(i as f32 * 0.173);
            assert!(v >= PULSE_BASE - 1e-6);
            assert!(v <= PULSE_BASE + PULSE_AMPLITUDE + 1e-6);
        }
    }
}
