use serde::Serialize;

/// (rad/s) Opening rate of the gate doors.
const DOOR_OPEN_RATE: f64 = 8.0;
/// (rad) Fully opened door angle.
const DOOR_MAX_ANGLE: f64 = 1.8;

/// Start gate of a single lane. Only the door state is simulated, the mesh lives in the
/// presentation layer.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Gate {
    pub lane: usize,
    pub open: bool,
    pub door_angle: f64,
}

impl Gate {
    pub fn new(lane: usize) -> Gate {
        Gate {
            lane,
            ..Default::default()
        }
    }

    pub fn open(&mut self) {
        self.open = true;
    }

    pub fn reset(&mut self) {
        self.open = false;
        self.door_angle = 0.0;
    }

    pub fn update(&mut self, delta: f64) {
        if self.open && self.door_angle < DOOR_MAX_ANGLE {
            self.door_angle = (self.door_angle + delta * DOOR_OPEN_RATE).min(DOOR_MAX_ANGLE);
        }
    }

    pub fn fully_open(&self) -> bool {
        self.door_angle >= DOOR_MAX_ANGLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn doors_swing_open_and_stop() {
        let mut gate = Gate::new(0);
        gate.update(0.1);
        assert_relative_eq!(gate.door_angle, 0.0);

        gate.open();
        gate.update(0.1);
        assert_relative_eq!(gate.door_angle, 0.8);
        for _ in 0..10 {
            gate.update(0.1);
        }
        assert!(gate.fully_open());
        assert_relative_eq!(gate.door_angle, DOOR_MAX_ANGLE);

        gate.reset();
        assert!(!gate.open);
        assert_relative_eq!(gate.door_angle, 0.0);
    }
}
