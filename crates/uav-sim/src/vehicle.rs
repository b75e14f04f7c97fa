use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

use uav_proto::telemetry::{now_unix_secs, FlightStatus, TelemetryMessage};

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    pub x: f64,
    pub y: f64,
    /// Never below zero.
    pub altitude: f64,
    pub speed: f64,
    /// Percent, 0..=100.
    pub battery: u8,
}

impl VehicleState {
    pub fn status(&self) -> FlightStatus {
        FlightStatus::derive(self.battery, self.altitude)
    }

    pub fn is_depleted(&self) -> bool {
        self.battery == 0
    }
}

/// Random-walk flight model, advanced once per heartbeat.
///
/// Owned by the telemetry loop alone.
#[derive(Debug)]
pub struct VehicleModel {
    state: VehicleState,
    heartbeat_s: f64,
    rng: StdRng,
}

impl VehicleModel {
    pub fn new(heartbeat: Duration) -> Self {
        Self::with_rng(heartbeat, StdRng::from_entropy())
    }

    pub fn seeded(heartbeat: Duration, seed: u64) -> Self {
        Self::with_rng(heartbeat, StdRng::seed_from_u64(seed))
    }

    fn with_rng(heartbeat: Duration, mut rng: StdRng) -> Self {
        let state = VehicleState {
            x: rng.gen_range(0.0..=100.0),
            y: rng.gen_range(0.0..=100.0),
            altitude: 0.0,
            speed: 0.0,
            battery: 100,
        };
        Self { state, heartbeat_s: heartbeat.as_secs_f64(), rng }
    }

    /// Start from an explicit state, e.g. a nearly drained pack.
    pub fn from_state(heartbeat: Duration, mut state: VehicleState, seed: u64) -> Self {
        state.battery = state.battery.min(100);
        state.altitude = state.altitude.max(0.0);
        state.speed = state.speed.max(0.0);
        Self { state, heartbeat_s: heartbeat.as_secs_f64(), rng: StdRng::seed_from_u64(seed) }
    }

    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// Advance one heartbeat and return the resulting wire snapshot.
    pub fn advance_tick(&mut self) -> TelemetryMessage {
        self.step();
        self.snapshot(now_unix_secs())
    }

    pub fn snapshot(&self, timestamp: f64) -> TelemetryMessage {
        let s = &self.state;
        TelemetryMessage::snapshot(timestamp, s.x, s.y, s.altitude, s.speed, s.battery)
    }

    fn step(&mut self) {
        let hb = self.heartbeat_s;
        let s = &mut self.state;

        if s.battery > 0 {
            s.speed = self.rng.gen_range(0.5..=5.0);
            s.x += s.speed * self.rng.gen_range(-0.5..=0.5) * hb;
            s.y += s.speed * self.rng.gen_range(-0.5..=0.5) * hb;
            s.altitude = (s.altitude + self.rng.gen_range(-0.2..=0.3)).max(0.0);

            let drained = f64::from(s.battery) - self.rng.gen_range(0.2..=0.6) * hb;
            s.battery = drained.floor().clamp(0.0, 100.0) as u8;
        }

        // A drained pack grounds the vehicle for good, starting with the tick
        // that drained it.
        if s.battery == 0 {
            s.speed = 0.0;
            s.altitude = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HB: Duration = Duration::from_secs(1);

    #[test]
    fn starts_landed_with_full_pack() {
        let m = VehicleModel::seeded(HB, 1);
        let s = m.state();
        assert_eq!(s.battery, 100);
        assert_eq!(s.altitude, 0.0);
        assert_eq!(s.speed, 0.0);
        assert!((0.0..=100.0).contains(&s.x));
        assert!((0.0..=100.0).contains(&s.y));
        assert_eq!(s.status(), FlightStatus::Landed);
    }

    #[test]
    fn first_tick_drains_one_percent() {
        // 100 - [0.2, 0.6] lands in [99.4, 99.8] and is floored to 99.
        for seed in 0..50 {
            let mut m = VehicleModel::seeded(HB, seed);
            let msg = m.advance_tick();
            assert_eq!(msg.battery, 99);
            assert!((0.5..=5.0).contains(&m.state().speed));
            assert!(m.state().altitude <= 0.3);
        }
    }

    #[test]
    fn battery_never_rises_and_altitude_never_negative() {
        let mut m = VehicleModel::seeded(HB, 7);
        let mut last = m.state().battery;
        for _ in 0..300 {
            let msg = m.advance_tick();
            assert!(msg.battery <= last);
            assert!(msg.battery <= 100);
            assert!(msg.position.z >= 0.0);
            assert!(m.state().altitude >= 0.0);
            last = msg.battery;
        }
        assert_eq!(last, 0);
    }

    #[test]
    fn drained_pack_stays_grounded() {
        let mut m = VehicleModel::seeded(HB, 42);
        let mut grounded = false;
        for _ in 0..400 {
            let msg = m.advance_tick();
            if msg.battery == 0 {
                grounded = true;
            }
            if grounded {
                assert_eq!(msg.battery, 0);
                assert_eq!(msg.speed, 0.0);
                assert_eq!(msg.position.z, 0.0);
                assert_eq!(msg.status, FlightStatus::Landed);
            }
        }
        assert!(grounded);
    }

    #[test]
    fn climbing_vehicle_reports_flying() {
        let start = VehicleState { x: 10.0, y: 10.0, altitude: 20.0, speed: 1.0, battery: 80 };
        let mut m = VehicleModel::from_state(HB, start, 3);
        let msg = m.advance_tick();
        // altitude moves by at most 0.3 per tick, so 20 m stays well above 0.5
        assert_eq!(msg.status, FlightStatus::Flying);
        assert_eq!(msg.battery, 79);
    }

    #[test]
    fn low_pack_is_landed_even_in_the_air() {
        let start = VehicleState { x: 0.0, y: 0.0, altitude: 50.0, speed: 1.0, battery: 5 };
        let mut m = VehicleModel::from_state(HB, start, 9);
        let msg = m.advance_tick();
        assert_eq!(msg.battery, 4);
        assert_eq!(msg.status, FlightStatus::Landed);
    }

    #[test]
    fn last_percent_grounds_in_same_tick() {
        let start = VehicleState { x: 5.0, y: 5.0, altitude: 12.0, speed: 3.0, battery: 1 };
        let mut m = VehicleModel::from_state(HB, start, 11);
        let msg = m.advance_tick();
        assert_eq!(msg.battery, 0);
        assert_eq!(msg.speed, 0.0);
        assert_eq!(msg.position.z, 0.0);
        assert!(m.state().is_depleted());
    }

    #[test]
    fn horizontal_step_is_bounded_by_speed() {
        let mut m = VehicleModel::seeded(HB, 5);
        for _ in 0..50 {
            let (x0, y0) = (m.state().x, m.state().y);
            m.advance_tick();
            let s = m.state();
            if s.battery == 0 {
                break;
            }
            assert!((s.x - x0).abs() <= s.speed * 0.5 + 1e-9);
            assert!((s.y - y0).abs() <= s.speed * 0.5 + 1e-9);
        }
    }
}
