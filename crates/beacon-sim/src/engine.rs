//! Simulation Loop / Event Engine
//!
//! Steps the Beacon and every relay over a fixed timeline, classifies each
//! relay as illuminating the Beacon or not, and turns the per-step
//! classification into handshakes, active-link snapshots and blackouts.
//!
//! Per step:
//! 1. propagate the Beacon (failure drops the whole step)
//! 2. propagate each relay (failure drops only that relay's sample)
//! 3. nadir-cone test, plus horizon cones in bidirectional mode
//! 4. rising edges against the previous processed step are handshakes
//! 5. blackout open/close on the same snapshot

use chrono::{DateTime, Duration, Utc};
use orbital_mechanics::geometry::horizon_cones;
use orbital_mechanics::{CommunicationCone, GeodeticPosition, InertialState, Propagator};
use std::collections::BTreeMap;

use crate::config::{LinkMode, SimulationConfig};
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use crate::events::{BlackoutTracker, BlackoutTransition, ConnectionState, Handshake};
use crate::result::{
    ActiveLinks, BlackoutStatistics, DiagnosticSummary, SimulationResult, TrackSample,
};

/// Evenly spaced instants from `start` to `start + duration` inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeline {
    start: DateTime<Utc>,
    step_ms: i64,
    len: usize,
}

impl Timeline {
    pub fn new(start: DateTime<Utc>, duration_hours: f64, step_seconds: f64) -> Self {
        Self {
            start,
            step_ms: step_millis(step_seconds),
            len: Self::step_count_for(duration_hours, step_seconds),
        }
    }

    /// Number of instants a window of `duration_hours` holds at `step_seconds`
    pub fn step_count_for(duration_hours: f64, step_seconds: f64) -> usize {
        let total_ms = ((duration_hours * 3_600_000.0).round() as i64).max(0);
        (total_ms / step_millis(step_seconds)) as usize + 1
    }

    pub fn from_config(start: DateTime<Utc>, config: &SimulationConfig) -> Self {
        Self::new(start, config.duration_hours, config.time_step_seconds)
    }

    pub fn step_count(&self) -> usize {
        self.len
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn at(&self, index: usize) -> DateTime<Utc> {
        self.start + Duration::milliseconds(self.step_ms * index as i64)
    }

    /// Last instant of the timeline
    pub fn end(&self) -> DateTime<Utc> {
        self.at(self.len.saturating_sub(1))
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, DateTime<Utc>)> + '_ {
        (0..self.len).map(move |index| (index, self.at(index)))
    }
}

fn step_millis(step_seconds: f64) -> i64 {
    ((step_seconds * 1000.0).round() as i64).max(1)
}

pub struct Engine<'c, S> {
    config: &'c SimulationConfig,
    sink: S,
}

impl<'c, S: DiagnosticSink> Engine<'c, S> {
    pub fn new(config: &'c SimulationConfig, sink: S) -> Self {
        Self { config, sink }
    }

    /// Run the step loop. Relay ids are expected to be unique; samples of
    /// relays sharing an id land in the same track.
    pub fn simulate<B, R>(&mut self, beacon: &B, relays: &[R], start: DateTime<Utc>) -> SimulationResult
    where
        B: Propagator + ?Sized,
        R: Propagator,
    {
        let timeline = Timeline::from_config(start, self.config);

        let mut beacon_track = Vec::new();
        let mut relay_tracks: BTreeMap<String, Vec<TrackSample>> = relays
            .iter()
            .map(|relay| (relay.id().to_string(), Vec::new()))
            .collect();
        let mut handshakes = Vec::new();
        let mut active_links = Vec::new();
        let mut blackout_periods = Vec::new();
        let mut blackout = BlackoutTracker::new();
        let mut summary = DiagnosticSummary::default();
        let mut previous = ConnectionState::default();

        for (step_index, at) in timeline.iter() {
            let beacon_state = match beacon.propagate(at) {
                Ok(state) => state,
                Err(failure) => {
                    summary.beacon_steps_skipped += 1;
                    self.sink.record(Diagnostic::BeaconPropagationFailed {
                        step_index,
                        failure,
                    });
                    continue;
                }
            };
            let beacon_geodetic = beacon_state.geodetic();
            beacon_track.push(TrackSample::new(&beacon_state, beacon_geodetic));

            let links = self.observe_relays(
                step_index,
                beacon.id(),
                &beacon_state,
                relays,
                &mut relay_tracks,
                &mut summary,
            );
            let current: ConnectionState = links.keys().cloned().collect();

            for relay_id in current.newly_connected(&previous) {
                let Some(relay_geodetic) = links.get(relay_id) else {
                    continue;
                };
                handshakes.push(Handshake {
                    timestamp: at,
                    relay_satellite_id: relay_id.to_string(),
                    beacon_geodetic_position: beacon_geodetic,
                    relay_geodetic_position: *relay_geodetic,
                });
                self.sink.record(Diagnostic::HandshakeDetected {
                    step_index,
                    relay_id: relay_id.to_string(),
                    timestamp: at,
                });
            }

            match blackout.observe(at, !current.is_empty()) {
                Some(BlackoutTransition::Opened(timestamp)) => {
                    self.sink.record(Diagnostic::BlackoutOpened {
                        step_index,
                        timestamp,
                    });
                }
                Some(BlackoutTransition::Closed(period)) => {
                    self.sink.record(Diagnostic::BlackoutClosed {
                        period: period.clone(),
                    });
                    blackout_periods.push(period);
                }
                None => {}
            }

            active_links.push(ActiveLinks {
                step_index,
                timestamp: at,
                relay_ids: current.relay_ids().clone(),
            });

            previous = current;
        }

        if let Some(period) = blackout.finish(timeline.end()) {
            self.sink.record(Diagnostic::BlackoutClosed {
                period: period.clone(),
            });
            blackout_periods.push(period);
        }

        let steps_simulated = beacon_track.len();
        let connected_steps = active_links
            .iter()
            .filter(|links| !links.relay_ids.is_empty())
            .count();

        SimulationResult {
            start_time: timeline.start(),
            end_time: timeline.end(),
            steps_simulated,
            steps_skipped: summary.beacon_steps_skipped,
            relay_count: relays.len(),
            total_handshake_count: handshakes.len(),
            handshakes,
            active_links,
            blackout_statistics: BlackoutStatistics::from_periods(&blackout_periods),
            blackout_periods,
            coverage_fraction: if steps_simulated == 0 {
                0.0
            } else {
                connected_steps as f64 / steps_simulated as f64
            },
            beacon_elements: None,
            beacon_track,
            relay_tracks,
            diagnostics: summary,
        }
    }

    /// Relays illuminating the Beacon at this step, with their geodetic fix
    fn observe_relays<R: Propagator>(
        &mut self,
        step_index: usize,
        beacon_id: &str,
        beacon: &InertialState,
        relays: &[R],
        relay_tracks: &mut BTreeMap<String, Vec<TrackSample>>,
        summary: &mut DiagnosticSummary,
    ) -> BTreeMap<String, GeodeticPosition> {
        let beacon_cones = match self.config.link_mode {
            LinkMode::OneWay => None,
            LinkMode::Bidirectional => Some(horizon_cones(
                beacon_id,
                beacon.position_eci,
                &beacon.velocity_eci,
                self.config.beacon_fov_deg,
            )),
        };

        let mut links = BTreeMap::new();

        for relay in relays {
            let state = match relay.propagate(beacon.timestamp) {
                Ok(state) => state,
                Err(failure) => {
                    summary.relay_samples_skipped += 1;
                    self.sink.record(Diagnostic::RelayPropagationFailed {
                        step_index,
                        failure,
                    });
                    continue;
                }
            };
            let geodetic = state.geodetic();
            if let Some(track) = relay_tracks.get_mut(relay.id()) {
                track.push(TrackSample::new(&state, geodetic));
            }

            let cone =
                CommunicationCone::nadir(relay.id(), state.position_eci, self.config.relay_fov_deg);
            let mut connected = cone.contains(&beacon.position_eci);

            if let (true, Some(cones)) = (connected, &beacon_cones) {
                connected = cones.iter().any(|c| c.contains(&state.position_eci));
            }

            if connected {
                links.insert(relay.id().to_string(), geodetic);
            }
        }

        links
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{CollectingSink, NullSink};
    use chrono::TimeZone;
    use nalgebra::Vector3;
    use orbital_mechanics::{OrbitIntent, PropagationFailure, PropagationFailureKind};
    use proptest::prelude::*;
    use std::collections::HashSet;

    const STEP_SECONDS: f64 = 60.0;
    /// 30 steps of one minute: 31 timeline instants
    const STEPS: usize = 31;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 20, 0, 0, 0).unwrap()
    }

    fn config(link_mode: LinkMode) -> SimulationConfig {
        SimulationConfig {
            beacon_intent: OrbitIntent::SunSynchronous {
                altitude_km: 700.0,
                local_solar_time_hours: 10.5,
            },
            relay_fov_deg: 10.0,
            beacon_fov_deg: 120.0,
            duration_hours: (STEPS - 1) as f64 * STEP_SECONDS / 3600.0,
            time_step_seconds: STEP_SECONDS,
            link_mode,
        }
    }

    /// Body whose state is looked up by timeline index
    struct Scripted {
        id: String,
        visible_position: Vector3<f64>,
        hidden_position: Vector3<f64>,
        visible: HashSet<usize>,
        failing: HashSet<usize>,
    }

    impl Scripted {
        fn beacon() -> Self {
            Self {
                id: "BEACON".into(),
                visible_position: Vector3::new(7078.0, 0.0, 0.0),
                hidden_position: Vector3::new(7078.0, 0.0, 0.0),
                visible: (0..STEPS).collect(),
                failing: HashSet::new(),
            }
        }

        /// Straight above the Beacon when visible, on the far side otherwise
        fn relay(id: &str, visible: impl IntoIterator<Item = usize>) -> Self {
            Self {
                id: id.into(),
                visible_position: Vector3::new(7158.0, 0.0, 0.0),
                hidden_position: Vector3::new(-7158.0, 0.0, 0.0),
                visible: visible.into_iter().collect(),
                failing: HashSet::new(),
            }
        }

        fn parked(id: &str, position: Vector3<f64>) -> Self {
            Self {
                id: id.into(),
                visible_position: position,
                hidden_position: position,
                visible: (0..STEPS).collect(),
                failing: HashSet::new(),
            }
        }

        fn failing_at(mut self, steps: impl IntoIterator<Item = usize>) -> Self {
            self.failing = steps.into_iter().collect();
            self
        }
    }

    impl Propagator for Scripted {
        fn id(&self) -> &str {
            &self.id
        }

        fn propagate(&self, at: DateTime<Utc>) -> Result<InertialState, PropagationFailure> {
            let index = (at.signed_duration_since(start()).num_seconds() as f64 / STEP_SECONDS) as usize;
            if self.failing.contains(&index) {
                return Err(PropagationFailure {
                    body: self.id.clone(),
                    timestamp: at,
                    kind: PropagationFailureKind::Sgp4("scripted".into()),
                });
            }
            let position = if self.visible.contains(&index) {
                self.visible_position
            } else {
                self.hidden_position
            };
            Ok(InertialState {
                timestamp: at,
                position_eci: position,
                velocity_eci: Vector3::new(0.0, 7.5, 0.0),
            })
        }
    }

    fn simulate(config: &SimulationConfig, beacon: &Scripted, relays: &[Scripted]) -> SimulationResult {
        Engine::new(config, NullSink).simulate(beacon, relays, start())
    }

    fn minute(n: i64) -> DateTime<Utc> {
        start() + Duration::minutes(n)
    }

    #[test]
    fn test_timeline_is_inclusive() {
        let timeline = Timeline::new(start(), 24.0, 60.0);
        assert_eq!(timeline.step_count(), 1441);
        assert_eq!(timeline.end(), start() + Duration::hours(24));

        // A remainder shorter than one step is not simulated
        let timeline = Timeline::new(start(), 1.0, 7.0);
        assert_eq!(timeline.step_count(), 515);
        assert!(timeline.end() <= start() + Duration::hours(1));

        let instants: Vec<_> = Timeline::new(start(), 0.5, 600.0).iter().collect();
        assert_eq!(instants.len(), 4);
        assert_eq!(Timeline::step_count_for(0.5, 600.0), 4);
        assert_eq!(instants[3], (3, minute(30)));
    }

    #[test]
    fn test_handshakes_count_rising_edges() {
        let config = config(LinkMode::OneWay);
        let relay = Scripted::relay("R1", (3..=7).chain(20..=25));
        let result = simulate(&config, &Scripted::beacon(), &[relay]);

        assert_eq!(result.total_handshake_count, 2);
        assert_eq!(result.handshakes[0].timestamp, minute(3));
        assert_eq!(result.handshakes[1].timestamp, minute(20));
        assert!(result.handshakes.iter().all(|h| h.relay_satellite_id == "R1"));
        assert_eq!(result.active_links.len(), STEPS);
        assert_eq!(result.beacon_track.len(), STEPS);
        assert_eq!(result.relay_tracks["R1"].len(), STEPS);
    }

    #[test]
    fn test_connected_from_first_step_is_one_handshake() {
        let config = config(LinkMode::OneWay);
        let result = simulate(&config, &Scripted::beacon(), &[Scripted::relay("R1", 0..STEPS)]);

        assert_eq!(result.total_handshake_count, 1);
        assert_eq!(result.handshakes[0].timestamp, start());
        assert!(result.blackout_periods.is_empty());
        assert_eq!(result.blackout_statistics.average_blackout_duration_seconds, 0.0);
        assert_eq!(result.coverage_fraction, 1.0);
    }

    #[test]
    fn test_handshake_carries_both_positions() {
        let config = config(LinkMode::OneWay);
        let result = simulate(&config, &Scripted::beacon(), &[Scripted::relay("R1", [4])]);

        let handshake = &result.handshakes[0];
        assert!((handshake.beacon_geodetic_position.altitude_km - 700.0).abs() < 1.0);
        assert!((handshake.relay_geodetic_position.altitude_km - 780.0).abs() < 1.0);
    }

    #[test]
    fn test_blackouts_open_and_close() {
        let config = config(LinkMode::OneWay);
        let relay = Scripted::relay("R1", (0..=4).chain(10..STEPS));
        let result = simulate(&config, &Scripted::beacon(), &[relay]);

        assert_eq!(result.blackout_periods.len(), 1);
        let period = &result.blackout_periods[0];
        assert_eq!(period.start_time, minute(5));
        assert_eq!(period.end_time, minute(10));
        assert_eq!(period.duration_seconds, 300.0);
        assert_eq!(result.blackout_statistics.number_of_blackouts, 1);
        assert_eq!(result.blackout_statistics.total_blackout_duration_seconds, 300.0);
    }

    #[test]
    fn test_open_blackout_closed_at_final_timestamp() {
        let config = config(LinkMode::OneWay);
        let relay = Scripted::relay("R1", 0..=27);
        let result = simulate(&config, &Scripted::beacon(), &[relay]);

        assert_eq!(result.blackout_periods.len(), 1);
        let period = &result.blackout_periods[0];
        assert_eq!(period.start_time, minute(28));
        assert_eq!(period.end_time, result.end_time);
        assert_eq!(period.end_time, minute(30));
        assert_eq!(period.duration_seconds, 120.0);
    }

    #[test]
    fn test_beacon_failure_skips_whole_step() {
        let config = config(LinkMode::OneWay);
        let beacon = Scripted::beacon().failing_at([5]);
        // Hidden only at the step that never gets evaluated
        let relay = Scripted::relay("R1", (0..5).chain(6..STEPS));
        let mut sink = CollectingSink::new();
        let result = Engine::new(&config, &mut sink).simulate(&beacon, &[relay], start());

        assert_eq!(result.steps_simulated, STEPS - 1);
        assert_eq!(result.steps_skipped, 1);
        assert_eq!(result.beacon_track.len(), STEPS - 1);
        assert_eq!(result.active_links.len(), STEPS - 1);
        assert!(result.active_links.iter().all(|links| links.step_index != 5));
        assert_eq!(result.active_links[5].step_index, 6);
        // Connection state carried across the gap: no re-handshake, no blackout
        assert_eq!(result.total_handshake_count, 1);
        assert!(result.blackout_periods.is_empty());
        // Relays are not propagated on a skipped step
        assert_eq!(result.relay_tracks["R1"].len(), STEPS - 1);

        assert_eq!(sink.failures().count(), 1);
        assert!(sink
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::BeaconPropagationFailed { step_index: 5, .. })));
    }

    #[test]
    fn test_relay_failure_skips_only_that_relay() {
        let config = config(LinkMode::OneWay);
        let flaky = Scripted::relay("FLAKY", 0..STEPS).failing_at([10]);
        let steady = Scripted::relay("STEADY", 0..STEPS);
        let result = simulate(&config, &Scripted::beacon(), &[flaky, steady]);

        assert_eq!(result.steps_simulated, STEPS);
        assert_eq!(result.relay_tracks["FLAKY"].len(), STEPS - 1);
        assert_eq!(result.relay_tracks["STEADY"].len(), STEPS);
        assert_eq!(result.diagnostics.relay_samples_skipped, 1);
        assert!(!result.active_links[10].relay_ids.contains("FLAKY"));
        assert!(result.active_links[10].relay_ids.contains("STEADY"));
        // FLAKY reappears at step 11: a new rising edge
        assert_eq!(result.total_handshake_count, 3);
        assert!(result.blackout_periods.is_empty());
    }

    #[test]
    fn test_active_links_are_snapshots() {
        let config = config(LinkMode::OneWay);
        let a = Scripted::relay("A", 0..=10);
        let b = Scripted::relay("B", 5..=15);
        let result = simulate(&config, &Scripted::beacon(), &[a, b]);

        let ids = |i: usize| -> Vec<&str> {
            result.active_links[i].relay_ids.iter().map(String::as_str).collect()
        };
        assert_eq!(ids(0), vec!["A"]);
        assert_eq!(ids(7), vec!["A", "B"]);
        assert_eq!(ids(12), vec!["B"]);
        assert!(ids(20).is_empty());
        assert_eq!(result.total_handshake_count, 2);
        assert!((result.coverage_fraction - 16.0 / STEPS as f64).abs() < 1e-12);
    }

    #[test]
    fn test_bidirectional_requires_beacon_antenna() {
        // Directly overhead: inside the relay's nadir cone but 90° off both
        // horizon antennas
        let overhead = Scripted::parked("OVERHEAD", Vector3::new(7158.0, 0.0, 0.0));
        // Ahead along-track and slightly higher
        let ahead = Scripted::parked("AHEAD", Vector3::new(7200.0, 3000.0, 0.0));

        let mut one_way = config(LinkMode::OneWay);
        one_way.relay_fov_deg = 170.0;
        let result = simulate(&one_way, &Scripted::beacon(), &[overhead, ahead]);
        assert_eq!(result.total_handshake_count, 2);

        let overhead = Scripted::parked("OVERHEAD", Vector3::new(7158.0, 0.0, 0.0));
        let ahead = Scripted::parked("AHEAD", Vector3::new(7200.0, 3000.0, 0.0));
        let mut bidirectional = config(LinkMode::Bidirectional);
        bidirectional.relay_fov_deg = 170.0;
        let result = simulate(&bidirectional, &Scripted::beacon(), &[overhead, ahead]);

        assert_eq!(result.total_handshake_count, 1);
        assert_eq!(result.handshakes[0].relay_satellite_id, "AHEAD");
        assert!(result
            .active_links
            .iter()
            .all(|links| links.relay_ids.len() == 1 && links.relay_ids.contains("AHEAD")));
    }

    #[test]
    fn test_sink_sees_transitions() {
        let config = config(LinkMode::OneWay);
        let relay = Scripted::relay("R1", 10..=20);
        let mut sink = CollectingSink::new();
        Engine::new(&config, &mut sink).simulate(&Scripted::beacon(), &[relay], start());

        assert_eq!(sink.handshake_count(), 1);
        let opened = sink
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::BlackoutOpened { .. }))
            .count();
        let closed = sink
            .diagnostics
            .iter()
            .filter(|d| matches!(d, Diagnostic::BlackoutClosed { .. }))
            .count();
        assert_eq!(opened, 2);
        assert_eq!(closed, 2);
        assert_eq!(sink.failures().count(), 0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn fuzz_event_accounting(pattern in proptest::collection::vec(any::<bool>(), STEPS)) {
            let config = config(LinkMode::OneWay);
            let visible: Vec<usize> = pattern.iter().enumerate().filter(|(_, v)| **v).map(|(i, _)| i).collect();
            let result = simulate(&config, &Scripted::beacon(), &[Scripted::relay("R1", visible)]);

            let rising_edges = pattern
                .iter()
                .enumerate()
                .filter(|(i, v)| **v && (*i == 0 || !pattern[i - 1]))
                .count();
            prop_assert_eq!(result.total_handshake_count, rising_edges);

            // Expected blackouts: maximal runs of `false`
            let mut expected = Vec::new();
            let mut run_start = None;
            for (i, v) in pattern.iter().enumerate() {
                match (run_start, *v) {
                    (None, false) => run_start = Some(i),
                    (Some(s), true) => {
                        expected.push(((i - s) as f64) * STEP_SECONDS);
                        run_start = None;
                    }
                    _ => {}
                }
            }
            if let Some(s) = run_start {
                expected.push(((STEPS - 1 - s) as f64) * STEP_SECONDS);
            }

            let durations: Vec<f64> = result.blackout_periods.iter().map(|p| p.duration_seconds).collect();
            prop_assert_eq!(&durations, &expected);
            prop_assert_eq!(result.blackout_statistics.number_of_blackouts, result.blackout_periods.len());
            let sum: f64 = durations.iter().sum();
            prop_assert!((sum - result.blackout_statistics.total_blackout_duration_seconds).abs() < 1e-9);
            prop_assert!(result.blackout_periods.iter().all(|p| p.end_time >= p.start_time));
            if !pattern[STEPS - 1] {
                let ending = result.blackout_periods.iter().filter(|p| p.end_time == result.end_time).count();
                prop_assert_eq!(ending, 1);
            }
        }
    }
}
