//! Property tests for the engine state machine and configuration swaps

mod common;

use std::sync::Arc;

use common::*;
use proptest::prelude::*;
use wardf_core::Measurement;
use wardf_engine::{run_jobs, ConfigHandle, Cycle, DfEngine, EngineEvent, EngineState, EstimationJob};

fn any_event() -> impl Strategy<Value = EngineEvent> {
    prop::sample::select(EngineEvent::ALL.to_vec())
}

#[derive(Debug, Clone)]
enum Op {
    Start,
    Stop,
    Measure { antenna: usize, offset_db: f64, emitter: Option<&'static str> },
    Advance(u64),
    Finish,
    Reconfigure,
    AllOffline,
    BeginCalibration(usize),
    CompleteCalibration,
    AbortCalibration,
}

fn any_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Start),
        Just(Op::Stop),
        (0usize..4, -3.0..3.0f64, prop::option::of(prop::sample::select(vec!["aa", "bb"])))
            .prop_map(|(antenna, offset_db, emitter)| Op::Measure { antenna, offset_db, emitter }),
        (0u64..3_000).prop_map(Op::Advance),
        Just(Op::Finish),
        Just(Op::Reconfigure),
        Just(Op::AllOffline),
        (0usize..4).prop_map(Op::BeginCalibration),
        Just(Op::CompleteCalibration),
        Just(Op::AbortCalibration),
    ]
}

/// Antenna id by index; index 3 is not in the array
fn antenna(index: usize) -> &'static str {
    TRIANGLE.get(index).map(|(id, _, _)| *id).unwrap_or("ant-x")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn error_is_left_only_by_reconfiguration(
        events in prop::collection::vec(any_event(), 0..40),
    ) {
        let mut state = EngineState::Idle;
        let mut offline = false;
        for event in events {
            match event {
                EngineEvent::AllOffline => offline = true,
                EngineEvent::Reconfigured => offline = false,
                _ => {}
            }
            match state.on(event) {
                Some(next) => state = next,
                None => {
                    prop_assert_ne!(event, EngineEvent::AllOffline);
                }
            }
            prop_assert!(EngineState::ALL.contains(&state));
            prop_assert_eq!(state == EngineState::Error, offline);
        }
    }

    #[test]
    fn illegal_events_change_nothing(
        from in prop::sample::select(EngineState::ALL.to_vec()),
        event in any_event(),
    ) {
        let config = Arc::new(triangle_config());
        let mut engine = DfEngine::new(config);
        // drive the engine into `from` through legal events only
        let path: &[EngineEvent] = match from {
            EngineState::Idle => &[],
            EngineState::Calibrating => &[EngineEvent::CalibrationAccepted],
            EngineState::Scanning => &[EngineEvent::Start],
            EngineState::Estimating => &[EngineEvent::Start, EngineEvent::WindowClosed { sufficient: true }],
            EngineState::Degraded => &[EngineEvent::Start, EngineEvent::WindowClosed { sufficient: false }],
            EngineState::Error => &[EngineEvent::AllOffline],
        };
        let reached = path.iter().try_fold(EngineState::Idle, |s, e| s.on(*e));
        prop_assert_eq!(reached, Some(from));

        if from.on(event).is_none() {
            // the public operations that map onto the event refuse it
            match event {
                EngineEvent::Start if from != EngineState::Idle => {
                    drive(&mut engine, from);
                    prop_assert!(engine.start(0).is_err());
                    prop_assert_eq!(engine.state(), from);
                }
                EngineEvent::Stop => {
                    drive(&mut engine, from);
                    prop_assert!(engine.stop().is_err());
                    prop_assert_eq!(engine.state(), from);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn engine_invariants_hold_under_random_operations(
        ops in prop::collection::vec(any_op(), 1..60),
    ) {
        let mut engine = DfEngine::new(Arc::new(triangle_config()));
        let mut now = 0u64;
        let mut in_flight: Option<Vec<EstimationJob>> = None;
        let mut offline = false;

        for op in ops {
            match op {
                Op::Start => { let _ = engine.start(now); }
                Op::Stop => { let _ = engine.stop(); }
                Op::Measure { antenna: index, offset_db, emitter } => {
                    now += 1;
                    let (x, y) = TRIANGLE.get(index).map(|(_, x, y)| (*x, *y)).unwrap_or((0.0, 0.0));
                    let mut m = Measurement::new(antenna(index), now, expected_rssi(x, y) + offset_db, WIFI_HZ);
                    if let Some(emitter) = emitter {
                        m = m.with_target(emitter);
                    }
                    engine.accept(m);
                }
                Op::Advance(ms) => {
                    now += ms;
                    match engine.on_tick(now, |_| true) {
                        Cycle::Compute { jobs, emitted } => {
                            prop_assert_eq!(engine.state(), EngineState::Estimating);
                            prop_assert!(!jobs.is_empty());
                            let mut targets: Vec<_> = jobs.iter().map(|job| job.target.clone())
                                .chain(emitted.iter().map(|e| e.target.clone()))
                                .collect();
                            let seen = targets.len();
                            targets.sort();
                            targets.dedup();
                            prop_assert_eq!(targets.len(), seen);
                            for job in &jobs {
                                prop_assert!(job.batch.iter().all(|m| m.target == job.target));
                            }
                            in_flight = Some(jobs);
                        }
                        Cycle::Emitted(estimates) => {
                            prop_assert_eq!(engine.state(), EngineState::Degraded);
                            prop_assert!(!estimates.is_empty());
                            for estimate in &estimates {
                                prop_assert_eq!(estimate.confidence.as_float(), 0.0);
                            }
                        }
                        Cycle::Idle => {}
                    }
                }
                Op::Finish => {
                    if let Some(jobs) = in_flight.take() {
                        let was = engine.state();
                        let count = jobs.len();
                        let published = engine.finish(run_jobs(jobs), now);
                        let expected = if was == EngineState::Estimating { count } else { 0 };
                        prop_assert_eq!(published.len(), expected);
                    }
                }
                Op::Reconfigure => {
                    engine.reconfigure(Arc::new(triangle_config()), now);
                    if engine.state() != EngineState::Error {
                        offline = false;
                    }
                }
                Op::AllOffline => {
                    engine.enter_error();
                    offline = true;
                }
                Op::BeginCalibration(index) => {
                    let before = engine.state();
                    let accepted = engine.begin_calibration(antenna(index), -40.0, true, now).is_ok();
                    prop_assert_eq!(
                        accepted,
                        index < 3 && !matches!(before, EngineState::Error | EngineState::Calibrating)
                    );
                }
                Op::CompleteCalibration => { let _ = engine.complete_calibration(now); }
                Op::AbortCalibration => { let _ = engine.abort_calibration(); }
            }

            let state = engine.state();
            prop_assert_eq!(state == EngineState::Error, offline);
            prop_assert_eq!(engine.calibrating().is_some(), state == EngineState::Calibrating);
            if state != EngineState::Scanning {
                prop_assert_eq!(engine.batch_len(), 0);
            }
        }
    }

    #[test]
    fn configuration_swaps_are_all_or_nothing(
        window_ms in 0u64..5_000,
        tick_ms in 0u64..5_000,
        min_measurements in 0usize..6,
    ) {
        let handle = ConfigHandle::new(triangle_config()).unwrap();
        let before = handle.get();

        let mut candidate = triangle_config().with_window(window_ms).with_tick_interval(tick_ms);
        candidate.algorithm.min_measurements = min_measurements;
        let valid = window_ms > 0 && tick_ms > 0 && tick_ms <= window_ms && min_measurements == 3;

        match handle.apply(candidate.clone()) {
            Ok(()) => {
                prop_assert!(valid);
                prop_assert_eq!(&*handle.get(), &candidate);
                prop_assert_eq!(handle.generation(), 1);
            }
            Err(_) => {
                prop_assert!(!valid);
                prop_assert!(Arc::ptr_eq(&before, &handle.get()));
                prop_assert_eq!(handle.generation(), 0);
            }
        }
    }
}

/// Put a fresh engine in `state` through its public operations
fn drive(engine: &mut DfEngine, state: EngineState) {
    match state {
        EngineState::Idle => {}
        EngineState::Calibrating => {
            engine.begin_calibration("ant-0", -40.0, true, 0).unwrap();
        }
        EngineState::Scanning => engine.start(0).unwrap(),
        EngineState::Estimating => {
            engine.start(0).unwrap();
            for (i, (id, x, y)) in TRIANGLE.iter().enumerate() {
                engine.accept(Measurement::new(*id, i as u64 + 1, expected_rssi(*x, *y), WIFI_HZ));
            }
            assert!(matches!(engine.on_tick(10_000, |_| true), Cycle::Compute { .. }));
        }
        EngineState::Degraded => {
            engine.start(0).unwrap();
            assert!(matches!(engine.on_tick(10_000, |_| true), Cycle::Emitted(_)));
        }
        EngineState::Error => {
            engine.enter_error();
        }
    }
    assert_eq!(engine.state(), state);
}
