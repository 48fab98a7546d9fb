//! Frame loop: sensing, gauges, faults and the pressure log

use crate::common::{Rig, test_config};
use cluster_core::app_state::FatalError;
use cluster_core::calibration::FaultKind;
use cluster_core::metrics::AlertLevel;
use cluster_core::motion::GDirection;
use cluster_core::power::PowerRailFaults;
use cluster_core::sensors::Channel;

#[test]
fn test_gauges_follow_sensors() {
    let mut rig = Rig::new(test_config());
    let snap = rig.run_for(1000);

    assert!((snap.pressure.value - 4.0).abs() < 0.05);
    assert!((snap.water_temp.value - 85.0).abs() < 0.5);
    assert!((snap.oil_temp.value - 95.0).abs() < 0.5);
    for gauge in [snap.pressure, snap.water_temp, snap.oil_temp] {
        assert_eq!(gauge.fault, None);
        assert_eq!(gauge.alert, AlertLevel::Normal);
    }
}

#[test]
fn test_hot_oil_raises_alert() {
    let mut rig = Rig::new(test_config());
    rig.hw.set_temperature_c(Channel::OilTemp, 125.0);

    let snap = rig.run_for(2000);

    assert_eq!(snap.oil_temp.alert, AlertLevel::Critical);
    assert!(snap.oil_critical_time.as_millis() > 0);
}

#[test]
fn test_disconnected_sender_zeroes_gauge_and_recovers() {
    let mut rig = Rig::new(test_config());
    rig.run_for(1000);

    rig.hw.set_counts(Channel::WaterTemp, Some(0));
    let snap = rig.run_for(600);
    assert_eq!(snap.water_temp.fault, Some(FaultKind::Disconnected));
    assert_eq!(snap.water_temp.value, 0.0);
    assert_eq!(snap.water_temp.max, 0.0);
    // Other channels are unaffected
    assert_eq!(snap.oil_temp.fault, None);
    assert_eq!(snap.pressure.fault, None);

    rig.hw.set_temperature_c(Channel::WaterTemp, 85.0);
    let snap = rig.run_for(600);
    assert_eq!(snap.water_temp.fault, None);
    assert!((snap.water_temp.value - 85.0).abs() < 0.5);
}

#[test]
fn test_read_failure_reports_disconnected() {
    let mut rig = Rig::new(test_config());
    rig.run_for(200);

    rig.hw.set_counts(Channel::OilPressure, None);
    let snap = rig.run_for(100);

    assert_eq!(snap.pressure.fault, Some(FaultKind::Disconnected));
    assert_eq!(snap.pressure.value, 0.0);
}

#[test]
fn test_over_limit_pressure_is_out_of_range() {
    let mut rig = Rig::new(test_config());
    rig.hw.set_pressure_bar(11.2);

    let snap = rig.run_for(200);

    assert_eq!(snap.pressure.fault, Some(FaultKind::OutOfRange));
}

#[test]
fn test_missing_adc_faults_every_channel() {
    let mut rig = Rig::new(test_config());
    rig.board.adc = None;
    rig.hw.set_lateral_g(0.0);
    rig.run_for(500);

    rig.hw.set_lateral_g(1.5);
    let snap = rig.run_for(1500);

    for gauge in [snap.pressure, snap.water_temp, snap.oil_temp] {
        assert_eq!(gauge.fault, Some(FaultKind::Disconnected));
        assert_eq!(gauge.value, 0.0);
    }
    // A dead pressure channel must not look like low pressure
    assert!(!snap.low_pressure.visible);
    assert!(snap.last_low_pressure_event.is_none());
}

#[test]
fn test_power_rail_fault_is_fatal() {
    let mut rig = Rig::new(test_config());
    rig.run_for(100);

    rig.hw
        .set_rail_faults(PowerRailFaults::LDO_OVER_CURRENT | PowerRailFaults::WARNING_LEVEL1);
    let err = rig.frame().unwrap_err();

    let FatalError::PowerRail(faults) = err;
    assert!(faults.contains(PowerRailFaults::LDO_OVER_CURRENT));
    assert_eq!(faults.lines().count(), 2);
}

#[test]
fn test_pressure_log_records_once_per_second() {
    let mut rig = Rig::new(test_config());
    rig.run_for(3000);

    let log = rig.cluster.pressure_log();
    assert_eq!(log.len(), 3);
    assert!((log.latest().unwrap() - 4.0).abs() < 0.05);
}

#[test]
fn test_motion_reads_after_calibration() {
    let mut rig = Rig::new(test_config());
    let snap = rig.run_for(100);
    assert!(!rig.cluster.motion().is_calibrated());
    assert_eq!(snap.motion.g_force, 0.0);

    rig.run_for(500);
    assert!(rig.cluster.motion().is_calibrated());

    rig.hw.set_lateral_g(0.8);
    let snap = rig.frame().unwrap();
    assert!((snap.motion.g_force - 0.8).abs() < 1e-4);
    assert_eq!(snap.motion.direction, GDirection::Right);

    rig.hw.set_lateral_g(-0.8);
    let snap = rig.frame().unwrap();
    assert_eq!(snap.motion.direction, GDirection::Left);
}
