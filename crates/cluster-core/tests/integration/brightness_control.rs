//! Brightness arbitration between ambient light, supply guard, racing mode
//! and manual override

use crate::common::{MemStore, Operation, Rig, test_config};
use cluster_core::ambient::{K_SCREEN_KEY, ModePolicy};
use cluster_core::app_state::Cluster;
use cluster_core::brightness::BrightnessMode;
use cluster_core::config::{ClusterConfig, GuardKind};
use cluster_core::racing::ForceStopPolicy;

fn short_racing_config() -> ClusterConfig {
    let mut config = test_config();
    config.racing.timeout_ms = 2000;
    config
}

#[test]
fn test_dark_cabin_settles_at_night() {
    let mut rig = Rig::new(test_config());
    rig.hw.set_lux(2);

    let snap = rig.run_for(2000);

    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
    assert_eq!(snap.brightness.current_level, 60);
    assert_eq!(rig.hw.backlight(), 60);
}

#[test]
fn test_ambient_reads_with_backlight_blanked() {
    let mut rig = Rig::new(test_config());
    rig.frame().unwrap();

    let ops = rig.hw.operations();
    let expected = [
        Operation::SetBrightness(0),
        Operation::DelayUs(500),
        Operation::ReadLux,
        Operation::SetBrightness(255),
    ];
    assert!(ops.windows(expected.len()).any(|w| w == expected));
}

#[test]
fn test_zero_prefill_dips_to_night_at_power_on() {
    let mut rig = Rig::new(ClusterConfig::default());
    rig.hw.set_lux(400);

    let snap = rig.run_for(1000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);

    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.current_level, 255);
}

#[test]
fn test_hysteresis_band_tracks_level() {
    let mut config = test_config();
    config.ambient.policy = ModePolicy::HysteresisBand { margin_ratio: 0.15 };
    let mut rig = Rig::new(config);
    rig.hw.set_lux(11);

    let snap = rig.run_for(2000);

    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.target_level, 211);
    assert_eq!(snap.brightness.current_level, 211);
}

#[test]
fn test_light_sensor_failure_keeps_mode() {
    let mut rig = Rig::new(test_config());
    rig.hw.fail_light(true);

    let snap = rig.run_for(2000);

    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.latest_lux, None);
}

#[test]
fn test_brownout_cuts_and_recovers_brightness() {
    let mut rig = Rig::new(test_config());
    let snap = rig.run_for(1000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);

    rig.hw.set_vin(4.2);
    let snap = rig.run_for(2000);
    assert!(snap.guard_overriding);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
    assert_eq!(snap.brightness.current_level, 60);
    assert_eq!(rig.hw.backlight(), 60);
    assert!(rig.hw.operations().contains(&Operation::TxThrottled(true)));

    // Bright cabin, but the guard holds the brightness while it recovers
    rig.hw.set_vin(5.0);
    let snap = rig.run_for(1500);
    assert!(snap.guard_overriding);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
    assert!(snap.brightness.current_level > 60);
    assert!(snap.brightness.current_level < 255);

    let snap = rig.run_for(2500);
    assert!(!snap.guard_overriding);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.current_level, 255);
    assert!(rig.hw.operations().contains(&Operation::TxThrottled(false)));
}

#[test]
fn test_brownout_recovery_ends_at_pre_dip_level() {
    let mut rig = Rig::new(test_config());
    rig.hw.set_lux(12);
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.current_level, 200);

    rig.hw.set_vin(4.2);
    let snap = rig.run_for(2000);
    assert!(snap.guard_overriding);
    assert_eq!(snap.brightness.current_level, 60);

    rig.hw.set_vin(5.0);
    let mut previous = snap.brightness.current_level;
    let mut snap = rig.frame().unwrap();
    for _ in 0..250 {
        assert!(snap.brightness.current_level >= previous);
        previous = snap.brightness.current_level;
        snap = rig.frame().unwrap();
    }

    assert!(!snap.guard_overriding);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.current_level, 200);
    assert_eq!(snap.brightness.target_level, 200);
    assert_eq!(rig.hw.backlight(), 200);
}

fn rise_cap_config(policy: ModePolicy) -> ClusterConfig {
    let mut config = test_config();
    config.guard.kind = GuardKind::RiseCap;
    config.ambient.policy = policy;
    config
}

#[test]
fn test_rise_cap_holds_ambient_rise_until_supply_recovers() {
    let mut rig = Rig::new(rise_cap_config(ModePolicy::default()));
    rig.hw.set_lux(2);
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
    assert_eq!(snap.brightness.current_level, 60);

    rig.hw.set_vin(4.4);
    rig.run_for(2000);
    rig.hw.set_lux(400);
    let snap = rig.run_for(3500);
    assert!(!snap.guard_overriding);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.target_level, 80);
    assert_eq!(snap.brightness.current_level, 80);

    // Retries keep the cap while the supply stays weak
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.target_level, 80);

    rig.hw.set_vin(5.0);
    let snap = rig.run_for(5000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.target_level, 255);
    assert_eq!(snap.brightness.current_level, 255);
    assert_eq!(rig.hw.backlight(), 255);
}

#[test]
fn test_rise_cap_checks_band_level_within_mode() {
    let mut rig = Rig::new(rise_cap_config(ModePolicy::HysteresisBand {
        margin_ratio: 0.15,
    }));
    rig.hw.set_lux(10);
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.current_level, 200);

    rig.hw.set_vin(4.4);
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.target_level, 200);

    // Still Dusk, but 14 lux asks for a higher duty cycle
    rig.hw.set_lux(14);
    let snap = rig.run_for(3000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.target_level, 80);
    assert!(rig.hw.backlight() <= 200);

    rig.hw.set_vin(5.0);
    let snap = rig.run_for(5000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);
    assert_eq!(snap.brightness.target_level, 244);
    assert_eq!(snap.brightness.current_level, 244);
    assert_eq!(rig.hw.backlight(), 244);
}

#[test]
fn test_instant_guard_skips_changes_on_low_supply() {
    let mut config = test_config();
    config.guard.kind = GuardKind::Instant;
    let mut rig = Rig::new(config);
    rig.hw.set_vin(4.2);
    rig.hw.set_lux(2);

    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.current_level, 255);

    assert!(!rig.cluster.manual_brightness(rig.now, BrightnessMode::Night));
    assert_eq!(rig.cluster.brightness().mode, BrightnessMode::Day);
}

#[test]
fn test_racing_forces_day_then_hands_back_to_ambient() {
    let mut rig = Rig::new(short_racing_config());
    rig.hw.set_lux(2);
    let snap = rig.run_for(2000);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);

    rig.hw.set_lateral_g(1.3);
    let snap = rig.run_for(300);
    assert!(snap.racing_active);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);
    assert_eq!(snap.brightness.target_level, 255);
    assert_eq!(rig.cluster.racing().prev_mode(), BrightnessMode::Night);

    // Still dark outside, racing keeps full brightness until it times out
    rig.hw.set_lateral_g(0.0);
    let snap = rig.run_for(1500);
    assert!(snap.racing_active);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);

    let snap = rig.run_for(1000);
    assert!(!snap.racing_active);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
}

#[test]
fn test_racing_without_light_sensor_restores_snapshot() {
    let mut rig = Rig::new(short_racing_config());
    rig.board.light = None;
    assert!(rig.cluster.manual_brightness(rig.now, BrightnessMode::Night));
    rig.run_for(500);

    rig.hw.set_lateral_g(1.3);
    let snap = rig.run_for(300);
    assert!(snap.racing_active);
    assert_eq!(snap.brightness.mode, BrightnessMode::Day);

    rig.hw.set_lateral_g(0.0);
    let snap = rig.run_for(2500);
    assert!(!snap.racing_active);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
}

#[test]
fn test_manual_override_stops_racing_without_restore() {
    let mut rig = Rig::new(short_racing_config());
    rig.hw.set_lux(2);
    rig.run_for(2000);

    rig.hw.set_lateral_g(1.3);
    assert!(rig.run_for(300).racing_active);

    assert!(rig.cluster.manual_brightness(rig.now, BrightnessMode::Dusk));
    assert!(!rig.cluster.racing().is_active());

    rig.hw.set_lateral_g(0.0);
    let snap = rig.run_for(3000);
    assert!(!snap.racing_active);
    assert!(snap.manual_brightness);
    assert_eq!(snap.brightness.mode, BrightnessMode::Dusk);

    rig.cluster.resume_auto_brightness();
    let snap = rig.run_for(100);
    assert!(!snap.manual_brightness);
    assert_eq!(snap.brightness.mode, BrightnessMode::Night);
}

#[test]
fn test_force_stop_policy_while_idle() {
    let mut rig = Rig::new(test_config());
    rig.cluster.manual_brightness(rig.now, BrightnessMode::Dusk);
    rig.cluster.manual_brightness(rig.now, BrightnessMode::Night);
    assert_eq!(rig.cluster.racing().prev_mode(), BrightnessMode::Dusk);

    let mut config = test_config();
    config.force_stop = ForceStopPolicy::KeepSnapshot;
    let mut rig = Rig::new(config);
    rig.cluster.manual_brightness(rig.now, BrightnessMode::Dusk);
    rig.cluster.manual_brightness(rig.now, BrightnessMode::Night);
    assert_eq!(rig.cluster.racing().prev_mode(), BrightnessMode::Day);
}

#[test]
fn test_screen_calibration_persists_coefficient() {
    let mut rig = Rig::new(test_config());
    rig.hw.set_lux(100);
    rig.hw.set_screen_glow(0.5);
    rig.run_for(100);
    rig.hw.clear_operations();

    let mut store = MemStore::default();
    let k = rig
        .cluster
        .calibrate_screen_offset(&mut rig.board, &mut store)
        .unwrap();

    // 100 lux dark, 227 lux at full backlight
    assert!((k - 127.0 / 255.0).abs() < 1e-4);
    assert_eq!(rig.hw.backlight(), 255);
    assert_eq!(
        rig.hw.operations(),
        vec![
            Operation::SetBrightness(0),
            Operation::DelayUs(500),
            Operation::ReadLux,
            Operation::SetBrightness(255),
            Operation::DelayUs(500),
            Operation::ReadLux,
            Operation::SetBrightness(255),
        ]
    );
    assert_eq!(store.floats[K_SCREEN_KEY], k);

    let mut fresh = Cluster::from_config(test_config());
    fresh.load_k_screen(&mut store);
    assert_eq!(fresh.k_screen(), k);
}

#[test]
fn test_screen_calibration_needs_light_sensor() {
    let mut rig = Rig::new(test_config());
    rig.board.light = None;

    let mut store = MemStore::default();
    assert!(
        rig.cluster
            .calibrate_screen_offset(&mut rig.board, &mut store)
            .is_err()
    );
    assert!(store.floats.is_empty());
}
