//! FFI smoke tests.
//!
//! These tests call the exported `extern "C"` functions directly (as an external consumer would),
//! to validate:
//! - ABI surface compiles and links
//! - declaration, setup and the per-timestep hooks drive the rules
//! - allocation/free symmetry for returned buffers
//! - snapshot/restore round-trip works

use hydro_rules_ffi::*;

fn s(s: &str) -> HrStr {
    HrStr {
        ptr: s.as_ptr(),
        len: s.len(),
    }
}

fn ts(index: usize) -> HrTimestep {
    HrTimestep {
        index,
        day_of_year: 1 + index as u32,
        month: 1,
    }
}

fn storage(volume: f64) -> HrNodeObs {
    HrNodeObs {
        flow: 0.0,
        previous_flow: 0.0,
        volume,
        max_volume: 1000.0,
    }
}

/// Handle with the default topology declared and set up for `scenarios`.
unsafe fn ready(cfg: HrCfg, scenarios: usize) -> *mut HydroRules {
    let h = hydro_rules_new(cfg);
    assert!(!h.is_null());
    for n in ["Addingham", "Wharfe2In"] {
        assert_eq!(hydro_rules_declare_node(h, s(n), HR_NODE_LINK), HR_OK);
    }
    assert_eq!(hydro_rules_declare_node(h, s("Grimwith"), HR_NODE_STORAGE), HR_OK);
    let members = [s("Grimwith")];
    assert_eq!(
        hydro_rules_declare_aggregate(h, s("Group Storage"), members.as_ptr(), members.len()),
        HR_OK
    );
    for p in ["Wharfe2 Inflow", "Grimwith Compensation Flow", "Group line7"] {
        assert_eq!(hydro_rules_declare_parameter(h, s(p)), HR_OK);
    }
    assert_eq!(hydro_rules_setup(h, scenarios, 30, 1), HR_OK);
    for sc in 0..scenarios {
        assert_eq!(hydro_rules_set_parameter(h, s("Wharfe2 Inflow"), sc, 300.0), HR_OK);
        assert_eq!(hydro_rules_set_parameter(h, s("Grimwith Compensation Flow"), sc, 15.1), HR_OK);
        assert_eq!(hydro_rules_set_parameter(h, s("Group line7"), sc, 0.5), HR_OK);
        assert_eq!(hydro_rules_set_node(h, s("Grimwith"), sc, storage(800.0)), HR_OK);
    }
    h
}

fn short_dwell() -> HrCfg {
    let mut cfg = hydro_rules_cfg_default();
    cfg.latch_minimum_days = 0;
    cfg.latch_minimum_timesteps = 2;
    cfg
}

#[test]
fn ffi_version_and_default_cfg() {
    assert_eq!(hydro_rules_ffi_version(), HYDRO_RULES_FFI_VERSION);

    let cfg = hydro_rules_cfg_default();
    assert_eq!(cfg.rolling_window, 28);
    assert_eq!(cfg.forecast_window, 42);
    assert_eq!(cfg.latch_minimum_days, 84);
    assert_eq!(cfg.tubs_count_bound, 3.0);
    assert_eq!(cfg.neubs_count_bound, 1.0);
    assert!(cfg.flood_draw_down.ptr.is_null());
}

#[test]
fn ffi_before_after_and_summary() {
    unsafe {
        let h = ready(short_dwell(), 2);

        let mut out = [HrDecision::default(); 2];
        for t in 0..6 {
            let v = if t == 2 { 100.0 } else { 800.0 };
            assert_eq!(hydro_rules_set_node(h, s("Grimwith"), 1, storage(v)), HR_OK);

            let n = hydro_rules_before(h, ts(t), out.as_mut_ptr(), out.len());
            assert_eq!(n, 2);
            assert_eq!(out[0].release_max, 81.8);
            assert_eq!(out[0].latch_count, 2);
            assert!(out[0].flood_curve.is_nan());
            assert_eq!(out[1].curve_crossing, (t == 2) as u32);
            assert_eq!(out[1].latches[1], (2..=4).contains(&t) as u32);
            assert_eq!(hydro_rules_after(h, ts(t)), HR_OK);
        }

        let mut v = 0.0;
        assert_eq!(hydro_rules_value(h, s("Group NEUBs Annual Count"), 1, &mut v), HR_OK);
        assert_eq!(v, 1.0);
        assert_eq!(hydro_rules_value(h, s("nope"), 0, &mut v), HR_ERR_DEPENDENCY);

        let json = hydro_rules_summary_json(h);
        assert!(!json.ptr.is_null());
        let text = std::str::from_utf8(std::slice::from_raw_parts(json.ptr, json.len)).unwrap();
        assert!(text.contains("Group NEUBs Annual Count"));
        hydro_rules_bytes_free(json);

        hydro_rules_free(h);
    }
}

#[test]
fn ffi_error_codes() {
    unsafe {
        let h = hydro_rules_new(hydro_rules_cfg_default());
        let mut out = [HrDecision::default(); 1];
        assert_eq!(hydro_rules_before(h, ts(0), out.as_mut_ptr(), 1), HR_ERR_NOT_SET_UP);
        assert_eq!(hydro_rules_reset(h), HR_ERR_NOT_SET_UP);
        // nothing declared: the gauge cannot resolve
        assert_eq!(hydro_rules_setup(h, 1, 10, 1), HR_ERR_DEPENDENCY);
        assert_eq!(hydro_rules_declare_node(h, s("X"), 7), HR_ERR_INVALID);
        hydro_rules_free(h);

        // day dwell on a non-daily host
        let h = hydro_rules_new(hydro_rules_cfg_default());
        for n in ["Addingham", "Wharfe2In", "Group Storage"] {
            hydro_rules_declare_node(h, s(n), HR_NODE_LINK);
        }
        for p in ["Wharfe2 Inflow", "Grimwith Compensation Flow", "Group line7"] {
            hydro_rules_declare_parameter(h, s(p));
        }
        assert_eq!(hydro_rules_setup(h, 1, 10, 0), HR_ERR_CONFIG);
        hydro_rules_free(h);

        let h = ready(short_dwell(), 2);
        let mut small = [HrDecision::default(); 1];
        assert_eq!(hydro_rules_before(h, ts(0), small.as_mut_ptr(), 1), HR_ERR_INVALID);
        let mut out = [HrDecision::default(); 2];
        assert_eq!(hydro_rules_before(h, ts(3), out.as_mut_ptr(), 2), HR_ERR_TIMESTEP);
        assert_eq!(hydro_rules_set_parameter(h, s("Group line7"), 9, 0.1), HR_ERR_INVALID);
        assert_eq!(hydro_rules_declare_parameter(h, s("late")), HR_ERR_INVALID);
        assert_eq!(hydro_rules_set_node(h, s("Addingham"), 0, storage(10.0)), HR_ERR_INVALID);
        let flow = HrNodeObs {
            flow: 250.0,
            ..HrNodeObs::default()
        };
        assert_eq!(hydro_rules_set_node(h, s("Addingham"), 0, flow), HR_OK);
        let bad_month = HrTimestep {
            month: 13,
            ..ts(0)
        };
        assert_eq!(hydro_rules_before(h, bad_month, out.as_mut_ptr(), 2), HR_ERR_TIMESTEP);
        assert_eq!(hydro_rules_before(h, ts(0), out.as_mut_ptr(), 2), 2);
        hydro_rules_free(h);

        // an aggregate may not reuse a node's name
        let h = hydro_rules_new(hydro_rules_cfg_default());
        hydro_rules_declare_node(h, s("Grimwith"), HR_NODE_STORAGE);
        let members = [s("Grimwith")];
        hydro_rules_declare_aggregate(h, s("Grimwith"), members.as_ptr(), members.len());
        assert_eq!(hydro_rules_setup(h, 1, 10, 1), HR_ERR_DEPENDENCY);
        hydro_rules_free(h);

        let mut bad = hydro_rules_cfg_default();
        bad.rolling_window = 0;
        assert!(hydro_rules_new(bad).is_null());
    }
}

#[test]
fn ffi_snapshot_restore_roundtrip() {
    unsafe {
        let a = ready(short_dwell(), 1);
        let mut out = [HrDecision::default(); 1];
        for t in 0..3 {
            hydro_rules_before(a, ts(t), out.as_mut_ptr(), 1);
            hydro_rules_after(a, ts(t));
        }

        let snap = hydro_rules_snapshot(a);
        assert!(!snap.ptr.is_null());

        let b = ready(short_dwell(), 1);
        assert_eq!(hydro_rules_restore(b, snap.ptr as *const u8, snap.len), HR_OK);
        assert_eq!(hydro_rules_before(b, ts(3), out.as_mut_ptr(), 1), 1);
        assert_eq!(hydro_rules_after(b, ts(3)), HR_OK);

        let garbage = b"not json";
        assert_eq!(hydro_rules_restore(b, garbage.as_ptr(), garbage.len()), HR_ERR_SERIALIZE);

        let c = ready(short_dwell(), 2);
        assert_eq!(hydro_rules_restore(c, snap.ptr as *const u8, snap.len), HR_ERR_STATE);

        hydro_rules_bytes_free(snap);
        hydro_rules_free(a);
        hydro_rules_free(b);
        hydro_rules_free(c);
    }
}
