#![allow(clippy::missing_safety_doc)]

use std::ptr;

use tracing::{debug, warn};

use hydro_rules_core::{DwellCfg, FloodProfile, ForecastCfg, Timestep, TimestepDelta};
use hydro_rules_orchestrator::{
    Error, HostModel, InMemoryModel, NodeObservables, OrchestratorCfg, OrchestratorSnapshot,
    RuleOrchestrator,
};

/// FFI ABI version for hydro_rules_ffi.
///
/// Bump this when any `#[repr(C)]` struct layout or exported function signature changes.
pub const HYDRO_RULES_FFI_VERSION: u32 = 1;

/// Latched indices carried inline in [`HrDecision`].
pub const HR_MAX_LATCHES: usize = 4;

pub const HR_OK: i32 = 0;
/// Null handle, bad pointer, bad UTF-8 or short output buffer.
pub const HR_ERR_INVALID: i32 = -1;
pub const HR_ERR_CONFIG: i32 = -2;
pub const HR_ERR_DEPENDENCY: i32 = -3;
pub const HR_ERR_TIMESTEP: i32 = -4;
pub const HR_ERR_NOT_SET_UP: i32 = -5;
pub const HR_ERR_STATE: i32 = -6;
pub const HR_ERR_SERIALIZE: i32 = -7;

#[no_mangle]
pub extern "C" fn hydro_rules_ffi_version() -> u32 {
    HYDRO_RULES_FFI_VERSION
}

fn code(e: &Error) -> i32 {
    let rc = match e {
        _ if e.is_configuration() => HR_ERR_CONFIG,
        Error::DependencyResolution { .. }
        | Error::NotAnIndex(_)
        | Error::DuplicateRule(_)
        | Error::DuplicateEntity { .. } => HR_ERR_DEPENDENCY,
        Error::TimestepOrder { .. }
        | Error::HorizonExceeded { .. }
        | Error::InvalidCalendar { .. } => HR_ERR_TIMESTEP,
        Error::NotSetUp => HR_ERR_NOT_SET_UP,
        Error::Serialize(_) => HR_ERR_SERIALIZE,
        Error::Core(hydro_rules_core::Error::ScenarioOutOfRange { .. }) => HR_ERR_INVALID,
        Error::Core(_) | Error::SnapshotMismatch(_) => HR_ERR_STATE,
    };
    warn!(error = %e, rc, "hydro_rules call failed");
    rc
}

fn rc(r: Result<(), Error>) -> i32 {
    match r {
        Ok(()) => HR_OK,
        Err(e) => code(&e),
    }
}

/// FFI string view (UTF-8 bytes).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HrStr {
    pub ptr: *const u8,
    pub len: usize,
}

impl HrStr {
    pub const fn null() -> Self {
        HrStr {
            ptr: ptr::null(),
            len: 0,
        }
    }

    fn as_str(&self) -> Option<&str> {
        if self.ptr.is_null() {
            return None;
        }
        let bytes = unsafe { std::slice::from_raw_parts(self.ptr, self.len) };
        std::str::from_utf8(bytes).ok()
    }
}

/// Rule cfg for FFI (keep it minimal; everything else stays at its default).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HrCfg {
    pub rolling_window: u32,
    pub forecast_window: u32,
    /// Latch dwell in days; `0` means use `latch_minimum_timesteps`.
    pub latch_minimum_days: u32,
    pub latch_minimum_timesteps: u32,
    pub tubs_count_bound: f64, // negative means None
    pub neubs_count_bound: f64, // negative means None
    /// Draw-down parameter for the flood curve; null disables the curve.
    pub flood_draw_down: HrStr,
}

#[no_mangle]
pub extern "C" fn hydro_rules_cfg_default() -> HrCfg {
    let d = OrchestratorCfg::default();
    let dwell = d.latches.first().map(|l| l.dwell).unwrap_or_default();
    let bound = |i: usize| {
        d.counters
            .get(i)
            .and_then(|c| c.events.constraint_upper_bound)
            .unwrap_or(-1.0)
    };
    HrCfg {
        rolling_window: d.rules.forecast.rolling_window as u32,
        forecast_window: d.rules.forecast.forecast_window as u32,
        latch_minimum_days: dwell.minimum_days.unwrap_or(0),
        latch_minimum_timesteps: dwell.minimum_timesteps.unwrap_or(0),
        tubs_count_bound: bound(0),
        neubs_count_bound: bound(1),
        flood_draw_down: HrStr::null(),
    }
}

fn cfg_from_ffi(c: &HrCfg) -> OrchestratorCfg {
    let mut cfg = OrchestratorCfg::default();
    cfg.rules.forecast = ForecastCfg {
        rolling_window: c.rolling_window as usize,
        forecast_window: c.forecast_window as usize,
    };
    let dwell = if c.latch_minimum_days > 0 {
        DwellCfg::days(c.latch_minimum_days)
    } else {
        DwellCfg::timesteps(c.latch_minimum_timesteps)
    };
    for l in &mut cfg.latches {
        l.dwell = dwell;
    }
    for (counter, bound) in cfg
        .counters
        .iter_mut()
        .zip([c.tubs_count_bound, c.neubs_count_bound])
    {
        counter.events.constraint_upper_bound = if bound < 0.0 { None } else { Some(bound) };
    }
    if let Some(name) = c.flood_draw_down.as_str() {
        cfg.rules.flood_profile = Some(FloodProfile::default());
        cfg.topology.flood_draw_down_parameter = Some(name.to_string());
    }
    cfg
}

/// Node kinds accepted by [`hydro_rules_declare_node`].
pub const HR_NODE_LINK: u32 = 0;
pub const HR_NODE_STORAGE: u32 = 1;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct HrNodeObs {
    pub flow: f64,
    pub previous_flow: f64,
    pub volume: f64,
    pub max_volume: f64,
}

#[repr(C)]
#[derive(Clone, Copy, Debug)]
pub struct HrTimestep {
    pub index: usize,
    pub day_of_year: u32,
    pub month: u32,
}

/// One scenario's decisions.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default)]
pub struct HrDecision {
    pub estimated_flow: f64,
    pub abstraction_cost: f64,
    pub abstraction_max: f64,
    pub release_max: f64,
    pub compensation_release: f64,
    pub river_intake_max: f64,
    /// NaN when the flood curve is disabled.
    pub flood_curve: f64,
    pub forecast_crossing: u32,
    pub curve_crossing: u32,
    pub latch_count: u32,
    pub latches: [u32; HR_MAX_LATCHES],
}

/// Owned byte buffer (summary and snapshot JSON).
#[repr(C)]
pub struct HrBytes {
    pub ptr: *mut u8,
    pub len: usize,
}

impl HrBytes {
    fn empty() -> Self {
        HrBytes {
            ptr: ptr::null_mut(),
            len: 0,
        }
    }

    fn from_vec(buf: Vec<u8>) -> Self {
        let mut boxed = buf.into_boxed_slice();
        let ptr = boxed.as_mut_ptr();
        let len = boxed.len();
        std::mem::forget(boxed);
        HrBytes { ptr, len }
    }
}

enum Declared {
    /// Name and one of the `HR_NODE_*` kinds.
    Node(String, u32),
    Aggregate(String, Vec<String>),
    Parameter(String),
}

/// Opaque handle exposed over FFI.
pub struct HydroRules {
    orchestrator: RuleOrchestrator,
    declared: Vec<Declared>,
    model: Option<InMemoryModel>,
}

impl HydroRules {
    fn model(&mut self) -> Result<&mut InMemoryModel, Error> {
        self.model.as_mut().ok_or(Error::NotSetUp)
    }

    fn is_link(&self, name: &str) -> bool {
        self.declared
            .iter()
            .any(|d| matches!(d, Declared::Node(n, HR_NODE_LINK) if n == name))
    }
}

/// Create a new handle. Returns null if the configuration is invalid.
#[no_mangle]
pub extern "C" fn hydro_rules_new(cfg: HrCfg) -> *mut HydroRules {
    let orchestrator = match RuleOrchestrator::new(cfg_from_ffi(&cfg)) {
        Ok(o) => o,
        Err(e) => {
            code(&e);
            return ptr::null_mut();
        }
    };
    Box::into_raw(Box::new(HydroRules {
        orchestrator,
        declared: Vec::new(),
        model: None,
    }))
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_free(h: *mut HydroRules) {
    if !h.is_null() {
        drop(Box::from_raw(h));
    }
}

/// Declare a host node. Only valid before setup.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_declare_node(h: *mut HydroRules, name: HrStr, kind: u32) -> i32 {
    let (Some(handle), Some(name)) = (h.as_mut(), name.as_str()) else {
        return HR_ERR_INVALID;
    };
    if handle.model.is_some() || !matches!(kind, HR_NODE_LINK | HR_NODE_STORAGE) {
        return HR_ERR_INVALID;
    }
    debug!(name, kind, "node declared");
    handle.declared.push(Declared::Node(name.to_string(), kind));
    HR_OK
}

/// Declare a storage that sums already-declared nodes.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_declare_aggregate(
    h: *mut HydroRules,
    name: HrStr,
    members_ptr: *const HrStr,
    members_len: usize,
) -> i32 {
    let (Some(handle), Some(name)) = (h.as_mut(), name.as_str()) else {
        return HR_ERR_INVALID;
    };
    if handle.model.is_some() || members_ptr.is_null() {
        return HR_ERR_INVALID;
    }
    let members = std::slice::from_raw_parts(members_ptr, members_len);
    let mut owned = Vec::with_capacity(members_len);
    for m in members {
        match m.as_str() {
            Some(s) => owned.push(s.to_string()),
            None => return HR_ERR_INVALID,
        }
    }
    handle.declared.push(Declared::Aggregate(name.to_string(), owned));
    HR_OK
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_declare_parameter(h: *mut HydroRules, name: HrStr) -> i32 {
    let (Some(handle), Some(name)) = (h.as_mut(), name.as_str()) else {
        return HR_ERR_INVALID;
    };
    if handle.model.is_some() {
        return HR_ERR_INVALID;
    }
    handle.declared.push(Declared::Parameter(name.to_string()));
    HR_OK
}

/// Build the host table from the declarations and wire every rule.
///
/// `delta_days == 0` marks a non-daily timestep.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_setup(
    h: *mut HydroRules,
    scenarios: usize,
    timesteps: usize,
    delta_days: u32,
) -> i32 {
    let Some(handle) = h.as_mut() else {
        return HR_ERR_INVALID;
    };
    let delta = if delta_days == 0 {
        TimestepDelta::NonDaily
    } else {
        TimestepDelta::Days(delta_days)
    };
    let mut model = InMemoryModel::new(scenarios, timesteps, delta);
    for d in &handle.declared {
        match d {
            Declared::Node(name, _) => {
                model.add_node(name.as_str());
            }
            Declared::Aggregate(name, members) => {
                let members: Vec<&str> = members.iter().map(String::as_str).collect();
                if let Err(e) = model.add_aggregated_storage(name.as_str(), &members) {
                    return code(&e);
                }
            }
            Declared::Parameter(name) => {
                model.add_parameter(name.as_str());
            }
        }
    }
    if let Err(e) = handle.orchestrator.setup(&model) {
        return code(&e);
    }
    handle.model = Some(model);
    HR_OK
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_reset(h: *mut HydroRules) -> i32 {
    match h.as_mut() {
        Some(handle) => rc(handle.orchestrator.reset()),
        None => HR_ERR_INVALID,
    }
}

/// Set one scenario's observables for a node. Link nodes take zero volumes.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_set_node(
    h: *mut HydroRules,
    name: HrStr,
    scenario: usize,
    obs: HrNodeObs,
) -> i32 {
    let (Some(handle), Some(name)) = (h.as_mut(), name.as_str()) else {
        return HR_ERR_INVALID;
    };
    // links carry flow only
    if handle.is_link(name) && (obs.volume != 0.0 || obs.max_volume != 0.0) {
        warn!(name, "volume set on a link node");
        return HR_ERR_INVALID;
    }
    let obs = NodeObservables {
        flow: obs.flow,
        previous_flow: obs.previous_flow,
        volume: obs.volume,
        max_volume: obs.max_volume,
    };
    rc(handle.model().and_then(|m| m.set_node(name, scenario, obs)))
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_set_parameter(
    h: *mut HydroRules,
    name: HrStr,
    scenario: usize,
    value: f64,
) -> i32 {
    let (Some(handle), Some(name)) = (h.as_mut(), name.as_str()) else {
        return HR_ERR_INVALID;
    };
    rc(handle.model().and_then(|m| m.set_parameter(name, scenario, value)))
}

fn timestep(ts: HrTimestep) -> Timestep {
    Timestep::new(ts.index, ts.day_of_year, ts.month)
}

/// Evaluate the rules for `ts` and write one record per scenario into `out`.
///
/// Returns the number of records written, or a negative code.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_before(
    h: *mut HydroRules,
    ts: HrTimestep,
    out: *mut HrDecision,
    out_len: usize,
) -> i32 {
    let Some(handle) = h.as_mut() else {
        return HR_ERR_INVALID;
    };
    let Some(model) = handle.model.as_ref() else {
        return HR_ERR_NOT_SET_UP;
    };
    if out.is_null() || out_len < model.scenario_count() {
        return HR_ERR_INVALID;
    }

    let decisions = match handle.orchestrator.before(model, timestep(ts)) {
        Ok(d) => d,
        Err(e) => return code(&e),
    };
    let out = std::slice::from_raw_parts_mut(out, out_len);
    for (slot, d) in out.iter_mut().zip(decisions) {
        let mut latches = [0u32; HR_MAX_LATCHES];
        for (dst, src) in latches.iter_mut().zip(&d.latches) {
            *dst = *src;
        }
        *slot = HrDecision {
            estimated_flow: d.estimated_flow,
            abstraction_cost: d.abstraction_cost,
            abstraction_max: d.abstraction_max,
            release_max: d.release_max,
            compensation_release: d.compensation_release,
            river_intake_max: d.river_intake_max,
            flood_curve: d.flood_curve.unwrap_or(f64::NAN),
            forecast_crossing: d.forecast_crossing,
            curve_crossing: d.curve_crossing,
            latch_count: d.latches.len().min(HR_MAX_LATCHES) as u32,
            latches,
        };
    }
    decisions.len() as i32
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_after(h: *mut HydroRules, ts: HrTimestep) -> i32 {
    let Some(handle) = h.as_mut() else {
        return HR_ERR_INVALID;
    };
    let Some(model) = handle.model.as_ref() else {
        return HR_ERR_NOT_SET_UP;
    };
    rc(handle.orchestrator.after(model, timestep(ts)))
}

/// Current value of a named rule output.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_value(
    h: *mut HydroRules,
    name: HrStr,
    scenario: usize,
    out: *mut f64,
) -> i32 {
    let (Some(handle), Some(name), false) = (h.as_ref(), name.as_str(), out.is_null()) else {
        return HR_ERR_INVALID;
    };
    match handle.orchestrator.value(name, scenario) {
        Ok(v) => {
            *out = v;
            HR_OK
        }
        Err(e) => code(&e),
    }
}

/// Run summary as UTF-8 JSON. Null on failure; free with `hydro_rules_bytes_free`.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_summary_json(h: *mut HydroRules) -> HrBytes {
    let Some(handle) = h.as_ref() else {
        return HrBytes::empty();
    };
    match handle.orchestrator.summary().and_then(|s| s.to_json()) {
        Ok(json) => HrBytes::from_vec(json.into_bytes()),
        Err(e) => {
            code(&e);
            HrBytes::empty()
        }
    }
}

/// State snapshot as UTF-8 JSON. Null on failure or mid-timestep.
#[no_mangle]
pub unsafe extern "C" fn hydro_rules_snapshot(h: *mut HydroRules) -> HrBytes {
    let Some(handle) = h.as_ref() else {
        return HrBytes::empty();
    };
    let json = handle
        .orchestrator
        .snapshot()
        .and_then(|s| serde_json::to_vec(&s).map_err(Error::from));
    match json {
        Ok(buf) => HrBytes::from_vec(buf),
        Err(e) => {
            code(&e);
            HrBytes::empty()
        }
    }
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_restore(h: *mut HydroRules, bytes: *const u8, len: usize) -> i32 {
    let Some(handle) = h.as_mut() else {
        return HR_ERR_INVALID;
    };
    if bytes.is_null() {
        return HR_ERR_INVALID;
    }
    let data = std::slice::from_raw_parts(bytes, len);
    let snap: OrchestratorSnapshot = match serde_json::from_slice(data) {
        Ok(s) => s,
        Err(e) => return code(&Error::from(e)),
    };
    rc(handle.orchestrator.restore(snap))
}

#[no_mangle]
pub unsafe extern "C" fn hydro_rules_bytes_free(b: HrBytes) {
    if !b.ptr.is_null() {
        let slice_ptr = std::ptr::slice_from_raw_parts_mut(b.ptr, b.len);
        drop(Box::from_raw(slice_ptr));
    }
}
