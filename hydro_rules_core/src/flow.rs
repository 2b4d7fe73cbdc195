/// Observables feeding the gauge flow estimate for one scenario.
///
/// `base_flow` is the current sum of tracked inflows; the two `previous_*`
/// values are what the host settled at the end of the prior timestep.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct FlowObservation {
    pub base_flow: f64,
    pub previous_base_flow: f64,
    pub previous_gauge_flow: f64,
}

impl FlowObservation {
    /// Estimated gauge flow: the change in inflow applied to last step's gauge reading.
    #[inline]
    pub fn estimate(&self) -> f64 {
        self.base_flow - self.previous_base_flow + self.previous_gauge_flow
    }
}
