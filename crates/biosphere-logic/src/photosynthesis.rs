//! Plant light and CO2 response.

use serde::{Deserialize, Serialize};

/// Photosynthetic pathway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pathway {
    #[default]
    C3,
    C4,
}

/// Reference and saturation CO2 concentrations (ppm).
pub const CO2_REFERENCE_PPM: f64 = 350.0;
pub const CO2_SATURATION_PPM: f64 = 700.0;
/// Transpiration efficiency gain from reference to saturation.
pub const TE_GAIN_AT_SATURATION: f64 = 1.37;

/// CO2 compensation point term for C3 plants.
const C3_TT: f64 = (163.0 - 25.0) / (5.0 - 2.5);

/// Daily light-need envelope.
///
/// A contiguous window of `photoperiod_hours`, centered on midday, where the
/// plant needs light. Values inside the window are `day_steps / window`, so
/// the envelope's mean over one day is exactly 1.
pub fn photoperiod_envelope(day_steps: usize, photoperiod_hours: f64, hours_per_step: f64) -> Vec<f64> {
    if day_steps == 0 {
        return Vec::new();
    }
    let window = ((photoperiod_hours / hours_per_step).round().max(0.0) as usize).min(day_steps);
    if window == 0 {
        return vec![0.0; day_steps];
    }
    let start = (day_steps - window) / 2;
    let value = day_steps as f64 / window as f64;
    (0..day_steps)
        .map(|i| if i >= start && i < start + window { value } else { 0.0 })
        .collect()
}

/// Response of a plant to atmospheric CO2.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Co2Response {
    /// CO2 uptake relative to saturation (1.0 at 700 ppm).
    pub uptake: f64,
    /// Transpiration efficiency factor (1.0 at 700 ppm).
    pub transpiration_efficiency: f64,
}

fn c3_uptake(ppm: f64) -> f64 {
    ((ppm - C3_TT) * (CO2_REFERENCE_PPM + 2.0 * C3_TT))
        / ((ppm + 2.0 * C3_TT) * (CO2_REFERENCE_PPM - C3_TT))
}

/// CO2 response for a concentration in ppm, clipped to `[350, 700]`.
///
/// C3 uptake follows a saturating curve normalized to 1 at 700 ppm; C4
/// plants are insensitive to CO2 above the reference. Transpiration
/// efficiency rises linearly from `1 / 1.37` at 350 ppm to 1 at 700 ppm
/// for both pathways.
pub fn co2_response(ppm: f64, pathway: Pathway) -> Co2Response {
    let c = ppm.clamp(CO2_REFERENCE_PPM, CO2_SATURATION_PPM);
    let uptake = match pathway {
        Pathway::C3 => c3_uptake(c) / c3_uptake(CO2_SATURATION_PPM),
        Pathway::C4 => 1.0,
    };
    let t = (c - CO2_REFERENCE_PPM) / (CO2_SATURATION_PPM - CO2_REFERENCE_PPM);
    let te_low = 1.0 / TE_GAIN_AT_SATURATION;
    Co2Response {
        uptake,
        transpiration_efficiency: te_low + t * (1.0 - te_low),
    }
}

/// Mass fraction to volumetric ppm, given the molar masses of the gas and
/// the carrier mix.
pub fn mass_ratio_to_ppm(mass_ratio: f64, gas_molar_mass: f64, mix_molar_mass: f64) -> f64 {
    mass_ratio * mix_molar_mass / gas_molar_mass * 1e6
}
