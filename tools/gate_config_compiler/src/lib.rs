use std::{fmt, fs, path::Path};

use serde::Deserialize;

pub const POWER_DOWN_FREQ_MHZ: u16 = 1111;
pub const BAND_MIN_MHZ: u16 = 5645;
pub const BAND_MAX_MHZ: u16 = 5945;
pub const CALIBRATION_SAMPLES_MIN: u16 = 10;
pub const CALIBRATION_SAMPLES_MAX: u16 = 200;

#[derive(Debug)]
pub enum ConfigCompilerError {
    Io(String),
    Parse(String),
    Validation(String),
}

impl fmt::Display for ConfigCompilerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "io error: {msg}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
            Self::Validation(msg) => write!(f, "validation error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigCompilerError {}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct GateFile {
    pub receiver: ReceiverSection,
    pub detection: DetectionSection,
    pub filter: FilterSection,
    pub calibration: CalibrationSection,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ReceiverSection {
    pub frequency_mhz: u16,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Eq)]
pub enum PolicyName {
    #[serde(rename = "peak-drop")]
    PeakDrop,
    #[serde(rename = "exit-threshold")]
    ExitThreshold,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DetectionSection {
    pub enter_rssi: u8,
    pub exit_rssi: u8,
    pub drone_size: u8,
    pub min_lap: u16,
    pub policy: PolicyName,
    #[serde(default)]
    pub hole_shot_min_delta: Option<u8>,
    #[serde(default)]
    pub min_lap_guard: bool,
    #[serde(default)]
    pub skip_hole_shot: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct FilterSection {
    pub measurement_noise: u16,
    pub process_noise: u16,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CalibrationSection {
    pub samples: u16,
}

pub fn parse_gate_str(source: &str) -> Result<GateFile, ConfigCompilerError> {
    toml::from_str(source).map_err(|e| ConfigCompilerError::Parse(e.to_string()))
}

pub fn parse_gate_file(path: &Path) -> Result<GateFile, ConfigCompilerError> {
    let source = fs::read_to_string(path)
        .map_err(|e| ConfigCompilerError::Io(format!("{}: {e}", path.display())))?;
    parse_gate_str(&source)
}

pub fn validate_config(gate: &GateFile) -> Result<(), ConfigCompilerError> {
    let freq = gate.receiver.frequency_mhz;
    if freq != POWER_DOWN_FREQ_MHZ && !(BAND_MIN_MHZ..=BAND_MAX_MHZ).contains(&freq) {
        return Err(ConfigCompilerError::Validation(format!(
            "receiver.frequency_mhz must be {POWER_DOWN_FREQ_MHZ} or within \
             {BAND_MIN_MHZ}..={BAND_MAX_MHZ}, got {freq}"
        )));
    }

    let detection = &gate.detection;
    if detection.enter_rssi <= detection.exit_rssi {
        return Err(ConfigCompilerError::Validation(
            "detection.enter_rssi must be > detection.exit_rssi".into(),
        ));
    }
    if detection.drone_size != 2 && detection.drone_size != 5 {
        return Err(ConfigCompilerError::Validation(format!(
            "detection.drone_size must be 2 or 5, got {}",
            detection.drone_size
        )));
    }
    if detection.min_lap == 0 {
        return Err(ConfigCompilerError::Validation(
            "detection.min_lap must be > 0".into(),
        ));
    }
    if detection.hole_shot_min_delta == Some(0) {
        return Err(ConfigCompilerError::Validation(
            "detection.hole_shot_min_delta must be > 0 when set".into(),
        ));
    }

    if gate.filter.measurement_noise == 0 || gate.filter.process_noise == 0 {
        return Err(ConfigCompilerError::Validation(
            "filter noise coefficients must be positive integers".into(),
        ));
    }

    let samples = gate.calibration.samples;
    if !(CALIBRATION_SAMPLES_MIN..=CALIBRATION_SAMPLES_MAX).contains(&samples) {
        return Err(ConfigCompilerError::Validation(format!(
            "calibration.samples must be within \
             {CALIBRATION_SAMPLES_MIN}..={CALIBRATION_SAMPLES_MAX}, got {samples}"
        )));
    }

    Ok(())
}

pub fn render_generated_config(gate: &GateFile) -> String {
    let detection = &gate.detection;
    let drone_size = if detection.drone_size == 2 {
        "DroneSize::TwoInch"
    } else {
        "DroneSize::FiveInch"
    };
    let policy = match detection.policy {
        PolicyName::PeakDrop => "CrossingPolicyKind::PeakDrop",
        PolicyName::ExitThreshold => "CrossingPolicyKind::ExitThreshold",
    };
    let hole_shot = match detection.hole_shot_min_delta {
        Some(delta) => format!("Some({delta})"),
        None => "None".to_string(),
    };

    let mut out = String::new();
    out.push_str("// @generated by gate_config_compiler. Do not edit.\n");
    out.push_str("pub const GATE_CONFIG: GateConfig = GateConfig {\n");
    out.push_str(&format!(
        "    frequency_mhz: {},\n",
        gate.receiver.frequency_mhz
    ));
    out.push_str(&format!("    enter_rssi: {},\n", detection.enter_rssi));
    out.push_str(&format!("    exit_rssi: {},\n", detection.exit_rssi));
    out.push_str(&format!("    drone_size: {drone_size},\n"));
    out.push_str(&format!("    min_lap_tenths: {},\n", detection.min_lap));
    out.push_str(&format!("    policy: {policy},\n"));
    out.push_str(&format!("    hole_shot_min_delta: {hole_shot},\n"));
    out.push_str(&format!("    min_lap_guard: {},\n", detection.min_lap_guard));
    out.push_str(&format!("    skip_hole_shot: {},\n", detection.skip_hole_shot));
    out.push_str("    filter: FilterConfig {\n");
    out.push_str(&format!(
        "        measurement_noise_raw: {},\n",
        gate.filter.measurement_noise
    ));
    out.push_str(&format!(
        "        process_noise_raw: {},\n",
        gate.filter.process_noise
    ));
    out.push_str("    },\n");
    out.push_str(&format!(
        "    calibration_samples: {},\n",
        gate.calibration.samples
    ));
    out.push_str("};\n");
    out
}

pub fn generate_from_path(path: &Path) -> Result<String, ConfigCompilerError> {
    let gate = parse_gate_file(path)?;
    validate_config(&gate)?;
    Ok(render_generated_config(&gate))
}
