//! Canonical measurement metadata.
//!
//! Every record published by the proxy is described by a [`Metadata`]
//! value: which device produced it and what is being measured, in
//! canonical units. Stream parsers convert wire units to these before
//! emitting anything.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIdentifier {
    pub authority: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceType {
    ElectricityMeter,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::ElectricityMeter => "electricity-meter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: DeviceType,
    pub identifier: DeviceIdentifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementDirection {
    Consumption,
    Production,
}

impl MeasurementDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementDirection::Consumption => "consumption",
            MeasurementDirection::Production => "production",
        }
    }
}

/// Canonical units. Wire units from the stream formats (kW, kVAr, …)
/// are converted before records are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementUnit {
    W,
    #[serde(rename = "VA")]
    Va,
    Wh,
    V,
    Wr,
}

impl MeasurementUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementUnit::W => "W",
            MeasurementUnit::Va => "VA",
            MeasurementUnit::Wh => "Wh",
            MeasurementUnit::V => "V",
            MeasurementUnit::Wr => "Wr",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "W" => Some(MeasurementUnit::W),
            "VA" => Some(MeasurementUnit::Va),
            "Wh" => Some(MeasurementUnit::Wh),
            "V" => Some(MeasurementUnit::V),
            "Wr" => Some(MeasurementUnit::Wr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementQuantity {
    Power,
    Energy,
    Voltage,
}

impl MeasurementQuantity {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeasurementQuantity::Power => "power",
            MeasurementQuantity::Energy => "energy",
            MeasurementQuantity::Voltage => "voltage",
        }
    }
}

/// ISO-8601 duration like `PT30M` or `P1D`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SamplingInterval(pub String);

impl SamplingInterval {
    pub fn new<S: Into<String>>(value: S) -> Self {
        SamplingInterval(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Minute count for the sub-daily `PTnM` form, `None` otherwise.
    pub fn minutes(&self) -> Option<u32> {
        self.0
            .strip_prefix("PT")
            .and_then(|rest| rest.strip_suffix('M'))
            .and_then(|digits| digits.parse().ok())
    }
}

/// Known load-curve recording steps, keyed by minutes.
pub const LOAD_CURVE_STEPS_MINUTES: [u32; 4] = [5, 10, 15, 30];

pub fn load_curve_sampling_interval(minutes: u32) -> Option<SamplingInterval> {
    if LOAD_CURVE_STEPS_MINUTES.contains(&minutes) {
        Some(SamplingInterval(format!("PT{minutes}M")))
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Measurement {
    pub name: String,
    pub direction: MeasurementDirection,
    pub quantity: MeasurementQuantity,
    pub unit: MeasurementUnit,
    #[serde(rename = "sampling-interval")]
    pub sampling_interval: SamplingInterval,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Metadata {
    pub device: Device,
    pub measurement: Measurement,
}
