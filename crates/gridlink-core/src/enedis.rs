//! Metadata constructors for measurements published from Enedis data.
//!
//! Each function pins the canonical unit and quantity for one series
//! family; the sampling interval varies for load curves and is fixed
//! at one day for indexes and daily maxima.

use crate::metadata::{
    Device, DeviceIdentifier, DeviceType, Measurement, MeasurementDirection,
    MeasurementQuantity, MeasurementUnit, Metadata, SamplingInterval,
};

fn meter(prm: &str) -> Device {
    Device {
        kind: DeviceType::ElectricityMeter,
        identifier: DeviceIdentifier {
            authority: "enedis".to_string(),
            kind: "prm".to_string(),
            value: prm.to_string(),
        },
    }
}

fn metadata(
    prm: &str,
    name: &str,
    direction: MeasurementDirection,
    quantity: MeasurementQuantity,
    unit: MeasurementUnit,
    sampling_interval: SamplingInterval,
) -> Metadata {
    Metadata {
        device: meter(prm),
        measurement: Measurement {
            name: name.to_string(),
            direction,
            quantity,
            unit,
            sampling_interval,
        },
    }
}

pub fn power_active_raw(
    prm: &str,
    direction: MeasurementDirection,
    sampling_interval: SamplingInterval,
) -> Metadata {
    metadata(
        prm,
        "active-power",
        direction,
        MeasurementQuantity::Power,
        MeasurementUnit::W,
        sampling_interval,
    )
}

pub fn power_capacitive_raw(prm: &str, sampling_interval: SamplingInterval) -> Metadata {
    metadata(
        prm,
        "capacitive-power",
        MeasurementDirection::Consumption,
        MeasurementQuantity::Power,
        MeasurementUnit::Wr,
        sampling_interval,
    )
}

pub fn power_inductive_raw(prm: &str, sampling_interval: SamplingInterval) -> Metadata {
    metadata(
        prm,
        "inductive-power",
        MeasurementDirection::Consumption,
        MeasurementQuantity::Power,
        MeasurementUnit::Wr,
        sampling_interval,
    )
}

pub fn voltage_raw(prm: &str, sampling_interval: SamplingInterval) -> Metadata {
    metadata(
        prm,
        "voltage",
        MeasurementDirection::Consumption,
        MeasurementQuantity::Voltage,
        MeasurementUnit::V,
        sampling_interval,
    )
}

/// Daily maximum of apparent power.
pub fn power_apparent_max(prm: &str) -> Metadata {
    metadata(
        prm,
        "apparent-power",
        MeasurementDirection::Consumption,
        MeasurementQuantity::Power,
        MeasurementUnit::Va,
        SamplingInterval::new("P1D"),
    )
}

/// Some meters report their daily maximum as true power in W instead
/// of apparent power; a given usage point uses exactly one variant.
pub fn power_active_max(prm: &str) -> Metadata {
    metadata(
        prm,
        "active-power",
        MeasurementDirection::Consumption,
        MeasurementQuantity::Power,
        MeasurementUnit::W,
        SamplingInterval::new("P1D"),
    )
}

pub fn energy_active_index(prm: &str, direction: MeasurementDirection) -> Metadata {
    metadata(
        prm,
        "active-energy-index",
        direction,
        MeasurementQuantity::Energy,
        MeasurementUnit::Wh,
        SamplingInterval::new("P1D"),
    )
}

pub fn energy_active_daily(prm: &str, direction: MeasurementDirection) -> Metadata {
    metadata(
        prm,
        "active-energy",
        direction,
        MeasurementQuantity::Energy,
        MeasurementUnit::Wh,
        SamplingInterval::new("P1D"),
    )
}
