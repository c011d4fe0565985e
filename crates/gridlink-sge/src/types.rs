//! Request/response types and the measurement catalog of the
//! detailed-measurements service.

use chrono::DateTime;
use chrono::FixedOffset;
use gridlink_core::enedis;
use gridlink_core::metadata::{MeasurementDirection, Metadata, SamplingInterval};
use gridlink_db::SubscriptionCallType;

/// Upstream service identifiers, recorded verbatim on audit rows.
pub const DETAILED_MEASUREMENTS_SERVICE: &str = "ConsultationMesuresDetaillees-v3.0";
pub const TECHNICAL_DATA_SERVICE: &str = "ConsultationDonneesTechniquesContractuelles-v1.0";
pub const SUBSCRIBE_SERVICE: &str = "CommandeCollectePublicationMesures-v3.0";
pub const UNSUBSCRIBE_SERVICE: &str = "CommandeArretServiceSouscritMesures-v1.0";

/// How one series maps onto the detailed-measurements request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementSpec {
    pub series_name: &'static str,
    /// `COURBE` for load curves, `ENERGIE` for daily energy.
    pub type_code: &'static str,
    /// Physical quantity code, e.g. `PA` or `EA`.
    pub quantity_code: &'static str,
    pub corrected: bool,
    pub direction: MeasurementDirection,
}

impl MeasurementSpec {
    /// `SOUTIRAGE` or `INJECTION`.
    pub fn flow_direction(&self) -> &'static str {
        match self.direction {
            MeasurementDirection::Consumption => "SOUTIRAGE",
            MeasurementDirection::Production => "INJECTION",
        }
    }

    /// Metadata describing records of this series. Load curves carry
    /// the sampling interval reported by the bus; daily energy is
    /// fixed at one day.
    pub fn metadata(&self, usage_point_id: &str, sampling_interval: SamplingInterval) -> Metadata {
        match self.type_code {
            "COURBE" => enedis::power_active_raw(usage_point_id, self.direction, sampling_interval),
            _ => enedis::energy_active_daily(usage_point_id, self.direction),
        }
    }
}

/// The full history catalog. Only a subset of these series is
/// subscribable; history queries accept them all.
pub const MEASUREMENTS: [MeasurementSpec; 6] = [
    MeasurementSpec {
        series_name: "consumption/power/active/raw",
        type_code: "COURBE",
        quantity_code: "PA",
        corrected: false,
        direction: MeasurementDirection::Consumption,
    },
    MeasurementSpec {
        series_name: "consumption/power/active/corrected",
        type_code: "COURBE",
        quantity_code: "PA",
        corrected: true,
        direction: MeasurementDirection::Consumption,
    },
    MeasurementSpec {
        series_name: "production/power/active/raw",
        type_code: "COURBE",
        quantity_code: "PA",
        corrected: false,
        direction: MeasurementDirection::Production,
    },
    MeasurementSpec {
        series_name: "production/power/active/corrected",
        type_code: "COURBE",
        quantity_code: "PA",
        corrected: true,
        direction: MeasurementDirection::Production,
    },
    MeasurementSpec {
        series_name: "consumption/energy/active/daily",
        type_code: "ENERGIE",
        quantity_code: "EA",
        corrected: false,
        direction: MeasurementDirection::Consumption,
    },
    MeasurementSpec {
        series_name: "production/energy/active/daily",
        type_code: "ENERGIE",
        quantity_code: "EA",
        corrected: false,
        direction: MeasurementDirection::Production,
    },
];

pub fn measurement_spec(series_name: &str) -> Option<&'static MeasurementSpec> {
    MEASUREMENTS.iter().find(|m| m.series_name == series_name)
}

/// Contractual technical data of a usage point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TechnicalData {
    pub segment: Option<String>,
    pub service_level: Option<i32>,
}

/// Inputs of one collection-order subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscribeRequest {
    pub usage_point_id: String,
    pub call_type: SubscriptionCallType,
    pub expires_at: DateTime<FixedOffset>,
    pub is_linky: bool,
    pub issuer_is_company: bool,
    pub issuer_name: String,
}

/// Per-order-kind request parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderParams {
    /// `IDX` or `CDC`.
    pub type_code: &'static str,
    pub withdrawal: bool,
    pub injection: bool,
    pub corrected: bool,
    pub recurrent: bool,
}

pub fn order_params(call_type: SubscriptionCallType) -> OrderParams {
    use SubscriptionCallType::*;
    match call_type {
        ConsumptionIdx => OrderParams {
            type_code: "IDX",
            withdrawal: true,
            injection: false,
            corrected: false,
            recurrent: true,
        },
        ConsumptionCdcRaw => OrderParams {
            type_code: "CDC",
            withdrawal: true,
            injection: false,
            corrected: false,
            recurrent: true,
        },
        ConsumptionCdcCorrected => OrderParams {
            type_code: "CDC",
            withdrawal: true,
            injection: false,
            corrected: true,
            recurrent: true,
        },
        ConsumptionCdcEnable => OrderParams {
            type_code: "CDC",
            withdrawal: true,
            injection: false,
            corrected: false,
            recurrent: false,
        },
        ProductionIdx => OrderParams {
            type_code: "IDX",
            withdrawal: false,
            injection: true,
            corrected: false,
            recurrent: true,
        },
        ProductionCdcRaw => OrderParams {
            type_code: "CDC",
            withdrawal: false,
            injection: true,
            corrected: false,
            recurrent: true,
        },
        ProductionCdcCorrected => OrderParams {
            type_code: "CDC",
            withdrawal: false,
            injection: true,
            corrected: true,
            recurrent: true,
        },
        ProductionCdcEnable => OrderParams {
            type_code: "CDC",
            withdrawal: false,
            injection: true,
            corrected: false,
            recurrent: false,
        },
    }
}

/// Sampling step for an order: daily for indexes, the meter recording
/// step for load curves (30 min on Linky-generation meters, 10 min
/// otherwise).
pub fn order_sampling_step(params: &OrderParams, is_linky: bool) -> &'static str {
    if params.type_code == "IDX" {
        "P1D"
    } else if is_linky {
        "PT30M"
    } else {
        "PT10M"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_covers_subscribable_series() {
        assert!(measurement_spec("consumption/power/active/raw").is_some());
        assert!(measurement_spec("production/energy/active/daily").is_some());
        assert!(measurement_spec("consumption/power/apparent/max").is_none());
    }

    #[test]
    fn sampling_step_selection() {
        let idx = order_params(SubscriptionCallType::ConsumptionIdx);
        assert_eq!(order_sampling_step(&idx, true), "P1D");
        assert_eq!(order_sampling_step(&idx, false), "P1D");

        let cdc = order_params(SubscriptionCallType::ConsumptionCdcRaw);
        assert_eq!(order_sampling_step(&cdc, true), "PT30M");
        assert_eq!(order_sampling_step(&cdc, false), "PT10M");
    }

    #[test]
    fn enable_orders_are_not_recurrent() {
        assert!(!order_params(SubscriptionCallType::ConsumptionCdcEnable).recurrent);
        assert!(!order_params(SubscriptionCallType::ProductionCdcEnable).recurrent);
        assert!(order_params(SubscriptionCallType::ConsumptionCdcRaw).recurrent);
    }
}
