//! SOAP client for the SGE bus.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use reqwest::header::CONTENT_TYPE;
use tracing::info;

use gridlink_core::config::{SgeConfig, SgeEnvironment};
use gridlink_core::metadata::SamplingInterval;
use gridlink_core::record::{Data, Record};
use gridlink_core::{identifier, DSO_TZ};

use crate::error::SgeError;
use crate::types::{
    measurement_spec, order_params, order_sampling_step, SubscribeRequest, TechnicalData,
};
use crate::xml::{element, soap_envelope, XmlNode};

const PRODUCTION_BASE_URL: &str = "https://sge-b2b.enedis.fr";
const HOMOLOGATION_BASE_URL: &str = "https://sge-homologation-b2b.enedis.fr";

const HISTORY_PATH: &str = "/ConsultationMesuresDetaillees/v3.0";
const TECHNICAL_DATA_PATH: &str = "/ConsultationDonneesTechniquesContractuelles/v1.0";
const SUBSCRIBE_PATH: &str = "/CommandeCollectePublicationMesures/v3.0";
const UNSUBSCRIBE_PATH: &str = "/CommandeArretServiceSouscritMesures/v1.0";

#[derive(Debug)]
pub struct SgeClient {
    http: reqwest::Client,
    login: String,
    contract_id: String,
    base_url: String,
}

impl SgeClient {
    pub fn new(config: &SgeConfig) -> Result<Self, SgeError> {
        let certificate = std::fs::read(&config.certificate).map_err(|e| {
            SgeError::transport(format!("{}: {e}", config.certificate.display()))
        })?;
        let private_key = std::fs::read(&config.private_key).map_err(|e| {
            SgeError::transport(format!("{}: {e}", config.private_key.display()))
        })?;
        let identity = reqwest::Identity::from_pkcs8_pem(&certificate, &private_key)
            .map_err(|e| SgeError::transport(format!("client certificate: {e}")))?;

        let http = reqwest::Client::builder()
            .identity(identity)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| SgeError::transport(e.to_string()))?;

        let base_url = match config.environment {
            SgeEnvironment::Production => PRODUCTION_BASE_URL,
            SgeEnvironment::Homologation => HOMOLOGATION_BASE_URL,
        };

        Ok(SgeClient {
            http,
            login: config.login.clone(),
            contract_id: config.contract_id.clone(),
            base_url: base_url.to_string(),
        })
    }

    /// Test constructor pointing at an arbitrary endpoint, without a
    /// client certificate.
    pub fn with_base_url(login: &str, contract_id: &str, base_url: &str) -> Self {
        SgeClient {
            http: reqwest::Client::new(),
            login: login.to_string(),
            contract_id: contract_id.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_soap(&self, path: &str, body: String) -> Result<XmlNode, SgeError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(soap_envelope(&body))
            .send()
            .await
            .map_err(|e| SgeError::transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SgeError::transport(e.to_string()))?;

        // Faults come back on error statuses, but some front-ends
        // answer 200 with a fault body; check both ways.
        if let Ok(doc) = XmlNode::parse(&text) {
            if let Some(error) = fault_to_error(&doc) {
                return Err(error);
            }
            if status.is_success() {
                return Ok(doc);
            }
        }
        Err(SgeError::http(
            status.as_u16(),
            status.canonical_reason().unwrap_or("HTTP error"),
        ))
    }

    /// Detailed-measurements history for one series.
    ///
    /// The bus works in whole civil days; `start` and `end` are
    /// reduced to dates in its time zone before the call.
    pub async fn history(
        &self,
        series_name: &str,
        usage_point_id: &str,
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Data, SgeError> {
        let spec = measurement_spec(series_name).ok_or_else(|| {
            SgeError::transport(format!("{series_name} measurement is not known"))
        })?;

        let start_date = start.with_timezone(&DSO_TZ).date_naive();
        let end_date = end.with_timezone(&DSO_TZ).date_naive();
        info!(usage_point_id, series_name, %start_date, %end_date, "Fetching history");

        let mut body = String::new();
        body.push_str(&element("initiateurLogin", &self.login));
        body.push_str(&element("pointId", usage_point_id));
        body.push_str(&element("mesuresTypeCode", spec.type_code));
        body.push_str(&element("grandeurPhysique", spec.quantity_code));
        body.push_str(&element("dateDebut", &start_date.to_string()));
        body.push_str(&element("dateFin", &end_date.to_string()));
        body.push_str(&element("mesuresCorrigees", bool_str(spec.corrected)));
        body.push_str(&element("sens", spec.flow_direction()));
        body.push_str(&element("cadreAcces", "ACCORD_CLIENT"));
        let request = format!(
            r#"<v3:consulterMesuresDetailleesV3 xmlns:v3="http://www.enedis.fr/sge/b2b/services/consultationmesuresdetaillees/v3.0"><demande>{body}</demande></v3:consulterMesuresDetailleesV3>"#
        );

        let doc = self.post_soap(HISTORY_PATH, request).await?;

        let grandeur = doc
            .find("grandeur")
            .ok_or_else(|| SgeError::transport("response carries no grandeur element"))?;
        let unit = grandeur
            .child_text("unite")
            .ok_or_else(|| SgeError::transport("response carries no unit"))?;

        let mut points = Vec::new();
        grandeur.find_all("points", &mut points);

        let sampling_interval = match spec.type_code {
            "COURBE" => {
                let declared = points
                    .first()
                    .and_then(|p| p.child_text("p"))
                    .ok_or_else(|| SgeError::transport("load curve without sampling step"))?;
                SamplingInterval::new(declared)
            }
            _ => SamplingInterval::new("P1D"),
        };

        // Load curves are stamped by the bus at the end of each
        // period; records are stamped at the beginning.
        let time_offset = match sampling_interval.minutes() {
            Some(minutes) => Duration::minutes(i64::from(minutes)),
            None if sampling_interval.as_str() == "P1D" => Duration::zero(),
            None => {
                return Err(SgeError::transport(format!(
                    "unexpected time period: {}",
                    sampling_interval.as_str()
                )))
            }
        };

        let metadata = spec.metadata(usage_point_id, sampling_interval);
        if unit != metadata.measurement.unit.as_str() {
            return Err(SgeError::transport(format!(
                "unit {unit} != {} expected",
                metadata.measurement.unit.as_str()
            )));
        }

        let name = identifier::record_name(usage_point_id, series_name);
        let mut records = Vec::with_capacity(points.len());
        for point in points {
            let value: i64 = point
                .child_text("v")
                .and_then(|v| v.parse().ok())
                .ok_or_else(|| SgeError::transport("measurement point without value"))?;
            let stamp = point
                .child_text("d")
                .ok_or_else(|| SgeError::transport("measurement point without date"))?;
            let time = parse_civil_datetime(stamp)? - time_offset;
            records.push(Record::new(
                name.clone(),
                time,
                metadata.measurement.unit,
                value,
            ));
        }

        Ok(Data::new(metadata, records))
    }

    pub async fn technical_data(&self, usage_point_id: &str) -> Result<TechnicalData, SgeError> {
        let mut body = String::new();
        body.push_str(&element("pointId", usage_point_id));
        body.push_str(&element("loginUtilisateur", &self.login));
        body.push_str(&element("autorisationClient", "true"));
        let request = format!(
            r#"<v1:consulterDonneesTechniquesContractuelles xmlns:v1="http://www.enedis.fr/sge/b2b/services/consultationdonneestechniquescontractuelles/v1.0">{body}</v1:consulterDonneesTechniquesContractuelles>"#
        );

        let doc = self.post_soap(TECHNICAL_DATA_PATH, request).await?;

        let segment = doc
            .find("segment")
            .and_then(|s| s.child_text("libelle"))
            .map(str::to_string);
        let service_level = doc
            .find("niveauOuvertureServices")
            .and_then(|n| n.text.parse().ok());

        Ok(TechnicalData {
            segment,
            service_level,
        })
    }

    /// Place one collection order. Returns the order id the bus
    /// assigns, needed to cancel it later.
    pub async fn subscribe(&self, request: &SubscribeRequest) -> Result<i32, SgeError> {
        let params = order_params(request.call_type);
        info!(
            usage_point_id = %request.usage_point_id,
            call_type = ?request.call_type,
            "Placing collection order"
        );

        let consent_declaration = if request.issuer_is_company {
            format!(
                "{}<personneMorale>{}</personneMorale>",
                element("accord", "true"),
                element("denominationSociale", &request.issuer_name)
            )
        } else {
            format!(
                "{}<personnePhysique>{}</personnePhysique>",
                element("accord", "true"),
                element("nom", &request.issuer_name)
            )
        };

        // The bus rejects requests whose access parameters are not in
        // schema order.
        let mut access = String::new();
        access.push_str(&element(
            "dateDebut",
            &Utc::now().with_timezone(&DSO_TZ).date_naive().to_string(),
        ));
        access.push_str(&element(
            "dateFin",
            &request
                .expires_at
                .with_timezone(&DSO_TZ)
                .date_naive()
                .to_string(),
        ));
        access.push_str(&format!(
            "<declarationAccordClient>{consent_declaration}</declarationAccordClient>"
        ));
        access.push_str(&element("mesuresTypeCode", params.type_code));
        access.push_str(&element("soutirage", bool_str(params.withdrawal)));
        access.push_str(&element("injection", bool_str(params.injection)));
        access.push_str(&element(
            "mesuresPas",
            order_sampling_step(&params, request.is_linky),
        ));
        access.push_str(&element("mesuresCorrigees", bool_str(params.corrected)));
        access.push_str(&element(
            "transmissionRecurrente",
            bool_str(params.recurrent),
        ));
        access.push_str(&element("periodiciteTransmission", "P1D"));

        let general = format!(
            "{}{}{}{}",
            element("objetCode", "AME"),
            element("pointId", &request.usage_point_id),
            element("initiateurLogin", &self.login),
            element("contratId", &self.contract_id),
        );

        let soap_request = format!(
            r#"<v3:commanderCollectePublicationMesures xmlns:v3="http://www.enedis.fr/sge/b2b/services/commandecollectepublicationmesures/v3.0"><demande><donneesGenerales>{general}</donneesGenerales><accesMesures>{access}</accesMesures></demande></v3:commanderCollectePublicationMesures>"#
        );

        let doc = self.post_soap(SUBSCRIBE_PATH, soap_request).await?;

        doc.find("serviceSouscritId")
            .and_then(|n| n.text.parse().ok())
            .ok_or_else(|| SgeError::transport("response carries no serviceSouscritId"))
    }

    /// Cancel a collection order previously placed for the usage
    /// point.
    pub async fn unsubscribe(&self, usage_point_id: &str, call_id: i32) -> Result<(), SgeError> {
        info!(usage_point_id, call_id, "Cancelling collection order");
        let general = format!(
            "{}{}{}{}",
            element("objetCode", "ASS"),
            element("pointId", usage_point_id),
            element("initiateurLogin", &self.login),
            element("contratId", &self.contract_id),
        );
        let request = format!(
            r#"<v1:commanderArretServiceSouscritMesures xmlns:v1="http://www.enedis.fr/sge/b2b/services/commandearretservicesouscritmesures/v1.0"><demande><donneesGenerales>{general}</donneesGenerales><arretServiceSouscrit>{}</arretServiceSouscrit></demande></v1:commanderArretServiceSouscritMesures>"#,
            element("serviceSouscritId", &call_id.to_string())
        );

        self.post_soap(UNSUBSCRIBE_PATH, request).await?;
        Ok(())
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Normalize a SOAP fault into an [`SgeError`]. The bus nests its
/// result element (with the vendor code) inside the fault detail;
/// `faultstring` is the fallback.
pub(crate) fn fault_to_error(doc: &XmlNode) -> Option<SgeError> {
    let fault = doc.find("Fault")?;
    if let Some(resultat) = fault.find("resultat") {
        return Some(SgeError::new(
            resultat.text.clone(),
            resultat.attr("code").map(str::to_string),
        ));
    }
    let message = fault
        .child_text("faultstring")
        .unwrap_or("unspecified SOAP fault");
    Some(SgeError::new(message, None))
}

/// Parse the bus' civil timestamps (no zone marker, Paris time) into
/// an offset-bearing instant.
pub(crate) fn parse_civil_datetime(value: &str) -> Result<DateTime<FixedOffset>, SgeError> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .map(|date| NaiveDateTime::new(date, NaiveTime::MIN))
        })
        .map_err(|e| SgeError::transport(format!("unexpected timestamp {value}: {e}")))?;
    DSO_TZ
        .from_local_datetime(&naive)
        .earliest()
        .map(|t| t.fixed_offset())
        .ok_or_else(|| SgeError::transport(format!("nonexistent local time {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FAULT: &str = r#"<?xml version="1.0"?>
        <soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/">
          <soapenv:Body>
            <soapenv:Fault>
              <faultcode>soapenv:Server</faultcode>
              <faultstring>Une erreur fonctionnelle est survenue</faultstring>
              <detail>
                <erreur>
                  <resultat code="SGT570">Le service demandé est déjà actif sur la période demandée.</resultat>
                </erreur>
              </detail>
            </soapenv:Fault>
          </soapenv:Body>
        </soapenv:Envelope>"#;

    #[test]
    fn normalizes_soap_fault_with_vendor_code() {
        let doc = XmlNode::parse(FAULT).unwrap();
        let error = fault_to_error(&doc).unwrap();
        assert_eq!(error.code.as_deref(), Some("SGT570"));
        assert!(error.is_already_active());
        assert!(error.message.contains("déjà actif"));
    }

    #[test]
    fn falls_back_to_faultstring() {
        let doc = XmlNode::parse(
            r#"<Envelope><Body><Fault><faultcode>Server</faultcode><faultstring>boom</faultstring></Fault></Body></Envelope>"#,
        )
        .unwrap();
        let error = fault_to_error(&doc).unwrap();
        assert_eq!(error.code, None);
        assert_eq!(error.message, "boom");
    }

    #[test]
    fn no_fault_in_regular_response() {
        let doc = XmlNode::parse(r#"<Envelope><Body><reponse/></Body></Envelope>"#).unwrap();
        assert!(fault_to_error(&doc).is_none());
    }

    #[test]
    fn civil_datetime_carries_paris_offset() {
        let summer = parse_civil_datetime("2020-06-01T00:30:00").unwrap();
        assert_eq!(summer.to_rfc3339(), "2020-06-01T00:30:00+02:00");
        let winter = parse_civil_datetime("2020-01-15 08:00:00").unwrap();
        assert_eq!(winter.to_rfc3339(), "2020-01-15T08:00:00+01:00");
        let date_only = parse_civil_datetime("2020-01-15").unwrap();
        assert_eq!(date_only.to_rfc3339(), "2020-01-15T00:00:00+01:00");
    }
}
