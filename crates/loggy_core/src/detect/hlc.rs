use std::collections::BTreeMap;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{evidence, Detector};

/// ISO-15118 high-level-communication result codes, as emitted by the HLC
/// stack. Severity is per code: protocol sequence noise is LOW, anything that
/// ends a charge loop is MEDIUM/HIGH.
const HLC_ERROR_CODES: &[(&str, IssueSeverity, &str)] = &[
    ("FAILED_SequenceError", IssueSeverity::Low, "V2G message out of sequence"),
    ("FAILED_ServiceIDInvalid", IssueSeverity::Low, "Vehicle requested an unknown service"),
    ("FAILED_UnknownSession", IssueSeverity::Medium, "Session identifier not recognised"),
    ("FAILED_ServiceSelectionInvalid", IssueSeverity::Low, "Invalid service selection"),
    ("FAILED_PaymentSelectionInvalid", IssueSeverity::Medium, "Payment option rejected"),
    ("FAILED_CertificateExpired", IssueSeverity::High, "Vehicle contract certificate expired"),
    ("FAILED_SignatureError", IssueSeverity::High, "Message signature verification failed"),
    ("FAILED_NoCertificateAvailable", IssueSeverity::High, "No contract certificate installed"),
    ("FAILED_CertChainError", IssueSeverity::High, "Certificate chain validation failed"),
    ("FAILED_ChallengeInvalid", IssueSeverity::Medium, "Authorization challenge failed"),
    ("FAILED_ContractCanceled", IssueSeverity::Medium, "Contract cancelled by secondary actor"),
    ("FAILED_WrongChargeParameter", IssueSeverity::Medium, "Charge parameter discovery rejected"),
    ("FAILED_PowerDeliveryNotApplied", IssueSeverity::High, "PowerDelivery request not applied"),
    ("FAILED_TariffSelectionInvalid", IssueSeverity::Low, "Tariff selection invalid"),
    ("FAILED_ChargingProfileInvalid", IssueSeverity::Medium, "Charging profile rejected"),
    ("FAILED_MeteringSignatureNotValid", IssueSeverity::High, "Metering receipt signature invalid"),
    ("FAILED_NoChargeServiceSelected", IssueSeverity::Low, "No charge service selected"),
    ("FAILED_WrongEnergyTransferMode", IssueSeverity::Medium, "Energy transfer mode mismatch"),
    ("FAILED_ContactorError", IssueSeverity::High, "Contactor error during charge loop"),
    ("FAILED_CertificateNotAllowedAtThisEVSE", IssueSeverity::Medium, "Certificate not allowed at this EVSE"),
    ("FAILED_CertificateRevoked", IssueSeverity::High, "Contract certificate revoked"),
    ("FAILED_EVSEPresentVoltageToLow", IssueSeverity::High, "Present voltage below vehicle minimum"),
    ("FAILED_EVSEShutdown", IssueSeverity::Medium, "EVSE shut down during energy transfer"),
    ("FAILED_ChargingCurrentdifferential", IssueSeverity::Medium, "Charging current differential fault"),
    ("FAILED_VoltageOutOfRange", IssueSeverity::High, "Voltage out of negotiated range"),
    ("FAILED_TimeOut", IssueSeverity::Medium, "V2G message timeout"),
    ("FAILED_EmergencyShutdown", IssueSeverity::High, "Vehicle requested emergency shutdown"),
    ("FAILED_CableCheckFailed", IssueSeverity::High, "DC cable check failed"),
    ("FAILED_PreChargeFailed", IssueSeverity::High, "DC pre-charge phase failed"),
    ("FAILED_CurrentDemandFailed", IssueSeverity::High, "Current demand loop failed"),
    ("FAILED_WeldingDetectionFailed", IssueSeverity::High, "Welding detection failed"),
    ("FAILED_SessionStopFailed", IssueSeverity::Medium, "Session stop handshake failed"),
    ("FAILED_AssociationError", IssueSeverity::Medium, "PLC link association failed"),
    ("FAILED_SLACTimeout", IssueSeverity::Medium, "SLAC matching timed out"),
    ("FAILED_SDPTimeout", IssueSeverity::Low, "SECC discovery timed out"),
    ("FAILED_TLSSetupFailed", IssueSeverity::High, "TLS setup for V2G channel failed"),
];

/// V2G/ISO-15118 high-level communication error scan.
pub struct HlcErrorCodeDetector;

impl HlcErrorCodeDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self)
    }
}

impl Detector for HlcErrorCodeDetector {
    fn name(&self) -> &'static str {
        "hlc"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let mut total = 0i64;
        let mut per_code: BTreeMap<&str, (IssueSeverity, &str, Vec<&crate::domain::LogRecord>)> =
            BTreeMap::new();

        for rec in store.records() {
            for &(code, severity, description) in HLC_ERROR_CODES {
                if rec.message.contains(code) {
                    total += 1;
                    per_code
                        .entry(code)
                        .or_insert_with(|| (severity, description, Vec::new()))
                        .2
                        .push(rec);
                    sink.push_timeline(
                        rec.timestamp.clone(),
                        Severity::Error,
                        "hlc",
                        rec.message.clone(),
                    );
                    break;
                }
            }
        }

        sink.set_int("hlc_error_count", total);
        sink.set_int("hlc_distinct_code_count", per_code.len() as i64);

        for (code, (severity, description, records)) in &per_code {
            sink.push_issue(
                *severity,
                "hlc",
                format!("HLC error: {code}"),
                format!("{description}; seen {} time(s).", records.len()),
                evidence(records),
            );
        }
        Ok(())
    }
}
