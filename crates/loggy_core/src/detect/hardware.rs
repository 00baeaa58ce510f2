use regex::Regex;

use crate::domain::{IssueSeverity, Severity};
use crate::error::AppError;
use crate::registry::AnalysisSink;
use crate::store::EventStore;

use super::{compile, evidence, Detector};

/// Secure-element and certificate hardware: TPM failures, certificate load
/// errors, secure boot complaints.
pub struct SecurityHardwareDetector {
    re_tpm: Regex,
    re_cert: Regex,
    re_secure_boot: Regex,
}

impl SecurityHardwareDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_tpm: compile(
                "security_hw",
                r"tpm.*(error|fail|not (found|available)|selftest failed|0x[0-9a-f]+)",
            )?,
            re_cert: compile(
                "security_hw",
                r"certificat.*(load(ing)? failed|not found|expired|corrupt|invalid)",
            )?,
            re_secure_boot: compile("security_hw", r"secure ?boot.*(fail|violation|invalid)")?,
        })
    }
}

impl Detector for SecurityHardwareDetector {
    fn name(&self) -> &'static str {
        "security_hw"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let tpm = store.grep(&self.re_tpm);
        let certs = store.grep(&self.re_cert);
        let sboot = store.grep(&self.re_secure_boot);

        sink.set_int("tpm_error_count", tpm.len() as i64);
        sink.set_int("cert_error_count", certs.len() as i64);
        sink.set_int("secure_boot_error_count", sboot.len() as i64);

        for rec in tpm.iter().chain(&sboot) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Error,
                "security",
                rec.message.clone(),
            );
        }

        if !tpm.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "security",
                "TPM errors",
                format!(
                    "{} TPM error(s); TLS and attestation paths will fail until resolved.",
                    tpm.len()
                ),
                evidence(&tpm),
            );
        }
        if !certs.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "security",
                "Certificate load failures",
                format!("{} certificate error(s).", certs.len()),
                evidence(&certs),
            );
        }
        if !sboot.is_empty() {
            sink.push_issue(
                IssueSeverity::Critical,
                "security",
                "Secure boot violation",
                format!("{} secure boot failure(s); firmware integrity is suspect.", sboot.len()),
                evidence(&sboot),
            );
        }
        Ok(())
    }
}

/// Flash/filesystem health: eMMC wear reports, I/O errors, read-only
/// remounts.
pub struct StorageHealthDetector {
    re_emmc: Regex,
    re_io: Regex,
    re_readonly: Regex,
    re_fs_corrupt: Regex,
}

impl StorageHealthDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_emmc: compile(
                "storage",
                r"(emmc|mmcblk).*(life ?time|wear|eol|pre[- ]?eol|reserved blocks).*(8[0-9]|9[0-9]|100|exceeded|warning)",
            )?,
            re_io: compile("storage", r"(i/o error|blk_update_request|buffer i/o error)")?,
            re_readonly: compile(
                "storage",
                r"remount(ed|ing)?.*read-?only|read-?only file ?system",
            )?,
            re_fs_corrupt: compile(
                "storage",
                r"(ext4|f2fs|ubifs).*(corrupt|error|bad (block|inode))|fsck.*(error|forced)",
            )?,
        })
    }
}

impl Detector for StorageHealthDetector {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let emmc = store.grep(&self.re_emmc);
        let io = store.grep(&self.re_io);
        let readonly = store.grep(&self.re_readonly);
        let corrupt = store.grep(&self.re_fs_corrupt);

        sink.set_int("emmc_wear_warning_count", emmc.len() as i64);
        sink.set_int("disk_io_error_count", io.len() as i64);
        sink.set_int("fs_readonly_count", readonly.len() as i64);
        sink.set_int("fs_corruption_count", corrupt.len() as i64);

        for rec in readonly.iter().chain(&corrupt) {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Critical,
                "storage",
                rec.message.clone(),
            );
        }

        if !readonly.is_empty() {
            // Once root goes read-only nothing persists: no transactions, no
            // config changes, often no further logs.
            sink.push_issue(
                IssueSeverity::Critical,
                "storage",
                "Filesystem remounted read-only",
                format!("{} read-only remount event(s).", readonly.len()),
                evidence(&readonly),
            );
        }
        if !emmc.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "storage",
                "eMMC wear approaching end of life",
                format!("{} eMMC lifetime warning(s); plan a board or module swap.", emmc.len()),
                evidence(&emmc),
            );
        }
        if !corrupt.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "storage",
                "Filesystem corruption reported",
                format!("{} filesystem corruption message(s).", corrupt.len()),
                evidence(&corrupt),
            );
        }
        if io.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "storage",
                "Repeated disk I/O errors",
                format!("{} block-layer I/O error(s).", io.len()),
                evidence(&io),
            );
        }
        Ok(())
    }
}

/// Thermal state: derating and critical over-temperature.
pub struct ThermalDetector {
    re_derate: Regex,
    re_critical: Regex,
}

impl ThermalDetector {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self {
            re_derate: compile(
                "thermal",
                r"(thermal|temperature).*(derat|throttl|reduc(ed|ing) (power|current))",
            )?,
            re_critical: compile(
                "thermal",
                r"(over[- ]?temperature|temperature.*(critical|exceeded|shutdown))",
            )?,
        })
    }
}

impl Detector for ThermalDetector {
    fn name(&self) -> &'static str {
        "thermal"
    }

    fn run(&self, store: &EventStore, sink: &mut AnalysisSink) -> Result<(), AppError> {
        let derates = store.grep(&self.re_derate);
        let critical = store.grep(&self.re_critical);

        sink.set_int("thermal_derate_count", derates.len() as i64);
        sink.set_int("thermal_critical_count", critical.len() as i64);

        for rec in &critical {
            sink.push_timeline(
                rec.timestamp.clone(),
                Severity::Critical,
                "thermal",
                rec.message.clone(),
            );
        }

        if !critical.is_empty() {
            sink.push_issue(
                IssueSeverity::High,
                "thermal",
                "Critical over-temperature events",
                format!(
                    "{} critical temperature event(s); check fans, filters and enclosure airflow.",
                    critical.len()
                ),
                evidence(&critical),
            );
        }
        if derates.len() >= 3 {
            sink.push_issue(
                IssueSeverity::Medium,
                "thermal",
                "Recurring thermal derating",
                format!("{} derating event(s); sustained output is reduced.", derates.len()),
                evidence(&derates),
            );
        }
        Ok(())
    }
}
