//! Verdict → alert classification

use crate::alert_buffer::{Alert, Severity};
use crate::analysis_client::{AnalysisResult, CobotStatus, MachineStatus, PpeStatus, Verdict};
use chrono::Utc;

/// Alert for an unsafe verdict, `None` for a safe one
pub fn classify(result: &AnalysisResult, camera_id: Option<&str>) -> Option<Alert> {
    let (severity, message) = match &result.verdict {
        Verdict::Cobot {
            status: CobotStatus::SlowDown,
            ..
        } => (Severity::Warning, "Human detected near cobot".to_string()),
        Verdict::Machine {
            status: MachineStatus::Stop,
            hazard_level,
        } => (
            Severity::Error,
            format!("Machine hazard detected (level: {:.2})", hazard_level),
        ),
        Verdict::Ppe {
            status: PpeStatus::Alert,
            missing_ppe,
        } => (
            Severity::Warning,
            format!("Missing PPE: {}", missing_ppe.join(", ")),
        ),
        Verdict::Cobot { .. } | Verdict::Machine { .. } | Verdict::Ppe { .. } => return None,
    };

    Some(Alert {
        alert_type: result.camera_type(),
        camera_id: camera_id.map(str::to_string),
        message,
        timestamp: Utc::now(),
        severity,
    })
}
