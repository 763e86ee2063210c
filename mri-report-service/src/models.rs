use serde::{Deserialize, Serialize};
use std::fmt;

/// Diagnosis slot value when captioning did not occur or failed.
pub const FALLBACK_DIAGNOSIS: &str = "No diagnosis available";

/// Context keys shared between the orchestrator and the service layer.
pub mod session_keys {
    pub const PATIENT_FORM: &str = "patient_form";
    pub const REPORT: &str = "report";
    pub const ANALYZED: &str = "analyzed";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Gender {
    #[default]
    Male,
    Female,
    Other,
}

impl Gender {
    /// Unrecognized or missing values resolve to the first option.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("Male") => Gender::Male,
            Some("Female") => Gender::Female,
            Some("Other") => Gender::Other,
            _ => Gender::Male,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Patient details captured by the report form. Held in the session context
/// across re-renders and replaced wholesale by the next submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatientForm {
    pub name: String,
    pub gender: Gender,
    pub age: String,
    pub blood_group: String,
    pub height: String,
    pub weight: String,
    pub phone: String,
    pub doctor: String,
    pub radiologist: String,
    pub image_base64: Option<String>,
    pub stem: String,
}

/// The rendered report cached in the session: document bytes, identity, the
/// text reconstructed from it, and where the archived copy lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportArtifact {
    pub filename: String,
    pub pdf_base64: String,
    pub extracted_text: String,
    pub pdf_url: String,
}

/// State of the analysis protocol, derived from the session context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    NoReport,
    ReportReady,
    Analyzed,
}

impl ReportState {
    pub fn derive(has_report: bool, analyzed: bool) -> Self {
        match (has_report, analyzed) {
            (false, _) => ReportState::NoReport,
            (true, false) => ReportState::ReportReady,
            (true, true) => ReportState::Analyzed,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportRequest {
    pub session_id: String,
    pub name: String,
    pub gender: Option<String>,
    #[serde(default)]
    pub age: String,
    #[serde(default)]
    pub blood_group: String,
    #[serde(default)]
    pub height: String,
    #[serde(default)]
    pub weight: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub doctor: String,
    #[serde(default)]
    pub radiologist: String,
    pub image_base64: Option<String>,
    pub stem: Option<String>,
}

impl GenerateReportRequest {
    pub fn into_form(self) -> PatientForm {
        PatientForm {
            name: self.name,
            gender: Gender::parse(self.gender.as_deref()),
            age: self.age,
            blood_group: self.blood_group,
            height: self.height,
            weight: self.weight,
            phone: self.phone,
            doctor: self.doctor,
            radiologist: self.radiologist,
            image_base64: self.image_base64,
            stem: self.stem.unwrap_or_else(|| "report".to_string()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateReportResponse {
    pub filename: String,
    pub pdf_url: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LogoutRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatEnterRequest {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatQueryRequest {
    pub session_id: String,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub session_id: String,
    pub user_id: String,
    pub state: ReportState,
    pub filename: Option<String>,
    pub pdf_url: Option<String>,
    pub chat_turns: usize,
    pub form: Option<PatientForm>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gender_defaults_to_first_option() {
        assert_eq!(Gender::parse(None), Gender::Male);
        assert_eq!(Gender::parse(Some("")), Gender::Male);
        assert_eq!(Gender::parse(Some("unknown")), Gender::Male);
        assert_eq!(Gender::parse(Some("female")), Gender::Male);
    }

    #[test]
    fn gender_recognizes_enumerated_values() {
        assert_eq!(Gender::parse(Some("Male")), Gender::Male);
        assert_eq!(Gender::parse(Some("Female")), Gender::Female);
        assert_eq!(Gender::parse(Some("Other")), Gender::Other);
    }

    #[test]
    fn report_state_derivation() {
        assert_eq!(ReportState::derive(false, false), ReportState::NoReport);
        assert_eq!(ReportState::derive(false, true), ReportState::NoReport);
        assert_eq!(ReportState::derive(true, false), ReportState::ReportReady);
        assert_eq!(ReportState::derive(true, true), ReportState::Analyzed);
    }

    #[test]
    fn request_form_defaults() {
        let request = GenerateReportRequest {
            session_id: "s1".to_string(),
            name: "Jane Doe".to_string(),
            gender: Some("".to_string()),
            age: "34".to_string(),
            blood_group: String::new(),
            height: String::new(),
            weight: String::new(),
            phone: String::new(),
            doctor: String::new(),
            radiologist: String::new(),
            image_base64: None,
            stem: None,
        };

        let form = request.into_form();
        assert_eq!(form.gender, Gender::Male);
        assert_eq!(form.stem, "report");
    }
}
