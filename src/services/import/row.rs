//! Survey CSV row parsing
//!
//! The export header is fixed, so the column mapping is a plain serde
//! struct. Every cell is read as text and typed afterwards: blank cells
//! become `None` and non-numeric scores are dropped instead of failing.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Deserialize;

use crate::error::RowError;
use crate::types::{EmployeeProfile, SurveyAnswers};

/// One record of the survey export, as text
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SurveyCsvRow {
    #[serde(rename = "email_corporativo")]
    pub corporate_email: Option<String>,
    #[serde(rename = "nome")]
    pub name: Option<String>,
    #[serde(rename = "email")]
    pub email: Option<String>,
    #[serde(rename = "celular")]
    pub mobile_phone: Option<String>,
    #[serde(rename = "area")]
    pub department: Option<String>,
    #[serde(rename = "cargo")]
    pub position: Option<String>,
    #[serde(rename = "funcao")]
    pub function: Option<String>,
    #[serde(rename = "localidade")]
    pub location: Option<String>,
    #[serde(rename = "tempo_de_empresa")]
    pub company_tenure_months: Option<String>,
    #[serde(rename = "genero")]
    pub gender: Option<String>,
    #[serde(rename = "geracao")]
    pub generation: Option<String>,
    #[serde(rename = "n0_empresa")]
    pub n0_company: Option<String>,
    #[serde(rename = "n1_diretoria")]
    pub n1_directorate: Option<String>,
    #[serde(rename = "n2_gerencia")]
    pub n2_management: Option<String>,
    #[serde(rename = "n3_coordenacao")]
    pub n3_coordination: Option<String>,
    #[serde(rename = "n4_area")]
    pub n4_area: Option<String>,

    #[serde(rename = "Data da Resposta")]
    pub response_date: Option<String>,

    #[serde(rename = "Interesse no Cargo")]
    pub interest_in_position: Option<String>,
    #[serde(rename = "Comentários - Interesse no Cargo")]
    pub interest_in_position_comment: Option<String>,
    #[serde(rename = "Contribuição")]
    pub contribution: Option<String>,
    #[serde(rename = "Comentários - Contribuição")]
    pub contribution_comment: Option<String>,
    #[serde(rename = "Aprendizado e Desenvolvimento")]
    pub learning_and_development: Option<String>,
    #[serde(rename = "Comentários - Aprendizado e Desenvolvimento")]
    pub learning_and_development_comment: Option<String>,
    #[serde(rename = "Feedback")]
    pub feedback: Option<String>,
    #[serde(rename = "Comentários - Feedback")]
    pub feedback_comment: Option<String>,
    #[serde(rename = "Interação com Gestor")]
    pub interaction_with_manager: Option<String>,
    #[serde(rename = "Comentários - Interação com Gestor")]
    pub interaction_with_manager_comment: Option<String>,
    #[serde(rename = "Clareza sobre Possibilidades de Carreira")]
    pub career_opportunity_clarity: Option<String>,
    #[serde(rename = "Comentários - Clareza sobre Possibilidades de Carreira")]
    pub career_opportunity_clarity_comment: Option<String>,
    #[serde(rename = "Expectativa de Permanência")]
    pub permanence_expectation: Option<String>,
    #[serde(rename = "Comentários - Expectativa de Permanência")]
    pub permanence_expectation_comment: Option<String>,

    #[serde(rename = "eNPS")]
    pub enps: Option<String>,
    #[serde(rename = "[Aberta] eNPS")]
    pub enps_open_comment: Option<String>,
}

impl SurveyCsvRow {
    /// Who the row is about, for diagnostics
    pub fn subject(&self) -> Option<String> {
        clean(&self.name)
            .or_else(|| clean(&self.corporate_email))
            .or_else(|| clean(&self.email))
    }
}

/// What to do with a missing or unparseable response date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateFallback {
    /// Use the import day
    #[default]
    Today,
    /// Reject the row
    Reject,
}

impl FromStr for DateFallback {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "today" => Ok(DateFallback::Today),
            "reject" => Ok(DateFallback::Reject),
            other => Err(format!("unknown date fallback '{}' (expected 'today' or 'reject')", other)),
        }
    }
}

/// Typed survey row, ready for the identity resolver and response writer
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyRow {
    pub profile: EmployeeProfile,
    pub response_date: NaiveDate,
    pub answers: SurveyAnswers,
}

/// Converts raw records into typed rows
#[derive(Debug, Clone, Copy)]
pub struct RowParser {
    date_fallback: DateFallback,
    today: NaiveDate,
}

impl RowParser {
    pub fn new(date_fallback: DateFallback, today: NaiveDate) -> Self {
        Self { date_fallback, today }
    }

    /// Only fails when the date policy is `Reject`.
    pub fn parse(&self, raw: &SurveyCsvRow) -> Result<SurveyRow, RowError> {
        let profile = EmployeeProfile {
            name: clean(&raw.name),
            corporate_email: clean(&raw.corporate_email),
            email: clean(&raw.email),
            mobile_phone: clean(&raw.mobile_phone),
            department: clean(&raw.department),
            position: clean(&raw.position),
            function: clean(&raw.function),
            location: clean(&raw.location),
            company_tenure_months: parse_int(&raw.company_tenure_months),
            gender: clean(&raw.gender),
            generation: clean(&raw.generation),
            n0_company: clean(&raw.n0_company),
            n1_directorate: clean(&raw.n1_directorate),
            n2_management: clean(&raw.n2_management),
            n3_coordination: clean(&raw.n3_coordination),
            n4_area: clean(&raw.n4_area),
        };

        let answers = SurveyAnswers {
            interest_in_position: parse_int(&raw.interest_in_position),
            interest_in_position_comment: clean(&raw.interest_in_position_comment),
            contribution: parse_int(&raw.contribution),
            contribution_comment: clean(&raw.contribution_comment),
            learning_and_development: parse_int(&raw.learning_and_development),
            learning_and_development_comment: clean(&raw.learning_and_development_comment),
            feedback: parse_int(&raw.feedback),
            feedback_comment: clean(&raw.feedback_comment),
            interaction_with_manager: parse_int(&raw.interaction_with_manager),
            interaction_with_manager_comment: clean(&raw.interaction_with_manager_comment),
            career_opportunity_clarity: parse_int(&raw.career_opportunity_clarity),
            career_opportunity_clarity_comment: clean(&raw.career_opportunity_clarity_comment),
            permanence_expectation: parse_int(&raw.permanence_expectation),
            permanence_expectation_comment: clean(&raw.permanence_expectation_comment),
            enps: parse_int(&raw.enps),
            enps_open_comment: clean(&raw.enps_open_comment),
        };

        Ok(SurveyRow {
            profile,
            response_date: self.resolve_date(&raw.response_date)?,
            answers,
        })
    }

    fn resolve_date(&self, value: &Option<String>) -> Result<NaiveDate, RowError> {
        let Some(text) = clean(value) else {
            return match self.date_fallback {
                DateFallback::Today => Ok(self.today),
                DateFallback::Reject => Err(RowError::InvalidDate("missing".to_string())),
            };
        };

        match (parse_date(&text), self.date_fallback) {
            (Some(date), _) => Ok(date),
            (None, DateFallback::Today) => Ok(self.today),
            (None, DateFallback::Reject) => Err(RowError::InvalidDate(text)),
        }
    }
}

/// Trimmed text, `None` when blank
pub fn clean(value: &Option<String>) -> Option<String> {
    let trimmed = value.as_deref()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Integer cell; anything non-numeric is treated as unanswered
pub fn parse_int(value: &Option<String>) -> Option<i32> {
    clean(value)?.parse().ok()
}

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%Y", "%Y/%m/%d"];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Dates as they show up in survey exports
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive()))
}
