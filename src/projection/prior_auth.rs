//! Projection table for the prior-authorization workflow

use super::{Binding, InputProjector, Projection};
use serde_json::{json, Value};

pub const CASE_NORMALIZER: &str = "pa_case_normalizer";
pub const COVERAGE_ELIGIBILITY: &str = "pa_coverage_eligibility";
pub const MEDICAL_NECESSITY: &str = "pa_medical_necessity";
pub const CODING_PROVIDER_VALIDATION: &str = "pa_coding_provider_validation";
pub const DECISION_ENGINE: &str = "pa_decision_engine";
pub const DENIAL_LETTER_GENERATOR: &str = "pa_denial_letter_generator";
pub const APPEAL_DRAFTER: &str = "pa_appeal_drafter";

/// Step identifiers in workflow order
pub const STEPS: [&str; 7] = [
    CASE_NORMALIZER,
    COVERAGE_ELIGIBILITY,
    MEDICAL_NECESSITY,
    CODING_PROVIDER_VALIDATION,
    DECISION_ENGINE,
    DENIAL_LETTER_GENERATOR,
    APPEAL_DRAFTER,
];

fn case(path: &str, default: Value) -> Binding {
    Binding::field(CASE_NORMALIZER, path, default)
}

fn case_fields(fields: &[(&str, Value)]) -> Vec<(String, Binding)> {
    fields
        .iter()
        .map(|(name, default)| (name.to_string(), case(name, default.clone())))
        .collect()
}

fn from_fields(entries: Vec<(String, Binding)>) -> Projection {
    entries
        .into_iter()
        .fold(Projection::new(), |projection, (key, binding)| {
            projection.bind(key, binding)
        })
}

impl InputProjector {
    /// The built-in rules for the seven prior-authorization steps
    pub fn prior_authorization() -> Self {
        let decision = |path: &str, default: Value| Binding::field(DECISION_ENGINE, path, default);
        let medical = |path: &str, default: Value| Binding::field(MEDICAL_NECESSITY, path, default);

        Self::new()
            .with_rule(
                CASE_NORMALIZER,
                Projection::new().bind("documents", Binding::Documents),
            )
            .with_rule(
                COVERAGE_ELIGIBILITY,
                from_fields(case_fields(&[
                    ("procedures_requested", json!([])),
                    ("payer", json!({})),
                    ("devices_or_drugs", json!([])),
                ])),
            )
            .with_rule(
                MEDICAL_NECESSITY,
                from_fields(case_fields(&[
                    ("diagnoses", json!([])),
                    ("diagnosis_descriptions", json!([])),
                    ("procedures_requested", json!([])),
                    ("procedure_descriptions", json!([])),
                    ("anatomical_levels", json!([])),
                    ("conservative_therapy", json!({})),
                    ("imaging", json!({})),
                    ("clinical_findings", json!([])),
                    ("devices_or_drugs", json!([])),
                ])),
            )
            .with_rule(
                CODING_PROVIDER_VALIDATION,
                from_fields(case_fields(&[
                    ("diagnoses", json!([])),
                    ("procedures_requested", json!([])),
                    ("provider", json!({})),
                ])),
            )
            .with_rule(
                DECISION_ENGINE,
                Projection::new()
                    .bind(
                        "coverage_eligible",
                        Binding::field(COVERAGE_ELIGIBILITY, "coverage_eligible", json!(false)),
                    )
                    .bind(
                        "coverage_basis",
                        Binding::field(COVERAGE_ELIGIBILITY, "coverage_basis", json!("")),
                    )
                    .bind(
                        "medical_necessity_met",
                        medical("medical_necessity_met", json!(false)),
                    )
                    .bind("criteria_met", medical("criteria_met", json!([])))
                    .bind("criteria_failed", medical("criteria_failed", json!([])))
                    .bind(
                        "diagnosis_codes_valid",
                        Binding::field(CODING_PROVIDER_VALIDATION, "diagnosis_codes_valid", json!(false)),
                    )
                    .bind(
                        "procedure_codes_valid",
                        Binding::field(CODING_PROVIDER_VALIDATION, "procedure_codes_valid", json!(false)),
                    )
                    .bind(
                        "provider_valid",
                        Binding::field(CODING_PROVIDER_VALIDATION, "provider_valid", json!(false)),
                    )
                    .bind(
                        "validation_issues",
                        Binding::field(CODING_PROVIDER_VALIDATION, "issues", json!([])),
                    ),
            )
            .with_rule(
                DENIAL_LETTER_GENERATOR,
                Projection::new()
                    .bind("decision", decision("decision", json!("DENY")))
                    .bind("primary_reason", decision("primary_reason", json!("")))
                    .bind("secondary_reasons", decision("secondary_reasons", json!([])))
                    .bind("payer", case("payer", json!({})))
                    .bind(
                        "case_data",
                        Binding::object([
                            ("patient", case("patient", json!({}))),
                            ("procedures_requested", case("procedures_requested", json!([]))),
                            ("provider", case("provider", json!({}))),
                        ]),
                    )
                    .bind("denial_codes", decision("denial_codes", json!([]))),
            )
            .with_rule(
                APPEAL_DRAFTER,
                Projection::new()
                    .bind(
                        "denial_reasons",
                        Binding::List(vec![Binding::object([
                            ("primary_reason", decision("primary_reason", json!(""))),
                            ("secondary_reasons", decision("secondary_reasons", json!([]))),
                        ])]),
                    )
                    .bind(
                        "case_data",
                        Binding::object([
                            ("patient", case("patient", json!({}))),
                            ("diagnoses", case("diagnoses", json!([]))),
                            ("procedures_requested", case("procedures_requested", json!([]))),
                            ("conservative_therapy", case("conservative_therapy", json!({}))),
                            ("imaging", case("imaging", json!({}))),
                            ("provider", case("provider", json!({}))),
                        ]),
                    )
                    .bind(
                        "medical_necessity_evaluation",
                        Binding::object([
                            ("criteria_met", medical("criteria_met", json!([]))),
                            ("criteria_failed", medical("criteria_failed", json!([]))),
                        ]),
                    )
                    .bind("coverage_assessment", Binding::payload(COVERAGE_ELIGIBILITY))
                    .bind("denial_letter", Binding::payload(DENIAL_LETTER_GENERATOR)),
            )
    }
}
