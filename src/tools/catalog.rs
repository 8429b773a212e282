//! Built-in tool catalogue for the prior-authorization workflow

use crate::projection::prior_auth::{
    APPEAL_DRAFTER, CODING_PROVIDER_VALIDATION, COVERAGE_ELIGIBILITY, MEDICAL_NECESSITY,
};
use crate::tools::{ToolBackend, ToolDispatcher, ToolSpec};
use std::sync::Arc;

pub const LOOKUP_ICD10: &str = "lookup_icd10";
pub const LOOKUP_CPT: &str = "lookup_cpt";
pub const LOOKUP_NPI: &str = "lookup_npi";
pub const LOOKUP_CMS_COVERAGE: &str = "lookup_cms_coverage";
pub const LOOKUP_FDA: &str = "lookup_fda";
pub const SEARCH_PUBMED: &str = "search_pubmed";
/// Literature search driven by the denial reasons rather than the procedures
pub const SEARCH_PUBMED_APPEAL: &str = "search_pubmed_appeal";

/// Tool declarations with their argument sources
pub fn prior_authorization_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::new(LOOKUP_ICD10, "Validate an ICD-10-CM diagnosis code")
            .arg("code", "diagnoses[]"),
        ToolSpec::new(LOOKUP_CPT, "Validate a CPT/HCPCS procedure code")
            .arg("code", "procedures_requested[].code"),
        ToolSpec::new(LOOKUP_NPI, "Look up a provider in the NPI registry")
            .arg("npi", "provider.npi"),
        ToolSpec::new(LOOKUP_CMS_COVERAGE, "Find CMS NCD/LCD coverage for a procedure")
            .arg("cpt_code", "procedures_requested[].code"),
        ToolSpec::new(LOOKUP_FDA, "Look up an FDA-cleared device or approved drug")
            .arg("name", "devices_or_drugs[]"),
        ToolSpec::new(SEARCH_PUBMED, "Search PubMed for supporting evidence")
            .arg("query", "procedure_descriptions[]"),
        ToolSpec::new(SEARCH_PUBMED_APPEAL, "Search PubMed for evidence against a denial reason")
            .invoking(SEARCH_PUBMED)
            .arg("query", "denial_reasons[].primary_reason"),
    ]
}

impl ToolDispatcher {
    /// Dispatcher with the prior-authorization tools and step permissions
    pub fn prior_authorization(backend: Option<Arc<dyn ToolBackend>>) -> Self {
        prior_authorization_specs()
            .into_iter()
            .fold(Self::new(backend), |dispatcher, spec| dispatcher.with_tool(spec))
            .permit(COVERAGE_ELIGIBILITY, [LOOKUP_CMS_COVERAGE, LOOKUP_FDA])
            .permit(MEDICAL_NECESSITY, [SEARCH_PUBMED, LOOKUP_FDA])
            .permit(CODING_PROVIDER_VALIDATION, [LOOKUP_ICD10, LOOKUP_CPT, LOOKUP_NPI])
            .permit(APPEAL_DRAFTER, [SEARCH_PUBMED_APPEAL])
    }
}
