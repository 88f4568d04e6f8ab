//! Owner-name heuristics for property records

/// Words that mark an owner as an organization rather than a person
const ENTITY_WORDS: &[&str] = &[
    "LLC", "INC", "CORP", "CORPORATION", "CO", "COMPANY", "LTD", "LP", "LLP", "PLLC", "PC",
    "TRUST", "TRUSTEE", "TRUSTEES", "ESTATE", "BANK", "CHURCH", "MINISTRIES", "ASSOCIATION",
    "ASSN", "HOLDINGS", "REALTY", "PROPERTIES", "MANAGEMENT", "MGMT", "PARTNERS",
    "PARTNERSHIP", "INVESTMENTS", "DEVELOPMENT", "ENTERPRISES", "GROUP", "FOUNDATION",
    "SCHOOL", "UNIVERSITY", "HOSPITAL", "AUTHORITY", "COMMISSION", "DEPT", "DEPARTMENT",
    "TOWNSHIP", "BOROUGH", "MUNICIPAL", "FEDERAL", "CONDOMINIUM", "CONDO", "HOA",
];

/// Multi-word markers, matched on word boundaries
const ENTITY_PHRASES: &[&str] = &[
    "CITY OF",
    "COUNTY OF",
    "STATE OF",
    "TOWN OF",
    "VILLAGE OF",
    "BOARD OF EDUCATION",
    "HOUSING AUTHORITY",
    "UNITED STATES",
];

/// Whether an owner name belongs to a business, institution or government body
pub fn is_business_entity(owner_name: &str) -> bool {
    // Periods are dropped so "L.L.C." and "INC." match their bare forms
    let normalized: String = owner_name
        .to_uppercase()
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c.is_ascii_alphanumeric() { c } else { ' ' })
        .collect();
    let words: Vec<&str> = normalized.split_whitespace().collect();

    if words.iter().any(|w| ENTITY_WORDS.contains(w)) {
        return true;
    }

    let padded = format!(" {} ", words.join(" "));
    ENTITY_PHRASES
        .iter()
        .any(|phrase| padded.contains(&format!(" {} ", phrase)))
}
