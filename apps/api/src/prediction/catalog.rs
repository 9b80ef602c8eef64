//! Static role knowledge: required skills and growth outlook per job role.
//!
//! Every lookup goes through [`canonical_role`], so "Data Scientist",
//! "data scientist" and "data-scientist" all hit the same entry.

pub const GENERIC_SKILLS: &[&str] = &["Technical Skills", "Problem Solving", "Communication"];
pub const DEFAULT_GROWTH_OUTLOOK: &str = "Moderate";

/// Lowercase, trimmed, with runs of whitespace and hyphens collapsed to `_`.
pub fn canonical_role(role: &str) -> String {
    role.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

pub fn required_skills(role: &str) -> &'static [&'static str] {
    match canonical_role(role).as_str() {
        "business_analyst" => &[
            "SQL",
            "Excel",
            "Power BI",
            "Communication",
            "Analytical Thinking",
        ],
        "data_analyst" => &["SQL", "Excel", "Python", "Statistics", "Data Visualization"],
        "data_scientist" => &[
            "Python",
            "Machine Learning",
            "Statistics",
            "SQL",
            "Data Visualization",
        ],
        "devops_engineer" => &["AWS", "Docker", "Kubernetes", "CI/CD", "Linux"],
        "financial_analyst" => &[
            "Excel",
            "Financial Modeling",
            "Accounting",
            "Analysis",
            "Communication",
        ],
        "frontend_developer" => &["JavaScript", "React", "HTML/CSS", "TypeScript", "UI/UX"],
        "ml_engineer" => &[
            "Python",
            "Machine Learning",
            "Deep Learning",
            "TensorFlow",
            "PyTorch",
        ],
        "product_manager" => &[
            "Product Strategy",
            "Market Research",
            "Agile",
            "Communication",
            "Leadership",
        ],
        "software_engineer" => &["JavaScript", "React", "Node.js", "Python", "System Design"],
        "ui_designer" => &[
            "Figma",
            "UI Design",
            "Prototyping",
            "Visual Design",
            "User Research",
        ],
        "ux_designer" => &[
            "User Research",
            "Wireframing",
            "Prototyping",
            "Usability Testing",
            "Figma",
        ],
        "cloud_engineer" => &["AWS", "Azure", "Docker", "Kubernetes", "Networking"],
        _ => GENERIC_SKILLS,
    }
}

pub fn growth_outlook(role: &str) -> &'static str {
    match canonical_role(role).as_str() {
        "data_scientist" | "ml_engineer" | "ai_engineer" => "Very High",
        "data_analyst" | "devops_engineer" | "frontend_developer" | "software_engineer"
        | "ux_designer" | "cloud_engineer" => "High",
        "business_analyst" | "financial_analyst" | "product_manager" | "ui_designer"
        | "it_consultant" | "systems_analyst" => "Medium",
        _ => DEFAULT_GROWTH_OUTLOOK,
    }
}
