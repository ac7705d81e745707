use crate::retrieval::UNKNOWN_DOCUMENT_TYPE;

/// Minimum keyword hits before content-based detection is trusted.
const CONTENT_THRESHOLD: usize = 3;

struct Category {
    label: &'static str,
    filename_hints: &'static [&'static str],
    keywords: &'static [&'static str],
}

const CATEGORIES: &[Category] = &[
    Category {
        label: "Policy Wordings",
        filename_hints: &["policy", "insurance", "coverage"],
        keywords: &[
            "policy",
            "coverage",
            "premium",
            "deductible",
            "claim",
            "insured",
            "insurer",
            "policyholder",
            "endorsement",
            "exclusion",
            "liability",
            "property",
            "casualty",
            "health insurance",
            "life insurance",
            "auto insurance",
            "home insurance",
        ],
    },
    Category {
        label: "Legal Documents",
        filename_hints: &["contract", "agreement", "legal"],
        keywords: &[
            "contract",
            "agreement",
            "terms and conditions",
            "clause",
            "section",
            "article",
            "party",
            "obligation",
            "liability",
            "breach",
            "termination",
            "jurisdiction",
            "legal",
            "law",
            "statute",
            "regulation",
            "compliance",
        ],
    },
    Category {
        label: "Financial Documents",
        filename_hints: &["financial", "report", "statement"],
        keywords: &[
            "financial",
            "revenue",
            "profit",
            "loss",
            "income",
            "expense",
            "budget",
            "investment",
            "portfolio",
            "asset",
            "liability",
            "equity",
            "balance sheet",
            "income statement",
            "cash flow",
            "audit",
            "tax",
        ],
    },
    Category {
        label: "Technical Documents",
        filename_hints: &["technical", "spec", "manual"],
        keywords: &[
            "technical",
            "specification",
            "requirement",
            "system",
            "software",
            "hardware",
            "architecture",
            "design",
            "implementation",
            "api",
            "database",
            "protocol",
            "algorithm",
            "framework",
            "development",
            "testing",
        ],
    },
    Category {
        label: "Medical Documents",
        filename_hints: &["medical", "health", "patient"],
        keywords: &[
            "medical",
            "health",
            "patient",
            "diagnosis",
            "treatment",
            "symptom",
            "medication",
            "prescription",
            "doctor",
            "physician",
            "clinic",
            "hospital",
            "therapy",
            "recovery",
            "prognosis",
            "medical record",
        ],
    },
];

/// Whether `label` is one of the categories detection can produce.
pub fn is_known_document_type(label: &str) -> bool {
    CATEGORIES.iter().any(|c| c.label == label)
}

/// Guess a document category from its filename, then its content.
///
/// Filename hints win outright. Otherwise each category scores one point
/// per distinct keyword found (substring match, case-insensitive); the
/// first category with the top score is chosen if it reaches the threshold.
pub fn detect_document_type(text: &str, filename: &str) -> String {
    let filename = filename.to_lowercase();
    if let Some(category) = CATEGORIES
        .iter()
        .find(|c| c.filename_hints.iter().any(|hint| filename.contains(hint)))
    {
        return category.label.to_string();
    }

    let text = text.to_lowercase();
    let mut best: Option<(&str, usize)> = None;
    for category in CATEGORIES {
        let score = category
            .keywords
            .iter()
            .filter(|keyword| text.contains(*keyword))
            .count();
        if best.map_or(true, |(_, top)| score > top) {
            best = Some((category.label, score));
        }
    }

    match best {
        Some((label, score)) if score >= CONTENT_THRESHOLD => label.to_string(),
        _ => UNKNOWN_DOCUMENT_TYPE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_hint_wins_over_content() {
        let text = "patient diagnosis treatment hospital";
        assert_eq!(
            detect_document_type(text, "Insurance_Terms.txt"),
            "Policy Wordings"
        );
    }

    #[test]
    fn content_keywords_pick_the_category() {
        let text = "The patient received a diagnosis and treatment at the hospital.";
        assert_eq!(detect_document_type(text, "notes.txt"), "Medical Documents");
    }

    #[test]
    fn known_types_are_the_category_labels() {
        assert!(is_known_document_type("Legal Documents"));
        assert!(!is_known_document_type(UNKNOWN_DOCUMENT_TYPE));
        assert!(!is_known_document_type("legal documents"));
    }

    #[test]
    fn below_threshold_is_unknown() {
        let text = "A short note about lunch and the weather.";
        assert_eq!(detect_document_type(text, "notes.txt"), "unknown");
    }

    #[test]
    fn ties_go_to_the_earlier_category() {
        // three policy hits and three legal hits
        let text = "premium deductible insurer clause breach statute";
        assert_eq!(detect_document_type(text, "a.txt"), "Policy Wordings");
    }
}
