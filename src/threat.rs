use serde::{Deserialize, Serialize};
use std::fmt;

/// Classification outcome for an analyzed URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ThreatLabel {
    Benign,
    Defacement,
    Malware,
    Phishing,
}

impl ThreatLabel {
    pub const ALL: [ThreatLabel; 4] = [
        ThreatLabel::Benign,
        ThreatLabel::Defacement,
        ThreatLabel::Malware,
        ThreatLabel::Phishing,
    ];

    /// Label used when the backend answers with something outside the set.
    pub const FALLBACK: ThreatLabel = ThreatLabel::Benign;

    pub fn as_str(&self) -> &'static str {
        match self {
            ThreatLabel::Benign => "Benign",
            ThreatLabel::Defacement => "Defacement",
            ThreatLabel::Malware => "Malware",
            ThreatLabel::Phishing => "Phishing",
        }
    }

    /// Strict, case-insensitive parse. Used for labels typed by a user.
    pub fn parse(raw: &str) -> Option<ThreatLabel> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|label| label.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn description(&self) -> &'static str {
        match self {
            ThreatLabel::Benign => "Safe to visit",
            ThreatLabel::Defacement => "Website may be altered",
            ThreatLabel::Malware => "Contains malicious software",
            ThreatLabel::Phishing => "Attempts to steal information",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            ThreatLabel::Benign => "🟢",
            ThreatLabel::Defacement => "🟡",
            ThreatLabel::Malware => "🔴",
            ThreatLabel::Phishing => "🟠",
        }
    }
}

impl fmt::Display for ThreatLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw backend prediction onto the closed label set.
///
/// Unknown or empty labels fail open to [`ThreatLabel::FALLBACK`].
pub fn normalize(raw_label: &str) -> ThreatLabel {
    match ThreatLabel::parse(raw_label) {
        Some(label) => label,
        None => {
            log::warn!(
                "Unrecognized prediction label '{raw_label}', falling back to {}",
                ThreatLabel::FALLBACK
            );
            ThreatLabel::FALLBACK
        }
    }
}

/// Reason a user reports a correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackCategory {
    FalseNegative,
    FalsePositive,
    NewThreat,
    Improvement,
}

impl FeedbackCategory {
    pub const ALL: [FeedbackCategory; 4] = [
        FeedbackCategory::FalseNegative,
        FeedbackCategory::FalsePositive,
        FeedbackCategory::NewThreat,
        FeedbackCategory::Improvement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FeedbackCategory::FalseNegative => "false_negative",
            FeedbackCategory::FalsePositive => "false_positive",
            FeedbackCategory::NewThreat => "new_threat",
            FeedbackCategory::Improvement => "improvement",
        }
    }

    pub fn parse(raw: &str) -> Option<FeedbackCategory> {
        let raw = raw.trim().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|category| category.as_str().eq_ignore_ascii_case(&raw))
    }

    /// Only misclassification reports carry what we originally predicted.
    pub fn collects_prediction(&self) -> bool {
        matches!(
            self,
            FeedbackCategory::FalseNegative | FeedbackCategory::FalsePositive
        )
    }

    pub fn description(&self) -> &'static str {
        match self {
            FeedbackCategory::FalseNegative => {
                "Our system marked it as safe, but it's actually malicious"
            }
            FeedbackCategory::FalsePositive => {
                "Our system marked it as malicious, but it's actually safe"
            }
            FeedbackCategory::NewThreat => {
                "Recently discovered malicious website not in our database"
            }
            FeedbackCategory::Improvement => "Suggestions for better detection accuracy",
        }
    }
}

impl fmt::Display for FeedbackCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
