//! Structured unit results: review findings and report sections.

use super::OutputParseError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Maximum summary length derived from plain-text report output.
const MAX_DERIVED_SUMMARY_CHARS: usize = 200;

/// Finding severity.
///
/// Unknown strings are kept verbatim as [`Severity::Unrecognized`] and rank
/// below [`Severity::Info`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    /// Must be fixed before merging.
    Critical,
    /// Serious defect.
    High,
    /// Worth fixing.
    Medium,
    /// Minor issue.
    Low,
    /// Informational note.
    Info,
    /// Severity string the system does not know.
    Unrecognized(String),
}

impl Severity {
    /// Parses a severity, keeping unknown values as [`Severity::Unrecognized`].
    ///
    /// # Examples
    ///
    ///     use revue::job::domain::Severity;
    ///
    ///     assert_eq!(Severity::parse(" HIGH "), Severity::High);
    ///     assert_eq!(
    ///         Severity::parse("blocker"),
    ///         Severity::Unrecognized("blocker".to_owned())
    ///     );
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "medium" => Self::Medium,
            "low" => Self::Low,
            "info" => Self::Info,
            _ => Self::Unrecognized(raw.trim().to_owned()),
        }
    }

    /// Returns the canonical string form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }

    /// Returns the priority rank; higher is more severe.
    #[must_use]
    pub const fn rank(&self) -> u8 {
        match self {
            Self::Critical => 5,
            Self::High => 4,
            Self::Medium => 3,
            Self::Low => 2,
            Self::Info => 1,
            Self::Unrecognized(_) => 0,
        }
    }
}

impl Ord for Severity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.as_str().cmp(other.as_str()))
    }
}

impl PartialOrd for Severity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<String> for Severity {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<Severity> for String {
    fn from(value: Severity) -> Self {
        value.as_str().to_owned()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One review finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Severity of the finding.
    pub severity: Severity,
    /// Free-form category such as `security` or `style`.
    pub category: String,
    /// Description of the problem.
    pub description: String,
    /// File the finding refers to, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// One-based line number, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Structured output of a successful attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UnitResult {
    /// Findings produced by a review rule.
    Findings {
        /// Findings in the order the agent reported them.
        findings: Vec<Finding>,
    },
    /// Generated report section.
    Section {
        /// Section body.
        content: String,
        /// Short summary of the section.
        summary: String,
    },
}

impl UnitResult {
    /// Returns the findings of a review result, or an empty slice.
    #[must_use]
    pub fn findings(&self) -> &[Finding] {
        match self {
            Self::Findings { findings } => findings,
            Self::Section { .. } => &[],
        }
    }

    /// Parses review-rule output.
    ///
    /// Accepts a JSON object with a `findings` array or a bare array,
    /// optionally wrapped in a fenced code block.
    ///
    /// # Errors
    ///
    /// Returns [`OutputParseError`] for empty or malformed output.
    pub fn parse_findings(raw: &str) -> Result<Self, OutputParseError> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            return Err(OutputParseError::EmptyOutput);
        }
        let document: FindingsDocument = serde_json::from_str(body)
            .map_err(|err| OutputParseError::MalformedFindings(err.to_string()))?;
        let wire = match document {
            FindingsDocument::Wrapped { findings } => findings,
            FindingsDocument::Bare(findings) => findings,
        };
        Ok(Self::Findings {
            findings: wire.into_iter().map(Finding::from).collect(),
        })
    }

    /// Parses report-section output.
    ///
    /// JSON objects with `content` (and optionally `summary`) are used as
    /// is; any other text becomes the content, summarised by its first
    /// non-empty line.
    ///
    /// # Errors
    ///
    /// Returns [`OutputParseError::EmptyOutput`] for blank output.
    pub fn parse_section(raw: &str) -> Result<Self, OutputParseError> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            return Err(OutputParseError::EmptyOutput);
        }
        if let Ok(section) = serde_json::from_str::<SectionDocument>(body)
            && !section.content.trim().is_empty()
        {
            let summary = section
                .summary
                .filter(|summary| !summary.trim().is_empty())
                .unwrap_or_else(|| derive_summary(&section.content));
            return Ok(Self::Section {
                content: section.content,
                summary,
            });
        }
        Ok(Self::Section {
            content: body.to_owned(),
            summary: derive_summary(body),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FindingsDocument {
    Wrapped { findings: Vec<WireFinding> },
    Bare(Vec<WireFinding>),
}

#[derive(Deserialize)]
struct WireFinding {
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default, alias = "message")]
    description: String,
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    line: Option<u32>,
}

impl From<WireFinding> for Finding {
    fn from(wire: WireFinding) -> Self {
        Self {
            severity: Severity::parse(wire.severity.as_deref().unwrap_or("unspecified")),
            category: wire
                .category
                .filter(|category| !category.trim().is_empty())
                .unwrap_or_else(|| "general".to_owned()),
            description: wire.description,
            file: wire.file,
            line: wire.line,
        }
    }
}

#[derive(Deserialize)]
struct SectionDocument {
    content: String,
    #[serde(default)]
    summary: Option<String>,
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let without_language = rest.split_once('\n').map_or("", |(_, body)| body);
    without_language
        .trim_end()
        .strip_suffix("```")
        .unwrap_or(without_language)
        .trim()
}

fn derive_summary(content: &str) -> String {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.trim_start_matches('#').trim())
        .unwrap_or_default()
        .chars()
        .take(MAX_DERIVED_SUMMARY_CHARS)
        .collect()
}
