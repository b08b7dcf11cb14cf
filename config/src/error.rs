use thiserror::Error;

/// Everything that can go wrong while resolving the configuration.
///
/// Both variants are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration:\n{}", format_problems(.0))]
    Invalid(Vec<Problem>),
}

impl ConfigError {
    /// The validation problems, empty for load errors.
    pub fn problems(&self) -> &[Problem] {
        match self {
            Self::Load(_) => &[],
            Self::Invalid(problems) => problems,
        }
    }
}

/// A single validation failure inside one section.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Problem {
    #[error("{section} {field} has not been configured")]
    Missing { section: &'static str, field: &'static str },

    #[error("{section} {field} is invalid: {reason}")]
    Invalid {
        section: &'static str,
        field: &'static str,
        reason: String,
    },
}

impl Problem {
    pub fn section(&self) -> &'static str {
        match self {
            Self::Missing { section, .. } | Self::Invalid { section, .. } => section,
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::Missing { field, .. } | Self::Invalid { field, .. } => field,
        }
    }
}

fn format_problems(problems: &[Problem]) -> String {
    problems
        .iter()
        .map(|problem| format!("  - {problem}"))
        .collect::<Vec<_>>()
        .join("\n")
}
