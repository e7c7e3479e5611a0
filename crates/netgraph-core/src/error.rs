use std::fmt;

/// Machine-readable error codes attached to every diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum ErrorCode {
    TableNotFound,
    ColumnNotFound,
    InvalidConfig,
    TypeInconsistency,
    MixedNodeTypes,
    CoordinateConflict,
    SelfLoopArc,
    NonPositiveCost,
    BothDirectionsForbidden,
    EncodeFailed,
    OutputTableExists,
    VirtualTableFailed,
    InternalUnexpected,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::TableNotFound => "E1001",
            Self::ColumnNotFound => "E1002",
            Self::InvalidConfig => "E1003",
            Self::TypeInconsistency => "E1101",
            Self::MixedNodeTypes => "E1102",
            Self::CoordinateConflict => "E2001",
            Self::SelfLoopArc => "E2002",
            Self::NonPositiveCost => "E2003",
            Self::BothDirectionsForbidden => "E2101",
            Self::EncodeFailed => "E5001",
            Self::OutputTableExists => "E5002",
            Self::VirtualTableFailed => "E5003",
            Self::InternalUnexpected => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::TableNotFound => "Input table not found",
            Self::ColumnNotFound => "Configured column not found",
            Self::InvalidConfig => "Invalid option combination",
            Self::TypeInconsistency => "Column holds disallowed value types",
            Self::MixedNodeTypes => "NodeFrom / NodeTo have different value types",
            Self::CoordinateConflict => "Node coordinate inconsistency",
            Self::SelfLoopArc => "Arc is a closed ring",
            Self::NonPositiveCost => "Arc has negative or null cost",
            Self::BothDirectionsForbidden => "Arc forbidden in both directions",
            Self::EncodeFailed => "NETWORK-DATA encoding failed",
            Self::OutputTableExists => "Output table already exists",
            Self::VirtualTableFailed => "VirtualNetwork table creation failed",
            Self::InternalUnexpected => "Internal unexpected error",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::TableNotFound => Some("Check --table against the tables in the database."),
            Self::ColumnNotFound => Some("Check the column options against PRAGMA table_info."),
            Self::InvalidConfig => Some("Run `netgraph validate --help` for valid combinations."),
            Self::TypeInconsistency => Some("Fix or filter the offending rows and retry."),
            Self::MixedNodeTypes => {
                Some("Store both node columns as INTEGER, or both as TEXT.")
            }
            Self::CoordinateConflict => {
                Some("Snap line endpoints so every node has a single coordinate.")
            }
            Self::SelfLoopArc => Some("Split or remove arcs whose FromNode equals ToNode."),
            Self::NonPositiveCost => Some("Every arc cost must be strictly positive."),
            Self::BothDirectionsForbidden => None,
            Self::EncodeFailed => Some("Check disk space and write permissions."),
            Self::OutputTableExists => Some("Pass --overwrite-output to replace it."),
            Self::VirtualTableFailed => {
                Some("Load the SpatiaLite extension providing the VirtualNetwork module.")
            }
            Self::InternalUnexpected => Some("Retry once. If persistent, report a bug with logs."),
        }
    }

    /// Whether a diagnostic with this code blocks NETWORK-DATA creation.
    #[must_use]
    pub const fn is_fatal(self) -> bool {
        !matches!(
            self,
            Self::BothDirectionsForbidden | Self::VirtualTableFailed
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::ErrorCode;
    use std::collections::HashSet;

    const ALL: [ErrorCode; 13] = [
        ErrorCode::TableNotFound,
        ErrorCode::ColumnNotFound,
        ErrorCode::InvalidConfig,
        ErrorCode::TypeInconsistency,
        ErrorCode::MixedNodeTypes,
        ErrorCode::CoordinateConflict,
        ErrorCode::SelfLoopArc,
        ErrorCode::NonPositiveCost,
        ErrorCode::BothDirectionsForbidden,
        ErrorCode::EncodeFailed,
        ErrorCode::OutputTableExists,
        ErrorCode::VirtualTableFailed,
        ErrorCode::InternalUnexpected,
    ];

    #[test]
    fn all_codes_are_unique() {
        let mut seen = HashSet::new();
        for code in ALL {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        for code in ALL {
            let s = code.code();
            assert_eq!(s.len(), 5);
            assert!(s.starts_with('E'));
            assert!(s.chars().skip(1).all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn only_warnings_are_non_fatal() {
        let non_fatal: Vec<_> = ALL.into_iter().filter(|c| !c.is_fatal()).collect();
        assert_eq!(
            non_fatal,
            vec![
                ErrorCode::BothDirectionsForbidden,
                ErrorCode::VirtualTableFailed
            ]
        );
    }
}
