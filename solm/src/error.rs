use std::fmt::{self, Display};

use miette::Diagnostic;
use serde::Serialize;
use thiserror::Error;

/// Stable identifiers of every condition reported by the library.
///
/// Codes are part of the public contract: fatal errors carry one through
/// [`SolutionError::error_code`] and recoverable problems push one into
/// [`crate::model::ParserDiagnostics::error_codes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ErrorCode {
    FileReadError,
    NoHeader,
    MalformedVersion,
    VersionMismatch,
    UnsupportedVersion,
    MalformedProjectLine,
    ProjectMissingEnd,
    DuplicateProject,
    MalformedNestedProject,
    NestedProjectUndefined,
    NestedProjectParentUndefined,
    NestedProjectMultipleParents,
    NestedProjectCycle,
    InvalidSolutionConfigurationEntry,
    InvalidProjectSolutionConfigurationEntry,
    MalformedProjectDependency,
    MissingDependency,
    DependencyCycle,
    EtpProjectError,
    UnknownProjectType,
    FilterSchema,
    FilterMissingSolution,
    FilterProjectNotInSolution,
    InvalidSolutionConfiguration,
    UnrecognizedToolsVersion,
    InvalidImportedProject,
    InvalidConfigurationContents,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::FileReadError => "SolutionFileReadError",
            ErrorCode::NoHeader => "SolutionParseNoHeaderError",
            ErrorCode::MalformedVersion => "SolutionParseMalformedVersionError",
            ErrorCode::VersionMismatch => "SolutionParseVersionMismatchError",
            ErrorCode::UnsupportedVersion => "SolutionParseUnsupportedFormatVersion",
            ErrorCode::MalformedProjectLine => "SolutionParseProjectError",
            ErrorCode::ProjectMissingEnd => "SolutionParseProjectMissingEnd",
            ErrorCode::DuplicateProject => "SolutionParseDuplicateProject",
            ErrorCode::MalformedNestedProject => "SolutionParseNestedProjectError",
            ErrorCode::NestedProjectUndefined => "SolutionParseNestedProjectUndefinedError",
            ErrorCode::NestedProjectParentUndefined => {
                "SolutionParseNestedProjectErrorWithNameAndGuid"
            }
            ErrorCode::NestedProjectMultipleParents => "SolutionParseNestedProjectInconsistent",
            ErrorCode::NestedProjectCycle => "SolutionParseNestedProjectCycle",
            ErrorCode::InvalidSolutionConfigurationEntry => {
                "SolutionParseInvalidSolutionConfigurationEntry"
            }
            ErrorCode::InvalidProjectSolutionConfigurationEntry => {
                "SolutionParseInvalidProjectSolutionConfigurationEntry"
            }
            ErrorCode::MalformedProjectDependency => "SolutionParseProjectDepGuidError",
            ErrorCode::MissingDependency => "SolutionParseProjectDepNotFoundError",
            ErrorCode::DependencyCycle => "SolutionProjectDependencyCycle",
            ErrorCode::EtpProjectError => "SolutionParseEtpProjectError",
            ErrorCode::UnknownProjectType => "SolutionParseUnknownProjectType",
            ErrorCode::FilterSchema => "SolutionFilterJsonParsingError",
            ErrorCode::FilterMissingSolution => "SolutionFilterMissingSolutionError",
            ErrorCode::FilterProjectNotInSolution => {
                "SolutionFilterFilterContainsProjectNotInSolution"
            }
            ErrorCode::InvalidSolutionConfiguration => "SolutionInvalidSolutionConfiguration",
            ErrorCode::UnrecognizedToolsVersion => "UnrecognizedToolsVersion",
            ErrorCode::InvalidImportedProject => "InvalidImportedProjectFile",
            ErrorCode::InvalidConfigurationContents => "InvalidSolutionConfigurationContents",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every fatal condition of parsing, resolution and synthesis.
#[derive(Debug, Error, Diagnostic)]
pub enum SolutionError {
    #[error("Failed to read content from path: {path}")]
    #[diagnostic(code(SolutionFileReadError))]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("No file format header found")]
    #[diagnostic(
        code(SolutionParseNoHeaderError),
        help("Incorrect Visual Studio solution file syntax")
    )]
    NoHeader,

    #[error("Solution file format version \"{version}\" is malformed")]
    #[diagnostic(
        code(SolutionParseMalformedVersionError),
        help("Incorrect Visual Studio solution file syntax")
    )]
    MalformedVersion { version: String },

    #[error(
        "File format version {found} is not recognized. Only solution files with version {minimum} or above can be read"
    )]
    #[diagnostic(code(SolutionParseVersionMismatchError))]
    VersionMismatch { found: u32, minimum: u32 },

    #[error("Invalid project line {line}: {text}")]
    #[diagnostic(
        code(SolutionParseProjectError),
        help("Incorrect Visual Studio solution file syntax")
    )]
    MalformedProjectLine { line: usize, text: String },

    #[error("The solution file has two projects named \"{name}\"")]
    #[diagnostic(code(SolutionParseDuplicateProject))]
    DuplicateProject { name: String },

    #[error("Error parsing the nested project section on line {line}: {text}")]
    #[diagnostic(
        code(SolutionParseNestedProjectError),
        help("Incorrect Visual Studio solution file syntax")
    )]
    MalformedNestedProject { line: usize, text: String },

    #[error(
        "Error parsing the nested project section. A project with the GUID \"{child}\" is listed as being nested under project \"{parent}\", but does not exist in the solution"
    )]
    #[diagnostic(code(SolutionParseNestedProjectUndefinedError))]
    NestedProjectUndefined { child: String, parent: String },

    #[error(
        "Project \"{name}\" with GUID \"{guid}\" is nested under project \"{parent}\", but a project with this GUID does not exist in the solution"
    )]
    #[diagnostic(code(SolutionParseNestedProjectErrorWithNameAndGuid))]
    NestedProjectParentUndefined {
        name: String,
        guid: String,
        parent: String,
    },

    #[error(
        "Project \"{name}\" with GUID \"{guid}\" is nested under both \"{first}\" and \"{second}\""
    )]
    #[diagnostic(code(SolutionParseNestedProjectInconsistent))]
    NestedProjectMultipleParents {
        name: String,
        guid: String,
        first: String,
        second: String,
    },

    #[error("Solution folder nesting of project \"{name}\" with GUID \"{guid}\" forms a cycle")]
    #[diagnostic(code(SolutionParseNestedProjectCycle))]
    NestedProjectCycle { name: String, guid: String },

    #[error("Error parsing the solution configuration section on line {line}: \"{text}\"")]
    #[diagnostic(
        code(SolutionParseInvalidSolutionConfigurationEntry),
        help("Entries must look like \"Configuration|Platform = Configuration|Platform\"")
    )]
    InvalidSolutionConfigurationEntry { line: usize, text: String },

    #[error(
        "Error parsing project configuration \"{value}\" of project \"{guid}\": more than one platform separator found"
    )]
    #[diagnostic(code(SolutionParseInvalidProjectSolutionConfigurationEntry))]
    InvalidProjectSolutionConfigurationEntry { guid: String, value: String },

    #[error("Error parsing a project dependency on line {line}: \"{text}\"")]
    #[diagnostic(
        code(SolutionParseProjectDepGuidError),
        help("Incorrect Visual Studio solution file syntax")
    )]
    MalformedProjectDependency { line: usize, text: String },

    #[error(
        "Project \"{project}\" depends on a project with GUID \"{guid}\", but a project with this GUID was not found in the solution"
    )]
    #[diagnostic(code(SolutionParseProjectDepNotFoundError))]
    MissingDependency { project: String, guid: String },

    #[error("Project dependencies form a cycle: {}", .guids.join(" -> "))]
    #[diagnostic(code(SolutionProjectDependencyCycle))]
    DependencyCycle { guids: Vec<String> },

    #[error("The solution filter file at \"{path}\" is incorrectly formatted: {reason}")]
    #[diagnostic(
        code(SolutionFilterJsonParsingError),
        help("A filter is a JSON object with a \"solution\" object holding a \"path\" string and a \"projects\" array of strings")
    )]
    FilterSchema { path: String, reason: String },

    #[error(
        "The solution filter file at \"{filter}\" specifies there will be a solution file at \"{solution}\", but that file does not exist"
    )]
    #[diagnostic(code(SolutionFilterMissingSolutionError))]
    FilterMissingSolution { filter: String, solution: String },

    #[error(
        "The solution filter file at \"{filter}\" includes project \"{project}\" that is not in the solution file at \"{solution}\""
    )]
    #[diagnostic(code(SolutionFilterFilterContainsProjectNotInSolution))]
    FilterProjectNotInSolution {
        filter: String,
        project: String,
        solution: String,
    },

    #[error("The specified solution configuration \"{configuration}\" is invalid")]
    #[diagnostic(
        code(SolutionInvalidSolutionConfiguration),
        help(
            "Specify a valid solution configuration using the Configuration and Platform properties or leave them blank to use the default"
        )
    )]
    InvalidSolutionConfiguration { configuration: String },

    #[error("The tools version \"{version}\" is unrecognized. Available tools versions are {available}")]
    #[diagnostic(code(UnrecognizedToolsVersion))]
    UnrecognizedToolsVersion { version: String, available: String },

    #[error("The imported project \"{path}\" is invalid: {reason}")]
    #[diagnostic(code(InvalidImportedProjectFile))]
    InvalidImportedProject { path: String, reason: String },

    #[error("The solution configuration contents are invalid: {reason}")]
    #[diagnostic(code(InvalidSolutionConfigurationContents))]
    InvalidConfigurationContents { reason: String },
}

impl SolutionError {
    /// Stable code of the error
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SolutionError::Read { .. } => ErrorCode::FileReadError,
            SolutionError::NoHeader => ErrorCode::NoHeader,
            SolutionError::MalformedVersion { .. } => ErrorCode::MalformedVersion,
            SolutionError::VersionMismatch { .. } => ErrorCode::VersionMismatch,
            SolutionError::MalformedProjectLine { .. } => ErrorCode::MalformedProjectLine,
            SolutionError::DuplicateProject { .. } => ErrorCode::DuplicateProject,
            SolutionError::MalformedNestedProject { .. } => ErrorCode::MalformedNestedProject,
            SolutionError::NestedProjectUndefined { .. } => ErrorCode::NestedProjectUndefined,
            SolutionError::NestedProjectParentUndefined { .. } => {
                ErrorCode::NestedProjectParentUndefined
            }
            SolutionError::NestedProjectMultipleParents { .. } => {
                ErrorCode::NestedProjectMultipleParents
            }
            SolutionError::NestedProjectCycle { .. } => ErrorCode::NestedProjectCycle,
            SolutionError::InvalidSolutionConfigurationEntry { .. } => {
                ErrorCode::InvalidSolutionConfigurationEntry
            }
            SolutionError::InvalidProjectSolutionConfigurationEntry { .. } => {
                ErrorCode::InvalidProjectSolutionConfigurationEntry
            }
            SolutionError::MalformedProjectDependency { .. } => {
                ErrorCode::MalformedProjectDependency
            }
            SolutionError::MissingDependency { .. } => ErrorCode::MissingDependency,
            SolutionError::DependencyCycle { .. } => ErrorCode::DependencyCycle,
            SolutionError::FilterSchema { .. } => ErrorCode::FilterSchema,
            SolutionError::FilterMissingSolution { .. } => ErrorCode::FilterMissingSolution,
            SolutionError::FilterProjectNotInSolution { .. } => {
                ErrorCode::FilterProjectNotInSolution
            }
            SolutionError::InvalidSolutionConfiguration { .. } => {
                ErrorCode::InvalidSolutionConfiguration
            }
            SolutionError::UnrecognizedToolsVersion { .. } => ErrorCode::UnrecognizedToolsVersion,
            SolutionError::InvalidImportedProject { .. } => ErrorCode::InvalidImportedProject,
            SolutionError::InvalidConfigurationContents { .. } => {
                ErrorCode::InvalidConfigurationContents
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(SolutionError::NoHeader, "SolutionParseNoHeaderError")]
    #[case(SolutionError::DuplicateProject { name: "a".to_owned() }, "SolutionParseDuplicateProject")]
    #[case(SolutionError::MissingDependency { project: "a".to_owned(), guid: "{B}".to_owned() }, "SolutionParseProjectDepNotFoundError")]
    #[case(SolutionError::FilterSchema { path: "f".to_owned(), reason: "r".to_owned() }, "SolutionFilterJsonParsingError")]
    #[case(SolutionError::FilterMissingSolution { filter: "f".to_owned(), solution: "s".to_owned() }, "SolutionFilterMissingSolutionError")]
    #[trace]
    fn error_code_matches_diagnostic_code(#[case] error: SolutionError, #[case] expected: &str) {
        // Arrange

        // Act
        let code = error.error_code();
        let diagnostic_code = error.code().map(|c| c.to_string());

        // Assert
        assert_eq!(code.as_str(), expected);
        assert_eq!(diagnostic_code.as_deref(), Some(expected));
    }

    #[test]
    fn missing_dependency_message_contains_guid() {
        // Arrange
        let error = SolutionError::MissingDependency {
            project: "app".to_owned(),
            guid: "{3A2D3E2F-0000-0000-0000-000000000001}".to_owned(),
        };

        // Act
        let message = error.to_string();

        // Assert
        assert!(message.contains("{3A2D3E2F-0000-0000-0000-000000000001}"));
    }
}
