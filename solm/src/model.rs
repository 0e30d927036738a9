use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::ErrorCode;
use crate::msbuild::ProjectKind;

/// Dense handle of a project inside [`SolutionModel`]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ProjectId(pub(crate) usize);

impl ProjectId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// Solution configuration/platform pair like `Debug|Any CPU`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SolutionConfiguration {
    pub configuration_name: String,
    /// Empty for legacy solutions that declare configurations without platform
    pub platform_name: String,
    pub full_name: String,
}

impl SolutionConfiguration {
    #[must_use]
    pub fn new(configuration: &str, platform: &str) -> Self {
        let full_name = if platform.is_empty() {
            configuration.to_owned()
        } else {
            format!("{configuration}|{platform}")
        };
        Self {
            configuration_name: configuration.to_owned(),
            platform_name: platform.to_owned(),
            full_name,
        }
    }
}

/// Project configuration that is active when given solution configuration is built
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectConfigurationInSolution {
    pub configuration_name: String,
    /// Platform with `Any CPU` spelled as `AnyCPU`
    pub platform_name: String,
    pub full_name: String,
    /// Whether solution declares `Build.0` mapping for the pair
    pub include_in_build: bool,
}

/// Reference from web site to other solution project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebsiteReference {
    pub guid: String,
    pub assembly: String,
}

/// `ProjectSection(WebsiteProperties)` content
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WebsiteProperties {
    /// Solution configuration name -> `AspNetCompiler` parameter -> value
    pub aspnet_configurations: BTreeMap<String, BTreeMap<String, String>>,
    pub project_references: Vec<WebsiteReference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_framework_moniker: Option<String>,
}

/// One `Project(...)` block of the solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectEntry {
    pub guid: String,
    pub type_guid: String,
    pub kind: ProjectKind,
    pub display_name: String,
    pub relative_path: String,
    pub absolute_path: PathBuf,
    /// Name that identifies the project inside synthesized project
    pub unique_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<ProjectId>,
    pub dependency_guids: Vec<String>,
    /// Solution configuration full name -> project configuration
    pub project_configurations: BTreeMap<String, ProjectConfigurationInSolution>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub items: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<WebsiteProperties>,
    /// Set when project-of-projects manifest cannot be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etp_error: Option<String>,
}

impl ProjectEntry {
    pub(crate) fn new(
        type_guid: &str,
        display_name: &str,
        relative_path: &str,
        guid: &str,
    ) -> Self {
        let kind = crate::msbuild::classify(type_guid, relative_path);
        let website = (kind == ProjectKind::WebSite).then(WebsiteProperties::default);
        Self {
            guid: guid.to_owned(),
            type_guid: type_guid.to_owned(),
            kind,
            display_name: display_name.to_owned(),
            relative_path: relative_path.to_owned(),
            absolute_path: PathBuf::from(relative_path),
            unique_name: String::new(),
            parent: None,
            dependency_guids: Vec::new(),
            project_configurations: BTreeMap::new(),
            items: Vec::new(),
            website,
            etp_error: None,
        }
    }

    #[must_use]
    pub fn is_solution_folder(&self) -> bool {
        self.kind == ProjectKind::SolutionFolder
    }

    /// Human readable project type
    #[must_use]
    pub fn type_description(&self) -> &str {
        crate::msbuild::describe_project(&self.type_guid)
    }

    /// GUID without braces, used to disambiguate names
    #[must_use]
    pub fn bare_guid(&self) -> &str {
        self.guid.trim_start_matches('{').trim_end_matches('}')
    }

    /// Whether a web site defines at least one `AspNetCompiler` configuration
    #[must_use]
    pub fn has_aspnet_configurations(&self) -> bool {
        self.website
            .as_ref()
            .is_some_and(|w| !w.aspnet_configurations.is_empty())
    }
}

/// Recoverable problems found while parsing.
///
/// All three sequences are append-only during the parse and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParserDiagnostics {
    comments: Vec<String>,
    warnings: Vec<String>,
    error_codes: Vec<ErrorCode>,
}

impl ParserDiagnostics {
    #[must_use]
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    #[must_use]
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    #[must_use]
    pub fn error_codes(&self) -> &[ErrorCode] {
        &self.error_codes
    }

    pub(crate) fn comment(&mut self, text: String) {
        tracing::warn!("{text}");
        self.comments.push(text);
    }

    pub(crate) fn warn(&mut self, code: ErrorCode, text: String) {
        tracing::warn!(code = code.as_str(), "{text}");
        self.warnings.push(text);
        self.error_codes.push(code);
    }

    pub(crate) fn code(&mut self, code: ErrorCode) {
        self.error_codes.push(code);
    }
}

/// Global section not interpreted by the parser (`SolutionProperties`, `ExtensibilityGlobals` etc.)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GlobalSection {
    pub name: String,
    pub disposition: String,
    pub entries: Vec<(String, String)>,
}

/// Parsed solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SolutionModel {
    pub(crate) path: Option<PathBuf>,
    pub(crate) directory: PathBuf,
    pub(crate) format_version: u32,
    pub(crate) visual_studio_version: Option<String>,
    pub(crate) minimum_visual_studio_version: Option<String>,
    pub(crate) product: Option<String>,
    pub(crate) projects: Vec<ProjectEntry>,
    #[serde(skip)]
    pub(crate) projects_by_guid: HashMap<String, ProjectId>,
    pub(crate) solution_configurations: Vec<SolutionConfiguration>,
    pub(crate) global_sections: Vec<GlobalSection>,
    pub(crate) diagnostics: ParserDiagnostics,
}

impl SolutionModel {
    /// Path of solution file if it was read from disk
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    #[must_use]
    pub fn format_version(&self) -> u32 {
        self.format_version
    }

    /// Major version from `VisualStudioVersion` line or format version based fallback
    #[must_use]
    pub fn visual_studio_version(&self) -> u32 {
        self.visual_studio_version
            .as_deref()
            .and_then(|v| v.split('.').next())
            .and_then(|major| major.parse().ok())
            .unwrap_or_else(|| self.format_version.saturating_sub(1))
    }

    /// Full `VisualStudioVersion` stamp when it was well formed
    #[must_use]
    pub fn visual_studio_version_text(&self) -> Option<&str> {
        self.visual_studio_version.as_deref()
    }

    #[must_use]
    pub fn minimum_visual_studio_version(&self) -> Option<&str> {
        self.minimum_visual_studio_version.as_deref()
    }

    /// Product like `Visual Studio 15` from comment lines
    #[must_use]
    pub fn product(&self) -> Option<&str> {
        self.product.as_deref()
    }

    /// All projects in declaration order
    #[must_use]
    pub fn projects(&self) -> &[ProjectEntry] {
        &self.projects
    }

    /// Iterates all but solution folder projects
    pub fn iterate_projects(&self) -> impl Iterator<Item = &ProjectEntry> {
        self.projects.iter().filter(|p| !p.is_solution_folder())
    }

    #[must_use]
    pub fn project(&self, id: ProjectId) -> &ProjectEntry {
        &self.projects[id.0]
    }

    /// Finds project handle by GUID ignoring case
    #[must_use]
    pub fn id_of(&self, guid: &str) -> Option<ProjectId> {
        self.projects_by_guid.get(&guid.to_uppercase()).copied()
    }

    #[must_use]
    pub fn find_by_guid(&self, guid: &str) -> Option<&ProjectEntry> {
        self.id_of(guid).map(|id| self.project(id))
    }

    /// Iterates parent chain starting from the direct parent
    pub fn ancestors(&self, id: ProjectId) -> impl Iterator<Item = &ProjectEntry> {
        std::iter::successors(self.project(id).parent, |p| self.project(*p).parent)
            .map(|p| self.project(p))
    }

    #[must_use]
    pub fn solution_configurations(&self) -> &[SolutionConfiguration] {
        &self.solution_configurations
    }

    #[must_use]
    pub fn global_sections(&self) -> &[GlobalSection] {
        &self.global_sections
    }

    #[must_use]
    pub fn diagnostics(&self) -> &ParserDiagnostics {
        &self.diagnostics
    }

    /// `Debug` if declared, otherwise the first declared configuration
    #[must_use]
    pub fn default_configuration_name(&self) -> Option<&str> {
        crate::config::default_configuration_name(&self.solution_configurations)
    }

    /// `Mixed Platforms` if declared, otherwise the first declared platform
    #[must_use]
    pub fn default_platform_name(&self) -> Option<&str> {
        crate::config::default_platform_name(&self.solution_configurations)
    }

    /// Finds declared solution configuration ignoring case
    #[must_use]
    pub fn find_configuration(
        &self,
        configuration: &str,
        platform: &str,
    ) -> Option<&SolutionConfiguration> {
        self.solution_configurations.iter().find(|c| {
            c.configuration_name.eq_ignore_ascii_case(configuration)
                && c.platform_name.eq_ignore_ascii_case(platform)
        })
    }

    /// File name of the solution like `app.sln`
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path
            .as_deref()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
    }
}
