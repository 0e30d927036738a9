use std::collections::{HashMap, HashSet};
use std::path::{Component, Path, PathBuf};

use crate::config::{self, ConfigurationMapper};
use crate::error::{ErrorCode, SolutionError};
use crate::model::{
    GlobalSection, ParserDiagnostics, ProjectEntry, ProjectId, SolutionConfiguration,
    SolutionModel, WebsiteReference,
};
use crate::msbuild::{EtpManifest, ProjectKind};
use crate::scan::{Line, ProjectHeader, Record, Scanner};

const UTF8_BOM: char = '\u{feff}';
const MIN_FORMAT_VERSION: u32 = 7;
const MAX_FORMAT_VERSION: u32 = 12;
const HEADER_SEARCH_LINES: usize = 2;

const VISUAL_STUDIO_VERSION: &str = "VisualStudioVersion";
const MINIMUM_VISUAL_STUDIO_VERSION: &str = "MinimumVisualStudioVersion";
const PRODUCT_PREFIX: &str = "Visual Studio";

const CLEANSED_CHARS: &[char] = &['%', '$', '@', ';', '.', '(', ')', '\''];

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ProjectSectionKind {
    Dependencies,
    WebsiteProperties,
    SolutionItems,
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum GlobalSectionKind {
    SolutionConfigurations { platform_required: bool },
    ProjectConfigurations,
    NestedProjects,
    Other,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Block {
    None,
    /// Project whose content is consumed; `None` when header was a duplicate
    Project(Option<ProjectId>),
    ProjectSection(Option<ProjectId>, ProjectSectionKind),
    Global,
    GlobalSection(GlobalSectionKind),
}

/// Single forward pass over scanner records producing [`SolutionModel`]
pub struct SolutionModelBuilder {
    path: Option<PathBuf>,
    directory: Option<PathBuf>,
    format_version: u32,
    visual_studio_version: Option<String>,
    minimum_visual_studio_version: Option<String>,
    product: Option<String>,
    projects: Vec<ProjectEntry>,
    projects_by_guid: HashMap<String, ProjectId>,
    solution_configurations: Vec<SolutionConfiguration>,
    project_configuration_entries: HashMap<String, String>,
    nested_edges: Vec<(String, String)>,
    global_sections: Vec<GlobalSection>,
    diagnostics: ParserDiagnostics,
    block: Block,
}

impl SolutionModelBuilder {
    /// `directory` is used to resolve relative project paths and project-of-projects manifests
    #[must_use]
    pub fn new(directory: Option<&Path>) -> Self {
        Self {
            path: None,
            directory: directory.map(Path::to_path_buf),
            format_version: 0,
            visual_studio_version: None,
            minimum_visual_studio_version: None,
            product: None,
            projects: Vec::new(),
            projects_by_guid: HashMap::new(),
            solution_configurations: Vec::new(),
            project_configuration_entries: HashMap::new(),
            nested_edges: Vec::new(),
            global_sections: Vec::new(),
            diagnostics: ParserDiagnostics::default(),
            block: Block::None,
        }
    }

    /// Builder for solution file located at path. Its directory becomes base directory
    #[must_use]
    pub fn for_file(path: &Path) -> Self {
        let mut builder = Self::new(path.parent());
        builder.path = Some(path.to_path_buf());
        builder
    }

    /// Parses solution text
    pub fn build(mut self, contents: &str) -> Result<SolutionModel, SolutionError> {
        let contents = contents.strip_prefix(UTF8_BOM).unwrap_or(contents);
        let mut scanner = Scanner::new(contents);

        self.read_header(&mut scanner)?;

        for line in scanner {
            let line = line?;
            tracing::trace!(line = line.number, "{}", line.record);
            self.accept(line)?;
        }
        self.finish()
    }

    fn read_header(&mut self, scanner: &mut Scanner<'_>) -> Result<(), SolutionError> {
        for _ in 0..HEADER_SEARCH_LINES {
            match scanner.next() {
                Some(Ok(Line {
                    record: Record::Header(version),
                    ..
                })) => return self.format(version),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(e),
                None => break,
            }
        }
        Err(SolutionError::NoHeader)
    }

    fn format(&mut self, version: &str) -> Result<(), SolutionError> {
        let major = parse_version(version).ok_or_else(|| SolutionError::MalformedVersion {
            version: version.to_owned(),
        })?;
        if major < MIN_FORMAT_VERSION {
            return Err(SolutionError::VersionMismatch {
                found: major,
                minimum: MIN_FORMAT_VERSION,
            });
        }
        if major > MAX_FORMAT_VERSION {
            self.diagnostics.comment(format!(
                "Solution format version {version} is newer than the latest known version {MAX_FORMAT_VERSION}. Parsing continues with the latest known grammar"
            ));
            self.diagnostics.code(ErrorCode::UnsupportedVersion);
        }
        self.format_version = major;
        Ok(())
    }

    fn accept(&mut self, line: Line<'_>) -> Result<(), SolutionError> {
        match line.record {
            Record::ProjectHeader(header) => self.project_header(&header),
            Record::ProjectEnd { implicit } => {
                if implicit {
                    self.missing_end();
                }
                self.block = Block::None;
            }
            Record::ProjectSectionStart { kind, .. } => {
                if let Block::Project(id) = self.block {
                    let kind = match kind {
                        "ProjectDependencies" => ProjectSectionKind::Dependencies,
                        "WebsiteProperties" => ProjectSectionKind::WebsiteProperties,
                        "SolutionItems" => ProjectSectionKind::SolutionItems,
                        _ => ProjectSectionKind::Other,
                    };
                    self.block = Block::ProjectSection(id, kind);
                }
            }
            Record::ProjectSectionEnd => {
                if let Block::ProjectSection(id, _) = self.block {
                    self.block = Block::Project(id);
                }
            }
            Record::GlobalStart => self.block = Block::Global,
            Record::GlobalEnd => self.block = Block::None,
            Record::GlobalSectionStart { name, disposition } => {
                let kind = match name {
                    "SolutionConfigurationPlatforms" => GlobalSectionKind::SolutionConfigurations {
                        platform_required: true,
                    },
                    "SolutionConfiguration" => GlobalSectionKind::SolutionConfigurations {
                        platform_required: false,
                    },
                    "ProjectConfigurationPlatforms" | "ProjectConfiguration" => {
                        GlobalSectionKind::ProjectConfigurations
                    }
                    "NestedProjects" => GlobalSectionKind::NestedProjects,
                    _ => {
                        self.global_sections.push(GlobalSection {
                            name: name.to_owned(),
                            disposition: disposition.to_owned(),
                            entries: Vec::new(),
                        });
                        GlobalSectionKind::Other
                    }
                };
                self.block = Block::GlobalSection(kind);
            }
            Record::GlobalSectionEnd => self.block = Block::Global,
            Record::KeyValue { key, value } => self.key_value(line.number, key, value)?,
            Record::NestedProjectEdge { child, parent } => {
                if child.is_empty() || parent.is_empty() {
                    return Err(SolutionError::MalformedNestedProject {
                        line: line.number,
                        text: format!("{child} = {parent}"),
                    });
                }
                self.nested_edges.push((child.to_owned(), parent.to_owned()));
            }
            Record::Text(text) => self.text(line.number, text)?,
            Record::Comment(comment) => {
                if self.product.is_none() && comment.starts_with(PRODUCT_PREFIX) {
                    self.product = Some(comment.to_owned());
                }
            }
            Record::Header(_) => {}
        }
        Ok(())
    }

    fn project_header(&mut self, header: &ProjectHeader<'_>) {
        let key = header.guid.to_uppercase();
        if self.projects_by_guid.contains_key(&key) {
            self.diagnostics.warn(
                ErrorCode::DuplicateProject,
                format!(
                    "Project '{}' uses GUID {} that is already taken. Its definition is ignored",
                    header.name, header.guid
                ),
            );
            self.block = Block::Project(None);
            return;
        }
        let id = self.push_project(ProjectEntry::new(
            header.type_guid,
            header.name,
            header.path,
            header.guid,
        ));
        self.block = Block::Project(Some(id));
    }

    fn push_project(&mut self, entry: ProjectEntry) -> ProjectId {
        let id = ProjectId(self.projects.len());
        self.projects_by_guid.insert(entry.guid.to_uppercase(), id);
        self.projects.push(entry);
        id
    }

    fn missing_end(&mut self) {
        let name = match self.block {
            Block::Project(Some(id)) | Block::ProjectSection(Some(id), _) => {
                self.projects[id.0].display_name.clone()
            }
            _ => return,
        };
        self.diagnostics.warn(
            ErrorCode::ProjectMissingEnd,
            format!("Project '{name}' has no EndProject line"),
        );
    }

    fn key_value(&mut self, number: usize, key: &str, value: &str) -> Result<(), SolutionError> {
        match self.block {
            Block::None => {
                if key == VISUAL_STUDIO_VERSION {
                    self.visual_studio_version = parse_stamp(value);
                    if self.visual_studio_version.is_none() {
                        tracing::debug!(stamp = value, "malformed visual studio version ignored");
                    }
                } else if key == MINIMUM_VISUAL_STUDIO_VERSION {
                    self.minimum_visual_studio_version = parse_stamp(value);
                }
            }
            Block::ProjectSection(Some(id), kind) => match kind {
                ProjectSectionKind::Dependencies => {
                    if !is_guid(key) {
                        return Err(SolutionError::MalformedProjectDependency {
                            line: number,
                            text: format!("{key} = {value}"),
                        });
                    }
                    let deps = &mut self.projects[id.0].dependency_guids;
                    if !deps.iter().any(|d| d.eq_ignore_ascii_case(key)) {
                        deps.push(key.to_owned());
                    }
                }
                ProjectSectionKind::WebsiteProperties => self.website_property(id, key, value),
                ProjectSectionKind::SolutionItems => self.projects[id.0].items.push(key.to_owned()),
                ProjectSectionKind::Other => {}
            },
            Block::GlobalSection(kind) => match kind {
                GlobalSectionKind::SolutionConfigurations { platform_required } => {
                    if let Some(c) =
                        config::solution_configuration(number, key, value, platform_required)?
                    {
                        if !self.solution_configurations.contains(&c) {
                            self.solution_configurations.push(c);
                        }
                    }
                }
                GlobalSectionKind::ProjectConfigurations => {
                    self.project_configuration_entries
                        .insert(key.to_uppercase(), value.to_owned());
                }
                GlobalSectionKind::NestedProjects => {}
                GlobalSectionKind::Other => {
                    if let Some(section) = self.global_sections.last_mut() {
                        section.entries.push((key.to_owned(), value.to_owned()));
                    }
                }
            },
            Block::Project(_) | Block::ProjectSection(None, _) | Block::Global => {}
        }
        Ok(())
    }

    fn text(&mut self, number: usize, text: &str) -> Result<(), SolutionError> {
        match self.block {
            Block::GlobalSection(GlobalSectionKind::NestedProjects) => {
                Err(SolutionError::MalformedNestedProject {
                    line: number,
                    text: text.to_owned(),
                })
            }
            Block::GlobalSection(GlobalSectionKind::SolutionConfigurations { .. }) => {
                Err(SolutionError::InvalidSolutionConfigurationEntry {
                    line: number,
                    text: text.to_owned(),
                })
            }
            Block::ProjectSection(Some(id), ProjectSectionKind::SolutionItems) => {
                self.projects[id.0].items.push(text.to_owned());
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn website_property(&mut self, id: ProjectId, key: &str, value: &str) {
        let Some(website) = self.projects[id.0].website.as_mut() else {
            return;
        };
        let value = unescape(value.trim_matches('"'));
        if key == "ProjectReferences" {
            for reference in crate::msbuild::split_list(&value) {
                let Some((guid, assembly)) = reference
                    .split_once('|')
                    .map(|(g, a)| (g.trim(), a))
                    .filter(|(g, _)| is_guid(g))
                else {
                    tracing::warn!(reference, "website reference is not a project and is skipped");
                    continue;
                };
                website.project_references.push(WebsiteReference {
                    guid: guid.to_owned(),
                    assembly: assembly.trim().to_owned(),
                });
            }
        } else if key == "TargetFrameworkMoniker" {
            website.target_framework_moniker = Some(value);
        } else if let Some((configuration, parameter)) = key.split_once(".AspNetCompiler.") {
            website
                .aspnet_configurations
                .entry(configuration.to_owned())
                .or_default()
                .insert(parameter.to_owned(), value);
        }
    }

    fn finish(mut self) -> Result<SolutionModel, SolutionError> {
        if matches!(self.block, Block::Project(_) | Block::ProjectSection(..)) {
            self.missing_end();
        }
        self.expand_etp_projects();
        self.link_website_references();
        self.nest_projects()?;
        self.check_dependencies()?;
        self.map_configurations()?;
        self.assign_unique_names()?;
        self.resolve_paths();

        tracing::debug!(
            projects = self.projects.len(),
            configurations = self.solution_configurations.len(),
            "solution parsed"
        );

        Ok(SolutionModel {
            path: self.path,
            directory: self.directory.unwrap_or_default(),
            format_version: self.format_version,
            visual_studio_version: self.visual_studio_version,
            minimum_visual_studio_version: self.minimum_visual_studio_version,
            product: self.product,
            projects: self.projects,
            projects_by_guid: self.projects_by_guid,
            solution_configurations: self.solution_configurations,
            global_sections: self.global_sections,
            diagnostics: self.diagnostics,
        })
    }

    /// Appends projects listed by project-of-projects manifests. Failures stay attached to
    /// the manifest project and never abort the parse.
    fn expand_etp_projects(&mut self) {
        let Some(directory) = self.directory.clone() else {
            return;
        };
        let mut ix = 0;
        while ix < self.projects.len() {
            if self.projects[ix].kind == ProjectKind::EtpSubProject {
                if let Err(reason) = self.expand_etp(&directory, ix) {
                    let name = self.projects[ix].display_name.clone();
                    self.diagnostics.warn(
                        ErrorCode::EtpProjectError,
                        format!("Project '{name}' manifest cannot be loaded: {reason}"),
                    );
                    self.projects[ix].etp_error = Some(reason);
                }
            }
            ix += 1;
        }
    }

    fn expand_etp(&mut self, directory: &Path, ix: usize) -> Result<(), String> {
        let relative = self.projects[ix].relative_path.clone();
        let manifest = EtpManifest::from_path(make_path(directory, &relative))?;
        let base = relative
            .rfind(['\\', '/'])
            .map_or("", |pos| &relative[..=pos])
            .to_owned();
        for reference in manifest.references() {
            let file = reference.file.trim();
            if file.is_empty() {
                continue;
            }
            let Some(guid) = reference.guid.as_deref().map(str::trim).filter(|g| is_guid(g))
            else {
                self.diagnostics.warn(
                    ErrorCode::EtpProjectError,
                    format!("Reference '{file}' in '{relative}' has no project GUID and is skipped"),
                );
                continue;
            };
            if self.projects_by_guid.contains_key(&guid.to_uppercase()) {
                continue;
            }
            let path = format!("{base}{file}");
            let name = file
                .rsplit(['\\', '/'])
                .next()
                .and_then(|f| f.rsplit_once('.').map(|(stem, _)| stem).or(Some(f)))
                .unwrap_or(file);
            tracing::trace!(project = name, manifest = %relative, "manifest reference added");
            self.push_project(ProjectEntry::new("", name, &path, guid));
        }
        Ok(())
    }

    fn link_website_references(&mut self) {
        for entry in &mut self.projects {
            let Some(website) = entry.website.as_ref() else {
                continue;
            };
            for reference in &website.project_references {
                if !entry
                    .dependency_guids
                    .iter()
                    .any(|d| d.eq_ignore_ascii_case(&reference.guid))
                {
                    entry.dependency_guids.push(reference.guid.clone());
                }
            }
        }
    }

    fn nest_projects(&mut self) -> Result<(), SolutionError> {
        for (child, parent) in std::mem::take(&mut self.nested_edges) {
            let child_id = self.projects_by_guid.get(&child.to_uppercase()).copied().ok_or_else(
                || SolutionError::NestedProjectUndefined {
                    child: child.clone(),
                    parent: parent.clone(),
                },
            )?;
            let entry = &self.projects[child_id.0];
            let parent_id = self.projects_by_guid.get(&parent.to_uppercase()).copied().ok_or_else(
                || SolutionError::NestedProjectParentUndefined {
                    name: entry.display_name.clone(),
                    guid: entry.guid.clone(),
                    parent: parent.clone(),
                },
            )?;
            let assigned = entry.parent;
            match assigned {
                Some(existing) if existing != parent_id => {
                    return Err(SolutionError::NestedProjectMultipleParents {
                        name: entry.display_name.clone(),
                        guid: entry.guid.clone(),
                        first: self.projects[existing.0].guid.clone(),
                        second: parent,
                    });
                }
                _ => self.projects[child_id.0].parent = Some(parent_id),
            }
        }

        for start in 0..self.projects.len() {
            let mut seen = HashSet::new();
            let mut current = Some(ProjectId(start));
            while let Some(id) = current {
                if !seen.insert(id) {
                    let entry = &self.projects[start];
                    return Err(SolutionError::NestedProjectCycle {
                        name: entry.display_name.clone(),
                        guid: entry.guid.clone(),
                    });
                }
                current = self.projects[id.0].parent;
            }
        }
        Ok(())
    }

    fn check_dependencies(&self) -> Result<(), SolutionError> {
        for entry in &self.projects {
            if let Some(missing) = entry
                .dependency_guids
                .iter()
                .find(|d| !self.projects_by_guid.contains_key(&d.to_uppercase()))
            {
                return Err(SolutionError::MissingDependency {
                    project: entry.display_name.clone(),
                    guid: missing.clone(),
                });
            }
        }
        Ok(())
    }

    fn map_configurations(&mut self) -> Result<(), SolutionError> {
        let mapper = ConfigurationMapper::new(&self.project_configuration_entries);
        for entry in &mut self.projects {
            if entry.is_solution_folder() {
                continue;
            }
            entry.project_configurations =
                mapper.map_project(&entry.guid, &self.solution_configurations)?;
        }
        tracing::debug!("configurations mapped");
        Ok(())
    }

    /// Qualifies names with solution folder path, cleanses characters that cannot appear in
    /// target names and resolves collisions. First project keeps normalized name, later ones
    /// that only collide after normalization get `_GUID` suffix.
    fn assign_unique_names(&mut self) -> Result<(), SolutionError> {
        let mut original_names = HashSet::new();
        let mut unique_names = HashSet::new();

        for ix in 0..self.projects.len() {
            let (original, mut unique) = self.qualified_names(ProjectId(ix));
            if self.projects[ix].is_solution_folder() {
                self.projects[ix].unique_name = unique;
                continue;
            }
            if !original_names.insert(original.to_lowercase()) {
                return Err(SolutionError::DuplicateProject { name: original });
            }
            if !unique_names.insert(unique.to_lowercase()) {
                let disambiguated = format!("{unique}_{}", self.projects[ix].bare_guid());
                tracing::trace!(from = %unique, to = %disambiguated, "project name disambiguated");
                unique_names.insert(disambiguated.to_lowercase());
                unique = disambiguated;
            }
            self.projects[ix].unique_name = unique;
        }
        Ok(())
    }

    fn qualified_names(&self, id: ProjectId) -> (String, String) {
        let mut chain = vec![id];
        let mut current = self.projects[id.0].parent;
        while let Some(p) = current {
            chain.push(p);
            current = self.projects[p.0].parent;
        }
        let names = chain.iter().rev().map(|p| self.projects[p.0].display_name.as_str());
        let original = names.clone().collect::<Vec<_>>().join("\\");
        let unique = names.map(cleanse).collect::<Vec<_>>().join("\\");
        (original, unique)
    }

    fn resolve_paths(&mut self) {
        let Some(directory) = self.directory.as_deref() else {
            return;
        };
        for entry in &mut self.projects {
            if entry.is_solution_folder() || is_url(&entry.relative_path) {
                continue;
            }
            entry.absolute_path = normalize(&make_path(directory, &entry.relative_path));
        }
    }
}

/// Accepts `major.minor[.build[.revision]]` returning major
fn parse_version(version: &str) -> Option<u32> {
    let parts: Vec<&str> = version.split('.').collect();
    if !(2..=4).contains(&parts.len()) {
        return None;
    }
    let mut numbers = parts.iter().map(|p| p.parse::<u32>());
    let major = numbers.next()?.ok()?;
    numbers.all(|n| n.is_ok()).then_some(major)
}

/// Takes first whitespace separated token of the stamp when it is a well formed dotted version
fn parse_stamp(value: &str) -> Option<String> {
    let token = value.split_whitespace().next()?;
    parse_version(token).map(|_| token.to_owned())
}

fn is_guid(s: &str) -> bool {
    s.len() > 2 && s.starts_with('{') && s.ends_with('}')
}

fn is_url(s: &str) -> bool {
    s.contains("://")
}

fn cleanse(name: &str) -> String {
    name.replace(CLEANSED_CHARS, "_")
}

/// Decodes `%XX` escapes used in web site properties
fn unescape(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(pos) = rest.find('%') {
        result.push_str(&rest[..pos]);
        let escaped = rest
            .get(pos + 1..pos + 3)
            .and_then(|hex| u8::from_str_radix(hex, 16).ok())
            .filter(u8::is_ascii);
        match escaped {
            Some(b) => {
                result.push(char::from(b));
                rest = &rest[pos + 3..];
            }
            None => {
                result.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    result.push_str(rest);
    result
}

#[must_use]
#[cfg(not(target_os = "windows"))]
pub fn make_path(dir: &Path, relative: &str) -> PathBuf {
    // Converts all possible Windows paths into Unix ones
    relative
        .split('\\')
        .fold(PathBuf::from(&dir), |pb, s| pb.join(s))
}

#[must_use]
#[cfg(target_os = "windows")]
pub fn make_path(dir: &Path, relative: &str) -> PathBuf {
    PathBuf::from(&dir).join(relative)
}

/// Lexically removes `.` and `..` components
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            c => result.push(c),
        }
    }
    result
}
