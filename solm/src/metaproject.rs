//! Synthesis of the top level project that builds a solution.
//!
//! The generated [`SynthesizedProject`] holds one invocation target per buildable project,
//! orchestration targets (`Build`, `Clean`, `Rebuild`, `Publish`), helper targets and
//! traversal targets for custom requested names. It is handed to a build engine that
//! executes targets in the order given by [`SynthesizedProject::target_schedule`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Display};
use std::path::{Path, PathBuf};

use itertools::Itertools;
use serde::Serialize;

use crate::blob::SolutionConfigurationContents;
use crate::error::{ErrorCode, SolutionError};
use crate::filter::SolutionFilter;
use crate::graph::{DependencyResolver, ProjectGraphPlan};
use crate::model::{ProjectEntry, SolutionConfiguration, SolutionModel};
use crate::msbuild::{self, ImportedProject, ImportedTarget, ProjectKind};

pub const COLLECTED_OUTPUT_ITEM: &str = "CollectedBuildOutput";
pub const DEFAULT_TOOLS_VERSION: &str = "Current";

const CONFIGURATION: &str = "Configuration";
const PLATFORM: &str = "Platform";
const IMPORT_DIRECTORY_PROPS: &str = "ImportDirectorySolutionProps";
const IMPORT_DIRECTORY_TARGETS: &str = "ImportDirectorySolutionTargets";
const DIRECTORY_PROPS_PATH: &str = "DirectorySolutionPropsPath";
const DIRECTORY_TARGETS_PATH: &str = "DirectorySolutionTargetsPath";
const DIRECTORY_PROPS_FILE: &str = "Directory.Solution.props";
const DIRECTORY_TARGETS_FILE: &str = "Directory.Solution.targets";

/// Built-in and helper target names in lower case mapped to their canonical spelling
static RESERVED_TARGETS: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "build" => "Build",
    "clean" => "Clean",
    "rebuild" => "Rebuild",
    "publish" => "Publish",
    "validatesolutionconfiguration" => "ValidateSolutionConfiguration",
    "validateprojects" => "ValidateProjects",
    "getsolutionconfigurationcontents" => "GetSolutionConfigurationContents",
};

/// Orchestration targets invoking every selected project
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Orchestration {
    Build,
    Clean,
    Rebuild,
    Publish,
}

impl Orchestration {
    pub const ALL: [Orchestration; 4] = [
        Orchestration::Build,
        Orchestration::Clean,
        Orchestration::Rebuild,
        Orchestration::Publish,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Orchestration::Build => "Build",
            Orchestration::Clean => "Clean",
            Orchestration::Rebuild => "Rebuild",
            Orchestration::Publish => "Publish",
        }
    }

    /// Target forwarded to real projects. `None` means project default targets
    #[must_use]
    pub fn project_target(self) -> Option<&'static str> {
        match self {
            Orchestration::Build => None,
            other => Some(other.name()),
        }
    }

    /// Clean walks projects from dependents to dependencies
    #[must_use]
    pub fn reversed(self) -> bool {
        self == Orchestration::Clean
    }

    fn collects_outputs(self) -> bool {
        self != Orchestration::Clean
    }
}

/// Helper targets present in every synthesized project
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Helper {
    ValidateSolutionConfiguration,
    ValidateProjects,
    GetSolutionConfigurationContents,
}

impl Helper {
    pub const ALL: [Helper; 3] = [
        Helper::ValidateSolutionConfiguration,
        Helper::ValidateProjects,
        Helper::GetSolutionConfigurationContents,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Helper::ValidateSolutionConfiguration => "ValidateSolutionConfiguration",
            Helper::ValidateProjects => "ValidateProjects",
            Helper::GetSolutionConfigurationContents => "GetSolutionConfigurationContents",
        }
    }
}

/// Canonical spelling of a reserved target name, case is ignored
#[must_use]
pub fn reserved_target(name: &str) -> Option<&'static str> {
    RESERVED_TARGETS.get(name.to_lowercase().as_str()).copied()
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Stage {
    Parsed,
    ConfigurationMapped,
    DependenciesResolved,
    TargetsSynthesized,
    Finalized,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Parsed => "Parsed",
            Stage::ConfigurationMapped => "ConfigurationMapped",
            Stage::DependenciesResolved => "DependenciesResolved",
            Stage::TargetsSynthesized => "TargetsSynthesized",
            Stage::Finalized => "Finalized",
        };
        write!(f, "{s}")
    }
}

/// What the caller wants synthesized
#[derive(Debug, Clone, Default)]
pub struct SynthesisRequest {
    /// Forwarded unchanged into the property table. `Configuration` and `Platform`
    /// select the solution configuration
    pub global_properties: BTreeMap<String, String>,
    pub tools_version: Option<String>,
    /// Entry targets, `Build` when empty
    pub targets: Vec<String>,
    /// Invalid solution configuration produces a warning and an empty plan instead of error
    pub skip_invalid_configurations: bool,
    pub filter: Option<SolutionFilter>,
}

impl SynthesisRequest {
    fn global(&self, name: &str) -> Option<&str> {
        self.global_properties
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    fn import_enabled(&self, name: &str) -> bool {
        !self
            .global(name)
            .is_some_and(|v| v.trim().eq_ignore_ascii_case("false"))
    }
}

/// Source of files imported into synthesized project
pub trait ImportLoader {
    fn exists(&self, path: &Path) -> bool;
    fn load(&self, path: &Path) -> Result<ImportedProject, SolutionError>;
}

/// Reads imports from disk
#[derive(Debug, Default, Copy, Clone)]
pub struct FileSystemImports;

impl ImportLoader for FileSystemImports {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> Result<ImportedProject, SolutionError> {
        ImportedProject::from_path(path)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
pub enum ImportSlot {
    DirectorySolutionProps,
    BeforeSolution,
    AfterSolution,
    DirectorySolutionTargets,
}

impl ImportSlot {
    /// Whether import precedes generated content
    #[must_use]
    pub fn is_before(self) -> bool {
        matches!(
            self,
            ImportSlot::DirectorySolutionProps | ImportSlot::BeforeSolution
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectImport {
    pub path: PathBuf,
    pub slot: ImportSlot,
    pub targets: Vec<ImportedTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedItem {
    pub item_type: String,
    pub include: String,
    pub metadata: BTreeMap<String, String>,
}

/// Call of a target inside real project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectInvocation {
    pub project_guid: String,
    pub project_path: String,
    /// `None` builds project default targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub properties: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools_version: Option<String>,
    pub skip_nonexistent_targets: bool,
    /// Item that receives target outputs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_item: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "task")]
pub enum TaskStep {
    Invoke(ProjectInvocation),
    AspNetCompiler {
        project_guid: String,
        parameters: BTreeMap<String, String>,
    },
    Message {
        text: String,
    },
    Warning {
        code: ErrorCode,
        text: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind")]
pub enum TargetKind {
    Orchestration { target: Orchestration },
    Helper { target: Helper },
    /// Builds single project with its default targets
    Project { project_guid: String },
    /// Calls named target of single project
    ProjectTarget { project_guid: String, target: String },
    /// Custom requested target called on every selected project
    Traversal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedTarget {
    pub name: String,
    pub kind: TargetKind,
    pub depends_on: Vec<String>,
    pub steps: Vec<TaskStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outputs: Option<String>,
}

impl SynthesizedTarget {
    fn new(name: String, kind: TargetKind) -> Self {
        Self {
            name,
            kind,
            depends_on: Vec::new(),
            steps: Vec::new(),
            outputs: None,
        }
    }

    /// Project invocations in step order
    pub fn invocations(&self) -> impl Iterator<Item = &ProjectInvocation> {
        self.steps.iter().filter_map(|s| match s {
            TaskStep::Invoke(i) => Some(i),
            _ => None,
        })
    }
}

/// In-memory project that builds the solution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesizedProject {
    pub tools_version: String,
    pub default_targets: Vec<String>,
    pub initial_targets: Vec<String>,
    pub properties: BTreeMap<String, String>,
    pub items: Vec<SynthesizedItem>,
    pub imports: Vec<ProjectImport>,
    pub targets: Vec<SynthesizedTarget>,
    pub warnings: Vec<String>,
}

impl SynthesizedProject {
    /// Finds synthesized target ignoring case
    #[must_use]
    pub fn target(&self, name: &str) -> Option<&SynthesizedTarget> {
        self.targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    fn imported_targets(&self) -> impl Iterator<Item = &ImportedTarget> {
        self.imports.iter().flat_map(|i| i.targets.iter())
    }

    fn imported_target(&self, name: &str) -> Option<&ImportedTarget> {
        self.imported_targets()
            .find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Order in which the engine runs targets to execute `entry`: dependencies first, then
    /// imported targets hooked before, the target itself and imported targets hooked after
    #[must_use]
    pub fn target_schedule(&self, entry: &str) -> Vec<String> {
        let mut schedule = Vec::new();
        let mut visited = HashSet::new();
        self.schedule(entry, &mut visited, &mut schedule);
        schedule
    }

    fn schedule(&self, name: &str, visited: &mut HashSet<String>, schedule: &mut Vec<String>) {
        if !visited.insert(name.to_lowercase()) {
            return;
        }
        let (canonical, depends_on): (String, Vec<String>) =
            if let Some(imported) = self.imported_target(name) {
                let deps = imported
                    .depends_on_targets
                    .as_deref()
                    .map(|d| msbuild::split_list(d).map(str::to_owned).collect())
                    .unwrap_or_default();
                (imported.name.clone(), deps)
            } else if let Some(target) = self.target(name) {
                (target.name.clone(), target.depends_on.clone())
            } else {
                return;
            };

        for dep in &depends_on {
            self.schedule(dep, visited, schedule);
        }
        for before in self.hooked(&canonical, false) {
            self.schedule(&before, visited, schedule);
        }
        schedule.push(canonical.clone());
        for after in self.hooked(&canonical, true) {
            self.schedule(&after, visited, schedule);
        }
    }

    /// Imported targets listing `target` in their `AfterTargets` or `BeforeTargets`
    fn hooked(&self, target: &str, after: bool) -> Vec<String> {
        self.imported_targets()
            .filter(|t| {
                let list = if after {
                    &t.after_targets
                } else {
                    &t.before_targets
                };
                list.as_deref().is_some_and(|l| {
                    msbuild::split_list(l).any(|n| n.eq_ignore_ascii_case(target))
                })
            })
            .map(|t| t.name.clone())
            .collect()
    }

    /// Aggregates per project outputs in the order projects are invoked by target
    /// dropping duplicates
    #[must_use]
    pub fn relay_outputs(
        &self,
        target: &str,
        per_project_outputs: &BTreeMap<String, Vec<String>>,
    ) -> Vec<String> {
        let Some(target) = self.target(target) else {
            return Vec::new();
        };
        target
            .invocations()
            .filter(|i| i.output_item.is_some())
            .filter_map(|i| {
                per_project_outputs
                    .iter()
                    .find(|(g, _)| g.eq_ignore_ascii_case(&i.project_guid))
                    .map(|(_, o)| o)
            })
            .flatten()
            .unique()
            .cloned()
            .collect()
    }
}

/// Synthesizes [`SynthesizedProject`] from parsed solution
pub struct MetaprojectGenerator<'a, L: ImportLoader = FileSystemImports> {
    model: &'a SolutionModel,
    request: &'a SynthesisRequest,
    loader: L,
}

impl<'a> MetaprojectGenerator<'a> {
    #[must_use]
    pub fn new(model: &'a SolutionModel, request: &'a SynthesisRequest) -> Self {
        Self {
            model,
            request,
            loader: FileSystemImports,
        }
    }
}

/// Per run state
struct Synthesis<'a> {
    model: &'a SolutionModel,
    request: &'a SynthesisRequest,
    plan: ProjectGraphPlan,
    configuration: Option<&'a SolutionConfiguration>,
    tools_version: Option<String>,
    names: HashMap<String, String>,
    imported_names: HashSet<String>,
    project: SynthesizedProject,
}

impl<'a, L: ImportLoader> MetaprojectGenerator<'a, L> {
    /// Replaces loader of imported files
    pub fn with_loader<M: ImportLoader>(self, loader: M) -> MetaprojectGenerator<'a, M> {
        MetaprojectGenerator {
            model: self.model,
            request: self.request,
            loader,
        }
    }

    pub fn generate(&self) -> Result<SynthesizedProject, SolutionError> {
        stage(Stage::Parsed);
        let tools_version = match self.request.tools_version.as_deref() {
            Some(v) => Some(
                msbuild::resolve_toolset(v)
                    .ok_or_else(|| SolutionError::UnrecognizedToolsVersion {
                        version: v.to_owned(),
                        available: msbuild::available_toolsets(),
                    })?
                    .to_owned(),
            ),
            None => None,
        };

        let (configuration, invalid) = self.select_configuration()?;
        stage(Stage::ConfigurationMapped);

        let mut plan = DependencyResolver::new(self.model).resolve()?;
        if let Some(filter) = &self.request.filter {
            plan = filter.narrow(self.model, &plan)?;
        }
        stage(Stage::DependenciesResolved);

        let mut synthesis = Synthesis {
            model: self.model,
            request: self.request,
            plan,
            configuration,
            tools_version: tools_version.clone(),
            names: HashMap::new(),
            imported_names: HashSet::new(),
            project: SynthesizedProject {
                tools_version: tools_version.unwrap_or_else(|| DEFAULT_TOOLS_VERSION.to_owned()),
                default_targets: Vec::new(),
                initial_targets: vec![
                    Helper::ValidateSolutionConfiguration.name().to_owned(),
                    Helper::ValidateProjects.name().to_owned(),
                ],
                properties: BTreeMap::new(),
                items: Vec::new(),
                imports: Vec::new(),
                targets: Vec::new(),
                warnings: Vec::new(),
            },
        };

        synthesis.imports(&self.loader)?;
        match invalid {
            Some(requested) => synthesis.empty_plan(&requested),
            None => {
                synthesis.project_targets();
                synthesis.orchestration_targets();
                synthesis.helper_targets();
            }
        }
        synthesis.custom_targets();
        stage(Stage::TargetsSynthesized);

        synthesis.properties();
        synthesis.items();
        stage(Stage::Finalized);

        Ok(synthesis.project)
    }

    /// Requested or default solution configuration. Second value is set when requested
    /// configuration is invalid and caller asked to skip it.
    fn select_configuration(
        &self,
    ) -> Result<(Option<&'a SolutionConfiguration>, Option<String>), SolutionError> {
        let model = self.model;
        let configuration = self
            .request
            .global(CONFIGURATION)
            .map(str::to_owned)
            .or_else(|| model.default_configuration_name().map(str::to_owned));
        let platform = self
            .request
            .global(PLATFORM)
            .map(str::to_owned)
            .or_else(|| model.default_platform_name().map(str::to_owned))
            .unwrap_or_default();

        let Some(configuration) = configuration else {
            return Ok((None, None));
        };
        if let Some(found) = model.find_configuration(&configuration, &platform) {
            tracing::debug!(configuration = %found.full_name, "solution configuration selected");
            return Ok((Some(found), None));
        }

        let requested = SolutionConfiguration::new(&configuration, &platform).full_name;
        if self.request.skip_invalid_configurations {
            Ok((None, Some(requested)))
        } else {
            Err(SolutionError::InvalidSolutionConfiguration {
                configuration: requested,
            })
        }
    }
}

fn stage(stage: Stage) {
    tracing::debug!(%stage, "metaproject synthesis");
}

impl<'a> Synthesis<'a> {
    fn imports<L: ImportLoader>(&mut self, loader: &L) -> Result<(), SolutionError> {
        let directory = self.model.directory();
        let mut slots: Vec<(ImportSlot, PathBuf)> = Vec::new();

        if self.request.import_enabled(IMPORT_DIRECTORY_PROPS) {
            if let Some(path) =
                self.directory_import(loader, DIRECTORY_PROPS_PATH, DIRECTORY_PROPS_FILE)
            {
                slots.push((ImportSlot::DirectorySolutionProps, path));
            }
        }
        if let Some(file_name) = self.model.file_name() {
            let before = directory.join(format!("before.{file_name}.targets"));
            if loader.exists(&before) {
                slots.push((ImportSlot::BeforeSolution, before));
            }
            let after = directory.join(format!("after.{file_name}.targets"));
            if loader.exists(&after) {
                slots.push((ImportSlot::AfterSolution, after));
            }
        }
        if self.request.import_enabled(IMPORT_DIRECTORY_TARGETS) {
            if let Some(path) =
                self.directory_import(loader, DIRECTORY_TARGETS_PATH, DIRECTORY_TARGETS_FILE)
            {
                slots.push((ImportSlot::DirectorySolutionTargets, path));
            }
        }

        for (slot, path) in slots {
            let imported = loader.load(&path)?;
            tracing::debug!(
                path = %path.display(),
                ?slot,
                targets = imported.targets.len(),
                "project imported"
            );
            self.imported_names.extend(
                imported
                    .targets
                    .iter()
                    .map(|t| t.name.to_lowercase()),
            );
            self.project.imports.push(ProjectImport {
                path,
                slot,
                targets: imported.targets,
            });
        }
        Ok(())
    }

    /// Explicit path from global property or the nearest file up the directory tree
    fn directory_import<L: ImportLoader>(
        &self,
        loader: &L,
        override_property: &str,
        file_name: &str,
    ) -> Option<PathBuf> {
        if let Some(path) = self.request.global(override_property) {
            let path = PathBuf::from(path);
            return loader.exists(&path).then_some(path);
        }
        let directory = self.model.directory();
        if directory.as_os_str().is_empty() {
            return None;
        }
        directory
            .ancestors()
            .map(|d| d.join(file_name))
            .find(|p| loader.exists(p))
    }

    fn is_imported(&self, name: &str) -> bool {
        self.imported_names.contains(&name.to_lowercase())
    }

    fn push_target(&mut self, target: SynthesizedTarget) {
        if self.is_imported(&target.name) {
            tracing::trace!(target = %target.name, "generated target replaced by imported one");
            return;
        }
        self.project.targets.push(target);
    }

    fn selected(&self) -> Vec<&'a ProjectEntry> {
        let model = self.model;
        self.plan
            .buildable_in_order()
            .filter_map(|g| model.find_by_guid(g))
            .collect()
    }

    /// Target name of project. Names clashing with reserved or imported targets get
    /// `_GUID` suffix
    fn assign_names(&mut self) {
        let mut taken: HashSet<String> = RESERVED_TARGETS
            .keys()
            .map(|k| (*k).to_owned())
            .chain(self.imported_names.iter().cloned())
            .collect();
        let names: Vec<(String, String)> = self
            .selected()
            .into_iter()
            .map(|p| {
                let mut name = p.unique_name.clone();
                if taken.contains(&name.to_lowercase()) {
                    name = format!("{name}_{}", p.bare_guid());
                }
                taken.insert(name.to_lowercase());
                (p.guid.clone(), name)
            })
            .collect();
        self.names.extend(names);
    }

    fn target_name(&self, guid: &str) -> Option<&str> {
        self.names.get(guid).map(String::as_str)
    }

    fn project_targets(&mut self) {
        self.assign_names();
        for entry in self.selected() {
            let Some(name) = self.target_name(&entry.guid).map(str::to_owned) else {
                continue;
            };
            let deps: Vec<String> = self
                .plan
                .dependencies_of(&entry.guid)
                .iter()
                .filter_map(|d| self.target_name(d).map(str::to_owned))
                .collect();

            let mut main = SynthesizedTarget::new(
                name.clone(),
                TargetKind::Project {
                    project_guid: entry.guid.clone(),
                },
            );
            main.depends_on.clone_from(&deps);
            main.steps = self.project_steps(entry, None, false, true);
            main.outputs = Some(format!("@({COLLECTED_OUTPUT_ITEM})"));
            self.push_target(main);

            for sub in [
                Orchestration::Clean,
                Orchestration::Rebuild,
                Orchestration::Publish,
            ] {
                let mut target = SynthesizedTarget::new(
                    format!("{name}:{}", sub.name()),
                    TargetKind::ProjectTarget {
                        project_guid: entry.guid.clone(),
                        target: sub.name().to_owned(),
                    },
                );
                if !sub.reversed() {
                    target.depends_on =
                        deps.iter().map(|d| format!("{d}:{}", sub.name())).collect();
                }
                target.steps =
                    self.project_steps(entry, sub.project_target(), false, sub.collects_outputs());
                if sub.collects_outputs() {
                    target.outputs = Some(format!("@({COLLECTED_OUTPUT_ITEM})"));
                }
                self.push_target(target);
            }
        }
    }

    /// Steps that run `target` of one project in selected configuration
    fn project_steps(
        &self,
        entry: &ProjectEntry,
        target: Option<&str>,
        skip_nonexistent_targets: bool,
        collect: bool,
    ) -> Vec<TaskStep> {
        let Some(configuration) = self.configuration else {
            return vec![skipped(entry, "")];
        };
        let Some(mapped) = entry
            .project_configurations
            .get(&configuration.full_name)
            .filter(|m| m.include_in_build)
        else {
            return vec![skipped(entry, &configuration.full_name)];
        };

        match entry.kind {
            ProjectKind::WebSite => {
                // Web sites are only compiled, other targets have nothing to run
                if target.is_some_and(|t| {
                    !t.eq_ignore_ascii_case("Build") && !t.eq_ignore_ascii_case("Rebuild")
                }) {
                    return Vec::new();
                }
                let parameters = entry
                    .website
                    .as_ref()
                    .and_then(|w| w.aspnet_configurations.get(&configuration.configuration_name))
                    .cloned();
                match parameters {
                    Some(parameters) => vec![TaskStep::AspNetCompiler {
                        project_guid: entry.guid.clone(),
                        parameters,
                    }],
                    None => vec![skipped(entry, &configuration.full_name)],
                }
            }
            ProjectKind::LegacyVcProj => vec![TaskStep::Warning {
                code: ErrorCode::UnknownProjectType,
                text: format!(
                    "Project file \"{}\" has to be upgraded to the current project format before it can be built",
                    entry.relative_path
                ),
            }],
            ProjectKind::Unknown => vec![TaskStep::Warning {
                code: ErrorCode::UnknownProjectType,
                text: format!(
                    "Project \"{}\" has unknown type {} and is skipped",
                    entry.display_name, entry.type_guid
                ),
            }],
            _ => {
                let mut properties = BTreeMap::new();
                properties.insert(CONFIGURATION.to_owned(), mapped.configuration_name.clone());
                if !mapped.platform_name.is_empty() {
                    properties.insert(PLATFORM.to_owned(), mapped.platform_name.clone());
                }
                properties.insert("BuildingSolutionFile".to_owned(), "true".to_owned());
                vec![TaskStep::Invoke(ProjectInvocation {
                    project_guid: entry.guid.clone(),
                    project_path: entry.absolute_path.display().to_string(),
                    target: target.map(str::to_owned),
                    properties,
                    tools_version: self.tools_version.clone(),
                    skip_nonexistent_targets,
                    output_item: collect.then(|| COLLECTED_OUTPUT_ITEM.to_owned()),
                })]
            }
        }
    }

    fn orchestration_targets(&mut self) {
        let projects = self.selected();
        for orchestration in Orchestration::ALL {
            let mut target = SynthesizedTarget::new(
                orchestration.name().to_owned(),
                TargetKind::Orchestration {
                    target: orchestration,
                },
            );
            let ordered: Box<dyn Iterator<Item = &&ProjectEntry>> = if orchestration.reversed() {
                Box::new(projects.iter().rev())
            } else {
                Box::new(projects.iter())
            };
            target.steps = ordered
                .flat_map(|p| {
                    self.project_steps(
                        p,
                        orchestration.project_target(),
                        false,
                        orchestration.collects_outputs(),
                    )
                })
                .collect();
            if orchestration.collects_outputs() {
                target.outputs = Some(format!("@({COLLECTED_OUTPUT_ITEM})"));
            }
            self.push_target(target);
        }
    }

    fn helper_targets(&mut self) {
        let mut validate = SynthesizedTarget::new(
            Helper::ValidateSolutionConfiguration.name().to_owned(),
            TargetKind::Helper {
                target: Helper::ValidateSolutionConfiguration,
            },
        );
        if let Some(c) = self.configuration {
            validate.steps.push(TaskStep::Message {
                text: format!("Building solution configuration \"{}\".", c.full_name),
            });
        }
        self.push_target(validate);

        let mut projects = SynthesizedTarget::new(
            Helper::ValidateProjects.name().to_owned(),
            TargetKind::Helper {
                target: Helper::ValidateProjects,
            },
        );
        projects.steps = self
            .model
            .iterate_projects()
            .filter(|p| !self.plan.is_buildable(&p.guid))
            .filter(|p| self.plan.build_order.contains(&p.guid))
            .map(|p| TaskStep::Message {
                text: format!(
                    "The project \"{}\" is not buildable and is skipped.",
                    p.display_name
                ),
            })
            .collect();
        self.push_target(projects);

        let mut contents = SynthesizedTarget::new(
            Helper::GetSolutionConfigurationContents.name().to_owned(),
            TargetKind::Helper {
                target: Helper::GetSolutionConfigurationContents,
            },
        );
        contents.outputs = Some("$(CurrentSolutionConfigurationContents)".to_owned());
        self.push_target(contents);
    }

    /// Requested configuration is invalid and caller asked to skip it
    fn empty_plan(&mut self, requested: &str) {
        let text = format!(
            "The specified solution configuration \"{requested}\" is invalid. Nothing is built"
        );
        tracing::warn!("{text}");
        self.project.warnings.push(text.clone());

        let mut validate = SynthesizedTarget::new(
            Helper::ValidateSolutionConfiguration.name().to_owned(),
            TargetKind::Helper {
                target: Helper::ValidateSolutionConfiguration,
            },
        );
        validate.steps.push(TaskStep::Warning {
            code: ErrorCode::InvalidSolutionConfiguration,
            text,
        });
        self.push_target(validate);
        for helper in [Helper::ValidateProjects, Helper::GetSolutionConfigurationContents] {
            self.push_target(SynthesizedTarget::new(
                helper.name().to_owned(),
                TargetKind::Helper { target: helper },
            ));
        }
        for orchestration in Orchestration::ALL {
            self.push_target(SynthesizedTarget::new(
                orchestration.name().to_owned(),
                TargetKind::Orchestration {
                    target: orchestration,
                },
            ));
        }
    }

    fn existing_target(&self, name: &str) -> Option<String> {
        if let Some(t) = self
            .project
            .targets
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            return Some(t.name.clone());
        }
        self.project
            .imports
            .iter()
            .flat_map(|i| i.targets.iter())
            .find(|t| t.name.eq_ignore_ascii_case(name))
            .map(|t| t.name.clone())
            .or_else(|| reserved_target(name).map(str::to_owned))
    }

    /// Requested names resolve to existing targets ignoring case, `Project:Target` names
    /// call one project and anything else becomes a traversal target
    fn custom_targets(&mut self) {
        let requested = if self.request.targets.is_empty() {
            vec![Orchestration::Build.name().to_owned()]
        } else {
            self.request.targets.clone()
        };

        for name in requested {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(existing) = self.existing_target(name) {
                self.project.default_targets.push(existing);
                continue;
            }
            let target = match self.single_project_target(name) {
                Some(target) => target,
                None => self.traversal_target(name),
            };
            tracing::trace!(target = %target.name, "custom target synthesized");
            self.project.default_targets.push(target.name.clone());
            self.push_target(target);
        }
    }

    fn single_project_target(&self, name: &str) -> Option<SynthesizedTarget> {
        let (project, target) = name.split_once(':')?;
        let (guid, _) = self
            .names
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(project))?;
        let entry = self.model.find_by_guid(guid)?;
        let mut synthesized = SynthesizedTarget::new(
            name.to_owned(),
            TargetKind::ProjectTarget {
                project_guid: entry.guid.clone(),
                target: target.to_owned(),
            },
        );
        synthesized.steps = self.project_steps(entry, Some(target), false, true);
        synthesized.outputs = Some(format!("@({COLLECTED_OUTPUT_ITEM})"));
        Some(synthesized)
    }

    fn traversal_target(&self, name: &str) -> SynthesizedTarget {
        let mut target = SynthesizedTarget::new(name.to_owned(), TargetKind::Traversal);
        target.steps = self
            .selected()
            .into_iter()
            .flat_map(|p| self.project_steps(p, Some(name), true, true))
            .collect();
        target.outputs = Some(format!("@({COLLECTED_OUTPUT_ITEM})"));
        target
    }

    fn properties(&mut self) {
        let model = self.model;
        let properties = &mut self.project.properties;

        let requested = self.request.global(CONFIGURATION);
        let (configuration, platform) = match (self.configuration, requested) {
            (Some(c), _) => (c.configuration_name.clone(), c.platform_name.clone()),
            (None, requested) => (
                requested.unwrap_or_default().to_owned(),
                self.request.global(PLATFORM).unwrap_or_default().to_owned(),
            ),
        };
        properties.insert(CONFIGURATION.to_owned(), configuration);
        properties.insert(PLATFORM.to_owned(), platform);
        properties.insert(
            "ProjectToolsVersion".to_owned(),
            self.project.tools_version.clone(),
        );
        properties.insert(
            "VisualStudioVersion".to_owned(),
            format!("{}.0", model.visual_studio_version()),
        );
        properties.insert("BuildingSolutionFile".to_owned(), "true".to_owned());

        let directory = model.directory().display().to_string();
        if !directory.is_empty() {
            let separator = std::path::MAIN_SEPARATOR;
            let directory = if directory.ends_with(separator) {
                directory
            } else {
                format!("{directory}{separator}")
            };
            properties.insert("SolutionDir".to_owned(), directory);
        }
        if let Some(path) = model.path() {
            properties.insert("SolutionPath".to_owned(), path.display().to_string());
            if let Some(file_name) = model.file_name() {
                properties.insert("SolutionFileName".to_owned(), file_name.to_owned());
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                properties.insert("SolutionName".to_owned(), stem.to_owned());
            }
            if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
                properties.insert("SolutionExt".to_owned(), format!(".{ext}"));
            }
        }

        let contents = match self.configuration {
            Some(c) => SolutionConfigurationContents::generate(model, &self.plan, c),
            None => SolutionConfigurationContents::default(),
        };
        properties.insert(
            "CurrentSolutionConfigurationContents".to_owned(),
            contents.to_xml(),
        );

        for (k, v) in &self.request.global_properties {
            properties.insert(k.clone(), v.clone());
        }
    }

    fn items(&mut self) {
        let model = self.model;
        for sc in model.solution_configurations() {
            let contents = SolutionConfigurationContents::generate(model, &self.plan, sc);
            let mut metadata = BTreeMap::new();
            metadata.insert(CONFIGURATION.to_owned(), sc.configuration_name.clone());
            metadata.insert(PLATFORM.to_owned(), sc.platform_name.clone());
            metadata.insert("Content".to_owned(), contents.to_xml());
            self.project.items.push(SynthesizedItem {
                item_type: "SolutionConfiguration".to_owned(),
                include: sc.full_name.clone(),
                metadata,
            });
        }

        let Some(configuration) = self.configuration else {
            return;
        };
        let references: Vec<SynthesizedItem> = self
            .selected()
            .into_iter()
            .filter_map(|p| {
                let mapped = p.project_configurations.get(&configuration.full_name)?;
                let mut metadata = BTreeMap::new();
                metadata.insert("Project".to_owned(), p.guid.clone());
                metadata.insert(CONFIGURATION.to_owned(), mapped.configuration_name.clone());
                metadata.insert(PLATFORM.to_owned(), mapped.platform_name.clone());
                metadata.insert(
                    "BuildProjectInSolution".to_owned(),
                    if mapped.include_in_build { "True" } else { "False" }.to_owned(),
                );
                if let Some(v) = &self.tools_version {
                    metadata.insert("ToolsVersion".to_owned(), v.clone());
                }
                Some(SynthesizedItem {
                    item_type: "ProjectReference".to_owned(),
                    include: p.absolute_path.display().to_string(),
                    metadata,
                })
            })
            .collect();
        self.project.items.extend(references);
    }
}

fn skipped(entry: &ProjectEntry, configuration: &str) -> TaskStep {
    TaskStep::Message {
        text: format!(
            "The project \"{}\" is not selected for building in solution configuration \"{configuration}\".",
            entry.display_name
        ),
    }
}
