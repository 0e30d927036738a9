use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::error::SolutionError;
use crate::graph::ProjectGraphPlan;
use crate::model::{SolutionConfiguration, SolutionModel};

const TRUE: &str = "True";
const FALSE: &str = "False";

/// Per solution configuration payload listing buildable projects with their mapped
/// configuration and dependencies.
///
/// Serialized as XML:
///
/// ```xml
/// <SolutionConfiguration>
///   <ProjectConfiguration Project="{GUID}" AbsolutePath="/src/a/a.csproj" BuildProjectInSolution="True" Configuration="Debug|AnyCPU">
///     <ProjectDependency Project="{GUID}" />
///   </ProjectConfiguration>
/// </SolutionConfiguration>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionConfigurationContents {
    #[serde(rename = "ProjectConfiguration", default)]
    pub projects: Vec<ProjectConfigurationEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfigurationEntry {
    #[serde(rename = "Project")]
    pub project: String,
    #[serde(rename = "AbsolutePath")]
    pub absolute_path: String,
    #[serde(rename = "BuildProjectInSolution")]
    pub build_project_in_solution: String,
    #[serde(rename = "Configuration")]
    pub configuration: String,
    #[serde(rename = "ProjectDependency", default)]
    pub dependencies: Vec<ProjectDependencyEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectDependencyEntry {
    #[serde(rename = "Project")]
    pub project: String,
}

impl ProjectConfigurationEntry {
    #[must_use]
    pub fn builds(&self) -> bool {
        self.build_project_in_solution.eq_ignore_ascii_case(TRUE)
    }
}

impl SolutionConfigurationContents {
    /// Collects buildable projects mapped for the configuration, in build order
    #[must_use]
    pub fn generate(
        model: &SolutionModel,
        plan: &ProjectGraphPlan,
        configuration: &SolutionConfiguration,
    ) -> Self {
        let projects = plan
            .buildable_in_order()
            .filter_map(|guid| model.find_by_guid(guid))
            .filter_map(|entry| {
                let mapped = entry.project_configurations.get(&configuration.full_name)?;
                Some(ProjectConfigurationEntry {
                    project: entry.guid.clone(),
                    absolute_path: entry.absolute_path.display().to_string(),
                    build_project_in_solution: if mapped.include_in_build { TRUE } else { FALSE }
                        .to_owned(),
                    configuration: mapped.full_name.clone(),
                    dependencies: plan
                        .dependencies_of(&entry.guid)
                        .iter()
                        .map(|d| ProjectDependencyEntry { project: d.clone() })
                        .collect(),
                })
            })
            .collect();
        Self { projects }
    }

    /// Finds entry by project GUID ignoring case
    #[must_use]
    pub fn find(&self, guid: &str) -> Option<&ProjectConfigurationEntry> {
        self.projects
            .iter()
            .find(|p| p.project.eq_ignore_ascii_case(guid))
    }

    #[must_use]
    pub fn to_xml(&self) -> String {
        let mut xml = String::from("<SolutionConfiguration>");
        for p in &self.projects {
            let _ = write!(
                xml,
                "<ProjectConfiguration Project=\"{}\" AbsolutePath=\"{}\" BuildProjectInSolution=\"{}\" Configuration=\"{}\">",
                escape(&p.project),
                escape(&p.absolute_path),
                escape(&p.build_project_in_solution),
                escape(&p.configuration),
            );
            for d in &p.dependencies {
                let _ = write!(xml, "<ProjectDependency Project=\"{}\" />", escape(&d.project));
            }
            xml.push_str("</ProjectConfiguration>");
        }
        xml.push_str("</SolutionConfiguration>");
        xml
    }

    pub fn from_xml(xml: &str) -> Result<Self, SolutionError> {
        let mut de = serde_xml_rs::Deserializer::new_from_reader(xml.as_bytes())
            .non_contiguous_seq_elements(true);
        SolutionConfigurationContents::deserialize(&mut de).map_err(|e| {
            SolutionError::InvalidConfigurationContents {
                reason: e.to_string(),
            }
        })
    }
}

fn escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => result.push_str("&amp;"),
            '<' => result.push_str("&lt;"),
            '>' => result.push_str("&gt;"),
            '"' => result.push_str("&quot;"),
            '\'' => result.push_str("&apos;"),
            c => result.push(c),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyResolver;
    use crate::parser::SolutionModelBuilder;

    const SOLUTION: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "A&B", "A\A.csproj", "{A1000000-0000-0000-0000-000000000000}"
	ProjectSection(ProjectDependencies) = postProject
		{B1000000-0000-0000-0000-000000000000} = {B1000000-0000-0000-0000-000000000000}
	EndProjectSection
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "B", "B\B.csproj", "{B1000000-0000-0000-0000-000000000000}"
EndProject
Project("{2150E333-8FDC-42A3-9474-1A3956D46DE8}") = "F", "F", "{F1000000-0000-0000-0000-000000000000}"
EndProject
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Debug|Any CPU = Debug|Any CPU
		Release|Any CPU = Release|Any CPU
	EndGlobalSection
	GlobalSection(ProjectConfigurationPlatforms) = postSolution
		{A1000000-0000-0000-0000-000000000000}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
		{A1000000-0000-0000-0000-000000000000}.Debug|Any CPU.Build.0 = Debug|Any CPU
		{B1000000-0000-0000-0000-000000000000}.Debug|Any CPU.ActiveCfg = Debug|x64
		{A1000000-0000-0000-0000-000000000000}.Release|Any CPU.ActiveCfg = Release|Any CPU
	EndGlobalSection
EndGlobal
"#;

    fn contents(configuration: usize) -> SolutionConfigurationContents {
        let model = SolutionModelBuilder::new(None).build(SOLUTION).unwrap();
        let plan = DependencyResolver::new(&model).resolve().unwrap();
        let sc = &model.solution_configurations()[configuration];
        SolutionConfigurationContents::generate(&model, &plan, sc)
    }

    #[test]
    fn generate_lists_mapped_projects_in_build_order() {
        // Arrange

        // Act
        let actual = contents(0);

        // Assert
        let guids: Vec<_> = actual.projects.iter().map(|p| p.project.as_str()).collect();
        assert_eq!(
            guids,
            vec![
                "{B1000000-0000-0000-0000-000000000000}",
                "{A1000000-0000-0000-0000-000000000000}"
            ]
        );
        assert!(!actual.projects[0].builds());
        assert_eq!(actual.projects[0].configuration, "Debug|x64");
        assert!(actual.projects[1].builds());
        assert_eq!(actual.projects[1].configuration, "Debug|AnyCPU");
        assert_eq!(
            actual.projects[1].dependencies,
            vec![ProjectDependencyEntry {
                project: "{B1000000-0000-0000-0000-000000000000}".to_owned()
            }]
        );
    }

    #[test]
    fn generate_skips_projects_unmapped_for_configuration() {
        // Arrange

        // Act
        let actual = contents(1);

        // Assert
        assert_eq!(actual.projects.len(), 1);
        assert!(actual.find("{a1000000-0000-0000-0000-000000000000}").is_some());
        assert!(!actual.projects[0].builds());
    }

    #[test]
    fn xml_read_back() {
        // Arrange
        let expected = contents(0);
        let xml = expected.to_xml();

        // Act
        let actual = SolutionConfigurationContents::from_xml(&xml).unwrap();

        // Assert
        assert_eq!(actual, expected);
    }

    #[test]
    fn empty_contents_read_back() {
        // Arrange
        let xml = SolutionConfigurationContents::default().to_xml();

        // Act
        let actual = SolutionConfigurationContents::from_xml(&xml).unwrap();

        // Assert
        assert!(actual.projects.is_empty());
    }

    #[test]
    fn malformed_xml_rejected() {
        // Arrange
        let xml = "<SolutionConfiguration><ProjectConfiguration";

        // Act
        let actual = SolutionConfigurationContents::from_xml(xml);

        // Assert
        assert!(matches!(
            actual,
            Err(SolutionError::InvalidConfigurationContents { .. })
        ));
    }

    #[test]
    fn escape_test() {
        // Arrange

        // Act
        let actual = escape(r#"a&b<c>"d'"#);

        // Assert
        assert_eq!(actual, "a&amp;b&lt;c&gt;&quot;d&apos;");
    }
}
