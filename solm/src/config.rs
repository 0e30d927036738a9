use std::collections::{BTreeMap, HashMap};

use crate::error::SolutionError;
use crate::model::{ProjectConfigurationInSolution, SolutionConfiguration};

const DEFAULT_CONFIGURATION: &str = "Debug";
const DEFAULT_PLATFORM: &str = "Mixed Platforms";
const ANY_CPU: &str = "Any CPU";
const ANY_CPU_NORMALIZED: &str = "AnyCPU";

/// Resolves active project configuration for every declared solution configuration.
///
/// Built over the raw `ProjectConfigurationPlatforms` (or legacy `ProjectConfiguration`)
/// section. Keys are stored in upper case so lookups ignore case of GUIDs and names.
pub struct ConfigurationMapper<'a> {
    entries: &'a HashMap<String, String>,
}

impl<'a> ConfigurationMapper<'a> {
    #[must_use]
    pub fn new(entries: &'a HashMap<String, String>) -> Self {
        Self { entries }
    }

    /// Maps one project. Solution configurations without `ActiveCfg` line are absent from result.
    pub fn map_project(
        &self,
        guid: &str,
        solution_configurations: &[SolutionConfiguration],
    ) -> Result<BTreeMap<String, ProjectConfigurationInSolution>, SolutionError> {
        let mut result = BTreeMap::new();
        for sc in solution_configurations {
            let active = format!("{guid}.{}.ActiveCfg", sc.full_name).to_uppercase();
            let Some(value) = self.entries.get(&active) else {
                continue;
            };
            let build = format!("{guid}.{}.Build.0", sc.full_name).to_uppercase();
            let mut pc = project_configuration(value).ok_or_else(|| {
                SolutionError::InvalidProjectSolutionConfigurationEntry {
                    guid: guid.to_owned(),
                    value: value.clone(),
                }
            })?;
            pc.include_in_build = self.entries.contains_key(&build);
            tracing::trace!(
                project = guid,
                solution_configuration = %sc.full_name,
                project_configuration = %pc.full_name,
                build = pc.include_in_build,
                "configuration mapped"
            );
            result.insert(sc.full_name.clone(), pc);
        }
        Ok(result)
    }
}

/// Parses project side `Config|Platform` value. More than one pipe is invalid
#[must_use]
pub fn project_configuration(value: &str) -> Option<ProjectConfigurationInSolution> {
    let mut parts = value.split('|');
    let configuration = parts.next().unwrap_or_default().trim();
    let platform = parts.next().map(str::trim).unwrap_or_default();
    if parts.next().is_some() {
        return None;
    }
    let platform = if platform == ANY_CPU {
        ANY_CPU_NORMALIZED
    } else {
        platform
    };
    let full_name = if platform.is_empty() {
        configuration.to_owned()
    } else {
        format!("{configuration}|{platform}")
    };
    Some(ProjectConfigurationInSolution {
        configuration_name: configuration.to_owned(),
        platform_name: platform.to_owned(),
        full_name,
        include_in_build: false,
    })
}

/// Parses `Config|Platform = Config|Platform` entry of `SolutionConfigurationPlatforms`.
/// Returns `None` for the `DESCRIPTION` pseudo entry.
pub fn solution_configuration(
    line: usize,
    key: &str,
    value: &str,
    platform_required: bool,
) -> Result<Option<SolutionConfiguration>, SolutionError> {
    let invalid = || SolutionError::InvalidSolutionConfigurationEntry {
        line,
        text: format!("{key} = {value}"),
    };
    if value.contains('=') {
        return Err(invalid());
    }
    if key == "DESCRIPTION" {
        return Ok(None);
    }
    match key.split('|').collect::<Vec<_>>().as_slice() {
        [configuration, platform] => Ok(Some(SolutionConfiguration::new(
            configuration.trim(),
            platform.trim(),
        ))),
        [configuration] if !platform_required && !configuration.trim().is_empty() => {
            Ok(Some(SolutionConfiguration::new(configuration.trim(), "")))
        }
        _ => Err(invalid()),
    }
}

pub fn default_configuration_name(configurations: &[SolutionConfiguration]) -> Option<&str> {
    default_name(configurations, DEFAULT_CONFIGURATION, |c| &c.configuration_name)
}

pub fn default_platform_name(configurations: &[SolutionConfiguration]) -> Option<&str> {
    default_name(configurations, DEFAULT_PLATFORM, |c| &c.platform_name)
}

fn default_name<'a, F>(
    configurations: &'a [SolutionConfiguration],
    preferred: &str,
    select: F,
) -> Option<&'a str>
where
    F: Fn(&'a SolutionConfiguration) -> &'a String,
{
    configurations
        .iter()
        .map(&select)
        .find(|n| n.as_str() == preferred)
        .or_else(|| configurations.first().map(&select))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const GUID: &str = "{A61CD222-0F3B-47B6-9F7F-25D658368EEC}";

    fn configurations(names: &[&str]) -> Vec<SolutionConfiguration> {
        names
            .iter()
            .map(|n| {
                let (c, p) = n.split_once('|').unwrap_or((*n, ""));
                SolutionConfiguration::new(c, p)
            })
            .collect()
    }

    #[rstest]
    #[case(&["Debug|Any CPU", "Release|Any CPU"], Some("Debug"), Some("Any CPU"))]
    #[case(&["Release|Any CPU", "Release|Win32", "Other|Any CPU", "Other|Win32"], Some("Release"), Some("Any CPU"))]
    #[case(&["Release|x64", "Debug|Mixed Platforms"], Some("Debug"), Some("Mixed Platforms"))]
    #[case(&["Other|Win32", "Debug|x64"], Some("Debug"), Some("Win32"))]
    #[case(&[], None, None)]
    #[trace]
    fn default_selection_tests(
        #[case] names: &[&str],
        #[case] configuration: Option<&str>,
        #[case] platform: Option<&str>,
    ) {
        // Arrange
        let configs = configurations(names);

        // Act
        let actual_configuration = default_configuration_name(&configs);
        let actual_platform = default_platform_name(&configs);

        // Assert
        assert_eq!(actual_configuration, configuration);
        assert_eq!(actual_platform, platform);
    }

    #[rstest]
    #[case("Debug|Any CPU", "Debug", "AnyCPU", "Debug|AnyCPU")]
    #[case("Release|x64", "Release", "x64", "Release|x64")]
    #[case("Debug", "Debug", "", "Debug")]
    #[case(" Debug | Win32 ", "Debug", "Win32", "Debug|Win32")]
    #[trace]
    fn project_configuration_tests(
        #[case] value: &str,
        #[case] configuration: &str,
        #[case] platform: &str,
        #[case] full_name: &str,
    ) {
        // Arrange

        // Act
        let actual = project_configuration(value).unwrap();

        // Assert
        assert_eq!(actual.configuration_name, configuration);
        assert_eq!(actual.platform_name, platform);
        assert_eq!(actual.full_name, full_name);
    }

    #[test]
    fn project_configuration_with_many_pipes_rejected() {
        // Arrange

        // Act
        let actual = project_configuration("Debug|x86|x64");

        // Assert
        assert!(actual.is_none());
    }

    #[rstest]
    #[case("Debug|Any CPU", "Debug|Any CPU", true, Some("Debug|Any CPU"))]
    #[case("DESCRIPTION", "text", true, None)]
    #[case("Debug", "Debug", false, Some("Debug"))]
    #[trace]
    fn solution_configuration_tests(
        #[case] key: &str,
        #[case] value: &str,
        #[case] platform_required: bool,
        #[case] expected: Option<&str>,
    ) {
        // Arrange

        // Act
        let actual = solution_configuration(1, key, value, platform_required).unwrap();

        // Assert
        assert_eq!(actual.map(|c| c.full_name), expected.map(str::to_owned));
    }

    #[rstest]
    #[case("Debug|Any CPU", "Debug|Any CPU = x", true)]
    #[case("Debug", "Debug", true)]
    #[case("Debug|Any CPU|x", "Debug", true)]
    #[trace]
    fn invalid_solution_configuration_tests(
        #[case] key: &str,
        #[case] value: &str,
        #[case] platform_required: bool,
    ) {
        // Arrange

        // Act
        let actual = solution_configuration(7, key, value, platform_required);

        // Assert
        assert!(matches!(
            actual,
            Err(SolutionError::InvalidSolutionConfigurationEntry { line: 7, .. })
        ));
    }

    #[test]
    fn map_project_uses_build_lines_and_skips_unmapped() {
        // Arrange
        let mut entries = HashMap::new();
        entries.insert(
            format!("{GUID}.Debug|Any CPU.ActiveCfg").to_uppercase(),
            "Debug|Any CPU".to_owned(),
        );
        entries.insert(
            format!("{GUID}.Debug|Any CPU.Build.0").to_uppercase(),
            "Debug|Any CPU".to_owned(),
        );
        entries.insert(
            format!("{GUID}.Release|Any CPU.ActiveCfg").to_uppercase(),
            "Release|x64".to_owned(),
        );
        let configs = configurations(&["Debug|Any CPU", "Release|Any CPU", "Other|Any CPU"]);
        let mapper = ConfigurationMapper::new(&entries);

        // Act
        let actual = mapper.map_project(&GUID.to_lowercase(), &configs).unwrap();

        // Assert
        assert_eq!(actual.len(), 2);
        assert!(actual["Debug|Any CPU"].include_in_build);
        assert_eq!(actual["Debug|Any CPU"].full_name, "Debug|AnyCPU");
        assert!(!actual["Release|Any CPU"].include_in_build);
        assert_eq!(actual["Release|Any CPU"].full_name, "Release|x64");
        assert!(!actual.contains_key("Other|Any CPU"));
    }
}
