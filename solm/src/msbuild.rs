use std::{fs::File, io::Read, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::SolutionError;

pub const ID_SOLUTION_FOLDER: &str = "{2150E333-8FDC-42A3-9474-1A3956D46DE8}";
pub const ID_WEB_SITE_PROJECT: &str = "{E24C65DC-7377-472B-9ABA-BC803B73C61A}";
pub const ID_SHARED_PROJECT: &str = "{D954291E-2A0B-460D-934E-DC6B0785DB48}";

/// Type ids of projects known to be in `MSBuild` format regardless of file extension
static MSBUILD_FORMAT_TYPES: phf::Set<&'static str> = phf::phf_set! {
    "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}",
    "{F184B08F-C81C-45F6-A57F-5ABD9991F28F}",
    "{F2A71F9B-5D33-465A-A702-920D77279786}",
    "{13B669BE-BB05-4DDF-9536-439F39A36129}",
    "{9A19103F-16F7-4668-BE54-9A1E7A4F7556}",
    "{778DAE3C-4631-46EA-AA77-85C1314464D9}",
    "{6EC3EE1D-3C4E-46DD-8F32-0CC8E7565705}",
    "{C8D11400-126E-41CD-887F-60BD40844F9E}",
    "{930C7802-8A8C-48F9-8165-68863BCCD9DD}",
    "{E6FDF86B-F3D1-11D4-8576-0002A516ECE8}",
};

/// Toolsets the synthesized project may be pinned to
static TOOLSETS: phf::OrderedSet<&'static str> = phf::phf_ordered_set! {
    "2.0",
    "3.5",
    "4.0",
    "12.0",
    "14.0",
    "15.0",
    "Current",
};

// subset of https://github.com/JamesW75/visual-studio-project-type-guid
static PROJECT_TYPES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}" => "C#",
    "{9A19103F-16F7-4668-BE54-9A1E7A4F7556}" => "C# (.Net Core)",
    "{F184B08F-C81C-45F6-A57F-5ABD9991F28F}" => "VB.NET",
    "{778DAE3C-4631-46EA-AA77-85C1314464D9}" => "VB.NET (.Net Core)",
    "{F2A71F9B-5D33-465A-A702-920D77279786}" => "F#",
    "{6EC3EE1D-3C4E-46DD-8F32-0CC8E7565705}" => "F# (.Net Core)",
    "{13B669BE-BB05-4DDF-9536-439F39A36129}" => "Common Project System",
    "{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}" => "C++",
    "{EAF909A5-FA59-4C3D-9431-0FCC20D5BCF9}" => "Intel C++",
    "{C8D11400-126E-41CD-887F-60BD40844F9E}" => "Database",
    "{00D1A9C2-B5F0-4AF3-8072-F6C62B433612}" => "SQL Server Database",
    "{E6FDF86B-F3D1-11D4-8576-0002A516ECE8}" => "J#",
    "{930C7802-8A8C-48F9-8165-68863BCCD9DD}" => "WiX (Windows Installer XML)",
    "{2150E333-8FDC-42A3-9474-1A3956D46DE8}" => "Solution Folder",
    "{E24C65DC-7377-472B-9ABA-BC803B73C61A}" => "Web Site",
    "{349C5851-65DF-11DA-9384-00065B846F21}" => "Web Application",
    "{D954291E-2A0B-460D-934E-DC6B0785DB48}" => "Shared Project",
    "{3AC096D0-A1C2-E12C-1390-A8335801FDAB}" => "Test",
    "{60DC8134-EBA5-43B8-BCC9-BB4BC16C2548}" => "Windows Presentation Foundation (WPF)",
    "{786C830F-07A1-408B-BD7F-6EE04809D6DB}" => "Portable Class Library",
    "{888888A0-9F3D-457C-B088-3A5042F75D52}" => "Python",
    "{9092AA53-FB77-4645-B42D-1CCCA6BD08BD}" => "Node.js",
    "{E53339B2-1760-4266-BCC7-CA923CBCF16C}" => "Docker Application",
    "{F5034706-568F-408A-B7B3-4D38C6DB8A32}" => "PowerShell",
    "{C7167F0D-BC9F-4E6E-AFE1-012C56B48DB5}" => "Windows Application Packaging Project (MSIX)",
    "{54435603-DBB4-11D2-8724-00A0C9A8B90C}" => "Visual Studio Installer Project Extension",
};

/// How a solution entry takes part in a build
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ProjectKind {
    /// Ordinary project that can be handed to the build engine as is
    MsBuild,
    SolutionFolder,
    /// Directory based ("Venus") web site built by the ASP.NET compiler
    WebSite,
    /// Items-only container, never built on its own
    SharedProject,
    /// Pre `MSBuild` C++ project that has to be upgraded before building
    LegacyVcProj,
    /// Project-of-projects manifest
    EtpSubProject,
    Unknown,
}

impl ProjectKind {
    /// Kinds that can never produce an invocation target
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            ProjectKind::SolutionFolder | ProjectKind::SharedProject | ProjectKind::EtpSubProject
        )
    }
}

/// Detects project kind by its type id falling back to file extension
#[must_use]
pub fn classify(type_id: &str, relative_path: &str) -> ProjectKind {
    let type_id = type_id.to_uppercase();
    if is_solution_folder(&type_id) {
        return ProjectKind::SolutionFolder;
    }
    if is_web_site_project(&type_id) {
        return ProjectKind::WebSite;
    }
    if type_id == ID_SHARED_PROJECT {
        return ProjectKind::SharedProject;
    }
    if MSBUILD_FORMAT_TYPES.contains(type_id.as_str()) {
        return ProjectKind::MsBuild;
    }

    let path = relative_path.to_lowercase();
    if path.ends_with(".vcxproj") {
        ProjectKind::MsBuild
    } else if path.ends_with(".vcproj") {
        ProjectKind::LegacyVcProj
    } else if path.ends_with(".etp") {
        ProjectKind::EtpSubProject
    } else if path.ends_with("proj") {
        ProjectKind::MsBuild
    } else {
        ProjectKind::Unknown
    }
}

/// Shows whether id specified is ID of
/// solution folder type project
#[must_use]
pub fn is_solution_folder(id: &str) -> bool {
    id.eq_ignore_ascii_case(ID_SOLUTION_FOLDER)
}

/// Shows whether id specified is ID of
/// Website type project
#[must_use]
pub fn is_web_site_project(id: &str) -> bool {
    id.eq_ignore_ascii_case(ID_WEB_SITE_PROJECT)
}

/// Describes project by id.
/// Returns human-readable description
/// or id itself if it's not match any
#[must_use]
pub fn describe_project(id: &str) -> &str {
    PROJECT_TYPES
        .get(id.to_uppercase().as_str())
        .copied()
        .unwrap_or(id)
}

/// Resolves toolset name ignoring case. Returns canonical spelling
#[must_use]
pub fn resolve_toolset(version: &str) -> Option<&'static str> {
    TOOLSETS
        .iter()
        .find(|t| t.eq_ignore_ascii_case(version.trim()))
        .copied()
}

/// All known toolsets comma separated
#[must_use]
pub fn available_toolsets() -> String {
    TOOLSETS.iter().copied().collect::<Vec<_>>().join(", ")
}

/// Project-of-projects manifest (`.etp` file)
#[derive(Debug, Deserialize)]
pub struct EtpManifest {
    #[serde(rename = "GENERAL", default)]
    pub general: Option<EtpGeneral>,
}

#[derive(Debug, Deserialize)]
pub struct EtpGeneral {
    #[serde(rename = "References", default)]
    pub references: Option<EtpReferences>,
}

#[derive(Debug, Deserialize)]
pub struct EtpReferences {
    #[serde(rename = "Reference", default)]
    pub references: Vec<EtpReference>,
}

/// Single manifest entry. `file` is relative to the manifest directory
#[derive(Debug, Deserialize)]
pub struct EtpReference {
    #[serde(rename = "FILE", default)]
    pub file: String,
    #[serde(rename = "GUIDPROJECTID", default)]
    pub guid: Option<String>,
}

/// Project file imported into synthesized project (before/after hooks,
/// directory level props and targets). Only target declarations matter here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedProject {
    #[serde(rename = "Target", default)]
    pub targets: Vec<ImportedTarget>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedTarget {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "BeforeTargets", default)]
    pub before_targets: Option<String>,
    #[serde(rename = "AfterTargets", default)]
    pub after_targets: Option<String>,
    #[serde(rename = "DependsOnTargets", default)]
    pub depends_on_targets: Option<String>,
    #[serde(rename = "Condition", default)]
    pub condition: Option<String>,
}

/// Splits `MSBuild` semicolon separated list skipping empty parts
pub fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(';').map(str::trim).filter(|s| !s.is_empty())
}

impl EtpManifest {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<EtpManifest, String> {
        let file = File::open(path).map_err(|e| e.to_string())?;
        EtpManifest::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<EtpManifest, String> {
        let mut de =
            serde_xml_rs::Deserializer::new_from_reader(reader).non_contiguous_seq_elements(true);
        EtpManifest::deserialize(&mut de).map_err(|e| e.to_string())
    }

    /// Iterates references declared in the manifest
    pub fn references(&self) -> impl Iterator<Item = &EtpReference> {
        self.general
            .iter()
            .filter_map(|g| g.references.as_ref())
            .flat_map(|r| r.references.iter())
    }
}

impl ImportedProject {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<ImportedProject, SolutionError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| SolutionError::InvalidImportedProject {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        ImportedProject::from_reader(file).map_err(|reason| SolutionError::InvalidImportedProject {
            path: path.display().to_string(),
            reason,
        })
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<ImportedProject, String> {
        let mut de =
            serde_xml_rs::Deserializer::new_from_reader(reader).non_contiguous_seq_elements(true);
        ImportedProject::deserialize(&mut de).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}", r"a\a.csproj", ProjectKind::MsBuild)]
    #[case("{fae04ec0-301f-11d3-bf4b-00c04f79efbc}", "a", ProjectKind::MsBuild)]
    #[case("{2150E333-8FDC-42A3-9474-1A3956D46DE8}", "folder", ProjectKind::SolutionFolder)]
    #[case("{E24C65DC-7377-472B-9ABA-BC803B73C61A}", "http://localhost/site/", ProjectKind::WebSite)]
    #[case("{D954291E-2A0B-460D-934E-DC6B0785DB48}", r"s\s.shproj", ProjectKind::SharedProject)]
    #[case("{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}", r"c\c.vcxproj", ProjectKind::MsBuild)]
    #[case("{8BC9CEB8-8B4A-11D0-8D11-00A0C91BC942}", r"c\c.VCPROJ", ProjectKind::LegacyVcProj)]
    #[case("{00000000-0000-0000-0000-000000000000}", r"e\e.etp", ProjectKind::EtpSubProject)]
    #[case("{00000000-0000-0000-0000-000000000000}", r"x\x.wixproj", ProjectKind::MsBuild)]
    #[case("{00000000-0000-0000-0000-000000000000}", r"x\x.txt", ProjectKind::Unknown)]
    #[trace]
    fn classify_tests(#[case] type_id: &str, #[case] path: &str, #[case] expected: ProjectKind) {
        // Arrange

        // Act
        let actual = classify(type_id, path);

        // Assert
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}", "C#")]
    #[case("{2150e333-8fdc-42a3-9474-1a3956d46de8}", "Solution Folder")]
    #[case("{11111111-0000-0000-0000-000000000000}", "{11111111-0000-0000-0000-000000000000}")]
    #[trace]
    fn describe_project_tests(#[case] id: &str, #[case] expected: &str) {
        // Arrange

        // Act
        let actual = describe_project(id);

        // Assert
        assert_eq!(actual, expected);
    }

    #[rstest]
    #[case("4.0", Some("4.0"))]
    #[case("current", Some("Current"))]
    #[case(" 15.0 ", Some("15.0"))]
    #[case("16.0", None)]
    #[case("", None)]
    #[trace]
    fn resolve_toolset_tests(#[case] version: &str, #[case] expected: Option<&str>) {
        // Arrange

        // Act
        let actual = resolve_toolset(version);

        // Assert
        assert_eq!(actual, expected);
    }

    #[test]
    fn read_etp_manifest_test() {
        // Arrange
        let rdr = Cursor::new(ETP);

        // Act
        let manifest = EtpManifest::from_reader(rdr).unwrap();

        // Assert
        let refs: Vec<_> = manifest.references().collect();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].file, r"ClassLibrary2.csproj");
        assert_eq!(
            refs[0].guid.as_deref(),
            Some("{73D0F4CE-D9D3-4E8B-81E4-B26FBF4CC2FE}")
        );
        assert_eq!(refs[1].file, r"sub\Nested.etp");
        assert!(refs[1].guid.is_none());
    }

    #[test]
    fn read_malformed_etp_manifest_test() {
        // Arrange
        let rdr = Cursor::new("<EFPROJECT><GENERAL>");

        // Act
        let result = EtpManifest::from_reader(rdr);

        // Assert
        assert!(result.is_err());
    }

    #[test]
    fn read_imported_project_test() {
        // Arrange
        let rdr = Cursor::new(HOOKS);

        // Act
        let project = ImportedProject::from_reader(rdr).unwrap();

        // Assert
        assert_eq!(project.targets.len(), 2);
        assert_eq!(project.targets[0].name, "Build");
        assert_eq!(project.targets[0].depends_on_targets.as_deref(), Some("Prepare"));
        assert_eq!(project.targets[1].name, "Notify");
        assert_eq!(project.targets[1].after_targets.as_deref(), Some("Build"));
    }

    #[test]
    fn split_list_test() {
        // Arrange

        // Act
        let actual: Vec<_> = split_list(" A; ;B;").collect();

        // Assert
        assert_eq!(actual, vec!["A", "B"]);
    }

    const ETP: &str = r#"<?xml version="1.0"?>
<EFPROJECT>
    <GENERAL>
        <BANNER>Microsoft Visual Studio Application Template File</BANNER>
        <VERSION>1.00</VERSION>
        <References>
            <Reference>
                <FILE>ClassLibrary2.csproj</FILE>
                <GUIDPROJECTID>{73D0F4CE-D9D3-4E8B-81E4-B26FBF4CC2FE}</GUIDPROJECTID>
            </Reference>
            <Reference>
                <FILE>sub\Nested.etp</FILE>
            </Reference>
        </References>
    </GENERAL>
</EFPROJECT>
"#;

    const HOOKS: &str = r#"<Project>
  <PropertyGroup>
    <Hooked>true</Hooked>
  </PropertyGroup>
  <Target Name="Build" DependsOnTargets="Prepare">
    <Message Text="custom build" />
  </Target>
  <Target Name="Notify" AfterTargets="Build" />
</Project>
"#;
}
