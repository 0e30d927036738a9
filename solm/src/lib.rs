/*!
A library for parsing Microsoft Visual Studio solution files and synthesizing
the project that builds them


## Example: parsing solution from [&str]

```
use solm::parse_str;

const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "bench", "bench\bench.csproj", "{A61CD222-0F3B-47B6-9F7F-25D658368EEC}"
EndProject
Global
    GlobalSection(SolutionConfigurationPlatforms) = preSolution
        Debug|Any CPU = Debug|Any CPU
        Release|Any CPU = Release|Any CPU
    EndGlobalSection
    GlobalSection(ProjectConfigurationPlatforms) = postSolution
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Debug|Any CPU.Build.0 = Debug|Any CPU
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Release|Any CPU.ActiveCfg = Release|Any CPU
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Release|Any CPU.Build.0 = Release|Any CPU
    EndGlobalSection
EndGlobal
"#;

let result = parse_str(SOLUTION);
assert!(result.is_ok());
let solution = result.unwrap();
assert_eq!(solution.projects().len(), 1);
assert_eq!(solution.solution_configurations().len(), 2);
assert_eq!(solution.format_version(), 12);
```

## Example: synthesizing build plan

```
use solm::{parse_str, synthesize, metaproject::SynthesisRequest};

const SOLUTION: &str = r#"
Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "app", "app\app.csproj", "{A61CD222-0F3B-47B6-9F7F-25D658368EEC}"
EndProject
Global
    GlobalSection(SolutionConfigurationPlatforms) = preSolution
        Debug|Any CPU = Debug|Any CPU
    EndGlobalSection
    GlobalSection(ProjectConfigurationPlatforms) = postSolution
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
        {A61CD222-0F3B-47B6-9F7F-25D658368EEC}.Debug|Any CPU.Build.0 = Debug|Any CPU
    EndGlobalSection
EndGlobal
"#;

let solution = parse_str(SOLUTION).unwrap();
let project = synthesize(&solution, &SynthesisRequest::default()).unwrap();
assert!(project.target("app").is_some());
assert_eq!(project.default_targets, vec!["Build".to_owned()]);
```
*/

#![warn(unused_extern_crates)]
#![allow(clippy::missing_errors_doc)]
use std::fs;
use std::path::Path;

pub mod blob;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod metaproject;
pub mod model;
pub mod msbuild;
pub mod parser;
pub mod scan;

#[cfg(test)] // <-- not needed in integration tests
extern crate rstest;

pub use error::{ErrorCode, SolutionError};
pub use filter::SolutionFilter;
pub use metaproject::{MetaprojectGenerator, SynthesisRequest, SynthesizedProject};
pub use model::SolutionModel;

const FILTER_EXTENSION: &str = "slnf";

/// `parse_str` parses solution content from `&str` and returns [`SolutionModel`] in case of success.
/// Relative project paths stay unresolved because solution location is unknown.
///
/// # Errors
///
/// This function will return an error if solution file has invalid syntax or corrupted.
pub fn parse_str(contents: &str) -> Result<SolutionModel, SolutionError> {
    parser::SolutionModelBuilder::new(None).build(contents)
}

/// `parse_file` parses single solution file specified by path.
///
/// # Errors
///
/// This function will return an error if file content cannot be read into memory
/// or solution file has invalid syntax.
pub fn parse_file(path: &Path) -> Result<SolutionModel, SolutionError> {
    let contents = fs::read_to_string(path).map_err(|source| SolutionError::Read {
        path: path.display().to_string(),
        source,
    })?;
    tracing::debug!(path = %path.display(), "parsing solution");
    parser::SolutionModelBuilder::for_file(path).build(&contents)
}

/// Opens either solution or solution filter. For filter the referenced solution is parsed
/// and the filter is returned alongside.
pub fn open(path: &Path) -> Result<(SolutionModel, Option<SolutionFilter>), SolutionError> {
    if is_filter(path) {
        let filter = SolutionFilter::from_path(path)?;
        let model = filter.parse_solution()?;
        Ok((model, Some(filter)))
    } else {
        Ok((parse_file(path)?, None))
    }
}

/// Synthesizes build project reading imports from the file system
pub fn synthesize(
    model: &SolutionModel,
    request: &SynthesisRequest,
) -> Result<SynthesizedProject, SolutionError> {
    MetaprojectGenerator::new(model, request).generate()
}

fn is_filter(path: &Path) -> bool {
    path.extension()
        .is_some_and(|e| e.eq_ignore_ascii_case(FILTER_EXTENSION))
}
