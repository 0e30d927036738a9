use std::fs;
use std::path::{Path, PathBuf};

use json_comments::StripComments;
use serde::Deserialize;

use crate::error::SolutionError;
use crate::graph::ProjectGraphPlan;
use crate::model::SolutionModel;
use crate::parser::{make_path, normalize};

#[derive(Debug, Deserialize)]
struct FilterDocument {
    solution: FilterBody,
}

#[derive(Debug, Deserialize)]
struct FilterBody {
    path: String,
    projects: Vec<String>,
}

/// Solution filter (`.slnf`) narrowing a solution down to a list of projects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolutionFilter {
    filter_path: PathBuf,
    solution_path: PathBuf,
    projects: Vec<String>,
}

impl SolutionFilter {
    /// Reads filter file
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<SolutionFilter, SolutionError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| SolutionError::Read {
            path: path.display().to_string(),
            source,
        })?;
        SolutionFilter::from_contents(path, &contents)
    }

    /// Parses filter document. Comments are allowed. The solution path is resolved
    /// against the filter directory and must exist.
    pub fn from_contents(
        filter_path: &Path,
        contents: &str,
    ) -> Result<SolutionFilter, SolutionError> {
        let document: FilterDocument = serde_json::from_reader(StripComments::new(
            contents.as_bytes(),
        ))
        .map_err(|e| SolutionError::FilterSchema {
            path: filter_path.display().to_string(),
            reason: e.to_string(),
        })?;

        let directory = filter_path.parent().unwrap_or_else(|| Path::new(""));
        let solution_path = normalize(&make_path(directory, &document.solution.path));
        if !solution_path.is_file() {
            return Err(SolutionError::FilterMissingSolution {
                filter: filter_path.display().to_string(),
                solution: solution_path.display().to_string(),
            });
        }

        tracing::debug!(
            solution = %solution_path.display(),
            projects = document.solution.projects.len(),
            "solution filter loaded"
        );
        Ok(SolutionFilter {
            filter_path: filter_path.to_path_buf(),
            solution_path,
            projects: document.solution.projects,
        })
    }

    #[must_use]
    pub fn filter_path(&self) -> &Path {
        &self.filter_path
    }

    #[must_use]
    pub fn solution_path(&self) -> &Path {
        &self.solution_path
    }

    /// Project paths as listed, relative to solution directory
    #[must_use]
    pub fn projects(&self) -> &[String] {
        &self.projects
    }

    /// Parses referenced solution
    pub fn parse_solution(&self) -> Result<SolutionModel, SolutionError> {
        crate::parse_file(&self.solution_path)
    }

    /// GUIDs of listed projects. Every listed path must belong to the solution
    pub fn roots(&self, model: &SolutionModel) -> Result<Vec<String>, SolutionError> {
        self.projects
            .iter()
            .map(|listed| {
                let key = comparable(listed);
                model
                    .iterate_projects()
                    .find(|p| comparable(&p.relative_path) == key)
                    .map(|p| p.guid.clone())
                    .ok_or_else(|| SolutionError::FilterProjectNotInSolution {
                        filter: self.filter_path.display().to_string(),
                        project: listed.clone(),
                        solution: self.solution_path.display().to_string(),
                    })
            })
            .collect()
    }

    /// Keeps listed projects and everything they depend on
    pub fn narrow(
        &self,
        model: &SolutionModel,
        plan: &ProjectGraphPlan,
    ) -> Result<ProjectGraphPlan, SolutionError> {
        let roots = self.roots(model)?;
        let narrowed = plan.narrow(&roots);
        tracing::debug!(
            listed = roots.len(),
            buildable = narrowed.buildable.len(),
            "buildable projects narrowed by filter"
        );
        Ok(narrowed)
    }
}

/// Separator and `.`/`..` agnostic form of a relative path. Case is ignored where the
/// file system ignores it.
fn comparable(path: &str) -> String {
    let unified = path.trim().replace('\\', "/");
    let normalized = normalize(Path::new(&unified))
        .to_string_lossy()
        .replace('\\', "/");
    if cfg!(any(target_os = "windows", target_os = "macos")) {
        normalized.to_lowercase()
    } else {
        normalized
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use rstest::rstest;
    use std::io::Write;

    const SOLUTION: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "A", "A\A.csproj", "{A1000000-0000-0000-0000-000000000000}"
	ProjectSection(ProjectDependencies) = postProject
		{B1000000-0000-0000-0000-000000000000} = {B1000000-0000-0000-0000-000000000000}
	EndProjectSection
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "B", "B\B.csproj", "{B1000000-0000-0000-0000-000000000000}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "C", "C\C.csproj", "{C1000000-0000-0000-0000-000000000000}"
EndProject
"#;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let mut f = fs::File::create(dir.path().join("app.sln")).unwrap();
        f.write_all(SOLUTION.as_bytes()).unwrap();
        dir
    }

    #[rstest]
    #[case(r#"[]"#)]
    #[case(r#"{"path": "app.sln", "projects": []}"#)]
    #[case(r#"{"solution": {"path": "app.sln", "project": []}}"#)]
    #[case(r#"{"solution": {"path": "app.sln", "projects": [{"path": "A"}]}}"#)]
    #[case(r#"{"solution": {"path": 1, "projects": []}}"#)]
    #[case(r#"{"solution": "#)]
    #[trace]
    fn schema_errors(#[case] document: &str) {
        // Arrange
        let dir = workspace();
        let filter = dir.path().join("app.slnf");

        // Act
        let actual = SolutionFilter::from_contents(&filter, document);

        // Assert
        assert_eq!(actual.unwrap_err().error_code(), ErrorCode::FilterSchema);
    }

    #[test]
    fn missing_solution_is_distinct_from_schema_error() {
        // Arrange
        let dir = workspace();
        let filter = dir.path().join("app.slnf");
        let document = r#"{"solution": {"path": "other.sln", "projects": []}}"#;

        // Act
        let actual = SolutionFilter::from_contents(&filter, document);

        // Assert
        let err = actual.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FilterMissingSolution);
        assert!(err.to_string().contains("other.sln"));
    }

    #[test]
    fn comments_tolerated_and_path_resolved_against_filter_directory() {
        // Arrange
        let dir = workspace();
        let sub = dir.path().join("filters");
        fs::create_dir(&sub).unwrap();
        let filter = sub.join("app.slnf");
        let document = r#"{
  // line comment
  "solution": {
    /* block comment */
    "path": "..\\app.sln",
    "projects": [ "A\\A.csproj" ]
  }
}"#;

        // Act
        let actual = SolutionFilter::from_contents(&filter, document).unwrap();

        // Assert
        assert_eq!(actual.solution_path(), normalize(&dir.path().join("app.sln")));
        assert_eq!(actual.projects(), &["A\\A.csproj".to_owned()]);
    }

    #[test]
    fn narrowing_keeps_listed_and_dependencies() {
        // Arrange
        let dir = workspace();
        let filter_path = dir.path().join("app.slnf");
        let document = r#"{"solution": {"path": "app.sln", "projects": ["A/A.csproj"]}}"#;
        let filter = SolutionFilter::from_contents(&filter_path, document).unwrap();
        let model = filter.parse_solution().unwrap();
        let plan = crate::graph::DependencyResolver::new(&model).resolve().unwrap();

        // Act
        let actual = filter.narrow(&model, &plan).unwrap();

        // Assert
        assert!(actual.is_buildable("{A1000000-0000-0000-0000-000000000000}"));
        assert!(actual.is_buildable("{B1000000-0000-0000-0000-000000000000}"));
        assert!(!actual.is_buildable("{C1000000-0000-0000-0000-000000000000}"));
    }

    #[test]
    fn project_outside_solution_rejected() {
        // Arrange
        let dir = workspace();
        let filter_path = dir.path().join("app.slnf");
        let document = r#"{"solution": {"path": "app.sln", "projects": ["D\\D.csproj"]}}"#;
        let filter = SolutionFilter::from_contents(&filter_path, document).unwrap();
        let model = filter.parse_solution().unwrap();

        // Act
        let actual = filter.roots(&model);

        // Assert
        let err = actual.unwrap_err();
        assert_eq!(err.error_code(), ErrorCode::FilterProjectNotInSolution);
        assert!(err.to_string().contains(r"D\D.csproj"));
    }

    #[rstest]
    #[case(r"A\A.csproj", "A/A.csproj")]
    #[case(r".\A\..\A\A.csproj", "A/A.csproj")]
    #[case(" A/A.csproj ", "A/A.csproj")]
    #[trace]
    fn comparable_tests(#[case] path: &str, #[case] expected: &str) {
        // Arrange

        // Act
        let actual = comparable(path);

        // Assert
        assert_eq!(actual, comparable(expected));
        assert!(!actual.contains('\\'));
    }
}
