use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use proptest::prelude::*;
use rstest::rstest;
use solm::blob::SolutionConfigurationContents;
use solm::graph::DependencyResolver;
use solm::metaproject::SynthesisRequest;
use solm::{parse_file, parse_str, synthesize, ErrorCode, SolutionFilter};

const CSHARP: &str = "{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}";
const FOLDER: &str = "{2150E333-8FDC-42A3-9474-1A3956D46DE8}";

const A: &str = "{A1000000-0000-0000-0000-000000000000}";
const B: &str = "{B1000000-0000-0000-0000-000000000000}";
const C: &str = "{C1000000-0000-0000-0000-000000000000}";

fn guid(i: usize) -> String {
    format!("{{{i:08X}-0000-0000-0000-000000000000}}")
}

fn project(name: &str, path: &str, guid: &str) -> String {
    format!("Project(\"{CSHARP}\") = \"{name}\", \"{path}\", \"{guid}\"\nEndProject\n")
}

fn folder(name: &str, guid: &str) -> String {
    format!("Project(\"{FOLDER}\") = \"{name}\", \"{name}\", \"{guid}\"\nEndProject\n")
}

const ABC: &str = r#"Microsoft Visual Studio Solution File, Format Version 12.00
# Visual Studio Version 17
VisualStudioVersion = 17.5.33424.131
MinimumVisualStudioVersion = 10.0.40219.1
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "A", "A\A.csproj", "{A1000000-0000-0000-0000-000000000000}"
	ProjectSection(ProjectDependencies) = postProject
		{B1000000-0000-0000-0000-000000000000} = {B1000000-0000-0000-0000-000000000000}
	EndProjectSection
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "B", "B\B.csproj", "{B1000000-0000-0000-0000-000000000000}"
EndProject
Project("{FAE04EC0-301F-11D3-BF4B-00C04F79EFBC}") = "C", "C\C.csproj", "{C1000000-0000-0000-0000-000000000000}"
EndProject
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Debug|Any CPU = Debug|Any CPU
	EndGlobalSection
	GlobalSection(ProjectConfigurationPlatforms) = postSolution
		{A1000000-0000-0000-0000-000000000000}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
		{A1000000-0000-0000-0000-000000000000}.Debug|Any CPU.Build.0 = Debug|Any CPU
		{B1000000-0000-0000-0000-000000000000}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
		{B1000000-0000-0000-0000-000000000000}.Debug|Any CPU.Build.0 = Debug|Any CPU
		{C1000000-0000-0000-0000-000000000000}.Debug|Any CPU.ActiveCfg = Debug|Any CPU
		{C1000000-0000-0000-0000-000000000000}.Debug|Any CPU.Build.0 = Debug|Any CPU
	EndGlobalSection
EndGlobal
"#;

#[test]
fn parsing_is_idempotent() {
    // Arrange

    // Act
    let first = parse_str(ABC).unwrap();
    let second = parse_str(ABC).unwrap();

    // Assert
    assert_eq!(first, second);
    let first_order = DependencyResolver::new(&first).resolve().unwrap().build_order;
    let second_order = DependencyResolver::new(&second).resolve().unwrap().build_order;
    assert_eq!(first_order, second_order);
}

#[test]
fn same_display_name_in_different_folders() {
    // Arrange
    let mut solution = String::from("Microsoft Visual Studio Solution File, Format Version 12.00\n");
    solution.push_str(&folder("Client", &guid(0xF1)));
    solution.push_str(&folder("Server", &guid(0xF2)));
    solution.push_str(&project("Core", r"Client\Core.csproj", &guid(1)));
    solution.push_str(&project("Core", r"Server\Core.csproj", &guid(2)));
    let _ = write!(
        solution,
        "Global\n\tGlobalSection(NestedProjects) = preSolution\n\t\t{} = {}\n\t\t{} = {}\n\tEndGlobalSection\nEndGlobal\n",
        guid(1),
        guid(0xF1),
        guid(2),
        guid(0xF2)
    );

    // Act
    let model = parse_str(&solution).unwrap();

    // Assert
    let client = model.find_by_guid(&guid(1)).unwrap();
    let server = model.find_by_guid(&guid(2)).unwrap();
    assert_eq!(client.unique_name, r"Client\Core");
    assert_eq!(server.unique_name, r"Server\Core");
}

#[rstest]
#[case(2)]
#[case(4)]
#[case(6)]
#[trace]
fn colliding_normalized_names_are_stable(#[case] count: usize) {
    // Arrange
    let names = ["A.B", "A_B", "A(B", "A)B", "A;B", "A@B"];
    let build = |n: usize| {
        let mut solution =
            String::from("Microsoft Visual Studio Solution File, Format Version 12.00\n");
        for (i, name) in names.iter().take(n).enumerate() {
            solution.push_str(&project(name, &format!("p{i}.csproj"), &guid(i + 1)));
        }
        parse_str(&solution).unwrap()
    };

    // Act
    let model = build(count);
    let smaller = build(1);

    // Assert
    let unique: Vec<_> = model.iterate_projects().map(|p| p.unique_name.clone()).collect();
    assert_eq!(unique[0], "A_B");
    for (i, name) in unique.iter().enumerate().skip(1) {
        assert_eq!(name, &format!("A_B_{}", guid(i + 1).trim_matches(&['{', '}'][..])));
    }
    let mut deduped = unique.clone();
    deduped.sort();
    deduped.dedup();
    assert_eq!(deduped.len(), unique.len());
    assert_eq!(smaller.projects()[0].unique_name, unique[0]);
}

#[test]
fn clean_traverses_in_reverse_of_build() {
    // Arrange
    let model = parse_str(ABC).unwrap();

    // Act
    let project = synthesize(&model, &SynthesisRequest::default()).unwrap();

    // Assert
    let order = |name: &str| -> Vec<String> {
        project
            .target(name)
            .unwrap()
            .invocations()
            .map(|i| i.project_guid.clone())
            .collect()
    };
    let build = order("Build");
    let mut clean = order("Clean");
    clean.reverse();
    assert_eq!(build, clean);
    let a = build.iter().position(|g| g == A).unwrap();
    let b = build.iter().position(|g| g == B).unwrap();
    assert!(b < a);
}

#[test]
fn default_configuration_is_first_declared() {
    // Arrange
    let solution = r#"Microsoft Visual Studio Solution File, Format Version 12.00
Global
	GlobalSection(SolutionConfigurationPlatforms) = preSolution
		Release|Any CPU = Release|Any CPU
		Release|Win32 = Release|Win32
		Other|Any CPU = Other|Any CPU
		Other|Win32 = Other|Win32
	EndGlobalSection
EndGlobal
"#;
    let model = parse_str(solution).unwrap();

    // Act
    let project = synthesize(&model, &SynthesisRequest::default()).unwrap();

    // Assert
    assert_eq!(model.default_configuration_name(), Some("Release"));
    assert_eq!(model.default_platform_name(), Some("Any CPU"));
    assert_eq!(project.properties["Configuration"], "Release");
    assert_eq!(project.properties["Platform"], "Any CPU");
}

#[test]
fn filter_builds_listed_project_with_dependencies() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("app.sln"), ABC).unwrap();
    let filter_path = dir.path().join("app.slnf");
    fs::write(
        &filter_path,
        r#"{ "solution": { "path": "app.sln", "projects": [ "A\\A.csproj" ] } }"#,
    )
    .unwrap();
    let (model, filter) = solm::open(&filter_path).unwrap();
    let request = SynthesisRequest {
        filter,
        ..SynthesisRequest::default()
    };

    // Act
    let project = synthesize(&model, &request).unwrap();

    // Assert
    let built: Vec<_> = project
        .target("Build")
        .unwrap()
        .invocations()
        .map(|i| i.project_guid.as_str())
        .collect();
    assert_eq!(built, vec![B, A]);
    assert!(project.target("C").is_none());
    assert!(!built.contains(&C));
}

#[test]
fn filter_with_missing_solution() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let filter_path = dir.path().join("app.slnf");
    fs::write(
        &filter_path,
        r#"{ "solution": { "path": "absent.sln", "projects": [] } }"#,
    )
    .unwrap();

    // Act
    let actual = SolutionFilter::from_path(&filter_path);

    // Assert
    assert_eq!(actual.unwrap_err().error_code(), ErrorCode::FilterMissingSolution);
}

#[test]
fn missing_dependency_names_guid() {
    // Arrange
    let missing = "{DEAD0000-0000-0000-0000-000000000000}";
    let solution = format!(
        "Microsoft Visual Studio Solution File, Format Version 12.00\nProject(\"{CSHARP}\") = \"A\", \"A.csproj\", \"{A}\"\n\tProjectSection(ProjectDependencies) = postProject\n\t\t{missing} = {missing}\n\tEndProjectSection\nEndProject\n"
    );

    // Act
    let actual = parse_str(&solution);

    // Assert
    let err = actual.unwrap_err();
    assert_eq!(err.error_code(), ErrorCode::MissingDependency);
    assert!(err.to_string().contains(missing));
}

#[rstest]
#[case("VisualStudioVersion = Preview 17.5.33424.131")]
#[case("VisualStudioVersion = 17.5.33424.131Preview")]
#[case("VisualStudioVersion = 17")]
#[trace]
fn corrupted_version_stamp_falls_back_to_format_default(#[case] stamp: &str) {
    // Arrange
    let solution = format!(
        "Microsoft Visual Studio Solution File, Format Version 12.00\n{stamp}\n{}",
        project("A", "A.csproj", A)
    );

    // Act
    let model = parse_str(&solution).unwrap();

    // Assert
    assert_eq!(model.visual_studio_version(), 11);
    assert!(model.visual_studio_version_text().is_none());
}

#[test]
fn parse_file_resolves_project_paths() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sln");
    fs::write(&path, ABC).unwrap();

    // Act
    let model = parse_file(&path).unwrap();

    // Assert
    let a = model.find_by_guid(A).unwrap();
    assert!(a.absolute_path.starts_with(dir.path()));
    assert!(a.absolute_path.ends_with(Path::new("A").join("A.csproj")));
    assert_eq!(model.file_name(), Some("app.sln"));
}

#[test]
fn hook_files_next_to_solution_are_imported() {
    // Arrange
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("app.sln");
    fs::write(&path, ABC).unwrap();
    fs::write(
        dir.path().join("after.app.sln.targets"),
        r#"<Project><Target Name="Report" AfterTargets="Build" /></Project>"#,
    )
    .unwrap();
    let model = parse_file(&path).unwrap();

    // Act
    let project = synthesize(&model, &SynthesisRequest::default()).unwrap();

    // Assert
    assert_eq!(
        project.target_schedule("Build"),
        vec!["Build".to_owned(), "Report".to_owned()]
    );
}

fn matrix_solution(projects: usize, configurations: &[&str], matrix: &[(bool, bool)]) -> String {
    let mut solution = String::from("Microsoft Visual Studio Solution File, Format Version 12.00\n");
    for i in 0..projects {
        solution.push_str(&project(&format!("P{i}"), &format!("P{i}.csproj"), &guid(i + 1)));
    }
    solution.push_str("Global\n\tGlobalSection(SolutionConfigurationPlatforms) = preSolution\n");
    for c in configurations {
        let _ = writeln!(solution, "\t\t{c}|Any CPU = {c}|Any CPU");
    }
    solution.push_str("\tEndGlobalSection\n\tGlobalSection(ProjectConfigurationPlatforms) = postSolution\n");
    for i in 0..projects {
        for (j, c) in configurations.iter().enumerate() {
            let (mapped, build) = matrix[i * configurations.len() + j];
            if !mapped {
                continue;
            }
            let _ = writeln!(solution, "\t\t{}.{c}|Any CPU.ActiveCfg = {c}|Any CPU", guid(i + 1));
            if build {
                let _ = writeln!(solution, "\t\t{}.{c}|Any CPU.Build.0 = {c}|Any CPU", guid(i + 1));
            }
        }
    }
    solution.push_str("\tEndGlobalSection\nEndGlobal\n");
    solution
}

proptest! {
    #[test]
    fn configuration_contents_reflect_build_lines(
        projects in 1usize..6,
        configurations in 1usize..4,
        matrix in proptest::collection::vec((any::<bool>(), any::<bool>()), 15),
    ) {
        let names = ["Debug", "Release", "Test"];
        let names = &names[..configurations];
        let solution = matrix_solution(projects, names, &matrix);
        let model = parse_str(&solution).unwrap();
        let plan = DependencyResolver::new(&model).resolve().unwrap();

        for (j, sc) in model.solution_configurations().iter().enumerate() {
            let contents = SolutionConfigurationContents::generate(&model, &plan, sc);
            let xml = contents.to_xml();
            let contents = SolutionConfigurationContents::from_xml(&xml).unwrap();
            for i in 0..projects {
                let (mapped, build) = matrix[i * names.len() + j];
                let id = guid(i + 1);
                let entries = contents.projects.iter().filter(|p| p.project == id).count();
                if mapped {
                    prop_assert_eq!(entries, 1);
                    prop_assert_eq!(contents.find(&id).unwrap().builds(), build);
                } else {
                    prop_assert_eq!(entries, 0);
                }
            }
        }
    }
}

fn dag_solution(edges: &[Vec<usize>]) -> String {
    let mut solution = String::from("Microsoft Visual Studio Solution File, Format Version 12.00\n");
    for (i, deps) in edges.iter().enumerate() {
        let _ = writeln!(
            solution,
            "Project(\"{CSHARP}\") = \"P{i}\", \"P{i}.csproj\", \"{}\"",
            guid(i + 1)
        );
        if !deps.is_empty() {
            solution.push_str("\tProjectSection(ProjectDependencies) = postProject\n");
            for d in deps {
                let _ = writeln!(solution, "\t\t{0} = {0}", guid(d + 1));
            }
            solution.push_str("\tEndProjectSection\n");
        }
        solution.push_str("EndProject\n");
    }
    solution.push_str("Global\n\tGlobalSection(SolutionConfigurationPlatforms) = preSolution\n\t\tDebug|Any CPU = Debug|Any CPU\n\tEndGlobalSection\n\tGlobalSection(ProjectConfigurationPlatforms) = postSolution\n");
    for i in 0..edges.len() {
        let _ = writeln!(solution, "\t\t{}.Debug|Any CPU.ActiveCfg = Debug|Any CPU", guid(i + 1));
        let _ = writeln!(solution, "\t\t{}.Debug|Any CPU.Build.0 = Debug|Any CPU", guid(i + 1));
    }
    solution.push_str("\tEndGlobalSection\nEndGlobal\n");
    solution
}

proptest! {
    #[test]
    fn clean_is_reverse_of_build_for_any_acyclic_graph(
        raw in proptest::collection::vec(proptest::collection::vec(any::<usize>(), 0..3), 1..8),
    ) {
        // dependencies only point to later projects so the graph stays acyclic
        let n = raw.len();
        let edges: Vec<Vec<usize>> = raw
            .iter()
            .enumerate()
            .map(|(i, deps)| {
                let mut deps: Vec<usize> = deps
                    .iter()
                    .filter(|_| i + 1 < n)
                    .map(|d| i + 1 + d % (n - i - 1).max(1))
                    .filter(|d| *d < n)
                    .collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            })
            .collect();
        let model = parse_str(&dag_solution(&edges)).unwrap();
        let project = synthesize(&model, &SynthesisRequest::default()).unwrap();

        let order = |name: &str| -> Vec<String> {
            project
                .target(name)
                .unwrap()
                .invocations()
                .map(|i| i.project_guid.clone())
                .collect()
        };
        let build = order("Build");
        let mut clean = order("Clean");
        clean.reverse();
        prop_assert_eq!(&build, &clean);
        prop_assert_eq!(build.len(), n);
        for (i, deps) in edges.iter().enumerate() {
            let me = build.iter().position(|g| *g == guid(i + 1)).unwrap();
            for d in deps {
                let dep = build.iter().position(|g| *g == guid(d + 1)).unwrap();
                prop_assert!(dep < me);
            }
        }
    }
}
