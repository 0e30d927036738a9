use std::collections::BTreeSet;
use std::path::Path;

use crossterm::style::Stylize;
use solm::graph::DependencyResolver;
use solm::model::ProjectEntry;
use solm::{SolutionError, SolutionFilter, SolutionModel};

use crate::{ux, Consume};

pub struct Validate {
    show_only_problems: bool,
    pub problems_found: bool,
    pub failure: Option<exitcode::ExitCode>,
}

impl Validate {
    #[must_use]
    pub fn new(show_only_problems: bool) -> Self {
        Self {
            show_only_problems,
            problems_found: false,
            failure: None,
        }
    }
}

impl Consume for Validate {
    fn ok(&mut self, path: &Path, model: &SolutionModel, filter: Option<SolutionFilter>) {
        let mut plan = DependencyResolver::new(model).analyze();
        let mut filter_problem = None;
        if let Some(filter) = filter {
            match filter.narrow(model, &plan) {
                Ok(narrowed) => plan = narrowed,
                Err(e) => filter_problem = Some(e.to_string()),
            }
        }

        let not_found = search_not_found(model);
        let broken: BTreeSet<String> = model
            .iterate_projects()
            .filter_map(|p| {
                p.etp_error
                    .as_ref()
                    .map(|e| format!("{}: {e}", p.display_name))
            })
            .collect();
        let missing: BTreeSet<&str> = plan.missing_references.iter().map(String::as_str).collect();
        let duplicates: BTreeSet<&str> = plan.duplicate_names.iter().map(String::as_str).collect();
        let diagnostics = model.diagnostics();

        let has_problems = !not_found.is_empty()
            || !broken.is_empty()
            || !missing.is_empty()
            || !duplicates.is_empty()
            || !plan.cycles.is_empty()
            || !diagnostics.warnings().is_empty()
            || filter_problem.is_some();
        self.problems_found |= has_problems;

        if has_problems || !self.show_only_problems {
            ux::print_solution_path(&path.display().to_string());
        }

        for comment in diagnostics.comments() {
            println!("  {}", comment.as_str().dark_grey());
        }
        for warning in diagnostics.warnings() {
            ux::print_warning(&format!(" {warning}"));
        }
        if let Some(problem) = &filter_problem {
            ux::print_problem(&format!(" {problem}"));
        }
        for cycle in &plan.cycles {
            ux::print_problem(&format!(
                "  Solution contains project dependencies cycle: {}",
                cycle.join(" -> ")
            ));
        }
        if !missing.is_empty() {
            ux::print_problem("  Solution contains dependencies on projects that do not exist:");
            println!();
            ux::print_one_column_table("Project ID", missing);
        }
        if !duplicates.is_empty() {
            ux::print_problem("  Solution contains projects with the same name:");
            println!();
            ux::print_one_column_table("Name", duplicates);
        }
        if !broken.is_empty() {
            ux::print_warning("  Solution contains projects whose project list cannot be read:");
            println!();
            ux::print_one_column_table("Project", broken.iter().map(String::as_str));
        }
        if !not_found.is_empty() {
            ux::print_warning("  Solution contains unexist projects:");
            println!();
            ux::print_one_column_table("Path", not_found.iter().map(String::as_str));
        }

        if !self.show_only_problems && !has_problems {
            println!(
                " {}",
                "  No problems found in solution.".green()
            );
            println!();
        }
    }

    fn err(&mut self, path: &Path, error: SolutionError) {
        self.problems_found = true;
        self.failure = Some(crate::exit_code(&error));
        crate::err(path, error);
    }
}

/// Projects whose files are absent. Only checked when solution location is known
fn search_not_found(model: &SolutionModel) -> BTreeSet<String> {
    if model.path().is_none() {
        return BTreeSet::new();
    }
    model
        .iterate_projects()
        .filter(|p| has_file(p))
        .filter(|p| !p.absolute_path.exists())
        .map(|p| p.absolute_path.display().to_string())
        .collect()
}

fn has_file(project: &ProjectEntry) -> bool {
    !project.kind.is_container()
        && !project.relative_path.contains("://")
        && !project.absolute_path.as_os_str().is_empty()
}
