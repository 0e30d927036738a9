use std::collections::BTreeMap;
use std::path::Path;

use comfy_table::{Cell, Color};
use crossterm::style::Stylize;
use solm::metaproject::{SynthesisRequest, SynthesizedProject, TaskStep};
use solm::{SolutionError, SolutionFilter, SolutionModel};

use crate::{ux, Consume};

/// Synthesizes build project and prints its plan
pub struct Plan {
    global_properties: BTreeMap<String, String>,
    tools_version: Option<String>,
    targets: Vec<String>,
    skip_invalid_configurations: bool,
    json: bool,
    pub failure: Option<exitcode::ExitCode>,
}

impl Plan {
    #[must_use]
    pub fn new(
        global_properties: BTreeMap<String, String>,
        tools_version: Option<String>,
        targets: Vec<String>,
        skip_invalid_configurations: bool,
        json: bool,
    ) -> Self {
        Self {
            global_properties,
            tools_version,
            targets,
            skip_invalid_configurations,
            json,
            failure: None,
        }
    }

    fn request(&self, filter: Option<SolutionFilter>) -> SynthesisRequest {
        SynthesisRequest {
            global_properties: self.global_properties.clone(),
            tools_version: self.tools_version.clone(),
            targets: self.targets.clone(),
            skip_invalid_configurations: self.skip_invalid_configurations,
            filter,
        }
    }

    fn print(path: &Path, model: &SolutionModel, project: &SynthesizedProject) {
        ux::print_solution_path(&path.display().to_string());

        let mut table = ux::new_table(["Property", "Value"]);
        for name in ["Configuration", "Platform", "ProjectToolsVersion", "VisualStudioVersion"] {
            if let Some(value) = project.properties.get(name) {
                table.add_row(vec![Cell::new(name), Cell::new(value).fg(Color::Cyan)]);
            }
        }
        println!("{table}");
        println!();

        for warning in &project.warnings {
            ux::print_warning(warning);
        }

        for entry in &project.default_targets {
            let Some(target) = project.target(entry) else {
                continue;
            };
            println!(
                " {} {}",
                "Target".bold(),
                project.target_schedule(&target.name).join(" -> ")
            );
            println!();

            let mut table = ux::new_table(["#", "Project", "Configuration", "Step"]);
            for (n, step) in target.steps.iter().enumerate() {
                let row = match step {
                    TaskStep::Invoke(invocation) => {
                        let name = model
                            .find_by_guid(&invocation.project_guid)
                            .map_or(invocation.project_guid.as_str(), |p| p.unique_name.as_str());
                        let configuration = invocation
                            .properties
                            .iter()
                            .filter(|(k, _)| *k == "Configuration" || *k == "Platform")
                            .map(|(_, v)| v.as_str())
                            .collect::<Vec<_>>()
                            .join("|");
                        vec![
                            Cell::new(n + 1),
                            Cell::new(name),
                            Cell::new(configuration),
                            Cell::new(invocation.target.as_deref().unwrap_or("default"))
                                .fg(Color::Green),
                        ]
                    }
                    TaskStep::AspNetCompiler { project_guid, .. } => vec![
                        Cell::new(n + 1),
                        Cell::new(project_guid),
                        Cell::new(""),
                        Cell::new("AspNetCompiler").fg(Color::Green),
                    ],
                    TaskStep::Message { text } => vec![
                        Cell::new(n + 1),
                        Cell::new(text).fg(Color::DarkGrey),
                        Cell::new(""),
                        Cell::new("skip"),
                    ],
                    TaskStep::Warning { code, text } => vec![
                        Cell::new(n + 1),
                        Cell::new(text).fg(Color::Yellow),
                        Cell::new(""),
                        Cell::new(code.as_str()),
                    ],
                };
                table.add_row(row);
            }
            if !target.steps.is_empty() {
                println!("{table}");
                println!();
            }
        }

        ux::print_one_column_table(
            "Imported",
            project
                .imports
                .iter()
                .filter_map(|i| i.path.to_str()),
        );
    }
}

impl Consume for Plan {
    fn ok(&mut self, path: &Path, model: &SolutionModel, filter: Option<SolutionFilter>) {
        let request = self.request(filter);
        match solm::synthesize(model, &request) {
            Ok(project) => {
                if self.json {
                    match serde_json::to_string_pretty(&project) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("{e}");
                            self.failure = Some(exitcode::SOFTWARE);
                        }
                    }
                } else {
                    Plan::print(path, model, &project);
                }
            }
            Err(e) => self.err(path, e),
        }
    }

    fn err(&mut self, path: &Path, error: SolutionError) {
        self.failure = Some(crate::exit_code(&error));
        crate::err(path, error);
    }
}
