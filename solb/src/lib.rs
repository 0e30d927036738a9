#![warn(unused_extern_crates)]
#![allow(clippy::missing_errors_doc)]
pub mod plan;
pub mod ux;
pub mod validate;

use std::collections::BTreeMap;
use std::path::Path;

use crossterm::style::Stylize;
use solm::{SolutionError, SolutionFilter, SolutionModel};

/// Consume provides opened solution consumer
pub trait Consume {
    /// Called in case of success parsing
    fn ok(&mut self, path: &Path, model: &SolutionModel, filter: Option<SolutionFilter>);
    /// Called on error
    fn err(&mut self, path: &Path, error: SolutionError);
}

/// Opens solution or solution filter and passes result to consumer
pub fn open_path<C: Consume>(path: &Path, consumer: &mut C) {
    tracing::debug!(path = %path.display(), "opening");
    match solm::open(path) {
        Ok((model, filter)) => consumer.ok(path, &model, filter),
        Err(e) => consumer.err(path, e),
    }
}

fn err(path: &Path, error: SolutionError) {
    eprintln!("Error opening {} solution", path.display().to_string().red());
    eprintln!("{:?}", miette::Report::new(error));
}

/// Exit code matching the error
#[must_use]
pub fn exit_code(error: &SolutionError) -> exitcode::ExitCode {
    match error {
        SolutionError::Read { .. } | SolutionError::FilterMissingSolution { .. } => {
            exitcode::NOINPUT
        }
        SolutionError::UnrecognizedToolsVersion { .. }
        | SolutionError::InvalidSolutionConfiguration { .. } => exitcode::USAGE,
        _ => exitcode::DATAERR,
    }
}

/// Parses `Name=Value` global properties. Single argument may carry several
/// properties separated by `;`
pub fn parse_properties<'a, I>(args: I) -> Result<BTreeMap<String, String>, String>
where
    I: IntoIterator<Item = &'a String>,
{
    let mut properties = BTreeMap::new();
    for arg in args {
        for pair in arg.split(';').map(str::trim).filter(|s| !s.is_empty()) {
            let Some((name, value)) = pair.split_once('=') else {
                return Err(format!("Property \"{pair}\" must be in Name=Value form"));
            };
            let name = name.trim();
            if name.is_empty() {
                return Err(format!("Property \"{pair}\" has no name"));
            }
            properties.insert(name.to_owned(), value.trim().to_owned());
        }
    }
    Ok(properties)
}
