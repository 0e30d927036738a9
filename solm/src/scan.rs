use std::fmt::Display;
use std::iter::Enumerate;
use std::str::Lines;

use nom::bytes::complete::{tag, take_until};
use nom::character::complete::{char, space0};
use nom::combinator::{opt, rest, value};
use nom::error::{ErrorKind, ParseError, VerboseError};
use nom::sequence::{delimited, preceded, tuple};
use nom::IResult;

use crate::error::SolutionError;

pub const HEADER_PREFIX: &str = "Microsoft Visual Studio Solution File, Format Version ";

const PROJECT_START: &str = "Project(";
const PROJECT_END: &str = "EndProject";
const PROJECT_SECTION: &str = "ProjectSection";
const PROJECT_SECTION_END: &str = "EndProjectSection";
const GLOBAL_START: &str = "Global";
const GLOBAL_END: &str = "EndGlobal";
const GLOBAL_SECTION: &str = "GlobalSection";
const GLOBAL_SECTION_END: &str = "EndGlobalSection";
const NESTED_PROJECTS: &str = "NestedProjects";

/// First line of a `Project(...) = ...` block
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProjectHeader<'a> {
    pub type_guid: &'a str,
    pub name: &'a str,
    pub path: &'a str,
    pub guid: &'a str,
}

/// Typed solution line
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Record<'a> {
    /// Format version text following the file header prefix
    Header(&'a str),
    /// Text of a `#` line without the sharp sign
    Comment(&'a str),
    ProjectHeader(ProjectHeader<'a>),
    /// `implicit` is set when the terminator was missing and scanning resynchronized
    ProjectEnd { implicit: bool },
    ProjectSectionStart { kind: &'a str, disposition: &'a str },
    ProjectSectionEnd,
    GlobalStart,
    GlobalEnd,
    GlobalSectionStart { name: &'a str, disposition: &'a str },
    GlobalSectionEnd,
    KeyValue { key: &'a str, value: &'a str },
    NestedProjectEdge { child: &'a str, parent: &'a str },
    /// Any other non blank line
    Text(&'a str),
}

/// Record together with its 1-based line number
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Line<'a> {
    pub number: usize,
    pub record: Record<'a>,
}

impl Display for Record<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Record::Header(v) => write!(f, "Header({v})"),
            Record::Comment(c) => write!(f, "Comment({c})"),
            Record::ProjectHeader(h) => write!(
                f,
                "ProjectHeader({}, {}, {}, {})",
                h.type_guid, h.name, h.path, h.guid
            ),
            Record::ProjectEnd { implicit } => write!(f, "ProjectEnd(implicit: {implicit})"),
            Record::ProjectSectionStart { kind, disposition } => {
                write!(f, "ProjectSectionStart({kind}, {disposition})")
            }
            Record::ProjectSectionEnd => write!(f, "ProjectSectionEnd"),
            Record::GlobalStart => write!(f, "GlobalStart"),
            Record::GlobalEnd => write!(f, "GlobalEnd"),
            Record::GlobalSectionStart { name, disposition } => {
                write!(f, "GlobalSectionStart({name}, {disposition})")
            }
            Record::GlobalSectionEnd => write!(f, "GlobalSectionEnd"),
            Record::KeyValue { key, value } => write!(f, "KeyValue({key} = {value})"),
            Record::NestedProjectEdge { child, parent } => {
                write!(f, "NestedProjectEdge({child} -> {parent})")
            }
            Record::Text(t) => write!(f, "Text({t})"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum ScannerContext {
    TopLevel,
    Project,
    ProjectSection,
    Global,
    GlobalSection,
    NestedProjects,
}

/// Line oriented scanner of the solution text format.
///
/// Blank lines are skipped in every context. A `Project(` line met while a project
/// is still open yields an implicit [`Record::ProjectEnd`] first so that a missing
/// `EndProject` never swallows the following projects.
pub struct Scanner<'a> {
    lines: Enumerate<Lines<'a>>,
    context: ScannerContext,
    pending: Option<Line<'a>>,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            lines: input.lines().enumerate(),
            context: ScannerContext::TopLevel,
            pending: None,
        }
    }

    fn classify(&mut self, number: usize, text: &'a str) -> Result<Line<'a>, SolutionError> {
        let line = |record| Line { number, record };

        if text.starts_with(PROJECT_START) {
            return self.project_header(number, text);
        }

        let record = match self.context {
            ScannerContext::TopLevel => self.top_level(text),
            ScannerContext::Project => {
                if text.starts_with(PROJECT_SECTION_END) {
                    Record::Text(text)
                } else if text.starts_with(PROJECT_END) {
                    self.context = ScannerContext::TopLevel;
                    Record::ProjectEnd { implicit: false }
                } else if text.starts_with(PROJECT_SECTION) {
                    match section_header::<VerboseError<&str>>(text, PROJECT_SECTION) {
                        Ok((_, (kind, disposition))) => {
                            self.context = ScannerContext::ProjectSection;
                            Record::ProjectSectionStart { kind, disposition }
                        }
                        Err(_) => {
                            tracing::warn!(line = number, text, "malformed project section header");
                            Record::Text(text)
                        }
                    }
                } else if text == GLOBAL_START {
                    self.context = ScannerContext::Global;
                    self.pending = Some(line(Record::GlobalStart));
                    Record::ProjectEnd { implicit: true }
                } else {
                    Record::Text(text)
                }
            }
            ScannerContext::ProjectSection => {
                if text.starts_with(PROJECT_SECTION_END) {
                    self.context = ScannerContext::Project;
                    Record::ProjectSectionEnd
                } else if text.starts_with(PROJECT_END) {
                    // Section terminator is missing, close both
                    self.context = ScannerContext::TopLevel;
                    self.pending = Some(line(Record::ProjectEnd { implicit: false }));
                    Record::ProjectSectionEnd
                } else {
                    key_value(text)
                }
            }
            ScannerContext::Global => {
                if text.starts_with(GLOBAL_SECTION_END) {
                    Record::Text(text)
                } else if text.starts_with(GLOBAL_END) {
                    self.context = ScannerContext::TopLevel;
                    Record::GlobalEnd
                } else if text.starts_with(GLOBAL_SECTION) {
                    match section_header::<VerboseError<&str>>(text, GLOBAL_SECTION) {
                        Ok((_, (name, disposition))) => {
                            self.context = if name == NESTED_PROJECTS {
                                ScannerContext::NestedProjects
                            } else {
                                ScannerContext::GlobalSection
                            };
                            Record::GlobalSectionStart { name, disposition }
                        }
                        Err(_) => {
                            tracing::warn!(line = number, text, "malformed global section header");
                            Record::Text(text)
                        }
                    }
                } else {
                    Record::Text(text)
                }
            }
            ScannerContext::GlobalSection | ScannerContext::NestedProjects => {
                if text.starts_with(GLOBAL_SECTION_END) {
                    self.context = ScannerContext::Global;
                    Record::GlobalSectionEnd
                } else if text.starts_with(GLOBAL_END) {
                    self.context = ScannerContext::TopLevel;
                    self.pending = Some(line(Record::GlobalEnd));
                    Record::GlobalSectionEnd
                } else if self.context == ScannerContext::NestedProjects {
                    match key_value(text) {
                        Record::KeyValue { key, value } => Record::NestedProjectEdge {
                            child: key,
                            parent: value,
                        },
                        other => other,
                    }
                } else {
                    key_value(text)
                }
            }
        };
        Ok(line(record))
    }

    fn top_level(&mut self, text: &'a str) -> Record<'a> {
        if let Some(version) = text.strip_prefix(HEADER_PREFIX) {
            Record::Header(version.trim())
        } else if let Some(comment) = text.strip_prefix('#') {
            Record::Comment(comment.trim())
        } else if text == GLOBAL_START {
            self.context = ScannerContext::Global;
            Record::GlobalStart
        } else {
            key_value(text)
        }
    }

    fn project_header(&mut self, number: usize, text: &'a str) -> Result<Line<'a>, SolutionError> {
        let header = match project_header::<VerboseError<&str>>(text) {
            Ok((_, header)) => header,
            Err(_) => {
                return Err(SolutionError::MalformedProjectLine {
                    line: number,
                    text: text.to_owned(),
                })
            }
        };
        let line = Line {
            number,
            record: Record::ProjectHeader(header),
        };
        match self.context {
            ScannerContext::Project | ScannerContext::ProjectSection => {
                self.context = ScannerContext::Project;
                self.pending = Some(line);
                Ok(Line {
                    number,
                    record: Record::ProjectEnd { implicit: true },
                })
            }
            ScannerContext::TopLevel => {
                self.context = ScannerContext::Project;
                Ok(line)
            }
            _ => Ok(Line {
                number,
                record: Record::Text(text),
            }),
        }
    }
}

impl<'a> Iterator for Scanner<'a> {
    type Item = Result<Line<'a>, SolutionError>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(line) = self.pending.take() {
            return Some(Ok(line));
        }
        loop {
            let (ix, raw) = self.lines.next()?;
            let text = raw.trim();
            if text.is_empty() {
                continue;
            }
            return Some(self.classify(ix + 1, text));
        }
    }
}

fn key_value(text: &str) -> Record<'_> {
    match text.split_once('=') {
        Some((key, value)) => Record::KeyValue {
            key: key.trim(),
            value: value.trim(),
        },
        None => Record::Text(text),
    }
}

/// Parses `Keyword(Name) = disposition` lines
fn section_header<'a, E>(
    input: &'a str,
    keyword: &'static str,
) -> IResult<&'a str, (&'a str, &'a str), E>
where
    E: ParseError<&'a str> + std::fmt::Debug,
{
    let (input, _) = tuple((tag(keyword), space0))(input)?;
    let (input, name) = delimited(char('('), take_until(")"), char(')'))(input)?;
    let (input, disposition) = opt(preceded(tuple((space0, char('='), space0)), rest))(input)?;
    Ok((input, (name.trim(), disposition.unwrap_or_default().trim())))
}

/// Parses `Project("{type}") = "name", "path", "{guid}"` positionally.
/// Quotes inside fields are not escaped by the format so fields are cut at
/// `"<ws>,<ws>"` separators only.
fn project_header<'a, E>(input: &'a str) -> IResult<&'a str, ProjectHeader<'a>, E>
where
    E: ParseError<&'a str> + std::fmt::Debug,
{
    let (input, _) = tuple((tag("Project"), space0, char('('), space0))(input)?;
    let (input, type_guid) = delimited(char('"'), take_until("\""), char('"'))(input)?;
    let (input, _) = tuple((space0, char(')'), space0, char('='), space0))(input)?;
    let (remaining, fields) = rest(input)?;

    match quoted_fields(fields) {
        Some([name, path, guid]) => Ok((
            remaining,
            ProjectHeader {
                type_guid: type_guid.trim(),
                name,
                path,
                guid,
            },
        )),
        None => Err(nom::Err::Error(E::from_error_kind(
            input,
            ErrorKind::SeparatedList,
        ))),
    }
}

fn quoted_fields(input: &str) -> Option<[&str; 3]> {
    let inner = input.trim().strip_prefix('"')?.strip_suffix('"')?;
    let mut fields = Vec::with_capacity(3);
    let mut start = 0;
    let mut search = 0;
    while let Some(offset) = inner[search..].find('"') {
        let quote = search + offset;
        if let Ok((after, ())) = field_separator::<VerboseError<&str>>(&inner[quote..]) {
            fields.push(inner[start..quote].trim());
            start = inner.len() - after.len();
            search = start;
        } else {
            search = quote + 1;
        }
    }
    fields.push(inner[start..].trim());
    <[&str; 3]>::try_from(fields).ok()
}

fn field_separator<'a, E>(input: &'a str) -> IResult<&'a str, (), E>
where
    E: ParseError<&'a str> + std::fmt::Debug,
{
    value(
        (),
        tuple((char('"'), space0, char(','), space0, char('"'))),
    )(input)
}
