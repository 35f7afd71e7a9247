//! Documentation examples
//!
//! An example is a prompt line (`$ ` or `>>> `) followed by the output it is
//! expected to produce, up to a blank line, the next prompt or a code fence.
//! A line holding only `...` in the expected output matches any run of lines.
//!
//! ```text
//! $ echo hello
//! hello
//! ```
//!
//! Markdown documents are split into items at headings; each item with at
//! least one example becomes one unit.

use crate::command::{CommandRunner, ExternalCommand};
use crate::error::{GateError, GateResult};
use crate::source::DocModule;
use crate::unit::{Outcome, TestUnit};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const PROMPTS: [&str; 2] = ["$ ", ">>> "];
const ELLIPSIS: &str = "...";

/// A single prompt and its expected output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    /// Text after the prompt
    pub source: String,
    /// Expected output lines
    pub want: Vec<String>,
    /// 1-based line of the prompt
    pub line: usize,
}

/// A documented item and its examples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocItem {
    /// Identifier-safe item name
    pub name: String,
    /// Heading text, used as the unit description
    pub title: Option<String>,
    pub examples: Vec<Example>,
}

/// Produces the actual output for an example
pub trait Evaluator: Send + Sync {
    fn evaluate(&self, source: &str) -> Result<String, String>;
}

impl<F> Evaluator for F
where
    F: Fn(&str) -> Result<String, String> + Send + Sync,
{
    fn evaluate(&self, source: &str) -> Result<String, String> {
        self(source)
    }
}

/// Extract examples from a block of text
pub fn parse_examples(text: &str) -> Vec<Example> {
    parse_lines(text.lines().enumerate())
}

fn parse_lines<'a>(lines: impl Iterator<Item = (usize, &'a str)>) -> Vec<Example> {
    let mut examples = Vec::new();
    let mut current: Option<(Example, usize)> = None;

    for (index, line) in lines {
        // Only ASCII indentation is stripped from output lines
        let trimmed = line.trim_start_matches([' ', '\t']);
        let indent = line.len() - trimmed.len();

        if let Some(source) = PROMPTS.iter().find_map(|p| trimmed.strip_prefix(p)) {
            examples.extend(current.take().map(|(e, _)| e));
            current = Some((
                Example {
                    source: source.trim_end().to_string(),
                    want: Vec::new(),
                    line: index + 1,
                },
                indent,
            ));
            continue;
        }

        if trimmed.trim().is_empty() || trimmed.starts_with("```") {
            examples.extend(current.take().map(|(e, _)| e));
        } else if let Some((example, prompt_indent)) = current.as_mut() {
            let strip = (*prompt_indent).min(indent);
            example.want.push(line[strip..].trim_end().to_string());
        }
    }

    examples.extend(current.map(|(e, _)| e));
    examples
}

/// Split a markdown document into items at headings
///
/// Examples before the first heading belong to an item named `intro`.
pub fn parse_document(text: &str) -> Vec<DocItem> {
    let mut sections: Vec<(String, Option<String>, Vec<(usize, &str)>)> =
        vec![("intro".to_string(), None, Vec::new())];

    let mut in_fence = false;
    let mut in_example = false;

    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            in_example = false;
        } else if trimmed.is_empty() {
            in_example = false;
        } else if PROMPTS
            .iter()
            .any(|p| line.trim_start_matches([' ', '\t']).starts_with(p))
        {
            in_example = true;
        } else if !in_fence && !in_example {
            if let Some(title) = heading_title(line) {
                sections.push((slugify(title), Some(title.to_string()), Vec::new()));
                continue;
            }
        }
        if let Some(section) = sections.last_mut() {
            section.2.push((index, line));
        }
    }

    let mut items: Vec<DocItem> = Vec::new();
    for (name, title, lines) in sections {
        let examples = parse_lines(lines.into_iter());
        if examples.is_empty() {
            continue;
        }
        let name = unique_name(&items, name);
        items.push(DocItem {
            name,
            title,
            examples,
        });
    }
    items
}

/// Title of an ATX heading (`#` to `######`, then a space)
fn heading_title(line: &str) -> Option<&str> {
    let content = line.trim_start_matches(' ');
    if line.len() - content.len() > 3 {
        return None;
    }
    let line = content;
    let level = line.len() - line.trim_start_matches('#').len();
    if !(1..=6).contains(&level) {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with([' ', '\t']) {
        return None;
    }
    let title = rest.trim().trim_end_matches('#').trim();
    (!title.is_empty()).then_some(title)
}

fn unique_name(items: &[DocItem], base: String) -> String {
    if !items.iter().any(|i| i.name == base) {
        return base;
    }
    (2..)
        .map(|n| format!("{}_{}", base, n))
        .find(|candidate| !items.iter().any(|i| &i.name == candidate))
        .unwrap_or(base)
}

/// Lowercase identifier made of alphanumerics and underscores
pub fn slugify(title: &str) -> String {
    let mut slug = String::new();
    for c in title.chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    let slug = slug.trim_end_matches('_').to_string();
    if slug.is_empty() {
        "item".to_string()
    } else {
        slug
    }
}

/// Compare expected and actual output, honouring `...` lines
pub fn output_matches(want: &[String], got: &str) -> bool {
    let got = normalize(got);
    let want: Vec<&str> = trim_trailing_blank(want.iter().map(String::as_str).collect());
    matches_from(&want, &got)
}

fn normalize(text: &str) -> Vec<&str> {
    trim_trailing_blank(text.lines().map(str::trim_end).collect())
}

fn trim_trailing_blank(mut lines: Vec<&str>) -> Vec<&str> {
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

fn matches_from(want: &[&str], got: &[&str]) -> bool {
    match want.split_first() {
        None => got.is_empty(),
        Some((&ELLIPSIS, rest)) => (0..=got.len()).any(|skip| matches_from(rest, &got[skip..])),
        Some((line, rest)) => got
            .split_first()
            .is_some_and(|(first, remaining)| first == line && matches_from(rest, remaining)),
    }
}

/// Build the unit that runs every example of one item
pub fn item_unit(
    module: &str,
    item: DocItem,
    origin: Option<PathBuf>,
    evaluator: Arc<dyn Evaluator>,
) -> TestUnit {
    let id = format!("{}.{}", module, item.name);
    let location_id = id.clone();
    let examples = item.examples;

    let unit = TestUnit::doc_example(id, move |_ctx| {
        for example in &examples {
            let location = location_line(origin.as_deref(), example.line, &location_id);
            match evaluator.evaluate(&example.source) {
                Ok(got) if output_matches(&example.want, &got) => continue,
                Ok(got) => return Outcome::Fail(mismatch_report(&location, example, &got)),
                Err(error) => return Outcome::Fail(exception_report(&location, example, &error)),
            }
        }
        Outcome::Pass
    });

    match item.title {
        Some(title) => unit.with_description(title),
        None => unit,
    }
}

fn location_line(origin: Option<&Path>, line: usize, id: &str) -> String {
    match origin {
        Some(path) => format!("File \"{}\", line {}, in {}", path.display(), line, id),
        None => format!("Line {}, in {}", line, id),
    }
}

fn indented(text: &str) -> String {
    let mut out = String::new();
    for line in text.lines() {
        let _ = writeln!(out, "    {}", line);
    }
    out
}

fn mismatch_report(location: &str, example: &Example, got: &str) -> String {
    let mut report = format!("{}\nFailed example:\n{}", location, indented(&example.source));
    if example.want.is_empty() {
        report.push_str("Expected nothing\n");
    } else {
        report.push_str("Expected:\n");
        report.push_str(&indented(&example.want.join("\n")));
    }
    if got.trim().is_empty() {
        report.push_str("Got nothing\n");
    } else {
        report.push_str("Got:\n");
        report.push_str(&indented(got));
    }
    report
}

fn exception_report(location: &str, example: &Example, error: &str) -> String {
    format!(
        "{}\nFailed example:\n{}Exception raised:\n{}",
        location,
        indented(&example.source),
        indented(error)
    )
}

/// A documentation module defined in code
pub struct StaticModule {
    name: String,
    items: Vec<(String, Option<String>, String)>,
    evaluator: Arc<dyn Evaluator>,
}

impl StaticModule {
    pub fn new(name: impl Into<String>, evaluator: impl Evaluator + 'static) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
            evaluator: Arc::new(evaluator),
        }
    }

    /// Document an item; `docs` holds the examples
    pub fn item(mut self, name: &str, docs: &str) -> Self {
        let title = docs.lines().map(str::trim).find(|l| !l.is_empty()).and_then(|l| {
            if PROMPTS.iter().any(|p| l.starts_with(p.trim_end())) {
                None
            } else {
                Some(l.to_string())
            }
        });
        self.items.push((name.to_string(), title, docs.to_string()));
        self
    }
}

impl DocModule for StaticModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> GateResult<Vec<TestUnit>> {
        Ok(self
            .items
            .iter()
            .filter_map(|(name, title, docs)| {
                let examples = parse_examples(docs);
                if examples.is_empty() {
                    return None;
                }
                let item = DocItem {
                    name: name.clone(),
                    title: title.clone(),
                    examples,
                };
                Some(item_unit(&self.name, item, None, Arc::clone(&self.evaluator)))
            })
            .collect())
    }
}

/// Runs `$ ` examples through the shell in the document's directory
struct ShellEvaluator {
    runner: Arc<dyn CommandRunner>,
    dir: PathBuf,
}

impl Evaluator for ShellEvaluator {
    fn evaluate(&self, source: &str) -> Result<String, String> {
        let command = ExternalCommand::shell(source).current_dir(&self.dir);
        let output = self.runner.run(&command).map_err(|e| e.to_string())?;
        if !output.success() {
            return Err(format!(
                "exit status {}\n{}",
                output.status,
                output.stderr.trim_end()
            ));
        }
        Ok(format!("{}{}", output.stdout, output.stderr))
    }
}

/// A markdown document whose console examples are run through the shell
pub struct MarkdownModule {
    name: String,
    path: PathBuf,
    text: String,
    runner: Arc<dyn CommandRunner>,
}

impl MarkdownModule {
    /// Load a document; the module is named after the file stem
    pub fn load(path: &Path, runner: Arc<dyn CommandRunner>) -> GateResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| GateError::io(path, e))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| GateError::invalid_source(path, "document has no file name"))?;

        Ok(Self {
            name,
            path: path.to_path_buf(),
            text,
            runner,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DocModule for MarkdownModule {
    fn name(&self) -> &str {
        &self.name
    }

    fn units(&self) -> GateResult<Vec<TestUnit>> {
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let evaluator: Arc<dyn Evaluator> = Arc::new(ShellEvaluator {
            runner: Arc::clone(&self.runner),
            dir,
        });

        Ok(parse_document(&self.text)
            .into_iter()
            .map(|item| item_unit(&self.name, item, Some(self.path.clone()), Arc::clone(&evaluator)))
            .collect())
    }
}
