//! Sanitation pipeline preparing ontology files for parsing.
//!
//! Each step receives one candidate file and may fork it into several
//! replacement candidates, most-likely-to-parse first. The original input
//! is copied into a scratch workspace so transformations never touch the
//! caller's file, and it always survives as the final fallback candidate.
//!
//! Step failures are never fatal: a broken repair step logs and passes
//! its input through unchanged.

use anyhow::Result;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::SanitizeConfig;

/// Literals longer than this are truncated before parsing; some Turtle
/// serializers abort on pathologically long strings.
const MAX_LITERAL_CHARS: usize = 5000;

/// Replacement text for truncated literals.
pub const LITERAL_PLACEHOLDER: &str = "[literal trimmed for sanitation]";

/// Result of applying one sanitation step to one candidate.
pub enum StepOutcome {
    /// The step produced replacement candidates, highest priority first.
    Replaced(Vec<PathBuf>),
    /// The step does not apply to this candidate.
    Unchanged,
    /// The step failed; the candidate passes through untouched.
    Failed(anyhow::Error),
}

/// A single sanitation step.
pub trait SanitizeStep: Send + Sync {
    fn name(&self) -> &str;
    fn process(&self, path: &Path) -> StepOutcome;
}

/// Ordered, pluggable sanitation pipeline.
///
/// Owns a scratch workspace that is deleted when the sanitizer is dropped,
/// regardless of outcome.
pub struct Sanitizer {
    workspace: TempDir,
    steps: Vec<Box<dyn SanitizeStep>>,
}

impl Sanitizer {
    pub fn new(config: &SanitizeConfig) -> Result<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("ontology-sanitize-")
            .tempdir()?;

        let steps: Vec<Box<dyn SanitizeStep>> = vec![
            Box::new(RobotStep {
                enabled: config.robot_enabled,
                jar_path: config.robot_jar_path.clone(),
            }),
            Box::new(LiteralTruncationStep),
            Box::new(LanguageTagStep),
        ];

        Ok(Self { workspace, steps })
    }

    /// Pipeline with a custom step list; used by tests and extensions.
    pub fn with_steps(steps: Vec<Box<dyn SanitizeStep>>) -> Result<Self> {
        let workspace = tempfile::Builder::new()
            .prefix("ontology-sanitize-")
            .tempdir()?;
        Ok(Self { workspace, steps })
    }

    /// Run all steps and return candidate paths in order of preference.
    ///
    /// The returned list is deduplicated by path, preserves discovery
    /// order, and always contains the (copied) unmodified input.
    pub fn sanitize(&self, source_path: &Path) -> Result<Vec<PathBuf>> {
        let working_path = self.copy_to_workspace(source_path)?;
        let mut candidates = vec![working_path];

        for step in &self.steps {
            let mut next = Vec::new();
            for candidate in &candidates {
                match step.process(candidate) {
                    StepOutcome::Replaced(paths) => {
                        debug!(
                            step = step.name(),
                            candidate = %candidate.display(),
                            produced = paths.len(),
                            "sanitizer step replaced candidate"
                        );
                        next.extend(paths);
                    }
                    StepOutcome::Unchanged => next.push(candidate.clone()),
                    StepOutcome::Failed(err) => {
                        warn!(
                            step = step.name(),
                            candidate = %candidate.display(),
                            error = %err,
                            "sanitizer step failed; passing candidate through"
                        );
                        next.push(candidate.clone());
                    }
                }
            }
            candidates = next;
        }

        let mut seen = std::collections::HashSet::new();
        candidates.retain(|c| seen.insert(c.clone()));
        Ok(candidates)
    }

    fn copy_to_workspace(&self, source_path: &Path) -> Result<PathBuf> {
        let name = source_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "ontology.owl".to_string());
        let target = self.workspace.path().join(name);
        std::fs::copy(source_path, &target)?;
        Ok(target)
    }
}

/// True when any dot-separated suffix of the file name is `ttl`.
///
/// Derived candidates keep the original name and append their own suffix
/// (`file.ttl.literal`), so the whole suffix chain must be checked.
fn is_turtle_family(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    name.split('.').skip(1).any(|s| s.eq_ignore_ascii_case("ttl"))
}

fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============ External repair/convert step ============

/// Invokes an external repair tool to produce alternate serializations.
///
/// Disabled by default; requires the opt-in flag plus a locatable jar and
/// a `java` runtime. Every successfully produced form is prepended ahead
/// of the original, repairs first.
struct RobotStep {
    enabled: bool,
    jar_path: Option<String>,
}

impl RobotStep {
    fn run_robot(&self, jar: &str, args: &[&str]) -> Result<()> {
        let output = Command::new("java").arg("-jar").arg(jar).args(args).output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("robot exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }
}

impl SanitizeStep for RobotStep {
    fn name(&self) -> &str {
        "robot"
    }

    fn process(&self, path: &Path) -> StepOutcome {
        if !self.enabled {
            return StepOutcome::Unchanged;
        }
        let jar = match &self.jar_path {
            Some(jar) if Path::new(jar).exists() => jar.clone(),
            Some(jar) => {
                warn!(jar = %jar, "robot jar not found; skipping robot step");
                return StepOutcome::Unchanged;
            }
            None => {
                warn!("robot enabled but no jar path configured; skipping robot step");
                return StepOutcome::Unchanged;
            }
        };

        let converted_ttl = append_suffix(path, ".robot.ttl");
        let repaired_ttl = append_suffix(path, ".robot.repaired.ttl");
        let rdfxml = append_suffix(path, ".robot.rdf");

        let mut generated: Vec<PathBuf> = Vec::new();
        let path_str = path.to_string_lossy();

        match self.run_robot(
            &jar,
            &[
                "convert",
                "--input",
                &path_str,
                "--output",
                &converted_ttl.to_string_lossy(),
            ],
        ) {
            Ok(()) if converted_ttl.exists() => generated.push(converted_ttl.clone()),
            Ok(()) => {}
            Err(err) => {
                // `java` missing entirely means the whole step cannot run.
                if err.downcast_ref::<std::io::Error>().is_some() {
                    warn!("java runtime not available; skipping robot step");
                    return StepOutcome::Unchanged;
                }
                warn!(file = %path.display(), error = %err, "robot convert failed");
            }
        }

        if converted_ttl.exists() {
            match self.run_robot(
                &jar,
                &[
                    "repair",
                    "--input",
                    &converted_ttl.to_string_lossy(),
                    "--output",
                    &repaired_ttl.to_string_lossy(),
                ],
            ) {
                Ok(()) if repaired_ttl.exists() => generated.insert(0, repaired_ttl),
                Ok(()) => {}
                Err(err) => warn!(file = %path.display(), error = %err, "robot repair failed"),
            }
        }

        match self.run_robot(
            &jar,
            &[
                "convert",
                "--input",
                &path_str,
                "--format",
                "rdfxml",
                "--output",
                &rdfxml.to_string_lossy(),
            ],
        ) {
            Ok(()) if rdfxml.exists() => generated.insert(0, rdfxml),
            Ok(()) => {}
            Err(err) => warn!(file = %path.display(), error = %err, "robot rdfxml convert failed"),
        }

        if generated.is_empty() {
            return StepOutcome::Unchanged;
        }

        info!(
            file = %path.display(),
            candidates = generated.len() + 1,
            "robot produced alternate candidates"
        );
        generated.push(path.to_path_buf());
        StepOutcome::Replaced(generated)
    }
}

fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{name}{suffix}"))
}

// ============ Oversized-literal truncation step ============

/// Truncates excessively long literals in Turtle-family files.
struct LiteralTruncationStep;

impl SanitizeStep for LiteralTruncationStep {
    fn name(&self) -> &str {
        "literal-truncation"
    }

    fn process(&self, path: &Path) -> StepOutcome {
        if !is_turtle_family(path) {
            return StepOutcome::Unchanged;
        }

        let original = match read_text_lossy(path) {
            Ok(text) => text,
            Err(err) => return StepOutcome::Failed(err),
        };

        let text = truncate_long_literals(&original);
        if text == original {
            return StepOutcome::Unchanged;
        }

        let fixed_path = append_suffix(path, ".literal");
        if let Err(err) = std::fs::write(&fixed_path, &text) {
            return StepOutcome::Failed(err.into());
        }
        info!(
            file = %path.display(),
            fixed = %fixed_path.display(),
            "truncated oversized literals"
        );
        StepOutcome::Replaced(vec![fixed_path, path.to_path_buf()])
    }
}

/// Replace the content of literals longer than [`MAX_LITERAL_CHARS`] with
/// the fixed placeholder, preserving the quoting style.
pub fn truncate_long_literals(input: &str) -> String {
    let triple_double = Regex::new(r#"(?s)"""(.*?)""""#).unwrap();
    let triple_single = Regex::new(r"(?s)'''(.*?)'''").unwrap();
    let double_quote =
        Regex::new(&format!(r#""([^"\r\n]{{{MAX_LITERAL_CHARS},}})""#)).unwrap();

    let text = triple_double.replace_all(input, |caps: &regex::Captures| {
        if caps[1].chars().count() > MAX_LITERAL_CHARS {
            format!(r#""""{LITERAL_PLACEHOLDER}""""#)
        } else {
            caps[0].to_string()
        }
    });
    let text = triple_single.replace_all(&text, |caps: &regex::Captures| {
        if caps[1].chars().count() > MAX_LITERAL_CHARS {
            format!("'''{LITERAL_PLACEHOLDER}'''")
        } else {
            caps[0].to_string()
        }
    });
    let text = double_quote.replace_all(&text, |caps: &regex::Captures| {
        if caps[1].chars().count() > MAX_LITERAL_CHARS {
            format!("\"{LITERAL_PLACEHOLDER}\"")
        } else {
            caps[0].to_string()
        }
    });
    text.into_owned()
}

// ============ Invalid-language-tag repair step ============

/// Strips invalid language tags from Turtle literals, demoting them to
/// plain literals.
struct LanguageTagStep;

impl SanitizeStep for LanguageTagStep {
    fn name(&self) -> &str {
        "language-tag-fix"
    }

    fn process(&self, path: &Path) -> StepOutcome {
        if !is_turtle_family(path) {
            return StepOutcome::Unchanged;
        }

        let original = match read_text_lossy(path) {
            Ok(text) => text,
            Err(err) => return StepOutcome::Failed(err),
        };

        let text = strip_invalid_language_tags(&original);
        if text == original {
            return StepOutcome::Unchanged;
        }

        let fixed_path = append_suffix(path, ".langfix");
        if let Err(err) = std::fs::write(&fixed_path, &text) {
            return StepOutcome::Failed(err.into());
        }
        info!(
            file = %path.display(),
            fixed = %fixed_path.display(),
            "removed invalid language tags"
        );
        StepOutcome::Replaced(vec![fixed_path, path.to_path_buf()])
    }
}

/// Remove `@tag` suffixes whose tag does not match
/// `^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$`; valid tags are left untouched.
pub fn strip_invalid_language_tags(input: &str) -> String {
    let literal_with_lang = Regex::new(r#"("(?:[^"\\]|\\.)*")@([^\s"<>;,]+)"#).unwrap();
    let valid_tag = Regex::new(r"^[a-zA-Z]{1,8}(?:-[a-zA-Z0-9]{1,8})*$").unwrap();

    literal_with_lang
        .replace_all(input, |caps: &regex::Captures| {
            let (literal, tag) = (&caps[1], &caps[2]);
            if valid_tag.is_match(tag) {
                caps[0].to_string()
            } else {
                debug!(tag = tag, "removing invalid language tag");
                literal.to_string()
            }
        })
        .into_owned()
}
