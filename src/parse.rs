//! Format-fallback RDF parsing.
//!
//! Given the sanitizer's candidate paths (priority order), tries each
//! candidate under a prioritized list of serialization formats and
//! returns the first graph that parses. Candidate files and candidate
//! formats are two independent fallback axes; either can resolve a file
//! the other cannot.
//!
//! Format priority per candidate: extension guess, then content sniffing
//! of the first 500 characters, then a fixed exhaustive fallback list,
//! deduplicated in first-seen order.

use anyhow::{anyhow, Result};
use sophia::api::quad::Quad as _;
use sophia::api::source::{QuadSource, TripleSource};
use sophia::api::triple::Triple as _;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::graph::{Literal, Object, RdfGraph, Term, Triple};

/// Serialization formats the parser will attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdfFormat {
    Xml,
    Turtle,
    N3,
    NTriples,
    TriG,
    JsonLd,
}

impl RdfFormat {
    pub fn name(&self) -> &'static str {
        match self {
            RdfFormat::Xml => "xml",
            RdfFormat::Turtle => "turtle",
            RdfFormat::N3 => "n3",
            RdfFormat::NTriples => "nt",
            RdfFormat::TriG => "trig",
            RdfFormat::JsonLd => "json-ld",
        }
    }
}

/// The fixed exhaustive fallback list, tried after guessing and sniffing.
const FALLBACK_FORMATS: &[RdfFormat] = &[
    RdfFormat::Xml,
    RdfFormat::Turtle,
    RdfFormat::N3,
    RdfFormat::NTriples,
    RdfFormat::TriG,
];

/// No candidate file parsed under any candidate format.
///
/// Carries the most recent error observed across *all* candidates, which
/// is the most relevant diagnostic for the caller.
#[derive(Debug, thiserror::Error)]
#[error("unable to parse ontology file {path}: {message}")]
pub struct ParseFailure {
    pub path: PathBuf,
    pub message: String,
}

fn guess_from_extension(path: &Path) -> Option<RdfFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "ttl" | "turtle" => Some(RdfFormat::Turtle),
        "owl" | "rdf" | "rdfs" | "xml" => Some(RdfFormat::Xml),
        "nt" => Some(RdfFormat::NTriples),
        "n3" => Some(RdfFormat::N3),
        "trig" => Some(RdfFormat::TriG),
        "jsonld" => Some(RdfFormat::JsonLd),
        _ => None,
    }
}

fn has_ttl_suffix(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.split('.').skip(1).any(|s| s.eq_ignore_ascii_case("ttl")))
        .unwrap_or(false)
}

/// Compute the prioritized format list for one candidate file.
pub fn detect_candidate_formats(path: &Path) -> Vec<RdfFormat> {
    let mut formats: Vec<RdfFormat> = Vec::new();

    if let Some(guessed) = guess_from_extension(path) {
        formats.push(guessed);
    }

    let head: String = std::fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).chars().take(500).collect::<String>())
        .unwrap_or_default()
        .to_lowercase();

    if head.trim_start().starts_with("<?xml") {
        formats.push(RdfFormat::Xml);
    }
    if head.contains("@prefix") || head.trim_start().starts_with("prefix") {
        formats.push(RdfFormat::Turtle);
    }
    if head.trim_start().starts_with("{\"@context\"") {
        formats.push(RdfFormat::JsonLd);
    }

    formats.extend_from_slice(FALLBACK_FORMATS);

    let mut seen = Vec::new();
    formats.retain(|f| {
        if seen.contains(f) {
            false
        } else {
            seen.push(*f);
            true
        }
    });

    // A `.ttl` file sniffed as XML is a known misparse; turtle wins.
    if has_ttl_suffix(path)
        && formats.contains(&RdfFormat::Turtle)
        && formats.contains(&RdfFormat::Xml)
    {
        formats.retain(|f| *f != RdfFormat::Xml);
    }

    formats
}

/// Parse the first candidate that succeeds, in priority order.
///
/// Candidates with a `.ttl` suffix get a Turtle fast-path attempt before
/// the per-format iteration.
pub fn load_graph_with_fallbacks(candidates: &[PathBuf]) -> Result<RdfGraph, ParseFailure> {
    let original = candidates
        .last()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("<no candidates>"));
    let mut last_error: Option<anyhow::Error> = None;

    for candidate in candidates {
        if has_ttl_suffix(candidate) {
            debug!(file = %candidate.display(), "attempting turtle fast-path parse");
            match parse_file(candidate, RdfFormat::Turtle) {
                Ok(graph) => {
                    info!(
                        file = %candidate.display(),
                        triples = graph.len(),
                        "parsed ontology via turtle fast-path"
                    );
                    return Ok(graph);
                }
                Err(err) => {
                    debug!(file = %candidate.display(), error = %err, "turtle fast-path failed");
                    last_error = Some(err);
                }
            }
        }

        for format in detect_candidate_formats(candidate) {
            debug!(file = %candidate.display(), format = format.name(), "attempting parse");
            match parse_file(candidate, format) {
                Ok(graph) => {
                    info!(
                        file = %candidate.display(),
                        format = format.name(),
                        triples = graph.len(),
                        "parsed ontology"
                    );
                    return Ok(graph);
                }
                Err(err) => {
                    debug!(
                        file = %candidate.display(),
                        format = format.name(),
                        error = %err,
                        "parse attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }
    }

    Err(ParseFailure {
        path: original,
        message: last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no parse candidates produced".to_string()),
    })
}

/// Parse one file as one specific format.
pub fn parse_file(path: &Path, format: RdfFormat) -> Result<RdfGraph> {
    let bytes = std::fs::read(path)?;
    parse_bytes(&bytes, format)
}

/// Sink-side error adapter for sophia's streaming parsers.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
struct SinkError {
    message: String,
}

impl From<anyhow::Error> for SinkError {
    fn from(value: anyhow::Error) -> Self {
        Self {
            message: value.to_string(),
        }
    }
}

/// Parse raw bytes as the given format into an [`RdfGraph`].
pub fn parse_bytes(bytes: &[u8], format: RdfFormat) -> Result<RdfGraph> {
    let reader = BufReader::new(std::io::Cursor::new(bytes));
    let mut triples: Vec<Triple> = Vec::new();

    let mut sink = |s: String, p: String, o: String| -> std::result::Result<(), SinkError> {
        let subject = parse_node_term(&s).map_err(SinkError::from)?;
        let Term::Iri(predicate) = parse_node_term(&p).map_err(SinkError::from)? else {
            return Ok(());
        };
        let object = parse_term(&o).map_err(SinkError::from)?;
        triples.push(Triple {
            subject,
            predicate,
            object,
        });
        Ok(())
    };

    match format {
        RdfFormat::NTriples => {
            sophia::turtle::parser::nt::parse_bufread(reader)
                .try_for_each_triple(|t| sink(t.s().to_string(), t.p().to_string(), t.o().to_string()))
                .map_err(|e| anyhow!("failed to parse N-Triples: {e}"))?;
        }
        // Sophia carries no dedicated N3 parser; the Turtle parser covers
        // the N3 subset that ontology files use in practice.
        RdfFormat::Turtle | RdfFormat::N3 => {
            sophia::turtle::parser::turtle::parse_bufread(reader)
                .try_for_each_triple(|t| sink(t.s().to_string(), t.p().to_string(), t.o().to_string()))
                .map_err(|e| anyhow!("failed to parse Turtle: {e}"))?;
        }
        RdfFormat::TriG => {
            sophia::turtle::parser::trig::parse_bufread(reader)
                .try_for_each_quad(|q| sink(q.s().to_string(), q.p().to_string(), q.o().to_string()))
                .map_err(|e| anyhow!("failed to parse TriG: {e}"))?;
        }
        RdfFormat::Xml => {
            sophia::xml::parser::parse_bufread(reader)
                .try_for_each_triple(|t| sink(t.s().to_string(), t.p().to_string(), t.o().to_string()))
                .map_err(|e| anyhow!("failed to parse RDF/XML: {e}"))?;
        }
        RdfFormat::JsonLd => {
            anyhow::bail!("JSON-LD serialization is not supported");
        }
    }

    Ok(RdfGraph { triples })
}

// ============ Term display parsing ============

fn unescape_rdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a term from sophia's N-Triples-like display form.
fn parse_term(term: &str) -> Result<Object> {
    let s = term.trim();

    if let Some(iri) = s.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        return Ok(Object::Node(Term::Iri(iri.to_string())));
    }

    if let Some(id) = s.strip_prefix("_:") {
        return Ok(Object::Node(Term::Blank(id.to_string())));
    }

    if s.starts_with('"') {
        let mut end_quote = None;
        let mut prev_was_escape = false;
        for (i, ch) in s.char_indices().skip(1) {
            if ch == '"' && !prev_was_escape {
                end_quote = Some(i);
                break;
            }
            prev_was_escape = ch == '\\' && !prev_was_escape;
        }
        let end = end_quote.ok_or_else(|| anyhow!("literal missing closing quote: {s}"))?;

        let lexical = unescape_rdf_string(&s[1..end]);
        let rest = s[end + 1..].trim();

        let mut language = None;
        let mut datatype = None;
        if let Some(lang) = rest.strip_prefix('@') {
            language = Some(lang.to_string());
        } else if let Some(dt) = rest.strip_prefix("^^") {
            let dt = dt.trim();
            if let Some(dt_iri) = dt.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
                datatype = Some(dt_iri.to_string());
            } else if !dt.is_empty() {
                datatype = Some(dt.to_string());
            }
        }

        return Ok(Object::Literal(Literal {
            lexical,
            datatype,
            language,
        }));
    }

    Err(anyhow!("unsupported RDF term form: {s}"))
}

fn parse_node_term(term: &str) -> Result<Term> {
    match parse_term(term)? {
        Object::Node(node) => Ok(node),
        Object::Literal(_) => Err(anyhow!("expected IRI or blank node, got literal: {term}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SIMPLE_TTL: &str = r#"@prefix rdfs: <http://www.w3.org/2000/01/rdf-schema#> .
@prefix owl: <http://www.w3.org/2002/07/owl#> .
<http://example.org/Alloy> a owl:Class ;
    rdfs:label "Alloy"@en .
"#;

    #[test]
    fn test_format_names() {
        assert_eq!(RdfFormat::Xml.name(), "xml");
        assert_eq!(RdfFormat::NTriples.name(), "nt");
    }

    #[test]
    fn test_ttl_extension_drops_xml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("onto.ttl");
        fs::write(&path, SIMPLE_TTL).unwrap();

        let formats = detect_candidate_formats(&path);
        assert!(formats.contains(&RdfFormat::Turtle));
        assert!(
            !formats.contains(&RdfFormat::Xml),
            "xml must be dropped for .ttl files: {formats:?}"
        );
        assert_eq!(formats[0], RdfFormat::Turtle);
    }

    #[test]
    fn test_xml_declaration_sniffed() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mystery.dat");
        fs::write(&path, "<?xml version=\"1.0\"?>\n<rdf:RDF/>").unwrap();

        let formats = detect_candidate_formats(&path);
        assert_eq!(formats[0], RdfFormat::Xml);
    }

    #[test]
    fn test_prefix_sniffed_as_turtle() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mystery.dat");
        fs::write(&path, SIMPLE_TTL).unwrap();

        let formats = detect_candidate_formats(&path);
        assert_eq!(formats[0], RdfFormat::Turtle);
    }

    #[test]
    fn test_fallback_list_deduplicated() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("onto.owl");
        fs::write(&path, "<?xml version=\"1.0\"?>").unwrap();

        let formats = detect_candidate_formats(&path);
        let xml_count = formats.iter().filter(|f| **f == RdfFormat::Xml).count();
        assert_eq!(xml_count, 1);
        // Exhaustive fallbacks are present exactly once each.
        for f in FALLBACK_FORMATS {
            assert_eq!(formats.iter().filter(|g| *g == f).count(), 1);
        }
    }

    #[test]
    fn test_parse_simple_turtle() {
        let graph = parse_bytes(SIMPLE_TTL.as_bytes(), RdfFormat::Turtle).unwrap();
        assert_eq!(graph.len(), 2);
        let labels: Vec<_> = graph
            .triples
            .iter()
            .filter_map(|t| t.object.as_literal_text())
            .collect();
        assert_eq!(labels, vec!["Alloy"]);
    }

    #[test]
    fn test_parse_ntriples() {
        let nt = "<http://example.org/a> <http://example.org/b> \"hello\" .\n";
        let graph = parse_bytes(nt.as_bytes(), RdfFormat::NTriples).unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(
            graph.triples[0].predicate,
            "http://example.org/b".to_string()
        );
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(parse_bytes(b"this is not rdf {{{", RdfFormat::Turtle).is_err());
    }

    #[test]
    fn test_fallback_recovers_mislabeled_turtle() {
        // Turtle content behind an .owl extension: the XML guess fails,
        // the sniffed turtle format succeeds.
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("onto.owl");
        fs::write(&path, SIMPLE_TTL).unwrap();

        let graph = load_graph_with_fallbacks(&[path]).unwrap();
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_all_candidates_fail_reports_last_error() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("bad1.ttl");
        let b = tmp.path().join("bad2.ttl");
        fs::write(&a, "not rdf at all {{{").unwrap();
        fs::write(&b, "also not rdf )))").unwrap();

        let err = load_graph_with_fallbacks(&[a, b.clone()]).unwrap_err();
        assert_eq!(err.path, b);
        assert!(!err.message.is_empty());
    }

    #[test]
    fn test_term_display_parsing() {
        match parse_term("<http://example.org/a>").unwrap() {
            Object::Node(Term::Iri(iri)) => assert_eq!(iri, "http://example.org/a"),
            other => panic!("unexpected {other:?}"),
        }
        match parse_term("\"hi\"@en").unwrap() {
            Object::Literal(lit) => {
                assert_eq!(lit.lexical, "hi");
                assert_eq!(lit.language.as_deref(), Some("en"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse_term("\"5\"^^<http://www.w3.org/2001/XMLSchema#int>").unwrap() {
            Object::Literal(lit) => {
                assert_eq!(lit.datatype.as_deref(), Some("http://www.w3.org/2001/XMLSchema#int"));
            }
            other => panic!("unexpected {other:?}"),
        }
        match parse_term("_:b0").unwrap() {
            Object::Node(Term::Blank(id)) => assert_eq!(id, "b0"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
