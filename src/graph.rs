//! In-memory RDF graph model and Markdown document generation.
//!
//! A [`RdfGraph`] is the ephemeral product of one successful parse. The
//! generator walks it for ontology-level metadata, classes, properties,
//! and named individuals, and renders a heading-structured Markdown
//! document that the chunker splits for indexing.

use std::collections::BTreeMap;

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
pub const RDFS_COMMENT: &str = "http://www.w3.org/2000/01/rdf-schema#comment";
pub const RDFS_SUBCLASS_OF: &str = "http://www.w3.org/2000/01/rdf-schema#subClassOf";
pub const RDFS_DOMAIN: &str = "http://www.w3.org/2000/01/rdf-schema#domain";
pub const RDFS_RANGE: &str = "http://www.w3.org/2000/01/rdf-schema#range";
pub const OWL_ONTOLOGY: &str = "http://www.w3.org/2002/07/owl#Ontology";
pub const OWL_CLASS: &str = "http://www.w3.org/2002/07/owl#Class";
pub const OWL_OBJECT_PROPERTY: &str = "http://www.w3.org/2002/07/owl#ObjectProperty";
pub const OWL_DATATYPE_PROPERTY: &str = "http://www.w3.org/2002/07/owl#DatatypeProperty";
pub const OWL_ANNOTATION_PROPERTY: &str = "http://www.w3.org/2002/07/owl#AnnotationProperty";
pub const OWL_NAMED_INDIVIDUAL: &str = "http://www.w3.org/2002/07/owl#NamedIndividual";
pub const SKOS_DEFINITION: &str = "http://www.w3.org/2004/02/skos/core#definition";
pub const DCTERMS_DESCRIPTION: &str = "http://purl.org/dc/terms/description";

/// An IRI or blank node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Term {
    Iri(String),
    Blank(String),
}

/// A literal value with optional datatype and language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    pub lexical: String,
    pub datatype: Option<String>,
    pub language: Option<String>,
}

/// A triple object: either a node or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Object {
    Node(Term),
    Literal(Literal),
}

impl Object {
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Object::Node(Term::Iri(iri)) => Some(iri),
            _ => None,
        }
    }

    pub fn as_literal_text(&self) -> Option<&str> {
        match self {
            Object::Literal(lit) => Some(&lit.lexical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Triple {
    pub subject: Term,
    pub predicate: String,
    pub object: Object,
}

/// An in-memory RDF graph; exists only within one ingestion run.
#[derive(Debug, Clone, Default)]
pub struct RdfGraph {
    pub triples: Vec<Triple>,
}

impl RdfGraph {
    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    fn objects_of<'a>(&'a self, subject: &Term, predicate: &str) -> impl Iterator<Item = &'a Object> {
        let subject = subject.clone();
        let predicate = predicate.to_string();
        self.triples
            .iter()
            .filter(move |t| t.subject == subject && t.predicate == predicate)
            .map(|t| &t.object)
    }

    /// Subjects typed as `class_iri`, IRIs only, sorted for determinism.
    fn subjects_of_type(&self, class_iri: &str) -> Vec<&str> {
        let mut subjects: Vec<&str> = self
            .triples
            .iter()
            .filter(|t| t.predicate == RDF_TYPE && t.object.as_iri() == Some(class_iri))
            .filter_map(|t| match &t.subject {
                Term::Iri(iri) => Some(iri.as_str()),
                Term::Blank(_) => None,
            })
            .collect();
        subjects.sort_unstable();
        subjects.dedup();
        subjects
    }

    fn first_literal(&self, subject: &Term, predicates: &[&str]) -> Option<String> {
        for predicate in predicates {
            if let Some(text) = self
                .objects_of(subject, predicate)
                .find_map(|o| o.as_literal_text())
            {
                return Some(text.to_string());
            }
        }
        None
    }
}

/// The trailing segment of an IRI, after the last `#` or `/`.
pub fn local_name(iri: &str) -> &str {
    iri.rsplit(['#', '/']).next().unwrap_or(iri)
}

// ============ Markdown document generation ============

struct Section {
    heading: &'static str,
    type_iri: &'static str,
}

const SECTIONS: &[Section] = &[
    Section { heading: "Classes", type_iri: OWL_CLASS },
    Section { heading: "Object Properties", type_iri: OWL_OBJECT_PROPERTY },
    Section { heading: "Data Properties", type_iri: OWL_DATATYPE_PROPERTY },
    Section { heading: "Annotation Properties", type_iri: OWL_ANNOTATION_PROPERTY },
    Section { heading: "Named Individuals", type_iri: OWL_NAMED_INDIVIDUAL },
];

/// Render a parsed graph as a heading-structured Markdown document.
///
/// Heading levels are what the chunker splits on: `#` for the ontology
/// title, `##` per entity section, `###` per entity. Entities are sorted
/// by IRI so the generated document is deterministic.
pub fn to_markdown(graph: &RdfGraph) -> String {
    let mut out = String::new();

    let ontology_subject = graph
        .subjects_of_type(OWL_ONTOLOGY)
        .first()
        .map(|iri| Term::Iri(iri.to_string()));

    let title = ontology_subject
        .as_ref()
        .and_then(|s| graph.first_literal(s, &[RDFS_LABEL]))
        .or_else(|| {
            ontology_subject.as_ref().map(|s| match s {
                Term::Iri(iri) => local_name(iri).to_string(),
                Term::Blank(id) => id.clone(),
            })
        })
        .unwrap_or_else(|| "Ontology".to_string());

    out.push_str(&format!("# {title}\n\n"));

    if let Some(subject) = &ontology_subject {
        if let Term::Iri(iri) = subject {
            out.push_str(&format!("IRI: {iri}\n\n"));
        }
        if let Some(description) =
            graph.first_literal(subject, &[DCTERMS_DESCRIPTION, RDFS_COMMENT])
        {
            out.push_str(&format!("{description}\n\n"));
        }
    }
    out.push_str(&format!("Statements: {}\n\n", graph.len()));

    for section in SECTIONS {
        let subjects = graph.subjects_of_type(section.type_iri);
        if subjects.is_empty() {
            continue;
        }

        out.push_str(&format!("## {}\n\n", section.heading));

        for iri in subjects {
            let subject = Term::Iri(iri.to_string());
            let label = graph
                .first_literal(&subject, &[RDFS_LABEL])
                .unwrap_or_else(|| local_name(iri).to_string());

            out.push_str(&format!("### {label}\n\n"));
            out.push_str(&format!("IRI: {iri}\n\n"));

            if let Some(comment) =
                graph.first_literal(&subject, &[RDFS_COMMENT, SKOS_DEFINITION])
            {
                out.push_str(&format!("{comment}\n\n"));
            }

            let mut facts: BTreeMap<&str, Vec<String>> = BTreeMap::new();
            for (key, predicate) in [
                ("Subclass of", RDFS_SUBCLASS_OF),
                ("Domain", RDFS_DOMAIN),
                ("Range", RDFS_RANGE),
            ] {
                let mut values: Vec<String> = graph
                    .objects_of(&subject, predicate)
                    .filter_map(|o| o.as_iri())
                    .map(|iri| local_name(iri).to_string())
                    .collect();
                values.sort_unstable();
                values.dedup();
                if !values.is_empty() {
                    facts.insert(key, values);
                }
            }
            for (key, values) in facts {
                out.push_str(&format!("- {}: {}\n", key, values.join(", ")));
            }
            if out.ends_with('\n') && !out.ends_with("\n\n") {
                out.push('\n');
            }
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iri(s: &str) -> Term {
        Term::Iri(s.to_string())
    }

    fn lit(s: &str) -> Object {
        Object::Literal(Literal {
            lexical: s.to_string(),
            datatype: None,
            language: None,
        })
    }

    fn node(s: &str) -> Object {
        Object::Node(Term::Iri(s.to_string()))
    }

    fn sample_graph() -> RdfGraph {
        let mut g = RdfGraph::default();
        let mut add = |s: &str, p: &str, o: Object| {
            g.triples.push(Triple {
                subject: iri(s),
                predicate: p.to_string(),
                object: o,
            });
        };

        add("http://example.org/onto", RDF_TYPE, node(OWL_ONTOLOGY));
        add("http://example.org/onto", RDFS_LABEL, lit("Materials Ontology"));
        add("http://example.org/onto", RDFS_COMMENT, lit("Covers materials."));

        add("http://example.org/Alloy", RDF_TYPE, node(OWL_CLASS));
        add("http://example.org/Alloy", RDFS_LABEL, lit("Alloy"));
        add("http://example.org/Alloy", RDFS_COMMENT, lit("A metallic mixture."));
        add("http://example.org/Metal", RDF_TYPE, node(OWL_CLASS));
        add(
            "http://example.org/Alloy",
            RDFS_SUBCLASS_OF,
            node("http://example.org/Metal"),
        );

        add("http://example.org/hasPart", RDF_TYPE, node(OWL_OBJECT_PROPERTY));
        add(
            "http://example.org/hasPart",
            RDFS_DOMAIN,
            node("http://example.org/Alloy"),
        );
        g
    }

    #[test]
    fn test_markdown_headings() {
        let md = to_markdown(&sample_graph());
        assert!(md.starts_with("# Materials Ontology\n"));
        assert!(md.contains("\n## Classes\n"));
        assert!(md.contains("\n### Alloy\n"));
        assert!(md.contains("\n## Object Properties\n"));
        assert!(md.contains("A metallic mixture."));
        assert!(md.contains("- Subclass of: Metal"));
    }

    #[test]
    fn test_markdown_deterministic() {
        let g = sample_graph();
        assert_eq!(to_markdown(&g), to_markdown(&g));
    }

    #[test]
    fn test_empty_graph_still_renders_title() {
        let md = to_markdown(&RdfGraph::default());
        assert!(md.starts_with("# Ontology"));
        assert!(md.contains("Statements: 0"));
    }

    #[test]
    fn test_unlabeled_entity_uses_local_name() {
        let mut g = RdfGraph::default();
        g.triples.push(Triple {
            subject: iri("http://example.org/vocab#Thing"),
            predicate: RDF_TYPE.to_string(),
            object: node(OWL_CLASS),
        });
        let md = to_markdown(&g);
        assert!(md.contains("### Thing"));
    }

    #[test]
    fn test_local_name() {
        assert_eq!(local_name("http://example.org/vocab#Alloy"), "Alloy");
        assert_eq!(local_name("http://example.org/vocab/Alloy"), "Alloy");
        assert_eq!(local_name("Alloy"), "Alloy");
    }
}
