//! Read-only conformance check of a completed graph against the schema.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::graph::{Node, Object, SemanticGraph};
use crate::literal::LiteralKind;
use crate::schema::{Range, Schema};

/// One schema violation, located by subject IRI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Violation {
    UndeclaredClass {
        subject: String,
        class: String,
    },
    UnknownRelation {
        subject: String,
        relation: String,
    },
    DomainMismatch {
        subject: String,
        relation: String,
        expected: String,
        found: String,
    },
    RangeMismatch {
        subject: String,
        relation: String,
        expected: String,
        found: String,
    },
    LiteralKindMismatch {
        subject: String,
        relation: String,
        expected: LiteralKind,
        found: LiteralKind,
    },
    CardinalityExceeded {
        subject: String,
        relation: String,
        count: usize,
    },
    MissingRequired {
        subject: String,
        class: String,
        relation: String,
    },
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UndeclaredClass { subject, class } => {
                write!(f, "<{subject}>: class \"{class}\" is not declared")
            }
            Self::UnknownRelation { subject, relation } => {
                write!(f, "<{subject}>: relation \"{relation}\" is not declared")
            }
            Self::DomainMismatch {
                subject,
                relation,
                expected,
                found,
            } => write!(
                f,
                "<{subject}>: {relation} requires a subject of class {expected}, found {found}"
            ),
            Self::RangeMismatch {
                subject,
                relation,
                expected,
                found,
            } => write!(f, "<{subject}>: {relation} expects {expected}, found {found}"),
            Self::LiteralKindMismatch {
                subject,
                relation,
                expected,
                found,
            } => write!(
                f,
                "<{subject}>: {relation} expects a {expected} literal, found {found}"
            ),
            Self::CardinalityExceeded {
                subject,
                relation,
                count,
            } => write!(
                f,
                "<{subject}>: single-valued {relation} has {count} values"
            ),
            Self::MissingRequired {
                subject,
                class,
                relation,
            } => write!(f, "<{subject}>: {class} requires {relation}"),
        }
    }
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub violations: Vec<Violation>,
    pub nodes_checked: usize,
    pub edges_checked: usize,
}

impl std::fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "{}: {} nodes, {} edges, {} violation(s)",
            if self.valid { "valid" } else { "INVALID" },
            self.nodes_checked,
            self.edges_checked,
            self.violations.len()
        )?;
        for v in &self.violations {
            writeln!(f, "  {v}")?;
        }
        Ok(())
    }
}

/// Checks every node and edge of a graph against a [`Schema`].
#[derive(Debug, Clone)]
pub struct Validator {
    schema: Arc<Schema>,
}

impl Validator {
    pub fn new(schema: Arc<Schema>) -> Self {
        Self { schema }
    }

    /// Validate `graph` without modifying it.
    ///
    /// Violations come out per node in creation order: edge checks in edge
    /// insertion order, then cardinality, then required relations.
    pub fn validate(&self, graph: &SemanticGraph) -> ValidationReport {
        let nodes = graph.nodes();
        let mut violations = Vec::new();
        let mut edges_checked = 0;

        for node in &nodes {
            let class = match self.schema.class(&node.class) {
                Ok(class) => Some(class),
                Err(_) => {
                    violations.push(Violation::UndeclaredClass {
                        subject: node.iri.clone(),
                        class: node.class.clone(),
                    });
                    None
                }
            };

            let edges = graph.edges_from(node.id);
            edges_checked += edges.len();
            let mut counts: Vec<(&str, usize)> = Vec::new();

            for edge in &edges {
                match counts.iter_mut().find(|(r, _)| *r == edge.relation) {
                    Some((_, n)) => *n += 1,
                    None => counts.push((edge.relation.as_str(), 1)),
                }

                let Ok(relation) = self.schema.relation(&edge.relation) else {
                    violations.push(Violation::UnknownRelation {
                        subject: node.iri.clone(),
                        relation: edge.relation.clone(),
                    });
                    continue;
                };

                if let Some(domain) = &relation.domain {
                    if *domain != node.class {
                        violations.push(Violation::DomainMismatch {
                            subject: node.iri.clone(),
                            relation: edge.relation.clone(),
                            expected: domain.clone(),
                            found: node.class.clone(),
                        });
                    }
                }

                violations.extend(self.check_range(
                    graph,
                    node,
                    &edge.relation,
                    &relation.range,
                    &edge.object,
                ));
            }

            for (relation, count) in &counts {
                let single = self
                    .schema
                    .relation(relation)
                    .is_ok_and(|r| r.single_valued);
                if single && *count > 1 {
                    violations.push(Violation::CardinalityExceeded {
                        subject: node.iri.clone(),
                        relation: relation.to_string(),
                        count: *count,
                    });
                }
            }

            if let Some(class) = class {
                let present: HashMap<&str, usize> = counts.iter().copied().collect();
                for required in &class.required {
                    if !present.contains_key(required.as_str()) {
                        violations.push(Violation::MissingRequired {
                            subject: node.iri.clone(),
                            class: class.name.clone(),
                            relation: required.clone(),
                        });
                    }
                }
            }
        }

        let report = ValidationReport {
            valid: violations.is_empty(),
            violations,
            nodes_checked: nodes.len(),
            edges_checked,
        };
        if report.valid {
            tracing::info!(nodes = report.nodes_checked, edges = report.edges_checked, "graph is valid");
        } else {
            tracing::warn!(violations = report.violations.len(), "graph failed validation");
        }
        report
    }

    fn check_range(
        &self,
        graph: &SemanticGraph,
        subject: &Node,
        relation: &str,
        range: &Range,
        object: &Object,
    ) -> Option<Violation> {
        let mismatch = |found: String| Violation::RangeMismatch {
            subject: subject.iri.clone(),
            relation: relation.to_string(),
            expected: range.to_string(),
            found,
        };

        match (range, object) {
            (Range::Literal(expected), Object::Literal(lit)) => {
                (lit.kind() != *expected).then(|| Violation::LiteralKindMismatch {
                    subject: subject.iri.clone(),
                    relation: relation.to_string(),
                    expected: *expected,
                    found: lit.kind(),
                })
            }
            (Range::Class(_) | Range::Concept, Object::Literal(lit)) => {
                Some(mismatch(format!("{} literal", lit.kind())))
            }
            (Range::Literal(_), Object::Node(id)) => Some(mismatch(
                graph
                    .node(*id)
                    .map_or_else(|| format!("dangling {id}"), |n| format!("node <{}>", n.iri)),
            )),
            (Range::Class(expected), Object::Node(id)) => match graph.node(*id) {
                None => Some(mismatch(format!("dangling {id}"))),
                Some(target) if target.class != *expected => {
                    Some(mismatch(format!("class {}", target.class)))
                }
                Some(_) => None,
            },
            (Range::Concept, Object::Node(id)) => match graph.node(*id) {
                None => Some(mismatch(format!("dangling {id}"))),
                Some(target) => {
                    let concept = self
                        .schema
                        .class(&target.class)
                        .is_ok_and(|c| c.concept);
                    (!concept).then(|| mismatch(format!("class {}", target.class)))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SemfishConfig;
    use crate::graph::{Edge, NodeId};
    use crate::literal::TypedLiteral;
    use crate::schema::vocab_relations;

    fn setup(required: &[&str]) -> (Validator, SemanticGraph, Arc<Schema>) {
        let mut config =
            SemfishConfig::from_toml_str(include_str!("../config/semfish.toml"), "semfish.toml")
                .unwrap();
        if let Some(sample) = config.classes.iter_mut().find(|c| c.name == "Sample") {
            sample.required = required.iter().map(|r| r.to_string()).collect();
        }
        let schema = Arc::new(Schema::from_config(&config).unwrap());
        (Validator::new(Arc::clone(&schema)), SemanticGraph::new(), schema)
    }

    fn add(g: &SemanticGraph, schema: &Schema, class: &str, key: &str) -> NodeId {
        let base = schema
            .class(class)
            .map(|c| c.iri.clone())
            .unwrap_or_else(|_| format!("urn:{class}"));
        let iri = format!("{base}/{key}");
        g.get_or_insert_node(&iri, class).unwrap().0
    }

    #[test]
    fn conforming_graph_is_valid() {
        let (validator, g, schema) = setup(&["hasSpecies"]);
        let s = add(&g, &schema, "Sample", "S1");
        let sp = add(&g, &schema, "Species", "127023");
        g.add_edge(Edge::new(s, "hasSpecies", sp));
        g.set_edge(Edge::new(s, "hasMeasurement", TypedLiteral::Decimal(23.5)));

        let report = validator.validate(&g);
        assert!(report.valid, "{report}");
        assert_eq!(report.nodes_checked, 2);
        assert_eq!(report.edges_checked, 2);
    }

    #[test]
    fn wrong_literal_kind_is_violation() {
        let (validator, g, schema) = setup(&[]);
        let s = add(&g, &schema, "Sample", "S1");
        g.add_edge(Edge::new(s, "hasMeasurement", TypedLiteral::String("23.5".into())));

        let report = validator.validate(&g);
        assert!(!report.valid);
        assert!(matches!(
            report.violations[0],
            Violation::LiteralKindMismatch {
                expected: LiteralKind::Decimal,
                found: LiteralKind::String,
                ..
            }
        ));
    }

    #[test]
    fn node_of_wrong_class_is_range_violation() {
        let (validator, g, schema) = setup(&[]);
        let s = add(&g, &schema, "Sample", "S1");
        let unit = add(&g, &schema, "Unit", "cm");
        g.add_edge(Edge::new(s, "hasSpecies", unit));
        g.add_edge(Edge::new(s, "hasDivision", TypedLiteral::Integer(7)));

        let report = validator.validate(&g);
        assert_eq!(report.violations.len(), 2);
        assert!(report
            .violations
            .iter()
            .all(|v| matches!(v, Violation::RangeMismatch { .. })));
    }

    #[test]
    fn domain_and_unknown_relation() {
        let (validator, g, schema) = setup(&[]);
        let sp = add(&g, &schema, "Species", "127023");
        let unit = add(&g, &schema, "Unit", "cm");
        g.add_edge(Edge::new(sp, "hasUnit", unit));
        g.add_edge(Edge::new(sp, "hasGear", unit));

        let report = validator.validate(&g);
        assert!(matches!(report.violations[0], Violation::DomainMismatch { .. }));
        assert!(matches!(report.violations[1], Violation::UnknownRelation { .. }));
    }

    #[test]
    fn concept_range_needs_concept_node() {
        let (validator, g, schema) = setup(&[]);
        let child = add(&g, &schema, "SpecWoRMS", "127023");
        let parent = add(&g, &schema, "SpecWoRMS", "125530");
        let species = add(&g, &schema, "Species", "125530");
        g.add_edge(Edge::new(child, vocab_relations::BROADER, parent));
        assert!(validator.validate(&g).valid);

        g.add_edge(Edge::new(child, vocab_relations::BROADER, species));
        let report = validator.validate(&g);
        assert_eq!(report.violations.len(), 1);
    }

    #[test]
    fn single_valued_cardinality() {
        let (validator, g, schema) = setup(&[]);
        let s = add(&g, &schema, "Sample", "S1");
        g.add_edge(Edge::new(s, "hasMeasurement", TypedLiteral::Decimal(1.0)));
        g.add_edge(Edge::new(s, "hasMeasurement", TypedLiteral::Decimal(2.0)));

        let report = validator.validate(&g);
        assert_eq!(
            report.violations,
            vec![Violation::CardinalityExceeded {
                subject: g.node(s).unwrap().iri,
                relation: "hasMeasurement".into(),
                count: 2,
            }]
        );
    }

    #[test]
    fn missing_required_relation() {
        let (validator, g, schema) = setup(&["hasSpecies"]);
        add(&g, &schema, "Sample", "S1");
        let report = validator.validate(&g);
        assert!(matches!(
            &report.violations[..],
            [Violation::MissingRequired { relation, .. }] if relation == "hasSpecies"
        ));
    }

    #[test]
    fn undeclared_class_is_violation() {
        let (validator, g, schema) = setup(&[]);
        add(&g, &schema, "Vessel", "IRL-1");
        let report = validator.validate(&g);
        assert!(matches!(report.violations[0], Violation::UndeclaredClass { .. }));
    }

    #[test]
    fn violations_follow_node_order() {
        let (validator, g, schema) = setup(&["hasSpecies"]);
        let s1 = add(&g, &schema, "Sample", "S1");
        let s2 = add(&g, &schema, "Sample", "S2");
        g.add_edge(Edge::new(s2, "hasMeasurement", TypedLiteral::Integer(3)));
        g.add_edge(Edge::new(s1, "hasMeasurement", TypedLiteral::Integer(3)));

        let report = validator.validate(&g);
        let subjects: Vec<&str> = report
            .violations
            .iter()
            .map(|v| match v {
                Violation::LiteralKindMismatch { subject, .. }
                | Violation::MissingRequired { subject, .. } => subject.as_str(),
                other => panic!("unexpected {other}"),
            })
            .collect();
        assert!(subjects[0].ends_with("Sample/S1"));
        assert!(subjects[1].ends_with("Sample/S1"));
        assert!(subjects[2].ends_with("Sample/S2"));
        assert!(matches!(report.violations[1], Violation::MissingRequired { .. }));
    }

    #[test]
    fn validation_is_read_only() {
        let (validator, g, schema) = setup(&["hasSpecies"]);
        add(&g, &schema, "Sample", "S1");
        let before = (g.node_count(), g.edge_count());
        validator.validate(&g);
        validator.validate(&g);
        assert_eq!((g.node_count(), g.edge_count()), before);
    }
}
