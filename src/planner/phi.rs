//! Phi query plan
//!
//! A `Phi` is built once from the textual spec and is read-only after that.
//! Sections, one per line:
//!
//! ```text
//! 0  projected values, comma separated
//! 1  grouping variable count        (ignored)
//! 2  group-by attributes            (ignored)
//! 3  aggregate list                 (ignored)
//! 4  grouping variable predicates, semicolon separated
//! 5  having predicate               (optional)
//! ```

use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use crate::sql::{
    AggregateRef, AttributeAggregate, GroupingAggregate, Parser, Predicate, ProjectedValue,
};

use super::error::{PlannerError, PlannerResult};

/// Minimum number of sections in a spec
pub const REQUIRED_SECTIONS: usize = 5;

const PROJECTION_SECTION: usize = 0;
const PREDICATE_SECTION: usize = 4;
const HAVING_SECTION: usize = 5;

/// Validated query plan
#[derive(Debug, Clone, PartialEq)]
pub struct Phi {
    projected_values: Vec<ProjectedValue>,
    group_by: Vec<String>,
    aggregates: Vec<AggregateRef>,
    grouping_var_predicates: IndexMap<String, Predicate>,
    having: Option<Predicate>,
}

/// Insertion-ordered, duplicate-free aggregate collection
#[derive(Default)]
struct AggregateSets {
    attribute: IndexSet<AttributeAggregate>,
    grouping: IndexSet<GroupingAggregate>,
}

impl AggregateSets {
    fn insert(&mut self, agg: &AggregateRef) {
        match agg {
            AggregateRef::Attribute(a) => {
                self.attribute.insert(a.clone());
            }
            AggregateRef::Grouping(g) => {
                self.grouping.insert(g.clone());
            }
        }
    }

    fn into_list(self) -> Vec<AggregateRef> {
        self.attribute
            .into_iter()
            .map(AggregateRef::Attribute)
            .chain(self.grouping.into_iter().map(AggregateRef::Grouping))
            .collect()
    }
}

impl Phi {
    /// Build a plan from the textual spec
    pub fn build(spec: &str) -> PlannerResult<Phi> {
        let sections: Vec<&str> = spec.lines().collect();
        if sections.len() < REQUIRED_SECTIONS {
            return Err(PlannerError::InvalidFileLength {
                found: sections.len(),
                required: REQUIRED_SECTIONS,
            });
        }

        debug!(
            grouping_var_count = sections[1].trim(),
            group_by = sections[2].trim(),
            aggregates = sections[3].trim(),
            "Ignoring derived sections"
        );

        let mut projected_values = Vec::new();
        let mut group_by = IndexSet::new();
        let mut aggregates = AggregateSets::default();

        for entry in sections[PROJECTION_SECTION].split(',') {
            let value = ProjectedValue::parse(entry)?;
            match &value {
                ProjectedValue::Attribute(name) => {
                    group_by.insert(name.clone());
                }
                ProjectedValue::Aggregate(agg) => aggregates.insert(agg),
            }
            projected_values.push(value);
        }

        let grouping_var_predicates = parse_grouping_predicates(sections[PREDICATE_SECTION])?;

        let having = match sections.get(HAVING_SECTION) {
            Some(clause) if !clause.trim().is_empty() => {
                let predicate = parse_predicate(clause)?;
                for agg in predicate.aggregate_refs() {
                    aggregates.insert(agg);
                }
                Some(predicate)
            }
            _ => None,
        };

        let aggregates = aggregates.into_list();
        for agg in &aggregates {
            if let Some(var) = agg.grouping_var() {
                if !grouping_var_predicates.contains_key(var) {
                    return Err(PlannerError::UnknownGroupingVariable(var.to_string()));
                }
            }
        }

        debug!(
            projected = projected_values.len(),
            aggregates = aggregates.len(),
            grouping_vars = grouping_var_predicates.len(),
            having = having.is_some(),
            "Built phi plan"
        );

        Ok(Phi {
            projected_values,
            group_by: group_by.into_iter().collect(),
            aggregates,
            grouping_var_predicates,
            having,
        })
    }

    /// SELECT-list entries, in order
    pub fn projected_values(&self) -> &[ProjectedValue] {
        &self.projected_values
    }

    /// Attributes forming the group key
    pub fn group_by(&self) -> &[String] {
        &self.group_by
    }

    /// Attribute aggregates followed by grouping aggregates
    pub fn aggregates(&self) -> &[AggregateRef] {
        &self.aggregates
    }

    /// Position of `agg` in `aggregates()`
    pub fn aggregate_index(&self, agg: &AggregateRef) -> Option<usize> {
        self.aggregates.iter().position(|a| a == agg)
    }

    /// Grouping variable predicates, in spec order
    pub fn grouping_var_predicates(&self) -> impl Iterator<Item = (&str, &Predicate)> {
        self.grouping_var_predicates
            .iter()
            .map(|(var, p)| (var.as_str(), p))
    }

    pub fn grouping_var_predicate(&self, var: &str) -> Option<&Predicate> {
        self.grouping_var_predicates.get(var)
    }

    pub fn having(&self) -> Option<&Predicate> {
        self.having.as_ref()
    }
}

fn parse_predicate(clause: &str) -> PlannerResult<Predicate> {
    Parser::parse_clause(clause)?
        .into_predicate()
        .ok_or_else(|| PlannerError::NotAPredicate(clause.trim().to_string()))
}

fn parse_grouping_predicates(section: &str) -> PlannerResult<IndexMap<String, Predicate>> {
    let mut predicates = IndexMap::new();
    if section.trim().is_empty() {
        return Ok(predicates);
    }

    for clause in section.split(';') {
        let predicate = parse_predicate(clause)?;
        let var = predicate
            .grouping_var()
            .ok_or_else(|| PlannerError::UnboundPredicate(clause.trim().to_string()))?
            .to_string();
        if predicates.contains_key(&var) {
            return Err(PlannerError::DuplicateGroupingVariable(var));
        }
        predicates.insert(var, predicate);
    }
    Ok(predicates)
}
