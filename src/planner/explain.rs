//! EXPLAIN output formatting
//!
//! Formats a `Phi` plan for display to users.

use std::fmt;

use crate::planner::phi::Phi;

/// Format a plan for EXPLAIN output
pub struct ExplainOutput;

impl ExplainOutput {
    /// Format a plan as a string
    pub fn format(phi: &Phi) -> String {
        let mut out = String::new();

        let projected: Vec<String> = phi.projected_values().iter().map(|p| p.to_string()).collect();
        out.push_str(&format!("Project: [{}]\n", projected.join(", ")));

        if let Some(having) = phi.having() {
            out.push_str(&format!("  Having: {}\n", having));
        }

        out.push_str(&format!("  GroupBy: [{}]\n", phi.group_by().join(", ")));

        let aggregates: Vec<String> = phi.aggregates().iter().map(|a| a.to_string()).collect();
        out.push_str(&format!("  Aggregates: [{}]\n", aggregates.join(", ")));

        for (var, predicate) in phi.grouping_var_predicates() {
            out.push_str(&format!("    GroupingVariable {}: {}\n", var, predicate));
        }

        out
    }
}

impl fmt::Display for Phi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&ExplainOutput::format(self))
    }
}
