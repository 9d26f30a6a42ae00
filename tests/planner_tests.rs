//! Phi plan builder integration tests

use phiql::planner::{Phi, PlannerError, REQUIRED_SECTIONS};
use phiql::sql::{AggregateFunction, AggregateRef, Operator, ProjectedValue, SqlError};

const SALES_BY_STATE: &str = "cust, prod, count_1_quant, sum_2_quant, avg_quant\n\
                              2\n\
                              cust, prod\n\
                              count_1_quant, sum_2_quant, avg_quant\n\
                              1.state = 'NY'; 2.state = 'NJ' and 2.year = 2018\n\
                              max_1_quant > avg_quant";

#[test]
fn test_build_full_spec() {
    let phi = Phi::build(SALES_BY_STATE).unwrap();

    assert_eq!(phi.group_by(), &["cust".to_string(), "prod".to_string()]);
    assert_eq!(phi.projected_values().len(), 5);
    assert_eq!(
        phi.projected_values()[0],
        ProjectedValue::Attribute("cust".to_string())
    );

    let names: Vec<String> = phi.aggregates().iter().map(|a| a.to_string()).collect();
    assert_eq!(
        names,
        vec!["avg_quant", "count_1_quant", "sum_2_quant", "max_1_quant"]
    );

    let vars: Vec<&str> = phi.grouping_var_predicates().map(|(v, _)| v).collect();
    assert_eq!(vars, vec!["1", "2"]);
    assert_eq!(phi.grouping_var_predicate("2").unwrap().op, Operator::And);
    assert_eq!(phi.having().unwrap().op, Operator::Gt);
}

#[test]
fn test_aggregate_dedup_with_having() {
    let phi = Phi::build("cust, sum_1_quant\n1\ncust\n\n1.state = 'NY'\nsum_1_quant > 10").unwrap();
    assert_eq!(phi.aggregates().len(), 1);
}

#[test]
fn test_having_only_aggregate_is_planned() {
    let phi = Phi::build("cust, count_1_quant\n1\ncust\n\n1.state = 'NY'\navg_1_quant > 10").unwrap();
    let avg = phi
        .aggregates()
        .iter()
        .find(|a| a.function() == AggregateFunction::Avg)
        .unwrap();
    assert!(matches!(avg, AggregateRef::Grouping(_)));
    assert_eq!(avg.grouping_var(), Some("1"));
    assert!(phi.aggregate_index(avg).is_some());
}

#[test]
fn test_build_is_idempotent() {
    assert_eq!(
        Phi::build(SALES_BY_STATE).unwrap(),
        Phi::build(SALES_BY_STATE).unwrap()
    );
}

#[test]
fn test_windows_line_endings() {
    let unix = Phi::build("cust, sum_quant\n0\ncust\n\n\n").unwrap();
    let windows = Phi::build("cust, sum_quant\r\n0\r\ncust\r\n\r\n\r\n").unwrap();
    assert_eq!(unix, windows);
}

#[test]
fn test_build_errors() {
    assert_eq!(
        Phi::build("cust\n0\ncust"),
        Err(PlannerError::InvalidFileLength {
            found: 3,
            required: REQUIRED_SECTIONS,
        })
    );
    assert!(matches!(
        Phi::build("cust, sum_1_quant\n1\ncust\n\n1.state = \n"),
        Err(PlannerError::Sql(SqlError::UnexpectedEndOfClause(_)))
    ));
    assert!(matches!(
        Phi::build("cust, sum_2_quant\n1\ncust\n\n1.state = 'NY'\n"),
        Err(PlannerError::UnknownGroupingVariable(v)) if v == "2"
    ));
    assert!(matches!(
        Phi::build("cust, sum_1_quant\n1\ncust\n\n1.state = 'NY'; 1.year = 2018\n"),
        Err(PlannerError::DuplicateGroupingVariable(v)) if v == "1"
    ));
    assert!(matches!(
        Phi::build("cust, sum_1_quant\n1\ncust\n\n'NY' = 'NY'\n"),
        Err(PlannerError::UnboundPredicate(_))
    ));
    assert!(matches!(
        Phi::build("cust, sum_1_quant\n1\ncust\n\n1.state\n"),
        Err(PlannerError::NotAPredicate(_))
    ));
    assert!(matches!(
        Phi::build("cust, median_quant\n0\ncust\n\n\n"),
        Err(PlannerError::Sql(SqlError::UnknownAggregateFunction(_)))
    ));
}

#[test]
fn test_explain_output() {
    let phi = Phi::build(SALES_BY_STATE).unwrap();
    let explain = phi.to_string();
    assert!(explain.starts_with("Project: [cust, prod, count_1_quant, sum_2_quant, avg_quant]\n"));
    assert!(explain.contains("  Having: max_1_quant > avg_quant\n"));
    assert!(explain.contains("    GroupingVariable 2: 2.state = 'NJ' and 2.year = 2018\n"));
}
