//! Executor integration tests

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use phiql::config::EvalConfig;
use phiql::executor::{
    ChannelSource, Datum, ExecutorEngine, ExecutorError, MemorySource, ResultSet, ResultSink,
    Row, RowSource, Schema, TableSink,
};
use phiql::planner::Phi;

const SALES: &[&str] = &[
    "Bloom,Eggs,21,2,2017,NY,465,2017-02-21",
    "Bloom,Milk,3,7,2018,NJ,12,2018-07-03",
    "Knuth,Eggs,9,1,2016,NY,30,2016-01-09",
    "Bloom,Eggs,1,12,2019,CT,80,2019-12-01",
    "Knuth,Bread,15,5,2018,NJ,7,2018-05-15",
    "Sam,Milk,30,6,2020,CT,44,2020-06-30",
];

fn engine() -> ExecutorEngine {
    ExecutorEngine::new(Schema::sales(), EvalConfig::default())
}

fn decode(lines: &[&str]) -> Vec<Row> {
    let schema = Schema::sales();
    lines
        .iter()
        .enumerate()
        .map(|(i, l)| schema.decode_line(l, i + 1).unwrap())
        .collect()
}

fn memory(lines: &[&str]) -> Box<dyn RowSource> {
    Box::new(MemorySource::new(decode(lines)))
}

async fn run(spec: &str, lines: &[&str]) -> ResultSet {
    let phi = Phi::build(spec).unwrap();
    engine().execute(&phi, memory(lines)).await.unwrap()
}

#[tokio::test]
async fn test_grouping_variables_are_independent() {
    let result = run(
        "cust, count_1_quant, sum_2_quant\n2\ncust\n\n1.state = 'NY'; 2.state = 'NJ'",
        &[
            "A,Eggs,1,1,2020,NY,10,2020-01-01",
            "A,Eggs,1,1,2020,NJ,5,2020-01-01",
            "B,Eggs,1,1,2020,NY,3,2020-01-01",
        ],
    )
    .await;

    assert_eq!(result.columns, vec!["cust", "count_1_quant", "sum_2_quant"]);
    assert_eq!(
        result.to_strings(),
        vec![vec!["A", "1", "5"], vec!["B", "1", "0"]]
    );
}

#[tokio::test]
async fn test_avg_without_rows_is_no_data() {
    let result = run(
        "cust, avg_1_quant, count_1_quant\n1\ncust\n\n1.state = 'CT'",
        SALES,
    )
    .await;
    assert_eq!(
        result.to_strings(),
        vec![
            vec!["Bloom", "80", "1"],
            vec!["Knuth", "No Data", "0"],
            vec!["Sam", "44", "1"],
        ]
    );
}

#[tokio::test]
async fn test_attribute_and_grouping_aggregates_together() {
    let result = run(
        "prod, sum_quant, max_1_quant, min_2_quant\n2\nprod\n\n\
         1.year >= 2018; 2.state != 'CT'",
        SALES,
    )
    .await;
    assert_eq!(
        result.to_strings(),
        vec![
            vec!["Eggs", "575", "80", "30"],
            vec!["Milk", "56", "44", "12"],
            vec!["Bread", "7", "7", "7"],
        ]
    );
}

#[tokio::test]
async fn test_having_is_a_post_pass() {
    let base = "cust, sum_quant, count_1_quant\n1\ncust\n\n1.state = 'NY'";
    let all = run(base, SALES).await;
    let filtered = run(&format!("{}\nsum_quant > 100", base), SALES).await;

    assert_eq!(filtered.len(), 1);
    let kept = &filtered.rows[0];
    assert!(all.rows.contains(kept));
    assert_eq!(kept.values()[0], Datum::String("Bloom".to_string()));
}

#[tokio::test]
async fn test_having_only_aggregate() {
    let result = run(
        "cust\n1\ncust\n\n1.state = 'NJ'\navg_1_quant < 10",
        SALES,
    )
    .await;
    assert_eq!(result.columns, vec!["cust"]);
    assert_eq!(result.to_strings(), vec![vec!["Knuth"]]);
}

#[tokio::test]
async fn test_having_on_group_by_attribute_and_arithmetic() {
    let result = run(
        "cust, prod, sum_quant\n0\ncust, prod\n\n\n0.cust != 'Sam' and sum_quant * 2 > 100",
        SALES,
    )
    .await;
    assert_eq!(result.to_strings(), vec![vec!["Bloom", "Eggs", "545"]]);
}

#[tokio::test]
async fn test_date_and_negation_predicates() {
    let result = run(
        "cust, count_1_quant, count_2_quant\n2\ncust\n\n\
         1.date < '2018-01-01'; 2.quant < 100 and not 2.state = 'NY'",
        SALES,
    )
    .await;
    assert_eq!(
        result.to_strings(),
        vec![
            vec!["Bloom", "1", "2"],
            vec!["Knuth", "1", "1"],
            vec!["Sam", "0", "1"],
        ]
    );
}

#[tokio::test]
async fn test_division_by_zero_fails_evaluation() {
    let phi = Phi::build("cust, count_1_quant\n1\ncust\n\n1.quant / 0 > 1").unwrap();
    let err = engine().execute(&phi, memory(SALES)).await.unwrap_err();
    assert!(matches!(err, ExecutorError::InvalidOperation(_)));
}

#[tokio::test]
async fn test_ill_typed_predicates_fail_before_evaluation() {
    for spec in [
        "cust, count_1_quant, count_2_quant\n2\ncust\n\n1.state > 5; 2.year = '2020'",
        "cust, count_1_quant\n1\ncust\n\n1.quant + 1",
        "cust, sum_quant\n0\ncust\n\n\nsum_quant > '100'",
    ] {
        let phi = Phi::build(spec).unwrap();
        let err = engine().execute(&phi, memory(SALES)).await.unwrap_err();
        assert!(
            matches!(err, ExecutorError::TypeMismatch { .. }),
            "{}: {}",
            spec,
            err
        );
    }
}

#[tokio::test]
async fn test_long_conjunction_evaluates() {
    let clause = (0..10_000)
        .map(|i| format!("1.quant != {}", i + 1_000))
        .collect::<Vec<_>>()
        .join(" and ");
    let result = run(
        &format!("state, count_1_quant\n1\nstate\n\n{}", clause),
        SALES,
    )
    .await;
    assert_eq!(
        result.to_strings(),
        vec![vec!["NY", "2"], vec!["NJ", "2"], vec!["CT", "2"]]
    );
}

#[tokio::test]
async fn test_replay_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "cust,prod,day,month,year,state,quant,date").unwrap();
    for line in SALES {
        writeln!(file, "{}", line).unwrap();
    }

    let phi = Phi::build("state, count_quant\n0\nstate\n\n\n").unwrap();
    let result = engine().execute_file(&phi, file.path()).await.unwrap();
    assert_eq!(
        result.to_strings(),
        vec![vec!["NY", "2"], vec!["NJ", "2"], vec!["CT", "2"]]
    );
}

#[tokio::test]
async fn test_replay_decode_error_is_terminal() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "{}", SALES[0]).unwrap();
    writeln!(file, "Bloom,Eggs,21,2,2017,NY").unwrap();
    writeln!(file, "{}", SALES[1]).unwrap();

    let phi = Phi::build("cust, sum_quant\n0\ncust\n\n\n").unwrap();
    let err = engine().execute_file(&phi, file.path()).await.unwrap_err();
    assert!(matches!(err, ExecutorError::Decode { line: 2, .. }));
}

#[tokio::test]
async fn test_channel_source_backpressure() {
    let produced = Arc::new(AtomicUsize::new(0));
    let counter = produced.clone();
    let rows = decode(SALES);

    let mut source = ChannelSource::new(2, move |tx| async move {
        for row in rows {
            if tx.send(Ok(row)).await.is_err() {
                break;
            }
            counter.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    });
    source.open().await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    // two buffered plus the one blocked in send
    assert!(produced.load(Ordering::SeqCst) <= 3);

    let mut count = 0;
    while source.next().await.unwrap().is_some() {
        count += 1;
    }
    assert_eq!(count, SALES.len());
    source.close().await.unwrap();
}

#[tokio::test]
async fn test_engine_over_channel_source() {
    let rows = decode(SALES);
    let source = ChannelSource::new(1, move |tx| async move {
        for row in rows {
            if tx.send(Ok(row)).await.is_err() {
                break;
            }
        }
        Ok(())
    });

    let phi = Phi::build("prod, avg_quant\n0\nprod\n\n\n").unwrap();
    let result = engine().execute(&phi, Box::new(source)).await.unwrap();
    assert_eq!(
        result.to_strings(),
        vec![vec!["Eggs", "191.66666666666666"], vec!["Milk", "28"], vec!["Bread", "7"]]
    );
}

#[tokio::test]
async fn test_render_result() {
    let result = run(
        "cust, count_1_quant\n1\ncust\n\n1.state = 'NJ'\ncount_1_quant > 0",
        SALES,
    )
    .await;

    let mut sink = TableSink::new(Vec::new());
    sink.write_result(&result).unwrap();
    assert_eq!(
        String::from_utf8(sink.into_inner()).unwrap(),
        "cust  | count_1_quant\n\
         ------+--------------\n\
         Bloom | 1\n\
         Knuth | 1\n"
    );
}
