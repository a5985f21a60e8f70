//! End-to-end session flows against an in-memory sink.

use livetable::{Config, Datum, Mode, RowInput, Session, StyleSpec, TableStyle, Value};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| (*s).to_owned()).collect()
}

fn config(mode: Mode) -> Config {
    Config {
        mode: Some(mode),
        interactive: Some(mode != Mode::Final),
        term_size: Some((80, 24)),
        ..Config::default()
    }
}

#[test]
fn stream_values_paint_in_order_each_exactly_once() {
    let sink = SharedSink::default();
    let mut session = Session::open(
        sink.clone(),
        columns(&["name", "status"]),
        TableStyle::default(),
        config(Mode::Update),
    )
    .unwrap();

    session
        .submit(RowInput::named([
            ("name", Value::literal("job-1")),
            (
                "status",
                Value::stream_with(
                    "zero",
                    vec![
                        Ok(Datum::from("one")),
                        Ok(Datum::from("two")),
                        Ok(Datum::from("three")),
                    ],
                ),
            ),
        ]))
        .unwrap();
    session.close().unwrap();

    let out = sink.text();
    for value in ["zero", "one", "two", "three"] {
        assert_eq!(out.matches(value).count(), 1, "{value}: {out:?}");
    }
    let positions: Vec<usize> = ["zero", "one", "two", "three"]
        .iter()
        .map(|v| out.find(v).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{positions:?}");
}

#[test]
fn incremental_rows_paint_once_but_reads_stay_current() {
    let sink = SharedSink::default();
    let mut session = Session::open(
        sink.clone(),
        columns(&["name", "status"]),
        TableStyle::default(),
        config(Mode::Incremental),
    )
    .unwrap();

    session
        .submit(vec![Value::literal("job-1"), Value::literal("running")].into())
        .unwrap();
    session
        .submit(vec![Value::literal("job-1"), Value::literal("done")].into())
        .unwrap();

    let values = session.get(&["job-1".to_owned()]).unwrap().unwrap();
    assert_eq!(values["status"], "done");
    session.close().unwrap();

    let out = sink.text();
    assert_eq!(out.matches("running").count(), 1);
    assert!(!out.contains("done"), "incremental mode never rewrites");
}

#[test]
fn summary_block_trails_the_table() {
    let sink = SharedSink::default();
    let mut style = TableStyle::default();
    style.columns.insert(
        "size".to_owned(),
        StyleSpec {
            aggregate: Some(Arc::new(|values: &[Datum]| {
                let total: f64 = values.iter().filter_map(Datum::as_f64).sum();
                vec![format!("total {total}")]
            })),
            ..StyleSpec::default()
        },
    );
    let mut session = Session::open(
        sink.clone(),
        columns(&["name", "size"]),
        style,
        config(Mode::Final),
    )
    .unwrap();

    session
        .submit(vec![Value::literal("a"), Value::literal(10i64)].into())
        .unwrap();
    session
        .submit(vec![Value::literal("b"), Value::literal(32i64)].into())
        .unwrap();
    session.close().unwrap();

    let out = sink.text();
    let last_row = out.find('b').unwrap();
    let summary = out.find("total 42").unwrap();
    assert!(summary > last_row, "summary is the trailing block: {out:?}");
}
