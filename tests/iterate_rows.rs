use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rowcoro::coro::{Options, SetOption};
use rowcoro::error::RowError;
use rowcoro::rows::memory::VecRows;
use rowcoro::rows::value::{ColumnValue, RowData};
use rowcoro::rows::{iterate_rows, RowSource};

fn init() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
struct TestError(&'static str);

#[derive(Default)]
struct Probe {
    advances: AtomicUsize,
    last_error_calls: AtomicUsize,
    releases: AtomicUsize,
}

impl Probe {
    fn advances(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    fn last_error_calls(&self) -> usize {
        self.last_error_calls.load(Ordering::SeqCst)
    }

    fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

/// Produces `rows` rows numbered from 1 and panics on out-of-order calls.
struct FakeRows {
    rows: usize,
    err: Option<TestError>,
    close_err: Option<TestError>,
    consumed: usize,
    probe: Arc<Probe>,
}

impl FakeRows {
    fn new(rows: usize, err: Option<TestError>, close_err: Option<TestError>) -> (Self, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let fake = FakeRows { rows, err, close_err, consumed: 0, probe: probe.clone() };
        (fake, probe)
    }
}

impl RowSource for FakeRows {
    type Row = usize;
    type Error = TestError;

    fn advance(&mut self) -> bool {
        assert_eq!(self.probe.releases(), 0, "called advance after release");
        self.probe.advances.fetch_add(1, Ordering::SeqCst);
        self.consumed += 1;
        self.consumed <= self.rows
    }

    fn current(&mut self) -> usize {
        self.consumed
    }

    fn last_error(&mut self) -> Option<TestError> {
        assert!(self.consumed > self.rows, "called last_error before advance returned false");
        assert_eq!(self.probe.releases(), 0, "called last_error after release");
        self.probe.last_error_calls.fetch_add(1, Ordering::SeqCst);
        self.err.clone()
    }

    fn release(&mut self) -> Result<(), TestError> {
        assert!(self.consumed > self.rows, "called release before advance returned false");
        self.probe.releases.fetch_add(1, Ordering::SeqCst);
        match self.close_err.clone() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct Case {
    name: &'static str,
    rows: usize,
    err: Option<TestError>,
    close_err: Option<TestError>,
}

#[test]
fn iterate_rows_table() {
    init();
    let cases = vec![
        Case { name: "with no error", rows: 3, err: None, close_err: None },
        Case { name: "with scanning error", rows: 3, err: Some(TestError("scanning")), close_err: None },
        Case { name: "with close error", rows: 3, err: None, close_err: Some(TestError("closing")) },
        Case {
            name: "with both errors",
            rows: 3,
            err: Some(TestError("scanning")),
            close_err: Some(TestError("closing")),
        },
        Case { name: "no rows, no error", rows: 0, err: None, close_err: None },
        Case { name: "no rows, scanning error", rows: 0, err: Some(TestError("scanning")), close_err: None },
        Case { name: "no rows, close error", rows: 0, err: None, close_err: Some(TestError("closing")) },
    ];

    for c in cases {
        let (rows, probe) = FakeRows::new(c.rows, c.err.clone(), c.close_err.clone());

        let mut opt1_calls = 0;
        let mut opt2_calls = 0;
        let opt1: SetOption = Box::new(|_: &mut Options| opt1_calls += 1);
        let opt2: SetOption = Box::new(|_: &mut Options| opt2_calls += 1);
        let mut next_row = iterate_rows(rows, vec![opt1, opt2]).unwrap();

        let mut row = None;
        let mut err = None;
        let mut consumed = 0;
        while next_row.next_row(&mut row, Some(&mut err)) {
            consumed += 1;
            assert_eq!(row, Some(consumed), "{}: rows out of order", c.name);
        }

        assert_eq!(consumed, c.rows, "{}", c.name);
        assert_eq!(err, c.err.clone().or(c.close_err.clone()), "{}", c.name);
        assert_eq!(probe.advances(), c.rows + 1, "{}", c.name);
        assert_eq!(probe.last_error_calls(), 1, "{}", c.name);
        assert_eq!(probe.releases(), 1, "{}: expected release to be called once", c.name);
        assert_eq!(opt1_calls, 1, "{}: expected option 1 to be applied once", c.name);
        assert_eq!(opt2_calls, 1, "{}: expected option 2 to be applied once", c.name);
        assert!(!next_row.killed(), "{}", c.name);
    }
}

#[test]
fn yields_rows_in_source_order() {
    init();
    let rows = VecRows::new([
        RowData(vec![ColumnValue::Integer(13), ColumnValue::Text("foo".into())]),
        RowData(vec![ColumnValue::Integer(42), ColumnValue::Text("bar".into())]),
    ])
    .unwrap();
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    let mut err = None;
    let mut seen = Vec::new();
    while next_row.next_row(&mut row, Some(&mut err)) {
        let data = row.take().unwrap();
        let id = data.get(0).and_then(ColumnValue::as_integer).unwrap();
        let name = data.get(1).and_then(ColumnValue::as_text).unwrap().to_string();
        seen.push((id, name));
    }

    assert_eq!(seen, vec![(13, "foo".to_string()), (42, "bar".to_string())]);
    assert_eq!(err, None);
    assert!(next_row.is_done());
}

#[test]
fn close_error_reported_after_all_rows() {
    init();
    let (rows, probe) = FakeRows::new(3, None, Some(TestError("closing")));
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    let mut err = None;
    for i in 1..=3 {
        assert!(next_row.next_row(&mut row, Some(&mut err)));
        assert_eq!(row, Some(i));
        assert_eq!(err, None, "error must not surface before the end");
        assert_eq!(probe.releases(), 0);
    }
    assert!(!next_row.next_row(&mut row, Some(&mut err)));
    assert_eq!(err, Some(TestError("closing")));
}

#[test]
fn empty_source_releases_before_first_return() {
    init();
    let (rows, probe) = FakeRows::new(0, Some(TestError("scanning")), None);
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    let mut err = None;
    assert!(!next_row.next_row(&mut row, Some(&mut err)));
    assert_eq!(row, None);
    assert_eq!(err, Some(TestError("scanning")));
    assert_eq!(probe.advances(), 1);
    assert_eq!(probe.releases(), 1);
}

#[test]
fn missing_error_slot_drops_the_error() {
    init();
    let (rows, probe) = FakeRows::new(1, Some(TestError("scanning")), None);
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    assert!(next_row.next_row(&mut row, None));
    assert!(!next_row.next_row(&mut row, None));
    assert_eq!(probe.releases(), 1);
}

#[test]
fn calls_after_termination_stay_dead() {
    init();
    let (rows, probe) = FakeRows::new(2, Some(TestError("scanning")), None);
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    let mut err = None;
    while next_row.next_row(&mut row, Some(&mut err)) {}
    assert_eq!(err, Some(TestError("scanning")));

    let mut again = None;
    for _ in 0..3 {
        assert!(!next_row.next_row(&mut row, Some(&mut again)));
    }
    assert_eq!(again, None, "terminal error is surfaced only once");
    assert_eq!(probe.advances(), 3);
    assert_eq!(probe.last_error_calls(), 1);
    assert_eq!(probe.releases(), 1);
}

#[test]
fn iterator_yields_rows_then_error_once() {
    init();
    let (rows, probe) = FakeRows::new(2, None, Some(TestError("closing")));
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    assert_eq!(next_row.next(), Some(Ok(1)));
    assert_eq!(next_row.next(), Some(Ok(2)));
    assert_eq!(next_row.next(), Some(Err(TestError("closing"))));
    assert_eq!(next_row.next(), None);
    assert_eq!(next_row.next(), None);
    assert_eq!(probe.releases(), 1);
}

#[test]
fn iterator_collects_clean_source() {
    init();
    let (rows, _probe) = FakeRows::new(4, None, None);
    let collected: Result<Vec<usize>, TestError> = iterate_rows(rows, Vec::new()).unwrap().collect();
    assert_eq!(collected, Ok(vec![1, 2, 3, 4]));
}

#[test]
fn advancing_function_as_closure() {
    init();
    let (rows, probe) = FakeRows::new(2, Some(TestError("scanning")), None);
    let mut next = iterate_rows(rows, Vec::new()).unwrap().into_fn();

    let mut row = None;
    let mut err = None;
    let mut count = 0;
    while next(&mut row, Some(&mut err)) {
        count += 1;
    }
    assert_eq!(count, 2);
    assert_eq!(err, Some(TestError("scanning")));
    assert_eq!(probe.releases(), 1);
}

#[test]
fn decode_failure_ends_iteration() {
    init();
    let good = RowData(vec![ColumnValue::Integer(1)]).serialize().unwrap();
    let rows = VecRows::from_encoded(vec![good, vec![0x01, 0x00, 0x09]]);
    let mut next_row = iterate_rows(rows, Vec::new()).unwrap();

    let mut row = None;
    let mut err = None;
    assert!(next_row.next_row(&mut row, Some(&mut err)));
    assert_eq!(row, Some(RowData(vec![ColumnValue::Integer(1)])));
    assert!(!next_row.next_row(&mut row, Some(&mut err)));
    assert!(matches!(err, Some(RowError::Decode(_))));
}

#[test]
fn scan_error_wins_over_release_error() {
    init();
    let rows = VecRows::new([RowData(vec![ColumnValue::Boolean(true)]), RowData(vec![ColumnValue::Null])])
        .unwrap()
        .fail_after(1, RowError::Scan("scanning".into()))
        .fail_release(RowError::Release("closing".into()));
    let results: Vec<_> = iterate_rows(rows, Vec::new()).unwrap().collect();
    assert_eq!(
        results,
        vec![Ok(RowData(vec![ColumnValue::Boolean(true)])), Err(RowError::Scan("scanning".into()))]
    );
}

