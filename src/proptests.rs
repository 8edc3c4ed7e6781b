use std::cmp::Ordering;
use std::collections::{BTreeMap, VecDeque};

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::BwArray;

/// Element under test: the comparator only sees `val`, so `seq` tags which
/// of several equal elements an operation touched.
#[derive(Clone, Debug, PartialEq)]
struct Entry {
    val: i8,
    seq: u64,
}

fn entry_cmp(a: &Entry, b: &Entry) -> Ordering {
    a.val.cmp(&b.val)
}

fn probe(val: i8) -> Entry {
    Entry { val, seq: 0 }
}

/// Reference model: a FIFO multiset. Per value, a queue of insertion tags
/// with the oldest in front — exactly the order lookups and removals must
/// follow.
#[derive(Default)]
struct Model {
    map: BTreeMap<i8, VecDeque<u64>>,
}

impl Model {
    fn insert(&mut self, val: i8, seq: u64) {
        self.map.entry(val).or_default().push_back(seq);
    }

    fn replace_or_insert(&mut self, val: i8, seq: u64) -> Option<u64> {
        match self.map.get_mut(&val) {
            Some(q) => {
                let front = q.front_mut().expect("model never keeps empty queues");
                Some(std::mem::replace(front, seq))
            }
            None => {
                self.insert(val, seq);
                None
            }
        }
    }

    fn delete(&mut self, val: i8) -> Option<u64> {
        let q = self.map.get_mut(&val)?;
        let seq = q.pop_front();
        if q.is_empty() {
            self.map.remove(&val);
        }
        seq
    }

    fn delete_min(&mut self) -> Option<(i8, u64)> {
        let (&val, _) = self.map.iter().next()?;
        Some((val, self.delete(val).expect("present key")))
    }

    fn delete_max(&mut self) -> Option<(i8, u64)> {
        let (&val, _) = self.map.iter().next_back()?;
        Some((val, self.delete(val).expect("present key")))
    }

    fn get(&self, val: i8) -> Option<u64> {
        self.map.get(&val)?.front().copied()
    }

    fn min(&self) -> Option<(i8, u64)> {
        let (&val, q) = self.map.iter().next()?;
        Some((val, *q.front().expect("model never keeps empty queues")))
    }

    fn max(&self) -> Option<(i8, u64)> {
        let (&val, q) = self.map.iter().next_back()?;
        Some((val, *q.front().expect("model never keeps empty queues")))
    }

    fn len(&self) -> usize {
        self.map.values().map(|q| q.len()).sum()
    }
}

/// Actions to run against both the container and the model. Values are
/// drawn from a tiny domain so duplicates are common.
#[derive(Arbitrary, Debug, Clone, Copy)]
enum Action {
    Insert(#[proptest(strategy = "0i8..8")] i8),
    ReplaceOrInsert(#[proptest(strategy = "0i8..8")] i8),
    Delete(#[proptest(strategy = "0i8..8")] i8),
    DeleteMin,
    DeleteMax,
    Get(#[proptest(strategy = "0i8..8")] i8),
    Has(#[proptest(strategy = "0i8..8")] i8),
    MinMax,
}

struct Test {
    arr: BwArray<Entry, fn(&Entry, &Entry) -> Ordering>,
    model: Model,
    next_seq: u64,
}

impl Test {
    fn new() -> Self {
        Test {
            arr: BwArray::new(entry_cmp),
            model: Model::default(),
            next_seq: 0,
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(val) => {
                self.next_seq += 1;
                self.arr.insert(Entry {
                    val,
                    seq: self.next_seq,
                });
                self.model.insert(val, self.next_seq);
            }
            Action::ReplaceOrInsert(val) => {
                self.next_seq += 1;
                let got = self
                    .arr
                    .replace_or_insert(Entry {
                        val,
                        seq: self.next_seq,
                    })
                    .map(|e| e.seq);
                let want = self.model.replace_or_insert(val, self.next_seq);
                assert_eq!(got, want, "replace_or_insert({val})");
            }
            Action::Delete(val) => {
                let got = self.arr.delete(&probe(val)).map(|e| e.seq);
                let want = self.model.delete(val);
                assert_eq!(got, want, "delete({val})");
            }
            Action::DeleteMin => {
                let got = self.arr.delete_min().map(|e| (e.val, e.seq));
                assert_eq!(got, self.model.delete_min(), "delete_min");
            }
            Action::DeleteMax => {
                let got = self.arr.delete_max().map(|e| (e.val, e.seq));
                assert_eq!(got, self.model.delete_max(), "delete_max");
            }
            Action::Get(val) => {
                let got = self.arr.get(&probe(val)).map(|e| e.seq);
                assert_eq!(got, self.model.get(val), "get({val})");
            }
            Action::Has(val) => {
                assert_eq!(
                    self.arr.has(&probe(val)),
                    self.model.map.contains_key(&val),
                    "has({val})"
                );
            }
            Action::MinMax => {
                let got = self.arr.min().map(|e| (e.val, e.seq));
                assert_eq!(got, self.model.min(), "min");
                let got = self.arr.max().map(|e| (e.val, e.seq));
                assert_eq!(got, self.model.max(), "max");
            }
        }
        assert_eq!(self.arr.len(), self.model.len(), "length after {action:?}");
        assert_eq!(self.arr.is_empty(), self.model.len() == 0);
    }

    /// The ascending walk must visit the model's values in order; among
    /// equal values the visit order is unspecified, so sequence tags are
    /// compared as per-value multisets.
    fn check_contents(&self) {
        let mut walked: BTreeMap<i8, Vec<u64>> = BTreeMap::new();
        let mut prev: Option<i8> = None;
        self.arr.ascend(|e| {
            if let Some(p) = prev {
                assert!(p <= e.val, "ascend out of order: {p} before {}", e.val);
            }
            prev = Some(e.val);
            walked.entry(e.val).or_default().push(e.seq);
            true
        });

        let mut expected: BTreeMap<i8, Vec<u64>> = BTreeMap::new();
        for (&val, q) in &self.model.map {
            let mut seqs: Vec<u64> = q.iter().copied().collect();
            seqs.sort_unstable();
            expected.insert(val, seqs);
        }
        for seqs in walked.values_mut() {
            seqs.sort_unstable();
        }
        assert_eq!(walked, expected);
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_fifo_model(actions in prop::collection::vec(any::<Action>(), 1..128)) {
        let mut test = Test::new();
        for action in actions {
            test.execute(action);
        }
        test.check_contents();
    }

    #[test]
    fn proptest_from_slice_matches_sorted_input(values in prop::collection::vec(any::<i16>(), 0..300)) {
        let arr = BwArray::from_slice(|a: &i16, b: &i16| a.cmp(b), &values);
        prop_assert_eq!(arr.len(), values.len());

        let mut collected = Vec::with_capacity(values.len());
        arr.ascend(|&v| {
            collected.push(v);
            true
        });
        let mut expected = values.clone();
        expected.sort_unstable();
        prop_assert_eq!(collected, expected);
    }
}
