//! Merge Property Tests
//!
//! Feed randomly overlapping, stale and missing polls of one published
//! product into a series and check that what comes out is the product's
//! own history, once, in order.

use chrono::{Duration, TimeZone, Utc};
use rand::prelude::*;

use flare_trigger::{Timeseries, XrsSample};

fn product(n: usize) -> Vec<XrsSample> {
    let t0 = Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap();
    (0..n)
        .map(|i| XrsSample {
            time_tag: t0 + Duration::minutes(i as i64),
            satellite: 16,
            xrsa: 1e-8 * (1.0 + i as f64),
            xrsb: 1e-7 * (1.0 + i as f64),
        })
        .collect()
}

#[test]
fn random_polls_reproduce_the_product() {
    let published = product(200);

    for seed in 0..20 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut series = Timeseries::new();
        let mut head = 0usize;

        while head < published.len() {
            // the product grows by 0-3 rows between polls
            head = (head + rng.gen_range(0..=3)).min(published.len());
            let window = rng.gen_range(1..=30);
            let poll = if rng.gen_bool(0.1) {
                None
            } else {
                let start = head.saturating_sub(window);
                Some(published[start..head].to_vec())
            };

            let before = series.len();
            let appended = series.merge(poll);
            assert_eq!(appended.start, before, "seed {seed}: rows are only appended");
            assert!(series.rows().windows(2).all(|w| w[0].time_tag < w[1].time_tag));
        }

        // final poll catches up whatever a missed one skipped
        series.merge(Some(published[published.len() - 1..].to_vec()));
        let last = series.last().unwrap();
        assert_eq!(last, published.last().unwrap(), "seed {seed}");
        assert!(series.rows().iter().all(|r| published.contains(r)));
    }
}

#[test]
fn repeated_poll_appends_nothing() {
    let published = product(30);
    let mut series = Timeseries::new();
    assert_eq!(series.merge(Some(published.clone())).len(), 30);
    for _ in 0..3 {
        assert!(series.merge(Some(published.clone())).is_empty());
    }
    assert_eq!(series.rows(), &published[..]);
}
