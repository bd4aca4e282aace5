//! Goodness-of-fit of sampled draw start times against the presence pdf.

mod common;

use rand::SeedableRng;
use rand::rngs::StdRng;
use statrs::distribution::{ChiSquared, ContinuousCDF};

use ewh_sim::sim::presence::{PresenceDistribution, PresenceWeights};

const SAMPLES: usize = 10_000;
const HOURS: usize = 24;

/// Expected hourly counts under nearest-value inverse-cdf sampling.
///
/// Each distinct cdf value owns the `u` interval between the midpoints to its
/// neighbours; that mass is shared evenly by the run of minutes holding it.
fn nearest_value_expectation(presence: &PresenceDistribution) -> [f64; HOURS] {
    let cdf = presence.cdf();
    let mut expected = [0.0_f64; HOURS];
    let mut previous: Option<f64> = None;
    let mut start = 0;
    while start < cdf.len() {
        let value = cdf[start];
        let end = start + cdf[start..].iter().take_while(|&&c| c == value).count();
        let lo = previous.map_or(0.0, |p| (p + value) / 2.0);
        let hi = cdf.get(end).map_or(1.0, |&next| (value + next) / 2.0);
        let share = (hi - lo).max(0.0) / (end - start) as f64;
        for minute in start..end {
            expected[minute / 60] += share * SAMPLES as f64;
        }
        previous = Some(value);
        start = end;
    }
    expected
}

fn hourly_starts(presence: &PresenceDistribution, seed: u64) -> [usize; HOURS] {
    let sampler = common::default_sampler();
    let mut rng = StdRng::seed_from_u64(seed);
    let mut observed = [0_usize; HOURS];
    for _ in 0..SAMPLES {
        let minute = sampler.sample_start(presence, &mut rng);
        assert!(minute < 1440);
        observed[minute / 60] += 1;
    }
    observed
}

/// Pearson statistic over hours expecting at least five starts, and its 1% critical value.
fn chi_square(observed: &[usize; HOURS], expected: &[f64; HOURS]) -> (f64, f64) {
    let mut statistic = 0.0;
    let mut buckets = 0;
    for (&o, &e) in observed.iter().zip(expected) {
        if e < 5.0 {
            continue;
        }
        let diff = o as f64 - e;
        statistic += diff * diff / e;
        buckets += 1;
    }
    let df = (buckets - 1) as f64;
    let critical = ChiSquared::new(df).expect("df > 0").inverse_cdf(0.99);
    (statistic, critical)
}

#[test]
fn start_times_follow_presence_distribution() {
    let presence = common::reference_presence();
    let observed = hourly_starts(&presence, 2024);

    let mut weighted = [0.0_f64; HOURS];
    for (minute, p) in presence.pdf().iter().enumerate() {
        weighted[minute / 60] += p;
    }
    // away hours carry no weight; only ties at the edge of the away run land there
    let spill: usize = (0..HOURS)
        .filter(|&h| weighted[h] == 0.0)
        .map(|h| observed[h])
        .sum();
    assert!(
        (spill as f64) < 0.01 * SAMPLES as f64,
        "{spill} starts landed in zero-weight hours"
    );

    let (statistic, critical) = chi_square(&observed, &nearest_value_expectation(&presence));
    assert!(
        statistic < critical,
        "chi-square {statistic:.2} exceeds critical value {critical:.2}"
    );
}

#[test]
fn mis_weighted_expectation_is_rejected() {
    let presence = common::reference_presence();
    let observed = hourly_starts(&presence, 2024);

    let swapped = PresenceWeights {
        peak: 0.335,
        normal: 0.65,
        away: 0.0,
        night: 0.015,
    };
    let other = PresenceDistribution::from_schedule(&common::reference_schedule(), &swapped)
        .expect("non-degenerate presence");
    let (statistic, critical) = chi_square(&observed, &nearest_value_expectation(&other));
    assert!(
        statistic > critical,
        "chi-square {statistic:.2} should exceed {critical:.2} for swapped weights"
    );
}

#[test]
fn away_interval_is_rarely_sampled() {
    let presence = common::reference_presence();
    let sampler = common::default_sampler();
    let mut rng = StdRng::seed_from_u64(7);

    let away = (0..SAMPLES)
        .map(|_| sampler.sample_start(&presence, &mut rng))
        .filter(|m| (480..1080).contains(m))
        .count();
    assert!(away < SAMPLES / 100, "{away} starts while away");
}

#[test]
fn peak_bands_are_denser_than_normal_minutes() {
    let presence = common::reference_presence();
    let sampler = common::default_sampler();
    let mut rng = StdRng::seed_from_u64(11);

    let mut per_minute = vec![0_usize; 1440];
    for _ in 0..SAMPLES * 5 {
        per_minute[sampler.sample_start(&presence, &mut rng)] += 1;
    }

    // morning peak after waking vs. evening normal minutes
    let peak: usize = per_minute[390..420].iter().sum();
    let normal: usize = per_minute[1140..1170].iter().sum();
    assert!(peak > normal, "peak {peak} vs normal {normal}");
}
