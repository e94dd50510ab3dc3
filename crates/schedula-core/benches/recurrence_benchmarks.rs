use chrono::{DateTime, Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use schedula_core::exceptions;
use schedula_core::models::{ExceptionKind, RecurringException, RecurringSeries};
use schedula_core::recurrence::{self, Window};
use uuid::Uuid;

fn weekly_series(weekdays: &[i16], count: Option<i32>, until: Option<DateTime<Utc>>) -> RecurringSeries {
    let dtstart = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
    RecurringSeries {
        id: Uuid::now_v7(),
        user_id: "bench-user".to_string(),
        title: "Benchmark Standup".to_string(),
        notes: String::new(),
        duration_seconds: 1800,
        dtstart,
        time_zone: "America/New_York".to_string(),
        interval: 1,
        weekdays: weekdays.to_vec(),
        until,
        count,
        created_at: dtstart,
        updated_at: dtstart,
    }
}

fn bench_expand_single_weekday(c: &mut Criterion) {
    let series = weekly_series(&[1], None, None);
    let start = series.dtstart;

    let mut group = c.benchmark_group("expand_single_weekday");
    for days in [30, 90, 365, 1825].iter() {
        let window = Window::new(start, start + Duration::days(*days));
        group.bench_with_input(BenchmarkId::new("days", days), days, |b, _| {
            b.iter(|| recurrence::expand(black_box(&series), black_box(&window)).unwrap())
        });
    }
    group.finish();
}

fn bench_expand_multiple_weekdays(c: &mut Criterion) {
    let series = weekly_series(&[1, 2, 3, 4, 5], None, None);
    let start = series.dtstart;
    let window = Window::new(start, start + Duration::days(365));

    c.bench_function("expand_weekday_workweek_one_year", |b| {
        b.iter(|| recurrence::expand(black_box(&series), black_box(&window)).unwrap())
    });
}

fn bench_expand_with_count(c: &mut Criterion) {
    let series = weekly_series(&[1, 3, 5], Some(500), None);
    let start = series.dtstart;
    let window = Window::new(start, start + Duration::days(3650));

    c.bench_function("expand_bounded_by_count", |b| {
        b.iter(|| recurrence::expand(black_box(&series), black_box(&window)).unwrap())
    });
}

fn bench_expand_with_exceptions(c: &mut Criterion) {
    let series = weekly_series(&[1, 2, 3, 4, 5], None, None);
    let start = series.dtstart;
    let window = Window::new(start, start + Duration::days(90));

    let occurrences = recurrence::expand(&series, &window).unwrap();
    let exceptions: Vec<RecurringException> = occurrences
        .iter()
        .step_by(5)
        .map(|occ| RecurringException {
            id: Uuid::now_v7(),
            series_id: series.id,
            occurrence_start: occ.start,
            kind: ExceptionKind::Skip,
            override_start: None,
            override_end: None,
            override_title: None,
            override_notes: None,
        })
        .collect();

    c.bench_function("exceptions_apply_quarter", |b| {
        b.iter(|| {
            exceptions::apply(
                black_box(occurrences.clone()),
                black_box(&exceptions),
                black_box(&window),
            )
        })
    });
}

fn bench_count_within_horizon(c: &mut Criterion) {
    let series = weekly_series(&[1, 3, 5], None, None);

    c.bench_function("count_within_horizon_one_year", |b| {
        b.iter(|| recurrence::count_within_horizon(black_box(&series), Duration::days(365)).unwrap())
    });
}

criterion_group!(
    benches,
    bench_expand_single_weekday,
    bench_expand_multiple_weekdays,
    bench_expand_with_count,
    bench_expand_with_exceptions,
    bench_count_within_horizon
);
criterion_main!(benches);
