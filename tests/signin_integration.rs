//! Sign-in engine integration tests.
//!
//! Runs the public API end to end on the in-memory store with a frozen
//! clock, covering:
//! - Idempotent signing with a single store command per sign
//! - Count, streak and state decoding over known bit patterns
//! - Date range and width checks that must fail before touching the store
//! - Key isolation between epochs and subjects

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use signin::{
    BitStore, Error, FieldKind, FixedClock, InMemoryBitStore, SignInConfig, SignInService,
    SignOutcome,
};
use std::sync::Arc;
use test_case::test_case;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap()
}

fn day(n: i64) -> DateTime<Utc> {
    start() + TimeDelta::days(n)
}

fn service(now: DateTime<Utc>) -> SignInService<Arc<InMemoryBitStore>> {
    service_on(Arc::new(InMemoryBitStore::new()), start(), now)
}

fn service_on(
    store: Arc<InMemoryBitStore>,
    epoch_start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> SignInService<Arc<InMemoryBitStore>> {
    let config = SignInConfig::builder()
        .start_date(epoch_start)
        .build()
        .unwrap();
    SignInService::new(store, config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(now)))
}

// ============================================================================
// Sign
// ============================================================================

#[test]
fn test_first_sign_then_repeat() {
    let service = service(day(4));
    assert_eq!(service.sign("7", day(4)).unwrap(), SignOutcome::NewlySigned);

    let before = service.store().bytes("signin:7:20230301000000");
    let outcome = service.sign("7", day(4) + TimeDelta::hours(5)).unwrap();
    assert_eq!(outcome, SignOutcome::AlreadySigned);
    assert!(outcome.is_signed());
    assert_eq!(service.store().bytes("signin:7:20230301000000"), before);
}

#[test]
fn test_each_sign_is_one_command() {
    let service = service(day(4));
    for n in 0..5 {
        service.sign("7", day(n)).unwrap();
        service.sign("7", day(n)).unwrap();
    }
    assert_eq!(service.store().commands_issued(), 10);
}

#[test]
fn test_sign_sets_bit_at_offset() {
    let service = service(day(10));
    service.sign("7", day(9) + TimeDelta::minutes(30)).unwrap();

    let key = service.key_for("7");
    assert!(service.store().get_bit(&key, 9).unwrap());
    assert!(!service.store().get_bit(&key, 8).unwrap());
    assert_eq!(service.store().bytes(&key), Some(vec![0, 0b0100_0000]));
}

#[test_case(start() - TimeDelta::seconds(1) ; "before epoch start")]
#[test_case(day(6) + TimeDelta::seconds(1) ; "beyond future bound")]
fn test_sign_out_of_range(date: DateTime<Utc>) {
    let service = service(day(5));
    assert!(matches!(service.sign("7", date), Err(Error::DateRange(_))));
    assert_eq!(service.store().commands_issued(), 0);
}

#[test]
fn test_sign_within_one_interval_of_now() {
    let service = service(day(5));
    assert!(service.sign("7", day(6)).is_ok());
}

// ============================================================================
// Aggregates
// ============================================================================

#[test_case(&[0, 2, 4], 3, 1 ; "alternating")]
#[test_case(&[2, 3, 4], 3, 3 ; "most recent three")]
#[test_case(&[0, 1, 2, 3], 4, 0 ; "newest unsigned")]
#[test_case(&[0, 1, 2, 3, 4], 5, 5 ; "every bucket")]
#[test_case(&[], 0, 0 ; "never signed")]
fn test_count_and_streak(signed: &[i64], count: u64, streak: u64) {
    let service = service(day(4));
    for &n in signed {
        service.sign("7", day(n)).unwrap();
    }
    assert_eq!(service.sign_count("7", 0, -1).unwrap(), count);
    assert_eq!(service.consecutive_sign_count("7", start()).unwrap(), streak);
}

#[test]
fn test_sign_count_byte_ranges() {
    let service = service(day(20));
    for n in [0, 3, 9, 17] {
        service.sign("7", day(n)).unwrap();
    }
    assert_eq!(service.sign_count("7", 0, 0).unwrap(), 2);
    assert_eq!(service.sign_count("7", 1, 1).unwrap(), 1);
    assert_eq!(service.sign_count("7", -1, -1).unwrap(), 1);
    assert_eq!(service.sign_count("7", 0, -1).unwrap(), 4);
}

#[test]
fn test_streak_is_capped_by_reference() {
    let service = service(day(9));
    for n in 0..10 {
        service.sign("7", day(n)).unwrap();
    }
    assert_eq!(service.consecutive_sign_count("7", start()).unwrap(), 10);
    assert_eq!(service.consecutive_sign_count("7", day(6)).unwrap(), 4);
    assert_eq!(service.consecutive_sign_count("7", day(9)).unwrap(), 1);
}

#[test]
fn test_streak_wider_than_field_fails_without_store_call() {
    let service = service(day(63));
    let result = service.consecutive_sign_count("7", start());
    assert!(matches!(result, Err(Error::Encoding(_))));
    assert_eq!(service.store().commands_issued(), 0);

    // Sixty-three buckets still fit an unsigned field.
    assert_eq!(service.consecutive_sign_count("7", day(1)).unwrap(), 0);
}

#[test]
fn test_states_one_entry_per_bucket() {
    let service = service(day(6));
    for n in [1, 4, 6] {
        service.sign("7", day(n)).unwrap();
    }

    let states = service.get_sign_states("7", day(6)).unwrap();
    assert_eq!(states.len(), 7);

    let key = service.key_for("7");
    for n in 0..7 {
        let label = day(n).format("%Y%m%d%H%M%S").to_string();
        let bit = service.store().get_bit(&key, u64::try_from(n).unwrap()).unwrap();
        assert_eq!(states[&label], u8::from(bit), "bucket {n}");
    }
}

#[test]
fn test_states_until_earlier_date() {
    let service = service(day(6));
    service.sign("7", day(1)).unwrap();
    service.sign("7", day(5)).unwrap();

    let states = service.get_sign_states("7", day(2)).unwrap();
    assert_eq!(states.len(), 3);
    assert_eq!(states.values().filter(|&&v| v == 1).count(), 1);
}

#[test]
fn test_states_empty_when_unsigned() {
    let service = service(day(6));
    service.sign("7", day(5)).unwrap();
    // Signed only after the requested range.
    assert!(service.get_sign_states("7", day(3)).unwrap().is_empty());
    assert!(service.get_sign_states("nobody", day(6)).unwrap().is_empty());
}

#[test]
fn test_states_custom_format() {
    let config = SignInConfig::builder()
        .start_date(start())
        .date_format("%Y-%m-%d")
        .build()
        .unwrap();
    let service = SignInService::new(InMemoryBitStore::new(), config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(day(2))));
    service.sign("7", day(2)).unwrap();

    let states = service.get_sign_states("7", day(2)).unwrap();
    assert_eq!(states.get("2023-03-03"), Some(&1));
    assert_eq!(states.get("2023-03-01"), Some(&0));
    assert_eq!(service.key_for("7"), "signin:7:2023-03-01");
}

// ============================================================================
// Epochs and keys
// ============================================================================

#[test]
fn test_epochs_do_not_share_bitmaps() {
    let store = Arc::new(InMemoryBitStore::new());
    let march = service_on(Arc::clone(&store), start(), day(40));
    let april_start = Utc.with_ymd_and_hms(2023, 4, 1, 0, 0, 0).unwrap();
    let april = service_on(Arc::clone(&store), april_start, day(40));

    march.sign("7", day(31)).unwrap();
    april.sign("7", day(31)).unwrap();

    assert_ne!(march.key_for("7"), april.key_for("7"));
    assert_eq!(store.key_count(), 2);
    assert!(store.get_bit(&march.key_for("7"), 31).unwrap());
    assert!(store.get_bit(&april.key_for("7"), 0).unwrap());
}

#[test]
fn test_end_date_clamps_signs() {
    let config = SignInConfig::builder()
        .start_date(start())
        .end_date(day(3))
        .build()
        .unwrap();
    let service = SignInService::new(InMemoryBitStore::new(), config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(day(8))));

    service.sign("7", day(8)).unwrap();
    assert_eq!(service.offset_of(day(8)).unwrap(), 3);
    assert_eq!(service.consecutive_sign_count("7", start()).unwrap(), 1);
}

#[test]
fn test_hourly_interval() {
    let config = SignInConfig::builder()
        .start_date(start())
        .interval(TimeDelta::hours(1))
        .build()
        .unwrap();
    let now = start() + TimeDelta::hours(5);
    let service = SignInService::new(InMemoryBitStore::new(), config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(now)));

    for h in 3..=5 {
        service.sign("7", start() + TimeDelta::hours(h)).unwrap();
    }
    assert_eq!(service.offset_of(now).unwrap(), 5);
    assert_eq!(service.consecutive_sign_count("7", start()).unwrap(), 3);
    assert_eq!(service.get_sign_states("7", now).unwrap().len(), 6);
}

#[test]
fn test_signed_field_kind_reads_64_buckets() {
    let config = SignInConfig::builder()
        .start_date(start())
        .field_kind(FieldKind::Signed)
        .build()
        .unwrap();
    let service = SignInService::new(InMemoryBitStore::new(), config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(day(63))));

    service.sign("7", day(0)).unwrap();
    let states = service.get_sign_states("7", day(63)).unwrap();
    assert_eq!(states.len(), 64);
    assert_eq!(states["20230301000000"], 1);
    assert_eq!(service.consecutive_sign_count("7", start()).unwrap(), 0);
}

#[test]
fn test_sub_second_buckets_keep_every_state() {
    let config = SignInConfig::builder()
        .start_date(start())
        .interval(TimeDelta::milliseconds(500))
        .date_format("%Y%m%d%H%M%S%.3f")
        .build()
        .unwrap();
    let now = start() + TimeDelta::seconds(2);
    let service = SignInService::new(InMemoryBitStore::new(), config)
        .unwrap()
        .with_clock(Arc::new(FixedClock::new(now)));

    service.sign("7", start()).unwrap();
    service.sign("7", start() + TimeDelta::milliseconds(600)).unwrap();

    let states = service.get_sign_states("7", now).unwrap();
    assert_eq!(states.len(), 5);
    assert_eq!(states["20230301000000.000"], 1);
    assert_eq!(states["20230301000000.500"], 1);
    assert_eq!(states["20230301000001.000"], 0);
}

#[test]
fn test_default_format_rejected_for_sub_second_buckets() {
    let result = SignInConfig::builder()
        .start_date(start())
        .interval(TimeDelta::milliseconds(500))
        .build();
    assert!(matches!(result, Err(Error::InvalidConfig(_))));
}
