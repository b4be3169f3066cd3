mod support;

use std::sync::Arc;
use std::time::Duration;

use dispatch_core::booking::{Booking, BookingId, BookingState};
use dispatch_core::dispatch::Dispatch;
use dispatch_core::error::DispatchError;
use dispatch_core::event_log::EventLog;
use dispatch_core::test_helpers::{city_config, logged_dispatch, test_driver, test_passenger};

/// Panics when one booking reaches pickup; every other event is ignored.
struct FaultyPickupLog {
    booking_id: BookingId,
}

impl EventLog for FaultyPickupLog {
    fn record(&self, booking: &Booking, message: &str) {
        if booking.id() == self.booking_id && booking.state() == BookingState::Pickup {
            panic!("event sink failed on {message}");
        }
    }
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_booking_waiting_for_a_driver() {
    let (dispatch, log) = logged_dispatch(city_config(2), 0, 0);

    let handle = dispatch
        .book_passenger(test_passenger(0, 10), "city")
        .expect("accepted");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!handle.is_finished(), "no driver, booking must still be waiting");
    assert_eq!(
        log.for_booking(0).last().map(|e| e.state),
        Some(BookingState::WaitingForDriver)
    );

    handle.cancel();
    let err = handle.await.expect_err("cancelled");
    assert_eq!(err, DispatchError::CancelledWait { booking_id: 0 });

    let region = dispatch.region("city").expect("city");
    assert_eq!(region.cancelled_count(), 1);
    assert_eq!(region.completed_count(), 0);
    assert_eq!(dispatch.pending_bookings(), 0);
    assert_eq!(dispatch.bookings_awaiting_driver(), 0);

    let last = log.for_booking(0).pop().expect("cancel event");
    assert_eq!(last.state, BookingState::Cancelled);
    assert_eq!(last.line, "0:null:P-0: Booking cancelled");
}

#[tokio::test(start_paused = true)]
async fn cancelling_mid_trip_returns_the_driver() {
    let (dispatch, log) = logged_dispatch(city_config(2), 1, 0);

    let handle = dispatch
        .book_passenger(test_passenger(0, 1_000), "city")
        .expect("accepted");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(dispatch.idle_drivers(), 0, "driver is out on the trip");
    assert_eq!(
        log.for_booking(0).last().map(|e| e.state),
        Some(BookingState::Travel)
    );

    handle.cancel();
    assert_eq!(
        handle.await.expect_err("cancelled"),
        DispatchError::CancelledWait { booking_id: 0 }
    );
    assert_eq!(dispatch.idle_drivers(), 1, "driver is back in the pool");
    assert_eq!(
        log.for_booking(0).pop().map(|e| e.line),
        Some("0:D-0:P-0: Booking cancelled".to_string())
    );

    let next = dispatch
        .book_passenger(test_passenger(1, 10), "city")
        .expect("accepted")
        .await
        .expect("next booking completes with the returned driver");
    assert_eq!(next.driver.expect("driver").name(), "D-0");
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_queued_booking_leaves_others_running() {
    let (dispatch, _log) = logged_dispatch(city_config(1), 1, 0);

    let running = dispatch
        .book_passenger(test_passenger(0, 100), "city")
        .expect("first");
    let queued = dispatch
        .book_passenger(test_passenger(1, 100), "city")
        .expect("second");
    let last = dispatch
        .book_passenger(test_passenger(2, 100), "city")
        .expect("third");

    tokio::task::yield_now().await;
    queued.cancel();

    assert_eq!(
        queued.await.expect_err("queued booking cancelled"),
        DispatchError::CancelledWait { booking_id: 1 }
    );
    let first = running.await.expect("first completes");
    let third = last.await.expect("third completes");
    assert_eq!(first.booking_id, 0);
    assert_eq!(third.booking_id, 2);

    let region = dispatch.region("city").expect("city");
    assert_eq!(region.completed_count(), 2);
    assert_eq!(region.cancelled_count(), 1);
    assert_eq!(region.peak_running(), 1);
    assert_eq!(dispatch.pending_bookings(), 0);
}

#[tokio::test(start_paused = true)]
async fn shutdown_does_not_cancel_bookings_waiting_for_a_driver() {
    let (dispatch, _log) = logged_dispatch(city_config(1), 0, 0);

    let handle = dispatch
        .book_passenger(test_passenger(0, 10), "city")
        .expect("accepted");
    dispatch.shutdown();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!handle.is_finished(), "still waiting for a driver after shutdown");

    dispatch
        .add_driver(test_driver(0, 0))
        .expect("driver joins late");
    let result = handle.await.expect("completes once a driver shows up");
    assert_eq!(result.driver.expect("driver").name(), "D-0");
    assert_eq!(dispatch.pending_bookings(), 0);
}

#[tokio::test(start_paused = true)]
async fn panicking_booking_fails_without_leaking_its_driver() {
    let log = Arc::new(FaultyPickupLog { booking_id: 0 });
    let dispatch =
        Dispatch::with_event_log(city_config(1).with_log_events(true), log).expect("dispatch");
    dispatch.add_driver(test_driver(0, 0)).expect("driver");

    let err = dispatch
        .book_passenger(test_passenger(0, 10), "city")
        .expect("accepted")
        .await
        .expect_err("booking task panicked");
    assert!(
        matches!(err, DispatchError::BookingFailed { booking_id: 0, .. }),
        "unexpected outcome: {err:?}"
    );

    let region = dispatch.region("city").expect("city");
    assert_eq!(dispatch.pending_bookings(), 0);
    assert_eq!(dispatch.idle_drivers(), 1, "driver is back in the pool");
    assert_eq!(region.cancelled_count(), 1);
    assert_eq!(region.completed_count(), 0);
    assert_eq!(region.running_count(), 0);

    // The region's only worker slot was released, so the next booking runs.
    let next = dispatch
        .book_passenger(test_passenger(1, 10), "city")
        .expect("accepted")
        .await
        .expect("next booking completes");
    assert_eq!(next.driver.expect("driver").name(), "D-0");
    assert_eq!(region.completed_count(), 1);
}
