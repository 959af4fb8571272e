use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use ticket_booking_client::{
    config::{ApiConfig, CircuitBreakerConfig},
    models::{SeatId, SeatStatus, Show, ShowPricing},
    services::{circuit_breaker::CircuitState, HttpSeatInventory},
    Phase, ReservationError, SeatReservationWorkflow, ValidationError,
};

fn pricing() -> ShowPricing {
    ShowPricing {
        normal: 200,
        premium: 350,
        recliner: 500,
    }
}

fn client(server: &MockServer) -> HttpSeatInventory {
    client_with_breaker(server, CircuitBreakerConfig::default())
}

fn client_with_breaker(server: &MockServer, breaker: CircuitBreakerConfig) -> HttpSeatInventory {
    HttpSeatInventory::from_config(
        &ApiConfig {
            base_url: server.uri(),
            timeout_seconds: 5,
            auth_token: Some("secret".to_string()),
        },
        &breaker,
    )
    .unwrap()
}

fn seat_map() -> serde_json::Value {
    json!({
        "seats": [
            {"id": "A1", "number": "A1", "type": "normal", "booked": false, "locked": false},
            {"id": "A2", "number": "A2", "type": "premium", "booked": false, "locked": false},
            {"id": "A3", "number": "A3", "type": "recliner", "booked": true, "locked": false}
        ]
    })
}

async fn mount_seats(server: &MockServer, show_id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/bookings/seats/{}", show_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn books_two_seats_end_to_end() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;

    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .and(header("authorization", "Bearer secret"))
        .and(body_json(json!({"showId": "show-1", "seatIds": ["A1", "A2"]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "lockToken": "lock-abc",
            "expiresAt": "2099-01-01T00:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bookings/confirm"))
        .and(body_json(json!({
            "showId": "show-1",
            "seatIds": ["A1", "A2"],
            "amount": 550,
            "lockToken": "lock-abc"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "booking": {"id": "bk-100", "ticketId": "TCK-1", "amount": 550}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    assert_eq!(workflow.phase(), Phase::Browsing);

    workflow.toggle_seat(&SeatId::from("A1")).unwrap();
    workflow.toggle_seat(&SeatId::from("A2")).unwrap();
    assert_eq!(workflow.total_amount(), 550);

    let lock = workflow.request_lock().await.unwrap();
    assert_eq!(workflow.phase(), Phase::Locked);
    assert_eq!(lock.token.as_str(), "lock-abc");
    assert!(lock.expires_at.is_some());

    let booking = workflow.confirm_booking().await.unwrap();
    assert_eq!(booking.id.as_str(), "bk-100");
    assert_eq!(booking.ticket_id.as_deref(), Some("TCK-1"));
    assert_eq!(workflow.phase(), Phase::Confirmed);
}

#[tokio::test]
async fn contention_empties_selection_after_resync() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(seat_map()))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    // вторая выдача карты: A1 уже заблокировано другим покупателем
    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "seats": [
                {"id": "A1", "number": "A1", "type": "normal", "locked": true},
                {"id": "A2", "number": "A2", "type": "premium"},
                {"id": "A3", "number": "A3", "type": "recliner", "booked": true}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "error": "Seats already locked",
            "unavailableSeats": ["A1"]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();

    let err = workflow.request_lock().await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::Contention {
            seats: vec![SeatId::from("A1")],
            message: "Seats already locked".to_string(),
        }
    );

    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Browsing);
    assert!(snapshot.selection.is_empty());
    assert_eq!(snapshot.total_amount, 0);
    assert_eq!(snapshot.last_error, Some(err));
    for id in &snapshot.selection {
        let status = snapshot.seat(id).unwrap().status;
        assert!(status != SeatStatus::Booked && status != SeatStatus::LockedByOther);
    }
    assert_eq!(
        snapshot.seat(&SeatId::from("A1")).unwrap().status,
        SeatStatus::LockedByOther
    );
}

#[tokio::test]
async fn second_lock_while_locking_is_rejected_without_request() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;

    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"lockToken": "lock-slow"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A2")).unwrap();

    let (first, second) = tokio::join!(workflow.request_lock(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        workflow.request_lock().await
    });

    assert!(first.is_ok());
    assert_eq!(
        second.unwrap_err(),
        ReservationError::Validation(ValidationError::WrongPhase {
            operation: "request_lock".to_string(),
            phase: Phase::Locking,
        })
    );
    assert_eq!(workflow.phase(), Phase::Locked);
}

#[tokio::test]
async fn late_response_for_previous_show_is_discarded() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(seat_map())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;
    mount_seats(
        &server,
        "show-2",
        json!({"seats": [{"id": "B1", "number": "B1", "type": "recliner"}]}),
    )
    .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    let (first, second) = tokio::join!(
        workflow.select_show(Show::new("show-1", pricing())),
        async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            workflow.select_show(Show::new("show-2", pricing())).await
        }
    );

    assert!(second.is_ok());
    assert_eq!(
        first.unwrap_err(),
        ReservationError::Validation(ValidationError::StaleShow {
            show_id: "show-1".to_string(),
        })
    );

    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Browsing);
    assert_eq!(snapshot.show.unwrap().id.as_str(), "show-2");
    assert_eq!(snapshot.seats.len(), 1);
    assert_eq!(snapshot.seats[0].id.as_str(), "B1");
    assert!(snapshot.last_error.is_none());
}

#[tokio::test]
async fn lock_response_after_reset_is_not_applied() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"lockToken": "lock-late"}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();

    let (locked, ()) = tokio::join!(workflow.request_lock(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        workflow.reset();
    });

    assert!(matches!(
        locked,
        Err(ReservationError::Validation(ValidationError::StaleShow { .. }))
    ));
    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.lock.is_none());
    assert!(snapshot.selection.is_empty());
}

#[tokio::test]
async fn second_confirm_while_confirming_is_rejected_without_request() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lockToken": "lock-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/confirm"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"booking": {"id": "bk-slow"}}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();
    workflow.request_lock().await.unwrap();

    let (first, second) = tokio::join!(workflow.confirm_booking(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        workflow.confirm_booking().await
    });

    assert_eq!(first.unwrap().id.as_str(), "bk-slow");
    assert_eq!(
        second.unwrap_err(),
        ReservationError::Validation(ValidationError::WrongPhase {
            operation: "confirm_booking".to_string(),
            phase: Phase::Confirming,
        })
    );
    assert_eq!(workflow.phase(), Phase::Confirmed);
}

#[tokio::test]
async fn confirm_response_after_reset_is_not_applied() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lockToken": "lock-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/confirm"))
        .respond_with(
            ResponseTemplate::new(201)
                .set_body_json(json!({"booking": {"id": "bk-late"}}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();
    workflow.request_lock().await.unwrap();

    let (confirmed, ()) = tokio::join!(workflow.confirm_booking(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        workflow.reset();
    });

    assert_eq!(
        confirmed.unwrap_err(),
        ReservationError::Validation(ValidationError::StaleShow {
            show_id: "show-1".to_string(),
        })
    );
    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert!(snapshot.booking.is_none());
    assert!(snapshot.lock.is_none());
}

#[tokio::test]
async fn contention_after_reset_skips_seat_map_resync() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(seat_map()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"error": "Seats already locked", "unavailableSeats": ["A1"]}))
                .set_delay(Duration::from_millis(200)),
        )
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();

    let (locked, ()) = tokio::join!(workflow.request_lock(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        workflow.reset();
    });

    assert!(matches!(
        locked,
        Err(ReservationError::Validation(ValidationError::StaleShow { .. }))
    ));
    assert_eq!(workflow.phase(), Phase::Idle);
}

#[tokio::test]
async fn server_error_fails_load_and_retry_recovers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "db down"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_seats(&server, "show-1", seat_map()).await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    let err = workflow
        .select_show(Show::new("show-1", pricing()))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ReservationError::Server {
            status: 500,
            message: "db down".to_string(),
        }
    );
    assert_eq!(workflow.phase(), Phase::Failed);

    workflow.retry().await.unwrap();
    assert_eq!(workflow.phase(), Phase::Browsing);
    assert_eq!(workflow.snapshot().seats.len(), 3);
}

#[tokio::test]
async fn open_circuit_short_circuits_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/seats/show-1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let inventory = client_with_breaker(
        &server,
        CircuitBreakerConfig {
            failure_threshold: 1,
            timeout_seconds: 300,
        },
    );
    let workflow = SeatReservationWorkflow::new(inventory.clone());

    let first = workflow.select_show(Show::new("show-1", pricing())).await.unwrap_err();
    assert!(matches!(first, ReservationError::Server { status: 503, .. }));
    assert_eq!(inventory.circuit_breaker_status(), (CircuitState::Open, 1));

    workflow.retry().await.unwrap_err();
    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Failed);
    assert!(matches!(
        snapshot.last_error,
        Some(ReservationError::Network { .. })
    ));
}

#[tokio::test]
async fn confirm_failure_returns_to_locked() {
    let server = MockServer::start().await;
    mount_seats(&server, "show-1", seat_map()).await;
    Mock::given(method("POST"))
        .and(path("/bookings/lock-seats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"lockToken": "lock-1"})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/bookings/confirm"))
        .and(body_partial_json(json!({"lockToken": "lock-1"})))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"error": "Amount mismatch"})))
        .expect(1)
        .mount(&server)
        .await;

    let workflow = SeatReservationWorkflow::new(client(&server));
    workflow.select_show(Show::new("show-1", pricing())).await.unwrap();
    workflow.toggle_seat(&SeatId::from("A1")).unwrap();
    workflow.request_lock().await.unwrap();

    let err = workflow.confirm_booking().await.unwrap_err();
    assert_eq!(
        err,
        ReservationError::Validation(ValidationError::Rejected {
            status: 400,
            message: "Amount mismatch".to_string(),
        })
    );
    let snapshot = workflow.snapshot();
    assert_eq!(snapshot.phase, Phase::Locked);
    assert_eq!(snapshot.lock.unwrap().token.as_str(), "lock-1");
}

#[tokio::test]
async fn reads_booking_history_and_shows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bookings/bk-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "booking": {"id": "bk-7", "amount": 700, "seats": ["A1", "A2"]}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bookings/user/all"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "bookings": [{"id": "bk-7"}, {"id": "bk-8", "status": "cancelled"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/movies/mv-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "shows": [{
                "id": "show-1",
                "timing": "21:00",
                "theatre": {"name": "INOX", "city": "Pune"},
                "priceNormal": 180,
                "pricePremium": 300,
                "priceRecliner": 450
            }]
        })))
        .mount(&server)
        .await;

    let inventory = client(&server);

    let booking = inventory.get_booking("bk-7").await.unwrap();
    assert_eq!(booking.amount, Some(700));
    assert_eq!(booking.seats.len(), 2);

    let history = inventory.user_bookings().await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].status.as_deref(), Some("cancelled"));

    let shows = inventory.movie_shows("mv-1").await.unwrap();
    assert_eq!(shows[0].pricing.recliner, 450);
    assert_eq!(shows[0].timing.as_deref(), Some("21:00"));
}
