use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use appointment_cell::router::appointment_routes;
use shared_utils::test_utils::{JwtTestUtils, MockStoreResponses, TestConfig, TestUser};

// Monday in the canned doctor schedule (09:00-12:00).
const MONDAY: &str = "2025-06-02";

fn create_test_app(config: &TestConfig) -> Router {
    appointment_routes(Arc::new(config.to_app_config()))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn mock_doctor(server: &MockServer, doctor_id: &str, user_id: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", format!("eq.{}", doctor_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::doctor_row(doctor_id, user_id, 150.0)
        ])))
        .mount(server)
        .await;
}

async fn mock_no_appointments(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

// ==============================================================================
// AVAILABILITY
// ==============================================================================

#[tokio::test]
async fn availability_for_a_working_day_returns_all_slots() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    mock_no_appointments(&mock_server).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/availability/{}?date={}", doctor_id, MONDAY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let days = body_json(response).await;
    assert_eq!(days.as_array().unwrap().len(), 1);
    assert_eq!(days[0]["day"], "Monday");

    let slots = days[0]["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 6);
    assert_eq!(slots[0]["start"], "09:00");
    assert_eq!(slots[0]["formatted_start"], "9:00 AM");
    assert_eq!(slots[5]["start"], "11:30");
}

#[tokio::test]
async fn availability_excludes_booked_windows() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();
    let patient_id = Uuid::new_v4().to_string();

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &patient_id,
                &doctor_user_id,
                MONDAY,
                "10:00",
                "10:30",
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/availability/{}?date={}", doctor_id, MONDAY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let days = body_json(response).await;
    let slots = days[0]["slots"].as_array().unwrap();
    assert_eq!(slots.len(), 5);
    assert!(slots.iter().all(|s| s["start"] != "10:00"));
}

#[tokio::test]
async fn availability_without_date_covers_the_next_seven_days() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    mock_no_appointments(&mock_server).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/availability/{}", doctor_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let days = body_json(response).await;
    assert_eq!(days.as_array().unwrap().len(), 7);
}

#[tokio::test]
async fn availability_for_unknown_doctor_is_404() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/availability/{}?date={}", Uuid::new_v4(), MONDAY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==============================================================================
// BOOKING
// ==============================================================================

fn booking_body(doctor_id: &str, date: &str, start: &str, end: &str) -> Body {
    Body::from(
        json!({
            "doctor_id": doctor_id,
            "date": date,
            "start_time": start,
            "end_time": end
        })
        .to_string(),
    )
}

fn authed_post(uri: &str, token: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(body)
        .unwrap()
}

#[tokio::test]
async fn booking_without_token_is_401() {
    let config = TestConfig::default();
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("Content-Type", "application/json")
                .body(booking_body(&Uuid::new_v4().to_string(), MONDAY, "10:00", "10:30"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_a_free_slot_returns_201_with_pending_payment() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();
    let patient = TestUser::patient("patient@example.com");

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    mock_no_appointments(&mock_server).await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(body_partial_json(json!({
            "status": "scheduled",
            "start_time": "10:00",
            "payment": { "amount": 150.0, "status": "pending" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &patient.id,
                &doctor_user_id,
                MONDAY,
                "10:00",
                "10:30",
                "scheduled"
            )
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    // Monday 09:00-12:00 is open; book the 10:00 slot.
    let response = app
        .oneshot(authed_post(
            "/",
            &token,
            booking_body(&doctor_id, MONDAY, "10:00", "10:30"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let appointment = body_json(response).await;
    assert_eq!(appointment["status"], "scheduled");
    assert_eq!(appointment["payment"]["status"], "pending");
    assert_eq!(appointment["payment"]["amount"], 150.0);
}

#[tokio::test]
async fn booking_outside_working_hours_is_rejected() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();
    let patient = TestUser::patient("patient@example.com");

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    mock_no_appointments(&mock_server).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    // The Monday schedule starts at 09:00.
    let response = app
        .oneshot(authed_post(
            "/",
            &token,
            booking_body(&doctor_id, MONDAY, "08:00", "08:30"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "This time slot is not available");
}

#[tokio::test]
async fn booking_with_missing_fields_is_400() {
    let patient = TestUser::patient("patient@example.com");
    let config = TestConfig::default();
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_post(
            "/",
            &token,
            Body::from(json!({ "doctor_id": Uuid::new_v4() }).to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn losing_the_booking_race_surfaces_as_slot_unavailable() {
    let mock_server = MockServer::start().await;
    let doctor_id = Uuid::new_v4().to_string();
    let doctor_user_id = Uuid::new_v4().to_string();
    let patient = TestUser::patient("patient@example.com");

    mock_doctor(&mock_server, &doctor_id, &doctor_user_id).await;
    mock_no_appointments(&mock_server).await;
    // The unique (doctor_id, date, start_time) index rejects the second
    // writer even though its pre-insert conflict check saw a free slot.
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "code": "23505",
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_post(
            "/",
            &token,
            booking_body(&doctor_id, MONDAY, "10:00", "10:30"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "This time slot is not available");
}

#[tokio::test]
async fn booking_with_unknown_doctor_is_404() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_post(
            "/",
            &token,
            booking_body(&Uuid::new_v4().to_string(), MONDAY, "10:00", "10:30"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ==============================================================================
// CANCELLATION AND DETAIL READS
// ==============================================================================

fn authed_request(method_name: &str, uri: &str, token: &str, body: Body) -> Request<Body> {
    Request::builder()
        .method(method_name)
        .uri(uri)
        .header("Authorization", format!("Bearer {}", token))
        .header("Content-Type", "application/json")
        .body(body)
        .unwrap()
}

async fn mock_appointment_by_id(server: &MockServer, appointment_id: &str, row: Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([row])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn participant_can_cancel_and_reason_is_noted() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_user_id = Uuid::new_v4().to_string();
    let appointment_id = Uuid::new_v4().to_string();

    let mut row = MockStoreResponses::appointment_row(
        &patient.id,
        &doctor_user_id,
        MONDAY,
        "10:00",
        "10:30",
        "scheduled",
    );
    row["id"] = json!(appointment_id);
    mock_appointment_by_id(&mock_server, &appointment_id, row.clone()).await;

    let mut cancelled = row.clone();
    cancelled["status"] = json!("cancelled");
    cancelled["notes"] = json!(["Cancelled: feeling better"]);
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", format!("eq.{}", appointment_id)))
        .and(body_partial_json(json!({
            "status": "cancelled",
            "notes": ["Cancelled: feeling better"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/cancel", appointment_id),
            &token,
            Body::from(json!({ "reason": "feeling better" }).to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "cancelled");
    assert_eq!(body["notes"][0], "Cancelled: feeling better");
}

#[tokio::test]
async fn stranger_cannot_cancel() {
    let mock_server = MockServer::start().await;
    let stranger = TestUser::patient("stranger@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let mut row = MockStoreResponses::appointment_row(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        MONDAY,
        "10:00",
        "10:30",
        "scheduled",
    );
    row["id"] = json!(appointment_id);
    mock_appointment_by_id(&mock_server, &appointment_id, row).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&stranger, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/cancel", appointment_id),
            &token,
            Body::from(json!({}).to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_can_cancel_someone_elses_appointment() {
    let mock_server = MockServer::start().await;
    let admin = TestUser::admin("admin@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let mut row = MockStoreResponses::appointment_row(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        MONDAY,
        "10:00",
        "10:30",
        "confirmed",
    );
    row["id"] = json!(appointment_id);
    mock_appointment_by_id(&mock_server, &appointment_id, row.clone()).await;

    let mut cancelled = row.clone();
    cancelled["status"] = json!("cancelled");
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([cancelled])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&admin, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/cancel", appointment_id),
            &token,
            Body::from(json!({}).to_string()),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn cancelling_a_completed_appointment_is_rejected() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let mut row = MockStoreResponses::appointment_row(
        &patient.id,
        &Uuid::new_v4().to_string(),
        MONDAY,
        "10:00",
        "10:30",
        "completed",
    );
    row["id"] = json!(appointment_id);
    mock_appointment_by_id(&mock_server, &appointment_id, row).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "PUT",
            &format!("/{}/cancel", appointment_id),
            &token,
            Body::from(json!({ "reason": "too late" }).to_string()),
        ))
        .await
        .unwrap();

    // No PATCH mock is mounted: the rejection happens before any write.
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(
        body["error"],
        "Cannot cancel an appointment with status: completed"
    );
}

#[tokio::test]
async fn missing_appointment_detail_is_404() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/{}", Uuid::new_v4()),
            &token,
            Body::empty(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn detail_read_is_forbidden_for_non_participants() {
    let mock_server = MockServer::start().await;
    let stranger = TestUser::patient("stranger@example.com");
    let appointment_id = Uuid::new_v4().to_string();

    let mut row = MockStoreResponses::appointment_row(
        &Uuid::new_v4().to_string(),
        &Uuid::new_v4().to_string(),
        MONDAY,
        "10:00",
        "10:30",
        "scheduled",
    );
    row["id"] = json!(appointment_id);
    mock_appointment_by_id(&mock_server, &appointment_id, row).await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&stranger, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request(
            "GET",
            &format!("/{}", appointment_id),
            &token,
            Body::empty(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn my_appointments_lists_the_callers_bookings() {
    let mock_server = MockServer::start().await;
    let patient = TestUser::patient("patient@example.com");
    let doctor_user_id = Uuid::new_v4().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("patient_id", format!("eq.{}", patient.id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockStoreResponses::appointment_row(
                &patient.id,
                &doctor_user_id,
                MONDAY,
                "10:00",
                "10:30",
                "scheduled"
            ),
            MockStoreResponses::appointment_row(
                &patient.id,
                &doctor_user_id,
                "2025-06-09",
                "09:00",
                "09:30",
                "confirmed"
            )
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let token = JwtTestUtils::create_test_token(&patient, &config.jwt_secret, None);
    let app = create_test_app(&config);

    let response = app
        .oneshot(authed_request("GET", "/mine", &token, Body::empty()))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["total"], 2);
    assert_eq!(body["appointments"][0]["status"], "scheduled");
}

// ==============================================================================
// HEALTH CONDITION CATALOG
// ==============================================================================

#[tokio::test]
async fn health_categories_are_distinct_and_sorted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/health_conditions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "category": "Mental Health" },
            { "category": "Cardiology" },
            { "category": "Mental Health" },
            { "category": "Dermatology" }
        ])))
        .mount(&mock_server)
        .await;

    let config = TestConfig::with_store_url(&mock_server.uri());
    let app = create_test_app(&config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health-categories")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Cardiology", "Dermatology", "Mental Health"]);
}
