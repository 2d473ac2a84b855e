use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub slot_duration_minutes: i32,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            slot_duration_minutes: 30,
        }
    }
}

impl TestConfig {
    pub fn with_store_url(url: &str) -> Self {
        Self {
            supabase_url: url.to_string(),
            ..Self::default()
        }
    }

    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            port: 0,
            slot_duration_minutes: self.slot_duration_minutes,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    pub fn admin(email: &str) -> Self {
        Self::new(email, "admin")
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_malformed_token() -> String {
        "invalid.token.format".to_string()
    }
}

/// Canned PostgREST row payloads for wiremock-backed tests.
pub struct MockStoreResponses;

impl MockStoreResponses {
    pub fn doctor_row(doctor_id: &str, user_id: &str, fee: f64) -> serde_json::Value {
        json!({
            "id": doctor_id,
            "user_id": user_id,
            "full_name": "Dr. Test",
            "specialty": "General Practice",
            "consultation_fee": fee,
            "availability_schedule": [
                { "day": "Monday", "start_time": "09:00", "end_time": "12:00", "is_available": true },
                { "day": "Tuesday", "start_time": "10:00", "end_time": "17:00", "is_available": true },
                { "day": "Sunday", "start_time": "09:00", "end_time": "12:00", "is_available": false }
            ],
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn appointment_row(
        patient_id: &str,
        doctor_id: &str,
        date: &str,
        start_time: &str,
        end_time: &str,
        status: &str,
    ) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "date": date,
            "start_time": start_time,
            "end_time": end_time,
            "status": status,
            "reason": { "name": "", "reason_type": "physical" },
            "notes": [],
            "payment": { "amount": 150.0, "status": "pending" },
            "created_at": "2024-01-01T00:00:00Z"
        })
    }

    pub fn health_condition_row(id: &str, name: &str, category: &str) -> serde_json::Value {
        json!({
            "id": id,
            "name": name,
            "category": category
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_creation() {
        let config = TestConfig::default();
        let app_config = config.to_app_config();

        assert_eq!(app_config.supabase_url, "http://localhost:54321");
        assert_eq!(app_config.supabase_anon_key, "test-anon-key");
        assert_eq!(app_config.slot_duration_minutes, 30);
        assert!(!app_config.supabase_jwt_secret.is_empty());
    }

    #[test]
    fn test_user_creation() {
        let user = TestUser::doctor("doc@example.com");
        assert_eq!(user.email, "doc@example.com");
        assert_eq!(user.role, "doctor");

        let user_model = user.to_user();
        assert_eq!(user_model.email, Some(user.email.clone()));
        assert_eq!(user_model.role, Some(user.role.clone()));
        assert_eq!(user_model.id, user.id);
    }

    #[test]
    fn test_jwt_token_roundtrip() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_test_token(&user, secret, Some(1));

        assert_eq!(token.split('.').count(), 3);

        let validated = crate::jwt::validate_token(&token, secret).unwrap();
        assert_eq!(validated.id, user.id);
        assert_eq!(validated.role.as_deref(), Some("patient"));
    }

    #[test]
    fn test_expired_token_rejected() {
        let user = TestUser::default();
        let secret = "test-secret";
        let token = JwtTestUtils::create_expired_token(&user, secret);

        assert!(crate::jwt::validate_token(&token, secret).is_err());
    }
}
