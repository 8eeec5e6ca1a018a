use crate::decoder;
use crate::domain::Measurement;
use crate::session::{Session, SessionError};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};
use url::Url;

pub const MONITOR_PATH: &str = "/cgi-bin/getexchanger_monitor.cgi";

#[derive(Debug)]
pub struct Device {
    session: Session,
}

impl Device {
    pub fn new(session: Session) -> Self {
        Device { session }
    }

    pub fn server(&self) -> &Url {
        self.session.base()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub async fn dial(&mut self) -> Result<(), SessionError> {
        self.session.login().await
    }

    pub async fn close(&mut self) {
        self.session.logout().await;
    }

    /// Polls the device once.
    ///
    /// An expired session (HTTP 206) triggers a single new login. The stale
    /// response is dropped, so that poll still fails and data resumes with the
    /// next one.
    #[instrument(skip(self), fields(server = %self.session.base()))]
    pub async fn gather(&mut self) -> Result<Measurement, GatherError> {
        let mut logged_in = false;
        if !self.session.is_authenticated() {
            debug!("🔑 Not logged in, logging in before polling...");
            self.session.login().await?;
            logged_in = true;
        }

        let response = self.session.authenticated_request(Method::GET, MONITOR_PATH, None).await?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::PARTIAL_CONTENT => {
                warn!("⏳ Session expired");
                self.session.invalidate();
                if logged_in {
                    return Err(GatherError::ExpiredAfterLogin);
                }
                info!("🔑 Logging in again...");
                self.session.login().await?;
                info!("🔑 Logging in again... OK");
                return Err(GatherError::SessionExpired);
            }
            status => {
                return Err(GatherError::UnexpectedStatus {
                    expected: StatusCode::OK,
                    got: status,
                });
            }
        }

        let body = response.bytes().await?;
        let payload: Value = serde_json::from_slice(&body)?;
        let values = payload.get("values").and_then(Value::as_object).ok_or(GatherError::MissingValues)?;

        let fields = decoder::decode(values);
        debug!("📈 Decoded {} field(s) from {} key(s)", fields.len(), values.len());

        Ok(Measurement::new(self.session.base().as_str(), fields))
    }
}

#[derive(Error, Debug)]
pub enum GatherError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session expired, logged in again for the next poll")]
    SessionExpired,
    #[error("session expired right after logging in, will log in on the next poll")]
    ExpiredAfterLogin,
    #[error("expected status {expected}; got {got}")]
    UnexpectedStatus { expected: StatusCode, got: StatusCode },
    #[error("request error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
    #[error("payload has no 'values' object")]
    MissingValues,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FieldValue, Fields, MEASUREMENT_NAME};
    use crate::session::{Credentials, LOGIN_PATH, SessionToken};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use reqwest::Client;
    use test_log::test;

    const PAYLOAD: &str = r#"{"values": {"T101": 1, "TempValue01": "68 *F", "M105": 1, "MeterValue05": 42}}"#;

    fn device(url: &str, token: Option<&str>) -> Device {
        let credentials = Credentials::new("admin", "secret");
        let session = Session::new(url, credentials, Client::new(), StdRng::seed_from_u64(3)).unwrap();
        match token {
            Some(value) => Device::new(session.with_token(SessionToken::new("SESSIONID", value))),
            None => Device::new(session),
        }
    }

    async fn mock_monitor(server: &mut mockito::ServerGuard, token: &str, status: usize, body: &str) -> mockito::Mock {
        server
            .mock("GET", MONITOR_PATH)
            .match_header("cookie", format!("SESSIONID={}", token).as_str())
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    async fn mock_login(server: &mut mockito::ServerGuard, status: usize, token: &str, hits: usize) -> mockito::Mock {
        server
            .mock("POST", LOGIN_PATH)
            .with_status(status)
            .with_header("set-cookie", format!("SESSIONID={}; Path=/", token).as_str())
            .expect(hits)
            .create_async()
            .await
    }

    #[test(tokio::test)]
    async fn gather_returns_the_decoded_fields() -> Result<(), GatherError> {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_monitor(&mut server, "abc", 200, PAYLOAD).await;

        let mut device = device(&server.url(), Some("abc"));
        let measurement = device.gather().await?;

        mock.assert_async().await;
        assert_eq!(measurement.name, MEASUREMENT_NAME);
        assert_eq!(measurement.server(), Some(device.server().as_str()));
        assert_eq!(
            measurement.fields,
            Fields::from([
                ("temp_1".to_string(), FieldValue::Integer(68)),
                ("meter_5".to_string(), FieldValue::Integer(42)),
            ])
        );
        Ok(())
    }

    #[test(tokio::test)]
    async fn expired_session_logs_in_once_and_recovers_on_the_next_poll() {
        let mut server = mockito::Server::new_async().await;
        let expired = mock_monitor(&mut server, "stale", 206, "").await;
        let login = mock_login(&mut server, 200, "fresh", 1).await;
        let fresh = mock_monitor(&mut server, "fresh", 200, PAYLOAD).await;

        let mut device = device(&server.url(), Some("stale"));

        let first = device.gather().await;
        assert!(matches!(first, Err(GatherError::SessionExpired)), "got {:?}", first);
        assert_eq!(device.session().token(), Some(&SessionToken::new("SESSIONID", "fresh")));

        let second = device.gather().await;
        assert!(second.is_ok(), "got {:?}", second);

        expired.assert_async().await;
        login.assert_async().await;
        fresh.assert_async().await;
    }

    #[test(tokio::test)]
    async fn failed_login_after_expiry_is_reported() {
        let mut server = mockito::Server::new_async().await;
        let _expired = mock_monitor(&mut server, "stale", 206, "").await;
        let login = mock_login(&mut server, 403, "unused", 1).await;

        let mut device = device(&server.url(), Some("stale"));
        let result = device.gather().await;

        login.assert_async().await;
        assert!(matches!(&result, Err(GatherError::Session(e)) if e.is_authentication()), "got {:?}", result);
        assert!(!device.session().is_authenticated());
    }

    #[test(tokio::test)]
    async fn unauthenticated_device_logs_in_before_polling() -> Result<(), GatherError> {
        let mut server = mockito::Server::new_async().await;
        let login = mock_login(&mut server, 200, "abc", 1).await;
        let monitor = mock_monitor(&mut server, "abc", 200, PAYLOAD).await;

        let mut device = device(&server.url(), None);
        device.gather().await?;

        login.assert_async().await;
        monitor.assert_async().await;
        Ok(())
    }

    #[test(tokio::test)]
    async fn expiry_right_after_login_does_not_log_in_twice() {
        let mut server = mockito::Server::new_async().await;
        let login = mock_login(&mut server, 200, "fresh", 1).await;
        let _expired = mock_monitor(&mut server, "fresh", 206, "").await;

        let mut device = device(&server.url(), None);
        let result = device.gather().await;

        login.assert_async().await;
        assert!(matches!(result, Err(GatherError::ExpiredAfterLogin)), "got {:?}", result);
        assert!(!device.session().is_authenticated());
    }

    #[test(tokio::test)]
    async fn other_statuses_fail_without_login() {
        let mut server = mockito::Server::new_async().await;
        let _monitor = mock_monitor(&mut server, "abc", 500, "").await;
        let login = mock_login(&mut server, 200, "abc", 0).await;

        let mut device = device(&server.url(), Some("abc"));
        let result = device.gather().await;

        login.assert_async().await;
        match result {
            Err(e) => assert_eq!(e.to_string(), "expected status 200 OK; got 500 Internal Server Error"),
            Ok(_) => panic!("expected an error"),
        }
    }

    #[test(tokio::test)]
    async fn malformed_json_is_a_payload_error() {
        let mut server = mockito::Server::new_async().await;
        let _monitor = mock_monitor(&mut server, "abc", 200, "not json").await;

        let result = device(&server.url(), Some("abc")).gather().await;

        assert!(matches!(result, Err(GatherError::Payload(_))), "got {:?}", result);
    }

    #[test(tokio::test)]
    async fn missing_values_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _missing = mock_monitor(&mut server, "abc", 200, r#"{"status": "ok"}"#).await;
        let _wrong_type = mock_monitor(&mut server, "def", 200, r#"{"values": 3}"#).await;

        let missing = device(&server.url(), Some("abc")).gather().await;
        let wrong_type = device(&server.url(), Some("def")).gather().await;

        assert!(matches!(missing, Err(GatherError::MissingValues)), "got {:?}", missing);
        assert!(matches!(wrong_type, Err(GatherError::MissingValues)), "got {:?}", wrong_type);
    }

    #[test(tokio::test)]
    async fn unreachable_device_is_a_transport_error() {
        let result = device("http://127.0.0.1:1/", Some("abc")).gather().await;

        assert!(matches!(result, Err(GatherError::Session(SessionError::Transport(_)))), "got {:?}", result);
    }
}
