//! Remote session: one report round trip per due tick.
//!
//! The session serializes the latched facts, hands them to the platform's
//! synchronous HTTPS transport, and interprets the reply. Every failure is
//! returned as a [`ReportError`] value; the caller decides what to keep.

use core::fmt;

use heapless::String;
use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::config::Identity;
use crate::latch::LatchedState;

pub mod codec;

pub use codec::{CodecError, ReportRequest, decode_response, encode_request};

/// Length of the per-boot session token.
pub const SESSION_ID_LEN: usize = 32;

/// Capacity reserved for an encoded request body.
pub const REQUEST_CAPACITY: usize = 256;

/// Capacity reserved for a response body.
pub const RESPONSE_CAPACITY: usize = 512;

const SESSION_ID_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Random alphanumeric token identifying one boot of the agent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SessionId(String<SESSION_ID_LEN>);

impl SessionId {
    /// Draws a fresh token from `rng`.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut token = String::new();
        for _ in 0..SESSION_ID_LEN {
            let index = rng.gen_range(0..SESSION_ID_CHARSET.len());
            // Capacity matches the loop bound.
            let _ = token.push(char::from(SESSION_ID_CHARSET[index]));
        }
        Self(token)
    }

    /// Generates a token from a boot-time entropy sample.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = SmallRng::seed_from_u64(seed);
        Self::generate(&mut rng)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper object that carries the command flag in nested schemas.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandWrapper {
    Data,
    Command,
}

/// Where the `turnOffPC` flag lives in a response.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CommandLocation {
    TopLevel,
    Nested(CommandWrapper),
}

/// Command carried by an acknowledged report.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    None,
    PowerOff,
    /// The command field was present but unreadable; treated as no command.
    Malformed,
}

/// Successful report round trip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Ack {
    pub command: Command,
}

impl Ack {
    pub const fn power_off_requested(&self) -> bool {
        matches!(self.command, Command::PowerOff)
    }
}

/// Reasons a report was not acknowledged.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReportError {
    /// The transport could not complete the request.
    Unreachable,
    /// The service answered with a non-success status.
    Rejected { status: u16 },
    /// The service answered with a body that is not a JSON object.
    ParseFailed,
    /// The request did not fit [`REQUEST_CAPACITY`].
    Encode,
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Unreachable => f.write_str("service unreachable"),
            ReportError::Rejected { status } => write!(f, "rejected with status {status}"),
            ReportError::ParseFailed => f.write_str("response parse failed"),
            ReportError::Encode => f.write_str("request encode failed"),
        }
    }
}

/// Status line and body length of a completed HTTP exchange.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body_len: usize,
    /// Set when the body did not fit the caller's buffer.
    pub truncated: bool,
}

impl HttpReply {
    pub const fn new(status: u16, body_len: usize) -> Self {
        Self {
            status,
            body_len,
            truncated: false,
        }
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Synchronous HTTPS POST to the configured report endpoint.
///
/// Implementations own the URL, API-key header, and certificate trust. The
/// response body is written into `response`.
pub trait ReportTransport {
    type Error;

    fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, Self::Error>;
}

/// Per-boot report context.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RemoteSession {
    identity: Identity,
    session_id: SessionId,
    location: CommandLocation,
}

impl RemoteSession {
    pub fn new(identity: Identity, session_id: SessionId, location: CommandLocation) -> Self {
        Self {
            identity,
            session_id,
            location,
        }
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub const fn identity(&self) -> Identity {
        self.identity
    }

    /// Performs one report round trip carrying `latched`.
    pub fn report<T: ReportTransport + ?Sized>(
        &self,
        transport: &mut T,
        latched: LatchedState,
    ) -> Result<Ack, ReportError> {
        let request = ReportRequest {
            pc_name: self.identity.name,
            device_id: self.identity.id,
            is_alive: latched.alive,
            is_opened: latched.opened,
            session_id: self.session_id.as_str(),
        };

        let mut request_buf = [0u8; REQUEST_CAPACITY];
        let request_len =
            encode_request(&request, &mut request_buf).map_err(|_| ReportError::Encode)?;

        let mut response_buf = [0u8; RESPONSE_CAPACITY];
        let reply = transport
            .post(&request_buf[..request_len], &mut response_buf)
            .map_err(|_| ReportError::Unreachable)?;

        if !reply.is_success() {
            return Err(ReportError::Rejected {
                status: reply.status,
            });
        }
        if reply.truncated || reply.body_len > response_buf.len() {
            return Err(ReportError::ParseFailed);
        }

        let command = decode_response(&response_buf[..reply.body_len], self.location)
            .map_err(|_| ReportError::ParseFailed)?;
        Ok(Ack { command })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CannedTransport {
        outcome: Result<(u16, &'static [u8]), ()>,
        last_request: heapless::Vec<u8, REQUEST_CAPACITY>,
    }

    impl CannedTransport {
        fn replying(status: u16, body: &'static [u8]) -> Self {
            Self {
                outcome: Ok((status, body)),
                last_request: heapless::Vec::new(),
            }
        }

        fn failing() -> Self {
            Self {
                outcome: Err(()),
                last_request: heapless::Vec::new(),
            }
        }
    }

    impl ReportTransport for CannedTransport {
        type Error = ();

        fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, ()> {
            self.last_request.clear();
            self.last_request
                .extend_from_slice(body)
                .map_err(|_| ())?;
            let (status, reply) = self.outcome?;
            response[..reply.len()].copy_from_slice(reply);
            Ok(HttpReply::new(status, reply.len()))
        }
    }

    fn session() -> RemoteSession {
        RemoteSession::new(
            Identity::named("desk"),
            SessionId::from_seed(7),
            CommandLocation::TopLevel,
        )
    }

    #[test]
    fn session_id_is_fixed_length_alphanumeric() {
        let id = SessionId::from_seed(42);
        assert_eq!(id.as_str().len(), SESSION_ID_LEN);
        assert!(id.as_str().bytes().all(|byte| byte.is_ascii_alphanumeric()));
        assert_eq!(id, SessionId::from_seed(42));
        assert_ne!(id, SessionId::from_seed(43));
    }

    #[test]
    fn report_carries_latched_facts_and_session() {
        let session = session();
        let mut transport = CannedTransport::replying(200, b"");
        let ack = session
            .report(&mut transport, LatchedState::new(true, true))
            .expect("ack");
        assert_eq!(ack.command, Command::None);

        let sent = core::str::from_utf8(&transport.last_request).expect("utf8");
        assert!(sent.contains(r#""isAlive":true"#));
        assert!(sent.contains(r#""isOpened":true"#));
        assert!(sent.contains(session.session_id().as_str()));
    }

    #[test]
    fn power_off_flag_is_surfaced() {
        let mut transport = CannedTransport::replying(200, br#"{"turnOffPC":true}"#);
        let ack = session()
            .report(&mut transport, LatchedState::default())
            .expect("ack");
        assert!(ack.power_off_requested());
    }

    #[test]
    fn failures_map_to_report_errors() {
        let session = session();

        let mut down = CannedTransport::failing();
        assert_eq!(
            session.report(&mut down, LatchedState::default()),
            Err(ReportError::Unreachable)
        );

        let mut rejected = CannedTransport::replying(503, b"busy");
        assert_eq!(
            session.report(&mut rejected, LatchedState::default()),
            Err(ReportError::Rejected { status: 503 })
        );

        let mut garbage = CannedTransport::replying(200, b"not json");
        assert_eq!(
            session.report(&mut garbage, LatchedState::default()),
            Err(ReportError::ParseFailed)
        );
    }

    #[test]
    fn oversized_identity_fails_to_encode() {
        const LONG_NAME: &str = concat!(
            "0123456789012345678901234567890123456789012345678901234567890123456789",
            "0123456789012345678901234567890123456789012345678901234567890123456789",
            "0123456789012345678901234567890123456789012345678901234567890123456789",
        );
        let session = RemoteSession::new(
            Identity::named(LONG_NAME),
            SessionId::from_seed(1),
            CommandLocation::TopLevel,
        );
        let mut transport = CannedTransport::replying(200, b"");
        assert_eq!(
            session.report(&mut transport, LatchedState::default()),
            Err(ReportError::Encode)
        );
    }
}
