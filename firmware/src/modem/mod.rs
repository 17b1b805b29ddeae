//! ESP-AT driver for the Wi-Fi co-processor.
//!
//! The co-processor owns the Wi-Fi association, TLS, and HTTP. This driver
//! speaks its AT command set over a byte stream and exposes the result through
//! the agent's [`LinkControl`] and [`ReportTransport`] ports. It is generic over
//! `embedded-io` so the protocol handling is tested on the host against a
//! scripted UART.

use core::fmt;
use core::time::Duration;

use embedded_io::{Read, ReadReady, Write};
use heapless::Vec;
use sentinel_core::link::{LinkControl, LinkState};
use sentinel_core::session::{HttpReply, ReportTransport};

use crate::settings::{API_KEY_HEADER, NetworkSettings};

/// Budget for a plain AT command exchange.
pub const MODEM_TIMEOUT: Duration = Duration::from_secs(1);

/// Budget for a report POST, covering the TLS handshake.
pub const HTTP_TIMEOUT: Duration = Duration::from_secs(15);

/// Delay between polls of an idle receive buffer.
pub const POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Wire time of one 10-bit frame at 115200 baud.
const BYTE_TIME: Duration = Duration::from_micros(87);

const LINE_CAPACITY: usize = 128;
const HTTP_DATA_PREFIX: &[u8] = b"+HTTPCLIENT:";
const STATE_PREFIX: &[u8] = b"+CWSTATE:";

/// Blocking delay used while waiting on the receive buffer.
pub trait Pause {
    fn pause(&mut self, duration: Duration);
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemError {
    /// The UART reported an error.
    Uart,
    /// No terminal reply arrived within the poll budget.
    Timeout,
    /// The co-processor is still processing an earlier command.
    Busy,
    /// The command completed with `ERROR` or `FAIL`.
    Failed,
    /// The reply ended without the expected payload.
    UnexpectedReply,
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemError::Uart => f.write_str("uart error"),
            ModemError::Timeout => f.write_str("modem timeout"),
            ModemError::Busy => f.write_str("modem busy"),
            ModemError::Failed => f.write_str("command failed"),
            ModemError::UnexpectedReply => f.write_str("unexpected reply"),
        }
    }
}

type Line = Vec<u8, LINE_CAPACITY>;

enum Token {
    Line(Line),
    /// Start of an `+HTTPCLIENT:<len>,` payload; `len` raw bytes follow.
    Data(usize),
}

pub struct Modem<U, P> {
    uart: U,
    pause: P,
    settings: NetworkSettings,
    budget_left: Duration,
    last_error: Option<ModemError>,
}

impl<U, P> Modem<U, P>
where
    U: Read + ReadReady + Write,
    P: Pause,
{
    pub fn new(uart: U, pause: P, settings: NetworkSettings) -> Self {
        Self {
            uart,
            pause,
            settings,
            budget_left: Duration::ZERO,
            last_error: None,
        }
    }

    /// Puts the co-processor in station mode and sets its DHCP hostname.
    pub fn configure(&mut self) -> Result<(), ModemError> {
        self.simple_command(b"AT")?;
        self.simple_command(b"ATE0")?;
        self.simple_command(b"AT+CWMODE=1")?;

        self.begin(MODEM_TIMEOUT)?;
        self.send(b"AT+CWHOSTNAME=")?;
        self.send_quoted(&[self.settings.hostname.as_bytes()])?;
        self.finish()?;
        self.await_ok()
    }

    /// Starts joining the configured access point without waiting for it.
    pub fn join(&mut self) -> Result<(), ModemError> {
        self.begin(MODEM_TIMEOUT)?;
        self.send(b"AT+CWJAP=")?;
        self.send_quoted(&[self.settings.ssid.as_bytes()])?;
        self.send(b",")?;
        self.send_quoted(&[self.settings.password.as_bytes()])?;
        self.finish()
    }

    pub fn query_state(&mut self) -> Result<LinkState, ModemError> {
        self.begin(MODEM_TIMEOUT)?;
        self.send(b"AT+CWSTATE?")?;
        self.finish()?;

        let mut state = None;
        loop {
            match self.next_token()? {
                Token::Line(line) => {
                    if let Some(rest) = line.strip_prefix(STATE_PREFIX) {
                        state = parse_link_state(rest);
                    } else if let Some(result) = terminal(&line) {
                        result?;
                        return state.ok_or(ModemError::UnexpectedReply);
                    }
                }
                Token::Data(len) => self.skip(len)?,
            }
        }
    }

    /// POSTs `body` as JSON over TLS and collects the response payload.
    ///
    /// The co-processor answers `ERROR` for transport failures and non-2xx
    /// statuses alike, so a completed exchange always reports status 200.
    pub fn http_post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, ModemError> {
        self.begin(HTTP_TIMEOUT)?;
        self.send(b"AT+HTTPCLIENT=3,1,")?;
        self.send_quoted(&[self.settings.api_url.as_bytes()])?;
        self.send(b",,,2,")?;
        self.send_quoted(&[body])?;
        self.send(b",")?;
        self.send_quoted(&[
            API_KEY_HEADER.as_bytes(),
            b": ",
            self.settings.api_key.as_bytes(),
        ])?;
        self.finish()?;

        let mut written = 0;
        let mut truncated = false;
        loop {
            match self.next_token()? {
                Token::Data(len) => {
                    for _ in 0..len {
                        let byte = self.read_byte()?;
                        if let Some(slot) = response.get_mut(written) {
                            *slot = byte;
                            written += 1;
                        } else {
                            truncated = true;
                        }
                    }
                }
                Token::Line(line) => {
                    if let Some(result) = terminal(&line) {
                        result?;
                        let mut reply = HttpReply::new(200, written);
                        reply.truncated = truncated;
                        return Ok(reply);
                    }
                }
            }
        }
    }

    /// Returns and clears the error swallowed by the last port call.
    pub fn take_error(&mut self) -> Option<ModemError> {
        self.last_error.take()
    }

    fn simple_command(&mut self, command: &[u8]) -> Result<(), ModemError> {
        self.begin(MODEM_TIMEOUT)?;
        self.send(command)?;
        self.finish()?;
        self.await_ok()
    }

    fn begin(&mut self, timeout: Duration) -> Result<(), ModemError> {
        self.budget_left = timeout;
        self.discard_pending()
    }

    /// Drops unsolicited output such as `WIFI GOT IP` or a late join reply.
    fn discard_pending(&mut self) -> Result<(), ModemError> {
        let mut scratch = [0u8; 32];
        while self.uart.read_ready().map_err(|_| ModemError::Uart)? {
            let count = self.uart.read(&mut scratch).map_err(|_| ModemError::Uart)?;
            if count == 0 {
                break;
            }
            self.charge(BYTE_TIME.saturating_mul(u32::try_from(count).unwrap_or(u32::MAX)))?;
        }
        Ok(())
    }

    /// Spends `cost` of the exchange budget; every received byte and idle
    /// poll is charged, so a stream that never terminates still times out.
    fn charge(&mut self, cost: Duration) -> Result<(), ModemError> {
        if self.budget_left.is_zero() {
            return Err(ModemError::Timeout);
        }
        self.budget_left = self.budget_left.saturating_sub(cost);
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> Result<(), ModemError> {
        self.uart.write_all(bytes).map_err(|_| ModemError::Uart)
    }

    /// Writes one quoted AT string parameter built from `parts`.
    fn send_quoted(&mut self, parts: &[&[u8]]) -> Result<(), ModemError> {
        self.send(b"\"")?;
        for part in parts {
            for &byte in *part {
                if matches!(byte, b'"' | b',' | b'\\') {
                    self.send(b"\\")?;
                }
                self.send(&[byte])?;
            }
        }
        self.send(b"\"")
    }

    fn finish(&mut self) -> Result<(), ModemError> {
        self.send(b"\r\n")?;
        self.uart.flush().map_err(|_| ModemError::Uart)
    }

    fn await_ok(&mut self) -> Result<(), ModemError> {
        loop {
            match self.next_token()? {
                Token::Line(line) => {
                    if let Some(result) = terminal(&line) {
                        return result;
                    }
                }
                Token::Data(len) => self.skip(len)?,
            }
        }
    }

    fn next_token(&mut self) -> Result<Token, ModemError> {
        let mut line = Line::new();
        loop {
            let byte = self.read_byte()?;
            match byte {
                b'\n' => {
                    if line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    return Ok(Token::Line(line));
                }
                b',' if line.starts_with(HTTP_DATA_PREFIX) => {
                    if let Some(len) = parse_decimal(&line[HTTP_DATA_PREFIX.len()..]) {
                        return Ok(Token::Data(len));
                    }
                    let _ = line.push(byte);
                }
                // Overlong lines are truncated; only their prefix matters.
                _ => {
                    let _ = line.push(byte);
                }
            }
        }
    }

    fn skip(&mut self, len: usize) -> Result<(), ModemError> {
        for _ in 0..len {
            self.read_byte()?;
        }
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, ModemError> {
        loop {
            if self.uart.read_ready().map_err(|_| ModemError::Uart)? {
                let mut byte = [0u8; 1];
                if self.uart.read(&mut byte).map_err(|_| ModemError::Uart)? == 1 {
                    self.charge(BYTE_TIME)?;
                    return Ok(byte[0]);
                }
            }
            self.charge(POLL_INTERVAL)?;
            self.pause.pause(POLL_INTERVAL);
        }
    }
}

impl<U, P> LinkControl for Modem<U, P>
where
    U: Read + ReadReady + Write,
    P: Pause,
{
    fn poll(&mut self) -> LinkState {
        match self.query_state() {
            Ok(state) => state,
            // Busy means a join is still running.
            Err(ModemError::Busy) => LinkState::Connecting,
            Err(error) => {
                self.last_error = Some(error);
                LinkState::Down
            }
        }
    }

    fn request_connect(&mut self) {
        if let Err(error) = self.join() {
            self.last_error = Some(error);
        }
    }
}

impl<U, P> ReportTransport for Modem<U, P>
where
    U: Read + ReadReady + Write,
    P: Pause,
{
    type Error = ModemError;

    fn post(&mut self, body: &[u8], response: &mut [u8]) -> Result<HttpReply, ModemError> {
        self.http_post(body, response).inspect_err(|error| {
            self.last_error = Some(*error);
        })
    }
}

fn terminal(line: &[u8]) -> Option<Result<(), ModemError>> {
    match line {
        b"OK" => Some(Ok(())),
        b"ERROR" | b"FAIL" | b"SEND FAIL" => Some(Err(ModemError::Failed)),
        _ if line.starts_with(b"busy") => Some(Err(ModemError::Busy)),
        _ => None,
    }
}

/// Maps the first field of `+CWSTATE:` to a link state.
fn parse_link_state(fields: &[u8]) -> Option<LinkState> {
    match fields.first()? {
        b'0' | b'4' => Some(LinkState::Down),
        b'1' | b'3' => Some(LinkState::Connecting),
        b'2' => Some(LinkState::Up),
        _ => None,
    }
}

fn parse_decimal(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() {
        return None;
    }
    digits.iter().try_fold(0usize, |value, &digit| {
        if digit.is_ascii_digit() {
            value.checked_mul(10)?.checked_add(usize::from(digit - b'0'))
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::vec::Vec as StdVec;

    /// UART double that queues one canned reply per command line written.
    struct ScriptedUart {
        replies: VecDeque<&'static [u8]>,
        rx: VecDeque<u8>,
        tx: StdVec<u8>,
    }

    impl ScriptedUart {
        fn new(replies: &[&'static [u8]]) -> Self {
            Self {
                replies: replies.iter().copied().collect(),
                rx: VecDeque::new(),
                tx: StdVec::new(),
            }
        }
    }

    impl embedded_io::ErrorType for ScriptedUart {
        type Error = core::convert::Infallible;
    }

    impl Read for ScriptedUart {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            let mut count = 0;
            while count < buf.len() {
                match self.rx.pop_front() {
                    Some(byte) => {
                        buf[count] = byte;
                        count += 1;
                    }
                    None => break,
                }
            }
            Ok(count)
        }
    }

    impl ReadReady for ScriptedUart {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(!self.rx.is_empty())
        }
    }

    impl Write for ScriptedUart {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            for &byte in buf {
                self.tx.push(byte);
                if byte == b'\n'
                    && let Some(reply) = self.replies.pop_front()
                {
                    self.rx.extend(reply.iter().copied());
                }
            }
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingPause {
        pauses: u32,
    }

    impl Pause for CountingPause {
        fn pause(&mut self, _duration: Duration) {
            self.pauses += 1;
        }
    }

    const SETTINGS: NetworkSettings = NetworkSettings {
        ssid: "lab",
        password: "pw,1",
        hostname: "pc-sentinel",
        api_url: "https://x.test/r",
        api_key: "k",
    };

    fn modem(replies: &[&'static [u8]]) -> Modem<ScriptedUart, CountingPause> {
        Modem::new(
            ScriptedUart::new(replies),
            CountingPause::default(),
            SETTINGS,
        )
    }

    fn sent(modem: &Modem<ScriptedUart, CountingPause>) -> &str {
        core::str::from_utf8(&modem.uart.tx).expect("ascii commands")
    }

    #[test]
    fn configure_sets_station_mode_and_hostname() {
        let mut modem = modem(&[b"OK\r\n", b"ATE0\r\nOK\r\n", b"OK\r\n", b"OK\r\n"]);
        modem.configure().expect("configure");
        assert_eq!(
            sent(&modem),
            "AT\r\nATE0\r\nAT+CWMODE=1\r\nAT+CWHOSTNAME=\"pc-sentinel\"\r\n"
        );
    }

    #[test]
    fn join_escapes_credentials_and_does_not_wait() {
        let mut modem = modem(&[]);
        modem.join().expect("join is fire-and-forget");
        assert_eq!(sent(&modem), "AT+CWJAP=\"lab\",\"pw\\,1\"\r\n");
        assert_eq!(modem.pause.pauses, 0);
    }

    #[test]
    fn state_query_maps_station_states() {
        let mut modem = modem(&[
            b"+CWSTATE:2,\"lab\"\r\n\r\nOK\r\n",
            b"+CWSTATE:1,\"lab\"\r\nOK\r\n",
            b"+CWSTATE:0,\"\"\r\nOK\r\n",
            b"busy p...\r\n",
        ]);
        assert_eq!(modem.poll(), LinkState::Up);
        assert_eq!(modem.poll(), LinkState::Connecting);
        assert_eq!(modem.poll(), LinkState::Down);
        assert_eq!(modem.poll(), LinkState::Connecting);
        assert_eq!(modem.take_error(), None);
    }

    #[test]
    fn silent_modem_times_out_within_budget() {
        let mut modem = modem(&[b""]);
        assert_eq!(modem.poll(), LinkState::Down);
        assert_eq!(modem.take_error(), Some(ModemError::Timeout));
        let budget = MODEM_TIMEOUT.as_micros() / POLL_INTERVAL.as_micros();
        assert_eq!(u128::from(modem.pause.pauses), budget);
    }

    /// UART that never stops producing unterminated lines.
    struct ChattyUart {
        tx: StdVec<u8>,
    }

    impl embedded_io::ErrorType for ChattyUart {
        type Error = core::convert::Infallible;
    }

    impl Read for ChattyUart {
        fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
            buf.fill(b'.');
            if let Some(last) = buf.last_mut() {
                *last = b'\n';
            }
            Ok(buf.len())
        }
    }

    impl ReadReady for ChattyUart {
        fn read_ready(&mut self) -> Result<bool, Self::Error> {
            Ok(true)
        }
    }

    impl Write for ChattyUart {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
            self.tx.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Self::Error> {
            Ok(())
        }
    }

    #[test]
    fn endless_output_still_times_out() {
        let mut modem = Modem::new(
            ChattyUart { tx: StdVec::new() },
            CountingPause::default(),
            SETTINGS,
        );
        assert_eq!(modem.poll(), LinkState::Down);
        assert_eq!(modem.take_error(), Some(ModemError::Timeout));

        let mut response = [0u8; 8];
        assert_eq!(
            modem.http_post(b"{}", &mut response),
            Err(ModemError::Timeout)
        );
        assert_eq!(modem.pause.pauses, 0);
    }

    #[test]
    fn post_escapes_body_and_collects_payload() {
        let mut modem = modem(&[b"+HTTPCLIENT:18,{\"turnOffPC\":true}\r\nOK\r\n"]);
        let mut response = [0u8; 64];
        let reply = modem
            .post(br#"{"a":1,"b":2}"#, &mut response)
            .expect("post");

        assert_eq!(
            sent(&modem),
            "AT+HTTPCLIENT=3,1,\"https://x.test/r\",,,2,\"{\\\"a\\\":1\\,\\\"b\\\":2}\",\"X-DARAK-API-Key: k\"\r\n"
        );
        assert_eq!(reply.status, 200);
        assert!(!reply.truncated);
        assert_eq!(&response[..reply.body_len], br#"{"turnOffPC":true}"#);
    }

    #[test]
    fn payload_may_span_lines_and_chunks() {
        let mut modem = modem(&[b"+HTTPCLIENT:3,{\r\n\r\n+HTTPCLIENT:1,}\r\nOK\r\n"]);
        let mut response = [0u8; 8];
        let reply = modem.http_post(b"{}", &mut response).expect("post");
        assert_eq!(&response[..reply.body_len], b"{\r\n}");
    }

    #[test]
    fn oversized_payload_is_flagged() {
        let mut modem = modem(&[b"+HTTPCLIENT:6,abcdef\r\nOK\r\n"]);
        let mut response = [0u8; 4];
        let reply = modem.http_post(b"{}", &mut response).expect("post");
        assert!(reply.truncated);
        assert_eq!(reply.body_len, 4);
    }

    #[test]
    fn error_reply_fails_the_post() {
        let mut modem = modem(&[b"ERROR\r\n"]);
        let mut response = [0u8; 8];
        assert_eq!(modem.post(b"{}", &mut response), Err(ModemError::Failed));
        assert_eq!(modem.take_error(), Some(ModemError::Failed));
    }

    #[test]
    fn decimal_lengths_reject_garbage() {
        assert_eq!(parse_decimal(b"128"), Some(128));
        assert_eq!(parse_decimal(b""), None);
        assert_eq!(parse_decimal(b"1a"), None);
    }
}
