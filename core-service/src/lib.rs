//! Host-facing decoder façade.
//!
//! [`DecoderService`] exposes the flat entry points a host binding calls:
//! every operation returns an integer-convertible [`ErrorCode`] (or a byte
//! count for [`DecoderService::send_data`]) instead of a `Result`, and at
//! most one [`Session`] exists at a time.
//!
//! ```ignore
//! use core_service::DecoderService;
//!
//! let mut service = DecoderService::new(engine);
//! service.init(file_size, 1);
//! service.send_data(&chunk);
//!
//! let mut params = [0i64; 7];
//! service.open(&mut params, callbacks);
//! while service.decode_one_packet() == ErrorCode::Success {}
//! ```

use core_decode::engine::DecodeEngine;
use core_decode::error::DecodeError;
use core_decode::store::StoreError;
use core_runtime::config::DecoderConfig;
use core_runtime::logging::{init_logging, LogVerbosity, LoggingConfig};
use tracing::{debug, info, instrument, warn};

pub use core_decode::{DecodeStatus, ErrorCode, HostCallbacks, OutputParams, Session};

/// `send_data` result when no session exists.
pub const SEND_NO_SESSION: i64 = -1;
/// `send_data` result for an empty buffer.
pub const SEND_EMPTY_INPUT: i64 = -2;
/// `send_data` result when the scratch file could not be written.
pub const SEND_IO_FAILURE: i64 = -3;

/// Owns the engine and at most one decoding session.
pub struct DecoderService {
    engine: Box<dyn DecodeEngine>,
    config: DecoderConfig,
    session: Option<Session>,
}

impl DecoderService {
    pub fn new(engine: impl DecodeEngine + 'static) -> Self {
        Self::with_config(engine, DecoderConfig::default())
    }

    pub fn with_config(engine: impl DecodeEngine + 'static, config: DecoderConfig) -> Self {
        Self {
            engine: Box::new(engine),
            config,
            session: None,
        }
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// Creates the session for a file of `file_size` bytes.
    ///
    /// `log_level` is the host verbosity (`0` none, `1` core, `2` core and
    /// engine). Logging is installed by the first call in the process; later
    /// levels are ignored.
    pub fn init(&mut self, file_size: i64, log_level: i32) -> ErrorCode {
        install_logging(log_level);

        if self.session.is_some() {
            warn!("Decoder already initialized");
            return ErrorCode::InvalidState;
        }

        match Session::init(file_size, self.config.clone()) {
            Ok(session) => {
                self.session = Some(session);
                ErrorCode::Success
            }
            Err(e) => report(e),
        }
    }

    /// Closes and removes the session. Succeeds when there is none.
    pub fn uninit(&mut self) -> ErrorCode {
        let Some(session) = self.session.take() else {
            return ErrorCode::Success;
        };
        match session.uninit() {
            Ok(()) => ErrorCode::Success,
            Err(e) => report(e),
        }
    }

    /// Opens the container and fills `out_params` with
    /// [`OutputParams::to_array`]. `out_params` is untouched on failure.
    #[instrument(skip_all)]
    pub fn open(&mut self, out_params: &mut [i64; 7], callbacks: HostCallbacks) -> ErrorCode {
        let Some(session) = self.session.as_mut() else {
            return ErrorCode::InvalidState;
        };
        match session.open(self.engine.as_ref(), callbacks) {
            Ok(params) => {
                *out_params = params.to_array();
                ErrorCode::Success
            }
            Err(e) => report(e),
        }
    }

    /// Releases the opened container. Succeeds when nothing is open.
    pub fn close(&mut self) -> ErrorCode {
        if let Some(session) = self.session.as_mut() {
            session.close();
        }
        ErrorCode::Success
    }

    /// Appends host bytes; returns the count kept or a negative code.
    pub fn send_data(&mut self, data: &[u8]) -> i64 {
        let Some(session) = self.session.as_mut() else {
            return SEND_NO_SESSION;
        };
        match session.send_data(data) {
            Ok(written) => written as i64,
            Err(DecodeError::InvalidParam(_)) | Err(DecodeError::Store(StoreError::EmptyWrite)) => {
                SEND_EMPTY_INPUT
            }
            Err(e) => {
                warn!(error = %e, "Failed to store host data");
                SEND_IO_FAILURE
            }
        }
    }

    /// Decodes one packet. [`ErrorCode::InvalidState`] also means "feed
    /// more data and call again".
    pub fn decode_one_packet(&mut self) -> ErrorCode {
        match self.session.as_mut() {
            Some(session) => status_code(session.decode_one_packet()),
            None => ErrorCode::InvalidState,
        }
    }

    /// Decodes until a frame reaches the host, skipping frames suppressed
    /// by accurate seek.
    pub fn decode_until_fresh(&mut self) -> ErrorCode {
        match self.session.as_mut() {
            Some(session) => status_code(session.decode_until_fresh()),
            None => ErrorCode::InvalidState,
        }
    }

    pub fn seek_to(&mut self, ms: i64, accurate: bool) -> ErrorCode {
        let Some(session) = self.session.as_mut() else {
            return ErrorCode::InvalidState;
        };
        match session.seek_to(ms, accurate) {
            Ok(()) => ErrorCode::Success,
            Err(e) => report(e),
        }
    }
}

fn install_logging(log_level: i32) {
    let config = LoggingConfig::default().with_verbosity(LogVerbosity::from_code(log_level));
    if let Err(e) = init_logging(config) {
        // Already installed by an earlier session or by the host
        debug!(error = %e, "Logging not reinitialized");
    } else {
        info!(log_level, "Logging initialized");
    }
}

fn status_code(result: core_decode::Result<DecodeStatus>) -> ErrorCode {
    match result {
        Ok(status) => status.code(),
        Err(e) => report(e),
    }
}

fn report(error: DecodeError) -> ErrorCode {
    if error.is_fatal() {
        warn!(error = %error, "Decoder call failed");
    } else {
        debug!(error = %error, "Decoder call rejected");
    }
    error.code()
}
