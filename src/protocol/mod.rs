//! Newline delimited JSON protocol spoken between the IDE and a debuggee side client.
//!
//! Every message is a single JSON object terminated by `\n`:
//!
//! ```text
//! {"jsonrpc":"2.0","method":"ResponseLine","procid":7,"params":{...}}
//! ```
//!
//! `procid` identifies the launch the message belongs to, `params` is always an object.

pub mod params;
pub mod transport;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::str::FromStr;
use strum_macros::{Display, EnumString, IntoStaticStr};

pub use transport::{LineReader, LineTransport, LineWriter};

const JSONRPC_VERSION: &str = "2.0";

/// Protocol method catalog. Variant names are the wire names unless overridden.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
pub enum Method {
    // handshake and lifecycle
    #[strum(serialize = "ProcIDInfo")]
    ProcIdInfo,
    RequestRun,
    ResponseExit,
    RequestShutdown,

    // stdio tunneling
    ResponseStdout,
    ResponseStderr,
    ResponseStdin,
    RequestStdin,

    // stepping
    RequestStep,
    RequestStepOver,
    RequestStepOut,
    RequestStepQuit,
    RequestContinue,

    // breakpoints
    RequestBreakpoint,
    RequestBreakpointEnable,
    RequestBreakpointIgnore,
    ClearBreak,
    #[strum(serialize = "ResponseBPConditionError")]
    ResponseBpConditionError,

    // watchpoints
    RequestWatch,
    RequestWatchEnable,
    RequestWatchIgnore,
    ClearWatch,
    ResponseWatchConditionError,

    // state queries
    RequestVariables,
    RequestVariable,
    RequestThreadList,
    RequestThreadSet,
    ResponseThreadList,
    ResponseThreadSet,
    ResponseVariables,
    ResponseVariable,

    // evaluation
    RequestEval,
    ResponseEval,
    RequestExec,
    ResponseExecOutput,
    ResponseExecError,

    // notifications
    DebugStartup,
    ResponseLine,
    ResponseStack,
    ResponseException,
    ResponseSyntaxError,
    ResponseSignal,

    // forking
    ResponseForkTo,
    RequestForkTo,

    // call tracing
    RequestCallTrace,
    ResponseCallTrace,
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("message is not a json object")]
    NotAnObject,
    #[error("message has no method")]
    MissingMethod,
    #[error("unknown method `{0}`")]
    UnknownMethod(String),
    #[error("invalid procid: {0}")]
    InvalidProcId(Value),
    #[error("params of `{0}` must be an object")]
    InvalidParams(Method),
    #[error("unexpected params of `{method}`: {source}")]
    Payload {
        method: Method,
        source: serde_json::Error,
    },
}

/// Single protocol message.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub method: Method,
    pub procid: Option<u64>,
    pub params: Value,
}

#[derive(Serialize)]
struct Envelope<'a> {
    jsonrpc: &'static str,
    method: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    procid: Option<u64>,
    params: &'a Value,
}

impl Message {
    /// Create a message with empty params.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            procid: None,
            params: Value::Object(Map::new()),
        }
    }

    /// Create a message with serialized params.
    ///
    /// # Arguments
    ///
    /// * `method`: message method
    /// * `params`: payload, must serialize into a json object
    pub fn with_params<P: Serialize>(method: Method, params: &P) -> Result<Self, ProtocolError> {
        let params = match serde_json::to_value(params)? {
            Value::Null => Value::Object(Map::new()),
            obj @ Value::Object(_) => obj,
            _ => return Err(ProtocolError::InvalidParams(method)),
        };
        Ok(Self {
            method,
            procid: None,
            params,
        })
    }

    pub fn with_procid(mut self, procid: u64) -> Self {
        self.procid = Some(procid);
        self
    }

    /// Deserialize message params into a typed payload.
    pub fn params<P: DeserializeOwned>(&self) -> Result<P, ProtocolError> {
        P::deserialize(&self.params).map_err(|source| ProtocolError::Payload {
            method: self.method,
            source,
        })
    }

    /// Serialize message into a single line, trailing `\n` included.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let envelope = Envelope {
            jsonrpc: JSONRPC_VERSION,
            method: self.method.into(),
            procid: self.procid,
            params: &self.params,
        };
        // json string escaping guarantees that there is no raw newline inside the payload
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        Ok(line)
    }

    /// Parse a single line (with or without trailing line break).
    pub fn decode(line: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(line.trim_end_matches(['\r', '\n']))?;
        let Value::Object(mut obj) = value else {
            return Err(ProtocolError::NotAnObject);
        };

        let method = match obj.remove("method") {
            Some(Value::String(method)) => method,
            _ => return Err(ProtocolError::MissingMethod),
        };
        let method =
            Method::from_str(&method).map_err(|_| ProtocolError::UnknownMethod(method))?;

        let procid = match obj.remove("procid") {
            None | Some(Value::Null) => None,
            Some(v) => Some(v.as_u64().ok_or(ProtocolError::InvalidProcId(v))?),
        };

        let params = match obj.remove("params") {
            None | Some(Value::Null) => Value::Object(Map::new()),
            Some(params @ Value::Object(_)) => params,
            Some(_) => return Err(ProtocolError::InvalidParams(method)),
        };

        Ok(Self {
            method,
            procid,
            params,
        })
    }
}
