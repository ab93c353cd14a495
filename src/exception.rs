use std::collections::BTreeMap;
use std::error::Error;
use std::panic::Location;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request parameter names whose values never reach the chat message.
pub const SENSITIVE_FIELDS: [&str; 8] = [
    "username",
    "password",
    "auth",
    "token",
    "key",
    "credential",
    "secret",
    "password_confirmation",
];

/// Replacement written in place of a sensitive value.
pub const MASK: &str = "*";

/// Error severity attached to some exceptions, identified by the classic
/// `E_*` bitmask codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    Error,
    Warning,
    Parse,
    Notice,
    CoreError,
    CoreWarning,
    CompileError,
    CompileWarning,
    UserError,
    UserWarning,
    UserNotice,
    Strict,
    RecoverableError,
    Deprecated,
    UserDeprecated,
}

impl Severity {
    /// Resolve a severity bitmask code; unknown codes yield `None`.
    pub fn from_code(code: u32) -> Option<Self> {
        let severity = match code {
            1 => Severity::Error,
            2 => Severity::Warning,
            4 => Severity::Parse,
            8 => Severity::Notice,
            16 => Severity::CoreError,
            32 => Severity::CoreWarning,
            64 => Severity::CompileError,
            128 => Severity::CompileWarning,
            256 => Severity::UserError,
            512 => Severity::UserWarning,
            1024 => Severity::UserNotice,
            2048 => Severity::Strict,
            4096 => Severity::RecoverableError,
            8192 => Severity::Deprecated,
            16384 => Severity::UserDeprecated,
            _ => return None,
        };
        Some(severity)
    }

    pub fn name(self) -> &'static str {
        match self {
            Severity::Error => "ERROR",
            Severity::Warning => "WARNING",
            Severity::Parse => "PARSE",
            Severity::Notice => "NOTICE",
            Severity::CoreError => "CORE_ERROR",
            Severity::CoreWarning => "CORE_WARNING",
            Severity::CompileError => "COMPILE_ERROR",
            Severity::CompileWarning => "COMPILE_WARNING",
            Severity::UserError => "USER_ERROR",
            Severity::UserWarning => "USER_WARNING",
            Severity::UserNotice => "USER_NOTICE",
            Severity::Strict => "STRICT",
            Severity::RecoverableError => "RECOVERABLE_ERROR",
            Severity::Deprecated => "DEPRECATED",
            Severity::UserDeprecated => "USER_DEPRECATED",
        }
    }
}

/// Everything the exception report needs to know about a failure.
///
/// Optional capabilities (`status_code`, `severity`) are resolved when the
/// value is built, so the formatter only reads plain fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionInfo {
    pub message: String,
    pub type_name: String,
    pub code: i64,
    /// Framework status code; shown instead of `code` when present.
    pub status_code: Option<u16>,
    pub file: String,
    pub line: u32,
    pub trace: String,
    pub severity: Option<Severity>,
}

impl ExceptionInfo {
    pub fn new(type_name: impl Into<String>, message: impl Into<String>) -> Self {
        ExceptionInfo {
            message: message.into(),
            type_name: type_name.into(),
            code: 0,
            status_code: None,
            file: String::new(),
            line: 0,
            trace: String::new(),
            severity: None,
        }
    }

    /// Build a report from a Rust error value.
    ///
    /// The source chain becomes the trace (`#0 ..`, `#1 ..`) and the
    /// caller's location is used as file and line.
    #[track_caller]
    pub fn from_error<E: Error>(err: &E) -> Self {
        let location = Location::caller();

        let mut trace = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            trace.push(format!("#{} {}", trace.len(), cause));
            source = cause.source();
        }

        ExceptionInfo {
            file: location.file().to_string(),
            line: location.line(),
            trace: trace.join("\n"),
            ..ExceptionInfo::new(std::any::type_name::<E>(), err.to_string())
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn with_location(mut self, file: impl Into<String>, line: u32) -> Self {
        self.file = file.into();
        self.line = line;
        self
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = trace.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    /// Status code if the failure carries one, the raw error code otherwise.
    pub fn effective_code(&self) -> i64 {
        self.status_code.map(i64::from).unwrap_or(self.code)
    }
}

/// Authenticated user attached to a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Request data supplied by the web framework when an error is reported
/// while serving a request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    pub url: String,
    pub client_ip: String,
    pub user: Option<UserInfo>,
    pub referer: Option<String>,
    pub method: Option<String>,
    pub is_ajax: bool,
    pub params: BTreeMap<String, Value>,
}

impl RequestContext {
    /// Request parameters with every sensitive field replaced by [`MASK`].
    ///
    /// Matching is case-sensitive.
    pub fn masked_params(&self) -> BTreeMap<String, Value> {
        let (masked, mut data): (BTreeMap<_, _>, BTreeMap<_, _>) = self
            .params
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .partition(|(k, _)| SENSITIVE_FIELDS.contains(&k.as_str()));

        for key in masked.into_keys() {
            data.insert(key, Value::String(MASK.to_string()));
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, thiserror::Error)]
    #[error("disk unavailable")]
    struct DiskError;

    #[derive(Debug, thiserror::Error)]
    #[error("could not save invoice")]
    struct SaveError(#[source] DiskError);

    #[test]
    fn masks_only_sensitive_fields() {
        let mut request = RequestContext::default();
        request.params.insert("password".into(), json!("hunter2"));
        request.params.insert("token".into(), json!("abc"));
        request.params.insert("Password".into(), json!("kept"));
        request.params.insert("page".into(), json!(2));

        let masked = request.masked_params();
        assert_eq!(masked["password"], json!("*"));
        assert_eq!(masked["token"], json!("*"));
        assert_eq!(masked["Password"], json!("kept"));
        assert_eq!(masked["page"], json!(2));
        assert_eq!(masked.len(), 4);
    }

    #[test]
    fn status_code_wins_over_code() {
        let info = ExceptionInfo::new("NotFound", "missing").with_code(7);
        assert_eq!(info.effective_code(), 7);
        assert_eq!(info.with_status_code(404).effective_code(), 404);
    }

    #[test]
    fn from_error_walks_source_chain() {
        let info = ExceptionInfo::from_error(&SaveError(DiskError));
        assert_eq!(info.message, "could not save invoice");
        assert!(info.type_name.ends_with("SaveError"));
        assert_eq!(info.trace, "#0 disk unavailable");
        assert!(info.file.ends_with("exception.rs"));
        assert!(info.line > 0);
    }

    #[test]
    fn severity_codes() {
        assert_eq!(Severity::from_code(8).map(Severity::name), Some("NOTICE"));
        assert_eq!(Severity::from_code(16384).map(Severity::name), Some("USER_DEPRECATED"));
        assert_eq!(Severity::from_code(3), None);
    }
}
