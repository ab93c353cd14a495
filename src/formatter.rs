use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::FormatError;
use crate::exception::{ExceptionInfo, RequestContext};
use crate::record::{LogPayload, LogRecord};

/// Default template for plain log records.
pub const DEFAULT_MESSAGE_FORMAT: &str =
    "*%level_name%* (%channel%) [%date%]\n\n%message%\n\n%context%%extra%";

/// Default `strftime` pattern for `%date%`.
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";

/// Number of separator characters between records of a batch.
pub const SEPARATOR_WIDTH: usize = 15;

/// Characters of the stack trace kept in exception reports.
pub const TRACE_LIMIT: usize = 1000;

/// Context keys that route a record instead of describing it.
const ROUTING_KEYS: [&str; 2] = ["token", "chat_id"];

static ANGLE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<([^<]+)>").expect("valid regex"));

static STACK_TRACE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^Stack trace:\n((?:^#\d.*\n?)*)$").expect("valid regex"));

static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[A-Za-z][^<>]*>").expect("valid regex"));

/// Settings for [`ChatFormatter`], fixed at construction.
#[derive(Debug, Clone)]
pub struct FormatterConfig {
    /// Keep `*bold*`, backticks and `<code>` markers. When `false` they are
    /// stripped from plain log messages. Stripping is not limited to the
    /// template: `*` and backticks inside the message, context and extra
    /// text are removed too (`SELECT * FROM t` becomes `SELECT  FROM t`).
    pub use_rich_text: bool,
    /// Template with `%level_name%`, `%channel%`, `%date%`, `%message%`,
    /// `%context%` and `%extra%` placeholders.
    pub message_template: String,
    /// `strftime` pattern used for `%date%`.
    pub date_format: String,
    /// Repeated [`SEPARATOR_WIDTH`] times between records of a batch.
    pub separator: String,
    /// Tags rendered as `#tag`; empty means no tag line.
    pub tags: Vec<String>,
    /// Environment name shown in exception reports.
    pub environment: String,
}

impl Default for FormatterConfig {
    fn default() -> Self {
        Self {
            use_rich_text: true,
            message_template: DEFAULT_MESSAGE_FORMAT.to_string(),
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            separator: "-".to_string(),
            tags: Vec::new(),
            environment: "production".to_string(),
        }
    }
}

impl FormatterConfig {
    /// Set tags from a comma separated list such as `"billing,urgent"`.
    pub fn with_tags(mut self, tags: &str) -> Self {
        self.tags = parse_tags(tags);
        self
    }
}

/// Split a comma separated tag list, skipping empty entries.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns [`LogRecord`]s into chat message text.
///
/// Records carrying an exception get a field-by-field report; everything
/// else is rendered through the message template. No truncation happens
/// here, that is the handler's job.
#[derive(Debug, Clone, Default)]
pub struct ChatFormatter {
    config: FormatterConfig,
}

impl ChatFormatter {
    pub fn new(config: FormatterConfig) -> Self {
        Self { config }
    }

    /// Render a single record.
    ///
    /// Never fails: if the exception report cannot be completed, the part
    /// that was already rendered is returned.
    pub fn format(&self, record: &LogRecord) -> String {
        match &record.payload {
            LogPayload::Exception { exception, request } => {
                let mut message = String::new();
                if let Err(e) = self.write_exception(record, exception, request.as_ref(), &mut message) {
                    tracing::warn!(
                        target: "rocketchat_log_sink",
                        error = %e,
                        "exception report rendered partially"
                    );
                }
                message
            }
            LogPayload::Plain => self.format_log(record),
        }
    }

    /// Render several records into one message separated by a line of
    /// separator characters.
    pub fn format_batch(&self, records: &[LogRecord]) -> String {
        let separator = format!("\n{}\n", self.config.separator.repeat(SEPARATOR_WIDTH));
        let mut message = String::new();
        for record in records {
            if !message.is_empty() {
                message.push_str(&separator);
            }
            message.push_str(&self.format(record));
        }
        message
    }

    fn tag_line(&self) -> Option<String> {
        if self.config.tags.is_empty() {
            return None;
        }
        let tags: Vec<String> = self.config.tags.iter().map(|tag| format!("#{}", tag)).collect();
        Some(format!("*Tag:* {}", tags.join(" ")))
    }

    fn format_date(&self, timestamp: &DateTime<Utc>, pattern: &str) -> String {
        let mut out = String::new();
        // chrono reports unknown specifiers as a fmt error
        if write!(out, "{}", timestamp.format(pattern)).is_err() {
            return timestamp.to_rfc3339();
        }
        out
    }

    fn write_exception(
        &self,
        record: &LogRecord,
        exception: &ExceptionInfo,
        request: Option<&RequestContext>,
        out: &mut String,
    ) -> Result<(), FormatError> {
        fn line(out: &mut String, text: String) {
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(&text);
        }

        if let Some(severity) = exception.severity {
            line(out, format!("*Severity:* {}", severity.name()));
        }
        line(out, format!("*Time:* {}", self.format_date(&record.timestamp, "%Y-%m-%d %H:%M:%S")));
        line(out, format!("*On:* {}", self.config.environment));
        line(out, format!("*Message:* {}", exception.message));
        line(out, format!("*Exception:* {}", exception.type_name));
        line(out, format!("*Code:* {}", exception.effective_code()));
        if let Some(tags) = self.tag_line() {
            line(out, tags);
        }
        line(out, format!("*File:* {}", exception.file));
        line(out, format!("*Line:* {}", exception.line));

        if let Some(request) = request {
            line(out, format!("*Url:* {}", display_url(&request.url)));
            line(out, format!("*Ip:* {}", request.client_ip));

            if let Some(user) = &request.user {
                let mut text = format!("*User:* {}", user.id);
                if let Some(name) = user.name.as_deref().filter(|n| !n.is_empty()) {
                    text.push_str(&format!(" / *Name:* {}", name));
                }
                line(out, text);
            }

            if let Some(referer) = request.referer.as_deref().filter(|r| !r.is_empty()) {
                line(out, format!("*Referer:* {}", referer));
            }

            if let Some(method) = request.method.as_deref().filter(|m| !m.is_empty()) {
                let ajax = if request.is_ajax { " *(Ajax)*" } else { "" };
                line(out, format!("*Request Method:* {}{}", method, ajax));
            }

            let inputs = serde_json::to_string(&request.masked_params())?
                .replace(['\n', ' '], "")
                .replace('<', "&lt;")
                .replace('>', "&gt;");
            line(out, format!("*Request Inputs:* `{}`", inputs));
        }

        let trace: String = exception.trace.chars().take(TRACE_LIMIT).collect();
        out.push_str(&format!("\n\n*Trace:*\n{} ...", trace));

        Ok(())
    }

    fn format_log(&self, record: &LogRecord) -> String {
        let message = if record.message.contains("Stack trace") {
            highlight_stack_trace(&record.message)
        } else {
            record.message.clone()
        };

        let context: BTreeMap<&String, &Value> = record
            .context
            .iter()
            .filter(|(key, _)| !ROUTING_KEYS.contains(&key.as_str()))
            .collect();
        let extra: BTreeMap<&String, &Value> = record.extra.iter().collect();

        let mut out = self
            .config
            .message_template
            .replace("%message%", &message)
            .replace("%context%", &section("Context", &context))
            .replace("%extra%", &section("Extra", &extra))
            .replace("%level_name%", record.level.name())
            .replace("%channel%", &record.channel)
            .replace("%date%", &self.format_date(&record.timestamp, &self.config.date_format));

        if let Some(tags) = self.tag_line() {
            out.push_str(&tags);
            out.push('\n');
        }

        if !self.config.use_rich_text {
            out = strip_markup(&out);
        }

        out
    }
}

/// Request URL without scheme, form-decoded. Invalid UTF-8 escapes are
/// replaced rather than rejected.
fn display_url(url: &str) -> String {
    let url = url.replace("http://", "").replace("https://", "").replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(url.as_bytes())).into_owned()
}

/// `*Name:* {json}` followed by a newline, or nothing for an empty map.
fn section(name: &str, values: &BTreeMap<&String, &Value>) -> String {
    if values.is_empty() {
        return String::new();
    }
    let json = serde_json::to_string(values).unwrap_or_else(|_| "{}".to_string());
    format!("*{}:* {}\n", name, json)
}

/// Escape `<...>` and put the `Stack trace:` block of a message in a code
/// block.
fn highlight_stack_trace(message: &str) -> String {
    let escaped = ANGLE_TAG.replace_all(message, "&lt;${1}&gt;");
    STACK_TRACE_BLOCK
        .replace_all(&escaped, "\n*Stack trace:*\n<code>${1}</code>")
        .into_owned()
}

/// Remove HTML tags and the `*` / backtick markers.
fn strip_markup(text: &str) -> String {
    HTML_TAG.replace_all(text, "").replace(['*', '`'], "")
}
