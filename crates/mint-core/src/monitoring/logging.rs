//! Structured logging with an optional JSON line format

use serde_json::{json, Map, Value};
use std::fmt;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::{
    fmt::{format::Writer, FmtContext, FormatEvent, FormatFields},
    registry::{LookupSpan, SpanRef},
    EnvFilter,
};

/// One JSON object per event: timestamp, level, target, message, fields, spans.
pub struct JsonFormatter;

impl<S, N> FormatEvent<S, N> for JsonFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(&self, ctx: &FmtContext<'_, S, N>, mut writer: Writer<'_>, event: &Event<'_>) -> fmt::Result {
        let metadata = event.metadata();

        let mut visitor = FieldCollector::default();
        event.record(&mut visitor);

        let line = json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "level": metadata.level().to_string(),
            "target": metadata.target(),
            "message": visitor.message,
            "fields": visitor.fields,
            "spans": span_names(ctx.lookup_current().as_ref()),
        });

        writeln!(writer, "{}", line)
    }
}

#[derive(Default)]
struct FieldCollector {
    message: Option<String>,
    fields: Map<String, Value>,
}

impl FieldCollector {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(text) => text,
                other => other.to_string(),
            });
        } else {
            self.fields.insert(field.name().to_string(), value);
        }
    }
}

impl Visit for FieldCollector {
    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.insert(field, json!(format!("{:?}", value)));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, json!(value));
    }
}

fn span_names<S>(span: Option<&SpanRef<'_, S>>) -> Vec<Value>
where
    S: for<'a> LookupSpan<'a>,
{
    span.map(|span| span.scope().map(|s| json!(s.metadata().name())).collect())
        .unwrap_or_default()
}

/// Install the global subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str, json_format: bool) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(log_level))?;

    let result = if json_format {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .event_format(JsonFormatter)
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).try_init()
    };

    result.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

#[macro_export]
macro_rules! log_preflight_result {
    ($account:expr, $passed:expr, $gas_limit:expr, $detail:expr) => {
        tracing::debug!(
            account = %$account,
            passed = $passed,
            gas_limit = $gas_limit,
            detail = %$detail,
            event_type = "preflight_result",
            "Preflight finished"
        );
    };
}

#[macro_export]
macro_rules! log_mint_broadcast {
    ($title:expr, $account:expr, $tx_hash:expr, $gas_limit:expr) => {
        tracing::info!(
            title = %$title,
            account = %$account,
            tx_hash = ?$tx_hash,
            gas_limit = $gas_limit,
            event_type = "mint_broadcast",
            "Mint transaction broadcast"
        );
    };
}

#[macro_export]
macro_rules! log_mint_confirmed {
    ($title:expr, $account:expr, $block_number:expr, $duration_ms:expr) => {
        tracing::info!(
            title = %$title,
            account = %$account,
            block_number = $block_number,
            duration_ms = $duration_ms,
            event_type = "mint_confirmed",
            "Mint confirmed"
        );
    };
}

#[macro_export]
macro_rules! log_mint_failed {
    ($title:expr, $account:expr, $error_type:expr, $reason:expr) => {
        tracing::warn!(
            title = %$title,
            account = %$account,
            error_type = $error_type,
            reason = %$reason,
            event_type = "mint_failed",
            "Mint attempt failed"
        );
    };
}

#[macro_export]
macro_rules! log_error {
    ($component:expr, $error_type:expr, $error_msg:expr) => {
        tracing::error!(
            component = $component,
            error_type = $error_type,
            error_message = %$error_msg,
            event_type = "error",
            "Component error"
        );
    };
}
