//! Diagnostic text for a completed exchange

use std::borrow::Cow;
use std::fmt::Write as _;

use crate::config::RecorderConfig;
use crate::exchange::Exchange;

/// Suffix appended to bodies cut by `max_body_chars`
pub const TRUNCATION_MARKER: &str = "…";

/// Build the diagnostic text for an exchange
///
/// Layout:
/// 1. `HTTP {method} - {status}`
/// 2. `Retries: {n}` when the exchange was retried
/// 3. the URL followed by a blank line
/// 4. `Request:` and `Response:` sections for non-blank bodies
/// 5. `Message:` and `Stack trace:` for failed exchanges
///
/// Bodies are decoded lossily so malformed UTF-8 never fails the call.
#[must_use]
pub fn build_diagnostic_text(exchange: &Exchange) -> String {
    build_diagnostic_text_with(exchange, &RecorderConfig::default())
}

/// Build the diagnostic text honoring the body capture settings
#[must_use]
pub fn build_diagnostic_text_with(exchange: &Exchange, config: &RecorderConfig) -> String {
    let mut text = String::new();

    // HTTP GET - 200
    let _ = writeln!(
        text,
        "HTTP {} - {}",
        exchange.request_method,
        exchange.status_code_or_zero()
    );

    if exchange.number_of_retries > 0 {
        let _ = writeln!(text, "Retries: {}", exchange.number_of_retries);
    }

    let _ = write!(text, "{}\n\n", exchange.request_url);

    if config.capture_request_body {
        if let Some(body) = exchange.request_body.as_deref() {
            append_body(&mut text, "Request", body, config.max_body_chars);
        }
    }

    if config.capture_response_body {
        if let Some(body) = exchange.response_body.as_deref() {
            append_body(&mut text, "Response", body, config.max_body_chars);
        }
    }

    if !exchange.success {
        let (message, stack_trace) = exchange
            .failure
            .as_ref()
            .map_or(("", None), |f| (f.message.as_str(), f.stack_trace.as_deref()));

        // No separator before "Stack trace:"; consumers match on this layout.
        let _ = write!(text, "\nMessage:\n{message}");
        if let Some(trace) = stack_trace.filter(|t| !is_blank(t)) {
            let _ = write!(text, "Stack trace:\n{trace}");
        }
    }

    text
}

fn append_body(text: &mut String, label: &str, body: &[u8], max_chars: Option<usize>) {
    let decoded = String::from_utf8_lossy(body);
    if is_blank(&decoded) {
        return;
    }

    let shown = match max_chars {
        Some(max) => truncate_chars(decoded, max),
        None => decoded,
    };
    let _ = write!(text, "{label}:\n{shown}\n\n");
}

fn truncate_chars(text: Cow<'_, str>, max: usize) -> Cow<'_, str> {
    let cut = text.char_indices().nth(max).map(|(index, _)| index);
    match cut {
        Some(cut) => Cow::Owned(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => text,
    }
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangeFailure;

    const URL: &str = "http://localhost:9200/_search";

    fn get_ok() -> Exchange {
        Exchange::new("GET", URL).with_status(200)
    }

    #[test]
    fn test_minimal_exchange() {
        assert_eq!(
            build_diagnostic_text(&get_ok()),
            "HTTP GET - 200\nhttp://localhost:9200/_search\n\n"
        );
    }

    #[test]
    fn test_retries_line() {
        let text = build_diagnostic_text(&get_ok().with_retries(2));
        assert!(text.starts_with("HTTP GET - 200\nRetries: 2\nhttp://localhost:9200/_search\n\n"));
    }

    #[test]
    fn test_unset_status_renders_zero() {
        let text = build_diagnostic_text(&Exchange::new("HEAD", URL));
        assert!(text.starts_with("HTTP HEAD - 0\n"));
    }

    #[test]
    fn test_request_body() {
        let exchange = get_ok().with_request_body(&b"{\"query\":{}}"[..]);
        let text = build_diagnostic_text(&exchange);
        assert!(text.contains("Request:\n{\"query\":{}}\n\n"));
    }

    #[test]
    fn test_blank_bodies_are_skipped() {
        let exchange = get_ok()
            .with_request_body(&b" \t\r\n "[..])
            .with_response_body(&b""[..]);
        let text = build_diagnostic_text(&exchange);
        assert!(!text.contains("Request:"));
        assert!(!text.contains("Response:"));
    }

    #[test]
    fn test_request_and_response_order() {
        let exchange = get_ok()
            .with_request_body(&b"{\"size\":1}"[..])
            .with_response_body(&b"{\"hits\":{}}"[..]);
        assert_eq!(
            build_diagnostic_text(&exchange),
            "HTTP GET - 200\nhttp://localhost:9200/_search\n\n\
             Request:\n{\"size\":1}\n\n\
             Response:\n{\"hits\":{}}\n\n"
        );
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let exchange = get_ok().with_response_body(vec![b'o', b'k', 0xff, 0xfe]);
        let text = build_diagnostic_text(&exchange);
        assert!(text.contains("Response:\nok\u{fffd}\u{fffd}\n\n"));
    }

    #[test]
    fn test_failure_without_stack_trace() {
        let exchange = Exchange::new("GET", URL).with_failure(ExchangeFailure {
            message: "timeout".to_string(),
            stack_trace: None,
        });
        let text = build_diagnostic_text(&exchange);
        assert!(text.ends_with("\nMessage:\ntimeout"));
        assert!(!text.contains("Stack trace:"));
    }

    #[test]
    fn test_failure_with_stack_trace_has_no_separator() {
        let exchange = get_ok().with_failure(ExchangeFailure {
            message: "boom".to_string(),
            stack_trace: Some("caused by: reset\n".to_string()),
        });
        assert_eq!(
            build_diagnostic_text(&exchange),
            "HTTP GET - 200\nhttp://localhost:9200/_search\n\n\nMessage:\nboomStack trace:\ncaused by: reset\n"
        );
    }

    #[test]
    fn test_blank_stack_trace_is_skipped() {
        let exchange = get_ok().with_failure(ExchangeFailure {
            message: "boom".to_string(),
            stack_trace: Some("   ".to_string()),
        });
        assert!(!build_diagnostic_text(&exchange).contains("Stack trace:"));
    }

    #[test]
    fn test_unsuccessful_without_detail() {
        let mut exchange = get_ok();
        exchange.success = false;
        assert!(build_diagnostic_text(&exchange).ends_with("\n\n\nMessage:\n"));
    }

    #[test]
    fn test_capture_flags() {
        let exchange = get_ok()
            .with_request_body(&b"req"[..])
            .with_response_body(&b"resp"[..]);
        let config = RecorderConfig {
            capture_request_body: false,
            ..RecorderConfig::default()
        };
        let text = build_diagnostic_text_with(&exchange, &config);
        assert!(!text.contains("Request:"));
        assert!(text.contains("Response:\nresp\n\n"));
    }

    #[test]
    fn test_max_body_chars() {
        let exchange = get_ok().with_response_body("héllo world".as_bytes().to_vec());
        let config = RecorderConfig {
            max_body_chars: Some(5),
            ..RecorderConfig::default()
        };
        let text = build_diagnostic_text_with(&exchange, &config);
        assert!(text.contains("Response:\nhéllo…\n\n"));

        let config = RecorderConfig {
            max_body_chars: Some(64),
            ..RecorderConfig::default()
        };
        let text = build_diagnostic_text_with(&exchange, &config);
        assert!(text.contains("Response:\nhéllo world\n\n"));
    }
}
