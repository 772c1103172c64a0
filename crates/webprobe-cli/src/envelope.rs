use serde::Serialize;
use webprobe_core::{Error, PageAnalysis};

pub(crate) const SCHEMA_VERSION: u64 = 1;

pub(crate) fn error_hint(code: &'static str) -> Option<&'static str> {
    match code {
        "invalid_url" => Some("Pass an absolute URL, e.g. https://example.com/page."),
        "scheme" => Some("Only http and https URLs can be analyzed."),
        "blocked_address" => Some(
            "The host is private, loopback or link-local. For local fixtures only, set WEBPROBE_ALLOW_PRIVATE_HOSTS=true.",
        ),
        "robots_disallowed" => {
            Some("The site's robots.txt disallows this path for the webprobe agent.")
        }
        "fetch_timeout" => Some(
            "The page did not finish loading in time. Raise --fetch-timeout-ms (WEBPROBE_FETCH_TIMEOUT_MS) or try later.",
        ),
        "size_limit" => Some(
            "The page is larger than the byte cap. Raise --max-bytes (WEBPROBE_MAX_BYTES) if this page is expected to be large.",
        ),
        "http_status" => Some("The server answered with a non-2xx status."),
        "fetch" => Some("The request failed at the transport level (DNS, connect, TLS or redirect)."),
        "parse" => Some("The response body did not contain a usable HTML document."),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub hint: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct AnalyzeEnvelope {
    pub schema_version: u64,
    pub kind: &'static str,
    pub ok: bool,
    pub elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<PageAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl AnalyzeEnvelope {
    pub(crate) fn from_result(r: Result<PageAnalysis, Error>, elapsed_ms: u64) -> Self {
        match r {
            Ok(a) => Self {
                schema_version: SCHEMA_VERSION,
                kind: "analyze",
                ok: true,
                elapsed_ms,
                analysis: Some(a),
                error: None,
            },
            Err(e) => {
                let code = e.code();
                Self {
                    schema_version: SCHEMA_VERSION,
                    kind: "analyze",
                    ok: false,
                    elapsed_ms,
                    analysis: None,
                    error: Some(ErrorBody {
                        code,
                        message: e.to_string(),
                        hint: error_hint(code),
                    }),
                }
            }
        }
    }
}
