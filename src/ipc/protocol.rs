//! IPC protocol definitions for the application-facing socket
//!
//! Controlled applications forward their resource requests to the agent
//! as newline-delimited JSON over a Unix domain socket and receive either
//! a buffered response (body base64-encoded) or a passthrough verdict
//! telling them to handle the request natively.

use serde::{Deserialize, Serialize};

/// Protocol version for future compatibility
pub const PROTOCOL_VERSION: u32 = 1;

/// Socket path for IPC communication
pub const SOCKET_PATH: &str = "/tmp/offcache.sock";

/// Commands sent from the application to the agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Command {
    /// Forward one outgoing resource request
    #[serde(rename_all = "camelCase")]
    Fetch {
        /// Request method (e.g. "GET", "POST")
        method: String,
        /// Absolute request URL
        url: String,
        /// Request headers to forward on a network fetch
        #[serde(default)]
        headers: Vec<(String, String)>,
    },
    /// Get agent lifecycle state and cache counters
    GetStatus,
}

/// Responses sent from the agent to the application
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Response {
    /// A response was produced for the request
    #[serde(rename_all = "camelCase")]
    Fetched {
        /// HTTP status code
        status: u16,
        /// Response headers
        headers: Vec<(String, String)>,
        /// Response body, base64-encoded
        body: String,
        /// Where the response came from: "cache", "network" or "fallback"
        source: String,
    },
    /// The request is not eligible for interception; the application
    /// should issue it natively
    Passthrough,
    /// Error response (parse failure or failed network fetch)
    #[serde(rename_all = "camelCase")]
    Error {
        /// Error message
        error: String,
    },
    /// Status response with agent state
    #[serde(rename_all = "camelCase")]
    Status {
        /// Protocol version
        version: u32,
        /// Lifecycle state name
        state: String,
        /// Current cache generation identifier
        generation: String,
        /// Cache lookup hits since startup
        cache_hits: u64,
        /// Cache lookup misses since startup
        cache_misses: u64,
    },
}

/// Parse a JSON command from bytes
pub fn parse_command(data: &[u8]) -> Result<Command, serde_json::Error> {
    serde_json::from_slice(data)
}

/// Serialize a response to JSON bytes
pub fn serialize_response(response: &Response) -> Result<Vec<u8>, serde_json::Error> {
    let mut json = serde_json::to_vec(response)?;
    json.push(b'\n'); // Add newline delimiter
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_fetch_command() {
        let json = r#"{"type":"fetch","method":"GET","url":"https://example.com/app.js","headers":[["accept","*/*"]]}"#;
        let cmd = parse_command(json.as_bytes()).unwrap();
        match cmd {
            Command::Fetch {
                method,
                url,
                headers,
            } => {
                assert_eq!(method, "GET");
                assert_eq!(url, "https://example.com/app.js");
                assert_eq!(headers, vec![("accept".to_string(), "*/*".to_string())]);
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_parse_fetch_command_headers_default_empty() {
        let json = r#"{"type":"fetch","method":"GET","url":"https://example.com/"}"#;
        let cmd = parse_command(json.as_bytes()).unwrap();
        match cmd {
            Command::Fetch { headers, .. } => assert!(headers.is_empty()),
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_parse_get_status_command() {
        let json = r#"{"type":"getStatus"}"#;
        let cmd = parse_command(json.as_bytes()).unwrap();
        match cmd {
            Command::GetStatus => {}
            _ => panic!("Expected GetStatus command"),
        }
    }

    #[test]
    fn test_serialize_fetched_response() {
        let response = Response::Fetched {
            status: 200,
            headers: vec![("content-type".to_string(), "text/html".to_string())],
            body: "aGVsbG8=".to_string(),
            source: "cache".to_string(),
        };
        let json = serialize_response(&response).unwrap();
        let json_str = String::from_utf8(json).unwrap();
        assert!(json_str.contains("fetched"));
        assert!(json_str.contains("aGVsbG8="));
        assert!(json_str.ends_with('\n'));
    }

    #[test]
    fn test_serialize_passthrough_response() {
        let json = serialize_response(&Response::Passthrough).unwrap();
        let json_str = String::from_utf8(json).unwrap();
        assert!(json_str.contains("passthrough"));
    }

    #[test]
    fn test_serialize_status_response() {
        let response = Response::Status {
            version: PROTOCOL_VERSION,
            state: "activated".to_string(),
            generation: "app-cache-v1".to_string(),
            cache_hits: 10,
            cache_misses: 3,
        };
        let json = serialize_response(&response).unwrap();
        let json_str = String::from_utf8(json).unwrap();
        assert!(json_str.contains("status"));
        assert!(json_str.contains("app-cache-v1"));
        assert!(json_str.contains("cacheHits"));
    }
}
