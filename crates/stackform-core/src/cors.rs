//! CORS attachment
//!
//! Fixed contract: any ApiRoute with `cors: true` gets a synthetic OPTIONS
//! method backed by a mock integration whose response carries exactly the
//! four header values below, regardless of route content. This is pure
//! templating; no runtime decision is taken here.

use serde_json::{json, Value};

pub const ALLOW_HEADERS: &str = "Content-Type,X-Amz-Date,Authorization,X-Api-Key";
pub const ALLOW_ORIGIN: &str = "*";
pub const ALLOW_CREDENTIALS: &str = "false";
pub const ALLOW_METHODS: &str = "OPTIONS,GET,PUT,POST,DELETE";

/// The synthetic OPTIONS method record attached to a CORS-enabled route
pub fn options_method_record() -> Value {
    json!({
        "method": "OPTIONS",
        "integration": "mock",
        "response_headers": {
            "Access-Control-Allow-Headers": ALLOW_HEADERS,
            "Access-Control-Allow-Origin": ALLOW_ORIGIN,
            "Access-Control-Allow-Credentials": ALLOW_CREDENTIALS,
            "Access-Control-Allow-Methods": ALLOW_METHODS,
        }
    })
}
