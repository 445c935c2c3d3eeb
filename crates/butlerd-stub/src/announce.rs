//! Lines the stub prints on stdout

use std::io::{self, Write};

use diag_protocol::handshake::{LISTEN_NOTIFICATION, LOG_LINE};
use diag_protocol::{Secret, TransportKind};
use serde_json::json;

/// The listen notification for `address`, with or without a secret
pub fn listen_line(kind: TransportKind, address: &str, secret: Option<&Secret>) -> String {
    let mut line = json!({ "type": LISTEN_NOTIFICATION });
    line[kind.to_string()] = json!({ "address": address });
    if let Some(secret) = secret {
        line["secret"] = json!(secret.expose());
    }
    line.to_string()
}

/// A structured log line
pub fn log_line(level: &str, message: &str) -> String {
    json!({ "type": LOG_LINE, "level": level, "message": message }).to_string()
}

/// Print one line on stdout and flush so the reader sees it immediately
pub fn emit(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", line)?;
    stdout.flush()
}
