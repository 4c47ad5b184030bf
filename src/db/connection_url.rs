// =====================================================
// CONNECTION URL MODULE
// Builds and parses the per-engine connection strings
// =====================================================

use crate::db_types::{Credentials, EngineKind};

const MSSQL_URL_PREFIX: &str = "mssql:///?odbc_connect=";
const MYSQL_URL_PREFIX: &str = "mysql://";

/// Host, port, database and credentials recovered from a connection URL.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParts {
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ConnectionParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParts")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Form-style percent encoding: unreserved characters pass through, space
/// becomes `+`, every other byte becomes `%XX`.
pub fn quote_plus(value: &str) -> String {
    let mut result = String::with_capacity(value.len() * 3);
    for byte in value.bytes() {
        match byte {
            b'a'..=b'z' | b'A'..=b'Z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                result.push(byte as char)
            }
            b' ' => result.push('+'),
            _ => result.push_str(&format!("%{:02X}", byte)),
        }
    }
    result
}

pub fn unquote_plus(value: &str) -> Result<String, String> {
    let bytes = value.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut index = 0;
    while index < bytes.len() {
        match bytes[index] {
            b'+' => {
                decoded.push(b' ');
                index += 1;
            }
            b'%' => {
                let hex_digits = bytes
                    .get(index + 1..index + 3)
                    .ok_or_else(|| format!("Truncated percent escape at position {}", index))?;
                let text = std::str::from_utf8(hex_digits)
                    .map_err(|_| format!("Invalid percent escape at position {}", index))?;
                let byte = u8::from_str_radix(text, 16)
                    .map_err(|_| format!("Invalid percent escape '%{}'", text))?;
                decoded.push(byte);
                index += 3;
            }
            other => {
                decoded.push(other);
                index += 1;
            }
        }
    }
    String::from_utf8(decoded).map_err(|e| format!("Decoded value is not valid UTF-8: {}", e))
}

// --- Builders ---

pub fn mysql_url(credentials: &Credentials, host: &str, database: &str) -> String {
    format!(
        "{}{}:{}@{}/{}",
        MYSQL_URL_PREFIX,
        credentials.username,
        quote_plus(&credentials.password),
        host,
        database
    )
}

fn odbc_value(value: &str) -> String {
    if value.contains(';') || value.contains('}') || value.starts_with('{') {
        format!("{{{}}}", value.replace('}', "}}"))
    } else {
        value.to_string()
    }
}

pub fn odbc_connect_string(
    driver: &str,
    host: &str,
    database: &str,
    credentials: &Credentials,
) -> String {
    format!(
        "DRIVER={{{}}};SERVER={};DATABASE={};UID={};PWD={}",
        driver,
        odbc_value(host),
        odbc_value(database),
        odbc_value(&credentials.username),
        odbc_value(&credentials.password)
    )
}

pub fn mssql_url(driver: &str, host: &str, database: &str, credentials: &Credentials) -> String {
    format!(
        "{}{}",
        MSSQL_URL_PREFIX,
        quote_plus(&odbc_connect_string(driver, host, database, credentials))
    )
}

pub fn connection_url(
    engine: EngineKind,
    odbc_driver: &str,
    host: &str,
    database: &str,
    credentials: &Credentials,
) -> String {
    match engine {
        EngineKind::MySQL => mysql_url(credentials, host, database),
        EngineKind::MSSQL => mssql_url(odbc_driver, host, database, credentials),
    }
}

// --- Parsers ---

pub fn parse_mysql_url(url: &str) -> Result<ConnectionParts, String> {
    let rest = url
        .strip_prefix(MYSQL_URL_PREFIX)
        .ok_or_else(|| "MySQL connection URL must start with mysql://".to_string())?;
    let (user_info, location) = rest
        .rsplit_once('@')
        .ok_or_else(|| "MySQL connection URL has no credentials".to_string())?;
    let (username, encoded_password) = user_info.split_once(':').unwrap_or((user_info, ""));
    let (address, database) = location.split_once('/').unwrap_or((location, ""));
    let database = database.split('?').next().unwrap_or_default();
    let (host, port) = split_host_port(EngineKind::MySQL, address)?;

    Ok(ConnectionParts {
        host,
        port,
        database: database.to_string(),
        username: username.to_string(),
        password: unquote_plus(encoded_password)?,
    })
}

pub fn parse_mssql_url(url: &str) -> Result<ConnectionParts, String> {
    let encoded = url
        .strip_prefix(MSSQL_URL_PREFIX)
        .ok_or_else(|| "SQL Server connection URL must start with mssql:///?odbc_connect=".to_string())?;
    let odbc = unquote_plus(encoded)?;
    let pairs = parse_odbc_pairs(&odbc)?;

    let lookup = |keys: &[&str]| {
        pairs
            .iter()
            .find(|(key, _)| keys.contains(&key.as_str()))
            .map(|(_, value)| value.clone())
    };

    let server = lookup(&["SERVER", "ADDRESS", "ADDR"])
        .ok_or_else(|| "ODBC connection string has no SERVER".to_string())?;
    let (host, port) = split_host_port(EngineKind::MSSQL, &server)?;

    Ok(ConnectionParts {
        host,
        port,
        database: lookup(&["DATABASE", "INITIAL CATALOG"]).unwrap_or_default(),
        username: lookup(&["UID", "USER ID"]).unwrap_or_default(),
        password: lookup(&["PWD", "PASSWORD"]).unwrap_or_default(),
    })
}

/// Splits `KEY=value;KEY={braced;value}` into upper-cased keys and values.
pub fn parse_odbc_pairs(raw: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    let mut chars = raw.chars().peekable();

    while chars.peek().is_some() {
        let mut key = String::new();
        let mut found_separator = false;
        for c in chars.by_ref() {
            if c == '=' {
                found_separator = true;
                break;
            }
            key.push(c);
        }

        let key = key.trim().trim_start_matches(';').trim().to_ascii_uppercase();
        if !found_separator {
            if key.is_empty() {
                break;
            }
            return Err(format!("ODBC attribute '{}' has no value", key));
        }

        let mut value = String::new();
        if chars.peek() == Some(&'{') {
            chars.next();
            loop {
                match chars.next() {
                    Some('}') if chars.peek() == Some(&'}') => {
                        chars.next();
                        value.push('}');
                    }
                    Some('}') => break,
                    Some(c) => value.push(c),
                    None => return Err(format!("ODBC attribute '{}' has an unterminated value", key)),
                }
            }
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
            }
        } else {
            for c in chars.by_ref() {
                if c == ';' {
                    break;
                }
                value.push(c);
            }
        }

        pairs.push((key, value));
    }

    Ok(pairs)
}

/// MySQL uses `host:port`; SQL Server uses `host,port` with an optional
/// `tcp:` prefix.
pub fn split_host_port(engine: EngineKind, raw: &str) -> Result<(String, Option<u16>), String> {
    let trimmed = raw.trim();
    let (address, separator) = match engine {
        EngineKind::MySQL => (trimmed, ':'),
        EngineKind::MSSQL => (trimmed.strip_prefix("tcp:").unwrap_or(trimmed), ','),
    };

    let (host, port) = match address.rsplit_once(separator) {
        Some((host, port)) => {
            let port = port
                .trim()
                .parse::<u16>()
                .map_err(|e| format!("Invalid port '{}': {}", port.trim(), e))?;
            (host.trim(), Some(port))
        }
        None => (address, None),
    };

    if host.is_empty() {
        return Err("Connection URL has an empty host".to_string());
    }

    Ok((host.to_string(), port))
}

#[cfg(test)]
mod tests;
