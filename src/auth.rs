//! Credential verification against a CSV user list. Fetching that list from
//! the remote sheet and posting password changes are the shell's job; the
//! core only parses, verifies, and keeps the opaque session in the workspace
//! store.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub usuario: String,
    #[serde(default)]
    pub correo: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    UserNotFound,
    WrongPassword,
}

impl AuthError {
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "user_not_found",
            AuthError::WrongPassword => "wrong_password",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AuthError::UserNotFound => "user not found in credential list",
            AuthError::WrongPassword => "wrong password",
        }
    }
}

#[derive(Debug, Clone)]
pub struct CredentialRecord {
    pub usuario: String,
    pub contrasena: String,
    pub correo: String,
}

fn header_position(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers.iter().position(|h| {
        let h = h.trim().to_lowercase();
        names.iter().any(|n| h == *n)
    })
}

/// Parses the credential sheet. The expected headers are `usuario`,
/// `contraseña` and `correo`; when a header is missing the column falls back
/// to its conventional position (0, 1, 2). Short rows are tolerated.
pub fn parse_credential_list(text: &str) -> anyhow::Result<Vec<CredentialRecord>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let user_col = header_position(&headers, &["usuario"]).unwrap_or(0);
    let pass_col = header_position(&headers, &["contraseña", "contrasena"]).unwrap_or(1);
    let mail_col = header_position(&headers, &["correo"]).unwrap_or(2);

    let mut records = Vec::new();
    for row in reader.records() {
        let row = row?;
        let field = |i: usize| row.get(i).unwrap_or("").to_string();
        records.push(CredentialRecord {
            usuario: field(user_col),
            contrasena: field(pass_col),
            correo: field(mail_col),
        });
    }
    Ok(records)
}

/// User lookup is case-insensitive; the password comparison is exact.
pub fn verify_credentials(
    records: &[CredentialRecord],
    usuario: &str,
    password: &str,
) -> Result<AuthSession, AuthError> {
    let wanted = usuario.to_lowercase();
    let found = records
        .iter()
        .find(|r| r.usuario.to_lowercase() == wanted)
        .ok_or(AuthError::UserNotFound)?;
    if found.contrasena != password {
        return Err(AuthError::WrongPassword);
    }
    Ok(AuthSession {
        usuario: found.usuario.clone(),
        correo: found.correo.clone(),
    })
}
