use std::io::Read;

use anyhow::{Context, Result, bail};

pub const SERVER_ENV: &str = "PCOIP_LS_SERVER";
pub const USERNAME_ENV: &str = "PCOIP_LS_USERNAME";
pub const PASSWORD_ENV: &str = "PCOIP_LS_PASSWORD";

/// Everything needed to construct a client session.
#[derive(Debug)]
pub struct Login {
    pub server: String,
    pub username: String,
    pub password: String,
}

/// Resolve server, username and password: CLI flags take precedence
/// over env vars. Pass `Some("-")` as the password to read it from
/// stdin.
pub fn resolve_login(
    server: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
) -> Result<Login> {
    resolve_login_with(server, username, password, |k| std::env::var(k), std::io::stdin())
}

fn resolve_login_with(
    server: Option<&str>,
    username: Option<&str>,
    password: Option<&str>,
    env_var: impl Fn(&str) -> Result<String, std::env::VarError>,
    stdin: impl Read,
) -> Result<Login> {
    let server = resolve_field(server, "--server", SERVER_ENV, &env_var)?;
    let username = resolve_field(username, "--username", USERNAME_ENV, &env_var)?;
    let password = match password {
        Some("-") => read_password_from_reader(stdin)?,
        // Passwords are taken verbatim; a leading or trailing space
        // may be intentional.
        Some(value) => {
            anyhow::ensure!(!value.is_empty(), "--password value must not be empty");
            value.to_string()
        }
        None => match env_var(PASSWORD_ENV) {
            Ok(value) if !value.is_empty() => value,
            _ => bail!("missing password; pass --password or set {PASSWORD_ENV}"),
        },
    };
    Ok(Login {
        server,
        username,
        password,
    })
}

fn resolve_field(
    flag: Option<&str>,
    flag_name: &str,
    env_key: &str,
    env_var: &impl Fn(&str) -> Result<String, std::env::VarError>,
) -> Result<String> {
    if let Some(value) = flag {
        let trimmed = value.trim();
        anyhow::ensure!(!trimmed.is_empty(), "{flag_name} value must not be empty");
        return Ok(trimmed.to_string());
    }
    if let Ok(value) = env_var(env_key)
        && !value.is_empty()
    {
        return Ok(value);
    }
    bail!("missing {flag_name}; pass the flag or set {env_key}")
}

fn read_password_from_reader(mut reader: impl Read) -> Result<String> {
    let mut buf = String::new();
    reader
        .read_to_string(&mut buf)
        .context("failed to read password from stdin")?;
    let trimmed = buf.trim().to_string();
    anyhow::ensure!(!trimmed.is_empty(), "stdin was empty; expected a password");
    Ok(trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Result<String, std::env::VarError> {
        Err(std::env::VarError::NotPresent)
    }

    fn env_with<'a>(
        vars: &'a [(&'a str, &'a str)],
    ) -> impl Fn(&str) -> Result<String, std::env::VarError> + 'a {
        move |key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.to_string())
                .ok_or(std::env::VarError::NotPresent)
        }
    }

    #[test]
    fn flags_take_precedence_over_env() {
        let env = env_with(&[
            ("PCOIP_LS_SERVER", "env-server"),
            ("PCOIP_LS_USERNAME", "env-user"),
            ("PCOIP_LS_PASSWORD", "env-pass"),
        ]);
        let login = resolve_login_with(
            Some("ACME123"),
            Some("admin"),
            Some("hunter2"),
            env,
            std::io::empty(),
        )
        .unwrap();
        assert_eq!(login.server, "ACME123");
        assert_eq!(login.username, "admin");
        assert_eq!(login.password, "hunter2");
    }

    #[test]
    fn falls_back_to_env_vars() {
        let env = env_with(&[
            ("PCOIP_LS_SERVER", "https://custom.host"),
            ("PCOIP_LS_USERNAME", "env-user"),
            ("PCOIP_LS_PASSWORD", "env-pass"),
        ]);
        let login = resolve_login_with(None, None, None, env, std::io::empty()).unwrap();
        assert_eq!(login.server, "https://custom.host");
        assert_eq!(login.username, "env-user");
        assert_eq!(login.password, "env-pass");
    }

    #[test]
    fn missing_server_errors() {
        let env = env_with(&[
            ("PCOIP_LS_USERNAME", "env-user"),
            ("PCOIP_LS_PASSWORD", "env-pass"),
        ]);
        let err = resolve_login_with(None, None, None, env, std::io::empty()).unwrap_err();
        assert!(err.to_string().contains("--server"));
        assert!(err.to_string().contains("PCOIP_LS_SERVER"));
    }

    #[test]
    fn missing_password_errors() {
        let env = env_with(&[
            ("PCOIP_LS_SERVER", "ACME123"),
            ("PCOIP_LS_USERNAME", "env-user"),
        ]);
        let err = resolve_login_with(None, None, None, env, std::io::empty()).unwrap_err();
        assert!(err.to_string().contains("PCOIP_LS_PASSWORD"));
    }

    #[test]
    fn empty_env_vars_are_skipped() {
        let env = env_with(&[
            ("PCOIP_LS_SERVER", ""),
            ("PCOIP_LS_USERNAME", "env-user"),
            ("PCOIP_LS_PASSWORD", "env-pass"),
        ]);
        let err = resolve_login_with(None, None, None, env, std::io::empty()).unwrap_err();
        assert!(err.to_string().contains("--server"));
    }

    #[test]
    fn server_flag_trims_whitespace() {
        let login = resolve_login_with(
            Some("  ACME123 \n"),
            Some("admin"),
            Some("pw"),
            no_env,
            std::io::empty(),
        )
        .unwrap();
        assert_eq!(login.server, "ACME123");
    }

    #[test]
    fn password_flag_is_taken_verbatim() {
        let login = resolve_login_with(
            Some("ACME123"),
            Some("admin"),
            Some(" pw with spaces "),
            no_env,
            std::io::empty(),
        )
        .unwrap();
        assert_eq!(login.password, " pw with spaces ");
    }

    #[test]
    fn empty_password_flag_errors() {
        let err = resolve_login_with(
            Some("ACME123"),
            Some("admin"),
            Some(""),
            no_env,
            std::io::empty(),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must not be empty"));
    }

    #[test]
    fn password_dash_reads_stdin() {
        let input = b"  secret-from-pipe  \n";
        let login = resolve_login_with(
            Some("ACME123"),
            Some("admin"),
            Some("-"),
            no_env,
            &input[..],
        )
        .unwrap();
        assert_eq!(login.password, "secret-from-pipe");
    }

    #[test]
    fn password_dash_empty_stdin_errors() {
        let input = b"   \n";
        let err = resolve_login_with(
            Some("ACME123"),
            Some("admin"),
            Some("-"),
            no_env,
            &input[..],
        )
        .unwrap_err();
        assert!(err.to_string().contains("stdin was empty"));
    }
}
