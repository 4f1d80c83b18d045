use crate::config::ServerConfig;

/// Try to run a CLI command and capture stdout as a token
fn try_cli_token(command: &str) -> Option<String> {
    let output = std::process::Command::new("sh")
        .args(["-c", command])
        .output()
        .ok()?;

    if output.status.success() {
        let token = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !token.is_empty() {
            return Some(token);
        }
    }
    None
}

/// Stored token path: ~/.config/diffnav/tokens/{host}
fn token_path(host: &str) -> Option<std::path::PathBuf> {
    let config_dir = dirs::config_dir()?;
    Some(config_dir.join("diffnav").join("tokens").join(host))
}

fn load_stored_token(host: &str) -> Option<String> {
    let path = token_path(host)?;
    let token = std::fs::read_to_string(path).ok()?;
    let token = token.trim().to_string();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn save_token(host: &str, token: &str) -> std::io::Result<()> {
    if let Some(path) = token_path(host) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, token)?;
    }
    Ok(())
}

/// Find an API token for `host`, trying in order:
/// 1. Env var from config
/// 2. Stored token from ~/.config/diffnav/tokens/{host}
/// 3. CLI command from config (stored on success)
///
/// Review Board allows anonymous reads, so no token is not an error.
pub fn load_token(server: &ServerConfig, host: &str) -> Option<String> {
    if let Some(env_var) = &server.token_env {
        if let Ok(token) = std::env::var(env_var) {
            if !token.is_empty() {
                return Some(token);
            }
        }
    }

    if let Some(token) = load_stored_token(host) {
        return Some(token);
    }

    if let Some(cmd) = &server.token_command {
        if let Some(token) = try_cli_token(cmd) {
            if let Err(e) = save_token(host, &token) {
                tracing::warn!(error = %e, "could not save token");
            }
            return Some(token);
        }
        tracing::debug!(command = %cmd, "token command produced no token");
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_token_is_trimmed() {
        assert_eq!(try_cli_token("echo '  abc123  '"), Some("abc123".to_string()));
    }

    #[test]
    fn failing_or_empty_command_gives_nothing() {
        assert_eq!(try_cli_token("exit 1"), None);
        assert_eq!(try_cli_token("printf ''"), None);
    }

    #[test]
    fn env_var_wins() {
        std::env::set_var("DIFFNAV_TEST_TOKEN", "from-env");
        let server = ServerConfig {
            url: None,
            token_env: Some("DIFFNAV_TEST_TOKEN".to_string()),
            token_command: Some("echo from-command".to_string()),
        };
        assert_eq!(
            load_token(&server, "env-test.invalid"),
            Some("from-env".to_string())
        );
        std::env::remove_var("DIFFNAV_TEST_TOKEN");
    }
}
