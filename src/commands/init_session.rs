//! Session initialization command

use std::io::{self, Write};

use grammers_client::SignInError;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::session::{get_client_for_init, SessionLock};

fn prompt(message: &str) -> Result<String> {
    print!("{}", message);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

pub async fn run(config: &Config) -> Result<()> {
    let _lock = SessionLock::acquire(config.lock_file())?;
    let client = get_client_for_init(config).await?;

    if client.is_authorized().await? {
        println!(
            "Session {} is already authorized.",
            config.session_file().display()
        );
        return Ok(());
    }

    if config.phone.is_empty() {
        return Err(Error::ConfigError(
            "telegram.phone is not set (config.yml or TELEGRAM_PHONE)".to_string(),
        ));
    }

    println!("Requesting login code for {}...", config.phone);

    let token = client
        .request_login_code(&config.phone, &config.api_hash)
        .await
        .map_err(|e| Error::TelegramError(format!("Failed to request code: {}", e)))?;

    let code = prompt("Enter the code from Telegram: ")?;

    let user = match client.sign_in(&token, &code).await {
        Ok(user) => user,
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Two-step verification password (hint: {}): ", hint))?;
            client
                .check_password(password_token, password.trim())
                .await
                .map_err(|e| Error::TelegramError(format!("Failed to check password: {}", e)))?
        }
        Err(e) => return Err(Error::TelegramError(format!("Failed to sign in: {}", e))),
    };

    // Session is auto-saved by SqliteSession

    println!(
        r#"
Signed in as {} (@{})
Session file: {}

Keep this file private; it grants full access to the account.
"#,
        user.full_name(),
        user.username().unwrap_or("-"),
        config.session_file().display(),
    );

    Ok(())
}
