//! Authentication commands

use anyhow::{Context, Result};

use super::App;
use crate::output::{print_info, print_success, print_warning};

/// Log in interactively unless a token is already stored
pub async fn ensure_logged_in(app: &App) -> Result<()> {
    if app.auth.context().is_authenticated() {
        return Ok(());
    }
    print_warning("Not authenticated.");
    login_command(app).await
}

/// `sshbridge login`
pub async fn login_command(app: &App) -> Result<()> {
    print_info("SSHBridge Authentication");
    app.auth.login_interactive().await.context("Login failed")?;
    print_success("Login Successful!");
    Ok(())
}

/// `sshbridge logout`; forgets the token but keeps the username
pub fn logout_command(app: &App) -> Result<()> {
    app.auth.logout().context("Failed to clear token")?;
    print_success("Logged out successfully.");
    Ok(())
}

/// `sshbridge change-password`
pub async fn change_password_command(app: &App) -> Result<()> {
    ensure_logged_in(app).await?;
    print_info("SSHBridge Change Password");

    let prompter = app.auth.prompter();
    let old = prompter.password("Current Password:")?;
    let new = prompter.password("New Password:")?;
    let confirm = prompter.password("Confirm New Password:")?;
    if new != confirm {
        anyhow::bail!("Passwords do not match");
    }

    app.auth
        .change_password(&old, &new)
        .await
        .context("Failed to change password")?;
    print_success("Password changed successfully!");
    Ok(())
}

/// `sshbridge whoami`
pub async fn whoami_command(app: &App) -> Result<()> {
    let context = app.auth.context();
    let Some(username) = context.username() else {
        print_warning("Not logged in.");
        return Ok(());
    };

    if !context.is_authenticated() {
        println!("{} (logged out)", username);
        return Ok(());
    }

    match app.auth.current_user().await {
        Ok(profile) => {
            println!("{}", profile.username.as_deref().unwrap_or(&username));
            if let Some(email) = profile.email {
                println!("  Email: {}", email);
            }
            if let Some(role) = profile.role {
                println!("  Role:  {}", role);
            }
        }
        Err(e) => {
            println!("{}", username);
            print_warning(&format!("Could not fetch profile: {}", e));
        }
    }
    Ok(())
}
