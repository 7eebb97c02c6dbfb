use crate::constants::*;

pub fn validate_campaign_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".into());
    }
    if trimmed.chars().count() > MAX_CAMPAIGN_NAME_LENGTH {
        return Err(format!(
            "Name must be at most {} characters",
            MAX_CAMPAIGN_NAME_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_description(description: &str) -> Result<(), String> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(format!(
            "Description must be at most {} characters",
            MAX_DESCRIPTION_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    let email = email.trim();
    let (local, domain) = match email.split_once('@') {
        Some(parts) => parts,
        None => return Err("Invalid email format".into()),
    };
    if local.is_empty()
        || domain.contains('@')
        || email.chars().any(char::is_whitespace)
    {
        return Err("Invalid email format".into());
    }
    // Domain needs a dot with something on both sides
    match domain.rsplit_once('.') {
        Some((host, tld)) if !host.is_empty() && !tld.is_empty() => Ok(()),
        _ => Err("Invalid email format".into()),
    }
}

pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_theme(theme: &str) -> Result<(), String> {
    if THEMES.contains(&theme) {
        Ok(())
    } else {
        Err("Invalid theme".into())
    }
}

pub fn validate_campaign_role(role: &str) -> Result<(), String> {
    match role {
        ROLE_GM | ROLE_PLAYER => Ok(()),
        _ => Err("Role must be 'GM' or 'PLAYER'".into()),
    }
}

pub fn validate_user_role(role: &str) -> Result<(), String> {
    match role {
        USER_ROLE_ADMIN | USER_ROLE_USER => Ok(()),
        _ => Err("Invalid request".into()),
    }
}

pub fn validate_note_title(title: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".into());
    }
    if title.chars().count() > MAX_NOTE_TITLE_LENGTH {
        return Err(format!(
            "Title must be at most {} characters",
            MAX_NOTE_TITLE_LENGTH
        ));
    }
    Ok(())
}

pub fn validate_chat_message(content: &str) -> Result<(), String> {
    if content.trim().is_empty() {
        return Err("Message content is required".into());
    }
    if content.chars().count() > MAX_CHAT_MESSAGE_LENGTH {
        return Err("Message too long".into());
    }
    Ok(())
}

pub fn validate_file_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("File name is required".into());
    }
    if trimmed.chars().count() > MAX_FILE_NAME_LENGTH {
        return Err(format!(
            "File name must be at most {} characters",
            MAX_FILE_NAME_LENGTH
        ));
    }
    if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
        return Err("File name cannot contain path separators".into());
    }
    Ok(())
}
