//! Input validation for the public API. Lives next to the request types so
//! the server and any UI collaborator enforce identical rules and messages.

use crate::api::{CreateChannelRequest, SigninRequest, SignupRequest};

pub const PASSWORD_MIN: usize = 8;
pub const PASSWORD_MAX: usize = 10;
pub const NAME_MAX: usize = 50;
pub const CHANNEL_NAME_MAX: usize = 30;
pub const DESCRIPTION_MAX: usize = 200;

/// Syntactic email check: exactly one `@`, a non-empty local part, and a
/// domain with something on both sides of a dot. No whitespace anywhere.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    match domain.rsplit_once('.') {
        Some((host, tld)) => !host.is_empty() && !tld.is_empty(),
        None => false,
    }
}

pub fn signup(req: &SignupRequest) -> Result<(), &'static str> {
    credentials(&req.email, &req.password)?;
    if req.name.is_empty() {
        return Err("Name is required");
    }
    if req.name.chars().count() > NAME_MAX {
        return Err("Name must contain at most 50 character(s)");
    }
    Ok(())
}

pub fn signin(req: &SigninRequest) -> Result<(), &'static str> {
    credentials(&req.email, &req.password)
}

fn credentials(email: &str, password: &str) -> Result<(), &'static str> {
    if !is_valid_email(email) {
        return Err("Email is not valid");
    }
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        return Err("Password must contain at least 8 character(s)");
    }
    if len > PASSWORD_MAX {
        return Err("Password must contain at most 10 character(s)");
    }
    Ok(())
}

pub fn create_channel(req: &CreateChannelRequest) -> Result<(), &'static str> {
    if req.name.is_empty() {
        return Err("Channel name is required");
    }
    if req.name.chars().count() > CHANNEL_NAME_MAX {
        return Err("Channel name must contain at most 30 character(s)");
    }
    if let Some(description) = &req.description {
        if description.chars().count() > DESCRIPTION_MAX {
            return Err("Description must contain at most 200 character(s)");
        }
    }
    Ok(())
}
