use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer};
use validator::{Validate, ValidationErrors};

use crate::db::models::{DEFAULT_HEADER_IMAGE_URL, DEFAULT_IMAGE_URL};
use crate::db::{NewUser, ProfileUpdate, User};

pub const CSRF_ERROR: &str = "The CSRF token is missing or invalid.";

/// Field name -> messages, ready to render next to the inputs.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

pub fn field_errors(errors: &ValidationErrors) -> FieldErrors {
    errors
        .field_errors()
        .iter()
        .map(|(field, errs)| {
            let messages = errs
                .iter()
                .map(|e| match &e.message {
                    Some(message) => message.to_string(),
                    None => format!("Invalid {}.", field),
                })
                .collect();
            (field.to_string(), messages)
        })
        .collect()
}

/// Validate, returning rendered field errors on failure.
pub fn check<T: Validate>(form: &T) -> Result<(), FieldErrors> {
    form.validate().map_err(|e| field_errors(&e))
}

pub fn push_error(errors: &mut FieldErrors, field: &str, message: &str) {
    errors
        .entry(field.to_string())
        .or_default()
        .push(message.to_string());
}

fn trimmed<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(de)?;
    Ok(value.trim().to_string())
}

fn empty_string_as_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(de)?;
    Ok(value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty()))
}

/// Body of forms that carry nothing but the anti-forgery token.
#[derive(Debug, Default, Deserialize)]
pub struct CsrfForm {
    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct SignupForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 30, message = "Username must be 1-30 characters."))]
    pub username: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid email address."))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, max = 50, message = "Field must be between 6 and 50 characters long."))]
    pub password: String,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid URL."))]
    pub image_url: Option<String>,

    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl SignupForm {
    pub fn into_new_user(self) -> NewUser {
        NewUser {
            username: self.username,
            email: self.email,
            password: self.password,
            image_url: self.image_url,
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct LoginForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 30, message = "Username must be 1-30 characters."))]
    pub username: String,

    #[serde(default)]
    #[validate(length(min = 6, max = 50, message = "Field must be between 6 and 50 characters long."))]
    pub password: String,

    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct ProfileForm {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 30, message = "Username must be 1-30 characters."))]
    pub username: String,

    #[serde(default, deserialize_with = "trimmed")]
    #[validate(email(message = "Invalid email address."))]
    pub email: String,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid URL."))]
    pub image_url: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(url(message = "Invalid URL."))]
    pub header_image_url: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(length(max = 300, message = "Bio must be at most 300 characters."))]
    pub bio: Option<String>,

    #[serde(default, deserialize_with = "empty_string_as_none")]
    #[validate(length(max = 30, message = "Location must be at most 30 characters."))]
    pub location: Option<String>,

    #[serde(default)]
    #[validate(length(min = 1, message = "Enter your current password."))]
    pub password: String,

    #[serde(default)]
    pub csrf_token: Option<String>,
}

impl ProfileForm {
    /// Prefill from the stored profile. Default images show as blank inputs
    /// and the password is never echoed back.
    pub fn from_user(user: &User) -> Self {
        ProfileForm {
            username: user.username.clone(),
            email: user.email.clone(),
            image_url: Some(user.image_url.clone()).filter(|url| url != DEFAULT_IMAGE_URL),
            header_image_url: Some(user.header_image_url.clone())
                .filter(|url| url != DEFAULT_HEADER_IMAGE_URL),
            bio: user.bio.clone(),
            location: user.location.clone(),
            password: String::new(),
            csrf_token: None,
        }
    }

    pub fn to_update(&self) -> ProfileUpdate {
        ProfileUpdate {
            username: self.username.clone(),
            email: self.email.clone(),
            image_url: self.image_url.clone(),
            header_image_url: self.header_image_url.clone(),
            bio: self.bio.clone(),
            location: self.location.clone(),
        }
    }
}

#[derive(Debug, Default, Clone, Deserialize, Validate)]
pub struct MessageForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 140, message = "Message must be 1-140 characters."))]
    pub text: String,

    #[serde(default)]
    pub csrf_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// Highest page number accepted from the query string.
pub const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
}

impl PageQuery {
    /// Zero-based page index; `?page=` is one-based in the URL.
    pub fn index(&self) -> i64 {
        self.page.unwrap_or(1).clamp(1, MAX_PAGE) - 1
    }
}
