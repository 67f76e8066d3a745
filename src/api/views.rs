//! HTML rendering. Every page is a plain function of its data plus the
//! session's anti-forgery token.

use std::fmt::Write;

use crate::api::forms::{FieldErrors, ProfileForm, SignupForm};
use crate::api::middleware::RequestContext;
use crate::db::models::{Flash, Message, MessageId, User, UserId};

pub struct Page<'a> {
    pub user: Option<&'a User>,
    pub csrf_token: &'a str,
    pub flash: Option<Flash>,
}

impl<'a> Page<'a> {
    pub fn new(ctx: &'a RequestContext, flash: Option<Flash>) -> Self {
        Page {
            user: ctx.user(),
            csrf_token: ctx.csrf_token(),
            flash,
        }
    }

    fn is_current(&self, user_id: UserId) -> bool {
        self.user.is_some_and(|u| u.id == user_id)
    }
}

/// Follow state needed to draw follow/unfollow buttons.
pub struct Relations<'a> {
    pub following_ids: &'a [UserId],
}

pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

fn format_timestamp(secs: i64) -> String {
    chrono::DateTime::from_timestamp(secs, 0)
        .map(|t| t.format("%d %B %Y").to_string())
        .unwrap_or_default()
}

fn layout(page: &Page<'_>, title: &str, body: &str) -> String {
    let nav = match page.user {
        Some(user) => format!(
            r#"<a href="/users/{id}">@{name}</a>
<a href="/messages/new">New Message</a>
<form method="POST" action="/logout" class="inline">{csrf}<button>Log out</button></form>"#,
            id = user.id,
            name = escape(&user.username),
            csrf = csrf_input(page),
        ),
        None => r#"<a href="/signup">Sign up</a>
<a href="/login">Log in</a>"#
            .to_string(),
    };

    let flash = page
        .flash
        .as_ref()
        .map(|f| {
            format!(
                r#"<div class="alert alert-{}">{}</div>"#,
                escape(&f.category),
                escape(&f.message)
            )
        })
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{title} | Warbler</title>
<link rel="stylesheet" href="/static/stylesheets/style.css">
</head>
<body>
<nav><a href="/" class="brand">Warbler</a>
<form action="/users" class="inline"><input name="q" placeholder="Search Warbler"></form>
{nav}
</nav>
<main>
{flash}
{body}
</main>
<script src="/static/scripts/warbler.js"></script>
</body>
</html>"#,
        title = escape(title),
    )
}

fn csrf_input(page: &Page<'_>) -> String {
    format!(
        r#"<input type="hidden" name="csrf_token" value="{}">"#,
        escape(page.csrf_token)
    )
}

fn field_errors_html(errors: &FieldErrors, field: &str) -> String {
    errors
        .get(field)
        .map(|messages| {
            messages
                .iter()
                .map(|m| format!(r#"<span class="text-danger">{}</span>"#, escape(m)))
                .collect::<Vec<_>>()
                .join("\n")
        })
        .unwrap_or_default()
}

fn input(errors: &FieldErrors, name: &str, kind: &str, placeholder: &str, value: &str) -> String {
    format!(
        r#"<div class="form-group">
<input type="{kind}" name="{name}" placeholder="{placeholder}" value="{value}">
{errors}
</div>"#,
        value = escape(value),
        errors = field_errors_html(errors, name),
    )
}

fn button_form(page: &Page<'_>, action: &str, label: &str) -> String {
    format!(
        r#"<form method="POST" action="{action}" class="inline">{csrf}<button>{label}</button></form>"#,
        csrf = csrf_input(page),
    )
}

fn follow_button(page: &Page<'_>, relations: &Relations<'_>, user: &User) -> String {
    if page.is_current(user.id) || page.user.is_none() {
        return String::new();
    }
    if relations.following_ids.contains(&user.id) {
        button_form(page, &format!("/users/stop-following/{}", user.id), "Unfollow")
    } else {
        button_form(page, &format!("/users/follow/{}", user.id), "Follow")
    }
}

fn user_cards(page: &Page<'_>, relations: &Relations<'_>, users: &[User]) -> String {
    if users.is_empty() {
        return "<p>Sorry, no users found</p>".to_string();
    }

    let mut out = String::from(r#"<div class="user-cards">"#);
    for user in users {
        let _ = write!(
            out,
            r#"
<div class="card">
<a href="/users/{id}"><img src="{image}" alt="Image for {name}"><p>@{name}</p></a>
{button}
<p class="bio">{bio}</p>
</div>"#,
            id = user.id,
            image = escape(&user.image_url),
            name = escape(&user.username),
            button = follow_button(page, relations, user),
            bio = escape(user.bio.as_deref().unwrap_or_default()),
        );
    }
    out.push_str("\n</div>");
    out
}

fn message_items(page: &Page<'_>, messages: &[Message], liked: &[MessageId]) -> String {
    let mut out = String::from(r#"<ul id="messages" class="list-group">"#);
    for message in messages {
        let star = if liked.contains(&message.id) {
            "bi-star-fill"
        } else {
            "bi-star"
        };
        let _ = write!(
            out,
            r#"
<li class="list-group-item">
<a href="/messages/{id}" class="message-link"></a>
<a href="/users/{user_id}"><img src="{image}" alt="user image" class="timeline-image"></a>
<div class="message-area">
<a href="/users/{user_id}">@{name}</a>
<span class="text-muted">{when}</span>
<p>{text}</p>
</div>
<form method="POST" action="/messages/{id}/toggle-like" class="like-form">{csrf}<button><i class="bi {star}"></i></button></form>
</li>"#,
            id = message.id,
            user_id = message.user_id,
            image = escape(&message.image_url),
            name = escape(&message.username),
            when = format_timestamp(message.created_at),
            text = escape(&message.text),
            csrf = csrf_input(page),
        );
    }
    out.push_str("\n</ul>");
    out
}

pub fn home_anon(page: &Page<'_>) -> String {
    layout(
        page,
        "Home",
        r#"<div class="home-hero">
<h1>What's Happening?</h1>
<p>New to Warbler?</p>
<a href="/signup" class="btn btn-primary">Sign up now</a>
</div>"#,
    )
}

pub fn home(
    page: &Page<'_>,
    user: &User,
    counts: (i64, i64, i64),
    messages: &[Message],
    liked: &[MessageId],
) -> String {
    let (message_count, following, followers) = counts;
    let body = format!(
        r#"<aside class="user-aside">
<a href="/users/{id}"><img src="{image}" alt="Image for {name}"></a>
<a href="/users/{id}"><p>@{name}</p></a>
<ul class="user-stats">
<li><a href="/users/{id}">Messages {message_count}</a></li>
<li><a href="/users/{id}/following">Following {following}</a></li>
<li><a href="/users/{id}/followers">Followers {followers}</a></li>
</ul>
</aside>
{messages}"#,
        id = user.id,
        image = escape(&user.image_url),
        name = escape(&user.username),
        messages = message_items(page, messages, liked),
    );
    layout(page, "Home", &body)
}

pub fn signup(page: &Page<'_>, form: &SignupForm, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<h2 class="join-message">Join Warbler today.</h2>
<form method="POST" action="/signup" id="user_form">
{csrf}
{csrf_errors}
{username}
{email}
{password}
{image_url}
<button class="btn btn-primary">Sign me up!</button>
</form>"#,
        csrf = csrf_input(page),
        csrf_errors = field_errors_html(errors, "csrf_token"),
        username = input(errors, "username", "text", "Username", &form.username),
        email = input(errors, "email", "email", "E-mail", &form.email),
        password = input(errors, "password", "password", "Password", ""),
        image_url = input(
            errors,
            "image_url",
            "text",
            "(Optional) Image URL",
            form.image_url.as_deref().unwrap_or_default()
        ),
    );
    layout(page, "Sign Up", &body)
}

pub fn login(page: &Page<'_>, username: &str, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<h2 class="join-message">Welcome back.</h2>
<form method="POST" action="/login" id="user_form">
{csrf}
{csrf_errors}
{username}
{password}
<button class="btn btn-primary">Log in</button>
</form>"#,
        csrf = csrf_input(page),
        csrf_errors = field_errors_html(errors, "csrf_token"),
        username = input(errors, "username", "text", "Username", username),
        password = input(errors, "password", "password", "Password", ""),
    );
    layout(page, "Log In", &body)
}

pub fn users_index(page: &Page<'_>, relations: &Relations<'_>, users: &[User]) -> String {
    layout(page, "Users", &user_cards(page, relations, users))
}

fn profile_header(
    page: &Page<'_>,
    relations: &Relations<'_>,
    user: &User,
    counts: (i64, i64, i64, i64),
) -> String {
    let (message_count, following, followers, likes) = counts;

    let actions = if page.is_current(user.id) {
        format!(
            r#"<a href="/users/profile" class="btn btn-outline-secondary">Edit Profile</a>
{delete}"#,
            delete = button_form(page, "/users/delete", "Delete Profile"),
        )
    } else {
        follow_button(page, relations, user)
    };

    format!(
        r#"<div id="warbler-hero" style="background-image: url('{header}')"></div>
<img src="{image}" alt="Image for {name}" id="profile-avatar">
<ul class="user-stats">
<li><a href="/users/{id}">Messages {message_count}</a></li>
<li><a href="/users/{id}/following">Following {following}</a></li>
<li><a href="/users/{id}/followers">Followers {followers}</a></li>
<li><a href="/users/{id}/likes">Likes {likes}</a></li>
</ul>
{actions}
<h4 id="sidebar-username">@{name}</h4>
<p>{bio}</p>
<p class="user-location">{location}</p>"#,
        id = user.id,
        header = escape(&user.header_image_url),
        image = escape(&user.image_url),
        name = escape(&user.username),
        bio = escape(user.bio.as_deref().unwrap_or_default()),
        location = escape(user.location.as_deref().unwrap_or_default()),
    )
}

pub struct ProfileView<'a> {
    pub user: &'a User,
    /// (messages, following, followers, likes)
    pub counts: (i64, i64, i64, i64),
    pub relations: Relations<'a>,
}

pub fn user_show(
    page: &Page<'_>,
    view: &ProfileView<'_>,
    messages: &[Message],
    liked: &[MessageId],
) -> String {
    let body = format!(
        "{}\n{}",
        profile_header(page, &view.relations, view.user, view.counts),
        message_items(page, messages, liked),
    );
    layout(page, &view.user.username, &body)
}

pub fn following(page: &Page<'_>, view: &ProfileView<'_>, users: &[User]) -> String {
    let body = format!(
        "{}\n<h3>Following</h3>\n{}",
        profile_header(page, &view.relations, view.user, view.counts),
        user_cards(page, &view.relations, users),
    );
    layout(page, "Following", &body)
}

pub fn followers(page: &Page<'_>, view: &ProfileView<'_>, users: &[User]) -> String {
    let body = format!(
        "{}\n<h3>Followers</h3>\n{}",
        profile_header(page, &view.relations, view.user, view.counts),
        user_cards(page, &view.relations, users),
    );
    layout(page, "Followers", &body)
}

pub fn likes(
    page: &Page<'_>,
    view: &ProfileView<'_>,
    messages: &[Message],
    liked: &[MessageId],
    page_number: i64,
    has_next: bool,
) -> String {
    let mut pager = String::new();
    if page_number > 1 {
        let _ = write!(
            pager,
            r#"<a href="/users/{}/likes?page={}">Newer</a> "#,
            view.user.id,
            page_number - 1
        );
    }
    if has_next {
        let _ = write!(
            pager,
            r#"<a href="/users/{}/likes?page={}">Older</a>"#,
            view.user.id,
            page_number + 1
        );
    }

    let body = format!(
        "{}\n<h3>Liked Warbles</h3>\n{}\n<nav class=\"pager\">{}</nav>",
        profile_header(page, &view.relations, view.user, view.counts),
        message_items(page, messages, liked),
        pager,
    );
    layout(page, "Likes", &body)
}

pub fn profile_edit(page: &Page<'_>, form: &ProfileForm, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<h2 class="join-message">Edit your profile.</h2>
<form method="POST" action="/users/profile" id="user_form">
{csrf}
{username}
{email}
{image_url}
{header_image_url}
<div class="form-group">
<textarea name="bio" placeholder="(Optional) Tell us about yourself">{bio}</textarea>
{bio_errors}
</div>
{location}
<p>To confirm changes, enter your password:</p>
{password}
<button class="btn btn-success">Edit this user!</button>
<a href="/users/{id}" class="btn btn-outline-secondary">Cancel</a>
</form>"#,
        csrf = csrf_input(page),
        username = input(errors, "username", "text", "Username", &form.username),
        email = input(errors, "email", "email", "E-mail", &form.email),
        image_url = input(
            errors,
            "image_url",
            "text",
            "(Optional) Image URL",
            form.image_url.as_deref().unwrap_or_default()
        ),
        header_image_url = input(
            errors,
            "header_image_url",
            "text",
            "(Optional) Header Image URL",
            form.header_image_url.as_deref().unwrap_or_default()
        ),
        bio = escape(form.bio.as_deref().unwrap_or_default()),
        bio_errors = field_errors_html(errors, "bio"),
        location = input(
            errors,
            "location",
            "text",
            "(Optional) Location",
            form.location.as_deref().unwrap_or_default()
        ),
        password = input(errors, "password", "password", "Password", ""),
        id = page.user.map(|u| u.id).unwrap_or_default(),
    );
    layout(page, "Edit Profile", &body)
}

pub fn message_new(page: &Page<'_>, text: &str, errors: &FieldErrors) -> String {
    let body = format!(
        r#"<form method="POST" action="/messages/new">
{csrf}
<div class="form-group">
<textarea name="text" placeholder="What's happening?">{text}</textarea>
{errors}
</div>
<button class="btn btn-outline-success">Add my message!</button>
</form>"#,
        csrf = csrf_input(page),
        text = escape(text),
        errors = field_errors_html(errors, "text"),
    );
    layout(page, "New Message", &body)
}

pub fn message_show(page: &Page<'_>, message: &Message, liked: bool) -> String {
    let delete = if page.is_current(message.user_id) {
        button_form(page, &format!("/messages/{}/delete", message.id), "Delete")
    } else {
        String::new()
    };
    let own_id = [message.id];
    let liked_ids: &[MessageId] = if liked { &own_id } else { &[] };

    let body = format!(
        "{}\n{}",
        message_items(page, std::slice::from_ref(message), liked_ids),
        delete,
    );
    layout(page, "Message", &body)
}

/// Standalone page for errors raised before a session context is at hand.
pub fn error_page(message: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>Warbler</title></head>
<body>
<main>
<h1>{}</h1>
<a href="/">Go home</a>
</main>
</body>
</html>"#,
        escape(message)
    )
}

pub fn not_found_page() -> String {
    error_page("Sorry, we can't find that page.")
}
