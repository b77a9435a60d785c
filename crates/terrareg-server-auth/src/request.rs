// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The credential envelope handed to auth methods.
//!
//! [`AuthRequest`] bundles headers, cookies, query and form fields with the
//! session lookup. The session is fetched at most once per request and shared
//! by every session-backed method.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{AUTHORIZATION, COOKIE};
use http::HeaderMap;
use tokio::sync::OnceCell;

use crate::session::Session;
use crate::store::{SessionLookup, StoreError};

pub const API_KEY_HEADER: &str = "X-Terrareg-ApiKey";
pub const ANALYTICS_KEY_HEADER: &str = "X-Terraform-Analytics-Key";
pub const SESSION_ID_HEADER: &str = "X-Session-ID";
pub const SESSION_ID_QUERY_PARAM: &str = "session_id";
pub const CSRF_HEADER: &str = "X-CSRF-Token";
pub const CSRF_FORM_FIELD: &str = "csrf_token";

/// Shape of the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerCredential<'a> {
	/// No `Authorization` header, or a non-Bearer scheme.
	Absent,
	/// `Authorization: Bearer` with nothing after the scheme.
	Empty,
	Token(&'a str),
}

struct SessionSource {
	lookup: Arc<dyn SessionLookup>,
	cookie_name: String,
}

pub struct AuthRequest {
	headers: HeaderMap,
	query: HashMap<String, String>,
	form: HashMap<String, String>,
	sessions: Option<SessionSource>,
	session: OnceCell<Option<Session>>,
}

impl AuthRequest {
	pub fn new(headers: HeaderMap) -> Self {
		Self {
			headers,
			query: HashMap::new(),
			form: HashMap::new(),
			sessions: None,
			session: OnceCell::new(),
		}
	}

	/// Parse a raw `a=1&b=2` query string.
	pub fn with_query(mut self, raw: Option<&str>) -> Self {
		if let Some(raw) = raw {
			self.query = url::form_urlencoded::parse(raw.as_bytes())
				.into_owned()
				.collect();
		}
		self
	}

	pub fn with_form(mut self, form: HashMap<String, String>) -> Self {
		self.form = form;
		self
	}

	/// Attach the session store and the name of the session cookie.
	pub fn with_sessions(
		mut self,
		lookup: Arc<dyn SessionLookup>,
		cookie_name: impl Into<String>,
	) -> Self {
		self.sessions = Some(SessionSource {
			lookup,
			cookie_name: cookie_name.into(),
		});
		self
	}

	pub fn headers(&self) -> &HeaderMap {
		&self.headers
	}

	/// Trimmed header value; `None` when missing, blank or not valid ASCII.
	pub fn header(&self, name: &str) -> Option<&str> {
		self.headers
			.get(name)?
			.to_str()
			.ok()
			.map(str::trim)
			.filter(|v| !v.is_empty())
	}

	pub fn bearer(&self) -> BearerCredential<'_> {
		let Some(value) = self.headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) else {
			return BearerCredential::Absent;
		};

		let value = value.trim();
		let (scheme, rest) = match value.split_once(' ') {
			Some((scheme, rest)) => (scheme, rest.trim()),
			None => (value, ""),
		};

		if !scheme.eq_ignore_ascii_case("Bearer") {
			return BearerCredential::Absent;
		}

		if rest.is_empty() {
			BearerCredential::Empty
		} else {
			BearerCredential::Token(rest)
		}
	}

	/// Bearer token when one is present and non-empty.
	pub fn bearer_token(&self) -> Option<&str> {
		match self.bearer() {
			BearerCredential::Token(token) => Some(token),
			_ => None,
		}
	}

	pub fn cookie(&self, name: &str) -> Option<&str> {
		self.headers
			.get_all(COOKIE)
			.iter()
			.filter_map(|v| v.to_str().ok())
			.flat_map(|v| v.split(';'))
			.find_map(|cookie| {
				let (key, value) = cookie.trim().split_once('=')?;
				(key == name).then_some(value.trim())
			})
			.filter(|v| !v.is_empty())
	}

	pub fn query_param(&self, name: &str) -> Option<&str> {
		self.query
			.get(name)
			.map(|v| v.trim())
			.filter(|v| !v.is_empty())
	}

	pub fn form_field(&self, name: &str) -> Option<&str> {
		self.form
			.get(name)
			.map(|v| v.trim())
			.filter(|v| !v.is_empty())
	}

	/// Session id from, in order: the session cookie, the `X-Session-ID`
	/// header, the `session_id` query parameter.
	pub fn session_id(&self) -> Option<&str> {
		let source = self.sessions.as_ref()?;
		self.cookie(&source.cookie_name)
			.or_else(|| self.header(SESSION_ID_HEADER))
			.or_else(|| self.query_param(SESSION_ID_QUERY_PARAM))
	}

	/// CSRF token from the `X-CSRF-Token` header or the `csrf_token` form field.
	pub fn csrf_token(&self) -> Option<&str> {
		self.header(CSRF_HEADER)
			.or_else(|| self.form_field(CSRF_FORM_FIELD))
	}

	/// The session referenced by this request, looked up once and cached.
	///
	/// `Ok(None)` when no session id is presented or the id is unknown.
	pub async fn session(&self) -> Result<Option<&Session>, StoreError> {
		let Some(source) = self.sessions.as_ref() else {
			return Ok(None);
		};
		let Some(session_id) = self.session_id() else {
			return Ok(None);
		};

		self.session
			.get_or_try_init(|| source.lookup.find_session(session_id))
			.await
			.map(Option::as_ref)
	}
}
