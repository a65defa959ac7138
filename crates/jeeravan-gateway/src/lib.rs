// SPDX-FileCopyrightText: 2026 Jeeravan Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP and WebSocket gateway for the Jeeravan assistant.
//!
//! Exposes the realtime `ai-message` / `ai-response` protocol on `/ws`, the
//! chat and account endpoints under `/api`, and a public `/health` endpoint.
//! Credentials are HS256 tokens carried in a cookie, a bearer header, or a
//! `token` query parameter.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod server;
pub mod ws;

pub use auth::{TokenAuthenticator, issue_token};
pub use error::ApiError;
pub use server::{AppState, GatewaySettings, bind, build_router, serve};
