// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod note;
pub mod user;

pub use note::Note;
pub use user::{OtpChallenge, PublicUser, User};
