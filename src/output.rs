// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Colored console output.
//!
//! Console lines are the user-facing record of a simulation; diagnostics
//! go through `tracing` instead.

use colored::Colorize;
use serde::Serialize;

pub fn success(message: impl AsRef<str>) {
    println!("{}", message.as_ref().green());
}

pub fn failure(message: impl AsRef<str>) {
    println!("{}", message.as_ref().red());
}

pub fn notice(message: impl AsRef<str>) {
    println!("{}", message.as_ref().yellow());
}

pub fn heading(message: impl AsRef<str>) {
    println!("{}", message.as_ref().cyan());
}

pub fn plain(message: impl AsRef<str>) {
    println!("{}", message.as_ref());
}

/// Print a labelled, pretty-printed JSON document in yellow.
pub fn response<T: Serialize + ?Sized>(value: &T) {
    notice(format!("Response: {}", pretty_json(value)));
}

pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("<unserializable: {}>", e))
}

/// Turn colors off, e.g. when stdout is not a terminal.
pub fn disable_colors() {
    colored::control::set_override(false);
}
