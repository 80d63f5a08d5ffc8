// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Test harness for driving the simulator against a fake configuration API.
//!
//! The fake keeps rules, their version history and a request log in memory
//! and is served through a `wiremock` server.

#![allow(dead_code)]

pub mod fake_api;

use rate_limiter_simulator::{ApiClient, Config, Simulator};
use wiremock::matchers::any;
use wiremock::{Mock, MockServer};

use fake_api::FakeApi;

/// Start a mock server answering every request from `api`.
pub async fn serve(api: &FakeApi) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(any())
        .respond_with(api.clone())
        .mount(&server)
        .await;
    server
}

pub fn config_for(server: &MockServer) -> Config {
    Config {
        base_url: format!("{}/", server.uri()),
        request_timeout_secs: 5,
        print_responses: false,
        ..Default::default()
    }
}

pub fn simulator_for(server: &MockServer) -> Simulator {
    let config = config_for(server);
    Simulator::new(ApiClient::new(&config).unwrap(), config.print_responses)
}
