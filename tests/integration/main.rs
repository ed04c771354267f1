//! Integration tests against mock sites served by wiremock

mod audit_tests;
mod crawl_tests;
