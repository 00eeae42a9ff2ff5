//! Loan Compass API Library
//!
//! Backend for a loan-comparison product: catalog browsing, profile-based
//! ranking with badges, and a per-product chat assistant whose answers are
//! grounded in the product's own data and cite the fields they use.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `data`: Data access layer.
//! - `integrations`: External service integrations.
//! - `obs`: Observability and logging.
//! - `assistant`: Grounded chat assistant (prompt, inference, fallback, citations).
//! - `badges`: Display badges for product cards.
//! - `chat_handler`: AI chat, chat history and anonymous-merge handlers.
//! - `circuit_breaker`: Circuit breaker for the inference API.
//! - `citations`: `[field]` citation extraction.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Database storage operations.
//! - `errors`: Error handling types.
//! - `gemini_client`: Gemini `generateContent` client.
//! - `handlers`: HTTP router, state and catalog handlers.
//! - `models`: Core data models.
//! - `prompt`: Grounded prompt builder and fallback answer.
//! - `rate_limiter`: Per-key token-bucket rate limiter.
//! - `scoring`: Product scoring and top-N ranking.

pub mod api;
pub mod core;
pub mod data;
pub mod integrations;
pub mod obs;

// Re-export primary modules for shared use in tests and other binaries
pub mod assistant;
pub mod badges;
pub mod chat_handler;
pub mod circuit_breaker;
pub mod citations;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod gemini_client;
pub mod handlers;
pub mod models;
pub mod prompt;
pub mod rate_limiter;
pub mod scoring;
