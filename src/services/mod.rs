/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Caller identity extraction.
pub mod identity;
/// Score persistence with ranking projections.
pub mod score_repository;
/// Leaderboard and per-user score reads.
pub mod score_service;
/// Idle session eviction.
pub mod session_sweeper;
/// Timing session lifecycle and score saving.
pub mod session_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Score store connection supervisor with backoff and degraded mode.
pub mod storage_supervisor;
