/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Score entry, scorecards and finalization over per-match sync sessions.
pub mod score_service;
/// Server-Sent Events message generation.
pub mod sse_events;
/// Server-Sent Events streaming service.
pub mod sse_service;
/// Score store connection supervisor with backoff.
pub mod storage_supervisor;
