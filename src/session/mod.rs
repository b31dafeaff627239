/// Splitting the timeline into render chunks.
pub mod chunk;
/// Phases, progress reporting and cancellation.
pub mod progress;
/// The export driver.
pub mod render_session;
