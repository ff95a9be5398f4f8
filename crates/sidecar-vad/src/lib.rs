pub mod clock;
pub mod constants;
pub mod engine;
pub mod state;
pub mod types;

pub use constants::{FRAME_DURATION_MS, FRAME_SIZE_BYTES, FRAME_SIZE_SAMPLES, SAMPLE_RATE_HZ};
pub use engine::VadClassifier;
pub use state::{split_into_frames, VadStateMachine};
pub use types::{Frame, Segment, VadEvent, VadState};
