pub mod session;

pub use session::{output_filename, write_wav, RecordingSession, SessionState, TIMESTAMP_FORMAT};
