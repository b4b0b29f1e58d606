//! Media delivery: byte-range file serving and live transcoding.
//!
//! Both paths stream straight into the HTTP response body. Files and
//! transcoder processes are owned by the request that opened them and are
//! released when the body is dropped, including when the client goes away.

pub mod pipe;
pub mod range;
pub mod transcode;

pub use pipe::{TranscodeOutcome, TranscodeSession, TranscodingPipe};
pub use range::{ByteRange, RangeContentServer, range_not_satisfiable};
pub use transcode::{FfmpegTranscoder, TranscodeProcess, Transcoder};
