pub mod cobalt;
pub mod direct;
pub mod ytdlp;

pub use cobalt::CobaltBackend;
pub use direct::DirectBackend;
pub use ytdlp::YtDlpBackend;
