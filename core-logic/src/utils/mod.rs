pub(crate) mod logger;

pub use logger::setup_logger;
