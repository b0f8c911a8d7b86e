mod tracing;

pub use self::tracing::{init, init_with_level};

pub use ::tracing::level_filters::LevelFilter;
