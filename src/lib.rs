pub mod clock;
pub mod compactor;
pub mod engine;
pub mod export;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod report;
pub mod validation;
pub mod wal;
pub mod wire;
