pub mod client;
pub mod preview;
pub mod serve;
pub mod sites;
pub mod stats;
