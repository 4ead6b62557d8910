mod client;
mod resources;

pub use client::{ClusterClient, pod_phase};
pub use resources::Resources;
