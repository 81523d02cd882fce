//! Thin orchestrator client boundary. Everything above this module talks to
//! `DockerClient`/`DockerError`, never to `bollard` directly.

mod client;
mod container;
pub mod fake;
mod orchestrator;
mod swarm;

pub use client::{DockerClient, DockerError, SwarmInspectResult};
pub use orchestrator::Orchestrator;
