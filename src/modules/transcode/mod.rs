pub mod acquisition;
pub mod delivery;
pub mod encoder;
pub mod events;
pub mod job;
pub mod model;
pub mod orchestrator;
pub mod profile;
pub mod transport;

#[cfg(test)]
pub mod testing;
