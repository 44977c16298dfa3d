// Event model (sensor and actuator readings)
pub mod event;

// Filter engine for event predicates
pub mod filter;

// Client request model
pub mod request;

// Entity registry records
pub mod entity;

// Line-oriented wire codec
pub mod codec;

// Per-client engines and the shared routing table
pub mod engine;

// Connection router (one task per accepted connection)
pub mod router;

// Deadline-aware dispatch loop
pub mod dispatch;

// Hub assembly: listener, queues, dispatch
pub mod hub;

// Configuration
pub mod config;

// Simulated sensor/actuator devices
pub mod device;

// Minimal client helper
pub mod client;
