// Northbound HTTP APIs
pub mod api;

// Configuration loading
pub mod config;

pub mod error;

// 3GPP data model and validation
pub mod model;

// SMF notification correlation and AF delivery
pub mod notification;

// AF registry, subscriptions and PFD transactions
pub mod registry;

// UDR, PCF and emulated southbound clients
pub mod southbound;
