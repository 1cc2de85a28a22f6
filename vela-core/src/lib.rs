//! Vela Core
//!
//! Core library for declaring a web platform's networks as values:
//! components expand configuration into resources, the differ turns them
//! into a plan, and the interpreter applies the plan through a provider.

pub mod cidr;
pub mod components;
pub mod differ;
pub mod effect;
pub mod graph;
pub mod interpreter;
pub mod plan;
pub mod provider;
pub mod providers;
pub mod resolver;
pub mod resource;
pub mod schema;
pub mod stack;
