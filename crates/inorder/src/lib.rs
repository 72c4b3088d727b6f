#![doc = include_str!("../README.md")]

mod broker;
mod error;
mod ordered_set;

pub use crate::broker::{Broker, BrokerConfig, Completion};
pub use crate::error::{Error, Result};
pub use crate::ordered_set::OrderedSet;
