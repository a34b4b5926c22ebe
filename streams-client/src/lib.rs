// SPDX-License-Identifier: Apache-2.0
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

//! Client runtime for a remote packet-streaming service.
//!
//! An application builds [`connection::ConnectionOptions`], then either:
//! - a [`sender::PacketSender`] and calls `send(packet)`, or
//! - a [`receiver_queue`] and calls `try_pop`, or
//! - a [`decoded_receiver`] queue and calls `try_pop` on decoded raw-image
//!   packets.

pub mod connection;
pub mod decoded_receiver;
#[cfg(feature = "ingester")]
pub mod ingester;
pub mod packet;
pub mod proto;
pub mod receiver;
pub mod receiver_queue;
pub mod sender;
pub mod status_ext;

pub use connection::{ConnectionOptions, RpcOptions};
pub use packet::{Header, Packet};
