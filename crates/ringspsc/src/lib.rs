//! RingSPSC - Fixed-Capacity Lock-Free Single-Producer Single-Consumer Queue
//!
//! A bounded ring of `N + 1` pre-allocated slots shared by exactly one
//! producer thread and one consumer thread. The only synchronization between
//! them is an acquire/release pair on two cache-padded cursors; no locks, no
//! per-element allocation, no blocking.
//!
//! # Key Features
//!
//! - Storage acquired once at construction, released once on drop
//! - Payloads constructed in place on push, destroyed exactly once
//! - Any capacity `N >= 1` (no power-of-two requirement)
//! - Producer/consumer roles enforced by `&mut` handles from [`SpscQueue::split`]
//! - Peek-then-release through a scoped [`Peek`] handle
//! - Full and empty are plain `bool` / `Option` / [`PushError`] results
//!
//! # Example
//!
//! ```
//! use ringspsc_rs::SpscQueue;
//!
//! let mut queue = SpscQueue::<u64, 3>::new();
//! let (mut producer, mut consumer) = queue.split();
//!
//! assert!(producer.push(&1));
//! assert!(producer.push(&2));
//! assert!(producer.push(&3));
//! assert!(!producer.push(&4)); // full: backpressure, nothing changed
//!
//! // Peek, then release
//! if let Some(front) = consumer.front() {
//!     assert_eq!(*front, 1);
//!     front.release();
//! }
//!
//! // Consume in place
//! consumer.consume_one(|v| assert_eq!(*v, 2));
//!
//! assert_eq!(consumer.pop(), Some(3));
//! assert_eq!(consumer.pop(), None);
//! ```

mod consumer;
mod error;
mod invariants;
mod producer;
mod queue;
mod slot;
mod trace;

pub use consumer::{Consumer, Peek};
pub use error::{PushError, QueueError};
pub use producer::Producer;
pub use queue::SpscQueue;
