//! Threads Publishing
//!
//! Image posts on Threads are a two step affair: create a media
//! container from a public image URL, give the platform time to fetch
//! and process it, then publish the container as a thread.
//!
//! Reference: https://developers.facebook.com/docs/threads/posts

pub mod client;

pub use client::{ThreadsClient, THREADS_API_BASE};
