//! # HTTP OTA pipeline for embedded devices
//!
//! `myrtio-ota` streams a firmware image from a plain HTTP server into the
//! inactive flash slot of an A/B partition layout and asks the bootloader to
//! test-boot it on the next reset.
//!
//! The crate is `no_std`, allocation free and built on the Embassy ecosystem.
//! Hardware is reached only through the traits in [`ports`]:
//!
//! - [`ports::Network`] opens TCP connections (`embedded-io-async` streams).
//! - Any [`embedded_storage::nor_flash::NorFlash`] region acts as the target slot.
//! - [`ports::Bootloader`] confirms images, erases the alternate slot and
//!   requests the upgrade test.
//!
//! The pipeline, leaves first:
//!
//! - [`UrlDescriptor`] parses the configured download URL.
//! - [`FlashWriter`] is a block-aligned sequential sink over the slot.
//! - [`http::HttpResponse`] sends the `GET` and yields body fragments.
//! - [`DownloadSession`] validates the response and feeds the writer.
//! - [`UpdateController`] runs the confirm/erase/download/commit state machine.
//! - [`SharedController`] rejects concurrent attempts.

#![no_std]

pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod flash_writer;
pub mod http;
pub mod ports;
pub mod session;
pub mod shared;
pub mod url;

pub use config::OtaConfig;
pub use controller::{ControllerState, UpdateController, UpdateReport};
pub use error::{FlashError, OtaError};
pub use flash_writer::FlashWriter;
pub use session::{DownloadReport, DownloadSession, SessionStatus};
pub use shared::SharedController;
pub use url::UrlDescriptor;
