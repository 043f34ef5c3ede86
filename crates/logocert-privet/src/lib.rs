//! Local network side of certification: Privet discovery and the local API
//!
//! - [`discovery`]: browse `_privet._tcp` over mDNS and read TXT records
//! - [`client`]: the printer's `/privet/*` HTTP endpoints

pub mod client;
pub mod discovery;

pub use reqwest::StatusCode;

pub use client::{PrivetClient, PrivetDevice, PrivetInfo, RawResponse, RegisterAction, RegistrationResponse};
pub use discovery::{
    find_printer, ConnectionState, DiscoveredPrinter, MdnsDiscovery, PrinterDiscovery, PrivetTxt, PRIVET_SERVICE,
};
