//! mDNS discovery of Privet printers

use async_trait::async_trait;
use logocert_core::{CertError, Result};
use mdns_sd::{ServiceDaemon, ServiceEvent, ServiceInfo};
use std::collections::BTreeMap;
use std::net::IpAddr;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, trace};

/// Service type Privet devices advertise
pub const PRIVET_SERVICE: &str = "_privet._tcp.local.";

/// TXT keys every Privet advertisement must carry
const REQUIRED_TXT: [&str; 6] = ["txtvers", "ty", "url", "type", "id", "cs"];

/// Cloud connection state advertised in the `cs` TXT record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Online,
    Offline,
    Connecting,
    NotConfigured,
}

impl std::str::FromStr for ConnectionState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            "connecting" => Ok(Self::Connecting),
            "not-configured" => Ok(Self::NotConfigured),
            other => Err(format!("Invalid connection state: {}", other)),
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Connecting => write!(f, "connecting"),
            Self::NotConfigured => write!(f, "not-configured"),
        }
    }
}

/// Typed view over a Privet TXT record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivetTxt {
    pub txtvers: Option<String>,
    pub ty: Option<String>,
    pub note: Option<String>,
    pub url: Option<String>,
    pub device_type: Option<String>,
    pub id: Option<String>,
    pub cs: Option<String>,
}

impl PrivetTxt {
    pub fn from_map(txt: &BTreeMap<String, String>) -> Self {
        let get = |key: &str| txt.get(key).cloned();
        Self {
            txtvers: get("txtvers"),
            ty: get("ty"),
            note: get("note"),
            url: get("url"),
            device_type: get("type"),
            id: get("id"),
            cs: get("cs"),
        }
    }

    /// Required keys absent from the record
    ///
    /// `id` may be empty on an unregistered printer but must still be present.
    pub fn missing_required(&self) -> Vec<&'static str> {
        REQUIRED_TXT
            .iter()
            .copied()
            .filter(|key| {
                let value = match *key {
                    "txtvers" => &self.txtvers,
                    "ty" => &self.ty,
                    "url" => &self.url,
                    "type" => &self.device_type,
                    "id" => return self.id.is_none(),
                    _ => &self.cs,
                };
                value.as_deref().map(str::is_empty).unwrap_or(true)
            })
            .collect()
    }

    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.cs.as_deref().and_then(|cs| cs.parse().ok())
    }

    /// Registered printers advertise their cloud device id
    pub fn is_registered(&self) -> bool {
        self.id.as_deref().map(|id| !id.is_empty()).unwrap_or(false)
    }

    /// Device types listed in `type` (comma separated)
    pub fn device_types(&self) -> Vec<String> {
        self.device_type
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect()
    }
}

/// A resolved Privet service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredPrinter {
    /// Full service instance name, e.g. `My Printer._privet._tcp.local.`
    pub instance: String,
    pub hostname: String,
    pub addresses: Vec<IpAddr>,
    pub port: u16,
    pub txt: BTreeMap<String, String>,
}

impl DiscoveredPrinter {
    fn from_service_info(info: &ServiceInfo) -> Self {
        let mut addresses: Vec<IpAddr> = info.get_addresses().iter().map(|ip| IpAddr::from(*ip)).collect();
        addresses.sort();
        Self {
            instance: info.get_fullname().to_string(),
            hostname: info.get_hostname().to_string(),
            addresses,
            port: info.get_port(),
            txt: info
                .get_properties()
                .iter()
                .map(|p| (p.key().to_string(), p.val_str().to_string()))
                .collect(),
        }
    }

    /// Instance name without the service type suffix
    pub fn name(&self) -> &str {
        self.instance
            .strip_suffix(PRIVET_SERVICE)
            .map(|n| n.trim_end_matches('.'))
            .unwrap_or(&self.instance)
    }

    pub fn txt(&self) -> PrivetTxt {
        PrivetTxt::from_map(&self.txt)
    }

    /// Base URL of the local Privet API, preferring IPv4
    pub fn base_url(&self) -> Option<String> {
        let ip = self
            .addresses
            .iter()
            .find(|ip| ip.is_ipv4())
            .or_else(|| self.addresses.first())?;
        Some(match ip {
            IpAddr::V4(v4) => format!("http://{}:{}", v4, self.port),
            IpAddr::V6(v6) => format!("http://[{}]:{}", v6, self.port),
        })
    }
}

/// Printer whose instance name or `ty` contains `name`, ignoring case
pub fn find_printer<'a>(printers: &'a [DiscoveredPrinter], name: &str) -> Option<&'a DiscoveredPrinter> {
    let needle = name.to_lowercase();
    printers.iter().find(|p| {
        p.name().to_lowercase().contains(&needle)
            || p.txt.get("ty").map(|ty| ty.to_lowercase().contains(&needle)).unwrap_or(false)
    })
}

/// Source of Privet advertisements on the local network
#[async_trait]
pub trait PrinterDiscovery: Send + Sync {
    /// Collect advertisements seen during `window`
    async fn browse(&self, window: Duration) -> Result<Vec<DiscoveredPrinter>>;

    /// The named printer, if it advertised during `window`
    async fn find(&self, name: &str, window: Duration) -> Result<Option<DiscoveredPrinter>> {
        let printers = self.browse(window).await?;
        Ok(find_printer(&printers, name).cloned())
    }
}

/// Discovery over multicast DNS
#[derive(Clone)]
pub struct MdnsDiscovery {
    daemon: ServiceDaemon,
    service_type: String,
}

impl MdnsDiscovery {
    pub fn new() -> Result<Self> {
        let daemon = ServiceDaemon::new()
            .map_err(|e| CertError::Discovery(format!("mDNS daemon failed to start: {}", e)))?;
        Ok(Self {
            daemon,
            service_type: PRIVET_SERVICE.to_string(),
        })
    }

    fn stop_browse(&self) {
        while let Err(e) = self.daemon.stop_browse(&self.service_type) {
            match e {
                mdns_sd::Error::Again => trace!("mdns stop_browse transient error, trying again"),
                fatal => {
                    error!(error = %fatal, "mdns stop_browse fatal error");
                    break;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        if let Err(e) = self.daemon.shutdown() {
            debug!("mdns shutdown: {}", e);
        }
    }
}

#[async_trait]
impl PrinterDiscovery for MdnsDiscovery {
    async fn browse(&self, window: Duration) -> Result<Vec<DiscoveredPrinter>> {
        let receiver = self
            .daemon
            .browse(&self.service_type)
            .map_err(|e| CertError::Discovery(format!("mDNS browse failed: {}", e)))?;

        let deadline = Instant::now() + window;
        let mut found: BTreeMap<String, DiscoveredPrinter> = BTreeMap::new();

        loop {
            let event = match tokio::time::timeout_at(deadline, receiver.recv_async()).await {
                Ok(Ok(event)) => event,
                Ok(Err(e)) => {
                    error!("mdns query error: {}", e);
                    break;
                }
                Err(_) => break,
            };

            debug!(service_event = ?event);
            match event {
                ServiceEvent::ServiceResolved(info) => {
                    let printer = DiscoveredPrinter::from_service_info(&info);
                    info!("Privet printer resolved: {} ({}:{})", printer.name(), printer.hostname, printer.port);
                    found.insert(printer.instance.clone(), printer);
                }
                ServiceEvent::ServiceRemoved(_, fullname) => {
                    if found.remove(&fullname).is_some() {
                        info!("Privet printer went away: {}", fullname);
                    }
                }
                _ => {}
            }
        }

        self.stop_browse();
        Ok(found.into_values().collect())
    }
}
